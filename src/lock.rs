use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::trace;

/// FIFO mutual exclusion for the two speech operations.
///
/// `speak` and `listen` must never overlap, process-wide. Waiters queue in
/// the order they called [`acquire`](TurnLock::acquire) and the lock is
/// handed from holder to the oldest live waiter directly. A holder that
/// never drops its [`TurnGuard`] blocks all later acquirers forever; that
/// is the documented contract, which is why the guard releases on drop
/// rather than through an explicit call.
pub struct TurnLock {
    state: Mutex<LockState>,
}

struct LockState {
    held: bool,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// Exclusive hold on the speech turn. Dropping it releases the lock.
pub struct TurnGuard {
    lock: Arc<TurnLock>,
}

impl TurnLock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(LockState {
                held: false,
                waiters: VecDeque::new(),
            }),
        })
    }

    /// Wait for the speech turn. Returns once every earlier acquirer has
    /// released. A queued acquire future that is dropped before its turn
    /// comes up is skipped at handoff time.
    pub async fn acquire(self: &Arc<Self>) -> TurnGuard {
        let ticket = {
            let mut state = self.state.lock().unwrap();
            if !state.held {
                state.held = true;
                None
            } else {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                Some(rx)
            }
        };

        if let Some(rx) = ticket {
            trace!("turn lock busy, queued");
            // The sender is only dropped when the releasing guard skips us,
            // which cannot happen while this future is alive.
            let _ = rx.await;
        }
        TurnGuard {
            lock: Arc::clone(self),
        }
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        let mut state = self.lock.state.lock().unwrap();
        loop {
            match state.waiters.pop_front() {
                Some(next) => {
                    // Handoff: the lock stays held, ownership moves to the
                    // waiter. A send failure means that waiter gave up.
                    if next.send(()).is_ok() {
                        trace!("turn lock handed to next waiter");
                        return;
                    }
                }
                None => {
                    state.held = false;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_acquirers_run_in_submission_order() {
        let lock = TurnLock::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..4u32 {
            let lock = Arc::clone(&lock);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                // Stagger submission so the queue order is deterministic.
                tokio::time::sleep(Duration::from_millis(10 * u64::from(i))).await;
                let _guard = lock.acquire().await;
                tokio::time::sleep(Duration::from_millis(100)).await;
                order.lock().unwrap().push(i);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_holders_never_overlap() {
        let lock = TurnLock::new();
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock = Arc::clone(&lock);
            let active = Arc::clone(&active);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _guard = lock.acquire().await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_waiter_is_skipped() {
        let lock = TurnLock::new();
        let guard = lock.acquire().await;

        let abandoned = {
            let lock = Arc::clone(&lock);
            tokio::spawn(async move {
                let _guard = lock.acquire().await;
            })
        };
        tokio::task::yield_now().await;
        abandoned.abort();
        let _ = abandoned.await;

        drop(guard);
        // The aborted waiter must not leave the lock stuck.
        tokio::time::timeout(Duration::from_secs(1), lock.acquire())
            .await
            .expect("lock was never handed over");
    }
}
