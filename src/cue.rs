use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Visual flavor of the status cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CueKind {
    Neutral,
    Error,
    Success,
}

/// Snapshot of the single transient status indicator.
///
/// `progress` is a render-only fill fraction in `[0, 1]`; it carries no
/// control-flow meaning.
#[derive(Debug, Clone, Serialize)]
pub struct CueState {
    pub message: String,
    pub kind: CueKind,
    pub progress: f32,
    pub visible: bool,
}

impl CueState {
    fn hidden() -> Self {
        Self {
            message: String::new(),
            kind: CueKind::Neutral,
            progress: 0.0,
            visible: false,
        }
    }
}

/// Owns the one process-wide status cue.
///
/// State changes are published through a watch channel so a presentation
/// layer can render them; last writer wins. Cloning shares the same cue.
#[derive(Clone)]
pub struct CueController {
    inner: Arc<CueInner>,
}

struct CueInner {
    tx: watch::Sender<CueState>,
    autoclear: Mutex<AutoClear>,
}

/// Pending auto-clear timer. The sequence number lets a fired timer
/// vacate its own slot without racing a newer arming.
#[derive(Default)]
struct AutoClear {
    seq: u64,
    pending: Option<(u64, JoinHandle<()>)>,
}

impl CueController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(CueState::hidden());
        Self {
            inner: Arc::new(CueInner {
                tx,
                autoclear: Mutex::new(AutoClear::default()),
            }),
        }
    }

    /// Replace the cue's content and make it visible. Any pending
    /// auto-clear timer is cancelled.
    pub fn show(&self, message: &str, kind: CueKind) {
        self.cancel_autoclear();
        self.inner.tx.send_modify(|state| {
            state.message = message.to_string();
            state.kind = kind;
            state.visible = true;
        });
    }

    /// Hide the cue. The underlying state is kept, not destroyed.
    pub fn clear(&self) {
        self.inner.tx.send_modify(|state| state.visible = false);
    }

    /// Arm a one-shot timer that clears the cue after `after`. Re-arming
    /// cancels the previous timer.
    pub fn schedule_auto_clear(&self, after: Duration) {
        let inner = Arc::clone(&self.inner);
        let mut slot = self.inner.autoclear.lock().unwrap();
        slot.seq += 1;
        let id = slot.seq;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            inner.tx.send_modify(|state| state.visible = false);
            // Vacate the slot, unless a newer timer has been armed since.
            let mut slot = inner.autoclear.lock().unwrap();
            if slot.pending.as_ref().map(|(pending, _)| *pending) == Some(id) {
                slot.pending = None;
            }
        });
        if let Some((_, previous)) = slot.pending.replace((id, handle)) {
            previous.abort();
        }
    }

    /// Publish a fill fraction, clamped to `[0, 1]`.
    pub fn set_progress(&self, fraction: f32) {
        let fraction = fraction.clamp(0.0, 1.0);
        self.inner.tx.send_modify(|state| state.progress = fraction);
    }

    /// Receiver for rendering; yields every state change.
    pub fn subscribe(&self) -> watch::Receiver<CueState> {
        self.inner.tx.subscribe()
    }

    pub fn current(&self) -> CueState {
        self.inner.tx.borrow().clone()
    }

    fn cancel_autoclear(&self) {
        if let Some((_, handle)) = self.inner.autoclear.lock().unwrap().pending.take() {
            handle.abort();
        }
    }

    #[cfg(test)]
    fn has_pending_autoclear(&self) -> bool {
        self.inner.autoclear.lock().unwrap().pending.is_some()
    }
}

impl Default for CueController {
    fn default() -> Self {
        Self::new()
    }
}
