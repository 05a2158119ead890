use crate::capture::MediaCapture;
use crate::cue::{CueController, CueKind};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Answer of the platform's microphone permission query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    /// The user has not decided yet; an acquisition attempt will prompt.
    Prompting,
}

/// Optional platform capability for querying microphone permission without
/// touching the device. When absent, the gate falls back to a trial
/// acquisition.
#[async_trait]
pub trait PermissionQuery: Send + Sync {
    async fn query_microphone(&self) -> PermissionState;
}

/// Decides whether microphone access may proceed, reporting every refusal
/// through the status cue.
pub struct PermissionGate {
    supported: bool,
    query: Option<Arc<dyn PermissionQuery>>,
    capture: Arc<dyn MediaCapture>,
    cue: CueController,
    autoclear: Duration,
}

impl PermissionGate {
    pub fn new(
        supported: bool,
        query: Option<Arc<dyn PermissionQuery>>,
        capture: Arc<dyn MediaCapture>,
        cue: CueController,
        autoclear: Duration,
    ) -> Self {
        Self {
            supported,
            query,
            capture,
            cue,
            autoclear,
        }
    }

    /// Run the permission check. Never retries beyond the single prompt
    /// attempt; callers re-invoke if they want another try.
    ///
    /// `auto_clear_cue` controls whether a refusal cue is scheduled to
    /// clear itself; the listen path passes `false` because its own
    /// teardown clears the cue.
    pub async fn check(&self, auto_clear_cue: bool) -> bool {
        if !self.supported {
            self.refuse("Speech engines are not available.", auto_clear_cue);
            return false;
        }

        let Some(query) = &self.query else {
            // No query capability: a trial acquisition is the only way to
            // find out. The granted stream is released immediately.
            return match self.capture.request_stream().await {
                Ok(stream) => {
                    drop(stream);
                    true
                }
                Err(err) => {
                    debug!("trial microphone acquisition failed: {err}");
                    self.refuse("Microphone access denied.", auto_clear_cue);
                    false
                }
            };
        };

        match query.query_microphone().await {
            PermissionState::Granted => true,
            PermissionState::Denied => {
                self.refuse("No microphone access", auto_clear_cue);
                false
            }
            PermissionState::Prompting => {
                self.cue.show("Grant microphone access", CueKind::Neutral);
                match self.capture.request_stream().await {
                    Ok(stream) => {
                        drop(stream);
                        self.cue.clear();
                        true
                    }
                    Err(err) => {
                        debug!("prompted microphone acquisition failed: {err}");
                        self.refuse("Microphone access error", auto_clear_cue);
                        false
                    }
                }
            }
        }
    }

    fn refuse(&self, message: &str, auto_clear_cue: bool) {
        self.cue.show(message, CueKind::Error);
        if auto_clear_cue {
            self.cue.schedule_auto_clear(self.autoclear);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureStream;
    use crate::error::CaptureError;
    use tokio::sync::oneshot;

    struct FakeCapture {
        grant: bool,
    }

    #[async_trait]
    impl MediaCapture for FakeCapture {
        async fn request_stream(&self) -> Result<CaptureStream, CaptureError> {
            if self.grant {
                let (tx, _rx) = oneshot::channel();
                Ok(CaptureStream::from_stop_handle(tx))
            } else {
                Err(CaptureError::NoDevice)
            }
        }
    }

    struct FakeQuery {
        state: PermissionState,
    }

    #[async_trait]
    impl PermissionQuery for FakeQuery {
        async fn query_microphone(&self) -> PermissionState {
            self.state
        }
    }

    fn make_gate(
        supported: bool,
        query: Option<PermissionState>,
        grant_capture: bool,
        cue: CueController,
    ) -> PermissionGate {
        PermissionGate::new(
            supported,
            query.map(|state| Arc::new(FakeQuery { state }) as Arc<dyn PermissionQuery>),
            Arc::new(FakeCapture {
                grant: grant_capture,
            }),
            cue,
            Duration::from_millis(5000),
        )
    }

    #[tokio::test]
    async fn test_unsupported_shows_error_cue() {
        let cue = CueController::new();
        let gate = make_gate(false, Some(PermissionState::Granted), true, cue.clone());
        assert!(!gate.check(true).await);
        let state = cue.current();
        assert!(state.visible);
        assert_eq!(state.kind, CueKind::Error);
    }

    #[tokio::test]
    async fn test_granted_is_silent() {
        let cue = CueController::new();
        let gate = make_gate(true, Some(PermissionState::Granted), true, cue.clone());
        assert!(gate.check(true).await);
        assert!(!cue.current().visible);
    }

    #[tokio::test]
    async fn test_denied_refuses_with_cue() {
        let cue = CueController::new();
        let gate = make_gate(true, Some(PermissionState::Denied), true, cue.clone());
        assert!(!gate.check(false).await);
        let state = cue.current();
        assert!(state.visible);
        assert_eq!(state.message, "No microphone access");
    }

    #[tokio::test]
    async fn test_prompt_success_clears_cue() {
        let cue = CueController::new();
        let gate = make_gate(true, Some(PermissionState::Prompting), true, cue.clone());
        assert!(gate.check(true).await);
        assert!(!cue.current().visible);
    }

    #[tokio::test]
    async fn test_prompt_failure_refuses() {
        let cue = CueController::new();
        let gate = make_gate(true, Some(PermissionState::Prompting), false, cue.clone());
        assert!(!gate.check(false).await);
        assert_eq!(cue.current().message, "Microphone access error");
    }

    #[tokio::test]
    async fn test_no_query_falls_back_to_trial_acquisition() {
        let cue = CueController::new();
        let gate = make_gate(true, None, true, cue.clone());
        assert!(gate.check(true).await);
        assert!(!cue.current().visible);

        let gate = make_gate(true, None, false, cue.clone());
        assert!(!gate.check(false).await);
        assert_eq!(cue.current().message, "Microphone access denied.");
    }
}
