use crate::config::ErrorPolicy;
use crate::cue::{CueController, CueKind};
use crate::lock::TurnLock;
use crate::permission::PermissionGate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One recognized unit of speech, carrying its alternative transcriptions
/// in rank order (best first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub alternatives: Vec<String>,
}

impl Segment {
    pub fn new<I, S>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            alternatives: alternatives.into_iter().map(Into::into).collect(),
        }
    }
}

/// Events a continuous recognition session may emit.
#[derive(Debug, Clone)]
pub enum RecognitionEvent {
    /// Newly recognized segments, in arrival order.
    Result(Vec<Segment>),
    /// The session ended on its own. Continuous engines do this on
    /// silence or minor hiccups; the supervisor restarts transparently.
    Ended,
    /// Engine-reported error. Non-fatal by default, see [`ErrorPolicy`].
    Error(String),
}

/// A running continuous recognition session.
///
/// Events arrive over the channel handed to [`RecognitionSession::new`].
/// Stopping (or dropping) the session signals the engine to tear down and
/// in particular not to emit any further `Ended` events.
pub struct RecognitionSession {
    events: mpsc::Receiver<RecognitionEvent>,
    stop: Option<oneshot::Sender<()>>,
}

impl RecognitionSession {
    pub fn new(events: mpsc::Receiver<RecognitionEvent>, stop: oneshot::Sender<()>) -> Self {
        Self {
            events,
            stop: Some(stop),
        }
    }

    pub(crate) async fn next_event(&mut self) -> Option<RecognitionEvent> {
        self.events.recv().await
    }

    pub(crate) fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl Drop for RecognitionSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Continuous speech-recognition engine seam.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Start a fresh continuous session for `lang`. Starting must not
    /// fail; an unhealthy engine reports through the session's events.
    async fn start(&self, lang: &str) -> RecognitionSession;
}

/// One listen operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenRequest {
    /// Phrases whose case-insensitive presence in any recognized
    /// alternative ends the session successfully.
    pub trigger_phrases: Vec<String>,
    pub lang: String,
    pub timeout: Duration,
}

impl ListenRequest {
    pub fn new<I, S>(trigger_phrases: I, lang: impl Into<String>, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            trigger_phrases: trigger_phrases.into_iter().map(Into::into).collect(),
            lang: lang.into(),
            timeout,
        }
    }
}

/// How a listen call ended.
///
/// `success` is `None` when the session ran to timeout without a single
/// recognized result, `Some(false)` when results arrived but no trigger
/// matched, `Some(true)` when a trigger matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionOutcome {
    pub success: Option<bool>,
    pub transcript: String,
}

/// Runs one listen operation under the turn lock: permission check,
/// continuous session with transparent restarts, trigger detection and
/// timeout-based finalization.
pub(crate) struct RecognitionSupervisor {
    engine: Option<Arc<dyn RecognitionEngine>>,
    lock: Arc<TurnLock>,
    gate: PermissionGate,
    cue: CueController,
    grace_period: Duration,
    progress_tick: Duration,
    error_policy: ErrorPolicy,
}

impl RecognitionSupervisor {
    pub fn new(
        engine: Option<Arc<dyn RecognitionEngine>>,
        lock: Arc<TurnLock>,
        gate: PermissionGate,
        cue: CueController,
        grace_period: Duration,
        progress_tick: Duration,
        error_policy: ErrorPolicy,
    ) -> Self {
        Self {
            engine,
            lock,
            gate,
            cue,
            grace_period,
            progress_tick,
            error_policy,
        }
    }

    /// Listen never fails: capability and permission refusals surface as
    /// cues and the call still resolves with an outcome.
    pub async fn listen(
        &self,
        req: &ListenRequest,
        cancel: &CancellationToken,
    ) -> RecognitionOutcome {
        let triggers: Vec<String> = req
            .trigger_phrases
            .iter()
            .map(|phrase| phrase.to_lowercase())
            .filter(|phrase| !phrase.is_empty())
            .collect();

        let _guard = self.lock.acquire().await;

        // Acquiring: the denial cue is left in place (no auto-clear) so it
        // stays readable until this call's own teardown clears it.
        let granted = self.gate.check(false).await;
        if granted {
            self.cue.show("Listening…", CueKind::Neutral);
        }

        // The session is started regardless of the gate verdict: a denied
        // engine simply never produces results, and the call resolves at
        // timeout exactly as if nothing had been heard.
        let mut session = match &self.engine {
            Some(engine) => Some(engine.start(&req.lang).await),
            None => None,
        };

        let started = Instant::now();
        let deadline = tokio::time::sleep(req.timeout);
        tokio::pin!(deadline);
        let mut tick = tokio::time::interval(self.progress_tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut segments: Vec<Segment> = Vec::new();
        let mut transcript = String::new();
        let mut detections: u32 = 0;
        let mut skip_grace = false;

        let success = loop {
            tokio::select! {
                _ = &mut deadline => {
                    debug!(detections, "listen timed out");
                    break timeout_outcome(detections);
                }
                _ = tick.tick() => {
                    let fraction =
                        started.elapsed().as_secs_f32() / req.timeout.as_secs_f32();
                    self.cue.set_progress(fraction.min(1.0));
                }
                _ = cancel.cancelled() => {
                    debug!("listen cancelled");
                    skip_grace = true;
                    break timeout_outcome(detections);
                }
                event = next_session_event(&mut session) => {
                    match event {
                        Some(RecognitionEvent::Result(new_segments)) => {
                            detections += 1;
                            for segment in &new_segments {
                                let best = segment
                                    .alternatives
                                    .first()
                                    .filter(|alt| !alt.is_empty());
                                if let Some(best) = best {
                                    if !transcript.is_empty() {
                                        transcript.push(' ');
                                    }
                                    transcript.push_str(best);
                                }
                            }
                            segments.extend(new_segments);

                            let pool = alternative_pool(&segments);
                            if triggers.iter().any(|trigger| pool.contains(trigger)) {
                                debug!("trigger phrase matched");
                                break Some(true);
                            }
                        }
                        Some(RecognitionEvent::Ended) | None => {
                            // Continuous sessions self-terminate on silence;
                            // restart so the caller never observes it. The
                            // loop itself is the finalizing guard: once we
                            // break, no restart can happen.
                            debug!("recognition session ended early, restarting");
                            session = match &self.engine {
                                Some(engine) => Some(engine.start(&req.lang).await),
                                None => None,
                            };
                        }
                        Some(RecognitionEvent::Error(reason)) => match self.error_policy {
                            ErrorPolicy::Ignore => {}
                            ErrorPolicy::Log => {
                                warn!("recognition error: {reason}");
                            }
                            ErrorPolicy::Surface => {
                                warn!("recognition error, finalizing: {reason}");
                                break timeout_outcome(detections);
                            }
                        },
                    }
                }
            }
        };

        // Finalizing: stop the session before showing the result so it
        // cannot restart behind our back.
        if let Some(mut session) = session.take() {
            session.stop();
        }

        let (message, kind) = match success {
            Some(true) => ("Success!", CueKind::Success),
            Some(false) => ("Failed", CueKind::Error),
            None => ("No input", CueKind::Error),
        };
        self.cue.show(message, kind);

        if !skip_grace {
            // Hold the result cue so the user can read it; the lock stays
            // held for the whole grace period.
            tokio::select! {
                _ = tokio::time::sleep(self.grace_period) => {}
                _ = cancel.cancelled() => {}
            }
        }

        self.cue.set_progress(0.0);
        self.cue.clear();
        RecognitionOutcome {
            success,
            transcript,
        }
    }
}

fn timeout_outcome(detections: u32) -> Option<bool> {
    if detections > 0 {
        Some(false)
    } else {
        None
    }
}

async fn next_session_event(
    session: &mut Option<RecognitionSession>,
) -> Option<RecognitionEvent> {
    match session {
        Some(session) => session.next_event().await,
        None => std::future::pending().await,
    }
}

/// Every alternative of every segment seen so far, space-joined and
/// case-folded. Triggers match by substring containment against this
/// pool, so a phrase may span adjacent alternatives.
fn alternative_pool(segments: &[Segment]) -> String {
    let mut pool = String::new();
    for segment in segments {
        for alternative in &segment.alternatives {
            if alternative.is_empty() {
                continue;
            }
            if !pool.is_empty() {
                pool.push(' ');
            }
            pool.push_str(alternative);
        }
    }
    pool.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pool_flattens_all_alternatives_in_order() {
        let segments = vec![
            Segment::new(["Please stop", "police top"]),
            Segment::new(["now"]),
        ];
        assert_eq!(alternative_pool(&segments), "please stop police top now");
    }

    #[test]
    fn test_pool_skips_empty_alternatives() {
        let segments = vec![Segment::new(["", "yes"]), Segment::new([""])];
        assert_eq!(alternative_pool(&segments), "yes");
    }

    #[test]
    fn test_trigger_can_span_segments() {
        let segments = vec![Segment::new(["please"]), Segment::new(["stop now"])];
        let pool = alternative_pool(&segments);
        assert!(pool.contains("please stop"));
    }

    proptest! {
        #[test]
        fn prop_matching_is_case_insensitive(text in "[a-zA-Z ]{1,40}") {
            let segments = vec![Segment::new([text.clone()])];
            let pool = alternative_pool(&segments);
            prop_assert_eq!(&pool, &text.to_lowercase());
            // Any casing of the trigger matches after folding.
            let shouting = text.to_uppercase().to_lowercase();
            prop_assert!(pool.contains(&shouting));
        }
    }
}
