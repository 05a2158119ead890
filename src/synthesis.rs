use crate::cue::{CueController, CueKind};
use crate::error::SpeechError;
use crate::lock::TurnLock;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Text-to-speech engine seam.
///
/// `speak` resolves on the engine's terminal event for the utterance:
/// `Ok` for a normal end, `Err` carrying the engine's reason otherwise.
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    async fn speak(&self, text: &str, lang: &str, volume: f32) -> Result<(), String>;

    /// Abort whatever the engine is currently rendering, if anything.
    fn cancel_current(&self);

    fn is_speaking(&self) -> bool;
}

/// One utterance to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
    pub lang: String,
    /// Playback volume in `[0, 1]`.
    pub volume: f32,
}

impl SpeakRequest {
    pub fn new(text: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            lang: lang.into(),
            volume: 1.0,
        }
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }
}

/// Runs one speak operation under the turn lock, driving the cue.
pub(crate) struct SynthesisAdapter {
    engine: Option<Arc<dyn SynthesisEngine>>,
    lock: Arc<TurnLock>,
    cue: CueController,
    warmed_up: AtomicBool,
    warmup_volume: f32,
    cue_autoclear: Duration,
}

impl SynthesisAdapter {
    pub fn new(
        engine: Option<Arc<dyn SynthesisEngine>>,
        lock: Arc<TurnLock>,
        cue: CueController,
        warmup_volume: f32,
        cue_autoclear: Duration,
    ) -> Self {
        Self {
            engine,
            lock,
            cue,
            warmed_up: AtomicBool::new(false),
            warmup_volume,
            cue_autoclear,
        }
    }

    pub async fn speak(
        &self,
        req: &SpeakRequest,
        cancel: &CancellationToken,
    ) -> Result<(), SpeechError> {
        let Some(engine) = &self.engine else {
            self.cue
                .show("Speech engines are not available.", CueKind::Error);
            self.cue.schedule_auto_clear(self.cue_autoclear);
            return Err(SpeechError::CapabilityUnsupported);
        };

        let guard = self.lock.acquire().await;
        if cancel.is_cancelled() {
            return Err(SpeechError::Cancelled);
        }
        self.cue.show("Speaking…", CueKind::Neutral);

        // First utterance of the process primes the engine; cold starts
        // clip the opening of the real output otherwise.
        if !self.warmed_up.swap(true, Ordering::SeqCst) {
            debug!("issuing synthesis warm-up utterance");
            let _ = engine.speak(" ", &req.lang, self.warmup_volume).await;
        }

        if engine.is_speaking() {
            engine.cancel_current();
        }

        let result = tokio::select! {
            res = engine.speak(&req.text, &req.lang, req.volume) => {
                res.map_err(SpeechError::Synthesis)
            }
            _ = cancel.cancelled() => {
                engine.cancel_current();
                Err(SpeechError::Cancelled)
            }
        };

        self.cue.clear();
        drop(guard);
        result
    }
}
