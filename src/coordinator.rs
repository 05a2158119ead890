use crate::backends::cpal_capture::CpalCapture;
use crate::capture::MediaCapture;
use crate::config::CoordinatorConfig;
use crate::cue::{CueController, CueState};
use crate::error::SpeechError;
use crate::lock::TurnLock;
use crate::permission::{PermissionGate, PermissionQuery};
use crate::recognition::{
    ListenRequest, RecognitionEngine, RecognitionOutcome, RecognitionSupervisor,
};
use crate::synthesis::{SpeakRequest, SynthesisAdapter, SynthesisEngine};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Coordinates turn-taking access to speech output and recognition input.
///
/// One instance owns the process-wide singletons the original design kept
/// as static state: the turn lock, the status cue, the permission gate and
/// the synthesis warm-up flag. Construct it once with
/// [`SpeechCoordinator::builder`] and share it.
///
/// The two public operations are serialized FIFO: for any interleaving of
/// concurrent `speak`/`listen` calls, they run strictly one at a time in
/// the order they were issued.
pub struct SpeechCoordinator {
    supported: bool,
    cue: CueController,
    synthesis: SynthesisAdapter,
    recognition: RecognitionSupervisor,
}

impl SpeechCoordinator {
    pub fn builder() -> SpeechCoordinatorBuilder {
        SpeechCoordinatorBuilder::default()
    }

    /// Whether both speech engines are available. Consumers use this to
    /// decide between the speech UI and a fallback rendering.
    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// Receiver over the status cue for the presentation layer.
    pub fn cue_updates(&self) -> watch::Receiver<CueState> {
        self.cue.subscribe()
    }

    /// Render one utterance. Completes when the engine reports the end of
    /// the utterance; engine failures propagate as
    /// [`SpeechError::Synthesis`]. The turn lock is released on every
    /// path.
    pub async fn speak(&self, req: SpeakRequest) -> Result<(), SpeechError> {
        self.speak_cancellable(req, CancellationToken::new()).await
    }

    /// Like [`speak`](Self::speak), but honors `cancel` at every
    /// suspension point once the lock is held.
    pub async fn speak_cancellable(
        &self,
        req: SpeakRequest,
        cancel: CancellationToken,
    ) -> Result<(), SpeechError> {
        self.synthesis.speak(&req, &cancel).await
    }

    /// Run one continuous listen session until a trigger phrase matches
    /// or the timeout fires. Never fails: capability and permission
    /// problems surface on the cue and the call still resolves.
    pub async fn listen(&self, req: ListenRequest) -> RecognitionOutcome {
        self.listen_cancellable(req, CancellationToken::new()).await
    }

    /// Like [`listen`](Self::listen), but a fired `cancel` finalizes
    /// immediately under the timeout rules, skipping the grace period.
    pub async fn listen_cancellable(
        &self,
        req: ListenRequest,
        cancel: CancellationToken,
    ) -> RecognitionOutcome {
        self.recognition.listen(&req, &cancel).await
    }
}

/// Wires engines and platform capabilities into a [`SpeechCoordinator`].
///
/// Both engines are optional: without a synthesis engine `speak` resolves
/// to [`SpeechError::CapabilityUnsupported`], without a recognition engine
/// `listen` runs its timer-only path to a no-input outcome. The media
/// capture seam defaults to the cpal-backed implementation.
#[derive(Default)]
pub struct SpeechCoordinatorBuilder {
    config: Option<CoordinatorConfig>,
    synthesis: Option<Arc<dyn SynthesisEngine>>,
    recognition: Option<Arc<dyn RecognitionEngine>>,
    capture: Option<Arc<dyn MediaCapture>>,
    permission: Option<Arc<dyn PermissionQuery>>,
}

impl SpeechCoordinatorBuilder {
    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn synthesis_engine(mut self, engine: Arc<dyn SynthesisEngine>) -> Self {
        self.synthesis = Some(engine);
        self
    }

    pub fn recognition_engine(mut self, engine: Arc<dyn RecognitionEngine>) -> Self {
        self.recognition = Some(engine);
        self
    }

    pub fn media_capture(mut self, capture: Arc<dyn MediaCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn permission_query(mut self, query: Arc<dyn PermissionQuery>) -> Self {
        self.permission = Some(query);
        self
    }

    pub fn build(self) -> SpeechCoordinator {
        let config = self.config.unwrap_or_default();
        let supported = self.synthesis.is_some() && self.recognition.is_some();

        let lock = TurnLock::new();
        let cue = CueController::new();
        let capture = self
            .capture
            .unwrap_or_else(|| Arc::new(CpalCapture::new()));

        let gate = PermissionGate::new(
            supported,
            self.permission,
            capture,
            cue.clone(),
            config.cue_autoclear(),
        );

        let synthesis = SynthesisAdapter::new(
            self.synthesis,
            Arc::clone(&lock),
            cue.clone(),
            config.warmup_volume,
            config.cue_autoclear(),
        );

        let recognition = RecognitionSupervisor::new(
            self.recognition,
            Arc::clone(&lock),
            gate,
            cue.clone(),
            config.grace_period(),
            config.progress_tick(),
            config.error_policy,
        );

        SpeechCoordinator {
            supported,
            cue,
            synthesis,
            recognition,
        }
    }
}
