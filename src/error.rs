use thiserror::Error;

/// Failures surfaced by the coordinator's public operations.
///
/// Only `speak` ever returns these; `listen` resolves with an outcome on
/// every path and reports its problems through the status cue instead.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech engines are not available on this system")]
    CapabilityUnsupported,

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Failures from the microphone capture seam used for permission probes.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no audio input device available")]
    NoDevice,

    #[error("failed to open input stream: {0}")]
    Stream(String),
}
