use crate::error::CaptureError;
use async_trait::async_trait;
use tokio::sync::oneshot;

/// Microphone acquisition seam used by the permission gate.
///
/// A successful probe hands back a [`CaptureStream`]; dropping it releases
/// the device immediately, which is all the gate ever does with it.
#[async_trait]
pub trait MediaCapture: Send + Sync {
    async fn request_stream(&self) -> Result<CaptureStream, CaptureError>;
}

/// Handle to a live input stream. The device is held for exactly as long
/// as this value is alive.
pub struct CaptureStream {
    _stop: oneshot::Sender<()>,
}

impl CaptureStream {
    /// Wrap a stop handle whose receiving side tears the stream down when
    /// the sender is dropped.
    pub fn from_stop_handle(stop: oneshot::Sender<()>) -> Self {
        Self { _stop: stop }
    }
}
