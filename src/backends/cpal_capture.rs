use crate::capture::{CaptureStream, MediaCapture};
use crate::error::CaptureError;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::thread;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// `MediaCapture` over the default cpal input device.
///
/// cpal streams are not `Send`, so each acquisition runs on a dedicated
/// thread that owns the stream for its whole lifetime. Dropping the
/// returned [`CaptureStream`] makes that thread tear the stream down.
pub struct CpalCapture;

impl CpalCapture {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpalCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaCapture for CpalCapture {
    async fn request_stream(&self) -> Result<CaptureStream, CaptureError> {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), CaptureError>>();

        thread::spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_input_device() {
                Some(device) => device,
                None => {
                    let _ = ready_tx.send(Err(CaptureError::NoDevice));
                    return;
                }
            };
            debug!(
                "opening input device: {}",
                device.name().unwrap_or("Unknown".into())
            );

            let config = match device.default_input_config() {
                Ok(config) => config,
                Err(err) => {
                    let _ = ready_tx.send(Err(CaptureError::Stream(err.to_string())));
                    return;
                }
            };

            let err_fn = |err: cpal::StreamError| {
                warn!("an error occurred on stream: {err}");
            };

            // Samples are discarded: the stream exists only to hold the
            // device open while the permission probe needs it.
            let stream = match config.sample_format() {
                cpal::SampleFormat::F32 => device.build_input_stream(
                    &config.clone().into(),
                    move |_data: &[f32], _: &cpal::InputCallbackInfo| {},
                    err_fn,
                    None,
                ),
                cpal::SampleFormat::I16 => device.build_input_stream(
                    &config.clone().into(),
                    move |_data: &[i16], _: &cpal::InputCallbackInfo| {},
                    err_fn,
                    None,
                ),
                other => {
                    let _ = ready_tx.send(Err(CaptureError::Stream(format!(
                        "unsupported sample format: {other:?}"
                    ))));
                    return;
                }
            };

            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = ready_tx.send(Err(CaptureError::Stream(err.to_string())));
                    return;
                }
            };

            if let Err(err) = stream.play() {
                let _ = ready_tx.send(Err(CaptureError::Stream(err.to_string())));
                return;
            }

            let _ = ready_tx.send(Ok(()));
            // Park until the handle is dropped or stopped explicitly.
            let _ = stop_rx.blocking_recv();
            drop(stream);
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(CaptureStream::from_stop_handle(stop_tx)),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(CaptureError::Stream("capture thread exited".to_string())),
        }
    }
}
