use crate::synthesis::SynthesisEngine;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::debug;

const WAIT_POLL: Duration = Duration::from_millis(50);

/// `SynthesisEngine` over the `espeak-ng` command line tool.
///
/// The language tag maps to an espeak voice (`en-US` → `-v en-us`) and the
/// `[0, 1]` volume to espeak's 0–200 amplitude scale. One utterance runs
/// at a time; `cancel_current` kills the child process.
pub struct EspeakSynthesis {
    binary: String,
    current: Mutex<Option<Child>>,
}

impl EspeakSynthesis {
    pub fn new() -> Self {
        Self::with_binary("espeak-ng")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            current: Mutex::new(None),
        }
    }
}

impl Default for EspeakSynthesis {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SynthesisEngine for EspeakSynthesis {
    async fn speak(&self, text: &str, lang: &str, volume: f32) -> Result<(), String> {
        let amplitude = (volume.clamp(0.0, 1.0) * 200.0).round() as i64;
        let voice = lang.to_ascii_lowercase();

        debug!("espeak-ng: voice={voice} amplitude={amplitude}");
        let child = Command::new(&self.binary)
            .arg("-v")
            .arg(&voice)
            .arg("-a")
            .arg(amplitude.to_string())
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| format!("failed to spawn {}: {err}", self.binary))?;

        *self.current.lock().unwrap() = Some(child);

        // The child sits behind the mutex so cancel_current can reach it;
        // poll instead of holding the lock across an await.
        loop {
            {
                let mut slot = self.current.lock().unwrap();
                match slot.as_mut() {
                    Some(child) => match child.try_wait() {
                        Ok(Some(status)) => {
                            *slot = None;
                            return if status.success() {
                                Ok(())
                            } else {
                                Err(format!("{} exited with {status}", self.binary))
                            };
                        }
                        Ok(None) => {}
                        Err(err) => {
                            *slot = None;
                            return Err(err.to_string());
                        }
                    },
                    None => return Err("utterance cancelled".to_string()),
                }
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    fn cancel_current(&self) {
        let mut slot = self.current.lock().unwrap();
        if let Some(child) = slot.as_mut() {
            let _ = child.start_kill();
        }
        *slot = None;
    }

    fn is_speaking(&self) -> bool {
        self.current
            .lock()
            .unwrap()
            .as_mut()
            .map(|child| matches!(child.try_wait(), Ok(None)))
            .unwrap_or(false)
    }
}
