//! Turn-taking coordinator for mutually exclusive speech capabilities.
//!
//! Interactive applications that alternate between "say something" and
//! "listen for something" phases must never let text-to-speech output and
//! continuous speech recognition overlap. This crate provides the
//! coordinator that guarantees it: a FIFO turn lock over the two
//! operations, a permission-acquisition gate with user-visible feedback,
//! a transient status cue, and a recognition supervisor that keeps a
//! self-terminating continuous session alive until a trigger phrase
//! matches or a timeout fires.
//!
//! The speech engines themselves are external collaborators behind the
//! [`SynthesisEngine`] and [`RecognitionEngine`] seams; `backends` ships
//! the implementations a desktop deployment typically wires in.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use voiceturn::{ListenRequest, SpeakRequest, SpeechCoordinator};
//! use voiceturn::backends::espeak::EspeakSynthesis;
//!
//! # async fn run(recognizer: Arc<dyn voiceturn::RecognitionEngine>) {
//! let coordinator = SpeechCoordinator::builder()
//!     .synthesis_engine(Arc::new(EspeakSynthesis::new()))
//!     .recognition_engine(recognizer)
//!     .build();
//!
//! coordinator
//!     .speak(SpeakRequest::new("Say stop when you see it.", "en-US"))
//!     .await
//!     .ok();
//! let outcome = coordinator
//!     .listen(ListenRequest::new(["stop"], "en-US", Duration::from_secs(10)))
//!     .await;
//! println!("heard: {}", outcome.transcript);
//! # }
//! ```

pub mod backends;
pub mod capture;
pub mod config;
pub mod coordinator;
pub mod cue;
pub mod error;
pub mod lock;
pub mod permission;
pub mod recognition;
pub mod synthesis;

pub use capture::{CaptureStream, MediaCapture};
pub use config::{CoordinatorConfig, ErrorPolicy};
pub use coordinator::{SpeechCoordinator, SpeechCoordinatorBuilder};
pub use cue::{CueController, CueKind, CueState};
pub use error::{CaptureError, SpeechError};
pub use lock::{TurnGuard, TurnLock};
pub use permission::{PermissionQuery, PermissionState};
pub use recognition::{
    ListenRequest, RecognitionEngine, RecognitionEvent, RecognitionOutcome, RecognitionSession,
    Segment,
};
pub use synthesis::{SpeakRequest, SynthesisEngine};
