//! headframe-capture — Timed two-shot capture driven by per-frame verdicts.
//!
//! The sequencer is a pure reducer over frame and timer events; the session
//! runs it on a tokio task with real timers and hands back the committed
//! front and top images.

pub mod sequencer;
pub mod session;
mod timers;

pub use sequencer::{CapturedPair, SequencerPhase};
pub use session::{
    CaptureSession, CapturedImages, Completion, Progress, SessionConfig, SessionError, Submission,
};
