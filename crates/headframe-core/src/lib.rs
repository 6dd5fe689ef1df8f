//! headframe-core — Per-frame decisions for guided head photo capture.
//!
//! Turns face mesh landmarks into surface-space face points, checks them
//! against the current step's oval, samples lighting, and words the status
//! line shown to the subject.

pub mod detector;
pub mod evaluate;
pub mod frame;
pub mod geometry;
pub mod landmarks;
pub mod lighting;
pub mod status;
pub mod types;

pub use detector::LandmarkDetector;
pub use evaluate::{evaluate_frame, FrameEvaluation};
pub use frame::{render_surface, Frame, FrameError, SurfaceSize};
pub use types::{CaptureStep, FacePoint, FacePoints, Landmark, OvalTarget, ValidationVerdict};
