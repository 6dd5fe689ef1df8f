//! Landmark detector seam.
//!
//! The face mesh model itself lives outside this workspace. Anything that can
//! turn a frame into zero or one landmark list plugs in here.

use crate::types::Landmark;
use image::RgbaImage;

/// Produces the landmark list of the first detected face, if any.
pub trait LandmarkDetector {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Detect landmarks on an unmirrored camera frame.
    ///
    /// Only the first face is ever reported; `Ok(None)` means no face.
    fn detect(&mut self, frame: &RgbaImage) -> Result<Option<Vec<Landmark>>, Self::Error>;
}

/// Detector that always reports the same result. Useful for fixtures and
/// diagnostics where the landmark source is known ahead of time.
#[derive(Debug, Clone, Default)]
pub struct FixedDetector {
    landmarks: Option<Vec<Landmark>>,
}

impl FixedDetector {
    pub fn new(landmarks: Option<Vec<Landmark>>) -> Self {
        Self { landmarks }
    }
}

impl LandmarkDetector for FixedDetector {
    type Error = std::convert::Infallible;

    fn detect(&mut self, _frame: &RgbaImage) -> Result<Option<Vec<Landmark>>, Self::Error> {
        Ok(self.landmarks.clone())
    }
}
