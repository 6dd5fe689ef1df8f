use serde::{Deserialize, Serialize};

/// One normalized landmark as emitted by the face mesh detector.
///
/// `x` and `y` are in `[0, 1]` relative to the source frame; `z` is the
/// detector's relative depth and is carried but never read here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// A 2D coordinate in surface pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FacePoint {
    pub x: f64,
    pub y: f64,
}

impl FacePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Domain points for a single face, in mirrored surface pixels.
///
/// Built fresh for every frame and dropped once that frame's verdict is made.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FacePoints {
    pub forehead: FacePoint,
    pub chin: FacePoint,
    pub left_cheek: FacePoint,
    pub right_cheek: FacePoint,
    /// Estimated, not measured: the mesh has no scalp landmark.
    pub top_of_head: FacePoint,
    pub center: FacePoint,
    pub width: f64,
    pub height: f64,
}

impl FacePoints {
    /// The four measured points, in forehead/chin/left/right order.
    pub fn measured(&self) -> [FacePoint; 4] {
        [self.forehead, self.chin, self.left_cheek, self.right_cheek]
    }
}

/// Which of the two shots is being taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStep {
    Face,
    Top,
}

impl CaptureStep {
    pub fn as_str(self) -> &'static str {
        match self {
            CaptureStep::Face => "face",
            CaptureStep::Top => "top",
        }
    }
}

impl std::fmt::Display for CaptureStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CaptureStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "face" | "front" => Ok(CaptureStep::Face),
            "top" => Ok(CaptureStep::Top),
            other => Err(format!("unknown capture step: {other} (expected face or top)")),
        }
    }
}

/// Acceptance region drawn for the current step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OvalTarget {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

impl OvalTarget {
    /// Axis-aligned bounding box as `(x, y, width, height)`.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        (
            self.center_x - self.width / 2.0,
            self.center_y - self.height / 2.0,
            self.width,
            self.height,
        )
    }
}

/// Per-frame verdict fed to the sequencer. Carries no history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub has_face: bool,
    pub valid_position: bool,
    pub lighting_good: bool,
}

impl ValidationVerdict {
    /// Verdict for a frame without a usable face.
    pub fn no_face() -> Self {
        Self::default()
    }

    /// True when the frame may start or sustain a capture.
    pub fn is_ready(&self) -> bool {
        self.has_face && self.valid_position && self.lighting_good
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_order() {
        assert!(CaptureStep::Face < CaptureStep::Top);
        assert_eq!(CaptureStep::Top.to_string(), "top");
    }

    #[test]
    fn test_step_parse() {
        assert_eq!("face".parse::<CaptureStep>().unwrap(), CaptureStep::Face);
        assert_eq!("TOP".parse::<CaptureStep>().unwrap(), CaptureStep::Top);
        assert!("side".parse::<CaptureStep>().is_err());
    }

    #[test]
    fn test_step_serde_lowercase() {
        let json = serde_json::to_string(&CaptureStep::Top).unwrap();
        assert_eq!(json, "\"top\"");
    }

    #[test]
    fn test_oval_bounds() {
        let oval = OvalTarget { center_x: 320.0, center_y: 100.0, width: 240.0, height: 180.0 };
        assert_eq!(oval.bounds(), (200.0, 10.0, 240.0, 180.0));
    }

    #[test]
    fn test_verdict_ready() {
        assert!(!ValidationVerdict::no_face().is_ready());
        let v = ValidationVerdict { has_face: true, valid_position: true, lighting_good: false };
        assert!(!v.is_ready());
        let v = ValidationVerdict { lighting_good: true, ..v };
        assert!(v.is_ready());
    }
}
