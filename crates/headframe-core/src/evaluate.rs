//! Per-frame evaluation: landmarks + rendered surface → verdict.

use crate::geometry;
use crate::landmarks::extract_face_points;
use crate::lighting;
use crate::types::{CaptureStep, FacePoints, Landmark, OvalTarget, ValidationVerdict};
use image::RgbaImage;

/// Everything decided about one frame for one step.
#[derive(Debug, Clone)]
pub struct FrameEvaluation {
    pub verdict: ValidationVerdict,
    pub oval: OvalTarget,
    /// Present only when the frame had a usable face.
    pub points: Option<FacePoints>,
}

/// Evaluate a rendered surface against the given step.
///
/// `landmarks` is the first face's list, or `None` when the detector saw no
/// face. Missing required indices are treated as no face.
pub fn evaluate_frame(
    step: CaptureStep,
    surface: &RgbaImage,
    landmarks: Option<&[Landmark]>,
) -> FrameEvaluation {
    let (width, height) = surface.dimensions();
    let oval = OvalTarget::for_step(step, width, height);

    let Some(points) = landmarks.and_then(|lms| extract_face_points(lms, width, height)) else {
        return FrameEvaluation {
            verdict: ValidationVerdict::no_face(),
            oval,
            points: None,
        };
    };

    let verdict = ValidationVerdict {
        has_face: true,
        valid_position: geometry::validate(step, &points, &oval, width, height),
        lighting_good: lighting::check_lighting(surface, step, &points, &oval),
    };

    tracing::debug!(
        step = %step,
        valid_position = verdict.valid_position,
        lighting_good = verdict.lighting_good,
        "frame evaluated"
    );

    FrameEvaluation {
        verdict,
        oval,
        points: Some(points),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::sparse_landmarks;
    use image::Rgba;

    /// A face centered in the Face oval at 640×480, 240px wide.
    fn centered_face() -> Vec<Landmark> {
        // Surface center (320, 260) → normalized (0.5, 0.5417); mirrored x is symmetric.
        sparse_landmarks(
            Landmark::new(0.5, 110.0 / 480.0),
            Landmark::new(0.5, 410.0 / 480.0),
            Landmark::new(0.5 - 120.0 / 640.0, 260.0 / 480.0),
            Landmark::new(0.5 + 120.0 / 640.0, 260.0 / 480.0),
        )
    }

    #[test]
    fn test_valid_face_frame() {
        let surface = RgbaImage::from_pixel(640, 480, Rgba([128, 128, 128, 255]));
        let lms = centered_face();
        let eval = evaluate_frame(CaptureStep::Face, &surface, Some(&lms));
        assert_eq!(
            eval.verdict,
            ValidationVerdict { has_face: true, valid_position: true, lighting_good: true }
        );
        assert!(eval.points.is_some());
    }

    #[test]
    fn test_dark_frame_fails_lighting_only() {
        let surface = RgbaImage::from_pixel(640, 480, Rgba([20, 20, 20, 255]));
        let lms = centered_face();
        let eval = evaluate_frame(CaptureStep::Face, &surface, Some(&lms));
        assert!(eval.verdict.has_face);
        assert!(eval.verdict.valid_position);
        assert!(!eval.verdict.lighting_good);
    }

    #[test]
    fn test_no_face() {
        let surface = RgbaImage::from_pixel(640, 480, Rgba([128, 128, 128, 255]));
        let eval = evaluate_frame(CaptureStep::Top, &surface, None);
        assert_eq!(eval.verdict, ValidationVerdict::no_face());
        assert!(eval.points.is_none());
        assert_eq!(eval.oval.center_y, 100.0);
    }

    #[test]
    fn test_truncated_landmarks_count_as_no_face() {
        let surface = RgbaImage::from_pixel(640, 480, Rgba([128, 128, 128, 255]));
        let lms = vec![Landmark::new(0.5, 0.5); 300];
        let eval = evaluate_frame(CaptureStep::Face, &surface, Some(&lms));
        assert!(!eval.verdict.has_face);
    }
}
