//! Oval targets and per-step position validation.
//!
//! Both steps measure a normalized elliptical distance from an anchor point
//! to the oval center, with the oval's radii shrunk by margins that scale
//! with the surface size.

use crate::types::{CaptureStep, FacePoint, FacePoints, OvalTarget};

// --- Oval layout ---
const FACE_OVAL_WIDTH: f64 = 240.0;
const FACE_OVAL_HEIGHT: f64 = 320.0;
const FACE_OVAL_OFFSET_Y: f64 = 20.0;
const TOP_OVAL_WIDTH: f64 = 240.0;
const TOP_OVAL_HEIGHT: f64 = 180.0;
const TOP_OVAL_CENTER_Y: f64 = 100.0;

// --- Responsive margins (fractions of surface size) ---
pub const MARGIN_X: f64 = 0.031;
pub const MARGIN_Y: f64 = 0.042;

// --- Acceptance thresholds ---
pub const FACE_DISTANCE: f64 = 0.7;
pub const FACE_SIZE_MIN: f64 = 0.6;
pub const FACE_SIZE_MAX: f64 = 1.2;
pub const TOP_DISTANCE: f64 = 0.8;
pub const HEAD_TILT_THRESHOLD: f64 = 0.063;
pub const FACE_VISIBILITY_THRESHOLD: f64 = 0.104;

impl OvalTarget {
    /// Target oval for `step` on a surface of the given size.
    pub fn for_step(step: CaptureStep, surface_width: u32, surface_height: u32) -> Self {
        let w = surface_width as f64;
        let h = surface_height as f64;
        match step {
            CaptureStep::Face => OvalTarget {
                center_x: w / 2.0,
                center_y: h / 2.0 + FACE_OVAL_OFFSET_Y,
                width: FACE_OVAL_WIDTH,
                height: FACE_OVAL_HEIGHT,
            },
            CaptureStep::Top => OvalTarget {
                center_x: w / 2.0,
                center_y: TOP_OVAL_CENTER_Y,
                width: TOP_OVAL_WIDTH,
                height: TOP_OVAL_HEIGHT,
            },
        }
    }
}

/// `sqrt((dx/rx)² + (dy/ry)²)` from `anchor` to the oval center.
///
/// Returns `None` when a margin swallows a radius entirely.
pub fn elliptical_distance(
    anchor: FacePoint,
    oval: &OvalTarget,
    margin_x: f64,
    margin_y: f64,
) -> Option<f64> {
    let rx = oval.width / 2.0 - margin_x;
    let ry = oval.height / 2.0 - margin_y;
    if rx <= 0.0 || ry <= 0.0 {
        return None;
    }
    let dx = anchor.x - oval.center_x;
    let dy = anchor.y - oval.center_y;
    Some(((dx * dx) / (rx * rx) + (dy * dy) / (ry * ry)).sqrt())
}

/// Decide whether `points` satisfies the acceptance criteria for `step`.
pub fn validate(
    step: CaptureStep,
    points: &FacePoints,
    oval: &OvalTarget,
    surface_width: u32,
    surface_height: u32,
) -> bool {
    match step {
        CaptureStep::Face => validate_face(points, oval, surface_width),
        CaptureStep::Top => validate_top(points, oval, surface_width, surface_height),
    }
}

fn validate_face(points: &FacePoints, oval: &OvalTarget, surface_width: u32) -> bool {
    let w = surface_width as f64;
    // Both margins scale with width on this step.
    let Some(distance) = elliptical_distance(points.center, oval, w * MARGIN_X, w * MARGIN_Y) else {
        return false;
    };

    let size_ratio = points.width / oval.width;
    let accepted =
        distance < FACE_DISTANCE && size_ratio > FACE_SIZE_MIN && size_ratio < FACE_SIZE_MAX;

    tracing::trace!(distance, size_ratio, accepted, "face step geometry");
    accepted
}

fn validate_top(
    points: &FacePoints,
    oval: &OvalTarget,
    surface_width: u32,
    surface_height: u32,
) -> bool {
    let w = surface_width as f64;
    let h = surface_height as f64;
    let Some(distance) =
        elliptical_distance(points.top_of_head, oval, w * MARGIN_X, h * MARGIN_Y)
    else {
        return false;
    };

    let top_in_oval = distance < TOP_DISTANCE;
    let head_tilted = points.chin.y > points.forehead.y + h * HEAD_TILT_THRESHOLD;
    let chin_visible = points.chin.y < h - h * FACE_VISIBILITY_THRESHOLD;

    tracing::trace!(distance, head_tilted, chin_visible, "top step geometry");
    top_in_oval && head_tilted && chin_visible
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Face points centered at `(cx, cy)` with the given width, forehead and chin.
    fn points(cx: f64, cy: f64, width: f64, forehead_y: f64, chin_y: f64) -> FacePoints {
        let height = (chin_y - forehead_y).abs();
        FacePoints {
            forehead: FacePoint::new(cx, forehead_y),
            chin: FacePoint::new(cx, chin_y),
            left_cheek: FacePoint::new(cx + width / 2.0, cy),
            right_cheek: FacePoint::new(cx - width / 2.0, cy),
            top_of_head: FacePoint::new(cx, forehead_y - height * 0.15),
            center: FacePoint::new(cx, cy),
            width,
            height,
        }
    }

    #[test]
    fn test_oval_layout_640x480() {
        let face = OvalTarget::for_step(CaptureStep::Face, 640, 480);
        assert_eq!((face.center_x, face.center_y), (320.0, 260.0));
        assert_eq!((face.width, face.height), (240.0, 320.0));

        let top = OvalTarget::for_step(CaptureStep::Top, 640, 480);
        assert_eq!((top.center_x, top.center_y), (320.0, 100.0));
        assert_eq!((top.width, top.height), (240.0, 180.0));
    }

    #[test]
    fn test_face_centered_exact_width_accepted() {
        let oval = OvalTarget::for_step(CaptureStep::Face, 640, 480);
        let pts = points(oval.center_x, oval.center_y, oval.width, 160.0, 360.0);
        assert!(validate(CaptureStep::Face, &pts, &oval, 640, 480));
    }

    #[test]
    fn test_face_size_bounds_exclusive() {
        let oval = OvalTarget::for_step(CaptureStep::Face, 640, 480);
        for (width, expected) in [
            (0.6 * 240.0, false),
            (0.61 * 240.0, true),
            (1.19 * 240.0, true),
            (1.2 * 240.0, false),
            (60.0, false),
            (400.0, false),
        ] {
            let pts = points(oval.center_x, oval.center_y, width, 160.0, 360.0);
            assert_eq!(
                validate(CaptureStep::Face, &pts, &oval, 640, 480),
                expected,
                "width {width}"
            );
        }
    }

    #[test]
    fn test_face_off_center_rejected() {
        let oval = OvalTarget::for_step(CaptureStep::Face, 640, 480);
        // rx = 120 - 19.84 = 100.16; 0.7 * rx ≈ 70.1
        let near = points(oval.center_x + 60.0, oval.center_y, 240.0, 160.0, 360.0);
        assert!(validate(CaptureStep::Face, &near, &oval, 640, 480));
        let far = points(oval.center_x + 80.0, oval.center_y, 240.0, 160.0, 360.0);
        assert!(!validate(CaptureStep::Face, &far, &oval, 640, 480));
    }

    #[test]
    fn test_face_vertical_margin_uses_width() {
        let oval = OvalTarget::for_step(CaptureStep::Face, 640, 480);
        // ry = 160 - 640 * 0.042 = 133.12; 0.7 * ry ≈ 93.18
        let inside = points(oval.center_x, oval.center_y + 92.0, 240.0, 160.0, 360.0);
        assert!(validate(CaptureStep::Face, &inside, &oval, 640, 480));
        let outside = points(oval.center_x, oval.center_y + 95.0, 240.0, 160.0, 360.0);
        assert!(!validate(CaptureStep::Face, &outside, &oval, 640, 480));
    }

    #[test]
    fn test_top_tilted_head_accepted() {
        let oval = OvalTarget::for_step(CaptureStep::Top, 640, 480);
        // forehead 120, chin 200 → height 80, top of head at 108.
        let pts = points(320.0, 160.0, 200.0, 120.0, 200.0);
        assert!(validate(CaptureStep::Top, &pts, &oval, 640, 480));
    }

    #[test]
    fn test_top_requires_tilt() {
        let oval = OvalTarget::for_step(CaptureStep::Top, 640, 480);
        // chin only 20px below forehead; threshold is 480 * 0.063 = 30.24.
        let pts = points(320.0, 110.0, 200.0, 100.0, 120.0);
        assert!(!validate(CaptureStep::Top, &pts, &oval, 640, 480));
    }

    #[test]
    fn test_top_tilt_bound_from_normalized_landmarks() {
        use crate::landmarks::{extract_face_points, sparse_landmarks};
        use crate::types::Landmark;

        let oval = OvalTarget::for_step(CaptureStep::Top, 640, 480);
        let at = |chin_y: f64| {
            let lms = sparse_landmarks(
                Landmark::new(0.5, 0.211),
                Landmark::new(0.5, chin_y),
                Landmark::new(0.4, 0.25),
                Landmark::new(0.6, 0.25),
            );
            let pts = extract_face_points(&lms, 640, 480).unwrap();
            validate(CaptureStep::Top, &pts, &oval, 640, 480)
        };
        // 0.274 * 480 lands exactly on 0.211 * 480 + 480 * 0.063; the bound
        // is exclusive. Half a micropixel past it is enough to pass.
        assert!(!at(0.274));
        assert!(at(0.274000001));
    }

    #[test]
    fn test_top_requires_chin_on_screen() {
        let oval = OvalTarget::for_step(CaptureStep::Top, 640, 480);
        // Limit is 480 - 49.92 = 430.08.
        let pts = points(320.0, 250.0, 200.0, 110.0, 440.0);
        assert!(!validate(CaptureStep::Top, &pts, &oval, 640, 480));
    }

    #[test]
    fn test_top_anchor_outside_oval() {
        let oval = OvalTarget::for_step(CaptureStep::Top, 640, 480);
        // Top of head far below the oval center.
        let pts = points(320.0, 300.0, 200.0, 260.0, 340.0);
        assert!(!validate(CaptureStep::Top, &pts, &oval, 640, 480));
    }

    #[test]
    fn test_elliptical_distance_degenerate_radius() {
        let oval = OvalTarget { center_x: 0.0, center_y: 0.0, width: 10.0, height: 10.0 };
        assert!(elliptical_distance(FacePoint::new(0.0, 0.0), &oval, 5.0, 1.0).is_none());
        let d = elliptical_distance(FacePoint::new(4.0, 0.0), &oval, 1.0, 1.0).unwrap();
        assert!((d - 1.0).abs() < 1e-6);
    }
}
