//! Normalized face mesh points to mirrored surface pixels.

use crate::types::{FacePoint, FacePoints, Landmark};

// --- Face mesh indices (MediaPipe 468-point numbering) ---
pub const FOREHEAD: usize = 10;
pub const CHIN: usize = 152;
pub const LEFT_CHEEK: usize = 234;
pub const RIGHT_CHEEK: usize = 454;

/// Highest index read from a landmark set, plus one.
pub const REQUIRED_LANDMARKS: usize = RIGHT_CHEEK + 1;

/// Fraction of face height added above the forehead to estimate the scalp.
pub const TOP_OF_HEAD_ESTIMATE: f64 = 0.15;

/// Convert a normalized landmark to surface pixels, flipping x to match the
/// mirrored preview. y is not mirrored.
fn to_surface(lm: &Landmark, surface_width: f64, surface_height: f64) -> FacePoint {
    FacePoint {
        x: surface_width - lm.x * surface_width,
        y: lm.y * surface_height,
    }
}

/// Build [`FacePoints`] from the first face's landmark list.
///
/// Returns `None` when any of the four required indices is missing; the
/// caller treats that frame as having no face.
pub fn extract_face_points(
    landmarks: &[Landmark],
    surface_width: u32,
    surface_height: u32,
) -> Option<FacePoints> {
    let w = surface_width as f64;
    let h = surface_height as f64;

    let forehead = to_surface(landmarks.get(FOREHEAD)?, w, h);
    let chin = to_surface(landmarks.get(CHIN)?, w, h);
    let left_cheek = to_surface(landmarks.get(LEFT_CHEEK)?, w, h);
    let right_cheek = to_surface(landmarks.get(RIGHT_CHEEK)?, w, h);

    let height = (chin.y - forehead.y).abs();
    let top_of_head = FacePoint {
        x: forehead.x,
        y: forehead.y - height * TOP_OF_HEAD_ESTIMATE,
    };

    Some(FacePoints {
        forehead,
        chin,
        left_cheek,
        right_cheek,
        top_of_head,
        center: FacePoint {
            x: (left_cheek.x + right_cheek.x) / 2.0,
            y: (forehead.y + chin.y) / 2.0,
        },
        width: (right_cheek.x - left_cheek.x).abs(),
        height,
    })
}

/// Build a full-length landmark list with only the four read indices set.
///
/// Traces and tests record just these points; everything else stays at the
/// origin.
pub fn sparse_landmarks(
    forehead: Landmark,
    chin: Landmark,
    left_cheek: Landmark,
    right_cheek: Landmark,
) -> Vec<Landmark> {
    let mut out = vec![Landmark::default(); REQUIRED_LANDMARKS];
    out[FOREHEAD] = forehead;
    out[CHIN] = chin;
    out[LEFT_CHEEK] = left_cheek;
    out[RIGHT_CHEEK] = right_cheek;
    out
}
