//! Lighting adequacy, judged by mean luminance over a region of interest.
//!
//! `(R + G + B) / 3` averaged over the region. Cheap and rotation-invariant;
//! enough to reject severe under/over-exposure.

use crate::types::{CaptureStep, FacePoints, OvalTarget};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

pub const MIN_BRIGHTNESS: f64 = 80.0;
pub const MAX_BRIGHTNESS: f64 = 200.0;

/// Brightness classification of a sampled region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LightingStatus {
    Ok,
    TooDark,
    TooBright,
}

impl LightingStatus {
    pub fn label(self) -> &'static str {
        match self {
            LightingStatus::Ok => "Lighting OK",
            LightingStatus::TooDark => "Too dark",
            LightingStatus::TooBright => "Too bright",
        }
    }
}

/// Result of sampling a region of the surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightingAnalysis {
    pub average_brightness: f64,
    pub status: LightingStatus,
    pub label: String,
}

/// Pixel rectangle `[x0, x1) × [y0, y1)` clipped to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Region {
    /// Clip a float rectangle to a `width × height` surface.
    /// Returns `None` if nothing of it lies on the surface.
    pub fn clipped(x: f64, y: f64, w: f64, h: f64, width: u32, height: u32) -> Option<Self> {
        if !(x.is_finite() && y.is_finite() && w.is_finite() && h.is_finite()) {
            return None;
        }
        let x0 = x.floor().max(0.0) as u32;
        let y0 = y.floor().max(0.0) as u32;
        let x1 = ((x + w).ceil().max(0.0) as u32).min(width);
        let y1 = ((y + h).ceil().max(0.0) as u32).min(height);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some(Self { x0, y0, x1, y1 })
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.x1 - self.x0) * u64::from(self.y1 - self.y0)
    }
}

/// Region sampled for `step`: the face's bounding box on the Face step, the
/// oval's bounding box on the Top step.
///
/// The box is clipped to the surface, so any part hanging off the edge is
/// left out of the mean rather than counted as black pixels the way a
/// browser canvas read would count it.
pub fn region_of_interest(
    step: CaptureStep,
    points: &FacePoints,
    oval: &OvalTarget,
    width: u32,
    height: u32,
) -> Option<Region> {
    match step {
        CaptureStep::Face => {
            let measured = points.measured();
            let min_x = measured.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
            let max_x = measured.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
            let min_y = measured.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
            let max_y = measured.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
            Region::clipped(min_x, min_y, max_x - min_x, max_y - min_y, width, height)
        }
        CaptureStep::Top => {
            let (x, y, w, h) = oval.bounds();
            Region::clipped(x, y, w, h, width, height)
        }
    }
}

/// Mean `(R + G + B) / 3` over every pixel in `region`.
pub fn mean_brightness(surface: &RgbaImage, region: Region) -> f64 {
    let mut total: u64 = 0;
    for y in region.y0..region.y1 {
        for x in region.x0..region.x1 {
            let [r, g, b, _] = surface.get_pixel(x, y).0;
            total += u64::from(r) + u64::from(g) + u64::from(b);
        }
    }
    total as f64 / 3.0 / region.pixel_count() as f64
}

/// Classify a mean brightness against the acceptance band (exclusive).
pub fn classify(average: f64) -> LightingStatus {
    if average <= MIN_BRIGHTNESS {
        LightingStatus::TooDark
    } else if average >= MAX_BRIGHTNESS {
        LightingStatus::TooBright
    } else {
        LightingStatus::Ok
    }
}

/// Full lighting analysis for the current step's region.
///
/// Returns `None` when the region lies entirely off the surface.
pub fn analyze_lighting(
    surface: &RgbaImage,
    step: CaptureStep,
    points: &FacePoints,
    oval: &OvalTarget,
) -> Option<LightingAnalysis> {
    let region = region_of_interest(step, points, oval, surface.width(), surface.height())?;
    let average_brightness = mean_brightness(surface, region);
    let status = classify(average_brightness);
    Some(LightingAnalysis {
        average_brightness,
        status,
        label: status.label().to_string(),
    })
}

/// True when the sampled region is neither too dark nor too bright.
/// An empty region is never acceptable.
pub fn check_lighting(
    surface: &RgbaImage,
    step: CaptureStep,
    points: &FacePoints,
    oval: &OvalTarget,
) -> bool {
    match analyze_lighting(surface, step, points, oval) {
        Some(analysis) => {
            tracing::trace!(
                step = %step,
                brightness = analysis.average_brightness,
                status = ?analysis.status,
                "lighting sampled"
            );
            analysis.status == LightingStatus::Ok
        }
        None => {
            tracing::debug!(step = %step, "lighting region is off-surface");
            false
        }
    }
}
