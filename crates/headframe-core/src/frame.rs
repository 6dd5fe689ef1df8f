//! Frame type and surface rendering.

use image::imageops::{self, FilterType};
use image::RgbaImage;

/// A camera frame as delivered by the frame source, not yet mirrored.
#[derive(Clone)]
pub struct Frame {
    pub image: RgbaImage,
    pub sequence: u32,
}

impl Frame {
    pub fn new(image: RgbaImage, sequence: u32) -> Self {
        Self { image, sequence }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Size of the render surface the preview is drawn onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for SurfaceSize {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

/// Draw `frame` onto a surface of `size`: mirrored horizontally, and scaled
/// with a triangle filter when the sizes differ.
///
/// Lighting samples and committed photos are both taken from this surface,
/// so it shares the mirrored coordinate space of the extracted face points.
pub fn render_surface(frame: &Frame, size: SurfaceSize) -> Result<RgbaImage, FrameError> {
    if size.is_empty() {
        return Err(FrameError::SurfaceUnavailable {
            width: size.width,
            height: size.height,
        });
    }
    if frame.width() == 0 || frame.height() == 0 {
        return Err(FrameError::EmptyFrame);
    }

    let mut surface = if frame.width() == size.width && frame.height() == size.height {
        frame.image.clone()
    } else {
        imageops::resize(&frame.image, size.width, size.height, FilterType::Triangle)
    };
    imageops::flip_horizontal_in_place(&mut surface);
    Ok(surface)
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("render surface unavailable ({width}x{height})")]
    SurfaceUnavailable { width: u32, height: u32 },
    #[error("frame has no pixels")]
    EmptyFrame,
}
