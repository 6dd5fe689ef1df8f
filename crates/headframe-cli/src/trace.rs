//! Recorded landmark traces.
//!
//! A trace is a JSON file listing frames in time order, each with the four
//! landmarks the extractor reads (or none) and either a uniform fill level or
//! a path to an image on disk:
//!
//! ```json
//! { "width": 640, "height": 480,
//!   "frames": [
//!     { "t_ms": 0, "fill": 128,
//!       "face": { "forehead": [0.5, 0.23], "chin": [0.5, 0.85],
//!                 "left_cheek": [0.31, 0.54], "right_cheek": [0.69, 0.54] } },
//!     { "t_ms": 50, "image": "frames/0001.png" }
//!   ] }
//! ```

use headframe_core::landmarks::sparse_landmarks;
use headframe_core::{Frame, Landmark, LandmarkDetector};
use image::{Rgba, RgbaImage};
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("failed to read trace {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid trace: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("trace frames are not in time order at index {0}")]
    OutOfOrder(usize),
    #[error("frame index {index} out of range (trace has {len})")]
    NoSuchFrame { index: usize, len: usize },
    #[error("failed to load frame image {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// The four landmarks the extractor reads, normalized `[x, y]`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TraceFace {
    pub forehead: [f64; 2],
    pub chin: [f64; 2],
    pub left_cheek: [f64; 2],
    pub right_cheek: [f64; 2],
}

impl TraceFace {
    pub fn landmarks(&self) -> Vec<Landmark> {
        let lm = |[x, y]: [f64; 2]| Landmark::new(x, y);
        sparse_landmarks(
            lm(self.forehead),
            lm(self.chin),
            lm(self.left_cheek),
            lm(self.right_cheek),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraceFrame {
    /// Offset from the start of the replay.
    pub t_ms: u64,
    #[serde(default)]
    pub face: Option<TraceFace>,
    /// Uniform gray level used when no image is given.
    #[serde(default = "default_fill")]
    pub fill: u8,
    #[serde(default)]
    pub image: Option<PathBuf>,
}

fn default_fill() -> u8 {
    128
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

#[derive(Debug, Clone, Deserialize)]
pub struct Trace {
    /// Camera frame size for synthesized frames.
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    pub frames: Vec<TraceFrame>,
    /// Directory relative image paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Trace {
    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let text = std::fs::read_to_string(path).map_err(|source| TraceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut trace = Self::from_json(&text)?;
        trace.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(trace)
    }

    pub fn from_json(text: &str) -> Result<Self, TraceError> {
        let trace: Trace = serde_json::from_str(text)?;
        if let Some(pos) = trace.frames.windows(2).position(|w| w[1].t_ms < w[0].t_ms) {
            return Err(TraceError::OutOfOrder(pos + 1));
        }
        Ok(trace)
    }

    pub fn frame(&self, index: usize) -> Result<&TraceFrame, TraceError> {
        self.frames.get(index).ok_or(TraceError::NoSuchFrame {
            index,
            len: self.frames.len(),
        })
    }

    /// Build the camera frame for `index`: the referenced image, or a uniform
    /// fill at the trace's frame size.
    pub fn render(&self, index: usize) -> Result<Frame, TraceError> {
        let entry = self.frame(index)?;
        let image = match &entry.image {
            Some(rel) => {
                let path = self.base_dir.join(rel);
                image::open(&path)
                    .map_err(|source| TraceError::Image { path, source })?
                    .to_rgba8()
            }
            None => {
                let fill = Rgba([entry.fill, entry.fill, entry.fill, 255]);
                RgbaImage::from_pixel(self.width, self.height, fill)
            }
        };
        Ok(Frame::new(image, index as u32))
    }

    pub fn detector(&self) -> TraceDetector {
        TraceDetector {
            pending: self.frames.iter().map(|f| f.face.map(|face| face.landmarks())).collect(),
        }
    }
}

/// Replays the recorded detection results in order, one per frame.
pub struct TraceDetector {
    pending: VecDeque<Option<Vec<Landmark>>>,
}

impl LandmarkDetector for TraceDetector {
    type Error = std::convert::Infallible;

    fn detect(&mut self, _frame: &RgbaImage) -> Result<Option<Vec<Landmark>>, Self::Error> {
        Ok(self.pending.pop_front().flatten())
    }
}
