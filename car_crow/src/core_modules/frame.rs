// THEORY:
// A `Frame` is the leaf data container of the engine: one still image sampled
// from a video, plus the path it came from when it was read from disk. Like the
// rest of the "dumb" containers it never compares itself to anything; the
// extractor does that. Pixels are kept in RGB so an emitted event can carry a
// colour image, and a grayscale view is derived whenever the extractor needs it.

use crate::error::{CrowError, CrowResult};
use image::{GrayImage, RgbImage};
use std::path::{Path, PathBuf};

/// A single raster frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    image: RgbImage,
    source: Option<PathBuf>,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            source: None,
        }
    }

    /// Decodes a frame from an image file.
    pub fn open(path: impl AsRef<Path>) -> CrowResult<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|source| CrowError::FrameLoad {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgb8();
        Ok(Self {
            image,
            source: Some(path.to_path_buf()),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// The file this frame was decoded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn to_luma(&self) -> GrayImage {
        image::imageops::grayscale(&self.image)
    }
}

impl From<RgbImage> for Frame {
    fn from(image: RgbImage) -> Self {
        Self::new(image)
    }
}

/// Anything the scanner can turn into a `Frame`: an in-memory frame or a path
/// to an image file.
pub trait FrameInput {
    fn load(self) -> CrowResult<Frame>;
}

impl FrameInput for Frame {
    fn load(self) -> CrowResult<Frame> {
        Ok(self)
    }
}

impl FrameInput for PathBuf {
    fn load(self) -> CrowResult<Frame> {
        Frame::open(self)
    }
}

impl FrameInput for &Path {
    fn load(self) -> CrowResult<Frame> {
        Frame::open(self)
    }
}

impl FrameInput for &PathBuf {
    fn load(self) -> CrowResult<Frame> {
        Frame::open(self)
    }
}
