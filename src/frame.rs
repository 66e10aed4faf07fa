//! Decoded raster frames.
//!
//! Frames reach the kernel as encoded images (JPEG or PNG) from the HTTP
//! boundary or from local files. They are decoded exactly once, here, into an
//! RGB8 buffer. Detectors only ever see the decoded `Frame`.
//!
//! A frame with zero width or height is the "no input" sentinel: the analyzer
//! reports `NoFrame` for it without calling any frame-consuming detector.

use anyhow::{anyhow, Context, Result};
use image::GenericImageView;
use std::fmt;
use std::path::Path;

/// Largest accepted edge length in pixels. Anything bigger is treated as a
/// malformed payload rather than decoded.
pub const MAX_FRAME_DIMENSION: u32 = 8192;

/// RGB8 raster. Pixels are row-major, three bytes per pixel.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wrap an existing RGB8 buffer, validating its length against the dimensions.
    pub fn from_rgb(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))? as usize;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    /// A frame carrying no pixels.
    pub fn empty() -> Self {
        Self {
            pixels: Vec::new(),
            width: 0,
            height: 0,
        }
    }

    /// Decode an encoded image (JPEG or PNG) into an RGB8 frame.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(anyhow!("empty image payload"));
        }
        let image = image::load_from_memory(bytes).context("decode image")?;
        let (width, height) = image.dimensions();
        if width > MAX_FRAME_DIMENSION || height > MAX_FRAME_DIMENSION {
            return Err(anyhow!(
                "image {}x{} exceeds maximum dimension {}",
                width,
                height,
                MAX_FRAME_DIMENSION
            ));
        }
        let rgb = image.into_rgb8();
        Self::from_rgb(rgb.into_raw(), width, height)
    }

    /// Read and decode an image file.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| anyhow!("failed to read frame {}: {}", path.display(), e))?;
        Self::decode(&bytes).with_context(|| format!("frame {}", path.display()))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// True for the "no input" sentinel.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }

    /// Raw RGB8 bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGB triple at `(x, y)`, or `None` outside the raster.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y as usize) * (self.width as usize) + x as usize) * 3;
        let px = self.pixels.get(offset..offset + 3)?;
        Some([px[0], px[1], px[2]])
    }
}

// Pixel data stays out of logs.
impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}
