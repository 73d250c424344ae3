//! Decoded RGBA8 image data.

use std::path::Path;

use image::GenericImageView;
use tracing::{debug, info};

use crate::error::{ResourceError, ResourceResult};

/// CPU-side image, always tightly packed RGBA8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// Wraps raw RGBA8 pixels, checking the length against the extent.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> ResourceResult<Self> {
        if width == 0 || height == 0 {
            return Err(ResourceError::invalid(
                "image",
                format!("zero extent {}x{}", width, height),
            ));
        }

        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(ResourceError::invalid(
                "image",
                format!(
                    "{}x{} RGBA8 needs {} bytes, got {}",
                    width,
                    height,
                    expected,
                    pixels.len()
                ),
            ));
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Loads and decodes an image file (PNG or JPEG), converting to RGBA8.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let decoded = image::open(path)?;
        let (width, height) = decoded.dimensions();
        let data = Self::from_rgba8(width, height, decoded.into_rgba8().into_raw())?;

        info!("Loaded image {:?}: {}x{}", path, width, height);

        Ok(data)
    }

    /// Decodes an in-memory encoded image, guessing the format from its header.
    pub fn decode(bytes: &[u8]) -> ResourceResult<Self> {
        let decoded = image::load_from_memory(bytes)?;
        let (width, height) = decoded.dimensions();

        debug!("Decoded {}x{} image from memory", width, height);

        Self::from_rgba8(width, height, decoded.into_rgba8().into_raw())
    }

    /// Square checkerboard alternating white and grey cells, used when no texture is configured.
    pub fn checkerboard(size: u32, cell: u32) -> ResourceResult<Self> {
        if cell == 0 {
            return Err(ResourceError::invalid("checkerboard", "cell size is zero"));
        }

        let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
        for y in 0..size {
            for x in 0..size {
                let light = ((x / cell) + (y / cell)) % 2 == 0;
                let v = if light { 0xff } else { 0x40 };
                pixels.extend_from_slice(&[v, v, v, 0xff]);
            }
        }

        Self::from_rgba8(size, size, pixels)
    }

    /// RGBA value of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels
            .get(i..i + 4)
            .and_then(|p| <[u8; 4]>::try_from(p).ok())
    }
}
