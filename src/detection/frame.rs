//! Grayscale camera frames.

use chrono::{DateTime, Local};
use image::{DynamicImage, GrayImage};

/// An immutable grayscale frame and the time it was captured.
#[derive(Debug, Clone)]
pub struct Frame {
    pixels: GrayImage,
    captured_at: DateTime<Local>,
}

impl Frame {
    /// Wrap a grayscale image captured now.
    pub fn new(pixels: GrayImage) -> Self {
        Self::captured_at(pixels, Local::now())
    }

    /// Wrap a grayscale image with an explicit capture time.
    pub fn captured_at(pixels: GrayImage, captured_at: DateTime<Local>) -> Self {
        Self {
            pixels,
            captured_at,
        }
    }

    /// Convert a camera image to grayscale.
    pub fn from_image(image: &DynamicImage) -> Self {
        Self::new(image.to_luma8())
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Row-major pixel intensities.
    pub fn intensities(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    /// When the frame was captured.
    pub fn timestamp(&self) -> DateTime<Local> {
        self.captured_at
    }
}
