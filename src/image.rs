//! Decoded image types

use imgref::ImgVec;
use rgb::{Rgb, Rgba};

/// A decoded AVIF frame as typed pixels
#[derive(Debug)]
#[non_exhaustive]
pub enum DecodedImage {
    /// 8-bit RGB image
    Rgb8(ImgVec<Rgb<u8>>),
    /// 8-bit RGBA image
    Rgba8(ImgVec<Rgba<u8>>),
}

impl DecodedImage {
    /// Get the width of the decoded image
    pub fn width(&self) -> usize {
        match self {
            DecodedImage::Rgb8(img) => img.width(),
            DecodedImage::Rgba8(img) => img.width(),
        }
    }

    /// Get the height of the decoded image
    pub fn height(&self) -> usize {
        match self {
            DecodedImage::Rgb8(img) => img.height(),
            DecodedImage::Rgba8(img) => img.height(),
        }
    }

    /// Returns true if the image has an alpha channel
    pub fn has_alpha(&self) -> bool {
        matches!(self, DecodedImage::Rgba8(_))
    }
}
