//! # avifglue
//!
//! AVIF encode and decode sessions over [libavif](https://github.com/AOMediaCodec/libavif).
//!
//! libavif does the AV1 coding, colour conversion and container work. This
//! crate turns Rust values into libavif configuration, owns every native
//! allocation, maps EXIF orientation onto `irot`/`imir`, and classifies native
//! failures into [`ErrorKind`]s. With the `python` feature it also builds the
//! `_avif` extension module used by Python image plugins.
//!
//! ## Quick Start
//!
//! ```no_run
//! use avifglue::{decode, DecodedImage};
//!
//! let avif_data = std::fs::read("image.avif").unwrap();
//! let image = decode(&avif_data).unwrap();
//!
//! match image {
//!     DecodedImage::Rgb8(img) => {
//!         println!("RGB8 image: {}x{}", img.width(), img.height());
//!     }
//!     DecodedImage::Rgba8(img) => {
//!         println!("RGBA8 image: {}x{}", img.width(), img.height());
//!     }
//!     _ => {}
//! }
//! ```
//!
//! ## Sessions
//!
//! Animated files and explicit options go through [`Decoder`] and
//! [`Encoder`]:
//!
//! ```no_run
//! use avifglue::{Decoder, DecoderConfig, Encoder, EncoderConfig, ChromaUpsampling};
//!
//! let data = std::fs::read("anim.avif").unwrap();
//! let config = DecoderConfig::new().upsampling(ChromaUpsampling::BestQuality);
//! let mut decoder = Decoder::new(data, &config)?;
//! let info = decoder.info().clone();
//!
//! let mut encoder = Encoder::new(info.width, info.height, &EncoderConfig::new().quality(90))?;
//! for index in 0..info.frame_count {
//!     let frame = decoder.frame(index)?;
//!     let single = info.frame_count == 1;
//!     encoder.add(&frame.pixels, frame.duration_ms(), frame.width, frame.height, frame.layout, single)?;
//! }
//! let avif = encoder.finish()?;
//! # Ok::<(), whereat::At<avifglue::Error>>(())
//! ```
//!
//! ## Features
//!
//! - **`python`**: PyO3 bindings (`AvifEncoder`, `AvifDecoder`, codec queries)
//! - **`extension-module`**: `python` plus linking as a loadable extension

mod config;
mod decoder;
mod encoder;
mod error;
mod ffi;
mod image;
pub mod orientation;
#[cfg(feature = "python")]
mod python;
mod sniff;
pub mod threads;
pub mod tiling;

pub use config::{ChromaUpsampling, DecoderConfig, PixelLayout, Subsampling, YuvRange};
pub use decoder::{Decoder, Frame, ImageInfo};
pub use encoder::{Encoder, EncoderConfig, encode_rgb8, encode_rgba8};
pub use error::{Error, ErrorKind, Result};
pub use ffi::{
    Capabilities, LIBAVIF_VERSION, codec_versions, decoder_codec_available,
    encoder_codec_available, libavif_version, version_tuple,
};
pub use image::DecodedImage;
pub use orientation::{MirrorAxis, Orientation, Rotation, Transform};
pub use sniff::is_avif;
pub use threads::default_max_threads;

/// Decode the first frame of an AVIF image with default settings
///
/// # Example
///
/// ```no_run
/// let avif_data = std::fs::read("image.avif").unwrap();
/// let image = avifglue::decode(&avif_data).unwrap();
/// ```
pub fn decode(data: &[u8]) -> Result<DecodedImage> {
    decode_with(data, &DecoderConfig::default())
}

/// Decode the first frame of an AVIF image with custom settings
///
/// # Example
///
/// ```no_run
/// use avifglue::{decode_with, DecoderConfig};
///
/// let config = DecoderConfig::new().threads(4);
/// let avif_data = std::fs::read("image.avif").unwrap();
/// let image = decode_with(&avif_data, &config).unwrap();
/// ```
pub fn decode_with(data: &[u8], config: &DecoderConfig) -> Result<DecodedImage> {
    let mut decoder = Decoder::new(data, config)?;
    decoder.frame(0)?.into_image()
}
