//! AVIF encoding via libavif
//!
//! [`EncoderConfig`] configures a session, [`Encoder`] accepts frames one at
//! a time and produces the file with [`Encoder::finish`]. For single images
//! [`encode_rgb8`] / [`encode_rgba8`] do all three steps.

use crate::Result;
use crate::config::{PixelLayout, Subsampling, YuvRange};
use crate::error::Error;
use crate::ffi::{self, Capabilities, EncoderHandle, ImageHandle, RgbPixels, RwData, check};
use crate::orientation::{self, Orientation};
use crate::threads;
use crate::tiling;
use imgref::ImgRef;
use libavif_sys as sys;
use log::{debug, warn};
use rgb::{Rgb, Rgba};
use std::borrow::Cow;
use whereat::at;

/// Configuration for AVIF encoding
///
/// Uses a builder pattern matching [`crate::DecoderConfig`].
///
/// # Example
///
/// ```
/// use avifglue::{EncoderConfig, Subsampling};
///
/// let config = EncoderConfig::new()
///     .quality(80)
///     .speed(6)
///     .subsampling(Subsampling::Yuv444);
/// ```
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub(crate) subsampling: Subsampling,
    pub(crate) quantizers: Option<(i32, i32)>,
    pub(crate) quality: i32,
    pub(crate) speed: i32,
    pub(crate) max_threads: u32,
    pub(crate) codec: String,
    pub(crate) range: YuvRange,
    pub(crate) tile_rows_log2: i32,
    pub(crate) tile_cols_log2: i32,
    pub(crate) alpha_premultiplied: bool,
    pub(crate) autotiling: Option<bool>,
    pub(crate) icc: Vec<u8>,
    pub(crate) exif: Vec<u8>,
    pub(crate) exif_orientation: u8,
    pub(crate) xmp: Vec<u8>,
    pub(crate) advanced: Vec<(Vec<u8>, Vec<u8>)>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            subsampling: Subsampling::Yuv420,
            quantizers: None,
            quality: 75,
            speed: 6,
            max_threads: 0,
            codec: "auto".to_owned(),
            range: YuvRange::Full,
            tile_rows_log2: 0,
            tile_cols_log2: 0,
            alpha_premultiplied: false,
            autotiling: None,
            icc: Vec::new(),
            exif: Vec::new(),
            exif_orientation: 0,
            xmp: Vec::new(),
            advanced: Vec::new(),
        }
    }
}

impl EncoderConfig {
    /// Create a new encoder configuration with default settings
    ///
    /// Defaults: quality 75, speed 6, 4:2:0, full range, automatic tiling,
    /// codec "auto"
    pub fn new() -> Self {
        Self::default()
    }

    /// Set chroma subsampling
    pub fn subsampling(mut self, subsampling: Subsampling) -> Self {
        self.subsampling = subsampling;
        self
    }

    /// Set encoding quality (0 = worst, 100 = lossless)
    ///
    /// Values outside 0..=100 are rejected when the encoder is created.
    pub fn quality(mut self, quality: i32) -> Self {
        self.quality = quality;
        self
    }

    /// Set an explicit quantizer range (0 = lossless, 63 = worst)
    ///
    /// Only used by libavif generations without scalar quality.
    pub fn quantizers(mut self, min: i32, max: i32) -> Self {
        self.quantizers = Some((min, max));
        self
    }

    /// Set encoding speed (0 = slowest/best, 10 = fastest); clamped
    pub fn speed(mut self, speed: i32) -> Self {
        self.speed = speed;
        self
    }

    /// Set the thread budget (0 = process default)
    ///
    /// Capped at [`crate::threads::AOM_MAX_THREADS`] when encoding with aom.
    pub fn max_threads(mut self, max_threads: u32) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Select the AV1 encoding backend by libavif name ("aom", "rav1e",
    /// "svt", ...)
    pub fn codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    /// Set the YUV range
    pub fn range(mut self, range: YuvRange) -> Self {
        self.range = range;
        self
    }

    /// Set tile rows as log2; clamped into 0..=6
    ///
    /// Only used with automatic tiling off. Setting a non-zero tile count
    /// turns automatic tiling off unless [`autotiling`](Self::autotiling)
    /// says otherwise.
    pub fn tile_rows_log2(mut self, rows_log2: i32) -> Self {
        self.tile_rows_log2 = rows_log2;
        self
    }

    /// Set tile columns as log2; see [`tile_rows_log2`](Self::tile_rows_log2)
    pub fn tile_cols_log2(mut self, cols_log2: i32) -> Self {
        self.tile_cols_log2 = cols_log2;
        self
    }

    /// Let libavif choose the tile layout
    pub fn autotiling(mut self, enabled: bool) -> Self {
        self.autotiling = Some(enabled);
        self
    }

    /// Mark RGBA input as premultiplied
    pub fn alpha_premultiplied(mut self, premultiplied: bool) -> Self {
        self.alpha_premultiplied = premultiplied;
        self
    }

    /// Embed an ICC profile; colour primaries and transfer become unspecified
    pub fn icc(mut self, icc: impl Into<Vec<u8>>) -> Self {
        self.icc = icc.into();
        self
    }

    /// Embed EXIF metadata
    pub fn exif(mut self, exif: impl Into<Vec<u8>>) -> Self {
        self.exif = exif.into();
        self
    }

    /// Embed XMP metadata
    pub fn xmp(mut self, xmp: impl Into<Vec<u8>>) -> Self {
        self.xmp = xmp.into();
        self
    }

    /// Record display orientation as `irot`/`imir` properties
    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.exif_orientation = orientation.exif();
        self
    }

    /// Record display orientation by raw EXIF code, 0 for none
    ///
    /// Codes outside 1..=8 are ignored.
    pub fn exif_orientation(mut self, code: u8) -> Self {
        self.exif_orientation = code;
        self
    }

    /// Pass a codec-specific option through to the backend
    pub fn advanced_option(mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.advanced.push((key.into(), value.into()));
        self
    }

    fn uses_autotiling(&self) -> bool {
        self.autotiling
            .unwrap_or(self.tile_rows_log2 == 0 && self.tile_cols_log2 == 0)
    }
}

/// Quantizer pair for a quality value, for libavif without scalar quality
pub(crate) fn quantizers_for_quality(quality: i32) -> (i32, i32) {
    let max = sys::AVIF_QUANTIZER_WORST_QUALITY as i32;
    ((64 - quality).clamp(0, max), (100 - quality).clamp(0, max))
}

fn encodes_with_aom(codec: &str) -> bool {
    codec == "aom" || (codec == "auto" && ffi::encoder_codec_available("aom"))
}

/// Multi-frame AVIF encoder session
///
/// The canvas size is fixed at creation; every frame must match it.
///
/// # Example
///
/// ```no_run
/// use avifglue::{Encoder, EncoderConfig, PixelLayout};
///
/// let mut encoder = Encoder::new(2, 2, &EncoderConfig::new())?;
/// encoder.add(&[255; 12], 100, 2, 2, PixelLayout::Rgb, false)?;
/// encoder.add(&[0; 12], 100, 2, 2, PixelLayout::Rgb, false)?;
/// let avif = encoder.finish()?;
/// # Ok::<(), whereat::At<avifglue::Error>>(())
/// ```
pub struct Encoder {
    handle: EncoderHandle,
    image: ImageHandle,
    first_frame: bool,
    frames: u32,
}

impl core::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let image = self.image.raw_ref();
        f.debug_struct("Encoder")
            .field("width", &image.width)
            .field("height", &image.height)
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

impl Encoder {
    /// Create an encoder for a `width` x `height` canvas
    pub fn new(width: u32, height: u32, config: &EncoderConfig) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(at(Error::invalid("invalid canvas dimensions")));
        }
        if !(0..=100).contains(&config.quality) {
            return Err(at(Error::invalid("Invalid quality setting")));
        }
        if config.codec != "auto" && !ffi::encoder_codec_available(&config.codec) {
            return Err(at(Error::invalid("Invalid saving codec")));
        }
        let orientation = match config.exif_orientation {
            0 => None,
            code => {
                let orientation = Orientation::from_exif(code);
                if orientation.is_none() {
                    warn!("unknown EXIF orientation {code}, not recorded");
                }
                orientation
            }
        };
        let caps = Capabilities::LINKED;
        if !config.advanced.is_empty() && !caps.codec_specific_options {
            return Err(at(Error::invalid(
                "Advanced codec options require libavif 0.8.2 or later",
            )));
        }

        let mut image = ImageHandle::new()?;
        {
            let img = image.raw();
            img.width = width;
            img.height = height;
            img.depth = 8;
            img.yuvFormat = config.subsampling.native();
            img.yuvRange = config.range.native();
            img.matrixCoefficients = sys::AVIF_MATRIX_COEFFICIENTS_BT601 as _;
            if caps.premultiplied_alpha {
                img.alphaPremultiplied = config.alpha_premultiplied as _;
            } else if config.alpha_premultiplied {
                warn!("alpha_premultiplied needs libavif 0.9.0, ignored");
            }
        }

        let mut handle = EncoderHandle::new()?;
        let max_threads = threads::cap_for_aom(
            threads::resolve_max_threads(config.max_threads),
            encodes_with_aom(&config.codec),
        );
        let autotiling = config.uses_autotiling() && caps.native_autotiling;
        if config.uses_autotiling() && !autotiling {
            debug!("autotiling needs libavif 0.11.0, using explicit tiles");
        }
        let (tile_rows_log2, tile_cols_log2) = if autotiling {
            (0, 0)
        } else {
            (
                tiling::clamp_tile_log2(config.tile_rows_log2),
                tiling::clamp_tile_log2(config.tile_cols_log2),
            )
        };
        debug!(
            "avif encoder {width}x{height} codec={} threads={max_threads} autotiling={autotiling} tiles=2^{tile_rows_log2}x2^{tile_cols_log2}",
            config.codec
        );
        {
            let enc = handle.raw();
            enc.maxThreads = threads::native_threads(max_threads);
            enc.codecChoice = ffi::codec_choice(&config.codec)?;
            enc.speed = config
                .speed
                .clamp(sys::AVIF_SPEED_SLOWEST as i32, sys::AVIF_SPEED_FASTEST as i32);
            enc.timescale = 1000;
            if caps.native_autotiling {
                enc.autoTiling = autotiling as sys::avifBool;
            }
            enc.tileRowsLog2 = tile_rows_log2;
            enc.tileColsLog2 = tile_cols_log2;
            if caps.scalar_quality {
                enc.quality = config.quality;
                if config.quantizers.is_some() {
                    debug!("explicit quantizers ignored, libavif uses scalar quality");
                }
            } else {
                let (min, max) = config
                    .quantizers
                    .unwrap_or_else(|| quantizers_for_quality(config.quality));
                enc.minQuantizer = min;
                enc.maxQuantizer = max;
            }
        }
        for (key, value) in &config.advanced {
            handle.set_codec_option(key, value)?;
        }

        if config.icc.is_empty() {
            let img = image.raw();
            img.colorPrimaries = sys::AVIF_COLOR_PRIMARIES_BT709 as _;
            img.transferCharacteristics = sys::AVIF_TRANSFER_CHARACTERISTICS_SRGB as _;
        } else {
            image.set_icc(&config.icc)?;
            let img = image.raw();
            img.colorPrimaries = sys::AVIF_COLOR_PRIMARIES_UNSPECIFIED as _;
            img.transferCharacteristics = sys::AVIF_TRANSFER_CHARACTERISTICS_UNSPECIFIED as _;
        }
        if !config.exif.is_empty() {
            image.set_exif(&config.exif)?;
        }
        if !config.xmp.is_empty() {
            image.set_xmp(&config.xmp)?;
        }
        if let Some(orientation) = orientation {
            orientation::write_transform(image.raw(), orientation.transform());
        }

        Ok(Self {
            handle,
            image,
            first_frame: true,
            frames: 0,
        })
    }

    /// Canvas width
    pub fn width(&self) -> u32 {
        self.image.raw_ref().width
    }

    /// Canvas height
    pub fn height(&self) -> u32 {
        self.image.raw_ref().height
    }

    /// Frames successfully added so far
    pub fn frames_added(&self) -> u32 {
        self.frames
    }

    /// Thread count handed to libavif
    pub fn max_threads(&self) -> u32 {
        u32::try_from(self.handle.raw_ref().maxThreads).unwrap_or(0)
    }

    /// Whether libavif picks the tile layout
    pub fn autotiling(&self) -> bool {
        self.handle.raw_ref().autoTiling != 0
    }

    /// `(rows_log2, cols_log2)` tile layout handed to libavif
    ///
    /// Both are 0 while [`autotiling`](Self::autotiling) is on.
    pub fn tile_log2(&self) -> (i32, i32) {
        let enc = self.handle.raw_ref();
        (enc.tileRowsLog2, enc.tileColsLog2)
    }

    /// Append one frame of interleaved 8-bit pixels
    ///
    /// `pixels` must be exactly `width * channels * height` bytes with no row
    /// padding. `duration` is in milliseconds. Pass `is_single_frame` for a
    /// still image.
    pub fn add(
        &mut self,
        pixels: &[u8],
        duration: u64,
        width: u32,
        height: u32,
        layout: PixelLayout,
        is_single_frame: bool,
    ) -> Result<()> {
        let canvas = self.image.raw_ref();
        if canvas.width != width || canvas.height != height {
            return Err(at(Error::DimensionMismatch {
                canvas_width: canvas.width,
                canvas_height: canvas.height,
                width,
                height,
            }));
        }

        let mut transient = None;
        if !self.first_frame {
            transient = Some(self.image.sequence_frame()?);
        }
        let frame = transient.as_mut().unwrap_or(&mut self.image);

        let mut rgb = RgbPixels::for_image(frame.raw_ref());
        rgb.settings().depth = 8;
        rgb.settings().format = layout.native();
        rgb.allocate()?;
        let (row_bytes, rows) = (rgb.row_bytes(), rgb.height());
        let dst = rgb.pixels_mut();
        if dst.len() != pixels.len() {
            return Err(at(Error::SizeMismatch {
                row_bytes,
                height: rows,
                expected: u64::from(row_bytes) * u64::from(rows),
                actual: pixels.len(),
            }));
        }
        dst.copy_from_slice(pixels);

        // SAFETY: frame and rgb are live and describe the same canvas
        let result = unsafe { sys::avifImageRGBToYUV(frame.as_ptr(), rgb.as_ptr()) };
        check(result, "Conversion to YUV failed")?;

        let flags = if is_single_frame {
            sys::AVIF_ADD_IMAGE_FLAG_SINGLE
        } else {
            sys::AVIF_ADD_IMAGE_FLAG_NONE
        };
        // SAFETY: encoder and frame are live; libavif copies what it keeps
        let result = unsafe {
            sys::avifEncoderAddImage(
                self.handle.as_ptr(),
                frame.as_ptr(),
                duration,
                flags as sys::avifAddImageFlags,
            )
        };
        check(result, "Failed to encode image")?;

        self.first_frame = false;
        self.frames += 1;
        Ok(())
    }

    /// Append an RGB8 frame
    pub fn add_rgb8(
        &mut self,
        img: ImgRef<'_, Rgb<u8>>,
        duration: u64,
        is_single_frame: bool,
    ) -> Result<()> {
        let (width, height) = dimensions(img)?;
        let bytes = packed_bytes(img);
        self.add(&bytes, duration, width, height, PixelLayout::Rgb, is_single_frame)
    }

    /// Append an RGBA8 frame
    pub fn add_rgba8(
        &mut self,
        img: ImgRef<'_, Rgba<u8>>,
        duration: u64,
        is_single_frame: bool,
    ) -> Result<()> {
        let (width, height) = dimensions(img)?;
        let bytes = packed_bytes(img);
        self.add(&bytes, duration, width, height, PixelLayout::Rgba, is_single_frame)
    }

    /// Finalize the sequence and return the AVIF file
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        let mut output = RwData::default();
        // SAFETY: encoder is live; output is freed by RwData
        let result = unsafe { sys::avifEncoderFinish(self.handle.as_ptr(), output.as_mut_ptr()) };
        check(result, "Failed to finish encoding")?;
        let bytes = output.to_vec();
        debug!("avif encoder finished: {} frames, {} bytes", self.frames, bytes.len());
        Ok(bytes)
    }
}

fn dimensions<T>(img: ImgRef<'_, T>) -> Result<(u32, u32)> {
    let width = u32::try_from(img.width());
    let height = u32::try_from(img.height());
    match (width, height) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(at(Error::invalid("invalid canvas dimensions"))),
    }
}

/// Pixel bytes without row padding
fn packed_bytes<'a, T: bytemuck::Pod>(img: ImgRef<'a, T>) -> Cow<'a, [u8]> {
    let (width, height) = (img.width(), img.height());
    if img.stride() == width {
        let buf: &'a [T] = img.into_buf();
        Cow::Borrowed(bytemuck::cast_slice(&buf[..width * height]))
    } else {
        Cow::Owned(
            img.rows()
                .flat_map(|row| bytemuck::cast_slice::<T, u8>(row).iter().copied())
                .collect(),
        )
    }
}

/// Encode a single 8-bit RGB image to AVIF
///
/// # Example
///
/// ```no_run
/// use avifglue::{encode_rgb8, EncoderConfig};
/// use imgref::ImgVec;
/// use rgb::Rgb;
///
/// let img = ImgVec::new(vec![Rgb::new(255u8, 0, 0); 64 * 64], 64, 64);
/// let avif = encode_rgb8(img.as_ref(), &EncoderConfig::new().quality(90))?;
/// # Ok::<(), whereat::At<avifglue::Error>>(())
/// ```
pub fn encode_rgb8(img: ImgRef<'_, Rgb<u8>>, config: &EncoderConfig) -> Result<Vec<u8>> {
    let (width, height) = dimensions(img)?;
    let mut encoder = Encoder::new(width, height, config)?;
    encoder.add_rgb8(img, 1, true)?;
    encoder.finish()
}

/// Encode a single 8-bit RGBA image to AVIF
pub fn encode_rgba8(img: ImgRef<'_, Rgba<u8>>, config: &EncoderConfig) -> Result<Vec<u8>> {
    let (width, height) = dimensions(img)?;
    let mut encoder = Encoder::new(width, height, config)?;
    encoder.add_rgba8(img, 1, true)?;
    encoder.finish()
}
