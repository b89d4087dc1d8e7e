//! AVIF decoding via libavif
//!
//! [`Decoder::new`] parses the container up front; [`Decoder::info`] is then
//! free and [`Decoder::frame`] decodes any frame, in any order, as often as
//! needed.

use crate::Result;
use crate::config::{ChromaUpsampling, DecoderConfig, PixelLayout};
use crate::error::Error;
use crate::ffi::{self, Capabilities, DecoderHandle, RgbPixels, check};
use crate::image::DecodedImage;
use crate::orientation::{self, Orientation};
use crate::threads;
use imgref::ImgVec;
use libavif_sys as sys;
use log::debug;
use rgb::{Rgb, Rgba};
use std::sync::Arc;
use whereat::at;

/// Container-level facts about an AVIF file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// 1 for still images
    pub frame_count: u32,
    /// RGBA when the file has an alpha plane
    pub layout: PixelLayout,
    pub icc: Option<Vec<u8>>,
    pub exif: Option<Vec<u8>>,
    /// Display orientation from `irot`/`imir`
    pub orientation: Orientation,
    pub xmp: Option<Vec<u8>>,
}

impl ImageInfo {
    /// "RGBA" or "RGB"
    pub fn mode(&self) -> &'static str {
        self.layout.mode()
    }

    fn read(decoder: &sys::avifDecoder, image: &sys::avifImage) -> Self {
        let layout = if decoder.alphaPresent != 0 {
            PixelLayout::Rgba
        } else {
            PixelLayout::Rgb
        };
        Self {
            width: image.width,
            height: image.height,
            frame_count: u32::try_from(decoder.imageCount).unwrap_or(0),
            layout,
            icc: ffi::rw_bytes(&image.icc),
            exif: ffi::rw_bytes(&image.exif),
            orientation: Orientation::from_transform(orientation::read_transform(image)),
            xmp: ffi::rw_bytes(&image.xmp),
        }
    }
}

/// One decoded frame of interleaved 8-bit pixels
#[derive(Debug, Clone)]
pub struct Frame {
    /// `row_bytes * height` bytes
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub row_bytes: u32,
    pub layout: PixelLayout,
    /// Ticks per second for `pts` and `duration`
    pub timescale: u64,
    pub pts: u64,
    pub duration: u64,
}

impl Frame {
    /// Presentation time in whole milliseconds
    pub fn timestamp_ms(&self) -> u64 {
        ticks_to_ms(self.pts, self.timescale)
    }

    /// Display duration in whole milliseconds
    pub fn duration_ms(&self) -> u64 {
        ticks_to_ms(self.duration, self.timescale)
    }

    /// Stride in pixels, if `row_bytes` and `pixels` can hold the frame
    fn stride(&self) -> Option<usize> {
        let channels = self.layout.channels();
        let row_bytes = self.row_bytes as usize;
        let row_len = (self.width as usize).checked_mul(channels)?;
        if row_bytes == 0 || row_bytes % channels != 0 || row_bytes < row_len {
            return None;
        }
        let needed = match (self.height as usize).checked_sub(1) {
            None => 0,
            Some(rows) => rows.checked_mul(row_bytes)?.checked_add(row_len)?,
        };
        (self.pixels.len() >= needed).then_some(row_bytes / channels)
    }

    /// Typed view of the pixels
    pub fn into_image(self) -> Result<DecodedImage> {
        let width = self.width as usize;
        let height = self.height as usize;
        let stride = self.stride().ok_or_else(|| {
            at(Error::invalid(format!(
                "frame buffer of {} bytes does not fit {}x{} {} with row_bytes {}",
                self.pixels.len(),
                self.width,
                self.height,
                self.layout.mode(),
                self.row_bytes
            )))
        })?;
        let malformed = |_| at(Error::invalid("frame buffer is not a whole number of pixels"));
        Ok(match self.layout {
            PixelLayout::Rgb => {
                let buf: Vec<Rgb<u8>> = bytemuck::try_cast_slice(&self.pixels)
                    .map_err(malformed)?
                    .to_vec();
                DecodedImage::Rgb8(ImgVec::new_stride(buf, width, height, stride))
            }
            PixelLayout::Rgba => {
                let buf: Vec<Rgba<u8>> = bytemuck::try_cast_slice(&self.pixels)
                    .map_err(malformed)?
                    .to_vec();
                DecodedImage::Rgba8(ImgVec::new_stride(buf, width, height, stride))
            }
        })
    }
}

fn ticks_to_ms(ticks: u64, timescale: u64) -> u64 {
    if timescale == 0 {
        return 0;
    }
    let ms = (u128::from(ticks) * 1000 + u128::from(timescale) / 2) / u128::from(timescale);
    u64::try_from(ms).unwrap_or(u64::MAX)
}

/// AVIF decoder session over an in-memory file
///
/// # Example
///
/// ```no_run
/// use avifglue::{Decoder, DecoderConfig};
///
/// let data = std::fs::read("image.avif").unwrap();
/// let mut decoder = Decoder::new(data, &DecoderConfig::new())?;
/// let info = decoder.info().clone();
/// for index in 0..info.frame_count {
///     let frame = decoder.frame(index)?;
///     println!("frame {index} at {} ms", frame.timestamp_ms());
/// }
/// # Ok::<(), whereat::At<avifglue::Error>>(())
/// ```
pub struct Decoder {
    // Declared before `data` so libavif is torn down before the bytes it reads.
    handle: DecoderHandle,
    data: Arc<[u8]>,
    upsampling: ChromaUpsampling,
    info: ImageInfo,
}

impl core::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Decoder")
            .field("len", &self.data.len())
            .field("upsampling", &self.upsampling)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl Decoder {
    /// Bind a decoder to `data` and parse its container
    pub fn new(data: impl Into<Arc<[u8]>>, config: &DecoderConfig) -> Result<Self> {
        let data = data.into();
        if config.codec != "auto" && !ffi::decoder_codec_available(&config.codec) {
            return Err(at(Error::invalid("Invalid opening codec")));
        }
        let codec = ffi::codec_choice(&config.codec)?;
        let max_threads = threads::resolve_max_threads(config.threads);

        let mut handle = DecoderHandle::new()?;
        {
            let dec = handle.raw();
            dec.maxThreads = threads::native_threads(max_threads);
            dec.codecChoice = codec;
            if Capabilities::LINKED.strict_flags {
                let relaxed = (sys::AVIF_STRICT_CLAP_VALID | sys::AVIF_STRICT_PIXI_REQUIRED)
                    as sys::avifStrictFlags;
                dec.strictFlags &= !relaxed;
            }
        }

        // SAFETY: `data` is kept alive in the session and dropped after `handle`
        let result =
            unsafe { sys::avifDecoderSetIOMemory(handle.as_ptr(), data.as_ptr(), data.len()) };
        check(result, "Setting IO memory failed")?;
        // SAFETY: IO is set on a live decoder
        let result = unsafe { sys::avifDecoderParse(handle.as_ptr()) };
        check(result, "Failed to decode image")?;

        let image = handle
            .image()
            .ok_or_else(|| at(ffi::codec_error(sys::AVIF_RESULT_NO_CONTENT, "Failed to decode image")))?;
        let info = ImageInfo::read(handle.raw_ref(), image);
        debug!(
            "avif decoder {}x{} frames={} mode={} threads={max_threads}",
            info.width,
            info.height,
            info.frame_count,
            info.mode()
        );

        Ok(Self {
            handle,
            data,
            upsampling: config.upsampling,
            info,
        })
    }

    /// Metadata read at creation
    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    /// Decode frame `index` to 8-bit RGB or RGBA
    pub fn frame(&mut self, index: u32) -> Result<Frame> {
        // SAFETY: decoder is live and parsed
        let result = unsafe { sys::avifDecoderNthImage(self.handle.as_ptr(), index) };
        check(result, &format!("Failed to decode frame {index}"))?;

        let image = self.handle.image().ok_or_else(|| {
            at(ffi::codec_error(
                sys::AVIF_RESULT_NO_CONTENT,
                format!("Failed to decode frame {index}"),
            ))
        })?;
        let layout = self.info.layout;
        let mut rgb = RgbPixels::for_image(image);
        {
            let settings = rgb.settings();
            settings.depth = 8;
            settings.format = layout.native();
            settings.chromaUpsampling = self.upsampling.native();
        }
        // fails on size overflow before anything is written
        rgb.allocate()?;
        // SAFETY: image belongs to the live decoder; rgb was sized from it
        let result = unsafe { sys::avifImageYUVToRGB(image, rgb.as_mut_ptr()) };
        check(result, "Conversion from YUV failed")?;

        let dec = self.handle.raw_ref();
        Ok(Frame {
            pixels: rgb.pixels().to_vec(),
            width: rgb.width(),
            height: rgb.height(),
            row_bytes: rgb.row_bytes(),
            layout,
            timescale: dec.timescale,
            pts: dec.imageTiming.ptsInTimescales,
            duration: dec.imageTiming.durationInTimescales,
        })
    }
}
