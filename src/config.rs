//! Decoder configuration and the option enums shared by both sessions

use crate::error::Error;
use core::fmt;
use core::str::FromStr;
use libavif_sys as sys;

/// Configuration for AVIF decoding
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// libavif codec backend name, "auto" to let libavif choose
    pub(crate) codec: String,
    /// Chroma upsampling used by YUV to RGB conversion
    pub(crate) upsampling: ChromaUpsampling,
    /// Worker threads (0 = process default)
    pub(crate) threads: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            codec: "auto".to_owned(),
            upsampling: ChromaUpsampling::Automatic,
            threads: 0,
        }
    }
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the AV1 decoding backend by libavif name ("dav1d", "aom",
    /// "libgav1", ...)
    ///
    /// Checked when the decoder is created.
    pub fn codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    /// Set the chroma upsampling filter
    pub fn upsampling(mut self, upsampling: ChromaUpsampling) -> Self {
        self.upsampling = upsampling;
        self
    }

    /// Set the number of threads for decoding
    ///
    /// 0 means the cached CPU count, see [`crate::default_max_threads`].
    pub fn threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }
}

/// Chroma upsampling filter for YUV to RGB conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChromaUpsampling {
    /// libavif picks (best quality unless it has a faster exact path)
    #[default]
    Automatic,
    /// Fastest available filter
    Fastest,
    /// Best available filter
    BestQuality,
    /// Nearest neighbour
    Nearest,
    /// Bilinear
    Bilinear,
}

impl ChromaUpsampling {
    pub(crate) fn native(self) -> sys::avifChromaUpsampling {
        (match self {
            Self::Automatic => sys::AVIF_CHROMA_UPSAMPLING_AUTOMATIC,
            Self::Fastest => sys::AVIF_CHROMA_UPSAMPLING_FASTEST,
            Self::BestQuality => sys::AVIF_CHROMA_UPSAMPLING_BEST_QUALITY,
            Self::Nearest => sys::AVIF_CHROMA_UPSAMPLING_NEAREST,
            Self::Bilinear => sys::AVIF_CHROMA_UPSAMPLING_BILINEAR,
        }) as _
    }
}

impl FromStr for ChromaUpsampling {
    type Err = Error;

    /// Host names: "auto", "fastest", "best", "nearest", "bilinear"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Automatic),
            "fastest" => Ok(Self::Fastest),
            "best" => Ok(Self::BestQuality),
            "nearest" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            other => Err(Error::invalid(format!("Invalid upsampling option: {other}"))),
        }
    }
}

/// Chroma subsampling of the encoded YUV planes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subsampling {
    /// Luma only (monochrome)
    Yuv400,
    /// Half resolution chroma in both directions
    #[default]
    Yuv420,
    /// Half horizontal chroma resolution
    Yuv422,
    /// Full resolution chroma
    Yuv444,
}

impl Subsampling {
    pub(crate) fn native(self) -> sys::avifPixelFormat {
        (match self {
            Self::Yuv400 => sys::AVIF_PIXEL_FORMAT_YUV400,
            Self::Yuv420 => sys::AVIF_PIXEL_FORMAT_YUV420,
            Self::Yuv422 => sys::AVIF_PIXEL_FORMAT_YUV422,
            Self::Yuv444 => sys::AVIF_PIXEL_FORMAT_YUV444,
        }) as _
    }

    /// Host notation, e.g. "4:2:0"
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yuv400 => "4:0:0",
            Self::Yuv420 => "4:2:0",
            Self::Yuv422 => "4:2:2",
            Self::Yuv444 => "4:4:4",
        }
    }
}

impl fmt::Display for Subsampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subsampling {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "4:0:0" => Ok(Self::Yuv400),
            "4:2:0" => Ok(Self::Yuv420),
            "4:2:2" => Ok(Self::Yuv422),
            "4:4:4" => Ok(Self::Yuv444),
            other => Err(Error::invalid(format!("Invalid subsampling: {other}"))),
        }
    }
}

/// YUV sample range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YuvRange {
    /// 0..=255
    #[default]
    Full,
    /// 16..=235 (studio swing)
    Limited,
}

impl YuvRange {
    pub(crate) fn native(self) -> sys::avifRange {
        (match self {
            Self::Full => sys::AVIF_RANGE_FULL,
            Self::Limited => sys::AVIF_RANGE_LIMITED,
        }) as _
    }
}

impl FromStr for YuvRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "limited" => Ok(Self::Limited),
            _ => Err(Error::invalid("Invalid range")),
        }
    }
}

/// Interleaved 8-bit pixel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelLayout {
    /// 3 bytes per pixel
    #[default]
    Rgb,
    /// 4 bytes per pixel
    Rgba,
}

impl PixelLayout {
    /// Host mode string: "RGBA" is RGBA, everything else is RGB
    pub fn from_mode(mode: &str) -> Self {
        if mode == "RGBA" { Self::Rgba } else { Self::Rgb }
    }

    /// Host mode string
    pub fn mode(self) -> &'static str {
        match self {
            Self::Rgb => "RGB",
            Self::Rgba => "RGBA",
        }
    }

    /// Bytes per pixel
    pub fn channels(self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    pub(crate) fn native(self) -> sys::avifRGBFormat {
        (match self {
            Self::Rgb => sys::AVIF_RGB_FORMAT_RGB,
            Self::Rgba => sys::AVIF_RGB_FORMAT_RGBA,
        }) as _
    }
}

impl FromStr for PixelLayout {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_mode(s))
    }
}
