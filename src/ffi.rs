//! Owned libavif handles
//!
//! Every libavif allocation the sessions make is held by exactly one value in
//! this module, and that value's `Drop` is the only place it gets freed. The
//! encoder and decoder sessions never call a libavif destroy/free function
//! directly.

use crate::error::{Error, ErrorKind, Result};
use core::ffi::{CStr, c_char};
use core::ptr::NonNull;
use libavif_sys as sys;
use std::ffi::CString;
use whereat::at;

/// libavif version the crate was built against, as `MMmmpp00`-style integer
/// (`1.0.4` is `1_000_400`)
pub const LIBAVIF_VERSION: u32 = (sys::AVIF_VERSION_MAJOR as u32) * 1_000_000
    + (sys::AVIF_VERSION_MINOR as u32) * 10_000
    + (sys::AVIF_VERSION_PATCH as u32) * 100;

/// Feature set of a libavif generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `avifEncoder::quality` replaces the min/max quantizer pair (1.0.0)
    pub scalar_quality: bool,
    /// `avifEncoderSetCodecSpecificOption` exists (0.8.2)
    pub codec_specific_options: bool,
    /// `avifDecoder::strictFlags` can relax `clap`/`pixi` checks (0.9.2)
    pub strict_flags: bool,
    /// `avifImage::alphaPremultiplied` is honoured (0.9.0)
    pub premultiplied_alpha: bool,
    /// `avifEncoder::autoTiling` exists (0.11.0)
    pub native_autotiling: bool,
}

impl Capabilities {
    /// Capabilities of the linked libavif
    pub const LINKED: Self = Self::for_version(LIBAVIF_VERSION);

    /// Capabilities of a given libavif version number
    pub const fn for_version(version: u32) -> Self {
        Self {
            scalar_quality: version >= 1_000_000,
            codec_specific_options: version >= 80_200,
            strict_flags: version >= 90_200,
            premultiplied_alpha: version >= 90_000,
            native_autotiling: version >= 110_000,
        }
    }
}

/// Map a native `avifResult` onto an [`ErrorKind`]
pub(crate) fn classify_result(code: i32) -> ErrorKind {
    match code as sys::avifResult {
        sys::AVIF_RESULT_INVALID_EXIF_PAYLOAD | sys::AVIF_RESULT_INVALID_CODEC_SPECIFIC_OPTION => {
            ErrorKind::InvalidArgument
        }
        sys::AVIF_RESULT_INVALID_FTYP
        | sys::AVIF_RESULT_BMFF_PARSE_FAILED
        | sys::AVIF_RESULT_TRUNCATED_DATA
        | sys::AVIF_RESULT_NO_CONTENT => ErrorKind::MalformedInput,
        sys::AVIF_RESULT_OUT_OF_MEMORY => ErrorKind::ResourceExhausted,
        _ => ErrorKind::Runtime,
    }
}

pub(crate) fn codec_error(result: sys::avifResult, context: impl Into<String>) -> Error {
    // SAFETY: avifResultToString returns a static string for every value
    let message = unsafe { lossy_str(sys::avifResultToString(result)) };
    Error::Codec {
        code: result as i32,
        context: context.into(),
        message,
    }
}

/// Turn a native result into `Ok(())` or a located [`Error::Codec`]
#[track_caller]
pub(crate) fn check(result: sys::avifResult, context: &str) -> Result<()> {
    if result == sys::AVIF_RESULT_OK {
        Ok(())
    } else {
        Err(at(codec_error(result, context)))
    }
}

/// # Safety
///
/// `ptr` must be null or point at a NUL-terminated string.
unsafe fn lossy_str(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // SAFETY: guaranteed by the caller
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

fn c_string(value: &[u8], what: &'static str) -> Result<CString> {
    CString::new(value).map_err(|_| at(Error::invalid(what)))
}

/// Copy a libavif byte payload, `None` when empty
pub(crate) fn rw_bytes(data: &sys::avifRWData) -> Option<Vec<u8>> {
    if data.size == 0 || data.data.is_null() {
        return None;
    }
    // SAFETY: libavif keeps `size` readable bytes behind `data`
    Some(unsafe { core::slice::from_raw_parts(data.data, data.size) }.to_vec())
}

/// Resolve a codec name to a native choice; "auto" lets libavif pick
pub(crate) fn codec_choice(name: &str) -> Result<sys::avifCodecChoice> {
    if name == "auto" {
        return Ok(sys::AVIF_CODEC_CHOICE_AUTO);
    }
    let name = c_string(name.as_bytes(), "Invalid codec name")?;
    // SAFETY: name is NUL-terminated and outlives the call
    Ok(unsafe { sys::avifCodecChoiceFromName(name.as_ptr()) })
}

fn codec_available(name: &str, flag: sys::avifCodecFlag) -> bool {
    let Ok(name) = CString::new(name) else {
        return false;
    };
    // SAFETY: name is NUL-terminated and outlives the call
    let choice = unsafe { sys::avifCodecChoiceFromName(name.as_ptr()) };
    if choice == sys::AVIF_CODEC_CHOICE_AUTO {
        return false;
    }
    // SAFETY: plain lookup in libavif's static codec table
    !unsafe { sys::avifCodecName(choice, flag as sys::avifCodecFlags) }.is_null()
}

/// Whether libavif was built with a backend of this name that can decode
///
/// "auto" and unknown names report `false`.
pub fn decoder_codec_available(name: &str) -> bool {
    codec_available(name, sys::AVIF_CODEC_FLAG_CAN_DECODE)
}

/// Whether libavif was built with a backend of this name that can encode
///
/// "auto" and unknown names report `false`.
pub fn encoder_codec_available(name: &str) -> bool {
    codec_available(name, sys::AVIF_CODEC_FLAG_CAN_ENCODE)
}

/// Version string of the linked libavif
pub fn libavif_version() -> String {
    // SAFETY: avifVersion returns a static string
    unsafe { lossy_str(sys::avifVersion()) }
}

/// `(major, minor, patch)` of the libavif headers the crate was built with
pub fn version_tuple() -> (u32, u32, u32) {
    (
        sys::AVIF_VERSION_MAJOR as u32,
        sys::AVIF_VERSION_MINOR as u32,
        sys::AVIF_VERSION_PATCH as u32,
    )
}

/// Names and versions of every backend compiled into libavif
pub fn codec_versions() -> String {
    // libavif documents 256 bytes as sufficient
    let mut buf = [0 as c_char; 256];
    // SAFETY: buf is 256 bytes and avifCodecVersions NUL-terminates
    unsafe {
        sys::avifCodecVersions(buf.as_mut_ptr());
        lossy_str(buf.as_ptr())
    }
}

/// Owned `avifEncoder`
pub(crate) struct EncoderHandle(NonNull<sys::avifEncoder>);

impl EncoderHandle {
    pub(crate) fn new() -> Result<Self> {
        // SAFETY: no preconditions
        let ptr = unsafe { sys::avifEncoderCreate() };
        NonNull::new(ptr)
            .map(Self)
            .ok_or_else(|| at(Error::OutOfMemory("Can't allocate encoder")))
    }

    pub(crate) fn as_ptr(&self) -> *mut sys::avifEncoder {
        self.0.as_ptr()
    }

    pub(crate) fn raw(&mut self) -> &mut sys::avifEncoder {
        // SAFETY: uniquely owned, valid until drop
        unsafe { self.0.as_mut() }
    }

    pub(crate) fn raw_ref(&self) -> &sys::avifEncoder {
        // SAFETY: uniquely owned, valid until drop
        unsafe { self.0.as_ref() }
    }

    pub(crate) fn set_codec_option(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(at(Error::invalid("Invalid advanced codec options")));
        }
        let key = c_string(key, "Invalid advanced codec options")?;
        let value = c_string(value, "Invalid advanced codec options")?;
        // SAFETY: encoder is live; libavif copies both strings
        let result = unsafe {
            sys::avifEncoderSetCodecSpecificOption(self.as_ptr(), key.as_ptr(), value.as_ptr())
        };
        check(result, "Setting advanced codec options failed")
    }
}

impl Drop for EncoderHandle {
    fn drop(&mut self) {
        // SAFETY: created by avifEncoderCreate, destroyed once
        unsafe { sys::avifEncoderDestroy(self.0.as_ptr()) }
    }
}

// SAFETY: libavif handles carry no thread affinity; `&mut` access keeps use
// single-threaded.
unsafe impl Send for EncoderHandle {}

/// Owned `avifDecoder`
pub(crate) struct DecoderHandle(NonNull<sys::avifDecoder>);

impl DecoderHandle {
    pub(crate) fn new() -> Result<Self> {
        // SAFETY: no preconditions
        let ptr = unsafe { sys::avifDecoderCreate() };
        NonNull::new(ptr)
            .map(Self)
            .ok_or_else(|| at(Error::OutOfMemory("Can't allocate decoder")))
    }

    pub(crate) fn as_ptr(&self) -> *mut sys::avifDecoder {
        self.0.as_ptr()
    }

    pub(crate) fn raw(&mut self) -> &mut sys::avifDecoder {
        // SAFETY: uniquely owned, valid until drop
        unsafe { self.0.as_mut() }
    }

    pub(crate) fn raw_ref(&self) -> &sys::avifDecoder {
        // SAFETY: uniquely owned, valid until drop
        unsafe { self.0.as_ref() }
    }

    /// The decoder's current image, refreshed by parse and every frame decode
    pub(crate) fn image(&self) -> Option<&sys::avifImage> {
        // SAFETY: libavif owns the image for the decoder's lifetime
        unsafe { self.raw_ref().image.as_ref() }
    }
}

impl Drop for DecoderHandle {
    fn drop(&mut self) {
        // SAFETY: created by avifDecoderCreate, destroyed once
        unsafe { sys::avifDecoderDestroy(self.0.as_ptr()) }
    }
}

// SAFETY: see EncoderHandle
unsafe impl Send for DecoderHandle {}

/// Owned `avifImage`
pub(crate) struct ImageHandle(NonNull<sys::avifImage>);

impl ImageHandle {
    pub(crate) fn new() -> Result<Self> {
        // SAFETY: no preconditions
        let ptr = unsafe { sys::avifImageCreateEmpty() };
        NonNull::new(ptr)
            .map(Self)
            .ok_or_else(|| at(Error::OutOfMemory("Image creation failed")))
    }

    /// Empty image sharing canvas and colour description with `self`
    pub(crate) fn sequence_frame(&self) -> Result<Self> {
        let mut frame = Self::new()?;
        let src = self.raw_ref();
        let dst = frame.raw();
        dst.width = src.width;
        dst.height = src.height;
        dst.colorPrimaries = src.colorPrimaries;
        dst.transferCharacteristics = src.transferCharacteristics;
        dst.matrixCoefficients = src.matrixCoefficients;
        dst.yuvRange = src.yuvRange;
        dst.yuvFormat = src.yuvFormat;
        dst.depth = src.depth;
        dst.alphaPremultiplied = src.alphaPremultiplied;
        Ok(frame)
    }

    pub(crate) fn as_ptr(&self) -> *mut sys::avifImage {
        self.0.as_ptr()
    }

    pub(crate) fn raw(&mut self) -> &mut sys::avifImage {
        // SAFETY: uniquely owned, valid until drop
        unsafe { self.0.as_mut() }
    }

    pub(crate) fn raw_ref(&self) -> &sys::avifImage {
        // SAFETY: uniquely owned, valid until drop
        unsafe { self.0.as_ref() }
    }

    pub(crate) fn set_icc(&mut self, icc: &[u8]) -> Result<()> {
        // SAFETY: libavif copies `icc`
        let result = unsafe { sys::avifImageSetProfileICC(self.as_ptr(), icc.as_ptr(), icc.len()) };
        check(result, "Setting ICC profile failed")
    }

    pub(crate) fn set_exif(&mut self, exif: &[u8]) -> Result<()> {
        // SAFETY: libavif copies `exif`
        let result =
            unsafe { sys::avifImageSetMetadataExif(self.as_ptr(), exif.as_ptr(), exif.len()) };
        check(result, "Setting EXIF data failed")
    }

    pub(crate) fn set_xmp(&mut self, xmp: &[u8]) -> Result<()> {
        // SAFETY: libavif copies `xmp`
        let result =
            unsafe { sys::avifImageSetMetadataXMP(self.as_ptr(), xmp.as_ptr(), xmp.len()) };
        check(result, "Setting XMP data failed")
    }
}

impl Drop for ImageHandle {
    fn drop(&mut self) {
        // SAFETY: created by avifImageCreateEmpty, destroyed once
        unsafe { sys::avifImageDestroy(self.0.as_ptr()) }
    }
}

// SAFETY: see EncoderHandle
unsafe impl Send for ImageHandle {}

/// `avifRGBImage` plus its pixel allocation
///
/// The pixel buffer is freed on drop only if `allocate` succeeded.
pub(crate) struct RgbPixels {
    rgb: sys::avifRGBImage,
    allocated: bool,
}

impl RgbPixels {
    /// Defaults derived from `image`: its size and depth, RGBA layout
    pub(crate) fn for_image(image: &sys::avifImage) -> Self {
        let mut rgb = sys::avifRGBImage::default();
        // SAFETY: both pointers are valid for the call
        unsafe { sys::avifRGBImageSetDefaults(&mut rgb, image) };
        Self {
            rgb,
            allocated: false,
        }
    }

    /// Settings that must be fixed before `allocate`
    pub(crate) fn settings(&mut self) -> &mut sys::avifRGBImage {
        &mut self.rgb
    }

    /// Bytes a packed buffer for the current settings needs, if addressable
    pub(crate) fn packed_len(&self) -> Option<usize> {
        // SAFETY: rgb was initialised by avifRGBImageSetDefaults
        let pixel_size = unsafe { sys::avifRGBImagePixelSize(&self.rgb) };
        let row_bytes = u32::try_from(u64::from(self.rgb.width) * u64::from(pixel_size)).ok()?;
        usize::try_from(row_bytes)
            .ok()?
            .checked_mul(usize::try_from(self.rgb.height).ok()?)
            .filter(|&len| len <= isize::MAX as usize)
    }

    /// Allocate the pixel buffer; the size is checked before libavif sees it
    pub(crate) fn allocate(&mut self) -> Result<()> {
        if self.packed_len().is_none() {
            return Err(at(Error::OutOfMemory("Integer overflow in pixel size")));
        }
        // SAFETY: rgb was initialised by avifRGBImageSetDefaults
        let result = unsafe { sys::avifRGBImageAllocatePixels(&mut self.rgb) };
        check(result, "Pixel allocation failed")?;
        self.allocated = true;
        Ok(())
    }

    pub(crate) fn as_ptr(&self) -> *const sys::avifRGBImage {
        &self.rgb
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut sys::avifRGBImage {
        &mut self.rgb
    }

    pub(crate) fn width(&self) -> u32 {
        self.rgb.width
    }

    pub(crate) fn height(&self) -> u32 {
        self.rgb.height
    }

    pub(crate) fn row_bytes(&self) -> u32 {
        self.rgb.rowBytes
    }

    /// `row_bytes * height`, or `None` if that is not addressable
    pub(crate) fn byte_len(&self) -> Option<usize> {
        let row_bytes = usize::try_from(self.rgb.rowBytes).ok()?;
        let height = usize::try_from(self.rgb.height).ok()?;
        row_bytes
            .checked_mul(height)
            .filter(|&len| len <= isize::MAX as usize)
    }

    pub(crate) fn pixels(&self) -> &[u8] {
        match self.byte_len() {
            // SAFETY: allocation holds rowBytes * height bytes
            Some(len) if self.allocated && !self.rgb.pixels.is_null() => unsafe {
                core::slice::from_raw_parts(self.rgb.pixels, len)
            },
            _ => &[],
        }
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        match self.byte_len() {
            // SAFETY: allocation holds rowBytes * height bytes, uniquely borrowed
            Some(len) if self.allocated && !self.rgb.pixels.is_null() => unsafe {
                core::slice::from_raw_parts_mut(self.rgb.pixels, len)
            },
            _ => &mut [],
        }
    }
}

impl Drop for RgbPixels {
    fn drop(&mut self) {
        if self.allocated {
            // SAFETY: allocated by avifRGBImageAllocatePixels
            unsafe { sys::avifRGBImageFreePixels(&mut self.rgb) }
        }
    }
}

/// Owned `avifRWData` output buffer
#[derive(Default)]
pub(crate) struct RwData(sys::avifRWData);

impl RwData {
    pub(crate) fn as_mut_ptr(&mut self) -> *mut sys::avifRWData {
        &mut self.0
    }

    pub(crate) fn to_vec(&self) -> Vec<u8> {
        rw_bytes(&self.0).unwrap_or_default()
    }
}

impl Drop for RwData {
    fn drop(&mut self) {
        // SAFETY: safe on empty data; frees at most once
        unsafe { sys::avifRWDataFree(&mut self.0) }
    }
}
