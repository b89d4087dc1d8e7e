//! Error types for avifglue

use core::fmt;

/// Broad failure class of an [`Error`]
///
/// Hosts use this to pick their own exception or status type. The Python
/// module maps it onto `ValueError`, `SyntaxError`, `MemoryError` and
/// `RuntimeError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed caller input; never worth retrying
    InvalidArgument,
    /// Corrupt, truncated or non-AVIF container data
    MalformedInput,
    /// Allocation failure or a buffer size that cannot be represented
    ResourceExhausted,
    /// Any other codec or session failure
    Runtime,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::MalformedInput => "malformed input",
            ErrorKind::ResourceExhausted => "resource exhausted",
            ErrorKind::Runtime => "runtime failure",
        })
    }
}

/// Error type for avifglue encode and decode sessions
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Rejected caller input
    #[error("{0}")]
    InvalidArgument(String),

    /// A frame does not match the encoder canvas
    #[error(
        "Image sequence dimensions mismatch, {canvas_width}x{canvas_height} != {width}x{height}"
    )]
    DimensionMismatch {
        /// Canvas width fixed at session creation
        canvas_width: u32,
        /// Canvas height fixed at session creation
        canvas_height: u32,
        /// Width of the rejected frame
        width: u32,
        /// Height of the rejected frame
        height: u32,
    },

    /// Pixel buffer length differs from row stride times height
    #[error("rgb data has incorrect size: {row_bytes} * {height} ({expected}) != {actual}")]
    SizeMismatch {
        /// Row stride of the native pixel buffer
        row_bytes: u32,
        /// Frame height
        height: u32,
        /// `row_bytes * height`
        expected: u64,
        /// Length of the caller's buffer
        actual: usize,
    },

    /// libavif returned a failing `avifResult`
    #[error("{context}: {message}")]
    Codec {
        /// Raw `avifResult` value
        code: i32,
        /// What was being attempted
        context: String,
        /// libavif's description of `code`
        message: String,
    },

    /// A native allocation failed or a size overflowed
    #[error("{0}")]
    OutOfMemory(&'static str),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::DimensionMismatch { .. } | Error::SizeMismatch { .. } => ErrorKind::Runtime,
            Error::Codec { code, .. } => crate::ffi::classify_result(*code),
            Error::OutOfMemory(_) => ErrorKind::ResourceExhausted,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

/// Result type for avifglue operations with location tracking
pub type Result<T, E = whereat::At<Error>> = core::result::Result<T, E>;
