//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding keys and values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before a fixed-width field was complete.
    #[error("unexpected end of input: needed {needed} bytes, got {actual}")]
    UnexpectedEof {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Unknown value tag byte.
    #[error("unknown value tag: {0}")]
    UnknownValueTag(u8),

    /// Unknown index type byte.
    #[error("unknown index type: {0}")]
    UnknownIndexType(u8),

    /// Value bytes do not have the width required by their tag.
    #[error("invalid value width for {tag}: expected {expected} bytes, got {actual}")]
    InvalidValueWidth {
        /// Name of the value tag.
        tag: &'static str,
        /// Expected width.
        expected: usize,
        /// Actual width.
        actual: usize,
    },

    /// String value is not valid UTF-8 or ASCII.
    #[error("invalid string for {tag}")]
    InvalidString {
        /// Name of the value tag.
        tag: &'static str,
    },

    /// A hashed blob was decoded without its payload.
    #[error("hashed blob payload missing for hash {hash:016x}")]
    MissingBlobPayload {
        /// The content hash.
        hash: u64,
    },

    /// Structural problem not covered by the other variants.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the error.
        message: String,
    },
}

impl CodecError {
    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }

    /// Create an unexpected end of input error.
    pub fn eof(needed: usize, actual: usize) -> Self {
        Self::UnexpectedEof { needed, actual }
    }
}
