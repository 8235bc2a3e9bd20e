//! Error types for the wire codec.
//!
//! The taxonomy separates framing errors (the header fields cannot be
//! trusted), EOF conditions (the peer went away), registry misses, and
//! body serialisation failures.
//!
//! # Error Categories
//!
//! - [`FramingError`]: header values out of range, truncated buffers, or an over-long text line.
//! - [`EofError`]: end-of-stream at or inside a frame.
//! - [`CodecError`]: top-level enum wrapping the categories above plus I/O errors and registry
//!   lookups.

use std::{error::Error as StdError, io};

use thiserror::Error;

/// Boxed error produced by message body serialisers.
pub type BodyError = Box<dyn StdError + Send + Sync>;

/// Framing-level errors found while decoding frame headers.
///
/// Any of these leaves the stream misaligned, so a session that observes one
/// is torn down.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// The decoded message type exceeds [`MAX_TYPE`](super::MAX_TYPE), or the
    /// varint ended before its final byte.
    #[error("message type overflow")]
    TypeOverflow,

    /// The decoded body size exceeds [`MAX_SIZE`](super::MAX_SIZE), or the
    /// varint ended before its final byte.
    #[error("message size overflow")]
    SizeOverflow,

    /// A buffer ended before a complete encoded message was available.
    #[error("incomplete message: have {have} bytes, need {need}")]
    Incomplete {
        /// Bytes currently available.
        have: usize,
        /// Bytes required to finish the message.
        need: usize,
    },

    /// A legacy text line was longer than the configured bound.
    #[error("text line exceeds {max} bytes")]
    LineTooLong {
        /// Maximum accepted line length in bytes.
        max: usize,
    },
}

/// EOF conditions distinguishing a clean close from a truncated frame.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// The peer closed the stream exactly at a frame boundary.
    #[error("connection closed cleanly at frame boundary")]
    CleanClose,

    /// The peer closed the stream while a header varint was being read.
    #[error("premature EOF during header after {bytes_received} header bytes")]
    MidHeader {
        /// Header bytes received before EOF.
        bytes_received: usize,
    },

    /// The peer closed the stream while a frame body was being read.
    #[error("premature EOF: {remaining} of {expected} body bytes missing")]
    MidFrame {
        /// Bytes still owed by the peer.
        remaining: usize,
        /// Declared body size.
        expected: usize,
    },
}

/// Top-level codec error.
///
/// # Examples
///
/// ```
/// use sessionwire::codec::{CodecError, FramingError};
///
/// let err = CodecError::from(FramingError::SizeOverflow);
/// assert_eq!(err.error_type(), "framing");
/// assert!(!err.is_eof());
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// Header fields could not be decoded into valid values.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// The stream ended.
    #[error("EOF: {0}")]
    Eof(#[from] EofError),

    /// No constructor is registered for the decoded type.
    #[error("unrecognized message type: {0}")]
    UnrecognizedType(u32),

    /// The message body could not be serialised.
    #[error("failed to encode message body: {0}")]
    Encode(#[source] BodyError),

    /// The message body could not be deserialised.
    #[error("failed to decode message body: {0}")]
    Decode(#[source] BodyError),

    /// Transport I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Returns `true` when the error was caused by the peer closing the stream.
    #[must_use]
    pub fn is_eof(&self) -> bool { matches!(self, Self::Eof(_)) }

    /// Returns `true` for a close exactly at a frame boundary.
    #[must_use]
    pub fn is_clean_close(&self) -> bool { matches!(self, Self::Eof(EofError::CleanClose)) }

    /// Returns the error category as a string for logging and metrics.
    ///
    /// One of `"framing"`, `"eof"`, `"registry"`, `"body"`, or `"io"`.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::Eof(_) => "eof",
            Self::UnrecognizedType(_) => "registry",
            Self::Encode(_) | Self::Decode(_) => "body",
            Self::Io(_) => "io",
        }
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            CodecError::Eof(e) => io::Error::new(io::ErrorKind::UnexpectedEof, e),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
