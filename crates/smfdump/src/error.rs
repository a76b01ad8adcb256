//! Error types.
//!
//! [`DecodeError`] values travel inside the decode result sequence; they are
//! never used for control flow. [`SmfDumpError`] covers the failures that
//! happen before a session starts (configuration, layout registration,
//! opening the dump).

use std::fmt;
use std::io;

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::layout::LayoutError;

// ---------------------------------------------------------------------------
//  Frame faults
// ---------------------------------------------------------------------------

/// Why a frame length prefix was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFault {
    /// Shorter than the minimum frame size.
    TooShort,
    /// Longer than the configured maximum frame size.
    TooLong,
    /// Frames are padded to an even byte count.
    OddLength,
    /// The secondary record length does not agree with the frame length.
    LengthMismatch { record_length: u16 },
}

impl fmt::Display for FrameFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameFault::TooShort => f.write_str("below minimum frame size"),
            FrameFault::TooLong => f.write_str("above maximum frame size"),
            FrameFault::OddLength => f.write_str("odd length"),
            FrameFault::LengthMismatch { record_length } => {
                write!(f, "record length {record_length} disagrees with frame length")
            }
        }
    }
}

// ---------------------------------------------------------------------------
//  Decode errors
// ---------------------------------------------------------------------------

/// A decode failure, reported in place of a record.
///
/// Every variant carries the absolute stream offset where it was detected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum DecodeError {
    /// A frame claims more bytes than the stream has left.
    #[error("frame at offset {offset} declares {declared} bytes but only {available} remain")]
    #[diagnostic(code(smfdump::truncated))]
    Truncated {
        offset: u64,
        declared: u16,
        available: u64,
    },

    /// The frame length prefix is not self-consistent.
    #[error("bad frame length {length} at offset {offset}: {reason}")]
    #[diagnostic(
        code(smfdump::bad_frame_length),
        help("the reader resynchronizes by scanning forward one byte at a time")
    )]
    BadFrameLength {
        offset: u64,
        length: u16,
        reason: FrameFault,
    },

    /// A text field holds bytes its declared encoding cannot represent.
    #[error("field '{field}' at offset {offset} is not valid text")]
    #[diagnostic(code(smfdump::encoding_failure))]
    EncodingFailure { offset: u64, field: &'static str },

    /// A field of the subtype layout lies outside the frame.
    #[error("field '{field}' at offset {offset} lies outside the {record_length}-byte frame")]
    #[diagnostic(code(smfdump::offset_out_of_range))]
    OffsetOutOfRange {
        offset: u64,
        field: &'static str,
        record_length: usize,
    },

    /// The underlying byte source failed. Ends the session.
    #[error("source read failed at offset {offset}: {message}")]
    #[diagnostic(code(smfdump::source_failure))]
    SourceFailure {
        offset: u64,
        kind: io::ErrorKind,
        message: String,
    },
}

impl DecodeError {
    pub(crate) fn source_failure(offset: u64, err: &io::Error) -> Self {
        DecodeError::SourceFailure {
            offset,
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Absolute stream offset where the error was detected.
    pub fn offset(&self) -> u64 {
        match self {
            DecodeError::Truncated { offset, .. }
            | DecodeError::BadFrameLength { offset, .. }
            | DecodeError::EncodingFailure { offset, .. }
            | DecodeError::OffsetOutOfRange { offset, .. }
            | DecodeError::SourceFailure { offset, .. } => *offset,
        }
    }

    /// Framing errors describe the stream, not a particular record.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            DecodeError::Truncated { .. } | DecodeError::BadFrameLength { .. }
        )
    }

    /// Field errors consume their frame and leave the stream in sync.
    pub fn is_field(&self) -> bool {
        matches!(
            self,
            DecodeError::EncodingFailure { .. } | DecodeError::OffsetOutOfRange { .. }
        )
    }

    /// Whether the error ends the result sequence.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DecodeError::SourceFailure { .. })
    }

    /// Name of the failing field, for field errors.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            DecodeError::EncodingFailure { field, .. }
            | DecodeError::OffsetOutOfRange { field, .. } => Some(field),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
//  Setup errors
// ---------------------------------------------------------------------------

/// Errors raised while setting up a decode session.
#[derive(Debug, Error, Diagnostic)]
pub enum SmfDumpError {
    /// The dump could not be opened.
    #[error("cannot open dump: {0}")]
    #[diagnostic(code(smfdump::io))]
    Io(#[from] io::Error),

    /// Invalid decoder configuration.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    /// A record layout failed validation.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Layout(#[from] LayoutError),
}
