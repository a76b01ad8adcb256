//! Bounds-checked field extraction from a frame buffer.
//!
//! All multi-byte integers are big-endian. Every read checks its bounds and
//! reports an [`ExtractError`] instead of panicking.

use std::time::Duration;

use smfdump_encoding::CodePage;
use thiserror::Error;

// ---------------------------------------------------------------------------
//  Errors
// ---------------------------------------------------------------------------

/// Failure to extract a primitive from a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// The read extends past the end of the buffer.
    #[error("{width}-byte read at offset {offset} exceeds {len}-byte buffer")]
    OutOfRange {
        offset: usize,
        width: usize,
        len: usize,
    },

    /// Integers are 1 to 8 bytes wide.
    #[error("unsupported integer width {width}")]
    BadWidth { width: usize },

    /// A byte outside the field's character set.
    #[error("byte 0x{byte:02X} at offset {offset} is not valid text")]
    Encoding { offset: usize, byte: u8 },
}

// ---------------------------------------------------------------------------
//  Field encodings
// ---------------------------------------------------------------------------

/// Unit of a raw scaled-time field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeScale {
    /// Microseconds.
    Microseconds,
    /// Hundredths of a second.
    Hundredths,
    /// Milliseconds.
    Milliseconds,
}

impl TimeScale {
    /// Convert a raw field value to a duration, saturating on overflow.
    pub fn to_duration(self, raw: u64) -> Duration {
        match self {
            TimeScale::Microseconds => Duration::from_micros(raw),
            TimeScale::Hundredths => Duration::from_millis(raw.saturating_mul(10)),
            TimeScale::Milliseconds => Duration::from_millis(raw),
        }
    }

    /// Convert a duration back to raw units, truncating sub-unit remainders.
    pub fn from_duration(self, duration: Duration) -> u64 {
        let raw = match self {
            TimeScale::Microseconds => duration.as_micros(),
            TimeScale::Hundredths => duration.as_millis() / 10,
            TimeScale::Milliseconds => duration.as_millis(),
        };
        u64::try_from(raw).unwrap_or(u64::MAX)
    }
}

/// Character set of a text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// EBCDIC in the session code page. Never fails.
    Ebcdic,
    /// 7-bit ASCII. Bytes at or above 0x80 are rejected.
    Ascii,
}

// ---------------------------------------------------------------------------
//  Readers
// ---------------------------------------------------------------------------

fn window(buffer: &[u8], offset: usize, width: usize) -> Result<&[u8], ExtractError> {
    offset
        .checked_add(width)
        .filter(|&end| end <= buffer.len())
        .map(|end| &buffer[offset..end])
        .ok_or(ExtractError::OutOfRange {
            offset,
            width,
            len: buffer.len(),
        })
}

/// Read a big-endian unsigned integer of `width` bytes (1..=8).
pub fn read_uint(buffer: &[u8], offset: usize, width: usize) -> Result<u64, ExtractError> {
    if width == 0 || width > 8 {
        return Err(ExtractError::BadWidth { width });
    }
    let bytes = window(buffer, offset, width)?;
    Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

/// Read an unsigned integer and scale it to a [`Duration`].
pub fn read_scaled_time(
    buffer: &[u8],
    offset: usize,
    width: usize,
    scale: TimeScale,
) -> Result<Duration, ExtractError> {
    read_uint(buffer, offset, width).map(|raw| scale.to_duration(raw))
}

/// Read a fixed-width text field with trailing fill removed.
///
/// EBCDIC fields are decoded through `code_page` and lose trailing 0x40;
/// ASCII fields lose trailing spaces.
pub fn read_text(
    buffer: &[u8],
    offset: usize,
    width: usize,
    encoding: TextEncoding,
    code_page: &CodePage,
) -> Result<String, ExtractError> {
    let bytes = window(buffer, offset, width)?;
    match encoding {
        TextEncoding::Ebcdic => Ok(code_page.decode_trimmed(bytes)),
        TextEncoding::Ascii => {
            if let Some(pos) = bytes.iter().position(|b| !b.is_ascii()) {
                return Err(ExtractError::Encoding {
                    offset: offset + pos,
                    byte: bytes[pos],
                });
            }
            let end = bytes
                .iter()
                .rposition(|&b| b != b' ')
                .map_or(0, |pos| pos + 1);
            Ok(bytes[..end].iter().map(|&b| char::from(b)).collect())
        }
    }
}
