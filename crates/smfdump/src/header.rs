//! SMF frame header.
//!
//! Every frame starts with a 23-byte header:
//!
//! | Offset | Width | Field                                 |
//! |--------|-------|---------------------------------------|
//! | 0      | 2     | total frame length                    |
//! | 2      | 2     | reserved                              |
//! | 4      | 2     | record length (total length minus 4)  |
//! | 6      | 1     | segment                               |
//! | 7      | 1     | flags                                 |
//! | 8      | 1     | record family (SMF type)              |
//! | 9      | 1     | reserved                              |
//! | 10     | 4     | timestamp (opaque TOD value)          |
//! | 14     | 4     | system ID (EBCDIC)                    |
//! | 18     | 4     | subsystem ID (EBCDIC)                 |
//! | 22     | 1     | subtype                               |

use std::time::{Duration, SystemTime};

use smfdump_encoding::CodePage;

use crate::extract::{read_text, read_uint, ExtractError, TextEncoding};

/// Size of the fixed frame header in bytes.
pub const HEADER_SIZE: usize = 23;

/// Smallest acceptable frame: a header plus at least one payload byte.
pub const MIN_FRAME_SIZE: usize = 24;

/// Default upper bound on a frame length.
pub const DEFAULT_MAX_FRAME_SIZE: u16 = 32_760;

/// Bytes covered by the total length but not by the record length.
pub const LENGTH_PREFIX_SIZE: u16 = 4;

pub(crate) const TOTAL_LENGTH_OFFSET: usize = 0;
pub(crate) const RECORD_LENGTH_OFFSET: usize = 4;
pub(crate) const SEGMENT_OFFSET: usize = 6;
pub(crate) const FLAGS_OFFSET: usize = 7;
pub(crate) const FAMILY_OFFSET: usize = 8;
pub(crate) const TIMESTAMP_OFFSET: usize = 10;
pub(crate) const SYSTEM_ID_OFFSET: usize = 14;
pub(crate) const SUBSYSTEM_ID_OFFSET: usize = 18;
pub(crate) const SUBTYPE_OFFSET: usize = 22;
pub(crate) const ID_WIDTH: usize = 4;

// ---------------------------------------------------------------------------
//  Timestamp
// ---------------------------------------------------------------------------

/// Raw time-of-day value from the frame header.
///
/// The decoder treats it as an opaque tick count. Callers that know the
/// producing system's epoch and tick unit can convert it with
/// [`TodClock::to_system_time`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TodClock(pub u32);

impl TodClock {
    /// The raw tick count.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Interpret the tick count relative to `epoch`.
    ///
    /// Returns `None` if the result overflows.
    pub fn to_system_time(self, epoch: SystemTime, tick: Duration) -> Option<SystemTime> {
        tick.checked_mul(self.0).and_then(|d| epoch.checked_add(d))
    }
}

// ---------------------------------------------------------------------------
//  Header
// ---------------------------------------------------------------------------

/// Decoded frame header.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameHeader {
    /// Absolute stream offset of the frame.
    pub offset: u64,
    /// Total frame length including the length prefix.
    pub total_length: u16,
    /// Secondary record length.
    pub record_length: u16,
    /// Segment descriptor (0 for single-segment records).
    pub segment: u8,
    /// System indicator flags.
    pub flags: u8,
    /// SMF record type.
    pub record_family: u8,
    /// Time of day the record was written.
    pub timestamp: TodClock,
    /// System identifier.
    pub system_id: String,
    /// Subsystem identifier.
    pub subsystem_id: String,
    /// Record subtype.
    pub subtype: u8,
}

impl FrameHeader {
    /// Parse the header at the start of `frame`.
    ///
    /// `offset` is the absolute stream offset of the frame. Identifier
    /// fields are decoded through `code_page`.
    pub fn parse(frame: &[u8], offset: u64, code_page: &CodePage) -> Result<Self, ExtractError> {
        let id = |at: usize| read_text(frame, at, ID_WIDTH, TextEncoding::Ebcdic, code_page);
        let byte = |at: usize| read_uint(frame, at, 1).map(|v| v as u8);
        Ok(Self {
            offset,
            total_length: read_uint(frame, TOTAL_LENGTH_OFFSET, 2)? as u16,
            record_length: read_uint(frame, RECORD_LENGTH_OFFSET, 2)? as u16,
            segment: byte(SEGMENT_OFFSET)?,
            flags: byte(FLAGS_OFFSET)?,
            record_family: byte(FAMILY_OFFSET)?,
            timestamp: TodClock(read_uint(frame, TIMESTAMP_OFFSET, 4)? as u32),
            system_id: id(SYSTEM_ID_OFFSET)?,
            subsystem_id: id(SUBSYSTEM_ID_OFFSET)?,
            subtype: byte(SUBTYPE_OFFSET)?,
        })
    }

    /// Read the two length prefixes without parsing the rest of the header.
    pub fn peek_lengths(bytes: &[u8]) -> Option<(u16, u16)> {
        let total = read_uint(bytes, TOTAL_LENGTH_OFFSET, 2).ok()?;
        let record = read_uint(bytes, RECORD_LENGTH_OFFSET, 2).ok()?;
        Some((total as u16, record as u16))
    }

    /// The `(record_family, subtype)` dispatch key.
    pub fn key(&self) -> (u8, u8) {
        (self.record_family, self.subtype)
    }
}
