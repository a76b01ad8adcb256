//! Frame encoder.
//!
//! Builds well-formed frames in the dump's binary format. The decoder never
//! needs it; it exists to produce fixtures and synthetic dumps for tests
//! and tooling.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use smfdump_encoding::{CodePage, EncodingError, CP500};

use crate::extract::{TextEncoding, TimeScale};
use crate::header::{
    DEFAULT_MAX_FRAME_SIZE, FAMILY_OFFSET, FLAGS_OFFSET, ID_WIDTH, LENGTH_PREFIX_SIZE,
    MIN_FRAME_SIZE, RECORD_LENGTH_OFFSET, SEGMENT_OFFSET, SUBSYSTEM_ID_OFFSET, SUBTYPE_OFFSET,
    SYSTEM_ID_OFFSET, TIMESTAMP_OFFSET, TOTAL_LENGTH_OFFSET,
};
use crate::layout::{FieldDescriptor, FieldKind, Layout};
use crate::record::{DecodedFields, FieldValue};

// ---------------------------------------------------------------------------
//  Errors
// ---------------------------------------------------------------------------

/// Errors produced while encoding frames.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    /// The write extends past the end of the frame.
    #[error("{width}-byte write at offset {offset} exceeds {len}-byte frame")]
    OutOfRange {
        offset: usize,
        width: usize,
        len: usize,
    },

    /// The value does not fit the field width.
    #[error("value {value} does not fit in {width} bytes")]
    ValueTooLarge { value: u64, width: usize },

    /// The text is longer than the field.
    #[error("text '{text}' is longer than {width} bytes")]
    TextTooLong { text: String, width: usize },

    /// The frame length is outside the legal range.
    #[error("frame length {length} is outside {min}..={max}")]
    BadLength {
        length: usize,
        min: usize,
        max: usize,
    },

    /// The field named does not exist in the layout.
    #[error("layout {layout} has no field '{field}'")]
    UnknownField { layout: &'static str, field: String },

    /// The value type does not match the field kind.
    #[error("value for field '{field}' does not match its kind")]
    KindMismatch { field: &'static str },

    /// Text could not be represented in the code page.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// I/O error while writing to a file target.
    #[error("dump I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
//  Frame writer
// ---------------------------------------------------------------------------

/// Builds one frame.
///
/// The body starts zero-filled; header fields are stamped by
/// [`FrameWriter::finish`].
#[derive(Debug, Clone)]
pub struct FrameWriter {
    family: u8,
    subtype: u8,
    segment: u8,
    flags: u8,
    timestamp: u32,
    system_id: String,
    subsystem_id: String,
    code_page: &'static CodePage,
    bytes: Vec<u8>,
}

impl FrameWriter {
    /// A zero-filled frame of `total_length` bytes.
    pub fn new(family: u8, subtype: u8, total_length: usize) -> Self {
        Self {
            family,
            subtype,
            segment: 0,
            flags: 0,
            timestamp: 0,
            system_id: "SYS1".to_string(),
            subsystem_id: String::new(),
            code_page: &CP500,
            bytes: vec![0; total_length],
        }
    }

    /// A frame sized to the layout's minimum length, rounded up to even.
    pub fn for_layout(layout: &Layout) -> Self {
        let len = layout.min_length as usize;
        Self::new(layout.family, layout.subtype, len + len % 2)
    }

    pub fn system_id(mut self, id: &str) -> Self {
        self.system_id = id.to_string();
        self
    }

    pub fn subsystem_id(mut self, id: &str) -> Self {
        self.subsystem_id = id.to_string();
        self
    }

    pub fn timestamp(mut self, tod: u32) -> Self {
        self.timestamp = tod;
        self
    }

    pub fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    pub fn segment(mut self, segment: u8) -> Self {
        self.segment = segment;
        self
    }

    pub fn code_page(mut self, code_page: &'static CodePage) -> Self {
        self.code_page = code_page;
        self
    }

    fn slot(&mut self, offset: usize, width: usize) -> Result<&mut [u8], WriterError> {
        let len = self.bytes.len();
        match offset.checked_add(width) {
            Some(end) if end <= len => Ok(&mut self.bytes[offset..end]),
            _ => Err(WriterError::OutOfRange { offset, width, len }),
        }
    }

    /// Write a big-endian unsigned integer.
    pub fn put_uint(&mut self, offset: usize, width: usize, value: u64) -> Result<&mut Self, WriterError> {
        if width < 8 && value >> (width * 8) != 0 {
            return Err(WriterError::ValueTooLarge { value, width });
        }
        let be = value.to_be_bytes();
        let width = width.min(8);
        self.slot(offset, width)?.copy_from_slice(&be[8 - width..]);
        Ok(self)
    }

    /// Write a duration in raw units of `scale`.
    pub fn put_time(
        &mut self,
        offset: usize,
        width: usize,
        scale: TimeScale,
        duration: Duration,
    ) -> Result<&mut Self, WriterError> {
        self.put_uint(offset, width, scale.from_duration(duration))
    }

    /// Write EBCDIC text padded with EBCDIC spaces.
    pub fn put_text(&mut self, offset: usize, width: usize, text: &str) -> Result<&mut Self, WriterError> {
        if text.chars().count() > width {
            return Err(WriterError::TextTooLong {
                text: text.to_string(),
                width,
            });
        }
        let encoded = self.code_page.encode_padded(text, width)?;
        self.slot(offset, width)?.copy_from_slice(&encoded);
        Ok(self)
    }

    /// Write ASCII text padded with spaces.
    pub fn put_ascii(&mut self, offset: usize, width: usize, text: &str) -> Result<&mut Self, WriterError> {
        if text.len() > width {
            return Err(WriterError::TextTooLong {
                text: text.to_string(),
                width,
            });
        }
        let slot = self.slot(offset, width)?;
        slot.fill(b' ');
        slot[..text.len()].copy_from_slice(text.as_bytes());
        Ok(self)
    }

    /// Write raw bytes.
    pub fn put_bytes(&mut self, offset: usize, data: &[u8]) -> Result<&mut Self, WriterError> {
        self.slot(offset, data.len())?.copy_from_slice(data);
        Ok(self)
    }

    /// Write a value at the position a field descriptor names.
    pub fn put_field(&mut self, field: &FieldDescriptor, value: &FieldValue) -> Result<&mut Self, WriterError> {
        let offset = field.offset as usize;
        let width = field.width as usize;
        match (field.kind, value) {
            (FieldKind::Integer, FieldValue::Integer(v)) => self.put_uint(offset, width, *v),
            (FieldKind::ScaledTime(scale), FieldValue::Duration(d)) => {
                self.put_time(offset, width, scale, *d)
            }
            (FieldKind::Text(TextEncoding::Ebcdic), FieldValue::Text(t)) => {
                self.put_text(offset, width, t)
            }
            (FieldKind::Text(TextEncoding::Ascii), FieldValue::Text(t)) => {
                self.put_ascii(offset, width, t)
            }
            _ => Err(WriterError::KindMismatch { field: field.name }),
        }
    }

    /// Write every value in `fields` through the matching descriptor of `layout`.
    pub fn put_fields(&mut self, layout: &Layout, fields: &DecodedFields) -> Result<&mut Self, WriterError> {
        for (name, value) in fields.iter() {
            let field = layout.field(name).ok_or_else(|| WriterError::UnknownField {
                layout: layout.name,
                field: name.to_string(),
            })?;
            self.put_field(field, value)?;
        }
        Ok(self)
    }

    /// Stamp the header and return the encoded frame.
    pub fn finish(mut self) -> Result<Vec<u8>, WriterError> {
        let length = self.bytes.len();
        if !(MIN_FRAME_SIZE..=usize::from(u16::MAX)).contains(&length) {
            return Err(WriterError::BadLength {
                length,
                min: MIN_FRAME_SIZE,
                max: usize::from(u16::MAX),
            });
        }
        let total = length as u64;
        let system_id = self.system_id.clone();
        let subsystem_id = self.subsystem_id.clone();
        let (segment, flags, family, subtype, timestamp) =
            (self.segment, self.flags, self.family, self.subtype, self.timestamp);
        self.put_uint(TOTAL_LENGTH_OFFSET, 2, total)?
            .put_uint(2, 2, 0)?
            .put_uint(RECORD_LENGTH_OFFSET, 2, total - u64::from(LENGTH_PREFIX_SIZE))?
            .put_uint(SEGMENT_OFFSET, 1, u64::from(segment))?
            .put_uint(FLAGS_OFFSET, 1, u64::from(flags))?
            .put_uint(FAMILY_OFFSET, 1, u64::from(family))?
            .put_uint(FAMILY_OFFSET + 1, 1, 0)?
            .put_uint(TIMESTAMP_OFFSET, 4, u64::from(timestamp))?
            .put_text(SYSTEM_ID_OFFSET, ID_WIDTH, &system_id)?
            .put_text(SUBSYSTEM_ID_OFFSET, ID_WIDTH, &subsystem_id)?
            .put_uint(SUBTYPE_OFFSET, 1, u64::from(subtype))?;
        Ok(self.bytes)
    }
}

// ---------------------------------------------------------------------------
//  Dump writer
// ---------------------------------------------------------------------------

/// Collects frames and serializes them as one contiguous dump.
#[derive(Debug, Clone)]
pub struct DumpWriter {
    max_frame_size: usize,
    frames: Vec<Vec<u8>>,
}

impl Default for DumpWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DumpWriter {
    pub fn new() -> Self {
        Self::with_max_frame_size(usize::from(DEFAULT_MAX_FRAME_SIZE))
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            frames: Vec::new(),
        }
    }

    /// Append an encoded frame. Returns its offset in the dump.
    pub fn push(&mut self, frame: Vec<u8>) -> Result<u64, WriterError> {
        if frame.len() > self.max_frame_size {
            return Err(WriterError::BadLength {
                length: frame.len(),
                min: MIN_FRAME_SIZE,
                max: self.max_frame_size,
            });
        }
        let offset = self.total_bytes();
        self.frames.push(frame);
        Ok(offset)
    }

    /// Append bytes that are not a frame, for corruption fixtures.
    pub fn push_raw(&mut self, bytes: &[u8]) -> u64 {
        let offset = self.total_bytes();
        self.frames.push(bytes.to_vec());
        offset
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.frames.iter().map(|f| f.len() as u64).sum()
    }

    /// The dump as one byte vector.
    pub fn to_dataset(&self) -> Vec<u8> {
        self.frames.concat()
    }

    /// Write the dump to `path`, replacing any existing file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<u64, WriterError> {
        let mut file = std::fs::File::create(path)?;
        for frame in &self.frames {
            file.write_all(frame)?;
        }
        file.flush()?;
        Ok(self.total_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::FrameHeader;

    #[test]
    fn test_header_stamped() {
        let frame = FrameWriter::new(30, 4, 76)
            .system_id("PRD1")
            .subsystem_id("JES2")
            .timestamp(42)
            .flags(0x5E)
            .finish()
            .unwrap();
        assert_eq!(frame.len(), 76);
        let header = FrameHeader::parse(&frame, 0, &CP500).unwrap();
        assert_eq!(header.total_length, 76);
        assert_eq!(header.record_length, 72);
        assert_eq!(header.record_family, 30);
        assert_eq!(header.subtype, 4);
        assert_eq!(header.flags, 0x5E);
        assert_eq!(header.timestamp.raw(), 42);
        assert_eq!(header.system_id, "PRD1");
        assert_eq!(header.subsystem_id, "JES2");
    }

    #[test]
    fn test_put_uint_bounds() {
        let mut w = FrameWriter::new(30, 1, 40);
        assert!(w.put_uint(24, 2, 0xFFFF).is_ok());
        assert!(matches!(
            w.put_uint(24, 2, 0x1_0000),
            Err(WriterError::ValueTooLarge { width: 2, .. })
        ));
        assert!(matches!(w.put_uint(38, 4, 1), Err(WriterError::OutOfRange { .. })));
        assert!(w.put_uint(24, 8, u64::MAX).is_ok());
    }

    #[test]
    fn test_put_text_padding() {
        let mut w = FrameWriter::new(30, 1, 40);
        w.put_text(24, 8, "AB").unwrap();
        w.put_ascii(32, 4, "x").unwrap();
        let frame = w.finish().unwrap();
        assert_eq!(&frame[24..32], &[0xC1, 0xC2, 0x40, 0x40, 0x40, 0x40, 0x40, 0x40]);
        assert_eq!(&frame[32..36], b"x   ");
        assert!(matches!(
            FrameWriter::new(30, 1, 40).put_text(24, 2, "ABC"),
            Err(WriterError::TextTooLong { .. })
        ));
    }

    #[test]
    fn test_bad_frame_length() {
        assert!(matches!(
            FrameWriter::new(30, 1, 10).finish(),
            Err(WriterError::BadLength { length: 10, .. })
        ));
    }

    #[test]
    fn test_for_layout_rounds_to_even() {
        let layout = Layout::new(200, 1, "odd", 31, Vec::new());
        assert_eq!(FrameWriter::for_layout(&layout).finish().unwrap().len(), 32);
    }

    #[test]
    fn test_put_field_kind_mismatch() {
        let field = FieldDescriptor::integer("n", 24, 4);
        let mut w = FrameWriter::new(200, 1, 32);
        assert!(matches!(
            w.put_field(&field, &FieldValue::Text("x".into())),
            Err(WriterError::KindMismatch { field: "n" })
        ));
    }

    #[test]
    fn test_dump_writer() {
        let mut dump = DumpWriter::new();
        assert_eq!(dump.push(FrameWriter::new(30, 1, 116).finish().unwrap()).unwrap(), 0);
        assert_eq!(dump.push_raw(&[0, 1]), 116);
        assert_eq!(dump.push(FrameWriter::new(30, 2, 92).finish().unwrap()).unwrap(), 118);
        assert_eq!(dump.frame_count(), 3);
        assert_eq!(dump.to_dataset().len(), 210);
    }

    #[test]
    fn test_dump_writer_rejects_oversized_frame() {
        let mut dump = DumpWriter::with_max_frame_size(100);
        let frame = FrameWriter::new(30, 1, 116).finish().unwrap();
        assert!(matches!(dump.push(frame), Err(WriterError::BadLength { length: 116, .. })));
    }
}
