//! Decoded record model.
//!
//! A frame decodes to one [`DecodedRecord`]: a typed record for the built-in
//! subtypes, a [`GenericRecord`] for layouts registered without a typed
//! builder, or an [`UnrecognizedRecord`] carrying the raw frame bytes.

use std::time::Duration;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::header::FrameHeader;
use crate::type110::{
    Type110FileStats, Type110ProgramStats, Type110StorageStats, Type110TerminalStats,
    Type110Transaction,
};
use crate::type30::{
    Type30JobEnd, Type30JobStart, Type30NetworkStep, Type30StepEnd, Type30StepStart,
};

// ---------------------------------------------------------------------------
//  Field values
// ---------------------------------------------------------------------------

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
pub fn millis(d: &Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

pub(crate) fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(millis(d))
}

/// One extracted field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Integer(u64),
    Duration(Duration),
    Text(String),
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Integer(v) => s.serialize_u64(*v),
            FieldValue::Duration(d) => serialize_millis(d, s),
            FieldValue::Text(t) => s.serialize_str(t),
        }
    }
}

/// Extracted fields of one frame, in layout order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedFields {
    values: Vec<(&'static str, FieldValue)>,
}

impl DecodedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, name: &'static str, value: FieldValue) {
        self.values.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// Text value of `name`, or empty if absent.
    pub fn text(&self, name: &str) -> String {
        match self.get(name) {
            Some(FieldValue::Text(t)) => t.clone(),
            _ => String::new(),
        }
    }

    /// Integer value of `name` narrowed to `T`, or zero if absent or too large.
    pub fn uint<T: TryFrom<u64> + Default>(&self, name: &str) -> T {
        match self.get(name) {
            Some(FieldValue::Integer(v)) => T::try_from(*v).unwrap_or_default(),
            _ => T::default(),
        }
    }

    /// Duration value of `name`, or zero if absent.
    pub fn duration(&self, name: &str) -> Duration {
        match self.get(name) {
            Some(FieldValue::Duration(d)) => *d,
            _ => Duration::ZERO,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.values.iter().map(|(n, v)| (*n, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for DecodedFields {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
//  Records
// ---------------------------------------------------------------------------

/// Record decoded through a layout that has no typed builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenericRecord {
    #[serde(flatten)]
    pub header: FrameHeader,
    pub layout: &'static str,
    #[serde(flatten)]
    pub fields: DecodedFields,
}

/// Frame with no registered layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnrecognizedRecord {
    #[serde(flatten)]
    pub header: FrameHeader,
    /// The whole frame, header included.
    pub raw_bytes: Vec<u8>,
}

/// One successfully decoded frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodedRecord {
    /// Type 30 subtype 1.
    StepEnd(Type30StepEnd),
    /// Type 30 subtype 2.
    JobEnd(Type30JobEnd),
    /// Type 30 subtype 3.
    StepStart(Type30StepStart),
    /// Type 30 subtype 4.
    JobStart(Type30JobStart),
    /// Type 30 subtype 5.
    NetworkStep(Type30NetworkStep),
    /// Type 110 subtype 1.
    Transaction(Type110Transaction),
    /// Type 110 subtype 2.
    FileStats(Type110FileStats),
    /// Type 110 subtype 3.
    ProgramStats(Type110ProgramStats),
    /// Type 110 subtype 4.
    TerminalStats(Type110TerminalStats),
    /// Type 110 subtype 5.
    StorageStats(Type110StorageStats),
    Generic(GenericRecord),
    Unrecognized(UnrecognizedRecord),
}

impl DecodedRecord {
    pub(crate) fn generic(header: FrameHeader, layout: &'static str, fields: DecodedFields) -> Self {
        DecodedRecord::Generic(GenericRecord {
            header,
            layout,
            fields,
        })
    }

    pub(crate) fn unrecognized(header: FrameHeader, frame: &[u8]) -> Self {
        DecodedRecord::Unrecognized(UnrecognizedRecord {
            header,
            raw_bytes: frame.to_vec(),
        })
    }

    pub fn header(&self) -> &FrameHeader {
        match self {
            DecodedRecord::StepEnd(r) => &r.header,
            DecodedRecord::JobEnd(r) => &r.header,
            DecodedRecord::StepStart(r) => &r.header,
            DecodedRecord::JobStart(r) => &r.header,
            DecodedRecord::NetworkStep(r) => &r.header,
            DecodedRecord::Transaction(r) => &r.header,
            DecodedRecord::FileStats(r) => &r.header,
            DecodedRecord::ProgramStats(r) => &r.header,
            DecodedRecord::TerminalStats(r) => &r.header,
            DecodedRecord::StorageStats(r) => &r.header,
            DecodedRecord::Generic(r) => &r.header,
            DecodedRecord::Unrecognized(r) => &r.header,
        }
    }

    /// The `(record_family, subtype)` of the source frame.
    pub fn key(&self) -> (u8, u8) {
        self.header().key()
    }

    /// Absolute stream offset of the source frame.
    pub fn offset(&self) -> u64 {
        self.header().offset
    }

    pub fn is_unrecognized(&self) -> bool {
        matches!(self, DecodedRecord::Unrecognized(_))
    }

    /// Short name of the record kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodedRecord::StepEnd(_) => "step_end",
            DecodedRecord::JobEnd(_) => "job_end",
            DecodedRecord::StepStart(_) => "step_start",
            DecodedRecord::JobStart(_) => "job_start",
            DecodedRecord::NetworkStep(_) => "network_step",
            DecodedRecord::Transaction(_) => "transaction",
            DecodedRecord::FileStats(_) => "file_stats",
            DecodedRecord::ProgramStats(_) => "program_stats",
            DecodedRecord::TerminalStats(_) => "terminal_stats",
            DecodedRecord::StorageStats(_) => "storage_stats",
            DecodedRecord::Generic(_) => "generic",
            DecodedRecord::Unrecognized(_) => "unrecognized",
        }
    }

    /// Flatten the record into a single-level field map.
    ///
    /// Header fields and record fields share one level. Durations appear
    /// as whole milliseconds.
    pub fn to_flat_map(&self) -> serde_json::Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Ok(map)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::TodClock;

    fn header(family: u8, subtype: u8) -> FrameHeader {
        FrameHeader {
            offset: 64,
            total_length: 40,
            record_length: 36,
            segment: 0,
            flags: 0,
            record_family: family,
            timestamp: TodClock(9),
            system_id: "SYSA".to_string(),
            subsystem_id: "JES2".to_string(),
            subtype,
        }
    }

    fn fields() -> DecodedFields {
        let mut f = DecodedFields::new();
        f.insert("name", FieldValue::Text("ALPHA".to_string()));
        f.insert("count", FieldValue::Integer(70_000));
        f.insert("wait", FieldValue::Duration(Duration::from_micros(2_500_000)));
        f
    }

    #[test]
    fn test_field_getters() {
        let f = fields();
        assert_eq!(f.text("name"), "ALPHA");
        assert_eq!(f.uint::<u32>("count"), 70_000);
        assert_eq!(f.duration("wait"), Duration::from_millis(2500));
        assert_eq!(f.len(), 3);
    }

    #[test]
    fn test_field_getters_default_when_absent_or_narrow() {
        let f = fields();
        assert_eq!(f.text("missing"), "");
        assert_eq!(f.uint::<u16>("count"), 0);
        assert_eq!(f.uint::<u32>("name"), 0);
        assert_eq!(f.duration("count"), Duration::ZERO);
    }

    #[test]
    fn test_generic_flat_map() {
        let record = DecodedRecord::generic(header(200, 1), "custom", fields());
        let map = record.to_flat_map().unwrap();
        assert_eq!(map["kind"], "generic");
        assert_eq!(map["layout"], "custom");
        assert_eq!(map["record_family"], 200);
        assert_eq!(map["system_id"], "SYSA");
        assert_eq!(map["name"], "ALPHA");
        assert_eq!(map["count"], 70_000);
        assert_eq!(map["wait"], 2500);
    }

    #[test]
    fn test_unrecognized_record() {
        let frame = vec![0u8; 40];
        let record = DecodedRecord::unrecognized(header(99, 7), &frame);
        assert!(record.is_unrecognized());
        assert_eq!(record.key(), (99, 7));
        assert_eq!(record.offset(), 64);
        assert_eq!(record.kind(), "unrecognized");
        let map = record.to_flat_map().unwrap();
        assert_eq!(map["raw_bytes"].as_array().map(Vec::len), Some(40));
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(&Duration::MAX), u64::MAX);
        assert_eq!(millis(&Duration::from_micros(1999)), 1);
    }
}
