//! Decode session: the public streaming entry point.
//!
//! A [`DecodeSession`] owns one byte source and yields, in stream order,
//! either a [`DecodedRecord`] or a [`DecodeError`] for every frame (or
//! framing problem) it meets. Errors are reported in place; only a failing
//! byte source ends the sequence early.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{DecoderConfig, RecordFilter};
use crate::dispatch::RecordDispatcher;
use crate::error::{DecodeError, SmfDumpError};
use crate::layout::LayoutRegistry;
use crate::reader::DumpReader;
use crate::record::DecodedRecord;

// ---------------------------------------------------------------------------
//  Counters
// ---------------------------------------------------------------------------

/// Outcome counts for one `(record_family, subtype)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SubtypeCounts {
    /// Frames yielded as records, unrecognized ones included.
    pub decoded: u64,
    /// Frames with no registered layout.
    pub unrecognized: u64,
    /// Frames that failed field extraction.
    pub errors: u64,
}

impl SubtypeCounts {
    fn add(&mut self, other: &SubtypeCounts) {
        self.decoded += other.decoded;
        self.unrecognized += other.unrecognized;
        self.errors += other.errors;
    }
}

/// Running totals for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCounters {
    pub by_subtype: BTreeMap<(u8, u8), SubtypeCounts>,
    /// Truncated and bad-length reports.
    pub framing_errors: u64,
    pub source_failures: u64,
    /// Frames skipped by the record filter.
    pub filtered: u64,
    /// Bytes discarded while resynchronizing.
    pub resync_bytes_skipped: u64,
    /// Stream offset reached.
    pub bytes_consumed: u64,
}

impl SessionCounters {
    fn entry(&mut self, key: (u8, u8)) -> &mut SubtypeCounts {
        self.by_subtype.entry(key).or_default()
    }

    /// Records yielded.
    pub fn decoded(&self) -> u64 {
        self.by_subtype.values().map(|c| c.decoded).sum()
    }

    /// Records yielded without a registered layout.
    pub fn unrecognized(&self) -> u64 {
        self.by_subtype.values().map(|c| c.unrecognized).sum()
    }

    /// Errors yielded, framing and source failures included.
    pub fn errors(&self) -> u64 {
        let field_errors: u64 = self.by_subtype.values().map(|c| c.errors).sum();
        field_errors + self.framing_errors + self.source_failures
    }

    pub fn get(&self, family: u8, subtype: u8) -> SubtypeCounts {
        self.by_subtype
            .get(&(family, subtype))
            .copied()
            .unwrap_or_default()
    }

    /// Counts rolled up per record family.
    pub fn families(&self) -> BTreeMap<u8, SubtypeCounts> {
        let mut families: BTreeMap<u8, SubtypeCounts> = BTreeMap::new();
        for ((family, _), counts) in &self.by_subtype {
            families.entry(*family).or_default().add(counts);
        }
        families
    }
}

// ---------------------------------------------------------------------------
//  Session
// ---------------------------------------------------------------------------

/// Streaming decoder over one dump.
#[derive(Debug)]
pub struct DecodeSession<R> {
    reader: DumpReader<R>,
    dispatcher: RecordDispatcher,
    filter: RecordFilter,
    counters: SessionCounters,
    finished: bool,
}

impl DecodeSession<File> {
    /// Open a dump file.
    pub fn open(path: impl AsRef<Path>, config: DecoderConfig) -> Result<Self, SmfDumpError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        info!(path = %path.display(), "opened dump");
        Self::new(file, config)
    }
}

impl<R: Read> DecodeSession<R> {
    /// Start a session with the built-in layouts.
    pub fn new(source: R, config: DecoderConfig) -> Result<Self, SmfDumpError> {
        Self::with_registry(source, config, Arc::new(LayoutRegistry::standard()?))
    }

    /// Start a session with a caller-supplied layout registry.
    pub fn with_registry(
        source: R,
        config: DecoderConfig,
        registry: Arc<LayoutRegistry>,
    ) -> Result<Self, SmfDumpError> {
        config.validate()?;
        let code_page = config.resolve_code_page()?;
        info!(
            code_page = code_page.name,
            window_size = config.window_size,
            max_frame_size = config.max_frame_size,
            layouts = registry.len(),
            "starting decode session"
        );
        Ok(Self {
            reader: DumpReader::new(source, code_page, config.window_size, config.max_frame_size),
            dispatcher: RecordDispatcher::new(registry, code_page),
            filter: config.filter,
            counters: SessionCounters::default(),
            finished: false,
        })
    }

    /// Absolute stream offset reached.
    pub fn offset(&self) -> u64 {
        self.reader.offset()
    }

    /// Counters as of now.
    pub fn counters(&self) -> SessionCounters {
        let mut counters = self.counters.clone();
        counters.resync_bytes_skipped = self.reader.bytes_skipped();
        counters.bytes_consumed = self.reader.offset();
        counters
    }

    /// Decode the rest of the stream, discarding results, and return the
    /// final counters.
    pub fn finish(mut self) -> SessionCounters {
        for _ in self.by_ref() {}
        self.counters()
    }

    fn record_error(&mut self, key: Option<(u8, u8)>, err: &DecodeError) {
        match key {
            Some(key) if err.is_field() => self.counters.entry(key).errors += 1,
            _ if err.is_fatal() => self.counters.source_failures += 1,
            _ => self.counters.framing_errors += 1,
        }
    }

    fn log_summary(&self) {
        let counters = self.counters();
        info!(
            decoded = counters.decoded(),
            unrecognized = counters.unrecognized(),
            errors = counters.errors(),
            filtered = counters.filtered,
            resync_bytes_skipped = counters.resync_bytes_skipped,
            bytes = counters.bytes_consumed,
            "decode session complete"
        );
    }
}

impl<R: Read> Iterator for DecodeSession<R> {
    type Item = Result<DecodedRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = match self.reader.next_frame() {
                None => {
                    if !self.finished {
                        self.finished = true;
                        self.log_summary();
                    }
                    return None;
                }
                Some(Err(err)) => {
                    self.record_error(None, &err);
                    return Some(Err(err));
                }
                Some(Ok(frame)) => frame,
            };

            if !self.filter.matches(&frame.header) {
                self.counters.filtered += 1;
                continue;
            }

            let key = frame.header.key();
            return match self.dispatcher.dispatch(&frame.header, &frame.bytes) {
                Ok(record) => {
                    let counts = self.counters.entry(key);
                    counts.decoded += 1;
                    if record.is_unrecognized() {
                        counts.unrecognized += 1;
                    }
                    Some(Ok(record))
                }
                Err(err) => {
                    warn!(offset = err.offset(), error = %err, "record failed to decode");
                    self.record_error(Some(key), &err);
                    Some(Err(err))
                }
            };
        }
    }
}
