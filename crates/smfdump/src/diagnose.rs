//! Dump diagnostics.
//!
//! Walks the frame structure of a dump without decoding fields, and renders
//! a report with each frame's header, the layout it would decode with, and
//! a hex preview of its first bytes.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Read;

use smfdump_encoding::CodePage;

use crate::config::DecoderConfig;
use crate::error::{DecodeError, SmfDumpError};
use crate::layout::LayoutRegistry;
use crate::reader::DumpReader;

/// Bytes of each frame kept for the hex preview.
pub const PREVIEW_BYTES: usize = 64;

const BYTES_PER_LINE: usize = 16;

// ---------------------------------------------------------------------------
//  Report model
// ---------------------------------------------------------------------------

/// Header-level view of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSummary {
    pub offset: u64,
    pub total_length: u16,
    pub record_family: u8,
    pub subtype: u8,
    pub system_id: String,
    pub subsystem_id: String,
    /// Layout registered for the frame's key, if any.
    pub layout: Option<&'static str>,
    /// Frame is shorter than its layout's minimum length.
    pub short_for_layout: bool,
    /// Leading bytes of the frame.
    pub preview: Vec<u8>,
}

/// One item met while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEntry {
    Frame(FrameSummary),
    Error(DecodeError),
}

/// Result of [`scan`].
#[derive(Debug, Clone)]
pub struct DiagnosticReport {
    pub entries: Vec<ScanEntry>,
    /// Frames seen per `(record_family, subtype)`.
    pub frame_counts: BTreeMap<(u8, u8), u64>,
    pub bytes_scanned: u64,
    /// The scan stopped at the entry limit before the end of the stream.
    pub limit_reached: bool,
    code_page: &'static CodePage,
}

impl DiagnosticReport {
    pub fn frames(&self) -> impl Iterator<Item = &FrameSummary> {
        self.entries.iter().filter_map(|e| match e {
            ScanEntry::Frame(f) => Some(f),
            ScanEntry::Error(_) => None,
        })
    }

    pub fn errors(&self) -> impl Iterator<Item = &DecodeError> {
        self.entries.iter().filter_map(|e| match e {
            ScanEntry::Error(err) => Some(err),
            ScanEntry::Frame(_) => None,
        })
    }

    /// Human-readable report.
    pub fn render(&self) -> String {
        let mut report = String::new();
        report.push_str("SMF DUMP DIAGNOSTIC REPORT\n");
        let _ = writeln!(report, "Code page: {}", self.code_page.name);
        let _ = writeln!(report, "Bytes scanned: {}", self.bytes_scanned);
        let _ = writeln!(report, "Entries: {}", self.entries.len());
        report.push_str("--------------------------------------------\n");

        for (i, entry) in self.entries.iter().enumerate() {
            match entry {
                ScanEntry::Frame(frame) => {
                    let _ = writeln!(
                        report,
                        "Frame {}: Offset={}, Type={}, Subtype={}, Length={}, SID={}, SSID={}, Layout={}{}",
                        i + 1,
                        frame.offset,
                        frame.record_family,
                        frame.subtype,
                        frame.total_length,
                        frame.system_id,
                        frame.subsystem_id,
                        frame.layout.unwrap_or("none"),
                        if frame.short_for_layout { " (short)" } else { "" },
                    );
                    report.push_str(&hex_preview(&frame.preview, frame.offset, self.code_page));
                }
                ScanEntry::Error(err) => {
                    let _ = writeln!(report, "Error {}: {}", i + 1, err);
                }
            }
        }

        report.push_str("--------------------------------------------\n");
        for ((family, subtype), count) in &self.frame_counts {
            let _ = writeln!(report, "Type {family} subtype {subtype}: {count} frame(s)");
        }
        if self.limit_reached {
            report.push_str("Scan stopped at entry limit\n");
        }
        report.push_str("END OF REPORT\n");
        report
    }
}

// ---------------------------------------------------------------------------
//  Scanning
// ---------------------------------------------------------------------------

/// Scan up to `limit` frames or errors from `source`.
pub fn scan<R: Read>(
    source: R,
    config: &DecoderConfig,
    registry: &LayoutRegistry,
    limit: usize,
) -> Result<DiagnosticReport, SmfDumpError> {
    config.validate()?;
    let code_page = config.resolve_code_page()?;
    let mut reader = DumpReader::new(source, code_page, config.window_size, config.max_frame_size);
    let mut entries = Vec::new();
    let mut frame_counts: BTreeMap<(u8, u8), u64> = BTreeMap::new();
    let mut limit_reached = false;

    while let Some(item) = reader.next_frame() {
        if entries.len() == limit {
            limit_reached = true;
            break;
        }
        match item {
            Ok(frame) => {
                let header = frame.header;
                let layout = registry.layout_for(header.record_family, header.subtype);
                *frame_counts.entry(header.key()).or_default() += 1;
                entries.push(ScanEntry::Frame(FrameSummary {
                    offset: header.offset,
                    total_length: header.total_length,
                    record_family: header.record_family,
                    subtype: header.subtype,
                    system_id: header.system_id,
                    subsystem_id: header.subsystem_id,
                    layout: layout.map(|l| l.name),
                    short_for_layout: layout
                        .is_some_and(|l| frame.bytes.len() < l.min_length as usize),
                    preview: frame.bytes[..frame.bytes.len().min(PREVIEW_BYTES)].to_vec(),
                }));
            }
            Err(err) => entries.push(ScanEntry::Error(err)),
        }
    }

    Ok(DiagnosticReport {
        entries,
        frame_counts,
        bytes_scanned: reader.offset(),
        limit_reached,
        code_page,
    })
}

/// Hex dump of `bytes` with an EBCDIC text column.
///
/// Each line shows the absolute offset (`base` plus the line offset),
/// sixteen hex bytes, and their decoded characters with non-graphic
/// characters shown as `.`.
pub fn hex_preview(bytes: &[u8], base: u64, code_page: &CodePage) -> String {
    let mut out = String::new();
    for (line, chunk) in bytes.chunks(BYTES_PER_LINE).enumerate() {
        let offset = base + (line * BYTES_PER_LINE) as u64;
        let _ = write!(out, "  {offset:08X} ");
        for i in 0..BYTES_PER_LINE {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, " {b:02X}");
                }
                None => out.push_str("   "),
            }
        }
        out.push_str("  |");
        for &b in chunk {
            let ch = code_page.ebcdic_to_char(b);
            out.push(if ch.is_ascii_graphic() || ch == ' ' { ch } else { '.' });
        }
        out.push_str("|\n");
    }
    out
}
