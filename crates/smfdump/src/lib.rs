#![forbid(unsafe_code)]
//! Streaming decoder for z/OS SMF binary dumps.
//!
//! This crate provides:
//!
//! - **Framing**: splits a dump into length-prefixed frames, with
//!   byte-by-byte resynchronization after a corrupt header
//! - **Bounded reading**: a fixed-size read-ahead window, so dumps of any
//!   size decode in constant memory
//! - **Layout registry**: table-driven field maps keyed by
//!   `(record_family, subtype)`; new subtypes are a registration
//! - **Type 30 (address space work)**: step and job start/end, network steps
//! - **Type 110 (CICS monitoring)**: transactions, files, programs,
//!   terminals, storage pools
//! - **Diagnostics**: frame census and hex previews for troubleshooting
//!
//! Decoding produces a lazy sequence of `Result<DecodedRecord, DecodeError>`:
//! corrupt data is reported in place and never ends the stream.
//!
//! # Example
//!
//! ```rust
//! use smfdump::{DecodeSession, DecoderConfig, DecodedRecord, FrameWriter};
//!
//! let mut frame = FrameWriter::new(30, 1, 116);
//! frame.put_text(28, 8, "PAYROLL").unwrap();
//! let dump = frame.finish().unwrap();
//!
//! let session = DecodeSession::new(&dump[..], DecoderConfig::default()).unwrap();
//! for result in session {
//!     if let Ok(DecodedRecord::StepEnd(step)) = result {
//!         assert_eq!(step.job_name, "PAYROLL");
//!     }
//! }
//! ```

pub mod config;
pub mod decoder;
pub mod diagnose;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod header;
pub mod layout;
pub mod reader;
pub mod record;
pub mod session;
pub mod source;
pub mod type110;
pub mod type30;
pub mod writer;

use std::io::Read;

// Re-export configuration.
pub use config::{ConfigError, DecoderConfig, RecordFilter};

// Re-export errors.
pub use error::{DecodeError, FrameFault, SmfDumpError};

// Re-export framing and layouts.
pub use header::{FrameHeader, TodClock, DEFAULT_MAX_FRAME_SIZE, HEADER_SIZE, MIN_FRAME_SIZE};
pub use layout::{FieldDescriptor, FieldKind, Layout, LayoutError, LayoutRegistry};
pub use extract::{TextEncoding, TimeScale};
pub use reader::{DumpReader, Frame, FrameState};

// Re-export decoding.
pub use decoder::SubtypeDecoder;
pub use dispatch::RecordDispatcher;
pub use record::{DecodedFields, DecodedRecord, FieldValue, GenericRecord, UnrecognizedRecord};
pub use session::{DecodeSession, SessionCounters, SubtypeCounts};

// Re-export record types.
pub use type110::{
    CicsProduct, Type110FileStats, Type110ProgramStats, Type110StorageStats, Type110Subtype,
    Type110TerminalStats, Type110Transaction,
};
pub use type30::{
    Type30JobEnd, Type30JobStart, Type30NetworkStep, Type30StepEnd, Type30StepStart,
    Type30Subtype,
};

// Re-export diagnostics and the frame encoder.
pub use diagnose::{hex_preview, scan, DiagnosticReport, FrameSummary, ScanEntry};
pub use writer::{DumpWriter, FrameWriter, WriterError};

pub use smfdump_encoding::CodePage;

/// Start decoding `source` with the built-in layouts.
pub fn run<R: Read>(source: R, config: DecoderConfig) -> Result<DecodeSession<R>, SmfDumpError> {
    DecodeSession::new(source, config)
}
