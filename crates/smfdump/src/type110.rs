//! Type 110: CICS monitoring.
//!
//! Every subtype begins with a product section identifying the CICS region
//! (offsets 23-44), followed by subtype data from offset 50:
//! - Subtype 1: Transaction performance
//! - Subtype 2: File statistics
//! - Subtype 3: Program statistics
//! - Subtype 4: Terminal statistics
//! - Subtype 5: Storage pool statistics

use std::time::Duration;

use serde::Serialize;

use crate::extract::TimeScale::{Hundredths, Microseconds};
use crate::header::FrameHeader;
use crate::layout::{FieldDescriptor as F, Layout};
use crate::record::{serialize_millis, DecodedFields, DecodedRecord};

/// SMF record type for CICS monitoring.
pub const RECORD_FAMILY: u8 = 110;

// ---------------------------------------------------------------------------
//  Subtype enum
// ---------------------------------------------------------------------------

/// Type 110 subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Type110Subtype {
    /// Subtype 1: Transaction performance.
    Transaction,
    /// Subtype 2: File statistics.
    FileStatistics,
    /// Subtype 3: Program statistics.
    ProgramStatistics,
    /// Subtype 4: Terminal statistics.
    TerminalStatistics,
    /// Subtype 5: Storage pool statistics.
    StorageStatistics,
}

impl Type110Subtype {
    pub const ALL: [Type110Subtype; 5] = [
        Type110Subtype::Transaction,
        Type110Subtype::FileStatistics,
        Type110Subtype::ProgramStatistics,
        Type110Subtype::TerminalStatistics,
        Type110Subtype::StorageStatistics,
    ];

    /// Get the numeric subtype code.
    pub fn code(&self) -> u8 {
        match self {
            Type110Subtype::Transaction => 1,
            Type110Subtype::FileStatistics => 2,
            Type110Subtype::ProgramStatistics => 3,
            Type110Subtype::TerminalStatistics => 4,
            Type110Subtype::StorageStatistics => 5,
        }
    }

    /// Construct from numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Field layout for this subtype, product section included.
    pub fn layout(&self) -> Layout {
        let code = self.code();
        let (name, min_length, fields, builder): (_, _, _, crate::layout::RecordBuilder) = match self {
            Type110Subtype::Transaction => {
                ("type110_transaction", 134, TRANSACTION_FIELDS, build_transaction)
            }
            Type110Subtype::FileStatistics => {
                ("type110_file_stats", 170, FILE_FIELDS, build_file_stats)
            }
            Type110Subtype::ProgramStatistics => {
                ("type110_program_stats", 122, PROGRAM_FIELDS, build_program_stats)
            }
            Type110Subtype::TerminalStatistics => {
                ("type110_terminal_stats", 122, TERMINAL_FIELDS, build_terminal_stats)
            }
            Type110Subtype::StorageStatistics => {
                ("type110_storage_stats", 130, STORAGE_FIELDS, build_storage_stats)
            }
        };
        Layout::new(RECORD_FAMILY, code, name, min_length, [PRODUCT_FIELDS, fields].concat())
            .with_builder(builder)
    }
}

/// Layouts for every type 110 subtype.
pub fn layouts() -> Vec<Layout> {
    Type110Subtype::ALL.iter().map(Type110Subtype::layout).collect()
}

// ---------------------------------------------------------------------------
//  Field maps
// ---------------------------------------------------------------------------

const PRODUCT_FIELDS: &[F] = &[
    F::text("applid", 23, 8),
    F::text("cics_job_name", 31, 8),
    F::text("cics_release", 39, 4),
    F::text("smf_release", 43, 2),
];

const TRANSACTION_FIELDS: &[F] = &[
    F::text("transaction_id", 50, 4),
    F::text("program_name", 54, 8),
    F::text("user_id", 62, 8),
    F::text("terminal_id", 70, 4),
    F::integer("transaction_count", 74, 4),
    F::time("cpu_time", 78, 4, Microseconds),
    F::time("elapsed_time", 82, 4, Hundredths),
    F::time("response_time", 86, 4, Hundredths),
    F::integer("file_requests", 90, 4),
    F::integer("db2_requests", 94, 4),
    F::integer("ts_requests", 98, 4),
    F::integer("td_requests", 102, 4),
    F::integer("reads", 106, 4),
    F::integer("writes", 110, 4),
    F::integer("browses", 114, 4),
    F::integer("deletes", 118, 4),
    F::integer("completed", 122, 4),
    F::integer("abended", 126, 4),
    F::integer("errors", 130, 4),
];

const FILE_FIELDS: &[F] = &[
    F::text("file_name", 50, 8),
    F::text("dataset_name", 58, 44),
    F::text("file_type", 102, 4),
    F::integer("reads", 106, 4),
    F::integer("writes", 110, 4),
    F::integer("updates", 114, 4),
    F::integer("deletes", 118, 4),
    F::integer("browses", 122, 4),
    F::time("avg_response_time", 126, 4, Microseconds),
    F::time("max_response_time", 130, 4, Microseconds),
    F::time("total_io_time", 134, 4, Microseconds),
    F::integer("buffer_requests", 138, 4),
    F::integer("buffer_hits", 142, 4),
    F::integer("buffer_misses", 146, 4),
    F::integer("string_waits", 150, 4),
    F::integer("string_requests", 154, 4),
    F::integer("io_errors", 158, 4),
    F::integer("record_not_found", 162, 4),
    F::integer("duplicate_key", 166, 4),
];

const PROGRAM_FIELDS: &[F] = &[
    F::text("program_name", 50, 8),
    F::text("language", 58, 8),
    F::text("library", 66, 8),
    F::text("location", 74, 8),
    F::integer("program_length", 82, 4),
    F::integer("load_count", 86, 4),
    F::integer("use_count", 90, 4),
    F::integer("fetch_count", 94, 4),
    F::time("cpu_time", 98, 4, Microseconds),
    F::time("elapsed_time", 102, 4, Microseconds),
    F::integer("storage_used", 106, 4),
    F::integer("storage_violations", 110, 4),
    F::integer("abends", 114, 4),
    F::integer("compression_errors", 118, 4),
];

const TERMINAL_FIELDS: &[F] = &[
    F::text("terminal_id", 50, 4),
    F::text("netname", 54, 8),
    F::text("terminal_type", 62, 8),
    F::integer("sessions_started", 70, 4),
    F::integer("sessions_ended", 74, 4),
    F::integer("total_transactions", 78, 4),
    F::integer("messages_sent", 82, 4),
    F::integer("messages_received", 86, 4),
    F::integer("bytes_sent", 90, 8),
    F::integer("bytes_received", 98, 8),
    F::time("avg_response_time", 106, 4, Microseconds),
    F::time("max_response_time", 110, 4, Microseconds),
    F::integer("transmission_errors", 114, 4),
    F::integer("timeout_errors", 118, 4),
];

const STORAGE_FIELDS: &[F] = &[
    F::text("pool_name", 50, 8),
    F::text("pool_type", 58, 8),
    F::integer("total_storage", 66, 8),
    F::integer("used_storage", 74, 8),
    F::integer("free_storage", 82, 8),
    F::integer("peak_storage", 90, 8),
    F::integer("getmain_requests", 98, 4),
    F::integer("freemain_requests", 102, 4),
    F::integer("failed_getmains", 106, 4),
    F::time("avg_allocation_time", 110, 4, Microseconds),
    F::time("max_allocation_time", 114, 4, Microseconds),
    F::integer("fragments", 118, 4),
    F::integer("largest_fragment", 122, 8),
];

// ---------------------------------------------------------------------------
//  Records
// ---------------------------------------------------------------------------

/// CICS region identification shared by every type 110 subtype.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CicsProduct {
    /// VTAM application ID of the region.
    pub applid: String,
    pub cics_job_name: String,
    pub cics_release: String,
    /// SMF record version, e.g. `01`.
    pub smf_release: String,
}

impl CicsProduct {
    fn from_fields(f: &DecodedFields) -> Self {
        Self {
            applid: f.text("applid"),
            cics_job_name: f.text("cics_job_name"),
            cics_release: f.text("cics_release"),
            smf_release: f.text("smf_release"),
        }
    }
}

/// Subtype 1: transaction performance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Type110Transaction {
    #[serde(flatten)]
    pub header: FrameHeader,
    #[serde(flatten)]
    pub product: CicsProduct,
    pub transaction_id: String,
    pub program_name: String,
    pub user_id: String,
    pub terminal_id: String,
    pub transaction_count: u32,
    #[serde(serialize_with = "serialize_millis")]
    pub cpu_time: Duration,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed_time: Duration,
    #[serde(serialize_with = "serialize_millis")]
    pub response_time: Duration,
    pub file_requests: u32,
    pub db2_requests: u32,
    pub ts_requests: u32,
    pub td_requests: u32,
    pub reads: u32,
    pub writes: u32,
    pub browses: u32,
    pub deletes: u32,
    pub completed: u32,
    pub abended: u32,
    pub errors: u32,
}

fn build_transaction(header: FrameHeader, f: &DecodedFields) -> DecodedRecord {
    DecodedRecord::Transaction(Type110Transaction {
        header,
        product: CicsProduct::from_fields(f),
        transaction_id: f.text("transaction_id"),
        program_name: f.text("program_name"),
        user_id: f.text("user_id"),
        terminal_id: f.text("terminal_id"),
        transaction_count: f.uint("transaction_count"),
        cpu_time: f.duration("cpu_time"),
        elapsed_time: f.duration("elapsed_time"),
        response_time: f.duration("response_time"),
        file_requests: f.uint("file_requests"),
        db2_requests: f.uint("db2_requests"),
        ts_requests: f.uint("ts_requests"),
        td_requests: f.uint("td_requests"),
        reads: f.uint("reads"),
        writes: f.uint("writes"),
        browses: f.uint("browses"),
        deletes: f.uint("deletes"),
        completed: f.uint("completed"),
        abended: f.uint("abended"),
        errors: f.uint("errors"),
    })
}

/// Subtype 2: file statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Type110FileStats {
    #[serde(flatten)]
    pub header: FrameHeader,
    #[serde(flatten)]
    pub product: CicsProduct,
    pub file_name: String,
    pub dataset_name: String,
    pub file_type: String,
    pub reads: u32,
    pub writes: u32,
    pub updates: u32,
    pub deletes: u32,
    pub browses: u32,
    #[serde(serialize_with = "serialize_millis")]
    pub avg_response_time: Duration,
    #[serde(serialize_with = "serialize_millis")]
    pub max_response_time: Duration,
    #[serde(serialize_with = "serialize_millis")]
    pub total_io_time: Duration,
    pub buffer_requests: u32,
    pub buffer_hits: u32,
    pub buffer_misses: u32,
    pub string_waits: u32,
    pub string_requests: u32,
    pub io_errors: u32,
    pub record_not_found: u32,
    pub duplicate_key: u32,
}

impl Type110FileStats {
    /// Fraction of buffer requests satisfied without I/O.
    pub fn buffer_hit_ratio(&self) -> Option<f64> {
        (self.buffer_requests > 0)
            .then(|| f64::from(self.buffer_hits) / f64::from(self.buffer_requests))
    }
}

fn build_file_stats(header: FrameHeader, f: &DecodedFields) -> DecodedRecord {
    DecodedRecord::FileStats(Type110FileStats {
        header,
        product: CicsProduct::from_fields(f),
        file_name: f.text("file_name"),
        dataset_name: f.text("dataset_name"),
        file_type: f.text("file_type"),
        reads: f.uint("reads"),
        writes: f.uint("writes"),
        updates: f.uint("updates"),
        deletes: f.uint("deletes"),
        browses: f.uint("browses"),
        avg_response_time: f.duration("avg_response_time"),
        max_response_time: f.duration("max_response_time"),
        total_io_time: f.duration("total_io_time"),
        buffer_requests: f.uint("buffer_requests"),
        buffer_hits: f.uint("buffer_hits"),
        buffer_misses: f.uint("buffer_misses"),
        string_waits: f.uint("string_waits"),
        string_requests: f.uint("string_requests"),
        io_errors: f.uint("io_errors"),
        record_not_found: f.uint("record_not_found"),
        duplicate_key: f.uint("duplicate_key"),
    })
}

/// Subtype 3: program statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Type110ProgramStats {
    #[serde(flatten)]
    pub header: FrameHeader,
    #[serde(flatten)]
    pub product: CicsProduct,
    pub program_name: String,
    pub language: String,
    pub library: String,
    pub location: String,
    pub program_length: u32,
    pub load_count: u32,
    pub use_count: u32,
    pub fetch_count: u32,
    #[serde(serialize_with = "serialize_millis")]
    pub cpu_time: Duration,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed_time: Duration,
    pub storage_used: u32,
    pub storage_violations: u32,
    pub abends: u32,
    pub compression_errors: u32,
}

fn build_program_stats(header: FrameHeader, f: &DecodedFields) -> DecodedRecord {
    DecodedRecord::ProgramStats(Type110ProgramStats {
        header,
        product: CicsProduct::from_fields(f),
        program_name: f.text("program_name"),
        language: f.text("language"),
        library: f.text("library"),
        location: f.text("location"),
        program_length: f.uint("program_length"),
        load_count: f.uint("load_count"),
        use_count: f.uint("use_count"),
        fetch_count: f.uint("fetch_count"),
        cpu_time: f.duration("cpu_time"),
        elapsed_time: f.duration("elapsed_time"),
        storage_used: f.uint("storage_used"),
        storage_violations: f.uint("storage_violations"),
        abends: f.uint("abends"),
        compression_errors: f.uint("compression_errors"),
    })
}

/// Subtype 4: terminal statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Type110TerminalStats {
    #[serde(flatten)]
    pub header: FrameHeader,
    #[serde(flatten)]
    pub product: CicsProduct,
    pub terminal_id: String,
    pub netname: String,
    pub terminal_type: String,
    pub sessions_started: u32,
    pub sessions_ended: u32,
    pub total_transactions: u32,
    pub messages_sent: u32,
    pub messages_received: u32,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    #[serde(serialize_with = "serialize_millis")]
    pub avg_response_time: Duration,
    #[serde(serialize_with = "serialize_millis")]
    pub max_response_time: Duration,
    pub transmission_errors: u32,
    pub timeout_errors: u32,
}

fn build_terminal_stats(header: FrameHeader, f: &DecodedFields) -> DecodedRecord {
    DecodedRecord::TerminalStats(Type110TerminalStats {
        header,
        product: CicsProduct::from_fields(f),
        terminal_id: f.text("terminal_id"),
        netname: f.text("netname"),
        terminal_type: f.text("terminal_type"),
        sessions_started: f.uint("sessions_started"),
        sessions_ended: f.uint("sessions_ended"),
        total_transactions: f.uint("total_transactions"),
        messages_sent: f.uint("messages_sent"),
        messages_received: f.uint("messages_received"),
        bytes_sent: f.uint("bytes_sent"),
        bytes_received: f.uint("bytes_received"),
        avg_response_time: f.duration("avg_response_time"),
        max_response_time: f.duration("max_response_time"),
        transmission_errors: f.uint("transmission_errors"),
        timeout_errors: f.uint("timeout_errors"),
    })
}

/// Subtype 5: storage pool statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Type110StorageStats {
    #[serde(flatten)]
    pub header: FrameHeader,
    #[serde(flatten)]
    pub product: CicsProduct,
    pub pool_name: String,
    pub pool_type: String,
    pub total_storage: u64,
    pub used_storage: u64,
    pub free_storage: u64,
    pub peak_storage: u64,
    pub getmain_requests: u32,
    pub freemain_requests: u32,
    pub failed_getmains: u32,
    #[serde(serialize_with = "serialize_millis")]
    pub avg_allocation_time: Duration,
    #[serde(serialize_with = "serialize_millis")]
    pub max_allocation_time: Duration,
    pub fragments: u32,
    pub largest_fragment: u64,
}

fn build_storage_stats(header: FrameHeader, f: &DecodedFields) -> DecodedRecord {
    DecodedRecord::StorageStats(Type110StorageStats {
        header,
        product: CicsProduct::from_fields(f),
        pool_name: f.text("pool_name"),
        pool_type: f.text("pool_type"),
        total_storage: f.uint("total_storage"),
        used_storage: f.uint("used_storage"),
        free_storage: f.uint("free_storage"),
        peak_storage: f.uint("peak_storage"),
        getmain_requests: f.uint("getmain_requests"),
        freemain_requests: f.uint("freemain_requests"),
        failed_getmains: f.uint("failed_getmains"),
        avg_allocation_time: f.duration("avg_allocation_time"),
        max_allocation_time: f.duration("max_allocation_time"),
        fragments: f.uint("fragments"),
        largest_fragment: f.uint("largest_fragment"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::SubtypeDecoder;
    use crate::layout::LayoutRegistry;
    use crate::writer::FrameWriter;
    use smfdump_encoding::CP500;

    fn product(w: &mut FrameWriter) {
        w.put_text(23, 8, "CICSPROD").unwrap();
        w.put_text(31, 8, "CICSJOB").unwrap();
        w.put_text(39, 4, "0730").unwrap();
        w.put_text(43, 2, "01").unwrap();
    }

    fn decode(frame: &[u8]) -> DecodedRecord {
        let registry = LayoutRegistry::standard().unwrap();
        let header = FrameHeader::parse(frame, 0, &CP500).unwrap();
        SubtypeDecoder::new(&registry, &CP500).decode(&header, frame).unwrap()
    }

    #[test]
    fn test_subtype_codes() {
        assert_eq!(Type110Subtype::Transaction.code(), 1);
        assert_eq!(Type110Subtype::from_code(5), Some(Type110Subtype::StorageStatistics));
        assert_eq!(Type110Subtype::from_code(9), None);
    }

    #[test]
    fn test_layouts_validate() {
        for layout in layouts() {
            layout.validate().unwrap();
            assert!(layout.field("applid").is_some());
        }
    }

    #[test]
    fn test_decode_transaction() {
        let mut w = FrameWriter::new(110, 1, 134).subsystem_id("CICS");
        product(&mut w);
        w.put_text(50, 4, "PAY1").unwrap();
        w.put_text(54, 8, "PAYPGM").unwrap();
        w.put_uint(78, 4, 1500).unwrap();
        w.put_uint(86, 4, 25).unwrap();
        w.put_uint(130, 4, 3).unwrap();
        let frame = w.finish().unwrap();

        let DecodedRecord::Transaction(txn) = decode(&frame) else {
            panic!("expected transaction");
        };
        assert_eq!(txn.product.applid, "CICSPROD");
        assert_eq!(txn.product.cics_release, "0730");
        assert_eq!(txn.product.smf_release, "01");
        assert_eq!(txn.transaction_id, "PAY1");
        assert_eq!(txn.program_name, "PAYPGM");
        assert_eq!(txn.cpu_time, Duration::from_micros(1500));
        assert_eq!(txn.response_time, Duration::from_millis(250));
        assert_eq!(txn.errors, 3);
        assert_eq!(txn.header.subsystem_id, "CICS");
    }

    #[test]
    fn test_decode_file_stats() {
        let mut w = FrameWriter::new(110, 2, 170);
        product(&mut w);
        w.put_text(50, 8, "CUSTFILE").unwrap();
        w.put_text(58, 44, "PROD.CUSTOMER.KSDS").unwrap();
        w.put_uint(138, 4, 200).unwrap();
        w.put_uint(142, 4, 150).unwrap();
        w.put_uint(166, 4, 1).unwrap();
        let frame = w.finish().unwrap();

        let DecodedRecord::FileStats(file) = decode(&frame) else {
            panic!("expected file stats");
        };
        assert_eq!(file.file_name, "CUSTFILE");
        assert_eq!(file.dataset_name, "PROD.CUSTOMER.KSDS");
        assert_eq!(file.duplicate_key, 1);
        assert_eq!(file.buffer_hit_ratio(), Some(0.75));
    }

    #[test]
    fn test_buffer_hit_ratio_without_requests() {
        let frame = FrameWriter::new(110, 2, 170).finish().unwrap();
        let DecodedRecord::FileStats(file) = decode(&frame) else {
            panic!("expected file stats");
        };
        assert_eq!(file.buffer_hit_ratio(), None);
    }

    #[test]
    fn test_decode_storage_stats() {
        let mut w = FrameWriter::new(110, 5, 130);
        product(&mut w);
        w.put_text(50, 8, "CDSA").unwrap();
        w.put_uint(66, 8, 64 << 20).unwrap();
        w.put_uint(122, 8, 1 << 20).unwrap();
        let frame = w.finish().unwrap();

        let DecodedRecord::StorageStats(pool) = decode(&frame) else {
            panic!("expected storage stats");
        };
        assert_eq!(pool.pool_name, "CDSA");
        assert_eq!(pool.total_storage, 64 << 20);
        assert_eq!(pool.largest_fragment, 1 << 20);
    }

    #[test]
    fn test_decode_terminal_and_program_stats() {
        let mut w = FrameWriter::new(110, 4, 122);
        w.put_text(50, 4, "T001").unwrap();
        w.put_uint(90, 8, 9_000_000_000).unwrap();
        let DecodedRecord::TerminalStats(term) = decode(&w.finish().unwrap()) else {
            panic!("expected terminal stats");
        };
        assert_eq!(term.terminal_id, "T001");
        assert_eq!(term.bytes_sent, 9_000_000_000);

        let mut w = FrameWriter::new(110, 3, 122);
        w.put_text(58, 8, "COBOL").unwrap();
        w.put_uint(118, 4, 2).unwrap();
        let DecodedRecord::ProgramStats(pgm) = decode(&w.finish().unwrap()) else {
            panic!("expected program stats");
        };
        assert_eq!(pgm.language, "COBOL");
        assert_eq!(pgm.compression_errors, 2);
    }
}
