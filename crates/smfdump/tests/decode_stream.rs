//! End-to-end decoding of synthetic dumps.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use smfdump::{
    scan, DecodeError, DecodeSession, DecodedRecord, DecoderConfig, DumpWriter, FieldDescriptor,
    FrameFault, FrameWriter, Layout, LayoutRegistry, RecordFilter, TimeScale,
};
use smfdump_encoding::CP037;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn step_end(job_name: &str) -> Vec<u8> {
    let mut w = FrameWriter::new(30, 1, 116).system_id("SYS1");
    w.put_text(28, 8, job_name).unwrap();
    w.put_text(36, 8, "STEP1").unwrap();
    w.put_uint(68, 4, 5_000_000).unwrap();
    w.put_uint(76, 4, 1050).unwrap();
    w.finish().unwrap()
}

fn transaction(txn: &str) -> Vec<u8> {
    let mut w = FrameWriter::new(110, 1, 134).subsystem_id("CICS");
    w.put_text(23, 8, "CICSPROD").unwrap();
    w.put_text(43, 2, "01").unwrap();
    w.put_text(50, 4, txn).unwrap();
    w.put_uint(86, 4, 12).unwrap();
    w.finish().unwrap()
}

/// A 24-byte region whose length prefix reads as 1.
fn corrupt_region() -> Vec<u8> {
    let mut bytes = vec![0x00, 0x01];
    bytes.resize(24, 0);
    bytes
}

fn decode_all(data: &[u8]) -> Vec<Result<DecodedRecord, DecodeError>> {
    DecodeSession::new(data, DecoderConfig::default()).unwrap().collect()
}

// ─────── Framing ───────

#[test]
fn test_valid_corrupt_valid() {
    init_tracing();
    let mut dump = DumpWriter::new();
    dump.push(step_end("PAYROLL")).unwrap();
    let corrupt_at = dump.push_raw(&corrupt_region());
    let second = dump.push(transaction("PAY1")).unwrap();
    let data = dump.to_dataset();

    let mut session = DecodeSession::new(&data[..], DecoderConfig::default()).unwrap();
    let results: Vec<_> = session.by_ref().collect();
    assert_eq!(results.len(), 3);

    match &results[0] {
        Ok(DecodedRecord::StepEnd(step)) => assert_eq!(step.job_name, "PAYROLL"),
        other => panic!("unexpected first result: {other:?}"),
    }
    assert_eq!(
        results[1],
        Err(DecodeError::BadFrameLength {
            offset: corrupt_at,
            length: 1,
            reason: FrameFault::TooShort,
        })
    );
    match &results[2] {
        Ok(DecodedRecord::Transaction(txn)) => {
            assert_eq!(txn.transaction_id, "PAY1");
            assert_eq!(txn.header.offset, second);
        }
        other => panic!("unexpected last result: {other:?}"),
    }

    let counters = session.counters();
    assert_eq!(counters.decoded(), 2);
    assert!(counters.errors() >= 1);
    assert_eq!(counters.resync_bytes_skipped, 24);
}

#[test]
fn test_truncated_final_frame() {
    init_tracing();
    let mut data = step_end("FIRST");
    let mut last = step_end("LAST");
    last.truncate(60);
    data.extend(&last);

    let results = decode_all(&data);
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert_eq!(
        results[1],
        Err(DecodeError::Truncated { offset: 116, declared: 116, available: 60 })
    );
}

#[test]
fn test_truncated_frame_after_corrupt_region() {
    init_tracing();
    let mut dump = DumpWriter::new();
    dump.push(step_end("FIRST")).unwrap();
    let corrupt_at = dump.push_raw(&corrupt_region());
    let mut last = step_end("LAST");
    last.truncate(60);
    let last_at = dump.push_raw(&last);
    let data = dump.to_dataset();

    let mut session = DecodeSession::new(&data[..], DecoderConfig::default()).unwrap();
    let results: Vec<_> = session.by_ref().collect();
    assert_eq!(results.len(), 3);
    assert!(matches!(&results[0], Ok(DecodedRecord::StepEnd(s)) if s.job_name == "FIRST"));
    assert!(matches!(
        results[1],
        Err(DecodeError::BadFrameLength { offset, .. }) if offset == corrupt_at
    ));
    assert_eq!(
        results[2],
        Err(DecodeError::Truncated { offset: last_at, declared: 116, available: 60 })
    );
    let truncated = results.iter().filter(|r| matches!(r, Err(DecodeError::Truncated { .. }))).count();
    assert_eq!(truncated, 1);
    assert_eq!(session.counters().framing_errors, 2);
}

#[test]
fn test_only_header_bytes_left() {
    // Fewer than a header's worth of trailing bytes is a clean end.
    let mut data = step_end("JOB");
    data.extend([0u8; 22]);
    let results = decode_all(&data);
    assert_eq!(results.len(), 1);
    assert!(results[0].is_ok());
}

#[test]
fn test_empty_dump() {
    let session = DecodeSession::new(io::empty(), DecoderConfig::default()).unwrap();
    let counters = session.finish();
    assert_eq!(counters.decoded(), 0);
    assert_eq!(counters.errors(), 0);
}

#[test]
fn test_resync_skips_garbage_run() {
    let mut data = step_end("A");
    data.extend([0xFF; 301]);
    data.extend(step_end("B"));
    let results = decode_all(&data);
    let ok: Vec<&DecodedRecord> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let errors = results.iter().filter(|r| r.is_err()).count();
    assert_eq!(ok.len(), 2);
    assert_eq!(errors, 1);
    assert_eq!(ok[1].offset(), 116 + 301);
}

// ─────── Field decoding ───────

#[test]
fn test_text_trimming_and_durations() {
    let results = decode_all(&step_end("ABC"));
    let Ok(DecodedRecord::StepEnd(step)) = &results[0] else {
        panic!("expected step end");
    };
    assert_eq!(step.job_name, "ABC");
    assert_eq!(step.cpu_time.as_millis(), 5000);
    assert_eq!(step.elapsed_time.as_millis(), 10_500);
}

#[test]
fn test_field_error_keeps_stream_in_sync() {
    let short = FrameWriter::new(30, 1, 100).finish().unwrap();
    let mut data = short.clone();
    data.extend(step_end("NEXT"));

    let results = decode_all(&data);
    assert_eq!(results.len(), 2);
    assert_eq!(
        results[0],
        Err(DecodeError::OffsetOutOfRange { offset: 100, field: "return_code", record_length: 100 })
    );
    assert!(matches!(&results[1], Ok(DecodedRecord::StepEnd(s)) if s.job_name == "NEXT"));
}

#[test]
fn test_unrecognized_preserves_bytes() {
    let mut w = FrameWriter::new(42, 7, 64);
    w.put_bytes(23, &(0u8..41).collect::<Vec<_>>()).unwrap();
    let frame = w.finish().unwrap();

    let results = decode_all(&frame);
    let Ok(DecodedRecord::Unrecognized(raw)) = &results[0] else {
        panic!("expected unrecognized record");
    };
    assert_eq!(raw.header.key(), (42, 7));
    assert_eq!(raw.raw_bytes, frame);
}

#[test]
fn test_code_page_from_config() {
    let mut w = FrameWriter::new(30, 1, 116).code_page(&CP037);
    w.put_text(28, 8, "A[B]").unwrap();
    let frame = w.finish().unwrap();

    let config = DecoderConfig::default().with_code_page("CP037");
    let results: Vec<_> = DecodeSession::new(&frame[..], config).unwrap().collect();
    let Ok(DecodedRecord::StepEnd(step)) = &results[0] else {
        panic!("expected step end");
    };
    assert_eq!(step.job_name, "A[B]");

    // The same bytes read through CP500 give different brackets.
    let results = decode_all(&frame);
    let Ok(DecodedRecord::StepEnd(step)) = &results[0] else {
        panic!("expected step end");
    };
    assert_ne!(step.job_name, "A[B]");
}

#[test]
fn test_custom_layout_registration() {
    let mut registry = LayoutRegistry::standard().unwrap();
    registry
        .register(Layout::new(
            89,
            1,
            "usage",
            40,
            vec![
                FieldDescriptor::text("product", 24, 8),
                FieldDescriptor::time("busy", 32, 4, TimeScale::Milliseconds),
            ],
        ))
        .unwrap();

    let mut w = FrameWriter::new(89, 1, 40);
    w.put_text(24, 8, "DB2").unwrap();
    w.put_uint(32, 4, 750).unwrap();
    let frame = w.finish().unwrap();

    let session =
        DecodeSession::with_registry(&frame[..], DecoderConfig::default(), Arc::new(registry))
            .unwrap();
    let records: Vec<_> = session.collect();
    let Ok(DecodedRecord::Generic(record)) = &records[0] else {
        panic!("expected generic record");
    };
    assert_eq!(record.layout, "usage");
    assert_eq!(record.fields.text("product"), "DB2");
    assert_eq!(record.fields.duration("busy"), Duration::from_millis(750));
}

#[test]
fn test_flat_map_for_reporting() {
    let results = decode_all(&transaction("INQ1"));
    let map = results[0].as_ref().unwrap().to_flat_map().unwrap();
    assert_eq!(map["kind"], "transaction");
    assert_eq!(map["transaction_id"], "INQ1");
    assert_eq!(map["applid"], "CICSPROD");
    assert_eq!(map["smf_release"], "01");
    assert_eq!(map["response_time"], 120);
    assert_eq!(map["subsystem_id"], "CICS");
    assert_eq!(map["offset"], 0);
}

// ─────── Sources and configuration ───────

#[test]
fn test_file_backed_session() {
    let mut dump = DumpWriter::new();
    for i in 0..50 {
        dump.push(step_end(&format!("JOB{i}"))).unwrap();
        dump.push(transaction("T001")).unwrap();
    }
    let file = tempfile::NamedTempFile::new().unwrap();
    let written = dump.write_to_file(file.path()).unwrap();

    let config = DecoderConfig::default().with_window_size(256);
    let session = DecodeSession::open(file.path(), config).unwrap();
    let counters = session.finish();
    assert_eq!(counters.decoded(), 100);
    assert_eq!(counters.get(30, 1).decoded, 50);
    assert_eq!(counters.get(110, 1).decoded, 50);
    assert_eq!(counters.bytes_consumed, written);
}

#[test]
fn test_open_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = DecodeSession::open(dir.path().join("missing.smf"), DecoderConfig::default())
        .unwrap_err();
    assert!(matches!(err, smfdump::SmfDumpError::Io(_)));
}

#[test]
fn test_config_file_filter() {
    let mut config_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        config_file,
        "code_page = \"CP500\"\n\n[filter]\ninclude_subtypes = [[110, 1]]"
    )
    .unwrap();
    let config = DecoderConfig::from_file(config_file.path()).unwrap();
    assert_eq!(
        config.filter,
        RecordFilter { include_subtypes: vec![(110, 1)], ..Default::default() }
    );

    let mut data = step_end("SKIPPED");
    data.extend(transaction("KEEP"));
    let mut session = smfdump::run(&data[..], config).unwrap();
    let records: Vec<_> = session.by_ref().collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].as_ref().unwrap().kind(), "transaction");
    assert_eq!(session.counters().filtered, 1);
}

/// Hands out its data, then fails.
struct FailingSource {
    data: Vec<u8>,
    served: bool,
}

impl Read for FailingSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.served {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "link dropped"));
        }
        let n = buf.len().min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data.drain(..n);
        if self.data.is_empty() {
            self.served = true;
        }
        Ok(n)
    }
}

#[test]
fn test_source_failure_ends_sequence() {
    init_tracing();
    let source = FailingSource {
        data: step_end("BEFORE"),
        served: false,
    };
    let config = DecoderConfig::default().with_window_size(16);
    let mut session = DecodeSession::new(source, config).unwrap();
    let results: Vec<_> = session.by_ref().collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    let err = results[1].as_ref().unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, DecodeError::SourceFailure { kind: io::ErrorKind::ConnectionReset, .. }));
    assert!(session.next().is_none());
    assert_eq!(session.counters().source_failures, 1);
}

#[test]
fn test_diagnostic_scan_of_file() {
    let mut dump = DumpWriter::new();
    dump.push(step_end("DIAG")).unwrap();
    dump.push_raw(&corrupt_region());
    dump.push(transaction("T1")).unwrap();
    let file = tempfile::NamedTempFile::new().unwrap();
    dump.write_to_file(file.path()).unwrap();

    let source = std::fs::File::open(file.path()).unwrap();
    let registry = LayoutRegistry::standard().unwrap();
    let report = scan(source, &DecoderConfig::default(), &registry, 10).unwrap();
    assert_eq!(report.frames().count(), 2);
    assert_eq!(report.errors().count(), 1);
    let text = report.render();
    assert!(text.contains("Layout=type30_step_end"));
    assert!(text.contains("Layout=type110_transaction"));
}
