//! Type 30: common address space work.
//!
//! Job and step accounting across the job lifecycle:
//! - Subtype 1: Step termination
//! - Subtype 2: Job termination
//! - Subtype 3: Step initiation
//! - Subtype 4: Job initiation
//! - Subtype 5: Network step (NJE)
//!
//! Every subtype starts its data section at offset 28 with the job name.

use std::time::Duration;

use serde::Serialize;

use crate::extract::TimeScale::{Hundredths, Microseconds};
use crate::header::FrameHeader;
use crate::layout::{FieldDescriptor as F, Layout};
use crate::record::{serialize_millis, DecodedFields, DecodedRecord};

/// SMF record type for address space work.
pub const RECORD_FAMILY: u8 = 30;

// ---------------------------------------------------------------------------
//  Subtype enum
// ---------------------------------------------------------------------------

/// Type 30 subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Type30Subtype {
    /// Subtype 1: Step termination.
    StepTermination,
    /// Subtype 2: Job termination.
    JobTermination,
    /// Subtype 3: Step initiation.
    StepInitiation,
    /// Subtype 4: Job initiation.
    JobInitiation,
    /// Subtype 5: Network step.
    NetworkStep,
}

impl Type30Subtype {
    pub const ALL: [Type30Subtype; 5] = [
        Type30Subtype::StepTermination,
        Type30Subtype::JobTermination,
        Type30Subtype::StepInitiation,
        Type30Subtype::JobInitiation,
        Type30Subtype::NetworkStep,
    ];

    /// Get the numeric subtype code.
    pub fn code(&self) -> u8 {
        match self {
            Type30Subtype::StepTermination => 1,
            Type30Subtype::JobTermination => 2,
            Type30Subtype::StepInitiation => 3,
            Type30Subtype::JobInitiation => 4,
            Type30Subtype::NetworkStep => 5,
        }
    }

    /// Construct from numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Field layout for this subtype.
    pub fn layout(&self) -> Layout {
        let code = self.code();
        match self {
            Type30Subtype::StepTermination => {
                Layout::new(RECORD_FAMILY, code, "type30_step_end", 116, STEP_END_FIELDS)
                    .with_builder(build_step_end)
            }
            Type30Subtype::JobTermination => {
                Layout::new(RECORD_FAMILY, code, "type30_job_end", 92, JOB_END_FIELDS)
                    .with_builder(build_job_end)
            }
            Type30Subtype::StepInitiation => {
                Layout::new(RECORD_FAMILY, code, "type30_step_start", 84, STEP_START_FIELDS)
                    .with_builder(build_step_start)
            }
            Type30Subtype::JobInitiation => {
                Layout::new(RECORD_FAMILY, code, "type30_job_start", 76, JOB_START_FIELDS)
                    .with_builder(build_job_start)
            }
            Type30Subtype::NetworkStep => {
                Layout::new(RECORD_FAMILY, code, "type30_network_step", 98, NETWORK_STEP_FIELDS)
                    .with_builder(build_network_step)
            }
        }
    }
}

/// Layouts for every type 30 subtype.
pub fn layouts() -> Vec<Layout> {
    Type30Subtype::ALL.iter().map(Type30Subtype::layout).collect()
}

// ---------------------------------------------------------------------------
//  Field maps
// ---------------------------------------------------------------------------

const STEP_END_FIELDS: &[F] = &[
    F::text("job_name", 28, 8),
    F::text("step_name", 36, 8),
    F::text("program_name", 44, 8),
    F::text("user_id", 52, 8),
    F::text("job_number", 60, 8),
    F::time("cpu_time", 68, 4, Microseconds),
    F::time("elapsed_time", 76, 4, Hundredths),
    F::integer("io_count", 84, 4),
    F::integer("service_units", 92, 4),
    F::integer("return_code", 100, 2),
    F::integer("pages_read", 104, 4),
    F::integer("pages_written", 108, 4),
    F::integer("excp_count", 112, 4),
];

const JOB_END_FIELDS: &[F] = &[
    F::text("job_name", 28, 8),
    F::text("job_number", 36, 8),
    F::text("user_id", 44, 8),
    F::text("job_class", 52, 1),
    F::integer("total_steps", 56, 2),
    F::integer("failed_steps", 58, 2),
    F::time("cpu_time", 60, 4, Microseconds),
    F::time("elapsed_time", 64, 4, Hundredths),
    F::integer("total_excp_count", 68, 4),
    F::integer("total_pages_read", 72, 4),
    F::integer("total_pages_written", 76, 4),
    F::integer("termination_code", 80, 2),
    F::integer("memory_allocated_mb", 84, 4),
    F::integer("memory_max_used_mb", 88, 4),
];

const STEP_START_FIELDS: &[F] = &[
    F::text("job_name", 28, 8),
    F::text("job_number", 36, 8),
    F::text("step_name", 44, 8),
    F::text("program_name", 52, 8),
    F::text("procedure_step_name", 60, 8),
    F::text("accounting_code", 68, 8),
    F::integer("region_size_mb", 76, 4),
    F::time("step_start_time", 80, 4, Hundredths),
];

const JOB_START_FIELDS: &[F] = &[
    F::text("job_name", 28, 8),
    F::text("job_number", 36, 8),
    F::text("user_id", 44, 8),
    F::text("job_class", 52, 1),
    F::integer("job_priority", 53, 1),
    F::text("scheduling_environment", 56, 8),
    F::text("accounting_code", 64, 8),
    F::time("job_start_time", 72, 4, Hundredths),
];

const NETWORK_STEP_FIELDS: &[F] = &[
    F::text("job_name", 28, 8),
    F::text("job_number", 36, 8),
    F::text("netstep_name", 44, 8),
    F::text("network_destination", 52, 16),
    F::text("network_protocol", 68, 8),
    F::integer("bytes_transmitted", 76, 8),
    F::integer("bytes_received", 84, 8),
    F::time("network_response_time", 92, 4, Microseconds),
    F::integer("return_code", 96, 2),
];

// ---------------------------------------------------------------------------
//  Records
// ---------------------------------------------------------------------------

/// Subtype 1: step termination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Type30StepEnd {
    #[serde(flatten)]
    pub header: FrameHeader,
    pub job_name: String,
    pub step_name: String,
    pub program_name: String,
    pub user_id: String,
    pub job_number: String,
    #[serde(serialize_with = "serialize_millis")]
    pub cpu_time: Duration,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed_time: Duration,
    pub io_count: u32,
    pub service_units: u32,
    pub return_code: u16,
    pub pages_read: u32,
    pub pages_written: u32,
    pub excp_count: u32,
}

impl Type30StepEnd {
    /// Whether the step ended with a non-zero return code.
    pub fn failed(&self) -> bool {
        self.return_code != 0
    }
}

fn build_step_end(header: FrameHeader, f: &DecodedFields) -> DecodedRecord {
    DecodedRecord::StepEnd(Type30StepEnd {
        header,
        job_name: f.text("job_name"),
        step_name: f.text("step_name"),
        program_name: f.text("program_name"),
        user_id: f.text("user_id"),
        job_number: f.text("job_number"),
        cpu_time: f.duration("cpu_time"),
        elapsed_time: f.duration("elapsed_time"),
        io_count: f.uint("io_count"),
        service_units: f.uint("service_units"),
        return_code: f.uint("return_code"),
        pages_read: f.uint("pages_read"),
        pages_written: f.uint("pages_written"),
        excp_count: f.uint("excp_count"),
    })
}

/// Subtype 2: job termination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Type30JobEnd {
    #[serde(flatten)]
    pub header: FrameHeader,
    pub job_name: String,
    pub job_number: String,
    pub user_id: String,
    pub job_class: String,
    pub total_steps: u16,
    pub failed_steps: u16,
    #[serde(serialize_with = "serialize_millis")]
    pub cpu_time: Duration,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed_time: Duration,
    pub total_excp_count: u32,
    pub total_pages_read: u32,
    pub total_pages_written: u32,
    pub termination_code: u16,
    pub memory_allocated_mb: u32,
    pub memory_max_used_mb: u32,
}

fn build_job_end(header: FrameHeader, f: &DecodedFields) -> DecodedRecord {
    DecodedRecord::JobEnd(Type30JobEnd {
        header,
        job_name: f.text("job_name"),
        job_number: f.text("job_number"),
        user_id: f.text("user_id"),
        job_class: f.text("job_class"),
        total_steps: f.uint("total_steps"),
        failed_steps: f.uint("failed_steps"),
        cpu_time: f.duration("cpu_time"),
        elapsed_time: f.duration("elapsed_time"),
        total_excp_count: f.uint("total_excp_count"),
        total_pages_read: f.uint("total_pages_read"),
        total_pages_written: f.uint("total_pages_written"),
        termination_code: f.uint("termination_code"),
        memory_allocated_mb: f.uint("memory_allocated_mb"),
        memory_max_used_mb: f.uint("memory_max_used_mb"),
    })
}

/// Subtype 3: step initiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Type30StepStart {
    #[serde(flatten)]
    pub header: FrameHeader,
    pub job_name: String,
    pub job_number: String,
    pub step_name: String,
    pub program_name: String,
    pub procedure_step_name: String,
    pub accounting_code: String,
    pub region_size_mb: u32,
    /// Time since midnight.
    #[serde(serialize_with = "serialize_millis")]
    pub step_start_time: Duration,
}

fn build_step_start(header: FrameHeader, f: &DecodedFields) -> DecodedRecord {
    DecodedRecord::StepStart(Type30StepStart {
        header,
        job_name: f.text("job_name"),
        job_number: f.text("job_number"),
        step_name: f.text("step_name"),
        program_name: f.text("program_name"),
        procedure_step_name: f.text("procedure_step_name"),
        accounting_code: f.text("accounting_code"),
        region_size_mb: f.uint("region_size_mb"),
        step_start_time: f.duration("step_start_time"),
    })
}

/// Subtype 4: job initiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Type30JobStart {
    #[serde(flatten)]
    pub header: FrameHeader,
    pub job_name: String,
    pub job_number: String,
    pub user_id: String,
    pub job_class: String,
    pub job_priority: u8,
    pub scheduling_environment: String,
    pub accounting_code: String,
    /// Time since midnight.
    #[serde(serialize_with = "serialize_millis")]
    pub job_start_time: Duration,
}

fn build_job_start(header: FrameHeader, f: &DecodedFields) -> DecodedRecord {
    DecodedRecord::JobStart(Type30JobStart {
        header,
        job_name: f.text("job_name"),
        job_number: f.text("job_number"),
        user_id: f.text("user_id"),
        job_class: f.text("job_class"),
        job_priority: f.uint("job_priority"),
        scheduling_environment: f.text("scheduling_environment"),
        accounting_code: f.text("accounting_code"),
        job_start_time: f.duration("job_start_time"),
    })
}

/// Subtype 5: network step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Type30NetworkStep {
    #[serde(flatten)]
    pub header: FrameHeader,
    pub job_name: String,
    pub job_number: String,
    pub netstep_name: String,
    pub network_destination: String,
    pub network_protocol: String,
    pub bytes_transmitted: u64,
    pub bytes_received: u64,
    #[serde(serialize_with = "serialize_millis")]
    pub network_response_time: Duration,
    pub return_code: u16,
}

fn build_network_step(header: FrameHeader, f: &DecodedFields) -> DecodedRecord {
    DecodedRecord::NetworkStep(Type30NetworkStep {
        header,
        job_name: f.text("job_name"),
        job_number: f.text("job_number"),
        netstep_name: f.text("netstep_name"),
        network_destination: f.text("network_destination"),
        network_protocol: f.text("network_protocol"),
        bytes_transmitted: f.uint("bytes_transmitted"),
        bytes_received: f.uint("bytes_received"),
        network_response_time: f.duration("network_response_time"),
        return_code: f.uint("return_code"),
    })
}
