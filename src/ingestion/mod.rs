//! Streaming import of vehicle records
//!
//! A JSON array is parsed element by element, mapped onto the fixed
//! `vehicle_info` shape, accumulated into batches and written one
//! transaction per batch. The parser is suspended while a batch is being
//! written, so memory stays bounded by the batch size.

pub mod accumulator;
pub mod backpressure;
pub mod fields;
pub mod mapper;
pub mod orchestrator;
pub mod parser;
pub mod schema_init;
pub mod writer;

pub use accumulator::{Batch, BatchAccumulator, DEFAULT_BATCH_SIZE};
pub use backpressure::{BackpressureController, Flow};
pub use fields::{FieldSpec, VEHICLE_FIELDS};
pub use mapper::{FieldSource, FieldValue, NormalizedRecord, RecordMapper};
pub use orchestrator::{run_import, ImportOrchestrator};
pub use parser::{ArrayStreamParser, Emission, Suspendable};
pub use schema_init::SchemaInitializer;
pub use writer::TransactionalWriter;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a successful import run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub run_id: String,
    pub rows_written: u64,
    /// Committed batch sizes, in commit order
    pub batch_sizes: Vec<usize>,
    /// Most records held in memory without being persisted
    pub peak_buffered: usize,
    pub suspensions: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ImportSummary {
    pub fn batches(&self) -> usize {
        self.batch_sizes.len()
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
