//! Streaming JSON to PostgreSQL import for vehicle records.
//!
//! See [`ingestion::ImportOrchestrator`] for the pipeline entry point.

pub mod config;
pub mod db;
pub mod error;
pub mod ingestion;

pub use config::{DatabaseConfig, ImportConfig};
pub use error::{ImportError, ParseError, SchemaError, StoreError, WriteError};
pub use ingestion::{run_import, ImportOrchestrator, ImportSummary};
