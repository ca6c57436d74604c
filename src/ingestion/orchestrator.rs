//! Import Orchestrator - Main import coordinator
//!
//! Sequences schema initialization and the streaming pipeline
//! (parse -> map -> accumulate -> flush) for one run. The orchestrator owns
//! the store for the duration of the run and closes it exactly once, on
//! success and on every failure path.

use crate::config::ImportConfig;
use crate::db::connection::PgStore;
use crate::db::memory::MemoryStore;
use crate::db::store::RecordStore;
use crate::error::{ImportError, ParseError, ParseErrorKind, Result};
use crate::ingestion::accumulator::BatchAccumulator;
use crate::ingestion::backpressure::{BackpressureController, Flow};
use crate::ingestion::fields;
use crate::ingestion::mapper::RecordMapper;
use crate::ingestion::parser::{ArrayStreamParser, Emission};
use crate::ingestion::schema_init::SchemaInitializer;
use crate::ingestion::writer::TransactionalWriter;
use crate::ingestion::ImportSummary;
use chrono::Utc;
use tokio::io::AsyncRead;
use tracing::{info, warn};
use uuid::Uuid;

pub struct ImportOrchestrator {
    config: ImportConfig,
    mapper: RecordMapper,
}

impl ImportOrchestrator {
    pub fn new(config: ImportConfig) -> Self {
        Self {
            config,
            mapper: RecordMapper::vehicle(),
        }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Run the import from `input` into `store`.
    ///
    /// The store is closed before this returns, whatever the outcome.
    pub async fn run<S, R>(&self, store: S, input: R) -> Result<ImportSummary>
    where
        S: RecordStore,
        R: AsyncRead + Unpin,
    {
        let result = match self.config.validate() {
            Ok(()) => self.pipeline(&store, input).await,
            Err(err) => Err(err),
        };
        store.close().await;
        result
    }

    async fn pipeline<S, R>(&self, store: &S, input: R) -> Result<ImportSummary>
    where
        S: RecordStore,
        R: AsyncRead + Unpin,
    {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let batch_size = self.config.batch_size;

        info!(
            run_id = %run_id,
            store = store.name(),
            table = %self.config.table,
            batch_size,
            "Starting import"
        );

        let table = fields::vehicle_table(&self.config.table);
        SchemaInitializer::new(store, &table).ensure_schema().await?;

        let mut parser = ArrayStreamParser::with_buffer_size(input, self.config.read_buffer_bytes);
        let mut accumulator = BatchAccumulator::new(batch_size);
        let mut backpressure = BackpressureController::new();
        let mut writer = TransactionalWriter::new(store, table.insert_statement());

        let mut rows_written = 0u64;
        let mut batch_sizes = Vec::new();

        loop {
            match parser.next_element().await? {
                Emission::Element(element) => {
                    if !element.is_object() {
                        warn!(
                            element = parser.elements_emitted(),
                            offset = parser.offset(),
                            "Element is not an object; mapping to an empty record"
                        );
                    }
                    accumulator.append(self.mapper.map(&element));

                    if backpressure.admit(&mut parser, &accumulator) == Flow::Flush {
                        let batch = accumulator.drain();
                        let rows = batch.len();
                        rows_written += writer.write_batch(batch).await?;
                        batch_sizes.push(rows);
                        info!(batch = writer.batches_attempted(), "Processed batch of {} records", rows);
                        backpressure.release(&mut parser);
                    }
                }
                Emission::Suspended => backpressure.release(&mut parser),
                Emission::End => break,
            }
        }

        if !accumulator.is_empty() {
            let batch = accumulator.drain();
            let rows = batch.len();
            rows_written += writer.write_batch(batch).await?;
            batch_sizes.push(rows);
            info!(batch = writer.batches_attempted(), "Processed final batch of {} records", rows);
        }

        info!(rows = rows_written, batches = batch_sizes.len(), "All data inserted successfully");

        Ok(ImportSummary {
            run_id,
            rows_written,
            batch_sizes,
            peak_buffered: backpressure.peak_buffered(),
            suspensions: backpressure.suspensions(),
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Open the configured input and store, then run the import
pub async fn run_import(config: ImportConfig) -> Result<ImportSummary> {
    config.validate()?;

    let file = tokio::fs::File::open(&config.input).await.map_err(|e| {
        ImportError::Parse(ParseError {
            offset: None,
            kind: ParseErrorKind::Io(format!("{}: {}", config.input.display(), e)),
        })
    })?;
    info!(input = %config.input.display(), "Reading input");

    let orchestrator = ImportOrchestrator::new(config);
    if orchestrator.config().dry_run {
        info!("Dry run: writing to the in-process store");
        orchestrator.run(MemoryStore::new(), file).await
    } else {
        let store = PgStore::connect(&orchestrator.config().database).await?;
        orchestrator.run(store, file).await
    }
}
