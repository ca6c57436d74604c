//! Transactional Writer - one batch, one transaction
//!
//! Inserts run in record order on the transaction's single connection. The
//! first failing insert rolls the whole batch back; there is no partial
//! commit and no retry.

use crate::db::schema::InsertStatement;
use crate::db::store::RecordStore;
use crate::error::{StoreError, WriteError};
use crate::ingestion::accumulator::Batch;
use tracing::{debug, warn};

pub struct TransactionalWriter<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    statement: InsertStatement,
    /// Ordinal of the most recently attempted batch
    ordinal: u64,
}

impl<'a, S: RecordStore + ?Sized> TransactionalWriter<'a, S> {
    pub fn new(store: &'a S, statement: InsertStatement) -> Self {
        Self {
            store,
            statement,
            ordinal: 0,
        }
    }

    /// Batches attempted so far, successful or not
    pub fn batches_attempted(&self) -> u64 {
        self.ordinal
    }

    /// Persist `batch` atomically and return the number of rows written.
    ///
    /// An empty batch opens no transaction and does not consume an ordinal.
    pub async fn write_batch(&mut self, batch: Batch) -> Result<u64, WriteError> {
        if batch.is_empty() {
            return Ok(0);
        }

        self.ordinal += 1;
        let ordinal = self.ordinal;
        let rows = batch.len();

        self.persist(&batch)
            .await
            .map_err(|source| WriteError {
                batch: ordinal,
                rows,
                source,
            })
    }

    async fn persist(&self, batch: &Batch) -> Result<u64, StoreError> {
        let mut tx = self.store.begin().await?;
        let mut written = 0u64;

        for (index, record) in batch.iter().enumerate() {
            let params = record.params();
            match tx.insert(&self.statement, &params).await {
                Ok(affected) => written += affected,
                Err(err) => {
                    warn!(
                        batch = self.ordinal,
                        record = index + 1,
                        error = %err,
                        "Insert failed, rolling back batch"
                    );
                    if let Err(rollback_err) = tx.rollback().await {
                        warn!(error = %rollback_err, "Rollback failed");
                    }
                    return Err(err);
                }
            }
        }

        tx.commit().await?;
        debug!(batch = self.ordinal, rows = written, "Batch committed");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::ingestion::fields;
    use crate::ingestion::mapper::RecordMapper;
    use serde_json::json;

    fn batch(years: &[&str]) -> Batch {
        let mapper = RecordMapper::vehicle();
        years
            .iter()
            .map(|year| mapper.map(&json!({ "vehicleYear": year })))
            .collect::<Vec<_>>()
            .into()
    }

    async fn store_with_table() -> (MemoryStore, InsertStatement) {
        let store = MemoryStore::new();
        let table = fields::vehicle_table(fields::DEFAULT_TABLE);
        store.ensure_table(&table).await.unwrap();
        (store, table.insert_statement())
    }

    #[tokio::test]
    async fn test_write_batch_commits_all_rows() {
        let (store, stmt) = store_with_table().await;
        let mut writer = TransactionalWriter::new(&store, stmt);

        let written = writer.write_batch(batch(&["2001", "2002", "2003"])).await.unwrap();

        assert_eq!(written, 3);
        assert_eq!(store.row_count(fields::DEFAULT_TABLE), 3);
        assert_eq!(store.value(fields::DEFAULT_TABLE, 2, "year").as_deref(), Some("2003"));
        assert_eq!(writer.batches_attempted(), 1);
    }

    #[tokio::test]
    async fn test_bad_record_rolls_back_whole_batch() {
        let (store, stmt) = store_with_table().await;
        let mut writer = TransactionalWriter::new(&store, stmt);

        writer.write_batch(batch(&["2001"])).await.unwrap();
        let err = writer
            .write_batch(batch(&["2002", "19X8", "2004"]))
            .await
            .unwrap_err();

        assert_eq!(err.batch, 2);
        assert_eq!(err.rows, 3);
        assert!(matches!(err.source, StoreError::Type { ref column, .. } if column == "year"));
        assert_eq!(store.row_count(fields::DEFAULT_TABLE), 1);
        assert_eq!(store.rollbacks(), 1);
        assert_eq!(store.open_transactions(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_skipped() {
        let (store, stmt) = store_with_table().await;
        let mut writer = TransactionalWriter::new(&store, stmt);

        assert_eq!(writer.write_batch(Batch::default()).await.unwrap(), 0);
        assert_eq!(writer.batches_attempted(), 0);
        assert_eq!(store.commits(), 0);
    }

    #[tokio::test]
    async fn test_missing_table_fails_batch() {
        let store = MemoryStore::new();
        let stmt = fields::vehicle_table("nowhere").insert_statement();
        let mut writer = TransactionalWriter::new(&store, stmt);

        let err = writer.write_batch(batch(&["2001"])).await.unwrap_err();
        assert_eq!(err.batch, 1);
        assert!(err.to_string().contains("does not exist"));
    }
}
