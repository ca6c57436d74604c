//! Schema Initializer - makes sure the destination table exists

use crate::db::schema::TableDef;
use crate::db::store::RecordStore;
use crate::error::SchemaError;
use tracing::{error, info};

pub struct SchemaInitializer<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    table: &'a TableDef,
}

impl<'a, S: RecordStore + ?Sized> SchemaInitializer<'a, S> {
    pub fn new(store: &'a S, table: &'a TableDef) -> Self {
        Self { store, table }
    }

    /// Create the table with its full column set if absent.
    ///
    /// Idempotent; an existing table is left untouched.
    pub async fn ensure_schema(&self) -> Result<(), SchemaError> {
        match self.store.ensure_table(self.table).await {
            Ok(()) => {
                info!(table = %self.table.name, "Table created or already exists");
                Ok(())
            }
            Err(source) => {
                error!(table = %self.table.name, error = %source, "Error creating table");
                Err(SchemaError {
                    table: self.table.name.clone(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::ingestion::fields;

    #[tokio::test]
    async fn test_ensure_schema_twice() {
        let store = MemoryStore::new();
        let table = fields::vehicle_table("vehicle_info");
        let init = SchemaInitializer::new(&store, &table);

        init.ensure_schema().await.unwrap();
        init.ensure_schema().await.unwrap();

        assert!(store.has_table("vehicle_info"));
        assert_eq!(store.table_creations(), 1);
    }

    #[tokio::test]
    async fn test_ddl_failure_is_schema_error() {
        let store = MemoryStore::new();
        store.reject_ddl("permission denied for schema public");
        let table = fields::vehicle_table("vehicle_info");

        let err = SchemaInitializer::new(&store, &table)
            .ensure_schema()
            .await
            .unwrap_err();
        assert_eq!(err.table, "vehicle_info");
        assert!(err.to_string().contains("permission denied"));
    }
}
