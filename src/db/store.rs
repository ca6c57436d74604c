//! Record store traits - the capability the import pipeline writes through
//!
//! Implementations:
//! - PgStore: PostgreSQL via a sqlx connection pool
//! - MemoryStore: in-process store for dry runs and tests

use crate::db::schema::{InsertStatement, TableDef};
use crate::error::StoreError;
use async_trait::async_trait;

/// A pooled destination store.
///
/// The store is owned by one import run and closed exactly once at its end.
/// Every connection is scoped to a single `ensure_table` call or transaction.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Backend name for logging (e.g. "postgres", "memory")
    fn name(&self) -> &'static str;

    /// Create the table if it does not exist; never alters an existing one
    async fn ensure_table(&self, table: &TableDef) -> Result<(), StoreError>;

    /// Acquire a connection and open a transaction on it
    async fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError>;

    /// Tear down the pool
    async fn close(&self);
}

/// An open transaction holding one connection.
///
/// Dropping it without `commit` rolls back and releases the connection.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Insert one row; `params` are text values (or NULL) in column order
    async fn insert(
        &mut self,
        statement: &InsertStatement,
        params: &[Option<String>],
    ) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
