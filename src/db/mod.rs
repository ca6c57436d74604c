//! Database module for the import destination
//! 
//! This module provides the record store abstraction, its PostgreSQL and
//! in-process implementations, and the table definitions they share.

pub mod connection;
pub mod memory;
pub mod schema;
pub mod store;

pub use connection::{init_pool, PgStore};
pub use memory::MemoryStore;
pub use schema::{ColumnDef, InsertStatement, SqlType, TableDef};
pub use store::{RecordStore, StoreTransaction};
