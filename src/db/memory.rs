//! In-process record store
//!
//! Behaves like the PostgreSQL store from the pipeline's point of view:
//! tables are created idempotently, rows only become visible on commit, and
//! every bound value is checked against its column type the way the server
//! would cast it. Backs `--dry-run` and the test-suite.

use crate::db::schema::{ColumnDef, InsertStatement, SqlType, TableDef};
use crate::db::store::{RecordStore, StoreTransaction};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Row = Vec<Option<String>>;

#[derive(Debug, Default)]
struct MemoryTable {
    columns: Vec<ColumnDef>,
    rows: Vec<Row>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, MemoryTable>,
    table_creations: u64,
    commits: u64,
    rollbacks: u64,
    committed_batch_sizes: Vec<usize>,
    open_transactions: usize,
    close_calls: u64,
    reject_ddl: Option<String>,
}

/// Shared handle; clones observe the same tables
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent `ensure_table` fail with `message`
    pub fn reject_ddl(&self, message: impl Into<String>) {
        self.lock().reject_ddl = Some(message.into());
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.lock().tables.contains_key(table)
    }

    /// Number of committed rows in `table`
    pub fn row_count(&self, table: &str) -> usize {
        self.lock().tables.get(table).map(|t| t.rows.len()).unwrap_or(0)
    }

    /// Committed value of `column` in the `row`-th committed row
    pub fn value(&self, table: &str, row: usize, column: &str) -> Option<String> {
        let state = self.lock();
        let table = state.tables.get(table)?;
        let index = table.columns.iter().position(|c| c.name == column)?;
        table.rows.get(row)?.get(index)?.clone()
    }

    pub fn table_creations(&self) -> u64 {
        self.lock().table_creations
    }

    pub fn commits(&self) -> u64 {
        self.lock().commits
    }

    pub fn rollbacks(&self) -> u64 {
        self.lock().rollbacks
    }

    /// Row counts of committed transactions, in commit order
    pub fn committed_batch_sizes(&self) -> Vec<usize> {
        self.lock().committed_batch_sizes.clone()
    }

    /// Transactions begun but not yet committed, rolled back or dropped
    pub fn open_transactions(&self) -> usize {
        self.lock().open_transactions
    }

    pub fn close_calls(&self) -> u64 {
        self.lock().close_calls
    }

    pub fn is_closed(&self) -> bool {
        self.close_calls() > 0
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_table(&self, table: &TableDef) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.close_calls > 0 {
            return Err(StoreError::Connect("pool is closed".to_string()));
        }
        if let Some(message) = &state.reject_ddl {
            return Err(StoreError::Query {
                statement: format!("CREATE TABLE {}", table.name),
                message: message.clone(),
            });
        }
        if !state.tables.contains_key(&table.name) {
            state.tables.insert(
                table.name.clone(),
                MemoryTable {
                    columns: table.columns.clone(),
                    rows: Vec::new(),
                },
            );
            state.table_creations += 1;
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
        let mut state = self.lock();
        if state.close_calls > 0 {
            return Err(StoreError::Connect("pool is closed".to_string()));
        }
        state.open_transactions += 1;
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            pending: Vec::new(),
            finished: false,
        }))
    }

    async fn close(&self) {
        self.lock().close_calls += 1;
    }
}

struct MemoryTransaction {
    store: MemoryStore,
    pending: Vec<(String, Row)>,
    finished: bool,
}

impl MemoryTransaction {
    fn finish(&mut self, committed: bool) {
        let mut state = self.store.lock();
        state.open_transactions = state.open_transactions.saturating_sub(1);
        if committed {
            state.commits += 1;
            let rows = self.pending.len();
            for (table, row) in self.pending.drain(..) {
                if let Some(table) = state.tables.get_mut(&table) {
                    table.rows.push(row);
                }
            }
            state.committed_batch_sizes.push(rows);
        } else {
            state.rollbacks += 1;
            self.pending.clear();
        }
        self.finished = true;
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn insert(
        &mut self,
        statement: &InsertStatement,
        params: &[Option<String>],
    ) -> Result<u64, StoreError> {
        {
            let state = self.store.lock();
            if !state.tables.contains_key(&statement.table) {
                return Err(StoreError::Query {
                    statement: format!("INSERT INTO {}", statement.table),
                    message: format!("relation \"{}\" does not exist", statement.table),
                });
            }
        }
        if params.len() != statement.columns.len() {
            return Err(StoreError::Query {
                statement: format!("INSERT INTO {}", statement.table),
                message: format!(
                    "expected {} parameters, got {}",
                    statement.columns.len(),
                    params.len()
                ),
            });
        }
        for (column, value) in statement.columns.iter().zip(params) {
            if let Some(value) = value {
                check_value(column, value)?;
            }
        }

        self.pending.push((statement.table.clone(), params.to_vec()));
        Ok(1)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        self.finish(true);
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StoreError> {
        self.finish(false);
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(false);
        }
    }
}

/// Reject values the server would refuse to cast into `column`
fn check_value(column: &ColumnDef, value: &str) -> Result<(), StoreError> {
    let trimmed = value.trim();
    let accepted = match column.sql_type {
        SqlType::Varchar(len) => value.chars().count() <= len as usize,
        SqlType::Text => true,
        SqlType::Integer => trimmed.parse::<i32>().is_ok(),
        SqlType::Decimal(precision, scale) => fits_decimal(trimmed, precision, scale),
        SqlType::Boolean => matches!(
            trimmed.to_ascii_lowercase().as_str(),
            "t" | "true" | "y" | "yes" | "on" | "1" | "f" | "false" | "n" | "no" | "off" | "0"
        ),
        SqlType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok(),
        SqlType::Timestamp => {
            DateTime::parse_from_rfc3339(trimmed).is_ok()
                || NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
                || NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f").is_ok()
        }
    };

    if accepted {
        Ok(())
    } else {
        Err(StoreError::Type {
            column: column.name.to_string(),
            value: value.to_string(),
            expected: column.sql_type.to_string(),
        })
    }
}

fn fits_decimal(value: &str, precision: u8, scale: u8) -> bool {
    let Ok(number) = value.parse::<f64>() else {
        return false;
    };
    if !number.is_finite() {
        return false;
    }
    let integer_digits = number.abs().trunc().to_string().trim_start_matches('0').len();
    integer_digits <= precision.saturating_sub(scale) as usize
}
