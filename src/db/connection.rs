//! Database connection management using sqlx

use crate::config::DatabaseConfig;
use crate::db::schema::{InsertStatement, TableDef};
use crate::db::store::{RecordStore, StoreTransaction};
use crate::error::{ImportError, StoreError};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{debug, info};

/// Initialize the database connection pool
pub async fn init_pool(config: &DatabaseConfig) -> Result<PgPool, ImportError> {
    let options = config.connect_options()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(options)
        .await
        .map_err(|e| StoreError::Connect(format!("{}: {}", config.display_target(), e)))?;

    // Test the connection
    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(|e| StoreError::Connect(e.to_string()))?;

    Ok(pool)
}

/// PostgreSQL-backed record store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, ImportError> {
        let pool = init_pool(config).await?;
        info!(database = %config.display_target(), "Connected to PostgreSQL");
        Ok(Self::new(pool))
    }
}

fn query_error(statement: impl Into<String>, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => StoreError::from(err),
        other => StoreError::Query {
            statement: statement.into(),
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl RecordStore for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn ensure_table(&self, table: &TableDef) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query(&table.create_sql())
            .execute(&mut *conn)
            .await
            .map_err(|e| query_error(format!("CREATE TABLE {}", table.name), e))?;
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn close(&self) {
        debug!("Closing PostgreSQL pool");
        self.pool.close().await;
    }
}

struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn insert(
        &mut self,
        statement: &InsertStatement,
        params: &[Option<String>],
    ) -> Result<u64, StoreError> {
        let mut query = sqlx::query(statement.sql());
        for param in params {
            query = query.bind(param.as_deref());
        }

        let result = query
            .execute(&mut *self.tx)
            .await
            .map_err(|e| query_error(format!("INSERT INTO {}", statement.table), e))?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
