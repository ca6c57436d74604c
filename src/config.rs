//! Import configuration
//!
//! Values are layered: CLI flag, then environment (including `.env`), then
//! the defaults below.

use crate::db::schema::is_valid_identifier;
use crate::error::ImportError;
use crate::ingestion::accumulator::DEFAULT_BATCH_SIZE;
use crate::ingestion::fields::DEFAULT_TABLE;
use crate::ingestion::parser::DEFAULT_READ_BUFFER;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_INPUT: &str = "car_data.json";

/// PostgreSQL connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL; overrides the individual parts when set
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub database: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: None,
            database: "car-info".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
        }
    }
}

impl DatabaseConfig {
    /// Read `PG*`, `DATABASE_URL` and `IMPORT_MAX_CONNECTIONS`
    pub fn from_env() -> Result<Self, ImportError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ImportError> {
        let mut config = Self::default();

        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            config.url = Some(url);
        }
        if let Some(host) = lookup("PGHOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PGPORT") {
            config.port = parse_var("PGPORT", &port)?;
        }
        if let Some(user) = lookup("PGUSER") {
            config.user = user;
        }
        if let Some(password) = lookup("PGPASSWORD") {
            config.password = Some(password);
        }
        if let Some(database) = lookup("PGDATABASE") {
            config.database = database;
        }
        if let Some(max) = lookup("IMPORT_MAX_CONNECTIONS") {
            config.max_connections = parse_var("IMPORT_MAX_CONNECTIONS", &max)?;
        }

        Ok(config)
    }

    pub fn connect_options(&self) -> Result<PgConnectOptions, ImportError> {
        if let Some(url) = &self.url {
            return PgConnectOptions::from_str(url)
                .map_err(|e| ImportError::Config(format!("invalid DATABASE_URL: {}", e)));
        }

        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database);
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        Ok(options)
    }

    /// Where we connect, without credentials
    pub fn display_target(&self) -> String {
        match &self.url {
            Some(url) => url.rsplit('@').next().unwrap_or("database").to_string(),
            None => format!("{}:{}/{}", self.host, self.port, self.database),
        }
    }
}

/// Settings for one import run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub input: PathBuf,
    pub table: String,
    pub batch_size: usize,
    pub read_buffer_bytes: usize,
    /// Write to the in-process store instead of PostgreSQL
    pub dry_run: bool,
    pub database: DatabaseConfig,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            table: DEFAULT_TABLE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            read_buffer_bytes: DEFAULT_READ_BUFFER,
            dry_run: false,
            database: DatabaseConfig::default(),
        }
    }
}

impl ImportConfig {
    pub fn from_env() -> Result<Self, ImportError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with `IMPORT_INPUT`, `IMPORT_TABLE`, `IMPORT_BATCH_SIZE`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ImportError> {
        let mut config = Self {
            database: DatabaseConfig::from_lookup(&lookup)?,
            ..Self::default()
        };

        if let Some(input) = lookup("IMPORT_INPUT") {
            config.input = PathBuf::from(input);
        }
        if let Some(table) = lookup("IMPORT_TABLE") {
            config.table = table;
        }
        if let Some(size) = lookup("IMPORT_BATCH_SIZE") {
            config.batch_size = parse_var("IMPORT_BATCH_SIZE", &size)?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ImportError> {
        if self.batch_size == 0 {
            return Err(ImportError::Config("batch size must be at least 1".to_string()));
        }
        if self.read_buffer_bytes == 0 {
            return Err(ImportError::Config("read buffer must be at least 1 byte".to_string()));
        }
        if !is_valid_identifier(&self.table) {
            return Err(ImportError::Config(format!("invalid table name: {:?}", self.table)));
        }
        if self.database.max_connections == 0 {
            return Err(ImportError::Config("max connections must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ImportError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ImportError::Config(format!("{}={:?}: {}", key, value, e)))
}
