//! Destination table definitions
//!
//! A `TableDef` is the single source for both the idempotent DDL and the
//! per-record INSERT statement, so column order and placeholder count always agree.

use itertools::Itertools;
use std::fmt;

/// Relational column types used by the destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Varchar(u16),
    Text,
    Integer,
    /// DECIMAL(precision, scale)
    Decimal(u8, u8),
    Boolean,
    Date,
    Timestamp,
}

impl SqlType {
    /// Type used when casting a text parameter in an INSERT.
    ///
    /// Length and precision are left to the column so that oversized values
    /// are rejected on assignment instead of being silently truncated.
    pub fn cast_name(&self) -> &'static str {
        match self {
            SqlType::Varchar(_) => "VARCHAR",
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Decimal(_, _) => "NUMERIC",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Date => "DATE",
            SqlType::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Varchar(len) => write!(f, "VARCHAR({})", len),
            SqlType::Decimal(precision, scale) => write!(f, "DECIMAL({},{})", precision, scale),
            other => f.write_str(other.cast_name()),
        }
    }
}

/// One destination column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: SqlType,
}

/// Destination relation: a surrogate `id SERIAL` key plus the mapped columns
#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` statement; never alters an existing table
    pub fn create_sql(&self) -> String {
        let columns = std::iter::once("id SERIAL PRIMARY KEY".to_string())
            .chain(self.columns.iter().map(|c| format!("{} {}", c.name, c.sql_type)))
            .join(",\n    ");
        format!("CREATE TABLE IF NOT EXISTS {} (\n    {}\n)", self.name, columns)
    }

    /// Single-row INSERT with one cast placeholder per mapped column
    pub fn insert_statement(&self) -> InsertStatement {
        let names = self.columns.iter().map(|c| c.name).join(", ");
        let placeholders = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("${}::{}", i + 1, c.sql_type.cast_name()))
            .join(", ");

        InsertStatement {
            table: self.name.clone(),
            columns: self.columns.clone(),
            sql: format!("INSERT INTO {} ({}) VALUES ({})", self.name, names, placeholders),
        }
    }
}

/// Prepared form of a table's INSERT
#[derive(Debug, Clone)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Vec<ColumnDef>,
    pub sql: String,
}

impl InsertStatement {
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// True when `name` is a plain unquoted SQL identifier
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> TableDef {
        TableDef::new(
            "vehicles",
            vec![
                ColumnDef { name: "plate", sql_type: SqlType::Varchar(255) },
                ColumnDef { name: "year", sql_type: SqlType::Integer },
                ColumnDef { name: "rrp", sql_type: SqlType::Decimal(12, 2) },
            ],
        )
    }

    #[test]
    fn test_create_sql_is_idempotent_ddl() {
        let sql = sample_table().create_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS vehicles ("));
        assert!(sql.contains("id SERIAL PRIMARY KEY"));
        assert!(sql.contains("plate VARCHAR(255)"));
        assert!(sql.contains("rrp DECIMAL(12,2)"));
    }

    #[test]
    fn test_insert_statement_placeholders() {
        let stmt = sample_table().insert_statement();
        assert_eq!(
            stmt.sql(),
            "INSERT INTO vehicles (plate, year, rrp) VALUES ($1::VARCHAR, $2::INTEGER, $3::NUMERIC)"
        );
        assert_eq!(stmt.columns.len(), 3);
    }

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("vehicle_info"));
        assert!(is_valid_identifier("_staging2"));
        assert!(!is_valid_identifier("2fast"));
        assert!(!is_valid_identifier("vehicle info"));
        assert!(!is_valid_identifier("x; DROP TABLE y"));
        assert!(!is_valid_identifier(""));
    }
}
