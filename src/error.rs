use thiserror::Error;

/// What went wrong while scanning the input document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The underlying reader failed
    #[error("read failed: {0}")]
    Io(String),

    /// The document root is not an array
    #[error("expected '[' at document root, found {0:?}")]
    NotAnArray(char),

    /// A structural byte appeared where it is not allowed
    #[error("unexpected character {0:?}")]
    UnexpectedByte(char),

    /// Input ended before the closing `]`
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// An element had valid boundaries but is not valid JSON
    #[error("invalid element: {0}")]
    InvalidElement(String),

    /// Non-whitespace content after the closing `]`
    #[error("trailing data after closing ']'")]
    TrailingData,
}

/// Malformed or truncated input. Fatal: the pipeline stops at the first one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}{}", at_byte(.offset))]
pub struct ParseError {
    /// Byte offset into the input, when known
    pub offset: Option<u64>,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn at(offset: u64, kind: ParseErrorKind) -> Self {
        Self { offset: Some(offset), kind }
    }
}

fn at_byte(offset: &Option<u64>) -> String {
    offset.map(|o| format!(" at byte {}", o)).unwrap_or_default()
}

/// Failures reported by a record store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Query failed ({statement}): {message}")]
    Query { statement: String, message: String },

    #[error("Invalid value {value:?} for column {column} ({expected})")]
    Type {
        column: String,
        value: String,
        expected: String,
    },

    #[error("Transaction error: {0}")]
    Transaction(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                StoreError::Connect(err.to_string())
            }
            other => StoreError::Transaction(other.to_string()),
        }
    }
}

/// Destination DDL failed; raised before any streaming begins
#[derive(Error, Debug)]
#[error("Failed to ensure table {table}: {source}")]
pub struct SchemaError {
    pub table: String,
    #[source]
    pub source: StoreError,
}

/// A batch could not be persisted; the batch was rolled back as a unit
#[derive(Error, Debug)]
#[error("Batch {batch} ({rows} records) rolled back: {source}")]
pub struct WriteError {
    /// 1-based ordinal of the failed batch
    pub batch: u64,
    pub rows: usize,
    #[source]
    pub source: StoreError,
}

/// Terminal failure of an import run
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ImportError {
    /// Name of the pipeline phase that failed
    pub fn phase(&self) -> &'static str {
        match self {
            ImportError::Parse(_) => "parse",
            ImportError::Schema(_) => "schema",
            ImportError::Write(_) => "write",
            ImportError::Config(_) => "config",
            ImportError::Store(_) => "store",
        }
    }

    /// Ordinal of the failed batch, for write failures
    pub fn failed_batch(&self) -> Option<u64> {
        match self {
            ImportError::Write(err) => Some(err.batch),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_includes_offset() {
        let err = ParseError::at(42, ParseErrorKind::UnexpectedEof);
        assert_eq!(err.to_string(), "unexpected end of input at byte 42");

        let err = ParseError {
            offset: None,
            kind: ParseErrorKind::Io("permission denied".to_string()),
        };
        assert_eq!(err.to_string(), "read failed: permission denied");
    }

    #[test]
    fn test_import_error_phase() {
        let err = ImportError::from(WriteError {
            batch: 2,
            rows: 500,
            source: StoreError::Transaction("boom".to_string()),
        });
        assert_eq!(err.phase(), "write");
        assert_eq!(err.failed_batch(), Some(2));

        let err = ImportError::from(ParseError::at(0, ParseErrorKind::NotAnArray('{')));
        assert_eq!(err.phase(), "parse");
        assert_eq!(err.failed_batch(), None);
    }
}
