//! Error types for dbseed

use thiserror::Error;

use crate::ColumnDataType;

/// Core error type for dbseed operations
#[derive(Error, Debug)]
pub enum DbseedError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("failed to convert value '{value}' for column '{column}' to type {data_type}: {reason}")]
    Conversion {
        column: String,
        value: String,
        data_type: ColumnDataType,
        reason: String,
    },

    /// A unique or primary key constraint rejected the row
    #[error("Unique violation: {0}")]
    UniqueViolation(String),

    #[error("foreign table {table} not found in schema info for foreign key {constraint}")]
    MissingForeignTable { table: String, constraint: String },

    #[error("failed to recursively ensure parent record for {table}.{column} (value: {value}): {source}")]
    ParentRecord {
        table: String,
        column: String,
        value: String,
        #[source]
        source: Box<DbseedError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl DbseedError {
    /// Errors that must abort the whole import rather than a single row.
    ///
    /// A foreign key pointing at a table the schema model does not know is
    /// a schema problem, so it stays fatal no matter how deep in a parent
    /// chain it surfaces. Lost connections are fatal too.
    pub fn is_fatal(&self) -> bool {
        match self {
            DbseedError::MissingForeignTable { .. } | DbseedError::Connection(_) => true,
            DbseedError::ParentRecord { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        match self {
            DbseedError::UniqueViolation(_) => true,
            DbseedError::ParentRecord { source, .. } => source.is_unique_violation(),
            _ => false,
        }
    }
}

/// Result type alias for dbseed operations
pub type Result<T> = std::result::Result<T, DbseedError>;
