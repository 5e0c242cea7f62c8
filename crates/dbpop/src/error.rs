//! Error types for the population and download engine.

use thiserror::Error;

/// Main error type for dbpop operations.
#[derive(Error, Debug)]
pub enum DbPopError {
    /// Configuration error (missing connection string, unknown environment, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// No dialect is registered for the connected database product
    #[error("Unsupported database: {0}")]
    UnsupportedDatabase(String),

    /// The dataset root is empty or every dataset in it is empty
    #[error("No datasets found in {0}")]
    NoDatasetsFound(String),

    /// A directory in the dataset tree that must have children has none
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A data file targets a table that does not exist in the database
    #[error("Table {table} does not exist for data file {data_file}")]
    MissingTable { table: String, data_file: String },

    /// A requested dataset was not discovered under the dataset root
    #[error("Dataset {0} not found")]
    DatasetNotFound(String),

    /// A CSV header names a column the target table does not have
    #[error("Column {column} not found in table {table}")]
    ColumnNotFound { table: String, column: String },

    /// A table requested for download does not exist
    #[error("Table {0} not found")]
    TableNotFound(String),

    /// A download selector is not `catalog`, `catalog.schema` or `catalog.schema.table`
    #[error("Invalid database/schema/table: {0}")]
    InvalidSelector(String),

    /// A CSV cell could not be converted to the column's type
    #[error("Invalid value for {table}.{column}: {message}")]
    InvalidValue {
        table: String,
        column: String,
        message: String,
    },

    /// An earlier load failed and left its transaction open on this connection
    #[error("A previous load failed inside its transaction; reconnect before loading again")]
    TransactionAborted,

    /// Database connection or query error
    #[error("Database error: {0}")]
    Database(#[from] tiberius::error::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbPopError {
    /// Create a MissingTable error
    pub fn missing_table(table: impl Into<String>, data_file: impl Into<String>) -> Self {
        DbPopError::MissingTable {
            table: table.into(),
            data_file: data_file.into(),
        }
    }

    /// Create a ColumnNotFound error
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        DbPopError::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Create an InvalidValue error
    pub fn invalid_value(
        table: impl Into<String>,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        DbPopError::InvalidValue {
            table: table.into(),
            column: column.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    ///
    /// 2 for configuration and usage problems, 3 for dataset/schema mismatches,
    /// 1 for database and IO failures.
    pub fn exit_code(&self) -> u8 {
        match self {
            DbPopError::Config(_)
            | DbPopError::UnsupportedDatabase(_)
            | DbPopError::InvalidSelector(_) => 2,
            DbPopError::NoDatasetsFound(_)
            | DbPopError::InvalidPath(_)
            | DbPopError::MissingTable { .. }
            | DbPopError::DatasetNotFound(_)
            | DbPopError::ColumnNotFound { .. }
            | DbPopError::TableNotFound(_)
            | DbPopError::InvalidValue { .. } => 3,
            DbPopError::TransactionAborted
            | DbPopError::Database(_)
            | DbPopError::Csv(_)
            | DbPopError::Io(_)
            | DbPopError::Json(_) => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for dbpop operations.
pub type Result<T> = std::result::Result<T, DbPopError>;
