//! Error types for StudioDB
//!
//! This module defines all error types used throughout the engine. Every
//! variant belongs to one of four kinds, see [`ErrorKind`].

use thiserror::Error;

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Statement text does not match the supported grammar
    Syntax,
    /// Referenced table or column shape is wrong
    Schema,
    /// A rule of the engine or the store was violated
    Constraint,
    /// The underlying store failed
    Storage,
}

/// The main error type for StudioDB
#[derive(Error, Debug)]
pub enum Error {
    // ========== Lexer Errors ==========
    #[error("Syntax error: unexpected character '{0}' at position {1}")]
    UnexpectedCharacter(char, usize),

    #[error("Syntax error: unterminated quoted text starting at position {0}")]
    UnterminatedString(usize),

    #[error("Syntax error: invalid number '{0}'")]
    InvalidNumber(String),

    // ========== Parser Errors ==========
    #[error("Syntax error: unexpected token '{found}', expected {expected}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Syntax error: unexpected end of input, expected {0}")]
    UnexpectedEof(String),

    #[error("Syntax error: unsupported SQL command \"{0}\"")]
    UnsupportedCommand(String),

    // ========== Schema Errors ==========
    #[error("Schema error: table \"{0}\" not found")]
    TableNotFound(String),

    #[error("Schema error: table \"{0}\" already exists")]
    TableAlreadyExists(String),

    #[error("Schema error: the first SELECT in a CREATE TABLE AS statement must use aliases (AS) for all columns, invalid definition \"{0}\"")]
    MissingAlias(String),

    #[error("Schema error: column count mismatch, expected {expected} columns but found {found}")]
    ColumnCountMismatch { expected: usize, found: usize },

    // ========== Constraint Errors ==========
    #[error("Constraint error: DELETE without a WHERE clause is not supported (table \"{0}\")")]
    DeleteWithoutWhere(String),

    #[error("Constraint error: table \"{0}\" must have at least one column to be used as a primary key")]
    EmptyColumnList(String),

    #[error("Constraint error: key {key} already exists in table \"{table}\"")]
    DuplicateKey { table: String, key: String },

    #[error("Constraint error: record for table \"{table}\" has no value for key column \"{key_path}\"")]
    MissingKey { table: String, key_path: String },

    #[error("Constraint error: {value} is not a valid key for table \"{table}\"")]
    InvalidKey { table: String, value: String },

    // ========== Storage Errors ==========
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Storage error: container \"{0}\" does not exist")]
    ContainerNotFound(String),

    #[error("Storage error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Fjall(#[from] fjall::Error),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnexpectedCharacter(..)
            | Error::UnterminatedString(_)
            | Error::InvalidNumber(_)
            | Error::UnexpectedToken { .. }
            | Error::UnexpectedEof(_)
            | Error::UnsupportedCommand(_) => ErrorKind::Syntax,
            Error::TableNotFound(_)
            | Error::TableAlreadyExists(_)
            | Error::MissingAlias(_)
            | Error::ColumnCountMismatch { .. } => ErrorKind::Schema,
            Error::DeleteWithoutWhere(_)
            | Error::EmptyColumnList(_)
            | Error::DuplicateKey { .. }
            | Error::MissingKey { .. }
            | Error::InvalidKey { .. } => ErrorKind::Constraint,
            Error::StorageError(_)
            | Error::ContainerNotFound(_)
            | Error::IoError(_)
            | Error::Serialization(_)
            | Error::Fjall(_) => ErrorKind::Storage,
        }
    }
}

/// Result type alias for StudioDB operations
pub type Result<T> = std::result::Result<T, Error>;
