//! Error types for the tabula table engine.

use alloc::string::String;
use core::fmt;

/// Result type alias for tabula operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for table and transaction operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A key pair already present was inserted again.
    DuplicateKey {
        collection: String,
        key: String,
    },
    /// A key expected to be present was not found.
    KeyNotFound {
        collection: String,
        key: String,
    },
    /// A range view outlived a mutation of its table.
    StaleView {
        table: String,
    },
    /// An index into a view or collection was out of range.
    IndexOutOfRange {
        index: usize,
        len: usize,
    },
    /// A mutation was attempted with no open transaction.
    NoTransaction,
    /// A mutation was attempted while a commit was publishing.
    Committing,
    /// The database was already disposed.
    Disposed,
    /// No table is registered for the requested record type.
    TableNotFound {
        name: String,
    },
    /// An index handle did not match any index of the table.
    IndexNotFound {
        table: String,
        index: String,
    },
    /// Invalid operation.
    InvalidOperation {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DuplicateKey { collection, key } => {
                write!(f, "Duplicate key in {}: {}", collection, key)
            }
            Error::KeyNotFound { collection, key } => {
                write!(f, "Key not found in {}: {}", collection, key)
            }
            Error::StaleView { table } => {
                write!(f, "Table {} was modified, range view is stale", table)
            }
            Error::IndexOutOfRange { index, len } => {
                write!(f, "Index {} out of range for length {}", index, len)
            }
            Error::NoTransaction => {
                write!(f, "No open transaction")
            }
            Error::Committing => {
                write!(f, "Operation not allowed while committing")
            }
            Error::Disposed => {
                write!(f, "Database was already disposed")
            }
            Error::TableNotFound { name } => {
                write!(f, "Table not found: {}", name)
            }
            Error::IndexNotFound { table, index } => {
                write!(f, "Index {} not found in table {}", index, table)
            }
            Error::InvalidOperation { message } => {
                write!(f, "Invalid operation: {}", message)
            }
        }
    }
}

impl Error {
    /// Creates a duplicate key error.
    pub fn duplicate_key(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Error::DuplicateKey {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Creates a key not found error.
    pub fn key_not_found(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Error::KeyNotFound {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Creates a stale view error.
    pub fn stale_view(table: impl Into<String>) -> Self {
        Error::StaleView {
            table: table.into(),
        }
    }

    /// Creates an index out of range error.
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Error::IndexOutOfRange { index, len }
    }

    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Error::TableNotFound { name: name.into() }
    }

    /// Creates an index not found error.
    pub fn index_not_found(table: impl Into<String>, index: impl Into<String>) -> Self {
        Error::IndexNotFound {
            table: table.into(),
            index: index.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }
}
