//! Error type for [`super::DeletionIndex`]

use std::fmt;
use std::io;

/// Errors raised loading, saving, or committing the deletion index.
#[derive(Debug)]
pub enum DeletionIndexError {
    /// Failed to read or write the deletion file.
    Io(io::Error),
    /// The deletion file does not hold a JSON array of non-negative
    /// integers.
    Corruption(String),
}

impl fmt::Display for DeletionIndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Corruption(msg) => write!(f, "corrupt deletion file: {}", msg),
        }
    }
}

impl std::error::Error for DeletionIndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Corruption(_) => None,
        }
    }
}

impl From<io::Error> for DeletionIndexError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Result type for deletion-index operations.
pub type DeletionIndexResult<T> = Result<T, DeletionIndexError>;
