//! Error type for [`super::IndexSet`]

use std::fmt;
use std::io;

use crate::rbtree::RbTreeError;

/// Errors raised loading or saving the index file.
#[derive(Debug)]
pub enum IndexSetError {
    /// Failed to read or write the index file.
    Io(io::Error),
    /// The index file's top level is not a JSON object, or a field's
    /// serialized form is not a JSON object.
    Corruption(String),
    /// A field's level-order encoding could not be reconstructed.
    FieldIndex(RbTreeError),
}

impl fmt::Display for IndexSetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Corruption(msg) => write!(f, "corrupt index file: {}", msg),
            Self::FieldIndex(e) => write!(f, "corrupt field index: {}", e),
        }
    }
}

impl std::error::Error for IndexSetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::FieldIndex(e) => Some(e),
            Self::Corruption(_) => None,
        }
    }
}

impl From<io::Error> for IndexSetError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<RbTreeError> for IndexSetError {
    fn from(e: RbTreeError) -> Self {
        Self::FieldIndex(e)
    }
}

/// Result type for index-set operations.
pub type IndexSetResult<T> = Result<T, IndexSetError>;
