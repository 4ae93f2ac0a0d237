//! Crate-level error type
//!
//! Composes the per-subsystem error types into a single error the public
//! `StorageManager` API returns. Mirrors the shape of `aerodb`'s
//! `storage::errors` / `index::errors` modules: a plain enum, manual
//! `Display`, no `thiserror`.

use std::fmt;
use std::io;

use crate::deletion_index::DeletionIndexError;
use crate::index_set::IndexSetError;
use crate::rbtree::RbTreeError;

/// Result type for the public document store API.
pub type DocStoreResult<T> = Result<T, DocStoreError>;

/// Top-level error for the document store.
///
/// Corruption and I/O errors propagate out of the core unchanged; "not
/// found" is never raised (queries/deletes return empty/zero instead).
#[derive(Debug)]
pub enum DocStoreError {
    /// Disk I/O failure: missing directory, permission denied, disk full.
    Io(io::Error),
    /// Malformed JSON in the log, or a line that failed to parse.
    Corruption(String),
    /// A red-black tree invariant was violated by a mutation; the tree
    /// (and therefore the index it backs) is considered poisoned.
    InvariantViolation(String),
    /// The on-disk index set could not be loaded or saved.
    IndexSet(IndexSetError),
    /// The deletion index could not be loaded, saved, or committed.
    DeletionIndex(DeletionIndexError),
}

impl fmt::Display for DocStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Corruption(msg) => write!(f, "corruption: {}", msg),
            Self::InvariantViolation(msg) => write!(f, "invariant violation: {}", msg),
            Self::IndexSet(e) => write!(f, "index set error: {}", e),
            Self::DeletionIndex(e) => write!(f, "deletion index error: {}", e),
        }
    }
}

impl std::error::Error for DocStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::IndexSet(e) => Some(e),
            Self::DeletionIndex(e) => Some(e),
            Self::Corruption(_) | Self::InvariantViolation(_) => None,
        }
    }
}

impl From<io::Error> for DocStoreError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<RbTreeError> for DocStoreError {
    fn from(e: RbTreeError) -> Self {
        match e {
            RbTreeError::Corruption(msg) => Self::Corruption(msg),
            RbTreeError::InvariantViolation(msg) => Self::InvariantViolation(msg),
        }
    }
}

impl From<IndexSetError> for DocStoreError {
    fn from(e: IndexSetError) -> Self {
        Self::IndexSet(e)
    }
}

impl From<DeletionIndexError> for DocStoreError {
    fn from(e: DeletionIndexError) -> Self {
        Self::DeletionIndex(e)
    }
}

impl From<serde_json::Error> for DocStoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Corruption(e.to_string())
    }
}
