//! Error types for the red-black tree
//!
//! Mirrors the shape of `aerodb::index::errors`: a small enum with a manual
//! `Display`, no external error-derive crate.

use std::fmt;

/// Errors raised while loading a serialized tree.
///
/// An invalid encoding during load signals a corruption error and leaves
/// the tree untouched. Red-black invariant violations after a mutation are
/// a different kind (a bug, not a recoverable condition) and are kept
/// distinct here so callers can tell "the bytes were bad" from "our own
/// algorithm broke an invariant".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RbTreeError {
    /// The encoding could not be reconstructed into a valid tree shape
    /// (e.g. a null root entry, or a truncated level-order sequence).
    Corruption(String),
    /// A red-black invariant failed after a mutation. This should never
    /// happen given a correct implementation; treat the tree as poisoned.
    InvariantViolation(String),
}

impl fmt::Display for RbTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corruption(msg) => write!(f, "corrupt tree encoding: {}", msg),
            Self::InvariantViolation(msg) => write!(f, "red-black invariant violated: {}", msg),
        }
    }
}

impl std::error::Error for RbTreeError {}

/// Result type for tree operations that can fail.
pub type RbTreeResult<T> = Result<T, RbTreeError>;
