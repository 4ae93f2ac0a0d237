//! Tombstone set with scoped atomic commit
//!
//! Grounded on `pysql/storagemanager/delete_index.py`'s `DeletionIndexInner`:
//! a committed [`SortedList`] persisted to disk plus an in-memory buffer
//! that only joins the committed set on a clean exit from a scope. The
//! original expresses the scope as a Python context manager
//! (`__enter__`/`__exit__`); the idiomatic Rust analogue used here is a
//! closure handed a scope handle, with the result's `Ok`/`Err` standing in
//! for "normal" vs. "exceptional" exit — the same shape `aerodb`'s
//! `ObservationScope` (`src/observability/scope.rs`) uses a `Drop` guard
//! for, adapted to a closure since every call site here already threads a
//! `Result`.

pub mod errors;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;

pub use errors::{DeletionIndexError, DeletionIndexResult};

use crate::sorted_list::SortedList;

/// Handle passed into an [`DeletionIndex::atomically`] closure. Buffers
/// `mark_deleted` calls; they only become visible if the closure returns
/// `Ok`.
pub struct DeletionScope<'a> {
    buffer: &'a mut SortedList,
}

impl DeletionScope<'_> {
    /// Records `offset` as deleted, pending the scope's commit.
    pub fn mark_deleted(&mut self, offset: u64) {
        self.buffer.insert_sorted(offset);
    }
}

/// Persisted, ordered set of tombstoned byte offsets.
pub struct DeletionIndex {
    path: PathBuf,
    committed: SortedList,
    buffer: SortedList,
}

impl DeletionIndex {
    /// Opens the deletion file at `path`, creating it (as an empty list)
    /// if absent, and loads its contents.
    pub fn open(path: impl Into<PathBuf>) -> DeletionIndexResult<Self> {
        let path = path.into();
        if !path.exists() {
            fs::write(&path, "[]")?;
        }
        let mut index = Self {
            path,
            committed: SortedList::new(),
            buffer: SortedList::new(),
        };
        index.load()?;
        Ok(index)
    }

    /// Re-reads the committed set from disk. The buffer is left untouched.
    pub fn load(&mut self) -> DeletionIndexResult<()> {
        let contents = fs::read_to_string(&self.path)?;
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            self.committed = SortedList::new();
            return Ok(());
        }

        let parsed: JsonValue = serde_json::from_str(trimmed).map_err(|e| {
            DeletionIndexError::Corruption(format!("deletion file is not valid JSON: {}", e))
        })?;
        let values = parsed.as_array().ok_or_else(|| {
            DeletionIndexError::Corruption("deletion file does not hold a JSON array".to_string())
        })?;

        let mut offsets = Vec::with_capacity(values.len());
        for v in values {
            let offset = v.as_u64().ok_or_else(|| {
                DeletionIndexError::Corruption(format!("non-integer offset in deletion file: {}", v))
            })?;
            offsets.push(offset);
        }
        self.committed = SortedList::from_iter_sorted(offsets);
        Ok(())
    }

    /// Persists the committed set (the buffer is never written directly).
    pub fn save(&self) -> DeletionIndexResult<()> {
        let values: Vec<u64> = self.committed.iter().collect();
        let rendered = serde_json::to_string(&values).expect("Vec<u64> always serializes");
        fs::write(&self.path, rendered)?;
        Ok(())
    }

    /// Clears both the committed set and the buffer, and persists the
    /// empty state.
    pub fn reset(&mut self) -> DeletionIndexResult<()> {
        self.committed.clear();
        self.buffer.clear();
        self.save()
    }

    /// Whether `offset` has been tombstoned, either committed to disk or
    /// only buffered within an in-progress atomic scope.
    pub fn is_deleted(&self, offset: u64) -> bool {
        self.committed.contains(offset) || self.buffer.contains(offset)
    }

    /// Ascending iterator over the committed (on-disk) offsets. Used by
    /// vacuum to walk tombstones in log order.
    pub fn iterate_sorted(&self) -> impl Iterator<Item = u64> + '_ {
        self.committed.iter()
    }

    /// Runs `f` against a scope that buffers `mark_deleted` calls. If `f`
    /// returns `Ok`, the buffered offsets are merged into the committed
    /// set and persisted before this call returns. If `f` returns `Err`,
    /// the buffered offsets are discarded and nothing is written to disk.
    pub fn atomically<F, T, E>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut DeletionScope<'_>) -> Result<T, E>,
        E: From<DeletionIndexError>,
    {
        let mut scope = DeletionScope {
            buffer: &mut self.buffer,
        };
        match f(&mut scope) {
            Ok(value) => {
                self.flush_buffer();
                self.save()?;
                Ok(value)
            }
            Err(e) => {
                self.buffer.clear();
                Err(e)
            }
        }
    }

    fn flush_buffer(&mut self) {
        let buffer = std::mem::take(&mut self.buffer);
        self.committed.extend_sorted(&buffer);
    }

    /// The deletion file's path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
