//! Named collection of per-field secondary indexes
//!
//! Mirrors `pysql/storagemanager/data_index.py`'s `Indexes` class: one
//! JSON file holding a JSON object keyed by field name, each value the
//! [`FieldIndex`] serialization. Referencing an unindexed field name
//! yields an empty index rather than an error (lazy creation).

pub mod errors;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value as JsonValue};

pub use errors::{IndexSetError, IndexSetResult};

use crate::field_index::{FieldIndex, FieldValue};

/// On-disk set of per-field indexes, keyed by field name.
pub struct IndexSet {
    path: PathBuf,
    fields: HashMap<String, FieldIndex>,
}

impl IndexSet {
    /// Opens the index file at `path`, creating it empty if absent, and
    /// loads its contents.
    pub fn open(path: impl Into<PathBuf>) -> IndexSetResult<Self> {
        let path = path.into();
        if !path.exists() {
            fs::write(&path, "")?;
        }
        let mut set = Self {
            path,
            fields: HashMap::new(),
        };
        set.load()?;
        Ok(set)
    }

    /// Re-reads the index file from disk, replacing the in-memory state.
    /// An empty file is treated as `{}`.
    pub fn load(&mut self) -> IndexSetResult<()> {
        let contents = fs::read_to_string(&self.path)?;
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            self.fields = HashMap::new();
            return Ok(());
        }

        let parsed: JsonValue = serde_json::from_str(trimmed)
            .map_err(|e| IndexSetError::Corruption(format!("index file is not valid JSON: {}", e)))?;
        let obj = parsed
            .as_object()
            .ok_or_else(|| IndexSetError::Corruption("index file top level is not an object".to_string()))?;

        let mut fields = HashMap::with_capacity(obj.len());
        for (field_name, encoded) in obj {
            fields.insert(field_name.clone(), FieldIndex::deserialize(encoded)?);
        }
        self.fields = fields;
        Ok(())
    }

    /// Serializes every field's index and writes the whole file.
    pub fn save(&self) -> IndexSetResult<()> {
        let mut obj = Map::with_capacity(self.fields.len());
        for (field_name, index) in &self.fields {
            obj.insert(field_name.clone(), index.serialize());
        }
        let rendered = serde_json::to_string_pretty(&JsonValue::Object(obj))
            .expect("IndexSet always serializes to valid JSON");
        fs::write(&self.path, rendered)?;
        Ok(())
    }

    /// Indexes every top-level field of `record` (including `_id`) at
    /// `offset`, then persists the whole index set.
    pub fn index_record(&mut self, record: &Map<String, JsonValue>, offset: u64) -> IndexSetResult<()> {
        for (field_name, field_value) in record {
            if let Some(value) = FieldValue::from_json(field_value) {
                self.fields.entry(field_name.clone()).or_default().add(value, offset);
            }
        }
        self.save()
    }

    /// Clears every field index, then re-indexes each record yielded by
    /// `records` (each expected to carry its offset as `_char_no`),
    /// saving once at the end.
    pub fn rebuild<'a>(
        &mut self,
        records: impl Iterator<Item = &'a Map<String, JsonValue>>,
    ) -> IndexSetResult<()> {
        self.fields.clear();
        for record in records {
            let offset = record
                .get(crate::storage_manager::CHAR_NO_FIELD)
                .and_then(JsonValue::as_u64)
                .ok_or_else(|| {
                    IndexSetError::Corruption("record passed to rebuild is missing _char_no".to_string())
                })?;
            for (field_name, field_value) in record {
                if field_name == crate::storage_manager::CHAR_NO_FIELD {
                    continue;
                }
                if let Some(value) = FieldValue::from_json(field_value) {
                    self.fields.entry(field_name.clone()).or_default().add(value, offset);
                }
            }
        }
        self.save()
    }

    /// Returns the index for `field_name`, or an empty index if the field
    /// has never been indexed.
    pub fn field(&self, field_name: &str) -> FieldIndex {
        self.fields.get(field_name).cloned().unwrap_or_default()
    }

    /// Whether any field has ever been indexed.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The index file's path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn obj(pairs: &[(&str, JsonValue)]) -> Map<String, JsonValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_open_creates_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx.data");
        assert!(!path.exists());
        let set = IndexSet::open(&path).unwrap();
        assert!(path.exists());
        assert!(set.is_empty());
    }

    #[test]
    fn test_index_record_and_lookup_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx.data");
        let mut set = IndexSet::open(&path).unwrap();

        set.index_record(&obj(&[("a", serde_json::json!(1))]), 0).unwrap();
        set.index_record(&obj(&[("a", serde_json::json!(1))]), 64).unwrap();
        set.index_record(&obj(&[("a", serde_json::json!(2))]), 128).unwrap();

        let field_a = set.field("a");
        assert_eq!(field_a.lookup(&FieldValue::Int(1)), [0, 64].into_iter().collect());
        assert_eq!(field_a.lookup(&FieldValue::Int(2)), [128].into_iter().collect());
        assert!(set.field("missing").is_empty());
    }

    #[test]
    fn test_save_and_reload_survives_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx.data");
        let mut set = IndexSet::open(&path).unwrap();
        set.index_record(&obj(&[("k", serde_json::json!("v"))]), 7).unwrap();

        let mut reloaded = IndexSet::open(&path).unwrap();
        reloaded.load().unwrap();
        assert_eq!(
            reloaded.field("k").lookup(&FieldValue::Str("v".to_string())),
            [7].into_iter().collect()
        );
    }

    #[test]
    fn test_rebuild_clears_and_reindexes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx.data");
        let mut set = IndexSet::open(&path).unwrap();
        set.index_record(&obj(&[("a", serde_json::json!(1))]), 0).unwrap();

        let records = vec![obj(&[
            ("a", serde_json::json!(9)),
            ("_char_no", serde_json::json!(40)),
        ])];
        set.rebuild(records.iter()).unwrap();

        assert!(set.field("a").lookup(&FieldValue::Int(1)).is_empty());
        assert_eq!(set.field("a").lookup(&FieldValue::Int(9)), [40].into_iter().collect());
    }
}
