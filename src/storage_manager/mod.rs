//! The storage engine orchestrator
//!
//! Ties together the append-only log, [`IndexSet`], and [`DeletionIndex`]
//! behind the four operations `pysql/storagemanager/storage.py`'s
//! `StorageManager` exposes: `create_object`, `get_objects`,
//! `delete_objects`, `vacuum`. The original stubs `vacuum` out entirely
//! (`TODO`); the streaming rewrite-skip-tombstones-then-rename procedure
//! here is new, built from the design notes rather than ported from
//! Python, since there was nothing to port.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::deletion_index::DeletionIndex;
use crate::error::{DocStoreError, DocStoreResult};
use crate::field_index::FieldValue;
use crate::file_ops::{ByOffsets, ScanAll};
use crate::index_set::IndexSet;
use crate::log::Logger;

/// Field holding the generated record identifier.
pub const ID_FIELD: &str = "_id";
/// Synthetic field carrying a record's byte offset; present only on
/// records read with `include_offset`, never persisted.
pub const CHAR_NO_FIELD: &str = "_char_no";

const LOG_FILE_NAME: &str = "docstore.data";
const INDEX_FILE_NAME: &str = "docstore.index.data";
const DELETE_FILE_NAME: &str = "docstore.delete.data";
const VACUUM_MARKER_NAME: &str = "docstore.vacuum.marker";

/// The embeddable document store.
pub struct StorageManager {
    storage_dir: PathBuf,
    log_path: PathBuf,
    marker_path: PathBuf,
    index_set: IndexSet,
    deletion_index: DeletionIndex,
}

impl StorageManager {
    /// Opens (creating if absent) the storage directory and its three
    /// files, and recovers from an interrupted vacuum if its marker is
    /// still present.
    pub fn open(config: &StorageConfig) -> DocStoreResult<Self> {
        let dir = config.storage_dir();
        fs::create_dir_all(dir)?;

        let log_path = dir.join(LOG_FILE_NAME);
        let index_path = dir.join(INDEX_FILE_NAME);
        let delete_path = dir.join(DELETE_FILE_NAME);
        let marker_path = dir.join(VACUUM_MARKER_NAME);

        if !log_path.exists() {
            fs::write(&log_path, "")?;
            Logger::info("FILE_CREATED", &[("path", &log_path.display().to_string())]);
        }

        let index_set = IndexSet::open(&index_path)?;
        let deletion_index = DeletionIndex::open(&delete_path)?;

        let mut manager = Self {
            storage_dir: dir.to_path_buf(),
            log_path,
            marker_path,
            index_set,
            deletion_index,
        };

        if manager.marker_path.exists() {
            Logger::warn(
                "INDEX_REBUILD_ON_STARTUP",
                &[("reason", "vacuum marker present from a prior interrupted run")],
            );
            manager.rebuild_index_set()?;
            fs::remove_file(&manager.marker_path)?;
        }

        Ok(manager)
    }

    /// The storage directory this instance was opened against.
    pub fn storage_dir(&self) -> &std::path::Path {
        &self.storage_dir
    }

    /// Current size in bytes of the append-only log.
    pub fn storage_size(&self) -> DocStoreResult<u64> {
        Ok(fs::metadata(&self.log_path)?.len())
    }

    /// The byte offset a new record would be appended at. Always the
    /// current log size: this crate mandates append-at-end allocation and
    /// does not expose a hook for alternative write strategies.
    pub fn next_write_offset(&self) -> DocStoreResult<u64> {
        self.storage_size()
    }

    /// Assigns a fresh `_id`, appends the record to the log, and updates
    /// every field's index. Returns the stored record (with `_id` set).
    ///
    /// The append and the index update are not transactional as a pair;
    /// if the process dies between them the log is authoritative and the
    /// index can be rebuilt from it.
    pub fn create_object(&mut self, mut record: Map<String, JsonValue>) -> DocStoreResult<Map<String, JsonValue>> {
        record.insert(ID_FIELD.to_string(), JsonValue::String(Uuid::new_v4().to_string()));

        let offset = self.next_write_offset()?;
        let mut line = serde_json::to_string(&JsonValue::Object(record.clone()))?;
        line.push('\n');

        let mut file = OpenOptions::new().append(true).open(&self.log_path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;

        self.index_set.index_record(&record, offset)?;

        Ok(record)
    }

    /// Returns every live record matching `constraints` (empty means
    /// "all"), without the synthetic `_char_no` field.
    pub fn get_objects(&self, constraints: &Map<String, JsonValue>) -> DocStoreResult<Vec<Map<String, JsonValue>>> {
        let offsets = self.resolve_offsets(constraints)?;
        let mut results = Vec::with_capacity(offsets.len());
        for record in ByOffsets::open(&self.log_path, offsets, true)? {
            let mut record = record?;
            record.remove(CHAR_NO_FIELD);
            results.push(record);
        }
        Ok(results)
    }

    /// Marks every record matching `constraints` as deleted within a
    /// single atomic scope, and returns how many were marked. The log
    /// file itself is not modified.
    pub fn delete_objects(&mut self, constraints: &Map<String, JsonValue>) -> DocStoreResult<usize> {
        let offsets = self.resolve_offsets(constraints)?;
        let count = offsets.len();

        self.deletion_index.atomically(|scope| -> DocStoreResult<()> {
            for offset in &offsets {
                scope.mark_deleted(*offset);
            }
            Ok(())
        })?;

        Ok(count)
    }

    /// Rewrites the log with every tombstoned record removed, resets the
    /// deletion index, and rebuilds the index set against the new
    /// (offset-shifted) log.
    pub fn vacuum(&mut self) -> DocStoreResult<()> {
        Logger::info("VACUUM_START", &[("path", &self.log_path.display().to_string())]);
        fs::write(&self.marker_path, "")?;

        let tmp_path = self.log_path.with_extension("data.vacuum-tmp");
        {
            let mut reader = BufReader::new(File::open(&self.log_path)?);
            let mut writer = BufWriter::new(File::create(&tmp_path)?);

            let mut cursor: u64 = 0;
            let deletions: Vec<u64> = self.deletion_index.iterate_sorted().collect();

            for offset in deletions {
                if offset > cursor {
                    io::copy(&mut (&mut reader).take(offset - cursor), &mut writer)?;
                    cursor = offset;
                }
                let mut scratch = Vec::new();
                let skipped = reader.read_until(b'\n', &mut scratch)? as u64;
                cursor += skipped;
            }

            io::copy(&mut reader, &mut writer)?;
            writer.flush()?;
        }

        fs::rename(&tmp_path, &self.log_path)?;
        self.deletion_index.reset()?;
        self.rebuild_index_set()?;

        fs::remove_file(&self.marker_path)?;
        Logger::info("VACUUM_FINISH", &[("path", &self.log_path.display().to_string())]);

        Ok(())
    }

    fn rebuild_index_set(&mut self) -> DocStoreResult<()> {
        let records: Vec<Map<String, JsonValue>> = ScanAll::open(&self.log_path, true)?
            .collect::<DocStoreResult<Vec<_>>>()?;
        self.index_set.rebuild(records.iter())?;
        Ok(())
    }

    fn resolve_offsets(&self, constraints: &Map<String, JsonValue>) -> DocStoreResult<Vec<u64>> {
        if constraints.is_empty() {
            let mut offsets = Vec::new();
            for record in ScanAll::open(&self.log_path, true)? {
                let record = record?;
                let offset = record[CHAR_NO_FIELD]
                    .as_u64()
                    .expect("ScanAll with include_offset always attaches _char_no");
                if !self.deletion_index.is_deleted(offset) {
                    offsets.push(offset);
                }
            }
            return Ok(offsets);
        }

        let mut intersected: Option<BTreeSet<u64>> = None;
        for (field, value) in constraints {
            let matched = match FieldValue::from_json(value) {
                Some(field_value) => self.index_set.field(field).lookup(&field_value),
                None => BTreeSet::new(),
            };
            intersected = Some(match intersected {
                None => matched,
                Some(existing) => existing.intersection(&matched).copied().collect(),
            });
            if intersected.as_ref().is_some_and(BTreeSet::is_empty) {
                break;
            }
        }

        let offsets = intersected.unwrap_or_default();
        Ok(offsets
            .into_iter()
            .filter(|offset| !self.deletion_index.is_deleted(*offset))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn obj(pairs: &[(&str, JsonValue)]) -> Map<String, JsonValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn open_manager() -> (tempfile::TempDir, StorageManager) {
        let dir = tempdir().unwrap();
        let config = StorageConfig::new(dir.path());
        let manager = StorageManager::open(&config).unwrap();
        (dir, manager)
    }

    #[test]
    fn test_create_and_get_roundtrip() {
        let (_dir, mut manager) = open_manager();
        let stored = manager
            .create_object(obj(&[("a", serde_json::json!(1)), ("b", serde_json::json!(2))]))
            .unwrap();
        let id = stored[ID_FIELD].as_str().unwrap().to_string();

        let found = manager.get_objects(&obj(&[(ID_FIELD, serde_json::json!(id))])).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["a"], serde_json::json!(1));
        assert_eq!(found[0]["b"], serde_json::json!(2));
        assert!(!found[0].contains_key(CHAR_NO_FIELD));
    }

    #[test]
    fn test_delete_then_get_returns_only_remaining() {
        let (_dir, mut manager) = open_manager();
        manager
            .create_object(obj(&[("a", serde_json::json!(1)), ("b", serde_json::json!(2))]))
            .unwrap();
        manager
            .create_object(obj(&[("a", serde_json::json!(2)), ("c", serde_json::json!(3))]))
            .unwrap();

        let deleted = manager.delete_objects(&obj(&[("c", serde_json::json!(3))])).unwrap();
        assert_eq!(deleted, 1);

        let remaining = manager.get_objects(&Map::new()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0]["a"], serde_json::json!(1));
    }

    #[test]
    fn test_indexed_lookup_among_many_records() {
        let (_dir, mut manager) = open_manager();
        for i in 0..100 {
            manager.create_object(obj(&[("k", serde_json::json!(i))])).unwrap();
        }

        let found = manager.get_objects(&obj(&[("k", serde_json::json!(42))])).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["k"], serde_json::json!(42));
    }

    #[test]
    fn test_vacuum_removes_deleted_records_and_resets_deletion_index() {
        let (_dir, mut manager) = open_manager();
        for i in 0..10 {
            manager.create_object(obj(&[("k", serde_json::json!(i))])).unwrap();
        }

        let deleted = manager.delete_objects(&Map::new()).unwrap();
        assert_eq!(deleted, 10);
        assert!(manager.get_objects(&Map::new()).unwrap().is_empty());

        manager.vacuum().unwrap();

        assert_eq!(manager.storage_size().unwrap(), 0);
        assert!(manager.get_objects(&Map::new()).unwrap().is_empty());
    }

    #[test]
    fn test_vacuum_preserves_live_records_and_their_index_entries() {
        let (_dir, mut manager) = open_manager();
        let mut ids = Vec::new();
        for i in 0..5 {
            let stored = manager.create_object(obj(&[("k", serde_json::json!(i))])).unwrap();
            ids.push(stored[ID_FIELD].as_str().unwrap().to_string());
        }

        manager
            .delete_objects(&obj(&[("k", serde_json::json!(2))]))
            .unwrap();
        manager.vacuum().unwrap();

        let remaining = manager.get_objects(&Map::new()).unwrap();
        assert_eq!(remaining.len(), 4);

        let found = manager.get_objects(&obj(&[("k", serde_json::json!(4))])).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0][ID_FIELD].as_str().unwrap(), ids[4]);
    }

    #[test]
    fn test_get_objects_with_no_matches_is_empty() {
        let (_dir, mut manager) = open_manager();
        manager.create_object(obj(&[("a", serde_json::json!(1))])).unwrap();
        let found = manager.get_objects(&obj(&[("a", serde_json::json!(999))])).unwrap();
        assert!(found.is_empty());
    }
}
