//! Single-field secondary index
//!
//! Wraps an [`RbTree`] keyed by [`FieldValue`], with the set of matching
//! record offsets as the value. Matches `pysql/storagemanager/data_index.py`'s
//! `Index` class, except the value is `BTreeSet<u64>` rather than a lone
//! offset — the original stores a single offset per key, which the design
//! calls out as a bug whenever a field value recurs across records; here
//! `add` joins into the set instead of clobbering it.

pub mod value;

use std::collections::BTreeSet;

use serde_json::{Map, Value as JsonValue};

pub use value::FieldValue;

use crate::rbtree::{Color, RbTree, RbTreeError, RbTreeResult};

/// An ordered map from field value to the set of record offsets holding
/// that value.
#[derive(Debug, Clone, Default)]
pub struct FieldIndex {
    tree: RbTree<FieldValue, BTreeSet<u64>>,
}

impl FieldIndex {
    /// An index with no entries.
    pub fn new() -> Self {
        Self { tree: RbTree::new() }
    }

    /// Adds `offset` to the set of offsets for `value`, creating the key
    /// if absent.
    pub fn add(&mut self, value: FieldValue, offset: u64) {
        let mut set = self.tree.search(&value).cloned().unwrap_or_default();
        set.insert(offset);
        self.tree.insert(value, set);
    }

    /// Removes the whole key (all offsets for that value). Callers that
    /// need to drop a single offset must `lookup`, build the reduced set,
    /// `remove`, then re-`add` each surviving offset.
    pub fn remove(&mut self, value: &FieldValue) {
        self.tree.delete(value);
    }

    /// Returns the set of offsets recorded for `value`, empty if the key
    /// is absent.
    pub fn lookup(&self, value: &FieldValue) -> BTreeSet<u64> {
        self.tree.search(value).cloned().unwrap_or_default()
    }

    /// Whether the index holds no keys.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Number of distinct field values indexed.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Serializes this index as the positional-JSON-object encoding of its
    /// underlying tree's level-order dump: keys `"0"`, `"1"`, … map to
    /// either `null` or `[value, offsets, color]`.
    pub fn serialize(&self) -> JsonValue {
        let dumped = self.tree.dump();
        let mut obj = Map::with_capacity(dumped.len());
        for (i, entry) in dumped.into_iter().enumerate() {
            let encoded = match entry {
                Some((value, offsets, color)) => {
                    let offsets_json: Vec<u64> = offsets.into_iter().collect();
                    JsonValue::Array(vec![
                        serde_json::to_value(value).expect("FieldValue always serializes"),
                        serde_json::to_value(offsets_json).expect("Vec<u64> always serializes"),
                        JsonValue::String(color.as_letter().to_string()),
                    ])
                }
                None => JsonValue::Null,
            };
            obj.insert(i.to_string(), encoded);
        }
        JsonValue::Object(obj)
    }

    /// Reconstructs a [`FieldIndex`] from [`Self::serialize`]'s output.
    ///
    /// The object's keys are parsed as decimal indexes and sorted
    /// numerically before being handed to the tree loader, since JSON
    /// object key order is not guaranteed to be preserved by every parser.
    pub fn deserialize(encoded: &JsonValue) -> RbTreeResult<Self> {
        let obj = encoded.as_object().ok_or_else(|| {
            RbTreeError::Corruption("field index encoding is not a JSON object".to_string())
        })?;

        let mut positioned: Vec<(usize, &JsonValue)> = Vec::with_capacity(obj.len());
        for (k, v) in obj {
            let idx: usize = k.parse().map_err(|_| {
                RbTreeError::Corruption(format!("non-numeric field index position {:?}", k))
            })?;
            positioned.push((idx, v));
        }
        positioned.sort_by_key(|(idx, _)| *idx);

        let mut entries = Vec::with_capacity(positioned.len());
        for (_, v) in positioned {
            if v.is_null() {
                entries.push(None);
                continue;
            }
            let triple = v.as_array().ok_or_else(|| {
                RbTreeError::Corruption("field index entry is neither null nor an array".to_string())
            })?;
            if triple.len() != 3 {
                return Err(RbTreeError::Corruption(format!(
                    "field index entry has {} elements, expected 3",
                    triple.len()
                )));
            }
            let value: FieldValue = serde_json::from_value(triple[0].clone())
                .map_err(|e| RbTreeError::Corruption(format!("invalid field value: {}", e)))?;
            let offsets: Vec<u64> = serde_json::from_value(triple[1].clone())
                .map_err(|e| RbTreeError::Corruption(format!("invalid offset list: {}", e)))?;
            let color_str = triple[2].as_str().ok_or_else(|| {
                RbTreeError::Corruption("field index color is not a string".to_string())
            })?;
            let color = Color::from_letter(color_str)?;
            entries.push(Some((value, offsets.into_iter().collect::<BTreeSet<u64>>(), color)));
        }

        Ok(Self {
            tree: RbTree::load(&entries)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_accumulates_offsets_for_same_value() {
        let mut index = FieldIndex::new();
        index.add(FieldValue::Int(1), 0);
        index.add(FieldValue::Int(1), 64);
        index.add(FieldValue::Int(2), 128);

        assert_eq!(index.lookup(&FieldValue::Int(1)), BTreeSet::from([0, 64]));
        assert_eq!(index.lookup(&FieldValue::Int(2)), BTreeSet::from([128]));
        assert_eq!(index.lookup(&FieldValue::Int(999)), BTreeSet::new());
    }

    #[test]
    fn test_remove_drops_whole_key() {
        let mut index = FieldIndex::new();
        index.add(FieldValue::Str("x".to_string()), 0);
        index.add(FieldValue::Str("x".to_string()), 1);
        index.remove(&FieldValue::Str("x".to_string()));
        assert_eq!(index.lookup(&FieldValue::Str("x".to_string())), BTreeSet::new());
        assert!(index.is_empty());
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut index = FieldIndex::new();
        index.add(FieldValue::Int(10), 0);
        index.add(FieldValue::Int(2), 64);
        index.add(FieldValue::Int(10), 128);
        index.add(FieldValue::Int(11), 192);

        let encoded = index.serialize();
        let decoded = FieldIndex::deserialize(&encoded).unwrap();

        assert_eq!(decoded.lookup(&FieldValue::Int(10)), BTreeSet::from([0, 128]));
        assert_eq!(decoded.lookup(&FieldValue::Int(2)), BTreeSet::from([64]));
        assert_eq!(decoded.lookup(&FieldValue::Int(11)), BTreeSet::from([192]));
        assert_eq!(decoded.serialize(), encoded);
    }

    #[test]
    fn test_serialize_empty_index_is_empty_object() {
        let index = FieldIndex::new();
        assert_eq!(index.serialize(), serde_json::json!({}));
    }

    #[test]
    fn test_deserialize_rejects_non_object() {
        let err = FieldIndex::deserialize(&serde_json::json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, RbTreeError::Corruption(_)));
    }

    #[test]
    fn test_deserialize_rejects_non_numeric_keys() {
        let err = FieldIndex::deserialize(&serde_json::json!({"abc": null})).unwrap_err();
        assert!(matches!(err, RbTreeError::Corruption(_)));
    }
}
