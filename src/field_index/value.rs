//! Ordered field-value keys
//!
//! A FieldIndex key is "any JSON scalar for which ordering is defined";
//! the index assumes callers keep a single field homogeneously typed. The
//! total order across variants (`Bool < Int < Float < Str`) follows
//! `aerodb`'s `IndexKey` (`src/index/btree.rs`). Unlike that enum, floats
//! here are stored as a plain `f64` — the bit-inversion trick needed to
//! give floats a total order is applied only inside the [`Ord`] impl, not
//! baked into the stored representation, so the JSON encoding of a float
//! key is just the number itself.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// An indexable field value: one JSON scalar.
///
/// `null` and compound values (arrays, objects) are not indexable:
/// [`FieldValue::from_json`] returns `None` for them, and callers skip
/// indexing that field for that record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl FieldValue {
    /// Converts a JSON scalar into an indexable key. Returns `None` for
    /// `null`, arrays, and objects.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Bool(b) => Some(FieldValue::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(FieldValue::Int(i))
                } else {
                    n.as_f64().map(FieldValue::Float)
                }
            }
            JsonValue::String(s) => Some(FieldValue::Str(s.clone())),
            JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            FieldValue::Bool(_) => 0,
            FieldValue::Int(_) => 1,
            FieldValue::Float(_) => 2,
            FieldValue::Str(_) => 3,
        }
    }

    /// Bit-twiddle a float's bits into one that orders correctly with
    /// plain unsigned comparison: flip the sign bit for non-negative
    /// numbers, flip every bit for negative ones.
    fn float_order_bits(f: f64) -> u64 {
        let bits = f.to_bits();
        if (bits >> 63) == 1 {
            !bits
        } else {
            bits ^ (1 << 63)
        }
    }
}

impl Eq for FieldValue {}

impl PartialOrd for FieldValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a.cmp(b),
            (FieldValue::Int(a), FieldValue::Int(b)) => a.cmp(b),
            (FieldValue::Float(a), FieldValue::Float(b)) => {
                Self::float_order_bits(*a).cmp(&Self::float_order_bits(*b))
            }
            (FieldValue::Str(a), FieldValue::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_ordering_is_bool_int_float_str() {
        let mut values = vec![
            FieldValue::Str("a".to_string()),
            FieldValue::Float(1.5),
            FieldValue::Int(1),
            FieldValue::Bool(true),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                FieldValue::Bool(true),
                FieldValue::Int(1),
                FieldValue::Float(1.5),
                FieldValue::Str("a".to_string()),
            ]
        );
    }

    #[test]
    fn test_float_ordering_handles_negatives() {
        let mut values = vec![
            FieldValue::Float(3.0),
            FieldValue::Float(-3.0),
            FieldValue::Float(0.0),
            FieldValue::Float(-0.5),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                FieldValue::Float(-3.0),
                FieldValue::Float(-0.5),
                FieldValue::Float(0.0),
                FieldValue::Float(3.0),
            ]
        );
    }

    #[test]
    fn test_from_json_rejects_null_and_compound() {
        assert_eq!(FieldValue::from_json(&JsonValue::Null), None);
        assert_eq!(FieldValue::from_json(&serde_json::json!([1, 2])), None);
        assert_eq!(FieldValue::from_json(&serde_json::json!({"a":1})), None);
    }

    #[test]
    fn test_from_json_accepts_scalars() {
        assert_eq!(
            FieldValue::from_json(&serde_json::json!(true)),
            Some(FieldValue::Bool(true))
        );
        assert_eq!(
            FieldValue::from_json(&serde_json::json!(42)),
            Some(FieldValue::Int(42))
        );
        assert_eq!(
            FieldValue::from_json(&serde_json::json!(1.5)),
            Some(FieldValue::Float(1.5))
        );
        assert_eq!(
            FieldValue::from_json(&serde_json::json!("hi")),
            Some(FieldValue::Str("hi".to_string()))
        );
    }

    #[test]
    fn test_json_roundtrip_preserves_shape() {
        let v = FieldValue::Int(7);
        let encoded = serde_json::to_value(&v).unwrap();
        assert_eq!(encoded, serde_json::json!(7));
        let decoded: FieldValue = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, FieldValue::Int(7));
    }
}
