use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use roaring::RoaringBitmap;
use crate::index::posting::DocOrdinal;

/// Order-preserving encoding of an f64 into a u64 key.
/// Negative values flip every bit, non-negative values flip the sign bit.
pub fn sortable_key(value: f64) -> u64 {
    let value = if value == 0.0 { 0.0 } else { value }; // -0.0 == 0.0
    let bits = value.to_bits();
    if bits & (1 << 63) != 0 {
        !bits
    } else {
        bits | (1 << 63)
    }
}

/// Numeric bound on one side of a range
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericBound {
    Unbounded,
    Included(f64),
    Excluded(f64),
}

impl NumericBound {
    fn to_key_bound(self) -> Bound<u64> {
        match self {
            NumericBound::Unbounded => Bound::Unbounded,
            NumericBound::Included(v) if v.is_infinite() => {
                if v > 0.0 { Bound::Included(u64::MAX) } else { Bound::Unbounded }
            }
            NumericBound::Included(v) => Bound::Included(sortable_key(v)),
            NumericBound::Excluded(v) => Bound::Excluded(sortable_key(v)),
        }
    }
}

/// Per-field range trees: sortable value key -> documents holding that value
#[derive(Debug, Clone, Default)]
pub struct NumericIndex {
    pub fields: HashMap<String, BTreeMap<u64, RoaringBitmap>>,
}

impl NumericIndex {
    pub fn new() -> Self {
        NumericIndex::default()
    }

    pub fn add(&mut self, doc: DocOrdinal, field: &str, value: f64) {
        if value.is_nan() {
            return;
        }
        self.fields.entry(field.to_string())
            .or_default()
            .entry(sortable_key(value))
            .or_default()
            .insert(doc);
    }

    pub fn remove(&mut self, doc: DocOrdinal, field: &str, value: f64) {
        let key = sortable_key(value);
        let mut field_empty = false;
        if let Some(tree) = self.fields.get_mut(field) {
            if let Some(docs) = tree.get_mut(&key) {
                docs.remove(doc);
                if docs.is_empty() {
                    tree.remove(&key);
                }
            }
            field_empty = tree.is_empty();
        }
        if field_empty {
            self.fields.remove(field);
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Documents whose value for `field` lies within the bounds
    pub fn range(&self, field: &str, lower: NumericBound, upper: NumericBound) -> RoaringBitmap {
        let mut result = RoaringBitmap::new();
        let Some(tree) = self.fields.get(field) else {
            return result;
        };

        let lower = lower.to_key_bound();
        let upper = upper.to_key_bound();
        if is_empty_range(&lower, &upper) {
            return result;
        }

        for docs in tree.range((lower, upper)).map(|(_, docs)| docs) {
            result |= docs;
        }
        result
    }

    pub fn equals(&self, field: &str, value: f64) -> RoaringBitmap {
        self.range(field, NumericBound::Included(value), NumericBound::Included(value))
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

// BTreeMap::range panics on inverted or empty-exclusive ranges
fn is_empty_range(lower: &Bound<u64>, upper: &Bound<u64>) -> bool {
    match (lower, upper) {
        (Bound::Included(l), Bound::Included(u)) => l > u,
        (Bound::Included(l), Bound::Excluded(u))
        | (Bound::Excluded(l), Bound::Included(u)) => l >= u,
        (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
        _ => false,
    }
}
