use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use opentelemetry::{Key, KeyValue, Value};

/// A unique set of attributes that can be used as a grouping key for
/// measurements.
///
/// Two sets built from the same key/value pairs are equal regardless of the
/// order the pairs were supplied in. When a key is repeated, the last value
/// wins.
///
/// This must implement [Hash], [PartialEq], and [Eq] so it may be used as
/// HashMap keys and other de-duplication methods.
#[derive(Clone, Debug)]
pub struct AttributeSet(Vec<KeyValue>, u64);

impl From<&[KeyValue]> for AttributeSet {
    fn from(values: &[KeyValue]) -> Self {
        let mut vec: Vec<KeyValue> = Vec::with_capacity(values.len());
        // walk backwards so the last occurrence of a key is the one kept
        for kv in values.iter().rev() {
            if !vec.iter().any(|seen| seen.key == kv.key) {
                vec.push(kv.clone());
            }
        }
        AttributeSet::new(vec)
    }
}

impl<const N: usize> From<[KeyValue; N]> for AttributeSet {
    fn from(values: [KeyValue; N]) -> Self {
        AttributeSet::from(&values[..])
    }
}

fn calculate_hash(values: &[KeyValue]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for kv in values {
        kv.key.hash(&mut hasher);
        hash_value(&kv.value, &mut hasher);
    }
    hasher.finish()
}

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Bool(b) => {
            0u8.hash(state);
            b.hash(state);
        }
        Value::I64(i) => {
            1u8.hash(state);
            i.hash(state);
        }
        Value::F64(f) => {
            2u8.hash(state);
            f.to_bits().hash(state);
        }
        other => {
            3u8.hash(state);
            other.as_str().hash(state);
        }
    }
}

impl AttributeSet {
    fn new(mut values: Vec<KeyValue>) -> Self {
        values.sort_by(|a, b| a.key.cmp(&b.key));
        let hash = calculate_hash(&values);
        AttributeSet(values, hash)
    }

    /// Returns the number of elements in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the set contains no elements.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over key value pairs in the set
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.0.iter().map(|kv| (&kv.key, &kv.value))
    }

    /// The key value pairs of this set, sorted by key.
    pub fn to_vec(&self) -> Vec<KeyValue> {
        self.0.clone()
    }
}

impl Default for AttributeSet {
    fn default() -> Self {
        AttributeSet::new(Vec::new())
    }
}

impl PartialEq for AttributeSet {
    fn eq(&self, other: &Self) -> bool {
        self.1 == other.1 && self.0 == other.0
    }
}

impl Eq for AttributeSet {}

impl Hash for AttributeSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.1)
    }
}
