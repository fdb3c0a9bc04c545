//! Orderable keys derived from field values.

use logdb_codec::Value;
use std::cmp::Ordering;

/// A float with a total order, so it can key a sorted map.
#[derive(Debug, Clone, Copy)]
pub struct FloatKey(pub f64);

impl PartialEq for FloatKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloatKey {}

impl PartialOrd for FloatKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// The indexable form of a scalar field value.
///
/// Arrays and maps have no key and are never indexed. Integers and floats
/// are distinct keys: `1` does not match `1.0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexKey {
    /// Null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Integer(i64),
    /// Float.
    Float(FloatKey),
    /// Text.
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
}

impl IndexKey {
    /// Returns the key for a scalar value, or `None` for arrays and maps.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(IndexKey::Null),
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Integer(n) => Some(IndexKey::Integer(*n)),
            Value::Float(n) => Some(IndexKey::Float(FloatKey(*n))),
            Value::Text(s) => Some(IndexKey::Text(s.clone())),
            Value::Bytes(b) => Some(IndexKey::Bytes(b.clone())),
            Value::Array(_) | Value::Map(_) => None,
        }
    }

    /// Converts back into a value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            IndexKey::Null => Value::Null,
            IndexKey::Bool(b) => Value::Bool(*b),
            IndexKey::Integer(n) => Value::Integer(*n),
            IndexKey::Float(n) => Value::Float(n.0),
            IndexKey::Text(s) => Value::Text(s.clone()),
            IndexKey::Bytes(b) => Value::Bytes(b.clone()),
        }
    }

    /// Returns the text, if this is a text key.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            IndexKey::Text(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_have_keys() {
        assert_eq!(IndexKey::from_value(&Value::from(3)), Some(IndexKey::Integer(3)));
        assert_eq!(
            IndexKey::from_value(&Value::from("a")).unwrap().to_value(),
            Value::from("a")
        );
        assert!(IndexKey::from_value(&Value::Array(vec![])).is_none());
    }

    #[test]
    fn floats_are_totally_ordered() {
        let mut keys = vec![
            IndexKey::Float(FloatKey(2.5)),
            IndexKey::Float(FloatKey(-1.0)),
            IndexKey::Float(FloatKey(f64::NAN)),
        ];
        keys.sort();
        assert_eq!(keys[0], IndexKey::Float(FloatKey(-1.0)));
        assert_eq!(keys[1], IndexKey::Float(FloatKey(2.5)));
    }

    #[test]
    fn integer_and_float_differ() {
        assert_ne!(
            IndexKey::from_value(&Value::from(1)),
            IndexKey::from_value(&Value::from(1.0))
        );
    }
}
