//! # LogDB Codec
//!
//! CBOR encoding/decoding for LogDB.
//!
//! Every persisted structure in a LogDB table directory (log files, the
//! secondary index, the unique index and the relationship index) goes
//! through the two functions in this crate. The storage engine treats the
//! produced bytes as opaque.
//!
//! ## Usage
//!
//! ```
//! use logdb_codec::{decode, encode, Value};
//!
//! let value = Value::Integer(42);
//! let bytes = encode(&value).unwrap();
//!
//! let decoded: Value = decode(&bytes).unwrap();
//! assert_eq!(value, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod value;

pub use error::{CodecError, CodecResult};
pub use value::Value;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode any serializable value to CBOR bytes.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::into_writer(value, &mut buffer)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buffer)
}

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR or do not match the
/// shape of `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn roundtrip(value: &Value) -> Value {
        let bytes = encode(value).unwrap();
        decode(&bytes).unwrap()
    }

    #[test]
    fn roundtrip_nested() {
        let mut alice = BTreeMap::new();
        alice.insert("name".to_string(), Value::from("Alice"));
        alice.insert("age".to_string(), Value::from(30));
        alice.insert("score".to_string(), Value::from(9.75));

        let mut root = BTreeMap::new();
        root.insert(
            "users".to_string(),
            Value::Array(vec![Value::Map(alice), Value::Null]),
        );
        root.insert("blob".to_string(), Value::Bytes(vec![0, 1, 2, 255]));
        root.insert("active".to_string(), Value::Bool(true));

        let value = Value::Map(root);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn encoding_is_deterministic() {
        let mut a = BTreeMap::new();
        a.insert("z".to_string(), Value::from(1));
        a.insert("a".to_string(), Value::from(2));

        let mut b = BTreeMap::new();
        b.insert("a".to_string(), Value::from(2));
        b.insert("z".to_string(), Value::from(1));

        assert_eq!(
            encode(&Value::Map(a)).unwrap(),
            encode(&Value::Map(b)).unwrap()
        );
    }

    #[test]
    fn truncated_input_is_rejected() {
        let bytes = encode(&Value::from("a fairly long text value")).unwrap();
        let result: CodecResult<Value> = decode(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(CodecError::DecodingFailed { .. })));
    }

    #[test]
    fn empty_input_is_rejected() {
        let result: CodecResult<Value> = decode(&[]);
        assert!(result.is_err());
    }

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            (-1.0e9f64..1.0e9).prop_map(Value::Float),
            "[a-z0-9 ]{0,16}".prop_map(Value::Text),
            proptest::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
        ]
    }

    fn document() -> impl Strategy<Value = Value> {
        scalar().prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                proptest::collection::btree_map("[a-z_]{1,8}", inner, 0..6).prop_map(Value::Map),
            ]
        })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(value in document()) {
            prop_assert_eq!(roundtrip(&value), value);
        }
    }
}
