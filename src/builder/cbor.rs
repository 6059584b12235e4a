//! CBOR helpers for Cardano transactions, on top of `ciborium`
//!
//! `ciborium` writes definite lengths and the shortest integer heads, which
//! is the form Cardano hashes and measures fees over.

pub use ciborium::value::Value;

use crate::error::BuildError;

pub fn uint(n: u64) -> Value {
    Value::Integer(n.into())
}

pub fn encode(value: &Value) -> Result<Vec<u8>, BuildError> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out)
        .map_err(|e| BuildError::Encoding(format!("CBOR encoding failed: {:?}", e)))?;
    Ok(out)
}

pub fn decode(data: &[u8]) -> Result<Value, BuildError> {
    ciborium::de::from_reader(data)
        .map_err(|e| BuildError::Encoding(format!("CBOR decoding failed: {:?}", e)))
}

pub fn as_unsigned(value: &Value) -> Option<u64> {
    value.as_integer().and_then(|n| u64::try_from(n).ok())
}

/// Value stored under unsigned key `key` of a map
pub fn get(value: &Value, key: u64) -> Option<&Value> {
    value
        .as_map()?
        .iter()
        .find(|(k, _)| as_unsigned(k) == Some(key))
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_heads() {
        assert_eq!(encode(&uint(10)).unwrap(), vec![0x0a]);
        assert_eq!(encode(&uint(24)).unwrap(), vec![0x18, 0x18]);
        assert_eq!(encode(&uint(1_000)).unwrap(), vec![0x19, 0x03, 0xe8]);
        assert_eq!(
            encode(&uint(1_000_000)).unwrap(),
            vec![0x1a, 0x00, 0x0f, 0x42, 0x40]
        );
    }

    #[test]
    fn test_map_lookup_after_decode() {
        let value = Value::Map(vec![
            (uint(0), Value::Array(vec![Value::Bytes(vec![1, 2, 3])])),
            (uint(2), uint(170_000)),
        ]);
        let encoded = encode(&value).unwrap();
        // Definite-length map of two entries
        assert_eq!(encoded[0], 0xa2);

        let decoded = decode(&encoded).unwrap();
        assert_eq!(get(&decoded, 2).and_then(as_unsigned), Some(170_000));
        assert!(get(&decoded, 1).is_none());
    }

    #[test]
    fn test_simple_values() {
        let value = Value::Array(vec![Value::Bool(true), Value::Null]);
        assert_eq!(encode(&value).unwrap(), vec![0x82, 0xf5, 0xf6]);
    }
}
