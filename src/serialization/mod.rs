//! CBOR serialization for durable session state.
//!
//! - Use CBOR via `ciborium` (NOT JSON)
//! - Deterministic output, so an unchanged bundle re-saves byte-for-byte
//! - Schema evolution with #[serde(default)]

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Serialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// CBOR encoding failed.
    #[error("CBOR encoding failed: {0}")]
    Encode(String),

    /// CBOR decoding failed.
    #[error("CBOR decoding failed: {0}")]
    Decode(String),
}

/// Serialize to CBOR bytes.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| SerializationError::Encode(format!("{:?}", e)))?;
    Ok(bytes)
}

/// Deserialize from CBOR bytes.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError> {
    ciborium::from_reader(bytes).map_err(|e| SerializationError::Decode(format!("{:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::traits::CredentialBundle;
    use serde::Deserialize;

    fn bundle() -> CredentialBundle {
        CredentialBundle {
            client_id: "AbC123==".to_string(),
            client_token: "client-token".to_string(),
            server_token: "server-token".to_string(),
            wid: "6281234567890@c.us".to_string(),
            enc_key: vec![7; 32],
            mac_key: vec![9; 32],
        }
    }

    #[test]
    fn test_bundle_roundtrip() {
        let original = bundle();
        let bytes = to_cbor(&original).unwrap();
        let recovered: CredentialBundle = from_cbor(&bytes).unwrap();
        assert_eq!(original, recovered);
    }

    #[test]
    fn test_cbor_deterministic() {
        let bytes1 = to_cbor(&bundle()).unwrap();
        let bytes2 = to_cbor(&bundle()).unwrap();
        assert_eq!(bytes1, bytes2);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result: Result<CredentialBundle, _> = from_cbor(b"definitely not cbor");
        assert!(matches!(result, Err(SerializationError::Decode(_))));
    }

    #[test]
    fn test_cbor_backward_compatibility() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct V1 {
            field1: u32,
        }

        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct V2 {
            field1: u32,
            #[serde(default)]
            field2: Option<String>,
        }

        let v1 = V1 { field1: 42 };
        let bytes = to_cbor(&v1).unwrap();

        // V2 can deserialize V1 data with default for new field
        let v2: V2 = from_cbor(&bytes).unwrap();
        assert_eq!(v2.field1, 42);
        assert_eq!(v2.field2, None);
    }
}
