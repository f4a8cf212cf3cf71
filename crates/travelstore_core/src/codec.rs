//! CBOR helpers for persisted and replicated rows.

use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Encodes a value to CBOR bytes.
pub fn to_cbor<T: Serialize>(value: &T) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).map_err(|e| CoreError::codec(e.to_string()))?;
    Ok(buf)
}

/// Decodes a value from CBOR bytes.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| CoreError::codec(e.to_string()))
}

/// SHA-256 digest of `data`.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = from_cbor::<Sample>(&[0xff, 0x00, 0x13]).unwrap_err();
        assert!(matches!(err, CoreError::Codec { .. }));
    }

    #[test]
    fn encoding_is_deterministic() {
        let a = to_cbor(&Sample {
            name: "x".into(),
            count: 3,
        })
        .unwrap();
        let b = to_cbor(&Sample {
            name: "x".into(),
            count: 3,
        })
        .unwrap();
        assert_eq!(sha256(&a), sha256(&b));
        assert_eq!(from_cbor::<Sample>(&a).unwrap().count, 3);
    }
}
