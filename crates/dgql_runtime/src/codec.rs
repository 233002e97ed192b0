//! JSON payload codec.
//!
//! Stateless; safe to call from any number of concurrent requests.

use bytes::Bytes;
use serde::Serialize;

use crate::error::EncodeError;
use crate::Payload;

/// Serializes a payload to UTF-8 JSON.
///
/// The output is compact: it never contains a raw CR or LF, because JSON
/// escapes control characters inside strings. Multipart framing relies on it.
pub fn encode<T: Serialize + ?Sized>(payload: &T) -> Result<Bytes, EncodeError> {
    Ok(Bytes::from(serde_json::to_vec(payload)?))
}

/// Parses a JSON object into a payload.
pub fn decode(bytes: &[u8]) -> Result<Payload, EncodeError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_encode_preserves_key_order() {
        let mut payload = Payload::new();
        payload.insert("data".into(), json!({"bookById": {"id": "book-1"}}));
        payload.insert("hasNext".into(), json!(true));

        let bytes = encode(&payload).unwrap();
        assert_eq!(
            &bytes[..],
            br#"{"data":{"bookById":{"id":"book-1"}},"hasNext":true}"#
        );
    }

    #[test]
    fn test_encode_escapes_line_breaks() {
        let payload = json!({"text": "line one\r\n---\r\nline two"});
        let bytes = encode(&payload).unwrap();
        assert!(!bytes.contains(&b'\r'));
        assert!(!bytes.contains(&b'\n'));
    }

    #[test]
    fn test_encode_non_string_keys_fails() {
        let mut map = BTreeMap::new();
        map.insert((1, 2), "pair");
        assert!(encode(&map).is_err());
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(decode(b"[1, 2, 3]").is_err());
        assert!(decode(b"not json").is_err());
        assert_eq!(decode(br#"{"a":1}"#).unwrap()["a"], 1);
    }
}
