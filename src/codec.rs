//! Body codec
//!
//! The dispatcher never parses or prints structured bodies itself. Request
//! bodies are decoded and `Body::Json` responses encoded through a
//! [`BodyCodec`], with [`JsonCodec`] as the default.

use crate::CodecError;
use serde_json::Value;

/// Converts between raw body text and structured values
pub trait BodyCodec: Send + Sync {
    /// Parse raw request body text
    fn decode(&self, text: &str) -> Result<Value, CodecError>;

    /// Serialize a structured response body
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    /// Content type written for encoded bodies
    fn content_type(&self) -> &'static str;
}

/// `serde_json` codec
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl BodyCodec for JsonCodec {
    fn decode(&self, text: &str) -> Result<Value, CodecError> {
        serde_json::from_str(text).map_err(|err| CodecError::Decode(err.to_string()))
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|err| CodecError::Encode(err.to_string()))
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode() {
        let value = JsonCodec.decode(r#"{"name":"ana","age":30}"#).unwrap();
        assert_eq!(value, json!({"name": "ana", "age": 30}));
    }

    #[test]
    fn test_decode_error() {
        let err = JsonCodec.decode("{not json").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn test_encode() {
        let bytes = JsonCodec.encode(&json!({"status": "success"})).unwrap();
        assert_eq!(bytes, br#"{"status":"success"}"#);
        assert_eq!(JsonCodec.content_type(), "application/json");
    }
}
