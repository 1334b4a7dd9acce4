//! Protobuf messages exchanged with backend services.
//!
//! The schema is small and stable, so the messages are declared by hand with
//! prost derives instead of going through a build script.

use bytes::Bytes;
use prost_types::value::Kind;

use crate::rpc::value::{json_to_value, value_to_json};

/// Unary backend method.
pub const UNARY_PATH: &str = "/gateway.BackendService/Request";
/// Bidirectional streaming backend method.
pub const STREAM_PATH: &str = "/gateway.BackendService/RequestStream";
/// `Any` type URL of [`Message`] when it travels as an error detail.
pub const MESSAGE_TYPE_URL: &str = "type.googleapis.com/gateway.Message";

/// Wire message: raw bytes or a structured value.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Message {
    #[prost(oneof = "Body", tags = "1, 2")]
    pub body: Option<Body>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub enum Body {
    #[prost(message, tag = "1")]
    Value(prost_types::Value),
    #[prost(bytes = "bytes", tag = "2")]
    Bytes(Bytes),
}

impl Message {
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self {
            body: Some(Body::Bytes(data.into())),
        }
    }

    pub fn value(value: prost_types::Value) -> Self {
        Self {
            body: Some(Body::Value(value)),
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        Self::value(json_to_value(json))
    }

    /// Binary payload, if this message carries one.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match &self.body {
            Some(Body::Bytes(data)) => Some(data),
            Some(Body::Value(_)) | None => None,
        }
    }

    /// Structured payload as plain JSON. An empty body is `null`.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match &self.body {
            Some(Body::Value(value)) => Some(value_to_json(value)),
            Some(Body::Bytes(_)) => None,
            None => Some(serde_json::Value::Null),
        }
    }

    /// Short description used in log lines and protocol errors.
    pub fn describe(&self) -> &'static str {
        match &self.body {
            Some(Body::Bytes(_)) => "bytes",
            Some(Body::Value(prost_types::Value {
                kind: Some(Kind::StructValue(_)),
            })) => "struct",
            Some(Body::Value(_)) => "value",
            None => "empty",
        }
    }
}

/// `google.rpc.Status` layout, as carried in `grpc-status-details-bin`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RpcStatus {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, repeated, tag = "3")]
    pub details: Vec<prost_types::Any>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message as _;
    use serde_json::json;

    #[test]
    fn message_survives_encoding() {
        let original = Message::from_json(&json!({"a": 1, "b": ["x", true]}));
        let decoded = Message::decode(original.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.to_json(), Some(json!({"a": 1, "b": ["x", true]})));
    }

    #[test]
    fn bytes_message_has_no_json() {
        let msg = Message::bytes(&b"raw"[..]);
        assert_eq!(msg.as_bytes().map(|b| b.as_ref()), Some(&b"raw"[..]));
        assert_eq!(msg.to_json(), None);
        assert_eq!(msg.describe(), "bytes");
    }

    #[test]
    fn empty_message_is_null() {
        let msg = Message::default();
        assert_eq!(msg.to_json(), Some(serde_json::Value::Null));
        assert!(msg.as_bytes().is_none());
    }
}
