//! File transfer framing on top of [`Message`].
//!
//! A file travels as `BeginFile`, zero or more bytes chunks, then the
//! end-of-file sentinel, in either direction.

use prost_types::value::Kind;
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::error::GatewayError;
use crate::rpc::proto::{Body, Message};

/// String value marking the end of one file's chunk sequence.
pub const END_OF_FILE_MARKER: &str = "gateway.stream.eof";

/// Metadata header preceding a file's chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BeginFile {
    pub file_name: String,
    pub form_data_name: String,
    pub content_type: String,
    /// Declared size in bytes; zero when unknown.
    pub content_length: i64,
    /// Sibling non-file form fields.
    pub form_data: Map<String, serde_json::Value>,
}

impl BeginFile {
    pub fn to_message(&self) -> Message {
        // A plain struct of strings, numbers and a map always serializes.
        let json = serde_json::to_value(self).unwrap_or_default();
        Message::from_json(&json)
    }

    pub fn from_message(msg: &Message) -> Result<Self, GatewayError> {
        let json = match msg.to_json() {
            Some(json @ serde_json::Value::Object(_)) => json,
            _ => {
                return Err(GatewayError::protocol(format!(
                    "expected begin-file header, got {} frame",
                    msg.describe()
                )))
            }
        };
        serde_json::from_value(json)
            .map_err(|e| GatewayError::protocol(format!("malformed begin-file header: {e}")))
    }
}

pub fn end_of_file() -> Message {
    Message::value(prost_types::Value {
        kind: Some(Kind::StringValue(END_OF_FILE_MARKER.to_string())),
    })
}

pub fn is_end_of_file(msg: &Message) -> bool {
    matches!(
        &msg.body,
        Some(Body::Value(prost_types::Value {
            kind: Some(Kind::StringValue(s)),
        })) if s == END_OF_FILE_MARKER
    )
}
