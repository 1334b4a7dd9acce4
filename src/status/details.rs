//! Structured error details → plain JSON.

use base64::Engine;
use prost::Message as _;
use prost_types::Any;
use serde_json::{json, Value};

use crate::rpc::proto::{Message, RpcStatus, MESSAGE_TYPE_URL};
use crate::rpc::value::{struct_to_json, value_to_json};

const STRUCT_TYPE: &str = "google.protobuf.Struct";
const VALUE_TYPE: &str = "google.protobuf.Value";

/// Details carried in `grpc-status-details-bin`, empty if absent or undecodable.
pub fn decode_details(status: &tonic::Status) -> Vec<Any> {
    if status.details().is_empty() {
        return Vec::new();
    }
    match RpcStatus::decode(status.details()) {
        Ok(decoded) => decoded.details,
        Err(err) => {
            tracing::debug!(error = %err, "Undecodable status details");
            Vec::new()
        }
    }
}

fn type_name(type_url: &str) -> &str {
    type_url.rsplit('/').next().unwrap_or(type_url)
}

/// Convert one detail. Unknown types keep their encoded form.
pub fn detail_to_json(detail: &Any) -> Value {
    let converted = match type_name(&detail.type_url) {
        STRUCT_TYPE => prost_types::Struct::decode(detail.value.as_slice())
            .ok()
            .map(|s| struct_to_json(&s)),
        VALUE_TYPE => prost_types::Value::decode(detail.value.as_slice())
            .ok()
            .map(|v| value_to_json(&v)),
        _ if detail.type_url == MESSAGE_TYPE_URL => Message::decode(detail.value.as_slice())
            .ok()
            .and_then(|m| m.to_json()),
        _ => None,
    };
    converted.unwrap_or_else(|| opaque(detail))
}

fn opaque(detail: &Any) -> Value {
    json!({
        "typeUrl": detail.type_url,
        "value": base64::engine::general_purpose::STANDARD.encode(&detail.value),
    })
}
