//! Response shaping.
//!
//! # Responsibilities
//! - Log a failed call with its root cause before it is rendered
//! - Give unary and upload answers a JSON content type unless one is set
//!
//! # Design Decisions
//! - Internal failures are logged here in full; the client only ever sees
//!   what `status::render_error` allows

use serde_json::Value;

use crate::error::GatewayError;
use crate::status::{self, ErrorPolicy, Rendered, JSON_CONTENT_TYPE};

/// Log `err` and render it under `policy`.
pub fn failure(err: &GatewayError, method: &str, policy: ErrorPolicy) -> Rendered {
    match err {
        GatewayError::Rpc(s) => tracing::debug!(
            method = %method,
            code = status::code_name(s.code()),
            message = %s.message(),
            "Backend returned error status"
        ),
        GatewayError::ClientInput(_) | GatewayError::PayloadTooLarge(_) => {
            tracing::debug!(method = %method, error = %err, "Rejected client input")
        }
        GatewayError::Protocol(_) => {
            tracing::error!(method = %method, kind = err.kind(), error = %err, "Backend protocol violation")
        }
        _ => tracing::warn!(method = %method, kind = err.kind(), error = %err, "Backend call failed"),
    }
    status::render_error(err, policy)
}

/// Fill in the JSON content type when the body came through untyped.
pub fn json_default(mut rendered: Rendered) -> Rendered {
    if rendered.content_type.is_none() {
        rendered.content_type = Some(JSON_CONTENT_TYPE);
    }
    rendered
}

/// One-element-per-file acknowledgement array.
pub fn acknowledgements(acks: Vec<Value>) -> Rendered {
    json_default(Rendered {
        status: axum::http::StatusCode::OK,
        body: Value::Array(acks).to_string().into(),
        content_type: None,
    })
}
