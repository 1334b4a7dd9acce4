//! Status mapping subsystem.
//!
//! # Data Flow
//! ```text
//! Call outcome (Message or GatewayError)
//!     → codes.rs (RPC code → HTTP status)
//!     → details.rs (structured details → plain JSON)
//!     → Rendered (status, body, content type)
//! ```
//!
//! # Design Decisions
//! - Pure: no I/O and no logging; callers log before rendering
//! - Only backend statuses and client input errors expose text to clients

pub mod codes;
pub mod details;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use prost::Message as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::GatewayError;
use crate::rpc::proto::{Message, RpcStatus};

pub use codes::{code_name, http_status};

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

const UNAVAILABLE_MESSAGE: &str = "Service is not available now, please try later";

/// How backend failures are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorPolicy {
    /// Write the binary status verbatim instead of JSON.
    pub passthrough_original_status: bool,
    /// Write the first detail alone instead of the error envelope.
    pub collapse_to_first_detail: bool,
}

/// A rendered HTTP answer.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub status: StatusCode,
    pub body: Bytes,
    /// `None` leaves the content type to the caller.
    pub content_type: Option<&'static str>,
}

impl Rendered {
    fn json(status: StatusCode, body: &Value) -> Self {
        Self {
            status,
            body: Bytes::from(body.to_string()),
            content_type: Some(JSON_CONTENT_TYPE),
        }
    }
}

impl IntoResponse for Rendered {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        match self.content_type {
            Some(content_type) => {
                response
                    .headers_mut()
                    .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
            None => {
                response.headers_mut().remove(header::CONTENT_TYPE);
            }
        }
        response
    }
}

/// Render a successful call result.
pub fn render_success(message: &Message) -> Rendered {
    match message.as_bytes() {
        Some(data) => Rendered {
            status: StatusCode::OK,
            body: data.clone(),
            content_type: None,
        },
        None => {
            let json = message.to_json().unwrap_or(Value::Null);
            Rendered::json(StatusCode::OK, &json)
        }
    }
}

/// Render a failed call under `policy`.
pub fn render_error(err: &GatewayError, policy: ErrorPolicy) -> Rendered {
    match err {
        GatewayError::Rpc(status) => render_status(status, policy),
        GatewayError::ClientInput(message) => {
            Rendered::json(StatusCode::BAD_REQUEST, &json!({ "errorMessage": message }))
        }
        GatewayError::PayloadTooLarge(_) => Rendered::json(
            StatusCode::PAYLOAD_TOO_LARGE,
            &json!({ "errorMessage": err.to_string() }),
        ),
        GatewayError::NoEndpoints
        | GatewayError::NoActiveEndpoint
        | GatewayError::Transport(_)
        | GatewayError::Protocol(_)
        | GatewayError::Io(_) => unavailable(),
    }
}

/// Fixed body for failures whose cause must stay in the server log.
pub fn unavailable() -> Rendered {
    Rendered::json(
        StatusCode::SERVICE_UNAVAILABLE,
        &json!({
            "errorMessage": UNAVAILABLE_MESSAGE,
            "errorCode": code_name(tonic::Code::Unavailable),
            "details": [],
        }),
    )
}

fn render_status(status: &tonic::Status, policy: ErrorPolicy) -> Rendered {
    let http = http_status(status.code());

    if policy.passthrough_original_status {
        let body = if status.details().is_empty() {
            Bytes::from(
                RpcStatus {
                    code: status.code() as i32,
                    message: status.message().to_string(),
                    details: Vec::new(),
                }
                .encode_to_vec(),
            )
        } else {
            Bytes::copy_from_slice(status.details())
        };
        return Rendered {
            status: http,
            body,
            content_type: Some(PROTOBUF_CONTENT_TYPE),
        };
    }

    let details = details::decode_details(status);

    if policy.collapse_to_first_detail {
        if let Some(first) = details.first() {
            return Rendered::json(http, &details::detail_to_json(first));
        }
    }

    let details: Vec<Value> = details.iter().map(details::detail_to_json).collect();
    Rendered::json(
        http,
        &json!({
            "errorMessage": status.message(),
            "errorCode": code_name(status.code()),
            "details": details,
        }),
    )
}
