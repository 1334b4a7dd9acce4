//! Request inspection.
//!
//! # Responsibilities
//! - Decide which call shape a request takes (unary, upload, download)
//! - Derive the backend method name from the path
//! - Collect `x-` headers as outgoing call metadata
//! - Validate the JSON body of download requests

use axum::http::{header, HeaderMap, Method};
use bytes::Bytes;
use serde_json::Value;

use crate::error::GatewayError;

/// Header that turns a request into a file download.
pub const EXPECT_FILE_HEADER: &str = "expect-file";

/// Metadata key carrying the backend method name.
pub const METHOD_NAME_KEY: &str = "proxy_method_name";

const FORWARDED_HEADER_PREFIX: &str = "x-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Unary,
    Upload,
    Download,
}

impl CallKind {
    pub fn label(&self) -> &'static str {
        match self {
            CallKind::Unary => "unary",
            CallKind::Upload => "upload",
            CallKind::Download => "download",
        }
    }
}

pub fn classify(method: &Method, headers: &HeaderMap) -> CallKind {
    if method == Method::POST && is_multipart(headers) {
        return CallKind::Upload;
    }
    let expects_file = headers
        .get(EXPECT_FILE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "true")
        .unwrap_or(false);
    if expects_file {
        CallKind::Download
    } else {
        CallKind::Unary
    }
}

/// `multipart/form-data` with a boundary parameter.
fn is_multipart(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let mut parts = content_type.split(';').map(str::trim);
    let is_form = parts
        .next()
        .map(|mime| mime.eq_ignore_ascii_case("multipart/form-data"))
        .unwrap_or(false);
    is_form
        && parts.any(|param| {
            param
                .split_once('=')
                .map(|(key, value)| key.trim().eq_ignore_ascii_case("boundary") && !value.trim().is_empty())
                .unwrap_or(false)
        })
}

/// Path with the API prefix stripped.
pub fn method_name<'a>(path: &'a str, api_prefix: &str) -> &'a str {
    path.strip_prefix(api_prefix).unwrap_or(path)
}

/// Outgoing metadata: the method name first, then every `x-` header.
///
/// Header names are already lowercase in `HeaderMap`. Empty and non-ASCII
/// values are skipped.
pub fn outgoing_metadata(headers: &HeaderMap, method: &str) -> Vec<(String, String)> {
    let mut metadata = vec![(METHOD_NAME_KEY.to_string(), method.to_string())];
    for (name, value) in headers {
        if !name.as_str().starts_with(FORWARDED_HEADER_PREFIX) {
            continue;
        }
        match value.to_str() {
            Ok(value) if !value.is_empty() => {
                metadata.push((name.as_str().to_string(), value.to_string()));
            }
            _ => {}
        }
    }
    metadata
}

/// Parse an optional JSON object or array.
///
/// An empty (or all-whitespace) body means there is nothing to send.
pub fn parse_json_body(body: &Bytes) -> Result<Option<Value>, GatewayError> {
    let trimmed = body.trim_ascii_start();
    match trimmed.first() {
        None => Ok(None),
        Some(b'{') | Some(b'[') => serde_json::from_slice(trimmed).map(Some).map_err(|err| {
            GatewayError::ClientInput(format!("Not able to read request body: {err}"))
        }),
        Some(_) => Err(GatewayError::ClientInput(
            "Invalid json format. Expected object or array".to_string(),
        )),
    }
}
