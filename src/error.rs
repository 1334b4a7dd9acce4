//! Gateway error taxonomy.
//!
//! Every failure on the request path ends up as one of these variants and is
//! rendered by [`crate::status`]. Only [`GatewayError::Rpc`] and
//! [`GatewayError::ClientInput`] may ever expose text to the HTTP client; the
//! other variants are logged and collapsed into a generic 503 body.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The pool has no configured endpoints at all.
    #[error("no endpoints configured")]
    NoEndpoints,

    /// Endpoints are configured but none is READY or CONNECTING.
    #[error("no active endpoint")]
    NoActiveEndpoint,

    /// Dial or stream I/O failure that never produced a structured RPC status.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a structured RPC status.
    #[error("rpc status {:?}: {}", .0.code(), .0.message())]
    Rpc(tonic::Status),

    /// A stream frame had an unexpected shape.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Local I/O, e.g. spooling an upload to disk.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP request itself could not be understood.
    #[error("{0}")]
    ClientInput(String),

    /// The request body is larger than the configured limit.
    #[error("Request body exceeds the limit of {0} bytes")]
    PayloadTooLarge(usize),
}

impl GatewayError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        GatewayError::Transport(err.to_string())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        GatewayError::Protocol(msg.into())
    }

    /// Short label used in structured logs and the journal.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::NoEndpoints | GatewayError::NoActiveEndpoint => "configuration",
            GatewayError::Transport(_) => "transport",
            GatewayError::Rpc(_) => "application",
            GatewayError::Protocol(_) => "protocol",
            GatewayError::Io(_) => "io",
            GatewayError::ClientInput(_) | GatewayError::PayloadTooLarge(_) => "client_input",
        }
    }
}
