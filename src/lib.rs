//! HTTP-to-RPC gateway library.
//!
//! Translates HTTP requests into calls on a pool of RPC backends: unary JSON
//! calls, multipart uploads and chunked file downloads.

pub mod config;
pub mod error;
pub mod http;
pub mod load_balancer;
pub mod rpc;
pub mod status;
pub mod streaming;

pub mod journal;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod admin;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
