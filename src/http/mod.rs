//! HTTP surface of the gateway.
//!
//! # Data Flow
//! ```text
//! HTTP request under the API prefix
//!     → server.rs (Axum setup, request ID, tracing)
//!     → request.rs (call kind, method name, x- metadata)
//!     → unary.rs or streaming::{upload, download}
//!     → response.rs (log failure, JSON defaults) → status mapper
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod unary;

pub use request::{CallKind, EXPECT_FILE_HEADER, METHOD_NAME_KEY};
pub use server::{AppState, HttpServer, Settings};
