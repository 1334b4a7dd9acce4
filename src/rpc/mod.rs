//! RPC subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → transport.rs (Connection / FrameStream seam)
//!     → grpc.rs (tonic channel, generic codec over proto.rs messages)
//!     → backend Request / RequestStream methods
//! ```
//!
//! # Design Decisions
//! - The backend exposes one generic service; the HTTP path travels as metadata
//! - File transfers are framed with frames.rs on top of the same message type

pub mod frames;
pub mod grpc;
pub mod proto;
pub mod transport;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use grpc::GrpcConnector;
pub use proto::{Body, Message, RpcStatus};
pub use transport::{CallContext, Connection, Connector, FrameStream, HealthState};
