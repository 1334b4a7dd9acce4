//! Transport seam between the gateway core and the RPC stack.
//!
//! The pool, the unary path and the streaming engine only see these traits.
//! [`crate::rpc::grpc`] implements them on top of tonic; tests plug in
//! in-process fakes.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::GatewayError;
use crate::resilience::Deadline;
use crate::rpc::proto::Message;

/// Connectivity state of one endpoint connection.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Unknown = 0,
    Ready = 1,
    Connecting = 2,
    TransientFailure = 3,
    Shutdown = 4,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Ready,
            2 => HealthState::Connecting,
            3 => HealthState::TransientFailure,
            4 => HealthState::Shutdown,
            _ => HealthState::Unknown,
        }
    }
}

impl HealthState {
    pub fn label(&self) -> &'static str {
        match self {
            HealthState::Unknown => "UNKNOWN",
            HealthState::Ready => "READY",
            HealthState::Connecting => "CONNECTING",
            HealthState::TransientFailure => "TRANSIENT_FAILURE",
            HealthState::Shutdown => "SHUTDOWN",
        }
    }

    /// READY, or CONNECTING (a handshake in progress may finish before use).
    pub fn is_selectable(&self) -> bool {
        matches!(self, HealthState::Ready | HealthState::Connecting)
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Lock-free holder for a [`HealthState`].
#[derive(Debug)]
pub struct AtomicHealth(AtomicU8);

impl AtomicHealth {
    pub fn new(state: HealthState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> HealthState {
        HealthState::from(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: HealthState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move to `next` unless already shut down. Returns false if shut down.
    pub fn transition(&self, next: HealthState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                (cur != HealthState::Shutdown as u8).then_some(next as u8)
            })
            .is_ok()
    }
}

/// Per-call context handed to the transport.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Backend method name (request path without the API prefix).
    pub method: String,
    /// Outgoing metadata, keys already lowercased.
    pub metadata: Vec<(String, String)>,
    pub deadline: Deadline,
}

/// One bidirectional stream session. Dropping it cancels the stream.
#[tonic::async_trait]
pub trait FrameStream: Send {
    async fn send(&mut self, frame: Message) -> Result<(), GatewayError>;

    /// Next frame, or `None` once the backend finished the stream.
    async fn recv(&mut self) -> Result<Option<Message>, GatewayError>;

    /// Half-close: no more frames will be sent.
    fn close_send(&mut self);
}

/// A live connection to one endpoint.
#[tonic::async_trait]
pub trait Connection: Send + Sync + std::fmt::Debug {
    fn address(&self) -> &str;

    fn state(&self) -> HealthState;

    async fn invoke(&self, call: &CallContext, request: Message) -> Result<Message, GatewayError>;

    async fn open_stream(&self, call: &CallContext) -> Result<Box<dyn FrameStream>, GatewayError>;

    /// Close without draining; in-flight calls may fail.
    fn close(&self);
}

/// Dials endpoints.
#[tonic::async_trait]
pub trait Connector: Send + Sync {
    /// Dial `address`, blocking until connected or `timeout` elapses.
    async fn connect(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn Connection>, GatewayError>;
}
