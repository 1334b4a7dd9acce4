//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request accepted
//!     → pool.rs (snapshot of the current endpoint set)
//!     → round_robin.rs (rotate, skipping endpoints not READY/CONNECTING)
//!     → endpoint.rs (live connection handed to the unary or streaming path)
//! ```
//!
//! # Design Decisions
//! - The endpoint set is immutable once built; address changes swap in a new one
//! - Selection never blocks on an endpoint update except for the swap itself
//! - No background reconnection: only the next address push re-provisions

pub mod endpoint;
pub mod pool;
pub mod round_robin;

pub use endpoint::Endpoint;
pub use pool::ConnectionPool;

/// Trait for load balancing algorithms.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Select an endpoint, or `None` if no candidate is usable.
    fn next_endpoint(&self, endpoints: &[Endpoint]) -> Option<Endpoint>;
}
