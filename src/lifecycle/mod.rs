//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging/metrics → Push endpoints → Start listeners
//!
//! Shutdown (shutdown.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger → Stop accepting → Drain → Close connections
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain in-flight requests, close backend connections

pub mod shutdown;

pub use shutdown::{termination_signal, Shutdown};
