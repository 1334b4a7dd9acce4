//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → timeouts.rs (deadline fixed at request entry: sync or stream timeout)
//!     → every send/recv/invoke runs under that deadline
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries and no circuit breaking: a failed call is reported, not replayed,
//!   and unhealthy endpoints are only skipped at selection time

pub mod timeouts;

pub use timeouts::Deadline;
