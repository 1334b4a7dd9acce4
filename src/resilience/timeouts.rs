//! Call deadlines.
//!
//! # Responsibilities
//! - Bound every backend call (unary or stream) by a deadline fixed at request entry
//! - Convert an elapsed deadline into a `DeadlineExceeded` RPC status
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - The deadline is absolute, so a stream's later frames get the remaining time, not a fresh budget
//! - Cancellation is by drop: whatever owns the call future or stream releases it on every exit path

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Run `fut` to completion or fail with `DeadlineExceeded`.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        match tokio::time::timeout_at(self.at, fut).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Rpc(tonic::Status::deadline_exceeded(
                "call deadline exceeded",
            ))),
        }
    }
}
