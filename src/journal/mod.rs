//! Audit journal of unary calls.
//!
//! # Data Flow
//! ```text
//! Unary call finished
//!     → matcher.rs (is this method journaled?)
//!     → submit(): spawned task → Journal::info / Journal::error
//!     → failures logged, never surfaced to the client
//! ```

pub mod matcher;

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::task::JoinHandle;

pub use matcher::MethodMatcher;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal unavailable: {0}")]
    Unavailable(String),

    #[error("journal write failed: {0}")]
    Write(String),
}

/// Destination of journal entries.
#[tonic::async_trait]
pub trait Journal: Send + Sync {
    async fn info(&self, method: &str, request: &[u8], response: &[u8]) -> Result<(), JournalError>;

    async fn error(
        &self,
        method: &str,
        request: &[u8],
        response: &[u8],
        error: &str,
    ) -> Result<(), JournalError>;
}

/// Writes entries to the log under the `journal` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingJournal;

#[tonic::async_trait]
impl Journal for TracingJournal {
    async fn info(&self, method: &str, request: &[u8], response: &[u8]) -> Result<(), JournalError> {
        tracing::info!(
            target: "journal",
            method = %method,
            request = %String::from_utf8_lossy(request),
            response = %String::from_utf8_lossy(response),
            "Call journaled"
        );
        Ok(())
    }

    async fn error(
        &self,
        method: &str,
        request: &[u8],
        response: &[u8],
        error: &str,
    ) -> Result<(), JournalError> {
        tracing::error!(
            target: "journal",
            method = %method,
            request = %String::from_utf8_lossy(request),
            response = %String::from_utf8_lossy(response),
            error = %error,
            "Failed call journaled"
        );
        Ok(())
    }
}

/// What the call produced.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success { response: Bytes },
    Failure { response: Bytes, error: String },
}

/// Hand one entry to `journal` on its own task. Write failures are logged.
pub fn submit(
    journal: Arc<dyn Journal>,
    method: String,
    request: Bytes,
    outcome: Outcome,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = match &outcome {
            Outcome::Success { response } => journal.info(&method, &request, response).await,
            Outcome::Failure { response, error } => {
                journal.error(&method, &request, response, error).await
            }
        };
        if let Err(err) = result {
            tracing::warn!(method = %method, error = %err, "Could not write to journal");
        }
    })
}
