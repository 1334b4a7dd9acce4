//! Unary JSON calls.
//!
//! The raw request body goes to the backend as a bytes message; the answer
//! is rendered by the status mapper. Matching methods are journaled.

use std::time::Instant;

use axum::body::Body;
use bytes::Bytes;
use http_body_util::LengthLimitError;

use crate::error::GatewayError;
use crate::http::response::{failure, json_default};
use crate::http::server::{AppState, Settings};
use crate::journal::{self, Outcome};
use crate::resilience::Deadline;
use crate::rpc::{CallContext, Message};
use crate::status::{render_success, Rendered};

pub(crate) async fn handle(
    state: &AppState,
    settings: &Settings,
    method: &str,
    metadata: Vec<(String, String)>,
    body: Body,
) -> Rendered {
    let request = match read_body(body, settings.max_request_body).await {
        Ok(request) => request,
        Err(err) => return failure(&err, method, settings.errors),
    };

    let result = invoke(state, settings, method, metadata, request.clone()).await;
    let rendered = match &result {
        Ok(message) => json_default(render_success(message)),
        Err(err) => failure(err, method, settings.errors),
    };

    if let Some(matcher) = &settings.journal {
        if matcher.matches(method) {
            let outcome = match result {
                Ok(_) => Outcome::Success {
                    response: rendered.body.clone(),
                },
                Err(err) => Outcome::Failure {
                    response: rendered.body.clone(),
                    error: err.to_string(),
                },
            };
            journal::submit(state.journal.clone(), method.to_string(), request, outcome);
        }
    }

    rendered
}

async fn invoke(
    state: &AppState,
    settings: &Settings,
    method: &str,
    metadata: Vec<(String, String)>,
    request: Bytes,
) -> Result<Message, GatewayError> {
    let endpoint = state.pool.acquire()?;
    let call = CallContext {
        method: method.to_string(),
        metadata,
        deadline: Deadline::after(settings.sync_timeout),
    };

    let started = Instant::now();
    let result = call
        .deadline
        .run(endpoint.connection().invoke(&call, Message::bytes(request)))
        .await;
    state.metrics.record_backend_call(method, started.elapsed());

    tracing::debug!(
        method = %method,
        endpoint = %endpoint.address(),
        ok = result.is_ok(),
        "Unary call finished"
    );
    result
}

pub(crate) async fn read_body(body: Body, limit: usize) -> Result<Bytes, GatewayError> {
    axum::body::to_bytes(body, limit).await.map_err(|err| {
        let err = err.into_inner();
        if err.downcast_ref::<LengthLimitError>().is_some() {
            GatewayError::PayloadTooLarge(limit)
        } else {
            GatewayError::ClientInput(format!("Not able to read request body: {err}"))
        }
    })
}
