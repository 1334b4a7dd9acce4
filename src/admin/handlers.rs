use std::collections::BTreeMap;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::config::validation::validate_endpoint_address;
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub endpoints: usize,
    pub active_endpoints: usize,
}

#[derive(Serialize, Deserialize)]
pub struct EndpointUpdate {
    pub addresses: Vec<String>,
}

#[derive(Serialize)]
pub struct EndpointUpdateResult {
    pub connected: bool,
    pub endpoints: BTreeMap<String, &'static str>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let statuses = state.pool.statuses();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        endpoints: statuses.len(),
        active_endpoints: statuses.values().filter(|s| s.is_selectable()).count(),
    })
}

/// Address → health label.
pub async fn get_endpoints(State(state): State<AppState>) -> Json<BTreeMap<String, &'static str>> {
    Json(endpoint_labels(&state))
}

pub async fn put_endpoints(
    State(state): State<AppState>,
    Json(update): Json<EndpointUpdate>,
) -> Result<Json<EndpointUpdateResult>, (StatusCode, Json<serde_json::Value>)> {
    let errors: Vec<String> = update
        .addresses
        .iter()
        .filter_map(|address| validate_endpoint_address(address).err())
        .collect();
    if !errors.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "errors": errors })),
        ));
    }

    tracing::info!(addresses = ?update.addresses, "Endpoint list pushed through admin API");
    let connected = state.pool.update_endpoints(&update.addresses).await;

    Ok(Json(EndpointUpdateResult {
        connected,
        endpoints: endpoint_labels(&state),
    }))
}

fn endpoint_labels(state: &AppState) -> BTreeMap<String, &'static str> {
    state
        .pool
        .statuses()
        .into_iter()
        .map(|(address, health)| (address, health.label()))
        .collect()
}
