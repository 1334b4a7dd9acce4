//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum router for the API prefix
//! - Wire up middleware (request ID, tracing, body limit)
//! - Dispatch each request to the unary, upload or download path
//! - Record one observation per request
//! - Apply configuration updates while serving

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, FromRequest, Multipart, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::request::{self, CallKind};
use crate::http::response::{acknowledgements, failure};
use crate::http::unary;
use crate::journal::{Journal, MethodMatcher, TracingJournal};
use crate::load_balancer::ConnectionPool;
use crate::observability::{PrometheusMetrics, RequestMetrics};
use crate::resilience::Deadline;
use crate::rpc::{CallContext, Connector, GrpcConnector, Message};
use crate::status::{ErrorPolicy, Rendered};
use crate::streaming::{self, read_form, send_form};

/// Settings that may change while the server runs.
#[derive(Debug, Clone)]
pub struct Settings {
    pub sync_timeout: Duration,
    pub stream_timeout: Duration,
    pub buffer_size: usize,
    pub max_request_body: usize,
    pub errors: ErrorPolicy,
    /// `None` when journaling is off.
    pub journal: Option<Arc<MethodMatcher>>,
    pub admin_api_key: String,
}

impl Settings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let journal = if config.journal.enabled {
            match MethodMatcher::new(&config.journal.method_patterns) {
                Ok(matcher) => Some(Arc::new(matcher)),
                Err(err) => {
                    tracing::error!(error = %err, "Invalid journal pattern, journaling disabled");
                    None
                }
            }
        } else {
            None
        };

        Self {
            sync_timeout: config.timeouts.sync_invoke(),
            stream_timeout: config.timeouts.stream_invoke(),
            buffer_size: config.transfer.buffer_size(),
            max_request_body: config.transfer.max_request_body(),
            errors: config.errors,
            journal,
            admin_api_key: config.admin.api_key.clone(),
        }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<ConnectionPool>,
    pub inner: Arc<ArcSwap<Settings>>,
    pub metrics: Arc<dyn RequestMetrics>,
    pub journal: Arc<dyn Journal>,
    pub api_prefix: Arc<str>,
}

impl AppState {
    /// Swap in new settings and push the endpoint list to the pool.
    pub async fn apply(&self, config: &GatewayConfig) {
        self.inner.store(Arc::new(Settings::from_config(config)));
        let connected = self.pool.update_endpoints(&config.backend.addresses).await;
        tracing::info!(
            endpoints = config.backend.addresses.len(),
            connected,
            "Configuration applied"
        );
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a server that dials backends over gRPC.
    pub fn new(config: GatewayConfig) -> Self {
        let connector = Arc::new(GrpcConnector::new(config.transfer.max_request_body()));
        Self::with_parts(
            config,
            connector,
            Arc::new(PrometheusMetrics::new()),
            Arc::new(TracingJournal),
        )
    }

    /// Create a server with explicit collaborators.
    pub fn with_parts(
        config: GatewayConfig,
        connector: Arc<dyn Connector>,
        metrics: Arc<dyn RequestMetrics>,
        journal: Arc<dyn Journal>,
    ) -> Self {
        let pool = Arc::new(ConnectionPool::new(connector, config.backend.dial_timeout()));
        let state = AppState {
            pool,
            inner: Arc::new(ArcSwap::from_pointee(Settings::from_config(&config))),
            metrics,
            journal,
            api_prefix: Arc::from(config.listener.api_prefix.as_str()),
        };

        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            state,
            config,
        }
    }

    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let route = format!("{}{{*path}}", config.listener.api_prefix);
        Router::new()
            .route(&route, any(gateway_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.transfer.max_request_body()))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Shared state, e.g. for the admin router.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Dial the configured endpoints, then serve until `shutdown` fires.
    ///
    /// Every config received on `config_updates` is applied live.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;

        let pool = self.state.pool.clone();
        if !pool.update_endpoints(&self.config.backend.addresses).await {
            tracing::warn!(
                endpoints = self.config.backend.addresses.len(),
                "No backend endpoint connected at startup"
            );
        }

        let state = self.state.clone();
        let reload = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                state.apply(&config).await;
            }
        });

        tracing::info!(address = %addr, prefix = %self.state.api_prefix, "HTTP server starting");

        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await;

        reload.abort();
        pool.close_all();
        tracing::info!("HTTP server stopped");
        served
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Entry point for every request under the API prefix.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let settings = state.inner.load_full();

    let method = request::method_name(request.uri().path(), &state.api_prefix).to_string();
    let kind = request::classify(request.method(), request.headers());
    let metadata = request::outgoing_metadata(request.headers(), &method);

    tracing::debug!(method = %method, kind = kind.label(), "Dispatching request");

    let response = match kind {
        CallKind::Unary => {
            unary::handle(&state, &settings, &method, metadata, request.into_body())
                .await
                .into_response()
        }
        CallKind::Upload => match upload(&state, &settings, &method, metadata, request).await {
            Ok(rendered) => rendered.into_response(),
            Err(err) => failure(&err, &method, settings.errors).into_response(),
        },
        CallKind::Download => {
            match download(&state, &settings, &method, metadata, request.into_body()).await {
                Ok(response) => response,
                Err(err) => failure(&err, &method, settings.errors).into_response(),
            }
        }
    };

    state
        .metrics
        .record_request(response.status().as_u16(), started.elapsed(), &method);
    response
}

async fn upload(
    state: &AppState,
    settings: &Settings,
    method: &str,
    metadata: Vec<(String, String)>,
    request: Request<Body>,
) -> Result<Rendered, GatewayError> {
    let multipart = Multipart::from_request(request, state)
        .await
        .map_err(|rejection| {
            GatewayError::ClientInput(format!(
                "Not able to read request body: {}",
                rejection.body_text()
            ))
        })?;
    let form = read_form(multipart).await?;

    let endpoint = state.pool.acquire()?;
    let call = CallContext {
        method: method.to_string(),
        metadata,
        deadline: Deadline::after(settings.stream_timeout),
    };
    let mut stream = call.deadline.run(endpoint.connection().open_stream(&call)).await?;

    let files = form.files.len();
    let acks = call
        .deadline
        .run(send_form(stream.as_mut(), form, settings.buffer_size))
        .await?;
    tracing::debug!(method = %method, files, endpoint = %endpoint.address(), "Upload finished");

    Ok(acknowledgements(acks))
}

async fn download(
    state: &AppState,
    settings: &Settings,
    method: &str,
    metadata: Vec<(String, String)>,
    body: Body,
) -> Result<Response, GatewayError> {
    let body = unary::read_body(body, settings.max_request_body).await?;
    let request = request::parse_json_body(&body)?.map(|value| Message::from_json(&value));

    let endpoint = state.pool.acquire()?;
    let call = CallContext {
        method: method.to_string(),
        metadata,
        deadline: Deadline::after(settings.stream_timeout),
    };
    let stream = call.deadline.run(endpoint.connection().open_stream(&call)).await?;
    let download = call
        .deadline
        .run(streaming::download::start(stream, request, method))
        .await?;

    tracing::debug!(
        method = %method,
        file = %download.header.file_name,
        length = download.header.content_length,
        "Download started"
    );
    Ok(download.into_response())
}
