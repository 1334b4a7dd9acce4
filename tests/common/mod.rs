//! Shared utilities for integration tests.
//!
//! The gateway runs in-process on an ephemeral port. Backends are replaced
//! by an in-memory transport that echoes unary calls and replays scripted
//! stream replies.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rpc_gateway::admin::setup_admin_router;
use rpc_gateway::http::AppState;
use rpc_gateway::journal::{Journal, TracingJournal};
use rpc_gateway::observability::PrometheusMetrics;
use rpc_gateway::rpc::{CallContext, Connection, Connector, FrameStream, HealthState, Message};
use rpc_gateway::{GatewayConfig, GatewayError, HttpServer, Shutdown};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub type Reply = Result<Option<Message>, GatewayError>;

/// In-memory stand-in for every backend endpoint.
#[derive(Default)]
pub struct MockBackend {
    /// When set, unary calls fail with this status instead of echoing.
    pub unary_failure: Mutex<Option<tonic::Status>>,
    /// Replies for the next stream that is opened.
    pub stream_script: Mutex<VecDeque<Reply>>,
    /// Every frame the gateway sent on any stream.
    pub sent: Mutex<Vec<Message>>,
    /// Context of every call, unary or stream.
    pub calls: Mutex<Vec<CallContext>>,
    pub half_closed: AtomicBool,
}

impl MockBackend {
    pub fn fail_unary(&self, status: tonic::Status) {
        *self.unary_failure.lock().unwrap() = Some(status);
    }

    pub fn script_stream(&self, replies: Vec<Reply>) {
        *self.stream_script.lock().unwrap() = replies.into();
    }

    pub fn sent_frames(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> CallContext {
        self.calls.lock().unwrap().last().cloned().expect("no backend call recorded")
    }
}

#[derive(Debug)]
struct MockConnection {
    address: String,
    closed: AtomicBool,
    backend: Arc<MockBackend>,
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend").finish_non_exhaustive()
    }
}

#[tonic::async_trait]
impl Connection for MockConnection {
    fn address(&self) -> &str {
        &self.address
    }

    fn state(&self) -> HealthState {
        if self.closed.load(Ordering::SeqCst) {
            HealthState::Shutdown
        } else {
            HealthState::Ready
        }
    }

    async fn invoke(&self, call: &CallContext, request: Message) -> Result<Message, GatewayError> {
        self.backend.calls.lock().unwrap().push(call.clone());
        if let Some(status) = self.backend.unary_failure.lock().unwrap().clone() {
            return Err(GatewayError::Rpc(status));
        }
        Ok(request)
    }

    async fn open_stream(&self, call: &CallContext) -> Result<Box<dyn FrameStream>, GatewayError> {
        self.backend.calls.lock().unwrap().push(call.clone());
        let replies = std::mem::take(&mut *self.backend.stream_script.lock().unwrap());
        Ok(Box::new(MockStream {
            backend: self.backend.clone(),
            replies,
        }))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct MockStream {
    backend: Arc<MockBackend>,
    replies: VecDeque<Reply>,
}

#[tonic::async_trait]
impl FrameStream for MockStream {
    async fn send(&mut self, frame: Message) -> Result<(), GatewayError> {
        self.backend.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Message>, GatewayError> {
        self.replies.pop_front().unwrap_or(Ok(None))
    }

    fn close_send(&mut self) {
        self.backend.half_closed.store(true, Ordering::SeqCst);
    }
}

pub struct MockConnector {
    pub backend: Arc<MockBackend>,
    pub unreachable: HashSet<String>,
}

#[tonic::async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        address: &str,
        _timeout: Duration,
    ) -> Result<Arc<dyn Connection>, GatewayError> {
        if self.unreachable.contains(address) {
            return Err(GatewayError::transport(format!("dial {address}: connection refused")));
        }
        Ok(Arc::new(MockConnection {
            address: address.to_string(),
            closed: AtomicBool::new(false),
            backend: self.backend.clone(),
        }))
    }
}

/// A running gateway. Dropping it shuts the server down.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub backend: Arc<MockBackend>,
    pub config_updates: mpsc::UnboundedSender<GatewayConfig>,
    pub state: AppState,
    shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn config_with(addresses: &[&str]) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.backend.addresses = addresses.iter().map(|a| a.to_string()).collect();
    config.observability.metrics_enabled = false;
    config
}

pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    start_gateway_with(config, Arc::new(TracingJournal)).await
}

pub async fn start_gateway_with(config: GatewayConfig, journal: Arc<dyn Journal>) -> TestGateway {
    let backend = Arc::new(MockBackend::default());
    let connector = Arc::new(MockConnector {
        backend: backend.clone(),
        unreachable: HashSet::new(),
    });

    let server = HttpServer::with_parts(config, connector, Arc::new(PrometheusMetrics::new()), journal);
    let state = server.state();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    TestGateway {
        addr,
        backend,
        config_updates,
        state,
        shutdown,
    }
}

/// Serve the admin router for `gateway` on its own ephemeral port.
pub async fn start_admin(gateway: &TestGateway) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = setup_admin_router(gateway.state.clone());
    let stop = gateway.shutdown.wait();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).with_graceful_shutdown(stop).await;
    });
    addr
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
