//! tonic-backed transport.
//!
//! # Responsibilities
//! - Dial endpoints in blocking mode with a bounded timeout
//! - Run unary and bidirectional calls against the generic backend service
//! - Track per-connection health from call outcomes
//!
//! # Design Decisions
//! - tonic channels reconnect lazily, so TRANSIENT_FAILURE is reported as
//!   CONNECTING again once `RECONNECT_BACKOFF` has passed
//! - A `Status` carrying a transport source is a transport error, never an
//!   application error
//! - The bidi call is started in a spawned task: some servers only send
//!   response headers after the first request frame arrives

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue, MetadataMap};
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Response, Status, Streaming};
use tonic_prost::ProstCodec;

use crate::error::GatewayError;
use crate::resilience::Deadline;
use crate::rpc::proto::{Message, STREAM_PATH, UNARY_PATH};
use crate::rpc::transport::{
    AtomicHealth, CallContext, Connection, Connector, FrameStream, HealthState,
};

const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Request frames buffered ahead of the network; keeps upload memory bounded.
const STREAM_SEND_BUFFER: usize = 2;

/// Dials plaintext HTTP/2 gRPC connections.
#[derive(Debug, Clone)]
pub struct GrpcConnector {
    max_message_size: usize,
}

impl GrpcConnector {
    pub fn new(max_message_size: usize) -> Self {
        Self { max_message_size }
    }
}

#[tonic::async_trait]
impl Connector for GrpcConnector {
    async fn connect(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn Connection>, GatewayError> {
        let endpoint = Endpoint::from_shared(format!("http://{address}"))
            .map_err(|e| GatewayError::transport(format!("invalid address {address}: {e}")))?
            .connect_timeout(timeout);

        let channel = match tokio::time::timeout(timeout, endpoint.connect()).await {
            Ok(Ok(channel)) => channel,
            Ok(Err(e)) => return Err(GatewayError::transport(format!("dial {address}: {e}"))),
            Err(_) => {
                return Err(GatewayError::transport(format!(
                    "dial {address}: timed out after {timeout:?}"
                )))
            }
        };

        tracing::debug!(address = %address, "Dialed endpoint");
        Ok(Arc::new(GrpcConnection {
            address: address.to_string(),
            channel: Mutex::new(Some(channel)),
            health: Arc::new(HealthTracker::new()),
            max_message_size: self.max_message_size,
        }))
    }
}

#[derive(Debug)]
struct HealthTracker {
    state: AtomicHealth,
    origin: Instant,
    /// Milliseconds since `origin` of the last transport failure.
    failed_at_ms: AtomicU64,
}

impl HealthTracker {
    fn new() -> Self {
        Self {
            state: AtomicHealth::new(HealthState::Ready),
            origin: Instant::now(),
            failed_at_ms: AtomicU64::new(0),
        }
    }

    fn current(&self) -> HealthState {
        match self.state.load() {
            HealthState::TransientFailure => {
                let failed_at = Duration::from_millis(self.failed_at_ms.load(Ordering::Relaxed));
                if self.origin.elapsed().saturating_sub(failed_at) >= RECONNECT_BACKOFF {
                    HealthState::Connecting
                } else {
                    HealthState::TransientFailure
                }
            }
            state => state,
        }
    }

    fn record<T>(&self, result: &Result<T, GatewayError>) {
        match result {
            Err(GatewayError::Transport(_)) => {
                let now = self.origin.elapsed().as_millis() as u64;
                self.failed_at_ms.store(now, Ordering::Relaxed);
                self.state.transition(HealthState::TransientFailure);
            }
            _ => {
                self.state.transition(HealthState::Ready);
            }
        }
    }
}

#[derive(Debug)]
pub struct GrpcConnection {
    address: String,
    channel: Mutex<Option<Channel>>,
    health: Arc<HealthTracker>,
    max_message_size: usize,
}

impl GrpcConnection {
    fn client(&self) -> Result<tonic::client::Grpc<Channel>, GatewayError> {
        let channel = self
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| GatewayError::transport(format!("connection to {} closed", self.address)))?;
        Ok(tonic::client::Grpc::new(channel)
            .max_decoding_message_size(self.max_message_size)
            .max_encoding_message_size(self.max_message_size))
    }
}

#[tonic::async_trait]
impl Connection for GrpcConnection {
    fn address(&self) -> &str {
        &self.address
    }

    fn state(&self) -> HealthState {
        self.health.current()
    }

    async fn invoke(&self, call: &CallContext, request: Message) -> Result<Message, GatewayError> {
        let mut grpc = self.client()?;
        let request = outgoing_request(call, request);
        let result = call
            .deadline
            .run(async move {
                ready(&mut grpc).await?;
                grpc.unary(
                    request,
                    PathAndQuery::from_static(UNARY_PATH),
                    ProstCodec::<Message, Message>::default(),
                )
                .await
                .map(Response::into_inner)
                .map_err(classify)
            })
            .await;
        self.health.record(&result);
        result
    }

    async fn open_stream(&self, call: &CallContext) -> Result<Box<dyn FrameStream>, GatewayError> {
        let mut grpc = self.client()?;
        let readiness = call.deadline.run(ready(&mut grpc)).await;
        self.health.record(&readiness);
        readiness?;

        let (sender, receiver) = mpsc::channel(STREAM_SEND_BUFFER);
        let request = outgoing_request(call, ReceiverStream::new(receiver));
        let opening = tokio::spawn(async move {
            grpc.streaming(
                request,
                PathAndQuery::from_static(STREAM_PATH),
                ProstCodec::<Message, Message>::default(),
            )
            .await
            .map(Response::into_inner)
        });

        Ok(Box::new(GrpcFrameStream {
            sender: Some(sender),
            inbound: Inbound::Opening(opening),
            deadline: call.deadline,
            health: self.health.clone(),
        }))
    }

    fn close(&self) {
        self.health.state.store(HealthState::Shutdown);
        self.channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        tracing::debug!(address = %self.address, "Connection closed");
    }
}

enum Inbound {
    Opening(JoinHandle<Result<Streaming<Message>, Status>>),
    Open(Streaming<Message>),
    Done,
}

struct GrpcFrameStream {
    sender: Option<mpsc::Sender<Message>>,
    inbound: Inbound,
    deadline: Deadline,
    health: Arc<HealthTracker>,
}

impl GrpcFrameStream {
    async fn ensure_open(&mut self) -> Result<(), GatewayError> {
        let Inbound::Opening(handle) = &mut self.inbound else {
            return Ok(());
        };
        let opened = self
            .deadline
            .run(async {
                match handle.await {
                    Ok(result) => result.map_err(classify),
                    Err(e) => Err(GatewayError::transport(format!("stream task failed: {e}"))),
                }
            })
            .await;
        self.health.record(&opened);
        match opened {
            Ok(streaming) => {
                self.inbound = Inbound::Open(streaming);
                Ok(())
            }
            Err(err) => {
                self.finish();
                Err(err)
            }
        }
    }

    fn finish(&mut self) {
        if let Inbound::Opening(handle) = std::mem::replace(&mut self.inbound, Inbound::Done) {
            handle.abort();
        }
    }

    /// The request side was closed under us; find out why from the response side.
    async fn terminal_error(&mut self) -> GatewayError {
        match FrameStream::recv(self).await {
            Err(err) => err,
            Ok(_) => GatewayError::transport("request stream closed by peer"),
        }
    }
}

#[tonic::async_trait]
impl FrameStream for GrpcFrameStream {
    async fn send(&mut self, frame: Message) -> Result<(), GatewayError> {
        let Some(sender) = self.sender.as_ref() else {
            return Err(GatewayError::transport("send side already closed"));
        };
        let sent = self
            .deadline
            .run(async {
                sender
                    .send(frame)
                    .await
                    .map_err(|_| GatewayError::transport("request stream closed by peer"))
            })
            .await;
        match sent {
            Err(GatewayError::Transport(_)) => {
                self.sender = None;
                Err(self.terminal_error().await)
            }
            other => other,
        }
    }

    async fn recv(&mut self) -> Result<Option<Message>, GatewayError> {
        self.ensure_open().await?;
        let Inbound::Open(streaming) = &mut self.inbound else {
            return Ok(None);
        };
        let result = self
            .deadline
            .run(async { streaming.message().await.map_err(classify) })
            .await;
        self.health.record(&result);
        if !matches!(result, Ok(Some(_))) {
            self.finish();
        }
        result
    }

    fn close_send(&mut self) {
        self.sender.take();
    }
}

impl Drop for GrpcFrameStream {
    fn drop(&mut self) {
        // Dropping an open `Streaming` resets the HTTP/2 stream; a pending
        // open has to be aborted explicitly.
        self.finish();
    }
}

async fn ready(grpc: &mut tonic::client::Grpc<Channel>) -> Result<(), GatewayError> {
    grpc.ready()
        .await
        .map_err(|e| GatewayError::transport(format!("channel not ready: {e}")))
}

fn outgoing_request<T>(call: &CallContext, message: T) -> Request<T> {
    let mut request = Request::new(message);
    request.set_timeout(call.deadline.remaining());
    apply_metadata(request.metadata_mut(), &call.metadata);
    request
}

fn apply_metadata(map: &mut MetadataMap, pairs: &[(String, String)]) {
    for (key, value) in pairs {
        // `AsciiMetadataValue` lets bytes above 0x7f through.
        let visible = value
            .bytes()
            .all(|b| b.is_ascii_graphic() || b == b' ' || b == b'\t');
        match (key.parse::<AsciiMetadataKey>(), value.parse::<AsciiMetadataValue>()) {
            (Ok(key), Ok(value)) if visible => {
                map.append(key, value);
            }
            _ => tracing::debug!(key = %key, "Skipping metadata entry that is not valid ASCII"),
        }
    }
}

/// Split tonic failures into transport errors and backend statuses.
pub(crate) fn classify(status: Status) -> GatewayError {
    match std::error::Error::source(&status) {
        Some(source) => GatewayError::Transport(format!("{}: {source}", status.message())),
        None => GatewayError::Rpc(status),
    }
}
