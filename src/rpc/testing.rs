//! In-process fakes for unit tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::GatewayError;
use crate::rpc::proto::Message;
use crate::rpc::transport::{
    AtomicHealth, CallContext, Connection, Connector, FrameStream, HealthState,
};

#[derive(Debug)]
pub(crate) struct FakeConnection {
    pub address: String,
    pub health: AtomicHealth,
    pub calls: AtomicUsize,
}

impl FakeConnection {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            health: AtomicHealth::new(HealthState::Ready),
            calls: AtomicUsize::new(0),
        }
    }
}

#[tonic::async_trait]
impl Connection for FakeConnection {
    fn address(&self) -> &str {
        &self.address
    }

    fn state(&self) -> HealthState {
        self.health.load()
    }

    async fn invoke(&self, _call: &CallContext, request: Message) -> Result<Message, GatewayError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(request)
    }

    async fn open_stream(&self, _call: &CallContext) -> Result<Box<dyn FrameStream>, GatewayError> {
        Err(GatewayError::transport("streams are not supported by the fake"))
    }

    fn close(&self) {
        self.health.store(HealthState::Shutdown);
    }
}

/// Dials [`FakeConnection`]s; addresses in `unreachable` fail to dial.
#[derive(Default)]
pub(crate) struct FakeConnector {
    pub unreachable: HashSet<String>,
    pub dialed: Mutex<Vec<Arc<FakeConnection>>>,
}

impl FakeConnector {
    pub fn unreachable(addresses: &[&str]) -> Self {
        Self {
            unreachable: addresses.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn dial_count(&self) -> usize {
        self.dialed.lock().unwrap().len()
    }

    pub fn connection(&self, address: &str) -> Arc<FakeConnection> {
        self.dialed
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.address == address)
            .cloned()
            .unwrap()
    }
}

#[tonic::async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        address: &str,
        _timeout: Duration,
    ) -> Result<Arc<dyn Connection>, GatewayError> {
        if self.unreachable.contains(address) {
            return Err(GatewayError::transport(format!("dial {address}: connection refused")));
        }
        let conn = Arc::new(FakeConnection::new(address));
        self.dialed.lock().unwrap().push(conn.clone());
        Ok(conn)
    }
}

/// Stream that records sent frames and replays scripted replies.
#[derive(Default)]
pub(crate) struct ScriptedStream {
    pub sent: Arc<Mutex<Vec<Message>>>,
    pub half_closed: Arc<AtomicBool>,
    /// Set once the stream is dropped, i.e. the call is cancelled.
    pub dropped: Arc<AtomicBool>,
    pub replies: VecDeque<Result<Option<Message>, GatewayError>>,
}

impl ScriptedStream {
    pub fn replying(replies: Vec<Result<Option<Message>, GatewayError>>) -> Self {
        let mut stream = Self::default();
        stream.replies = replies.into();
        stream
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

#[tonic::async_trait]
impl FrameStream for ScriptedStream {
    async fn send(&mut self, frame: Message) -> Result<(), GatewayError> {
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Message>, GatewayError> {
        self.replies.pop_front().unwrap_or(Ok(None))
    }

    fn close_send(&mut self) {
        self.half_closed.store(true, Ordering::SeqCst);
    }
}
