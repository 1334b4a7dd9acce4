//! A single backend endpoint and its live connection.

use std::sync::Arc;

use crate::rpc::transport::{Connection, HealthState};

/// Cheap to clone; all clones share the same connection.
#[derive(Debug, Clone)]
pub struct Endpoint {
    connection: Arc<dyn Connection>,
}

impl Endpoint {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self { connection }
    }

    pub fn address(&self) -> &str {
        self.connection.address()
    }

    pub fn state(&self) -> HealthState {
        self.connection.state()
    }

    pub fn is_selectable(&self) -> bool {
        self.state().is_selectable()
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn close(&self) {
        self.connection.close();
    }
}
