//! Connection pool management.
//!
//! # Responsibilities
//! - Own the endpoint set and its live connections
//! - Replace the whole set when the address list changes
//! - Hand out one connection per call via the load balancer

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::error::GatewayError;
use crate::load_balancer::{endpoint::Endpoint, round_robin::RoundRobin, LoadBalancer};
use crate::rpc::transport::{Connector, HealthState};

/// One generation of endpoints. Never mutated after construction.
#[derive(Debug, Default)]
struct EndpointSet {
    /// Addresses as configured, including ones that failed to dial.
    addresses: Vec<String>,
    /// Endpoints whose dial succeeded, in address order.
    endpoints: Vec<Endpoint>,
    balancer: RoundRobin,
}

impl EndpointSet {
    fn close_all(&self) {
        for endpoint in &self.endpoints {
            endpoint.close();
        }
    }
}

/// Round-robin pool over the configured backend endpoints.
pub struct ConnectionPool {
    connector: Arc<dyn Connector>,
    dial_timeout: Duration,
    /// Serializes updates so two pushes never dial concurrently.
    update_lock: tokio::sync::Mutex<()>,
    current: RwLock<Arc<EndpointSet>>,
}

impl ConnectionPool {
    /// Create an empty pool. Nothing is dialed until [`Self::update_endpoints`].
    pub fn new(connector: Arc<dyn Connector>, dial_timeout: Duration) -> Self {
        Self {
            connector,
            dial_timeout,
            update_lock: tokio::sync::Mutex::new(()),
            current: RwLock::new(Arc::new(EndpointSet::default())),
        }
    }

    fn snapshot(&self) -> Arc<EndpointSet> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, next: EndpointSet) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }

    /// Reconcile the pool with `addresses`.
    ///
    /// Returns false for an empty list (the pool is emptied). An identical
    /// list is a no-op returning true. Otherwise returns whether at least one
    /// endpoint connected.
    pub async fn update_endpoints(&self, addresses: &[String]) -> bool {
        let _guard = self.update_lock.lock().await;
        let previous = self.snapshot();

        if addresses.is_empty() {
            self.replace(EndpointSet::default());
            previous.close_all();
            tracing::info!(
                closed = previous.endpoints.len(),
                "Endpoint list is empty, pool deprovisioned"
            );
            return false;
        }

        if previous.addresses == addresses {
            tracing::debug!(count = addresses.len(), "Endpoint list unchanged");
            return true;
        }

        // Old connections go first; in-flight calls on them may fail.
        previous.close_all();

        let mut endpoints = Vec::with_capacity(addresses.len());
        for address in addresses {
            match self.connector.connect(address, self.dial_timeout).await {
                Ok(connection) => {
                    tracing::debug!(address = %address, "Endpoint connected");
                    endpoints.push(Endpoint::new(connection));
                }
                Err(err) => {
                    tracing::warn!(address = %address, error = %err, "Failed to dial endpoint");
                }
            }
        }

        let connected = endpoints.len();
        self.replace(EndpointSet {
            addresses: addresses.to_vec(),
            endpoints,
            balancer: RoundRobin::new(),
        });
        tracing::info!(
            configured = addresses.len(),
            connected,
            "Endpoint set replaced"
        );
        connected > 0
    }

    /// Pick an endpoint for one call.
    pub fn acquire(&self) -> Result<Endpoint, GatewayError> {
        let set = self.snapshot();
        if set.addresses.is_empty() {
            return Err(GatewayError::NoEndpoints);
        }
        set.balancer
            .next_endpoint(&set.endpoints)
            .ok_or(GatewayError::NoActiveEndpoint)
    }

    /// Configured addresses, in order.
    pub fn addresses(&self) -> Vec<String> {
        self.snapshot().addresses.clone()
    }

    /// Health per configured address. Addresses that failed to dial are UNKNOWN.
    pub fn statuses(&self) -> BTreeMap<String, HealthState> {
        let set = self.snapshot();
        let mut statuses: BTreeMap<String, HealthState> = set
            .addresses
            .iter()
            .map(|address| (address.clone(), HealthState::Unknown))
            .collect();
        for endpoint in &set.endpoints {
            statuses.insert(endpoint.address().to_string(), endpoint.state());
        }
        statuses
    }

    /// Close every connection; used at shutdown.
    pub fn close_all(&self) {
        self.snapshot().close_all();
    }
}
