//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::{endpoint::Endpoint, LoadBalancer};

/// Candidate scans per endpoint before giving up.
const SCAN_ROUNDS: usize = 3;

/// Round-robin selector.
/// Stores an internal cursor to rotate through endpoints.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_endpoint(&self, endpoints: &[Endpoint]) -> Option<Endpoint> {
        match endpoints.len() {
            0 => None,
            // Single endpoint: no rotation, health still applies.
            1 => Some(&endpoints[0])
                .filter(|endpoint| endpoint.is_selectable())
                .cloned(),
            len => {
                for _ in 0..SCAN_ROUNDS * len {
                    let index = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
                    let endpoint = &endpoints[index];
                    if endpoint.is_selectable() {
                        return Some(endpoint.clone());
                    }
                }
                None
            }
        }
    }
}
