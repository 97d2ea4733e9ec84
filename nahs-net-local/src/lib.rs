#![deny(missing_docs)]
//! In-process implementation of nahs-protocol's Transport trait.
//!
//! Delivers events to joined peers via `HashMap<AgentId, Arc<dyn Reasoner>>`.
//! A send completes once the target reasoner has handled the event. No
//! encoding, no durability: suitable for tests, demos and single-process
//! simulations.

use async_trait::async_trait;
use nahs_protocol::{AgentId, Event, ProtocolKey, Reasoner, Role, Service, Transport, TransportError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-process network of reasoners.
///
/// Peers hold the network as their transport and the network holds the
/// peers, so a peer stays alive until it [`leave`](LocalNetwork::leave)s.
pub struct LocalNetwork {
    peers: RwLock<HashMap<AgentId, Arc<dyn Reasoner>>>,
    services: RwLock<Vec<(AgentId, Service)>>,
}

impl LocalNetwork {
    /// Create a new empty network.
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            services: RwLock::new(Vec::new()),
        }
    }

    /// Make `reasoner` reachable as `id`. Replaces an earlier peer with the
    /// same id.
    pub async fn join(&self, id: AgentId, reasoner: Arc<dyn Reasoner>) {
        tracing::debug!(peer = id.short(), "nahs.net.join");
        self.peers.write().await.insert(id, reasoner);
    }

    /// Remove a peer and its advertisements. Returns whether it was joined.
    pub async fn leave(&self, id: &AgentId) -> bool {
        self.services.write().await.retain(|(agent, _)| agent != id);
        self.peers.write().await.remove(id).is_some()
    }

    /// Whether `id` is joined.
    pub async fn contains(&self, id: &AgentId) -> bool {
        self.peers.read().await.contains_key(id)
    }

    /// Joined peers, in no particular order.
    pub async fn peers(&self) -> Vec<AgentId> {
        self.peers.read().await.keys().cloned().collect()
    }
}

impl Default for LocalNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for LocalNetwork {
    async fn send(&self, from: &AgentId, to: &AgentId, event: Event) -> Result<(), TransportError> {
        // Release the map before calling in: the target may send right back.
        let peer = self
            .peers
            .read()
            .await
            .get(to)
            .cloned()
            .ok_or_else(|| TransportError::PeerNotFound(to.to_string()))?;
        tracing::trace!(from = from.short(), to = to.short(), kind = %event.kind(), "nahs.net.deliver");
        peer.handle_event(event)
            .await
            .map_err(|e| TransportError::Rejected {
                peer: to.to_string(),
                reason: e.to_string(),
            })
    }

    async fn providers(&self, protocol: &ProtocolKey, role: &Role) -> Vec<AgentId> {
        let peers = self.peers.read().await;
        self.services
            .read()
            .await
            .iter()
            .filter(|(agent, s)| s.offers(protocol, role) && peers.contains_key(agent))
            .map(|(agent, _)| agent.clone())
            .collect()
    }

    async fn advertise(&self, agent: &AgentId, service: Service) {
        let mut services = self.services.write().await;
        if !services.iter().any(|(a, s)| a == agent && s == &service) {
            services.push((agent.clone(), service));
        }
    }
}
