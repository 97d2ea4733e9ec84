//! The Transport protocol — delivery of events and service discovery.

use crate::error::TransportError;
use crate::event::Event;
use crate::id::{AgentId, ProtocolKey, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Peer transport and discovery, as seen by a reasoner.
///
/// Implementations:
/// - LocalNetwork: in-process peers, direct calls
/// - libp2p or HTTP backends: same contract, real wire
///
/// `send` resolves once the target reasoner has handled the event (or the
/// transport gave up). Reasoners never await it inline: outbound sends are
/// submitted to a dispatcher so they cannot block instance-state mutation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `event` from `from` to `to`.
    async fn send(&self, from: &AgentId, to: &AgentId, event: Event) -> Result<(), TransportError>;

    /// Identities offering `role` for `protocol`, in advertisement order.
    async fn providers(&self, protocol: &ProtocolKey, role: &Role) -> Vec<AgentId>;

    /// Announce that `agent` is willing to play `service`.
    async fn advertise(&self, agent: &AgentId, service: Service);
}

/// A (protocol, roles) pair an agent is willing to play.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Protocol key.
    pub protocol: ProtocolKey,
    /// Roles played.
    pub roles: Vec<Role>,
}

impl Service {
    /// Create a new service description.
    pub fn new(protocol: ProtocolKey, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            protocol,
            roles: roles.into_iter().collect(),
        }
    }

    /// Whether this service covers `role` of `protocol`.
    pub fn offers(&self, protocol: &ProtocolKey, role: &Role) -> bool {
        &self.protocol == protocol && self.roles.contains(role)
    }
}
