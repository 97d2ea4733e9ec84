//! The Reasoner protocol — what one agent does with protocol instances.

use crate::error::ReasonerError;
use crate::event::Event;
use crate::id::{InstanceKey, ProtocolKey};
use crate::instance::{Instance, Roles, Values};
use crate::protocol::Protocol;
use async_trait::async_trait;

/// Per-agent owner of instance state and protocol business rules.
///
/// The transport calls the inbound side (`register_instance`,
/// `update_instance`, `drop_instance`) through [`Reasoner::handle_event`];
/// the agent itself calls `instantiate` when it initiates a protocol.
///
/// Implementations:
/// - `ProtocolReasoner`: handler registry with one handler per protocol
/// - test doubles that record inbound events
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Create and open a new instance of a protocol this agent initiates.
    async fn instantiate(
        &self,
        protocol: &Protocol,
        roles: Roles,
        inputs: Values,
    ) -> Result<Instance, ReasonerError>;

    /// Accept a brand-new instance proposed by a peer.
    async fn register_instance(&self, instance: Instance) -> Result<(), ReasonerError>;

    /// Advance an open instance to a newer version sent by a peer.
    async fn update_instance(&self, instance: Instance) -> Result<(), ReasonerError>;

    /// Move an open instance to the dropped set.
    async fn drop_instance(&self, key: &InstanceKey, motive: &str) -> Result<(), ReasonerError>;

    /// An open instance by key.
    async fn get_instance(&self, key: &InstanceKey) -> Option<Instance>;

    /// All open instances of a protocol, ordered by key.
    async fn instances(&self, protocol: &ProtocolKey) -> Vec<Instance>;

    /// Route an inbound event: `New` registers, `Update` updates, `Drop` drops.
    async fn handle_event(&self, event: Event) -> Result<(), ReasonerError> {
        match event {
            Event::New(instance) => self.register_instance(instance).await,
            Event::Update(instance) => self.update_instance(instance).await,
            Event::Drop { key, motive } => self.drop_instance(&key, &motive).await,
        }
    }
}
