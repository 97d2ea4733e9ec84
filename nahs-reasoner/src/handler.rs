//! The per-protocol strategy a [`ProtocolReasoner`] dispatches to.

use crate::instantiate;
use crate::pattern::Pattern;
use crate::reasoner::ProtocolReasoner;
use async_trait::async_trait;
use nahs_protocol::{Action, Instance, Protocol, ProtocolKey, ReasonerError, Role, Roles, Values};
use std::sync::Arc;

/// Which side of a protocol an agent plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Initiator: the agent instantiates the protocol.
    Consumer,
    /// Responder: the agent accepts instances proposed by peers.
    Provider,
}

/// Business rules of one agent for one protocol.
///
/// The reasoner owns instance state and calls into the handler at fixed
/// points:
///
/// | Hook | When | Lock held |
/// |------|------|-----------|
/// | [`instantiate`](Self::instantiate) | local `Instantiate` | no |
/// | [`expected`](Self::expected), [`validate`](Self::validate) | before merging an update | yes |
/// | [`on_register`](Self::on_register) | after a proposal was accepted into the open set | no |
/// | [`on_update`](Self::on_update) | after an update was merged | no |
/// | [`on_drop`](Self::on_drop) | after an instance moved to the dropped set | no |
///
/// Hooks running without the lock may call back into the reasoner, e.g.
/// [`ProtocolReasoner::advance`] or [`ProtocolReasoner::negotiate`].
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    /// Protocol this handler serves.
    fn protocol(&self) -> ProtocolKey;

    /// Role the agent plays.
    fn role(&self) -> Role;

    /// Build a fresh instance. The default checks inputs in declaration
    /// order and generates the correlation identifier.
    fn instantiate(
        &self,
        protocol: &Arc<Protocol>,
        roles: Roles,
        inputs: &Values,
    ) -> Result<Instance, ReasonerError> {
        instantiate::instantiate(protocol, roles, inputs)
    }

    /// Action pattern accepted as the next update of `current`.
    fn expected(&self, _current: &Instance) -> Pattern {
        Pattern::Closed
    }

    /// Value-level checks on an update whose actions matched the pattern.
    fn validate(&self, _next: &Instance) -> Result<(), ReasonerError> {
        Ok(())
    }

    /// Acceptance logic for a proposal from a peer. An error drops the
    /// instance and notifies the counterparty.
    async fn on_register(
        &self,
        _reasoner: &ProtocolReasoner,
        _instance: Instance,
    ) -> Result<(), ReasonerError> {
        Ok(())
    }

    /// Continuation after a merged update. An error drops the instance and
    /// notifies the counterparty.
    async fn on_update(
        &self,
        _reasoner: &ProtocolReasoner,
        _instance: Instance,
        _actions: &[Action],
    ) -> Result<(), ReasonerError> {
        Ok(())
    }

    /// Cleanup after the instance was dropped, locally or by a peer.
    async fn on_drop(&self, _reasoner: &ProtocolReasoner, _instance: Instance, _motive: &str) {}
}
