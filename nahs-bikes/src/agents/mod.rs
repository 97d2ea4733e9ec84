//! Agent facades: one reasoner each, plus the calls a driver makes.

mod bike;
mod person;
mod renter;
mod transport;
mod university;

pub use bike::Bike;
pub use person::{Person, Rental, Trip};
pub use renter::Renter;
pub use transport::Transport;
pub use university::{BikeOffer, University};

use nahs_net_local::LocalNetwork;
use nahs_protocol::AgentId;
use nahs_reasoner::ProtocolReasoner;
use std::sync::Arc;

/// Anything with a seat on the network.
pub trait Agent {
    /// Identity on the network.
    fn id(&self) -> &AgentId {
        self.reasoner().agent()
    }

    /// The reasoner negotiating for this agent.
    fn reasoner(&self) -> &ProtocolReasoner;
}

/// Fresh agent identity.
pub(crate) fn new_id() -> AgentId {
    AgentId::new(uuid::Uuid::new_v4().to_string())
}

/// Put `reasoner` on `net` and advertise what it offers.
pub(crate) async fn enlist(net: &Arc<LocalNetwork>, reasoner: ProtocolReasoner) -> ProtocolReasoner {
    net.join(reasoner.agent().clone(), Arc::new(reasoner.clone()))
        .await;
    reasoner.advertise().await;
    tracing::debug!(
        agent = reasoner.agent().short(),
        offered = ?reasoner.offered(),
        consumed = ?reasoner.consumed(),
        "nahs.agent.joined"
    );
    reasoner
}
