#![deny(missing_docs)]
//! # nahs — umbrella crate
//!
//! One import surface for negotiating agents. Re-exports the protocol
//! contract, the reasoner and the bundled transports and agents behind
//! feature flags, plus a `prelude` for the common path.

#[cfg(feature = "bikes")]
pub use nahs_bikes as bikes;
#[cfg(feature = "net-local")]
pub use nahs_net_local as net_local;
#[cfg(feature = "core")]
pub use nahs_protocol as protocol;
#[cfg(feature = "core")]
pub use nahs_reasoner as reasoner;

/// Common imports for wiring agents together.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use nahs_protocol::{
        AgentId, Event, EventKind, Instance, InstanceKey, Protocol, ProtocolKey, Reasoner,
        ReasonerError, Role, Roles, SchemaTable, Service, Transport, Values,
    };

    #[cfg(feature = "core")]
    pub use nahs_reasoner::{
        Pattern, ProtocolHandler, ProtocolReasoner, ReasonerConfig, ResourcePool,
    };

    #[cfg(feature = "net-local")]
    pub use nahs_net_local::LocalNetwork;

    #[cfg(feature = "bikes")]
    pub use nahs_bikes::{
        Agent, Bike, BikesConfig, Coords, Person, Renter, Station, Transport as Carrier,
        University, protocols,
    };
}
