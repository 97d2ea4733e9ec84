//! # nahs-protocol — contracts for agents negotiating shared protocols
//!
//! This crate defines what a per-agent reasoner needs from the world and
//! what the world may ask of a reasoner.
//!
//! ## The Contracts
//!
//! | Contract | Types | What it does |
//! |----------|-------|-------------|
//! | Schema | [`Protocol`], [`SchemaTable`] | Roles, directional parameters, actions |
//! | Instance | [`Instance`], [`Instance::diff`], [`Instance::merge`] | One run of a protocol |
//! | Events | [`Event`], [`EventKind`] | New / Update / Drop notifications |
//! | Reasoner | [`Reasoner`] | Instance lifecycle and business rules of one agent |
//! | Transport | [`Transport`], [`Service`] | Delivery and service discovery |
//!
//! ## Design Principle
//!
//! No agent needs global knowledge of the others. Everything a peer learns
//! arrives as a newer version of a shared instance, and the only question
//! a reasoner asks is whether that version is a valid next step from the
//! one it holds. [`Instance::diff`] answers the structural half of that
//! question; the business half belongs to the reasoner.

#![deny(missing_docs)]

pub mod error;
pub mod event;
pub mod id;
pub mod instance;
pub mod protocol;
pub mod reasoner;
pub mod transport;

#[cfg(feature = "test-utils")]
pub mod test_utils;

// Re-exports for convenience
pub use error::{CorrelationError, DiffError, ReasonerError, SchemaError, TransportError};
pub use event::{Event, EventKind};
pub use id::{AgentId, InstanceKey, ProtocolKey, Role};
pub use instance::{Instance, Roles, Values};
pub use protocol::{Action, ActionParameter, Direction, Parameter, Protocol, ProtocolBuilder, SchemaTable};
pub use reasoner::Reasoner;
pub use transport::{Service, Transport};
