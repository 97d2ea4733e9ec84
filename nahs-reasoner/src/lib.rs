#![deny(missing_docs)]
//! Per-agent protocol reasoner for nahs.
//!
//! [`ProtocolReasoner`] implements [`nahs_protocol::Reasoner`] on top of:
//!
//! - an instance book (open and dropped sets) behind one lock,
//! - a [`CorrelationRegistry`] that turns an asynchronous reply into the
//!   return value of [`ProtocolReasoner::negotiate`],
//! - a registry of [`ProtocolHandler`]s, one per protocol, holding the
//!   agent's business rules,
//! - a [`Dispatcher`] that delivers outbound events without blocking state
//!   mutation.
//!
//! [`ResourcePool`] is the exclusive-reservation inventory handlers use for
//! scarce physical resources.

pub mod config;
pub mod correlation;
pub mod dispatcher;
pub mod handler;
pub mod instantiate;
pub mod pattern;
pub mod pool;
pub mod reasoner;

pub use config::ReasonerConfig;
pub use correlation::{CorrelationRegistry, Waiter};
pub use dispatcher::Dispatcher;
pub use handler::{ProtocolHandler, Side};
pub use pattern::Pattern;
pub use pool::ResourcePool;
pub use reasoner::{ProtocolReasoner, ProtocolReasonerBuilder};
