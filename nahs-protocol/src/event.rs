//! Events exchanged between peers about protocol instances.

use crate::id::InstanceKey;
use crate::instance::Instance;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of an event, as routed by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A brand-new instance proposal.
    New,
    /// A newer version of an instance.
    Update,
    /// The sender dropped the instance.
    Drop,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => f.write_str("new"),
            Self::Update => f.write_str("update"),
            Self::Drop => f.write_str("drop"),
        }
    }
}

/// An event about one instance. The wire encoding is the transport's
/// concern; in-process transports hand the value over as is.
#[derive(Debug, Clone)]
pub enum Event {
    /// Propose a new instance. Routed to `register_instance`.
    New(Instance),
    /// Send a newer version. Routed to `update_instance`.
    Update(Instance),
    /// Announce that the sender dropped the instance. Routed to `drop_instance`.
    Drop {
        /// Instance being dropped.
        key: InstanceKey,
        /// Human-readable motive.
        motive: String,
    },
}

impl Event {
    /// Build a drop event.
    pub fn dropped(key: InstanceKey, motive: impl Into<String>) -> Self {
        Self::Drop {
            key,
            motive: motive.into(),
        }
    }

    /// The event kind.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::New(_) => EventKind::New,
            Self::Update(_) => EventKind::Update,
            Self::Drop { .. } => EventKind::Drop,
        }
    }

    /// Key of the instance the event is about.
    pub fn instance_key(&self) -> InstanceKey {
        match self {
            Self::New(i) | Self::Update(i) => i.key(),
            Self::Drop { key, .. } => key.clone(),
        }
    }

    /// The instance payload, if the event carries one.
    pub fn instance(&self) -> Option<&Instance> {
        match self {
            Self::New(i) | Self::Update(i) => Some(i),
            Self::Drop { .. } => None,
        }
    }
}
