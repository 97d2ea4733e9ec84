//! Reasoner configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default deadline for correlated replies.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Tunables for one [`ProtocolReasoner`](crate::ProtocolReasoner).
///
/// Constructed once and passed into the builder; nothing is read from the
/// environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonerConfig {
    /// How long [`negotiate`](crate::ProtocolReasoner::negotiate) waits for
    /// the counterparty. `None` waits until the instance is dropped.
    pub reply_timeout: Option<Duration>,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Some(DEFAULT_REPLY_TIMEOUT),
        }
    }
}

impl ReasonerConfig {
    /// Override the reply deadline.
    pub fn with_reply_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.reply_timeout = timeout;
        self
    }
}
