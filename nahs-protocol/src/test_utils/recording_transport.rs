//! RecordingTransport — records every outbound event for inspection.

use crate::error::TransportError;
use crate::event::Event;
use crate::id::{AgentId, ProtocolKey, Role};
use crate::transport::{Service, Transport};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// An event captured by [`RecordingTransport`].
#[derive(Debug, Clone)]
pub struct SentEvent {
    /// Sender.
    pub from: AgentId,
    /// Target.
    pub to: AgentId,
    /// The event itself.
    pub event: Event,
}

/// A transport that delivers nothing and records everything.
/// Use `.sent()` to inspect what reasoners tried to send.
pub struct RecordingTransport {
    sent: Mutex<Vec<SentEvent>>,
    services: Mutex<Vec<(AgentId, Service)>>,
    reject_sends: bool,
}

impl RecordingTransport {
    /// Create a transport that accepts every send.
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            services: Mutex::new(Vec::new()),
            reject_sends: false,
        }
    }

    /// Create a transport whose sends all fail after being recorded.
    pub fn failing() -> Self {
        Self {
            reject_sends: true,
            ..Self::new()
        }
    }

    /// Snapshot of every recorded send, in order.
    pub async fn sent(&self) -> Vec<SentEvent> {
        self.sent.lock().await.clone()
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, from: &AgentId, to: &AgentId, event: Event) -> Result<(), TransportError> {
        self.sent.lock().await.push(SentEvent {
            from: from.clone(),
            to: to.clone(),
            event,
        });
        if self.reject_sends {
            return Err(TransportError::SendFailed(format!("{to} unreachable")));
        }
        Ok(())
    }

    async fn providers(&self, protocol: &ProtocolKey, role: &Role) -> Vec<AgentId> {
        self.services
            .lock()
            .await
            .iter()
            .filter(|(_, s)| s.offers(protocol, role))
            .map(|(agent, _)| agent.clone())
            .collect()
    }

    async fn advertise(&self, agent: &AgentId, service: Service) {
        self.services.lock().await.push((agent.clone(), service));
    }
}
