//! Outbound event dispatch.

use nahs_protocol::{AgentId, Event, Transport};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::task::TaskTracker;

/// Fire-and-forget delivery of outbound events.
///
/// Each peer gets one lane: a tracked task that delivers that peer's events
/// in submission order. Submitting never waits for delivery, and a failed
/// delivery is logged, never reported back to the submitter.
pub struct Dispatcher {
    agent: AgentId,
    transport: Arc<dyn Transport>,
    tracker: TaskTracker,
    lanes: Mutex<Option<HashMap<AgentId, mpsc::UnboundedSender<Event>>>>,
}

impl Dispatcher {
    /// Create a dispatcher sending on behalf of `agent`.
    pub fn new(agent: AgentId, transport: Arc<dyn Transport>) -> Self {
        Self {
            agent,
            transport,
            tracker: TaskTracker::new(),
            lanes: Mutex::new(Some(HashMap::new())),
        }
    }

    /// Queue `event` for `to`. Returns `false` once the dispatcher is shut
    /// down.
    pub async fn submit(&self, to: AgentId, event: Event) -> bool {
        let mut guard = self.lanes.lock().await;
        let Some(lanes) = guard.as_mut() else {
            tracing::warn!(
                agent = self.agent.short(),
                to = to.short(),
                kind = %event.kind(),
                "nahs.dispatch.closed"
            );
            return false;
        };
        let lane = lanes
            .entry(to.clone())
            .or_insert_with(|| self.open_lane(to.clone()));
        if let Err(mpsc::error::SendError(event)) = lane.send(event) {
            // The lane task is gone; start a fresh one.
            let lane = self.open_lane(to.clone());
            let delivered = lane.send(event).is_ok();
            lanes.insert(to, lane);
            return delivered;
        }
        true
    }

    fn open_lane(&self, to: AgentId) -> mpsc::UnboundedSender<Event> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let from = self.agent.clone();
        let transport = Arc::clone(&self.transport);
        self.tracker.spawn(async move {
            while let Some(event) = rx.recv().await {
                let kind = event.kind();
                let instance = event.instance_key();
                match transport.send(&from, &to, event).await {
                    Ok(()) => tracing::debug!(
                        agent = from.short(),
                        to = to.short(),
                        %kind,
                        %instance,
                        "nahs.dispatch.sent"
                    ),
                    Err(e) => tracing::warn!(
                        agent = from.short(),
                        to = to.short(),
                        %kind,
                        %instance,
                        error = %e,
                        "nahs.dispatch.failed"
                    ),
                }
            }
        });
        tx
    }

    /// Stop accepting events and wait until every queued one was handed to
    /// the transport.
    pub async fn shutdown(&self) {
        let lanes = self.lanes.lock().await.take();
        drop(lanes);
        self.tracker.close();
        self.tracker.wait().await;
    }
}
