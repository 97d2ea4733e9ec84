use super::{Agent, enlist, new_id};
use crate::config::BikesConfig;
use crate::handlers::{Carrier, Jobs, RideRider};
use crate::station::Station;
use nahs_net_local::LocalNetwork;
use nahs_protocol::{InstanceKey, ReasonerError, SchemaTable};
use nahs_reasoner::ProtocolReasoner;
use std::sync::Arc;

/// A carrier moving bikes between stations on a schedule.
pub struct Transport {
    reasoner: ProtocolReasoner,
    jobs: Jobs,
}

impl Agent for Transport {
    fn reasoner(&self) -> &ProtocolReasoner {
        &self.reasoner
    }
}

impl Transport {
    /// Create a carrier serving `stations` and put it on `net`.
    pub async fn join(
        net: &Arc<LocalNetwork>,
        schema: &Arc<SchemaTable>,
        config: &BikesConfig,
        stations: Vec<Station>,
    ) -> Result<Self, ReasonerError> {
        let jobs = Jobs::default();
        let reasoner = ProtocolReasoner::builder(new_id(), Arc::clone(schema), net.clone())
            .config(config.reasoner.clone())
            .offer(Arc::new(Carrier::new(stations, config.transport.clone(), jobs.clone())))
            .consume(Arc::new(RideRider))
            .build()?;
        Ok(Self {
            reasoner: enlist(net, reasoner).await,
            jobs,
        })
    }

    /// Number of accepted transports not yet carried out.
    pub async fn scheduled(&self) -> usize {
        self.jobs.scheduled().await
    }

    /// Wait until the transport `key` has been carried out.
    pub async fn wait_for(&self, key: &InstanceKey) -> Result<(), ReasonerError> {
        self.jobs.wait_for(key).await
    }

    /// Abandon pending transports and stop sending.
    pub async fn shutdown(&self) {
        for key in self.jobs.cancel_all().await {
            tracing::info!(agent = self.id().short(), instance = %key, "nahs.transport.aborted");
        }
        self.reasoner.shutdown().await;
    }
}
