use super::{Agent, enlist, new_id};
use crate::config::BikesConfig;
use crate::handlers::{self, Locator, RentalProvider, RequestProvider, TransportRequester};
use crate::station::Station;
use chrono::{DateTime, Utc};
use nahs_net_local::LocalNetwork;
use nahs_protocol::{AgentId, Instance, ReasonerError, SchemaTable};
use nahs_reasoner::ProtocolReasoner;
use std::sync::Arc;

/// Runs a set of stations: rents their bikes, points people to them and
/// keeps them stocked.
pub struct Renter {
    reasoner: ProtocolReasoner,
    stations: Vec<Station>,
}

impl Agent for Renter {
    fn reasoner(&self) -> &ProtocolReasoner {
        &self.reasoner
    }
}

impl Renter {
    /// Create a renter for `stations` and put it on `net`.
    pub async fn join(
        net: &Arc<LocalNetwork>,
        schema: &Arc<SchemaTable>,
        config: &BikesConfig,
        stations: Vec<Station>,
    ) -> Result<Self, ReasonerError> {
        let reasoner = ProtocolReasoner::builder(new_id(), Arc::clone(schema), net.clone())
            .config(config.reasoner.clone())
            .offer(Arc::new(RentalProvider::new(stations.clone(), config.renter.clone())))
            .offer(Arc::new(Locator::new(stations.clone())))
            .offer(Arc::new(RequestProvider::new(stations.clone())))
            .consume(Arc::new(TransportRequester))
            .build()?;
        Ok(Self {
            reasoner: enlist(net, reasoner).await,
            stations,
        })
    }

    /// Stations under this renter, in search order.
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Hire a carrier to move `bikes` bikes from `src` to `dst` by
    /// `arrival`. Returns once the carrier has answered.
    pub async fn request_transport(
        &self,
        bikes: usize,
        src: &AgentId,
        dst: &AgentId,
        arrival: DateTime<Utc>,
    ) -> Result<Instance, ReasonerError> {
        handlers::request_transport(&self.reasoner, bikes, src, dst, arrival).await
    }
}
