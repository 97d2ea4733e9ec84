use super::{Agent, enlist, new_id};
use crate::config::BikesConfig;
use crate::handlers::{self, RequestClient};
use crate::protocols::{ACCEPT, keys};
use crate::station::Station;
use chrono::{DateTime, Utc};
use nahs_net_local::LocalNetwork;
use nahs_protocol::{AgentId, Instance, ReasonerError, Role, Roles, SchemaTable, Values};
use nahs_reasoner::ProtocolReasoner;
use std::sync::Arc;

/// A renter's answer to a bike request.
#[derive(Debug, Clone)]
pub struct BikeOffer {
    /// Whether any bikes are coming.
    pub accepted: bool,
    /// How many.
    pub bikes: usize,
    /// The answered instance.
    pub instance: Instance,
}

/// An institution that wants bikes at its nearest station for events.
pub struct University {
    reasoner: ProtocolReasoner,
    station: AgentId,
}

impl Agent for University {
    fn reasoner(&self) -> &ProtocolReasoner {
        &self.reasoner
    }
}

impl University {
    /// Create a university served by `nearest` and put it on `net`.
    pub async fn join(
        net: &Arc<LocalNetwork>,
        schema: &Arc<SchemaTable>,
        config: &BikesConfig,
        nearest: &Station,
    ) -> Result<Self, ReasonerError> {
        let reasoner = ProtocolReasoner::builder(new_id(), Arc::clone(schema), net.clone())
            .config(config.reasoner.clone())
            .consume(Arc::new(RequestClient))
            .build()?;
        Ok(Self {
            reasoner: enlist(net, reasoner).await,
            station: nearest.id().clone(),
        })
    }

    /// Station bikes are requested for.
    pub fn station(&self) -> &AgentId {
        &self.station
    }

    /// Ask a renter for `bikes` bikes at the university's station by
    /// `arrival`.
    pub async fn request_bikes(
        &self,
        bikes: usize,
        arrival: DateTime<Utc>,
    ) -> Result<BikeOffer, ReasonerError> {
        let protocol = keys::bike_request();
        let renter = self.reasoner.find_provider(&protocol, "Renter").await?;
        let roles = Roles::from([
            (Role::new("Requester"), self.id().clone()),
            (Role::new("Renter"), renter),
        ]);
        let inputs = Values::from([
            ("bikeNum".to_owned(), bikes.to_string()),
            ("datetime".to_owned(), arrival.to_rfc3339()),
            ("station".to_owned(), self.station.to_string()),
        ]);
        let instance = self.reasoner.negotiate(&protocol, roles, inputs).await?;
        let offer = BikeOffer {
            accepted: instance.get_value("rID") == ACCEPT,
            bikes: handlers::parse(&instance, "offerNum")?,
            instance,
        };
        tracing::info!(
            agent = self.id().short(),
            requested = bikes,
            offered = offer.bikes,
            accepted = offer.accepted,
            "nahs.university.answered"
        );
        Ok(offer)
    }
}
