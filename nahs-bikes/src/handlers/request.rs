use super::{parse, parse_datetime, request_transport};
use crate::protocols::{ACCEPT, REJECT, keys};
use crate::station::{self, Station};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nahs_protocol::{Action, Instance, ProtocolKey, ReasonerError, Role};
use nahs_reasoner::{Pattern, ProtocolHandler, ProtocolReasoner};

/// Requester side of BikeRequest.
#[derive(Debug, Default)]
pub struct RequestClient;

#[async_trait]
impl ProtocolHandler for RequestClient {
    fn protocol(&self) -> ProtocolKey {
        keys::bike_request()
    }

    fn role(&self) -> Role {
        Role::new("Requester")
    }

    fn expected(&self, current: &Instance) -> Pattern {
        match current.value("rID") {
            None => Pattern::Alternatives(ACCEPT, REJECT),
            Some(_) => Pattern::Closed,
        }
    }

    fn validate(&self, next: &Instance) -> Result<(), ReasonerError> {
        match next.get_value("rID") {
            ACCEPT | REJECT => {}
            other => return Err(ReasonerError::malformed("rID", other)),
        }
        parse::<usize>(next, "offerNum").map(|_| ())
    }

    async fn on_update(
        &self,
        reasoner: &ProtocolReasoner,
        instance: Instance,
        _actions: &[Action],
    ) -> Result<(), ReasonerError> {
        reasoner.reply(&instance).await
    }
}

/// Renter side of BikeRequest: brings bikes to the requested station by
/// hiring a carrier, and offers as many as the carrier will bring.
pub struct RequestProvider {
    stations: Vec<Station>,
}

impl RequestProvider {
    /// Serve requests for any of `stations`.
    pub fn new(stations: Vec<Station>) -> Self {
        Self { stations }
    }

    /// The station other than `target` with the most available bikes.
    async fn richest_other(&self, target: &Station) -> Option<(&Station, usize)> {
        let mut best: Option<(&Station, usize)> = None;
        for s in self.stations.iter().filter(|s| s.id() != target.id()) {
            let available = s.available().await;
            if best.is_none_or(|(_, most)| available > most) {
                best = Some((s, available));
            }
        }
        best
    }

    async fn arrange(
        &self,
        reasoner: &ProtocolReasoner,
        requested: usize,
        target: &Station,
        arrival: DateTime<Utc>,
    ) -> usize {
        let Some((source, available)) = self.richest_other(target).await else {
            return 0;
        };
        let quantity = requested.min(available);
        if quantity == 0 {
            return 0;
        }
        match request_transport(reasoner, quantity, source.id(), target.id(), arrival).await {
            Ok(answer) if answer.get_value("rID") == ACCEPT => quantity,
            Ok(answer) => {
                tracing::info!(agent = reasoner.agent().short(), instance = %answer.key(), "nahs.request.transport_rejected");
                0
            }
            Err(e) => {
                tracing::warn!(agent = reasoner.agent().short(), error = %e, "nahs.request.transport_failed");
                0
            }
        }
    }
}

#[async_trait]
impl ProtocolHandler for RequestProvider {
    fn protocol(&self) -> ProtocolKey {
        keys::bike_request()
    }

    fn role(&self) -> Role {
        Role::new("Renter")
    }

    async fn on_register(
        &self,
        reasoner: &ProtocolReasoner,
        instance: Instance,
    ) -> Result<(), ReasonerError> {
        let requested: usize = parse(&instance, "bikeNum")?;
        let arrival = parse_datetime(&instance, "datetime")?;
        let target = instance.get_value("station");
        let target = station::find(&self.stations, target)
            .ok_or_else(|| ReasonerError::malformed("station", target))?;

        let offered = self.arrange(reasoner, requested, target, arrival).await;
        let answer = if offered > 0 { ACCEPT } else { REJECT };
        tracing::info!(
            agent = reasoner.agent().short(),
            station = target.id().short(),
            requested,
            offered,
            answer,
            "nahs.request.answered"
        );

        let mut next = instance.clone();
        next.set_value("rID", answer)?;
        next.set_value("offerNum", offered.to_string())?;
        reasoner.advance(next).await?;
        Ok(())
    }
}
