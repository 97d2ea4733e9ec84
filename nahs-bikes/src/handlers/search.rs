use super::parse;
use crate::coords::Coords;
use crate::protocols::keys;
use crate::station::{self, Station};
use async_trait::async_trait;
use nahs_protocol::{Action, Instance, ProtocolKey, ReasonerError, Role};
use nahs_reasoner::{Pattern, ProtocolHandler, ProtocolReasoner};

/// User side of StationSearch: hands the located station to the waiting
/// caller.
#[derive(Debug, Default)]
pub struct SearchClient;

#[async_trait]
impl ProtocolHandler for SearchClient {
    fn protocol(&self) -> ProtocolKey {
        keys::station_search()
    }

    fn role(&self) -> Role {
        Role::new("User")
    }

    fn expected(&self, current: &Instance) -> Pattern {
        match current.value("stationID") {
            None => Pattern::Single("locate"),
            Some(_) => Pattern::Closed,
        }
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

/// Locator side of StationSearch: answers with the nearest known station.
pub struct Locator {
    stations: Vec<Station>,
}

impl Locator {
    /// Search among `stations`. Ties go to the earliest one.
    pub fn new(stations: Vec<Station>) -> Self {
        Self { stations }
    }
}

#[async_trait]
impl ProtocolHandler for Locator {
    fn protocol(&self) -> ProtocolKey {
        keys::station_search()
    }

    fn role(&self) -> Role {
        Role::new("Locator")
    }

    async fn on_register(
        &self,
        reasoner: &ProtocolReasoner,
        mut instance: Instance,
    ) -> Result<(), ReasonerError> {
        let point: Coords = parse(&instance, "coordinates")?;
        let found = station::nearest(&self.stations, &point)
            .ok_or_else(|| ReasonerError::ResourceUnavailable("no stations known".into()))?;
        tracing::debug!(
            agent = reasoner.agent().short(),
            %point,
            station = found.id().short(),
            "nahs.search.located"
        );
        instance.set_value("stationID", found.id().as_str())?;
        reasoner.advance(instance).await?;
        Ok(())
    }
}
