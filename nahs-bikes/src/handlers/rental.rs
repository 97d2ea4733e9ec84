use super::{ActiveRide, parse, start_ride};
use crate::config::{PersonConfig, RenterConfig};
use crate::protocols::{ACCEPT, REJECT, keys};
use crate::station::{self, Station};
use async_trait::async_trait;
use nahs_protocol::{Action, AgentId, Instance, ProtocolKey, ReasonerError, Role};
use nahs_reasoner::{Pattern, ProtocolHandler, ProtocolReasoner};
use rand::seq::SliceRandom;
use rust_decimal::Decimal;

/// Client side of BikeRental: takes an offer when the price is right.
pub struct RentalClient {
    config: PersonConfig,
    ride: ActiveRide,
}

impl RentalClient {
    /// Judge offers by `config`; rides started on acceptance land in `ride`.
    pub fn new(config: PersonConfig, ride: ActiveRide) -> Self {
        Self { config, ride }
    }
}

#[async_trait]
impl ProtocolHandler for RentalClient {
    fn protocol(&self) -> ProtocolKey {
        keys::bike_rental()
    }

    fn role(&self) -> Role {
        Role::new("Client")
    }

    fn expected(&self, current: &Instance) -> Pattern {
        match current.value("price") {
            None => Pattern::Single("offer"),
            Some(_) => Pattern::Closed,
        }
    }

    async fn on_update(
        &self,
        reasoner: &ProtocolReasoner,
        instance: Instance,
        _actions: &[Action],
    ) -> Result<(), ReasonerError> {
        let price: Decimal = parse(&instance, "price")?;
        let bike = instance.get_value("bikeID");
        if bike.is_empty() {
            return Err(ReasonerError::malformed("bikeID", bike));
        }
        let bike = AgentId::new(bike);

        let answer = if price <= self.config.max_price {
            ACCEPT
        } else {
            REJECT
        };
        tracing::info!(
            agent = reasoner.agent().short(),
            bike = bike.short(),
            %price,
            max_price = %self.config.max_price,
            answer,
            "nahs.rental.answered"
        );
        let mut next = instance.clone();
        next.set_value("rID", answer)?;
        let answered = reasoner.advance(next).await?;

        if answer == ACCEPT && self.config.auto_pickup {
            match start_ride(reasoner, &bike, instance.get_value("ID")).await {
                Ok(ride) => *self.ride.lock().await = Some(ride),
                Err(e) => {
                    tracing::warn!(agent = reasoner.agent().short(), bike = bike.short(), error = %e, "nahs.ride.start_failed")
                }
            }
        }

        if let Err(e) = reasoner.reply(&answered).await {
            tracing::debug!(instance = %answered.key(), error = %e, "nahs.rental.unawaited");
        }
        Ok(())
    }
}

/// Renter side of BikeRental: reserves a bike at the origin station and
/// quotes a price for it.
pub struct RentalProvider {
    stations: Vec<Station>,
    config: RenterConfig,
}

impl RentalProvider {
    /// Rent bikes from `stations` at the prices in `config`.
    pub fn new(stations: Vec<Station>, config: RenterConfig) -> Self {
        Self { stations, config }
    }

    fn quote(&self) -> Option<Decimal> {
        self.config.prices.choose(&mut rand::thread_rng()).copied()
    }

    fn origin(&self, instance: &Instance) -> Result<&Station, ReasonerError> {
        let origin = instance.get_value("origin");
        station::find(&self.stations, origin).ok_or_else(|| ReasonerError::malformed("origin", origin))
    }
}

#[async_trait]
impl ProtocolHandler for RentalProvider {
    fn protocol(&self) -> ProtocolKey {
        keys::bike_rental()
    }

    fn role(&self) -> Role {
        Role::new("Renter")
    }

    fn expected(&self, current: &Instance) -> Pattern {
        match (current.value("price"), current.value("rID")) {
            (Some(_), None) => Pattern::Alternatives(ACCEPT, REJECT),
            _ => Pattern::Closed,
        }
    }

    fn validate(&self, next: &Instance) -> Result<(), ReasonerError> {
        match next.get_value("rID") {
            ACCEPT | REJECT => Ok(()),
            other => Err(ReasonerError::malformed("rID", other)),
        }
    }

    async fn on_register(
        &self,
        reasoner: &ProtocolReasoner,
        instance: Instance,
    ) -> Result<(), ReasonerError> {
        let station = self.origin(&instance)?;
        let price = self
            .quote()
            .ok_or_else(|| ReasonerError::ResourceUnavailable("no price list".into()))?;
        let bike = station.reserve().await.ok_or_else(|| {
            ReasonerError::ResourceUnavailable(format!("no bikes at station {}", station.id()))
        })?;

        let offered: Result<Instance, ReasonerError> = async {
            let mut next = instance.clone();
            next.set_value("price", price.to_string())?;
            next.set_value("bikeID", bike.as_str())?;
            reasoner.advance(next).await
        }
        .await;
        if let Err(e) = offered {
            station.dock_bike(&bike).await;
            return Err(e);
        }
        tracing::info!(
            agent = reasoner.agent().short(),
            station = station.id().short(),
            bike = bike.short(),
            %price,
            "nahs.rental.offered"
        );
        Ok(())
    }

    async fn on_update(
        &self,
        reasoner: &ProtocolReasoner,
        instance: Instance,
        _actions: &[Action],
    ) -> Result<(), ReasonerError> {
        let station = self.origin(&instance)?;
        let bike = AgentId::new(instance.get_value("bikeID"));
        if instance.get_value("rID") == ACCEPT {
            station.release(&bike).await;
            tracing::info!(agent = reasoner.agent().short(), bike = bike.short(), "nahs.rental.accepted");
        } else {
            station.dock_bike(&bike).await;
            tracing::info!(agent = reasoner.agent().short(), bike = bike.short(), "nahs.rental.rejected");
        }
        Ok(())
    }

    async fn on_drop(&self, reasoner: &ProtocolReasoner, instance: Instance, motive: &str) {
        let (Some(bike), None) = (instance.value("bikeID"), instance.value("rID")) else {
            return;
        };
        if let Ok(station) = self.origin(&instance) {
            station.dock_bike(&AgentId::new(bike)).await;
            tracing::info!(agent = reasoner.agent().short(), bike = bike, motive, "nahs.rental.returned");
        }
    }
}
