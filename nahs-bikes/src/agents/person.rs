use super::{Agent, enlist, new_id};
use crate::config::BikesConfig;
use crate::coords::Coords;
use crate::handlers::{self, ActiveRide, RentalClient, RideRider, SearchClient};
use crate::protocols::{ACCEPT, keys};
use nahs_net_local::LocalNetwork;
use nahs_protocol::{AgentId, Instance, ReasonerError, Role, Roles, SchemaTable, Values};
use nahs_reasoner::ProtocolReasoner;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Outcome of a rental negotiation.
#[derive(Debug, Clone)]
pub struct Rental {
    /// Whether the offer was taken.
    pub accepted: bool,
    /// The rented bike. `None` when the offer was turned down.
    pub bike: Option<AgentId>,
    /// Quoted price.
    pub price: Decimal,
    /// The answered instance.
    pub instance: Instance,
}

/// A completed trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    /// Station the bike was taken from.
    pub origin: AgentId,
    /// Station the bike was left at.
    pub destination: AgentId,
    /// The bike ridden.
    pub bike: AgentId,
    /// Price paid.
    pub price: Decimal,
}

/// Someone who rents bikes to get around.
pub struct Person {
    reasoner: ProtocolReasoner,
    ride: ActiveRide,
}

impl Agent for Person {
    fn reasoner(&self) -> &ProtocolReasoner {
        &self.reasoner
    }
}

impl Person {
    /// Create a person and put it on `net`.
    pub async fn join(
        net: &Arc<LocalNetwork>,
        schema: &Arc<SchemaTable>,
        config: &BikesConfig,
    ) -> Result<Self, ReasonerError> {
        let ride = ActiveRide::default();
        let reasoner = ProtocolReasoner::builder(new_id(), Arc::clone(schema), net.clone())
            .config(config.reasoner.clone())
            .consume(Arc::new(RentalClient::new(config.person.clone(), Arc::clone(&ride))))
            .consume(Arc::new(SearchClient))
            .consume(Arc::new(RideRider))
            .build()?;
        Ok(Self {
            reasoner: enlist(net, reasoner).await,
            ride,
        })
    }

    /// Ask a locator for the station nearest to `at`.
    pub async fn search_station(&self, at: Coords) -> Result<AgentId, ReasonerError> {
        let protocol = keys::station_search();
        let locator = self.reasoner.find_provider(&protocol, "Locator").await?;
        let roles = Roles::from([
            (Role::new("User"), self.id().clone()),
            (Role::new("Locator"), locator),
        ]);
        let inputs = Values::from([("coordinates".to_owned(), at.to_string())]);
        let found = self.reasoner.negotiate(&protocol, roles, inputs).await?;
        let station = AgentId::new(found.get_value("stationID"));
        tracing::info!(agent = self.id().short(), %at, station = station.short(), "nahs.person.station_found");
        Ok(station)
    }

    /// Negotiate a bike at `origin` for a trip to `destination`.
    pub async fn rent(
        &self,
        origin: &AgentId,
        destination: &AgentId,
    ) -> Result<Rental, ReasonerError> {
        let protocol = keys::bike_rental();
        let renter = self.reasoner.find_provider(&protocol, "Renter").await?;
        let roles = Roles::from([
            (Role::new("Client"), self.id().clone()),
            (Role::new("Renter"), renter),
        ]);
        let inputs = Values::from([
            ("origin".to_owned(), origin.to_string()),
            ("destination".to_owned(), destination.to_string()),
        ]);
        let instance = self.reasoner.negotiate(&protocol, roles, inputs).await?;
        let price = handlers::parse(&instance, "price")?;
        let accepted = instance.get_value("rID") == ACCEPT;
        let bike = accepted.then(|| AgentId::new(instance.get_value("bikeID")));
        Ok(Rental {
            accepted,
            bike,
            price,
            instance,
        })
    }

    /// Start riding the bike of an accepted rental.
    pub async fn pick_up(&self, rental: &Rental) -> Result<Instance, ReasonerError> {
        let bike = rental.bike.as_ref().ok_or_else(|| {
            ReasonerError::ResourceUnavailable(format!("rental {} was not accepted", rental.instance.key()))
        })?;
        let ride = handlers::start_ride(&self.reasoner, bike, rental.instance.get_value("ID")).await?;
        *self.ride.lock().await = Some(ride.clone());
        Ok(ride)
    }

    /// The ride in progress.
    pub async fn ride(&self) -> Option<Instance> {
        self.ride.lock().await.clone()
    }

    /// Leave the current bike at `station`.
    pub async fn drop_bike(&self, station: &AgentId) -> Result<Instance, ReasonerError> {
        let mut current = self.ride.lock().await;
        let ride = current
            .as_ref()
            .ok_or_else(|| ReasonerError::InstanceNotFound("no ride in progress".into()))?;
        let done = handlers::finish_ride(&self.reasoner, ride, station).await?;
        *current = None;
        Ok(done)
    }

    /// Ride from the station nearest to `from` to the station nearest to
    /// `to`.
    pub async fn travel(&self, from: Coords, to: Coords) -> Result<Trip, ReasonerError> {
        let origin = self.search_station(from).await?;
        let destination = self.search_station(to).await?;
        let rental = self.rent(&origin, &destination).await?;
        let Some(bike) = rental.bike.clone() else {
            return Err(ReasonerError::ResourceUnavailable(format!(
                "offer at {} turned down",
                rental.price
            )));
        };
        if self.ride().await.is_none() {
            self.pick_up(&rental).await?;
        }
        self.drop_bike(&destination).await?;
        tracing::info!(
            agent = self.id().short(),
            origin = origin.short(),
            destination = destination.short(),
            bike = bike.short(),
            "nahs.person.travelled"
        );
        Ok(Trip {
            origin,
            destination,
            bike,
            price: rental.price,
        })
    }
}
