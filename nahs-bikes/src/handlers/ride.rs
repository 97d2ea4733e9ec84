use crate::protocols::keys;
use crate::station::{self, Station};
use async_trait::async_trait;
use nahs_protocol::{
    Action, AgentId, Instance, ProtocolKey, ReasonerError, Role, Roles, Values,
};
use nahs_reasoner::{Pattern, ProtocolHandler, ProtocolReasoner};
use std::sync::Arc;
use tokio::sync::Mutex;

/// The ride a rider is currently on, if any.
pub type ActiveRide = Arc<Mutex<Option<Instance>>>;

/// Start a ride on `bike` for the rental `rental_id`.
pub(crate) async fn start_ride(
    reasoner: &ProtocolReasoner,
    bike: &AgentId,
    rental_id: &str,
) -> Result<Instance, ReasonerError> {
    let roles = Roles::from([
        (Role::new("Rider"), reasoner.agent().clone()),
        (Role::new("Bike"), bike.clone()),
    ]);
    let inputs = Values::from([("rentalID".to_owned(), rental_id.to_owned())]);
    let ride = reasoner.start(&keys::bike_ride(), roles, inputs).await?;
    tracing::info!(agent = reasoner.agent().short(), bike = bike.short(), ride = %ride.key(), "nahs.ride.started");
    Ok(ride)
}

/// Complete `ride` by leaving the bike at `station`.
pub(crate) async fn finish_ride(
    reasoner: &ProtocolReasoner,
    ride: &Instance,
    station: &AgentId,
) -> Result<Instance, ReasonerError> {
    let mut next = ride.clone();
    next.set_value("dropStation", station.as_str())?;
    let done = reasoner.advance(next).await?;
    tracing::info!(agent = reasoner.agent().short(), station = station.short(), ride = %done.key(), "nahs.ride.finished");
    Ok(done)
}

/// Rider side of BikeRide. Riders only ever send.
#[derive(Debug, Default)]
pub struct RideRider;

#[async_trait]
impl ProtocolHandler for RideRider {
    fn protocol(&self) -> ProtocolKey {
        keys::bike_ride()
    }

    fn role(&self) -> Role {
        Role::new("Rider")
    }
}

/// Where a bike is and who rides it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BikeStatus {
    /// Current rider.
    pub rider: Option<AgentId>,
    /// Station the bike was last left at.
    pub station: Option<AgentId>,
}

/// Bike side of BikeRide.
pub struct RideBike {
    status: Arc<Mutex<BikeStatus>>,
    stations: Vec<Station>,
}

impl RideBike {
    /// Track rides in `status`; bikes dropped at one of `stations` dock
    /// there.
    pub fn new(status: Arc<Mutex<BikeStatus>>, stations: Vec<Station>) -> Self {
        Self { status, stations }
    }
}

#[async_trait]
impl ProtocolHandler for RideBike {
    fn protocol(&self) -> ProtocolKey {
        keys::bike_ride()
    }

    fn role(&self) -> Role {
        Role::new("Bike")
    }

    fn expected(&self, current: &Instance) -> Pattern {
        match current.value("dropStation") {
            None => Pattern::Single("drop"),
            Some(_) => Pattern::Closed,
        }
    }

    async fn on_register(
        &self,
        reasoner: &ProtocolReasoner,
        instance: Instance,
    ) -> Result<(), ReasonerError> {
        let rider = instance
            .role("Rider")
            .cloned()
            .ok_or_else(|| ReasonerError::InvalidRoleBinding {
                instance: instance.key().to_string(),
                reason: "no rider".into(),
            })?;
        tracing::info!(bike = reasoner.agent().short(), rider = rider.short(), "nahs.bike.picked_up");
        let mut status = self.status.lock().await;
        status.rider = Some(rider);
        status.station = None;
        Ok(())
    }

    async fn on_update(
        &self,
        reasoner: &ProtocolReasoner,
        instance: Instance,
        _actions: &[Action],
    ) -> Result<(), ReasonerError> {
        let dropped_at = AgentId::new(instance.get_value("dropStation"));
        {
            let mut status = self.status.lock().await;
            tracing::info!(
                bike = reasoner.agent().short(),
                station = dropped_at.short(),
                rider = status.rider.as_ref().map(|r| r.short()).unwrap_or("-"),
                "nahs.bike.dropped"
            );
            status.rider = None;
            status.station = Some(dropped_at.clone());
        }
        if let Some(station) = station::find(&self.stations, dropped_at.as_str()) {
            station.dock_bike(reasoner.agent()).await;
        }
        Ok(())
    }
}
