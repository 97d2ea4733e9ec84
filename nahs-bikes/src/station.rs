//! Stations: a place on the map plus the bikes docked there.

use crate::coords::Coords;
use nahs_protocol::AgentId;
use nahs_reasoner::ResourcePool;
use std::sync::Arc;

struct Inner {
    id: AgentId,
    coords: Coords,
    bikes: ResourcePool,
}

/// A bike station.
///
/// Stations do not negotiate; renters and carriers that know a station
/// hold a handle to it and act on its inventory directly. Cloning is
/// cheap and clones share the inventory.
#[derive(Clone)]
pub struct Station {
    inner: Arc<Inner>,
}

impl Station {
    /// A new, empty station with a fresh identity.
    pub fn new(coords: Coords) -> Self {
        Self::with_id(AgentId::new(uuid::Uuid::new_v4().to_string()), coords)
    }

    /// A new, empty station with a known identity.
    pub fn with_id(id: AgentId, coords: Coords) -> Self {
        tracing::debug!(station = id.short(), %coords, "nahs.station.created");
        Self {
            inner: Arc::new(Inner {
                id,
                coords,
                bikes: ResourcePool::default(),
            }),
        }
    }

    /// Identity of the station.
    pub fn id(&self) -> &AgentId {
        &self.inner.id
    }

    /// Where the station is.
    pub fn coords(&self) -> Coords {
        self.inner.coords
    }

    /// Dock `bike`, making it available. Docking a bike that is already
    /// available changes nothing.
    pub async fn dock_bike(&self, bike: &AgentId) -> bool {
        let docked = self.inner.bikes.dock(bike.as_str()).await;
        if docked {
            tracing::info!(station = self.id().short(), bike = bike.short(), "nahs.station.docked");
        }
        docked
    }

    /// Reserve the first available bike.
    pub async fn reserve(&self) -> Option<AgentId> {
        self.inner.bikes.reserve().await.map(AgentId::new)
    }

    /// Reserve exactly `n` bikes, or none.
    pub async fn reserve_many(&self, n: usize) -> Option<Vec<AgentId>> {
        let bikes = self.inner.bikes.reserve_many(n).await?;
        Some(bikes.into_iter().map(AgentId::new).collect())
    }

    /// A reserved bike left the station.
    pub async fn release(&self, bike: &AgentId) -> bool {
        let released = self.inner.bikes.release(bike.as_str()).await;
        if released {
            tracing::debug!(station = self.id().short(), bike = bike.short(), "nahs.station.released");
        }
        released
    }

    /// Number of bikes ready to be rented.
    pub async fn available(&self) -> usize {
        self.inner.bikes.available().await
    }

    /// Number of bikes promised but not yet gone.
    pub async fn reserved(&self) -> usize {
        self.inner.bikes.reserved().await
    }

    /// Whether `bike` is docked here, available or reserved.
    pub async fn has(&self, bike: &AgentId) -> bool {
        self.inner.bikes.has(bike.as_str()).await
    }
}

impl std::fmt::Debug for Station {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Station")
            .field("id", &self.inner.id)
            .field("coords", &self.inner.coords)
            .finish_non_exhaustive()
    }
}

/// Station with `id` in `stations`, if any.
pub fn find<'a>(stations: &'a [Station], id: &str) -> Option<&'a Station> {
    stations.iter().find(|s| s.id().as_str() == id)
}

/// Station nearest to `point`. Ties go to the earliest station in the
/// slice.
pub fn nearest<'a>(stations: &'a [Station], point: &Coords) -> Option<&'a Station> {
    stations.iter().fold(None, |best: Option<&Station>, s| match best {
        Some(b) if b.coords().squared_distance(point) <= s.coords().squared_distance(point) => {
            Some(b)
        }
        _ => Some(s),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_prefers_closer_then_earlier() {
        let a = Station::new(Coords::new(8.0, 8.0));
        let b = Station::new(Coords::new(40.0, 40.0));
        let twin = Station::new(Coords::new(8.0, 8.0));
        let stations = vec![a.clone(), b.clone(), twin];

        let found = nearest(&stations, &Coords::new(15.0, 15.0)).unwrap();
        assert_eq!(found.id(), a.id());
        let found = nearest(&stations, &Coords::new(39.0, 41.0)).unwrap();
        assert_eq!(found.id(), b.id());
        assert!(nearest(&[], &Coords::default()).is_none());
    }

    #[test]
    fn find_by_id() {
        let a = Station::new(Coords::new(1.0, 1.0));
        let stations = vec![a.clone()];
        assert!(find(&stations, a.id().as_str()).is_some());
        assert!(find(&stations, "elsewhere").is_none());
    }

    #[tokio::test]
    async fn docking_twice_is_a_no_op() {
        let s = Station::new(Coords::default());
        let bike = AgentId::new("bike-1");
        assert!(s.dock_bike(&bike).await);
        assert!(!s.dock_bike(&bike).await);
        assert_eq!(s.available().await, 1);

        assert_eq!(s.reserve().await, Some(bike.clone()));
        assert!(s.has(&bike).await);
        assert!(s.release(&bike).await);
        assert!(!s.has(&bike).await);
    }
}
