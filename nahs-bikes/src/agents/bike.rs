use super::{Agent, enlist, new_id};
use crate::config::BikesConfig;
use crate::handlers::{BikeStatus, RideBike};
use crate::station::Station;
use nahs_net_local::LocalNetwork;
use nahs_protocol::{ReasonerError, SchemaTable};
use nahs_reasoner::ProtocolReasoner;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A bike. Knows who rides it and where it was left.
pub struct Bike {
    reasoner: ProtocolReasoner,
    status: Arc<Mutex<BikeStatus>>,
}

impl Agent for Bike {
    fn reasoner(&self) -> &ProtocolReasoner {
        &self.reasoner
    }
}

impl Bike {
    /// Create a bike that can be left at any of `stations` and put it on
    /// `net`.
    pub async fn join(
        net: &Arc<LocalNetwork>,
        schema: &Arc<SchemaTable>,
        config: &BikesConfig,
        stations: Vec<Station>,
    ) -> Result<Self, ReasonerError> {
        let status = Arc::new(Mutex::new(BikeStatus::default()));
        let reasoner = ProtocolReasoner::builder(new_id(), Arc::clone(schema), net.clone())
            .config(config.reasoner.clone())
            .offer(Arc::new(RideBike::new(Arc::clone(&status), stations)))
            .build()?;
        Ok(Self {
            reasoner: enlist(net, reasoner).await,
            status,
        })
    }

    /// Dock the bike at `station`.
    pub async fn dock_at(&self, station: &Station) -> bool {
        let docked = station.dock_bike(self.id()).await;
        self.status.lock().await.station = Some(station.id().clone());
        docked
    }

    /// Current rider and station.
    pub async fn status(&self) -> BikeStatus {
        self.status.lock().await.clone()
    }
}
