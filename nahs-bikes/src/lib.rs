#![deny(missing_docs)]
//! Bike-sharing agents for nahs.
//!
//! People rent bikes from renters, renters point them to stations and
//! hire carriers to restock stations, universities ask for bikes ahead of
//! events. Every interaction is one of the protocols in [`protocols`],
//! negotiated through each agent's own
//! [`ProtocolReasoner`](nahs_reasoner::ProtocolReasoner).
//!
//! ```no_run
//! use nahs_bikes::{protocols, BikesConfig, Coords, Person, Renter, Station};
//! use nahs_net_local::LocalNetwork;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let net = Arc::new(LocalNetwork::new());
//! let schema = Arc::new(protocols::catalog()?);
//! let config = BikesConfig::default();
//!
//! let stations = vec![Station::new(Coords::new(8.0, 8.0))];
//! let _renter = Renter::join(&net, &schema, &config, stations).await?;
//! let person = Person::join(&net, &schema, &config).await?;
//! let station = person.search_station(Coords::new(15.0, 15.0)).await?;
//! # let _ = station;
//! # Ok(())
//! # }
//! ```

pub mod agents;
pub mod config;
pub mod coords;
pub mod handlers;
pub mod protocols;
pub mod station;

pub use agents::{Agent, Bike, BikeOffer, Person, Rental, Renter, Transport, Trip, University};
pub use config::{BikesConfig, PersonConfig, RenterConfig, TransportConfig};
pub use coords::Coords;
pub use station::Station;
