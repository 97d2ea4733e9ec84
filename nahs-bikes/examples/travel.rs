//! A small town: two stations, one renter, one carrier, a few bikes.
//!
//! A person rides across town, then the university asks for bikes at its
//! station and the renter hires the carrier to bring them.
//!
//! Run with: RUST_LOG=debug cargo run --example travel -p nahs-bikes

use chrono::Utc;
use nahs_bikes::{Agent, Bike, BikesConfig, Coords, Person, Renter, Station, Transport, University, protocols};
use nahs_net_local::LocalNetwork;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Respects RUST_LOG.
    tracing_subscriber::fmt::init();

    let net = Arc::new(LocalNetwork::new());
    let schema = Arc::new(protocols::catalog()?);
    let config = BikesConfig::default();

    let campus = Station::new(Coords::new(8.0, 8.0));
    let harbour = Station::new(Coords::new(40.0, 40.0));
    let stations = vec![campus.clone(), harbour.clone()];

    let mut bikes = Vec::new();
    for _ in 0..4 {
        let bike = Bike::join(&net, &schema, &config, stations.clone()).await?;
        bike.dock_at(&harbour).await;
        bikes.push(bike);
    }
    let renter = Renter::join(&net, &schema, &config, stations.clone()).await?;
    let carrier = Transport::join(&net, &schema, &config, stations.clone()).await?;
    let university = University::join(&net, &schema, &config, &campus).await?;
    let person = Person::join(&net, &schema, &config).await?;

    match person.travel(Coords::new(39.0, 42.0), Coords::new(10.0, 5.0)).await {
        Ok(trip) => println!(
            "{} rode bike {} for {} from {} to {}",
            person.id().short(),
            trip.bike.short(),
            trip.price,
            trip.origin.short(),
            trip.destination.short()
        ),
        Err(e) => println!("{} stayed home: {e}", person.id().short()),
    }

    let arrival = Utc::now() + chrono::Duration::seconds(2);
    let offer = university.request_bikes(2, arrival).await?;
    println!(
        "university asked for 2 bikes, {} coming (accepted: {})",
        offer.bikes, offer.accepted
    );
    if offer.accepted {
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
    }
    println!(
        "campus has {} bikes, harbour has {}",
        campus.available().await,
        harbour.available().await
    );

    for agent in [person.reasoner(), renter.reasoner(), university.reasoner()] {
        agent.shutdown().await;
    }
    carrier.shutdown().await;
    Ok(())
}
