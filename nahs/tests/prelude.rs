//! The prelude is enough to stand up agents and negotiate.

use nahs::prelude::*;
use std::sync::Arc;

#[tokio::test]
async fn prelude_wires_a_station_search() {
    let net = Arc::new(LocalNetwork::new());
    let schema = Arc::new(protocols::catalog().unwrap());
    let config = BikesConfig::default();

    let near = Station::new(Coords::new(8.0, 8.0));
    let far = Station::new(Coords::new(40.0, 40.0));
    let _renter = Renter::join(&net, &schema, &config, vec![far, near.clone()])
        .await
        .unwrap();
    let person = Person::join(&net, &schema, &config).await.unwrap();

    let found = person.search_station(Coords::new(15.0, 15.0)).await.unwrap();
    assert_eq!(&found, near.id());
    assert!(net.contains(person.id()).await);
}

#[test]
fn modules_are_reachable() {
    let key = nahs::bikes::protocols::keys::bike_rental();
    assert_eq!(key.as_str(), "BikeRental(Client,Renter)");
    let _ = nahs::reasoner::ReasonerConfig::default();
    let _: Option<nahs::protocol::AgentId> = None;
}
