//! Each handler in isolation, driven through the reasoner of the agent
//! playing its role. Peers are simulated by hand-built instances.

use chrono::Utc;
use nahs_bikes::handlers::*;
use nahs_bikes::protocols::{self, keys};
use nahs_bikes::{Coords, RenterConfig, Station, TransportConfig};
use nahs_protocol::test_utils::RecordingTransport;
use nahs_protocol::*;
use nahs_reasoner::ProtocolReasoner;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

// --- Fixtures ---

fn schema() -> Arc<SchemaTable> {
    Arc::new(protocols::catalog().unwrap())
}

async fn stocked(x: f64, y: f64, bikes: &[&str]) -> Station {
    let station = Station::new(Coords::new(x, y));
    for bike in bikes {
        station.dock_bike(&AgentId::new(*bike)).await;
    }
    station
}

fn proposal(protocol: ProtocolKey, roles: [(&str, &str); 2], values: &[(&str, &str)]) -> Instance {
    let protocol = schema().get(&protocol).unwrap();
    let roles = Roles::from(roles.map(|(r, a)| (Role::new(r), AgentId::new(a))));
    let mut instance = Instance::new(protocol, roles);
    for (name, value) in values {
        instance.set_value(name, *value).unwrap();
    }
    instance
}

fn with(instance: &Instance, name: &str, value: &str) -> Instance {
    let mut next = instance.clone();
    next.set_value(name, value).unwrap();
    next
}

fn renter(transport: &Arc<RecordingTransport>, stations: Vec<Station>, price: &str) -> ProtocolReasoner {
    let config = RenterConfig::fixed(Decimal::from_str(price).unwrap());
    ProtocolReasoner::builder(AgentId::new("renter"), schema(), transport.clone())
        .offer(Arc::new(RentalProvider::new(stations.clone(), config)))
        .offer(Arc::new(Locator::new(stations)))
        .consume(Arc::new(TransportRequester))
        .build()
        .unwrap()
}

fn rental(origin: &Station) -> Instance {
    proposal(
        keys::bike_rental(),
        [("Client", "client"), ("Renter", "renter")],
        &[("ID", "r-1"), ("origin", origin.id().as_str()), ("destination", "anywhere")],
    )
}

// --- Catalog ---

#[test]
fn catalog_holds_every_protocol() {
    let table = protocols::catalog().unwrap();
    assert_eq!(table.len(), 5);
    for key in protocols::all_keys() {
        assert!(table.get(&key).is_ok(), "{key}");
    }
    let transport = table.get(&keys::bike_transport()).unwrap();
    let inputs: Vec<&str> = transport.inputs().map(|p| p.name.as_str()).collect();
    assert_eq!(inputs, vec!["bikeNum", "src", "dst", "datetime"]);
}

// --- Rental, renter side ---

#[tokio::test]
async fn rental_offer_reserves_a_bike() {
    let a = stocked(8.0, 8.0, &["b1", "b2"]).await;
    let transport = Arc::new(RecordingTransport::new());
    let r = renter(&transport, vec![a.clone()], "0.02");

    let p = rental(&a);
    r.register_instance(p.clone()).await.unwrap();

    let offered = r.get_instance(&p.key()).await.unwrap();
    assert_eq!(offered.get_value("price"), "0.02");
    assert_eq!(offered.get_value("bikeID"), "b1");
    assert_eq!(a.available().await, 1);
    assert_eq!(a.reserved().await, 1);

    r.shutdown().await;
    let sent = transport.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, AgentId::new("client"));
    assert_eq!(sent[0].event.kind(), EventKind::Update);
}

#[tokio::test]
async fn accepted_rental_takes_the_bike_away() {
    let a = stocked(8.0, 8.0, &["b1", "b2"]).await;
    let r = renter(&Arc::new(RecordingTransport::new()), vec![a.clone()], "0.01");
    let p = rental(&a);
    r.register_instance(p.clone()).await.unwrap();

    let offered = r.get_instance(&p.key()).await.unwrap();
    r.update_instance(with(&offered, "rID", "accept")).await.unwrap();

    assert!(!a.has(&AgentId::new("b1")).await);
    assert_eq!(a.available().await, 1);
    assert_eq!(a.reserved().await, 0);
}

#[tokio::test]
async fn rejected_rental_docks_the_bike_back() {
    let a = stocked(8.0, 8.0, &["b1", "b2"]).await;
    let r = renter(&Arc::new(RecordingTransport::new()), vec![a.clone()], "0.03");
    let p = rental(&a);
    r.register_instance(p.clone()).await.unwrap();

    let offered = r.get_instance(&p.key()).await.unwrap();
    r.update_instance(with(&offered, "rID", "reject")).await.unwrap();

    assert!(a.has(&AgentId::new("b1")).await);
    assert_eq!(a.available().await, 2);
    assert_eq!(a.reserved().await, 0);
}

#[tokio::test]
async fn unknown_answer_is_refused() {
    let a = stocked(8.0, 8.0, &["b1"]).await;
    let r = renter(&Arc::new(RecordingTransport::new()), vec![a.clone()], "0.01");
    let p = rental(&a);
    r.register_instance(p.clone()).await.unwrap();

    let offered = r.get_instance(&p.key()).await.unwrap();
    let err = r
        .update_instance(with(&offered, "rID", "maybe"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReasonerError::MalformedValue { .. }));
    assert!(r.get_instance(&p.key()).await.unwrap().value("rID").is_none());
    assert_eq!(a.reserved().await, 1);
}

#[tokio::test]
async fn rental_at_unknown_station_is_dropped() {
    let transport = Arc::new(RecordingTransport::new());
    let r = renter(&transport, vec![], "0.01");
    let elsewhere = Station::new(Coords::default());
    let p = rental(&elsewhere);

    let err = r.register_instance(p.clone()).await.unwrap_err();
    assert!(matches!(err, ReasonerError::MalformedValue { ref name, .. } if name == "origin"));
    assert!(r.dropped(&p.key()).await.is_some());

    r.shutdown().await;
    let sent = transport.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event.kind(), EventKind::Drop);
}

#[tokio::test]
async fn rental_at_empty_station_is_unavailable() {
    let a = stocked(8.0, 8.0, &[]).await;
    let r = renter(&Arc::new(RecordingTransport::new()), vec![a.clone()], "0.01");
    let err = r.register_instance(rental(&a)).await.unwrap_err();
    assert!(matches!(err, ReasonerError::ResourceUnavailable(_)));
}

#[tokio::test]
async fn dropped_rental_returns_the_bike() {
    let a = stocked(8.0, 8.0, &["b1"]).await;
    let r = renter(&Arc::new(RecordingTransport::new()), vec![a.clone()], "0.01");
    let p = rental(&a);
    r.register_instance(p.clone()).await.unwrap();
    assert_eq!(a.available().await, 0);

    r.drop_instance(&p.key(), "changed my mind").await.unwrap();
    assert_eq!(a.available().await, 1);
    assert_eq!(a.reserved().await, 0);
}

// --- Station search ---

#[tokio::test]
async fn locator_picks_the_nearest_station() {
    let near = stocked(8.0, 8.0, &[]).await;
    let far = stocked(40.0, 40.0, &[]).await;
    let r = renter(&Arc::new(RecordingTransport::new()), vec![far, near.clone()], "0.01");

    let p = proposal(
        keys::station_search(),
        [("User", "client"), ("Locator", "renter")],
        &[("ID", "s-1"), ("coordinates", "15,15")],
    );
    r.register_instance(p.clone()).await.unwrap();
    let located = r.get_instance(&p.key()).await.unwrap();
    assert_eq!(located.get_value("stationID"), near.id().as_str());
}

#[tokio::test]
async fn locator_rejects_malformed_coordinates() {
    let r = renter(&Arc::new(RecordingTransport::new()), vec![], "0.01");
    let p = proposal(
        keys::station_search(),
        [("User", "client"), ("Locator", "renter")],
        &[("ID", "s-1"), ("coordinates", "north")],
    );
    let err = r.register_instance(p).await.unwrap_err();
    assert!(matches!(err, ReasonerError::MalformedValue { ref name, .. } if name == "coordinates"));
}

// --- Transport, carrier side ---

fn carrier(stations: Vec<Station>, jobs: &Jobs) -> ProtocolReasoner {
    let handler = Carrier::new(stations, TransportConfig::default(), jobs.clone());
    ProtocolReasoner::builder(AgentId::new("carrier"), schema(), Arc::new(RecordingTransport::new()))
        .offer(Arc::new(handler))
        .build()
        .unwrap()
}

fn transport_request(id: &str, src: &Station, dst: &Station, bikes: &str, datetime: &str) -> Instance {
    proposal(
        keys::bike_transport(),
        [("Requester", "renter"), ("Transport", "carrier")],
        &[
            ("ID", id),
            ("bikeNum", bikes),
            ("src", src.id().as_str()),
            ("dst", dst.id().as_str()),
            ("datetime", datetime),
        ],
    )
}

fn in_minutes(minutes: i64) -> String {
    (Utc::now() + chrono::Duration::minutes(minutes)).to_rfc3339()
}

#[tokio::test]
async fn carrier_accepts_feasible_schedule() {
    let (a, b) = (stocked(8.0, 8.0, &["b1"]).await, stocked(40.0, 40.0, &[]).await);
    let jobs = Jobs::default();
    let c = carrier(vec![a.clone(), b.clone()], &jobs);

    let p = transport_request("t-1", &a, &b, "1", &in_minutes(10));
    c.register_instance(p.clone()).await.unwrap();

    assert_eq!(c.get_instance(&p.key()).await.unwrap().get_value("rID"), "accept");
    assert_eq!(jobs.scheduled().await, 1);
    // Nothing moves before the pickup time.
    assert_eq!(a.available().await, 1);
}

#[tokio::test]
async fn carrier_refuses_a_schedule_already_late() {
    let (a, b) = (stocked(8.0, 8.0, &["b1"]).await, stocked(40.0, 40.0, &[]).await);
    let jobs = Jobs::default();
    let c = carrier(vec![a.clone(), b.clone()], &jobs);

    let p = transport_request("t-1", &a, &b, "1", &in_minutes(-1));
    let err = c.register_instance(p.clone()).await.unwrap_err();
    assert!(matches!(err, ReasonerError::ResourceUnavailable(_)));
    assert_eq!(jobs.scheduled().await, 0);
    assert!(c.dropped(&p.key()).await.is_some());
}

#[tokio::test]
async fn carrier_rejects_malformed_requests() {
    let (a, b) = (stocked(8.0, 8.0, &["b1"]).await, stocked(40.0, 40.0, &[]).await);
    let unknown = Station::new(Coords::default());
    let c = carrier(vec![a.clone(), b.clone()], &Jobs::default());
    let later = in_minutes(10);

    let cases = [
        (transport_request("t-1", &a, &b, "0", &later), "bikeNum"),
        (transport_request("t-2", &a, &b, "lots", &later), "bikeNum"),
        (transport_request("t-3", &unknown, &b, "1", &later), "src"),
        (transport_request("t-4", &a, &unknown, "1", &later), "dst"),
        (transport_request("t-5", &a, &b, "1", "tomorrow"), "datetime"),
    ];
    for (p, param) in cases {
        let err = c.register_instance(p).await.unwrap_err();
        assert!(
            matches!(err, ReasonerError::MalformedValue { ref name, .. } if name == param),
            "{param}: {err}"
        );
    }
}

fn in_millis(ms: i64) -> String {
    (Utc::now() + chrono::Duration::milliseconds(ms)).to_rfc3339()
}

fn quick_carrier(stations: Vec<Station>, jobs: &Jobs) -> ProtocolReasoner {
    let handler = Carrier::new(stations, TransportConfig { speed: 1000.0 }, jobs.clone());
    ProtocolReasoner::builder(AgentId::new("carrier"), schema(), Arc::new(RecordingTransport::new()))
        .offer(Arc::new(handler))
        .build()
        .unwrap()
}

#[tokio::test]
async fn drop_before_pickup_leaves_stock_untouched() {
    let (a, b) = (stocked(8.0, 8.0, &["b1"]).await, stocked(40.0, 40.0, &[]).await);
    let jobs = Jobs::default();
    let c = quick_carrier(vec![a.clone(), b.clone()], &jobs);

    let p = transport_request("t-1", &a, &b, "1", &in_millis(150));
    c.register_instance(p.clone()).await.unwrap();
    assert_eq!(jobs.scheduled().await, 1);

    c.handle_event(Event::dropped(p.key(), "cancelled by requester"))
        .await
        .unwrap();
    assert_eq!(jobs.scheduled().await, 0);
    assert!(matches!(
        jobs.wait_for(&p.key()).await.unwrap_err(),
        ReasonerError::InstanceNotFound(_)
    ));

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    assert_eq!(a.available().await, 1);
    assert_eq!(a.reserved().await, 0);
    assert_eq!(b.available().await, 0);
}

#[tokio::test]
async fn finished_transport_leaves_the_schedule() {
    let (a, b) = (stocked(8.0, 8.0, &["b1"]).await, stocked(40.0, 40.0, &[]).await);
    let jobs = Jobs::default();
    let c = quick_carrier(vec![a.clone(), b.clone()], &jobs);

    let p = transport_request("t-1", &a, &b, "1", &in_millis(100));
    c.register_instance(p.clone()).await.unwrap();

    for _ in 0..200 {
        if jobs.scheduled().await == 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(jobs.scheduled().await, 0);
    assert_eq!(b.available().await, 1);

    // The outcome is kept until someone takes it.
    jobs.wait_for(&p.key()).await.unwrap();
    assert!(matches!(
        jobs.wait_for(&p.key()).await.unwrap_err(),
        ReasonerError::InstanceNotFound(_)
    ));
}

#[test]
fn travel_time_follows_distance_and_speed() {
    let a = Station::new(Coords::new(0.0, 0.0));
    let b = Station::new(Coords::new(300.0, 400.0));
    let jobs = Jobs::default();
    let c = Carrier::new(vec![], TransportConfig { speed: 100.0 }, jobs.clone());
    assert_eq!(c.travel_time(&a, &b).unwrap().as_secs(), 5);

    let stuck = Carrier::new(vec![], TransportConfig { speed: 0.0 }, jobs);
    assert!(matches!(
        stuck.travel_time(&a, &b).unwrap_err(),
        ReasonerError::ResourceUnavailable(_)
    ));
}

// --- Transport, requester side ---

async fn requested_transport(r: &ProtocolReasoner) -> Instance {
    let roles = Roles::from([
        (Role::new("Requester"), AgentId::new("renter")),
        (Role::new("Transport"), AgentId::new("carrier")),
    ]);
    let inputs = Values::from([
        ("bikeNum".to_string(), "2".to_string()),
        ("src".to_string(), "a".to_string()),
        ("dst".to_string(), "b".to_string()),
        ("datetime".to_string(), in_minutes(10)),
    ]);
    let protocol = schema().get(&keys::bike_transport()).unwrap();
    r.instantiate(&protocol, roles, inputs).await.unwrap()
}

#[tokio::test]
async fn requester_follows_answer_then_outcome() {
    let r = renter(&Arc::new(RecordingTransport::new()), vec![], "0.01");
    let requested = requested_transport(&r).await;

    // An outcome cannot come before the answer.
    let early = with(&with(&requested, "rID", "accept"), "result", "success");
    let err = r.update_instance(early).await.unwrap_err();
    assert!(matches!(err, ReasonerError::InvalidTransition { .. }));

    let accepted = with(&requested, "rID", "accept");
    r.update_instance(accepted.clone()).await.unwrap();
    let done = with(&accepted, "result", "success");
    r.update_instance(done.clone()).await.unwrap();
    assert_eq!(r.get_instance(&done.key()).await.unwrap().get_value("result"), "success");

    // The transport is over.
    let err = r.update_instance(done).await.unwrap_err();
    assert!(matches!(err, ReasonerError::InvalidTransition { .. }));
}

#[tokio::test]
async fn requester_refuses_unknown_outcomes() {
    let r = renter(&Arc::new(RecordingTransport::new()), vec![], "0.01");
    let requested = requested_transport(&r).await;

    let err = r
        .update_instance(with(&requested, "rID", "perhaps"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReasonerError::MalformedValue { ref name, .. } if name == "rID"));

    let accepted = with(&requested, "rID", "accept");
    r.update_instance(accepted.clone()).await.unwrap();
    let err = r
        .update_instance(with(&accepted, "result", "sort of"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReasonerError::MalformedValue { ref name, .. } if name == "result"));
}

// --- Bike request, requester side ---

#[tokio::test]
async fn request_client_needs_a_count() {
    let r = ProtocolReasoner::builder(AgentId::new("uni"), schema(), Arc::new(RecordingTransport::new()))
        .consume(Arc::new(RequestClient))
        .build()
        .unwrap();
    let roles = Roles::from([
        (Role::new("Requester"), AgentId::new("uni")),
        (Role::new("Renter"), AgentId::new("renter")),
    ]);
    let inputs = Values::from([
        ("bikeNum".to_string(), "3".to_string()),
        ("datetime".to_string(), in_minutes(10)),
        ("station".to_string(), "s".to_string()),
    ]);
    let protocol = schema().get(&keys::bike_request()).unwrap();
    let requested = r.instantiate(&protocol, roles, inputs).await.unwrap();

    let answer = with(&with(&requested, "rID", "accept"), "offerNum", "many");
    let err = r.update_instance(answer).await.unwrap_err();
    assert!(matches!(err, ReasonerError::MalformedValue { ref name, .. } if name == "offerNum"));
}

// --- Ride, bike side ---

#[tokio::test]
async fn bike_tracks_rider_and_drop_station() {
    let station = stocked(8.0, 8.0, &[]).await;
    let status = Arc::new(Mutex::new(BikeStatus::default()));
    let b = ProtocolReasoner::builder(AgentId::new("bike"), schema(), Arc::new(RecordingTransport::new()))
        .offer(Arc::new(RideBike::new(Arc::clone(&status), vec![station.clone()])))
        .build()
        .unwrap();

    let ride = proposal(
        keys::bike_ride(),
        [("Rider", "client"), ("Bike", "bike")],
        &[("ID", "ride-1"), ("rentalID", "r-1")],
    );
    b.register_instance(ride.clone()).await.unwrap();
    assert_eq!(status.lock().await.rider, Some(AgentId::new("client")));

    b.update_instance(with(&ride, "dropStation", station.id().as_str()))
        .await
        .unwrap();
    let now = status.lock().await.clone();
    assert_eq!(now.rider, None);
    assert_eq!(now.station.as_ref(), Some(station.id()));
    assert!(station.has(&AgentId::new("bike")).await);

    // A ride ends once.
    let again = with(&ride, "dropStation", "elsewhere");
    assert!(b.update_instance(again).await.is_err());
}
