//! The bike-sharing protocol catalog.
//!
//! | Protocol | Roles | Runs |
//! |----------|-------|------|
//! | BikeRental | Client, Renter | request, offer, accept or reject |
//! | StationSearch | User, Locator | request, locate |
//! | BikeTransport | Requester, Transport | request, accept or reject, success or failure |
//! | BikeRequest | Requester, Renter | request, accept or reject |
//! | BikeRide | Rider, Bike | request, drop |

use nahs_protocol::{Protocol, ProtocolKey, SchemaError, SchemaTable};

/// Protocol keys.
pub mod keys {
    use nahs_protocol::ProtocolKey;

    /// `BikeRental(Client,Renter)`.
    pub fn bike_rental() -> ProtocolKey {
        ProtocolKey::new("BikeRental(Client,Renter)")
    }

    /// `StationSearch(User,Locator)`.
    pub fn station_search() -> ProtocolKey {
        ProtocolKey::new("StationSearch(User,Locator)")
    }

    /// `BikeTransport(Requester,Transport)`.
    pub fn bike_transport() -> ProtocolKey {
        ProtocolKey::new("BikeTransport(Requester,Transport)")
    }

    /// `BikeRequest(Requester,Renter)`.
    pub fn bike_request() -> ProtocolKey {
        ProtocolKey::new("BikeRequest(Requester,Renter)")
    }

    /// `BikeRide(Rider,Bike)`.
    pub fn bike_ride() -> ProtocolKey {
        ProtocolKey::new("BikeRide(Rider,Bike)")
    }
}

/// Value bound to `rID` when an offer or request is taken.
pub const ACCEPT: &str = "accept";
/// Value bound to `rID` when an offer or request is turned down.
pub const REJECT: &str = "reject";
/// Value bound to `result` when a transport completed.
pub const SUCCESS: &str = "success";
/// Value bound to `result` when a transport could not be carried out.
pub const FAILURE: &str = "failure";

/// A client rents one bike at the origin station.
pub fn bike_rental() -> Result<Protocol, SchemaError> {
    Protocol::builder("BikeRental")
        .role("Client")
        .role("Renter")
        .param("out ID key")
        .param("in origin")
        .param("in destination")
        .param("out price")
        .param("out bikeID")
        .param("out rID")
        .action("request", "Client", "Renter", &["out ID key", "in origin", "in destination"])
        .action("offer", "Renter", "Client", &["in ID", "in origin", "out price", "out bikeID"])
        .action("accept", "Client", "Renter", &["in ID", "in bikeID", "out rID"])
        .action("reject", "Client", "Renter", &["in ID", "in price", "out rID"])
        .build()
}

/// A user asks for the station nearest to some coordinates.
pub fn station_search() -> Result<Protocol, SchemaError> {
    Protocol::builder("StationSearch")
        .role("User")
        .role("Locator")
        .param("out ID key")
        .param("in coordinates")
        .param("out stationID")
        .action("request", "User", "Locator", &["out ID key", "in coordinates"])
        .action("locate", "Locator", "User", &["in ID", "in coordinates", "out stationID"])
        .build()
}

/// A requester asks a carrier to move bikes between stations by a deadline.
pub fn bike_transport() -> Result<Protocol, SchemaError> {
    Protocol::builder("BikeTransport")
        .role("Requester")
        .role("Transport")
        .param("out ID key")
        .param("in bikeNum")
        .param("in src")
        .param("in dst")
        .param("in datetime")
        .param("out rID")
        .param("out result")
        .action(
            "request",
            "Requester",
            "Transport",
            &["out ID key", "in bikeNum", "in src", "in dst", "in datetime"],
        )
        .action("accept", "Transport", "Requester", &["in ID", "out rID"])
        .action("reject", "Transport", "Requester", &["in ID", "out rID"])
        .action("success", "Transport", "Requester", &["in rID", "out result"])
        .action("failure", "Transport", "Requester", &["in rID", "out result"])
        .build()
}

/// A requester asks a renter for bikes at one of its stations.
pub fn bike_request() -> Result<Protocol, SchemaError> {
    Protocol::builder("BikeRequest")
        .role("Requester")
        .role("Renter")
        .param("out ID key")
        .param("in bikeNum")
        .param("in datetime")
        .param("in station")
        .param("out rID")
        .param("out offerNum")
        .action(
            "request",
            "Requester",
            "Renter",
            &["out ID key", "in bikeNum", "in datetime", "in station"],
        )
        .action("accept", "Renter", "Requester", &["in ID", "out rID", "out offerNum"])
        .action("reject", "Renter", "Requester", &["in ID", "out rID", "out offerNum"])
        .build()
}

/// A rider takes a bike and later drops it at a station.
pub fn bike_ride() -> Result<Protocol, SchemaError> {
    Protocol::builder("BikeRide")
        .role("Rider")
        .role("Bike")
        .param("out ID key")
        .param("in rentalID")
        .param("out dropStation")
        .action("request", "Rider", "Bike", &["out ID key", "in rentalID"])
        .action("drop", "Rider", "Bike", &["in ID", "out dropStation"])
        .build()
}

/// Every bike-sharing protocol, ready to share between reasoners.
pub fn catalog() -> Result<SchemaTable, SchemaError> {
    Ok(SchemaTable::new([
        bike_rental()?,
        station_search()?,
        bike_transport()?,
        bike_request()?,
        bike_ride()?,
    ]))
}

/// Keys of every protocol in [`catalog`].
pub fn all_keys() -> [ProtocolKey; 5] {
    [
        keys::bike_rental(),
        keys::station_search(),
        keys::bike_transport(),
        keys::bike_request(),
        keys::bike_ride(),
    ]
}
