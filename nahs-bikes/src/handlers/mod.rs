//! Business rules per protocol and role.
//!
//! | Handler | Protocol | Role | Played by |
//! |---------|----------|------|-----------|
//! | [`RentalClient`] | BikeRental | Client | Person |
//! | [`RentalProvider`] | BikeRental | Renter | Renter |
//! | [`SearchClient`] | StationSearch | User | Person |
//! | [`Locator`] | StationSearch | Locator | Renter |
//! | [`TransportRequester`] | BikeTransport | Requester | Renter |
//! | [`Carrier`] | BikeTransport | Transport | Transport |
//! | [`RequestClient`] | BikeRequest | Requester | University |
//! | [`RequestProvider`] | BikeRequest | Renter | Renter |
//! | [`RideRider`] | BikeRide | Rider | Person, Transport |
//! | [`RideBike`] | BikeRide | Bike | Bike |

mod request;
mod rental;
mod ride;
mod search;
mod transport;

pub use request::{RequestClient, RequestProvider};
pub use rental::{RentalClient, RentalProvider};
pub use ride::{ActiveRide, BikeStatus, RideBike, RideRider};
pub use search::{Locator, SearchClient};
pub use transport::{Carrier, Jobs, TransportRequester};

pub(crate) use ride::{finish_ride, start_ride};
pub(crate) use transport::request_transport;

use nahs_protocol::{Instance, ReasonerError};
use std::str::FromStr;

/// Parse parameter `name` of `instance`.
pub(crate) fn parse<T: FromStr>(instance: &Instance, name: &str) -> Result<T, ReasonerError> {
    let raw = instance.get_value(name);
    raw.trim()
        .parse()
        .map_err(|_| ReasonerError::malformed(name, raw))
}

/// Parse an RFC 3339 timestamp parameter.
pub(crate) fn parse_datetime(
    instance: &Instance,
    name: &str,
) -> Result<chrono::DateTime<chrono::Utc>, ReasonerError> {
    let raw = instance.get_value(name);
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&chrono::Utc))
        .map_err(|_| ReasonerError::malformed(name, raw))
}
