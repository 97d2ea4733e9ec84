//! Agent configuration.
//!
//! Everything is plain data with defaults; load a [`BikesConfig`] from JSON
//! or build one in code and pass it to the agent constructors.

use nahs_protocol::SchemaError;
use nahs_reasoner::ReasonerConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Business rules of a [`Person`](crate::Person).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonConfig {
    /// Highest price accepted for a rental.
    pub max_price: Decimal,
    /// Start a ride with the bike as soon as a rental is accepted.
    pub auto_pickup: bool,
}

impl Default for PersonConfig {
    fn default() -> Self {
        Self {
            max_price: Decimal::new(2, 2),
            auto_pickup: true,
        }
    }
}

/// Business rules of a [`Renter`](crate::Renter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenterConfig {
    /// Prices a rental quote is drawn from.
    pub prices: Vec<Decimal>,
}

impl Default for RenterConfig {
    fn default() -> Self {
        Self {
            prices: vec![Decimal::new(1, 2), Decimal::new(2, 2), Decimal::new(3, 2)],
        }
    }
}

impl RenterConfig {
    /// Always quote `price`.
    pub fn fixed(price: Decimal) -> Self {
        Self {
            prices: vec![price],
        }
    }
}

/// Business rules of a [`Transport`](crate::Transport).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Distance units covered per second.
    pub speed: f64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { speed: 100.0 }
    }
}

/// Configuration for a whole population of agents.
///
/// ```
/// use nahs_bikes::BikesConfig;
///
/// let config = BikesConfig::from_json(r#"{ "renter": { "prices": ["0.05"] } }"#).unwrap();
/// assert_eq!(config.renter.prices.len(), 1);
/// assert_eq!(config.transport.speed, 100.0);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BikesConfig {
    /// Shared by every agent's reasoner.
    pub reasoner: ReasonerConfig,
    /// People.
    pub person: PersonConfig,
    /// Renters.
    pub renter: RenterConfig,
    /// Carriers.
    pub transport: TransportConfig,
}

impl BikesConfig {
    /// Parse a JSON document. Missing sections take their defaults.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }
}
