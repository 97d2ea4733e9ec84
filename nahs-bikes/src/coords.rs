//! Planar coordinates of stations and travellers.

use nahs_protocol::ReasonerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A point on the map. Travels over the wire as `"x,y"`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coords {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl Coords {
    /// Point at `(x, y)`.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance. Enough to rank candidates.
    pub fn squared_distance(&self, other: &Coords) -> f64 {
        let (dx, dy) = (self.x - other.x, self.y - other.y);
        dx * dx + dy * dy
    }

    /// Euclidean distance.
    pub fn distance(&self, other: &Coords) -> f64 {
        self.squared_distance(other).sqrt()
    }
}

impl fmt::Display for Coords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl FromStr for Coords {
    type Err = ReasonerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ReasonerError::malformed("coordinates", s);
        let (x, y) = s.split_once(',').ok_or_else(malformed)?;
        let x: f64 = x.trim().parse().map_err(|_| malformed())?;
        let y: f64 = y.trim().parse().map_err(|_| malformed())?;
        if !x.is_finite() || !y.is_finite() {
            return Err(malformed());
        }
        Ok(Self { x, y })
    }
}
