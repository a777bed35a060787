//! Route metric arithmetic
//!
//! Distances are small non-negative integers capped at [`INFINITY`]. Every
//! sum saturates, so a route built from a latency and an advertised distance
//! can never wrap around into something that looks reachable again.

use std::fmt;
use std::ops::Add;

/// Largest representable distance, also the "unreachable" sentinel
pub const INFINITY: Distance = Distance(16);

/// Path cost to a destination (sum of link latencies), capped at [`INFINITY`]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(from = "u32", into = "u32")]
pub struct Distance(u32);

/// Link latency uses the same capped metric as distances
pub type Latency = Distance;

impl Distance {
    pub const ZERO: Distance = Distance(0);

    /// Build a distance, clamping anything above [`INFINITY`]
    pub const fn new(value: u32) -> Self {
        if value > INFINITY.0 {
            INFINITY
        } else {
            Distance(value)
        }
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    /// Does this distance mean "no route"?
    pub const fn is_infinite(self) -> bool {
        self.0 >= INFINITY.0
    }

    pub const fn is_finite(self) -> bool {
        !self.is_infinite()
    }
}

impl Add for Distance {
    type Output = Distance;

    fn add(self, rhs: Distance) -> Distance {
        Distance::new(self.0.saturating_add(rhs.0))
    }
}

impl From<u32> for Distance {
    fn from(value: u32) -> Self {
        Distance::new(value)
    }
}

impl From<Distance> for u32 {
    fn from(distance: Distance) -> Self {
        distance.0
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            write!(f, "inf")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
