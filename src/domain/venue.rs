//! Price venues.

use serde::{Deserialize, Serialize};

/// Venue identifies one of the two independent price sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Venue {
    /// Centralized exchange ticker feed.
    VenueA,
    /// Decentralized exchange route-quote feed.
    VenueB,
}

impl Venue {
    /// Human-readable venue label used in logs and notifications.
    pub fn label(self) -> &'static str {
        match self {
            Venue::VenueA => "BINANCE",
            Venue::VenueB => "SOLANA_DEX",
        }
    }
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Venue::VenueA => write!(f, "venue_a"),
            Venue::VenueB => write!(f, "venue_b"),
        }
    }
}

impl std::str::FromStr for Venue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "venue_a" => Ok(Venue::VenueA),
            "venue_b" => Ok(Venue::VenueB),
            _ => Err(format!("Unknown venue: {}", s)),
        }
    }
}
