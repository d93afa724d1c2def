//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Liveness verdict for a package, from healthiest to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    /// Package is reachable and shows signs of maintenance
    Alive,
    /// Package looks abandoned but somebody can still be contacted
    SeemsDead,
    /// Package looks abandoned and nobody can be contacted
    ShouldBeTerminated,
    /// Package is gone, yanked, or has never shipped a file
    Dead,
}

impl Liveness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alive => "alive",
            Self::SeemsDead => "seems_dead",
            Self::ShouldBeTerminated => "should_be_terminated",
            Self::Dead => "dead",
        }
    }

    /// Whether the package should be put forward for deprecation review
    pub fn is_review_candidate(&self) -> bool {
        matches!(self, Self::ShouldBeTerminated | Self::Dead)
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::Alive
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Liveness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alive" => Ok(Self::Alive),
            "seems_dead" => Ok(Self::SeemsDead),
            "should_be_terminated" => Ok(Self::ShouldBeTerminated),
            "dead" => Ok(Self::Dead),
            _ => Err(format!("Invalid liveness verdict: {}", s)),
        }
    }
}

/// Where a record handed out by the cache came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOrigin {
    /// Served from a stored snapshot still within its TTL
    Cache,
    /// Fetched from the registry during this call
    Registry,
}
