//! Driver matching policies.
//!
//! A policy picks one driver out of a candidate pool for a pickup position. It
//! never mutates the candidates; the dispatch service owns everything that
//! happens after the pick (acceptance, reservation, retries).

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::DispatchError;
use crate::models::{Driver, Position};

/// Selects a driver from a candidate pool.
///
/// Implementations must return `None` for an empty pool and must be
/// deterministic for identical inputs.
pub trait MatchingPolicy: Send + Sync {
    /// Name used in logs and events
    fn name(&self) -> &str;

    fn select<'a>(&self, pickup: &Position, candidates: &'a [Driver]) -> Option<&'a Driver>;
}

/// Picks the driver closest to the pickup point. On equal distance the
/// earliest candidate wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct NearestDriver;

impl MatchingPolicy for NearestDriver {
    fn name(&self) -> &str {
        "nearest"
    }

    fn select<'a>(&self, pickup: &Position, candidates: &'a [Driver]) -> Option<&'a Driver> {
        let mut nearest: Option<(&Driver, f64)> = None;
        for driver in candidates {
            let distance = pickup.distance_to(&driver.position);
            if nearest.map_or(true, |(_, best)| distance < best) {
                nearest = Some((driver, distance));
            }
        }
        nearest.map(|(driver, _)| driver)
    }
}

/// Picks the highest-rated driver. Ratings must beat zero strictly, so a
/// pool where every driver is rated 0 yields no pick. On equal rating the
/// earliest candidate wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct BestRatedDriver;

impl MatchingPolicy for BestRatedDriver {
    fn name(&self) -> &str {
        "bestRating"
    }

    fn select<'a>(&self, _pickup: &Position, candidates: &'a [Driver]) -> Option<&'a Driver> {
        let mut best = None;
        let mut best_rating = 0.0;
        for driver in candidates {
            if driver.rating > best_rating {
                best_rating = driver.rating;
                best = Some(driver);
            }
        }
        best
    }
}

/// The built-in policies, addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Nearest,
    BestRating,
}

impl PolicyKind {
    pub fn build(self) -> Arc<dyn MatchingPolicy> {
        match self {
            PolicyKind::Nearest => Arc::new(NearestDriver),
            PolicyKind::BestRating => Arc::new(BestRatedDriver),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Nearest => write!(f, "nearest"),
            PolicyKind::BestRating => write!(f, "bestRating"),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(PolicyKind::Nearest),
            "bestrating" | "best_rating" | "best-rating" => Ok(PolicyKind::BestRating),
            other => Err(DispatchError::invalid_configuration(format!(
                "unknown matching policy: {other}"
            ))),
        }
    }
}
