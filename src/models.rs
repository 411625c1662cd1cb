//! Data models for the dispatch core.
//! Defines riders, drivers, booking requests and the ride snapshots handed to
//! observers and callers.

use std::fmt;
use std::str::FromStr;

use geo::{EuclideanDistance, Point};
use serde::{Deserialize, Serialize};

/// A point on the flat dispatch plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Straight-line distance to `other`.
    pub fn distance_to(&self, other: &Position) -> f64 {
        Point::from(*self).euclidean_distance(&Point::from(*other))
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<Position> for Point<f64> {
    fn from(position: Position) -> Self {
        Point::new(position.x, position.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Vehicle categories a rider can request and a driver can operate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleCategory {
    Bike,
    Sedan,
    Suv,
    AutoRickshaw,
}

impl fmt::Display for VehicleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleCategory::Bike => write!(f, "BIKE"),
            VehicleCategory::Sedan => write!(f, "SEDAN"),
            VehicleCategory::Suv => write!(f, "SUV"),
            VehicleCategory::AutoRickshaw => write!(f, "AUTO_RICKSHAW"),
        }
    }
}

impl FromStr for VehicleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bike" => Ok(VehicleCategory::Bike),
            "sedan" => Ok(VehicleCategory::Sedan),
            "suv" => Ok(VehicleCategory::Suv),
            "auto" | "auto_rickshaw" => Ok(VehicleCategory::AutoRickshaw),
            _ => Err(format!("Unknown vehicle category: {s}")),
        }
    }
}

/// Whether the ride is exclusive or shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideMode {
    Normal,
    Carpool,
}

impl fmt::Display for RideMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RideMode::Normal => write!(f, "NORMAL"),
            RideMode::Carpool => write!(f, "CARPOOL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Available,
    OnTrip,
}

/// Ride lifecycle stages. Ordering follows the lifecycle, so transitions can be
/// checked with plain comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Requested,
    Confirmed,
    InProgress,
    Completed,
}

impl RideStatus {
    /// The only status this one may move to, if any.
    pub fn next(&self) -> Option<RideStatus> {
        match self {
            RideStatus::Requested => Some(RideStatus::Confirmed),
            RideStatus::Confirmed => Some(RideStatus::InProgress),
            RideStatus::InProgress => Some(RideStatus::Completed),
            RideStatus::Completed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Completed)
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RideStatus::Requested => write!(f, "REQUESTED"),
            RideStatus::Confirmed => write!(f, "CONFIRMED"),
            RideStatus::InProgress => write!(f, "IN_PROGRESS"),
            RideStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// A registered rider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rider {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub position: Position,
}

impl Rider {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        phone: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone: phone.into(),
            position,
        }
    }
}

/// A registered driver. Availability is owned by the driver registry and is
/// only flipped by the dispatch service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub category: VehicleCategory,
    pub license_plate: String,
    pub position: Position,
    /// Rating in [0, 5]
    pub rating: f64,
    pub status: DriverStatus,
}

impl Driver {
    /// Creates a driver in the `Available` state.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        phone: impl Into<String>,
        category: VehicleCategory,
        license_plate: impl Into<String>,
        position: Position,
        rating: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone: phone.into(),
            category,
            license_plate: license_plate.into(),
            position,
            rating,
            status: DriverStatus::Available,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == DriverStatus::Available
    }
}

/// What the rider asked for. Embedded unchanged into the ride.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub pickup: Position,
    pub dropoff: Position,
    pub category: VehicleCategory,
    pub mode: RideMode,
}

impl BookingRequest {
    pub fn new(pickup: Position, dropoff: Position, category: VehicleCategory, mode: RideMode) -> Self {
        Self {
            pickup,
            dropoff,
            category,
            mode,
        }
    }

    /// Trip length from pickup to dropoff.
    pub fn trip_distance(&self) -> f64 {
        self.pickup.distance_to(&self.dropoff)
    }
}

/// Read-only view of a ride, taken right after a transition commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideSnapshot {
    pub id: String,
    pub rider: Rider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<Driver>,
    pub booking: BookingRequest,
    pub status: RideStatus,
    /// Settled fare; zero until the ride is completed
    pub fare: f64,
    /// Unix timestamp in milliseconds of the last transition
    pub updated_at: i64,
}

/// Counters describing dispatch activity since the service started.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchStats {
    pub registered_riders: usize,
    pub registered_drivers: usize,
    pub rides_created: u64,
    pub assignments: u64,
    pub declines: u64,
    pub failed_dispatches: u64,
    pub completed_rides: u64,
    pub notification_failures: u64,
}
