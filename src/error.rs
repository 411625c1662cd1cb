//! Error types for the dispatch core.
//!
//! Every fallible operation on [`crate::service::DispatchService`] returns a
//! [`DispatchError`]. Observer delivery failures use the separate [`NotifyError`]
//! type because they never fail the transition that triggered them.

use thiserror::Error;

use crate::models::RideStatus;

/// Convenience alias used across the crate.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Why a dispatch attempt ended without a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionReason {
    /// No available driver of the requested category when matching started
    EmptyPool,
    /// Every candidate declined or was taken by a concurrent dispatch
    AllDeclined,
    /// The matching policy returned nothing for a non-empty pool
    PolicyAbstained,
}

impl std::fmt::Display for ExhaustionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExhaustionReason::EmptyPool => write!(f, "no candidates in pool"),
            ExhaustionReason::AllDeclined => write!(f, "every candidate declined"),
            ExhaustionReason::PolicyAbstained => write!(f, "matching policy selected no candidate"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("No drivers available for ride {ride_id}: {reason}")]
    NoDriversAvailable {
        ride_id: String,
        reason: ExhaustionReason,
    },

    #[error("Invalid state transition for ride {ride_id}: {from} -> {to}")]
    InvalidStateTransition {
        ride_id: String,
        from: RideStatus,
        to: RideStatus,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid input: {0}")]
    Validation(String),
}

impl DispatchError {
    pub fn rider_not_found(id: impl Into<String>) -> Self {
        DispatchError::NotFound { kind: "rider", id: id.into() }
    }

    pub fn driver_not_found(id: impl Into<String>) -> Self {
        DispatchError::NotFound { kind: "driver", id: id.into() }
    }

    pub fn ride_not_found(id: impl Into<String>) -> Self {
        DispatchError::NotFound { kind: "ride", id: id.into() }
    }

    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        DispatchError::InvalidConfiguration(msg.into())
    }
}

/// Failure of a single observer during notification fan-out.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Observer panicked: {0}")]
    Panicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = DispatchError::rider_not_found("R9");
        assert_eq!(error.to_string(), "rider not found: R9");

        let error = DispatchError::InvalidStateTransition {
            ride_id: "RIDE_1".to_string(),
            from: RideStatus::Requested,
            to: RideStatus::InProgress,
        };
        assert_eq!(
            error.to_string(),
            "Invalid state transition for ride RIDE_1: REQUESTED -> IN_PROGRESS"
        );
    }

    #[test]
    fn test_exhaustion_reason_in_message() {
        let error = DispatchError::NoDriversAvailable {
            ride_id: "RIDE_2".to_string(),
            reason: ExhaustionReason::AllDeclined,
        };
        assert!(error.to_string().contains("every candidate declined"));
    }
}
