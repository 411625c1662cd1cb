//! Ride entity and its lifecycle state machine.
//!
//! A ride only ever moves forward:
//! `REQUESTED -> CONFIRMED -> IN_PROGRESS -> COMPLETED`. Each edge is one
//! method. A transition first checks the current status, then mutates the fields
//! it owns, then fans the new snapshot out to the ride's observers.

mod notifier;

use std::sync::Arc;

pub use notifier::{
    DeliveryFailure, DeliveryReport, DriverNotifier, Notifier, RideObserver, RiderNotifier,
};

use crate::error::{DispatchError, DispatchResult};
use crate::models::{BookingRequest, Driver, RideSnapshot, RideStatus, Rider};

/// Returns the current timestamp in milliseconds since epoch
pub(crate) fn current_timestamp_ms() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Outcome of a committed transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub snapshot: RideSnapshot,
    pub delivery: DeliveryReport,
}

#[derive(Debug)]
pub struct Ride {
    id: String,
    rider: Rider,
    driver: Option<Driver>,
    booking: BookingRequest,
    status: RideStatus,
    fare: f64,
    updated_at: i64,
    notifier: Notifier,
}

impl Ride {
    pub fn new(id: impl Into<String>, rider: Rider, booking: BookingRequest) -> Self {
        Self {
            id: id.into(),
            rider,
            driver: None,
            booking,
            status: RideStatus::Requested,
            fare: 0.0,
            updated_at: current_timestamp_ms(),
            notifier: Notifier::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rider(&self) -> &Rider {
        &self.rider
    }

    pub fn driver(&self) -> Option<&Driver> {
        self.driver.as_ref()
    }

    pub fn booking(&self) -> &BookingRequest {
        &self.booking
    }

    pub fn status(&self) -> RideStatus {
        self.status
    }

    /// Zero until the ride is completed.
    pub fn fare(&self) -> f64 {
        self.fare
    }

    pub fn attach_observer(&mut self, observer: Arc<dyn RideObserver>) {
        self.notifier.attach(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.notifier.len()
    }

    pub fn snapshot(&self) -> RideSnapshot {
        RideSnapshot {
            id: self.id.clone(),
            rider: self.rider.clone(),
            driver: self.driver.clone(),
            booking: self.booking,
            status: self.status,
            fare: self.fare,
            updated_at: self.updated_at,
        }
    }

    /// REQUESTED -> CONFIRMED, binding `driver`.
    pub fn confirm(&mut self, driver: Driver) -> DispatchResult<Transition> {
        self.check_transition(RideStatus::Confirmed)?;
        self.driver = Some(driver);
        Ok(self.commit(RideStatus::Confirmed))
    }

    /// CONFIRMED -> IN_PROGRESS.
    pub fn start(&mut self) -> DispatchResult<Transition> {
        self.check_transition(RideStatus::InProgress)?;
        Ok(self.commit(RideStatus::InProgress))
    }

    /// IN_PROGRESS -> COMPLETED, settling `fare`.
    ///
    /// The fare is checked before anything changes, so a bad amount leaves the
    /// ride in progress.
    pub fn complete(&mut self, fare: f64) -> DispatchResult<Transition> {
        self.check_transition(RideStatus::Completed)?;
        if !fare.is_finite() || fare < 0.0 {
            return Err(DispatchError::invalid_configuration(format!(
                "fare must be finite and non-negative, got {fare}"
            )));
        }
        self.fare = fare;
        Ok(self.commit(RideStatus::Completed))
    }

    /// Fails unless `to` is the immediate successor of the current status.
    pub fn check_transition(&self, to: RideStatus) -> DispatchResult<()> {
        if self.status.next() != Some(to) {
            return Err(DispatchError::InvalidStateTransition {
                ride_id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        Ok(())
    }

    fn commit(&mut self, to: RideStatus) -> Transition {
        log::info!("Ride {}: {} -> {}", self.id, self.status, to);
        self.status = to;
        self.updated_at = current_timestamp_ms();

        let snapshot = self.snapshot();
        let delivery = self.notifier.notify(&snapshot);
        Transition { snapshot, delivery }
    }
}
