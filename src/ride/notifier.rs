//! Per-ride notification fan-out.
//!
//! Observers run synchronously, in attachment order, on the thread that
//! performed the transition. A failing or panicking observer is recorded in the
//! [`DeliveryReport`] and the remaining observers still run.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::NotifyError;
use crate::models::RideSnapshot;

/// Receives a snapshot of a ride after each lifecycle transition.
pub trait RideObserver: Send + Sync {
    fn name(&self) -> &str {
        "observer"
    }

    fn on_update(&self, ride: &RideSnapshot) -> Result<(), NotifyError>;
}

impl<F> RideObserver for F
where
    F: Fn(&RideSnapshot) -> Result<(), NotifyError> + Send + Sync,
{
    fn on_update(&self, ride: &RideSnapshot) -> Result<(), NotifyError> {
        self(ride)
    }
}

/// Logs every update addressed to the rider.
#[derive(Debug, Default, Clone, Copy)]
pub struct RiderNotifier;

impl RideObserver for RiderNotifier {
    fn name(&self) -> &str {
        "rider"
    }

    fn on_update(&self, ride: &RideSnapshot) -> Result<(), NotifyError> {
        log::info!(
            "[Rider Notification] {} ({}): ride {} is {}",
            ride.rider.name,
            ride.rider.phone,
            ride.id,
            ride.status
        );
        Ok(())
    }
}

/// Logs every update addressed to the assigned driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct DriverNotifier;

impl RideObserver for DriverNotifier {
    fn name(&self) -> &str {
        "driver"
    }

    fn on_update(&self, ride: &RideSnapshot) -> Result<(), NotifyError> {
        match &ride.driver {
            Some(driver) => log::info!(
                "[Driver Notification] {} ({} {}): ride {} is {}",
                driver.name,
                driver.category,
                driver.license_plate,
                ride.id,
                ride.status
            ),
            None => log::debug!("[Driver Notification] ride {} has no driver yet", ride.id),
        }
        Ok(())
    }
}

/// One observer that did not take the update.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryFailure {
    /// Position of the observer in attachment order
    pub index: usize,
    pub observer: String,
    pub error: NotifyError,
}

/// Result of one fan-out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Observers attached to a single ride.
#[derive(Default, Clone)]
pub struct Notifier {
    observers: Vec<Arc<dyn RideObserver>>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("observers", &self.observers.iter().map(|o| o.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// No duplicate detection: attaching twice delivers twice.
    pub fn attach(&mut self, observer: Arc<dyn RideObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn notify(&self, ride: &RideSnapshot) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for (index, observer) in self.observers.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| observer.on_update(ride)))
                .unwrap_or_else(|payload| Err(NotifyError::Panicked(panic_message(&*payload))));

            match outcome {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    log::warn!(
                        "Observer {} ({}) failed for ride {}: {}",
                        index,
                        observer.name(),
                        ride.id,
                        error
                    );
                    report.failures.push(DeliveryFailure {
                        index,
                        observer: observer.name().to_string(),
                        error,
                    });
                }
            }
        }
        report
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingRequest, Position, RideMode, RideStatus, Rider, VehicleCategory};
    use parking_lot::Mutex;

    fn snapshot() -> RideSnapshot {
        RideSnapshot {
            id: "RIDE_1".to_string(),
            rider: Rider::new("R1", "Alice", "111-222", Position::new(0.0, 0.0)),
            driver: None,
            booking: BookingRequest::new(
                Position::new(0.0, 0.0),
                Position::new(3.0, 4.0),
                VehicleCategory::Sedan,
                RideMode::Normal,
            ),
            status: RideStatus::Requested,
            fare: 0.0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_observers_run_in_attachment_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut notifier = Notifier::new();
        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            notifier.attach(Arc::new(move |_: &RideSnapshot| -> Result<(), NotifyError> {
                seen.lock().push(tag);
                Ok(())
            }));
        }

        let report = notifier.notify(&snapshot());
        assert_eq!(report.delivered, 3);
        assert!(report.is_clean());
        assert_eq!(*seen.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_failures_are_isolated() {
        let calls = Arc::new(Mutex::new(0));
        let mut notifier = Notifier::new();
        notifier.attach(Arc::new(|_: &RideSnapshot| -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("offline".into()))
        }));
        notifier.attach(Arc::new(|_: &RideSnapshot| -> Result<(), NotifyError> {
            panic!("observer blew up")
        }));
        let counter = calls.clone();
        notifier.attach(Arc::new(move |_: &RideSnapshot| -> Result<(), NotifyError> {
            *counter.lock() += 1;
            Ok(())
        }));

        let report = notifier.notify(&snapshot());
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].index, 0);
        assert_eq!(report.failures[0].error, NotifyError::Delivery("offline".into()));
        assert_eq!(
            report.failures[1].error,
            NotifyError::Panicked("observer blew up".into())
        );
        assert_eq!(*calls.lock(), 1);
    }

    #[test]
    fn test_builtin_notifiers_accept_updates() {
        let mut notifier = Notifier::new();
        notifier.attach(Arc::new(RiderNotifier));
        notifier.attach(Arc::new(DriverNotifier));
        let report = notifier.notify(&snapshot());
        assert_eq!(report.delivered, 2);
        assert_eq!(notifier.len(), 2);
    }
}
