use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use crate::acceptance::{AcceptanceOracle, RandomAcceptance};
use crate::config::DispatchConfig;
use crate::directory::{validate_position, Directory};
use crate::error::{DispatchError, DispatchResult, ExhaustionReason};
use crate::events::{DispatchEvent, DispatchEventKind, EventBus};
use crate::matching::MatchingPolicy;
use crate::models::{
    BookingRequest, DispatchStats, Driver, DriverStatus, Position, RideMode, RideSnapshot,
    RideStatus, Rider, VehicleCategory,
};
use crate::pricing::{PricingPipeline, PricingSpec};
use crate::ride::{DeliveryReport, DriverNotifier, Ride, RideObserver, RiderNotifier};

/// Rides in creation order. Each ride sits behind its own mutex so that
/// matching and transitions on one ride are serialized while different rides
/// proceed in parallel.
#[derive(Default)]
struct RideBook {
    order: Vec<String>,
    rides: HashMap<String, Arc<Mutex<Ride>>>,
}

#[derive(Default)]
struct Counters {
    rides_created: AtomicU64,
    assignments: AtomicU64,
    declines: AtomicU64,
    failed_dispatches: AtomicU64,
    completed_rides: AtomicU64,
    notification_failures: AtomicU64,
}

/// Dispatch coordinator.
///
/// Owns the ride book and the active matching policy, and drives every ride
/// through booking, matching, start and completion. Registries live in the
/// shared [`Directory`]; the service is the only component that flips driver
/// availability.
pub struct DispatchService {
    directory: Arc<Directory>,
    rides: RwLock<RideBook>,
    ride_counter: AtomicU64,
    policy: RwLock<Arc<dyn MatchingPolicy>>,
    oracle: Arc<dyn AcceptanceOracle>,
    config: DispatchConfig,
    events: EventBus,
    counters: Counters,
}

impl DispatchService {
    /// Creates a service with a fresh directory and random acceptance driven
    /// by the configured probability and seed.
    pub fn new(config: Option<DispatchConfig>) -> DispatchResult<Self> {
        let config = config.unwrap_or_default();
        config.validate()?;
        let oracle = Arc::new(RandomAcceptance::new(
            config.acceptance_probability,
            config.acceptance_seed,
        )?);
        Self::with_components(config, Arc::new(Directory::new()), oracle)
    }

    /// Creates a service around an existing directory and acceptance oracle.
    pub fn with_components(
        config: DispatchConfig,
        directory: Arc<Directory>,
        oracle: Arc<dyn AcceptanceOracle>,
    ) -> DispatchResult<Self> {
        config.validate()?;
        let policy = config.policy_kind()?.build();
        log::info!(
            "Creating dispatch service (policy: {}, acceptance probability: {})",
            policy.name(),
            config.acceptance_probability
        );

        Ok(Self {
            directory,
            rides: RwLock::new(RideBook::default()),
            ride_counter: AtomicU64::new(0),
            policy: RwLock::new(policy),
            oracle,
            events: EventBus::new(config.event_buffer),
            config,
            counters: Counters::default(),
        })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn register_rider(
        &self,
        id: &str,
        name: &str,
        phone: &str,
        position: Position,
    ) -> DispatchResult<()> {
        self.directory
            .riders()
            .register(Rider::new(id, name, phone, position))?;
        log::info!("Registered rider {} ({})", id, name);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn register_driver(
        &self,
        id: &str,
        name: &str,
        phone: &str,
        category: VehicleCategory,
        license_plate: &str,
        position: Position,
        rating: f64,
    ) -> DispatchResult<()> {
        self.directory.drivers().register(Driver::new(
            id,
            name,
            phone,
            category,
            license_plate,
            position,
            rating,
        ))?;
        log::info!("Registered driver {} ({}, {}, rating {:.1})", id, name, category, rating);
        Ok(())
    }

    pub fn lookup_rider(&self, id: &str) -> DispatchResult<Rider> {
        self.directory
            .riders()
            .lookup(id)
            .ok_or_else(|| DispatchError::rider_not_found(id))
    }

    pub fn lookup_driver(&self, id: &str) -> DispatchResult<Driver> {
        self.directory
            .drivers()
            .lookup(id)
            .ok_or_else(|| DispatchError::driver_not_found(id))
    }

    /// Available drivers of `category` in registration order.
    pub fn available_drivers(&self, category: VehicleCategory) -> Vec<Driver> {
        self.directory.drivers().available(category)
    }

    /// Books a ride for a registered rider and returns its id.
    pub fn create_ride(
        &self,
        rider_id: &str,
        pickup: Position,
        dropoff: Position,
        category: VehicleCategory,
        mode: RideMode,
    ) -> DispatchResult<String> {
        self.book(rider_id, BookingRequest::new(pickup, dropoff, category, mode))
    }

    /// Same as [`DispatchService::create_ride`] with a prepared booking.
    pub fn book(&self, rider_id: &str, booking: BookingRequest) -> DispatchResult<String> {
        let rider = self.lookup_rider(rider_id)?;
        validate_position("pickup", &booking.pickup)?;
        validate_position("dropoff", &booking.dropoff)?;

        let ride_id = format!("RIDE_{}", self.ride_counter.fetch_add(1, Ordering::SeqCst) + 1);
        let mut ride = Ride::new(ride_id.clone(), rider, booking);
        ride.attach_observer(Arc::new(RiderNotifier));
        ride.attach_observer(Arc::new(DriverNotifier));

        {
            let mut book = self.rides.write();
            book.order.push(ride_id.clone());
            book.rides.insert(ride_id.clone(), Arc::new(Mutex::new(ride)));
        }

        self.counters.rides_created.fetch_add(1, Ordering::Relaxed);
        log::info!(
            "Ride {} requested by {}: {} -> {} ({}, {})",
            ride_id,
            rider_id,
            booking.pickup,
            booking.dropoff,
            booking.category,
            booking.mode
        );
        self.events.publish(&ride_id, DispatchEventKind::RideRequested);
        Ok(ride_id)
    }

    /// Adds an observer to a ride. It sees every transition from now on.
    pub fn attach_observer(&self, ride_id: &str, observer: Arc<dyn RideObserver>) -> DispatchResult<()> {
        let handle = self.ride_handle(ride_id)?;
        handle.lock().attach_observer(observer);
        Ok(())
    }

    /// Binds a driver to a requested ride.
    ///
    /// The matching process follows these steps:
    /// 1. Collect available drivers of the requested category
    /// 2. Let the active policy pick one candidate
    /// 3. Ask the acceptance oracle whether that driver takes the job
    /// 4. On acceptance, reserve the driver atomically and confirm the ride
    /// 5. On decline (or if a concurrent dispatch reserved the driver first),
    ///    drop the candidate from the pool and go back to step 2
    ///
    /// # Returns
    /// - Ok(snapshot) of the confirmed ride
    /// - Err(DispatchError::NoDriversAvailable) when the pool runs dry; the ride stays REQUESTED
    /// - Err(DispatchError::InvalidStateTransition) if the ride is not REQUESTED
    pub fn assign_driver(&self, ride_id: &str) -> DispatchResult<RideSnapshot> {
        let handle = self.ride_handle(ride_id)?;
        let mut ride = handle.lock();
        ride.check_transition(RideStatus::Confirmed)?;

        let booking = *ride.booking();
        let policy = self.policy.read().clone();
        let mut candidates = self.directory.drivers().available(booking.category);
        log::debug!(
            "Matching ride {} with policy {} over {} candidates",
            ride_id,
            policy.name(),
            candidates.len()
        );

        if candidates.is_empty() {
            return Err(self.dispatch_failed(ride_id, ExhaustionReason::EmptyPool));
        }

        let mut attempt = 0;
        loop {
            if candidates.is_empty() {
                return Err(self.dispatch_failed(ride_id, ExhaustionReason::AllDeclined));
            }
            let chosen = match policy.select(&booking.pickup, &candidates) {
                Some(driver) => driver.clone(),
                None => return Err(self.dispatch_failed(ride_id, ExhaustionReason::PolicyAbstained)),
            };
            attempt += 1;

            if !self.oracle.accepts(&chosen, attempt) {
                log::info!("Driver {} rejected ride {}. Trying next driver...", chosen.id, ride_id);
                self.counters.declines.fetch_add(1, Ordering::Relaxed);
                self.events.publish(
                    ride_id,
                    DispatchEventKind::DriverDeclined {
                        driver_id: chosen.id.clone(),
                        attempt,
                    },
                );
                remove_candidate(&mut candidates, &chosen.id);
                continue;
            }

            if !self.directory.drivers().try_reserve(&chosen.id)? {
                log::info!("Driver {} was taken by another ride before {} could bind it", chosen.id, ride_id);
                self.events.publish(
                    ride_id,
                    DispatchEventKind::DriverTaken {
                        driver_id: chosen.id.clone(),
                    },
                );
                remove_candidate(&mut candidates, &chosen.id);
                continue;
            }

            let mut driver = chosen;
            driver.status = DriverStatus::OnTrip;
            let driver_id = driver.id.clone();
            let transition = match ride.confirm(driver) {
                Ok(transition) => transition,
                Err(e) => {
                    self.directory.drivers().release(&driver_id)?;
                    return Err(e);
                }
            };

            self.counters.assignments.fetch_add(1, Ordering::Relaxed);
            log::info!("Driver {} assigned to ride {} on attempt {}", driver_id, ride_id, attempt);
            self.events.publish(
                ride_id,
                DispatchEventKind::DriverAssigned {
                    driver_id,
                    attempt,
                },
            );
            self.report_delivery(ride_id, &transition.delivery);
            return Ok(transition.snapshot);
        }
    }

    /// CONFIRMED -> IN_PROGRESS.
    pub fn start_ride(&self, ride_id: &str) -> DispatchResult<RideSnapshot> {
        let handle = self.ride_handle(ride_id)?;
        let transition = handle.lock().start()?;

        self.events.publish(ride_id, DispatchEventKind::RideStarted);
        self.report_delivery(ride_id, &transition.delivery);
        Ok(transition.snapshot)
    }

    /// IN_PROGRESS -> COMPLETED. Prices the ride with `pipeline`, settles the
    /// fare and releases the driver.
    ///
    /// The state and the pipeline are both checked before the ride changes, so
    /// a misconfigured pipeline leaves the ride in progress.
    pub fn complete_ride(&self, ride_id: &str, pipeline: &PricingPipeline) -> DispatchResult<f64> {
        let handle = self.ride_handle(ride_id)?;
        let mut ride = handle.lock();
        ride.check_transition(RideStatus::Completed)?;

        let fare = pipeline.compute(ride.booking())?;
        let driver_id = ride.driver().map(|driver| driver.id.clone());
        let transition = ride.complete(fare)?;

        if let Some(driver_id) = driver_id {
            // The ride is already settled; a failed release must not mask that
            if let Err(e) = self.directory.drivers().release(&driver_id) {
                log::error!("Failed to release driver {} after ride {}: {}", driver_id, ride_id, e);
            }
        }

        self.counters.completed_rides.fetch_add(1, Ordering::Relaxed);
        log::info!("Ride {} completed, fare {:.2}", ride_id, fare);
        self.events.publish(ride_id, DispatchEventKind::RideCompleted { fare });
        self.report_delivery(ride_id, &transition.delivery);
        Ok(fare)
    }

    /// Completes a ride with a pipeline described as data, using the
    /// configured rate table unless the spec carries its own.
    pub fn complete_ride_with_spec(&self, ride_id: &str, spec: &PricingSpec) -> DispatchResult<f64> {
        let pipeline = spec.build(self.config.base_rates())?;
        self.complete_ride(ride_id, &pipeline)
    }

    /// Base pipeline over the configured rate table.
    pub fn pricing_pipeline(&self) -> PricingPipeline {
        PricingPipeline::base(self.config.base_rates())
    }

    pub fn get_ride(&self, ride_id: &str) -> DispatchResult<RideSnapshot> {
        Ok(self.ride_handle(ride_id)?.lock().snapshot())
    }

    /// Snapshots of every ride in creation order.
    pub fn rides(&self) -> Vec<RideSnapshot> {
        let handles: Vec<Arc<Mutex<Ride>>> = {
            let book = self.rides.read();
            book.order
                .iter()
                .filter_map(|id| book.rides.get(id).cloned())
                .collect()
        };
        handles.iter().map(|handle| handle.lock().snapshot()).collect()
    }

    /// Switches to a built-in policy by name (`nearest` or `bestRating`).
    pub fn set_matching_policy(&self, name: &str) -> DispatchResult<()> {
        let kind = name.parse::<crate::matching::PolicyKind>()?;
        self.set_matching_policy_impl(kind.build());
        Ok(())
    }

    /// Installs a caller-supplied policy. Dispatches already running keep the
    /// policy they started with.
    pub fn set_matching_policy_impl(&self, policy: Arc<dyn MatchingPolicy>) {
        log::info!("Matching policy set to {}", policy.name());
        *self.policy.write() = policy;
    }

    pub fn matching_policy_name(&self) -> String {
        self.policy.read().name().to_string()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            registered_riders: self.directory.riders().len(),
            registered_drivers: self.directory.drivers().len(),
            rides_created: self.counters.rides_created.load(Ordering::Relaxed),
            assignments: self.counters.assignments.load(Ordering::Relaxed),
            declines: self.counters.declines.load(Ordering::Relaxed),
            failed_dispatches: self.counters.failed_dispatches.load(Ordering::Relaxed),
            completed_rides: self.counters.completed_rides.load(Ordering::Relaxed),
            notification_failures: self.counters.notification_failures.load(Ordering::Relaxed),
        }
    }

    fn ride_handle(&self, ride_id: &str) -> DispatchResult<Arc<Mutex<Ride>>> {
        self.rides
            .read()
            .rides
            .get(ride_id)
            .cloned()
            .ok_or_else(|| DispatchError::ride_not_found(ride_id))
    }

    fn dispatch_failed(&self, ride_id: &str, reason: ExhaustionReason) -> DispatchError {
        log::warn!("No drivers available for ride {}: {}", ride_id, reason);
        self.counters.failed_dispatches.fetch_add(1, Ordering::Relaxed);
        self.events
            .publish(ride_id, DispatchEventKind::DispatchFailed { reason });
        DispatchError::NoDriversAvailable {
            ride_id: ride_id.to_string(),
            reason,
        }
    }

    fn report_delivery(&self, ride_id: &str, report: &DeliveryReport) {
        for failure in &report.failures {
            self.counters.notification_failures.fetch_add(1, Ordering::Relaxed);
            self.events.publish(
                ride_id,
                DispatchEventKind::NotificationFailed {
                    observer: failure.observer.clone(),
                    error: failure.error.to_string(),
                },
            );
        }
    }
}

/// Removes exactly one candidate with the given id.
fn remove_candidate(candidates: &mut Vec<Driver>, driver_id: &str) {
    if let Some(index) = candidates.iter().position(|driver| driver.id == driver_id) {
        candidates.remove(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceptance::ScriptedAcceptance;

    fn service(oracle: Arc<dyn AcceptanceOracle>) -> DispatchService {
        let service =
            DispatchService::with_components(DispatchConfig::default(), Arc::new(Directory::new()), oracle)
                .unwrap();
        service
            .register_rider("R1", "Alice", "111-222", Position::new(0.0, 0.0))
            .unwrap();
        service
            .register_driver("D1", "John", "555-666", VehicleCategory::Sedan, "DL123", Position::new(1.0, 1.0), 4.8)
            .unwrap();
        service
            .register_driver("D3", "Sarah", "999-000", VehicleCategory::Sedan, "DL789", Position::new(2.0, 2.0), 4.95)
            .unwrap();
        service
    }

    fn sedan_ride(service: &DispatchService) -> String {
        service
            .create_ride(
                "R1",
                Position::new(0.0, 0.0),
                Position::new(10.0, 10.0),
                VehicleCategory::Sedan,
                RideMode::Normal,
            )
            .unwrap()
    }

    #[test]
    fn test_ride_ids_are_sequential() {
        let service = service(Arc::new(ScriptedAcceptance::always(true)));
        assert_eq!(sedan_ride(&service), "RIDE_1");
        assert_eq!(sedan_ride(&service), "RIDE_2");
        assert_eq!(service.rides().len(), 2);
    }

    #[test]
    fn test_decline_falls_through_to_next_candidate() {
        let service = service(Arc::new(ScriptedAcceptance::new([false], true)));
        let ride_id = sedan_ride(&service);

        let snapshot = service.assign_driver(&ride_id).unwrap();
        assert_eq!(snapshot.driver.unwrap().id, "D3");
        assert_eq!(service.lookup_driver("D1").unwrap().status, DriverStatus::Available);
        assert_eq!(service.lookup_driver("D3").unwrap().status, DriverStatus::OnTrip);
        assert_eq!(service.stats().declines, 1);
    }

    #[test]
    fn test_remove_candidate_drops_one_instance() {
        let driver = Driver::new("D1", "John", "1", VehicleCategory::Sedan, "P", Position::new(0.0, 0.0), 4.0);
        let mut pool = vec![driver.clone(), driver.clone()];
        remove_candidate(&mut pool, "D1");
        assert_eq!(pool.len(), 1);
        remove_candidate(&mut pool, "missing");
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_policy_switch_by_name() {
        let service = service(Arc::new(ScriptedAcceptance::always(true)));
        assert_eq!(service.matching_policy_name(), "nearest");
        service.set_matching_policy("bestRating").unwrap();
        assert_eq!(service.matching_policy_name(), "bestRating");
        assert!(matches!(
            service.set_matching_policy("cheapest"),
            Err(DispatchError::InvalidConfiguration(_))
        ));

        let ride_id = sedan_ride(&service);
        let snapshot = service.assign_driver(&ride_id).unwrap();
        assert_eq!(snapshot.driver.unwrap().id, "D3");
    }
}
