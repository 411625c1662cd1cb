use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{DispatchError, DispatchResult};
use crate::models::{Driver, DriverStatus, VehicleCategory};

use super::{validate_identity, validate_position};

/// Drivers keyed by id, remembered in registration order.
///
/// The registry is the single owner of driver availability. Reads hand out
/// clones, so callers can never flip availability behind the registry's back;
/// the only writers are [`DriverRegistry::try_reserve`] and
/// [`DriverRegistry::release`].
#[derive(Debug, Default)]
pub struct DriverRegistry {
    inner: RwLock<DriverTable>,
}

#[derive(Debug, Default)]
struct DriverTable {
    /// Registration order, used to keep candidate pools deterministic
    order: Vec<String>,
    drivers: HashMap<String, Driver>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a driver record.
    ///
    /// Re-registering a driver keeps its position in the registration order and
    /// keeps its current availability, so a driver on a trip cannot be made
    /// available again by an upsert.
    pub fn register(&self, mut driver: Driver) -> DispatchResult<()> {
        validate_identity("driver", &driver.id)?;
        validate_position("driver", &driver.position)?;
        if !driver.rating.is_finite() || !(0.0..=5.0).contains(&driver.rating) {
            return Err(DispatchError::Validation(format!(
                "driver rating must be within [0, 5], got {}",
                driver.rating
            )));
        }

        let mut guard = self.inner.write();
        let table = &mut *guard;
        match table.drivers.get(&driver.id) {
            Some(existing) => {
                driver.status = existing.status;
                log::debug!("Updating driver {} (status kept as {:?})", driver.id, driver.status);
            }
            None => {
                driver.status = DriverStatus::Available;
                table.order.push(driver.id.clone());
            }
        }
        table.drivers.insert(driver.id.clone(), driver);
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Option<Driver> {
        self.inner.read().drivers.get(id).cloned()
    }

    /// Every available driver of `category`, in registration order.
    pub fn available(&self, category: VehicleCategory) -> Vec<Driver> {
        let table = self.inner.read();
        table
            .order
            .iter()
            .filter_map(|id| table.drivers.get(id))
            .filter(|driver| driver.is_available() && driver.category == category)
            .cloned()
            .collect()
    }

    /// Atomically flips the driver from `Available` to `OnTrip`.
    ///
    /// Returns `Ok(false)` when the driver is already on a trip, which is how a
    /// dispatch learns it lost the race for that driver.
    pub fn try_reserve(&self, id: &str) -> DispatchResult<bool> {
        let mut table = self.inner.write();
        let driver = table
            .drivers
            .get_mut(id)
            .ok_or_else(|| DispatchError::driver_not_found(id))?;

        if driver.status != DriverStatus::Available {
            return Ok(false);
        }
        driver.status = DriverStatus::OnTrip;
        Ok(true)
    }

    /// Puts the driver back into the available pool.
    pub fn release(&self, id: &str) -> DispatchResult<()> {
        let mut table = self.inner.write();
        let driver = table
            .drivers
            .get_mut(id)
            .ok_or_else(|| DispatchError::driver_not_found(id))?;
        driver.status = DriverStatus::Available;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().order.is_empty()
    }
}
