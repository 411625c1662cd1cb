//! Identity-keyed stores for riders and drivers.
//!
//! The [`Directory`] is the context object handed to the dispatch service. It
//! replaces process-wide registries so every service (and every test) starts
//! from its own fresh state.

mod drivers;
mod riders;

pub use drivers::DriverRegistry;
pub use riders::RiderRegistry;

use crate::error::{DispatchError, DispatchResult};
use crate::models::Position;

/// Rider and driver registries owned together.
#[derive(Debug, Default)]
pub struct Directory {
    riders: RiderRegistry,
    drivers: DriverRegistry,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn riders(&self) -> &RiderRegistry {
        &self.riders
    }

    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }
}

pub(crate) fn validate_identity(kind: &str, id: &str) -> DispatchResult<()> {
    if id.trim().is_empty() {
        return Err(DispatchError::Validation(format!("{kind} id must not be empty")));
    }
    Ok(())
}

pub(crate) fn validate_position(label: &str, position: &Position) -> DispatchResult<()> {
    if !position.is_finite() {
        return Err(DispatchError::Validation(format!(
            "{label} coordinates must be finite, got {position}"
        )));
    }
    Ok(())
}
