use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::DispatchResult;
use crate::models::Rider;

use super::{validate_identity, validate_position};

/// Riders keyed by id. Registration is an upsert.
#[derive(Debug, Default)]
pub struct RiderRegistry {
    riders: RwLock<HashMap<String, Rider>>,
}

impl RiderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the rider, replacing any existing record with the same id.
    pub fn register(&self, rider: Rider) -> DispatchResult<()> {
        validate_identity("rider", &rider.id)?;
        validate_position("rider", &rider.position)?;

        let mut riders = self.riders.write();
        if riders.insert(rider.id.clone(), rider).is_some() {
            log::debug!("Replaced existing rider record");
        }
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Option<Rider> {
        self.riders.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.riders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.riders.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::models::Position;

    #[test]
    fn test_register_is_upsert() {
        let registry = RiderRegistry::new();
        registry
            .register(Rider::new("R1", "Alice", "111-222", Position::new(0.0, 0.0)))
            .unwrap();
        registry
            .register(Rider::new("R1", "Alicia", "111-222", Position::new(1.0, 1.0)))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("R1").unwrap().name, "Alicia");
        assert!(registry.lookup("R2").is_none());
    }

    #[test]
    fn test_rejects_non_finite_position() {
        let registry = RiderRegistry::new();
        let result = registry.register(Rider::new("R1", "Alice", "1", Position::new(f64::NAN, 0.0)));
        assert!(matches!(result, Err(DispatchError::Validation(_))));
        assert!(registry.is_empty());
    }
}
