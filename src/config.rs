//! Configuration management for the dispatch core.
//!
//! Configuration is read from environment variables with the DISPATCH_ prefix.
//! Any variable left unset keeps its default.
//!
//! # Environment Variables
//! - DISPATCH_ACCEPTANCE_PROBABILITY: Chance a proposed driver accepts (default: 0.6)
//! - DISPATCH_ACCEPTANCE_SEED: Seed for the acceptance simulation (default: unset, random)
//! - DISPATCH_MATCHING_POLICY: `nearest` or `bestRating` (default: nearest)
//! - DISPATCH_NORMAL_BASE_FARE / DISPATCH_NORMAL_PER_KM_RATE (default: 40 / 12.5)
//! - DISPATCH_CARPOOL_BASE_FARE / DISPATCH_CARPOOL_PER_KM_RATE (default: 30 / 10)
//! - DISPATCH_EVENT_BUFFER: Capacity of the event broadcast channel (default: 256)

use std::collections::HashMap;
use std::env;

use serde::Deserialize;

use crate::error::{DispatchError, DispatchResult};
use crate::matching::PolicyKind;
use crate::pricing::{BaseRates, ModeRate};

/// Prefix for all dispatch environment variables.
const ENV_PREFIX: &str = "DISPATCH_";

/// Tunables for the dispatch service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Probability in [0, 1] that a proposed driver accepts the ride.
    pub acceptance_probability: f64,

    /// Optional seed making acceptance decisions reproducible.
    pub acceptance_seed: Option<u64>,

    /// Name of the matching policy active at startup.
    pub matching_policy: String,

    pub normal_base_fare: f64,
    pub normal_per_km_rate: f64,
    pub carpool_base_fare: f64,
    pub carpool_per_km_rate: f64,

    /// Capacity of the dispatch event channel. Must be positive.
    pub event_buffer: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        let rates = BaseRates::default();
        Self {
            acceptance_probability: 0.6,
            acceptance_seed: None,
            matching_policy: PolicyKind::Nearest.to_string(),
            normal_base_fare: rates.normal.base_fare,
            normal_per_km_rate: rates.normal.per_km_rate,
            carpool_base_fare: rates.carpool.base_fare,
            carpool_per_km_rate: rates.carpool.per_km_rate,
            event_buffer: 256,
        }
    }
}

impl DispatchConfig {
    /// Loads configuration from DISPATCH_ environment variables (and a `.env`
    /// file if present), then validates it.
    pub fn from_env() -> DispatchResult<Self> {
        // Load .env file if it exists for local development
        dotenv::dotenv().ok();

        let env_vars: HashMap<String, String> = env::vars()
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .map(|(k, v)| (k.trim_start_matches(ENV_PREFIX).to_string(), v))
            .collect();

        let config = envy::from_iter::<_, Self>(env_vars).map_err(|e| {
            DispatchError::invalid_configuration(format!("Failed to parse environment variables: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`DispatchConfig::from_env`], falling back to defaults on any error.
    pub fn from_env_or_default() -> Self {
        Self::from_env().unwrap_or_else(|e| {
            log::warn!("Using default dispatch configuration: {}", e);
            Self::default()
        })
    }

    pub fn with_acceptance_probability(mut self, probability: f64) -> Self {
        self.acceptance_probability = probability;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.acceptance_seed = Some(seed);
        self
    }

    pub fn with_matching_policy(mut self, policy: PolicyKind) -> Self {
        self.matching_policy = policy.to_string();
        self
    }

    pub fn policy_kind(&self) -> DispatchResult<PolicyKind> {
        self.matching_policy.parse()
    }

    pub fn base_rates(&self) -> BaseRates {
        BaseRates {
            normal: ModeRate {
                base_fare: self.normal_base_fare,
                per_km_rate: self.normal_per_km_rate,
            },
            carpool: ModeRate {
                base_fare: self.carpool_base_fare,
                per_km_rate: self.carpool_per_km_rate,
            },
        }
    }

    /// # Validation Rules
    /// - Acceptance probability within [0, 1]
    /// - Matching policy is a known name
    /// - Fares and rates finite and non-negative
    /// - Event buffer positive
    pub fn validate(&self) -> DispatchResult<()> {
        if !(0.0..=1.0).contains(&self.acceptance_probability) {
            return Err(DispatchError::invalid_configuration(format!(
                "acceptance_probability must be within [0, 1], got {}",
                self.acceptance_probability
            )));
        }
        self.policy_kind()?;
        self.base_rates().validate()?;
        if self.event_buffer == 0 {
            return Err(DispatchError::invalid_configuration("event_buffer must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 4] = [
        "DISPATCH_ACCEPTANCE_PROBABILITY",
        "DISPATCH_ACCEPTANCE_SEED",
        "DISPATCH_MATCHING_POLICY",
        "DISPATCH_NORMAL_BASE_FARE",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = DispatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.policy_kind().unwrap(), PolicyKind::Nearest);
        assert_eq!(config.base_rates(), BaseRates::default());
    }

    #[test]
    fn test_validation_failures() {
        let config = DispatchConfig::default().with_acceptance_probability(1.01);
        assert!(matches!(config.validate(), Err(DispatchError::InvalidConfiguration(_))));

        let config = DispatchConfig {
            matching_policy: "random".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DispatchConfig {
            carpool_per_km_rate: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DispatchConfig {
            event_buffer: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides_some_fields() {
        clear_env();
        env::set_var("DISPATCH_ACCEPTANCE_PROBABILITY", "0.25");
        env::set_var("DISPATCH_ACCEPTANCE_SEED", "99");
        env::set_var("DISPATCH_MATCHING_POLICY", "bestRating");

        let config = DispatchConfig::from_env().unwrap();
        assert_eq!(config.acceptance_probability, 0.25);
        assert_eq!(config.acceptance_seed, Some(99));
        assert_eq!(config.policy_kind().unwrap(), PolicyKind::BestRating);
        assert_eq!(config.normal_base_fare, 40.0);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_env_falls_back_to_default() {
        clear_env();
        env::set_var("DISPATCH_NORMAL_BASE_FARE", "not-a-number");

        assert!(DispatchConfig::from_env().is_err());
        assert_eq!(DispatchConfig::from_env_or_default(), DispatchConfig::default());

        clear_env();
    }
}
