//! Fare computation.
//!
//! A fare is produced by a chain of [`FareStage`]s: exactly one base stage at
//! the bottom, wrapped by any number of adjustments. Wrapping order is the
//! application order, so surge-then-discount and discount-then-surge give
//! different fares.
//!
//! Formula of the base stage: `fare = base_fare + trip_distance * per_km_rate`,
//! with both constants picked by ride mode.

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, DispatchResult};
use crate::models::{BookingRequest, RideMode};

/// Base fare and per-distance rate for one ride mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeRate {
    pub base_fare: f64,
    pub per_km_rate: f64,
}

/// Rate table covering every ride mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseRates {
    pub normal: ModeRate,
    pub carpool: ModeRate,
}

impl Default for BaseRates {
    fn default() -> Self {
        Self {
            normal: ModeRate {
                base_fare: 40.0,
                per_km_rate: 12.5,
            },
            carpool: ModeRate {
                base_fare: 30.0,
                per_km_rate: 10.0,
            },
        }
    }
}

impl BaseRates {
    pub fn for_mode(&self, mode: RideMode) -> ModeRate {
        match mode {
            RideMode::Normal => self.normal,
            RideMode::Carpool => self.carpool,
        }
    }

    pub fn validate(&self) -> DispatchResult<()> {
        for (label, rate) in [("normal", self.normal), ("carpool", self.carpool)] {
            if !rate.base_fare.is_finite() || rate.base_fare < 0.0 {
                return Err(DispatchError::invalid_configuration(format!(
                    "{label} base fare must be finite and non-negative, got {}",
                    rate.base_fare
                )));
            }
            if !rate.per_km_rate.is_finite() || rate.per_km_rate < 0.0 {
                return Err(DispatchError::invalid_configuration(format!(
                    "{label} per-km rate must be finite and non-negative, got {}",
                    rate.per_km_rate
                )));
            }
        }
        Ok(())
    }
}

/// One stage of the fare chain.
#[derive(Debug, Clone, PartialEq)]
pub enum FareStage {
    Base(BaseRates),
    /// Multiplies the inner fare by `multiplier` (> 0)
    Surge { inner: Box<FareStage>, multiplier: f64 },
    /// Subtracts a flat `amount` from the inner fare, never going below zero
    Discount { inner: Box<FareStage>, amount: f64 },
}

impl FareStage {
    pub fn compute(&self, booking: &BookingRequest) -> f64 {
        match self {
            FareStage::Base(rates) => {
                let rate = rates.for_mode(booking.mode);
                rate.base_fare + booking.trip_distance() * rate.per_km_rate
            }
            FareStage::Surge { inner, multiplier } => inner.compute(booking) * multiplier,
            FareStage::Discount { inner, amount } => (inner.compute(booking) - amount).max(0.0),
        }
    }

    /// Checks every stage in the chain.
    pub fn validate(&self) -> DispatchResult<()> {
        match self {
            FareStage::Base(rates) => rates.validate(),
            FareStage::Surge { inner, multiplier } => {
                validate_multiplier(*multiplier)?;
                inner.validate()
            }
            FareStage::Discount { inner, amount } => {
                validate_discount(*amount)?;
                inner.validate()
            }
        }
    }

    /// Number of adjustments wrapped around the base stage.
    pub fn depth(&self) -> usize {
        match self {
            FareStage::Base(_) => 0,
            FareStage::Surge { inner, .. } | FareStage::Discount { inner, .. } => 1 + inner.depth(),
        }
    }
}

fn validate_multiplier(multiplier: f64) -> DispatchResult<()> {
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return Err(DispatchError::invalid_configuration(format!(
            "surge multiplier must be positive, got {multiplier}"
        )));
    }
    Ok(())
}

fn validate_discount(amount: f64) -> DispatchResult<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(DispatchError::invalid_configuration(format!(
            "discount must be finite and non-negative, got {amount}"
        )));
    }
    Ok(())
}

/// Builder over [`FareStage`] that validates each adjustment as it is added.
///
/// ```
/// use ride_dispatch::pricing::{BaseRates, PricingPipeline};
///
/// let pipeline = PricingPipeline::base(BaseRates::default())
///     .surge(1.2)
///     .and_then(|p| p.discount(10.0))
///     .unwrap();
/// assert_eq!(pipeline.stage().depth(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PricingPipeline {
    stage: FareStage,
}

impl Default for PricingPipeline {
    fn default() -> Self {
        Self::base(BaseRates::default())
    }
}

impl PricingPipeline {
    pub fn base(rates: BaseRates) -> Self {
        Self {
            stage: FareStage::Base(rates),
        }
    }

    /// Wraps a hand-built chain. The chain is validated before any fare is computed.
    pub fn from_stage(stage: FareStage) -> Self {
        Self { stage }
    }

    pub fn surge(self, multiplier: f64) -> DispatchResult<Self> {
        validate_multiplier(multiplier)?;
        Ok(Self {
            stage: FareStage::Surge {
                inner: Box::new(self.stage),
                multiplier,
            },
        })
    }

    pub fn discount(self, amount: f64) -> DispatchResult<Self> {
        validate_discount(amount)?;
        Ok(Self {
            stage: FareStage::Discount {
                inner: Box::new(self.stage),
                amount,
            },
        })
    }

    pub fn stage(&self) -> &FareStage {
        &self.stage
    }

    pub fn validate(&self) -> DispatchResult<()> {
        self.stage.validate()
    }

    /// Validates the chain, then computes the fare for `booking`.
    pub fn compute(&self, booking: &BookingRequest) -> DispatchResult<f64> {
        self.validate()?;
        let fare = self.stage.compute(booking);
        if !fare.is_finite() || fare < 0.0 {
            return Err(DispatchError::invalid_configuration(format!(
                "pricing produced an invalid fare: {fare}"
            )));
        }
        Ok(fare)
    }
}

/// A fare adjustment described as data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Adjustment {
    Surge { multiplier: f64 },
    Discount { amount: f64 },
}

/// Serializable description of a pricing pipeline.
///
/// Adjustments are applied in list order, innermost first. When `rates` is
/// absent the caller's default table is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rates: Option<BaseRates>,
    #[serde(default)]
    pub adjustments: Vec<Adjustment>,
}

impl PricingSpec {
    pub fn build(&self, default_rates: BaseRates) -> DispatchResult<PricingPipeline> {
        let rates = self.rates.unwrap_or(default_rates);
        rates.validate()?;
        self.adjustments
            .iter()
            .try_fold(PricingPipeline::base(rates), |pipeline, adjustment| match adjustment {
                Adjustment::Surge { multiplier } => pipeline.surge(*multiplier),
                Adjustment::Discount { amount } => pipeline.discount(*amount),
            })
    }
}
