//! Driver acceptance simulation.
//!
//! Matching only proposes a driver; whether the driver takes the job is decided
//! by an [`AcceptanceOracle`]. Production-like runs use [`RandomAcceptance`],
//! tests plug in [`ScriptedAcceptance`] or a closure.

use std::collections::VecDeque;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{DispatchError, DispatchResult};
use crate::models::Driver;

/// Decides whether a proposed driver accepts a ride.
///
/// `attempt` counts proposals for the current dispatch, starting at 1.
pub trait AcceptanceOracle: Send + Sync {
    fn accepts(&self, driver: &Driver, attempt: u32) -> bool;
}

impl<F> AcceptanceOracle for F
where
    F: Fn(&Driver, u32) -> bool + Send + Sync,
{
    fn accepts(&self, driver: &Driver, attempt: u32) -> bool {
        self(driver, attempt)
    }
}

/// Independent coin flip per proposal.
#[derive(Debug)]
pub struct RandomAcceptance {
    probability: f64,
    rng: Mutex<StdRng>,
}

impl RandomAcceptance {
    /// Creates an oracle accepting with `probability`. A seed makes the
    /// sequence of decisions reproducible.
    pub fn new(probability: f64, seed: Option<u64>) -> DispatchResult<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(DispatchError::invalid_configuration(format!(
                "acceptance probability must be within [0, 1], got {probability}"
            )));
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            probability,
            rng: Mutex::new(rng),
        })
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl AcceptanceOracle for RandomAcceptance {
    fn accepts(&self, _driver: &Driver, _attempt: u32) -> bool {
        self.rng.lock().gen_bool(self.probability)
    }
}

/// Replays a fixed list of answers, then keeps returning `fallback`.
#[derive(Debug)]
pub struct ScriptedAcceptance {
    answers: Mutex<VecDeque<bool>>,
    fallback: bool,
}

impl ScriptedAcceptance {
    pub fn new(answers: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            fallback,
        }
    }

    pub fn always(answer: bool) -> Self {
        Self::new(std::iter::empty(), answer)
    }

    /// Answers not consumed yet
    pub fn remaining(&self) -> usize {
        self.answers.lock().len()
    }
}

impl AcceptanceOracle for ScriptedAcceptance {
    fn accepts(&self, _driver: &Driver, _attempt: u32) -> bool {
        self.answers.lock().pop_front().unwrap_or(self.fallback)
    }
}
