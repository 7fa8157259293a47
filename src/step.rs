//! Step ledger: the per-token ladder of fixed-rate price bands.
//!
//! A pool never prices along a curve. It holds a sorted set of steps, each with its
//! own stablecoin and token reserves at a fixed rate `min_rate * rate_step^step_id`.
//! Only the steps around `current_step` usually hold liquidity.

use crate::types::{Estimate, StepId, TokenAddress};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub const DEFAULT_NB_STEPS: u16 = 65_535;

// ln rounding puts rate_at(k) a hair above or below k
const STEP_SNAP: Decimal = dec!(0.000000000001);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub step_id: StepId,
    pub stablecoin_amount: Decimal,
    pub other_token_amount: Decimal,
    /// stablecoins per unit of the other token
    pub rate: Decimal,
    #[serde(default)]
    pub stable_fees_per_liq: Decimal,
    #[serde(default)]
    pub other_fees_per_liq: Decimal,
}

impl Step {
    pub fn new(step_id: StepId, stablecoin_amount: Decimal, other_token_amount: Decimal, rate: Decimal) -> Self {
        Self {
            step_id,
            stablecoin_amount,
            other_token_amount,
            rate,
            stable_fees_per_liq: Decimal::ZERO,
            other_fees_per_liq: Decimal::ZERO,
        }
    }

    /// Step value in stablecoins. LP shares are expressed in this unit.
    /// `Unknown` when the value does not fit a `Decimal`.
    pub fn liquidity(&self) -> Estimate {
        self.other_token_amount
            .checked_mul(self.rate)
            .and_then(|other| other.checked_add(self.stablecoin_amount))
            .into()
    }

    pub fn is_empty(&self) -> bool {
        self.stablecoin_amount.is_zero() && self.other_token_amount.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub token: TokenAddress,
    /// multiplicative factor between consecutive steps, always > 1
    pub rate_step: Decimal,
    pub current_step: StepId,
    pub min_rate: Decimal,
    pub max_rate: Decimal,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Minimum rate must be positive, got {0}")]
    NonPositiveMinRate(Decimal),

    #[error("Maximum rate {max} must exceed minimum rate {min}")]
    InvertedRateRange { min: Decimal, max: Decimal },

    #[error("Rate step must be greater than one, got {0}")]
    InvalidRateStep(Decimal),

    #[error("Rate {0} is not positive")]
    InvalidRate(Decimal),

    #[error("Rate {rate} is below the pool minimum {min_rate}")]
    RateBelowMin { rate: Decimal, min_rate: Decimal },

    #[error("Rate {0} maps past the last step")]
    RateAboveMax(Decimal),

    #[error("Steps are not strictly ordered at step {0}")]
    UnorderedSteps(StepId),

    #[error("Step {0} has a rate lower than the step before it")]
    NonMonotonicRate(StepId),

    #[error("Step count must be positive")]
    NoSteps,
}

impl Pool {
    pub fn new(
        token: TokenAddress,
        rate_step: Decimal,
        current_step: StepId,
        min_rate: Decimal,
        max_rate: Decimal,
        steps: Vec<Step>,
    ) -> Self {
        let mut pool = Self {
            token,
            rate_step,
            current_step,
            min_rate,
            max_rate,
            steps: Vec::new(),
        };
        pool.set_steps(steps);
        pool
    }

    /// Builds an empty pool whose `nb_steps` steps span `[min_rate, max_rate]` geometrically,
    /// with the current step placed at `initial_rate`.
    pub fn from_range(
        token: TokenAddress,
        min_rate: Decimal,
        max_rate: Decimal,
        initial_rate: Decimal,
        nb_steps: u16,
    ) -> Result<Self, PoolError> {
        if min_rate <= Decimal::ZERO {
            return Err(PoolError::NonPositiveMinRate(min_rate));
        }
        if max_rate <= min_rate {
            return Err(PoolError::InvertedRateRange { min: min_rate, max: max_rate });
        }
        if nb_steps == 0 {
            return Err(PoolError::NoSteps);
        }

        let exponent = Decimal::ONE / Decimal::from(nb_steps);
        let rate_step = (max_rate / min_rate)
            .checked_powd(exponent)
            .ok_or(PoolError::InvalidRateStep(Decimal::ZERO))?;
        if rate_step <= Decimal::ONE {
            return Err(PoolError::InvalidRateStep(rate_step));
        }

        let mut pool = Self::new(token, rate_step, 0, min_rate, max_rate, Vec::new());
        if initial_rate > max_rate {
            return Err(PoolError::RateAboveMax(initial_rate));
        }
        pool.current_step = pool.step_at_rate(initial_rate)?.min(nb_steps);
        Ok(pool)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn set_steps(&mut self, mut steps: Vec<Step>) {
        steps.sort_by_key(|s| s.step_id);
        self.steps = steps;
    }

    pub fn step(&self, step_id: StepId) -> Option<&Step> {
        self.index_of(step_id).map(|i| &self.steps[i])
    }

    pub fn index_of(&self, step_id: StepId) -> Option<usize> {
        self.steps.binary_search_by_key(&step_id, |s| s.step_id).ok()
    }

    /// Position of the current step inside `steps`, if it holds a ledger entry.
    pub fn current_index(&self) -> Option<usize> {
        self.index_of(self.current_step)
    }

    /// `min_rate * rate_step^step_id`. `None` on overflow.
    pub fn rate_at(&self, step_id: StepId) -> Option<Decimal> {
        let factor = self.rate_step.checked_powi(i64::from(step_id))?;
        self.min_rate.checked_mul(factor)
    }

    /// Inverse of `rate_at`, rounded down to the step whose band contains `rate`.
    pub fn step_at_rate(&self, rate: Decimal) -> Result<StepId, PoolError> {
        let fractional = self.fractional_step(rate)?;
        fractional
            .floor()
            .to_u16()
            .ok_or(PoolError::RateAboveMax(rate))
    }

    /// `ln(rate / min_rate) / ln(rate_step)` before rounding. A result within
    /// `STEP_SNAP` of a whole step is that step, so `rate_at(k)` maps back to exactly `k`.
    pub fn fractional_step(&self, rate: Decimal) -> Result<Decimal, PoolError> {
        if rate <= Decimal::ZERO {
            return Err(PoolError::InvalidRate(rate));
        }
        if self.min_rate <= Decimal::ZERO {
            return Err(PoolError::NonPositiveMinRate(self.min_rate));
        }
        if self.rate_step <= Decimal::ONE {
            return Err(PoolError::InvalidRateStep(self.rate_step));
        }
        if rate < self.min_rate {
            return Err(PoolError::RateBelowMin { rate, min_rate: self.min_rate });
        }

        let numerator = rate
            .checked_div(self.min_rate)
            .and_then(|r| r.checked_ln())
            .ok_or(PoolError::RateAboveMax(rate))?;
        let denominator = self
            .rate_step
            .checked_ln()
            .ok_or(PoolError::InvalidRateStep(self.rate_step))?;
        let fractional = numerator
            .checked_div(denominator)
            .ok_or(PoolError::RateAboveMax(rate))?;
        let nearest = fractional.round();
        if (fractional - nearest).abs() <= STEP_SNAP {
            return Ok(nearest);
        }
        Ok(fractional)
    }

    /// Marginal price: the ledger rate of the current step, else the theoretical one.
    pub fn current_rate(&self) -> Estimate {
        match self.step(self.current_step) {
            Some(step) => Estimate::Known(step.rate),
            None => self.rate_at(self.current_step).into(),
        }
    }

    /// Total (stablecoin, other token) reserves across every step.
    pub fn reserves(&self) -> (Decimal, Decimal) {
        self.steps.iter().fold((Decimal::ZERO, Decimal::ZERO), |(s, o), step| {
            (s.saturating_add(step.stablecoin_amount), o.saturating_add(step.other_token_amount))
        })
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.min_rate <= Decimal::ZERO {
            return Err(PoolError::NonPositiveMinRate(self.min_rate));
        }
        if self.max_rate <= self.min_rate {
            return Err(PoolError::InvertedRateRange { min: self.min_rate, max: self.max_rate });
        }
        if self.rate_step <= Decimal::ONE {
            return Err(PoolError::InvalidRateStep(self.rate_step));
        }

        for pair in self.steps.windows(2) {
            if pair[1].step_id <= pair[0].step_id {
                return Err(PoolError::UnorderedSteps(pair[1].step_id));
            }
            if pair[1].rate < pair[0].rate {
                return Err(PoolError::NonMonotonicRate(pair[1].step_id));
            }
        }
        Ok(())
    }
}
