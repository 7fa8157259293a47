// 5.0 liquidity.rs: range deposits and LP position valuation.
// a deposit over a price range spreads equal value over every step in it. steps under
// the current one only hold stablecoins, steps over it only hold the other token.

use crate::step::{Pool, PoolError};
use crate::types::{Estimate, StepId, TokenAddress};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiquidityError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("Price range holds no step (min step {min_step} > max step {max_step})")]
    EmptyRange { min_step: StepId, max_step: StepId },

    #[error("Deposit amount must be positive, got {0}")]
    NonPositiveDeposit(Decimal),

    #[error("Range does not accept {0} deposits")]
    SideNotAccepted(DepositSide),

    #[error("Rate of step {0} overflows")]
    RateOverflow(StepId),

    #[error("Position is for {position}, pool is for {pool}")]
    TokenMismatch { position: TokenAddress, pool: TokenAddress },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositSide {
    Stable,
    Other,
}

impl std::fmt::Display for DepositSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DepositSide::Stable => f.write_str("stablecoin"),
            DepositSide::Other => f.write_str("other token"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deposit {
    Stable(Decimal),
    Other(Decimal),
}

impl Deposit {
    pub fn amount(&self) -> Decimal {
        match self {
            Deposit::Stable(x) | Deposit::Other(x) => *x,
        }
    }

    pub fn side(&self) -> DepositSide {
        match self {
            Deposit::Stable(_) => DepositSide::Stable,
            Deposit::Other(_) => DepositSide::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRange {
    pub min_step: StepId,
    pub max_step: StepId,
}

impl StepRange {
    pub fn step_count(&self) -> usize {
        usize::from(self.max_step - self.min_step) + 1
    }

    pub fn contains(&self, step_id: StepId) -> bool {
        (self.min_step..=self.max_step).contains(&step_id)
    }
}

// 5.1: the range covers every step whose rate lies inside [low, high]
pub fn step_range(pool: &Pool, price_a: Decimal, price_b: Decimal) -> Result<StepRange, LiquidityError> {
    let (low, high) = if price_a <= price_b { (price_a, price_b) } else { (price_b, price_a) };

    let min = pool.fractional_step(low)?.ceil();
    let max = pool.fractional_step(high)?.floor();
    let max_step = to_step_id(max, high)?;
    let min_step = to_step_id(min, low)?;

    if min_step > max_step {
        return Err(LiquidityError::EmptyRange { min_step, max_step });
    }
    Ok(StepRange { min_step, max_step })
}

fn to_step_id(value: Decimal, rate: Decimal) -> Result<StepId, LiquidityError> {
    use rust_decimal::prelude::ToPrimitive;
    value
        .to_u16()
        .ok_or(LiquidityError::Pool(PoolError::RateAboveMax(rate)))
}

/// Share of the current step's value held in stablecoins. 1 when the step is empty or absent.
pub fn stable_ratio(pool: &Pool) -> Decimal {
    let Some(step) = pool.step(pool.current_step) else {
        return Decimal::ONE;
    };
    match step.liquidity().and_then(|liquidity| Estimate::ratio(step.stablecoin_amount, liquidity)) {
        Estimate::Known(r) => r,
        Estimate::Unknown => Decimal::ONE,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepAllocation {
    pub step_id: StepId,
    pub rate: Decimal,
    pub stablecoin_amount: Decimal,
    pub other_token_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityPlan {
    pub range: StepRange,
    /// value added to each step, in stablecoins
    pub value_per_step: Decimal,
    pub total_stable: Decimal,
    pub total_other: Decimal,
    pub allocations: Vec<StepAllocation>,
}

// 5.2: every step gets the same value v. summing what each step takes per unit of v
// gives the coefficients that turn the deposited amount into v.
pub fn plan_range_liquidity(
    pool: &Pool,
    price_a: Decimal,
    price_b: Decimal,
    deposit: Deposit,
) -> Result<LiquidityPlan, LiquidityError> {
    if deposit.amount() <= Decimal::ZERO {
        return Err(LiquidityError::NonPositiveDeposit(deposit.amount()));
    }

    let range = step_range(pool, price_a, price_b)?;
    let current = pool.current_step;
    let ratio = stable_ratio(pool);

    // (step, rate, stable per v, other per v)
    let mut shape = Vec::with_capacity(range.step_count());
    for step_id in range.min_step..=range.max_step {
        let rate = match pool.step(step_id) {
            Some(step) if step.rate > Decimal::ZERO => step.rate,
            _ => pool.rate_at(step_id).ok_or(LiquidityError::RateOverflow(step_id))?,
        };
        let (stable, other) = if step_id < current {
            (Decimal::ONE, Decimal::ZERO)
        } else if step_id > current {
            (Decimal::ZERO, Decimal::ONE / rate)
        } else {
            (ratio, (Decimal::ONE - ratio) / rate)
        };
        shape.push((step_id, rate, stable, other));
    }

    let stable_coeff: Decimal = shape.iter().map(|s| s.2).sum();
    let other_coeff: Decimal = shape.iter().map(|s| s.3).sum();

    let coeff = match deposit {
        Deposit::Stable(_) => stable_coeff,
        Deposit::Other(_) => other_coeff,
    };
    if coeff <= Decimal::ZERO {
        return Err(LiquidityError::SideNotAccepted(deposit.side()));
    }
    let value_per_step = deposit.amount() / coeff;

    let allocations: Vec<StepAllocation> = shape
        .into_iter()
        .map(|(step_id, rate, stable, other)| StepAllocation {
            step_id,
            rate,
            stablecoin_amount: stable * value_per_step,
            other_token_amount: other * value_per_step,
        })
        .collect();

    let (total_stable, total_other) = match deposit {
        Deposit::Stable(x) => (x, other_coeff * value_per_step),
        Deposit::Other(x) => (stable_coeff * value_per_step, x),
    };

    Ok(LiquidityPlan {
        range,
        value_per_step,
        total_stable,
        total_other,
        allocations,
    })
}

// 5.3: positions. fee accumulators only grow, so the claimable part is the growth
// since the position last collected, times its liquidity.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepPosition {
    pub liquidity: Decimal,
    pub last_stable_fees_per_liq: Decimal,
    pub last_other_fees_per_liq: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub token: TokenAddress,
    pub step_positions: BTreeMap<StepId, StepPosition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepValue {
    pub step_id: StepId,
    pub stablecoin_amount: Decimal,
    pub other_token_amount: Decimal,
    pub stable_fees: Decimal,
    pub other_fees: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionValue {
    pub stablecoin_amount: Decimal,
    pub other_token_amount: Decimal,
    pub stable_fees: Decimal,
    pub other_fees: Decimal,
    pub steps: Vec<StepValue>,
}

impl PositionValue {
    /// Everything the position would return if closed now, priced at `rate`.
    pub fn total_in_stable(&self, rate: Estimate) -> Estimate {
        rate.map(|r| {
            self.stablecoin_amount + self.stable_fees + (self.other_token_amount + self.other_fees) * r
        })
    }
}

pub fn position_value(position: &Position, pool: &Pool) -> Result<PositionValue, LiquidityError> {
    if position.token != pool.token {
        return Err(LiquidityError::TokenMismatch {
            position: position.token.clone(),
            pool: pool.token.clone(),
        });
    }

    let mut value = PositionValue {
        stablecoin_amount: Decimal::ZERO,
        other_token_amount: Decimal::ZERO,
        stable_fees: Decimal::ZERO,
        other_fees: Decimal::ZERO,
        steps: Vec::with_capacity(position.step_positions.len()),
    };

    for (&step_id, held) in &position.step_positions {
        // a step absent from the snapshot holds nothing
        let Some(step) = pool.step(step_id) else {
            continue;
        };

        let share = step
            .liquidity()
            .and_then(|liquidity| Estimate::ratio(held.liquidity, liquidity))
            .unwrap_or(Decimal::ZERO);
        let stable_fees = ((step.stable_fees_per_liq - held.last_stable_fees_per_liq) * held.liquidity).max(Decimal::ZERO);
        let other_fees = ((step.other_fees_per_liq - held.last_other_fees_per_liq) * held.liquidity).max(Decimal::ZERO);

        let step_value = StepValue {
            step_id,
            stablecoin_amount: share * step.stablecoin_amount,
            other_token_amount: share * step.other_token_amount,
            stable_fees,
            other_fees,
        };

        value.stablecoin_amount += step_value.stablecoin_amount;
        value.other_token_amount += step_value.other_token_amount;
        value.stable_fees += stable_fees;
        value.other_fees += other_fees;
        value.steps.push(step_value);
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Step;
    use rust_decimal_macros::dec;

    fn pool() -> Pool {
        Pool::new(
            TokenAddress::from("resource_btc"),
            dec!(2),
            2,
            dec!(1),
            dec!(64),
            vec![
                Step::new(1, dec!(50), dec!(0), dec!(2)),
                Step::new(2, dec!(40), dec!(15), dec!(4)),
                Step::new(3, dec!(0), dec!(10), dec!(8)),
            ],
        )
    }

    #[test]
    fn step_range_covers_rates_inside_prices() {
        let p = pool();
        assert_eq!(step_range(&p, dec!(3), dec!(10)).unwrap(), StepRange { min_step: 2, max_step: 3 });
        // order of the two prices does not matter
        assert_eq!(step_range(&p, dec!(10), dec!(3)).unwrap(), StepRange { min_step: 2, max_step: 3 });
    }

    #[test]
    fn step_range_keeps_steps_priced_exactly_on_the_bounds() {
        let ladder = Pool::new(TokenAddress::from("resource_btc"), dec!(1.01), 0, dec!(1), dec!(1000), Vec::new());
        for k in 1..200 {
            let low = ladder.rate_at(k).unwrap();
            let high = ladder.rate_at(k + 5).unwrap();
            assert_eq!(step_range(&ladder, low, high).unwrap(), StepRange { min_step: k, max_step: k + 5 }, "from step {k}");
        }
        // exact powers of the pool above
        assert_eq!(step_range(&pool(), dec!(2), dec!(8)).unwrap(), StepRange { min_step: 1, max_step: 3 });
    }

    #[test]
    fn step_range_between_two_rates_is_empty() {
        let p = pool();
        assert!(matches!(
            step_range(&p, dec!(4.5), dec!(7)),
            Err(LiquidityError::EmptyRange { min_step: 3, max_step: 2 })
        ));
        assert!(matches!(step_range(&p, dec!(0.5), dec!(3)), Err(LiquidityError::Pool(_))));
    }

    #[test]
    fn stable_ratio_at_current_step() {
        let mut p = pool();
        // 40 / (40 + 15 * 4)
        assert_eq!(stable_ratio(&p), dec!(0.4));
        p.current_step = 9;
        assert_eq!(stable_ratio(&p), Decimal::ONE);
    }

    #[test]
    fn range_below_current_takes_only_stable() {
        let p = pool();
        let plan = plan_range_liquidity(&p, dec!(1.5), dec!(2.5), Deposit::Stable(dec!(100))).unwrap();
        assert_eq!(plan.range, StepRange { min_step: 1, max_step: 1 });
        assert_eq!(plan.total_stable, dec!(100));
        assert_eq!(plan.total_other, Decimal::ZERO);
        assert!(matches!(
            plan_range_liquidity(&p, dec!(1.5), dec!(2.5), Deposit::Other(dec!(1))),
            Err(LiquidityError::SideNotAccepted(DepositSide::Other))
        ));
    }

    #[test]
    fn range_above_current_takes_only_other() {
        let p = pool();
        let plan = plan_range_liquidity(&p, dec!(7), dec!(17), Deposit::Other(dec!(3))).unwrap();
        assert_eq!(plan.range, StepRange { min_step: 3, max_step: 4 });
        // v/8 + v/16 = 3
        assert_eq!(plan.value_per_step, dec!(16));
        assert_eq!(plan.allocations[0].other_token_amount, dec!(2));
        assert_eq!(plan.allocations[1].other_token_amount, dec!(1));
        assert_eq!(plan.total_stable, Decimal::ZERO);
    }

    #[test]
    fn range_around_current_splits_by_ratio() {
        let p = pool();
        let plan = plan_range_liquidity(&p, dec!(1.9), dec!(9), Deposit::Stable(dec!(70))).unwrap();
        // stable per v: 1 (step 1) + 0.4 (step 2), so v = 50
        assert_eq!(plan.value_per_step, dec!(50));
        let current = &plan.allocations[1];
        assert_eq!(current.stablecoin_amount, dec!(20));
        assert_eq!(current.other_token_amount, dec!(7.5));
        // 7.5 + 50 / 8
        assert_eq!(plan.total_other, dec!(13.75));
        for alloc in &plan.allocations {
            assert_eq!(alloc.stablecoin_amount + alloc.other_token_amount * alloc.rate, dec!(50));
        }
    }

    #[test]
    fn non_positive_deposit_rejected() {
        assert!(matches!(
            plan_range_liquidity(&pool(), dec!(2), dec!(8), Deposit::Stable(Decimal::ZERO)),
            Err(LiquidityError::NonPositiveDeposit(_))
        ));
    }

    #[test]
    fn position_value_includes_fee_growth() {
        let mut p = pool();
        let mut steps = p.steps().to_vec();
        steps[1].stable_fees_per_liq = dec!(0.02);
        steps[1].other_fees_per_liq = dec!(0.001);
        p.set_steps(steps);

        let position = Position {
            token: TokenAddress::from("resource_btc"),
            step_positions: BTreeMap::from([
                (
                    2,
                    StepPosition {
                        liquidity: dec!(25),
                        last_stable_fees_per_liq: dec!(0.01),
                        last_other_fees_per_liq: Decimal::ZERO,
                    },
                ),
                (
                    7,
                    StepPosition {
                        liquidity: dec!(5),
                        last_stable_fees_per_liq: Decimal::ZERO,
                        last_other_fees_per_liq: Decimal::ZERO,
                    },
                ),
            ]),
        };

        let value = position_value(&position, &p).unwrap();
        // a quarter of step 2 (liquidity 100)
        assert_eq!(value.stablecoin_amount, dec!(10));
        assert_eq!(value.other_token_amount, dec!(3.75));
        assert_eq!(value.stable_fees, dec!(0.25));
        assert_eq!(value.other_fees, dec!(0.025));
        assert_eq!(value.steps.len(), 1);
        assert_eq!(value.total_in_stable(p.current_rate()), Estimate::Known(dec!(25.35)));
    }

    #[test]
    fn position_for_other_token_rejected() {
        let position = Position {
            token: TokenAddress::from("resource_eth"),
            step_positions: BTreeMap::new(),
        };
        assert!(matches!(position_value(&position, &pool()), Err(LiquidityError::TokenMismatch { .. })));
    }
}
