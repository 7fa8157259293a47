// 2.0 pricing.rs: swap quotes against a pool snapshot.
// one walk for every call site. stable -> other climbs the ladder, other -> stable descends it.
// running out of steps is reported through `exhausted`, never as an error.

use crate::registry::{PoolBook, RegistryError};
use crate::step::{Pool, Step};
use crate::types::{Direction, Estimate, StepId, TokenAddress};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub direction: Direction,
    pub amount_in: Decimal,
    pub received: Decimal,
    /// input actually absorbed by the visited steps
    pub consumed: Decimal,
    pub remaining: Decimal,
    pub exhausted: bool,
    /// last step that took part in the fill
    pub last_step: Option<StepId>,
}

impl SwapQuote {
    fn unfilled(direction: Direction, amount_in: Decimal, exhausted: bool) -> Self {
        Self {
            direction,
            amount_in,
            received: Decimal::ZERO,
            consumed: Decimal::ZERO,
            remaining: amount_in,
            exhausted,
            last_step: None,
        }
    }

    /// Execution price in stablecoins per other token.
    pub fn average_price(&self) -> Estimate {
        match self.direction {
            Direction::StableToOther => Estimate::ratio(self.consumed, self.received),
            Direction::OtherToStable => Estimate::ratio(self.received, self.consumed),
        }
    }
}

// 2.1: how much one step absorbs from `remaining` and what it pays back.
// a zero rate contributes nothing. a product too large for a Decimal is past the
// step's capacity, so it saturates at the step's reserves.
fn fill_step(step: &Step, direction: Direction, remaining: Decimal) -> (Decimal, Decimal) {
    if step.rate <= Decimal::ZERO {
        return (Decimal::ZERO, Decimal::ZERO);
    }

    match direction {
        Direction::StableToOther => {
            let absorbed = step
                .other_token_amount
                .checked_mul(step.rate)
                .map_or(remaining, |capacity| capacity.min(remaining));
            let out = remaining
                .checked_div(step.rate)
                .map_or(step.other_token_amount, |x| x.min(step.other_token_amount));
            (absorbed, out)
        }
        Direction::OtherToStable => {
            let absorbed = step
                .stablecoin_amount
                .checked_div(step.rate)
                .map_or(remaining, |capacity| capacity.min(remaining));
            let out = remaining
                .checked_mul(step.rate)
                .map_or(step.stablecoin_amount, |x| x.min(step.stablecoin_amount));
            (absorbed, out)
        }
    }
}

/// Walks the steps outward from the current step and accumulates the output
/// of converting `amount` in the given direction.
pub fn quote(pool: &Pool, direction: Direction, amount: Decimal) -> SwapQuote {
    if amount <= Decimal::ZERO {
        return SwapQuote::unfilled(direction, Decimal::ZERO, false);
    }

    let Some(start) = pool.current_index() else {
        return SwapQuote::unfilled(direction, amount, true);
    };

    let steps = pool.steps();
    let walk: Box<dyn Iterator<Item = &Step>> = match direction {
        Direction::StableToOther => Box::new(steps[start..].iter()),
        Direction::OtherToStable => Box::new(steps[..=start].iter().rev()),
    };

    let mut remaining = amount;
    let mut received = Decimal::ZERO;
    let mut last_step = None;

    for step in walk {
        if remaining.is_zero() {
            break;
        }
        let (absorbed, out) = fill_step(step, direction, remaining);
        if absorbed.is_zero() && out.is_zero() {
            continue;
        }
        remaining -= absorbed;
        received = received.saturating_add(out);
        last_step = Some(step.step_id);
    }

    SwapQuote {
        direction,
        amount_in: amount,
        received,
        consumed: amount - remaining,
        remaining,
        exhausted: remaining > Decimal::ZERO,
        last_step,
    }
}

/** 2.2: swap fees. protocol cut comes off the input first, lp fee on what is traded */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    pub lp_fee: Decimal,
    pub protocol_fee: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            lp_fee: dec!(0.0025),       // 0.25%
            protocol_fee: dec!(0.0005), // 0.05%
        }
    }
}

impl FeeSchedule {
    pub fn zero() -> Self {
        Self { lp_fee: Decimal::ZERO, protocol_fee: Decimal::ZERO }
    }

    /// Splits a gross input into (net traded, protocol fee, lp fee).
    pub fn split(&self, amount: Decimal) -> (Decimal, Decimal, Decimal) {
        let protocol = amount * self.protocol_fee;
        let after_protocol = amount - protocol;
        let net = after_protocol / (Decimal::ONE + self.lp_fee);
        (net, protocol, after_protocol - net)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeQuote {
    pub quote: SwapQuote,
    pub protocol_fee_paid: Decimal,
    pub lp_fee_paid: Decimal,
}

pub fn quote_with_fees(pool: &Pool, direction: Direction, amount: Decimal, fees: &FeeSchedule) -> FeeQuote {
    let gross = amount.max(Decimal::ZERO);
    let (net, protocol_fee_paid, lp_fee_paid) = fees.split(gross);
    let mut inner = quote(pool, direction, net);
    inner.amount_in = gross;

    FeeQuote {
        quote: inner,
        protocol_fee_paid,
        lp_fee_paid,
    }
}

// 2.3: routing. every pool pairs a token with the stablecoin, so two tokens
// trade through the stablecoin in two legs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteQuote {
    pub legs: Vec<SwapQuote>,
    pub received: Decimal,
    pub exhausted: bool,
}

impl RouteQuote {
    fn from_legs(legs: Vec<SwapQuote>) -> Self {
        let received = legs.last().map(|l| l.received).unwrap_or(Decimal::ZERO);
        let exhausted = legs.iter().any(|l| l.exhausted);
        Self { legs, received, exhausted }
    }

    /// Stablecoin amount passed between the two legs of an indirect route.
    pub fn intermediate(&self) -> Option<Decimal> {
        if self.legs.len() == 2 {
            Some(self.legs[0].received)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("Cannot route {0} into itself")]
    SameToken(TokenAddress),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub fn route_quote(
    pools: &PoolBook,
    stablecoin: &TokenAddress,
    from: &TokenAddress,
    to: &TokenAddress,
    amount: Decimal,
) -> Result<RouteQuote, RouteError> {
    if from == to {
        return Err(RouteError::SameToken(from.clone()));
    }

    if from == stablecoin {
        let pool = pools.get(to)?;
        return Ok(RouteQuote::from_legs(vec![quote(pool, Direction::StableToOther, amount)]));
    }

    if to == stablecoin {
        let pool = pools.get(from)?;
        return Ok(RouteQuote::from_legs(vec![quote(pool, Direction::OtherToStable, amount)]));
    }

    let sell_pool = pools.get(from)?;
    let buy_pool = pools.get(to)?;
    let first = quote(sell_pool, Direction::OtherToStable, amount);
    let second = quote(buy_pool, Direction::StableToOther, first.received);
    Ok(RouteQuote::from_legs(vec![first, second]))
}
