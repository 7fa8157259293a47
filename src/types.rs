// 1.0: primitives shared by the pool, lending and decoder code.
// token addresses, step ids, swap direction, timestamps and the Estimate sentinel.

use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Index of a price band inside a pool. the contract caps pools at 65535 steps.
pub type StepId = u16;

/// Bech32 resource address as reported by the ledger gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenAddress(String);

impl TokenAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TokenAddress {
    fn from(address: &str) -> Self {
        Self(address.to_string())
    }
}

impl From<String> for TokenAddress {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// StableToOther buys the pool's token and pushes the price up the steps.
// OtherToStable sells it and walks down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    StableToOther,
    OtherToStable,
}

impl Direction {
    pub fn opposite(&self) -> Self {
        match self {
            Direction::StableToOther => Direction::OtherToStable,
            Direction::OtherToStable => Direction::StableToOther,
        }
    }
}

// 1.1: a number that may be unknown. division by zero and overflowing powers land here
// instead of leaking NaN-like garbage into a displayed figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estimate {
    Known(Decimal),
    Unknown,
}

impl Estimate {
    /// `numerator / denominator`, or `Unknown` when the denominator is zero
    /// or the division overflows.
    pub fn ratio(numerator: Decimal, denominator: Decimal) -> Self {
        if denominator.is_zero() {
            return Estimate::Unknown;
        }
        numerator.checked_div(denominator).into()
    }

    pub fn value(&self) -> Option<Decimal> {
        match self {
            Estimate::Known(v) => Some(*v),
            Estimate::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Estimate::Known(_))
    }

    pub fn unwrap_or(&self, fallback: Decimal) -> Decimal {
        self.value().unwrap_or(fallback)
    }

    pub fn map(self, f: impl FnOnce(Decimal) -> Decimal) -> Self {
        match self {
            Estimate::Known(v) => Estimate::Known(f(v)),
            Estimate::Unknown => Estimate::Unknown,
        }
    }

    pub fn and_then(self, f: impl FnOnce(Decimal) -> Estimate) -> Self {
        match self {
            Estimate::Known(v) => f(v),
            Estimate::Unknown => Estimate::Unknown,
        }
    }
}

impl From<Option<Decimal>> for Estimate {
    fn from(value: Option<Decimal>) -> Self {
        match value {
            Some(v) => Estimate::Known(v),
            None => Estimate::Unknown,
        }
    }
}

impl From<Decimal> for Estimate {
    fn from(value: Decimal) -> Self {
        Estimate::Known(value)
    }
}

// "?" for unknown. known values keep two decimals above 1 and two significant
// digits below it, with thousands separators.
impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Estimate::Unknown => f.write_str("?"),
            Estimate::Known(v) => f.write_str(&format_amount(*v)),
        }
    }
}

/// Rounds to two decimals, or two significant digits for amounts below one.
pub fn round_for_display(value: Decimal) -> Decimal {
    if value.is_zero() {
        return Decimal::ZERO;
    }

    let mut scaled = value.abs();
    let mut leading_zeros = 0u32;
    while scaled < Decimal::ONE && leading_zeros < 27 {
        scaled *= dec!(10);
        leading_zeros += 1;
    }

    let dp = if leading_zeros == 0 { 2 } else { leading_zeros + 1 };
    value
        .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

pub fn format_amount(value: Decimal) -> String {
    let rounded = round_for_display(value).to_string();
    let (sign, digits) = match rounded.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rounded.as_str()),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

// 1.2: second resolution, like the ledger clock the loans are stamped with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp())
    }

    pub fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    pub fn add_days(&self, days: i64) -> Self {
        Self(self.0 + days * SECONDS_PER_DAY)
    }

    /// Fractional days from `self` until `later`. never negative.
    pub fn elapsed_days(&self, later: &Timestamp) -> Decimal {
        let diff = (later.0 - self.0).max(0);
        Decimal::from(diff) / Decimal::from(SECONDS_PER_DAY)
    }
}
