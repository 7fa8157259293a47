//! Loan valuation and liquidation.
//!
//! A loan is stablecoin debt backed by collateral held by the lender for that collateral.
//! Debt accrues interest daily. Once the collateral value scaled by the liquidation
//! threshold no longer covers the accrued debt, anyone can liquidate it. This module
//! computes the trigger price, the liquidatable amount and the liquidation split.

use crate::registry::{LenderBook, RegistryError};
use crate::types::{Estimate, Timestamp, TokenAddress};
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lender {
    pub collateral_token: TokenAddress,
    /// oracle price of one collateral token, in stablecoins
    pub collateral_price: Decimal,
    pub oracle: String,
    pub loan_to_value: Decimal,
    /// daily rate
    pub interest_rate: Decimal,
    pub liquidation_threshold: Decimal,
    pub liquidation_penalty: Decimal,
}

impl Lender {
    pub fn validate(&self) -> Result<(), LendingError> {
        if self.loan_to_value <= Decimal::ZERO || self.loan_to_value >= Decimal::ONE {
            return Err(LendingError::InvalidParameter {
                field: "loan_to_value",
                reason: "must be between 0 and 1".to_string(),
            });
        }
        if self.interest_rate < Decimal::ZERO {
            return Err(LendingError::InvalidParameter {
                field: "interest_rate",
                reason: "must not be negative".to_string(),
            });
        }
        if self.liquidation_threshold <= self.loan_to_value {
            return Err(LendingError::InvalidParameter {
                field: "liquidation_threshold",
                reason: "must exceed loan_to_value".to_string(),
            });
        }
        if self.liquidation_penalty < Decimal::ZERO || self.liquidation_penalty >= Decimal::ONE {
            return Err(LendingError::InvalidParameter {
                field: "liquidation_penalty",
                reason: "must be in [0, 1)".to_string(),
            });
        }
        if self.collateral_price < Decimal::ZERO {
            return Err(LendingError::InvalidParameter {
                field: "collateral_price",
                reason: "must not be negative".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub collateral_token: TokenAddress,
    pub collateral_amount: Decimal,
    pub amount_lent: Decimal,
    pub loan_time: Timestamp,
    pub loan_to_value: Decimal,
    pub interest_rate: Decimal,
}

impl Loan {
    /// `Unknown` when the value does not fit a `Decimal`.
    pub fn collateral_value(&self, price: Decimal) -> Estimate {
        self.collateral_amount.checked_mul(price).into()
    }
}

// the issuer contract accrues simple interest, the liquidation views compound daily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestModel {
    #[default]
    Compound,
    Simple,
}

impl InterestModel {
    /// Growth factor after `days` at a daily `rate`. `None` on overflow.
    pub fn growth(&self, rate: Decimal, days: Decimal) -> Option<Decimal> {
        match self {
            InterestModel::Compound => (Decimal::ONE + rate).checked_powd(days),
            InterestModel::Simple => days
                .checked_mul(rate)
                .and_then(|i| Decimal::ONE.checked_add(i)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LendingError {
    #[error("Invalid lender parameter {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    #[error("Loan is healthy: collateral value {collateral_value} covers debt {debt}")]
    NotLiquidatable { collateral_value: Decimal, debt: Decimal },

    #[error("Accrued debt cannot be computed")]
    UnknownDebt,

    #[error("Collateral value cannot be computed")]
    UnknownCollateralValue,

    #[error("Collateral price must be positive, got {0}")]
    NoCollateralPrice(Decimal),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Debt owed at `now`: principal grown by the loan's own daily rate.
pub fn accrued_debt(loan: &Loan, now: Timestamp, model: InterestModel) -> Estimate {
    let days = loan.loan_time.elapsed_days(&now);
    model
        .growth(loan.interest_rate, days)
        .and_then(|g| loan.amount_lent.checked_mul(g))
        .into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanEvaluation {
    pub accrued_debt: Estimate,
    pub collateral_value: Estimate,
    /// collateral price at which the loan becomes liquidatable
    pub liquidation_price: Estimate,
    pub liquidatable: bool,
    /// stablecoin value a liquidator can claim, zero for a healthy loan
    pub amount_to_liquidate: Decimal,
    pub collateral_to_seize: Decimal,
}

/// Evaluates a loan with daily compounding.
pub fn evaluate(loan: &Loan, lender: &Lender, now: Timestamp) -> LoanEvaluation {
    evaluate_with(loan, lender, now, InterestModel::Compound)
}

pub fn evaluate_with(loan: &Loan, lender: &Lender, now: Timestamp, model: InterestModel) -> LoanEvaluation {
    let collateral_value = loan.collateral_value(lender.collateral_price);
    let threshold = lender.liquidation_threshold;
    let accrued_debt = accrued_debt(loan, now, model);

    let (Some(debt), Some(value)) = (accrued_debt.value(), collateral_value.value()) else {
        return LoanEvaluation {
            accrued_debt,
            collateral_value,
            liquidation_price: Estimate::Unknown,
            liquidatable: false,
            amount_to_liquidate: Decimal::ZERO,
            collateral_to_seize: Decimal::ZERO,
        };
    };

    // zero threshold or zero collateral: no price can trigger it
    let liquidation_price = Estimate::from(loan.collateral_amount.checked_mul(threshold))
        .and_then(|scaled| Estimate::ratio(debt, scaled));

    // inclusive: a loan sitting exactly on the threshold can be liquidated
    let liquidatable = value.checked_mul(threshold).is_some_and(|v| v <= debt);

    let (amount_to_liquidate, collateral_to_seize) = if liquidatable {
        let claim = debt
            .checked_mul(Decimal::ONE + lender.liquidation_penalty)
            .map_or(value, |c| c.min(value));
        let seized = Estimate::ratio(claim, lender.collateral_price)
            .map(|s| s.min(loan.collateral_amount))
            .unwrap_or(Decimal::ZERO);
        (claim, seized)
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };

    LoanEvaluation {
        accrued_debt,
        collateral_value,
        liquidation_price,
        liquidatable,
        amount_to_liquidate,
        collateral_to_seize,
    }
}

/// Looks up the loan's lender by collateral and evaluates it under `model`.
pub fn evaluate_in(
    book: &LenderBook,
    loan: &Loan,
    now: Timestamp,
    model: InterestModel,
) -> Result<LoanEvaluation, LendingError> {
    let lender = book.get(&loan.collateral_token)?;
    Ok(evaluate_with(loan, lender, now, model))
}

/// Collateral tokens required to borrow `amount` stablecoins.
pub fn collateral_needed(amount: Decimal, lender: &Lender) -> Estimate {
    Estimate::ratio(amount, lender.loan_to_value * lender.collateral_price)
}

/// Smallest collateral the loan may keep after a withdrawal.
pub fn minimum_collateral(loan: &Loan, lender: &Lender, now: Timestamp, model: InterestModel) -> Estimate {
    accrued_debt(loan, now, model)
        .and_then(|debt| Estimate::ratio(debt, lender.loan_to_value * lender.collateral_price))
}

pub fn has_bad_debt(loan: &Loan, lender: &Lender) -> bool {
    loan.collateral_value(lender.collateral_price)
        .value()
        .is_some_and(|value| value < loan.amount_lent)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiquidationPlan {
    /// debt plus penalty swallows the collateral: everything is seized
    Full {
        repay: Decimal,
        collateral_seized: Decimal,
        bad_debt: Decimal,
    },
    /// enough debt is repaid to bring the loan back to its loan-to-value
    Partial {
        repay: Decimal,
        collateral_seized: Decimal,
        remaining_debt: Decimal,
        remaining_collateral: Decimal,
    },
}

impl LiquidationPlan {
    pub fn repay(&self) -> Decimal {
        match self {
            LiquidationPlan::Full { repay, .. } | LiquidationPlan::Partial { repay, .. } => *repay,
        }
    }

    pub fn collateral_seized(&self) -> Decimal {
        match self {
            LiquidationPlan::Full { collateral_seized, .. }
            | LiquidationPlan::Partial { collateral_seized, .. } => *collateral_seized,
        }
    }
}

/// Splits the liquidation of an unhealthy loan. A partial plan leaves debt at
/// `loan_to_value` times the remaining collateral value, below the threshold.
pub fn plan_liquidation(
    loan: &Loan,
    lender: &Lender,
    now: Timestamp,
    model: InterestModel,
) -> Result<LiquidationPlan, LendingError> {
    let price = lender.collateral_price;
    if price <= Decimal::ZERO {
        return Err(LendingError::NoCollateralPrice(price));
    }

    let debt = accrued_debt(loan, now, model).value().ok_or(LendingError::UnknownDebt)?;
    let value = loan.collateral_value(price).value().ok_or(LendingError::UnknownCollateralValue)?;
    if value.checked_mul(lender.liquidation_threshold).map_or(true, |v| v > debt) {
        return Err(LendingError::NotLiquidatable { collateral_value: value, debt });
    }

    let bonus = Decimal::ONE + lender.liquidation_penalty;
    let ltv = lender.loan_to_value;
    let full = || {
        let repay = debt.min(value / bonus);
        LiquidationPlan::Full {
            repay,
            collateral_seized: loan.collateral_amount,
            bad_debt: debt - repay,
        }
    };

    if debt.checked_mul(bonus).map_or(true, |owed| owed >= value) {
        return Ok(full());
    }

    // repaying R while seizing R * bonus of value restores debt' = ltv * value'
    let denominator = Decimal::ONE - ltv * bonus;
    let numerator = debt - ltv * value;
    if denominator <= Decimal::ZERO {
        return Ok(full());
    }
    if numerator <= Decimal::ZERO {
        return Err(LendingError::InvalidParameter {
            field: "loan_to_value",
            reason: "loan is liquidatable while inside its loan-to-value".to_string(),
        });
    }

    let Some(repay) = numerator.checked_div(denominator).filter(|r| *r < debt) else {
        return Ok(full());
    };

    let collateral_seized = Estimate::from(repay.checked_mul(bonus))
        .and_then(|seized_value| Estimate::ratio(seized_value, price))
        .map(|seized| seized.min(loan.collateral_amount))
        .unwrap_or(loan.collateral_amount);
    Ok(LiquidationPlan::Partial {
        repay,
        collateral_seized,
        remaining_debt: debt - repay,
        remaining_collateral: loan.collateral_amount - collateral_seized,
    })
}
