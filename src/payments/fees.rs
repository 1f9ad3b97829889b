//! Sofort fee arithmetic
//!
//! Sofort charges `amount * fee_relative + fee` per transaction, rounded up
//! to the next cent. All amounts are in cents.

use crate::error::{AppError, AppResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fee conditions negotiated with Sofort
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeConditions {
    /// Fixed fee per transaction, in cents
    pub fee: Option<Decimal>,
    /// Relative fee, e.g. `0.015` for 1.5 %
    pub fee_relative: Option<Decimal>,
}

impl FeeConditions {
    pub fn new(fee: Decimal, fee_relative: Decimal) -> Self {
        Self {
            fee: Some(fee),
            fee_relative: Some(fee_relative),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.fee.is_some() && self.fee_relative.is_some()
    }

    fn resolve(conditions: Option<&FeeConditions>) -> AppResult<(Decimal, Decimal)> {
        let conditions =
            conditions.ok_or_else(|| AppError::configuration("Missing Sofort conditions."))?;

        match (conditions.fee, conditions.fee_relative) {
            (Some(fee), Some(fee_relative)) => Ok((fee, fee_relative)),
            _ => Err(AppError::configuration("Missing Sofort condition fees.")),
        }
    }
}

fn to_cents(value: Decimal) -> AppResult<i64> {
    value
        .ceil()
        .to_i64()
        .ok_or_else(|| AppError::configuration(format!("Fee {} does not fit in cents", value)))
}

fn overflow(amount: i64) -> AppError {
    AppError::configuration(format!("Fee for amount {} overflows", amount))
}

/// Sofort fee in cents for `amount` cents
pub fn calculate_fee(amount: i64, conditions: Option<&FeeConditions>) -> AppResult<i64> {
    let (fee, fee_relative) = FeeConditions::resolve(conditions)?;
    let total = Decimal::from(amount)
        .checked_mul(fee_relative)
        .and_then(|relative| relative.checked_add(fee))
        .ok_or_else(|| overflow(amount))?;
    to_cents(total)
}

/// Amount to charge so that `amount` remains after Sofort deducts its fee
///
/// Only `fee_relative` is used to scale the fee back up; the fixed part is
/// not inverted separately.
pub fn neutralize_fee(amount: i64, conditions: Option<&FeeConditions>) -> AppResult<i64> {
    let (_, fee_relative) = FeeConditions::resolve(conditions)?;
    let divisor = Decimal::ONE - fee_relative;
    if divisor <= Decimal::ZERO {
        return Err(AppError::configuration(format!(
            "fee_relative must be below 1, got {}",
            fee_relative
        )));
    }

    let fee = calculate_fee(amount, conditions)?;
    let surcharge = Decimal::from(fee)
        .checked_div(divisor)
        .ok_or_else(|| overflow(amount))?;
    amount
        .checked_add(to_cents(surcharge)?)
        .ok_or_else(|| overflow(amount))
}
