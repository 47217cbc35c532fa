use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::FairValueError;
use crate::types::{Money, Rate};
use crate::FairValueResult;

/// Discount factor 1 / (1 + r)^year for an end-of-year cash flow.
pub fn discount_factor(rate: Rate, year: u32) -> FairValueResult<Rate> {
    if rate <= dec!(-1) {
        return Err(FairValueError::InvalidInput {
            field: "required_return".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    let compounded = (Decimal::ONE + rate).powd(Decimal::from(year));
    if compounded.is_zero() {
        return Err(FairValueError::DivisionByZero {
            context: format!("discount factor at year {year}"),
        });
    }

    Ok(Decimal::ONE / compounded)
}

/// Present value of a single amount received `year` years from now:
/// amount / (1 + r)^year.
pub fn present_value(amount: Money, rate: Rate, year: u32) -> FairValueResult<Money> {
    Ok(amount * discount_factor(rate, year)?)
}
