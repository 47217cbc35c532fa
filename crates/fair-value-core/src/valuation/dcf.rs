use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::AssumptionDefaults;
use crate::error::FairValueError;
use crate::time_value::{discount_factor, present_value};
use crate::types::{with_metadata, ComputationOutput, Money, ProjectionPeriod, Rate};
use crate::FairValueResult;

use super::forecast::project_cash_flows;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input parameters for a single-stage free-cash-flow valuation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationInputs {
    /// Last known annual revenue (Year 0)
    pub base_revenue: Money,
    /// Flat annual revenue growth assumption
    pub growth_rate: Rate,
    /// Free cash flow as a fraction of revenue
    pub fcf_margin: Rate,
    /// Number of explicit forecast years
    pub horizon_years: u32,
    /// Required rate of return (discount rate)
    pub required_return: Rate,
    /// Perpetual growth rate applied beyond the horizon
    pub terminal_growth_rate: Rate,
    /// Diluted shares outstanding for per-share value
    pub shares_outstanding: Decimal,
}

impl ValuationInputs {
    /// Combine ticker-sourced figures with user assumptions, taking the
    /// horizon, required return, and terminal growth from `defaults`.
    pub fn with_defaults(
        defaults: &AssumptionDefaults,
        base_revenue: Money,
        growth_rate: Rate,
        fcf_margin: Rate,
        shares_outstanding: Decimal,
    ) -> Self {
        Self {
            base_revenue,
            growth_rate,
            fcf_margin,
            horizon_years: defaults.horizon_years,
            required_return: defaults.required_return,
            terminal_growth_rate: defaults.terminal_growth_rate,
            shares_outstanding,
        }
    }
}

/// One forecast year after discounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountedCashFlow {
    pub period: ProjectionPeriod,
    pub revenue: Money,
    pub free_cash_flow: Money,
    pub discount_factor: Rate,
    pub present_value: Money,
}

/// Output of the fair value calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FairValueOutput {
    /// Year-by-year discounted projections
    pub projections: Vec<DiscountedCashFlow>,
    /// Undiscounted Gordon-growth terminal value
    pub terminal_value: Money,
    /// Present value of the terminal value
    pub pv_of_terminal: Money,
    /// Sum of present values of explicit-period free cash flows
    pub pv_of_cash_flows: Money,
    /// pv_of_cash_flows + pv_of_terminal
    pub total_present_value: Money,
    /// total_present_value / shares_outstanding
    pub fair_value_per_share: Money,
    /// Discounted terminal value as a share of total present value
    pub terminal_value_pct: Rate,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Gordon growth perpetuity value of all cash flows beyond the horizon:
/// TV = last_fcf * (1 + g) / (r - g).
pub fn terminal_value(
    last_free_cash_flow: Money,
    required_return: Rate,
    terminal_growth_rate: Rate,
) -> FairValueResult<Money> {
    let denom = required_return - terminal_growth_rate;
    if denom <= Decimal::ZERO {
        return Err(FairValueError::FinancialImpossibility(format!(
            "Required return ({required_return}) must exceed terminal growth rate ({terminal_growth_rate}) for the Gordon growth model"
        )));
    }
    Ok(last_free_cash_flow * (Decimal::ONE + terminal_growth_rate) / denom)
}

/// Run a single-stage FCF DCF valuation and report the per-share fair value.
pub fn calculate_fair_value(
    input: &ValuationInputs,
) -> FairValueResult<ComputationOutput<FairValueOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let output = run_dcf(input)?;

    if output.terminal_value_pct > dec!(0.75) {
        warnings.push(format!(
            "Terminal value represents {:.1}% of total present value; consider extending the forecast horizon",
            output.terminal_value_pct * dec!(100)
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Single-stage FCF DCF (Gordon growth terminal value)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

/// Per-share fair value without the reporting envelope. The reverse-DCF
/// solver iterates on this.
pub fn fair_value_per_share(input: &ValuationInputs) -> FairValueResult<Money> {
    Ok(run_dcf(input)?.fair_value_per_share)
}

/// Signed fractional upside (positive) or downside (negative) of a fair value
/// relative to the current market price.
pub fn upside_downside(fair_value_per_share: Money, market_price: Money) -> FairValueResult<Rate> {
    if market_price <= Decimal::ZERO {
        return Err(FairValueError::InvalidInput {
            field: "market_price".into(),
            reason: "Market price must be positive".into(),
        });
    }
    Ok((fair_value_per_share - market_price) / market_price)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_inputs(input: &ValuationInputs) -> FairValueResult<()> {
    if input.base_revenue <= Decimal::ZERO {
        return Err(FairValueError::InvalidInput {
            field: "base_revenue".into(),
            reason: "Base revenue must be positive".into(),
        });
    }
    if input.shares_outstanding <= Decimal::ZERO {
        return Err(FairValueError::InvalidInput {
            field: "shares_outstanding".into(),
            reason: "Shares outstanding must be positive".into(),
        });
    }
    if input.horizon_years < 1 {
        return Err(FairValueError::InvalidInput {
            field: "horizon_years".into(),
            reason: "Forecast horizon must be at least 1 year".into(),
        });
    }
    if input.required_return <= dec!(-1) {
        return Err(FairValueError::InvalidInput {
            field: "required_return".into(),
            reason: "Required return must be greater than -100%".into(),
        });
    }
    if input.required_return <= input.terminal_growth_rate {
        return Err(FairValueError::FinancialImpossibility(format!(
            "Required return ({}) must exceed terminal growth rate ({}) for the Gordon growth model",
            input.required_return, input.terminal_growth_rate
        )));
    }
    Ok(())
}

fn run_dcf(input: &ValuationInputs) -> FairValueResult<FairValueOutput> {
    validate_inputs(input)?;

    let projected = project_cash_flows(
        input.base_revenue,
        input.growth_rate,
        input.fcf_margin,
        input.horizon_years,
    )?;

    let mut projections = Vec::with_capacity(projected.len());
    let mut pv_of_cash_flows = Decimal::ZERO;

    for p in projected {
        let factor = discount_factor(input.required_return, p.period.year as u32)?;
        let pv = p.free_cash_flow * factor;
        pv_of_cash_flows += pv;
        projections.push(DiscountedCashFlow {
            period: p.period,
            revenue: p.revenue,
            free_cash_flow: p.free_cash_flow,
            discount_factor: factor,
            present_value: pv,
        });
    }

    let last = projections.last().ok_or_else(|| {
        FairValueError::InsufficientData("No projection years generated".into())
    })?;

    let terminal = terminal_value(
        last.free_cash_flow,
        input.required_return,
        input.terminal_growth_rate,
    )?;
    let pv_of_terminal = present_value(terminal, input.required_return, input.horizon_years)?;

    let total_present_value = pv_of_cash_flows + pv_of_terminal;
    let fair_value_per_share = total_present_value / input.shares_outstanding;

    let terminal_value_pct = if total_present_value.is_zero() {
        Decimal::ZERO
    } else {
        pv_of_terminal / total_present_value
    };

    Ok(FairValueOutput {
        projections,
        terminal_value: terminal,
        pv_of_terminal,
        pv_of_cash_flows,
        total_present_value,
        fair_value_per_share,
        terminal_value_pct,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_inputs() -> ValuationInputs {
        ValuationInputs {
            base_revenue: dec!(100),
            growth_rate: dec!(0.10),
            fcf_margin: dec!(0.20),
            horizon_years: 5,
            required_return: dec!(0.10),
            terminal_growth_rate: dec!(0.025),
            shares_outstanding: dec!(10),
        }
    }

    #[test]
    fn test_fair_value_worked_example() {
        // Growth equals the discount rate, so every discounted FCF is exactly
        // the Year-0 FCF of 100 * 0.20 = 20.
        let result = calculate_fair_value(&sample_inputs()).unwrap();
        let out = &result.result;

        assert_eq!(out.projections.len(), 5);
        for p in &out.projections {
            assert!((p.present_value - dec!(20)).abs() < dec!(0.0000001));
        }
        assert!((out.pv_of_cash_flows - dec!(100)).abs() < dec!(0.0000001));

        // TV = 20 * 1.1^5 * 1.025 / 0.075; discounted back 5 years at 10%
        // that collapses to 20 * 1.025 / 0.075 = 273.33...
        assert!((out.pv_of_terminal - dec!(273.333333)).abs() < dec!(0.0001));
        assert!((out.total_present_value - dec!(373.333333)).abs() < dec!(0.0001));
        assert!((out.fair_value_per_share - dec!(37.3333333)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_terminal_value_gordon() {
        // TV = 32.2102 * 1.025 / 0.075 = 440.206...
        let tv = terminal_value(dec!(32.2102), dec!(0.10), dec!(0.025)).unwrap();
        assert!((tv - dec!(440.2061)).abs() < dec!(0.001));
    }

    #[test]
    fn test_terminal_value_rejects_return_at_growth() {
        let result = terminal_value(dec!(100), dec!(0.025), dec!(0.025));
        assert!(matches!(
            result,
            Err(FairValueError::FinancialImpossibility(_))
        ));
    }

    #[test]
    fn test_return_equal_to_terminal_growth_rejected() {
        let mut input = sample_inputs();
        input.required_return = dec!(0.025);
        assert!(calculate_fair_value(&input).is_err());
    }

    #[test]
    fn test_return_below_terminal_growth_rejected() {
        let mut input = sample_inputs();
        input.required_return = dec!(0.02);
        assert!(calculate_fair_value(&input).is_err());
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let mut input = sample_inputs();
        input.horizon_years = 0;
        assert!(matches!(
            calculate_fair_value(&input),
            Err(FairValueError::InvalidInput { ref field, .. }) if field == "horizon_years"
        ));
    }

    #[test]
    fn test_negative_base_revenue_rejected() {
        let mut input = sample_inputs();
        input.base_revenue = dec!(-100);
        assert!(calculate_fair_value(&input).is_err());
    }

    #[test]
    fn test_zero_shares_rejected() {
        let mut input = sample_inputs();
        input.shares_outstanding = Decimal::ZERO;
        assert!(calculate_fair_value(&input).is_err());
    }

    #[test]
    fn test_return_at_minus_one_rejected() {
        let mut input = sample_inputs();
        input.required_return = dec!(-1);
        input.terminal_growth_rate = dec!(-1.5);
        assert!(matches!(
            calculate_fair_value(&input),
            Err(FairValueError::InvalidInput { ref field, .. }) if field == "required_return"
        ));
    }

    #[test]
    fn test_terminal_value_pct_bounded() {
        let result = calculate_fair_value(&sample_inputs()).unwrap();
        let out = &result.result;
        assert!(out.terminal_value_pct >= Decimal::ZERO);
        assert!(out.terminal_value_pct <= Decimal::ONE);
        assert_eq!(
            out.terminal_value_pct,
            out.pv_of_terminal / out.total_present_value
        );
    }

    #[test]
    fn test_terminal_dominance_warning() {
        // A short horizon with terminal growth close to the required return
        // makes the perpetuity dwarf the explicit years.
        let input = ValuationInputs {
            base_revenue: dec!(100),
            growth_rate: Decimal::ZERO,
            fcf_margin: dec!(0.20),
            horizon_years: 3,
            required_return: dec!(0.08),
            terminal_growth_rate: dec!(0.06),
            shares_outstanding: dec!(10),
        };
        let result = calculate_fair_value(&input).unwrap();
        assert!(result.result.terminal_value_pct > dec!(0.75));
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn test_methodology_and_metadata() {
        let result = calculate_fair_value(&sample_inputs()).unwrap();
        assert_eq!(
            result.methodology,
            "Single-stage FCF DCF (Gordon growth terminal value)"
        );
        assert_eq!(result.metadata.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_bare_fair_value_matches_envelope() {
        let input = sample_inputs();
        let bare = fair_value_per_share(&input).unwrap();
        let full = calculate_fair_value(&input).unwrap();
        assert_eq!(bare, full.result.fair_value_per_share);
    }

    #[test]
    fn test_with_defaults_fills_assumptions() {
        let defaults = AssumptionDefaults::default();
        let input = ValuationInputs::with_defaults(
            &defaults,
            dec!(1000),
            dec!(0.12),
            dec!(0.20),
            dec!(50),
        );
        assert_eq!(input.horizon_years, 7);
        assert_eq!(input.required_return, dec!(0.10));
        assert_eq!(input.terminal_growth_rate, dec!(0.025));
        assert_eq!(input.growth_rate, dec!(0.12));
    }

    #[test]
    fn test_upside_downside_signs() {
        // Fair value above price: positive upside
        let up = upside_downside(dec!(120), dec!(100)).unwrap();
        assert_eq!(up, dec!(0.2));
        // Fair value below price: negative (downside)
        let down = upside_downside(dec!(80), dec!(100)).unwrap();
        assert_eq!(down, dec!(-0.2));
    }

    #[test]
    fn test_upside_downside_rejects_nonpositive_price() {
        assert!(upside_downside(dec!(100), Decimal::ZERO).is_err());
        assert!(upside_downside(dec!(100), dec!(-1)).is_err());
    }
}
