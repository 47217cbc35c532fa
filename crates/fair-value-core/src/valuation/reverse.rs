use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::SolverConfig;
use crate::error::FairValueError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::FairValueResult;

use super::dcf::{fair_value_per_share, ValuationInputs};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default growth-rate search bracket. Wide enough for the triple-digit
/// implied growth a richly priced stock can carry.
const GROWTH_BRACKET: (Decimal, Decimal) = (dec!(-0.50), dec!(3.00));

/// Default FCF-margin search bracket. Implied margins above 100% of revenue
/// are economically absurd but still worth reporting.
const MARGIN_BRACKET: (Decimal, Decimal) = (dec!(-1.00), dec!(3.00));

/// Offset above the terminal growth rate for the required-return bracket
/// floor; keeps the Gordon denominator positive at the low end.
const RETURN_BRACKET_FLOOR_OFFSET: Decimal = dec!(0.0001);

/// Ceiling of the required-return search bracket (100% annualized).
const RETURN_BRACKET_CEILING: Decimal = dec!(1.00);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which single assumption the solver varies while holding the rest fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpliedVariable {
    GrowthRate,
    FcfMargin,
    RequiredReturn,
}

impl ImpliedVariable {
    /// Search bracket covering the implied values a realistic price gap can
    /// produce. The required-return floor sits just above the terminal growth
    /// rate.
    pub fn default_bracket(self, input: &ValuationInputs) -> (Rate, Rate) {
        match self {
            ImpliedVariable::GrowthRate => GROWTH_BRACKET,
            ImpliedVariable::FcfMargin => MARGIN_BRACKET,
            ImpliedVariable::RequiredReturn => (
                input.terminal_growth_rate + RETURN_BRACKET_FLOOR_OFFSET,
                RETURN_BRACKET_CEILING,
            ),
        }
    }

    /// Clone `input` with this variable overridden to `x`.
    fn apply(self, input: &ValuationInputs, x: Rate) -> ValuationInputs {
        let mut overridden = input.clone();
        match self {
            ImpliedVariable::GrowthRate => overridden.growth_rate = x,
            ImpliedVariable::FcfMargin => overridden.fcf_margin = x,
            ImpliedVariable::RequiredReturn => overridden.required_return = x,
        }
        overridden
    }
}

/// A single implied-parameter question: which assumption, what per-share
/// target price, where to search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpliedQuery {
    pub variable: ImpliedVariable,
    /// Per-share market price the solved assumption must reproduce.
    pub target_price: Money,
    /// Search bracket (lo, hi); must straddle the answer.
    pub bracket: (Rate, Rate),
}

impl ImpliedQuery {
    /// Query using the documented default bracket for `variable`.
    pub fn new(variable: ImpliedVariable, target_price: Money, input: &ValuationInputs) -> Self {
        Self {
            variable,
            target_price,
            bracket: variable.default_bracket(input),
        }
    }
}

/// Result of one implied-parameter solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpliedParameterOutput {
    pub variable: ImpliedVariable,
    /// Value of the queried assumption that reproduces the target price.
    pub implied_value: Rate,
    /// Bisection iterations used.
    pub iterations: u32,
    /// True when the solve ended inside tolerance. Check this before trusting
    /// `implied_value`.
    pub converged: bool,
}

/// Implied assumptions for all three queryable variables against one market
/// price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseDcfOutput {
    pub implied_growth_rate: ImpliedParameterOutput,
    pub implied_fcf_margin: ImpliedParameterOutput,
    pub implied_required_return: ImpliedParameterOutput,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Find the value of one assumption that makes the DCF fair value equal the
/// target price, holding the other assumptions fixed.
///
/// The fair value is monotone in each queryable variable (increasing in
/// growth and margin, decreasing in required return), so a sign change of
/// f(x) = fair_value(x) - target across the bracket pins down a unique root.
/// Bisection narrows the bracket until the pricing error or the bracket width
/// drops below `config.tolerance`; hitting `config.max_iterations` first is a
/// `ConvergenceFailure`, and a bracket whose endpoints price on the same side
/// of the target is rejected with `NoSignChange`.
pub fn solve_implied(
    input: &ValuationInputs,
    query: &ImpliedQuery,
    config: &SolverConfig,
) -> FairValueResult<ComputationOutput<ImpliedParameterOutput>> {
    let start = Instant::now();

    validate_query(query, config)?;

    let output = bisect(input, query, config)?;

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Reverse DCF (bracketed bisection)",
        query,
        Vec::new(),
        elapsed,
        output,
    ))
}

/// Solve all three assumptions against the current market price: the growth
/// rate, FCF margin, and required return that would each justify that price
/// on their own, searched over their default brackets.
pub fn calculate_reverse_dcf(
    input: &ValuationInputs,
    market_price: Money,
    config: &SolverConfig,
) -> FairValueResult<ComputationOutput<ReverseDcfOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let implied_growth_rate = solve_variable(input, ImpliedVariable::GrowthRate, market_price, config)?;
    let implied_fcf_margin = solve_variable(input, ImpliedVariable::FcfMargin, market_price, config)?;
    let implied_required_return =
        solve_variable(input, ImpliedVariable::RequiredReturn, market_price, config)?;

    if implied_growth_rate.implied_value > dec!(1.00) {
        warnings.push(format!(
            "Implied revenue growth of {:.1}% per year exceeds 100%; the market price likely cannot be justified by growth alone",
            implied_growth_rate.implied_value * dec!(100)
        ));
    }
    if implied_fcf_margin.implied_value > Decimal::ONE {
        warnings.push(format!(
            "Implied FCF margin of {:.1}% exceeds revenue; the market price likely cannot be justified by margin alone",
            implied_fcf_margin.implied_value * dec!(100)
        ));
    }

    let output = ReverseDcfOutput {
        implied_growth_rate,
        implied_fcf_margin,
        implied_required_return,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Reverse DCF (implied growth, margin, and required return)",
        &serde_json::json!({ "inputs": input, "market_price": market_price }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_query(query: &ImpliedQuery, config: &SolverConfig) -> FairValueResult<()> {
    if query.target_price <= Decimal::ZERO {
        return Err(FairValueError::InvalidInput {
            field: "target_price".into(),
            reason: "Target price must be positive".into(),
        });
    }
    let (lo, hi) = query.bracket;
    if lo >= hi {
        return Err(FairValueError::InvalidInput {
            field: "bracket".into(),
            reason: format!("Bracket low ({lo}) must be below bracket high ({hi})"),
        });
    }
    if config.tolerance <= Decimal::ZERO {
        return Err(FairValueError::InvalidInput {
            field: "tolerance".into(),
            reason: "Solver tolerance must be positive".into(),
        });
    }
    if config.max_iterations == 0 {
        return Err(FairValueError::InvalidInput {
            field: "max_iterations".into(),
            reason: "Solver iteration cap must be at least 1".into(),
        });
    }
    Ok(())
}

fn solve_variable(
    input: &ValuationInputs,
    variable: ImpliedVariable,
    market_price: Money,
    config: &SolverConfig,
) -> FairValueResult<ImpliedParameterOutput> {
    let query = ImpliedQuery::new(variable, market_price, input);
    Ok(solve_implied(input, &query, config)?.result)
}

/// Per-share pricing error of the candidate assumption:
/// f(x) = fair_value(inputs with variable = x) - target.
fn pricing_error(
    input: &ValuationInputs,
    query: &ImpliedQuery,
    x: Rate,
) -> FairValueResult<Money> {
    let candidate = query.variable.apply(input, x);
    Ok(fair_value_per_share(&candidate)? - query.target_price)
}

fn bisect(
    input: &ValuationInputs,
    query: &ImpliedQuery,
    config: &SolverConfig,
) -> FairValueResult<ImpliedParameterOutput> {
    let (mut lo, mut hi) = query.bracket;

    let mut f_lo = pricing_error(input, query, lo)?;
    let f_hi = pricing_error(input, query, hi)?;

    // An endpoint already within tolerance is the answer.
    if f_lo.abs() < config.tolerance {
        return Ok(converged(query.variable, lo, 0));
    }
    if f_hi.abs() < config.tolerance {
        return Ok(converged(query.variable, hi, 0));
    }

    if f_lo * f_hi > Decimal::ZERO {
        return Err(FairValueError::NoSignChange {
            lo,
            hi,
            value_lo: f_lo,
            value_hi: f_hi,
        });
    }

    let mut last_delta = f_lo.abs().min(f_hi.abs());

    for iteration in 1..=config.max_iterations {
        let mid = (lo + hi) / dec!(2);
        let f_mid = pricing_error(input, query, mid)?;
        last_delta = f_mid.abs();

        if f_mid.abs() < config.tolerance || (hi - lo).abs() < config.tolerance {
            return Ok(converged(query.variable, mid, iteration));
        }

        if f_lo * f_mid < Decimal::ZERO {
            hi = mid;
        } else {
            lo = mid;
            f_lo = f_mid;
        }
    }

    Err(FairValueError::ConvergenceFailure {
        function: "solve_implied".into(),
        iterations: config.max_iterations,
        last_delta,
    })
}

fn converged(variable: ImpliedVariable, value: Rate, iterations: u32) -> ImpliedParameterOutput {
    ImpliedParameterOutput {
        variable,
        implied_value: value,
        iterations,
        converged: true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
