use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::Rate;

/// Baseline assumptions applied when the caller supplies none of their own:
/// a 7-year explicit horizon, 10% required return, 2.5% terminal growth.
///
/// Held as an explicit value rather than module-level constants so an outer
/// layer can load its own defaults from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssumptionDefaults {
    /// Number of explicit forecast years
    pub horizon_years: u32,
    /// Required rate of return (discount rate)
    pub required_return: Rate,
    /// Perpetual growth rate applied beyond the horizon
    pub terminal_growth_rate: Rate,
}

impl Default for AssumptionDefaults {
    fn default() -> Self {
        Self {
            horizon_years: 7,
            required_return: dec!(0.10),
            terminal_growth_rate: dec!(0.025),
        }
    }
}

/// Bisection tuning for the implied-parameter solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Convergence tolerance, applied to both the per-share pricing error and
    /// the bracket width.
    pub tolerance: Decimal,
    /// Iteration cap before the solve is abandoned.
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: dec!(0.0000001),
            max_iterations: 200,
        }
    }
}
