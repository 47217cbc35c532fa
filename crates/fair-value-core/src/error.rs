use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FairValueError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Financial impossibility: {0}")]
    FinancialImpossibility(String),

    #[error("No sign change over [{lo}, {hi}]: pricing error is {value_lo} at lo and {value_hi} at hi; the target price lies outside what this bracket can express")]
    NoSignChange {
        lo: Decimal,
        hi: Decimal,
        value_lo: Decimal,
        value_hi: Decimal,
    },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },
}
