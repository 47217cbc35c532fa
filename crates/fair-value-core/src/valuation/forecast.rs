use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FairValueError;
use crate::types::{Money, ProjectionPeriod, Rate};
use crate::FairValueResult;

/// Projected revenue and free cash flow for a single forecast year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowProjection {
    pub period: ProjectionPeriod,
    pub revenue: Money,
    pub free_cash_flow: Money,
}

/// Expand a base revenue into `horizon_years` of projected revenues and free
/// cash flows under flat growth and margin assumptions.
///
/// Year i: revenue_i = base_revenue * (1 + growth_rate)^i,
/// free_cash_flow_i = revenue_i * fcf_margin. The same growth and margin are
/// compounded every year (a flat assumption, not a schedule), which keeps the
/// resulting fair value monotone in both; the reverse-DCF solver depends on
/// that.
pub fn project_cash_flows(
    base_revenue: Money,
    growth_rate: Rate,
    fcf_margin: Rate,
    horizon_years: u32,
) -> FairValueResult<Vec<CashFlowProjection>> {
    if horizon_years < 1 {
        return Err(FairValueError::InvalidInput {
            field: "horizon_years".into(),
            reason: "Forecast horizon must be at least 1 year".into(),
        });
    }

    let mut projections = Vec::with_capacity(horizon_years as usize);
    let mut revenue = base_revenue;

    for year in 1..=horizon_years {
        revenue *= Decimal::ONE + growth_rate;
        projections.push(CashFlowProjection {
            period: ProjectionPeriod {
                year: year as i32,
                label: format!("Year {year}"),
                is_terminal: false,
            },
            revenue,
            free_cash_flow: revenue * fcf_margin,
        });
    }

    Ok(projections)
}
