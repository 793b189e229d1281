//! Summary statistics over a simulated backtest series.

use crate::domain::backtest::BacktestBar;
use crate::domain::features::TRADING_DAYS_PER_YEAR;
use crate::domain::rolling::{mean, sample_std};
use serde::Serialize;

/// Single-row summary written alongside the full gold-tier table.
///
/// `sharpe` is `None` when the net-return standard deviation is zero: an
/// undefined statistic stays undefined rather than being coerced to 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRecord {
    #[serde(rename = "CAGR")]
    pub cagr: f64,
    #[serde(rename = "Sharpe")]
    pub sharpe: Option<f64>,
    #[serde(rename = "MaxDrawdown")]
    pub max_drawdown: f64,
}

impl MetricsRecord {
    pub fn compute(rows: &[BacktestBar], initial_capital: f64) -> Self {
        if rows.is_empty() || initial_capital <= 0.0 {
            return MetricsRecord {
                cagr: 0.0,
                sharpe: None,
                max_drawdown: 0.0,
            };
        }

        let final_equity = rows[rows.len() - 1].equity;
        let total_return = final_equity / initial_capital - 1.0;

        // Annualized over the realized row count, not calendar time.
        let cagr =
            (1.0 + total_return).powf(TRADING_DAYS_PER_YEAR / rows.len() as f64) - 1.0;

        let nets: Vec<f64> = rows.iter().map(|r| r.net_return).collect();
        let sharpe = sample_std(&nets)
            .filter(|std| *std > 0.0)
            .map(|std| mean(&nets) / std * TRADING_DAYS_PER_YEAR.sqrt());

        let max_drawdown = compute_max_drawdown(rows.iter().map(|r| r.equity));

        MetricsRecord {
            cagr,
            sharpe,
            max_drawdown,
        }
    }
}

/// Minimum of `(equity - running_max) / running_max`; 0 when the curve never
/// falls below its running peak.
fn compute_max_drawdown(equity: impl Iterator<Item = f64>) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for value in equity {
        if value > peak {
            peak = value;
        }
        let dd = (value - peak) / peak;
        if dd < max_dd {
            max_dd = dd;
        }
    }
    max_dd
}
