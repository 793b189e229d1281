//! Backtest simulator: signal rows to the gold tier.
//!
//! Long/flat only. Exposure realized on day t comes from the position held
//! at the close of day t-1; collapsing that one-day lag to same-day position
//! would let the strategy trade on information it does not yet have.

use crate::domain::error::PipelineError;
use crate::domain::metrics::MetricsRecord;
use crate::domain::signals::{Signal, SignalBar};

/// Simulation parameters. `txn_cost_rate` is a flat per-position-change cost
/// as a fraction of equity.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub txn_cost_rate: f64,
}

impl BacktestConfig {
    /// Costs are quoted in basis points in config files.
    pub fn from_basis_points(initial_capital: f64, txn_cost_bps: f64) -> Self {
        BacktestConfig {
            initial_capital,
            txn_cost_rate: txn_cost_bps / 10_000.0,
        }
    }
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig::from_basis_points(1_000_000.0, 10.0)
    }
}

/// A gold-tier row: the signal row plus simulated state.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestBar {
    pub signal: SignalBar,
    pub position: u8,
    pub trade: u8,
    pub market_return: f64,
    pub strategy_return: f64,
    pub txn_cost: f64,
    pub net_return: f64,
    pub equity: f64,
}

/// Simulate the signal series into positions, returns, and an equity curve.
///
/// Position derivation is a left-to-right fold: BUY sets 1, SELL sets 0, and
/// HOLD carries the previous value forward (it is a no-op, not a reset), with
/// 0 before the first directional signal. HOLD's carry-forward meaning makes
/// this sequential state, not a per-row function of the current row.
pub fn simulate(
    signals: &[SignalBar],
    config: &BacktestConfig,
) -> Result<(Vec<BacktestBar>, MetricsRecord), PipelineError> {
    if signals.is_empty() {
        return Err(PipelineError::EmptyTable {
            stage: "backtest".into(),
        });
    }

    let mut rows: Vec<BacktestBar> = Vec::with_capacity(signals.len());
    let mut prev_position: u8 = 0;
    let mut prev_adj_close: Option<f64> = None;
    let mut equity = config.initial_capital;

    for signal_bar in signals {
        let position = match signal_bar.signal {
            Signal::Buy => 1,
            Signal::Sell => 0,
            Signal::Hold => prev_position,
        };

        // First row has no prior reference: market return and trade are 0.
        let adj_close = signal_bar.feature.bar.adj_close;
        let market_return = match prev_adj_close {
            Some(prev) => (adj_close - prev) / prev,
            None => 0.0,
        };
        let trade = match prev_adj_close {
            Some(_) => position.abs_diff(prev_position),
            None => 0,
        };

        let strategy_return = f64::from(prev_position) * market_return;
        let txn_cost = f64::from(trade) * config.txn_cost_rate;
        let net_return = strategy_return - txn_cost;
        equity *= 1.0 + net_return;

        rows.push(BacktestBar {
            signal: signal_bar.clone(),
            position,
            trade,
            market_return,
            strategy_return,
            txn_cost,
            net_return,
            equity,
        });

        prev_position = position;
        prev_adj_close = Some(adj_close);
    }

    let metrics = MetricsRecord::compute(&rows, config.initial_capital);
    Ok((rows, metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::features::{FeatureBar, VolRegime};
    use crate::domain::table::PriceBar;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn make_signal_bar(day: i64, adj_close: f64, signal: Signal) -> SignalBar {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(day);
        SignalBar {
            feature: FeatureBar {
                bar: PriceBar {
                    ticker: "TEST".into(),
                    date,
                    open: adj_close,
                    high: adj_close + 1.0,
                    low: adj_close - 1.0,
                    close: adj_close,
                    adj_close,
                    volume: 1000,
                },
                return_1d: 0.0,
                vol_20d: 0.01,
                vol_60d: 0.012,
                growth_60d: 0.05,
                risk_adj_60d: 0.5,
                vol_regime: VolRegime::Medium,
            },
            signal,
        }
    }

    /// Signals with per-day market returns applied to a 100.0 starting price.
    fn series(signals: &[(Signal, f64)]) -> Vec<SignalBar> {
        let mut price = 100.0;
        signals
            .iter()
            .enumerate()
            .map(|(i, &(signal, ret))| {
                if i > 0 {
                    price *= 1.0 + ret;
                }
                make_signal_bar(i as i64, price, signal)
            })
            .collect()
    }

    fn zero_cost(initial: f64) -> BacktestConfig {
        BacktestConfig {
            initial_capital: initial,
            txn_cost_rate: 0.0,
        }
    }

    #[test]
    fn empty_input_is_fatal() {
        let result = simulate(&[], &BacktestConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyTable { .. })));
    }

    #[test]
    fn hold_carries_position_forward() {
        let signals = series(&[
            (Signal::Buy, 0.0),
            (Signal::Hold, 0.01),
            (Signal::Hold, 0.01),
            (Signal::Sell, 0.01),
            (Signal::Hold, 0.01),
        ]);
        let (rows, _) = simulate(&signals, &zero_cost(100.0)).unwrap();
        let positions: Vec<u8> = rows.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![1, 1, 1, 0, 0]);
    }

    #[test]
    fn strategy_return_uses_prior_day_position() {
        // Day 2's return must come from day 1's position, never day 2's.
        let signals = series(&[
            (Signal::Hold, 0.0),
            (Signal::Buy, 0.02),
            (Signal::Hold, 0.03),
            (Signal::Sell, -0.01),
        ]);
        let (rows, _) = simulate(&signals, &zero_cost(100.0)).unwrap();

        assert_eq!(rows[1].position, 1);
        assert_relative_eq!(rows[1].strategy_return, 0.0, epsilon = 1e-12);
        assert_relative_eq!(rows[2].strategy_return, 0.03, epsilon = 1e-12);
        assert_relative_eq!(rows[3].strategy_return, -0.01, epsilon = 1e-12);
    }

    #[test]
    fn trade_flags_position_changes_only() {
        let signals = series(&[
            (Signal::Hold, 0.0),
            (Signal::Buy, 0.01),
            (Signal::Hold, 0.01),
            (Signal::Buy, 0.01),
            (Signal::Sell, 0.01),
        ]);
        let (rows, _) = simulate(&signals, &zero_cost(100.0)).unwrap();
        let trades: Vec<u8> = rows.iter().map(|r| r.trade).collect();
        // Re-issuing BUY while long is not a trade.
        assert_eq!(trades, vec![0, 1, 0, 0, 1]);
    }

    #[test]
    fn cost_charged_once_per_position_change() {
        let signals = series(&[
            (Signal::Buy, 0.0),
            (Signal::Hold, 0.0),
            (Signal::Hold, 0.0),
            (Signal::Sell, 0.0),
        ]);
        let config = BacktestConfig::from_basis_points(100.0, 10.0);
        let (rows, _) = simulate(&signals, &config).unwrap();
        let costs: Vec<f64> = rows.iter().map(|r| r.txn_cost).collect();
        assert_relative_eq!(costs[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(costs[1], 0.001, epsilon = 1e-12);
        assert_relative_eq!(costs[2], 0.0, epsilon = 1e-12);
        assert_relative_eq!(costs[3], 0.001, epsilon = 1e-12);
    }

    #[test]
    fn equity_is_cumulative_product_of_net_returns() {
        let signals = series(&[
            (Signal::Buy, 0.0),
            (Signal::Hold, 0.02),
            (Signal::Hold, -0.01),
        ]);
        let (rows, _) = simulate(&signals, &zero_cost(1000.0)).unwrap();
        assert_relative_eq!(rows[0].equity, 1000.0, epsilon = 1e-9);
        assert_relative_eq!(rows[1].equity, 1000.0 * 1.02, epsilon = 1e-9);
        assert_relative_eq!(rows[2].equity, 1000.0 * 1.02 * 0.99, epsilon = 1e-9);
    }

    #[test]
    fn flat_series_with_no_buy_keeps_equity_constant() {
        let signals = series(&[
            (Signal::Hold, 0.0),
            (Signal::Hold, 0.0),
            (Signal::Sell, 0.0),
            (Signal::Hold, 0.0),
        ]);
        let (rows, metrics) = simulate(&signals, &zero_cost(50_000.0)).unwrap();
        for row in &rows {
            assert_relative_eq!(row.equity, 50_000.0, epsilon = 1e-9);
        }
        assert_relative_eq!(metrics.max_drawdown, 0.0, epsilon = 1e-12);
        assert!(metrics.sharpe.is_none());
    }

    #[test]
    fn first_row_has_no_prior_reference() {
        let signals = series(&[(Signal::Buy, 0.0), (Signal::Hold, 0.01)]);
        let config = BacktestConfig::from_basis_points(100.0, 10.0);
        let (rows, _) = simulate(&signals, &config).unwrap();
        assert_relative_eq!(rows[0].market_return, 0.0, epsilon = 1e-12);
        assert_eq!(rows[0].trade, 0);
        assert_relative_eq!(rows[0].strategy_return, 0.0, epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn fold_invariants_hold(
            moves in prop::collection::vec((0u8..3, 0.95f64..1.05), 1..120)
        ) {
            let mut price = 100.0;
            let signals: Vec<SignalBar> = moves
                .iter()
                .enumerate()
                .map(|(i, &(s, factor))| {
                    if i > 0 {
                        price *= factor;
                    }
                    let signal = match s {
                        0 => Signal::Buy,
                        1 => Signal::Sell,
                        _ => Signal::Hold,
                    };
                    make_signal_bar(i as i64, price, signal)
                })
                .collect();

            let config = BacktestConfig::from_basis_points(10_000.0, 10.0);
            let (rows, metrics) = simulate(&signals, &config).unwrap();

            let mut prev_position = 0u8;
            for (i, row) in rows.iter().enumerate() {
                prop_assert!(row.position <= 1);
                if i == 0 {
                    prop_assert_eq!(row.trade, 0);
                } else {
                    prop_assert_eq!(row.trade, row.position.abs_diff(prev_position));
                }
                // Returns stay above -100%, so equity stays positive.
                prop_assert!(row.equity > 0.0);
                prev_position = row.position;
            }
            prop_assert!(metrics.max_drawdown <= 0.0);
        }
    }
}
