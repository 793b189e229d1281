//! Signal engine: feature rows to per-day trading decisions.

use crate::domain::error::PipelineError;
use crate::domain::features::{FeatureBar, VolRegime};
use std::fmt;
use std::str::FromStr;

/// Per-row trading decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(Signal::Buy),
            "SELL" => Ok(Signal::Sell),
            "HOLD" => Ok(Signal::Hold),
            other => Err(format!("unknown signal: {other}")),
        }
    }
}

/// A signal-tier row.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBar {
    pub feature: FeatureBar,
    pub signal: Signal,
}

/// Generate one decision per row. Row-local: no cross-row state, no
/// lookahead.
pub fn generate_signals(features: &[FeatureBar]) -> Result<Vec<SignalBar>, PipelineError> {
    if features.is_empty() {
        return Err(PipelineError::EmptyTable {
            stage: "signals".into(),
        });
    }

    Ok(features
        .iter()
        .map(|f| SignalBar {
            feature: f.clone(),
            signal: decide(f),
        })
        .collect())
}

/// SELL is evaluated first: a row satisfying both predicates must exit, not
/// enter. Risk containment has priority over opportunity capture.
fn decide(f: &FeatureBar) -> Signal {
    if f.risk_adj_60d < 0.0 || f.vol_regime == VolRegime::High {
        Signal::Sell
    } else if f.risk_adj_60d > 1.0 && f.growth_60d > 0.0 && f.vol_regime == VolRegime::Low {
        Signal::Buy
    } else {
        Signal::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::PriceBar;
    use chrono::NaiveDate;

    fn make_feature(risk_adj: f64, growth: f64, regime: VolRegime) -> FeatureBar {
        FeatureBar {
            bar: PriceBar {
                ticker: "TEST".into(),
                date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                adj_close: 100.0,
                volume: 1000,
            },
            return_1d: 0.001,
            vol_20d: 0.01,
            vol_60d: 0.012,
            growth_60d: growth,
            risk_adj_60d: risk_adj,
            vol_regime: regime,
        }
    }

    #[test]
    fn buy_when_all_conditions_hold() {
        let f = make_feature(1.5, 0.10, VolRegime::Low);
        assert_eq!(decide(&f), Signal::Buy);
    }

    #[test]
    fn sell_on_negative_risk_adjusted_return() {
        let f = make_feature(-0.5, 0.10, VolRegime::Low);
        assert_eq!(decide(&f), Signal::Sell);
    }

    #[test]
    fn sell_on_high_regime() {
        let f = make_feature(1.5, 0.10, VolRegime::High);
        assert_eq!(decide(&f), Signal::Sell);
    }

    #[test]
    fn hold_when_neither_triggers() {
        let f = make_feature(0.5, 0.10, VolRegime::Low);
        assert_eq!(decide(&f), Signal::Hold);

        let f = make_feature(1.5, -0.10, VolRegime::Low);
        assert_eq!(decide(&f), Signal::Hold);

        let f = make_feature(1.5, 0.10, VolRegime::Medium);
        assert_eq!(decide(&f), Signal::Hold);
    }

    #[test]
    fn sell_takes_precedence_over_buy() {
        // Negative risk-adjusted return with an otherwise buy-shaped row.
        let f = make_feature(-1.0, 0.10, VolRegime::Low);
        assert_eq!(decide(&f), Signal::Sell);
    }

    #[test]
    fn one_signal_per_row() {
        let features = vec![
            make_feature(1.5, 0.10, VolRegime::Low),
            make_feature(-0.5, 0.10, VolRegime::Low),
            make_feature(0.5, 0.10, VolRegime::Medium),
        ];
        let signals = generate_signals(&features).unwrap();
        assert_eq!(signals.len(), 3);
        assert_eq!(signals[0].signal, Signal::Buy);
        assert_eq!(signals[1].signal, Signal::Sell);
        assert_eq!(signals[2].signal, Signal::Hold);
    }

    #[test]
    fn empty_input_is_fatal() {
        assert!(matches!(
            generate_signals(&[]),
            Err(PipelineError::EmptyTable { .. })
        ));
    }

    #[test]
    fn signal_display_round_trip() {
        for signal in [Signal::Buy, Signal::Sell, Signal::Hold] {
            assert_eq!(signal.to_string().parse::<Signal>().unwrap(), signal);
        }
    }
}
