//! Feature engine: silver bars to the engineered-feature tier.
//!
//! Two-phase by construction. Phase one walks the series computing rolling
//! statistics per row; phase two partitions the completed 60-day volatility
//! column into terciles for the regime label. The partition needs the whole
//! series, so the phases cannot be fused into one streaming pass.

use crate::domain::error::PipelineError;
use crate::domain::rolling::{mean, quantile, sample_std};
use crate::domain::table::PriceBar;
use std::fmt;
use std::str::FromStr;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Short and long rolling windows, in trading days.
pub const SHORT_WINDOW: usize = 20;
pub const LONG_WINDOW: usize = 60;

/// Volatility regime, assigned from the whole-series tercile distribution of
/// 60-day volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolRegime {
    Low,
    Medium,
    High,
}

impl fmt::Display for VolRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolRegime::Low => write!(f, "LOW"),
            VolRegime::Medium => write!(f, "MEDIUM"),
            VolRegime::High => write!(f, "HIGH"),
        }
    }
}

impl FromStr for VolRegime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(VolRegime::Low),
            "MEDIUM" => Ok(VolRegime::Medium),
            "HIGH" => Ok(VolRegime::High),
            other => Err(format!("unknown volatility regime: {other}")),
        }
    }
}

/// A feature-tier row: the validated bar plus derived fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBar {
    pub bar: PriceBar,
    pub return_1d: f64,
    pub vol_20d: f64,
    pub vol_60d: f64,
    pub growth_60d: f64,
    pub risk_adj_60d: f64,
    pub vol_regime: VolRegime,
}

/// Compute rolling features over a single instrument's chronologically
/// sorted series. Rows lacking a full lookback window, or whose trailing
/// return standard deviation is zero, are dropped; the output is shorter
/// than the input by at least `LONG_WINDOW` leading rows.
pub fn build_features(bars: &[PriceBar]) -> Result<Vec<FeatureBar>, PipelineError> {
    if bars.is_empty() {
        return Err(PipelineError::EmptyTable {
            stage: "features".into(),
        });
    }

    let n = bars.len();

    // rets[i - 1] is the 1-day return realized at bar i.
    let rets: Vec<f64> = (1..n)
        .map(|i| {
            let prev = bars[i - 1].adj_close;
            (bars[i].adj_close - prev) / prev
        })
        .collect();

    // Phase 1: per-row rolling statistics. The window for bar t covers the
    // trailing w returns ending at t, so nothing past t is ever read.
    let mut partial: Vec<Option<PartialFeatures>> = vec![None; n];
    for t in LONG_WINDOW..n {
        let short = &rets[t - SHORT_WINDOW..t];
        let long = &rets[t - LONG_WINDOW..t];

        let Some(vol_20d) = sample_std(short) else {
            continue;
        };
        let Some(vol_60d) = sample_std(long) else {
            continue;
        };

        let growth_60d = (bars[t].adj_close / bars[t - LONG_WINDOW].adj_close)
            .powf(TRADING_DAYS_PER_YEAR / LONG_WINDOW as f64)
            - 1.0;

        // Zero dispersion makes the ratio undefined; the row is dropped
        // rather than coerced to zero.
        let risk_adj_60d = (vol_60d > 0.0)
            .then(|| mean(long) / vol_60d * TRADING_DAYS_PER_YEAR.sqrt());

        partial[t] = Some(PartialFeatures {
            return_1d: rets[t - 1],
            vol_20d,
            vol_60d,
            growth_60d,
            risk_adj_60d,
        });
    }

    // Phase 2: whole-series tercile partition of 60-day volatility.
    let mut vols: Vec<f64> = partial
        .iter()
        .flatten()
        .map(|p| p.vol_60d)
        .collect();
    vols.sort_by(|a, b| a.total_cmp(b));
    if vols.is_empty() {
        return Ok(Vec::new());
    }
    let (low_cut, medium_cut) = tercile_cuts(&vols);

    let features = partial
        .into_iter()
        .enumerate()
        .filter_map(|(t, p)| {
            let p = p?;
            let risk_adj_60d = p.risk_adj_60d?;
            Some(FeatureBar {
                bar: bars[t].clone(),
                return_1d: p.return_1d,
                vol_20d: p.vol_20d,
                vol_60d: p.vol_60d,
                growth_60d: p.growth_60d,
                risk_adj_60d,
                vol_regime: label_regime(p.vol_60d, low_cut, medium_cut),
            })
        })
        .collect();

    Ok(features)
}

#[derive(Debug, Clone, Copy)]
struct PartialFeatures {
    return_1d: f64,
    vol_20d: f64,
    vol_60d: f64,
    growth_60d: f64,
    risk_adj_60d: Option<f64>,
}

/// Equal-population tercile boundaries over an ascending-sorted slice.
fn tercile_cuts(sorted_vols: &[f64]) -> (f64, f64) {
    (
        quantile(sorted_vols, 1.0 / 3.0),
        quantile(sorted_vols, 2.0 / 3.0),
    )
}

/// Right-closed bucket assignment: (..low] LOW, (low..medium] MEDIUM,
/// (medium..) HIGH.
fn label_regime(vol: f64, low_cut: f64, medium_cut: f64) -> VolRegime {
    if vol <= low_cut {
        VolRegime::Low
    } else if vol <= medium_cut {
        VolRegime::Medium
    } else {
        VolRegime::High
    }
}
