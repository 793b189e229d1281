//! Schema gate: promotes bronze tables to the silver tier.
//!
//! Promotion is two-phase. Best-effort coercion first: each row's cells are
//! parsed to their declared types, and rows that cannot be coerced are
//! dropped and counted. Structural validation second: column set, value
//! bounds, `High >= Low`, and timestamp uniqueness are enforced over the
//! coerced table, and any violation aborts the stage. The gate is strict on
//! purpose: undeclared extra columns are rejected, not passed through, so
//! malformed upstream data cannot leak into feature computation.

use crate::domain::error::PipelineError;
use crate::domain::table::{Domain, MacroPoint, MacroSeries, PriceBar, RawTable};
use chrono::NaiveDate;

/// Columns the equities contract requires.
pub const EQUITIES_REQUIRED: &[&str] = &["Date", "Open", "High", "Low", "Close", "Volume"];

/// Columns the equities contract accepts but does not require.
/// `Adjusted Close` falls back to `Close` when absent, the only sanctioned
/// default in the pipeline.
pub const EQUITIES_OPTIONAL: &[&str] = &["Adjusted Close", "Ticker"];

/// Per-row drops performed during coercion. Non-fatal; the caller reports
/// the counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoercionReport {
    pub dropped_dates: usize,
    pub dropped_values: usize,
}

impl CoercionReport {
    pub fn total(&self) -> usize {
        self.dropped_dates + self.dropped_values
    }
}

/// Validate a bronze equities table against the declared contract.
pub fn validate_equities(
    raw: &RawTable,
) -> Result<(Vec<PriceBar>, CoercionReport), PipelineError> {
    check_columns(raw, EQUITIES_REQUIRED, EQUITIES_OPTIONAL)?;

    let date_idx = raw.column_index("Date").unwrap_or(0);
    let open_idx = raw.column_index("Open").unwrap_or(0);
    let high_idx = raw.column_index("High").unwrap_or(0);
    let low_idx = raw.column_index("Low").unwrap_or(0);
    let close_idx = raw.column_index("Close").unwrap_or(0);
    let volume_idx = raw.column_index("Volume").unwrap_or(0);
    let adj_idx = raw.column_index("Adjusted Close");
    let ticker_idx = raw.column_index("Ticker");

    let mut report = CoercionReport::default();
    let mut bars: Vec<PriceBar> = Vec::with_capacity(raw.row_count());

    for row in &raw.rows {
        let Some(date) = cell(row, date_idx).and_then(parse_date) else {
            report.dropped_dates += 1;
            continue;
        };

        let open = cell(row, open_idx).and_then(parse_number);
        let high = cell(row, high_idx).and_then(parse_number);
        let low = cell(row, low_idx).and_then(parse_number);
        let close = cell(row, close_idx).and_then(parse_number);
        let adj_close = match adj_idx {
            Some(idx) => cell(row, idx).and_then(parse_number),
            None => close,
        };
        let volume = cell(row, volume_idx).and_then(parse_integer);

        let (Some(open), Some(high), Some(low), Some(close), Some(adj_close), Some(volume)) =
            (open, high, low, close, adj_close, volume)
        else {
            report.dropped_values += 1;
            continue;
        };

        let ticker = ticker_idx
            .and_then(|idx| cell(row, idx))
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| raw.instrument.clone());

        bars.push(PriceBar {
            ticker,
            date,
            open,
            high,
            low,
            close,
            adj_close,
            volume,
        });
    }

    if bars.is_empty() {
        return Err(PipelineError::EmptyTable {
            stage: "validate".into(),
        });
    }

    bars.sort_by_key(|b| b.date);
    check_equities_contract(&bars)?;

    Ok((bars, report))
}

/// Validate a bronze macro table (`date` plus one indicator column).
pub fn validate_macro(raw: &RawTable) -> Result<(MacroSeries, CoercionReport), PipelineError> {
    let indicator = raw.instrument.clone();
    let required = ["date".to_string(), indicator.clone()];
    let required_refs: Vec<&str> = required.iter().map(String::as_str).collect();
    check_columns(raw, &required_refs, &[])?;

    let date_idx = raw.column_index("date").unwrap_or(0);
    let value_idx = raw.column_index(&indicator).unwrap_or(0);

    let mut report = CoercionReport::default();
    let mut points: Vec<MacroPoint> = Vec::with_capacity(raw.row_count());

    for row in &raw.rows {
        let Some(date) = cell(row, date_idx).and_then(parse_date) else {
            report.dropped_dates += 1;
            continue;
        };
        let Some(value) = cell(row, value_idx).and_then(parse_number) else {
            report.dropped_values += 1;
            continue;
        };
        points.push(MacroPoint { date, value });
    }

    if points.is_empty() {
        return Err(PipelineError::EmptyTable {
            stage: "validate".into(),
        });
    }

    points.sort_by_key(|p| p.date);

    for point in &points {
        if point.value < 0.0 {
            return Err(violation(
                Domain::Macro,
                format!("negative value in column {indicator}"),
            ));
        }
    }
    if let Some(date) = first_duplicate(points.iter().map(|p| p.date)) {
        return Err(violation(
            Domain::Macro,
            format!("duplicate timestamp {date}"),
        ));
    }

    Ok((MacroSeries { indicator, points }, report))
}

/// Reject tables whose header differs from the declared column set.
fn check_columns(
    raw: &RawTable,
    required: &[&str],
    optional: &[&str],
) -> Result<(), PipelineError> {
    for name in required {
        if raw.column_index(name).is_none() {
            return Err(violation(
                raw.domain,
                format!("missing declared column {name}"),
            ));
        }
    }
    for column in &raw.columns {
        let declared = required.contains(&column.as_str()) || optional.contains(&column.as_str());
        if !declared {
            return Err(violation(
                raw.domain,
                format!("undeclared column {column}"),
            ));
        }
    }
    Ok(())
}

/// Value bounds and cross-column checks for a coerced equities table.
/// `bars` must already be sorted by date.
fn check_equities_contract(bars: &[PriceBar]) -> Result<(), PipelineError> {
    for bar in bars {
        let prices = [
            ("Open", bar.open),
            ("High", bar.high),
            ("Low", bar.low),
            ("Close", bar.close),
            ("Adjusted Close", bar.adj_close),
        ];
        for (column, value) in prices {
            if value < 0.0 {
                return Err(violation(
                    Domain::Equities,
                    format!("negative price in column {column} on {}", bar.date),
                ));
            }
        }
        if bar.volume < 0 {
            return Err(violation(
                Domain::Equities,
                format!("negative value in column Volume on {}", bar.date),
            ));
        }
        if bar.high < bar.low {
            return Err(violation(
                Domain::Equities,
                format!("High must be >= Low on {}", bar.date),
            ));
        }
    }

    if let Some(date) = first_duplicate(bars.iter().map(|b| b.date)) {
        return Err(violation(
            Domain::Equities,
            format!("duplicate timestamp {date}"),
        ));
    }

    Ok(())
}

fn violation(domain: Domain, constraint: String) -> PipelineError {
    PipelineError::SchemaViolation {
        domain: domain.to_string(),
        constraint,
    }
}

/// First date appearing more than once in an ascending-sorted iterator.
fn first_duplicate(dates: impl Iterator<Item = NaiveDate>) -> Option<NaiveDate> {
    let mut prev: Option<NaiveDate> = None;
    for date in dates {
        if prev == Some(date) {
            return Some(date);
        }
        prev = Some(date);
    }
    None
}

fn cell<'a>(row: &'a [String], idx: usize) -> Option<&'a str> {
    row.get(idx).map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Integer coercion accepts float spellings of whole numbers ("50000.0"),
/// which upstream CSV exports produce for volume.
fn parse_integer(s: &str) -> Option<i64> {
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let v = s.parse::<f64>().ok().filter(|v| v.is_finite())?;
    (v.fract() == 0.0).then_some(v as i64)
}
