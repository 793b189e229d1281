//! Delimited on-disk snapshots, one directory per (tier, domain, run date).
//!
//! Layout: `<root>/<tier>/<domain>/<run-date>/<file>.csv`. Snapshots are
//! immutable once written; each stage selects the most recent run-date
//! directory of its input tier. Run-date directories are ISO dates, so
//! lexicographic order is chronological.

use crate::domain::backtest::BacktestBar;
use crate::domain::error::PipelineError;
use crate::domain::features::{FeatureBar, VolRegime};
use crate::domain::metrics::MetricsRecord;
use crate::domain::signals::{Signal, SignalBar};
use crate::domain::table::{Domain, MacroSeries, PriceBar, RawTable, Tier};
use crate::ports::data_port::DataSource;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

pub const RAW_FILE: &str = "raw_data.csv";
pub const VALIDATED_FILE: &str = "validated.csv";
pub const FEATURES_FILE: &str = "features.csv";
pub const SIGNALS_FILE: &str = "signals.csv";
pub const BACKTEST_FILE: &str = "backtest.csv";
pub const METRICS_FILE: &str = "metrics.csv";

const SILVER_HEADER: &[&str] = &[
    "Ticker",
    "Date",
    "Open",
    "High",
    "Low",
    "Close",
    "Adjusted Close",
    "Volume",
];
const FEATURE_COLUMNS: &[&str] = &[
    "return_1d",
    "vol_20d",
    "vol_60d",
    "growth_60d",
    "risk_adj_60d",
    "vol_regime",
];
const BACKTEST_COLUMNS: &[&str] = &[
    "position",
    "trade",
    "market_return",
    "strategy_return",
    "txn_cost",
    "net_return",
    "equity",
];

/// Tiered snapshot store rooted at a data directory.
pub struct CsvStore {
    root: PathBuf,
}

impl CsvStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn tier_dir(&self, tier: Tier, domain: Domain) -> PathBuf {
        self.root.join(tier.to_string()).join(domain.to_string())
    }

    /// Create (if needed) and return the snapshot directory for a run date.
    pub fn snapshot_dir(
        &self,
        tier: Tier,
        domain: Domain,
        run_date: NaiveDate,
    ) -> Result<PathBuf, PipelineError> {
        let dir = self
            .tier_dir(tier, domain)
            .join(run_date.format("%Y-%m-%d").to_string());
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Path of `file_name` inside the most recent snapshot of a tier.
    ///
    /// Scans run-date directories in descending name order and returns the
    /// first that actually contains the file, so a crashed run that left an
    /// empty directory is skipped rather than selected.
    pub fn latest_snapshot(
        &self,
        tier: Tier,
        domain: Domain,
        file_name: &str,
    ) -> Result<PathBuf, PipelineError> {
        let tier_dir = self.tier_dir(tier, domain);
        let missing = || PipelineError::MissingSnapshot {
            tier: tier.to_string(),
            path: tier_dir.display().to_string(),
        };

        let entries = fs::read_dir(&tier_dir).map_err(|_| missing())?;
        let mut run_dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        run_dirs.sort();

        run_dirs
            .into_iter()
            .rev()
            .map(|dir| dir.join(file_name))
            .find(|path| path.is_file())
            .ok_or_else(missing)
    }
}

/// A file-backed data source: a provider drop already on local disk.
pub struct CsvFileSource {
    name: String,
    path: PathBuf,
    domain: Domain,
    instrument: String,
}

impl CsvFileSource {
    pub fn new(name: &str, path: PathBuf, domain: Domain, instrument: &str) -> Self {
        Self {
            name: name.to_string(),
            path,
            domain,
            instrument: instrument.to_string(),
        }
    }
}

impl DataSource for CsvFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<RawTable, PipelineError> {
        read_raw_table(&self.path, self.domain, &self.name, &self.instrument)
    }
}

fn snapshot_err(path: &Path, reason: impl ToString) -> PipelineError {
    PipelineError::SnapshotRead {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Read a bronze table: header plus string cells, nothing parsed.
pub fn read_raw_table(
    path: &Path,
    domain: Domain,
    source: &str,
    instrument: &str,
) -> Result<RawTable, PipelineError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| snapshot_err(path, e))?;
    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| snapshot_err(path, e))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| snapshot_err(path, e))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable {
        domain,
        source: source.to_string(),
        instrument: instrument.to_string(),
        columns,
        rows,
    })
}

/// Write a bronze table exactly as fetched.
pub fn write_raw_table(path: &Path, table: &RawTable) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| snapshot_err(path, e))?;
    writer
        .write_record(&table.columns)
        .map_err(|e| snapshot_err(path, e))?;
    for row in &table.rows {
        writer.write_record(row).map_err(|e| snapshot_err(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_price_bars(path: &Path, bars: &[PriceBar]) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| snapshot_err(path, e))?;
    writer
        .write_record(SILVER_HEADER)
        .map_err(|e| snapshot_err(path, e))?;
    for bar in bars {
        writer
            .write_record(&[
                bar.ticker.clone(),
                bar.date.format("%Y-%m-%d").to_string(),
                bar.open.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.close.to_string(),
                bar.adj_close.to_string(),
                bar.volume.to_string(),
            ])
            .map_err(|e| snapshot_err(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_price_bars(path: &Path) -> Result<Vec<PriceBar>, PipelineError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| snapshot_err(path, e))?;
    check_header(path, &reader.headers().map_err(|e| snapshot_err(path, e))?.clone(), SILVER_HEADER)?;

    let mut bars = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| snapshot_err(path, e))?;
        bars.push(parse_price_bar(path, &record, 0)?);
    }
    Ok(bars)
}

pub fn write_macro_series(path: &Path, series: &MacroSeries) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| snapshot_err(path, e))?;
    writer
        .write_record(&["date".to_string(), series.indicator.clone()])
        .map_err(|e| snapshot_err(path, e))?;
    for point in &series.points {
        writer
            .write_record(&[
                point.date.format("%Y-%m-%d").to_string(),
                point.value.to_string(),
            ])
            .map_err(|e| snapshot_err(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_feature_bars(path: &Path, features: &[FeatureBar]) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| snapshot_err(path, e))?;
    writer
        .write_record(feature_header())
        .map_err(|e| snapshot_err(path, e))?;
    for feature in features {
        writer
            .write_record(feature_record(feature))
            .map_err(|e| snapshot_err(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_feature_bars(path: &Path) -> Result<Vec<FeatureBar>, PipelineError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| snapshot_err(path, e))?;
    let expected = feature_header();
    check_header(
        path,
        &reader.headers().map_err(|e| snapshot_err(path, e))?.clone(),
        &expected.iter().map(String::as_str).collect::<Vec<_>>(),
    )?;

    let mut features = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| snapshot_err(path, e))?;
        features.push(parse_feature_bar(path, &record)?);
    }
    Ok(features)
}

pub fn write_signal_bars(path: &Path, signals: &[SignalBar]) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| snapshot_err(path, e))?;
    let mut header = feature_header();
    header.push("signal".into());
    writer
        .write_record(&header)
        .map_err(|e| snapshot_err(path, e))?;
    for signal in signals {
        let mut record = feature_record(&signal.feature);
        record.push(signal.signal.to_string());
        writer
            .write_record(&record)
            .map_err(|e| snapshot_err(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_signal_bars(path: &Path) -> Result<Vec<SignalBar>, PipelineError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| snapshot_err(path, e))?;
    let mut expected = feature_header();
    expected.push("signal".into());
    check_header(
        path,
        &reader.headers().map_err(|e| snapshot_err(path, e))?.clone(),
        &expected.iter().map(String::as_str).collect::<Vec<_>>(),
    )?;

    let mut signals = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| snapshot_err(path, e))?;
        let feature = parse_feature_bar(path, &record)?;
        let signal = parse_cell::<Signal>(path, &record, expected.len() - 1, "signal")?;
        signals.push(SignalBar { feature, signal });
    }
    Ok(signals)
}

pub fn write_backtest_rows(path: &Path, rows: &[BacktestBar]) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| snapshot_err(path, e))?;
    let mut header = feature_header();
    header.push("signal".into());
    header.extend(BACKTEST_COLUMNS.iter().map(|s| s.to_string()));
    writer
        .write_record(&header)
        .map_err(|e| snapshot_err(path, e))?;

    for row in rows {
        let mut record = feature_record(&row.signal.feature);
        record.push(row.signal.signal.to_string());
        record.push(row.position.to_string());
        record.push(row.trade.to_string());
        record.push(row.market_return.to_string());
        record.push(row.strategy_return.to_string());
        record.push(row.txn_cost.to_string());
        record.push(row.net_return.to_string());
        record.push(row.equity.to_string());
        writer
            .write_record(&record)
            .map_err(|e| snapshot_err(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

/// One-row summary alongside the full backtest table. An undefined Sharpe is
/// written as an empty cell, not zero.
pub fn write_metrics(path: &Path, metrics: &MetricsRecord) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| snapshot_err(path, e))?;
    writer
        .write_record(&["CAGR", "Sharpe", "MaxDrawdown"])
        .map_err(|e| snapshot_err(path, e))?;
    writer
        .write_record(&[
            metrics.cagr.to_string(),
            metrics.sharpe.map(|s| s.to_string()).unwrap_or_default(),
            metrics.max_drawdown.to_string(),
        ])
        .map_err(|e| snapshot_err(path, e))?;
    writer.flush()?;
    Ok(())
}

fn feature_header() -> Vec<String> {
    let mut header: Vec<String> = SILVER_HEADER.iter().map(|s| s.to_string()).collect();
    header.extend(FEATURE_COLUMNS.iter().map(|s| s.to_string()));
    header
}

fn feature_record(feature: &FeatureBar) -> Vec<String> {
    let bar = &feature.bar;
    vec![
        bar.ticker.clone(),
        bar.date.format("%Y-%m-%d").to_string(),
        bar.open.to_string(),
        bar.high.to_string(),
        bar.low.to_string(),
        bar.close.to_string(),
        bar.adj_close.to_string(),
        bar.volume.to_string(),
        feature.return_1d.to_string(),
        feature.vol_20d.to_string(),
        feature.vol_60d.to_string(),
        feature.growth_60d.to_string(),
        feature.risk_adj_60d.to_string(),
        feature.vol_regime.to_string(),
    ]
}

fn check_header(
    path: &Path,
    actual: &csv::StringRecord,
    expected: &[&str],
) -> Result<(), PipelineError> {
    let actual: Vec<&str> = actual.iter().collect();
    if actual != expected {
        return Err(snapshot_err(
            path,
            format!("unexpected header {:?}", actual),
        ));
    }
    Ok(())
}

fn parse_cell<T: std::str::FromStr>(
    path: &Path,
    record: &csv::StringRecord,
    idx: usize,
    column: &str,
) -> Result<T, PipelineError>
where
    T::Err: std::fmt::Display,
{
    let cell = record
        .get(idx)
        .ok_or_else(|| snapshot_err(path, format!("missing {column} cell")))?;
    cell.parse::<T>()
        .map_err(|e| snapshot_err(path, format!("invalid {column} value {cell:?}: {e}")))
}

fn parse_date_cell(
    path: &Path,
    record: &csv::StringRecord,
    idx: usize,
) -> Result<NaiveDate, PipelineError> {
    let cell = record
        .get(idx)
        .ok_or_else(|| snapshot_err(path, "missing Date cell"))?;
    NaiveDate::parse_from_str(cell, "%Y-%m-%d")
        .map_err(|e| snapshot_err(path, format!("invalid Date value {cell:?}: {e}")))
}

/// Parse the silver columns starting at `offset` into a bar.
fn parse_price_bar(
    path: &Path,
    record: &csv::StringRecord,
    offset: usize,
) -> Result<PriceBar, PipelineError> {
    Ok(PriceBar {
        ticker: parse_cell(path, record, offset, "Ticker")?,
        date: parse_date_cell(path, record, offset + 1)?,
        open: parse_cell(path, record, offset + 2, "Open")?,
        high: parse_cell(path, record, offset + 3, "High")?,
        low: parse_cell(path, record, offset + 4, "Low")?,
        close: parse_cell(path, record, offset + 5, "Close")?,
        adj_close: parse_cell(path, record, offset + 6, "Adjusted Close")?,
        volume: parse_cell(path, record, offset + 7, "Volume")?,
    })
}

fn parse_feature_bar(
    path: &Path,
    record: &csv::StringRecord,
) -> Result<FeatureBar, PipelineError> {
    let bar = parse_price_bar(path, record, 0)?;
    let base = SILVER_HEADER.len();
    Ok(FeatureBar {
        bar,
        return_1d: parse_cell(path, record, base, "return_1d")?,
        vol_20d: parse_cell(path, record, base + 1, "vol_20d")?,
        vol_60d: parse_cell(path, record, base + 2, "vol_60d")?,
        growth_60d: parse_cell(path, record, base + 3, "growth_60d")?,
        risk_adj_60d: parse_cell(path, record, base + 4, "risk_adj_60d")?,
        vol_regime: parse_cell::<VolRegime>(path, record, base + 5, "vol_regime")?,
    })
}
