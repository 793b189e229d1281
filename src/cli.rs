//! CLI definition and stage orchestration.
//!
//! Each subcommand runs one stage: it selects the newest snapshot of its
//! input tier, transforms it, writes a new snapshot under today's run date,
//! and emits one lineage event on success. `run` chains the four equities
//! stages. A failed stage writes nothing and emits nothing.

use chrono::{NaiveDate, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use uuid::Uuid;

use crate::adapters::csv_store::{
    self, CsvFileSource, CsvStore, BACKTEST_FILE, FEATURES_FILE, METRICS_FILE, RAW_FILE,
    SIGNALS_FILE, VALIDATED_FILE,
};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::jsonl_events::{append_run_record, JsonlEventSink, RunRecord};
use crate::domain::backtest::{simulate, BacktestConfig};
use crate::domain::error::PipelineError;
use crate::domain::features::build_features;
use crate::domain::metrics::MetricsRecord;
use crate::domain::schema::{validate_equities, validate_macro, CoercionReport};
use crate::domain::signals::generate_signals;
use crate::domain::table::{Domain, Tier};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{fetch_first_available, DataSource};
use crate::ports::event_port::{
    EventSink, BACKTEST_COMPLETE, DATA_INGESTED, DATA_VALIDATED, FEATURES_READY, SIGNALS_READY,
};

#[derive(Parser, Debug)]
#[command(name = "quantpipe", about = "Tiered market-data backtest pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch raw data and write a bronze snapshot
    Ingest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        domain: String,
    },
    /// Validate the newest bronze snapshot and promote it to silver
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        domain: String,
    },
    /// Compute rolling features from the newest silver snapshot
    Features {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Generate trading signals from the newest feature snapshot
    Signals {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Simulate the signals and write the gold tier
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run validate, features, signals, and backtest in order (equities)
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Ingest { config, domain } => run_ingest(&config, &domain),
        Command::Validate { config, domain } => run_validate(&config, &domain),
        Command::Features { config } => run_features(&config),
        Command::Signals { config } => run_signals(&config),
        Command::Backtest { config } => run_backtest(&config),
        Command::Run { config } => run_full(&config),
    }
}

fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = PipelineError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn parse_domain(domain: &str) -> Result<Domain, ExitCode> {
    domain.parse::<Domain>().map_err(|reason| {
        eprintln!("error: {reason}");
        ExitCode::from(2)
    })
}

fn finish<T>(result: Result<T, PipelineError>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_ingest(config_path: &PathBuf, domain_arg: &str) -> ExitCode {
    let domain = match parse_domain(domain_arg) {
        Ok(d) => d,
        Err(code) => return code,
    };
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    finish((|| {
        let store = CsvStore::new(data_root(&adapter)?);
        let instrument = instrument_for(&adapter, domain)?;
        let sources = build_sources(&adapter, domain, &instrument)?;
        let events = JsonlEventSink::new(event_log_path(&adapter));
        let path = ingest_stage(
            &store,
            domain,
            &sources,
            &run_log_path(&adapter),
            &events,
            today(),
        )?;
        eprintln!("bronze snapshot written to {}", path.display());
        Ok(path)
    })())
}

fn run_validate(config_path: &PathBuf, domain_arg: &str) -> ExitCode {
    let domain = match parse_domain(domain_arg) {
        Ok(d) => d,
        Err(code) => return code,
    };
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    finish((|| {
        let store = CsvStore::new(data_root(&adapter)?);
        let instrument = instrument_for(&adapter, domain)?;
        let events = JsonlEventSink::new(event_log_path(&adapter));
        let path = validate_stage(&store, domain, &instrument, &events, today())?;
        eprintln!("validated data written to {}", path.display());
        Ok(path)
    })())
}

fn run_features(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    finish((|| {
        let store = CsvStore::new(data_root(&adapter)?);
        let events = JsonlEventSink::new(event_log_path(&adapter));
        let path = features_stage(&store, &events, today())?;
        eprintln!("features written to {}", path.display());
        Ok(path)
    })())
}

fn run_signals(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    finish((|| {
        let store = CsvStore::new(data_root(&adapter)?);
        let events = JsonlEventSink::new(event_log_path(&adapter));
        let path = signals_stage(&store, &events, today())?;
        eprintln!("signals written to {}", path.display());
        Ok(path)
    })())
}

fn run_backtest(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    finish((|| {
        let store = CsvStore::new(data_root(&adapter)?);
        let events = JsonlEventSink::new(event_log_path(&adapter));
        let config = build_backtest_config(&adapter)?;
        let (path, metrics) = backtest_stage(&store, &config, &events, today())?;
        eprintln!("gold tier written to {}", path.display());
        print_metrics(&metrics);
        Ok(path)
    })())
}

fn run_full(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    finish((|| {
        let store = CsvStore::new(data_root(&adapter)?);
        let instrument = instrument_for(&adapter, Domain::Equities)?;
        let events = JsonlEventSink::new(event_log_path(&adapter));
        let config = build_backtest_config(&adapter)?;
        let run_date = today();

        validate_stage(&store, Domain::Equities, &instrument, &events, run_date)?;
        features_stage(&store, &events, run_date)?;
        signals_stage(&store, &events, run_date)?;
        let (path, metrics) = backtest_stage(&store, &config, &events, run_date)?;
        eprintln!("gold tier written to {}", path.display());
        print_metrics(&metrics);
        Ok(path)
    })())
}

fn print_metrics(metrics: &MetricsRecord) {
    println!("CAGR:          {:.4}", metrics.cagr);
    match metrics.sharpe {
        Some(sharpe) => println!("Sharpe:        {sharpe:.4}"),
        None => println!("Sharpe:        undefined"),
    }
    println!("Max drawdown:  {:.4}", metrics.max_drawdown);
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ---- config accessors ----

pub fn data_root(adapter: &dyn ConfigPort) -> Result<PathBuf, PipelineError> {
    adapter
        .get_string("data", "root")
        .map(PathBuf::from)
        .ok_or_else(|| PipelineError::ConfigMissing {
            section: "data".into(),
            key: "root".into(),
        })
}

pub fn event_log_path(adapter: &dyn ConfigPort) -> PathBuf {
    adapter
        .get_string("events", "log_path")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("metadata/event_log.jsonl"))
}

pub fn run_log_path(adapter: &dyn ConfigPort) -> PathBuf {
    adapter
        .get_string("events", "run_log_path")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("metadata/run_log.jsonl"))
}

pub fn instrument_for(adapter: &dyn ConfigPort, domain: Domain) -> Result<String, PipelineError> {
    let (section, key) = match domain {
        Domain::Equities => ("equities", "ticker"),
        Domain::Macro => ("macro", "indicator"),
    };
    adapter
        .get_string(section, key)
        .ok_or_else(|| PipelineError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, PipelineError> {
    let initial_capital = adapter.get_double("backtest", "initial_capital", 1_000_000.0);
    if initial_capital <= 0.0 {
        return Err(PipelineError::ConfigInvalid {
            section: "backtest".into(),
            key: "initial_capital".into(),
            reason: "must be positive".into(),
        });
    }

    let txn_cost_bps = adapter.get_double("backtest", "txn_cost_bps", 10.0);
    if txn_cost_bps < 0.0 {
        return Err(PipelineError::ConfigInvalid {
            section: "backtest".into(),
            key: "txn_cost_bps".into(),
            reason: "must not be negative".into(),
        });
    }

    Ok(BacktestConfig::from_basis_points(initial_capital, txn_cost_bps))
}

/// Ordered source list from `sources = name=path,name=path` under the
/// domain's section. Order is the fallback order.
pub fn build_sources(
    adapter: &dyn ConfigPort,
    domain: Domain,
    instrument: &str,
) -> Result<Vec<Box<dyn DataSource>>, PipelineError> {
    let section = domain.to_string();
    let listing = adapter
        .get_string(&section, "sources")
        .ok_or_else(|| PipelineError::ConfigMissing {
            section: section.clone(),
            key: "sources".into(),
        })?;

    let mut sources: Vec<Box<dyn DataSource>> = Vec::new();
    for entry in listing.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, path) = match entry.split_once('=') {
            Some((name, path)) => (name.trim(), path.trim()),
            None => (entry, entry),
        };
        sources.push(Box::new(CsvFileSource::new(
            name,
            PathBuf::from(path),
            domain,
            instrument,
        )));
    }

    if sources.is_empty() {
        return Err(PipelineError::ConfigInvalid {
            section,
            key: "sources".into(),
            reason: "no sources listed".into(),
        });
    }
    Ok(sources)
}

// ---- stage runners ----

/// Fetch from the first available source, write the bronze snapshot, and
/// append a run record. The run log gets one record per attempt, success or
/// failure; the event log only sees successes.
pub fn ingest_stage(
    store: &CsvStore,
    domain: Domain,
    sources: &[Box<dyn DataSource>],
    run_log: &Path,
    events: &dyn EventSink,
    run_date: NaiveDate,
) -> Result<PathBuf, PipelineError> {
    let run_id = Uuid::new_v4().to_string();
    let ingestion_timestamp = utc_timestamp();
    let data_date = run_date.format("%Y-%m-%d").to_string();

    match fetch_first_available(domain, sources) {
        Ok(table) => {
            let dir = store.snapshot_dir(Tier::Bronze, domain, run_date)?;
            let path = dir.join(RAW_FILE);
            csv_store::write_raw_table(&path, &table)?;

            append_run_record(
                run_log,
                &RunRecord {
                    run_id: run_id.clone(),
                    domain: domain.to_string(),
                    source: table.source.clone(),
                    data_date,
                    ingestion_timestamp,
                    storage_path: path.display().to_string(),
                    record_count: table.row_count(),
                    status: "SUCCESS".into(),
                    error_message: None,
                },
            )?;

            events.record(
                DATA_INGESTED,
                json!({
                    "run_id": run_id,
                    "domain": domain.to_string(),
                    "path": path.display().to_string(),
                    "row_count": table.row_count(),
                }),
            );
            Ok(path)
        }
        Err(err) => {
            let attempted: Vec<&str> = sources.iter().map(|s| s.name()).collect();
            append_run_record(
                run_log,
                &RunRecord {
                    run_id,
                    domain: domain.to_string(),
                    source: attempted.join(","),
                    data_date,
                    ingestion_timestamp,
                    storage_path: "N/A".into(),
                    record_count: 0,
                    status: "FAILED".into(),
                    error_message: Some(err.to_string()),
                },
            )?;
            Err(err)
        }
    }
}

/// Promote the newest bronze snapshot to silver through the schema gate.
pub fn validate_stage(
    store: &CsvStore,
    domain: Domain,
    instrument: &str,
    events: &dyn EventSink,
    run_date: NaiveDate,
) -> Result<PathBuf, PipelineError> {
    let input = store.latest_snapshot(Tier::Bronze, domain, RAW_FILE)?;
    eprintln!("validating {domain} bronze snapshot {}", input.display());
    let raw = csv_store::read_raw_table(&input, domain, "bronze", instrument)?;

    let dir = store.snapshot_dir(Tier::Silver, domain, run_date)?;
    let path = dir.join(VALIDATED_FILE);

    let row_count = match domain {
        Domain::Equities => {
            let (bars, report) = validate_equities(&raw)?;
            report_drops(&report);
            csv_store::write_price_bars(&path, &bars)?;
            bars.len()
        }
        Domain::Macro => {
            let (series, report) = validate_macro(&raw)?;
            report_drops(&report);
            csv_store::write_macro_series(&path, &series)?;
            series.points.len()
        }
    };

    events.record(
        DATA_VALIDATED,
        json!({
            "domain": domain.to_string(),
            "path": path.display().to_string(),
            "row_count": row_count,
        }),
    );
    Ok(path)
}

/// Compute rolling features from the newest silver equities snapshot.
pub fn features_stage(
    store: &CsvStore,
    events: &dyn EventSink,
    run_date: NaiveDate,
) -> Result<PathBuf, PipelineError> {
    let input = store.latest_snapshot(Tier::Silver, Domain::Equities, VALIDATED_FILE)?;
    eprintln!("building features from {}", input.display());
    let bars = csv_store::read_price_bars(&input)?;
    let features = build_features(&bars)?;

    let dir = store.snapshot_dir(Tier::Features, Domain::Equities, run_date)?;
    let path = dir.join(FEATURES_FILE);
    csv_store::write_feature_bars(&path, &features)?;

    events.record(
        FEATURES_READY,
        json!({
            "domain": Domain::Equities.to_string(),
            "path": path.display().to_string(),
            "row_count": features.len(),
        }),
    );
    Ok(path)
}

/// Generate signals from the newest feature snapshot.
pub fn signals_stage(
    store: &CsvStore,
    events: &dyn EventSink,
    run_date: NaiveDate,
) -> Result<PathBuf, PipelineError> {
    let input = store.latest_snapshot(Tier::Features, Domain::Equities, FEATURES_FILE)?;
    eprintln!("generating signals from {}", input.display());
    let features = csv_store::read_feature_bars(&input)?;
    let signals = generate_signals(&features)?;

    let dir = store.snapshot_dir(Tier::Signals, Domain::Equities, run_date)?;
    let path = dir.join(SIGNALS_FILE);
    csv_store::write_signal_bars(&path, &signals)?;

    events.record(
        SIGNALS_READY,
        json!({
            "domain": Domain::Equities.to_string(),
            "path": path.display().to_string(),
            "row_count": signals.len(),
        }),
    );
    Ok(path)
}

/// Simulate the newest signal snapshot into the gold tier.
pub fn backtest_stage(
    store: &CsvStore,
    config: &BacktestConfig,
    events: &dyn EventSink,
    run_date: NaiveDate,
) -> Result<(PathBuf, MetricsRecord), PipelineError> {
    let input = store.latest_snapshot(Tier::Signals, Domain::Equities, SIGNALS_FILE)?;
    eprintln!("simulating signals from {}", input.display());
    let signals = csv_store::read_signal_bars(&input)?;
    let (rows, metrics) = simulate(&signals, config)?;

    let dir = store.snapshot_dir(Tier::Gold, Domain::Equities, run_date)?;
    csv_store::write_backtest_rows(&dir.join(BACKTEST_FILE), &rows)?;
    csv_store::write_metrics(&dir.join(METRICS_FILE), &metrics)?;

    events.record(
        BACKTEST_COMPLETE,
        json!({
            "domain": Domain::Equities.to_string(),
            "path": dir.display().to_string(),
            "row_count": rows.len(),
            "metrics": serde_json::to_value(&metrics).unwrap_or(serde_json::Value::Null),
        }),
    );
    Ok((dir, metrics))
}

fn report_drops(report: &CoercionReport) {
    if report.dropped_dates > 0 {
        eprintln!("dropped {} rows with unparseable dates", report.dropped_dates);
    }
    if report.dropped_values > 0 {
        eprintln!("dropped {} rows with unparseable values", report.dropped_values);
    }
}
