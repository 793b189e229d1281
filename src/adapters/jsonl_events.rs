//! JSON-lines adapters: the lineage event log and the ingestion run log.

use crate::domain::error::PipelineError;
use crate::ports::event_port::{Event, EventSink};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only lineage sink writing one JSON object per line.
pub struct JsonlEventSink {
    path: PathBuf,
}

impl JsonlEventSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    fn append(&self, event: &Event) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(event).map_err(std::io::Error::other)?;
        writeln!(file, "{line}")
    }
}

impl EventSink for JsonlEventSink {
    /// Fire-and-forget: a failed append is reported on stderr and swallowed,
    /// never surfaced to the stage that emitted the event.
    fn record(&self, event_type: &str, payload: serde_json::Value) {
        let event = Event {
            event_type: event_type.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            payload,
        };
        if let Err(err) = self.append(&event) {
            eprintln!("warning: lineage event {event_type} not recorded: {err}");
        }
    }
}

/// One ingestion attempt, appended to the run log whether it succeeded or
/// failed.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub domain: String,
    pub source: String,
    pub data_date: String,
    pub ingestion_timestamp: String,
    pub storage_path: String,
    pub record_count: usize,
    pub status: String,
    pub error_message: Option<String>,
}

pub fn append_run_record(path: &Path, record: &RunRecord) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(record).map_err(std::io::Error::other)?;
    writeln!(file, "{line}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn record_appends_one_json_object_per_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata").join("event_log.jsonl");
        let sink = JsonlEventSink::new(&path);

        sink.record("DATA_VALIDATED", json!({"domain": "equities", "row_count": 10}));
        sink.record("FEATURES_READY", json!({"domain": "equities", "row_count": 4}));

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event_type"], "DATA_VALIDATED");
        assert_eq!(first["payload"]["row_count"], 10);
        assert!(first["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn record_swallows_write_failures() {
        let dir = TempDir::new().unwrap();
        // The "log file" is a directory, so every append fails.
        let sink = JsonlEventSink::new(dir.path());
        sink.record("DATA_VALIDATED", json!({}));
    }

    #[test]
    fn run_record_round_trips_through_the_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run_log.jsonl");

        append_run_record(
            &path,
            &RunRecord {
                run_id: "run-1".into(),
                domain: "equities".into(),
                source: "mirror".into(),
                data_date: "2026-08-07".into(),
                ingestion_timestamp: "2026-08-07T00:00:00Z".into(),
                storage_path: "/data/bronze/equities/2026-08-07/raw_data.csv".into(),
                record_count: 250,
                status: "SUCCESS".into(),
                error_message: None,
            },
        )
        .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(value["status"], "SUCCESS");
        assert_eq!(value["record_count"], 250);
        assert!(value["error_message"].is_null());
    }
}
