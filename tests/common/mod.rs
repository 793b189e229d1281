#![allow(dead_code)]

use chrono::NaiveDate;
use quantpipe::ports::event_port::EventSink;
use serde_json::Value;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

/// Fake lineage sink capturing emissions for assertions.
pub struct CapturingEventSink {
    pub events: RefCell<Vec<(String, Value)>>,
}

impl CapturingEventSink {
    pub fn new() -> Self {
        Self {
            events: RefCell::new(Vec::new()),
        }
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events.borrow().iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn payload_of(&self, event_type: &str) -> Option<Value> {
        self.events
            .borrow()
            .iter()
            .find(|(t, _)| t == event_type)
            .map(|(_, p)| p.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl EventSink for CapturingEventSink {
    fn record(&self, event_type: &str, payload: Value) {
        self.events
            .borrow_mut()
            .push((event_type.to_string(), payload));
    }
}

/// Alternating up/down closes so rolling return dispersion is never zero.
pub fn zigzag_prices(len: usize) -> Vec<f64> {
    let mut prices = vec![100.0];
    for i in 1..len {
        let factor = if i % 2 == 0 { 1.02 } else { 0.99 };
        prices.push(prices[i - 1] * factor);
    }
    prices
}

/// A bronze equities CSV with sequential dates starting 2024-01-01.
pub fn bronze_csv(prices: &[f64]) -> String {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut out = String::from("Date,Open,High,Low,Close,Adjusted Close,Volume\n");
    for (i, price) in prices.iter().enumerate() {
        let date = start + chrono::Duration::days(i as i64);
        out.push_str(&format!(
            "{},{:.4},{:.4},{:.4},{:.4},{:.4},{}\n",
            date.format("%Y-%m-%d"),
            price,
            price + 1.0,
            price - 1.0,
            price,
            price,
            1000 + i
        ));
    }
    out
}

/// Write a bronze snapshot under `<root>/bronze/equities/<run_date>/`.
pub fn write_bronze_snapshot(root: &Path, run_date: &str, content: &str) -> PathBuf {
    let dir = root.join("bronze").join("equities").join(run_date);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("raw_data.csv");
    fs::write(&path, content).unwrap();
    path
}

pub fn run_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}
