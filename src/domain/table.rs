//! Tier data model: raw tables and validated rows.

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

/// Data domain a table belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Equities,
    Macro,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Equities => write!(f, "equities"),
            Domain::Macro => write!(f, "macro"),
        }
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "equities" => Ok(Domain::Equities),
            "macro" => Ok(Domain::Macro),
            other => Err(format!("unknown domain: {other}")),
        }
    }
}

/// Quality tier a snapshot belongs to. Ordering follows the pipeline:
/// each tier is produced exclusively from the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Bronze,
    Silver,
    Features,
    Signals,
    Gold,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Bronze => write!(f, "bronze"),
            Tier::Silver => write!(f, "silver"),
            Tier::Features => write!(f, "features"),
            Tier::Signals => write!(f, "signals"),
            Tier::Gold => write!(f, "gold"),
        }
    }
}

/// A bronze-tier table: header plus string cells exactly as read from disk.
///
/// Nothing is parsed at this tier. `source` records provenance (which
/// provider produced the file) and `instrument` the identifier the table was
/// fetched for: the ticker for equities, the indicator code for macro.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub domain: Domain,
    pub source: String,
    pub instrument: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a named column in the header, if declared.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// A validated daily equities row (silver tier).
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: i64,
}

/// A validated macro observation (silver tier).
#[derive(Debug, Clone, PartialEq)]
pub struct MacroPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// A validated macro series with the indicator it was fetched for.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroSeries {
    pub indicator: String,
    pub points: Vec<MacroPoint>,
}
