//! Lineage sink port trait.
//!
//! Each stage appends exactly one event on success and none on failure. The
//! sink is injected into the stage runners rather than accessed as ambient
//! global state, so tests can capture emissions with a fake.

use serde::Serialize;
use serde_json::Value;

pub const DATA_INGESTED: &str = "DATA_INGESTED";
pub const DATA_VALIDATED: &str = "DATA_VALIDATED";
pub const FEATURES_READY: &str = "FEATURES_READY";
pub const SIGNALS_READY: &str = "SIGNALS_READY";
pub const BACKTEST_COMPLETE: &str = "BACKTEST_COMPLETE";

/// An immutable lineage fact. `timestamp` is an ISO-8601 UTC string.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub event_type: String,
    pub timestamp: String,
    pub payload: Value,
}

/// Append-only, fire-and-forget sink. Implementations must swallow their own
/// write failures (reporting them out-of-band): a sink outage never aborts an
/// otherwise-successful stage.
pub trait EventSink {
    fn record(&self, event_type: &str, payload: Value);
}
