//! Ingestion port trait.

use crate::domain::error::PipelineError;
use crate::domain::table::{Domain, RawTable};

/// A provider capable of producing a bronze table for one instrument.
pub trait DataSource {
    fn name(&self) -> &str;
    fn fetch(&self) -> Result<RawTable, PipelineError>;
}

/// Try candidate sources in order until one succeeds. An ordered strategy
/// list, not an inheritance hierarchy: the first table wins, and the per-source
/// failure reasons are joined into the error when all of them are exhausted.
pub fn fetch_first_available(
    domain: Domain,
    sources: &[Box<dyn DataSource>],
) -> Result<RawTable, PipelineError> {
    let mut reasons: Vec<String> = Vec::new();
    for source in sources {
        match source.fetch() {
            Ok(table) => return Ok(table),
            Err(err) => reasons.push(format!("{}: {}", source.name(), err)),
        }
    }
    Err(PipelineError::SourceUnavailable {
        domain: domain.to_string(),
        reason: if reasons.is_empty() {
            "no sources configured".into()
        } else {
            reasons.join("; ")
        },
    })
}
