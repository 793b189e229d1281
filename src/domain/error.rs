//! Domain error types.

/// Top-level error type for quantpipe.
///
/// Row-level coercion failures are not errors: the schema gate drops those
/// rows and reports counts. Everything here is fatal to its stage: no output
/// is written and no lineage event is emitted when one of these surfaces.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("schema violation in {domain} table: {constraint}")]
    SchemaViolation { domain: String, constraint: String },

    #[error("empty input table for {stage} stage")]
    EmptyTable { stage: String },

    #[error("no {tier} snapshot found under {path}")]
    MissingSnapshot { tier: String, path: String },

    #[error("malformed snapshot {path}: {reason}")]
    SnapshotRead { path: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("all data sources failed for {domain}: {reason}")]
    SourceUnavailable { domain: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&PipelineError> for std::process::ExitCode {
    fn from(err: &PipelineError) -> Self {
        let code: u8 = match err {
            PipelineError::Io(_) => 1,
            PipelineError::ConfigParse { .. }
            | PipelineError::ConfigMissing { .. }
            | PipelineError::ConfigInvalid { .. } => 2,
            PipelineError::MissingSnapshot { .. } | PipelineError::SnapshotRead { .. } => 3,
            PipelineError::SchemaViolation { .. } | PipelineError::EmptyTable { .. } => 4,
            PipelineError::SourceUnavailable { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
