//! Crate-wide error type for the narrow boundary where a failure is a true
//! exception rather than a soft [`crate::diagnostics::Diagnostic`].
//!
//! Everything inside the parse → lower → lint → emit pipeline reports
//! problems as diagnostics (`spec.md` §7): malformed MDX, undefined
//! measures, unsupported constructs, and resource limits are all expected,
//! recoverable conditions that the caller wants collected, not a `Result`
//! that aborts the call. `UnmdxError` exists only for the one remaining
//! boundary that legitimately throws: handing `PipelineConfig` a string
//! that isn't valid JSON/YAML.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, UnmdxError>;

#[derive(Debug, Error)]
pub enum UnmdxError {
    #[error("invalid configuration json: {0}")]
    ConfigJson(#[from] serde_json::Error),
    #[error("invalid configuration yaml: {0}")]
    ConfigYaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}
