//! Pipeline configuration record (`spec.md` §6).
//!
//! Mirrors the teacher's `semaflowrs/src/config.rs` layered-defaults shape
//! (`SemaflowConfig { defaults: GlobalDefaults, datasources: HashMap<...> }`)
//! with one difference: this crate has a single configuration target, not
//! one per datasource, so there is nothing to resolve/merge — a partial
//! JSON/YAML document just overlays `PipelineConfig::default()` field by
//! field via `#[serde(default)]` on every section. Discovering *where* that
//! JSON/YAML text comes from (a file, an environment variable) is the
//! CLI's job (`spec.md` §1 non-goals); this module only parses a string
//! the caller already has.

use serde::{Deserialize, Serialize};

use crate::error::{Result, UnmdxError};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub parser: ParserConfig,
    pub linter: LinterConfig,
    pub dax: DaxConfig,
    pub explanation: ExplanationConfig,
    pub global: GlobalConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Treat warnings as errors during lowering.
    pub strict_mode: bool,
    /// Accept unrecognized identifiers as function names.
    pub allow_unknown_functions: bool,
    /// Abort after this many parse errors.
    pub max_parse_errors: usize,
    /// Time budget for parsing, in milliseconds.
    pub parse_timeout_ms: Option<u64>,
    /// Input size cap, in characters.
    pub max_input_chars: Option<usize>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            allow_unknown_functions: false,
            max_parse_errors: 50,
            parse_timeout_ms: None,
            max_input_chars: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationLevel {
    None,
    Conservative,
    Moderate,
    Aggressive,
}

impl Default for OptimizationLevel {
    fn default() -> Self {
        OptimizationLevel::Moderate
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LinterConfig {
    pub optimization_level: OptimizationLevel,
    /// Depth above which CrossJoin-derived dimensions on the same
    /// hierarchy are coalesced.
    pub max_crossjoin_depth: usize,
    pub disabled_rules: Vec<String>,
    pub max_processing_ms: u64,
}

impl Default for LinterConfig {
    fn default() -> Self {
        Self {
            optimization_level: OptimizationLevel::default(),
            max_crossjoin_depth: 8,
            disabled_rules: Vec::new(),
            max_processing_ms: 5_000,
        }
    }
}

impl LinterConfig {
    pub fn rule_enabled(&self, rule_name: &str) -> bool {
        !self.disabled_rules.iter().any(|r| r == rule_name)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DaxConfig {
    pub format_output: bool,
    pub indent_size: usize,
    pub line_width: usize,
    pub use_summarizecolumns: bool,
    pub escape_reserved_words: bool,
}

impl Default for DaxConfig {
    fn default() -> Self {
        Self {
            format_output: true,
            indent_size: 4,
            line_width: 100,
            use_summarizecolumns: true,
            escape_reserved_words: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainFormat {
    Sql,
    Natural,
    Json,
    Markdown,
}

impl Default for ExplainFormat {
    fn default() -> Self {
        ExplainFormat::Natural
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    Minimal,
    Standard,
    Detailed,
}

impl Default for DetailLevel {
    fn default() -> Self {
        DetailLevel::Standard
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExplanationConfig {
    pub format: ExplainFormat,
    pub detail: DetailLevel,
    pub include_dax_comparison: bool,
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self {
            format: ExplainFormat::default(),
            detail: DetailLevel::default(),
            include_dax_comparison: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Attach the parse tree and pass-by-pass IR to query metadata.
    pub debug: bool,
    pub fail_fast: bool,
    pub enable_caching: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            debug: false,
            fail_fast: false,
            enable_caching: false,
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration record from a JSON string. File/path/env
    /// discovery is left to the caller (`spec.md` §1 non-goals).
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(UnmdxError::from)
    }

    /// Parse a configuration record from a YAML string.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(UnmdxError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.linter.optimization_level, OptimizationLevel::Moderate);
        assert!(!cfg.global.fail_fast);
        assert_eq!(cfg.dax.indent_size, 4);
        assert_eq!(cfg.dax.line_width, 100);
    }

    #[test]
    fn partial_json_overlays_defaults() {
        let json = r#"{"linter": {"optimization_level": "aggressive"}}"#;
        let cfg = PipelineConfig::from_json_str(json).unwrap();
        assert_eq!(cfg.linter.optimization_level, OptimizationLevel::Aggressive);
        // Untouched sections keep their defaults.
        assert_eq!(cfg.dax.indent_size, 4);
    }

    #[test]
    fn partial_yaml_overlays_defaults() {
        let yaml = "explanation:\n  format: markdown\n  detail: detailed\n";
        let cfg = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.explanation.format, ExplainFormat::Markdown);
        assert_eq!(cfg.explanation.detail, DetailLevel::Detailed);
    }

    #[test]
    fn invalid_json_is_an_error_not_a_panic() {
        let result = PipelineConfig::from_json_str("{not json");
        assert!(result.is_err());
    }

    #[test]
    fn disabled_rules_checked_by_name() {
        let mut cfg = LinterConfig::default();
        cfg.disabled_rules.push("hierarchy_collapse".to_string());
        assert!(!cfg.rule_enabled("hierarchy_collapse"));
        assert!(cfg.rule_enabled("dedup_members"));
    }
}
