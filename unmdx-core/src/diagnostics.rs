//! Shared diagnostic taxonomy (`spec.md` §4.7/§7, component C7).
//!
//! A single [`DiagnosticBag`] is threaded through every pipeline stage.
//! Severities never abort the pipeline by themselves: an `error` marks the
//! `Query` invalid (see [`crate::ir::validate`]) but downstream stages
//! still run best-effort. This is the one place this crate's architecture
//! intentionally departs from its teacher, which propagates failures via
//! `Result` (`semaflowrs/src/error.rs`) — `spec.md`'s REDESIGN FLAGS call
//! for replacing exceptions-as-control-flow with accumulated diagnostics,
//! and this module is that replacement.

use serde::{Deserialize, Serialize};

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Stable diagnostic kind identifiers from `spec.md` §7. Marked
/// `#[non_exhaustive]` so that adding a subkind later (the spec explicitly
/// allows this: "implementations may add subkinds") is not a breaking
/// change for downstream matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DiagnosticKind {
    // parse_error family
    ParseError,
    ParseTimeout,
    // unsupported_construct family
    UnsupportedConstruct,
    // semantic_error family
    CircularCalculation,
    UndefinedMeasure,
    EmptySpecificSelection,
    MixedHierarchy,
    // normalization_warning family
    RedundantHierarchyLevels,
    ExcessiveNesting,
    EmptyWhere,
    DuplicateMembers,
    MixedAxis,
    DuplicateMeasureAlias,
    LinterReverted,
    LinterTimeout,
    // emitter_error family
    EmitterError,
    CalculationTableAssumption,
    // resource_error family
    InputTooLarge,
}

impl DiagnosticKind {
    /// Stable wire identifier, matching the taxonomy tags in `spec.md` §7
    /// (e.g. `parse_error`, `redundant_hierarchy_levels`).
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::ParseError => "parse_error",
            DiagnosticKind::ParseTimeout => "parse_timeout",
            DiagnosticKind::UnsupportedConstruct => "unsupported_construct",
            DiagnosticKind::CircularCalculation => "semantic_error.circular_calculation",
            DiagnosticKind::UndefinedMeasure => "semantic_error.undefined_measure",
            DiagnosticKind::EmptySpecificSelection => "semantic_error.empty_specific_selection",
            DiagnosticKind::MixedHierarchy => "semantic_error.mixed_hierarchy",
            DiagnosticKind::RedundantHierarchyLevels => "redundant_hierarchy_levels",
            DiagnosticKind::ExcessiveNesting => "excessive_nesting",
            DiagnosticKind::EmptyWhere => "empty_where",
            DiagnosticKind::DuplicateMembers => "duplicate_members",
            DiagnosticKind::MixedAxis => "mixed_axis",
            DiagnosticKind::DuplicateMeasureAlias => "duplicate_measure_alias",
            DiagnosticKind::LinterReverted => "linter_reverted",
            DiagnosticKind::LinterTimeout => "linter_timeout",
            DiagnosticKind::EmitterError => "emitter_error",
            DiagnosticKind::CalculationTableAssumption => "calculation_table_assumption",
            DiagnosticKind::InputTooLarge => "input_too_large",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<Span>,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            span: None,
            suggestion: None,
        }
    }

    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, kind, message)
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, kind, message)
    }

    pub fn info(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, kind, message)
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Accumulates diagnostics across the whole pipeline run in emission order
/// (`spec.md` §5: "diagnostics appear in source order for parse errors and
/// in pass-traversal order for IR errors").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, other: DiagnosticBag) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

impl IntoIterator for DiagnosticBag {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

/// Fixed suggestion catalogue referenced from `spec.md` §4.1/§7
/// ("a suggestion selected from a fixed catalogue").
pub mod suggestions {
    pub const MISSING_FROM_CLAUSE: &str = "add a FROM clause naming the cube, e.g. FROM [Cube Name]";
    pub const UNBALANCED_BRACKETS: &str = "check for a missing closing ']' in a bracketed identifier";
    pub const DUPLICATE_AXIS: &str = "each axis id (COLUMNS, ROWS, ...) may appear at most once";
    pub const UNBALANCED_BRACES: &str = "check for a missing closing '}' in a set expression";
    pub const UNBALANCED_PARENS: &str = "check for a missing closing ')' ";
    pub const EXPECTED_ON_AXIS: &str = "expected ON COLUMNS, ON ROWS, ON <n>, or ON AXIS(<n>) after a set expression";
    pub const UNTERMINATED_STRING: &str = "check for a missing closing quote";
    pub const UNKNOWN_FUNCTION: &str = "enable parser.allow_unknown_functions to accept unrecognized identifiers as function names";
}
