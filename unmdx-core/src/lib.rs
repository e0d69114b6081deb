//! Transcompiles MDX queries into equivalent DAX table queries, alongside
//! SQL-like plain-language explanations of what each query computes.
//!
//! The pipeline is four stages threaded by a shared [`diagnostics::DiagnosticBag`]
//! rather than by `Result`-propagated failure (see [`diagnostics`] for why):
//!
//! 1. [`lexer`] + [`parser`] — MDX text to a concrete parse tree.
//! 2. [`lower`] — parse tree to [`ir::Query`].
//! 3. [`linter`] — ordered IR-to-IR rewrite passes, gated by
//!    [`config::OptimizationLevel`].
//! 4. [`dax`] and [`explain`] — IR to DAX text and to a plain-language
//!    explanation, respectively.
//!
//! [`pipeline`] composes these into the public entry points most callers
//! want (`parse_mdx`, `lower`, `optimize_ir`, `generate_dax`, `explain_ir`,
//! and the single-call `mdx_to_dax`).

pub mod config;
pub mod dax;
pub mod diagnostics;
pub mod error;
pub mod explain;
pub mod ir;
pub mod lexer;
pub mod linter;
pub mod lower;
pub mod parser;
pub mod pipeline;
pub mod span;

pub use config::{DetailLevel, ExplainFormat, OptimizationLevel, PipelineConfig};
pub use diagnostics::{Diagnostic, DiagnosticBag, DiagnosticKind, Severity};
pub use error::{Result, UnmdxError};
pub use ir::Query;
pub use pipeline::{
    explain_ir, generate_dax, lower as lower_mdx, mdx_to_dax, optimize_ir, parse_mdx, Pipeline,
    PipelineOutput,
};
pub use span::Span;
