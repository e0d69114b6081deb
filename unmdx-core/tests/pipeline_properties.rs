//! Property-style integration tests over the public pipeline API:
//! determinism, idempotence, and boundary behaviors that don't fit
//! neatly into any single seed scenario (`spec.md` §8).

use unmdx::{
    explain_ir, generate_dax, lower_mdx, mdx_to_dax, optimize_ir, parse_mdx, DetailLevel, DiagnosticKind,
    ExplainFormat, PipelineConfig,
};

const ADVENTURE_WORKS: &str = "SELECT {[Measures].[Sales Amount]} ON 0, {[Product].[Category].Members} ON 1 FROM [Adventure Works]";

#[test]
fn running_the_same_query_twice_produces_identical_dax() {
    let config = PipelineConfig::default();
    let first = mdx_to_dax(ADVENTURE_WORKS, &config);
    let second = mdx_to_dax(ADVENTURE_WORKS, &config);
    assert_eq!(first.dax, second.dax);
    assert_eq!(first.diagnostics.len(), second.diagnostics.len());
}

#[test]
fn optimizing_twice_is_idempotent() {
    let config = PipelineConfig::default();
    let (tree, _) = parse_mdx(ADVENTURE_WORKS, &config.parser);
    let (query, _) = lower_mdx(&tree, &config.parser);
    let (once, diags_once) = optimize_ir(query.clone(), &config.linter);
    let (twice, diags_twice) = optimize_ir(once.clone(), &config.linter);
    assert!(!diags_once.has_errors());
    assert!(!diags_twice.has_errors());

    let (dax_once, _) = generate_dax(&once, &config.dax);
    let (dax_twice, _) = generate_dax(&twice, &config.dax);
    assert_eq!(dax_once, dax_twice, "a second optimization pass should not change the emitted DAX");
}

#[test]
fn empty_where_clause_contributes_no_filters() {
    let config = PipelineConfig::default();
    let mdx = "SELECT {[Measures].[Sales Amount]} ON 0 FROM [Adventure Works] WHERE ()";
    let output = mdx_to_dax(mdx, &config);
    assert!(!output.diagnostics.has_errors());
    assert!(output.ir.filters.is_empty());
}

#[test]
fn input_too_large_is_reported_without_panicking() {
    let mut config = PipelineConfig::default();
    config.parser.max_input_chars = Some(16);
    let output = mdx_to_dax(ADVENTURE_WORKS, &config);
    assert!(output.diagnostics.iter().any(|d| d.kind == DiagnosticKind::InputTooLarge));
}

#[test]
fn malformed_input_recovers_instead_of_looping_forever() {
    let config = PipelineConfig::default();
    let mdx = "SELECT {{{{ ON ON ON FROM FROM WHERE () ,,, [[[ }}} FROM [X] WHERE";
    // The assertion that matters here is that this call returns at all: the
    // parser's recovery rule consumes at least one token per step, so a
    // malformed token stream can never spin the loop in `should_stop`.
    let (_tree, diags) = parse_mdx(mdx, &config.parser);
    assert!(diags.has_errors(), "malformed input should surface parse errors, not silently succeed");
}

#[test]
fn duplicate_axis_ids_are_rejected() {
    let config = PipelineConfig::default();
    let mdx = "SELECT {[Measures].[Sales Amount]} ON 0, {[Measures].[Order Quantity]} ON 0 FROM [Adventure Works]";
    let (_tree, diags) = parse_mdx(mdx, &config.parser);
    assert!(diags.has_errors());
}

#[test]
fn mixed_measure_and_dimension_axis_warns() {
    let config = PipelineConfig::default();
    let mdx = "SELECT {[Measures].[Sales Amount], [Product].[Category].[Bikes]} ON 0 FROM [Adventure Works]";
    let output = mdx_to_dax(mdx, &config);
    assert!(output.diagnostics.iter().any(|d| d.kind == DiagnosticKind::MixedAxis));
}

#[test]
fn duplicate_measure_alias_keeps_first_and_warns() {
    let config = PipelineConfig::default();
    let mdx = "SELECT {[Measures].[Sales Amount], [Measures].[Sales Amount]} ON 0 FROM [Adventure Works]";
    let output = mdx_to_dax(mdx, &config);
    assert!(output.diagnostics.iter().any(|d| d.kind == DiagnosticKind::DuplicateMeasureAlias));
    assert_eq!(output.ir.measures.len(), 1);
}

// `CROSSJOIN`-derived dimensions on the same hierarchy never pass through
// the lowerer's single-braces-set collapse (`DESIGN.md`: "hierarchy
// collapse runs twice"), so these two tests exercise the linter's own
// pass, which the optimization level and `disabled_rules` both gate.
const CROSSJOINED_GEOGRAPHY: &str = "SELECT {[Measures].[Sales Amount]} ON 0, \
    {[Geography].[Country].Members} * {[Geography].[PostalCode].Members} ON 1 \
    FROM [Adventure Works]";

#[test]
fn disabling_a_linter_rule_leaves_its_redundancy_unresolved() {
    let mut config = PipelineConfig::default();
    config.linter.disabled_rules.push("hierarchy_collapse".to_string());
    let output = mdx_to_dax(CROSSJOINED_GEOGRAPHY, &config);
    assert_eq!(output.ir.dimensions.len(), 2, "hierarchy_collapse is disabled; both dimensions should survive");
    assert!(
        !output.diagnostics.iter().any(|d| d.kind == DiagnosticKind::RedundantHierarchyLevels),
        "hierarchy_collapse is disabled; no collapse diagnostic should fire"
    );
}

#[test]
fn none_optimization_level_skips_all_rewrite_passes() {
    use unmdx::OptimizationLevel;
    let mut config = PipelineConfig::default();
    config.linter.optimization_level = OptimizationLevel::None;
    let output = mdx_to_dax(CROSSJOINED_GEOGRAPHY, &config);
    assert_eq!(output.ir.dimensions.len(), 2, "optimization_level none should leave both dimensions unmerged");
}

#[test]
fn moderate_optimization_level_collapses_crossjoined_hierarchy() {
    let config = PipelineConfig::default();
    let output = mdx_to_dax(CROSSJOINED_GEOGRAPHY, &config);
    assert_eq!(output.ir.dimensions.len(), 1, "default (moderate) optimization should collapse the crossjoined hierarchy");
}

#[test]
fn explicit_member_range_becomes_a_range_selection() {
    let config = PipelineConfig::default();
    let mdx = "SELECT {[Measures].[Sales Amount]} ON 0, \
               {[Date].[Calendar].[Jan 1]:[Date].[Calendar].[Jan 31]} ON 1 \
               FROM [Adventure Works]";
    let output = mdx_to_dax(mdx, &config);
    assert!(!output.diagnostics.has_errors());
    assert_eq!(output.ir.dimensions.len(), 1);
    match &output.ir.dimensions[0].members {
        unmdx::ir::MemberSelection::Range { from_name, to_name } => {
            assert_eq!(from_name, "Jan 1");
            assert_eq!(to_name, "Jan 31");
        }
        other => panic!("expected a range selection, got {:?}", other),
    }
}

#[test]
fn every_explain_format_produces_nonempty_text_without_errors() {
    let mut config = PipelineConfig::default();
    let formats = [ExplainFormat::Sql, ExplainFormat::Natural, ExplainFormat::Json, ExplainFormat::Markdown];
    for format in formats {
        config.explanation.format = format;
        config.explanation.detail = DetailLevel::Detailed;
        config.explanation.include_dax_comparison = true;
        let output = mdx_to_dax(ADVENTURE_WORKS, &config);
        let (explanation, diags) = explain_ir(&output.ir, &config.explanation);
        assert!(!explanation.is_empty());
        assert!(!diags.has_errors());
    }
}

#[test]
fn minimal_detail_omits_calculation_and_metadata_sections() {
    let mut config = PipelineConfig::default();
    config.explanation.format = ExplainFormat::Markdown;
    config.explanation.detail = DetailLevel::Minimal;
    let mdx = "WITH MEMBER [Measures].[Average Price] AS [Measures].[Sales Amount] / [Measures].[Order Quantity] \
               SELECT {[Measures].[Average Price]} ON 0 FROM [Adventure Works]";
    let output = mdx_to_dax(mdx, &config);
    let (explanation, _) = explain_ir(&output.ir, &config.explanation);
    assert!(!explanation.contains("## Calculations"));
    assert!(!explanation.contains("## Metadata"));
}

#[test]
fn caching_is_off_by_default_and_every_call_still_succeeds() {
    let config = PipelineConfig::default();
    assert!(!config.global.enable_caching);
    let output = mdx_to_dax(ADVENTURE_WORKS, &config);
    assert!(!output.diagnostics.has_errors());
}

#[test]
fn json_config_round_trips_into_an_equivalent_pipeline_config() {
    let config = PipelineConfig::default();
    let json = serde_json::to_string(&config).expect("config should serialize");
    let restored = PipelineConfig::from_json_str(&json).expect("config should parse back");
    let original_output = mdx_to_dax(ADVENTURE_WORKS, &config);
    let restored_output = mdx_to_dax(ADVENTURE_WORKS, &restored);
    assert_eq!(original_output.dax, restored_output.dax);
}
