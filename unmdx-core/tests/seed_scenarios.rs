//! Seed scenarios S1-S6 run end to end through `mdx_to_dax` (`spec.md`
//! §8 "TESTABLE PROPERTIES"). DAX comparisons are whitespace-insensitive:
//! only the sequence of non-whitespace tokens has to match, since the
//! formatter's line-wrapping thresholds are an implementation detail,
//! not part of the contract.

use unmdx::{mdx_to_dax, PipelineConfig};

fn tokens(s: &str) -> Vec<&str> {
    s.split_whitespace().collect()
}

fn assert_dax_eq(actual: &str, expected: &str) {
    assert_eq!(
        tokens(actual),
        tokens(expected),
        "\n--- actual ---\n{}\n--- expected ---\n{}\n",
        actual,
        expected
    );
}

#[test]
fn s1_bare_measure_emits_single_row_constructor() {
    let config = PipelineConfig::default();
    let output = mdx_to_dax(
        "SELECT {[Measures].[Sales Amount]} ON 0 FROM [Adventure Works]",
        &config,
    );
    assert!(!output.diagnostics.has_errors());
    assert_dax_eq(&output.dax, "EVALUATE\n{ [Sales Amount] }");
}

#[test]
fn s2_messy_spacing_measure_and_dimension_normalizes() {
    let config = PipelineConfig::default();
    let output = mdx_to_dax(
        "select\n  {   [Measures].[Sales Amount]    }   on columns,\n{[Product].[Category].members} on rows\nfrom [Adventure Works]",
        &config,
    );
    assert!(!output.diagnostics.has_errors());
    assert_dax_eq(
        &output.dax,
        r#"EVALUATE
SUMMARIZECOLUMNS(
    Product[Category],
    "Sales Amount", [Sales Amount]
)"#,
    );
}

#[test]
fn s3_redundant_hierarchy_levels_collapse_and_filter_uses_real_column() {
    let config = PipelineConfig::default();
    let mdx = "SELECT {[Measures].[Sales Amount]} ON 0,\n\
               {[Geography].[Country].Members,\n\
               [Geography].[State].Members,\n\
               [Geography].[City].Members,\n\
               [Geography].[PostalCode].Members} ON 1\n\
               FROM [Adventure Works]\n\
               WHERE ([Date].[Calendar Year].&[2023])";
    let output = mdx_to_dax(mdx, &config);
    assert!(!output.diagnostics.has_errors());
    assert!(output
        .diagnostics
        .iter()
        .any(|d| d.kind == unmdx::DiagnosticKind::RedundantHierarchyLevels));
    assert_eq!(output.ir.dimensions.len(), 1);
    assert_eq!(output.ir.dimensions[0].level.level_name, "PostalCode");
    assert!(output.dax.contains("CALCULATETABLE"));
    assert!(output.dax.contains("'Date'[Calendar Year] = 2023"));
}

#[test]
fn s4_specific_members_become_calculatetable_in_filter() {
    let config = PipelineConfig::default();
    let mdx = "SELECT {[Measures].[Sales Amount]} ON 0, \
               {[Product].[Category].[Bikes], [Product].[Category].[Accessories]} ON 1 \
               FROM [Adventure Works]";
    let output = mdx_to_dax(mdx, &config);
    assert!(!output.diagnostics.has_errors());
    assert!(output.dax.contains("CALCULATETABLE"));
    assert!(output.dax.contains("Product[Category] IN"));
    assert!(output.dax.contains("\"Bikes\""));
    assert!(output.dax.contains("\"Accessories\""));
    assert!(output.dax.contains("SUMMARIZECOLUMNS"));
    assert!(output.dax.contains("Product[Category]"));
}

#[test]
fn s5_with_member_calculation_emits_define_measure() {
    let config = PipelineConfig::default();
    let mdx = "WITH MEMBER [Measures].[Average Price] AS [Measures].[Sales Amount] / [Measures].[Order Quantity] \
               SELECT {[Measures].[Sales Amount], [Measures].[Order Quantity], [Measures].[Average Price]} ON 0 \
               FROM [Adventure Works]";
    let output = mdx_to_dax(mdx, &config);
    assert!(!output.diagnostics.has_errors());
    assert!(output.dax.starts_with("DEFINE MEASURE"));
    assert!(output.dax.contains("[Average Price] = DIVIDE([Sales Amount], [Order Quantity])"));
    assert!(output.dax.contains("EVALUATE"));
    assert!(output.dax.contains("{ [Sales Amount], [Order Quantity], [Average Price] }"));
}

#[test]
fn s6_non_empty_on_both_axes_wraps_in_filter() {
    let config = PipelineConfig::default();
    let mdx = "SELECT NON EMPTY {[Measures].[Sales Amount]} ON 0, \
               NON EMPTY {{{{{[Product].[Category].Members}}}}} ON 1 \
               FROM [Adventure Works]";
    let output = mdx_to_dax(mdx, &config);
    assert!(!output.diagnostics.has_errors());
    assert!(output
        .diagnostics
        .iter()
        .any(|d| d.kind == unmdx::DiagnosticKind::ExcessiveNesting));
    assert!(output.dax.contains("FILTER("));
    assert!(output.dax.contains("[Sales Amount] <> BLANK()"));
    assert!(output.dax.contains("SUMMARIZECOLUMNS"));
}
