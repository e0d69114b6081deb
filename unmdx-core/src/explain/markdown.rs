//! `markdown` format: a sectioned report combining the `sql` and `natural`
//! views, optionally with the DAX equivalent and a metadata table
//! (`spec.md` §4.6).

use super::{aggregation_label, dimension_label, filter_label, natural, sql, ExplainView};

pub(super) fn render(view: &ExplainView) -> String {
    let query = view.query;
    let mut out = String::new();

    out.push_str(&format!("# Query explanation: {}\n\n", query.cube.name));

    out.push_str("## Summary\n\n");
    out.push_str(&natural::render(view));
    out.push_str("\n\n");

    out.push_str("## Measures\n\n");
    out.push_str("| Name | Aggregation | Alias |\n|---|---|---|\n");
    for measure in &query.measures {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            measure.name,
            aggregation_label(measure.aggregation),
            measure.alias.as_deref().unwrap_or("-")
        ));
    }
    out.push('\n');

    if !query.dimensions.is_empty() {
        out.push_str("## Dimensions\n\n");
        for dim in &query.dimensions {
            out.push_str(&format!("- {}\n", dimension_label(dim)));
        }
        out.push('\n');
    }

    if !query.filters.is_empty() {
        out.push_str("## Filters\n\n");
        for filter in &query.filters {
            out.push_str(&format!("- {}\n", filter_label(filter)));
        }
        out.push('\n');
    }

    if view.show_calculations() && !query.calculations.is_empty() {
        out.push_str("## Calculations\n\n");
        for calc in &query.calculations {
            out.push_str(&format!("- `{}`\n", calc.name));
        }
        out.push('\n');
    }

    if view.show_metadata() {
        out.push_str("## Metadata\n\n");
        out.push_str("| Hint | Value |\n|---|---|\n");
        for hint in &query.metadata.hints {
            out.push_str(&format!("| {} | {} |\n", hint.key, hint.value));
        }
        out.push('\n');
    }

    out.push_str("## SQL-equivalent reconstruction\n\n```sql\n");
    out.push_str(&sql::render(view));
    out.push_str("```\n\n");

    if let Some(dax) = &view.dax {
        out.push_str("## Equivalent DAX\n\n```dax\n");
        out.push_str(dax);
        out.push_str("```\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetailLevel;
    use crate::ir::{Aggregation, CubeReference, Measure, Query};

    #[test]
    fn contains_expected_sections() {
        let mut q = Query::new(CubeReference::new("Adventure Works"));
        q.measures.push(Measure::simple("Sales Amount", Aggregation::Sum));
        let view = ExplainView { query: &q, detail: DetailLevel::Standard, dax: None };
        let out = render(&view);
        assert!(out.contains("## Summary"));
        assert!(out.contains("## Measures"));
        assert!(out.contains("## SQL-equivalent reconstruction"));
    }
}
