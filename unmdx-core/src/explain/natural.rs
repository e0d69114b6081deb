//! `natural` format: "This query calculates ... grouped by ... where ...".

use super::{aggregation_label, dimension_label, filter_label, ExplainView};
use crate::ir::Filter;

pub(super) fn render(view: &ExplainView) -> String {
    let query = view.query;
    let mut out = String::new();

    let measure_phrases: Vec<String> = query
        .measures
        .iter()
        .map(|m| format!("the {} of {}", aggregation_label(m.aggregation).to_lowercase(), m.display_name()))
        .collect();
    if measure_phrases.is_empty() {
        out.push_str("This query returns a single row with no measures.");
    } else {
        out.push_str(&format!("This query calculates {}", join_with_and(&measure_phrases)));
    }

    if !query.dimensions.is_empty() {
        let dims: Vec<String> = query.dimensions.iter().map(dimension_label).collect();
        out.push_str(&format!(", grouped by {}", join_with_and(&dims)));
    }

    let non_empty = query.filters.iter().any(|f| matches!(f, Filter::NonEmpty { .. }));
    let other_filters: Vec<&Filter> = query.filters.iter().filter(|f| !matches!(f, Filter::NonEmpty { .. })).collect();
    if !other_filters.is_empty() {
        let clauses: Vec<String> = other_filters.iter().map(|f| filter_label(f)).collect();
        out.push_str(&format!(", where {}", join_with_and(&clauses)));
    }
    if non_empty {
        out.push_str(", excluding rows where every measure is empty");
    }

    if let Some(limit) = &query.limit {
        let direction = match limit.direction {
            crate::ir::LimitDirection::Top => "top",
            crate::ir::LimitDirection::Bottom => "bottom",
        };
        out.push_str(&format!(", limited to the {} {} rows", direction, limit.count));
    }

    out.push('.');

    if view.show_calculations() && !query.calculations.is_empty() {
        out.push_str("\n\nThis query defines ");
        let names: Vec<String> = query.calculations.iter().map(|c| c.name.clone()).collect();
        out.push_str(&join_with_and(&names));
        out.push_str(" as calculated values.");
    }

    if let Some(dax) = &view.dax {
        out.push_str("\n\nEquivalent DAX:\n");
        out.push_str(dax);
    }

    out
}

fn join_with_and(items: &[String]) -> String {
    match items.len() {
        0 => String::new(),
        1 => items[0].clone(),
        _ => format!("{} and {}", items[..items.len() - 1].join(", "), items[items.len() - 1]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetailLevel;
    use crate::ir::{Aggregation, CubeReference, Measure, Query};

    #[test]
    fn describes_measures_in_prose() {
        let mut q = Query::new(CubeReference::new("Adventure Works"));
        q.measures.push(Measure::simple("Sales Amount", Aggregation::Sum));
        let view = ExplainView { query: &q, detail: DetailLevel::Standard, dax: None };
        let out = render(&view);
        assert!(out.starts_with("This query calculates the sum of Sales Amount"));
    }
}
