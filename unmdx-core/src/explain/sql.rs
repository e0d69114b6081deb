//! `sql` format: a SQL-flavored reconstruction of the query's intent.

use super::{aggregation_label, dimension_label, filter_label, ExplainView};
use crate::ir::Filter;

pub(super) fn render(view: &ExplainView) -> String {
    let query = view.query;
    let mut out = String::new();

    out.push_str("SELECT\n");
    let mut select_items: Vec<String> = query.dimensions.iter().map(|d| format!("    {}", dimension_label(d))).collect();
    for measure in &query.measures {
        select_items.push(format!("    {}({}) AS {}", aggregation_label(measure.aggregation), measure.name, measure.display_name()));
    }
    out.push_str(&select_items.join(",\n"));
    out.push_str(&format!("\nFROM {}\n", query.cube.name));

    let non_empty: Vec<&Filter> = query.filters.iter().filter(|f| matches!(f, Filter::NonEmpty { .. })).collect();
    let where_filters: Vec<&Filter> = query.filters.iter().filter(|f| !matches!(f, Filter::NonEmpty { .. })).collect();

    if !where_filters.is_empty() {
        let clauses: Vec<String> = where_filters.iter().map(|f| filter_label(f)).collect();
        out.push_str(&format!("WHERE {}\n", clauses.join(" AND ")));
    }

    if !query.dimensions.is_empty() {
        let group_by: Vec<String> = query.dimensions.iter().map(dimension_label).collect();
        out.push_str(&format!("GROUP BY {}\n", group_by.join(", ")));
    }

    if let Some(non_empty_filter) = non_empty.first() {
        out.push_str(&format!("HAVING {}\n", filter_label(non_empty_filter)));
    }

    if !query.order_by.is_empty() {
        let clauses: Vec<String> = query
            .order_by
            .iter()
            .map(|ob| {
                let key = match &ob.key {
                    crate::ir::OrderByKey::Measure { name } => name.clone(),
                    crate::ir::OrderByKey::Dimension { hierarchy, level } => format!("{}.{}", hierarchy.table, level.level_name),
                };
                let dir = match ob.direction {
                    crate::ir::SortDirection::Asc => "ASC",
                    crate::ir::SortDirection::Desc => "DESC",
                };
                format!("{} {}", key, dir)
            })
            .collect();
        out.push_str(&format!("ORDER BY {}\n", clauses.join(", ")));
    }

    if view.show_calculations() && !query.calculations.is_empty() {
        out.push_str("\n-- calculations\n");
        for calc in &query.calculations {
            out.push_str(&format!("-- {} := {:?}\n", calc.name, calc.expression));
        }
    }

    if let Some(dax) = &view.dax {
        out.push_str("\n-- equivalent DAX\n");
        for line in dax.lines() {
            out.push_str(&format!("-- {}\n", line));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetailLevel;
    use crate::ir::{Aggregation, CubeReference, Dimension, HierarchyReference, LevelReference, Measure, MemberSelection, Query};

    #[test]
    fn renders_select_from_group_by() {
        let mut q = Query::new(CubeReference::new("Adventure Works"));
        q.measures.push(Measure::simple("Sales Amount", Aggregation::Sum));
        q.dimensions.push(Dimension::new(
            HierarchyReference::new("Product", "Product"),
            LevelReference::new("Category"),
            MemberSelection::All,
        ));
        let view = ExplainView { query: &q, detail: DetailLevel::Standard, dax: None };
        let out = render(&view);
        assert!(out.starts_with("SELECT"));
        assert!(out.contains("FROM Adventure Works"));
        assert!(out.contains("GROUP BY Product.Category"));
        assert!(out.contains("SUM(Sales Amount) AS Sales Amount"));
    }
}
