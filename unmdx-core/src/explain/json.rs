//! `json` format: a dedicated `ExplainDocument`, not the internal `Query`
//! serialized verbatim — keeps the IR's field names/shapes free to change
//! without breaking the documented explain-json contract (`spec.md` §4.6:
//! "a structured dictionary with keys `{measures, dimensions, filters,
//! calculations, cube, order_by, limit, metadata}`").

use serde::Serialize;

use super::{aggregation_label, ExplainView};
use crate::ir::{Calculation, Limit, OrderBy};

#[derive(Serialize)]
struct ExplainDocument {
    cube: String,
    measures: Vec<MeasureSummary>,
    dimensions: Vec<DimensionSummary>,
    filters: Vec<String>,
    calculations: Option<Vec<CalculationSummary>>,
    order_by: Vec<OrderBySummary>,
    limit: Option<Limit>,
    metadata: Option<MetadataSummary>,
}

#[derive(Serialize)]
struct MeasureSummary {
    name: String,
    aggregation: &'static str,
    alias: Option<String>,
}

#[derive(Serialize)]
struct DimensionSummary {
    table: String,
    level: String,
}

#[derive(Serialize)]
struct CalculationSummary {
    name: String,
    kind: String,
}

#[derive(Serialize)]
struct OrderBySummary {
    key: String,
    direction: String,
}

#[derive(Serialize)]
struct MetadataSummary {
    hints: Vec<String>,
    debug_trace: Vec<String>,
}

pub(super) fn render(view: &ExplainView) -> String {
    let query = view.query;

    let measures = query
        .measures
        .iter()
        .map(|m| MeasureSummary {
            name: m.name.clone(),
            aggregation: aggregation_label(m.aggregation),
            alias: m.alias.clone(),
        })
        .collect();

    let dimensions = query
        .dimensions
        .iter()
        .map(|d| DimensionSummary { table: d.hierarchy.table.clone(), level: d.level.level_name.clone() })
        .collect();

    let filters: Vec<String> = query.filters.iter().map(super::filter_label).collect();

    let calculations = if view.show_calculations() {
        Some(
            query
                .calculations
                .iter()
                .map(|c: &Calculation| CalculationSummary { name: c.name.clone(), kind: format!("{:?}", c.kind) })
                .collect(),
        )
    } else {
        None
    };

    let order_by = query
        .order_by
        .iter()
        .map(|ob: &OrderBy| OrderBySummary {
            key: match &ob.key {
                crate::ir::OrderByKey::Measure { name } => name.clone(),
                crate::ir::OrderByKey::Dimension { hierarchy, level } => format!("{}.{}", hierarchy.table, level.level_name),
            },
            direction: format!("{:?}", ob.direction),
        })
        .collect();

    let metadata = if view.show_metadata() {
        Some(MetadataSummary {
            hints: query.metadata.hints.iter().map(|h| format!("{}={}", h.key, h.value)).collect(),
            debug_trace: query.metadata.debug_trace.clone(),
        })
    } else {
        None
    };

    let doc = ExplainDocument {
        cube: query.cube.name.clone(),
        measures,
        dimensions,
        filters,
        calculations,
        order_by,
        limit: query.limit.clone(),
        metadata,
    };

    serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetailLevel;
    use crate::ir::{Aggregation, CubeReference, Measure, Query};

    #[test]
    fn omits_calculations_key_below_standard_detail() {
        let mut q = Query::new(CubeReference::new("Adventure Works"));
        q.measures.push(Measure::simple("Sales Amount", Aggregation::Sum));
        let view = ExplainView { query: &q, detail: DetailLevel::Minimal, dax: None };
        let out = render(&view);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert!(parsed.get("calculations").unwrap().is_null());
    }
}
