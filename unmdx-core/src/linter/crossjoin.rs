//! Pass 6, "CrossJoin optimization" (`spec.md` §4.4): collapse dimensions
//! that are exact duplicates (same hierarchy, level, and selection) down
//! to one, and flag hierarchies that still fan out unusually wide after
//! that collapse.

use std::collections::HashMap;

use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticKind};
use crate::ir::Query;

pub fn optimize(mut query: Query, bag: &mut DiagnosticBag, max_crossjoin_depth: usize) -> Query {
    let mut kept: Vec<crate::ir::Dimension> = Vec::with_capacity(query.dimensions.len());
    for dim in query.dimensions.drain(..) {
        if !kept.iter().any(|existing| existing.is_duplicate_of(&dim)) {
            kept.push(dim);
        }
    }
    query.dimensions = kept;

    let mut per_hierarchy: HashMap<crate::ir::HierarchyReference, usize> = HashMap::new();
    for dim in &query.dimensions {
        *per_hierarchy.entry(dim.hierarchy.clone()).or_insert(0) += 1;
    }
    for (hierarchy, count) in per_hierarchy {
        if count > max_crossjoin_depth {
            bag.push(Diagnostic::info(
                DiagnosticKind::UnsupportedConstruct,
                format!(
                    "hierarchy '{}' contributes {} dimensions to the projection, above max_crossjoin_depth ({})",
                    hierarchy.table, count, max_crossjoin_depth
                ),
            ));
        }
    }

    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CubeReference, Dimension, HierarchyReference, LevelReference, MemberSelection};

    #[test]
    fn collapses_exact_duplicate_dimensions() {
        let mut query = Query::new(CubeReference::new("Adventure Works"));
        let dim = Dimension::new(
            HierarchyReference::new("Product", "Product"),
            LevelReference::new("Category"),
            MemberSelection::Specific { names: vec!["Bikes".into()] },
        );
        query.dimensions.push(dim.clone());
        query.dimensions.push(dim);
        let mut bag = DiagnosticBag::new();
        let result = optimize(query, &mut bag, 8);
        assert_eq!(result.dimensions.len(), 1);
    }
}
