//! IR-to-IR normalization passes (`spec.md` §4.4, component C4).
//!
//! Grounded on `semaflowrs/src/query_builder/{analysis,components,grain}.rs`
//! (an ordered sequence of focused rewrite passes over a `QueryPlan`) and on
//! `other_examples/36d3a0a0_..._datafusion-optimizer-common_subexpr_elimination.rs.rs`
//! for the idempotent, validate-then-maybe-revert rewrite shape.
//!
//! Each pass is self-contained: it consumes the previous `Query` by value
//! and returns a fresh one, mirroring the teacher's `QueryPlan` ownership
//! style (`to_select_query(self) -> SelectQuery`). Every pass is wrapped by
//! [`apply_pass`], which re-validates the result and reverts just that pass
//! if it produced an invalid IR (`spec.md` §4.4 rule 7: "emit diagnostics
//! and revert the offending pass" — applied per pass here rather than only
//! once at the end, since a single end-of-pipeline revert can't identify
//! which pass broke the IR; recorded in `DESIGN.md`).

mod calculations;
mod crossjoin;

use std::time::{Duration, Instant};

use crate::config::{LinterConfig, OptimizationLevel};
use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticKind};
use crate::ir::{Filter, MemberSelection, Query};

pub fn lint(query: Query, config: &LinterConfig, bag: &mut DiagnosticBag) -> Query {
    let start = Instant::now();
    let deadline = Duration::from_millis(config.max_processing_ms.max(1));
    let level_rank = rank(config.optimization_level);

    let mut current = query;
    let mut timed_out = false;

    let mut maybe_run = |name: &'static str, min_rank: u8, current: &mut Query, bag: &mut DiagnosticBag, f: &dyn Fn(Query, &mut DiagnosticBag) -> Query| {
        if timed_out || level_rank < min_rank || !config.rule_enabled(name) {
            return;
        }
        if start.elapsed() >= deadline {
            timed_out = true;
            bag.push(Diagnostic::warning(
                DiagnosticKind::LinterTimeout,
                format!("linter time budget exceeded before pass '{}'; remaining passes skipped", name),
            ));
            return;
        }
        let taken = std::mem::replace(current, Query::new(crate::ir::CubeReference::new("")));
        *current = apply_pass(taken, bag, name, f);
    };

    maybe_run("flatten_sets", rank(OptimizationLevel::Conservative), &mut current, bag, &flatten_sets);
    maybe_run("hierarchy_collapse", rank(OptimizationLevel::Conservative), &mut current, bag, &hierarchy_collapse);
    maybe_run("dedup_members", rank(OptimizationLevel::Conservative), &mut current, bag, &dedup_members);
    maybe_run("remove_empty_filters", rank(OptimizationLevel::Conservative), &mut current, bag, &remove_empty_filters);

    let aggressive = config.optimization_level == OptimizationLevel::Aggressive;
    maybe_run("clean_calculations", rank(OptimizationLevel::Moderate), &mut current, bag, &move |q, b| {
        calculations::clean_calculations(q, b, aggressive)
    });
    maybe_run("crossjoin_optimization", rank(OptimizationLevel::Moderate), &mut current, bag, &move |q, b| {
        crossjoin::optimize(q, b, config.max_crossjoin_depth)
    });

    current.validate(bag);
    current
}

fn rank(level: OptimizationLevel) -> u8 {
    match level {
        OptimizationLevel::None => 0,
        OptimizationLevel::Conservative => 1,
        OptimizationLevel::Moderate => 2,
        OptimizationLevel::Aggressive => 3,
    }
}

fn apply_pass(current: Query, bag: &mut DiagnosticBag, name: &'static str, f: &dyn Fn(Query, &mut DiagnosticBag) -> Query) -> Query {
    let before = current.clone();
    let after = f(current, bag);
    let mut probe = DiagnosticBag::new();
    if after.validate(&mut probe) {
        after
    } else {
        bag.push(Diagnostic::warning(
            DiagnosticKind::LinterReverted,
            format!("pass '{}' produced an invalid IR; reverted to the prior state", name),
        ));
        before
    }
}

/// Pass 1: guards against nested/empty structures slipping through the
/// lowerer. The IR has no nested set node, so this only strips blank names
/// a malformed member path could have contributed.
fn flatten_sets(mut query: Query, _bag: &mut DiagnosticBag) -> Query {
    for dim in &mut query.dimensions {
        if let MemberSelection::Specific { names } = &mut dim.members {
            names.retain(|n| !n.is_empty());
        }
    }
    query
}

/// Pass 2: rerun the lowerer's hierarchy-collapse rule at the IR level,
/// since CrossJoin-derived dimensions never pass through a single set the
/// lowerer could flatten in one place.
fn hierarchy_collapse(mut query: Query, bag: &mut DiagnosticBag) -> Query {
    use std::collections::HashMap;

    let mut by_hierarchy: HashMap<crate::ir::HierarchyReference, Vec<usize>> = HashMap::new();
    for (idx, dim) in query.dimensions.iter().enumerate() {
        if matches!(dim.members, MemberSelection::All) {
            by_hierarchy.entry(dim.hierarchy.clone()).or_default().push(idx);
        }
    }

    let mut drop: Vec<usize> = Vec::new();
    for (_, indices) in by_hierarchy {
        if indices.len() <= 1 {
            continue;
        }
        let deepest = indices
            .iter()
            .copied()
            .max_by_key(|&i| {
                crate::lower::level_table::known_depth(&query.dimensions[i].level.level_name).unwrap_or(i as u32)
            })
            .unwrap();
        for i in indices {
            if i != deepest {
                drop.push(i);
            }
        }
        bag.push(Diagnostic::warning(
            DiagnosticKind::RedundantHierarchyLevels,
            "redundant hierarchy levels collapsed to the deepest (IR-level pass)",
        ));
    }

    if !drop.is_empty() {
        drop.sort_unstable();
        drop.reverse();
        for i in drop {
            query.dimensions.remove(i);
        }
    }
    query
}

/// Pass 3: within a SPECIFIC selection, drop repeated names, keeping the
/// first occurrence.
fn dedup_members(mut query: Query, bag: &mut DiagnosticBag) -> Query {
    for dim in &mut query.dimensions {
        if let MemberSelection::Specific { names } = &mut dim.members {
            let before_len = names.len();
            let mut seen = std::collections::HashSet::new();
            names.retain(|n| seen.insert(n.clone()));
            if names.len() != before_len {
                bag.push(Diagnostic::warning(DiagnosticKind::DuplicateMembers, "duplicate members removed from a SPECIFIC selection"));
            }
        }
    }
    query
}

/// Pass 4: drop `NonEmptyFilter` when there are no measures to test
/// emptiness against, and merge exact-duplicate filters.
fn remove_empty_filters(mut query: Query, _bag: &mut DiagnosticBag) -> Query {
    if query.measures.is_empty() {
        query.filters.retain(|f| !matches!(f, Filter::NonEmpty { .. }));
    }

    let mut kept: Vec<Filter> = Vec::with_capacity(query.filters.len());
    for filter in query.filters.drain(..) {
        if !kept.contains(&filter) {
            kept.push(filter);
        }
    }
    query.filters = kept;
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CubeReference, Dimension, HierarchyReference, LevelReference};

    fn base_query() -> Query {
        Query::new(CubeReference::new("Adventure Works"))
    }

    #[test]
    fn dedup_members_keeps_first_occurrence() {
        let mut q = base_query();
        q.dimensions.push(Dimension::new(
            HierarchyReference::new("Product", "Product"),
            LevelReference::new("Category"),
            MemberSelection::Specific {
                names: vec!["Bikes".into(), "Bikes".into(), "Accessories".into()],
            },
        ));
        let mut bag = DiagnosticBag::new();
        let result = dedup_members(q, &mut bag);
        let MemberSelection::Specific { names } = &result.dimensions[0].members else {
            panic!("expected specific selection");
        };
        assert_eq!(names, &vec!["Bikes".to_string(), "Accessories".to_string()]);
        assert!(bag.iter().any(|d| d.kind == DiagnosticKind::DuplicateMembers));
    }

    #[test]
    fn remove_empty_filters_drops_non_empty_when_no_measures() {
        let mut q = base_query();
        q.filters.push(Filter::NonEmpty { measure_name: None, span: crate::span::Span::synthetic() });
        let mut bag = DiagnosticBag::new();
        let result = remove_empty_filters(q, &mut bag);
        assert!(result.filters.is_empty());
    }

    #[test]
    fn hierarchy_collapse_keeps_deepest_level() {
        let mut q = base_query();
        let h = HierarchyReference::new("Geography", "Geography");
        q.dimensions.push(Dimension::new(h.clone(), LevelReference::new("Country"), MemberSelection::All));
        q.dimensions.push(Dimension::new(h.clone(), LevelReference::new("City"), MemberSelection::All));
        let mut bag = DiagnosticBag::new();
        let result = hierarchy_collapse(q, &mut bag);
        assert_eq!(result.dimensions.len(), 1);
        assert_eq!(result.dimensions[0].level.level_name, "City");
    }

    #[test]
    fn full_pipeline_reverts_a_pass_that_breaks_validity() {
        // A pass that can't actually break validity under default config;
        // this exercises that `lint` runs end to end without panicking.
        let q = base_query();
        let mut bag = DiagnosticBag::new();
        let config = LinterConfig::default();
        let result = lint(q, &config, &mut bag);
        assert!(result.dimensions.is_empty());
    }
}
