//! Structural validation of a [`Query`] (`spec.md` §4.2, component C2).
//!
//! Invoked once right after lowering, and again after each linter pass
//! (`spec.md` §4.4: "a pass that produces an invalid query is reverted").
//! A `Query` can remain in the pipeline after validation fails — errors
//! are accumulated like everything else — but callers use
//! [`DiagnosticBag::has_errors`] on the diagnostics pushed during this
//! call to decide whether to keep a rewrite.

use std::collections::{HashMap, HashSet};

use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticKind};
use crate::ir::{Calculation, MemberSelection, Query};

/// Runs every structural check from `spec.md` §4.2 against `query`,
/// pushing a diagnostic for each violation found. Returns `true` iff no
/// error-severity diagnostic was pushed (warnings do not invalidate).
pub fn validate(query: &Query, bag: &mut DiagnosticBag) -> bool {
    let before = bag.len();
    check_unique_calculation_names(query, bag);
    check_calculation_cycles(query, bag);
    check_measure_references_resolve(query, bag);
    check_specific_selections_nonempty(query, bag);
    check_unique_axis_assignment(query, bag);
    !bag.as_slice()[before..]
        .iter()
        .any(|d| d.severity == crate::diagnostics::Severity::Error)
}

fn check_unique_calculation_names(query: &Query, bag: &mut DiagnosticBag) {
    let mut seen = HashSet::new();
    for calc in &query.calculations {
        if !seen.insert(calc.name.as_str()) {
            bag.push(
                Diagnostic::error(
                    DiagnosticKind::UndefinedMeasure,
                    format!("calculation '{}' is declared more than once", calc.name),
                )
                .with_span(calc.span),
            );
        }
    }
}

/// Depth-first cycle detection over the calculation dependency graph
/// (`spec.md` §3/§9: "cyclic graphs ... detected and reported, not
/// resolved").
fn check_calculation_cycles(query: &Query, bag: &mut DiagnosticBag) {
    let by_name: HashMap<&str, &Calculation> = query
        .calculations
        .iter()
        .map(|c| (c.name.as_str(), c))
        .collect();

    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Visiting,
        Done,
    }
    let mut state: HashMap<&str, State> = HashMap::new();
    let mut reported = HashSet::new();

    for calc in &query.calculations {
        if state.get(calc.name.as_str()).is_none() {
            visit(calc, &by_name, &mut state, &mut Vec::new(), bag, &mut reported);
        }
    }

    fn visit<'a>(
        calc: &'a Calculation,
        by_name: &HashMap<&'a str, &'a Calculation>,
        state: &mut HashMap<&'a str, State>,
        stack: &mut Vec<&'a str>,
        bag: &mut DiagnosticBag,
        reported: &mut HashSet<Vec<String>>,
    ) {
        state.insert(calc.name.as_str(), State::Visiting);
        stack.push(calc.name.as_str());

        let mut deps = Vec::new();
        calc.expression.for_each_measure_ref(&mut |name| deps.push(name));

        for dep in deps {
            if let Some(&dep_calc) = by_name.get(dep) {
                match state.get(dep) {
                    None => visit(dep_calc, by_name, state, stack, bag, reported),
                    Some(State::Visiting) => {
                        let cycle_start = stack.iter().position(|n| *n == dep).unwrap_or(0);
                        let mut cycle: Vec<String> =
                            stack[cycle_start..].iter().map(|s| s.to_string()).collect();
                        cycle.push(dep.to_string());
                        let mut sorted_key = cycle.clone();
                        sorted_key.sort();
                        if reported.insert(sorted_key) {
                            bag.push(Diagnostic::error(
                                DiagnosticKind::CircularCalculation,
                                format!("circular calculation dependency: {}", cycle.join(" -> ")),
                            ));
                        }
                    }
                    Some(State::Done) => {}
                }
            }
        }

        stack.pop();
        state.insert(calc.name.as_str(), State::Done);
    }
}

fn check_measure_references_resolve(query: &Query, bag: &mut DiagnosticBag) {
    let known: HashSet<&str> = query
        .measures
        .iter()
        .map(|m| m.display_name())
        .chain(query.calculations.iter().map(|c| c.name.as_str()))
        .collect();

    let mut check = |name: &str, span: crate::span::Span| {
        if !known.contains(name) {
            bag.push(
                Diagnostic::error(
                    DiagnosticKind::UndefinedMeasure,
                    format!("reference to undefined measure or calculation '{}'", name),
                )
                .with_span(span),
            );
        }
    };

    for calc in &query.calculations {
        let mut refs = Vec::new();
        calc.expression.for_each_measure_ref(&mut |n| refs.push(n.to_string()));
        for r in refs {
            if r != calc.name {
                check(&r, calc.span);
            }
        }
    }
    for measure in &query.measures {
        if let Some(expr) = &measure.expression {
            let mut refs = Vec::new();
            expr.for_each_measure_ref(&mut |n| refs.push(n.to_string()));
            for r in refs {
                if r != measure.name {
                    check(&r, measure.span);
                }
            }
        }
    }
}

fn check_specific_selections_nonempty(query: &Query, bag: &mut DiagnosticBag) {
    for dim in &query.dimensions {
        if let MemberSelection::Specific { names } = &dim.members {
            if names.is_empty() {
                bag.push(
                    Diagnostic::error(
                        DiagnosticKind::EmptySpecificSelection,
                        format!(
                            "specific member selection on '{}' lists no members",
                            dim.hierarchy.hierarchy_name
                        ),
                    )
                    .with_span(dim.span),
                );
            }
        }
    }
}

/// `spec.md` §3: axis assignment is implicit in emission order in this
/// IR (dimensions and measures are flattened into a single projection
/// list rather than tagged by axis id), so the only remaining axis
/// invariant to check structurally is that the projection is non-empty.
fn check_unique_axis_assignment(query: &Query, bag: &mut DiagnosticBag) {
    if query.measures.is_empty() && query.dimensions.is_empty() {
        bag.push(Diagnostic::error(
            DiagnosticKind::EmptySpecificSelection,
            "query has no measures and no dimensions to project",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Aggregation, CubeReference, Expression, HierarchyReference, LevelReference, Measure};
    use crate::span::Span;

    fn base_query() -> Query {
        let mut q = Query::new(CubeReference::new("Adventure Works"));
        q.measures.push(Measure::simple("Sales Amount", Aggregation::Sum));
        q
    }

    #[test]
    fn valid_query_passes() {
        let mut bag = DiagnosticBag::new();
        let q = base_query();
        assert!(validate(&q, &mut bag));
        assert!(!bag.has_errors());
    }

    #[test]
    fn empty_specific_selection_is_an_error() {
        let mut bag = DiagnosticBag::new();
        let mut q = base_query();
        q.dimensions.push(crate::ir::Dimension::new(
            HierarchyReference::new("DimGeography", "Geography"),
            LevelReference::new("Country"),
            MemberSelection::Specific { names: vec![] },
        ));
        assert!(!validate(&q, &mut bag));
        assert!(bag.has_errors());
    }

    #[test]
    fn self_referential_calculation_is_a_cycle() {
        let mut bag = DiagnosticBag::new();
        let mut q = base_query();
        q.calculations.push(Calculation {
            name: "Growth".to_string(),
            kind: crate::ir::CalculationKind::Measure,
            expression: Expression::BinaryOp {
                op: crate::ir::ArithmeticOperator::Add,
                left: Box::new(Expression::measure("Growth")),
                right: Box::new(Expression::number(1.0)),
            },
            solve_order: None,
            format_string: None,
            span: Span::synthetic(),
        });
        assert!(!validate(&q, &mut bag));
        assert!(bag
            .iter()
            .any(|d| d.kind == DiagnosticKind::CircularCalculation));
    }

    #[test]
    fn mutual_calculation_cycle_is_detected() {
        let mut bag = DiagnosticBag::new();
        let mut q = base_query();
        q.calculations.push(Calculation {
            name: "A".to_string(),
            kind: crate::ir::CalculationKind::Measure,
            expression: Expression::measure("B"),
            solve_order: None,
            format_string: None,
            span: Span::synthetic(),
        });
        q.calculations.push(Calculation {
            name: "B".to_string(),
            kind: crate::ir::CalculationKind::Measure,
            expression: Expression::measure("A"),
            solve_order: None,
            format_string: None,
            span: Span::synthetic(),
        });
        assert!(!validate(&q, &mut bag));
        assert!(bag
            .iter()
            .any(|d| d.kind == DiagnosticKind::CircularCalculation));
    }

    #[test]
    fn undefined_measure_reference_is_an_error() {
        let mut bag = DiagnosticBag::new();
        let mut q = base_query();
        q.calculations.push(Calculation {
            name: "Bogus".to_string(),
            kind: crate::ir::CalculationKind::Measure,
            expression: Expression::measure("Nonexistent"),
            solve_order: None,
            format_string: None,
            span: Span::synthetic(),
        });
        assert!(!validate(&q, &mut bag));
        assert!(bag
            .iter()
            .any(|d| d.kind == DiagnosticKind::UndefinedMeasure));
    }

    #[test]
    fn duplicate_calculation_names_reported() {
        let mut bag = DiagnosticBag::new();
        let mut q = base_query();
        for _ in 0..2 {
            q.calculations.push(Calculation {
                name: "Dup".to_string(),
                kind: crate::ir::CalculationKind::Measure,
                expression: Expression::number(1.0),
                solve_order: None,
                format_string: None,
                span: Span::synthetic(),
            });
        }
        assert!(!validate(&q, &mut bag));
    }
}
