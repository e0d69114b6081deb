//! Lowers a concrete parse tree into the semantic IR (`spec.md` §4.3,
//! component C3): the biggest single transformation in the pipeline, and
//! the one with no direct analogue in any pack repo — `semaflowrs` never
//! parses a full query language, only scalar formulas. Grounded instead
//! on the tree-walk-to-builder shape of
//! `examples/other_examples/475685fa_druarnfield-mantis_core__archive-semantic-planner-emit.rs.rs`'s
//! `Emitter::emit`, adapted from "walk a plan, build a `Query`" to "walk
//! a parse tree, build a `Query`".

mod calculations;
mod expr;
pub(crate) mod level_table;
mod member_ref;
mod where_clause;

use std::collections::HashSet;

use crate::config::ParserConfig;
use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticKind};
use crate::ir::{
    Aggregation, Calculation, CubeReference, Dimension, Filter, HierarchyReference, LevelReference, Limit,
    LimitDirection, Measure, MemberSelection, OrderBy, OrderByKey, Query, QueryMetadata, SortDirection,
};
use crate::parser::ast::{CubeSpec, MemberPath, ParsedQuery, SetElement, SetExpr, SetFunctionArg, SetOp};

pub fn lower(parsed: &ParsedQuery, hints: Vec<crate::ir::Hint>, _config: &ParserConfig, bag: &mut DiagnosticBag) -> Query {
    let cube = lower_cube(&parsed.cube, bag);
    let calculations = calculations::lower_calculations(&parsed.with_items, bag);

    let mut query = Query::new(cube);
    query.calculations = calculations;
    query.metadata = QueryMetadata {
        hints,
        source_span: Some(parsed.span),
        debug_trace: Vec::new(),
    };

    let mut any_non_empty = false;
    let mut seen_measures: HashSet<String> = HashSet::new();

    for axis in &parsed.axes {
        if axis.non_empty {
            any_non_empty = true;
        }
        let (inner, order_by, limit) = extract_axis_modifiers(&axis.set, bag);
        if let Some(ob) = order_by {
            query.order_by.push(ob);
        }
        if let Some(l) = limit {
            query.limit = Some(l);
        }

        let factors = gather_crossjoin_factors(inner);
        for factor in factors {
            lower_axis_factor(factor, &query.calculations, &mut query.measures, &mut query.dimensions, &mut seen_measures, bag);
        }
    }

    if any_non_empty {
        query.filters.push(Filter::NonEmpty {
            measure_name: None,
            span: crate::span::Span::synthetic(),
        });
    }

    if let Some(where_clause) = &parsed.where_clause {
        query.filters.extend(where_clause::lower_where(where_clause, bag));
    } else {
        bag.push(Diagnostic::info(DiagnosticKind::EmptyWhere, "query has no WHERE clause"));
    }

    query.validate(bag);
    query
}

fn lower_cube(spec: &CubeSpec, bag: &mut DiagnosticBag) -> CubeReference {
    match spec {
        CubeSpec::Named { segments, .. } => {
            if segments.len() >= 2 {
                CubeReference {
                    database: Some(segments[0].clone()),
                    name: segments[1..].join("."),
                }
            } else {
                CubeReference::new(segments.first().cloned().unwrap_or_default())
            }
        }
        CubeSpec::SubSelect { span, .. } => {
            bag.push(
                Diagnostic::error(
                    DiagnosticKind::UnsupportedConstruct,
                    "a sub-select cube spec is outside the supported subset",
                )
                .with_span(*span),
            );
            CubeReference::new("")
        }
    }
}

/// Peels off at most one outer `ORDER(...)`/`TOPCOUNT(...)`/
/// `BOTTOMCOUNT(...)` wrapper from an axis set, translating it into
/// `Query.order_by`/`Query.limit` and returning the remaining inner set.
fn extract_axis_modifiers<'a>(
    set: &'a SetExpr,
    bag: &mut DiagnosticBag,
) -> (&'a SetExpr, Option<OrderBy>, Option<Limit>) {
    if let SetExpr::FunctionCall { name, args, span } = set {
        let upper = name.to_ascii_uppercase();
        match upper.as_str() {
            "ORDER" => {
                let inner = args.iter().find_map(|a| match a {
                    SetFunctionArg::Set(s) => Some(s),
                    _ => None,
                });
                let key = args.iter().find_map(|a| match a {
                    SetFunctionArg::Expr(e) => Some(e),
                    _ => None,
                });
                let direction = args
                    .iter()
                    .find_map(|a| match a {
                        SetFunctionArg::Keyword(k) => Some(k.as_str()),
                        _ => None,
                    })
                    .map(|k| if k.starts_with('D') { SortDirection::Desc } else { SortDirection::Asc })
                    .unwrap_or(SortDirection::Asc);
                let order_by = key.map(|k| OrderBy {
                    key: expr_to_order_key(k),
                    direction,
                });
                if let Some(inner) = inner {
                    return (inner, order_by, None);
                }
                bag.push(
                    Diagnostic::warning(DiagnosticKind::UnsupportedConstruct, "ORDER() missing a set argument")
                        .with_span(*span),
                );
            }
            "TOPCOUNT" | "BOTTOMCOUNT" => {
                let inner = args.iter().find_map(|a| match a {
                    SetFunctionArg::Set(s) => Some(s),
                    _ => None,
                });
                let count = args.iter().find_map(|a| match a {
                    SetFunctionArg::Expr(crate::parser::ast::Expr::Literal {
                        value: crate::parser::ast::Literal::Number(n),
                        ..
                    }) => Some(*n as u64),
                    _ => None,
                });
                if let (Some(inner), Some(count)) = (inner, count) {
                    let direction = if upper == "TOPCOUNT" {
                        LimitDirection::Top
                    } else {
                        LimitDirection::Bottom
                    };
                    return (inner, None, Some(Limit { count, direction }));
                }
                bag.push(
                    Diagnostic::warning(DiagnosticKind::UnsupportedConstruct, "TOPCOUNT/BOTTOMCOUNT is missing a set or count argument")
                        .with_span(*span),
                );
            }
            _ => {}
        }
    }
    (set, None, None)
}

fn expr_to_order_key(expr: &crate::parser::ast::Expr) -> OrderByKey {
    match expr {
        crate::parser::ast::Expr::Member(path) if path.is_measures_reference() => OrderByKey::Measure {
            name: member_ref::member_value(path),
        },
        crate::parser::ast::Expr::Member(path) => {
            let identity = member_ref::identity(path);
            OrderByKey::Dimension {
                hierarchy: identity.hierarchy,
                level: identity.level,
            }
        }
        _ => OrderByKey::Measure { name: String::new() },
    }
}

/// `spec.md` §4.3 "CrossJoin -> multiple dimensions": flattens
/// `CROSSJOIN(A,B)` (as a function call or the infix `*` operator) into
/// its operands, left-to-right, regardless of parenthesization.
fn gather_crossjoin_factors(set: &SetExpr) -> Vec<&SetExpr> {
    match set {
        SetExpr::BinaryOp { op: SetOp::CrossJoin, left, right, .. } => {
            let mut out = gather_crossjoin_factors(left);
            out.extend(gather_crossjoin_factors(right));
            out
        }
        SetExpr::FunctionCall { name, args, .. } if name.eq_ignore_ascii_case("CROSSJOIN") => {
            let mut out = Vec::new();
            for arg in args {
                if let SetFunctionArg::Set(s) = arg {
                    out.extend(gather_crossjoin_factors(s));
                }
            }
            out
        }
        SetExpr::Paren { inner, .. } => gather_crossjoin_factors(inner),
        other => vec![other],
    }
}

fn lower_axis_factor(
    factor: &SetExpr,
    calculations: &[Calculation],
    measures: &mut Vec<Measure>,
    dimensions: &mut Vec<Dimension>,
    seen_measures: &mut HashSet<String>,
    bag: &mut DiagnosticBag,
) {
    match factor {
        SetExpr::Braces { items, span } => {
            let mut ranges = Vec::new();
            let members = flatten_braces_members(items, 0, &mut ranges, bag, *span);
            lower_member_group(&members, &ranges, calculations, measures, dimensions, seen_measures, bag, *span);
        }
        SetExpr::Member(path) => {
            lower_member_group(&[path.clone()], &[], calculations, measures, dimensions, seen_measures, bag, path.span);
        }
        SetExpr::FunctionCall { name, args, span } if name.eq_ignore_ascii_case("DESCENDANTS") => {
            lower_descendants(args, *span, dimensions, bag);
        }
        SetExpr::FunctionCall { name, span, .. } => {
            bag.push(
                Diagnostic::warning(
                    DiagnosticKind::UnsupportedConstruct,
                    format!("function '{}' used as a set axis is not modeled; axis contributes no dimension", name),
                )
                .with_span(*span),
            );
        }
        SetExpr::BinaryOp { op: SetOp::Union, span, .. } => {
            bag.push(
                Diagnostic::warning(DiagnosticKind::UnsupportedConstruct, "set union ('+') on an axis is not modeled")
                    .with_span(*span),
            );
        }
        SetExpr::Paren { inner, .. } => {
            lower_axis_factor(inner, calculations, measures, dimensions, seen_measures, bag);
        }
        SetExpr::BinaryOp { op: SetOp::CrossJoin, .. } => unreachable!("crossjoin factors are pre-flattened"),
    }
}

/// Recursively unwraps nested braces (`{{{x}}} -> x`), drops empty
/// elements, deduplicates consecutive identical members, and warns once
/// per axis when nesting exceeds 3 (`spec.md` §4.3 "Set flattening").
/// Explicit ranges `a:b` are kept out of the plain-member list and
/// collected into `ranges` instead, so a range survives as a distinct
/// element rather than being flattened into two ordinary members
/// (`spec.md` §4.3's classification rule: "explicit ranges `a:b` ->
/// RANGE").
fn flatten_braces_members(
    items: &[SetElement],
    depth: u32,
    ranges: &mut Vec<(MemberPath, MemberPath)>,
    bag: &mut DiagnosticBag,
    span: crate::span::Span,
) -> Vec<MemberPath> {
    if depth == 4 {
        bag.push(Diagnostic::warning(DiagnosticKind::ExcessiveNesting, "set nesting exceeds 3 levels").with_span(span));
    }
    let mut out = Vec::new();
    for item in items {
        match item {
            SetElement::Member(m) => out.push(m.clone()),
            SetElement::Set(SetExpr::Braces { items: inner, .. }) => {
                out.extend(flatten_braces_members(inner, depth + 1, ranges, bag, span));
            }
            SetElement::Set(_) => {
                // nested function-call sets on a plain axis braces list are rare;
                // left unexpanded, contributes no members.
            }
            SetElement::Tuple { members, .. } => out.extend(members.iter().cloned()),
            SetElement::Range { from, to, .. } => ranges.push((from.clone(), to.clone())),
        }
    }
    out.dedup_by(|a, b| a.segments == b.segments && a.suffix == b.suffix && a.key == b.key);
    out
}

fn lower_member_group(
    members: &[MemberPath],
    ranges: &[(MemberPath, MemberPath)],
    calculations: &[Calculation],
    measures: &mut Vec<Measure>,
    dimensions: &mut Vec<Dimension>,
    seen_measures: &mut HashSet<String>,
    bag: &mut DiagnosticBag,
    span: crate::span::Span,
) {
    let (measure_members, dimension_members): (Vec<_>, Vec<_>) =
        members.iter().cloned().partition(|m| m.is_measures_reference());

    if !measure_members.is_empty() && !dimension_members.is_empty() {
        bag.push(Diagnostic::warning(DiagnosticKind::MixedAxis, "axis mixes measure and member references").with_span(span));
    }

    for m in &measure_members {
        let name = member_ref::member_value(m);
        if !seen_measures.insert(name.clone()) {
            bag.push(
                Diagnostic::warning(
                    DiagnosticKind::DuplicateMeasureAlias,
                    format!("measure '{}' appears more than once in the projection; keeping the first", name),
                )
                .with_span(span),
            );
            continue;
        }
        if let Some(calc) = calculations.iter().find(|c| c.name == name) {
            measures.push(Measure {
                name: name.clone(),
                aggregation: Aggregation::Custom,
                expression: Some(crate::ir::Expression::MeasureReference { name }),
                alias: None,
                format_string: calc.format_string.clone(),
                span,
            });
        } else {
            measures.push(Measure {
                name: name.clone(),
                aggregation: Aggregation::Sum,
                expression: None,
                alias: None,
                format_string: None,
                span,
            });
        }
    }

    if dimension_members.is_empty() {
        if let [(from, to)] = ranges {
            dimensions.push(range_dimension(from, to));
        }
        return;
    }

    if let Some(dim) = collapse_hierarchy(&dimension_members, bag, span) {
        dimensions.push(dim);
    }
}

/// A lone explicit range `a:b` on an axis with no other members becomes a
/// single `MemberSelection::Range` dimension (`spec.md` §4.3: "explicit
/// ranges `a:b` -> RANGE").
fn range_dimension(from: &MemberPath, to: &MemberPath) -> Dimension {
    let identity = member_ref::identity(from);
    Dimension::new(
        identity.hierarchy,
        identity.level,
        MemberSelection::Range {
            from_name: member_ref::member_value(from),
            to_name: member_ref::member_value(to),
        },
    )
}

/// `spec.md` §4.3 "Hierarchy collapse": when a set enumerates `.Members`
/// at several levels of one hierarchy, keep only the deepest.
fn collapse_hierarchy(members: &[MemberPath], bag: &mut DiagnosticBag, span: crate::span::Span) -> Option<Dimension> {
    let first = members.first()?;
    let first_identity = member_ref::identity(first);

    let mut mismatched = false;
    for m in members {
        if member_ref::identity(m).hierarchy != first_identity.hierarchy {
            mismatched = true;
        }
    }
    if mismatched {
        bag.push(Diagnostic::warning(DiagnosticKind::MixedHierarchy, "axis set references more than one hierarchy").with_span(span));
    }

    let all_members: Vec<&MemberPath> = members
        .iter()
        .filter(|m| matches!(m.suffix, Some(crate::parser::ast::MemberSuffix::Members)))
        .collect();

    if all_members.len() > 1 {
        let deepest = all_members
            .iter()
            .enumerate()
            .max_by_key(|(idx, m)| {
                let level = member_ref::identity(m).level.level_name;
                level_table::known_depth(&level).unwrap_or(*idx as u32)
            })
            .map(|(_, m)| *m)?;
        bag.push(Diagnostic::warning(DiagnosticKind::RedundantHierarchyLevels, "redundant hierarchy levels collapsed to the deepest").with_span(span));
        let identity = member_ref::identity(deepest);
        return Some(Dimension::new(identity.hierarchy, identity.level, MemberSelection::All));
    }

    if members.len() == 1 {
        let m = &members[0];
        let identity = member_ref::identity(m);
        let selection = member_ref::classify(m);
        return Some(Dimension::new(identity.hierarchy, identity.level, selection));
    }

    let identity = member_ref::identity(first);
    let names: Vec<String> = members.iter().map(member_ref::member_value).collect();
    Some(Dimension::new(identity.hierarchy, identity.level, MemberSelection::Specific { names }))
}

fn lower_descendants(args: &[SetFunctionArg], span: crate::span::Span, dimensions: &mut Vec<Dimension>, bag: &mut DiagnosticBag) {
    let ancestor = args.iter().find_map(|a| match a {
        SetFunctionArg::Expr(crate::parser::ast::Expr::Member(m)) => Some(m),
        _ => None,
    });
    let Some(ancestor) = ancestor else {
        bag.push(Diagnostic::warning(DiagnosticKind::UnsupportedConstruct, "DESCENDANTS() missing an ancestor member argument").with_span(span));
        return;
    };
    let ancestor_identity = member_ref::identity(ancestor);
    let leaf_level = args
        .iter()
        .filter_map(|a| match a {
            SetFunctionArg::Expr(crate::parser::ast::Expr::Member(m)) if m.segments != ancestor.segments => Some(m.leaf().to_string()),
            _ => None,
        })
        .next();
    let flag_word = args
        .iter()
        .find_map(|a| match a {
            SetFunctionArg::Keyword(k) => Some(k.as_str()),
            _ => None,
        })
        .unwrap_or("AFTER");
    let flag = member_ref::descendants_flag_from_keyword(flag_word);

    let level = leaf_level
        .clone()
        .map(LevelReference::new)
        .unwrap_or_else(|| ancestor_identity.level.clone());

    dimensions.push(Dimension::new(
        HierarchyReference::new(ancestor_identity.hierarchy.table.clone(), ancestor_identity.hierarchy.hierarchy_name.clone()),
        level,
        MemberSelection::Descendants {
            ancestor_name: member_ref::member_value(ancestor),
            leaf_level,
            flag,
        },
    ));
}
