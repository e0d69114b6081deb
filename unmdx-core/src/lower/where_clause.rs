//! Lowers a parsed `WHERE` clause into IR [`Filter`]s (`spec.md` §4.3
//! "WHERE lowering").

use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticKind};
use crate::ir::{DimensionFilterOperator, Filter, FilterConjunction};
use crate::parser::ast::{BoolOp, CmpOp, Expr, WhereClause};

use super::member_ref;

/// `spec.md` §4.3: a tuple becomes k `DimensionFilter{EQUALS}`; a bare
/// logical expression distributes top-level `AND` into a filter
/// sequence, preserving `OR`/`NOT` as a compound filter; an empty
/// `WHERE()` yields no filters.
pub fn lower_where(clause: &WhereClause, bag: &mut DiagnosticBag) -> Vec<Filter> {
    match clause {
        WhereClause::Empty { .. } => Vec::new(),
        WhereClause::Tuple { members, .. } => members
            .iter()
            .map(|m| {
                let identity = member_ref::identity(m);
                Filter::Dimension {
                    dimension: identity.hierarchy,
                    level: identity.level,
                    operator: DimensionFilterOperator::Equals,
                    values: vec![member_ref::member_value(m)],
                    span: m.span,
                }
            })
            .collect(),
        WhereClause::Member { path, span } => {
            let identity = member_ref::identity(path);
            vec![Filter::Dimension {
                dimension: identity.hierarchy,
                level: identity.level,
                operator: DimensionFilterOperator::Equals,
                values: vec![member_ref::member_value(path)],
                span: *span,
            }]
        }
        WhereClause::Logical { expr, .. } => lower_logical_top(expr, bag),
    }
}

fn lower_logical_top(expr: &Expr, bag: &mut DiagnosticBag) -> Vec<Filter> {
    match expr {
        Expr::Bool { op: BoolOp::And, left, right, .. } => {
            let mut out = lower_logical_top(left, bag);
            out.extend(lower_logical_top(right, bag));
            out
        }
        Expr::Paren { inner, .. } => lower_logical_top(inner, bag),
        other => vec![lower_filter_expr(other, bag)],
    }
}

fn lower_filter_expr(expr: &Expr, bag: &mut DiagnosticBag) -> Filter {
    match expr {
        Expr::Bool { op, left, right, span } => {
            let conjunction = match op {
                BoolOp::And => FilterConjunction::And,
                BoolOp::Or => FilterConjunction::Or,
                BoolOp::Xor => {
                    bag.push(
                        Diagnostic::warning(
                            DiagnosticKind::UnsupportedConstruct,
                            "XOR in a WHERE clause has no direct filter counterpart; treated as OR",
                        )
                        .with_span(*span),
                    );
                    FilterConjunction::Or
                }
            };
            Filter::Compound {
                conjunction,
                operands: vec![lower_filter_expr(left, bag), lower_filter_expr(right, bag)],
                span: *span,
            }
        }
        Expr::Not { operand, span } => {
            bag.push(
                Diagnostic::warning(
                    DiagnosticKind::UnsupportedConstruct,
                    "NOT in a WHERE clause is represented as a single-operand compound filter",
                )
                .with_span(*span),
            );
            Filter::Compound {
                conjunction: FilterConjunction::And,
                operands: vec![lower_filter_expr(operand, bag)],
                span: *span,
            }
        }
        Expr::Comparison { op, left, right, span } => lower_comparison(*op, left, right, *span, bag),
        Expr::Member(path) => {
            let identity = member_ref::identity(path);
            Filter::Dimension {
                dimension: identity.hierarchy,
                level: identity.level,
                operator: DimensionFilterOperator::Equals,
                values: vec![member_ref::member_value(path)],
                span: path.span,
            }
        }
        Expr::In { operand, set, span } => {
            if let Expr::Member(path) = operand.as_ref() {
                let identity = member_ref::identity(path);
                Filter::Dimension {
                    dimension: identity.hierarchy,
                    level: identity.level,
                    operator: DimensionFilterOperator::In,
                    values: set.iter().map(expr_to_filter_value).collect(),
                    span: *span,
                }
            } else {
                bag.push(
                    Diagnostic::warning(DiagnosticKind::UnsupportedConstruct, "IN filter operand is not a simple member reference")
                        .with_span(*span),
                );
                Filter::NonEmpty { measure_name: None, span: *span }
            }
        }
        Expr::Paren { inner, .. } => lower_filter_expr(inner, bag),
        other => {
            bag.push(
                Diagnostic::warning(
                    DiagnosticKind::UnsupportedConstruct,
                    "unrecognized WHERE filter expression; ignored",
                )
                .with_span(other.span()),
            );
            Filter::NonEmpty { measure_name: None, span: other.span() }
        }
    }
}

fn lower_comparison(op: CmpOp, left: &Expr, right: &Expr, span: crate::span::Span, bag: &mut DiagnosticBag) -> Filter {
    if let Expr::Member(path) = left {
        if path.is_measures_reference() {
            let operator = match op {
                CmpOp::Gt => crate::ir::MeasureFilterOperator::Gt,
                CmpOp::Lt => crate::ir::MeasureFilterOperator::Lt,
                CmpOp::Gte => crate::ir::MeasureFilterOperator::Gte,
                CmpOp::Lte => crate::ir::MeasureFilterOperator::Lte,
                CmpOp::Eq => crate::ir::MeasureFilterOperator::Eq,
                CmpOp::Neq => crate::ir::MeasureFilterOperator::Neq,
            };
            let value = expr_to_number(right).unwrap_or_else(|| {
                bag.push(
                    Diagnostic::warning(DiagnosticKind::UnsupportedConstruct, "measure filter value is not numeric; defaulted to 0")
                        .with_span(span),
                );
                0.0
            });
            return Filter::Measure {
                measure_name: member_ref::member_value(path),
                operator,
                value,
                span,
            };
        }
        let identity = member_ref::identity(path);
        let values = vec![expr_to_filter_value(right)];
        let operator = match op {
            CmpOp::Eq => DimensionFilterOperator::Equals,
            CmpOp::Neq => DimensionFilterOperator::NotEquals,
            _ => {
                bag.push(
                    Diagnostic::warning(
                        DiagnosticKind::UnsupportedConstruct,
                        "ordering comparisons on dimension members are not supported; treated as EQUALS",
                    )
                    .with_span(span),
                );
                DimensionFilterOperator::Equals
            }
        };
        return Filter::Dimension {
            dimension: identity.hierarchy,
            level: identity.level,
            operator,
            values,
            span,
        };
    }
    bag.push(
        Diagnostic::warning(DiagnosticKind::UnsupportedConstruct, "comparison filter left-hand side is not a measure or member")
            .with_span(span),
    );
    Filter::NonEmpty { measure_name: None, span }
}

fn expr_to_filter_value(expr: &Expr) -> String {
    match expr {
        Expr::Literal { value: crate::parser::ast::Literal::String(s), .. } => s.clone(),
        Expr::Literal { value: crate::parser::ast::Literal::Number(n), .. } => format_number(*n),
        Expr::Member(path) => member_ref::member_value(path),
        _ => String::new(),
    }
}

fn expr_to_number(expr: &Expr) -> Option<f64> {
    match expr {
        Expr::Literal { value: crate::parser::ast::Literal::Number(n), .. } => Some(*n),
        Expr::Unary { op: crate::parser::ast::ArithOp::Sub, operand, .. } => expr_to_number(operand).map(|n| -n),
        _ => None,
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
