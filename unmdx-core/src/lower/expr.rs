//! Lowers a parsed value/logical [`Expr`] tree into an
//! [`ir::Expression`] (`spec.md` §3 "Expression"/§4.3 "Calculations").
//!
//! Two constructs have no direct algebraic counterpart in the IR (which
//! restricts `BinaryOp` to `{+,-,*,/}`, `spec.md` §3): string
//! concatenation (`&`) and `IS`/`XOR` predicates. Both lower to
//! `FunctionCall`, the IR's designated escape hatch for anything outside
//! the closed operator set, with an `unsupported_construct` diagnostic
//! noting the substitution where it changes evaluation semantics.

use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticKind};
use crate::ir::{ArithmeticOperator, ComparisonOperator, ConstantValue, Expression, LogicalOperator};
use crate::parser::ast::{ArithOp, BoolOp, CmpOp, Expr, IsPredicate, Literal};

use super::member_ref;

/// Time-intelligence functions with a direct DAX counterpart
/// (`dax::render_function_call`); anything else falls through as a bare
/// function call with an `unsupported_construct` diagnostic.
const TIME_INTELLIGENCE_FUNCTIONS: &[&str] =
    &["YTD", "QTD", "MTD", "PARALLELPERIOD", "PERIODSTODATE"];

pub fn lower_expr(expr: &Expr, bag: &mut DiagnosticBag) -> Expression {
    match expr {
        Expr::Literal { value, .. } => Expression::Constant {
            value: match value {
                Literal::Number(n) => ConstantValue::Number(*n),
                Literal::String(s) => ConstantValue::String(s.clone()),
            },
        },
        Expr::Member(path) => {
            if path.is_measures_reference() {
                Expression::MeasureReference {
                    name: member_ref::member_value(path),
                }
            } else {
                let identity = member_ref::identity(path);
                Expression::MemberReference {
                    hierarchy: identity.hierarchy,
                    level: identity.level,
                    name: member_ref::member_value(path),
                }
            }
        }
        Expr::FunctionCall { name, args, span } => {
            let upper = name.to_uppercase();
            if !TIME_INTELLIGENCE_FUNCTIONS.contains(&upper.as_str()) {
                bag.push(
                    Diagnostic::warning(
                        DiagnosticKind::UnsupportedConstruct,
                        format!("'{}' has no dedicated lowering rule; passed through as a bare function call", name),
                    )
                    .with_span(*span),
                );
            }
            Expression::FunctionCall {
                name: upper,
                args: args.iter().map(|a| lower_expr(a, bag)).collect(),
            }
        }
        Expr::Unary { op, operand, .. } => {
            let inner = lower_expr(operand, bag);
            match op {
                ArithOp::Sub => Expression::BinaryOp {
                    op: ArithmeticOperator::Subtract,
                    left: Box::new(Expression::number(0.0)),
                    right: Box::new(inner),
                },
                _ => inner,
            }
        }
        Expr::Not { operand, .. } => Expression::LogicalOp {
            op: LogicalOperator::Not,
            operands: vec![lower_expr(operand, bag)],
        },
        Expr::Arith { op, left, right, .. } => {
            let l = lower_expr(left, bag);
            let r = lower_expr(right, bag);
            match op {
                ArithOp::Add => binary(ArithmeticOperator::Add, l, r),
                ArithOp::Sub => binary(ArithmeticOperator::Subtract, l, r),
                ArithOp::Mul => binary(ArithmeticOperator::Multiply, l, r),
                ArithOp::Div => binary(ArithmeticOperator::Divide, l, r),
                ArithOp::Concat => Expression::FunctionCall {
                    name: "CONCATENATE".to_string(),
                    args: vec![l, r],
                },
            }
        }
        Expr::Comparison { op, left, right, .. } => Expression::Comparison {
            op: lower_cmp(*op),
            left: Box::new(lower_expr(left, bag)),
            right: Box::new(lower_expr(right, bag)),
        },
        Expr::Bool { op, left, right, span } => {
            let l = lower_expr(left, bag);
            let r = lower_expr(right, bag);
            match op {
                BoolOp::And => Expression::LogicalOp {
                    op: LogicalOperator::And,
                    operands: vec![l, r],
                },
                BoolOp::Or => Expression::LogicalOp {
                    op: LogicalOperator::Or,
                    operands: vec![l, r],
                },
                BoolOp::Xor => {
                    bag.push(
                        Diagnostic::warning(
                            DiagnosticKind::UnsupportedConstruct,
                            "XOR has no direct IR operator; lowered to a FunctionCall",
                        )
                        .with_span(*span),
                    );
                    Expression::FunctionCall {
                        name: "XOR".to_string(),
                        args: vec![l, r],
                    }
                }
            }
        }
        Expr::Between { operand, low, high, .. } => {
            let o1 = lower_expr(operand, bag);
            let o2 = o1.clone();
            Expression::LogicalOp {
                op: LogicalOperator::And,
                operands: vec![
                    Expression::Comparison {
                        op: ComparisonOperator::Gte,
                        left: Box::new(o1),
                        right: Box::new(lower_expr(low, bag)),
                    },
                    Expression::Comparison {
                        op: ComparisonOperator::Lte,
                        left: Box::new(o2),
                        right: Box::new(lower_expr(high, bag)),
                    },
                ],
            }
        }
        Expr::In { operand, set, .. } => {
            let operands: Vec<Expression> = set
                .iter()
                .map(|e| Expression::Comparison {
                    op: ComparisonOperator::Eq,
                    left: Box::new(lower_expr(operand, bag)),
                    right: Box::new(lower_expr(e, bag)),
                })
                .collect();
            if operands.len() == 1 {
                operands.into_iter().next().unwrap()
            } else {
                Expression::LogicalOp {
                    op: LogicalOperator::Or,
                    operands,
                }
            }
        }
        Expr::Is { operand, predicate, span } => {
            bag.push(
                Diagnostic::warning(
                    DiagnosticKind::UnsupportedConstruct,
                    "IS predicate has no direct IR operator; lowered to a FunctionCall",
                )
                .with_span(*span),
            );
            let name = match predicate {
                IsPredicate::Null => "ISBLANK",
                IsPredicate::Empty => "ISEMPTY",
                IsPredicate::Leaf => "ISLEAF",
                IsPredicate::DataMember => "ISDATAMEMBER",
            };
            Expression::FunctionCall {
                name: name.to_string(),
                args: vec![lower_expr(operand, bag)],
            }
        }
        Expr::Iif { cond, then, else_branch, .. } => Expression::Conditional {
            cond: Box::new(lower_expr(cond, bag)),
            then: Box::new(lower_expr(then, bag)),
            else_branch: Box::new(lower_expr(else_branch, bag)),
        },
        Expr::Case { operand, when_then, else_branch, span } => {
            lower_case(operand.as_deref(), when_then, else_branch.as_deref(), *span, bag)
        }
        Expr::Paren { inner, .. } => lower_expr(inner, bag),
    }
}

fn binary(op: ArithmeticOperator, left: Expression, right: Expression) -> Expression {
    Expression::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn lower_cmp(op: CmpOp) -> ComparisonOperator {
    match op {
        CmpOp::Eq => ComparisonOperator::Eq,
        CmpOp::Neq => ComparisonOperator::Neq,
        CmpOp::Lt => ComparisonOperator::Lt,
        CmpOp::Gt => ComparisonOperator::Gt,
        CmpOp::Lte => ComparisonOperator::Lte,
        CmpOp::Gte => ComparisonOperator::Gte,
    }
}

/// Flattens a CASE expression (simple or searched, `spec.md` §3
/// "Conditional{cond, then, else} (covers IIF and flattened CASE)") into
/// nested `Conditional` nodes, right-associatively.
fn lower_case(
    operand: Option<&Expr>,
    when_then: &[(Expr, Expr)],
    else_branch: Option<&Expr>,
    span: crate::span::Span,
    bag: &mut DiagnosticBag,
) -> Expression {
    let fallback = match else_branch {
        Some(e) => lower_expr(e, bag),
        None => {
            bag.push(
                Diagnostic::info(DiagnosticKind::UnsupportedConstruct, "CASE without ELSE defaults to a blank constant")
                    .with_span(span),
            );
            Expression::Constant {
                value: ConstantValue::String(String::new()),
            }
        }
    };

    when_then.iter().rev().fold(fallback, |acc, (when, then)| {
        let cond = match operand {
            Some(op_expr) => Expression::Comparison {
                op: ComparisonOperator::Eq,
                left: Box::new(lower_expr(op_expr, bag)),
                right: Box::new(lower_expr(when, bag)),
            },
            None => lower_expr(when, bag),
        };
        Expression::Conditional {
            cond: Box::new(cond),
            then: Box::new(lower_expr(then, bag)),
            else_branch: Box::new(acc),
        }
    })
}
