//! Pass 5, "Clean calculations" (`spec.md` §4.4): `DIVIDE`-style
//! canonicalization, constant folding, double-negation elimination, and
//! (aggressive only) single-reference calculation inlining.

use std::collections::HashMap;

use crate::diagnostics::DiagnosticBag;
use crate::ir::{ArithmeticOperator, ComparisonOperator, ConstantValue, Expression, LogicalOperator, Query};

pub fn clean_calculations(mut query: Query, bag: &mut DiagnosticBag, aggressive: bool) -> Query {
    for calc in &mut query.calculations {
        calc.expression = simplify(std::mem::replace(&mut calc.expression, Expression::number(0.0)));
    }
    for measure in &mut query.measures {
        if let Some(expr) = measure.expression.take() {
            measure.expression = Some(simplify(expr));
        }
    }

    if aggressive {
        inline_single_use(&mut query, bag);
    }

    query
}

/// `a / b` -> `DIVIDE(a, b)` (DAX's total-safe division), constant folding
/// over numeric-only subtrees, and `NOT(NOT(x)) -> x`. Recurses
/// bottom-up so a fold at a leaf can enable a fold at its parent.
fn simplify(expr: Expression) -> Expression {
    match expr {
        Expression::BinaryOp { op, left, right } => {
            let left = simplify(*left);
            let right = simplify(*right);
            if let (Expression::Constant { value: ConstantValue::Number(l) }, Expression::Constant { value: ConstantValue::Number(r) }) =
                (&left, &right)
            {
                if let Some(folded) = fold_arith(op, *l, *r) {
                    return Expression::Constant { value: ConstantValue::Number(folded) };
                }
            }
            if op == ArithmeticOperator::Divide {
                Expression::FunctionCall {
                    name: "DIVIDE_SAFE".to_string(),
                    args: vec![left, right],
                }
            } else {
                Expression::BinaryOp { op, left: Box::new(left), right: Box::new(right) }
            }
        }
        Expression::Comparison { op, left, right } => {
            let left = simplify(*left);
            let right = simplify(*right);
            if let (Expression::Constant { value: ConstantValue::Number(l) }, Expression::Constant { value: ConstantValue::Number(r) }) =
                (&left, &right)
            {
                return Expression::Constant {
                    value: ConstantValue::Boolean(fold_cmp(op, *l, *r)),
                };
            }
            Expression::Comparison { op, left: Box::new(left), right: Box::new(right) }
        }
        Expression::LogicalOp { op: LogicalOperator::Not, mut operands } if operands.len() == 1 => {
            let inner = simplify(operands.remove(0));
            if let Expression::LogicalOp { op: LogicalOperator::Not, mut inner_operands } = inner {
                if inner_operands.len() == 1 {
                    return inner_operands.remove(0);
                }
                Expression::LogicalOp { op: LogicalOperator::Not, operands: inner_operands }
            } else {
                Expression::LogicalOp { op: LogicalOperator::Not, operands: vec![inner] }
            }
        }
        Expression::LogicalOp { op, operands } => Expression::LogicalOp {
            op,
            operands: operands.into_iter().map(simplify).collect(),
        },
        Expression::FunctionCall { name, args } => Expression::FunctionCall {
            name,
            args: args.into_iter().map(simplify).collect(),
        },
        Expression::Conditional { cond, then, else_branch } => Expression::Conditional {
            cond: Box::new(simplify(*cond)),
            then: Box::new(simplify(*then)),
            else_branch: Box::new(simplify(*else_branch)),
        },
        other => other,
    }
}

fn fold_arith(op: ArithmeticOperator, l: f64, r: f64) -> Option<f64> {
    match op {
        ArithmeticOperator::Add => Some(l + r),
        ArithmeticOperator::Subtract => Some(l - r),
        ArithmeticOperator::Multiply => Some(l * r),
        ArithmeticOperator::Divide if r != 0.0 => Some(l / r),
        ArithmeticOperator::Divide => None,
    }
}

fn fold_cmp(op: ComparisonOperator, l: f64, r: f64) -> bool {
    match op {
        ComparisonOperator::Eq => l == r,
        ComparisonOperator::Neq => l != r,
        ComparisonOperator::Lt => l < r,
        ComparisonOperator::Gt => l > r,
        ComparisonOperator::Lte => l <= r,
        ComparisonOperator::Gte => l >= r,
    }
}

/// `spec.md` §4.4: "a Calculation referenced exactly once may be inlined
/// into the referring Expression". Counts references across every other
/// calculation's expression, every measure's expression, every filter
/// value, and order-by keys; a calculation referenced from more than one
/// site, or not at all, is left alone.
fn inline_single_use(query: &mut Query, _bag: &mut DiagnosticBag) {
    let mut counts: HashMap<String, u32> = HashMap::new();
    let count_refs = |expr: &Expression, counts: &mut HashMap<String, u32>| {
        expr.for_each_measure_ref(&mut |name| {
            *counts.entry(name.to_string()).or_insert(0) += 1;
        });
    };

    for calc in &query.calculations {
        count_refs(&calc.expression, &mut counts);
    }
    for measure in &query.measures {
        if let Some(expr) = &measure.expression {
            count_refs(expr, &mut counts);
        }
    }

    let inlinable: HashMap<String, Expression> = query
        .calculations
        .iter()
        .filter(|c| counts.get(&c.name).copied().unwrap_or(0) == 1)
        .map(|c| (c.name.clone(), c.expression.clone()))
        .collect();

    if inlinable.is_empty() {
        return;
    }

    for calc in &mut query.calculations {
        calc.expression = substitute(std::mem::replace(&mut calc.expression, Expression::number(0.0)), &inlinable);
    }
    for measure in &mut query.measures {
        if let Some(expr) = measure.expression.take() {
            measure.expression = Some(substitute(expr, &inlinable));
        }
    }

    query.calculations.retain(|c| !inlinable.contains_key(&c.name));
}

fn substitute(expr: Expression, inlinable: &HashMap<String, Expression>) -> Expression {
    match expr {
        Expression::MeasureReference { name } => inlinable.get(&name).cloned().unwrap_or(Expression::MeasureReference { name }),
        Expression::BinaryOp { op, left, right } => Expression::BinaryOp {
            op,
            left: Box::new(substitute(*left, inlinable)),
            right: Box::new(substitute(*right, inlinable)),
        },
        Expression::Comparison { op, left, right } => Expression::Comparison {
            op,
            left: Box::new(substitute(*left, inlinable)),
            right: Box::new(substitute(*right, inlinable)),
        },
        Expression::LogicalOp { op, operands } => Expression::LogicalOp {
            op,
            operands: operands.into_iter().map(|o| substitute(o, inlinable)).collect(),
        },
        Expression::FunctionCall { name, args } => Expression::FunctionCall {
            name,
            args: args.into_iter().map(|a| substitute(a, inlinable)).collect(),
        },
        Expression::Conditional { cond, then, else_branch } => Expression::Conditional {
            cond: Box::new(substitute(*cond, inlinable)),
            then: Box::new(substitute(*then, inlinable)),
            else_branch: Box::new(substitute(*else_branch, inlinable)),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Aggregation, CalculationKind, Calculation, CubeReference, Measure};

    #[test]
    fn folds_constant_arithmetic() {
        let expr = Expression::BinaryOp {
            op: ArithmeticOperator::Add,
            left: Box::new(Expression::number(2.0)),
            right: Box::new(Expression::number(3.0)),
        };
        assert_eq!(simplify(expr), Expression::number(5.0));
    }

    #[test]
    fn rewrites_division_as_safe_divide() {
        let expr = Expression::BinaryOp {
            op: ArithmeticOperator::Divide,
            left: Box::new(Expression::measure("a")),
            right: Box::new(Expression::measure("b")),
        };
        let result = simplify(expr);
        assert!(matches!(result, Expression::FunctionCall { ref name, .. } if name == "DIVIDE_SAFE"));
    }

    #[test]
    fn double_negation_cancels() {
        let expr = Expression::LogicalOp {
            op: LogicalOperator::Not,
            operands: vec![Expression::LogicalOp {
                op: LogicalOperator::Not,
                operands: vec![Expression::measure("x")],
            }],
        };
        assert_eq!(simplify(expr), Expression::measure("x"));
    }

    #[test]
    fn aggressive_inlines_single_reference_calculation() {
        let mut query = Query::new(CubeReference::new("Adventure Works"));
        query.calculations.push(Calculation {
            name: "Helper".to_string(),
            kind: CalculationKind::Measure,
            expression: Expression::measure("Sales Amount"),
            solve_order: None,
            format_string: None,
            span: crate::span::Span::synthetic(),
        });
        query.measures.push(Measure {
            name: "Sales Amount".to_string(),
            aggregation: Aggregation::Sum,
            expression: None,
            alias: None,
            format_string: None,
            span: crate::span::Span::synthetic(),
        });
        query.measures.push(Measure {
            name: "Wrapped".to_string(),
            aggregation: Aggregation::Custom,
            expression: Some(Expression::measure("Helper")),
            alias: None,
            format_string: None,
            span: crate::span::Span::synthetic(),
        });
        let mut bag = DiagnosticBag::new();
        let result = clean_calculations(query, &mut bag, true);
        assert!(result.calculations.is_empty());
        let wrapped = result.find_measure("Wrapped").unwrap();
        assert_eq!(wrapped.expression, Some(Expression::measure("Sales Amount")));
    }
}
