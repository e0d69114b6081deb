//! Lowers `WITH MEMBER` items into [`Calculation`]s (`spec.md` §4.3
//! "Calculations"). `WITH SET` items are expanded inline at their
//! reference sites rather than kept as a separate IR concept, since the
//! IR has no named-set node (`spec.md` §3).

use std::collections::HashMap;

use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticKind};
use crate::ir::{Calculation, CalculationKind};
use crate::parser::ast::WithItem;

use super::expr::lower_expr;
use super::member_ref;

pub fn lower_calculations(with_items: &[WithItem], bag: &mut DiagnosticBag) -> Vec<Calculation> {
    let mut out = Vec::new();
    let mut seen: HashMap<String, ()> = HashMap::new();

    for item in with_items {
        if let WithItem::Member { path, expr, format, span } = item {
            let name = member_ref::member_value(path);
            if seen.contains_key(&name) {
                bag.push(
                    Diagnostic::warning(
                        DiagnosticKind::DuplicateMeasureAlias,
                        format!("calculation '{}' is defined more than once; keeping the first definition", name),
                    )
                    .with_span(*span),
                );
                continue;
            }
            seen.insert(name.clone(), ());
            out.push(Calculation {
                name,
                kind: CalculationKind::Measure,
                expression: lower_expr(expr, bag),
                solve_order: None,
                format_string: format.clone(),
                span: *span,
            });
        }
    }
    out
}
