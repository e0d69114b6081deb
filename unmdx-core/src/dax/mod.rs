//! IR → DAX text (`spec.md` §4.5, component C5).
//!
//! A single `DaxWriter` walks `Query`/`Expression`/`Filter` and accumulates
//! a `String` via manual `push_str`/`format!`, the same no-template-engine
//! approach as the teacher's `semaflowrs/src/sql_ast.rs` `SqlRenderer` (one
//! `render_*` method per node kind). Only one dialect exists today, so
//! there is no `Dialect` trait the way the teacher has one per SQL engine
//! (`dialect/{duckdb,postgres,bigquery}.rs`) — recorded as an Open
//! Question decision in `DESIGN.md`.

mod identifiers;

use crate::config::DaxConfig;
use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticKind};
use crate::ir::{
    ArithmeticOperator, ComparisonOperator, ConstantValue, Dimension, DimensionFilterOperator, Expression, Filter,
    FilterConjunction, LogicalOperator, MeasureFilterOperator, MemberSelection, Query,
};

pub use identifiers::{escape_column, escape_table, quote_string_literal};

pub fn generate(query: &Query, config: &DaxConfig, bag: &mut DiagnosticBag) -> String {
    let mut out = String::new();

    if !query.calculations.is_empty() {
        let table = escape_table(&query.cube.name);
        for calc in &query.calculations {
            bag.push(Diagnostic::info(
                DiagnosticKind::CalculationTableAssumption,
                format!("calculation '{}' assumed to belong to the cube's table '{}'", calc.name, query.cube.name),
            ));
            out.push_str(&format!(
                "DEFINE MEASURE {}[{}] = {}\n",
                table,
                calc.name,
                render_expr(&calc.expression)
            ));
        }
        out.push('\n');
    }

    out.push_str("EVALUATE\n");
    out.push_str(&render_table_expr(query, config, bag));

    if !query.order_by.is_empty() {
        out.push_str("\nORDER BY\n");
        let clauses: Vec<String> = query
            .order_by
            .iter()
            .map(|ob| {
                let column = match &ob.key {
                    crate::ir::OrderByKey::Measure { name } => format!("[{}]", name),
                    crate::ir::OrderByKey::Dimension { hierarchy, level } => escape_column(&hierarchy.table, &level.level_name),
                };
                let dir = match ob.direction {
                    crate::ir::SortDirection::Asc => "ASC",
                    crate::ir::SortDirection::Desc => "DESC",
                };
                format!("{}{} {}", indent(config, 1), column, dir)
            })
            .collect();
        out.push_str(&clauses.join(",\n"));
    }

    out.push('\n');
    out
}

fn render_table_expr(query: &Query, config: &DaxConfig, bag: &mut DiagnosticBag) -> String {
    if query.dimensions.is_empty() {
        let cols: Vec<String> = query.measures.iter().map(|m| format!("[{}]", m.display_name())).collect();
        return format!("{{ {} }}\n", cols.join(", "));
    }

    let summarize = render_summarizecolumns(query, config);
    let member_filters = member_selection_filters(query, bag);

    let non_empty = query.filters.iter().find(|f| matches!(f, Filter::NonEmpty { .. }));
    let other_filters: Vec<&Filter> = query.filters.iter().filter(|f| !matches!(f, Filter::NonEmpty { .. })).collect();

    let core = if other_filters.is_empty() && member_filters.is_empty() {
        summarize
    } else {
        let filter_args: Vec<String> = member_filters.into_iter().chain(other_filters.iter().map(|f| render_filter(f))).collect();
        render_call("CALCULATETABLE", std::iter::once(summarize).chain(filter_args).collect(), config)
    };

    if let Some(Filter::NonEmpty { measure_name, .. }) = non_empty {
        let measure = measure_name
            .clone()
            .or_else(|| query.measures.first().map(|m| m.display_name().to_string()))
            .unwrap_or_else(|| {
                bag.push(Diagnostic::warning(DiagnosticKind::EmitterError, "NonEmptyFilter with no measure in scope"));
                "Value".to_string()
            });
        let predicate = format!("[{}] <> BLANK()", measure);
        render_call("FILTER", vec![core, predicate], config)
    } else {
        core
    }
}

fn render_summarizecolumns(query: &Query, config: &DaxConfig) -> String {
    let mut args: Vec<String> = Vec::new();
    for dim in &query.dimensions {
        args.push(dimension_arg(dim));
    }
    for measure in &query.measures {
        args.push(format!("\"{}\"", measure.display_name()));
        args.push(format!("[{}]", measure.name));
    }
    render_call("SUMMARIZECOLUMNS", args, config)
}

fn dimension_arg(dim: &Dimension) -> String {
    escape_column(&dim.hierarchy.table, &dim.level.level_name)
}

/// `spec.md` §4.5: "CALCULATETABLE(...) ... when specific-member
/// selections are involved". A `Specific` selection translates directly
/// into an `IN` restriction on the dimension's own column. `Children`,
/// `Descendants`, and `Range` selections have no single-column DAX
/// equivalent without resolving the hierarchy against real member data
/// (out of scope per `spec.md` §1: "semantic validation against a real
/// cube schema") — those are left as a plain group-by column plus an
/// `emitter_error` noting the gap, rather than emitting a fabricated
/// filter.
fn member_selection_filters(query: &Query, bag: &mut DiagnosticBag) -> Vec<String> {
    let mut filters = Vec::new();
    for dim in &query.dimensions {
        match &dim.members {
            MemberSelection::All => {}
            MemberSelection::Specific { names } => {
                let column = escape_column(&dim.hierarchy.table, &dim.level.level_name);
                let list: Vec<String> = names.iter().map(|v| quote_value(v)).collect();
                filters.push(format!("{} IN {{ {} }}", column, list.join(", ")));
            }
            MemberSelection::Children { .. } | MemberSelection::Descendants { .. } | MemberSelection::Range { .. } => {
                bag.push(Diagnostic::warning(
                    DiagnosticKind::EmitterError,
                    format!(
                        "member selection on '{}' has no direct DAX column filter; emitted as an unrestricted group-by column",
                        dim.hierarchy.table
                    ),
                ));
            }
        }
    }
    filters
}

fn render_filter(filter: &Filter) -> String {
    match filter {
        Filter::Dimension { dimension, level, operator, values, .. } => {
            let column = escape_column(&dimension.table, &level.level_name);
            match operator {
                DimensionFilterOperator::In => {
                    let list: Vec<String> = values.iter().map(|v| quote_value(v)).collect();
                    format!("{} IN {{ {} }}", column, list.join(", "))
                }
                DimensionFilterOperator::Equals => format!("{} = {}", column, quote_value(values.first().map(String::as_str).unwrap_or(""))),
                DimensionFilterOperator::NotEquals => format!("{} <> {}", column, quote_value(values.first().map(String::as_str).unwrap_or(""))),
                DimensionFilterOperator::Contains => format!("SEARCH({}, {}, 1, 0) > 0", quote_value(values.first().map(String::as_str).unwrap_or("")), column),
            }
        }
        Filter::Measure { measure_name, operator, value, .. } => {
            let op = match operator {
                MeasureFilterOperator::Gt => ">",
                MeasureFilterOperator::Lt => "<",
                MeasureFilterOperator::Gte => ">=",
                MeasureFilterOperator::Lte => "<=",
                MeasureFilterOperator::Eq => "=",
                MeasureFilterOperator::Neq => "<>",
            };
            format!("[{}] {} {}", measure_name, op, format_number(*value))
        }
        Filter::NonEmpty { measure_name, .. } => {
            let name = measure_name.clone().unwrap_or_else(|| "Value".to_string());
            format!("[{}] <> BLANK()", name)
        }
        Filter::Compound { conjunction, operands, .. } => {
            let joiner = match conjunction {
                FilterConjunction::And => " && ",
                FilterConjunction::Or => " || ",
            };
            let rendered: Vec<String> = operands.iter().map(render_filter).collect();
            if rendered.len() == 1 {
                format!("NOT({})", rendered[0])
            } else {
                format!("({})", rendered.join(joiner))
            }
        }
    }
}

fn quote_value(v: &str) -> String {
    if v.parse::<f64>().is_ok() {
        v.to_string()
    } else {
        quote_string_literal(v)
    }
}

fn render_expr(expr: &Expression) -> String {
    match expr {
        Expression::Constant { value } => match value {
            ConstantValue::Number(n) => format_number(*n),
            ConstantValue::String(s) => quote_string_literal(s),
            ConstantValue::Boolean(b) => if *b { "TRUE()".to_string() } else { "FALSE()".to_string() },
        },
        Expression::MeasureReference { name } => format!("[{}]", name),
        Expression::MemberReference { hierarchy, level, .. } => escape_column(&hierarchy.table, &level.level_name),
        Expression::BinaryOp { op: ArithmeticOperator::Divide, left, right } => {
            format!("DIVIDE({}, {})", render_expr(left), render_expr(right))
        }
        Expression::BinaryOp { op, left, right } => {
            let symbol = match op {
                ArithmeticOperator::Add => "+",
                ArithmeticOperator::Subtract => "-",
                ArithmeticOperator::Multiply => "*",
                ArithmeticOperator::Divide => unreachable!(),
            };
            format!("({} {} {})", render_expr(left), symbol, render_expr(right))
        }
        Expression::Comparison { op, left, right } => {
            let symbol = match op {
                ComparisonOperator::Eq => "=",
                ComparisonOperator::Neq => "<>",
                ComparisonOperator::Lt => "<",
                ComparisonOperator::Gt => ">",
                ComparisonOperator::Lte => "<=",
                ComparisonOperator::Gte => ">=",
            };
            format!("{} {} {}", render_expr(left), symbol, render_expr(right))
        }
        Expression::LogicalOp { op: LogicalOperator::Not, operands } => {
            format!("NOT({})", operands.first().map(render_expr).unwrap_or_default())
        }
        Expression::LogicalOp { op, operands } => {
            let joiner = match op {
                LogicalOperator::And => " && ",
                LogicalOperator::Or => " || ",
                LogicalOperator::Not => unreachable!(),
            };
            let rendered: Vec<String> = operands.iter().map(render_expr).collect();
            format!("({})", rendered.join(joiner))
        }
        Expression::FunctionCall { name, args } => render_function_call(name, args),
        Expression::Conditional { cond, then, else_branch } => {
            format!("IF({}, {}, {})", render_expr(cond), render_expr(then), render_expr(else_branch))
        }
    }
}

fn render_function_call(name: &str, args: &[Expression]) -> String {
    let rendered: Vec<String> = args.iter().map(render_expr).collect();
    match name {
        "DIVIDE_SAFE" if rendered.len() == 2 => format!("DIVIDE({}, {})", rendered[0], rendered[1]),
        "CONCATENATE" if rendered.len() == 2 => format!("CONCATENATE({}, {})", rendered[0], rendered[1]),
        "YTD" => format!("TOTALYTD({})", rendered.join(", ")),
        "QTD" => format!("TOTALQTD({})", rendered.join(", ")),
        "MTD" => format!("TOTALMTD({})", rendered.join(", ")),
        other => format!("{}({})", other, rendered.join(", ")),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn render_call(name: &str, args: Vec<String>, config: &DaxConfig) -> String {
    let inline = format!("{}( {} )", name, args.join(", "));
    if !config.format_output || inline.len() <= config.line_width {
        return inline;
    }
    let mut out = format!("{}(\n", name);
    for (i, arg) in args.iter().enumerate() {
        out.push_str(&indent(config, 1));
        out.push_str(&arg.replace('\n', &format!("\n{}", indent(config, 1))));
        if i + 1 < args.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push(')');
    out
}

fn indent(config: &DaxConfig, depth: usize) -> String {
    " ".repeat(config.indent_size * depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Aggregation, CubeReference, HierarchyReference, LevelReference, Measure};

    #[test]
    fn no_dimensions_emits_single_row_constructor() {
        let mut query = Query::new(CubeReference::new("Adventure Works"));
        query.measures.push(Measure::simple("Sales Amount", Aggregation::Sum));
        let config = DaxConfig::default();
        let mut bag = DiagnosticBag::new();
        let dax = generate(&query, &config, &mut bag);
        assert!(dax.contains("EVALUATE"));
        assert!(dax.contains("{ [Sales Amount] }"));
    }

    #[test]
    fn with_dimension_emits_summarizecolumns() {
        let mut query = Query::new(CubeReference::new("Adventure Works"));
        query.measures.push(Measure::simple("Sales Amount", Aggregation::Sum));
        query.dimensions.push(Dimension::new(
            HierarchyReference::new("Product", "Product"),
            LevelReference::new("Category"),
            MemberSelection::All,
        ));
        let config = DaxConfig::default();
        let mut bag = DiagnosticBag::new();
        let dax = generate(&query, &config, &mut bag);
        assert!(dax.contains("SUMMARIZECOLUMNS"));
        assert!(dax.contains("Product[Category]"));
    }

    #[test]
    fn table_name_needing_quotes_is_quoted() {
        let mut query = Query::new(CubeReference::new("Adventure Works"));
        query.measures.push(Measure::simple("Sales Amount", Aggregation::Sum));
        query.dimensions.push(Dimension::new(
            HierarchyReference::new("Product Line", "Product Line"),
            LevelReference::new("Category"),
            MemberSelection::All,
        ));
        let config = DaxConfig::default();
        let mut bag = DiagnosticBag::new();
        let dax = generate(&query, &config, &mut bag);
        assert!(dax.contains("'Product Line'[Category]"));
    }

    #[test]
    fn division_is_rewritten_to_divide() {
        let expr = Expression::BinaryOp {
            op: ArithmeticOperator::Divide,
            left: Box::new(Expression::measure("Sales Amount")),
            right: Box::new(Expression::measure("Order Quantity")),
        };
        assert_eq!(render_expr(&expr), "DIVIDE([Sales Amount], [Order Quantity])");
    }

    #[test]
    fn reserved_table_name_is_quoted() {
        assert_eq!(escape_column("Date", "Calendar Year"), "'Date'[Calendar Year]");
    }
}
