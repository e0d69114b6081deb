//! The semantic intermediate representation (`spec.md` §3, component C2).
//!
//! Built once by the lowerer, rewritten into fresh values by each linter
//! pass, and consumed read-only by the emitters. No cycles are permitted:
//! calculations reference each other by name, never by node identity
//! (`spec.md` §9 "Cyclic graphs").
//!
//! Every type derives `serde::Serialize`/`Deserialize`, following the
//! teacher's practice in `semaflowrs/src/flows.rs` of deriving both on
//! every domain type — here it backs the `json` explanation format and
//! lets tests build `Query` values directly rather than only through the
//! parser.

pub mod validate;

use serde::{Deserialize, Serialize};

use crate::diagnostics::DiagnosticBag;
use crate::span::Span;

/// The queried cube. Purely symbolic — `spec.md` §3: "not resolved"; a
/// Non-goal (§1) is validating this against a real schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeReference {
    pub name: String,
    pub database: Option<String>,
}

impl CubeReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    Avg,
    Count,
    DistinctCount,
    Min,
    Max,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub name: String,
    pub aggregation: Aggregation,
    /// Required when `aggregation == Custom`; references only other
    /// measures/members/constants (`spec.md` §3).
    pub expression: Option<Expression>,
    pub alias: Option<String>,
    pub format_string: Option<String>,
    pub span: Span,
}

impl Measure {
    pub fn simple(name: impl Into<String>, aggregation: Aggregation) -> Self {
        Self {
            name: name.into(),
            aggregation,
            expression: None,
            alias: None,
            format_string: None,
            span: Span::synthetic(),
        }
    }

    /// The name emitters and references should use: the alias if present,
    /// otherwise the original measure name.
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HierarchyReference {
    pub table: String,
    pub hierarchy_name: String,
}

impl HierarchyReference {
    pub fn new(table: impl Into<String>, hierarchy_name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            hierarchy_name: hierarchy_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelReference {
    pub level_name: String,
}

impl LevelReference {
    pub fn new(level_name: impl Into<String>) -> Self {
        Self {
            level_name: level_name.into(),
        }
    }
}

/// How members of a dimension are selected (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemberSelection {
    /// Every member at the level. Carries no auxiliary data.
    All,
    /// A non-empty, explicit list of member names.
    Specific { names: Vec<String> },
    Children { parent_name: String },
    Descendants {
        ancestor_name: String,
        leaf_level: Option<String>,
        flag: DescendantsFlag,
    },
    Range { from_name: String, to_name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescendantsFlag {
    SelfAndAfter,
    SelfAndBefore,
    Leaves,
}

impl MemberSelection {
    /// Invariant from `spec.md` §3: "SPECIFIC never has an empty name
    /// list".
    pub fn is_well_formed(&self) -> bool {
        match self {
            MemberSelection::Specific { names } => !names.is_empty(),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub hierarchy: HierarchyReference,
    pub level: LevelReference,
    pub members: MemberSelection,
    pub span: Span,
}

impl Dimension {
    pub fn new(hierarchy: HierarchyReference, level: LevelReference, members: MemberSelection) -> Self {
        Self {
            hierarchy,
            level,
            members,
            span: Span::synthetic(),
        }
    }

    /// Whether this dimension and `other` refer to the same hierarchy
    /// (table + hierarchy name), independent of level — used by the
    /// hierarchy-collapse rule.
    pub fn same_hierarchy(&self, other: &Dimension) -> bool {
        self.hierarchy == other.hierarchy
    }

    /// Whether this dimension is identical in hierarchy, level, and
    /// member selection to `other` — used by the CrossJoin-dedup rule.
    pub fn is_duplicate_of(&self, other: &Dimension) -> bool {
        self.hierarchy == other.hierarchy && self.level == other.level && self.members == other.members
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionFilterOperator {
    In,
    Equals,
    NotEquals,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureFilterOperator {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Neq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterConjunction {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filter {
    Dimension {
        dimension: HierarchyReference,
        level: LevelReference,
        operator: DimensionFilterOperator,
        values: Vec<String>,
        span: Span,
    },
    Measure {
        measure_name: String,
        operator: MeasureFilterOperator,
        value: f64,
        span: Span,
    },
    /// `measure_name` absent means "any measure in the projection"
    /// (`spec.md` §3).
    NonEmpty {
        measure_name: Option<String>,
        span: Span,
    },
    /// A compound filter combining multiple dimension filters with AND/OR,
    /// used when a WHERE-clause logical expression can't be distributed
    /// into a flat conjunction of simple filters (`spec.md` §4.3: "OR/NOT
    /// inside a filter is preserved as a compound DimensionFilter via a
    /// dedicated operator").
    Compound {
        conjunction: FilterConjunction,
        operands: Vec<Filter>,
        span: Span,
    },
}

impl Filter {
    pub fn span(&self) -> Span {
        match self {
            Filter::Dimension { span, .. }
            | Filter::Measure { span, .. }
            | Filter::NonEmpty { span, .. }
            | Filter::Compound { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationKind {
    Measure,
    Member,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
    pub name: String,
    pub kind: CalculationKind,
    pub expression: Expression,
    pub solve_order: Option<i32>,
    pub format_string: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

/// A literal scalar value (`spec.md` §3: `Constant{value: numeric|string|
/// boolean}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstantValue {
    Number(f64),
    String(String),
    Boolean(bool),
}

/// The algebraic expression tree shared by measures, calculations, and
/// filter values (`spec.md` §3). Acyclic by construction: the lowerer
/// topologically validates `calculations` before admitting them
/// (`ir::validate`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expression {
    Constant { value: ConstantValue },
    MeasureReference { name: String },
    MemberReference {
        hierarchy: HierarchyReference,
        level: LevelReference,
        name: String,
    },
    BinaryOp {
        op: ArithmeticOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Comparison {
        op: ComparisonOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    LogicalOp {
        op: LogicalOperator,
        operands: Vec<Expression>,
    },
    /// Used for aggregate functions and time-intelligence stubs
    /// (`spec.md` §3/§4.3).
    FunctionCall { name: String, args: Vec<Expression> },
    /// Covers IIF and flattened CASE (`spec.md` §3).
    Conditional {
        cond: Box<Expression>,
        then: Box<Expression>,
        else_branch: Box<Expression>,
    },
}

impl Expression {
    pub fn number(value: f64) -> Self {
        Expression::Constant {
            value: ConstantValue::Number(value),
        }
    }

    pub fn measure(name: impl Into<String>) -> Self {
        Expression::MeasureReference { name: name.into() }
    }

    /// Visits every `MeasureReference` name reachable from this
    /// expression, depth-first. Used by the calculation-cycle check and by
    /// the linter's single-use-inlining pass.
    pub fn for_each_measure_ref<'a>(&'a self, visit: &mut impl FnMut(&'a str)) {
        match self {
            Expression::Constant { .. } => {}
            Expression::MeasureReference { name } => visit(name),
            Expression::MemberReference { .. } => {}
            Expression::BinaryOp { left, right, .. } => {
                left.for_each_measure_ref(visit);
                right.for_each_measure_ref(visit);
            }
            Expression::Comparison { left, right, .. } => {
                left.for_each_measure_ref(visit);
                right.for_each_measure_ref(visit);
            }
            Expression::LogicalOp { operands, .. } => {
                for operand in operands {
                    operand.for_each_measure_ref(visit);
                }
            }
            Expression::FunctionCall { args, .. } => {
                for arg in args {
                    arg.for_each_measure_ref(visit);
                }
            }
            Expression::Conditional {
                cond,
                then,
                else_branch,
            } => {
                cond.for_each_measure_ref(visit);
                then.for_each_measure_ref(visit);
                else_branch.for_each_measure_ref(visit);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub key: OrderByKey,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderByKey {
    Measure { name: String },
    Dimension { hierarchy: HierarchyReference, level: LevelReference },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitDirection {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    pub count: u64,
    pub direction: LimitDirection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub hints: Vec<Hint>,
    pub source_span: Option<Span>,
    /// Populated only when `global.debug` is set (`spec.md` §6): a
    /// best-effort textual dump of pipeline internals (parse tree shape,
    /// pass-by-pass IR), for troubleshooting rather than programmatic use.
    pub debug_trace: Vec<String>,
}

/// A recognized structured-comment hint (`spec.md` §4.1/§4.3): advisory,
/// never altering semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hint {
    pub key: String,
    pub value: String,
}

/// The query root (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub cube: CubeReference,
    pub measures: Vec<Measure>,
    pub dimensions: Vec<Dimension>,
    pub filters: Vec<Filter>,
    pub calculations: Vec<Calculation>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<Limit>,
    pub metadata: QueryMetadata,
}

impl Query {
    pub fn new(cube: CubeReference) -> Self {
        Self {
            cube,
            measures: Vec::new(),
            dimensions: Vec::new(),
            filters: Vec::new(),
            calculations: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            metadata: QueryMetadata::default(),
        }
    }

    pub fn find_measure(&self, name: &str) -> Option<&Measure> {
        self.measures
            .iter()
            .find(|m| m.display_name() == name || m.name == name)
    }

    pub fn find_calculation(&self, name: &str) -> Option<&Calculation> {
        self.calculations.iter().find(|c| c.name == name)
    }

    /// Runs the structural validator (`ir::validate`) and returns whether
    /// the query is well-formed; diagnostics are appended to `bag`
    /// regardless of outcome.
    pub fn validate(&self, bag: &mut DiagnosticBag) -> bool {
        validate::validate(self, bag)
    }
}
