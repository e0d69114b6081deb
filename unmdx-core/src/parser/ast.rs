//! The concrete MDX parse tree (`spec.md` §3 "Lifecycles": "the lowerer
//! owns it exclusively and drops it before returning").
//!
//! Shapes mirror the grammar in `spec.md` §4.1 directly rather than any
//! pre-existing AST in the pack — MDX's grammar has no close analog in
//! `semaflowrs`, whose `expr_parser.rs` only parses scalar formula
//! fragments. The precedence-climbing *technique* is grounded there; the
//! node shapes are new, following the grammar productions one for one.

use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub with_items: Vec<WithItem>,
    pub axes: Vec<AxisSpec>,
    pub cube: CubeSpec,
    pub where_clause: Option<WhereClause>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WithItem {
    Member {
        path: MemberPath,
        expr: Expr,
        format: Option<String>,
        span: Span,
    },
    Set {
        alias: MemberPath,
        expr: SetExpr,
        span: Span,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisId {
    Columns,
    Rows,
    Pages,
    Chapters,
    Sections,
    Index(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisSpec {
    pub non_empty: bool,
    pub set: SetExpr,
    pub axis_id: AxisId,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CubeSpec {
    Named { segments: Vec<String>, span: Span },
    /// A parenthesized sub-select used as a cube spec. `spec.md`'s grammar
    /// admits the production but the rest of this crate treats it as
    /// outside the supported subset (`unsupported_construct`).
    SubSelect { query: Box<ParsedQuery>, span: Span },
}

impl CubeSpec {
    pub fn span(&self) -> Span {
        match self {
            CubeSpec::Named { span, .. } => *span,
            CubeSpec::SubSelect { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
    Empty { span: Span },
    Tuple { members: Vec<MemberPath>, span: Span },
    Member { path: MemberPath, span: Span },
    Logical { expr: Expr, span: Span },
}

/// A dot-separated member reference: `[Product].[Category].[Bikes]`
/// becomes `segments = ["Product", "Category", "Bikes"]`. `suffix` and
/// `key` capture a trailing `.Members`/`.Children`/... or `.&[key]`.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberPath {
    pub segments: Vec<String>,
    pub suffix: Option<MemberSuffix>,
    pub key: Option<String>,
    pub span: Span,
}

impl MemberPath {
    pub fn is_measures_reference(&self) -> bool {
        self.segments
            .first()
            .is_some_and(|s| s.eq_ignore_ascii_case("measures"))
    }

    /// The leaf segment — the measure or member name proper.
    pub fn leaf(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberSuffix {
    Members,
    Children,
    Parent,
    FirstChild,
    LastChild,
    Lead(i64),
    Lag(i64),
}

/// Set expressions (`spec.md` §4.1 `set_expr`).
#[derive(Debug, Clone, PartialEq)]
pub enum SetExpr {
    Braces { items: Vec<SetElement>, span: Span },
    FunctionCall {
        name: String,
        args: Vec<SetFunctionArg>,
        span: Span,
    },
    Member(MemberPath),
    /// `set_expr set_op set_expr`: MDX's infix CrossJoin (`*`) or set
    /// union (`+`), flattened downstream the same way `CROSSJOIN(...)` is.
    BinaryOp {
        op: SetOp,
        left: Box<SetExpr>,
        right: Box<SetExpr>,
        span: Span,
    },
    Paren { inner: Box<SetExpr>, span: Span },
}

impl SetExpr {
    pub fn span(&self) -> Span {
        match self {
            SetExpr::Braces { span, .. }
            | SetExpr::FunctionCall { span, .. }
            | SetExpr::BinaryOp { span, .. }
            | SetExpr::Paren { span, .. } => *span,
            SetExpr::Member(m) => m.span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    CrossJoin,
    Union,
}

/// An argument to a set-valued function call: most take sets, but
/// `DESCENDANTS`'s flag and `ORDER`'s direction take a bare keyword, and
/// `TOPCOUNT`'s count / `ORDER`'s sort key take a scalar/member
/// expression.
#[derive(Debug, Clone, PartialEq)]
pub enum SetFunctionArg {
    Set(SetExpr),
    Keyword(String),
    Expr(Expr),
}

/// An element inside `{ ... }`: a nested set, a tuple, a bare member, or
/// an explicit range `a:b`.
#[derive(Debug, Clone, PartialEq)]
pub enum SetElement {
    Set(SetExpr),
    Tuple { members: Vec<MemberPath>, span: Span },
    Member(MemberPath),
    Range {
        from: MemberPath,
        to: MemberPath,
        span: Span,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
}

/// Unified value/logical expression tree (`spec.md` §4.1 "Value
/// expressions" and "Logical expressions"): MDX mixes the two freely
/// inside `WHERE`, so one precedence-climbing grammar covers both rather
/// than splitting value and predicate parsers.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal { value: Literal, span: Span },
    Member(MemberPath),
    FunctionCall {
        name: String,
        args: Vec<Expr>,
        span: Span,
    },
    Unary {
        op: ArithOp,
        operand: Box<Expr>,
        span: Span,
    },
    Not {
        operand: Box<Expr>,
        span: Span,
    },
    Arith {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Comparison {
        op: CmpOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Bool {
        op: BoolOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Between {
        operand: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        span: Span,
    },
    In {
        operand: Box<Expr>,
        set: Vec<Expr>,
        span: Span,
    },
    Is {
        operand: Box<Expr>,
        predicate: IsPredicate,
        span: Span,
    },
    Iif {
        cond: Box<Expr>,
        then: Box<Expr>,
        else_branch: Box<Expr>,
        span: Span,
    },
    Case {
        operand: Option<Box<Expr>>,
        when_then: Vec<(Expr, Expr)>,
        else_branch: Option<Box<Expr>>,
        span: Span,
    },
    Paren { inner: Box<Expr>, span: Span },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsPredicate {
    Null,
    Empty,
    Leaf,
    DataMember,
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal { span, .. }
            | Expr::FunctionCall { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Not { span, .. }
            | Expr::Arith { span, .. }
            | Expr::Comparison { span, .. }
            | Expr::Bool { span, .. }
            | Expr::Between { span, .. }
            | Expr::In { span, .. }
            | Expr::Is { span, .. }
            | Expr::Iif { span, .. }
            | Expr::Case { span, .. }
            | Expr::Paren { span, .. } => *span,
            Expr::Member(m) => m.span,
        }
    }
}
