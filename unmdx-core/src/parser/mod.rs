//! Recursive-descent MDX parser with precedence climbing for value and
//! logical expressions (`spec.md` §4.1, component C1).
//!
//! The climbing technique — a chain of `parse_X` methods, each deferring
//! to the next-tighter level until a primary is reached — is the shape of
//! the teacher's `semaflowrs/src/expr_parser.rs` `FormulaParser`
//! (`parse_expr` → `parse_term` → `parse_factor`), generalized here to
//! the full precedence ladder the grammar requires (XOR/OR/AND/NOT,
//! comparisons, BETWEEN/IN/IS, string concat, + -, * /, unary).
//!
//! The parser never panics on malformed input and never aborts through
//! its return type: every `parse_*` entry point always returns a (possibly
//! partial) tree, with problems recorded in the shared [`DiagnosticBag`].

pub mod ast;

use std::time::{Duration, Instant};

use crate::config::ParserConfig;
use crate::diagnostics::{suggestions, Diagnostic, DiagnosticBag, DiagnosticKind};
use crate::ir::Hint;
use crate::lexer::{tokenize, Token, TokenKind};
use crate::span::Span;

use ast::*;

/// Tokenizes and parses `text`, returning the parse tree (best-effort on
/// error) and the hints harvested by the lexer. All diagnostics —
/// lexical and syntactic — are appended to `bag`.
pub fn parse(text: &str, config: &ParserConfig, bag: &mut DiagnosticBag) -> (ParsedQuery, Vec<Hint>) {
    if let Some(max_chars) = config.max_input_chars {
        if text.chars().count() > max_chars {
            bag.push(Diagnostic::error(
                DiagnosticKind::InputTooLarge,
                format!("input exceeds configured limit of {} characters", max_chars),
            ));
            return (empty_query(), Vec::new());
        }
    }
    let (tokens, hints) = tokenize(text, bag);
    let mut parser = Parser::new(tokens, config, bag);
    let query = parser.parse_top();
    (query, hints)
}

fn empty_query() -> ParsedQuery {
    ParsedQuery {
        with_items: Vec::new(),
        axes: Vec::new(),
        cube: CubeSpec::Named {
            segments: Vec::new(),
            span: Span::synthetic(),
        },
        where_clause: None,
        span: Span::synthetic(),
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    config: &'a ParserConfig,
    bag: &'a mut DiagnosticBag,
    error_count: usize,
    aborted: bool,
    start: Instant,
    deadline: Option<Duration>,
    timed_out: bool,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Token>, config: &'a ParserConfig, bag: &'a mut DiagnosticBag) -> Self {
        let deadline = config.parse_timeout_ms.map(Duration::from_millis);
        Self {
            tokens,
            pos: 0,
            config,
            bag,
            error_count: 0,
            aborted: false,
            start: Instant::now(),
            deadline,
            timed_out: false,
        }
    }

    // -- token stream primitives -------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn should_stop(&mut self) -> bool {
        if self.aborted || self.timed_out || self.at_eof() {
            return true;
        }
        if let Some(deadline) = self.deadline {
            if self.pos % 64 == 0 && self.start.elapsed() > deadline {
                self.timed_out = true;
                self.push_error(
                    DiagnosticKind::ParseTimeout,
                    "parsing exceeded the configured time budget",
                    self.peek().span,
                    None,
                );
                return true;
            }
        }
        false
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn check_kw(&self, word: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(s) if s.eq_ignore_ascii_case(word))
    }

    fn check_kw_at(&self, offset: usize, word: &str) -> bool {
        matches!(&self.peek_at(offset).kind, TokenKind::Ident(s) if s.eq_ignore_ascii_case(word))
    }

    fn eat_kw(&mut self, word: &str) -> bool {
        if self.check_kw(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn push_error(
        &mut self,
        kind: DiagnosticKind,
        message: impl Into<String>,
        span: Span,
        suggestion: Option<&'static str>,
    ) {
        self.error_count += 1;
        let mut diag = Diagnostic::error(kind, message).with_span(span);
        if let Some(s) = suggestion {
            diag = diag.with_suggestion(s);
        }
        self.bag.push(diag);
        if self.error_count >= self.config.max_parse_errors {
            self.aborted = true;
        }
    }

    fn expect_kw(&mut self, word: &str) -> Span {
        if self.check_kw(word) {
            self.advance().span
        } else {
            let span = self.peek().span;
            self.push_error(
                DiagnosticKind::ParseError,
                format!("expected '{}'", word),
                span,
                None,
            );
            span
        }
    }

    fn expect_kind(&mut self, kind: TokenKind, message: &str, suggestion: Option<&'static str>) -> Span {
        if self.check(&kind) {
            self.advance().span
        } else {
            let span = self.peek().span;
            self.push_error(DiagnosticKind::ParseError, message, span, suggestion);
            span
        }
    }

    /// Skips forward to the next axis separator, WHERE, FROM, or EOF,
    /// consuming at least one token (`spec.md` §4.1/§8: "every recovery
    /// step consumes >= 1 token").
    fn recover(&mut self) {
        self.advance();
        while !self.at_eof()
            && !self.check(&TokenKind::Comma)
            && !self.check_kw("FROM")
            && !self.check_kw("WHERE")
            && !self.check_kw("SELECT")
        {
            self.advance();
        }
    }

    // -- top-level ------------------------------------------------------

    fn parse_top(&mut self) -> ParsedQuery {
        let start_span = self.peek().span;
        let mut with_items = Vec::new();

        if self.eat_kw("WITH") {
            while (self.check_kw("MEMBER") || self.check_kw("SET")) && !self.should_stop() {
                with_items.push(self.parse_with_item());
            }
        }

        if !self.check_kw("SELECT") {
            self.push_error(
                DiagnosticKind::ParseError,
                "expected SELECT",
                self.peek().span,
                None,
            );
        } else {
            self.advance();
        }

        let mut axes = Vec::new();
        if !self.should_stop() {
            axes.push(self.parse_axis_spec());
            while self.check(&TokenKind::Comma) && !self.should_stop() {
                self.advance();
                axes.push(self.parse_axis_spec());
            }
        }
        self.check_duplicate_axes(&axes);

        if !self.check_kw("FROM") {
            self.push_error(
                DiagnosticKind::ParseError,
                "expected FROM clause",
                self.peek().span,
                Some(suggestions::MISSING_FROM_CLAUSE),
            );
        } else {
            self.advance();
        }

        let cube = self.parse_cube_spec();

        let where_clause = if self.check_kw("WHERE") {
            Some(self.parse_where_clause())
        } else {
            None
        };

        let end_span = self.tokens[self.pos.saturating_sub(1).min(self.tokens.len() - 1)].span;
        ParsedQuery {
            with_items,
            axes,
            cube,
            where_clause,
            span: start_span.merge(end_span),
        }
    }

    fn check_duplicate_axes(&mut self, axes: &[AxisSpec]) {
        let mut seen = std::collections::HashSet::new();
        for axis in axes {
            if !seen.insert(axis.axis_id) {
                self.push_error(
                    DiagnosticKind::ParseError,
                    "duplicate axis id in SELECT list",
                    axis.span,
                    Some(suggestions::DUPLICATE_AXIS),
                );
            }
        }
    }

    fn parse_with_item(&mut self) -> WithItem {
        let start = self.peek().span;
        if self.eat_kw("MEMBER") {
            let path = self.parse_member_path();
            self.expect_kw("AS");
            let expr = self.parse_expr();
            let mut format = None;
            if self.check(&TokenKind::Comma) && self.check_kw_at(1, "FORMAT_STRING") {
                self.advance();
                self.advance();
                self.expect_kind(TokenKind::Eq, "expected '=' after FORMAT_STRING", None);
                if let TokenKind::StringLit(s) = self.peek().kind.clone() {
                    self.advance();
                    format = Some(s);
                }
            }
            let end = self.tokens[self.pos.saturating_sub(1)].span;
            WithItem::Member {
                path,
                expr,
                format,
                span: start.merge(end),
            }
        } else {
            self.advance(); // "SET"
            let alias = self.parse_member_path();
            self.expect_kw("AS");
            let expr = self.parse_set_expr();
            let end = expr.span();
            WithItem::Set {
                alias,
                expr,
                span: start.merge(end),
            }
        }
    }

    fn parse_axis_spec(&mut self) -> AxisSpec {
        let start = self.peek().span;
        let mut non_empty = false;
        if self.eat_kw("NON") {
            self.expect_kw("EMPTY");
            non_empty = true;
        }
        let set = self.parse_set_expr();
        self.expect_kw("ON");
        let axis_id = self.parse_axis_id();
        let end = self.tokens[self.pos.saturating_sub(1)].span;
        AxisSpec {
            non_empty,
            set,
            axis_id,
            span: start.merge(end),
        }
    }

    fn parse_axis_id(&mut self) -> AxisId {
        if let TokenKind::Number(n) = self.peek().kind {
            self.advance();
            return AxisId::Index(n as u32);
        }
        for (word, id) in [
            ("COLUMNS", AxisId::Columns),
            ("ROWS", AxisId::Rows),
            ("PAGES", AxisId::Pages),
            ("CHAPTERS", AxisId::Chapters),
            ("SECTIONS", AxisId::Sections),
        ] {
            if self.check_kw(word) {
                self.advance();
                return id;
            }
        }
        if self.eat_kw("AXIS") {
            self.expect_kind(TokenKind::LParen, "expected '(' after AXIS", None);
            let n = if let TokenKind::Number(n) = self.peek().kind {
                self.advance();
                n as u32
            } else {
                self.push_error(DiagnosticKind::ParseError, "expected axis number", self.peek().span, None);
                0
            };
            self.expect_kind(TokenKind::RParen, "expected ')' to close AXIS(...)", None);
            return AxisId::Index(n);
        }
        self.push_error(
            DiagnosticKind::ParseError,
            "expected an axis identifier (COLUMNS, ROWS, a number, or AXIS(n))",
            self.peek().span,
            Some(suggestions::EXPECTED_ON_AXIS),
        );
        AxisId::Columns
    }

    fn parse_cube_spec(&mut self) -> CubeSpec {
        let start = self.peek().span;
        if self.check(&TokenKind::LParen) {
            self.advance();
            self.bag.push(Diagnostic::warning(
                DiagnosticKind::UnsupportedConstruct,
                "a parenthesized sub-select as a cube spec is outside the supported subset",
            ).with_span(start));
            let inner = self.parse_top();
            let end = self.expect_kind(TokenKind::RParen, "expected ')' to close sub-select", None);
            return CubeSpec::SubSelect {
                query: Box::new(inner),
                span: start.merge(end),
            };
        }
        let mut segments = vec![self.parse_bracket_or_ident_text()];
        while self.check(&TokenKind::Dot) {
            self.advance();
            segments.push(self.parse_bracket_or_ident_text());
        }
        let end = self.tokens[self.pos.saturating_sub(1)].span;
        CubeSpec::Named {
            segments,
            span: start.merge(end),
        }
    }

    fn parse_bracket_or_ident_text(&mut self) -> String {
        match self.peek().kind.clone() {
            TokenKind::BracketedIdent(s) => {
                self.advance();
                s
            }
            TokenKind::Ident(s) => {
                self.advance();
                s
            }
            _ => {
                self.push_error(
                    DiagnosticKind::ParseError,
                    "expected an identifier",
                    self.peek().span,
                    None,
                );
                String::new()
            }
        }
    }

    // -- WHERE ------------------------------------------------------

    fn parse_where_clause(&mut self) -> WhereClause {
        let start = self.expect_kw("WHERE");
        if self.check(&TokenKind::LParen) && matches!(self.peek_at(1).kind, TokenKind::RParen) {
            self.advance();
            let end = self.advance().span;
            return WhereClause::Empty { span: start.merge(end) };
        }

        if self.check(&TokenKind::LParen) {
            let checkpoint = self.pos;
            if let Some((members, span)) = self.try_parse_tuple() {
                return WhereClause::Tuple { members, span: start.merge(span) };
            }
            self.pos = checkpoint;
        }

        let checkpoint = self.pos;
        if matches!(self.peek().kind, TokenKind::BracketedIdent(_) | TokenKind::Ident(_)) {
            let member = self.parse_member_path();
            if self.at_eof() {
                return WhereClause::Member {
                    span: start.merge(member.span),
                    path: member,
                };
            }
            self.pos = checkpoint;
        }

        let expr = self.parse_expr();
        WhereClause::Logical {
            span: start.merge(expr.span()),
            expr,
        }
    }

    /// Attempts to parse `(member, member, ...)` as a whole, failing (and
    /// leaving the caller to restore `self.pos`) unless the parenthesized
    /// content is exclusively a comma-separated member list followed
    /// immediately by end of input.
    fn try_parse_tuple(&mut self) -> Option<(Vec<MemberPath>, Span)> {
        let start = self.peek().span;
        if !self.check(&TokenKind::LParen) {
            return None;
        }
        self.advance();
        let mut members = Vec::new();
        loop {
            if !matches!(self.peek().kind, TokenKind::BracketedIdent(_) | TokenKind::Ident(_)) {
                return None;
            }
            let before_errors = self.error_count;
            let member = self.parse_member_path();
            if self.error_count != before_errors {
                return None;
            }
            members.push(member);
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        if !self.check(&TokenKind::RParen) {
            return None;
        }
        let end = self.advance().span;
        if !self.at_eof() {
            return None;
        }
        Some((members, start.merge(end)))
    }

    // -- member paths -----------------------------------------------

    fn parse_member_path(&mut self) -> MemberPath {
        let start = self.peek().span;
        let mut segments = vec![self.parse_bracket_or_ident_text()];
        let mut suffix = None;
        let mut key = None;

        loop {
            if !self.check(&TokenKind::Dot) {
                break;
            }
            if matches!(self.peek_at(1).kind, TokenKind::Amp) {
                self.advance(); // dot
                self.advance(); // amp
                key = Some(self.parse_bracket_or_ident_text());
                break;
            }
            if let TokenKind::Ident(word) = &self.peek_at(1).kind {
                if let Some(s) = suffix_from_keyword(word) {
                    self.advance(); // dot
                    self.advance(); // keyword
                    suffix = Some(self.finish_suffix(s));
                    break;
                }
            }
            self.advance(); // dot
            segments.push(self.parse_bracket_or_ident_text());
        }

        let end = self.tokens[self.pos.saturating_sub(1)].span;
        MemberPath {
            segments,
            suffix,
            key,
            span: start.merge(end),
        }
    }

    fn finish_suffix(&mut self, suffix: MemberSuffix) -> MemberSuffix {
        match suffix {
            MemberSuffix::Lead(_) | MemberSuffix::Lag(_) => {
                self.expect_kind(TokenKind::LParen, "expected '(' after Lead/Lag", None);
                let n = if let TokenKind::Number(n) = self.peek().kind {
                    self.advance();
                    n as i64
                } else {
                    0
                };
                self.expect_kind(TokenKind::RParen, "expected ')' to close Lead/Lag", None);
                if matches!(suffix, MemberSuffix::Lead(_)) {
                    MemberSuffix::Lead(n)
                } else {
                    MemberSuffix::Lag(n)
                }
            }
            other => other,
        }
    }

    // -- set expressions ----------------------------------------------

    fn parse_set_expr(&mut self) -> SetExpr {
        self.parse_set_union()
    }

    fn parse_set_union(&mut self) -> SetExpr {
        let mut left = self.parse_set_crossjoin();
        while self.check(&TokenKind::Plus) {
            self.advance();
            let right = self.parse_set_crossjoin();
            let span = left.span().merge(right.span());
            left = SetExpr::BinaryOp {
                op: SetOp::Union,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        left
    }

    fn parse_set_crossjoin(&mut self) -> SetExpr {
        let mut left = self.parse_set_primary();
        while self.check(&TokenKind::Star) {
            self.advance();
            let right = self.parse_set_primary();
            let span = left.span().merge(right.span());
            left = SetExpr::BinaryOp {
                op: SetOp::CrossJoin,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        left
    }

    fn parse_set_primary(&mut self) -> SetExpr {
        let start = self.peek().span;
        if self.check(&TokenKind::LBrace) {
            self.advance();
            let mut items = Vec::new();
            if !self.check(&TokenKind::RBrace) {
                items.push(self.parse_set_element());
                while self.check(&TokenKind::Comma) {
                    self.advance();
                    items.push(self.parse_set_element());
                }
            }
            let end = self.expect_kind(
                TokenKind::RBrace,
                "expected '}' to close set",
                Some(suggestions::UNBALANCED_BRACES),
            );
            return SetExpr::Braces {
                items,
                span: start.merge(end),
            };
        }
        if self.check(&TokenKind::LParen) {
            self.advance();
            let inner = self.parse_set_expr();
            let end = self.expect_kind(
                TokenKind::RParen,
                "expected ')'",
                Some(suggestions::UNBALANCED_PARENS),
            );
            return SetExpr::Paren {
                inner: Box::new(inner),
                span: start.merge(end),
            };
        }
        if matches!(self.peek().kind, TokenKind::Ident(_) | TokenKind::BracketedIdent(_))
            && matches!(self.peek_at(1).kind, TokenKind::LParen)
        {
            return self.parse_set_function_call();
        }
        SetExpr::Member(self.parse_member_path())
    }

    fn parse_set_function_call(&mut self) -> SetExpr {
        let start = self.peek().span;
        let name = self.parse_bracket_or_ident_text();
        self.expect_kind(TokenKind::LParen, "expected '(' after function name", None);
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            args.push(self.parse_set_function_arg());
            while self.check(&TokenKind::Comma) {
                self.advance();
                args.push(self.parse_set_function_arg());
            }
        }
        let end = self.expect_kind(TokenKind::RParen, "expected ')' to close function call", None);
        SetExpr::FunctionCall {
            name,
            args,
            span: start.merge(end),
        }
    }

    fn parse_set_function_arg(&mut self) -> SetFunctionArg {
        if self.check(&TokenKind::LBrace) {
            return SetFunctionArg::Set(self.parse_set_expr());
        }
        if let TokenKind::Ident(word) = self.peek().kind.clone() {
            if is_bare_keyword_arg(&word) {
                self.advance();
                return SetFunctionArg::Keyword(word.to_ascii_uppercase());
            }
            if is_set_valued_function_name(&word) && matches!(self.peek_at(1).kind, TokenKind::LParen) {
                return SetFunctionArg::Set(self.parse_set_function_call());
            }
        }
        SetFunctionArg::Expr(self.parse_expr())
    }

    fn parse_set_element(&mut self) -> SetElement {
        if self.check(&TokenKind::LBrace)
            || (matches!(self.peek().kind, TokenKind::Ident(_) | TokenKind::BracketedIdent(_))
                && matches!(self.peek_at(1).kind, TokenKind::LParen))
        {
            return SetElement::Set(self.parse_set_expr());
        }
        if self.check(&TokenKind::LParen) {
            let start = self.peek().span;
            self.advance();
            let mut members = Vec::new();
            if !self.check(&TokenKind::RParen) {
                members.push(self.parse_member_path());
                while self.check(&TokenKind::Comma) {
                    self.advance();
                    members.push(self.parse_member_path());
                }
            }
            let end = self.expect_kind(TokenKind::RParen, "expected ')' to close tuple", None);
            return SetElement::Tuple {
                members,
                span: start.merge(end),
            };
        }
        let member = self.parse_member_path();
        if self.check(&TokenKind::Colon) {
            self.advance();
            let to = self.parse_member_path();
            let span = member.span.merge(to.span);
            SetElement::Range { from: member, to, span }
        } else {
            SetElement::Member(member)
        }
    }

    // -- value / logical expressions ----------------------------------

    fn parse_expr(&mut self) -> Expr {
        self.parse_xor()
    }

    fn parse_xor(&mut self) -> Expr {
        let mut left = self.parse_or();
        while self.check_kw("XOR") {
            self.advance();
            let right = self.parse_or();
            let span = left.span().merge(right.span());
            left = Expr::Bool { op: BoolOp::Xor, left: Box::new(left), right: Box::new(right), span };
        }
        left
    }

    fn parse_or(&mut self) -> Expr {
        let mut left = self.parse_and();
        while self.check_kw("OR") {
            self.advance();
            let right = self.parse_and();
            let span = left.span().merge(right.span());
            left = Expr::Bool { op: BoolOp::Or, left: Box::new(left), right: Box::new(right), span };
        }
        left
    }

    fn parse_and(&mut self) -> Expr {
        let mut left = self.parse_not();
        while self.check_kw("AND") {
            self.advance();
            let right = self.parse_not();
            let span = left.span().merge(right.span());
            left = Expr::Bool { op: BoolOp::And, left: Box::new(left), right: Box::new(right), span };
        }
        left
    }

    fn parse_not(&mut self) -> Expr {
        if self.check_kw("NOT") {
            let start = self.advance().span;
            let operand = self.parse_not();
            let span = start.merge(operand.span());
            return Expr::Not { operand: Box::new(operand), span };
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Expr {
        let left = self.parse_concat();

        if self.check_kw("BETWEEN") {
            self.advance();
            let low = self.parse_concat();
            self.expect_kw("AND");
            let high = self.parse_concat();
            let span = left.span().merge(high.span());
            return Expr::Between { operand: Box::new(left), low: Box::new(low), high: Box::new(high), span };
        }
        if self.check_kw("IN") {
            self.advance();
            let brace_start = self.expect_kind(TokenKind::LBrace, "expected '{' after IN", None);
            let mut set = Vec::new();
            if !self.check(&TokenKind::RBrace) {
                set.push(self.parse_expr());
                while self.check(&TokenKind::Comma) {
                    self.advance();
                    set.push(self.parse_expr());
                }
            }
            let end = self.expect_kind(TokenKind::RBrace, "expected '}' to close IN set", Some(suggestions::UNBALANCED_BRACES));
            let _ = brace_start;
            let span = left.span().merge(end);
            return Expr::In { operand: Box::new(left), set, span };
        }
        if self.check_kw("IS") {
            self.advance();
            let predicate = if self.eat_kw("NULL") {
                IsPredicate::Null
            } else if self.eat_kw("EMPTY") {
                IsPredicate::Empty
            } else if self.eat_kw("LEAF") {
                IsPredicate::Leaf
            } else if self.eat_kw("DATAMEMBER") {
                IsPredicate::DataMember
            } else {
                self.push_error(
                    DiagnosticKind::ParseError,
                    "expected NULL, EMPTY, LEAF, or DATAMEMBER after IS",
                    self.peek().span,
                    None,
                );
                IsPredicate::Null
            };
            let end = self.tokens[self.pos.saturating_sub(1)].span;
            let span = left.span().merge(end);
            return Expr::Is { operand: Box::new(left), predicate, span };
        }

        let op = match &self.peek().kind {
            TokenKind::Eq => Some(CmpOp::Eq),
            TokenKind::Neq => Some(CmpOp::Neq),
            TokenKind::Lt => Some(CmpOp::Lt),
            TokenKind::Gt => Some(CmpOp::Gt),
            TokenKind::Lte => Some(CmpOp::Lte),
            TokenKind::Gte => Some(CmpOp::Gte),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let right = self.parse_concat();
            let span = left.span().merge(right.span());
            return Expr::Comparison { op, left: Box::new(left), right: Box::new(right), span };
        }
        left
    }

    fn parse_concat(&mut self) -> Expr {
        let mut left = self.parse_additive();
        while self.check(&TokenKind::Amp) {
            self.advance();
            let right = self.parse_additive();
            let span = left.span().merge(right.span());
            left = Expr::Arith { op: ArithOp::Concat, left: Box::new(left), right: Box::new(right), span };
        }
        left
    }

    fn parse_additive(&mut self) -> Expr {
        let mut left = self.parse_multiplicative();
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => ArithOp::Add,
                TokenKind::Minus => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative();
            let span = left.span().merge(right.span());
            left = Expr::Arith { op, left: Box::new(left), right: Box::new(right), span };
        }
        left
    }

    fn parse_multiplicative(&mut self) -> Expr {
        let mut left = self.parse_unary();
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => ArithOp::Mul,
                TokenKind::Slash => ArithOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary();
            let span = left.span().merge(right.span());
            left = Expr::Arith { op, left: Box::new(left), right: Box::new(right), span };
        }
        left
    }

    fn parse_unary(&mut self) -> Expr {
        let op = match self.peek().kind {
            TokenKind::Minus => Some(ArithOp::Sub),
            TokenKind::Plus => Some(ArithOp::Add),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.advance().span;
            let operand = self.parse_unary();
            let span = start.merge(operand.span());
            return Expr::Unary { op, operand: Box::new(operand), span };
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Expr {
        let start = self.peek().span;
        if let TokenKind::Number(n) = self.peek().kind {
            self.advance();
            return Expr::Literal { value: Literal::Number(n), span: start };
        }
        if let TokenKind::StringLit(s) = self.peek().kind.clone() {
            self.advance();
            return Expr::Literal { value: Literal::String(s), span: start };
        }
        if self.check(&TokenKind::LParen) {
            self.advance();
            let inner = self.parse_expr();
            let end = self.expect_kind(TokenKind::RParen, "expected ')'", Some(suggestions::UNBALANCED_PARENS));
            return Expr::Paren { inner: Box::new(inner), span: start.merge(end) };
        }
        if self.check_kw("IIF") {
            return self.parse_iif();
        }
        if self.check_kw("CASE") {
            return self.parse_case();
        }
        if matches!(self.peek().kind, TokenKind::Ident(_) | TokenKind::BracketedIdent(_))
            && matches!(self.peek_at(1).kind, TokenKind::LParen)
        {
            let name = self.parse_bracket_or_ident_text();
            self.advance(); // '('
            let mut args = Vec::new();
            if !self.check(&TokenKind::RParen) {
                args.push(self.parse_expr());
                while self.check(&TokenKind::Comma) {
                    self.advance();
                    args.push(self.parse_expr());
                }
            }
            let end = self.expect_kind(TokenKind::RParen, "expected ')' to close function call", None);
            return Expr::FunctionCall { name, args, span: start.merge(end) };
        }
        if matches!(self.peek().kind, TokenKind::Ident(_) | TokenKind::BracketedIdent(_)) {
            let member = self.parse_member_path();
            return Expr::Member(member);
        }
        self.push_error(
            DiagnosticKind::ParseError,
            format!("unexpected token in expression: {:?}", self.peek().kind),
            start,
            None,
        );
        self.recover();
        Expr::Literal { value: Literal::Number(0.0), span: start }
    }

    fn parse_iif(&mut self) -> Expr {
        let start = self.advance().span; // "IIF"
        self.expect_kind(TokenKind::LParen, "expected '(' after IIF", None);
        let cond = self.parse_expr();
        self.expect_kind(TokenKind::Comma, "expected ',' after IIF condition", None);
        let then = self.parse_expr();
        self.expect_kind(TokenKind::Comma, "expected ',' after IIF then-branch", None);
        let else_branch = self.parse_expr();
        let end = self.expect_kind(TokenKind::RParen, "expected ')' to close IIF", None);
        Expr::Iif {
            cond: Box::new(cond),
            then: Box::new(then),
            else_branch: Box::new(else_branch),
            span: start.merge(end),
        }
    }

    fn parse_case(&mut self) -> Expr {
        let start = self.advance().span; // "CASE"
        let operand = if self.check_kw("WHEN") {
            None
        } else {
            Some(Box::new(self.parse_expr()))
        };
        let mut when_then = Vec::new();
        while self.eat_kw("WHEN") {
            let when = self.parse_expr();
            self.expect_kw("THEN");
            let then = self.parse_expr();
            when_then.push((when, then));
        }
        let else_branch = if self.eat_kw("ELSE") {
            Some(Box::new(self.parse_expr()))
        } else {
            None
        };
        let end = self.expect_kw("END");
        Expr::Case {
            operand,
            when_then,
            else_branch,
            span: start.merge(end),
        }
    }
}

fn suffix_from_keyword(word: &str) -> Option<MemberSuffix> {
    let upper = word.to_ascii_uppercase();
    match upper.as_str() {
        "MEMBERS" => Some(MemberSuffix::Members),
        "CHILDREN" => Some(MemberSuffix::Children),
        "PARENT" => Some(MemberSuffix::Parent),
        "FIRSTCHILD" | "FIRST_CHILD" => Some(MemberSuffix::FirstChild),
        "LASTCHILD" | "LAST_CHILD" => Some(MemberSuffix::LastChild),
        "LEAD" => Some(MemberSuffix::Lead(0)),
        "LAG" => Some(MemberSuffix::Lag(0)),
        _ => None,
    }
}

fn is_set_valued_function_name(word: &str) -> bool {
    matches!(
        word.to_ascii_uppercase().as_str(),
        "CROSSJOIN" | "DESCENDANTS" | "ORDER" | "TOPCOUNT" | "BOTTOMCOUNT" | "UNION" | "EXCEPT" | "FILTER" | "DISTINCT" | "GENERATE" | "HIERARCHIZE"
    )
}

fn is_bare_keyword_arg(word: &str) -> bool {
    matches!(
        word.to_ascii_uppercase().as_str(),
        "ASC" | "DESC" | "BASC" | "BDESC"
            | "SELF" | "AFTER" | "BEFORE"
            | "SELF_AND_AFTER" | "SELF_AND_BEFORE" | "LEAVES" | "SELF_BEFORE_AFTER"
            | "RECURSIVE"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;

    fn parse_text(text: &str) -> (ParsedQuery, DiagnosticBag) {
        let cfg = ParserConfig::default();
        let mut bag = DiagnosticBag::new();
        let (query, _hints) = parse(text, &cfg, &mut bag);
        (query, bag)
    }

    #[test]
    fn simple_measure_query() {
        let (q, bag) = parse_text("SELECT {[Measures].[Sales Amount]} ON 0 FROM [Adventure Works]");
        assert!(!bag.has_errors());
        assert_eq!(q.axes.len(), 1);
        assert_eq!(q.axes[0].axis_id, AxisId::Index(0));
        match &q.cube {
            CubeSpec::Named { segments, .. } => assert_eq!(segments, &vec!["Adventure Works".to_string()]),
            _ => panic!("expected named cube"),
        }
    }

    #[test]
    fn messy_spacing_still_parses() {
        let (q, bag) = parse_text(
            "SELECT{[Measures].[Sales Amount]}ON COLUMNS,\n     {[Product].[Category].Members}    ON    ROWS\nFROM    [Adventure Works]",
        );
        assert!(!bag.has_errors());
        assert_eq!(q.axes.len(), 2);
        assert_eq!(q.axes[1].axis_id, AxisId::Rows);
    }

    #[test]
    fn where_tuple_with_key_ref() {
        let (q, bag) = parse_text(
            "SELECT {[Measures].[Sales Amount]} ON 0,\n{[Geography].[Country].Members} ON 1\nFROM [Adventure Works]\nWHERE ([Date].[Calendar Year].&[2023])",
        );
        assert!(!bag.has_errors());
        match q.where_clause {
            Some(WhereClause::Tuple { ref members, .. }) => {
                assert_eq!(members.len(), 1);
                assert_eq!(members[0].key.as_deref(), Some("2023"));
            }
            other => panic!("expected tuple where clause, got {:?}", other),
        }
    }

    #[test]
    fn with_member_calculation() {
        let (q, bag) = parse_text(
            "WITH MEMBER [Measures].[Average Price] AS\n  [Measures].[Sales Amount] / [Measures].[Order Quantity]\nSELECT {[Measures].[Sales Amount],[Measures].[Order Quantity],[Measures].[Average Price]} ON 0\nFROM [Adventure Works]",
        );
        assert!(!bag.has_errors());
        assert_eq!(q.with_items.len(), 1);
        match &q.with_items[0] {
            WithItem::Member { expr, .. } => assert!(matches!(expr, Expr::Arith { op: ArithOp::Div, .. })),
            _ => panic!("expected MEMBER item"),
        }
    }

    #[test]
    fn non_empty_and_nested_braces() {
        let (q, bag) = parse_text(
            "SELECT NON EMPTY {{[Measures].[Sales Amount]}} ON 0, NON EMPTY {{{[Product].[Category].Members}}} ON 1 FROM [Adventure Works]",
        );
        assert!(!bag.has_errors());
        assert!(q.axes[0].non_empty);
        assert!(q.axes[1].non_empty);
    }

    #[test]
    fn unbalanced_bracket_recovers() {
        let (_q, bag) = parse_text("SELECT {[Measures].[Sales Amount} ON 0 FROM [Adventure Works]");
        assert!(bag.has_errors());
    }

    #[test]
    fn descendants_function_call() {
        let (q, bag) = parse_text(
            "SELECT {[Measures].[Sales Amount]} ON 0, {DESCENDANTS([Geography].[Country].[USA], [Geography].[City], SELF)} ON 1 FROM [Adventure Works]",
        );
        assert!(!bag.has_errors());
        let SetExpr::Braces { items, .. } = &q.axes[1].set else { panic!() };
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn crossjoin_infix_star() {
        let (q, bag) = parse_text(
            "SELECT {[Measures].[Sales Amount]} ON 0, {[Product].[Category].Members} * {[Geography].[Country].Members} ON 1 FROM [Adventure Works]",
        );
        assert!(!bag.has_errors());
        assert!(matches!(q.axes[1].set, SetExpr::BinaryOp { op: SetOp::CrossJoin, .. }));
    }

    #[test]
    fn duplicate_axis_is_an_error() {
        let (_q, bag) = parse_text(
            "SELECT {[Measures].[Sales Amount]} ON 0, {[Measures].[Order Quantity]} ON 0 FROM [Adventure Works]",
        );
        assert!(bag.has_errors());
    }
}
