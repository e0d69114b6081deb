//! MDX tokenizer and structured-comment hint scanner (`spec.md` §4.1,
//! component C1).
//!
//! Hand-rolled, char-at-a-time, in the shape of the teacher's
//! `semaflowrs/src/expr_parser.rs` `Lexer` (`peek_char`/`advance`/
//! `read_ident`/`read_number`/`read_string`), generalized from formula
//! fragments to whole MDX statements: bracketed identifiers, set braces,
//! line/block comments, and the `/* KEY: value */` structured hint syntax
//! (`spec.md` §4.1/§4.3) layered on top of block comments.

pub mod token;

use crate::diagnostics::{suggestions, Diagnostic, DiagnosticBag, DiagnosticKind};
use crate::ir::Hint;
use crate::span::Span;

pub use token::{Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn here(&self) -> (usize, u32, u32) {
        (self.pos, self.line, self.column)
    }

    fn span_from(&self, start: (usize, u32, u32)) -> Span {
        Span::new(start.0, self.pos, start.1, start.2)
    }

    /// Skips whitespace and comments, recording any recognized `/* KEY:
    /// value */` hints encountered along the way.
    fn skip_trivia(&mut self, hints: &mut Vec<Hint>, bag: &mut DiagnosticBag) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_char_at(1) == Some('/') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_char_at(1) == Some('*') => {
                    self.read_block_comment(hints, bag);
                }
                Some('-') if self.peek_char_at(1) == Some('-') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_block_comment(&mut self, hints: &mut Vec<Hint>, bag: &mut DiagnosticBag) {
        let start = self.here();
        self.advance(); // '/'
        self.advance(); // '*'
        let body_start = self.pos;
        loop {
            match self.peek_char() {
                None => {
                    bag.push(
                        Diagnostic::error(DiagnosticKind::ParseError, "unterminated block comment")
                            .with_span(self.span_from(start)),
                    );
                    return;
                }
                Some('*') if self.peek_char_at(1) == Some('/') => {
                    let body = self.input[body_start..self.pos].trim().to_string();
                    self.advance();
                    self.advance();
                    if let Some((key, value)) = body.split_once(':') {
                        let key = key.trim();
                        if is_recognized_hint_key(key) {
                            hints.push(Hint {
                                key: key.to_string(),
                                value: value.trim().to_string(),
                            });
                        }
                    }
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn read_bracketed_ident(&mut self, bag: &mut DiagnosticBag) -> Option<Token> {
        let start = self.here();
        self.advance(); // '['
        let body_start = self.pos;
        loop {
            match self.peek_char() {
                None => {
                    bag.push(
                        Diagnostic::error(DiagnosticKind::ParseError, "unterminated bracketed identifier")
                            .with_span(self.span_from(start))
                            .with_suggestion(suggestions::UNBALANCED_BRACKETS),
                    );
                    return None;
                }
                // `]]` inside brackets is an escaped literal `]`.
                Some(']') if self.peek_char_at(1) == Some(']') => {
                    self.advance();
                    self.advance();
                }
                Some(']') => {
                    let raw = &self.input[body_start..self.pos];
                    let text = raw.replace("]]", "]");
                    self.advance();
                    return Some(Token::new(TokenKind::BracketedIdent(text), self.span_from(start)));
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn read_ident(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn read_number(&mut self, bag: &mut DiagnosticBag, start: (usize, u32, u32)) -> Option<Token> {
        let text_start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        if self.peek_char() == Some('.') && self.peek_char_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let save = self.pos;
            self.advance();
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.advance();
            }
            if self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_digit() {
                        self.advance();
                    } else {
                        break;
                    }
                }
            } else {
                self.pos = save;
            }
        }
        let text = &self.input[text_start..self.pos];
        match text.parse::<f64>() {
            Ok(value) => Some(Token::new(TokenKind::Number(value), self.span_from(start))),
            Err(_) => {
                bag.push(
                    Diagnostic::error(DiagnosticKind::ParseError, format!("invalid numeric literal '{}'", text))
                        .with_span(self.span_from(start)),
                );
                None
            }
        }
    }

    /// Reads a string literal delimited by `quote` (`'` or `"`, `spec.md`
    /// §4.1: "string literals in both `"…"` and `'…'` forms"). A doubled
    /// delimiter inside the string is an escaped literal quote.
    fn read_string(&mut self, quote: char, bag: &mut DiagnosticBag, start: (usize, u32, u32)) -> Option<Token> {
        self.advance(); // opening quote
        let body_start = self.pos;
        loop {
            match self.peek_char() {
                None => {
                    bag.push(
                        Diagnostic::error(DiagnosticKind::ParseError, "unterminated string literal")
                            .with_span(self.span_from(start))
                            .with_suggestion(suggestions::UNTERMINATED_STRING),
                    );
                    return None;
                }
                Some(c) if c == quote && self.peek_char_at(1) == Some(quote) => {
                    self.advance();
                    self.advance();
                }
                Some(c) if c == quote => {
                    let raw = &self.input[body_start..self.pos];
                    let doubled: String = [quote, quote].iter().collect();
                    let text = raw.replace(&doubled, &quote.to_string());
                    self.advance();
                    return Some(Token::new(TokenKind::StringLit(text), self.span_from(start)));
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn next_token(&mut self, hints: &mut Vec<Hint>, bag: &mut DiagnosticBag) -> Option<Token> {
        self.skip_trivia(hints, bag);
        let start = self.here();
        let c = self.peek_char()?;

        match c {
            '[' => self.read_bracketed_ident(bag),
            '\'' => self.read_string('\'', bag, start),
            '"' => self.read_string('"', bag, start),
            '(' => {
                self.advance();
                Some(Token::new(TokenKind::LParen, self.span_from(start)))
            }
            ')' => {
                self.advance();
                Some(Token::new(TokenKind::RParen, self.span_from(start)))
            }
            '{' => {
                self.advance();
                Some(Token::new(TokenKind::LBrace, self.span_from(start)))
            }
            '}' => {
                self.advance();
                Some(Token::new(TokenKind::RBrace, self.span_from(start)))
            }
            ',' => {
                self.advance();
                Some(Token::new(TokenKind::Comma, self.span_from(start)))
            }
            ':' => {
                self.advance();
                Some(Token::new(TokenKind::Colon, self.span_from(start)))
            }
            '&' => {
                self.advance();
                Some(Token::new(TokenKind::Amp, self.span_from(start)))
            }
            '+' => {
                self.advance();
                Some(Token::new(TokenKind::Plus, self.span_from(start)))
            }
            '-' => {
                self.advance();
                Some(Token::new(TokenKind::Minus, self.span_from(start)))
            }
            '*' => {
                self.advance();
                Some(Token::new(TokenKind::Star, self.span_from(start)))
            }
            '/' => {
                self.advance();
                Some(Token::new(TokenKind::Slash, self.span_from(start)))
            }
            '=' => {
                self.advance();
                Some(Token::new(TokenKind::Eq, self.span_from(start)))
            }
            '<' => {
                self.advance();
                match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        Some(Token::new(TokenKind::Lte, self.span_from(start)))
                    }
                    Some('>') => {
                        self.advance();
                        Some(Token::new(TokenKind::Neq, self.span_from(start)))
                    }
                    _ => Some(Token::new(TokenKind::Lt, self.span_from(start))),
                }
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    Some(Token::new(TokenKind::Gte, self.span_from(start)))
                } else {
                    Some(Token::new(TokenKind::Gt, self.span_from(start)))
                }
            }
            '.' if !self.peek_char_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.advance();
                Some(Token::new(TokenKind::Dot, self.span_from(start)))
            }
            c if c.is_ascii_digit() || c == '.' => self.read_number(bag, start),
            c if c.is_alphabetic() || c == '_' => {
                let ident = self.read_ident();
                Some(Token::new(TokenKind::Ident(ident), self.span_from(start)))
            }
            other => {
                self.advance();
                bag.push(
                    Diagnostic::error(DiagnosticKind::ParseError, format!("unexpected character '{}'", other))
                        .with_span(self.span_from(start)),
                );
                self.next_token(hints, bag)
            }
        }
    }
}

/// Closed set of recognized structured-comment hint keys (`spec.md` §4.1);
/// `MATRIX_*` is a prefix, matching any key starting with `MATRIX_`.
const RECOGNIZED_HINT_KEYS: &[&str] = &[
    "OPTIMIZER",
    "HINT",
    "EXECUTION_MODE",
    "CACHE",
    "CACHE_MODE",
    "STORAGE_ENGINE_HINT",
    "TARGET_LEVEL",
    "QUERY_TIMEOUT",
    "QUERY_PRIORITY",
    "RECURSION_LIMIT",
    "ORG_MODEL",
    "PARALLEL_EXECUTION",
    "FILTER_EARLY",
];

fn is_recognized_hint_key(key: &str) -> bool {
    key.starts_with("MATRIX_") || RECOGNIZED_HINT_KEYS.contains(&key)
}

/// Tokenizes `text`, returning the token stream (always terminated by a
/// single [`TokenKind::Eof`]) and any structured-comment hints found along
/// the way. Lexical errors are pushed to `bag` but never stop tokenizing —
/// callers get the fullest possible token stream to recover a parse from
/// (`spec.md` §4.1: "errors do not abort the scan").
pub fn tokenize(text: &str, bag: &mut DiagnosticBag) -> (Vec<Token>, Vec<Hint>) {
    let mut lexer = Lexer::new(text);
    let mut tokens = Vec::new();
    let mut hints = Vec::new();
    while let Some(tok) = lexer.next_token(&mut hints, bag) {
        tokens.push(tok);
    }
    let eof_span = Span::new(lexer.pos, lexer.pos, lexer.line, lexer.column);
    tokens.push(Token::new(TokenKind::Eof, eof_span));
    (tokens, hints)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        let mut bag = DiagnosticBag::new();
        let (tokens, _) = tokenize(text, &mut bag);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_bracketed_identifiers() {
        let ks = kinds("[Measures].[Sales Amount]");
        assert_eq!(
            ks,
            vec![
                TokenKind::BracketedIdent("Measures".into()),
                TokenKind::Dot,
                TokenKind::BracketedIdent("Sales Amount".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn escaped_closing_bracket_is_literal() {
        let ks = kinds("[Foo ]] Bar]");
        assert_eq!(ks, vec![TokenKind::BracketedIdent("Foo ] Bar".into()), TokenKind::Eof]);
    }

    #[test]
    fn reads_numbers_including_decimals_and_exponents() {
        let ks = kinds("1 2.5 1e3 1.5e-2");
        assert_eq!(
            ks,
            vec![
                TokenKind::Number(1.0),
                TokenKind::Number(2.5),
                TokenKind::Number(1000.0),
                TokenKind::Number(0.015),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn reads_string_literal_with_escaped_quote() {
        let ks = kinds("'it''s fine'");
        assert_eq!(ks, vec![TokenKind::StringLit("it's fine".into()), TokenKind::Eof]);
    }

    #[test]
    fn unterminated_bracket_reports_diagnostic() {
        let mut bag = DiagnosticBag::new();
        let (_tokens, _) = tokenize("[Measures", &mut bag);
        assert!(bag.has_errors());
        assert_eq!(bag.iter().next().unwrap().kind, DiagnosticKind::ParseError);
    }

    #[test]
    fn line_comment_is_skipped() {
        let ks = kinds("1 // trailing comment\n2");
        assert_eq!(ks, vec![TokenKind::Number(1.0), TokenKind::Number(2.0), TokenKind::Eof]);
    }

    #[test]
    fn hint_comment_is_captured_and_stripped() {
        let mut bag = DiagnosticBag::new();
        let (tokens, hints) = tokenize("/* OPTIMIZER: skip */ 1", &mut bag);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::Number(1.0));
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].key, "OPTIMIZER");
        assert_eq!(hints[0].value, "skip");
    }

    #[test]
    fn unrecognized_hint_key_is_not_captured() {
        let mut bag = DiagnosticBag::new();
        let (_tokens, hints) = tokenize("/* made_up_key: skip */ 1", &mut bag);
        assert!(hints.is_empty());
    }

    #[test]
    fn matrix_wildcard_hint_key_is_captured() {
        let mut bag = DiagnosticBag::new();
        let (_tokens, hints) = tokenize("/* MATRIX_SIZE: 4x4 */ 1", &mut bag);
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].key, "MATRIX_SIZE");
    }

    #[test]
    fn double_quoted_string_literal_is_tokenized() {
        let ks = kinds("\"hello \"\"world\"\"\"");
        assert_eq!(ks, vec![TokenKind::StringLit("hello \"world\"".into()), TokenKind::Eof]);
    }

    #[test]
    fn comparison_operators() {
        let ks = kinds("= <> < <= > >=");
        assert_eq!(
            ks,
            vec![
                TokenKind::Eq,
                TokenKind::Neq,
                TokenKind::Lt,
                TokenKind::Lte,
                TokenKind::Gt,
                TokenKind::Gte,
                TokenKind::Eof,
            ]
        );
    }
}
