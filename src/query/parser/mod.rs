//! Cypher parser
//!
//! The lexer produces the full token stream up front; `Parser` walks it with
//! single-token lookahead. Expression, pattern, and statement productions
//! live in their own files, all as `impl Parser` blocks.

pub mod ast;
pub mod expr_parser;
pub mod lexer;
pub mod pattern_parser;
pub mod stmt_parser;
pub mod token;

use crate::core::error::ParseError;
use crate::core::span::Span;
use ast::Statement;
use lexer::Lexer;
use token::{Keyword, Token, TokenKind};

/// Parse a complete statement.
pub fn parse(input: &str) -> Result<Statement, ParseError> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser::new(tokens);
    parser.parse_statement()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub(crate) fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    pub(crate) fn peek_ahead(&self, n: usize) -> &TokenKind {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    pub(crate) fn span(&self) -> Span {
        self.current().span
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    pub(crate) fn check_kw(&self, kw: Keyword) -> bool {
        self.peek_kind().is_kw(kw)
    }

    /// Consume the token if it matches.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_kw(&mut self, kw: Keyword) -> bool {
        if self.check_kw(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(what))
        }
    }

    pub(crate) fn expect_kw(&mut self, kw: Keyword, what: &str) -> Result<Token, ParseError> {
        if self.check_kw(kw) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(what))
        }
    }

    pub(crate) fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.current();
        ParseError::new(
            format!("expected {}, found \"{}\"", expected, token),
            token.span,
        )
        .with_token(token.lexeme.clone())
    }

    /// Take an identifier, accepting any safe keyword in identifier
    /// position. The reserved-conflicted keywords are refused.
    pub(crate) fn take_identifier(&mut self, what: &str) -> Result<(String, Span), ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                let span = self.span();
                self.advance();
                Ok((name, span))
            }
            TokenKind::Kw(kw) if !kw.is_conflicted() => {
                let token = self.advance();
                Ok((token.lexeme, token.span))
            }
            _ => Err(self.unexpected(what)),
        }
    }

    pub(crate) fn at_identifier(&self) -> bool {
        match self.peek_kind() {
            TokenKind::Ident(_) => true,
            TokenKind::Kw(kw) => !kw.is_conflicted(),
            _ => false,
        }
    }
}
