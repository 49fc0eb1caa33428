//! Expression productions
//!
//! One method per precedence level, lowest first: `OR`, `AND`, `XOR`, `NOT`,
//! comparison, additive, multiplicative, `^`, `IN`/`IS`, unary minus,
//! string-match operators, then postfix (subscript, dot access, `::`).
//! `XOR` is desugared on the spot, boolean trees stay flat, unary minus
//! folds into numeric literals, and comparison runs accumulate into a
//! single chain node.

use crate::core::error::ParseError;
use crate::query::parser::ast::{BinaryOp, CaseArm, CmpOp, Expr, Literal};
use crate::query::parser::token::{Keyword, TokenKind};
use crate::query::parser::Parser;

impl Parser {
    pub(crate) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat_kw(Keyword::Or) {
            let right = self.parse_and()?;
            let span = left.span().merge(right.span());
            left = left.or(right, span);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_xor()?;
        while self.eat_kw(Keyword::And) {
            let right = self.parse_xor()?;
            let span = left.span().merge(right.span());
            left = left.and(right, span);
        }
        Ok(left)
    }

    /// `A XOR B` has no node of its own: it becomes
    /// `(A OR B) AND NOT (A AND B)` right here.
    fn parse_xor(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.eat_kw(Keyword::Xor) {
            let right = self.parse_not()?;
            let span = left.span().merge(right.span());
            let either = left.clone().or(right.clone(), span);
            let both = left.and(right, span);
            left = either.and(Expr::Not(Box::new(both), span), span);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.check_kw(Keyword::Not) {
            let start = self.span();
            self.advance();
            let operand = self.parse_not()?;
            let span = start.merge(operand.span());
            Ok(Expr::Not(Box::new(operand), span))
        } else {
            self.parse_comparison()
        }
    }

    /// Consecutive comparisons build one chain node: `a < b <= c` keeps all
    /// three terms and both operators together and is lowered once during
    /// transform.
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_additive()?;
        let mut terms = vec![first];
        let mut ops = Vec::new();
        while let Some(op) = self.peek_cmp_op() {
            self.advance();
            terms.push(self.parse_additive()?);
            ops.push(op);
        }
        if ops.is_empty() {
            return Ok(terms.pop().unwrap());
        }
        let span = terms[0].span().merge(terms[terms.len() - 1].span());
        Ok(Expr::ChainCmp { terms, ops, span })
    }

    fn peek_cmp_op(&self) -> Option<CmpOp> {
        match self.peek_kind() {
            TokenKind::Eq => Some(CmpOp::Eq),
            TokenKind::Ne => Some(CmpOp::Ne),
            TokenKind::Lt => Some(CmpOp::Lt),
            TokenKind::Le => Some(CmpOp::Le),
            TokenKind::Gt => Some(CmpOp::Gt),
            TokenKind::Ge => Some(CmpOp::Ge),
            _ => None,
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            let span = left.span().merge(right.span());
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_power()?;
            let span = left.span().merge(right.span());
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    /// `^` is right-associative.
    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_in_is()?;
        if self.eat(&TokenKind::Caret) {
            let right = self.parse_power()?;
            let span = left.span().merge(right.span());
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                left: Box::new(left),
                right: Box::new(right),
                span,
            });
        }
        Ok(left)
    }

    fn parse_in_is(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary_minus()?;
        loop {
            if self.check_kw(Keyword::In) {
                self.advance();
                let right = self.parse_unary_minus()?;
                let span = left.span().merge(right.span());
                left = Expr::Binary {
                    op: BinaryOp::In,
                    left: Box::new(left),
                    right: Box::new(right),
                    span,
                };
            } else if self.check_kw(Keyword::Is) {
                let start = self.span();
                self.advance();
                let negated = self.eat_kw(Keyword::Not);
                self.expect_kw(Keyword::Null, "NULL after IS")?;
                let span = left.span().merge(start);
                left = Expr::IsNull { expr: Box::new(left), negated, span };
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_unary_minus(&mut self) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::Minus) {
            let start = self.span();
            self.advance();
            let operand = self.parse_unary_minus()?;
            let span = start.merge(operand.span());
            // Fold into the literal instead of emitting a negation node.
            return Ok(match operand {
                Expr::Literal(Literal::Integer(i), _) => {
                    Expr::Literal(Literal::Integer(-i), span)
                }
                Expr::Literal(Literal::Float(x), _) => Expr::Literal(Literal::Float(-x), span),
                other => Expr::Neg(Box::new(other), span),
            });
        }
        if self.check(&TokenKind::Plus) {
            self.advance();
            return self.parse_unary_minus();
        }
        self.parse_string_match()
    }

    fn parse_string_match(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_postfix()?;
        loop {
            let op = if self.check_kw(Keyword::Starts) {
                self.advance();
                self.expect_kw(Keyword::With, "WITH after STARTS")?;
                BinaryOp::StartsWith
            } else if self.check_kw(Keyword::Ends) {
                self.advance();
                self.expect_kw(Keyword::With, "WITH after ENDS")?;
                BinaryOp::EndsWith
            } else if self.check_kw(Keyword::Contains) {
                self.advance();
                BinaryOp::Contains
            } else if self.check(&TokenKind::RegexMatch) {
                self.advance();
                BinaryOp::Regex
            } else {
                break;
            };
            let right = self.parse_postfix()?;
            let span = left.span().merge(right.span());
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    /// Subscript, slice, dot access, and `::` casts, tightest first. Also
    /// the production for SET/REMOVE targets, which must not swallow the
    /// `=` that follows them.
    pub(crate) fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check(&TokenKind::Dot) {
                self.advance();
                let (key, key_span) = self.take_identifier("property name after \".\"")?;
                let span = expr.span().merge(key_span);
                expr = Expr::Property { base: Box::new(expr), key, span };
            } else if self.check(&TokenKind::LBracket) {
                expr = self.parse_subscript_or_slice(expr)?;
            } else if self.check(&TokenKind::DoubleColon) {
                self.advance();
                let (target, target_span) = self.take_identifier("type name after \"::\"")?;
                let span = expr.span().merge(target_span);
                expr = Expr::Cast { expr: Box::new(expr), target, span };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_subscript_or_slice(&mut self, base: Expr) -> Result<Expr, ParseError> {
        let open = self.span();
        self.expect(&TokenKind::LBracket, "\"[\"")?;

        let lo = if self.check(&TokenKind::DotDot) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };

        if self.eat(&TokenKind::DotDot) {
            let hi = if self.check(&TokenKind::RBracket) {
                None
            } else {
                Some(Box::new(self.parse_expression()?))
            };
            let close = self.span();
            self.expect(&TokenKind::RBracket, "\"]\"")?;
            let span = base.span().merge(open).merge(close);
            return Ok(Expr::Slice { base: Box::new(base), lo, hi, span });
        }

        let close = self.span();
        self.expect(&TokenKind::RBracket, "\"]\"")?;
        let index = lo.ok_or_else(|| self.unexpected("subscript expression"))?;
        let span = base.span().merge(open).merge(close);
        Ok(Expr::Subscript { base: Box::new(base), index, span })
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.span();
        match self.peek_kind().clone() {
            TokenKind::Integer(i) => {
                self.advance();
                Ok(Expr::Literal(Literal::Integer(i), span))
            }
            TokenKind::Float(x) => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(x), span))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(s), span))
            }
            TokenKind::Param(name) => {
                self.advance();
                Ok(Expr::Param(name, span))
            }
            TokenKind::Kw(Keyword::True) => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true), span))
            }
            TokenKind::Kw(Keyword::False) => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false), span))
            }
            TokenKind::Kw(Keyword::Null) => {
                self.advance();
                Ok(Expr::Literal(Literal::Null, span))
            }
            TokenKind::Kw(Keyword::Case) => self.parse_case(),
            TokenKind::Kw(Keyword::Exists) if *self.peek_ahead(1) == TokenKind::LBrace => {
                self.parse_exists_pattern()
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen, "\")\"")?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_list_literal(),
            TokenKind::LBrace => self.parse_map_literal(),
            TokenKind::Ident(_) | TokenKind::Kw(_) if self.at_identifier() => {
                let (name, name_span) = self.take_identifier("expression")?;
                if self.check(&TokenKind::LParen) {
                    self.parse_func_call(name, name_span)
                } else {
                    Ok(Expr::Variable(name, name_span))
                }
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_func_call(
        &mut self,
        name: String,
        start: crate::core::span::Span,
    ) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LParen, "\"(\"")?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            // count(*) and friends: a bare star stands for "all rows".
            if self.eat(&TokenKind::Star) {
                let close = self.span();
                self.expect(&TokenKind::RParen, "\")\"")?;
                return Ok(Expr::FuncCall { name, args, span: start.merge(close) });
            }
            loop {
                args.push(self.parse_expression()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let close = self.span();
        self.expect(&TokenKind::RParen, "\")\"")?;
        Ok(Expr::FuncCall { name, args, span: start.merge(close) })
    }

    fn parse_list_literal(&mut self) -> Result<Expr, ParseError> {
        let open = self.span();
        self.expect(&TokenKind::LBracket, "\"[\"")?;
        let mut items = Vec::new();
        if !self.check(&TokenKind::RBracket) {
            loop {
                items.push(self.parse_expression()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let close = self.span();
        self.expect(&TokenKind::RBracket, "\"]\"")?;
        Ok(Expr::List(items, open.merge(close)))
    }

    pub(crate) fn parse_map_literal(&mut self) -> Result<Expr, ParseError> {
        let open = self.span();
        self.expect(&TokenKind::LBrace, "\"{\"")?;
        let mut entries = Vec::new();
        if !self.check(&TokenKind::RBrace) {
            loop {
                let (key, _) = self.take_identifier("map key")?;
                self.expect(&TokenKind::Colon, "\":\" after map key")?;
                let value = self.parse_expression()?;
                entries.push((key, value));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let close = self.span();
        self.expect(&TokenKind::RBrace, "\"}\"")?;
        Ok(Expr::Map(entries, open.merge(close)))
    }

    /// Both CASE forms produce the same node; a missing ELSE defaults to
    /// NULL at transform time.
    fn parse_case(&mut self) -> Result<Expr, ParseError> {
        let start = self.span();
        self.expect_kw(Keyword::Case, "CASE")?;
        let operand = if self.check_kw(Keyword::When) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        let mut arms = Vec::new();
        while self.eat_kw(Keyword::When) {
            let when = self.parse_expression()?;
            self.expect_kw(Keyword::Then, "THEN")?;
            let then = self.parse_expression()?;
            arms.push(CaseArm { when, then });
        }
        if arms.is_empty() {
            return Err(self.unexpected("WHEN"));
        }
        let default = if self.eat_kw(Keyword::Else) {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        let end = self.span();
        self.expect_kw(Keyword::End, "END")?;
        Ok(Expr::Case { operand, arms, default, span: start.merge(end) })
    }

    fn parse_exists_pattern(&mut self) -> Result<Expr, ParseError> {
        let start = self.span();
        self.expect_kw(Keyword::Exists, "EXISTS")?;
        self.expect(&TokenKind::LBrace, "\"{\"")?;
        let pattern = self.parse_pattern_list()?;
        let end = self.span();
        self.expect(&TokenKind::RBrace, "\"}\"")?;
        Ok(Expr::ExistsPattern { pattern, span: start.merge(end) })
    }
}
