//! Path pattern productions
//!
//! A simple path is `node (relationship node)*`. Relationship direction is
//! read off the dashes surrounding the optional bracket body: `<-` on the
//! left makes it left-directed, `->` on the right makes it right-directed,
//! bare dashes on both sides make it undirected. The lexer never fuses
//! arrows, so `<` and `-` arrive as separate tokens and expressions like
//! `a < -1` stay unaffected.

use crate::core::error::ParseError;
use crate::query::parser::ast::{
    NodePattern, PathElement, PathPattern, RelDirection, RelPattern, VarLen,
};
use crate::query::parser::token::TokenKind;
use crate::query::parser::Parser;

impl Parser {
    /// Comma-separated list of path patterns.
    pub(crate) fn parse_pattern_list(&mut self) -> Result<Vec<PathPattern>, ParseError> {
        let mut paths = vec![self.parse_path_pattern()?];
        while self.eat(&TokenKind::Comma) {
            paths.push(self.parse_path_pattern()?);
        }
        Ok(paths)
    }

    pub(crate) fn parse_path_pattern(&mut self) -> Result<PathPattern, ParseError> {
        let start = self.span();

        // `p = (...)` names the whole path.
        let var_name = if self.at_identifier() && *self.peek_ahead(1) == TokenKind::Eq {
            let (name, _) = self.take_identifier("path variable")?;
            self.expect(&TokenKind::Eq, "\"=\"")?;
            Some(name)
        } else {
            None
        };

        let mut elements = vec![PathElement::Node(self.parse_node_pattern()?)];
        while self.at_relationship_start() {
            elements.push(PathElement::Rel(self.parse_rel_pattern()?));
            elements.push(PathElement::Node(self.parse_node_pattern()?));
        }

        let span = start.merge(self.tokens_span_end());
        Ok(PathPattern { var_name, elements, span })
    }

    fn tokens_span_end(&self) -> crate::core::span::Span {
        self.current().span
    }

    fn at_relationship_start(&self) -> bool {
        match self.peek_kind() {
            TokenKind::Minus => true,
            TokenKind::Lt => *self.peek_ahead(1) == TokenKind::Minus,
            _ => false,
        }
    }

    fn parse_node_pattern(&mut self) -> Result<NodePattern, ParseError> {
        let start = self.span();
        self.expect(&TokenKind::LParen, "\"(\" to start a node pattern")?;

        let name = if self.at_identifier() {
            Some(self.take_identifier("node variable")?.0)
        } else {
            None
        };

        let label = if self.eat(&TokenKind::Colon) {
            Some(self.take_identifier("label name")?.0)
        } else {
            None
        };

        let props = self.parse_entity_props()?;

        let end = self.span();
        self.expect(&TokenKind::RParen, "\")\" to close the node pattern")?;
        Ok(NodePattern { name, label, props, span: start.merge(end) })
    }

    /// Properties are a map literal or a parameter marker.
    fn parse_entity_props(
        &mut self,
    ) -> Result<Option<crate::query::parser::ast::Expr>, ParseError> {
        if self.check(&TokenKind::LBrace) {
            Ok(Some(self.parse_map_literal()?))
        } else if let TokenKind::Param(name) = self.peek_kind().clone() {
            let span = self.span();
            self.advance();
            Ok(Some(crate::query::parser::ast::Expr::Param(name, span)))
        } else {
            Ok(None)
        }
    }

    fn parse_rel_pattern(&mut self) -> Result<RelPattern, ParseError> {
        let start = self.span();

        let left_arrow = if self.check(&TokenKind::Lt) {
            self.advance();
            true
        } else {
            false
        };
        self.expect(&TokenKind::Minus, "\"-\" in relationship pattern")?;

        let mut name = None;
        let mut label = None;
        let mut varlen = None;
        let mut props = None;

        if self.eat(&TokenKind::LBracket) {
            if self.at_identifier() {
                name = Some(self.take_identifier("relationship variable")?.0);
            }
            if self.eat(&TokenKind::Colon) {
                label = Some(self.take_identifier("relationship label")?.0);
            }
            if self.check(&TokenKind::Star) {
                varlen = Some(self.parse_varlen_range()?);
            }
            props = self.parse_entity_props()?;
            self.expect(&TokenKind::RBracket, "\"]\" to close the relationship")?;
        }

        self.expect(&TokenKind::Minus, "\"-\" after relationship body")?;
        let right_arrow = if self.check(&TokenKind::Gt) {
            self.advance();
            true
        } else {
            false
        };

        let direction = match (left_arrow, right_arrow) {
            (true, false) => RelDirection::Left,
            (false, true) => RelDirection::Right,
            (false, false) => RelDirection::Undirected,
            (true, true) => {
                return Err(ParseError::new(
                    "relationship cannot point in both directions",
                    start.merge(self.span()),
                ));
            }
        };

        let span = start.merge(self.span());
        Ok(RelPattern { name, label, direction, props, varlen, span })
    }

    /// `*` alone means `1..∞`; `*n` means `n..n`; either bound of
    /// `*lo..hi` may be omitted.
    fn parse_varlen_range(&mut self) -> Result<VarLen, ParseError> {
        self.expect(&TokenKind::Star, "\"*\"")?;

        let lo = if let TokenKind::Integer(n) = *self.peek_kind() {
            self.advance();
            Some(n)
        } else {
            None
        };

        if self.eat(&TokenKind::DotDot) {
            let hi = if let TokenKind::Integer(n) = *self.peek_kind() {
                self.advance();
                Some(n)
            } else {
                None
            };
            Ok(VarLen { lo: lo.unwrap_or(1), hi })
        } else {
            match lo {
                // `*n` is exactly n hops.
                Some(n) => Ok(VarLen { lo: n, hi: Some(n) }),
                None => Ok(VarLen { lo: 1, hi: None }),
            }
        }
    }
}
