//! Statement and clause productions
//!
//! `cypher_stmt := single_query (UNION [ALL|DISTINCT] single_query)*`
//! A single query is an ordered clause list; clause-order legality (last
//! clause must project or write, reads cannot follow writes without WITH)
//! is enforced by the transformer where the error messages can be precise.

use crate::core::error::ParseError;
use crate::query::parser::ast::{
    Clause, MergeAction, MergeActionKind, QueryNode, ReturnItem, ReturnItems, SetItem, SortItem,
    Statement,
};
use crate::query::parser::token::{Keyword, TokenKind};
use crate::query::parser::Parser;

impl Parser {
    pub(crate) fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let mut root = QueryNode::Single(self.parse_single_query()?);
        while self.check_kw(Keyword::Union) {
            let span = self.span();
            self.advance();
            let all = if self.eat_kw(Keyword::All) {
                true
            } else {
                self.eat_kw(Keyword::Distinct);
                false
            };
            let right = QueryNode::Single(self.parse_single_query()?);
            root = QueryNode::Union {
                all,
                left: Box::new(root),
                right: Box::new(right),
                span,
            };
        }
        self.eat(&TokenKind::Semicolon);
        if !self.check(&TokenKind::Eof) {
            return Err(self.unexpected("end of statement"));
        }
        Ok(Statement { root })
    }

    fn parse_single_query(&mut self) -> Result<Vec<Clause>, ParseError> {
        let mut clauses = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::Kw(Keyword::Match) => clauses.push(self.parse_match(false)?),
                TokenKind::Kw(Keyword::Optional) => {
                    self.advance();
                    self.expect_kw(Keyword::Match, "MATCH after OPTIONAL")?;
                    clauses.push(self.parse_match_body(true)?);
                }
                TokenKind::Kw(Keyword::Create) => clauses.push(self.parse_create()?),
                TokenKind::Kw(Keyword::Merge) => clauses.push(self.parse_merge()?),
                TokenKind::Kw(Keyword::Set) => clauses.push(self.parse_set()?),
                TokenKind::Kw(Keyword::Remove) => clauses.push(self.parse_remove()?),
                TokenKind::Kw(Keyword::Delete) => clauses.push(self.parse_delete(false)?),
                TokenKind::Kw(Keyword::Detach) => {
                    self.advance();
                    self.expect_kw(Keyword::Delete, "DELETE after DETACH")?;
                    clauses.push(self.parse_delete_body(true)?);
                }
                TokenKind::Kw(Keyword::Unwind) => clauses.push(self.parse_unwind()?),
                TokenKind::Kw(Keyword::With) => clauses.push(self.parse_with()?),
                TokenKind::Kw(Keyword::Return) => clauses.push(self.parse_return()?),
                TokenKind::Kw(Keyword::Call) => clauses.push(self.parse_call()?),
                _ => break,
            }
        }
        if clauses.is_empty() {
            return Err(self.unexpected("a query clause"));
        }
        Ok(clauses)
    }

    fn parse_match(&mut self, optional: bool) -> Result<Clause, ParseError> {
        self.expect_kw(Keyword::Match, "MATCH")?;
        self.parse_match_body(optional)
    }

    fn parse_match_body(&mut self, optional: bool) -> Result<Clause, ParseError> {
        let span = self.span();
        let pattern = self.parse_pattern_list()?;
        let where_clause = if self.eat_kw(Keyword::Where) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Clause::Match { optional, pattern, where_clause, span })
    }

    fn parse_create(&mut self) -> Result<Clause, ParseError> {
        let span = self.span();
        self.expect_kw(Keyword::Create, "CREATE")?;
        let pattern = self.parse_pattern_list()?;
        Ok(Clause::Create { pattern, span })
    }

    fn parse_merge(&mut self) -> Result<Clause, ParseError> {
        let span = self.span();
        self.expect_kw(Keyword::Merge, "MERGE")?;
        let path = self.parse_path_pattern()?;
        let mut actions = Vec::new();
        while self.check_kw(Keyword::On) {
            let action_span = self.span();
            self.advance();
            let kind = if self.eat_kw(Keyword::Create) {
                MergeActionKind::OnCreate
            } else if self.eat_kw(Keyword::Match) {
                MergeActionKind::OnMatch
            } else {
                return Err(self.unexpected("CREATE or MATCH after ON"));
            };
            self.expect_kw(Keyword::Set, "SET")?;
            let items = self.parse_set_items()?;
            actions.push(MergeAction { kind, items, span: action_span });
        }
        Ok(Clause::Merge { path, actions, span })
    }

    fn parse_set(&mut self) -> Result<Clause, ParseError> {
        let span = self.span();
        self.expect_kw(Keyword::Set, "SET")?;
        let items = self.parse_set_items()?;
        Ok(Clause::Set { items, is_remove: false, span })
    }

    fn parse_set_items(&mut self) -> Result<Vec<SetItem>, ParseError> {
        let mut items = Vec::new();
        loop {
            let span = self.span();
            let target = self.parse_postfix()?;
            self.expect(&TokenKind::Eq, "\"=\" in SET item")?;
            let value = self.parse_expression()?;
            items.push(SetItem { target, value: Some(value), span });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }

    fn parse_remove(&mut self) -> Result<Clause, ParseError> {
        let span = self.span();
        self.expect_kw(Keyword::Remove, "REMOVE")?;
        let mut items = Vec::new();
        loop {
            let item_span = self.span();
            let target = self.parse_postfix()?;
            items.push(SetItem { target, value: None, span: item_span });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(Clause::Set { items, is_remove: true, span })
    }

    fn parse_delete(&mut self, detach: bool) -> Result<Clause, ParseError> {
        self.expect_kw(Keyword::Delete, "DELETE")?;
        self.parse_delete_body(detach)
    }

    fn parse_delete_body(&mut self, detach: bool) -> Result<Clause, ParseError> {
        let span = self.span();
        let mut exprs = vec![self.parse_expression()?];
        while self.eat(&TokenKind::Comma) {
            exprs.push(self.parse_expression()?);
        }
        Ok(Clause::Delete { detach, exprs, span })
    }

    fn parse_unwind(&mut self) -> Result<Clause, ParseError> {
        let span = self.span();
        self.expect_kw(Keyword::Unwind, "UNWIND")?;
        let expr = self.parse_expression()?;
        self.expect_kw(Keyword::As, "AS after UNWIND expression")?;
        let (alias, _) = self.take_identifier("alias after AS")?;
        Ok(Clause::Unwind { expr, alias, span })
    }

    fn parse_with(&mut self) -> Result<Clause, ParseError> {
        let span = self.span();
        self.expect_kw(Keyword::With, "WITH")?;
        let distinct = self.eat_kw(Keyword::Distinct);
        let items = self.parse_return_items()?;
        let (order_by, skip, limit) = self.parse_order_skip_limit()?;
        let where_clause = if self.eat_kw(Keyword::Where) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Clause::With { distinct, items, order_by, skip, limit, where_clause, span })
    }

    fn parse_return(&mut self) -> Result<Clause, ParseError> {
        let span = self.span();
        self.expect_kw(Keyword::Return, "RETURN")?;
        let distinct = if self.eat_kw(Keyword::Distinct) {
            true
        } else {
            self.eat_kw(Keyword::All);
            false
        };
        let items = self.parse_return_items()?;
        let (order_by, skip, limit) = self.parse_order_skip_limit()?;
        Ok(Clause::Return { distinct, items, order_by, skip, limit, span })
    }

    fn parse_return_items(&mut self) -> Result<ReturnItems, ParseError> {
        if self.eat(&TokenKind::Star) {
            return Ok(ReturnItems { star: true, items: Vec::new() });
        }
        let mut items = Vec::new();
        loop {
            let span = self.span();
            let expr = self.parse_expression()?;
            let alias = if self.eat_kw(Keyword::As) {
                Some(self.take_identifier("alias after AS")?.0)
            } else {
                None
            };
            items.push(ReturnItem { expr, alias, span });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(ReturnItems { star: false, items })
    }

    #[allow(clippy::type_complexity)]
    fn parse_order_skip_limit(
        &mut self,
    ) -> Result<
        (
            Vec<SortItem>,
            Option<crate::query::parser::ast::Expr>,
            Option<crate::query::parser::ast::Expr>,
        ),
        ParseError,
    > {
        let mut order_by = Vec::new();
        if self.check_kw(Keyword::Order) {
            self.advance();
            self.expect_kw(Keyword::By, "BY after ORDER")?;
            loop {
                let expr = self.parse_expression()?;
                let ascending = if self.eat_kw(Keyword::Desc) || self.eat_kw(Keyword::Descending) {
                    false
                } else {
                    self.eat_kw(Keyword::Asc);
                    self.eat_kw(Keyword::Ascending);
                    true
                };
                order_by.push(SortItem { expr, ascending });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let skip = if self.eat_kw(Keyword::Skip) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        let limit = if self.eat_kw(Keyword::Limit) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok((order_by, skip, limit))
    }

    fn parse_call(&mut self) -> Result<Clause, ParseError> {
        let span = self.span();
        self.expect_kw(Keyword::Call, "CALL")?;
        let (mut procedure, _) = self.take_identifier("procedure name")?;
        while self.eat(&TokenKind::Dot) {
            let (part, _) = self.take_identifier("procedure name part")?;
            procedure.push('.');
            procedure.push_str(&part);
        }
        let mut args = Vec::new();
        if self.eat(&TokenKind::LParen) {
            if !self.check(&TokenKind::RParen) {
                loop {
                    args.push(self.parse_expression()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(&TokenKind::RParen, "\")\"")?;
        }
        let mut yields = Vec::new();
        if self.eat_kw(Keyword::Yield) {
            loop {
                yields.push(self.take_identifier("yield item")?.0);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        Ok(Clause::CallYield { procedure, args, yields, span })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;

    #[test]
    fn match_return_parses() {
        let stmt = parse("MATCH (a)-[r]->(b) WHERE a.x = 1 RETURN a, r, b").unwrap();
        match stmt.root {
            QueryNode::Single(clauses) => {
                assert_eq!(clauses.len(), 2);
                assert!(matches!(
                    clauses[0],
                    Clause::Match { optional: false, .. }
                ));
                assert!(matches!(clauses[1], Clause::Return { .. }));
            }
            other => panic!("expected single query, got {:?}", other),
        }
    }

    #[test]
    fn optional_match_sets_flag() {
        let stmt = parse("MATCH (a) OPTIONAL MATCH (a)-[]->(b) RETURN b").unwrap();
        match stmt.root {
            QueryNode::Single(clauses) => {
                assert!(matches!(clauses[1], Clause::Match { optional: true, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn union_tree_nests_left() {
        let stmt = parse("RETURN 1 AS x UNION RETURN 2 AS x UNION ALL RETURN 3 AS x").unwrap();
        match stmt.root {
            QueryNode::Union { all: true, left, .. } => {
                assert!(matches!(*left, QueryNode::Union { all: false, .. }));
            }
            other => panic!("expected union, got {:?}", other),
        }
    }

    #[test]
    fn detach_delete_and_remove() {
        let stmt = parse("MATCH (a) DETACH DELETE a").unwrap();
        match stmt.root {
            QueryNode::Single(clauses) => {
                assert!(matches!(clauses[1], Clause::Delete { detach: true, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
        let stmt = parse("MATCH (a) REMOVE a.x RETURN a").unwrap();
        match stmt.root {
            QueryNode::Single(clauses) => {
                assert!(matches!(clauses[1], Clause::Set { is_remove: true, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn merge_with_actions_parses() {
        let stmt = parse("MERGE (a:x) ON CREATE SET a.y = 1 ON MATCH SET a.z = 2 RETURN a").unwrap();
        match stmt.root {
            QueryNode::Single(clauses) => match &clauses[0] {
                Clause::Merge { actions, .. } => {
                    assert_eq!(actions.len(), 2);
                    assert_eq!(actions[0].kind, MergeActionKind::OnCreate);
                }
                other => panic!("expected merge, got {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn with_where_and_modifiers() {
        let stmt = parse(
            "MATCH (a) WITH a.x AS x ORDER BY x DESC SKIP 1 LIMIT 2 WHERE x > 0 RETURN x",
        )
        .unwrap();
        match stmt.root {
            QueryNode::Single(clauses) => match &clauses[1] {
                Clause::With { order_by, skip, limit, where_clause, .. } => {
                    assert_eq!(order_by.len(), 1);
                    assert!(!order_by[0].ascending);
                    assert!(skip.is_some() && limit.is_some() && where_clause.is_some());
                }
                other => panic!("expected with, got {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn trailing_garbage_is_a_syntax_error() {
        let err = parse("RETURN 1 bogus bogus").unwrap_err();
        assert!(err.offset() > 0);
        assert!(err.token.is_some());
    }

    #[test]
    fn call_yield_parses() {
        let stmt = parse("CALL db.labels() YIELD label RETURN label").unwrap();
        match stmt.root {
            QueryNode::Single(clauses) => {
                assert!(matches!(clauses[0], Clause::CallYield { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
