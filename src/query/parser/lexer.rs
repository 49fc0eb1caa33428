//! Lexer
//!
//! Converts query text into a token stream. Every token carries a span with
//! byte offsets so errors can point at the exact input position. Dashes and
//! angle brackets are emitted as plain operator tokens; the pattern parser
//! assembles relationship arrows from them contextually, which keeps
//! expressions like `a < -1` unambiguous.

use crate::core::error::ParseError;
use crate::core::span::{Position, Span};
use crate::query::parser::token::{Keyword, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    offset: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            offset: 0,
        }
    }

    /// Tokenize the whole input, ending with an EOF token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column, self.offset)
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let start = self.position();
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                            None => {
                                return Err(ParseError::new(
                                    "unterminated block comment",
                                    Span::point(start),
                                ));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_trivia()?;
        let start = self.position();

        let Some(ch) = self.peek() else {
            return Ok(Token::new(TokenKind::Eof, "", Span::point(start)));
        };

        let single = |lexer: &mut Self, kind: TokenKind| {
            lexer.bump();
            let span = Span::new(start, lexer.position());
            Ok(Token::new(kind, &lexer.input[start.offset..lexer.offset], span))
        };

        match ch {
            '(' => single(self, TokenKind::LParen),
            ')' => single(self, TokenKind::RParen),
            '[' => single(self, TokenKind::LBracket),
            ']' => single(self, TokenKind::RBracket),
            '{' => single(self, TokenKind::LBrace),
            '}' => single(self, TokenKind::RBrace),
            ',' => single(self, TokenKind::Comma),
            ';' => single(self, TokenKind::Semicolon),
            '+' => single(self, TokenKind::Plus),
            '-' => single(self, TokenKind::Minus),
            '*' => single(self, TokenKind::Star),
            '/' => single(self, TokenKind::Slash),
            '%' => single(self, TokenKind::Percent),
            '^' => single(self, TokenKind::Caret),
            '|' => single(self, TokenKind::Pipe),
            ':' => {
                self.bump();
                if self.peek() == Some(':') {
                    self.bump();
                    Ok(self.finish(start, TokenKind::DoubleColon))
                } else {
                    Ok(self.finish(start, TokenKind::Colon))
                }
            }
            '.' => {
                self.bump();
                if self.peek() == Some('.') {
                    self.bump();
                    Ok(self.finish(start, TokenKind::DotDot))
                } else {
                    Ok(self.finish(start, TokenKind::Dot))
                }
            }
            '=' => {
                self.bump();
                if self.peek() == Some('~') {
                    self.bump();
                    Ok(self.finish(start, TokenKind::RegexMatch))
                } else {
                    Ok(self.finish(start, TokenKind::Eq))
                }
            }
            '<' => {
                self.bump();
                match self.peek() {
                    Some('=') => {
                        self.bump();
                        Ok(self.finish(start, TokenKind::Le))
                    }
                    Some('>') => {
                        self.bump();
                        Ok(self.finish(start, TokenKind::Ne))
                    }
                    _ => Ok(self.finish(start, TokenKind::Lt)),
                }
            }
            '>' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(self.finish(start, TokenKind::Ge))
                } else {
                    Ok(self.finish(start, TokenKind::Gt))
                }
            }
            '$' => {
                self.bump();
                let name = self.read_word();
                if name.is_empty() {
                    return Err(ParseError::new(
                        "expected parameter name after \"$\"",
                        Span::new(start, self.position()),
                    ));
                }
                Ok(self.finish(start, TokenKind::Param(name)))
            }
            '"' | '\'' => self.read_string(start),
            c if c.is_ascii_digit() => self.read_number(start),
            c if c.is_alphabetic() || c == '_' => {
                let word = self.read_word();
                let kind = match Keyword::lookup(&word) {
                    Some(kw) => TokenKind::Kw(kw),
                    None => TokenKind::Ident(word.clone()),
                };
                let span = Span::new(start, self.position());
                Ok(Token::new(kind, word, span))
            }
            other => Err(ParseError::new(
                format!("unexpected character \"{}\"", other),
                Span::point(start),
            )
            .with_token(other.to_string())),
        }
    }

    fn finish(&self, start: Position, kind: TokenKind) -> Token {
        let span = Span::new(start, self.position());
        Token::new(kind, &self.input[start.offset..self.offset], span)
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        word
    }

    fn read_number(&mut self, start: Position) -> Result<Token, ParseError> {
        let mut text = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else if c == '.' && !is_float {
                // A dot only continues the number when a digit follows;
                // `1..3` is integer, DotDot, integer.
                if self.peek_at(1).map_or(false, |n| n.is_ascii_digit()) {
                    is_float = true;
                    text.push(c);
                    self.bump();
                } else {
                    break;
                }
            } else if (c == 'e' || c == 'E') && !text.is_empty() {
                let next = self.peek_at(1);
                let sign_and_digit = matches!(next, Some('+') | Some('-'))
                    && self.peek_at(2).map_or(false, |n| n.is_ascii_digit());
                if next.map_or(false, |n| n.is_ascii_digit()) || sign_and_digit {
                    is_float = true;
                    text.push(c);
                    self.bump();
                    if matches!(self.peek(), Some('+') | Some('-')) {
                        text.push(self.peek().unwrap());
                        self.bump();
                    }
                } else {
                    break;
                }
            } else {
                break;
            }
        }
        let span = Span::new(start, self.position());
        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| ParseError::new(format!("invalid number \"{}\"", text), span))?;
            Ok(Token::new(TokenKind::Float(value), text, span))
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| ParseError::new(format!("invalid number \"{}\"", text), span))?;
            Ok(Token::new(TokenKind::Integer(value), text, span))
        }
    }

    fn read_string(&mut self, start: Position) -> Result<Token, ParseError> {
        let quote = self.bump().expect("caller saw the quote");
        let mut out = String::new();
        loop {
            match self.peek() {
                Some('\\') => {
                    self.bump();
                    match self.bump() {
                        Some('n') => out.push('\n'),
                        Some('t') => out.push('\t'),
                        Some('r') => out.push('\r'),
                        Some('\\') => out.push('\\'),
                        Some('\'') => out.push('\''),
                        Some('"') => out.push('"'),
                        Some('u') => {
                            let mut hex = String::new();
                            for _ in 0..4 {
                                match self.peek() {
                                    Some(c) if c.is_ascii_hexdigit() => {
                                        hex.push(c);
                                        self.bump();
                                    }
                                    _ => break,
                                }
                            }
                            let code = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32);
                            match code {
                                Some(c) => out.push(c),
                                None => {
                                    return Err(ParseError::new(
                                        format!("invalid unicode escape \"\\u{}\"", hex),
                                        Span::new(start, self.position()),
                                    ));
                                }
                            }
                        }
                        Some(other) => {
                            out.push('\\');
                            out.push(other);
                        }
                        None => {
                            return Err(ParseError::new(
                                "unterminated string literal",
                                Span::new(start, self.position()),
                            ));
                        }
                    }
                }
                Some(c) if c == quote => {
                    self.bump();
                    let span = Span::new(start, self.position());
                    return Ok(Token::new(TokenKind::Str(out.clone()), out, span));
                }
                Some(c) => {
                    out.push(c);
                    self.bump();
                }
                None => {
                    return Err(ParseError::new(
                        "unterminated string literal",
                        Span::new(start, self.position()),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        assert_eq!(
            kinds("MATCH foo"),
            vec![
                TokenKind::Kw(Keyword::Match),
                TokenKind::Ident("foo".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn range_does_not_eat_the_dots() {
        assert_eq!(
            kinds("1..3"),
            vec![
                TokenKind::Integer(1),
                TokenKind::DotDot,
                TokenKind::Integer(3),
                TokenKind::Eof
            ]
        );
        assert_eq!(kinds("1.5"), vec![TokenKind::Float(1.5), TokenKind::Eof]);
    }

    #[test]
    fn multi_char_operators() {
        assert_eq!(
            kinds("<> <= >= =~ :: .."),
            vec![
                TokenKind::Ne,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::RegexMatch,
                TokenKind::DoubleColon,
                TokenKind::DotDot,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn params_and_strings() {
        assert_eq!(
            kinds("$who 'a\\'b'"),
            vec![
                TokenKind::Param("who".into()),
                TokenKind::Str("a'b".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn spans_carry_byte_offsets() {
        let tokens = Lexer::new("MATCH (n)").tokenize().unwrap();
        assert_eq!(tokens[0].span.start.offset, 0);
        assert_eq!(tokens[1].span.start.offset, 6);
        assert_eq!(tokens[2].span.start.offset, 7);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(Lexer::new("'oops").tokenize().is_err());
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("RETURN /* block */ 1 // trailing"),
            vec![
                TokenKind::Kw(Keyword::Return),
                TokenKind::Integer(1),
                TokenKind::Eof
            ]
        );
    }
}
