//! Error taxonomy
//!
//! Errors are layered the same way the pipeline is: the parser produces
//! `ParseError` (syntax), the transformer produces `PlanError` (binding,
//! semantic, type, not-supported), and the executor produces `ExecError`
//! (runtime). `GraphError` unifies them for callers of the entry point.
//! Transform-time errors always carry the source span of the offending
//! construct; messages include the byte offset from the lexer.

use crate::core::span::Span;
use thiserror::Error;

/// A syntax error with the position and the token that triggered it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("syntax error at {span}: {message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    /// The offending token's lexeme, when one was available.
    pub token: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self { message: message.into(), span, token: None }
    }

    pub fn unexpected(token: impl Into<String>, span: Span) -> Self {
        let token = token.into();
        Self {
            message: format!("unexpected token \"{}\"", token),
            span,
            token: Some(token),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Byte offset of the error in the source text.
    pub fn offset(&self) -> usize {
        self.span.offset()
    }
}

/// Transform-time errors, split by the taxonomy the caller sees.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("{message}")]
    Binding { message: String, span: Span },

    #[error("{message}")]
    Semantic { message: String, span: Span },

    #[error("{message}")]
    Type { message: String, span: Span },

    #[error("{message}")]
    NotSupported { message: String, span: Span },
}

impl PlanError {
    pub fn binding(message: impl Into<String>, span: Span) -> Self {
        PlanError::Binding { message: message.into(), span }
    }

    pub fn semantic(message: impl Into<String>, span: Span) -> Self {
        PlanError::Semantic { message: message.into(), span }
    }

    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        PlanError::Type { message: message.into(), span }
    }

    pub fn not_supported(message: impl Into<String>, span: Span) -> Self {
        PlanError::NotSupported { message: message.into(), span }
    }

    pub fn span(&self) -> Span {
        match self {
            PlanError::Binding { span, .. }
            | PlanError::Semantic { span, .. }
            | PlanError::Type { span, .. }
            | PlanError::NotSupported { span, .. } => *span,
        }
    }
}

/// Runtime errors raised by the executor or the VLE engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecError {
    #[error("{0}")]
    Runtime(String),

    #[error("invalid variable-length range: lower bound {lo} exceeds upper bound {hi}")]
    InvalidRange { lo: i64, hi: i64 },

    #[error("missing parameter ${0}")]
    MissingParameter(String),

    #[error("query cancelled")]
    Cancelled,

    #[error("graph \"{0}\" does not exist")]
    UnknownGraph(String),
}

impl ExecError {
    pub fn runtime(message: impl Into<String>) -> Self {
        ExecError::Runtime(message.into())
    }
}

/// The unified error surfaced by the entry point.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("execution error: {0}")]
    Exec(#[from] ExecError),
}

pub type GraphResult<T> = Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::span::{Position, Span};

    #[test]
    fn parse_error_reports_byte_offset() {
        let span = Span::point(Position::new(1, 9, 8));
        let err = ParseError::unexpected(")", span);
        assert_eq!(err.offset(), 8);
        assert!(err.to_string().contains("unexpected token \")\""));
    }

    #[test]
    fn errors_convert_into_unified_type() {
        let span = Span::default();
        let err: GraphError = PlanError::binding("duplicate variable \"n\"", span).into();
        assert!(matches!(err, GraphError::Plan(PlanError::Binding { .. })));
    }
}
