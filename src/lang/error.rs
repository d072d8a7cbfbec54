//! Error types for the language front end and code generator.

use std::fmt;

use thiserror::Error;

/// A region of source text. Offsets are char indices; `line`/`col` locate `start`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, col: usize) -> Self {
        debug_assert!(start <= end);
        Self {
            start,
            end,
            line,
            col,
        }
    }

    /// The smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        if other.start < self.start {
            return other.to(self);
        }
        Span {
            start: self.start,
            end: self.end.max(other.end),
            line: self.line,
            col: self.col,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// An error raised while lexing, parsing or generating code for one node.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[{span}] {kind}: {message}")]
pub struct CompileError {
    pub message: String,
    pub span: Span,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Parse,
    Codegen,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Lex => write!(f, "lex error"),
            ErrorKind::Parse => write!(f, "parse error"),
            ErrorKind::Codegen => write!(f, "codegen error"),
        }
    }
}

impl CompileError {
    pub fn lex(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            kind: ErrorKind::Lex,
        }
    }

    pub fn parse(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            kind: ErrorKind::Parse,
        }
    }

    pub fn codegen(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            kind: ErrorKind::Codegen,
        }
    }

    pub fn type_mismatch(expected: &str, found: &str, span: Span) -> Self {
        Self::codegen(format!("expected {expected}, found {found}"), span)
    }

    pub fn arity_mismatch(targets: usize, values: usize, span: Span) -> Self {
        Self::codegen(
            format!("cannot assign a tuple of {values} values to {targets} targets"),
            span,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_position_and_kind() {
        let err = CompileError::parse("unexpected token", Span::new(4, 5, 2, 3));
        assert_eq!(err.to_string(), "[2:3] parse error: unexpected token");
    }

    #[test]
    fn arity_message_names_both_counts() {
        let err = CompileError::arity_mismatch(2, 3, Span::default());
        assert_eq!(err.kind, ErrorKind::Codegen);
        assert!(err.message.contains('2'));
        assert!(err.message.contains('3'));
    }

    #[test]
    fn span_join_is_ordered() {
        let a = Span::new(2, 4, 1, 3);
        let b = Span::new(7, 9, 1, 8);
        assert_eq!(a.to(b), Span::new(2, 9, 1, 3));
        assert_eq!(b.to(a), Span::new(2, 9, 1, 3));
    }
}
