//! Diagnostics produced by the analysis pipeline.
//!
//! Malformed input is never a Rust error: the lexer, parser and binder
//! recover and report through these records instead.

use serde::Serialize;

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    /// Unterminated quoted text, malformed literal, unexpected character.
    Lex,
    /// Unexpected token, missing terminator.
    Parse,
    DuplicateDeclaration,
    UnresolvedReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: Span,
    pub message: String,
    pub category: Category,
}

impl Diagnostic {
    pub fn error(category: Category, span: Span, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            span,
            message: message.into(),
            category,
        }
    }

    pub fn warning(category: Category, span: Span, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            span,
            message: message.into(),
            category,
        }
    }
}
