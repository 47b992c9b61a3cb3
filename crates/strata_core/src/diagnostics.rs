//! Diagnostic reporting shared by the parser and the schema build.

use crate::span::{LineIndex, Location, Span};
use std::fmt;

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// A diagnostic message pointing into a source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    /// Stable error code, see [`codes`].
    pub code: &'static str,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    /// Creates a new error diagnostic.
    pub fn error(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            code,
            message: message.into(),
            span,
        }
    }

    /// Creates a new warning diagnostic.
    pub fn warning(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            code,
            message: message.into(),
            span,
        }
    }

    /// Resolves the diagnostic's span to a line/column location.
    #[must_use]
    pub fn location(&self, index: &LineIndex) -> Location {
        index.span_location(self.span)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// A collection of diagnostics.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Adds an error diagnostic.
    pub fn error(&mut self, code: &'static str, message: impl Into<String>, span: Span) {
        self.add(Diagnostic::error(code, message, span));
    }

    /// Adds a warning diagnostic.
    pub fn warning(&mut self, code: &'static str, message: impl Into<String>, span: Span) {
        self.add(Diagnostic::warning(code, message, span));
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == DiagnosticSeverity::Error)
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
    }

    /// Returns the first error, if any.
    #[must_use]
    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.errors().next()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }
}

impl IntoIterator for DiagnosticBag {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

/// Syntax error raised when a document with diagnostics is rejected.
#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic)]
#[error("Syntax Error: {message}")]
#[diagnostic(code(strata::syntax))]
pub struct SyntaxError {
    pub message: String,
    #[label("here")]
    pub span: Span,
}

impl From<&Diagnostic> for SyntaxError {
    fn from(diagnostic: &Diagnostic) -> Self {
        Self {
            message: diagnostic.message.clone(),
            span: diagnostic.span,
        }
    }
}

/// Common diagnostic codes.
pub mod codes {
    pub const UNEXPECTED_TOKEN: &str = "E0001";
    pub const UNEXPECTED_EOF: &str = "E0002";
    pub const INVALID_SYNTAX: &str = "E0003";
    pub const UNTERMINATED_STRING: &str = "E0004";
    pub const INVALID_ESCAPE: &str = "E0005";
    pub const UNKNOWN_DIRECTIVE_LOCATION: &str = "E0006";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_bag() {
        let mut bag = DiagnosticBag::new();
        bag.warning(codes::INVALID_SYNTAX, "odd but fine", Span::new(0, 1));
        assert!(!bag.has_errors());

        bag.error(codes::UNEXPECTED_TOKEN, "expected Name", Span::new(4, 9));
        assert!(bag.has_errors());
        assert_eq!(bag.error_count(), 1);
        assert_eq!(bag.len(), 2);
        assert_eq!(bag.first_error().map(|d| d.span), Some(Span::new(4, 9)));
    }

    #[test]
    fn test_diagnostic_location() {
        let index = LineIndex::new("type Query {\n  a: In\n}");
        let diagnostic = Diagnostic::error(codes::UNEXPECTED_TOKEN, "bad", Span::new(18, 20));
        assert_eq!(diagnostic.location(&index), Location { line: 2, column: 6 });
        assert_eq!(diagnostic.to_string(), "[E0001] bad");
    }
}
