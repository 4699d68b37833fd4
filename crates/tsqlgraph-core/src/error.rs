//! Error and diagnostic types

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Errors surfaced by the library entry points
#[derive(Debug, ThisError, miette::Diagnostic)]
pub enum Error {
    /// The parser reported problems and the caller asked for strict handling
    #[error("script has {count} parse error(s)")]
    #[diagnostic(
        code(tsqlgraph::parse_failed),
        help("fix the reported syntax errors or run without strict mode")
    )]
    ParseFailed { count: usize },

    /// Writing edges to the output failed
    #[error("failed to write dependency edges")]
    #[diagnostic(code(tsqlgraph::io))]
    Io(#[from] std::io::Error),
}

impl From<std::convert::Infallible> for Error {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Source location span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
    /// Length in characters
    pub length: usize,
}

impl Span {
    pub fn new(line: usize, column: usize, length: usize) -> Self {
        Self {
            line,
            column,
            length,
        }
    }

    /// Create a span from sqlparser's Span
    pub fn from_sqlparser(span: &sqlparser::tokenizer::Span) -> Self {
        let start = span.start;
        let end = span.end;
        let length = if end.line == start.line && end.column > start.column {
            end.column as usize - start.column as usize
        } else {
            1
        };
        Self {
            line: start.line as usize,
            column: start.column as usize,
            length,
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Diagnostic message produced while parsing a script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            message: message.into(),
            span: None,
            help: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            message: message.into(),
            span: None,
            help: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Get the error code string (e.g., "E1001")
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.span {
            Some(span) => write!(f, "[{}] {} at {}", self.code(), self.message, span),
            None => write!(f, "[{}] {}", self.code(), self.message),
        }
    }
}

/// Types of diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// E1000: The tokenizer rejected the input
    TokenizeError,
    /// E1001: An object name was expected but not found
    MissingName,
    /// E1002: A procedure or trigger header has no `AS` before its body
    MissingBody,
    /// E1003: `END` without a matching `BEGIN`
    UnexpectedEnd,
    /// E1004: A `BEGIN` block runs past the end of its batch
    UnterminatedBlock,
    /// E1005: A parenthesis was never closed
    UnbalancedParens,
    /// W2000: A token was skipped because no statement can start with it
    UnexpectedToken,
}

impl DiagnosticKind {
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::TokenizeError => "E1000",
            DiagnosticKind::MissingName => "E1001",
            DiagnosticKind::MissingBody => "E1002",
            DiagnosticKind::UnexpectedEnd => "E1003",
            DiagnosticKind::UnterminatedBlock => "E1004",
            DiagnosticKind::UnbalancedParens => "E1005",
            DiagnosticKind::UnexpectedToken => "W2000",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        let kinds = [
            DiagnosticKind::TokenizeError,
            DiagnosticKind::MissingName,
            DiagnosticKind::MissingBody,
            DiagnosticKind::UnexpectedEnd,
            DiagnosticKind::UnterminatedBlock,
            DiagnosticKind::UnbalancedParens,
            DiagnosticKind::UnexpectedToken,
        ];
        let mut codes: Vec<_> = kinds.iter().map(|k| k.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn test_display_includes_location() {
        let diag = Diagnostic::error(DiagnosticKind::MissingName, "expected a procedure name")
            .with_span(Span::new(3, 8, 1));
        assert_eq!(
            diag.to_string(),
            "[E1001] expected a procedure name at 3:8"
        );
        assert!(diag.is_error());
    }
}
