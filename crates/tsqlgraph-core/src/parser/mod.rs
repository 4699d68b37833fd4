//! T-SQL parser
//!
//! Tokenizes with sqlparser's MSSQL dialect and builds the dependency-level
//! [`Script`] tree. The script is split into batches at `GO` lines first;
//! each batch is then parsed independently.

mod keywords;
mod statement;
mod table_source;
mod tokens;

use sqlparser::dialect::MsSqlDialect;
use sqlparser::tokenizer::{Token, TokenWithSpan, Tokenizer};
use tracing::trace;

use crate::ast::{Batch, Script};
use crate::error::{Diagnostic, DiagnosticKind, Span};
use statement::StatementParser;

/// A parsed script together with everything the parser had to say about it
#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    pub script: Script,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Parse a T-SQL script.
///
/// Never fails: problems are reported as diagnostics and the tree holds
/// whatever could be recovered.
pub fn parse_script(sql: &str) -> ParseOutput {
    let (tokens, tokenize_error) = tokenize(sql);
    let mut output = ParseOutput {
        script: Script::default(),
        diagnostics: tokenize_error.into_iter().collect(),
    };

    for tokens in split_batches(tokens) {
        let start_line = tokens
            .first()
            .map(|t| t.span.start.line as usize)
            .unwrap_or(1);
        let mut parser = StatementParser::new(tokens);
        let statements = parser.parse_batch();
        output.diagnostics.extend(parser.into_diagnostics());
        trace!(start_line, statements = statements.len(), "parsed batch");
        output.script.batches.push(Batch {
            statements,
            start_line,
        });
    }
    output
}

/// Significant tokens of `sql`. On a tokenizer error the tokens read so far
/// are kept and the error is returned as a diagnostic.
fn tokenize(sql: &str) -> (Vec<TokenWithSpan>, Option<Diagnostic>) {
    let dialect = MsSqlDialect {};
    let mut tokens = Vec::new();
    let error = Tokenizer::new(&dialect, sql)
        .tokenize_with_location_into_buf(&mut tokens)
        .err()
        .map(|e| {
            Diagnostic::error(DiagnosticKind::TokenizeError, e.message).with_span(Span::new(
                e.location.line as usize,
                e.location.column as usize,
                1,
            ))
        });
    tokens.retain(|t| !matches!(t.token, Token::Whitespace(_) | Token::EOF));
    (tokens, error)
}

/// Split at `GO` separators, dropping empty batches. `GO` must stand alone
/// on its line, optionally followed by a repeat count or `;`.
fn split_batches(tokens: Vec<TokenWithSpan>) -> Vec<Vec<TokenWithSpan>> {
    let separators: Vec<usize> = (0..tokens.len())
        .filter(|&i| is_batch_separator(&tokens, i))
        .collect();

    let mut batches = Vec::new();
    let mut current = Vec::new();
    let mut separator_line = None;
    for (i, token) in tokens.into_iter().enumerate() {
        if separators.binary_search(&i).is_ok() {
            batches.push(std::mem::take(&mut current));
            separator_line = Some(token.span.start.line);
            continue;
        }
        if separator_line == Some(token.span.start.line) {
            continue;
        }
        separator_line = None;
        current.push(token);
    }
    batches.push(current);
    batches.retain(|b| !b.is_empty());
    batches
}

fn is_batch_separator(tokens: &[TokenWithSpan], i: usize) -> bool {
    let token = &tokens[i];
    if !keywords::unquoted_word(&token.token).is_some_and(|w| w.eq_ignore_ascii_case("GO")) {
        return false;
    }
    let line = token.span.start.line;
    let first_on_line = i == 0 || tokens[i - 1].span.end.line < line;
    let last_on_line = match tokens.get(i + 1) {
        None => true,
        Some(next) => {
            next.span.start.line > line || matches!(next.token, Token::Number(..) | Token::SemiColon)
        }
    };
    first_on_line && last_on_line
}
