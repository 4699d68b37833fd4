//! Token cursor shared by the statement and table-source parsers
//!
//! Holds only significant tokens: whitespace and comments are dropped when
//! the script is tokenized, so every helper here looks at real tokens.

use sqlparser::tokenizer::{Token, TokenWithSpan};

use super::keywords;
use crate::error::Span;
use crate::name::ObjectName;

/// Cursor over a token stream with T-SQL navigation helpers
pub(super) struct TokenParser {
    tokens: Vec<TokenWithSpan>,
    pos: usize,
}

impl TokenParser {
    pub(super) fn from_tokens(tokens: Vec<TokenWithSpan>) -> Self {
        Self { tokens, pos: 0 }
    }

    // ========================================================================
    // Position and state
    // ========================================================================

    #[inline]
    pub(super) fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    #[inline]
    pub(super) fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub(super) fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.tokens.len());
    }

    #[cfg(test)]
    pub(super) fn tokens(&self) -> &[TokenWithSpan] {
        &self.tokens
    }

    /// Move to the end of the stream
    pub(super) fn skip_all(&mut self) {
        self.pos = self.tokens.len();
    }

    // ========================================================================
    // Token access
    // ========================================================================

    #[inline]
    pub(super) fn current_token(&self) -> Option<&TokenWithSpan> {
        self.tokens.get(self.pos)
    }

    #[inline]
    pub(super) fn peek(&self, offset: usize) -> Option<&TokenWithSpan> {
        self.tokens.get(self.pos + offset)
    }

    #[inline]
    pub(super) fn previous(&self) -> Option<&TokenWithSpan> {
        self.pos.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    #[inline]
    pub(super) fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    #[inline]
    pub(super) fn advance_by(&mut self, count: usize) {
        self.pos = (self.pos + count).min(self.tokens.len());
    }

    /// Span of the current token, or of the last token once at the end
    pub(super) fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| Span::from_sqlparser(&t.span))
            .unwrap_or_else(|| Span::new(1, 1, 0))
    }

    // ========================================================================
    // Token checks
    // ========================================================================

    /// Check if the current token is the unquoted word `word` (case-insensitive)
    #[inline]
    pub(super) fn check_word(&self, word: &str) -> bool {
        self.peek_word(0, word)
    }

    pub(super) fn peek_word(&self, offset: usize, word: &str) -> bool {
        self.peek(offset)
            .and_then(|t| keywords::unquoted_word(&t.token))
            .is_some_and(|w| w.eq_ignore_ascii_case(word))
    }

    /// Check the current token type by discriminant
    #[inline]
    pub(super) fn check_token(&self, expected: &Token) -> bool {
        self.peek_token(0, expected)
    }

    pub(super) fn peek_token(&self, offset: usize, expected: &Token) -> bool {
        self.peek(offset).is_some_and(|t| {
            std::mem::discriminant(&t.token) == std::mem::discriminant(expected)
        })
    }

    /// Consume the unquoted word `word` if it is next
    pub(super) fn expect_word(&mut self, word: &str) -> Option<()> {
        if self.check_word(word) {
            self.advance();
            Some(())
        } else {
            None
        }
    }

    /// Uppercased value of the current token if it is an unquoted word
    pub(super) fn current_keyword(&self) -> Option<String> {
        self.current_token()
            .and_then(|t| keywords::unquoted_word(&t.token))
            .map(str::to_ascii_uppercase)
    }

    /// The current token as a `@variable` name, if it is one
    pub(super) fn current_variable(&self) -> Option<String> {
        self.current_token()
            .and_then(|t| keywords::unquoted_word(&t.token))
            .filter(|w| w.starts_with('@'))
            .map(str::to_string)
    }

    /// Whether the current token begins a new statement
    pub(super) fn starts_statement(&self) -> bool {
        keywords::starts_statement(&self.tokens, self.pos)
    }

    // ========================================================================
    // Names
    // ========================================================================

    /// Parse an identifier (bracketed, quoted or bare). Returns the value
    /// without delimiters.
    pub(super) fn parse_identifier(&mut self) -> Option<String> {
        match &self.current_token()?.token {
            Token::Word(w) => {
                let value = w.value.clone();
                self.advance();
                Some(value)
            }
            _ => None,
        }
    }

    /// Parse a multi-part name such as `srv.db.dbo.T`, `[dbo].[T]` or `db..T`.
    ///
    /// Position is left unchanged when no name can be read.
    pub(super) fn parse_object_name(&mut self) -> Option<ObjectName> {
        let start = self.pos;
        let Some(first) = self.parse_identifier() else {
            return None;
        };
        let mut parts = vec![Some(first)];
        while self.check_token(&Token::Period) {
            self.advance();
            if self.check_token(&Token::Period) {
                parts.push(None);
                continue;
            }
            match self.parse_identifier() {
                Some(part) => parts.push(Some(part)),
                None => {
                    self.pos = start;
                    return None;
                }
            }
        }
        let name = ObjectName::from_parts(parts);
        if name.is_none() {
            self.pos = start;
        }
        name
    }

    // ========================================================================
    // Parentheses
    // ========================================================================

    /// Index of the `)` closing the `(` at the current position
    pub(super) fn matching_paren(&self) -> Option<usize> {
        if !self.check_token(&Token::LParen) {
            return None;
        }
        let mut depth = 0usize;
        for (idx, token) in self.tokens.iter().enumerate().skip(self.pos) {
            match token.token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(idx);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Tokens strictly inside the parenthesized group at the current position
    pub(super) fn parenthesized_tokens(&self) -> Option<Vec<TokenWithSpan>> {
        let end = self.matching_paren()?;
        Some(self.tokens[self.pos + 1..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tokenize;

    fn parser(sql: &str) -> TokenParser {
        let (tokens, error) = tokenize(sql);
        assert!(error.is_none());
        TokenParser::from_tokens(tokens)
    }

    #[test]
    fn test_whitespace_and_comments_dropped() {
        let p = parser("SELECT -- comment\n /* block */ 1");
        assert_eq!(p.tokens().len(), 2);
        assert!(p.check_word("select"));
    }

    #[test]
    fn test_parse_bracketed_name() {
        let mut p = parser("[dbo].[My Table] x");
        let name = p.parse_object_name().unwrap();
        assert_eq!(name, ObjectName::with_schema("dbo", "My Table"));
        assert!(p.check_word("x"));
    }

    #[test]
    fn test_parse_name_with_empty_schema() {
        let mut p = parser("Sales..Orders");
        let name = p.parse_object_name().unwrap();
        assert_eq!(name.database.as_deref(), Some("Sales"));
        assert_eq!(name.schema, None);
        assert_eq!(name.base, "Orders");
    }

    #[test]
    fn test_parse_name_failure_keeps_position() {
        let mut p = parser("dbo.(");
        assert!(p.parse_object_name().is_none());
        assert_eq!(p.pos(), 0);
    }

    #[test]
    fn test_variable_is_a_single_word() {
        let p = parser("@orders");
        assert_eq!(p.current_variable().as_deref(), Some("@orders"));
    }

    #[test]
    fn test_matching_paren() {
        let p = parser("(a, (b, c), d) rest");
        assert_eq!(p.matching_paren(), Some(8));
        assert_eq!(p.parenthesized_tokens().unwrap().len(), 7);
    }

    #[test]
    fn test_unbalanced_paren() {
        let p = parser("(a, (b)");
        assert_eq!(p.matching_paren(), None);
    }

    #[test]
    fn test_quoted_word_is_not_a_keyword() {
        let p = parser("[SELECT]");
        assert!(!p.check_word("SELECT"));
        assert_eq!(p.current_keyword(), None);
    }
}
