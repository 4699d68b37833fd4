//! Table references: DML targets and FROM clauses

use sqlparser::tokenizer::{Token, TokenWithSpan};

use super::keywords::{self, JOIN_MODIFIERS};
use super::statement::StatementParser;
use super::tokens::TokenParser;
use crate::ast::TableReference;

/// Words that end a join condition
const CONDITION_ENDS: &[&str] = &[
    "EXCEPT",
    "FOR",
    "GROUP",
    "HAVING",
    "INTERSECT",
    "OPTION",
    "ORDER",
    "OUTPUT",
    "UNION",
    "WHEN",
    "WHERE",
];

impl StatementParser {
    /// Target of INSERT, UPDATE, DELETE, MERGE or OUTPUT INTO
    pub(super) fn parse_table_target(&mut self) -> Option<TableReference> {
        if let Some(variable) = self.base.current_variable() {
            self.base.advance();
            return Some(TableReference::Variable {
                variable,
                alias: None,
            });
        }
        let name = self.base.parse_object_name()?;
        if self.base.check_token(&Token::LParen) && !self.at_column_list() {
            // OPENQUERY(...), OPENROWSET(...)
            self.skip_parens();
            return Some(TableReference::Function { alias: None });
        }
        Some(TableReference::Named { name, alias: None })
    }

    /// `(a, b, t.c)` after an INSERT or OUTPUT INTO target
    fn at_column_list(&self) -> bool {
        self.base.parenthesized_tokens().is_some_and(|inner| {
            inner
                .iter()
                .all(|t| matches!(t.token, Token::Word(_) | Token::Comma | Token::Period))
        })
    }

    /// `[AS] alias` written after a DML target
    pub(super) fn parse_target_alias(&mut self, target: TableReference) -> TableReference {
        let alias = self.parse_alias();
        if alias.is_none() {
            return target;
        }
        match target {
            TableReference::Named { name, .. } => TableReference::Named { name, alias },
            TableReference::Variable { variable, .. } => {
                TableReference::Variable { variable, alias }
            }
            other => other,
        }
    }

    /// `WITH (hint, ...)`
    pub(super) fn skip_table_hints(&mut self) {
        if self.base.check_word("WITH") && self.base.peek_token(1, &Token::LParen) {
            self.base.advance();
            self.skip_parens();
        }
    }

    /// Comma-separated table sources with their joins, as in a FROM clause.
    /// Stops at the first token that cannot continue the clause.
    pub(super) fn parse_table_sources(&mut self) -> Vec<TableReference> {
        let mut references = Vec::new();
        loop {
            let Some(factor) = self.parse_table_factor() else {
                break;
            };
            references.push(factor);

            while let Some(length) = join_length(&self.base) {
                self.base.advance_by(length);
                if let Some(factor) = self.parse_table_factor() {
                    references.push(factor);
                }
                if self.base.expect_word("ON").is_some() {
                    references.extend(self.parse_join_condition());
                }
            }

            if self.base.check_token(&Token::Comma) {
                self.base.advance();
            } else {
                break;
            }
        }
        references
    }

    fn parse_table_factor(&mut self) -> Option<TableReference> {
        if self.base.check_token(&Token::LParen) {
            let inner = self.base.parenthesized_tokens();
            if !self.skip_parens() {
                return None;
            }
            let references = inner.map(nested_references).unwrap_or_default();
            let alias = self.parse_alias();
            self.skip_column_aliases();
            return Some(TableReference::Derived { references, alias });
        }

        if let Some(variable) = self.base.current_variable() {
            self.base.advance();
            let alias = self.parse_alias();
            self.skip_table_hints();
            return Some(TableReference::Variable { variable, alias });
        }

        if self
            .base
            .current_keyword()
            .is_some_and(|k| keywords::is_clause_keyword(&k))
        {
            return None;
        }
        let name = self.base.parse_object_name()?;

        if self.base.check_token(&Token::LParen) && !self.at_legacy_hint() {
            // table-valued function, OPENQUERY, OPENJSON(...) WITH (...)
            self.skip_parens();
            self.skip_table_hints();
            let alias = self.parse_alias();
            self.skip_column_aliases();
            return Some(TableReference::Function { alias });
        }
        if self.at_legacy_hint() {
            self.skip_parens();
        }

        self.skip_temporal_clause();
        let alias = self.parse_alias();
        self.skip_table_hints();
        if self.at_legacy_hint() {
            self.skip_parens();
        }
        self.skip_pivot();
        Some(TableReference::Named { name, alias })
    }

    /// `AS alias`, `alias`, or nothing
    pub(super) fn parse_alias(&mut self) -> Option<String> {
        if self.base.expect_word("AS").is_some() {
            return self.base.parse_identifier();
        }
        let token = self.base.current_token()?;
        let alias = match &token.token {
            Token::Word(w) if w.quote_style.is_some() => w.value.clone(),
            Token::Word(w) => {
                let upper = w.value.to_ascii_uppercase();
                if w.value.starts_with('@') || keywords::is_clause_keyword(&upper) {
                    return None;
                }
                w.value.clone()
            }
            _ => return None,
        };
        self.base.advance();
        Some(alias)
    }

    /// `T (NOLOCK)`, the form without WITH
    fn at_legacy_hint(&self) -> bool {
        self.base.check_token(&Token::LParen)
            && self
                .base
                .peek(1)
                .and_then(|t| keywords::unquoted_word(&t.token))
                .is_some_and(|w| keywords::is_table_hint(&w.to_ascii_uppercase()))
    }

    /// Column aliases of a derived table: `AS d (a, b)`
    fn skip_column_aliases(&mut self) {
        if self.base.check_token(&Token::LParen) {
            self.skip_parens();
        }
    }

    /// `FOR SYSTEM_TIME ...` on temporal tables
    fn skip_temporal_clause(&mut self) {
        if !(self.base.check_word("FOR") && self.base.peek_word(1, "SYSTEM_TIME")) {
            return;
        }
        self.base.advance_by(2);
        match self.base.current_keyword().as_deref() {
            Some("ALL") => self.base.advance(),
            Some("AS") => self.base.advance_by(4), // AS OF <value>
            Some("CONTAINED") => {
                self.base.advance_by(2);
                if self.base.check_token(&Token::LParen) {
                    self.skip_parens();
                }
            }
            // FROM a TO b, BETWEEN a AND b
            _ => self.base.advance_by(4),
        }
    }

    /// `PIVOT (...) AS p` and `UNPIVOT (...) AS u`
    fn skip_pivot(&mut self) {
        while (self.base.check_word("PIVOT") || self.base.check_word("UNPIVOT"))
            && self.base.peek_token(1, &Token::LParen)
        {
            self.base.advance();
            self.skip_parens();
            self.parse_alias();
        }
    }

    /// Skip a join condition, returning the sources of its subqueries
    fn parse_join_condition(&mut self) -> Vec<TableReference> {
        let mut references = Vec::new();
        self.scan_while_not(
            |p| {
                p.check_token(&Token::Comma)
                    || join_length(p).is_some()
                    || p.current_keyword()
                        .is_some_and(|k| CONDITION_ENDS.contains(&k.as_str()))
            },
            |inner| references.extend(subquery_references(inner)),
        );
        references
    }

    /// Every table reference in the tokens of a parenthesized source,
    /// including the FROM clauses of nested subqueries
    fn collect_nested_references(&mut self) -> Vec<TableReference> {
        let mut references = Vec::new();
        let is_query = matches!(
            self.base.current_keyword().as_deref(),
            Some("SELECT" | "WITH" | "VALUES")
        );
        if !is_query {
            // nested join: (A a JOIN B b ON ...)
            references.extend(self.parse_table_sources());
        }
        references.extend(self.collect_from_clauses());
        references
    }

    /// Sources of every FROM in the remaining tokens
    fn collect_from_clauses(&mut self) -> Vec<TableReference> {
        let mut references = Vec::new();
        while !self.base.is_at_end() {
            if self.base.expect_word("FROM").is_some() {
                references.extend(self.parse_table_sources());
            } else {
                self.base.advance();
            }
        }
        references
    }
}

fn nested_references(tokens: Vec<TokenWithSpan>) -> Vec<TableReference> {
    StatementParser::new(tokens).collect_nested_references()
}

/// Sources of the subqueries in a parenthesized expression such as
/// `(SELECT id FROM dbo.V)`; a plain `(a.id = b.id)` has none
fn subquery_references(tokens: Vec<TokenWithSpan>) -> Vec<TableReference> {
    StatementParser::new(tokens).collect_from_clauses()
}

/// Number of tokens in the join operator at the current position, e.g. 3
/// for `LEFT OUTER JOIN` and 2 for `CROSS APPLY`
fn join_length(base: &TokenParser) -> Option<usize> {
    let mut offset = 0;
    loop {
        let word = base
            .peek(offset)
            .and_then(|t| keywords::unquoted_word(&t.token))?
            .to_ascii_uppercase();
        if word == "JOIN" || word == "APPLY" {
            return Some(offset + 1);
        }
        // LEFT(...) and RIGHT(...) are string functions
        if !JOIN_MODIFIERS.contains(&word.as_str()) || base.peek_token(offset + 1, &Token::LParen)
        {
            return None;
        }
        offset += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::ObjectName;
    use crate::parser::tokenize;

    fn sources(sql: &str) -> (Vec<TableReference>, Option<String>) {
        let (tokens, error) = tokenize(sql);
        assert!(error.is_none());
        let mut parser = StatementParser::new(tokens);
        let references = parser.parse_table_sources();
        let rest = parser.base.current_keyword();
        (references, rest)
    }

    fn named(schema: &str, base: &str, alias: Option<&str>) -> TableReference {
        TableReference::Named {
            name: ObjectName::with_schema(schema, base),
            alias: alias.map(str::to_string),
        }
    }

    #[test]
    fn test_comma_list_and_joins() {
        let (refs, rest) = sources(
            "S.A a, S.B AS b LEFT OUTER JOIN S.C c ON c.id = LEFT(b.code, 2)
             CROSS APPLY dbo.fn(a.id) f WHERE 1 = 1",
        );
        assert_eq!(
            refs,
            vec![
                named("S", "A", Some("a")),
                named("S", "B", Some("b")),
                named("S", "C", Some("c")),
                TableReference::Function {
                    alias: Some("f".to_string())
                },
            ]
        );
        assert_eq!(rest.as_deref(), Some("WHERE"));
    }

    #[test]
    fn test_table_variable_with_alias() {
        let (refs, _) = sources("@rows r JOIN dbo.T t ON t.id = r.id");
        assert_eq!(
            refs,
            vec![
                TableReference::Variable {
                    variable: "@rows".to_string(),
                    alias: Some("r".to_string()),
                },
                named("dbo", "T", Some("t")),
            ]
        );
    }

    #[test]
    fn test_derived_table_collects_inner_references() {
        let (refs, _) = sources(
            "(SELECT x.id FROM S.X x WHERE x.id IN (SELECT id FROM S.Y)) AS d (id)
             INNER HASH JOIN S.Z z ON z.id = d.id",
        );
        assert_eq!(
            refs,
            vec![
                TableReference::Derived {
                    references: vec![named("S", "X", Some("x")), named("S", "Y", None)],
                    alias: Some("d".to_string()),
                },
                named("S", "Z", Some("z")),
            ]
        );
    }

    #[test]
    fn test_parenthesized_join() {
        let (refs, _) = sources("(S.A a JOIN S.B b ON a.id = b.id)");
        assert_eq!(
            refs,
            vec![TableReference::Derived {
                references: vec![named("S", "A", Some("a")), named("S", "B", Some("b"))],
                alias: None,
            }]
        );
    }

    #[test]
    fn test_hints_do_not_become_aliases() {
        let (refs, _) = sources("dbo.T t WITH (NOLOCK), dbo.U (NOLOCK), [dbo].[V] [v]");
        assert_eq!(
            refs,
            vec![
                named("dbo", "T", Some("t")),
                named("dbo", "U", None),
                named("dbo", "V", Some("v")),
            ]
        );
    }

    #[test]
    fn test_subqueries_in_join_condition() {
        let (refs, rest) = sources(
            "dbo.T t JOIN dbo.U u ON (u.id = t.id) AND u.id IN (SELECT id FROM dbo.V x)
             WHERE EXISTS (SELECT 1 FROM dbo.W)",
        );
        assert_eq!(
            refs,
            vec![
                named("dbo", "T", Some("t")),
                named("dbo", "U", Some("u")),
                named("dbo", "V", Some("x")),
            ]
        );
        assert_eq!(rest.as_deref(), Some("WHERE"));
    }

    #[test]
    fn test_join_length() {
        let (tokens, _) = tokenize("LEFT OUTER JOIN");
        assert_eq!(join_length(&TokenParser::from_tokens(tokens)), Some(3));
        let (tokens, _) = tokenize("LEFT(x, 1)");
        assert_eq!(join_length(&TokenParser::from_tokens(tokens)), None);
    }
}
