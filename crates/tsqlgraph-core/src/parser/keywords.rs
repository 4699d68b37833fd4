//! Keyword tables and statement-boundary detection
//!
//! T-SQL does not require `;` between statements, so a statement also ends
//! where a keyword that can only begin a statement appears at the top level.

use sqlparser::tokenizer::{Token, TokenWithSpan};

/// Keywords that begin a statement. `WITH` is dispatched at a statement
/// start but never ends the previous statement.
const STATEMENT_KEYWORDS: &[&str] = &[
    "ALTER",
    "BEGIN",
    "BREAK",
    "BULK",
    "CHECKPOINT",
    "CLOSE",
    "COMMIT",
    "CONTINUE",
    "CREATE",
    "DBCC",
    "DEALLOCATE",
    "DECLARE",
    "DELETE",
    "DENY",
    "DISABLE",
    "DROP",
    "ELSE",
    "ENABLE",
    "END",
    "EXEC",
    "EXECUTE",
    "FETCH",
    "GOTO",
    "GRANT",
    "IF",
    "INSERT",
    "KILL",
    "MERGE",
    "OPEN",
    "PRINT",
    "RAISERROR",
    "READTEXT",
    "RECEIVE",
    "RECONFIGURE",
    "RETURN",
    "REVERT",
    "REVOKE",
    "ROLLBACK",
    "SAVE",
    "SELECT",
    "SEND",
    "SET",
    "SETUSER",
    "SHUTDOWN",
    "THROW",
    "TRUNCATE",
    "UPDATE",
    "UPDATETEXT",
    "USE",
    "WAITFOR",
    "WHILE",
    "WITH",
    "WRITETEXT",
];

/// A statement keyword right after one of these continues the statement
/// (`UNION SELECT`, `CURSOR FOR SELECT`, `THEN UPDATE`, ...)
const CONTINUATION_WORDS: &[&str] = &[
    "AFTER",
    "ALL",
    "BULK",
    "CROSS",
    "DENY",
    "EXCEPT",
    "FOR",
    "FULL",
    "GRANT",
    "INNER",
    "INTERSECT",
    "LEFT",
    "OF",
    "OUTER",
    "REVOKE",
    "RIGHT",
    "THEN",
    "UNION",
    "WITH",
];

/// `DROP <kind> IF EXISTS`, `ALTER TABLE ... DROP COLUMN IF EXISTS`
const DROP_OBJECT_WORDS: &[&str] = &[
    "ASSEMBLY",
    "COLUMN",
    "CONSTRAINT",
    "DATABASE",
    "DEFAULT",
    "FUNCTION",
    "INDEX",
    "PROC",
    "PROCEDURE",
    "ROLE",
    "RULE",
    "SCHEMA",
    "SEQUENCE",
    "SYNONYM",
    "TABLE",
    "TRIGGER",
    "TYPE",
    "USER",
    "VIEW",
];

/// Words that end a table source and therefore cannot be a bare alias
const CLAUSE_KEYWORDS: &[&str] = &[
    "APPLY",
    "AS",
    "CROSS",
    "EXCEPT",
    "FOR",
    "FROM",
    "FULL",
    "GROUP",
    "HASH",
    "HAVING",
    "INNER",
    "INTERSECT",
    "INTO",
    "JOIN",
    "LEFT",
    "LOOP",
    "ON",
    "OPTION",
    "ORDER",
    "OUTER",
    "OUTPUT",
    "PIVOT",
    "REMOTE",
    "RIGHT",
    "TABLESAMPLE",
    "THEN",
    "UNION",
    "UNPIVOT",
    "USING",
    "VALUES",
    "WHEN",
    "WHERE",
];

/// Words that may precede `JOIN`/`APPLY` in a join operator
pub(super) const JOIN_MODIFIERS: &[&str] = &[
    "CROSS", "FULL", "HASH", "INNER", "LEFT", "LOOP", "MERGE", "OUTER", "REMOTE", "RIGHT",
];

/// Legacy table hints written as `T (NOLOCK)`
const TABLE_HINTS: &[&str] = &[
    "FORCESEEK",
    "HOLDLOCK",
    "INDEX",
    "NOLOCK",
    "NOWAIT",
    "PAGLOCK",
    "READCOMMITTED",
    "READPAST",
    "READUNCOMMITTED",
    "REPEATABLEREAD",
    "ROWLOCK",
    "SERIALIZABLE",
    "SNAPSHOT",
    "TABLOCK",
    "TABLOCKX",
    "UPDLOCK",
    "XLOCK",
];

/// Value of a word token written without delimiters
pub(super) fn unquoted_word(token: &Token) -> Option<&str> {
    match token {
        Token::Word(w) if w.quote_style.is_none() => Some(&w.value),
        _ => None,
    }
}

/// `upper` must already be uppercased
pub(super) fn is_statement_keyword(upper: &str) -> bool {
    STATEMENT_KEYWORDS.contains(&upper)
}

pub(super) fn is_clause_keyword(upper: &str) -> bool {
    CLAUSE_KEYWORDS.contains(&upper) || is_statement_keyword(upper)
}

pub(super) fn is_table_hint(upper: &str) -> bool {
    TABLE_HINTS.contains(&upper)
}

/// Whether the token at `pos` begins a new statement
pub(super) fn starts_statement(tokens: &[TokenWithSpan], pos: usize) -> bool {
    let Some(word) = tokens.get(pos).and_then(|t| unquoted_word(&t.token)) else {
        return false;
    };
    let upper = word.to_ascii_uppercase();
    if upper == "WITH" || !is_statement_keyword(&upper) {
        return false;
    }

    let prev = pos.checked_sub(1).and_then(|i| tokens.get(i));
    match prev.map(|t| &t.token) {
        Some(Token::Period) | Some(Token::Comma) => return false,
        Some(token) => {
            if let Some(prev_word) = unquoted_word(token) {
                let prev_upper = prev_word.to_ascii_uppercase();
                if CONTINUATION_WORDS.contains(&prev_upper.as_str()) {
                    return false;
                }
                // ON DELETE SET NULL, THEN UPDATE SET ...
                if upper == "SET" && (prev_upper == "UPDATE" || prev_upper == "DELETE") {
                    return false;
                }
                if upper == "IF" && DROP_OBJECT_WORDS.contains(&prev_upper.as_str()) {
                    return false;
                }
                if prev_upper == "ON" && is_referential_action(tokens, pos) {
                    return false;
                }
            }
        }
        None => {}
    }

    // IF UPDATE(column) inside trigger bodies
    let next = tokens.get(pos + 1).map(|t| &t.token);
    !(upper == "UPDATE" && matches!(next, Some(Token::LParen)))
}

/// `ON DELETE CASCADE`, `ON UPDATE SET NULL`, `ON DELETE NO ACTION`, ...
/// in foreign key definitions. `SET NOCOUNT ON` followed by a DELETE is
/// not one.
fn is_referential_action(tokens: &[TokenWithSpan], pos: usize) -> bool {
    let word = |offset: usize| {
        tokens
            .get(pos + offset)
            .and_then(|t| unquoted_word(&t.token))
            .map(str::to_ascii_uppercase)
    };
    if !matches!(word(0).as_deref(), Some("DELETE" | "UPDATE")) {
        return false;
    }
    match word(1).as_deref() {
        Some("CASCADE") => true,
        Some("SET") => matches!(word(2).as_deref(), Some("NULL" | "DEFAULT")),
        Some("NO") => word(2).as_deref() == Some("ACTION"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tokenize;

    fn boundaries(sql: &str) -> Vec<String> {
        let (tokens, _) = tokenize(sql);
        (0..tokens.len())
            .filter(|&i| starts_statement(&tokens, i))
            .map(|i| tokens[i].token.to_string().to_ascii_uppercase())
            .collect()
    }

    #[test]
    fn test_plain_sequence() {
        assert_eq!(
            boundaries("SET @a = 1 SELECT @a DELETE FROM T"),
            vec!["SET", "SELECT", "DELETE"]
        );
    }

    #[test]
    fn test_continuations() {
        assert_eq!(boundaries("SELECT 1 UNION ALL SELECT 2"), vec!["SELECT"]);
        assert_eq!(
            boundaries("DECLARE c CURSOR FOR SELECT a FROM T"),
            vec!["DECLARE"]
        );
        assert_eq!(
            boundaries("CREATE TABLE #t (a INT REFERENCES x ON DELETE SET NULL)"),
            vec!["CREATE"]
        );
    }

    #[test]
    fn test_set_option_on_ends_before_next_statement() {
        assert_eq!(
            boundaries("SET NOCOUNT ON INSERT INTO T VALUES (1) SET XACT_ABORT ON DELETE FROM T"),
            vec!["SET", "INSERT", "SET", "DELETE"]
        );
        assert_eq!(
            boundaries("SET IDENTITY_INSERT dbo.T ON EXEC dbo.P"),
            vec!["SET", "EXEC"]
        );
    }

    #[test]
    fn test_referential_actions_continue() {
        assert_eq!(
            boundaries(
                "ALTER TABLE c ADD CONSTRAINT fk FOREIGN KEY (p) REFERENCES p (id) \
                 ON DELETE CASCADE ON UPDATE NO ACTION"
            ),
            vec!["ALTER"]
        );
    }

    #[test]
    fn test_update_function_is_not_a_statement() {
        assert_eq!(
            boundaries("IF UPDATE(Col) DELETE FROM T"),
            vec!["IF", "DELETE"]
        );
    }

    #[test]
    fn test_drop_if_exists() {
        assert_eq!(boundaries("DROP TABLE IF EXISTS #t"), vec!["DROP"]);
    }

    #[test]
    fn test_with_never_ends_a_statement() {
        assert!(boundaries("SELECT 1 WITH x AS (SELECT 1) SELECT 2")
            .iter()
            .all(|k| k != "WITH"));
    }

    #[test]
    fn test_qualified_column_named_like_keyword() {
        assert_eq!(boundaries("SELECT t.update FROM T t"), vec!["SELECT"]);
    }
}
