//! Statement parser for one batch
//!
//! Recognizes the statement forms that carry dependencies and skips the
//! rest token by token. Errors never abort a batch: they are recorded as
//! diagnostics and parsing resumes at the next statement boundary.

use sqlparser::tokenizer::{Token, TokenWithSpan};

use super::keywords;
use super::tokens::TokenParser;
use crate::ast::{
    BeginDialogStatement, DefinitionVerb, ExecutableEntity, InsertStatement, MergeAction,
    MergeStatement, ModifyStatement, OutputInto, ProcedureDefinition, Statement, TableReference,
    TriggerDefinition, TriggerTarget,
};
use crate::error::{Diagnostic, DiagnosticKind, Span};

/// Where a statement list stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    /// End of the batch
    Batch,
    /// `END`
    End,
    /// `END TRY`
    EndTry,
    /// `END CATCH`
    EndCatch,
}

pub(super) struct StatementParser {
    pub(super) base: TokenParser,
    diagnostics: Vec<Diagnostic>,
}

impl StatementParser {
    pub(super) fn new(tokens: Vec<TokenWithSpan>) -> Self {
        Self {
            base: TokenParser::from_tokens(tokens),
            diagnostics: Vec::new(),
        }
    }

    pub(super) fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Parse every statement of the batch
    pub(super) fn parse_batch(&mut self) -> Vec<Statement> {
        self.parse_statements(Terminator::Batch, None)
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn error_here(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let span = self.base.current_span();
        self.report(Diagnostic::error(kind, message).with_span(span));
    }

    // ========================================================================
    // Statement lists
    // ========================================================================

    fn parse_statements(&mut self, until: Terminator, opened_at: Option<Span>) -> Vec<Statement> {
        let mut statements = Vec::new();
        loop {
            if self.base.is_at_end() {
                if until != Terminator::Batch {
                    let mut diag = Diagnostic::error(
                        DiagnosticKind::UnterminatedBlock,
                        "BEGIN without a matching END",
                    )
                    .with_help("add the missing END before the end of the batch");
                    if let Some(span) = opened_at {
                        diag = diag.with_span(span);
                    }
                    self.report(diag);
                }
                break;
            }

            if self.at_block_end() {
                if until == Terminator::Batch {
                    self.error_here(DiagnosticKind::UnexpectedEnd, "END without a matching BEGIN");
                    self.base.advance();
                    continue;
                }
                self.base.advance();
                match until {
                    Terminator::EndTry => {
                        self.base.expect_word("TRY");
                    }
                    Terminator::EndCatch => {
                        self.base.expect_word("CATCH");
                    }
                    Terminator::Batch | Terminator::End => {}
                }
                break;
            }

            let start = self.base.pos();
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
            if self.base.pos() == start {
                self.base.advance();
            }
        }
        statements
    }

    /// `END` closing a block, as opposed to `END CONVERSATION`
    fn at_block_end(&self) -> bool {
        self.base.check_word("END") && !self.base.peek_word(1, "CONVERSATION")
    }

    /// Parse one statement. Returns `None` for empty statements and for
    /// tokens that were skipped.
    fn parse_statement(&mut self) -> Option<Statement> {
        if self.base.check_token(&Token::SemiColon) {
            self.base.advance();
            return None;
        }
        let Some(keyword) = self.base.current_keyword() else {
            return self.skip_unexpected();
        };

        match keyword.as_str() {
            "CREATE" | "ALTER" => Some(self.parse_create_or_alter()),
            "WITH" => self.parse_with_prefix(),
            "INSERT" => Some(self.parse_insert()),
            "UPDATE" if !self.base.peek_word(1, "STATISTICS") => Some(self.parse_update()),
            "DELETE" => Some(self.parse_delete()),
            "MERGE" => Some(self.parse_merge()),
            "TRUNCATE" => Some(self.parse_truncate()),
            "EXEC" | "EXECUTE" => Some(self.parse_execute()),
            "BEGIN" => Some(self.parse_begin()),
            "IF" => Some(self.parse_if()),
            "WHILE" => Some(self.parse_while()),
            "END" if self.at_block_end() => None,
            "ELSE" => {
                self.error_here(DiagnosticKind::UnexpectedToken, "ELSE without a matching IF");
                self.base.advance();
                None
            }
            _ if keywords::is_statement_keyword(&keyword) => Some(self.parse_other(keyword)),
            _ if self.base.peek_token(1, &Token::Colon) => {
                // label
                self.base.advance_by(2);
                None
            }
            _ => self.skip_unexpected(),
        }
    }

    fn skip_unexpected(&mut self) -> Option<Statement> {
        let text = self
            .base
            .current_token()
            .map(|t| t.token.to_string())
            .unwrap_or_default();
        let span = self.base.current_span();
        self.report(
            Diagnostic::warning(
                DiagnosticKind::UnexpectedToken,
                format!("unexpected `{text}`, skipping to the next statement"),
            )
            .with_span(span),
        );
        self.base.advance();
        self.skip_rest();
        None
    }

    /// Statement with no dependency information
    fn parse_other(&mut self, keyword: String) -> Statement {
        self.base.advance();
        self.skip_rest();
        Statement::Other { keyword }
    }

    // ========================================================================
    // Skipping
    // ========================================================================

    /// Skip tokens until `stop` holds at the top level of the statement.
    ///
    /// Parenthesized groups and `CASE ... END` are stepped over. Returns
    /// `false` when the statement ends first: at `;`, at an unmatched `)`,
    /// at the next statement keyword or at the end of the batch.
    pub(super) fn skip_while_not(&mut self, stop: impl Fn(&TokenParser) -> bool) -> bool {
        self.scan_while_not(stop, |_| {})
    }

    /// [`Self::skip_while_not`], handing the inner tokens of every
    /// parenthesized group stepped over to `on_group`
    pub(super) fn scan_while_not(
        &mut self,
        stop: impl Fn(&TokenParser) -> bool,
        mut on_group: impl FnMut(Vec<TokenWithSpan>),
    ) -> bool {
        let mut case_depth = 0usize;
        while !self.base.is_at_end() {
            if self.base.check_token(&Token::SemiColon) || self.base.check_token(&Token::RParen) {
                return false;
            }
            if self.base.check_token(&Token::LParen) {
                if let Some(inner) = self.base.parenthesized_tokens() {
                    on_group(inner);
                }
                if !self.skip_parens() {
                    return false;
                }
                continue;
            }
            match self.base.current_keyword().as_deref() {
                Some("CASE") => case_depth += 1,
                Some("END") if case_depth > 0 => case_depth -= 1,
                _ if case_depth > 0 => {}
                _ => {
                    if stop(&self.base) {
                        return true;
                    }
                    if self.base.starts_statement() {
                        return false;
                    }
                }
            }
            self.base.advance();
        }
        false
    }

    /// Skip to one of `words` (uppercase). See [`Self::skip_while_not`].
    pub(super) fn skip_until(&mut self, words: &[&str]) -> bool {
        self.skip_while_not(|p| {
            p.current_keyword()
                .is_some_and(|k| words.contains(&k.as_str()))
        })
    }

    /// Skip the remainder of the current statement, including its `;`
    pub(super) fn skip_rest(&mut self) {
        self.skip_while_not(|_| false);
        self.consume_semicolon();
    }

    fn consume_semicolon(&mut self) {
        if self.base.check_token(&Token::SemiColon) {
            self.base.advance();
        }
    }

    /// Step over the parenthesized group at the current position
    pub(super) fn skip_parens(&mut self) -> bool {
        match self.base.matching_paren() {
            Some(end) => {
                self.base.set_pos(end + 1);
                true
            }
            None => {
                let span = self.base.current_span();
                self.report(
                    Diagnostic::error(DiagnosticKind::UnbalancedParens, "`(` is never closed")
                        .with_span(span)
                        .with_help("add the missing `)`"),
                );
                self.base.skip_all();
                false
            }
        }
    }

    /// `TOP (n) [PERCENT]` on DML statements
    fn skip_top(&mut self) {
        if self.base.expect_word("TOP").is_none() {
            return;
        }
        if self.base.check_token(&Token::LParen) {
            self.skip_parens();
        } else {
            self.base.advance();
        }
        self.base.expect_word("PERCENT");
    }

    // ========================================================================
    // Module definitions
    // ========================================================================

    fn parse_create_or_alter(&mut self) -> Statement {
        let keyword = self.base.current_keyword().unwrap_or_default();
        self.base.advance();
        let verb = if keyword == "ALTER" {
            DefinitionVerb::Alter
        } else if self.base.check_word("OR") && self.base.peek_word(1, "ALTER") {
            self.base.advance_by(2);
            DefinitionVerb::CreateOrAlter
        } else {
            DefinitionVerb::Create
        };

        match self.base.current_keyword().as_deref() {
            Some("PROCEDURE") | Some("PROC") => {
                self.base.advance();
                self.parse_procedure(verb)
            }
            Some("TRIGGER") => {
                self.base.advance();
                self.parse_trigger(verb)
            }
            _ => {
                self.skip_rest();
                Statement::Other { keyword }
            }
        }
    }

    fn parse_procedure(&mut self, verb: DefinitionVerb) -> Statement {
        let Some(name) = self.parse_definition_name() else {
            self.error_here(DiagnosticKind::MissingName, "expected a procedure name");
            self.base.skip_all();
            return Statement::other("PROCEDURE");
        };
        if !self.skip_to_body() {
            self.report(
                Diagnostic::error(
                    DiagnosticKind::MissingBody,
                    format!("procedure {} has no AS before its body", name.written()),
                )
                .with_span(self.base.current_span()),
            );
            return Statement::other("PROCEDURE");
        }
        let body = self.parse_statements(Terminator::Batch, None);
        Statement::CreateProcedure(ProcedureDefinition { verb, name, body })
    }

    fn parse_trigger(&mut self, verb: DefinitionVerb) -> Statement {
        let Some(name) = self.parse_definition_name() else {
            self.error_here(DiagnosticKind::MissingName, "expected a trigger name");
            self.base.skip_all();
            return Statement::other("TRIGGER");
        };
        if self.base.expect_word("ON").is_none() {
            self.error_here(
                DiagnosticKind::MissingName,
                format!("trigger {} has no ON clause", name.written()),
            );
            self.base.skip_all();
            return Statement::other("TRIGGER");
        }

        let target = if self.base.check_word("ALL") && self.base.peek_word(1, "SERVER") {
            self.base.advance_by(2);
            TriggerTarget::AllServer
        } else if self.base.expect_word("DATABASE").is_some() {
            TriggerTarget::Database
        } else if let Some(table) = self.base.parse_object_name() {
            TriggerTarget::Table(table)
        } else {
            self.error_here(
                DiagnosticKind::MissingName,
                format!("expected the table trigger {} is defined on", name.written()),
            );
            self.base.skip_all();
            return Statement::other("TRIGGER");
        };

        if !self.skip_to_body() {
            self.report(
                Diagnostic::error(
                    DiagnosticKind::MissingBody,
                    format!("trigger {} has no AS before its body", name.written()),
                )
                .with_span(self.base.current_span()),
            );
            return Statement::other("TRIGGER");
        }
        let body = self.parse_statements(Terminator::Batch, None);
        Statement::CreateTrigger(TriggerDefinition {
            verb,
            name,
            target,
            body,
        })
    }

    fn parse_definition_name(&mut self) -> Option<crate::name::ObjectName> {
        if self.base.check_word("AS") {
            return None;
        }
        self.base.parse_object_name()
    }

    /// Skip a procedure or trigger header up to and including its `AS`.
    ///
    /// `@param AS type` and `EXECUTE AS` do not count.
    fn skip_to_body(&mut self) -> bool {
        while !self.base.is_at_end() {
            if self.base.check_token(&Token::LParen) {
                if !self.skip_parens() {
                    return false;
                }
                continue;
            }
            if self.base.check_word("AS") {
                let in_header = self
                    .base
                    .previous()
                    .and_then(|t| keywords::unquoted_word(&t.token))
                    .is_some_and(|w| {
                        w.starts_with('@')
                            || w.eq_ignore_ascii_case("EXEC")
                            || w.eq_ignore_ascii_case("EXECUTE")
                    });
                self.base.advance();
                if !in_header {
                    return true;
                }
                continue;
            }
            self.base.advance();
        }
        false
    }

    // ========================================================================
    // Control flow
    // ========================================================================

    fn parse_begin(&mut self) -> Statement {
        let opened_at = self.base.current_span();
        if self.base.peek_word(1, "TRY") {
            self.base.advance_by(2);
            let try_block = self.parse_statements(Terminator::EndTry, Some(opened_at));
            let catch_block = if self.base.check_word("BEGIN") && self.base.peek_word(1, "CATCH") {
                let catch_at = self.base.current_span();
                self.base.advance_by(2);
                self.parse_statements(Terminator::EndCatch, Some(catch_at))
            } else {
                Vec::new()
            };
            return Statement::TryCatch {
                try_block,
                catch_block,
            };
        }
        if self.base.peek_word(1, "DIALOG") {
            return self.parse_begin_dialog();
        }
        if ["TRAN", "TRANSACTION", "DISTRIBUTED", "CONVERSATION"]
            .iter()
            .any(|w| self.base.peek_word(1, w))
        {
            return self.parse_other("BEGIN".to_string());
        }

        self.base.advance();
        // natively compiled modules: BEGIN ATOMIC WITH (...)
        if self.base.expect_word("ATOMIC").is_some() {
            if self.base.expect_word("WITH").is_some() && self.base.check_token(&Token::LParen) {
                self.skip_parens();
            }
        }
        Statement::Block(self.parse_statements(Terminator::End, Some(opened_at)))
    }

    /// Branch of IF/WHILE; an empty statement becomes an empty block
    fn parse_branch(&mut self) -> Statement {
        self.parse_statement()
            .unwrap_or_else(|| Statement::Block(Vec::new()))
    }

    fn parse_if(&mut self) -> Statement {
        self.base.advance();
        // the condition runs up to the first statement keyword
        self.skip_while_not(|_| false);
        let then_branch = Box::new(self.parse_branch());
        let else_branch = if self.base.expect_word("ELSE").is_some() {
            Some(Box::new(self.parse_branch()))
        } else {
            None
        };
        Statement::If {
            then_branch,
            else_branch,
        }
    }

    fn parse_while(&mut self) -> Statement {
        self.base.advance();
        self.skip_while_not(|_| false);
        Statement::While(Box::new(self.parse_branch()))
    }

    /// `WITH` common table expressions (or XMLNAMESPACES) ahead of a DML
    /// statement. The prefix is skipped and the statement parsed as usual.
    fn parse_with_prefix(&mut self) -> Option<Statement> {
        self.base.advance();
        self.skip_while_not(|_| false);
        if self.base.is_at_end() || !self.base.starts_statement() {
            self.consume_semicolon();
            return Some(Statement::other("WITH"));
        }
        self.parse_statement()
    }

    // ========================================================================
    // DML
    // ========================================================================

    fn parse_insert(&mut self) -> Statement {
        self.base.advance();
        self.skip_top();
        self.base.expect_word("INTO");
        let Some(target) = self.parse_table_target() else {
            self.error_here(DiagnosticKind::MissingName, "expected the INSERT target");
            self.skip_rest();
            return Statement::other("INSERT");
        };
        self.skip_table_hints();
        if self.base.check_token(&Token::LParen) {
            self.skip_parens();
        }

        let mut output_into = None;
        while self.base.expect_word("OUTPUT").is_some() {
            let found = self.parse_output_clause(&["VALUES", "DEFAULT", "OUTPUT"]);
            output_into = output_into.or(found);
        }

        // the source's own keyword would otherwise read as a new statement
        if let Some("SELECT" | "EXEC" | "EXECUTE" | "VALUES" | "DEFAULT") =
            self.base.current_keyword().as_deref()
        {
            self.base.advance();
        }
        self.skip_rest();
        Statement::Insert(InsertStatement {
            target,
            output_into,
        })
    }

    fn parse_update(&mut self) -> Statement {
        self.base.advance();
        self.skip_top();
        let Some(target) = self.parse_table_target() else {
            self.error_here(DiagnosticKind::MissingName, "expected the UPDATE target");
            self.skip_rest();
            return Statement::other("UPDATE");
        };
        self.skip_table_hints();
        let target = self.parse_target_alias(target);
        if self.base.expect_word("SET").is_some() {
            self.skip_until(&["OUTPUT", "FROM", "WHERE", "OPTION"]);
        }
        let (from, output_into) = self.parse_modify_tail();
        Statement::Update(ModifyStatement {
            target,
            from,
            output_into,
        })
    }

    fn parse_delete(&mut self) -> Statement {
        self.base.advance();
        self.skip_top();
        self.base.expect_word("FROM");
        let Some(target) = self.parse_table_target() else {
            self.error_here(DiagnosticKind::MissingName, "expected the DELETE target");
            self.skip_rest();
            return Statement::other("DELETE");
        };
        self.skip_table_hints();
        let target = self.parse_target_alias(target);
        let (from, output_into) = self.parse_modify_tail();
        Statement::Delete(ModifyStatement {
            target,
            from,
            output_into,
        })
    }

    /// OUTPUT, FROM, WHERE and OPTION clauses shared by UPDATE and DELETE
    fn parse_modify_tail(&mut self) -> (Option<Vec<TableReference>>, Option<OutputInto>) {
        let mut from: Option<Vec<TableReference>> = None;
        let mut output_into = None;
        loop {
            match self.base.current_keyword().as_deref() {
                Some("OUTPUT") => {
                    self.base.advance();
                    let found = self.parse_output_clause(&["FROM", "WHERE", "OPTION", "OUTPUT"]);
                    output_into = output_into.or(found);
                }
                Some("FROM") => {
                    self.base.advance();
                    let references = self.parse_table_sources();
                    from.get_or_insert_with(Vec::new).extend(references);
                }
                Some("WHERE") => {
                    self.base.advance();
                    self.skip_until(&["OPTION"]);
                }
                Some("OPTION") => {
                    self.base.advance();
                    if self.base.check_token(&Token::LParen) {
                        self.skip_parens();
                    }
                }
                _ => break,
            }
        }
        self.skip_rest();
        (from, output_into)
    }

    /// Column list of an OUTPUT clause, then its optional `INTO target`.
    /// The `OUTPUT` keyword is already consumed.
    fn parse_output_clause(&mut self, stop_words: &[&str]) -> Option<OutputInto> {
        let found_into = self.skip_while_not(|p| {
            p.current_keyword()
                .is_some_and(|k| k == "INTO" || stop_words.contains(&k.as_str()))
        });
        if !found_into || self.base.expect_word("INTO").is_none() {
            return None;
        }
        let target = self.parse_table_target();
        if target.is_none() {
            self.error_here(DiagnosticKind::MissingName, "expected the OUTPUT INTO target");
        }
        if self.base.check_token(&Token::LParen) {
            self.skip_parens();
        }
        target.map(|target| OutputInto { target })
    }

    fn parse_merge(&mut self) -> Statement {
        self.base.advance();
        self.skip_top();
        self.base.expect_word("INTO");
        let Some(target) = self.parse_table_target() else {
            self.error_here(DiagnosticKind::MissingName, "expected the MERGE target");
            self.skip_rest();
            return Statement::other("MERGE");
        };
        self.skip_table_hints();
        let target = self.parse_target_alias(target);

        // USING source ON condition
        self.skip_until(&["WHEN"]);

        let mut actions = Vec::new();
        let mut output_into = None;
        loop {
            match self.base.current_keyword().as_deref() {
                Some("WHEN") => {
                    self.base.advance();
                    if !self.skip_until(&["THEN"]) {
                        break;
                    }
                    self.base.advance();
                    match self.base.current_keyword().as_deref() {
                        Some("UPDATE") => actions.push(MergeAction::Update),
                        Some("DELETE") => actions.push(MergeAction::Delete),
                        Some("INSERT") => actions.push(MergeAction::Insert),
                        _ => {}
                    }
                    self.base.advance();
                    self.skip_until(&["WHEN", "OUTPUT", "OPTION"]);
                }
                Some("OUTPUT") => {
                    self.base.advance();
                    let found = self.parse_output_clause(&["OPTION", "WHEN", "OUTPUT"]);
                    output_into = output_into.or(found);
                }
                Some("OPTION") => {
                    self.base.advance();
                    if self.base.check_token(&Token::LParen) {
                        self.skip_parens();
                    }
                }
                _ => break,
            }
        }
        self.skip_rest();
        Statement::Merge(MergeStatement {
            target,
            actions,
            output_into,
        })
    }

    fn parse_truncate(&mut self) -> Statement {
        self.base.advance();
        if self.base.expect_word("TABLE").is_none() {
            self.skip_rest();
            return Statement::other("TRUNCATE");
        }
        match self.base.parse_object_name() {
            Some(name) => {
                self.skip_rest();
                Statement::Truncate(name)
            }
            None => {
                self.error_here(DiagnosticKind::MissingName, "expected the table to truncate");
                self.skip_rest();
                Statement::other("TRUNCATE")
            }
        }
    }

    fn parse_execute(&mut self) -> Statement {
        let keyword = self.base.current_keyword().unwrap_or_default();
        self.base.advance();

        // EXECUTE AS USER = ... switches context, it runs nothing
        if self.base.check_word("AS") {
            self.skip_rest();
            return Statement::Other { keyword };
        }

        let entity = if self.base.check_token(&Token::LParen) {
            self.skip_parens().then_some(ExecutableEntity::StringList)
        } else {
            self.parse_executable()
        };
        self.skip_rest();
        match entity {
            Some(entity) => Statement::Execute(entity),
            None => Statement::Other { keyword },
        }
    }

    /// `[@rc =] proc_name` or `[@rc =] @proc_variable`
    fn parse_executable(&mut self) -> Option<ExecutableEntity> {
        if let Some(variable) = self.base.current_variable() {
            self.base.advance();
            if !self.base.check_token(&Token::Eq) {
                return Some(ExecutableEntity::Variable(variable));
            }
            self.base.advance();
            if let Some(variable) = self.base.current_variable() {
                self.base.advance();
                return Some(ExecutableEntity::Variable(variable));
            }
        }
        match self.base.parse_object_name() {
            Some(name) => Some(ExecutableEntity::Procedure(name)),
            None => {
                self.error_here(DiagnosticKind::MissingName, "expected a procedure to execute");
                None
            }
        }
    }

    /// `BEGIN DIALOG [CONVERSATION] @h FROM SERVICE s TO SERVICE 't'
    /// [ON CONTRACT c] [WITH ...]`
    fn parse_begin_dialog(&mut self) -> Statement {
        let start = self.base.current_span();
        self.base.advance_by(2);
        self.base.expect_word("CONVERSATION");

        let mut initiator_service = None;
        let mut contract = None;
        while self.skip_until(&["FROM", "ON"]) {
            if self.base.expect_word("FROM").is_some() {
                if self.base.expect_word("SERVICE").is_some() {
                    initiator_service = self.base.parse_identifier();
                }
            } else {
                self.base.advance();
                if self.base.expect_word("CONTRACT").is_some() {
                    contract = self.base.parse_identifier();
                }
            }
        }
        self.consume_semicolon();

        match initiator_service {
            Some(initiator_service) => Statement::BeginDialog(BeginDialogStatement {
                initiator_service,
                contract,
            }),
            None => {
                self.report(
                    Diagnostic::error(
                        DiagnosticKind::MissingName,
                        "BEGIN DIALOG has no FROM SERVICE clause",
                    )
                    .with_span(start),
                );
                Statement::other("BEGIN")
            }
        }
    }
}
