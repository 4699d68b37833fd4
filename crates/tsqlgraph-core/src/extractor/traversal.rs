//! Statement traversal - walks an object body and emits its edges

use tracing::{debug, trace};

use crate::ast::{
    BeginDialogStatement, ExecutableEntity, InsertStatement, MergeAction, MergeStatement,
    ModifyStatement, OutputInto, Statement, TableReference,
};
use crate::graph::{DependencyEdge, EdgeKind, EdgeSink};

use super::alias::{self, ResolvedTarget};

/// Target used for `EXEC (...)` since dynamic SQL is not introspected
pub const DYNAMIC_EXEC_TARGET: &str = "EXEC()";

/// Visits every statement under one top-level object.
///
/// The enclosing object's identity is the source of every edge, however
/// deeply the statement is nested.
pub struct Traversal<'a, S> {
    source: &'a str,
    sink: &'a mut S,
}

impl<'a, S: EdgeSink> Traversal<'a, S> {
    pub fn new(source: &'a str, sink: &'a mut S) -> Self {
        Self { source, sink }
    }

    pub fn visit_statements(&mut self, statements: &[Statement]) -> Result<(), S::Error> {
        for stmt in statements {
            self.visit_statement(stmt)?;
        }
        Ok(())
    }

    pub fn visit_statement(&mut self, stmt: &Statement) -> Result<(), S::Error> {
        match stmt {
            Statement::Insert(insert) => self.visit_insert(insert),
            Statement::Update(update) => self.visit_modify(update, EdgeKind::Update),
            Statement::Delete(delete) => self.visit_modify(delete, EdgeKind::Delete),
            Statement::Merge(merge) => self.visit_merge(merge),
            Statement::Truncate(name) => self.emit(name.resolve(), EdgeKind::Trunc),
            Statement::Execute(entity) => self.visit_execute(entity),
            Statement::BeginDialog(dialog) => self.visit_begin_dialog(dialog),
            Statement::Block(statements) => self.visit_statements(statements),
            Statement::If {
                then_branch,
                else_branch,
            } => {
                self.visit_statement(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.visit_statement(else_branch)?;
                }
                Ok(())
            }
            Statement::While(body) => self.visit_statement(body),
            Statement::TryCatch {
                try_block,
                catch_block,
            } => {
                self.visit_statements(try_block)?;
                self.visit_statements(catch_block)
            }
            // Definitions nested in a body keep the enclosing identity
            Statement::CreateProcedure(def) => self.visit_statements(&def.body),
            Statement::CreateTrigger(def) => self.visit_statements(&def.body),
            Statement::Other { .. } => Ok(()),
        }
    }

    fn visit_insert(&mut self, insert: &InsertStatement) -> Result<(), S::Error> {
        match &insert.target {
            TableReference::Named { name, .. } => self.emit(name.resolve(), EdgeKind::Insert)?,
            other => trace!(reference = ?other, "INSERT target is not a named table"),
        }
        self.visit_output_into(insert.output_into.as_ref())
    }

    fn visit_modify(&mut self, stmt: &ModifyStatement, kind: EdgeKind) -> Result<(), S::Error> {
        match &stmt.target {
            TableReference::Named { name, alias } => {
                let key = alias::lookup_key(name, alias.as_deref());
                match alias::resolve(&key, stmt.from.as_deref()) {
                    ResolvedTarget::QualifiedName(resolved) => self.emit(resolved, kind)?,
                    ResolvedTarget::NotFound => self.emit(name.resolve(), kind)?,
                    ResolvedTarget::TableVariable => {
                        trace!(alias = %key, "{} target is a table variable", kind)
                    }
                }
            }
            other => trace!(reference = ?other, "{} target is not a named table", kind),
        }
        self.visit_output_into(stmt.output_into.as_ref())
    }

    fn visit_merge(&mut self, merge: &MergeStatement) -> Result<(), S::Error> {
        match &merge.target {
            TableReference::Named { name, .. } => {
                let target = name.resolve();
                for action in &merge.actions {
                    let kind = match action {
                        MergeAction::Update => EdgeKind::Update,
                        MergeAction::Delete => EdgeKind::Delete,
                        MergeAction::Insert => EdgeKind::Insert,
                    };
                    self.emit(target.clone(), kind)?;
                }
            }
            other => trace!(reference = ?other, "MERGE target is not a named table"),
        }
        self.visit_output_into(merge.output_into.as_ref())
    }

    fn visit_output_into(&mut self, output: Option<&OutputInto>) -> Result<(), S::Error> {
        match output.map(|o| &o.target) {
            Some(TableReference::Named { name, .. }) => self.emit(name.resolve(), EdgeKind::Insert),
            _ => Ok(()),
        }
    }

    fn visit_execute(&mut self, entity: &ExecutableEntity) -> Result<(), S::Error> {
        match entity {
            ExecutableEntity::Procedure(name) => self.emit(name.resolve(), EdgeKind::Exec),
            ExecutableEntity::StringList => self.emit(DYNAMIC_EXEC_TARGET, EdgeKind::Exec),
            ExecutableEntity::Variable(var) => {
                trace!(variable = %var, "EXEC of a procedure variable");
                Ok(())
            }
        }
    }

    fn visit_begin_dialog(&mut self, dialog: &BeginDialogStatement) -> Result<(), S::Error> {
        match &dialog.contract {
            Some(contract) => {
                let target = format!("{}.{}", dialog.initiator_service, contract);
                self.emit(target, EdgeKind::Queue)
            }
            None => {
                trace!(service = %dialog.initiator_service, "BEGIN DIALOG without a contract");
                Ok(())
            }
        }
    }

    fn emit(&mut self, target: impl Into<String>, kind: EdgeKind) -> Result<(), S::Error> {
        let edge = DependencyEdge::new(self.source, target, kind);
        debug!(from = %edge.source, to = %edge.target, kind = %edge.kind, "edge");
        self.sink.emit(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::ObjectName;

    fn named(schema: &str, base: &str) -> TableReference {
        TableReference::Named {
            name: ObjectName::with_schema(schema, base),
            alias: None,
        }
    }

    fn run(statements: &[Statement]) -> Vec<DependencyEdge> {
        let mut edges = Vec::new();
        let mut traversal = Traversal::new("dbo.P", &mut edges);
        traversal.visit_statements(statements).unwrap();
        edges
    }

    #[test]
    fn test_insert_into_named_table() {
        let edges = run(&[Statement::Insert(InsertStatement {
            target: named("S", "T"),
            output_into: None,
        })]);
        assert_eq!(edges, vec![DependencyEdge::new("dbo.P", "S.T", EdgeKind::Insert)]);
    }

    #[test]
    fn test_insert_into_table_variable_is_skipped() {
        let edges = run(&[Statement::Insert(InsertStatement {
            target: TableReference::Variable {
                variable: "@t".to_string(),
                alias: None,
            },
            output_into: None,
        })]);
        assert!(edges.is_empty());
    }

    #[test]
    fn test_update_emits_before_output_into() {
        let edges = run(&[Statement::Update(ModifyStatement {
            target: named("S", "T"),
            from: None,
            output_into: Some(OutputInto {
                target: named("S", "Audit"),
            }),
        })]);
        assert_eq!(
            edges,
            vec![
                DependencyEdge::new("dbo.P", "S.T", EdgeKind::Update),
                DependencyEdge::new("dbo.P", "S.Audit", EdgeKind::Insert),
            ]
        );
    }

    #[test]
    fn test_output_into_survives_suppressed_target() {
        let edges = run(&[Statement::Delete(ModifyStatement {
            target: TableReference::Named {
                name: ObjectName::new("v"),
                alias: None,
            },
            from: Some(vec![TableReference::Variable {
                variable: "@v".to_string(),
                alias: Some("v".to_string()),
            }]),
            output_into: Some(OutputInto {
                target: named("S", "Log"),
            }),
        })]);
        assert_eq!(
            edges,
            vec![DependencyEdge::new("dbo.P", "S.Log", EdgeKind::Insert)]
        );
    }

    #[test]
    fn test_nested_control_flow_keeps_source() {
        let edges = run(&[Statement::If {
            then_branch: Box::new(Statement::Block(vec![Statement::While(Box::new(
                Statement::Truncate(ObjectName::with_schema("S", "T")),
            ))])),
            else_branch: Some(Box::new(Statement::TryCatch {
                try_block: vec![Statement::Execute(ExecutableEntity::StringList)],
                catch_block: vec![Statement::Execute(ExecutableEntity::Procedure(
                    ObjectName::with_schema("dbo", "LogError"),
                ))],
            })),
        }]);
        assert_eq!(
            edges,
            vec![
                DependencyEdge::new("dbo.P", "S.T", EdgeKind::Trunc),
                DependencyEdge::new("dbo.P", "EXEC()", EdgeKind::Exec),
                DependencyEdge::new("dbo.P", "dbo.LogError", EdgeKind::Exec),
            ]
        );
    }

    #[test]
    fn test_merge_emits_one_edge_per_action() {
        let edges = run(&[Statement::Merge(MergeStatement {
            target: named("S", "T"),
            actions: vec![MergeAction::Delete, MergeAction::Update, MergeAction::Insert],
            output_into: None,
        })]);
        let kinds: Vec<_> = edges.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EdgeKind::Delete, EdgeKind::Update, EdgeKind::Insert]
        );
        assert!(edges.iter().all(|e| e.target == "S.T"));
    }

    #[test]
    fn test_begin_dialog_target() {
        let edges = run(&[
            Statement::BeginDialog(BeginDialogStatement {
                initiator_service: "//Svc/Init".to_string(),
                contract: Some("//Contract".to_string()),
            }),
            Statement::BeginDialog(BeginDialogStatement {
                initiator_service: "NoContract".to_string(),
                contract: None,
            }),
        ]);
        assert_eq!(
            edges,
            vec![DependencyEdge::new(
                "dbo.P",
                "//Svc/Init.//Contract",
                EdgeKind::Queue
            )]
        );
    }

    #[test]
    fn test_exec_variable_is_skipped() {
        let edges = run(&[
            Statement::Execute(ExecutableEntity::Variable("@proc".to_string())),
            Statement::other("SELECT"),
        ]);
        assert!(edges.is_empty());
    }
}
