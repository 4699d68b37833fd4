//! Syntax tree for T-SQL scripts
//!
//! The tree only models what dependency extraction needs. Statements that
//! carry no dependency information collapse into [`Statement::Other`], and
//! expressions are not represented at all.

use serde::Serialize;

use crate::name::ObjectName;

/// A parsed script: batches separated by `GO`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Script {
    pub batches: Vec<Batch>,
}

impl Script {
    /// Top-level statements across all batches, in document order
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.batches.iter().flat_map(|b| b.statements.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Batch {
    pub statements: Vec<Statement>,
    /// Line the batch starts on (1-indexed)
    pub start_line: usize,
}

/// How a module definition was introduced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DefinitionVerb {
    Create,
    CreateOrAlter,
    Alter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureDefinition {
    pub verb: DefinitionVerb,
    pub name: ObjectName,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerDefinition {
    pub verb: DefinitionVerb,
    pub name: ObjectName,
    pub target: TriggerTarget,
    pub body: Vec<Statement>,
}

/// What a trigger is attached to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TriggerTarget {
    /// DML trigger on a table or view
    Table(ObjectName),
    /// DDL trigger `ON DATABASE`
    Database,
    /// DDL trigger `ON ALL SERVER`
    AllServer,
}

/// A row source appearing in a DML target or FROM clause
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TableReference {
    /// `schema.table [AS alias]`
    Named {
        name: ObjectName,
        alias: Option<String>,
    },
    /// `@table_variable [AS alias]`
    Variable {
        variable: String,
        alias: Option<String>,
    },
    /// Parenthesized subquery or join, with the references found inside it
    Derived {
        references: Vec<TableReference>,
        alias: Option<String>,
    },
    /// Table-valued function, OPENQUERY and other opaque sources
    Function { alias: Option<String> },
}

impl TableReference {
    pub fn alias(&self) -> Option<&str> {
        match self {
            TableReference::Named { alias, .. }
            | TableReference::Variable { alias, .. }
            | TableReference::Derived { alias, .. }
            | TableReference::Function { alias } => alias.as_deref(),
        }
    }
}

/// `OUTPUT ... INTO <target>`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputInto {
    pub target: TableReference,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertStatement {
    pub target: TableReference,
    pub output_into: Option<OutputInto>,
}

/// UPDATE and DELETE share this shape
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifyStatement {
    pub target: TableReference,
    pub from: Option<Vec<TableReference>>,
    pub output_into: Option<OutputInto>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MergeAction {
    Update,
    Delete,
    Insert,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeStatement {
    pub target: TableReference,
    /// One entry per `WHEN ... THEN` clause, in source order
    pub actions: Vec<MergeAction>,
    pub output_into: Option<OutputInto>,
}

/// What an EXEC statement runs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExecutableEntity {
    /// `EXEC schema.proc ...`
    Procedure(ObjectName),
    /// `EXEC @proc_name_variable ...`
    Variable(String),
    /// `EXEC ('dynamic sql' + @s)`
    StringList,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeginDialogStatement {
    pub initiator_service: String,
    pub contract: Option<String>,
}

/// Statement kinds recognized inside a script
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Statement {
    CreateProcedure(ProcedureDefinition),
    CreateTrigger(TriggerDefinition),
    Insert(InsertStatement),
    Update(ModifyStatement),
    Delete(ModifyStatement),
    Merge(MergeStatement),
    Truncate(ObjectName),
    Execute(ExecutableEntity),
    BeginDialog(BeginDialogStatement),
    /// `BEGIN ... END`
    Block(Vec<Statement>),
    If {
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    While(Box<Statement>),
    TryCatch {
        try_block: Vec<Statement>,
        catch_block: Vec<Statement>,
    },
    /// Anything else, identified by its leading keyword
    Other { keyword: String },
}

impl Statement {
    pub fn other(keyword: impl Into<String>) -> Self {
        Statement::Other {
            keyword: keyword.into(),
        }
    }
}
