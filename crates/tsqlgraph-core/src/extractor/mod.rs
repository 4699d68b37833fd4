//! Dependency extraction
//!
//! The dispatcher walks the top-level statements of a script, picks out
//! procedure and trigger definitions, and runs one [`Traversal`] per object.

mod alias;
mod traversal;

use tracing::{debug, warn};

use crate::ast::{Script, Statement, TriggerTarget};
use crate::error::{Diagnostic, Error};
use crate::graph::{DependencyEdge, EdgeKind, EdgeSink};
use crate::name::ObjectName;
use crate::parser::parse_script;

pub use alias::{lookup_key, resolve as resolve_alias, ResolvedTarget};
pub use traversal::{Traversal, DYNAMIC_EXEC_TARGET};

/// A procedure or trigger definition found at the top of a batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TopLevelObject<'a> {
    Procedure {
        name: &'a ObjectName,
        body: &'a [Statement],
    },
    Trigger {
        name: &'a ObjectName,
        /// `None` for DDL triggers on the database or server
        table: Option<&'a ObjectName>,
        body: &'a [Statement],
    },
}

impl<'a> TopLevelObject<'a> {
    /// Recognize a top-level statement as an object definition
    pub fn from_statement(stmt: &'a Statement) -> Option<Self> {
        match stmt {
            Statement::CreateProcedure(def) => Some(TopLevelObject::Procedure {
                name: &def.name,
                body: &def.body,
            }),
            Statement::CreateTrigger(def) => Some(TopLevelObject::Trigger {
                name: &def.name,
                table: match &def.target {
                    TriggerTarget::Table(table) => Some(table),
                    TriggerTarget::Database | TriggerTarget::AllServer => None,
                },
                body: &def.body,
            }),
            _ => None,
        }
    }

    pub fn name(&self) -> &'a ObjectName {
        match self {
            TopLevelObject::Procedure { name, .. } | TopLevelObject::Trigger { name, .. } => name,
        }
    }

    pub fn body(&self) -> &'a [Statement] {
        match self {
            TopLevelObject::Procedure { body, .. } | TopLevelObject::Trigger { body, .. } => body,
        }
    }

    /// Graph node identity, used as the source of every body edge
    pub fn identity(&self) -> String {
        self.name().resolve()
    }
}

/// Top-level objects of a script in document order
pub fn top_level_objects(script: &Script) -> impl Iterator<Item = TopLevelObject<'_>> {
    script.statements().filter_map(TopLevelObject::from_statement)
}

/// Emit the edges of every top-level object in `script` into `sink`.
///
/// Non-object statements are skipped. A trigger on a table first emits
/// `(table, trigger, TRIG)`, then its body edges.
pub fn extract_script<S: EdgeSink>(script: &Script, sink: &mut S) -> Result<(), S::Error> {
    for object in top_level_objects(script) {
        let identity = object.identity();
        if let TopLevelObject::Trigger {
            table: Some(table), ..
        } = object
        {
            debug!(trigger = %identity, table = %table, "trigger");
            sink.emit(DependencyEdge::new(
                table.resolve(),
                identity.clone(),
                EdgeKind::Trig,
            ))?;
        } else {
            debug!(object = %identity, "object");
        }
        Traversal::new(&identity, sink).visit_statements(object.body())?;
    }
    Ok(())
}

/// Convenience wrapper collecting the edges of a script into a `Vec`
pub fn collect_edges(script: &Script) -> Vec<DependencyEdge> {
    let mut edges = Vec::new();
    match extract_script(script, &mut edges) {
        Ok(()) => edges,
        Err(never) => match never {},
    }
}

/// What to do when the parser reports diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseErrorPolicy {
    /// Extract from whatever tree the parser recovered
    #[default]
    Ignore,
    /// Refuse to extract when any error-level diagnostic was reported
    Strict,
}

impl ParseErrorPolicy {
    /// Decide whether extraction may go ahead after the parser reported
    /// `diagnostics`. Warnings never block it.
    pub fn check(&self, diagnostics: &[Diagnostic]) -> Result<(), Error> {
        let errors = diagnostics.iter().filter(|d| d.is_error()).count();
        if errors == 0 {
            return Ok(());
        }
        match self {
            ParseErrorPolicy::Strict => Err(Error::ParseFailed { count: errors }),
            ParseErrorPolicy::Ignore => {
                warn!(count = errors, "extracting from a script with parse errors");
                Ok(())
            }
        }
    }
}

/// Dependency extractor - parses T-SQL text and streams its edges
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    policy: ParseErrorPolicy,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ParseErrorPolicy) -> Self {
        Self { policy }
    }

    /// Parse `sql` and emit its edges into `sink`.
    ///
    /// Returns the parser's diagnostics. Under [`ParseErrorPolicy::Strict`]
    /// nothing is emitted when any of them is an error.
    pub fn extract<S>(&self, sql: &str, sink: &mut S) -> Result<Vec<Diagnostic>, Error>
    where
        S: EdgeSink,
        Error: From<S::Error>,
    {
        let output = parse_script(sql);
        self.policy.check(&output.diagnostics)?;
        extract_script(&output.script, sink)?;
        Ok(output.diagnostics)
    }
}
