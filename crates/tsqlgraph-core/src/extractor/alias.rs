//! Alias resolution for UPDATE and DELETE targets

use crate::ast::TableReference;
use crate::name::ObjectName;

/// What an UPDATE/DELETE target alias refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// Bound to a real table; holds its dotted name
    QualifiedName(String),
    /// Bound to a table variable, which is not a graph node
    TableVariable,
    /// No FROM binding; callers fall back to the target's own name
    NotFound,
}

/// Key an UPDATE/DELETE target is looked up by in the FROM clause.
///
/// An explicit alias wins. Otherwise the name as written serves as the
/// alias, which covers `UPDATE t SET ... FROM dbo.T t`.
pub fn lookup_key(name: &ObjectName, alias: Option<&str>) -> String {
    match alias {
        Some(alias) => alias.to_string(),
        None => name.written(),
    }
}

/// Find the table reference bound to `key` in a FROM clause.
///
/// Every reference is considered, including those nested in joins and
/// derived tables. When the same alias is bound more than once the last
/// binding in document order wins. Aliases compare case-insensitively, as
/// SQL Server does under its default collation, rather than by exact text.
pub fn resolve(key: &str, from: Option<&[TableReference]>) -> ResolvedTarget {
    let Some(from) = from else {
        return ResolvedTarget::NotFound;
    };
    let mut found = ResolvedTarget::NotFound;
    scan(key, from, &mut found);
    found
}

fn scan(key: &str, references: &[TableReference], found: &mut ResolvedTarget) {
    for reference in references {
        match reference {
            TableReference::Named { name, alias } if alias_matches(alias.as_deref(), key) => {
                *found = ResolvedTarget::QualifiedName(name.resolve());
            }
            TableReference::Variable { alias, .. } if alias_matches(alias.as_deref(), key) => {
                *found = ResolvedTarget::TableVariable;
            }
            TableReference::Derived { references, .. } => scan(key, references, found),
            _ => {}
        }
    }
}

fn alias_matches(alias: Option<&str>, key: &str) -> bool {
    alias.is_some_and(|a| a.eq_ignore_ascii_case(key))
}
