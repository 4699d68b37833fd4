//! Schema-qualified object names

use serde::{Deserialize, Serialize};

/// Placeholder rendered in place of an absent schema component
pub const MISSING_SCHEMA: &str = "{MISSING}";

/// Multi-part object name (`server.database.schema.object`)
///
/// Identifiers are stored without their `[]` or `""` delimiters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectName {
    pub server: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub base: String,
}

impl ObjectName {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            server: None,
            database: None,
            schema: None,
            base: base.into(),
        }
    }

    pub fn with_schema(schema: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            ..Self::new(base)
        }
    }

    /// Build a name from its written parts, right-aligned onto
    /// server/database/schema/base. Empty parts (as in `db..T`) are absent.
    ///
    /// Returns `None` when there is no base name or more than four parts.
    pub fn from_parts(parts: Vec<Option<String>>) -> Option<Self> {
        if parts.is_empty() || parts.len() > 4 {
            return None;
        }
        let mut parts = parts.into_iter().rev();
        let base = parts.next().flatten()?;
        let schema = parts.next().flatten();
        let database = parts.next().flatten();
        let server = parts.next().flatten();
        Some(Self {
            server,
            database,
            schema,
            base,
        })
    }

    /// The identifiers as written, joined by `.` with no placeholder.
    ///
    /// This is the form an unaliased UPDATE/DELETE target is looked up by.
    pub fn written(&self) -> String {
        [&self.server, &self.database, &self.schema]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .chain(std::iter::once(self.base.as_str()))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Dotted identifier used for graph nodes
    pub fn resolve(&self) -> String {
        resolve(self)
    }
}

/// Normalize an object name into the dotted graph identifier.
///
/// Server and database are dropped when absent; an absent schema becomes
/// [`MISSING_SCHEMA`]. No default schema is assumed, so `T1` and `dbo.T1`
/// resolve differently.
pub fn resolve(name: &ObjectName) -> String {
    let schema = name.schema.as_deref().unwrap_or(MISSING_SCHEMA);
    [name.server.as_deref(), name.database.as_deref(), Some(schema)]
        .into_iter()
        .flatten()
        .chain(std::iter::once(name.base.as_str()))
        .collect::<Vec<_>>()
        .join(".")
}

impl std::fmt::Display for ObjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&resolve(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn test_missing_schema_placeholder() {
        assert_eq!(ObjectName::new("T").resolve(), "{MISSING}.T");
    }

    #[test]
    fn test_schema_qualified() {
        assert_eq!(ObjectName::with_schema("dbo", "T1").resolve(), "dbo.T1");
    }

    #[test]
    fn test_four_part_name() {
        let name = ObjectName::from_parts(vec![part("srv"), part("db"), part("s"), part("t")])
            .unwrap();
        assert_eq!(name.resolve(), "srv.db.s.t");
        assert_eq!(name.written(), "srv.db.s.t");
    }

    #[test]
    fn test_database_without_schema() {
        // db..T
        let name = ObjectName::from_parts(vec![part("db"), None, part("T")]).unwrap();
        assert_eq!(name.database.as_deref(), Some("db"));
        assert_eq!(name.schema, None);
        assert_eq!(name.resolve(), "db.{MISSING}.T");
        assert_eq!(name.written(), "db.T");
    }

    #[test]
    fn test_written_form_has_no_placeholder() {
        assert_eq!(ObjectName::new("a").written(), "a");
        assert_eq!(ObjectName::with_schema("dbo", "T").written(), "dbo.T");
    }

    #[test]
    fn test_from_parts_rejects_bad_shapes() {
        assert!(ObjectName::from_parts(vec![]).is_none());
        assert!(ObjectName::from_parts(vec![part("s"), None]).is_none());
        assert!(ObjectName::from_parts(vec![part("a"); 5]).is_none());
    }

    #[test]
    fn test_display_matches_resolve() {
        let name = ObjectName::with_schema("Sales", "Orders");
        assert_eq!(name.to_string(), resolve(&name));
    }
}
