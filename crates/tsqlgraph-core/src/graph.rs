//! Dependency edges and the sinks they are emitted into

use std::convert::Infallible;
use std::io::Write;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How the source object interacts with the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EdgeKind {
    /// The source table fires the target trigger
    Trig,
    Insert,
    Update,
    Delete,
    Exec,
    Trunc,
    /// Service broker conversation
    Queue,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 7] = [
        EdgeKind::Trig,
        EdgeKind::Insert,
        EdgeKind::Update,
        EdgeKind::Delete,
        EdgeKind::Exec,
        EdgeKind::Trunc,
        EdgeKind::Queue,
    ];

    /// Label used in rendered output
    pub fn label(&self) -> &'static str {
        match self {
            EdgeKind::Trig => "TRIG",
            EdgeKind::Insert => "INSERT",
            EdgeKind::Update => "UPDATE",
            EdgeKind::Delete => "DELETE",
            EdgeKind::Exec => "EXEC",
            EdgeKind::Trunc => "TRUNC",
            EdgeKind::Queue => "QUEUE",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EdgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EdgeKind::ALL
            .into_iter()
            .find(|k| k.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "Unknown edge kind: '{}'. Expected one of: trig, insert, update, delete, exec, trunc, queue.",
                    s
                )
            })
    }
}

/// A directed, labeled fact: `source` interacts with `target` via `kind`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

impl DependencyEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }

    /// Render as a DOT edge statement, escaping `"` and `\` in node names
    pub fn to_dot(&self) -> String {
        format!(
            "\"{}\" -> \"{}\" [label=\"{}\"]",
            escape_dot(&self.source),
            escape_dot(&self.target),
            self.kind
        )
    }
}

fn escape_dot(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Receiver of emitted edges
///
/// Edges arrive one at a time in document order; sinks decide whether to
/// buffer, print or drop them.
pub trait EdgeSink {
    type Error;

    fn emit(&mut self, edge: DependencyEdge) -> Result<(), Self::Error>;
}

impl EdgeSink for Vec<DependencyEdge> {
    type Error = Infallible;

    fn emit(&mut self, edge: DependencyEdge) -> Result<(), Self::Error> {
        self.push(edge);
        Ok(())
    }
}

impl<S: EdgeSink + ?Sized> EdgeSink for &mut S {
    type Error = S::Error;

    fn emit(&mut self, edge: DependencyEdge) -> Result<(), Self::Error> {
        (**self).emit(edge)
    }
}

/// Writes one DOT edge line per emitted edge
pub struct DotWriter<W: Write> {
    writer: W,
}

impl<W: Write> DotWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> EdgeSink for DotWriter<W> {
    type Error = std::io::Error;

    fn emit(&mut self, edge: DependencyEdge) -> Result<(), Self::Error> {
        writeln!(self.writer, "{}", edge.to_dot())
    }
}

/// Drops edges whose kind is excluded before passing the rest on
pub struct KindFilter<S> {
    inner: S,
    excluded: Vec<EdgeKind>,
}

impl<S: EdgeSink> KindFilter<S> {
    pub fn new(inner: S, excluded: Vec<EdgeKind>) -> Self {
        Self { inner, excluded }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: EdgeSink> EdgeSink for KindFilter<S> {
    type Error = S::Error;

    fn emit(&mut self, edge: DependencyEdge) -> Result<(), Self::Error> {
        if self.excluded.contains(&edge.kind) {
            return Ok(());
        }
        self.inner.emit(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_line_format() {
        let edge = DependencyEdge::new("dbo.Proc", "dbo.T", EdgeKind::Insert);
        assert_eq!(edge.to_dot(), r#""dbo.Proc" -> "dbo.T" [label="INSERT"]"#);
    }

    #[test]
    fn test_dot_escapes_quotes() {
        let edge = DependencyEdge::new("dbo.Pro\"c", r"a\b", EdgeKind::Exec);
        assert_eq!(
            edge.to_dot(),
            r#""dbo.Pro\"c" -> "a\\b" [label="EXEC"]"#
        );
    }

    #[test]
    fn test_dot_writer_writes_lines() {
        let mut writer = DotWriter::new(Vec::new());
        writer
            .emit(DependencyEdge::new("S.T", "S.Trg", EdgeKind::Trig))
            .unwrap();
        writer
            .emit(DependencyEdge::new("S.Trg", "S.U", EdgeKind::Trunc))
            .unwrap();
        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(
            out,
            "\"S.T\" -> \"S.Trg\" [label=\"TRIG\"]\n\"S.Trg\" -> \"S.U\" [label=\"TRUNC\"]\n"
        );
    }

    #[test]
    fn test_edge_kind_from_str() {
        assert_eq!("trunc".parse::<EdgeKind>(), Ok(EdgeKind::Trunc));
        assert_eq!("QUEUE".parse::<EdgeKind>(), Ok(EdgeKind::Queue));
        assert!("select".parse::<EdgeKind>().is_err());
    }

    #[test]
    fn test_kind_filter_drops_excluded() {
        let mut filter = KindFilter::new(Vec::new(), vec![EdgeKind::Exec]);
        filter
            .emit(DependencyEdge::new("p", "q", EdgeKind::Exec))
            .unwrap();
        filter
            .emit(DependencyEdge::new("p", "t", EdgeKind::Delete))
            .unwrap();
        let edges = filter.into_inner();
        assert_eq!(edges, vec![DependencyEdge::new("p", "t", EdgeKind::Delete)]);
    }
}
