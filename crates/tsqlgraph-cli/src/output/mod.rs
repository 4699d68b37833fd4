//! Output formatting

use std::io::{self, Write};

use serde::Serialize;
use tsqlgraph_core::{DependencyEdge, Diagnostic, Severity};

/// Prints parse diagnostics for one file to stderr
pub struct DiagnosticPrinter {
    file_name: String,
}

impl DiagnosticPrinter {
    pub fn new(file_name: String) -> Self {
        Self { file_name }
    }

    /// Print diagnostics with the offending source line underlined
    pub fn print(&self, diagnostics: &[Diagnostic], source: &str) {
        for diag in diagnostics {
            let severity_str = match diag.severity {
                Severity::Error => "\x1b[31merror\x1b[0m",
                Severity::Warning => "\x1b[33mwarning\x1b[0m",
            };

            eprintln!("{}[{}]: {}", severity_str, diag.code(), diag.message);

            if let Some(span) = &diag.span {
                eprintln!("  --> {}:{}:{}", self.file_name, span.line, span.column);

                if let Some(source_line) = get_source_line(source, span.line) {
                    eprintln!("   |");
                    eprintln!("{:>3} | {}", span.line, source_line);

                    let line_len = source_line.chars().count();
                    let padding = " ".repeat(span.column.saturating_sub(1));
                    let underline = "^".repeat(
                        span.length
                            .min(line_len.saturating_sub(span.column) + 1)
                            .max(1),
                    );
                    eprintln!("   | {}{}", padding, underline);
                }
            }

            if let Some(help) = &diag.help {
                eprintln!("   = help: {}", help);
            }

            eprintln!();
        }
    }
}

/// Get a specific line from source (1-indexed)
fn get_source_line(source: &str, line: usize) -> Option<&str> {
    source.lines().nth(line.saturating_sub(1))
}

/// Write edges as a complete Graphviz document
pub fn write_digraph<W: Write>(mut writer: W, edges: &[DependencyEdge]) -> io::Result<()> {
    writeln!(writer, "digraph dependencies {{")?;
    for edge in edges {
        writeln!(writer, "    {};", edge.to_dot())?;
    }
    writeln!(writer, "}}")
}

/// Diagnostics reported for one input file
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub file: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// JSON document for `--format json`
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub edges: &'a [DependencyEdge],
    pub files: &'a [FileReport],
}

pub fn write_json<W: Write>(writer: W, report: &JsonReport<'_>) -> io::Result<()> {
    serde_json::to_writer_pretty(writer, report).map_err(io::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsqlgraph_core::EdgeKind;

    fn edges() -> Vec<DependencyEdge> {
        vec![
            DependencyEdge::new("dbo.T", "dbo.Trg", EdgeKind::Trig),
            DependencyEdge::new("dbo.Trg", "dbo.Log", EdgeKind::Insert),
        ]
    }

    #[test]
    fn test_digraph_document() {
        let mut out = Vec::new();
        write_digraph(&mut out, &edges()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "digraph dependencies {\n    \"dbo.T\" -> \"dbo.Trg\" [label=\"TRIG\"];\n    \"dbo.Trg\" -> \"dbo.Log\" [label=\"INSERT\"];\n}\n"
        );
    }

    #[test]
    fn test_json_document() {
        let edges = edges();
        let files = vec![FileReport {
            file: "a.sql".to_string(),
            diagnostics: vec![],
        }];
        let mut out = Vec::new();
        write_json(
            &mut out,
            &JsonReport {
                edges: &edges,
                files: &files,
            },
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["edges"][0]["kind"], "TRIG");
        assert_eq!(value["edges"][1]["target"], "dbo.Log");
        assert_eq!(value["files"][0]["file"], "a.sql");
    }

    #[test]
    fn test_source_line_lookup() {
        assert_eq!(get_source_line("a\nb\nc", 2), Some("b"));
        assert_eq!(get_source_line("a", 5), None);
    }
}
