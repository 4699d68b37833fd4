//! tsqlgraph-core: T-SQL object dependency extraction
//!
//! This library parses T-SQL scripts and reports which tables, procedures
//! and Service Broker contracts each stored procedure and trigger depends
//! on, as directed edges ready for Graphviz.

pub mod ast;
pub mod error;
pub mod extractor;
pub mod graph;
pub mod name;
pub mod parser;

pub use error::{Diagnostic, DiagnosticKind, Error, Result, Severity, Span};
pub use extractor::{collect_edges, extract_script, Extractor, ParseErrorPolicy, TopLevelObject};
pub use graph::{DependencyEdge, DotWriter, EdgeKind, EdgeSink, KindFilter};
pub use name::{ObjectName, MISSING_SCHEMA};
pub use parser::{parse_script, ParseOutput};
