//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tsqlgraph_core::EdgeKind;

#[derive(Parser)]
#[command(name = "tsqlgraph")]
#[command(author, version, about = "T-SQL object dependency graph extractor")]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Emit the dependency edges of every procedure and trigger
    Graph {
        /// SQL files to read (supports glob patterns)
        files: Vec<PathBuf>,

        /// Configuration file (default: tsqlgraph.toml in this or a parent directory)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Produce no graph when any file has parse errors
        #[arg(long)]
        strict: bool,

        /// Edge kind to leave out of the output (repeatable)
        #[arg(short = 'x', long = "exclude", value_name = "KIND")]
        exclude: Vec<EdgeKind>,
    },

    /// List the procedures and triggers defined in the given files
    Objects {
        /// SQL files to read (supports glob patterns)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Parse SQL and display the syntax tree (for debugging)
    Parse {
        /// SQL file to parse
        file: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One DOT edge statement per line
    #[default]
    Dot,
    /// DOT edges wrapped in a complete `digraph { ... }`
    Digraph,
    /// JSON document with edges and diagnostics
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_arguments() {
        let args = Args::parse_from([
            "tsqlgraph", "-vv", "graph", "a.sql", "b/*.sql", "--format", "digraph", "--strict",
            "-x", "trig", "--exclude", "QUEUE",
        ]);
        assert_eq!(args.verbose, 2);
        let Command::Graph {
            files,
            format,
            strict,
            exclude,
            config,
        } = args.command
        else {
            panic!("expected the graph command");
        };
        assert_eq!(files.len(), 2);
        assert_eq!(format, Some(OutputFormat::Digraph));
        assert!(strict);
        assert_eq!(exclude, vec![EdgeKind::Trig, EdgeKind::Queue]);
        assert!(config.is_none());
    }

    #[test]
    fn test_unknown_edge_kind_is_rejected() {
        let result = Args::try_parse_from(["tsqlgraph", "graph", "a.sql", "-x", "select"]);
        assert!(result.is_err());
    }
}
