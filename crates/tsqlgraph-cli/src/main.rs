//! tsqlgraph CLI - T-SQL object dependency graph extractor

mod args;
mod config;
mod output;

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use indexmap::IndexMap;
use miette::{IntoDiagnostic, Result};
use tracing::level_filters::LevelFilter;
use tsqlgraph_core::extractor::{extract_script, top_level_objects, ParseErrorPolicy, TopLevelObject};
use tsqlgraph_core::{
    parse_script, DependencyEdge, DotWriter, EdgeKind, KindFilter, ParseOutput, Severity,
    MISSING_SCHEMA,
};

use crate::args::{Args, Command, OutputFormat};
use crate::config::Config;
use crate::output::{write_digraph, write_json, DiagnosticPrinter, FileReport, JsonReport};

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose, args.quiet);

    match run(args) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::from(2)
        }
    }
}

/// Logs go to stderr; stdout carries only the graph
fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

/// An input file and what the parser made of it
struct ParsedFile {
    path: PathBuf,
    output: ParseOutput,
}

fn run(args: Args) -> Result<bool> {
    let quiet = args.quiet;
    match args.command {
        Command::Graph {
            files,
            config: config_path,
            format,
            strict,
            exclude,
        } => {
            let config = if let Some(path) = config_path {
                Config::from_file(&path)?
            } else {
                Config::find_and_load()?.unwrap_or_default()
            };

            // CLI takes precedence
            let config = config.merge_with_args(&files, format, strict, &exclude);
            let excluded = config.excluded_kinds()?;
            let policy = if config.strict {
                ParseErrorPolicy::Strict
            } else {
                ParseErrorPolicy::Ignore
            };

            let input_files = expand_files(&config.files)?;
            if input_files.is_empty() {
                miette::bail!(
                    "No input files specified. Pass files as arguments or configure them in tsqlgraph.toml"
                );
            }

            let parsed = parse_files(&input_files, quiet)?;

            let mut rejected = 0;
            for file in &parsed {
                if let Err(err) = policy.check(&file.output.diagnostics) {
                    eprintln!("{}: {}", file.path.display(), err);
                    rejected += 1;
                }
            }
            if rejected > 0 {
                eprintln!();
                eprintln!(
                    "No graph written: {} of {} file(s) have parse errors",
                    rejected,
                    parsed.len()
                );
                return Ok(true);
            }

            write_graph(&parsed, config.format.unwrap_or_default(), excluded)?;
            Ok(false)
        }

        Command::Objects { files } => {
            let patterns: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
            let parsed = parse_files(&expand_files(&patterns)?, quiet)?;

            // schema -> objects, in order of first appearance
            let mut by_schema: IndexMap<String, Vec<String>> = IndexMap::new();
            for file in &parsed {
                for object in top_level_objects(&file.output.script) {
                    let schema = object
                        .name()
                        .schema
                        .clone()
                        .unwrap_or_else(|| MISSING_SCHEMA.to_string());
                    let description = match object {
                        TopLevelObject::Procedure { .. } => {
                            format!("Procedure: {}", object.identity())
                        }
                        TopLevelObject::Trigger {
                            table: Some(table), ..
                        } => format!("Trigger: {} ON {}", object.identity(), table),
                        TopLevelObject::Trigger { table: None, .. } => {
                            format!("Trigger: {} (DDL)", object.identity())
                        }
                    };
                    by_schema
                        .entry(schema)
                        .or_default()
                        .push(format!("{}  [{}]", description, file.path.display()));
                }
            }

            println!("Object Inventory:");
            println!("=================");
            for (schema, objects) in &by_schema {
                println!("\nSchema: {}", schema);
                for object in objects {
                    println!("  {}", object);
                }
            }

            Ok(false)
        }

        Command::Parse { file } => {
            let content = fs::read_to_string(&file).into_diagnostic()?;
            let output = parse_script(&content);

            for (i, batch) in output.script.batches.iter().enumerate() {
                println!("Batch {} (line {}):", i + 1, batch.start_line);
                for (j, stmt) in batch.statements.iter().enumerate() {
                    println!("Statement {}:", j + 1);
                    println!("{:#?}", stmt);
                    println!();
                }
            }

            DiagnosticPrinter::new(file.display().to_string()).print(&output.diagnostics, &content);
            Ok(output.has_errors())
        }
    }
}

/// Expand glob patterns; plain paths are kept as given
fn expand_files(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        if pattern.contains(['*', '?', '[']) {
            for path in glob::glob(pattern).into_diagnostic()?.flatten() {
                files.push(path);
            }
        } else {
            files.push(PathBuf::from(pattern));
        }
    }
    Ok(files)
}

/// Read and parse every file, printing its diagnostics to stderr
fn parse_files(paths: &[PathBuf], quiet: bool) -> Result<Vec<ParsedFile>> {
    let mut parsed = Vec::with_capacity(paths.len());
    for path in paths {
        let content = fs::read_to_string(path)
            .into_diagnostic()
            .map_err(|e| e.wrap_err(format!("failed to read {}", path.display())))?;
        let output = parse_script(&content);
        tracing::info!(
            file = %path.display(),
            batches = output.script.batches.len(),
            diagnostics = output.diagnostics.len(),
            "parsed"
        );

        let shown: Vec<_> = output
            .diagnostics
            .iter()
            .filter(|d| !quiet || d.severity == Severity::Error)
            .cloned()
            .collect();
        DiagnosticPrinter::new(path.display().to_string()).print(&shown, &content);

        parsed.push(ParsedFile {
            path: path.clone(),
            output,
        });
    }
    Ok(parsed)
}

fn write_graph(parsed: &[ParsedFile], format: OutputFormat, excluded: Vec<EdgeKind>) -> Result<()> {
    let stdout = io::stdout();

    if format == OutputFormat::Dot {
        // stream edges as they are found
        let mut sink = KindFilter::new(DotWriter::new(stdout.lock()), excluded);
        for file in parsed {
            extract_script(&file.output.script, &mut sink).into_diagnostic()?;
        }
        return sink.into_inner().into_inner().flush().into_diagnostic();
    }

    let mut sink = KindFilter::new(Vec::<DependencyEdge>::new(), excluded);
    for file in parsed {
        if let Err(never) = extract_script(&file.output.script, &mut sink) {
            match never {}
        }
    }
    let edges = sink.into_inner();

    match format {
        OutputFormat::Digraph => write_digraph(stdout.lock(), &edges).into_diagnostic(),
        _ => {
            let files: Vec<FileReport> = parsed
                .iter()
                .map(|f| FileReport {
                    file: f.path.display().to_string(),
                    diagnostics: f.output.diagnostics.clone(),
                })
                .collect();
            let mut out = stdout.lock();
            write_json(
                &mut out,
                &JsonReport {
                    edges: &edges,
                    files: &files,
                },
            )
            .into_diagnostic()?;
            writeln!(out).into_diagnostic()
        }
    }
}
