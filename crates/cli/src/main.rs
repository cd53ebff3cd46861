mod run;
mod serve;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use passage_core::compliance::default_regulations;
use passage_core::{diff_graphs, TwinGraph};
use passage_rules::RuleBook;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Digital product passport dataspace simulator.
#[derive(Parser)]
#[command(
    name = "passage",
    version,
    about = "Digital product passport dataspace simulator"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Passage HTTP API server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
        /// Interface to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Rule book JSON file (defaults to the built-in book)
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Delegate compliance checks to a remote evaluator
        #[arg(long)]
        evaluator_url: Option<String>,
    },

    /// Drive the canonical journey end to end and print the transcript
    Run {
        /// Journey template code
        #[arg(long, default_value = "manufacturer-core-e2e")]
        template: String,
        /// Role recorded on the run
        #[arg(long, default_value = "manufacturer")]
        role: String,
        /// Locale recorded on the run
        #[arg(long, default_value = "en")]
        locale: String,
        /// JSON file mapping step ids to payload overrides
        #[arg(long)]
        payload: Option<PathBuf>,
        /// Drive a running passage server instead of the in-process engine
        #[arg(long)]
        server: Option<String>,
    },

    /// Evaluate a product payload against compliance rules
    Check {
        /// Product payload JSON file
        #[arg(long)]
        payload: PathBuf,
        /// Comma-separated regulation names (defaults to all built-in ones)
        #[arg(long)]
        regulations: Option<String>,
        /// Rule book JSON file (defaults to the built-in book)
        #[arg(long)]
        rules: Option<PathBuf>,
    },

    /// Structurally diff two twin graph JSON files
    Diff {
        /// Base graph file
        #[arg(long)]
        from: PathBuf,
        /// Target graph file
        #[arg(long)]
        to: PathBuf,
    },

    /// Validate a rule book file against the embedded schema
    Validate {
        /// Rule book JSON file
        #[arg(long)]
        rules: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            host,
            rules,
            evaluator_url,
        } => {
            let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
            if let Err(e) = rt.block_on(serve::start_server(host, port, rules, evaluator_url)) {
                eprintln!("Server error: {}", e);
                process::exit(1);
            }
        }
        Commands::Run {
            template,
            role,
            locale,
            payload,
            server,
        } => {
            run::cmd_run(run::RunOptions {
                template,
                role,
                locale,
                payload,
                server,
                output: cli.output,
                quiet: cli.quiet,
            });
        }
        Commands::Check {
            payload,
            regulations,
            rules,
        } => {
            cmd_check(
                &payload,
                regulations.as_deref(),
                rules.as_deref(),
                cli.output,
                cli.quiet,
            );
        }
        Commands::Diff { from, to } => {
            cmd_diff(&from, &to, cli.output, cli.quiet);
        }
        Commands::Validate { rules } => {
            cmd_validate(&rules, cli.output, cli.quiet);
        }
    }
}

/// Read and parse a JSON file, exiting with a report on failure.
fn read_json_file(path: &Path, output: OutputFormat, quiet: bool) -> serde_json::Value {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            let msg = format!("error reading '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => {
            let msg = format!("error parsing JSON in '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

/// Load a rule book from a file, or the built-in one.
fn load_rule_book(path: Option<&Path>, output: OutputFormat, quiet: bool) -> RuleBook {
    let result = match path {
        Some(path) => {
            let value = read_json_file(path, output, quiet);
            RuleBook::from_value(&value)
        }
        None => RuleBook::builtin(),
    };
    match result {
        Ok(book) => book,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    }
}

fn cmd_check(
    payload_path: &Path,
    regulations: Option<&str>,
    rules_path: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) {
    let payload = read_json_file(payload_path, output, quiet);
    let book = load_rule_book(rules_path, output, quiet);

    let regulations: Vec<String> = match regulations {
        Some(list) => list
            .split(',')
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect(),
        None => default_regulations(),
    };
    let regulations = if regulations.is_empty() {
        default_regulations()
    } else {
        regulations
    };

    let report = passage_rules::evaluate(&book, &payload, &regulations);

    match output {
        OutputFormat::Json => {
            let pretty = serde_json::to_string_pretty(&report)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            println!(
                "status: {} ({} violations, {} warnings, {} recommendations)",
                report.status,
                report.summary.violations,
                report.summary.warnings,
                report.summary.recommendations,
            );
            if !quiet {
                for (label, issues) in [
                    ("violations", &report.violations),
                    ("warnings", &report.warnings),
                    ("recommendations", &report.recommendations),
                ] {
                    if issues.is_empty() {
                        continue;
                    }
                    println!("{}:", label);
                    for issue in issues {
                        println!("  - [{}] {}: {}", issue.id, issue.path, issue.message);
                    }
                }
            }
        }
    }
    // A non-compliant verdict is still a successful check.
}

fn cmd_diff(from_path: &Path, to_path: &Path, output: OutputFormat, quiet: bool) {
    let parse_graph = |path: &Path| -> TwinGraph {
        let value = read_json_file(path, output, quiet);
        let graph: TwinGraph = match serde_json::from_value(value) {
            Ok(graph) => graph,
            Err(e) => {
                let msg = format!("'{}' is not a twin graph: {}", path.display(), e);
                report_error(&msg, output, quiet);
                process::exit(1);
            }
        };
        if let Err(e) = graph.validate() {
            let msg = format!("'{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
        graph
    };

    let from = parse_graph(from_path);
    let to = parse_graph(to_path);
    let (nodes, edges) = diff_graphs(&from, &to);

    match output {
        OutputFormat::Json => {
            let result = serde_json::json!({
                "nodes": nodes,
                "edges": edges,
                "summary": {
                    "nodes_added": nodes.added.len(),
                    "nodes_removed": nodes.removed.len(),
                    "nodes_changed": nodes.changed.len(),
                    "edges_added": edges.added.len(),
                    "edges_removed": edges.removed.len(),
                    "edges_changed": edges.changed.len(),
                },
            });
            let pretty = serde_json::to_string_pretty(&result)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            if nodes.is_empty() && edges.is_empty() {
                if !quiet {
                    println!("no differences");
                }
            } else {
                let node_changes = nodes.added.len() + nodes.removed.len() + nodes.changed.len();
                let edge_changes = edges.added.len() + edges.removed.len() + edges.changed.len();
                println!(
                    "{} node change(s), {} edge change(s)",
                    node_changes, edge_changes
                );
                if !quiet {
                    print_ids("nodes added", &nodes.added);
                    print_ids("nodes removed", &nodes.removed);
                    let changed: Vec<String> =
                        nodes.changed.iter().map(|c| c.key.clone()).collect();
                    print_ids("nodes changed", &changed);
                    print_ids("edges added", &edges.added);
                    print_ids("edges removed", &edges.removed);
                    let changed: Vec<String> =
                        edges.changed.iter().map(|c| c.key.clone()).collect();
                    print_ids("edges changed", &changed);
                }
            }
        }
    }

    if !(nodes.is_empty() && edges.is_empty()) {
        process::exit(1);
    }
}

fn print_ids(label: &str, ids: &[String]) {
    if !ids.is_empty() {
        println!("  {}: {}", label, ids.join(", "));
    }
}

static RULESET_SCHEMA_STR: &str = include_str!("../../../docs/ruleset-schema.json");

fn cmd_validate(rules_path: &Path, output: OutputFormat, quiet: bool) {
    let schema: serde_json::Value = match serde_json::from_str(RULESET_SCHEMA_STR) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("internal error: failed to parse embedded schema: {}", e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let doc = read_json_file(rules_path, output, quiet);

    let validator = match jsonschema::validator_for(&schema) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("internal error: failed to compile schema: {}", e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let mut errors: Vec<String> = validator
        .iter_errors(&doc)
        .map(|e| format!("{}", e))
        .collect();

    // Load-time checks the schema cannot express: unique rule ids,
    // compilable patterns.
    if errors.is_empty() {
        if let Err(e) = RuleBook::from_value(&doc) {
            errors.push(e.to_string());
        }
    }

    if errors.is_empty() {
        if !quiet {
            match output {
                OutputFormat::Text => println!("valid"),
                OutputFormat::Json => println!("{{\"valid\": true}}"),
            }
        }
    } else {
        match output {
            OutputFormat::Text => {
                if !quiet {
                    eprintln!("invalid rule book");
                    for err in &errors {
                        eprintln!("  - {}", err);
                    }
                }
            }
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": false,
                    "errors": errors
                });
                eprintln!(
                    "{}",
                    serde_json::to_string_pretty(&json).unwrap_or_default()
                );
            }
        }
        process::exit(1);
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{{\"error\": \"{}\"}}", msg.replace('"', "\\\""));
        }
    }
}
