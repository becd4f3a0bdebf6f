//! bn - Discrete Bayesian network engine
//!
//! The main entry point for `bn`, handling:
//! - K2 structure learning from a CSV table
//! - Posterior queries under hard evidence
//! - Full belief dumps for a given structure

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use bn_common::{format_error_human, Error, OutputFormat, Result, StructuredError};
use bn_config::{load_config, EngineConfig, CONFIG_SCHEMA_VERSION};
use bn_core::data::{DataSource, FrequencyStore};
use bn_core::exit_codes::ExitCode;
use bn_core::inference::{BeliefNetwork, PropagationTrace, StateMap};
use bn_core::learn::{K2Config, LearnedStructure, StructureLearner};
use bn_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use bn_core::query::{parse_assignment, parse_query};
use bn_core::structure::AdjacencyTable;

/// Discrete Bayesian network engine
#[derive(Parser)]
#[command(name = "bn")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to engine.json (BN_CONFIG is consulted when absent)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr (human or jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Load at most this many data rows (overrides config)
    #[arg(long, global = true)]
    rows: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Learn a structure with K2 and print or save the adjacency table
    Learn(LearnArgs),

    /// Compute the posterior of one variable, e.g. "P(C|A=1,B=0)"
    Query(QueryArgs),

    /// Print every posterior for a structure under optional evidence
    Beliefs(BeliefsArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct LearnArgs {
    /// Data file (header row, one observation per line)
    #[arg(long)]
    data: PathBuf,

    /// Write the adjacency table here
    #[arg(long)]
    out: Option<PathBuf>,

    /// Variable ordering, comma separated (defaults to header order)
    #[arg(long, value_delimiter = ',')]
    order: Option<Vec<String>>,

    /// Maximum parents per variable (at least 1)
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    max_parents: Option<usize>,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Data file (header row, one observation per line)
    #[arg(long)]
    data: PathBuf,

    /// Adjacency table; learned with K2 when omitted
    #[arg(long)]
    structure: Option<PathBuf>,

    /// Query expression: C, C|A=1, P(C|A=1,B=0), P(C=1|A=0)
    expr: String,

    /// Save the learned structure here (ignored with --structure)
    #[arg(long)]
    save_structure: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct BeliefsArgs {
    /// Data file (header row, one observation per line)
    #[arg(long)]
    data: PathBuf,

    /// Adjacency table
    #[arg(long)]
    structure: PathBuf,

    /// Hard evidence, repeatable: --evidence A=1 --evidence B=0
    #[arg(long = "evidence", short = 'e')]
    evidence: Vec<String>,

    /// Include every node's messages in JSON output
    #[arg(long)]
    snapshot: bool,
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let cli_level = LogLevel::from_verbosity(cli.global.verbose, cli.global.quiet);
    init_logging(&LogConfig::from_env(cli_level, cli.global.log_format));

    let result = match &cli.command {
        Commands::Learn(args) => run_learn(&cli.global, args),
        Commands::Query(args) => run_query(&cli.global, args),
        Commands::Beliefs(args) => run_beliefs(&cli.global, args),
        Commands::Version => {
            print_version(&cli.global);
            Ok(())
        }
    };

    let exit_code = match result {
        Ok(()) => ExitCode::Clean,
        Err(err) => {
            report_error(&cli.global, &err);
            ExitCode::for_error(&err)
        }
    };
    std::process::exit(exit_code.as_i32());
}

fn report_error(global: &GlobalOpts, err: &Error) {
    match global.format {
        OutputFormat::Json => {
            let structured = StructuredError::from(err)
                .with_context("exit_code", ExitCode::for_error(err).as_i32());
            println!("{}", structured.to_json_pretty());
        }
        _ => {
            eprintln!("{}", format_error_human(err, std::io::stderr().is_terminal()));
        }
    }
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_learn(global: &GlobalOpts, args: &LearnArgs) -> Result<()> {
    let config = engine_config(global)?;
    let store = open_store(&args.data, &config)?;
    let learned = learn_structure(&store, &config, args.order.clone(), args.max_parents)?;

    if let Some(out) = &args.out {
        learned.adjacency.write(out, config.data.delimiter)?;
    }

    match global.format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "schema_version": CONFIG_SCHEMA_VERSION,
                "command": "learn",
                "rows": store.row_count(),
                "ordering": learned.ordering,
                "edges": learned.adjacency.edges(),
                "log_score": learned.total_log_score(),
                "report": learned.report,
                "written_to": args.out,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Summary => {
            for family in &learned.report {
                if family.parents.is_empty() {
                    println!("{} (root)", family.variable);
                } else {
                    println!("{} <- {}", family.variable, family.parents.join(", "));
                }
            }
        }
        OutputFormat::Md => print_learned_md(&learned, config.data.delimiter)?,
    }
    Ok(())
}

fn run_query(global: &GlobalOpts, args: &QueryArgs) -> Result<()> {
    let query = parse_query(&args.expr)?;
    let config = engine_config(global)?;
    let store = open_store(&args.data, &config)?;

    let table = match &args.structure {
        Some(path) => AdjacencyTable::read(path, config.data.delimiter)?,
        None => {
            let learned = learn_structure(&store, &config, None, None)?;
            if let Some(out) = &args.save_structure {
                learned.adjacency.write(out, config.data.delimiter)?;
            }
            learned.adjacency
        }
    };

    let mut network = BeliefNetwork::new(store, &table, config.inference.uniform_fallback)?;
    for (variable, state) in &query.evidence {
        network.set_evidence(variable, state)?;
    }
    let trace = network.calc_probs(&query.target)?;
    let belief = network.get_belief(&query.target)?;

    let probability = match &query.target_state {
        Some(state) => Some(
            belief
                .get(state)
                .copied()
                .ok_or_else(|| Error::unknown_state(&query.target, state))?,
        ),
        None => None,
    };

    match global.format {
        OutputFormat::Json => {
            let output = QueryOutput {
                schema_version: CONFIG_SCHEMA_VERSION,
                query: query.canonical(),
                target: &query.target,
                belief: &belief,
                probability,
                singly_connected: network.is_singly_connected(),
                trace: &trace,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Summary => match probability {
            Some(p) => println!("{} = {:.6}", query.canonical(), p),
            None => println!("{}", summary_line(&query.target, &belief)),
        },
        OutputFormat::Md => {
            println!("# {}", query.canonical());
            println!();
            print_belief_table(std::iter::once((query.target.as_str(), &belief)));
            println!();
            println!("Visited: {}", trace.visited.join(" → "));
        }
    }
    Ok(())
}

fn run_beliefs(global: &GlobalOpts, args: &BeliefsArgs) -> Result<()> {
    let evidence = args
        .evidence
        .iter()
        .map(|term| parse_assignment(term))
        .collect::<Result<Vec<_>>>()?;
    let config = engine_config(global)?;
    let store = open_store(&args.data, &config)?;
    let table = AdjacencyTable::read(&args.structure, config.data.delimiter)?;

    let mut network = BeliefNetwork::new(store, &table, config.inference.uniform_fallback)?;
    for (variable, state) in &evidence {
        network.set_evidence(variable, state)?;
    }
    let traces = network.propagate_evidence()?;
    let beliefs = network.beliefs();

    match global.format {
        OutputFormat::Json => {
            let mut output = serde_json::json!({
                "schema_version": CONFIG_SCHEMA_VERSION,
                "command": "beliefs",
                "evidence": network.evidence(),
                "beliefs": beliefs,
                "singly_connected": network.is_singly_connected(),
                "traces": traces,
            });
            if args.snapshot {
                output["snapshot"] = serde_json::to_value(network.snapshot())?;
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Summary => {
            for (variable, belief) in &beliefs {
                println!("{}", summary_line(variable, belief));
            }
        }
        OutputFormat::Md => {
            println!("# Beliefs");
            println!();
            print_belief_table(beliefs.iter().map(|(v, b)| (v.as_str(), b)));
        }
    }
    Ok(())
}

fn print_version(global: &GlobalOpts) {
    match global.format {
        OutputFormat::Json => {
            let version_info = serde_json::json!({
                "schema_version": CONFIG_SCHEMA_VERSION,
                "bn_version": env!("CARGO_PKG_VERSION"),
            });
            println!("{}", version_info);
        }
        _ => {
            println!("bn {}", env!("CARGO_PKG_VERSION"));
            println!("schema version: {}", CONFIG_SCHEMA_VERSION);
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

#[derive(Serialize)]
struct QueryOutput<'a> {
    schema_version: &'static str,
    query: String,
    target: &'a str,
    belief: &'a StateMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    probability: Option<f64>,
    singly_connected: bool,
    trace: &'a PropagationTrace,
}

fn engine_config(global: &GlobalOpts) -> Result<EngineConfig> {
    let loaded = load_config(global.config.as_deref())?;
    tracing::debug!(source = %loaded.source, path = ?loaded.path, "configuration loaded");
    let mut config = loaded.config;
    if let Some(rows) = global.rows {
        config.data.row_limit = Some(rows);
    }
    Ok(config)
}

fn open_store(path: &Path, config: &EngineConfig) -> Result<FrequencyStore> {
    let mut store =
        FrequencyStore::open(DataSource::from(path.to_path_buf())).with_delimiter(config.data.delimiter);
    store.load(config.data.row_limit)?;
    Ok(store)
}

fn learn_structure(
    store: &FrequencyStore,
    config: &EngineConfig,
    order: Option<Vec<String>>,
    max_parents: Option<usize>,
) -> Result<LearnedStructure> {
    let learner = StructureLearner::new(K2Config {
        max_parents: max_parents.or(config.learning.max_parents),
    });
    let ordering = order.or_else(|| config.learning.ordering.clone());
    learner.learn(store, ordering.as_deref())
}

fn summary_line(variable: &str, belief: &StateMap) -> String {
    let states: Vec<String> = belief
        .iter()
        .map(|(state, p)| format!("{}={:.4}", state, p))
        .collect();
    format!("{}: {}", variable, states.join(" "))
}

fn print_belief_table<'a>(rows: impl Iterator<Item = (&'a str, &'a StateMap)>) {
    println!("| Variable | State | Probability |");
    println!("|----------|-------|-------------|");
    for (variable, belief) in rows {
        for (state, p) in belief {
            println!("| {} | {} | {:.6} |", variable, state, p);
        }
    }
}

fn print_learned_md(learned: &LearnedStructure, delimiter: char) -> Result<()> {
    println!("# Learned Structure");
    println!();
    println!("| Variable | Parents | Log score |");
    println!("|----------|---------|-----------|");
    for family in &learned.report {
        let parents = if family.parents.is_empty() {
            "-".to_string()
        } else {
            family.parents.join(", ")
        };
        println!("| {} | {} | {:.4} |", family.variable, parents, family.log_score);
    }
    println!();
    println!("```");
    print!("{}", learned.adjacency.render(delimiter)?);
    println!("```");
    Ok(())
}
