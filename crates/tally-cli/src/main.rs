#![forbid(unsafe_code)]

mod cmd;
mod fetch;
mod output;
mod source;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::process::ExitCode;
use tally_core::ErrorCode;
use tally_core::config::{EffectiveConfig, resolve_config};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tally: normalize board item records and recompute relation columns",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output (alias for `--format json`).
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Settle the output mode, using config when it loaded.
    fn output_mode(&self, config: Option<&EffectiveConfig>) -> OutputMode {
        resolve_output_mode(
            self.format,
            config.map(|c| c.resolved_output.as_str()),
            self.json,
        )
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Normalize items without resolving linked items",
        long_about = "Map column values, build mappable values, and recompute subitem rollups. Cross-board relation columns keep the values the API returned.",
        after_help = "EXAMPLES:\n    # Normalize a saved query response\n    tl normalize items.json\n\n    # Read from stdin and emit JSON\n    cat items.json | tl normalize --format json"
    )]
    Normalize(cmd::normalize::NormalizeArgs),

    #[command(
        about = "Normalize items and aggregate relation columns",
        long_about = "Run the full pipeline: normalize every item, collect linked item ids across the batch, resolve them with a single fetch, then recompute cross-board relation columns.",
        after_help = "EXAMPLES:\n    # Resolve linked items from a file\n    tl run items.json --linked linked.json\n\n    # Resolve linked items from the API (token from TALLY_API_TOKEN)\n    tl run items.json --endpoint https://api.monday.com/v2\n\n    # Emit machine-readable output\n    tl run items.json --linked linked.json --json"
    )]
    Run(cmd::run::RunArgs),

    #[command(
        about = "Explain a column settings blob",
        long_about = "Parse a relation column's settings and show its kind, target board, target column, and narrowing columns.",
        after_help = "EXAMPLES:\n    # Inspect a cross-board relation\n    tl relation '{\"relation_column\":{\"link\":true},\"displayed_linked_columns\":{\"999\":[\"price\"]}}'\n\n    # Read settings from stdin\n    echo '{}' | tl relation -"
    )]
    Relation(cmd::relation::RelationArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("TALLY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "tally=debug,tl=debug,info"
        } else {
            "tally=info,tl=info,warn"
        })
    });

    let format = env::var("TALLY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Run the selected command and report the mode its result should render in.
fn dispatch(cli: &Cli) -> (OutputMode, Result<(), CliError>) {
    let project_root = match env::current_dir() {
        Ok(root) => root,
        Err(err) => {
            let message = format!("cannot determine working directory: {err}");
            let error = CliError::with_code(message, ErrorCode::InternalUnexpected);
            return (cli.output_mode(None), Err(error));
        }
    };

    let config = match resolve_config(&project_root, cli.json) {
        Ok(config) => config,
        Err(err) => {
            let error = CliError::with_code(format!("{err:#}"), ErrorCode::ConfigParseError);
            return (cli.output_mode(None), Err(error));
        }
    };
    let output = cli.output_mode(Some(&config));
    debug!(?output, root = %project_root.display(), "resolved configuration");

    let result = match &cli.command {
        Commands::Normalize(args) => cmd::normalize::run_normalize(args, output),
        Commands::Run(args) => {
            cmd::run::run_run(args, output, &config.project.fetch, &project_root)
        }
        Commands::Relation(args) => cmd::relation::run_relation(args, output),
    };
    (output, result.map_err(|err| CliError::from_anyhow(&err)))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let (output, result) = dispatch(&cli);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if render_error(output, &error).is_err() {
                eprintln!("error: {}", error.message);
            }
            ExitCode::FAILURE
        }
    }
}
