//! Live validator CLI.
//!
//! Loads a spec corpus, then validates recorded traffic from a JSON file
//! holding one `{ liveRequest, liveResponse }` pair or an array of them.
//!
//! ```text
//! live-validator --config validator.toml validate --input traffic.json
//! live-validator --spec specs/foo.json roundtrip --input traffic.json
//! ```
//!
//! One JSON report per pair is printed to stdout. The exit code is 1 when any
//! pair failed validation and 2 on setup errors.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;

use live_validator::config::validation::validate_config;
use live_validator::config::{load_config, ValidatorConfig};
use live_validator::observability::logging::init_logging;
use live_validator::{LiveValidator, RequestResponsePair, ValidateOptions};

#[derive(Parser)]
#[command(name = "live-validator")]
#[command(about = "Validate recorded API traffic against Swagger specs", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Spec file to load instead of the configured corpus (repeatable)
    #[arg(long = "spec", global = true)]
    specs: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate requests and responses against their operations
    Validate {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Check that responses echo request bodies consistently
    Roundtrip {
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ValidatorConfig::default(),
    };
    if !cli.specs.is_empty() {
        config.specs.paths = cli.specs.clone();
    }
    if let Commands::Roundtrip { .. } = cli.command {
        config.round_trip.enabled = true;
    }
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("config error: {}", error);
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "live-validator starting");

    let mut validator = LiveValidator::new(config);
    let summary = validator.initialize().await;
    tracing::info!(
        loaded = summary.loaded,
        failed = summary.failed,
        operations = summary.operations,
        "Validator ready"
    );

    let options = ValidateOptions::default();
    let mut all_passed = true;
    let mut reports = Vec::new();
    match &cli.command {
        Commands::Validate { input } => {
            for pair in read_pairs(input)? {
                let result = validator.validate_live_request_response(&pair, &options).await;
                all_passed &= result.is_successful() == Some(true);
                reports.push(serde_json::to_value(result.to_report())?);
            }
        }
        Commands::Roundtrip { input } => {
            for pair in read_pairs(input)? {
                let pair: RequestResponsePair = match serde_json::from_value(pair) {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping malformed request/response pair");
                        all_passed = false;
                        continue;
                    }
                };
                let result = validator.validate_round_trip(&pair).await;
                all_passed &= result.is_successful() == Some(true);
                reports.push(serde_json::to_value(result.to_report())?);
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(all_passed)
}

/// One pair or an array of pairs.
fn read_pairs(path: &Path) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    Ok(match serde_json::from_str::<Value>(&content)? {
        Value::Array(pairs) => pairs,
        pair => vec![pair],
    })
}
