// src/main.rs

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::info;

use vanguard_attack_runner::config::{DEFAULT_USER_AGENT, ExecutionMode, ScanConfig};
use vanguard_attack_runner::logging;
use vanguard_attack_runner::{AttackRunner, ScanEnvelope};

/// Run vulnerability check modules against a target and print a JSON report.
#[derive(Parser, Debug)]
#[command(name = "attack-runner", version, about)]
struct Cli {
    /// Target URL or host (e.g. https://example.com)
    target: String,

    /// Modules to run: recon, auth, client, file, post
    #[arg(required = true, num_args = 1..)]
    modules: Vec<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "ATTACK_RUNNER_TIMEOUT", default_value_t = 5)]
    timeout: u64,

    /// Per-port connect timeout in milliseconds
    #[arg(long, env = "ATTACK_RUNNER_CONNECT_TIMEOUT", default_value_t = 750)]
    connect_timeout: u64,

    #[arg(long, env = "ATTACK_RUNNER_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// How modules are scheduled; probes inside a module always run concurrently
    #[arg(long, value_enum, env = "ATTACK_RUNNER_EXECUTION", default_value_t = ExecutionMode::Sequential)]
    execution: ExecutionMode,

    /// Module limit for concurrent execution
    #[arg(long, env = "ATTACK_RUNNER_MAX_CONCURRENT_MODULES", default_value_t = 2)]
    max_concurrent_modules: usize,

    /// Wrap the report with the target, timestamps and a summary
    #[arg(long)]
    envelope: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Also write logs to this file (use `default` for the data directory)
    #[arg(long, env = "ATTACK_RUNNER_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            request_timeout: Duration::from_secs(self.timeout),
            connect_timeout: Duration::from_millis(self.connect_timeout),
            user_agent: self.user_agent.clone(),
            execution: self.execution,
            max_concurrent_modules: self.max_concurrent_modules,
            ..ScanConfig::default()
        }
    }

    fn log_path(&self) -> Option<PathBuf> {
        self.log_file.as_ref().map(|path| {
            if path.as_os_str() == "default" {
                logging::default_log_path()
            } else {
                path.clone()
            }
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::initialize_logging(cli.verbose, cli.log_path().as_deref())
        .wrap_err("failed to initialize logging")?;

    info!(target = %cli.target, modules = ?cli.modules, "Running attack.");
    let runner = AttackRunner::from_config(&cli.target, cli.modules.clone(), cli.scan_config())?;

    let started_at = Utc::now();
    let report = runner.run().await;
    let finished_at = Utc::now();

    let output = if cli.envelope {
        let envelope = ScanEnvelope::new(&cli.target, &cli.modules, started_at, finished_at, report);
        to_json(&envelope, cli.pretty)?
    } else {
        to_json(&report, cli.pretty)?
    };
    println!("{}", output);

    info!("Attack completed.");
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.wrap_err("failed to serialize report")
}
