//! inferload - load generator and resource profiler for inference endpoints

mod app;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use libinferload_core::{BenchError, Result, Scenario, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "inferload")]
#[command(about = "Load generator and resource profiler for chat-completion inference endpoints")]
#[command(version)]
struct Cli {
    /// Test type: normal, stress, queue (prompted for when omitted)
    mode: Option<String>,

    /// Configuration file, used only if it exists
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output JSON report to file
    #[arg(short = 'j', long)]
    json_report: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            e.exit_code()
        }
    };
    process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let scenario = match cli.mode {
        Some(mode) => mode.parse::<Scenario>()?,
        None => prompt_for_scenario()?,
    };

    let settings = app::RunSettings {
        scenario,
        config_path: cli.config,
        json_report_path: cli.json_report,
    };
    let report = app::run_headless(settings)?;

    Ok(if report.is_complete() { 0 } else { 1 })
}

fn prompt_for_scenario() -> Result<Scenario> {
    print!("Enter the test type (normal/stress/queue): ");
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(BenchError::Config("no test type given".to_string()));
    }
    line.parse()
}
