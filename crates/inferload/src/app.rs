//! Wiring from configuration to a finished scenario report

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use libinferload_core::{
    load_config, system_sources, BenchConfig, CorpusSource, FileSink, HttpClient, Result,
    Scenario, ScenarioReport, ScenarioRunner, StaticCatalog, StepOutcome,
};

/// What the command line asked for
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub scenario: Scenario,
    pub config_path: PathBuf,
    pub json_report_path: Option<PathBuf>,
}

/// Run one scenario without interaction and print the results
pub fn run_headless(settings: RunSettings) -> Result<ScenarioReport> {
    let config = match load_config(&settings.config_path)? {
        Some(config) => {
            info!("Loaded configuration from {}", settings.config_path.display());
            config
        }
        None => {
            debug!(
                "No configuration at {}, using defaults",
                settings.config_path.display()
            );
            BenchConfig::default()
        }
    };
    config.validate()?;

    let client = HttpClient::new(&config.endpoint)?;
    let catalog = StaticCatalog::new(CorpusSource::new(
        &config.stress.corpus_path,
        config.stress.corpus_words,
    ));
    let sink = FileSink::open(&config.log_path)?;

    println!(
        "Running {} test against {} ({})...",
        settings.scenario,
        client.url(),
        settings.scenario.description()
    );

    let runner = ScenarioRunner::new(
        config,
        Arc::new(client),
        Arc::new(catalog),
        system_sources(),
        Arc::new(sink),
    )?;
    let report = runner.run(settings.scenario);

    // Save JSON report if requested
    if let Some(ref path) = settings.json_report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)?;
        println!("Report saved to {}", path.display());
    }

    print_summary(&report, runner.config());
    Ok(report)
}

fn print_summary(report: &ScenarioReport, config: &BenchConfig) {
    println!();
    println!("=== RESULTS ===");
    for step in &report.steps {
        match step {
            StepOutcome::Completed(summary) => {
                println!("{}", summary.log_line());
                if let Some(ref p) = summary.latency_percentiles {
                    println!(
                        "  Latency: P50={:.2}ms P95={:.2}ms Max={:.2}ms",
                        p.p50_ms(),
                        p.p95_ms(),
                        p.max_ms()
                    );
                }
            }
            StepOutcome::Aborted { label, error } => {
                println!("Step {} aborted: {}", label, error);
            }
        }
    }
    println!(
        "{} steps in {:.2}s, {} aborted. Log: {}",
        report.steps.len(),
        report.elapsed_secs,
        report.aborted_steps(),
        config.log_path.display()
    );
}
