//! Scenario orchestration
//!
//! Three independent strategies drive [`RequestUnit`]s and hand each batch to
//! [`Summary::from_batch`]:
//!
//! - **Normal**: every (prompt, response) size pair, prompt size outer, run
//!   sequentially `normal.repeats` times each.
//! - **Stress**: very-large and very-small prompts with the small response
//!   budget, run sequentially `stress.repeats` times each.
//! - **Queue**: for each concurrency level, exactly that many units released
//!   at once on their own threads. A level finishes completely before the
//!   next one starts.
//!
//! There is no retry and no early exit. A failed call is a `success = false`
//! entry in its batch. A step that cannot produce a batch is reported as
//! aborted and the scenario moves on.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::aggregate::{BatchLabel, Summary};
use crate::catalog::{PromptCatalog, PromptSize, ResponseSize};
use crate::client::InferenceClient;
use crate::config::BenchConfig;
use crate::error::{BenchError, Result};
use crate::sink::SummarySink;
use crate::unit::{RequestUnit, SourceFactory, TestResult, WorkItem};

/// Orchestration strategy, chosen once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Normal,
    Stress,
    Queue,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Normal => "normal",
            Scenario::Stress => "stress",
            Scenario::Queue => "queue",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Scenario::Normal => "Sweep every prompt/response size combination",
            Scenario::Stress => "Edge-case prompts: a corpus-sized prompt and a tiny one",
            Scenario::Queue => "Ramp concurrent small requests through ascending levels",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(Scenario::Normal),
            "stress" => Ok(Scenario::Stress),
            "queue" => Ok(Scenario::Queue),
            _ => Err(BenchError::UnknownCategory {
                kind: "scenario",
                value: s.to_string(),
            }),
        }
    }
}

/// Result of one scenario step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Completed(Summary),
    Aborted { label: BatchLabel, error: String },
}

impl StepOutcome {
    pub fn label(&self) -> BatchLabel {
        match self {
            StepOutcome::Completed(summary) => summary.label,
            StepOutcome::Aborted { label, .. } => *label,
        }
    }

    pub fn summary(&self) -> Option<&Summary> {
        match self {
            StepOutcome::Completed(summary) => Some(summary),
            StepOutcome::Aborted { .. } => None,
        }
    }
}

/// Everything one scenario run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub steps: Vec<StepOutcome>,
}

impl ScenarioReport {
    pub fn aborted_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, StepOutcome::Aborted { .. }))
            .count()
    }

    pub fn is_complete(&self) -> bool {
        self.aborted_steps() == 0
    }
}

/// Drives request units according to a [`Scenario`]
pub struct ScenarioRunner {
    config: BenchConfig,
    unit: RequestUnit,
    sink: Arc<dyn SummarySink>,
}

impl ScenarioRunner {
    pub fn new(
        config: BenchConfig,
        client: Arc<dyn InferenceClient>,
        catalog: Arc<dyn PromptCatalog>,
        sources: SourceFactory,
        sink: Arc<dyn SummarySink>,
    ) -> Result<Self> {
        config.validate()?;
        let unit = RequestUnit::new(&config, client, catalog, sources);
        Ok(Self { config, unit, sink })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Run one scenario to completion
    pub fn run(&self, scenario: Scenario) -> ScenarioReport {
        info!("Running {} scenario: {}", scenario, scenario.description());
        let started_at = Utc::now();
        let clock = Instant::now();

        let steps = match scenario {
            Scenario::Normal => self.run_normal(),
            Scenario::Stress => self.run_stress(),
            Scenario::Queue => self.run_queue(),
        };

        let report = ScenarioReport {
            scenario,
            started_at,
            elapsed_secs: clock.elapsed().as_secs_f64(),
            steps,
        };
        info!(
            "{} scenario finished: {} steps, {} aborted, {:.2}s",
            scenario,
            report.steps.len(),
            report.aborted_steps(),
            report.elapsed_secs
        );
        report
    }

    /// Size pairs swept by the normal scenario, prompt size outer
    pub fn normal_plan() -> Vec<(PromptSize, ResponseSize)> {
        PromptSize::SWEEP
            .into_iter()
            .flat_map(|p| ResponseSize::SWEEP.into_iter().map(move |r| (p, r)))
            .collect()
    }

    pub fn run_normal(&self) -> Vec<StepOutcome> {
        Self::normal_plan()
            .into_iter()
            .map(|(prompt, response)| {
                info!("{} {}", prompt, response);
                let label = BatchLabel::Combination { prompt, response };
                let item = WorkItem::Sized {
                    prompt,
                    response,
                    system: self.config.normal.system_prompt.clone(),
                };
                let batch = self.run_sequential(&item, self.config.normal.repeats);
                self.finish_step(label, batch)
            })
            .collect()
    }

    pub fn run_stress(&self) -> Vec<StepOutcome> {
        let response = ResponseSize::Small;
        [PromptSize::VeryLarge, PromptSize::VerySmall]
            .into_iter()
            .map(|prompt| {
                info!("stress {} {}", prompt, response);
                let label = BatchLabel::Stress { prompt, response };
                let item = WorkItem::Sized {
                    prompt,
                    response,
                    system: self.config.stress.system_prompt.clone(),
                };
                let batch = self.run_sequential(&item, self.config.stress.repeats);
                self.finish_step(label, batch)
            })
            .collect()
    }

    pub fn run_queue(&self) -> Vec<StepOutcome> {
        let item = WorkItem::Resolved {
            prompt: self.config.queue.prompt.clone(),
            max_tokens: ResponseSize::Small.token_budget(),
            system: self.config.queue.system_prompt.clone(),
        };

        self.config
            .queue
            .levels
            .iter()
            .map(|&level| {
                info!("queue level {}", level);
                let label = BatchLabel::Queue { concurrency: level };
                let batch = self.run_concurrent(&item, level);
                self.finish_step(label, batch)
            })
            .collect()
    }

    /// `repeats` attempts one after another, in submission order
    fn run_sequential(&self, item: &WorkItem, repeats: usize) -> Result<Vec<TestResult>> {
        let mut results = Vec::with_capacity(repeats);
        for _ in 0..repeats {
            let result = self.unit.execute(item)?;
            if let WorkItem::Sized { prompt, response, .. } = item {
                self.record(&result.attempt_line(*prompt, *response));
            }
            results.push(result);
        }
        Ok(results)
    }

    /// `level` attempts on `level` threads, released together
    fn run_concurrent(&self, item: &WorkItem, level: usize) -> Result<Vec<TestResult>> {
        // Workers block on a read until every worker has been spawned
        let gate = RwLock::new(());

        let joined = thread::scope(|scope| {
            let hold = gate.write().map_err(|_| BenchError::WorkerPanicked)?;

            let mut handles = Vec::with_capacity(level);
            for worker in 0..level {
                let spawned = thread::Builder::new()
                    .name(format!("queue-{}-{}", level, worker))
                    .spawn_scoped(scope, || {
                        drop(gate.read());
                        self.unit.execute(item)
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        drop(hold);
                        return Err(BenchError::Io(err));
                    }
                }
            }
            drop(hold);

            Ok(handles.into_iter().map(|h| h.join()).collect::<Vec<_>>())
        })?;

        // Single-threaded fold once every worker has been joined
        joined
            .into_iter()
            .map(|outcome| outcome.map_err(|_| BenchError::WorkerPanicked).and_then(|r| r))
            .collect()
    }

    fn finish_step(&self, label: BatchLabel, batch: Result<Vec<TestResult>>) -> StepOutcome {
        match batch.and_then(|results| Summary::from_batch(label, &results)) {
            Ok(summary) => {
                info!(
                    step = %label,
                    requests = summary.requests,
                    successes = summary.successes,
                    "step complete"
                );
                self.record(&summary.log_line());
                StepOutcome::Completed(summary)
            }
            Err(err) => {
                error!(step = %label, "step aborted: {}", err);
                self.record(&format!("Step {} aborted: {}", label, err));
                StepOutcome::Aborted {
                    label,
                    error: err.to_string(),
                }
            }
        }
    }

    fn record(&self, line: &str) {
        if let Err(err) = self.sink.record(line) {
            warn!("failed to write summary log: {}", err);
        }
    }
}
