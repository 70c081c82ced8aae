//! Batch reduction into summary statistics

use std::fmt;

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};

use crate::catalog::{PromptSize, ResponseSize};
use crate::error::{BenchError, Result};
use crate::unit::TestResult;

/// What a batch was produced under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchLabel {
    Combination {
        prompt: PromptSize,
        response: ResponseSize,
    },
    Stress {
        prompt: PromptSize,
        response: ResponseSize,
    },
    Queue {
        concurrency: usize,
    },
}

impl BatchLabel {
    pub fn is_stress(&self) -> bool {
        matches!(self, BatchLabel::Stress { .. })
    }
}

impl fmt::Display for BatchLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchLabel::Combination { prompt, response } | BatchLabel::Stress { prompt, response } => {
                write!(f, "{}-{}", prompt, response)
            }
            BatchLabel::Queue { concurrency } => write!(f, "queue-{}", concurrency),
        }
    }
}

/// Latency percentiles over successful requests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyPercentiles {
    pub p50_us: u64,
    pub p95_us: u64,
    pub max_us: u64,
}

impl LatencyPercentiles {
    pub fn p50_ms(&self) -> f64 {
        self.p50_us as f64 / 1000.0
    }

    pub fn p95_ms(&self) -> f64 {
        self.p95_us as f64 / 1000.0
    }

    pub fn max_ms(&self) -> f64 {
        self.max_us as f64 / 1000.0
    }

    fn from_secs(latencies: impl Iterator<Item = f64>) -> Option<Self> {
        // 1 microsecond to 1 hour, 3 significant figures
        let mut hist = Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3).ok()?;
        for secs in latencies {
            hist.saturating_record(((secs * 1_000_000.0) as u64).max(1));
        }
        if hist.is_empty() {
            return None;
        }
        Some(Self {
            p50_us: hist.value_at_percentile(50.0),
            p95_us: hist.value_at_percentile(95.0),
            max_us: hist.max(),
        })
    }
}

/// Statistics for one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub label: BatchLabel,
    pub requests: usize,
    pub successes: usize,
    /// Fraction in [0, 1]
    pub success_rate: f64,
    /// Mean seconds over successful requests, `None` without any
    pub mean_latency: Option<f64>,
    pub latency_percentiles: Option<LatencyPercentiles>,
    /// Mean over all requests, including failures
    pub mean_cpu: f64,
    pub mean_memory: f64,
}

impl Summary {
    /// Reduce a batch. Order-independent, so concurrent batches may be
    /// passed in completion order.
    pub fn from_batch(label: BatchLabel, results: &[TestResult]) -> Result<Self> {
        if results.is_empty() {
            return Err(BenchError::EmptyBatch);
        }

        let requests = results.len();
        let n = requests as f64;
        let successful = || results.iter().filter(|r| r.success);

        let successes = successful().count();
        let mean_latency = if successes == 0 {
            None
        } else {
            Some(successful().map(|r| r.response_time).sum::<f64>() / successes as f64)
        };

        Ok(Self {
            label,
            requests,
            successes,
            success_rate: successes as f64 / n,
            mean_latency,
            latency_percentiles: LatencyPercentiles::from_secs(
                successful().map(|r| r.response_time),
            ),
            mean_cpu: results.iter().map(|r| r.cpu_usage).sum::<f64>() / n,
            mean_memory: results.iter().map(|r| r.memory_usage).sum::<f64>() / n,
        })
    }

    /// Mean latency over successes, an error when nothing succeeded
    pub fn mean_latency_secs(&self) -> Result<f64> {
        self.mean_latency.ok_or(BenchError::NoSuccesses)
    }

    /// One human-readable line for the summary log
    pub fn log_line(&self) -> String {
        let latency = match self.mean_latency {
            Some(secs) => format!("{:.2}s", secs),
            None => "n/a (no successful requests)".to_string(),
        };
        let rate = self.success_rate * 100.0;

        match self.label {
            BatchLabel::Combination { .. } => format!(
                "Combination {} Success Rate: {:.1}%, Average Response Time: {}, CPU Usage: {:.2}%, Memory Usage: {:.2}%",
                self.label, rate, latency, self.mean_cpu, self.mean_memory
            ),
            BatchLabel::Stress { .. } => format!(
                "Stress Test Results {} - Success Rate: {:.1}%, Average Response Time: {}, CPU Usage: {:.2}%, Memory Usage: {:.2}%",
                self.label, rate, latency, self.mean_cpu, self.mean_memory
            ),
            BatchLabel::Queue { concurrency } => format!(
                "Queue Test with {} requests: Success Rate = {:.1}%, Average Response Time = {}, CPU: {:.2}%, Memory: {:.2}%",
                concurrency, rate, latency, self.mean_cpu, self.mean_memory
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(success: bool, secs: f64, cpu: f64, memory: f64) -> TestResult {
        TestResult {
            response_time: secs,
            success,
            response_text: String::new(),
            cpu_usage: cpu,
            memory_usage: memory,
        }
    }

    const LABEL: BatchLabel = BatchLabel::Combination {
        prompt: PromptSize::Small,
        response: ResponseSize::Medium,
    };

    #[test]
    fn test_empty_batch_is_error() {
        assert!(matches!(Summary::from_batch(LABEL, &[]), Err(BenchError::EmptyBatch)));
    }

    #[test]
    fn test_latency_only_over_successes() {
        let batch = vec![
            result(true, 1.0, 10.0, 50.0),
            result(false, 9.0, 20.0, 60.0),
            result(true, 3.0, 30.0, 70.0),
        ];
        let summary = Summary::from_batch(LABEL, &batch).unwrap();

        assert_eq!(summary.requests, 3);
        assert_eq!(summary.successes, 2);
        assert!((summary.success_rate - 2.0 / 3.0).abs() < 1e-12);
        assert!((summary.mean_latency_secs().unwrap() - 2.0).abs() < 1e-12);
        // Resource means include the failed attempt
        assert!((summary.mean_cpu - 20.0).abs() < 1e-12);
        assert!((summary.mean_memory - 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_successful_rate_is_one() {
        let batch = vec![result(true, 0.5, 0.0, 0.0), result(true, 0.7, 0.0, 0.0)];
        let summary = Summary::from_batch(LABEL, &batch).unwrap();
        assert_eq!(summary.success_rate, 1.0);
    }

    #[test]
    fn test_no_successes_has_no_latency() {
        let batch = vec![result(false, 0.2, 5.0, 5.0), result(false, 0.0, 5.0, 5.0)];
        let summary = Summary::from_batch(LABEL, &batch).unwrap();

        assert_eq!(summary.success_rate, 0.0);
        assert_eq!(summary.mean_latency, None);
        assert!(summary.latency_percentiles.is_none());
        assert!(matches!(summary.mean_latency_secs(), Err(BenchError::NoSuccesses)));
        assert!(summary.log_line().contains("n/a (no successful requests)"));
    }

    #[test]
    fn test_order_independent() {
        let mut batch = vec![
            result(true, 0.1, 1.0, 2.0),
            result(false, 0.4, 3.0, 4.0),
            result(true, 0.9, 5.0, 6.0),
        ];
        let label = BatchLabel::Queue { concurrency: 3 };
        let forward = Summary::from_batch(label, &batch).unwrap();
        batch.reverse();
        let backward = Summary::from_batch(label, &batch).unwrap();

        assert_eq!(forward.successes, backward.successes);
        assert!((forward.mean_latency.unwrap() - backward.mean_latency.unwrap()).abs() < 1e-12);
        assert!((forward.mean_cpu - backward.mean_cpu).abs() < 1e-12);
    }

    #[test]
    fn test_percentiles() {
        let batch: Vec<_> = (1..=100).map(|ms| result(true, ms as f64 / 1000.0, 0.0, 0.0)).collect();
        let summary = Summary::from_batch(LABEL, &batch).unwrap();
        let p = summary.latency_percentiles.unwrap();

        assert!((p.p50_ms() - 50.0).abs() < 0.5);
        assert!((p.p95_ms() - 95.0).abs() < 0.5);
        assert!((p.max_ms() - 100.0).abs() < 0.5);
    }

    #[test]
    fn test_log_line_wording() {
        let batch = vec![result(true, 1.234, 12.5, 40.0)];

        let line = Summary::from_batch(LABEL, &batch).unwrap().log_line();
        assert_eq!(
            line,
            "Combination small-medium Success Rate: 100.0%, Average Response Time: 1.23s, CPU Usage: 12.50%, Memory Usage: 40.00%"
        );

        let stress = BatchLabel::Stress {
            prompt: PromptSize::VeryLarge,
            response: ResponseSize::Small,
        };
        let line = Summary::from_batch(stress, &batch).unwrap().log_line();
        assert!(line.starts_with("Stress Test Results very-large-small - Success Rate: 100.0%"));
        assert!(stress.is_stress());

        let line = Summary::from_batch(BatchLabel::Queue { concurrency: 10 }, &batch)
            .unwrap()
            .log_line();
        assert!(line.starts_with("Queue Test with 10 requests:"));
    }

    #[test]
    fn test_label_serializes_tagged() {
        let json = serde_json::to_value(LABEL).unwrap();
        assert_eq!(json["kind"], "combination");
        assert_eq!(json["prompt"], "small");
        assert_eq!(json["response"], "medium");
    }
}
