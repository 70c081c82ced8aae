//! One request paired with one sampling window

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{PromptCatalog, PromptSize, ResponseSize};
use crate::client::{CompletionRequest, InferenceClient};
use crate::config::BenchConfig;
use crate::error::Result;
use crate::sampler::{ResourceSampler, ResourceSource, SystemSource};

/// Creates a fresh resource source for each sampling window
pub type SourceFactory = Arc<dyn Fn() -> Box<dyn ResourceSource> + Send + Sync>;

/// Factory over host-wide `sysinfo` metrics
pub fn system_sources() -> SourceFactory {
    Arc::new(|| Box::new(SystemSource::new()) as Box<dyn ResourceSource>)
}

/// Outcome of one request attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Wall-clock seconds for the call, recorded on failure too
    pub response_time: f64,
    pub success: bool,
    /// Response body, or the transport error text
    pub response_text: String,
    /// Mean host CPU % during this call's window
    pub cpu_usage: f64,
    /// Mean host memory % during this call's window
    pub memory_usage: f64,
}

impl TestResult {
    /// Per-attempt log line
    pub fn attempt_line(&self, prompt: PromptSize, response: ResponseSize) -> String {
        format!(
            "Test {}-{} ran with response time {:.2}s, CPU: {:.2}%, Memory: {:.2}%, Response: {}",
            prompt, response, self.response_time, self.cpu_usage, self.memory_usage, self.response_text
        )
    }
}

/// What a single request sends
#[derive(Debug, Clone, PartialEq)]
pub enum WorkItem {
    /// Prompt and budget looked up by category when the unit runs
    Sized {
        prompt: PromptSize,
        response: ResponseSize,
        system: String,
    },
    /// Prompt text and budget given as-is
    Resolved {
        prompt: String,
        max_tokens: u32,
        system: String,
    },
}

/// Runs one inference call inside its own sampling window.
///
/// Cheap to clone; clones share the client, catalog and source factory.
#[derive(Clone)]
pub struct RequestUnit {
    client: Arc<dyn InferenceClient>,
    catalog: Arc<dyn PromptCatalog>,
    sources: SourceFactory,
    interval: Duration,
    temperature: f32,
}

impl RequestUnit {
    pub fn new(
        config: &BenchConfig,
        client: Arc<dyn InferenceClient>,
        catalog: Arc<dyn PromptCatalog>,
        sources: SourceFactory,
    ) -> Self {
        Self {
            client,
            catalog,
            sources,
            interval: config.sampler.interval(),
            temperature: config.endpoint.temperature,
        }
    }

    /// Execute one attempt.
    ///
    /// Transport and server failures come back as `success = false`. Only a
    /// prompt that cannot be resolved returns `Err`. The sampler is torn down
    /// on every path.
    pub fn execute(&self, item: &WorkItem) -> Result<TestResult> {
        let mut sampler = ResourceSampler::new((self.sources)(), self.interval);
        if let Err(err) = sampler.start() {
            warn!("resource sampler failed to start: {}", err);
        }

        // Resolved inside the window: corpus reads count as load
        let request = self.resolve(item)?;

        let started = Instant::now();
        let outcome = self.client.complete(&request);
        let response_time = started.elapsed().as_secs_f64();

        sampler.stop();
        if let Err(err) = sampler.join() {
            warn!("resource sampling cut short: {}", err);
        }
        let (cpu_usage, memory_usage) = sampler.get_average();

        let (success, response_text) = match outcome {
            Ok(completion) => (completion.is_success(), completion.body),
            Err(err) => (false, err.to_string()),
        };

        debug!(
            success,
            response_time, cpu_usage, memory_usage, "request attempt finished"
        );

        Ok(TestResult {
            response_time,
            success,
            response_text,
            cpu_usage,
            memory_usage,
        })
    }

    fn resolve(&self, item: &WorkItem) -> Result<CompletionRequest> {
        let (prompt, max_tokens, system) = match item {
            WorkItem::Sized {
                prompt,
                response,
                system,
            } => (self.catalog.prompt_for(*prompt)?, response.token_budget(), system),
            WorkItem::Resolved {
                prompt,
                max_tokens,
                system,
            } => (prompt.clone(), *max_tokens, system),
        };

        Ok(CompletionRequest {
            system: system.clone(),
            prompt,
            max_tokens,
            temperature: self.temperature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CorpusSource, StaticCatalog, SHORT_PROMPT};
    use crate::client::Completion;
    use crate::error::BenchError;
    use crate::sampler::ResourceSample;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replies with a fixed status after an optional delay
    struct ScriptedClient {
        status: Option<u16>,
        delay: Duration,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedClient {
        fn new(status: Option<u16>, delay: Duration) -> Self {
            Self {
                status,
                delay,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl InferenceClient for ScriptedClient {
        fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
            self.seen.lock().unwrap().push(request.clone());
            std::thread::sleep(self.delay);
            match self.status {
                Some(status) => Ok(Completion {
                    status,
                    body: format!("status {}", status),
                }),
                None => Err(BenchError::Config("connection refused".into())),
            }
        }
    }

    struct ConstantSource;

    impl ResourceSource for ConstantSource {
        fn prime(&mut self) -> Result<()> {
            Ok(())
        }

        fn sample(&mut self) -> Result<ResourceSample> {
            Ok(ResourceSample {
                cpu_percent: 25.0,
                memory_percent: 50.0,
            })
        }
    }

    fn constant_sources(created: Arc<AtomicUsize>) -> SourceFactory {
        Arc::new(move || {
            created.fetch_add(1, Ordering::SeqCst);
            Box::new(ConstantSource) as Box<dyn ResourceSource>
        })
    }

    fn unit_with(client: Arc<ScriptedClient>, interval_ms: u64) -> (RequestUnit, Arc<AtomicUsize>) {
        let mut config = BenchConfig::default();
        config.sampler.interval_ms = interval_ms;
        let created = Arc::new(AtomicUsize::new(0));
        let catalog = Arc::new(StaticCatalog::new(CorpusSource::new("does-not-exist.txt", 10)));
        let unit = RequestUnit::new(&config, client, catalog, constant_sources(Arc::clone(&created)));
        (unit, created)
    }

    fn sized(prompt: PromptSize, response: ResponseSize) -> WorkItem {
        WorkItem::Sized {
            prompt,
            response,
            system: "Answer within token limit.".to_string(),
        }
    }

    #[test]
    fn test_small_small_sends_short_prompt_with_64_tokens() {
        let client = Arc::new(ScriptedClient::new(Some(200), Duration::ZERO));
        let (unit, created) = unit_with(Arc::clone(&client), 1000);

        let result = unit.execute(&sized(PromptSize::Small, ResponseSize::Small)).unwrap();
        assert!(result.success);
        assert_eq!(result.response_text, "status 200");
        assert_eq!(created.load(Ordering::SeqCst), 1);

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].prompt, SHORT_PROMPT);
        assert_eq!(seen[0].max_tokens, 64);
        assert_eq!(seen[0].system, "Answer within token limit.");
        assert!((seen[0].temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_resolved_item_is_sent_verbatim() {
        let client = Arc::new(ScriptedClient::new(Some(200), Duration::ZERO));
        let (unit, _) = unit_with(Arc::clone(&client), 1000);

        let item = WorkItem::Resolved {
            prompt: "Short and simple prompt for testing.".to_string(),
            max_tokens: 64,
            system: "Keep your answers concise.".to_string(),
        };
        unit.execute(&item).unwrap();

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen[0].prompt, "Short and simple prompt for testing.");
        assert_eq!(seen[0].system, "Keep your answers concise.");
    }

    #[test]
    fn test_transport_failure_is_absorbed() {
        let client = Arc::new(ScriptedClient::new(None, Duration::ZERO));
        let (unit, _) = unit_with(client, 1000);

        let result = unit.execute(&sized(PromptSize::Medium, ResponseSize::Large)).unwrap();
        assert!(!result.success);
        assert!(result.response_text.contains("connection refused"));
        assert!(result.response_time >= 0.0);
        // Faster than one interval: no samples, no division by zero
        assert_eq!((result.cpu_usage, result.memory_usage), (0.0, 0.0));
    }

    #[test]
    fn test_server_error_status_is_failure() {
        let client = Arc::new(ScriptedClient::new(Some(500), Duration::ZERO));
        let (unit, _) = unit_with(client, 1000);

        let result = unit.execute(&sized(PromptSize::Large, ResponseSize::Small)).unwrap();
        assert!(!result.success);
        assert_eq!(result.response_text, "status 500");
    }

    #[test]
    fn test_slow_call_is_sampled() {
        let client = Arc::new(ScriptedClient::new(Some(200), Duration::from_millis(60)));
        let (unit, _) = unit_with(client, 5);

        let result = unit.execute(&sized(PromptSize::Small, ResponseSize::Medium)).unwrap();
        assert!(result.response_time >= 0.06);
        assert_eq!(result.cpu_usage, 25.0);
        assert_eq!(result.memory_usage, 50.0);
    }

    #[test]
    fn test_unresolvable_prompt_propagates() {
        let client = Arc::new(ScriptedClient::new(Some(200), Duration::ZERO));
        let (unit, _) = unit_with(Arc::clone(&client), 1000);

        let err = unit
            .execute(&sized(PromptSize::VeryLarge, ResponseSize::Small))
            .unwrap_err();
        assert!(matches!(err, BenchError::CorpusUnavailable { .. }));
        assert!(client.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_attempt_line() {
        let result = TestResult {
            response_time: 0.5,
            success: true,
            response_text: "{}".to_string(),
            cpu_usage: 1.0,
            memory_usage: 2.0,
        };
        assert_eq!(
            result.attempt_line(PromptSize::Small, ResponseSize::Large),
            "Test small-large ran with response time 0.50s, CPU: 1.00%, Memory: 2.00%, Response: {}"
        );
    }
}
