use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Default file name looked up when no config path is given
pub const DEFAULT_CONFIG_FILE: &str = "inferload.toml";

/// Harness configuration, stored as TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Append-only summary log
    pub log_path: PathBuf,
    pub endpoint: EndpointConfig,
    pub sampler: SamplerConfig,
    pub normal: NormalConfig,
    pub stress: StressConfig,
    pub queue: QueueConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("model_test_logs.txt"),
            endpoint: EndpointConfig::default(),
            sampler: SamplerConfig::default(),
            normal: NormalConfig::default(),
            stress: StressConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

/// Inference endpoint location and request shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Base URL, `/chat/completions` is appended
    pub base_url: String,
    /// Model identifier sent with every request
    pub model: String,
    pub temperature: f32,
    /// Per-call deadline. Calls block indefinitely when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234/v1".to_string(),
            model: "local-model".to_string(),
            temperature: 0.7,
            request_timeout_secs: None,
        }
    }
}

impl EndpointConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Polling interval in milliseconds
    pub interval_ms: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self { interval_ms: 100 }
    }
}

impl SamplerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Combinatorial sweep settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalConfig {
    pub repeats: usize,
    pub system_prompt: String,
}

impl Default for NormalConfig {
    fn default() -> Self {
        Self {
            repeats: 1,
            system_prompt: "Answer within token limit.".to_string(),
        }
    }
}

/// Edge-case sweep settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    pub repeats: usize,
    /// Text file the very-large prompt is cut from
    pub corpus_path: PathBuf,
    /// Number of leading corpus words kept
    pub corpus_words: usize,
    pub system_prompt: String,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            repeats: 3,
            corpus_path: PathBuf::from("book.txt"),
            corpus_words: 2000,
            system_prompt: "Answer within token limit.".to_string(),
        }
    }
}

/// Concurrency ramp settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Concurrency levels, strictly ascending
    pub levels: Vec<usize>,
    pub prompt: String,
    pub system_prompt: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            levels: vec![10, 50, 100, 200],
            prompt: "Short and simple prompt for testing.".to_string(),
            system_prompt: "Keep your answers concise.".to_string(),
        }
    }
}

impl BenchConfig {
    /// Check values that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.base_url.trim().is_empty() {
            return Err(BenchError::Config("endpoint.base_url must not be empty".into()));
        }
        if self.sampler.interval_ms == 0 {
            return Err(BenchError::Config("sampler.interval_ms must be positive".into()));
        }
        if self.normal.repeats == 0 {
            return Err(BenchError::Config("normal.repeats must be positive".into()));
        }
        if self.stress.repeats == 0 {
            return Err(BenchError::Config("stress.repeats must be positive".into()));
        }
        if self.stress.corpus_words == 0 {
            return Err(BenchError::Config("stress.corpus_words must be positive".into()));
        }
        if self.queue.levels.is_empty() {
            return Err(BenchError::Config("queue.levels must not be empty".into()));
        }
        if self.queue.levels.contains(&0) {
            return Err(BenchError::Config("queue.levels must be positive".into()));
        }
        if self.queue.levels.windows(2).any(|w| w[0] >= w[1]) {
            return Err(BenchError::Config(format!(
                "queue.levels must be strictly ascending, got {:?}",
                self.queue.levels
            )));
        }
        Ok(())
    }
}

/// Load config from a TOML file, `None` if it does not exist
pub fn load_config(path: &Path) -> Result<Option<BenchConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let config: BenchConfig = toml::from_str(&content)?;
    Ok(Some(config))
}

/// Save config to a TOML file
pub fn save_config(path: &Path, config: &BenchConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
