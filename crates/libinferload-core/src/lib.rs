//! Core library for inferload
//!
//! This crate provides:
//! - Background host resource sampling (`ResourceSampler`)
//! - Size categories and the prompt catalog
//! - The inference endpoint boundary and its HTTP client
//! - Request units pairing one call with one sampling window
//! - Batch aggregation into summaries
//! - The normal, stress and queue scenario runners

pub mod aggregate;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod sampler;
pub mod scenario;
pub mod sink;
pub mod unit;

pub use aggregate::{BatchLabel, LatencyPercentiles, Summary};
pub use catalog::{CorpusSource, PromptCatalog, PromptSize, ResponseSize, StaticCatalog};
pub use client::{Completion, CompletionRequest, HttpClient, InferenceClient};
pub use config::{load_config, save_config, BenchConfig, DEFAULT_CONFIG_FILE};
pub use error::{BenchError, Result};
pub use sampler::{ResourceSample, ResourceSampler, ResourceSource, SamplerState, SystemSource};
pub use scenario::{Scenario, ScenarioReport, ScenarioRunner, StepOutcome};
pub use sink::{FileSink, MemorySink, SummarySink};
pub use unit::{system_sources, RequestUnit, SourceFactory, TestResult, WorkItem};
