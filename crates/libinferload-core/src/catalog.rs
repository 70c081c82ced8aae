//! Prompt and response size categories
//!
//! Sizes are closed enums: an unknown name is rejected when it is parsed,
//! not when the request is built.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

pub const SHORT_PROMPT: &str = "What is the capital of France?";

pub const MEDIUM_PROMPT: &str = "Explain how a hash map handles collisions. \
Compare separate chaining with open addressing, and describe when each \
approach performs better in practice.";

pub const LARGE_PROMPT: &str = "You are reviewing the design of a small web \
service that accepts uploaded images, resizes them into three thumbnail \
sizes, stores the results in object storage, and records metadata in a \
relational database. Requests arrive in bursts during business hours and \
are nearly idle overnight. The current implementation performs the resize \
inline in the request handler, which causes long tail latencies and \
occasional timeouts when several large images arrive at once. Describe how \
you would restructure the service to keep upload latency predictable. Cover \
the queueing strategy, how workers should be scaled, how failures and \
partial writes are detected and retried, how the database schema should \
track processing state, and which metrics you would monitor to confirm \
the new design behaves well under load.";

pub const VERY_SMALL_PROMPT: &str = "Quick example.";

fn normalize(name: &str) -> String {
    name.trim().to_lowercase().replace(['_', ' '], "-")
}

/// Symbolic prompt size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptSize {
    VerySmall,
    Small,
    Medium,
    Large,
    VeryLarge,
}

impl PromptSize {
    /// Sizes swept by the combinatorial scenario, in sweep order
    pub const SWEEP: [PromptSize; 3] = [PromptSize::Small, PromptSize::Medium, PromptSize::Large];

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptSize::VerySmall => "very-small",
            PromptSize::Small => "small",
            PromptSize::Medium => "medium",
            PromptSize::Large => "large",
            PromptSize::VeryLarge => "very-large",
        }
    }
}

impl fmt::Display for PromptSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptSize {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize(s).as_str() {
            "very-small" => Ok(PromptSize::VerySmall),
            "small" => Ok(PromptSize::Small),
            "medium" => Ok(PromptSize::Medium),
            "large" => Ok(PromptSize::Large),
            "very-large" => Ok(PromptSize::VeryLarge),
            _ => Err(BenchError::UnknownCategory {
                kind: "prompt size",
                value: s.to_string(),
            }),
        }
    }
}

/// Symbolic response size, mapped to a fixed token budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseSize {
    Small,
    Medium,
    Large,
}

impl ResponseSize {
    pub const SWEEP: [ResponseSize; 3] =
        [ResponseSize::Small, ResponseSize::Medium, ResponseSize::Large];

    /// `max_tokens` sent for this size
    pub fn token_budget(&self) -> u32 {
        match self {
            ResponseSize::Small => 64,
            ResponseSize::Medium => 256,
            ResponseSize::Large => 512,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSize::Small => "small",
            ResponseSize::Medium => "medium",
            ResponseSize::Large => "large",
        }
    }
}

impl fmt::Display for ResponseSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseSize {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize(s).as_str() {
            "small" => Ok(ResponseSize::Small),
            "medium" => Ok(ResponseSize::Medium),
            "large" => Ok(ResponseSize::Large),
            _ => Err(BenchError::UnknownCategory {
                kind: "response size",
                value: s.to_string(),
            }),
        }
    }
}

/// Supplies prompt text for a size category
pub trait PromptCatalog: Send + Sync {
    fn prompt_for(&self, size: PromptSize) -> Result<String>;
}

/// Text file cut down to its first `words` words
#[derive(Debug, Clone)]
pub struct CorpusSource {
    path: PathBuf,
    words: usize,
}

impl CorpusSource {
    pub fn new(path: impl Into<PathBuf>, words: usize) -> Self {
        Self {
            path: path.into(),
            words,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the corpus and join its leading words with single spaces
    pub fn read(&self) -> Result<String> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| {
            BenchError::CorpusUnavailable {
                path: self.path.clone(),
                source,
            }
        })?;
        Ok(text
            .split_whitespace()
            .take(self.words)
            .collect::<Vec<_>>()
            .join(" "))
    }
}

/// Built-in prompts, with the very-large prompt read from a corpus
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    corpus: CorpusSource,
}

impl StaticCatalog {
    pub fn new(corpus: CorpusSource) -> Self {
        Self { corpus }
    }
}

impl PromptCatalog for StaticCatalog {
    fn prompt_for(&self, size: PromptSize) -> Result<String> {
        match size {
            PromptSize::VerySmall => Ok(VERY_SMALL_PROMPT.to_string()),
            PromptSize::Small => Ok(SHORT_PROMPT.to_string()),
            PromptSize::Medium => Ok(MEDIUM_PROMPT.to_string()),
            PromptSize::Large => Ok(LARGE_PROMPT.to_string()),
            // Re-read on every call
            PromptSize::VeryLarge => self.corpus.read(),
        }
    }
}
