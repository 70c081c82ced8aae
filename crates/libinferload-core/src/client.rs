//! Inference endpoint boundary
//!
//! The harness only needs a status and a body back from each call. Latency
//! is measured by the caller around `complete`.

use reqwest::blocking::Client;
use serde::Serialize;

use crate::config::EndpointConfig;
use crate::error::Result;

/// One chat-completion call: a system instruction plus the user prompt
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Raw outcome of a call that reached the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub status: u16,
    pub body: String,
}

impl Completion {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs one blocking round-trip to the inference endpoint.
///
/// `Err` means the call never produced a response (connection refused,
/// timeout, broken body). A non-2xx response is still `Ok`.
pub trait InferenceClient: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// OpenAI-compatible chat completion request body
#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

/// `InferenceClient` over an OpenAI-compatible `/chat/completions` endpoint
pub struct HttpClient {
    client: Client,
    url: String,
    model: String,
}

impl HttpClient {
    pub fn new(config: &EndpointConfig) -> Result<Self> {
        // `None` disables reqwest's default 30s timeout
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            client,
            url: chat_completions_url(&config.base_url),
            model: config.model.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl InferenceClient for HttpClient {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = ChatCompletionBody {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self.client.post(&self.url).json(&body).send()?;
        let status = response.status().as_u16();
        let body = response.text()?;

        Ok(Completion { status, body })
    }
}

fn chat_completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}
