//! Text-generation backend
//!
//! The classification loop only needs "prompt in, text out". [`Oracle`]
//! is that seam; [`OllamaOracle`] talks to an Ollama server's
//! `/generate` endpoint.

use crate::config::OracleConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const TEMPERATURE: f64 = 0.3;
const STOP_SEQUENCE: &str = "</answer>";
const WARM_UP_PROMPT: &str = "Hello, how are you?";

#[async_trait]
pub trait Oracle: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    think: bool,
    stream: bool,
    keep_alive: String,
    temperature: f64,
    stop: [&'static str; 1],
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
}

/// Ollama HTTP client
#[derive(Debug, Clone)]
pub struct OllamaOracle {
    client: reqwest::Client,
    url: String,
    model: String,
    think: bool,
    stream: bool,
    keep_alive_minutes: u32,
}

impl OllamaOracle {
    /// Build a client for `config.base_url`.
    ///
    /// The base URL is used as given (for example
    /// `http://localhost:11434/api`); `/generate` is appended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}/generate", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            think: config.think,
            stream: config.stream,
            keep_alive_minutes: config.keep_alive,
        })
    }

    /// Send a throwaway prompt so the model is loaded before the first
    /// real classification.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if the backend is unreachable or
    /// rejects the request.
    pub async fn warm_up(&self) -> Result<()> {
        self.generate(WARM_UP_PROMPT).await?;
        info!(model = %self.model, "Oracle ready");
        Ok(())
    }
}

#[async_trait]
impl Oracle for OllamaOracle {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            think: self.think,
            stream: self.stream,
            keep_alive: format!("{}m", self.keep_alive_minutes),
            temperature: TEMPERATURE,
            stop: [STOP_SEQUENCE],
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "Calling oracle");
        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if status != reqwest::StatusCode::OK {
            return Err(Error::Oracle(format!("{status}: {body}")));
        }

        // A streamed reply is one JSON object per line; a plain reply is a
        // single object. Both carry the text in `response`.
        let mut text = String::new();
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            let chunk: GenerateChunk = serde_json::from_str(line)
                .map_err(|e| Error::Oracle(format!("Invalid response body: {e}")))?;
            text.push_str(&chunk.response);
        }

        debug!(response_len = text.len(), "Oracle responded");
        Ok(text)
    }
}
