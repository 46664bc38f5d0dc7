#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::Generator;
use crate::config::GeneratorConfig;
use crate::http::{HttpTransport, endpoint};
use crate::{RagError, Result};

/// Completion backend speaking the Ollama `/api/generate` protocol
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    base_url: Url,
    model: String,
    max_new_tokens: u32,
    transport: HttpTransport,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.url.clone(),
            model: config.model.clone(),
            max_new_tokens: config.max_new_tokens,
            transport: HttpTransport::new(Duration::from_secs(config.timeout_seconds))
                .with_retry_attempts(config.retry_attempts),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.transport = self.transport.with_timeout(timeout);
        self
    }
}

impl Generator for OllamaGenerator {
    #[inline]
    fn generate(&self, prompt: &str) -> Result<String> {
        let url = endpoint(&self.base_url, "api/generate")
            .map_err(|e| RagError::Config(format!("invalid Ollama URL: {}", e)))?;

        debug!(
            "Requesting completion from {} with model {} (prompt length: {})",
            self.base_url,
            self.model,
            prompt.len()
        );

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: self.max_new_tokens,
            },
        };

        let response_text = self
            .transport
            .post_json(&url, &request)
            .map_err(|e| RagError::Generation(format!("Ollama generate request failed: {}", e)))?;

        let response: GenerateResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagError::Generation(format!("failed to parse generate response: {}", e))
        })?;

        Ok(response.response)
    }
}
