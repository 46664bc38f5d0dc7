
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::Generator;
use crate::config::GeneratorConfig;
use crate::http::HttpTransport;
use crate::{RagError, Result};

/// Completion backend for predict-style text generation endpoints.
///
/// Posts `{"inputs": prompt, "parameters": {"max_new_tokens": n}}` and reads
/// `generated_text` from the first element of the response list.
#[derive(Debug, Clone)]
pub struct PredictGenerator {
    url: Url,
    max_new_tokens: u32,
    transport: HttpTransport,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    inputs: &'a str,
    parameters: Parameters,
}

#[derive(Debug, Serialize)]
struct Parameters {
    max_new_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct Generated {
    generated_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictResponse {
    List(Vec<Generated>),
    Single(Generated),
}

impl PredictGenerator {
    #[inline]
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        Ok(Self {
            url: config.url.clone(),
            max_new_tokens: config.max_new_tokens,
            transport: HttpTransport::new(Duration::from_secs(config.timeout_seconds))
                .with_retry_attempts(config.retry_attempts),
        })
    }
}

impl Generator for PredictGenerator {
    #[inline]
    fn generate(&self, prompt: &str) -> Result<String> {
        debug!(
            "Requesting completion from {} (prompt length: {})",
            self.url,
            prompt.len()
        );

        let request = PredictRequest {
            inputs: prompt,
            parameters: Parameters {
                max_new_tokens: self.max_new_tokens,
            },
        };

        let response_text = self
            .transport
            .post_json(&self.url, &request)
            .map_err(|e| RagError::Generation(format!("predict request failed: {}", e)))?;

        let response: PredictResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagError::Generation(format!("unrecognised generation response: {}", e))
        })?;

        match response {
            PredictResponse::List(items) => items
                .into_iter()
                .next()
                .map(|item| item.generated_text)
                .ok_or_else(|| RagError::Generation("model returned no generations".into())),
            PredictResponse::Single(item) => Ok(item.generated_text),
        }
    }
}
