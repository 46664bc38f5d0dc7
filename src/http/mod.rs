// Blocking HTTP transport shared by the embedding and generation backends

#[cfg(test)]
mod tests;

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 1;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("failed to encode request: {0}")]
    Encode(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
    retry_attempts: u32,
    bearer_token: Option<String>,
}

impl HttpTransport {
    #[inline]
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            bearer_token: None,
        }
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    /// Number of attempts per request. `1` disables retrying.
    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Send `Authorization: Bearer <token>` with every request
    #[inline]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    #[inline]
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    #[inline]
    pub fn get(&self, url: &Url) -> Result<String, TransportError> {
        self.with_retry(url, || {
            let mut request = self.agent.get(url.as_str());
            if let Some(token) = &self.bearer_token {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            request
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    #[inline]
    pub fn post_json<T: Serialize>(&self, url: &Url, body: &T) -> Result<String, TransportError> {
        let request_json =
            serde_json::to_string(body).map_err(|e| TransportError::Encode(e.to_string()))?;

        self.with_retry(url, || {
            let mut request = self
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json");
            if let Some(token) = &self.bearer_token {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            request
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn with_retry<F>(&self, url: &Url, mut request_fn: F) -> Result<String, TransportError>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{} to {}", attempt, self.retry_attempts, url);

            match request_fn() {
                Ok(response_text) => return Ok(response_text),
                Err(error) => {
                    let (retryable, mapped) = classify(&error);
                    if !retryable {
                        warn!("Non-retryable error from {}: {}", url, mapped);
                        return Err(mapped);
                    }

                    warn!(
                        "Request to {} failed: {}, attempt {}/{}",
                        url, mapped, attempt, self.retry_attempts
                    );
                    last_error = Some(mapped);

                    if attempt < self.retry_attempts {
                        let delay =
                            Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        if self.retry_attempts > 1 {
            error!("All retry attempts failed for request to {}", url);
        }

        Err(last_error.unwrap_or_else(|| TransportError::Other("request was never sent".into())))
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Server errors and transport failures are retryable, client errors are not.
fn classify(error: &ureq::Error) -> (bool, TransportError) {
    match error {
        ureq::Error::StatusCode(status) => (*status >= 500, TransportError::Status(*status)),
        ureq::Error::Timeout(_) => (true, TransportError::Timeout(error.to_string())),
        ureq::Error::ConnectionFailed | ureq::Error::HostNotFound | ureq::Error::Io(_) => {
            (true, TransportError::Connection(error.to_string()))
        }
        _ => (false, TransportError::Other(error.to_string())),
    }
}

/// Join `path` onto `base` keeping any path prefix `base` already carries.
#[inline]
pub fn endpoint(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
}
