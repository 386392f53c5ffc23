//! HTTP client for the `/inference` route.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use tunerx_telemetry::Timer;

use crate::error::{EvalError, Result};

/// Fixed-interval retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per question, including the first.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval: Duration::from_secs(1),
        }
    }
}

/// A successful answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Generated text.
    pub output: String,
    /// Duration of the successful request in seconds.
    pub request_secs: f64,
    /// Attempts used.
    pub attempts: u32,
}

#[derive(Debug, Deserialize)]
struct OutputBody {
    output: String,
}

/// Client asking the inference service one question at a time.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    url: String,
    retry: RetryPolicy,
}

impl InferenceClient {
    /// Creates a client for the given inference URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is empty, the retry policy allows no
    /// attempt, or the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, retry: RetryPolicy, timeout: Duration) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(EvalError::invalid_config("inference service URL is empty"));
        }
        if retry.max_attempts == 0 {
            return Err(EvalError::invalid_config("max_retries must be at least 1"));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url, retry })
    }

    /// Returns the inference URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends one question without retrying.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-2xx status, or a body
    /// without a string `output`.
    pub async fn ask_once(&self, question: &str) -> Result<String> {
        let response = self
            .http
            .post(&self.url)
            .json(&json!({ "messages": { "content": question } }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EvalError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let body: OutputBody =
            serde_json::from_slice(&bytes).map_err(|_| EvalError::MissingOutput)?;
        Ok(body.output)
    }

    /// Sends one question, retrying at a fixed interval.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::RetriesExhausted`] carrying the last failure when
    /// every attempt fails.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let timer = Timer::start("inference_request");

            match self.ask_once(question).await {
                Ok(output) => {
                    return Ok(Answer {
                        output,
                        request_secs: timer.elapsed_secs(),
                        attempts: attempt,
                    });
                },
                Err(e) if attempt < self.retry.max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        transient = e.is_retryable(),
                        error = %e,
                        "Inference request failed, retrying in {:?}",
                        self.retry.interval
                    );
                    tokio::time::sleep(self.retry.interval).await;
                },
                Err(e) => {
                    return Err(EvalError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                },
            }
        }
    }
}
