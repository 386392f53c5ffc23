//! Inference engine abstraction.
//!
//! The model weights (base model plus merged LoRA adapter) are hosted by an
//! external runtime exposing an OpenAI-style `/v1/completions` route. The
//! server talks to it through [`InferenceEngine`], which keeps the HTTP layer
//! testable against an in-memory engine.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tunerx_core::template::{self, DEFAULT_SYSTEM_PROMPT};
use tunerx_core::{
    estimate_tokens, Choice, Error, FinishReason, GenerateRequest, GenerateResponse, Result,
    ServedModel, Usage,
};

/// Trait for inference engines.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Generates a completion for the given request.
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;

    /// Returns the model being served.
    fn model_info(&self) -> &ServedModel;

    /// Returns true if the engine can serve requests.
    async fn is_ready(&self) -> bool;
}

/// Configuration for [`RemoteEngine`].
#[derive(Debug, Clone)]
pub struct RemoteEngineConfig {
    /// Base URL of the runtime (without `/v1`).
    pub base_url: String,
    /// Model name known to the runtime; the served model id when unset.
    pub runtime_model: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// System prompt used when a conversation carries none.
    pub system_prompt: String,
}

impl Default for RemoteEngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            runtime_model: None,
            timeout: Duration::from_secs(300),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl RemoteEngineConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> RemoteEngineConfigBuilder {
        RemoteEngineConfigBuilder::default()
    }
}

/// Builder for [`RemoteEngineConfig`].
#[derive(Debug, Default)]
pub struct RemoteEngineConfigBuilder {
    base_url: Option<String>,
    runtime_model: Option<String>,
    timeout: Option<Duration>,
    system_prompt: Option<String>,
}

impl RemoteEngineConfigBuilder {
    /// Sets the runtime base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the runtime-side model name.
    #[must_use]
    pub fn runtime_model(mut self, model: impl Into<String>) -> Self {
        self.runtime_model = Some(model.into());
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the default system prompt.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is missing its scheme.
    pub fn build(self) -> Result<RemoteEngineConfig> {
        let defaults = RemoteEngineConfig::default();
        let base_url = self
            .base_url
            .unwrap_or(defaults.base_url)
            .trim_end_matches('/')
            .to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::InvalidConfig {
                message: format!("runtime url must start with http:// or https://: {base_url}"),
            });
        }

        Ok(RemoteEngineConfig {
            base_url,
            runtime_model: self.runtime_model,
            timeout: self.timeout.unwrap_or(defaults.timeout),
            system_prompt: self.system_prompt.unwrap_or(defaults.system_prompt),
        })
    }
}

#[derive(Debug, Serialize)]
struct CompletionsBody<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionsReply {
    #[serde(default)]
    choices: Vec<CompletionsChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct CompletionsChoice {
    #[serde(default)]
    text: String,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Engine backed by an OpenAI-style completions runtime.
pub struct RemoteEngine {
    client: reqwest::Client,
    config: RemoteEngineConfig,
    served: ServedModel,
}

impl RemoteEngine {
    /// Creates an engine for the given served model.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: RemoteEngineConfig, served: ServedModel) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(
            runtime = %config.base_url,
            model = %served.id,
            "Remote inference engine configured"
        );

        Ok(Self {
            client,
            config,
            served,
        })
    }

    fn runtime_model(&self) -> &str {
        self.config
            .runtime_model
            .as_deref()
            .unwrap_or_else(|| self.served.id.as_str())
    }

    fn map_send_error(&self, e: &reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                duration: self.config.timeout,
            }
        } else if e.is_connect() {
            Error::NotReady {
                model_id: self.served.id.to_string(),
            }
        } else {
            Error::runtime(e.status().map_or(0, |s| s.as_u16()), e.to_string())
        }
    }
}

#[async_trait]
impl InferenceEngine for RemoteEngine {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let start = Instant::now();
        tracing::debug!(request_id = %request.request_id, "Starting generation");

        let messages = request.prompt.to_messages();
        let prompt = template::render_prompt(&messages, &self.config.system_prompt);
        let sampling = &request.sampling;

        let body = CompletionsBody {
            model: self.runtime_model(),
            prompt: &prompt,
            max_tokens: sampling.max_tokens,
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            stop: &sampling.stop_sequences,
            seed: sampling.seed,
            frequency_penalty: sampling.frequency_penalty,
            presence_penalty: sampling.presence_penalty,
        };

        let url = format!("{}/v1/completions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %text, "Runtime rejected request");
            return Err(Error::runtime(status.as_u16(), text));
        }

        let reply: CompletionsReply = response
            .json()
            .await
            .map_err(|e| Error::runtime(status.as_u16(), format!("malformed runtime reply: {e}")))?;

        if reply.choices.is_empty() {
            return Err(Error::runtime(status.as_u16(), "runtime returned no choices"));
        }

        let choices: Vec<Choice> = reply
            .choices
            .into_iter()
            .zip(0u32..)
            .map(|(c, index)| Choice {
                index,
                text: template::extract_reply(&c.text),
                finish_reason: FinishReason::from_wire(c.finish_reason.as_deref()),
            })
            .collect();

        let usage = reply.usage.unwrap_or_else(|| {
            let completion = choices.iter().map(|c| estimate_tokens(&c.text)).sum();
            Usage::new(estimate_tokens(&prompt), completion)
        });

        let total_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(
            request_id = %request.request_id,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_time_ms,
            "Generation complete"
        );

        Ok(GenerateResponse {
            request_id: request.request_id,
            model: self.served.id.clone(),
            choices,
            usage,
            total_time_ms,
        })
    }

    fn model_info(&self) -> &ServedModel {
        &self.served
    }

    async fn is_ready(&self) -> bool {
        let url = format!("{}/health", self.config.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "Runtime health check failed");
                false
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use tokio::sync::Mutex;

    type Captured = Arc<Mutex<Option<serde_json::Value>>>;

    async fn spawn_runtime(reply: serde_json::Value, status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(None));
        let state = (captured.clone(), reply, status);

        let app = Router::new()
            .route(
                "/v1/completions",
                post(
                    |State((captured, reply, status)): State<(
                        Captured,
                        serde_json::Value,
                        StatusCode,
                    )>,
                     Json(body): Json<serde_json::Value>| async move {
                        *captured.lock().await = Some(body);
                        (status, Json(reply))
                    },
                ),
            )
            .route("/health", get(|| async { "OK" }))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), captured)
    }

    fn engine(base_url: &str) -> RemoteEngine {
        let config = RemoteEngineConfig::builder()
            .base_url(base_url)
            .runtime_model("llama2-7b-merged")
            .build()
            .unwrap();
        RemoteEngine::new(config, ServedModel::named("llama2-7b+checkpoint-42")).unwrap()
    }

    #[test]
    fn test_config_builder_validates_url() {
        let config = RemoteEngineConfig::builder()
            .base_url("http://runtime:8000/")
            .build()
            .unwrap();
        assert_eq!(config.base_url, "http://runtime:8000");
        assert!(RemoteEngineConfig::builder().base_url("runtime:8000").build().is_err());
    }

    #[tokio::test]
    async fn test_generate_forwards_sampling_and_extracts_reply() {
        let (url, captured) = spawn_runtime(
            serde_json::json!({
                "choices": [{"text": "<s>[INST] hi [/INST]\n Hello there! ", "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 40, "completion_tokens": 3, "total_tokens": 43}
            }),
            StatusCode::OK,
        )
        .await;
        let engine = engine(&url);

        let request = GenerateRequest::new("hi").with_sampling(
            tunerx_core::SamplingParams::default()
                .with_max_tokens(32)
                .with_seed(3),
        );
        let response = engine.generate(request).await.unwrap();

        assert_eq!(response.text(), "Hello there!");
        assert_eq!(response.usage.total_tokens, 43);
        assert_eq!(response.choices[0].finish_reason, FinishReason::Stop);
        assert_eq!(response.model.as_str(), "llama2-7b+checkpoint-42");

        let body = captured.lock().await.clone().unwrap();
        assert_eq!(body["model"], "llama2-7b-merged");
        assert_eq!(body["max_tokens"], 32);
        assert_eq!(body["seed"], 3);
        assert!(body.get("stop").is_none());
        let prompt = body["prompt"].as_str().unwrap();
        assert!(prompt.starts_with("<s>[INST] <<SYS>>\n"));
        assert!(prompt.ends_with("hi [/INST]\n"));
    }

    #[tokio::test]
    async fn test_generate_estimates_usage_when_missing() {
        let (url, _) = spawn_runtime(
            serde_json::json!({"choices": [{"text": "abcdefgh", "finish_reason": "length"}]}),
            StatusCode::OK,
        )
        .await;
        let response = engine(&url).generate(GenerateRequest::new("hi")).await.unwrap();

        assert_eq!(response.usage.completion_tokens, 2);
        assert!(response.usage.prompt_tokens > 0);
        assert_eq!(response.choices[0].finish_reason, FinishReason::Length);
    }

    #[tokio::test]
    async fn test_generate_maps_runtime_failure() {
        let (url, _) = spawn_runtime(
            serde_json::json!({"error": "out of memory"}),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .await;
        let err = engine(&url).generate(GenerateRequest::new("hi")).await.unwrap_err();

        assert!(matches!(err, Error::Runtime { status: 500, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_generate_unreachable_runtime_is_not_ready() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = engine(&format!("http://{addr}"))
            .generate(GenerateRequest::new("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotReady { .. }), "got {err}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_is_ready_checks_health() {
        let (url, _) = spawn_runtime(serde_json::json!({}), StatusCode::OK).await;
        assert!(engine(&url).is_ready().await);

        let unreachable = engine("http://127.0.0.1:9");
        assert!(!unreachable.is_ready().await);
    }
}
