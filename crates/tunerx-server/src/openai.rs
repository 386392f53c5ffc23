//! OpenAI-compatible API types.
//!
//! These types mirror the OpenAI chat completion objects, plus the single-input
//! shapes accepted on the `/inference` route used by the scoring job.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use tunerx_core::{AdapterConfig, Error, Message, Result, Role, SamplingParams};

/// Upper bound on `n` for a single request.
pub const MAX_CHOICES: u32 = 8;

// === Chat Completions ===

/// Chat completion request (OpenAI-compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Messages in the conversation.
    pub messages: Vec<ChatCompletionMessage>,
    /// Model to use.
    #[serde(default)]
    pub model: String,
    /// Frequency penalty (-2.0 to 2.0).
    #[serde(default)]
    pub frequency_penalty: f32,
    /// Token bias map. Accepted for compatibility, not applied.
    #[serde(default)]
    pub logit_bias: Option<HashMap<String, f32>>,
    /// Maximum tokens to generate.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Number of completions to generate.
    #[serde(default = "default_n")]
    pub n: u32,
    /// Presence penalty (-2.0 to 2.0).
    #[serde(default)]
    pub presence_penalty: f32,
    /// Requested response format.
    #[serde(default)]
    pub response_format: ChatCompletionResponseFormat,
    /// Random seed.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Stop sequences.
    #[serde(default)]
    pub stop: Option<StopSequences>,
    /// Whether to stream the response.
    #[serde(default)]
    pub stream: bool,
    /// Temperature for sampling (0.0 - 2.0).
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Top-p (nucleus) sampling.
    #[serde(default)]
    pub top_p: Option<f32>,
    /// Tools the model may call.
    #[serde(default)]
    pub tools: Option<Vec<ChatCompletionTool>>,
    /// Tool selection mode.
    #[serde(default)]
    pub tool_choice: ChatCompletionToolChoice,
    /// User identifier for abuse monitoring.
    #[serde(default)]
    pub user: Option<String>,
}

fn default_n() -> u32 {
    1
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionMessage {
    /// Role (system, user, assistant).
    pub role: Role,
    /// Message content.
    pub content: String,
    /// Optional name for the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&ChatCompletionMessage> for Message {
    fn from(message: &ChatCompletionMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Response format selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionResponseFormat {
    /// Format type (`json_object` or `text`).
    #[serde(rename = "type")]
    pub kind: String,
}

impl Default for ChatCompletionResponseFormat {
    fn default() -> Self {
        Self {
            kind: "json_object".to_string(),
        }
    }
}

/// A tool declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionTool {
    /// Tool name.
    pub name: String,
}

/// Tool selection mode.
///
/// Accepts both the bare string form (`"auto"`) and the object form
/// (`{"type": "auto"}`); always serializes as the object form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ToolChoiceRepr")]
pub struct ChatCompletionToolChoice {
    /// Selection mode.
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ToolChoiceRepr {
    Mode(String),
    Object {
        #[serde(rename = "type")]
        kind: String,
    },
}

impl From<ToolChoiceRepr> for ChatCompletionToolChoice {
    fn from(repr: ToolChoiceRepr) -> Self {
        match repr {
            ToolChoiceRepr::Mode(kind) | ToolChoiceRepr::Object { kind } => Self { kind },
        }
    }
}

impl Default for ChatCompletionToolChoice {
    fn default() -> Self {
        Self {
            kind: "auto".to_string(),
        }
    }
}

/// Stop sequences, as a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    /// A single stop sequence.
    Single(String),
    /// Several stop sequences.
    Multiple(Vec<String>),
}

impl StopSequences {
    /// Returns the sequences as a list.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::Single(s) => vec![s.clone()],
            Self::Multiple(v) => v.clone(),
        }
    }
}

impl ChatCompletionRequest {
    /// Validates the request.
    ///
    /// Role membership is enforced while decoding; this checks everything the
    /// type system cannot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::invalid_request(
                "Invalid model ID. Model ID must be a non-empty string.",
            ));
        }
        if self.messages.is_empty() {
            return Err(Error::invalid_request(
                "Invalid messages field. It must be a non-empty list of message objects.",
            ));
        }
        if self.messages.iter().any(|m| m.content.is_empty()) {
            return Err(Error::invalid_request(
                "Invalid message content. It must be a non-empty string.",
            ));
        }
        if self.stream {
            return Err(Error::invalid_request("Streaming responses are not supported."));
        }
        if self.n == 0 || self.n > MAX_CHOICES {
            return Err(Error::invalid_request(format!(
                "Invalid n. It must be between 1 and {MAX_CHOICES}."
            )));
        }
        Ok(())
    }

    /// Merges the request's sampling overrides onto server defaults.
    #[must_use]
    pub fn to_sampling(&self, defaults: &SamplingParams) -> SamplingParams {
        let mut sampling = defaults.clone();
        if let Some(temperature) = self.temperature {
            sampling = sampling.with_temperature(temperature);
        }
        if let Some(top_p) = self.top_p {
            sampling = sampling.with_top_p(top_p);
        }
        if let Some(max_tokens) = self.max_tokens {
            sampling = sampling.with_max_tokens(max_tokens);
        }
        if let Some(stop) = &self.stop {
            for s in stop.to_vec() {
                sampling = sampling.with_stop(s);
            }
        }
        if let Some(seed) = self.seed {
            sampling = sampling.with_seed(seed);
        }
        sampling
            .with_presence_penalty(self.presence_penalty)
            .with_frequency_penalty(self.frequency_penalty)
    }

    /// Converts the wire messages into core messages.
    #[must_use]
    pub fn to_messages(&self) -> Vec<Message> {
        self.messages.iter().map(Message::from).collect()
    }
}

/// Chat completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    /// Response ID.
    pub id: String,
    /// Object type ("chat.completion").
    pub object: String,
    /// Creation timestamp (Unix epoch).
    pub created: i64,
    /// Model used.
    pub model: String,
    /// Fingerprint of the serving instance.
    pub system_fingerprint: String,
    /// Generated choices.
    pub choices: Vec<ChatCompletionChoice>,
    /// Token usage and timing statistics.
    pub usage: CompletionUsage,
}

impl ChatCompletionResponse {
    /// Content of the first choice, if any.
    #[must_use]
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// A chat completion choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChoice {
    /// Choice index.
    pub index: u32,
    /// Generated message.
    pub message: ChatCompletionChoiceMessage,
    /// Finish reason (stop, length).
    pub finish_reason: String,
}

/// Message carried by a choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChoiceMessage {
    /// Role of the author (always assistant when produced here).
    pub role: Role,
    /// Generated content.
    pub content: String,
    /// Tool calls requested by the model.
    #[serde(default)]
    pub tool_calls: Vec<serde_json::Value>,
}

impl ChatCompletionChoiceMessage {
    /// Creates an assistant message without tool calls.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// Token usage and timing statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionUsage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,
    /// Tokens generated.
    pub completion_tokens: u32,
    /// Total tokens.
    pub total_tokens: u32,
    /// Wall-clock generation time in seconds.
    #[serde(default, alias = "elasped_time")]
    pub elapsed_time: f64,
    /// Completion tokens per second.
    #[serde(default)]
    pub token_per_sec: f64,
}

impl CompletionUsage {
    /// Creates usage statistics from token counts and elapsed seconds.
    #[must_use]
    pub fn new(usage: tunerx_core::Usage, elapsed_time: f64) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            elapsed_time,
            token_per_sec: tunerx_core::response::tokens_per_second(
                usage.completion_tokens,
                elapsed_time,
            ),
        }
    }
}

// === Single-input inference ===

/// Body accepted by the `/inference` route.
///
/// Three shapes are understood:
/// `{"input": "..."}`, `{"messages": {"content": "..."}}` and
/// `{"messages": [{"role": "...", "content": "..."}, ...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InferenceInput {
    /// A bare input string.
    Input {
        /// The user input.
        input: String,
    },
    /// A message object or list.
    Messages {
        /// The message payload.
        messages: InferenceMessages,
    },
}

/// Message payload of an [`InferenceInput`].
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InferenceMessages {
    /// One message; the role defaults to user.
    Single(InferenceMessage),
    /// A full conversation.
    Conversation(Vec<ChatCompletionMessage>),
}

/// A single loosely-typed message.
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceMessage {
    /// Message content.
    pub content: String,
    /// Optional role, user when absent.
    #[serde(default)]
    pub role: Option<Role>,
}

impl InferenceInput {
    /// Converts the input into a conversation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if there is no non-empty content.
    pub fn into_messages(self) -> Result<Vec<Message>> {
        let messages = match self {
            Self::Input { input } => vec![Message::user(input)],
            Self::Messages {
                messages: InferenceMessages::Single(m),
            } => vec![Message {
                role: m.role.unwrap_or(Role::User),
                content: m.content,
            }],
            Self::Messages {
                messages: InferenceMessages::Conversation(list),
            } => list.iter().map(Message::from).collect(),
        };

        if messages.is_empty() {
            return Err(Error::invalid_request(
                "Invalid messages field. It must be a non-empty list of message objects.",
            ));
        }
        if messages.iter().any(|m| m.content.is_empty()) {
            return Err(Error::invalid_request(
                "Invalid message content. It must be a non-empty string.",
            ));
        }
        Ok(messages)
    }
}

/// Response of the `/inference` route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceOutput {
    /// Generated reply.
    pub output: String,
    /// Total tokens (prompt + completion).
    pub token_length: u32,
    /// Wall-clock generation time in seconds.
    pub elapsed_time: f64,
    /// Completion tokens per second.
    pub token_per_sec: f64,
}

// === Models ===

/// Models list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    /// Object type ("list").
    pub object: String,
    /// Available models.
    pub data: Vec<ModelObject>,
}

/// Model information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelObject {
    /// Model ID.
    pub id: String,
    /// Object type ("model").
    pub object: String,
    /// Creation timestamp.
    pub created: i64,
    /// Owner.
    pub owned_by: String,
    /// LoRA adapter stacked on the base model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<AdapterConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(json: &str) -> ChatCompletionRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_chat_request_defaults() {
        let req = request(
            r#"{
                "model": "llama2-7b-lora",
                "messages": [
                    {"role": "system", "content": "You are a helpful assistant."},
                    {"role": "user", "content": "Hello!"}
                ]
            }"#,
        );

        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.n, 1);
        assert!(!req.stream);
        assert_eq!(req.response_format.kind, "json_object");
        assert_eq!(req.tool_choice.kind, "auto");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_tool_choice_forms() {
        let req = request(r#"{"model": "m", "messages": [], "tool_choice": "none"}"#);
        assert_eq!(req.tool_choice.kind, "none");

        let req = request(r#"{"model": "m", "messages": [], "tool_choice": {"type": "auto"}}"#);
        assert_eq!(req.tool_choice.kind, "auto");

        let json = serde_json::to_value(&req.tool_choice).unwrap();
        assert_eq!(json, serde_json::json!({"type": "auto"}));
    }

    #[test]
    fn test_unknown_role_is_rejected_on_decode() {
        let result = serde_json::from_str::<ChatCompletionRequest>(
            r#"{"model": "m", "messages": [{"role": "tool", "content": "x"}]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_errors() {
        let empty_model = request(r#"{"messages": [{"role": "user", "content": "hi"}]}"#);
        assert!(empty_model
            .validate()
            .unwrap_err()
            .to_string()
            .starts_with("Invalid model ID"));

        let no_messages = request(r#"{"model": "m", "messages": []}"#);
        assert!(no_messages
            .validate()
            .unwrap_err()
            .to_string()
            .starts_with("Invalid messages field"));

        let empty_content = request(r#"{"model": "m", "messages": [{"role": "user", "content": ""}]}"#);
        assert!(empty_content
            .validate()
            .unwrap_err()
            .to_string()
            .starts_with("Invalid message content"));

        let streaming =
            request(r#"{"model": "m", "stream": true, "messages": [{"role": "user", "content": "x"}]}"#);
        assert!(streaming.validate().is_err());

        let too_many = request(r#"{"model": "m", "n": 9, "messages": [{"role": "user", "content": "x"}]}"#);
        assert!(too_many.validate().is_err());
    }

    #[test]
    fn test_to_sampling_overrides() {
        let req = request(
            r#"{
                "model": "m",
                "messages": [{"role": "user", "content": "x"}],
                "temperature": 0.7,
                "max_tokens": 64,
                "stop": "END",
                "seed": 7,
                "presence_penalty": 0.5
            }"#,
        );
        let sampling = req.to_sampling(&SamplingParams::default());
        assert!((sampling.temperature - 0.7).abs() < f32::EPSILON);
        assert!((sampling.top_p - 0.1).abs() < f32::EPSILON);
        assert_eq!(sampling.max_tokens, 64);
        assert_eq!(sampling.stop_sequences, vec!["END".to_string()]);
        assert_eq!(sampling.seed, Some(7));
        assert!((sampling.presence_penalty - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_response_roundtrip_and_shape() {
        let response = ChatCompletionResponse {
            id: "chatcmpl-123".to_string(),
            object: "chat.completion".to_string(),
            created: 1_677_649_420,
            model: "llama2-7b+ckpt".to_string(),
            system_fingerprint: "fp_0123456789".to_string(),
            choices: vec![ChatCompletionChoice {
                index: 0,
                message: ChatCompletionChoiceMessage::assistant("Answer"),
                finish_reason: "stop".to_string(),
            }],
            usage: CompletionUsage::new(tunerx_core::Usage::new(30, 50), 2.0),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["object"], "chat.completion");
        assert_eq!(json["choices"][0]["message"]["role"], "assistant");
        assert_eq!(json["choices"][0]["message"]["tool_calls"], serde_json::json!([]));
        assert_eq!(json["usage"]["total_tokens"], 80);
        assert_eq!(json["usage"]["token_per_sec"], 25.0);

        let back: ChatCompletionResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back.first_content(), Some("Answer"));
        assert_eq!(back.usage, response.usage);
    }

    #[test]
    fn test_usage_accepts_misspelled_elapsed_key() {
        let usage: CompletionUsage = serde_json::from_str(
            r#"{"prompt_tokens": 1, "completion_tokens": 2, "total_tokens": 3, "elasped_time": 1.5}"#,
        )
        .unwrap();
        assert!((usage.elapsed_time - 1.5).abs() < f64::EPSILON);
        assert_eq!(usage.token_per_sec, 0.0);
    }

    #[test]
    fn test_inference_input_shapes() {
        let input: InferenceInput = serde_json::from_str(r#"{"input": "hi"}"#).unwrap();
        assert_eq!(input.into_messages().unwrap(), vec![Message::user("hi")]);

        let input: InferenceInput =
            serde_json::from_str(r#"{"messages": {"content": "what is rust?"}}"#).unwrap();
        assert_eq!(input.into_messages().unwrap(), vec![Message::user("what is rust?")]);

        let input: InferenceInput = serde_json::from_str(
            r#"{"messages": [{"role": "system", "content": "s"}, {"role": "user", "content": "u"}]}"#,
        )
        .unwrap();
        let messages = input.into_messages().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);

        let input: InferenceInput = serde_json::from_str(r#"{"input": ""}"#).unwrap();
        assert!(input.into_messages().is_err());
    }

    #[test]
    fn test_inference_output_camel_case() {
        let output = InferenceOutput {
            output: "Paris".to_string(),
            token_length: 12,
            elapsed_time: 0.5,
            token_per_sec: 8.0,
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "output": "Paris",
                "tokenLength": 12,
                "elapsedTime": 0.5,
                "tokenPerSec": 8.0
            })
        );
    }
}
