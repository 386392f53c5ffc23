//! Response types for generation.

use serde::{Deserialize, Serialize};

use crate::types::{FinishReason, ModelId, RequestId, Usage};

/// Response from text generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Request identifier.
    pub request_id: RequestId,

    /// Model used for generation.
    pub model: ModelId,

    /// Generated completions.
    pub choices: Vec<Choice>,

    /// Token usage statistics.
    pub usage: Usage,

    /// Total generation time in milliseconds.
    pub total_time_ms: f64,
}

/// A single completion choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Index of this choice.
    pub index: u32,

    /// Generated text, already stripped of the prompt template.
    pub text: String,

    /// Reason generation stopped.
    pub finish_reason: FinishReason,
}

impl GenerateResponse {
    /// Text of the first choice, or an empty string when nothing was generated.
    #[must_use]
    pub fn text(&self) -> &str {
        self.choices.first().map_or("", |c| c.text.as_str())
    }

    /// Total generation time in seconds.
    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        self.total_time_ms / 1000.0
    }

    /// Completion tokens per second; zero when no time elapsed.
    #[must_use]
    pub fn tokens_per_second(&self) -> f64 {
        tokens_per_second(self.usage.completion_tokens, self.elapsed_secs())
    }
}

/// Throughput helper shared by the response shapes.
#[must_use]
pub fn tokens_per_second(completion_tokens: u32, elapsed_secs: f64) -> f64 {
    if elapsed_secs > 0.0 {
        f64::from(completion_tokens) / elapsed_secs
    } else {
        0.0
    }
}
