//! Request types for generation.

use serde::{Deserialize, Serialize};

use crate::sampling::SamplingParams;
use crate::types::{Message, RequestId};

/// Input format for prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptInput {
    /// A single user input, wrapped in the chat template before generation.
    Text(String),
    /// Chat messages (formatted with the Llama-2 chat template).
    Messages(Vec<Message>),
}

impl From<String> for PromptInput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for PromptInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<Message>> for PromptInput {
    fn from(messages: Vec<Message>) -> Self {
        Self::Messages(messages)
    }
}

impl PromptInput {
    /// Returns the conversation this prompt stands for.
    #[must_use]
    pub fn to_messages(&self) -> Vec<Message> {
        match self {
            Self::Text(text) => vec![Message::user(text.clone())],
            Self::Messages(messages) => messages.clone(),
        }
    }
}

/// Request for text generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Unique request identifier.
    #[serde(default)]
    pub request_id: RequestId,

    /// Input prompt.
    pub prompt: PromptInput,

    /// Sampling parameters.
    #[serde(default)]
    pub sampling: SamplingParams,
}

impl GenerateRequest {
    /// Creates a new generation request with the given prompt.
    #[must_use]
    pub fn new(prompt: impl Into<PromptInput>) -> Self {
        Self {
            request_id: RequestId::new(),
            prompt: prompt.into(),
            sampling: SamplingParams::default(),
        }
    }

    /// Creates a chat request.
    #[must_use]
    pub fn chat(messages: Vec<Message>) -> Self {
        Self::new(PromptInput::Messages(messages))
    }

    /// Sets the sampling parameters.
    #[must_use]
    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_text_prompt_is_a_user_turn() {
        let request = GenerateRequest::new("What is LoRA?");
        let messages = request.prompt.to_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "What is LoRA?");
    }
}
