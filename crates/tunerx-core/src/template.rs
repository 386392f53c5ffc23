//! Llama-2 chat prompt template.
//!
//! The fine-tuned checkpoints are trained on the Llama-2 chat format, so every
//! request is rendered into it before reaching the runtime:
//!
//! ```text
//! <s>[INST] <<SYS>>
//! {system}
//! <</SYS>>
//!
//! {user} [/INST] {assistant} </s><s>[INST] {user} [/INST]
//! ```

use crate::types::{Message, Role};

/// Marker closing an instruction block.
pub const INST_CLOSE: &str = "[/INST]";

/// System prompt used when the request carries none.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, respectful and honest assistant. \
Always answer as helpfully as possible, while being safe.  Your answers should not include any \
harmful, unethical, racist, sexist, toxic, dangerous, or illegal content. Please ensure that your \
responses are socially unbiased and positive in nature.\n\nIf a question does not make any sense, \
or is not factually coherent, explain why instead of answering something not correct. If you \
don't know the answer to a question, please don't share false information.";

/// One user turn and the assistant answer that followed it, if any.
#[derive(Debug, Default)]
struct Exchange<'a> {
    user: Vec<&'a str>,
    assistant: Option<&'a str>,
}

/// Renders a conversation into the Llama-2 chat format.
///
/// System messages anywhere in the conversation replace `default_system`
/// (joined by blank lines when there are several). Consecutive user messages
/// are merged into one instruction block.
#[must_use]
pub fn render_prompt(messages: &[Message], default_system: &str) -> String {
    let system_parts: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.trim())
        .collect();
    let system = if system_parts.is_empty() {
        default_system.to_string()
    } else {
        system_parts.join("\n\n")
    };

    let mut exchanges: Vec<Exchange<'_>> = Vec::new();
    let mut current = Exchange::default();
    for message in messages {
        match message.role {
            Role::System => {}
            Role::User => current.user.push(message.content.trim()),
            Role::Assistant => {
                current.assistant = Some(message.content.trim());
                exchanges.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.user.is_empty() || exchanges.is_empty() {
        exchanges.push(current);
    }

    let mut prompt = String::new();
    for (i, exchange) in exchanges.iter().enumerate() {
        prompt.push_str("<s>[INST] ");
        if i == 0 {
            prompt.push_str("<<SYS>>\n");
            prompt.push_str(&system);
            prompt.push_str("\n<</SYS>>\n\n");
        }
        prompt.push_str(&exchange.user.join("\n"));
        prompt.push(' ');
        prompt.push_str(INST_CLOSE);
        match exchange.assistant {
            Some(answer) => {
                prompt.push(' ');
                prompt.push_str(answer);
                prompt.push_str(" </s>");
            }
            None => prompt.push('\n'),
        }
    }
    prompt
}

/// Extracts the model reply from generated text.
///
/// Runtimes that echo the prompt return the whole conversation; the reply is
/// whatever follows the last `[/INST]`. Text without the marker is the reply
/// itself.
#[must_use]
pub fn extract_reply(generated: &str) -> String {
    let reply = match generated.rfind(INST_CLOSE) {
        Some(pos) => &generated[pos + INST_CLOSE.len()..],
        None => generated,
    };
    reply.trim().trim_end_matches("</s>").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_input_layout() {
        let prompt = render_prompt(&[Message::user("What is LoRA?")], "Be brief.");
        assert_eq!(
            prompt,
            "<s>[INST] <<SYS>>\nBe brief.\n<</SYS>>\n\nWhat is LoRA? [/INST]\n"
        );
    }

    #[test]
    fn test_default_system_prompt_used() {
        let prompt = render_prompt(&[Message::user("hi")], DEFAULT_SYSTEM_PROMPT);
        assert!(prompt.contains("helpful, respectful and honest assistant"));
        assert!(prompt.ends_with("hi [/INST]\n"));
    }

    #[test]
    fn test_request_system_message_overrides_default() {
        let messages = vec![Message::system("Answer in French."), Message::user("Hello")];
        let prompt = render_prompt(&messages, DEFAULT_SYSTEM_PROMPT);
        assert!(prompt.contains("<<SYS>>\nAnswer in French.\n<</SYS>>"));
        assert!(!prompt.contains("respectful"));
    }

    #[test]
    fn test_multi_turn_layout() {
        let messages = vec![
            Message::user("Hi"),
            Message::assistant("Hello!"),
            Message::user("Name a color"),
        ];
        let prompt = render_prompt(&messages, "S");
        assert_eq!(
            prompt,
            "<s>[INST] <<SYS>>\nS\n<</SYS>>\n\nHi [/INST] Hello! </s><s>[INST] Name a color [/INST]\n"
        );
    }

    #[test]
    fn test_extract_reply_from_echoed_prompt() {
        let prompt = render_prompt(&[Message::user("Capital of France?")], DEFAULT_SYSTEM_PROMPT);
        let generated = format!("{prompt}The capital is Paris.\n</s>");
        assert_eq!(extract_reply(&generated), "The capital is Paris.");
    }

    #[test]
    fn test_extract_reply_without_marker() {
        assert_eq!(extract_reply("  Paris  \n"), "Paris");
        assert_eq!(extract_reply(""), "");
    }
}
