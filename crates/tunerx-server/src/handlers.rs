//! Generation handlers.
//!
//! Both routes funnel into [`generate`], which runs the engine `n` times and
//! folds usage and timing into one result.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use tunerx_core::{
    FinishReason, GenerateRequest, Message, Result, SamplingParams, Usage,
};
use tunerx_telemetry::Timer;

use crate::openai::{
    ChatCompletionChoice, ChatCompletionChoiceMessage, ChatCompletionRequest,
    ChatCompletionResponse, CompletionUsage, InferenceInput, InferenceOutput,
};
use crate::server::{error_for, error_response, AppState};

struct Generation {
    outputs: Vec<(String, FinishReason)>,
    usage: Usage,
    elapsed_secs: f64,
}

/// Runs `n` generations for one conversation.
///
/// The prompt is counted once; completion tokens add up across choices.
async fn generate(
    state: &AppState,
    messages: Vec<Message>,
    sampling: SamplingParams,
    n: u32,
) -> Result<Generation> {
    let timer = Timer::start("generate");
    let mut outputs = Vec::with_capacity(n as usize);
    let mut prompt_tokens = 0;
    let mut completion_tokens = 0;

    for _ in 0..n {
        let request = GenerateRequest::chat(messages.clone()).with_sampling(sampling.clone());
        let response = match state.engine.generate(request).await {
            Ok(response) => response,
            Err(e) => {
                state.metrics.record_error();
                tracing::warn!(error = %e, "Generation failed");
                return Err(e);
            },
        };

        prompt_tokens = response.usage.prompt_tokens;
        completion_tokens += response.usage.completion_tokens;
        let choice = response.choices.into_iter().next();
        outputs.push(choice.map_or((String::new(), FinishReason::Stop), |c| {
            (c.text, c.finish_reason)
        }));
    }

    let usage = Usage::new(prompt_tokens, completion_tokens);
    state
        .metrics
        .record_request(usage.prompt_tokens, usage.completion_tokens);

    Ok(Generation {
        outputs,
        usage,
        elapsed_secs: timer.stop() / 1000.0,
    })
}

fn rejection_response(rejection: &JsonRejection) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        &rejection.body_text(),
        "invalid_request_error",
    )
}

/// `POST /v1/chat/completions`
pub(crate) async fn chat_completions(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return rejection_response(&rejection),
    };

    if let Err(e) = req.validate() {
        return error_for(&e);
    }

    let sampling = req.to_sampling(&state.config.sampling);
    if let Err(message) = sampling.validate() {
        return error_response(StatusCode::BAD_REQUEST, &message, "invalid_request_error");
    }

    let request_id = format!("chatcmpl-{}", uuid::Uuid::new_v4());
    tracing::debug!(
        request_id = %request_id,
        model = %req.model,
        messages = req.messages.len(),
        n = req.n,
        "Chat completion request"
    );

    let generation = match generate(&state, req.to_messages(), sampling, req.n).await {
        Ok(generation) => generation,
        Err(e) => return error_for(&e),
    };

    let choices = generation
        .outputs
        .into_iter()
        .zip(0u32..)
        .map(|((content, finish_reason), index)| ChatCompletionChoice {
            index,
            message: ChatCompletionChoiceMessage::assistant(content),
            finish_reason: finish_reason.as_str().to_string(),
        })
        .collect();

    let response = ChatCompletionResponse {
        id: request_id,
        object: "chat.completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: state.engine.model_info().id.to_string(),
        system_fingerprint: state.fingerprint.clone(),
        choices,
        usage: CompletionUsage::new(generation.usage, generation.elapsed_secs),
    };

    tracing::debug!(
        request_id = %response.id,
        prompt_tokens = response.usage.prompt_tokens,
        completion_tokens = response.usage.completion_tokens,
        elapsed_time = response.usage.elapsed_time,
        "Chat completion finished"
    );

    Json(response).into_response()
}

/// `POST /inference`
pub(crate) async fn inference(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<InferenceInput>, JsonRejection>,
) -> Response {
    let input = match payload {
        Ok(Json(input)) => input,
        Err(rejection) => return rejection_response(&rejection),
    };

    let messages = match input.into_messages() {
        Ok(messages) => messages,
        Err(e) => return error_for(&e),
    };

    let generation = match generate(&state, messages, state.config.sampling.clone(), 1).await {
        Ok(generation) => generation,
        Err(e) => return error_for(&e),
    };

    let usage = CompletionUsage::new(generation.usage, generation.elapsed_secs);
    let output = generation
        .outputs
        .into_iter()
        .next()
        .map(|(text, _)| text)
        .unwrap_or_default();

    Json(InferenceOutput {
        output,
        token_length: usage.total_tokens,
        elapsed_time: usage.elapsed_time,
        token_per_sec: usage.token_per_sec,
    })
    .into_response()
}
