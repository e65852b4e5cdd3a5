//! services/api/src/adapters/llm_support.rs
//!
//! Pieces shared by the chat-completion adapters: one-shot chat calls,
//! error classification, and unwrapping JSON the model may have fenced.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use study_aid_core::ports::{PortError, PortResult};

/// Sends a system + user message pair and returns the first choice's text.
pub(crate) async fn complete_chat(
    client: &Client<OpenAIConfig>,
    model: &str,
    system: &str,
    user: String,
) -> PortResult<String> {
    let messages = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
        ChatCompletionRequestUserMessageArgs::default()
            .content(user)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
    ];

    let request = CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages(messages)
        .n(1)
        .build()
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

    let response = client
        .chat()
        .create(request)
        .await
        .map_err(map_openai_error)?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| PortError::MalformedOutput("No content in model response".to_string()))
}

/// Sorts an OpenAI error into the port taxonomy.
pub(crate) fn map_openai_error(e: OpenAIError) -> PortError {
    match e {
        OpenAIError::ApiError(api) => {
            let code = api.code.as_deref().unwrap_or_default();
            let kind = api.r#type.as_deref().unwrap_or_default();
            match (code, kind) {
                ("insufficient_quota", _) | (_, "insufficient_quota") | ("payment_required", _) => {
                    PortError::PaymentRequired(api.message)
                }
                ("rate_limit_exceeded", _) | (_, "rate_limit_error") | (_, "requests") | (_, "tokens") => {
                    PortError::RateLimited(api.message)
                }
                (_, "server_error") | (_, "service_unavailable") => PortError::Transient(api.message),
                _ => PortError::Unexpected(api.message),
            }
        }
        OpenAIError::Reqwest(e) => PortError::Transient(e.to_string()),
        other => PortError::Unexpected(other.to_string()),
    }
}

/// Removes a surrounding ```json ... ``` fence, if any.
pub(crate) fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}
