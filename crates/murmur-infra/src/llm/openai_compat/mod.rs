//! LLM provider over the OpenAI chat-completions protocol.
//!
//! DashScope exposes Qwen models through an OpenAI-compatible endpoint, so
//! one [`async_openai`] client covers both it and OpenAI; only the base URL,
//! key, and error codes differ.

pub mod config;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest, FinishReason,
};

use murmur_core::llm::provider::LlmProvider;
use murmur_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, MessageRole, StopReason, Usage,
};

use self::config::OpenAiCompatConfig;

/// Chat-completion client for DashScope's compatible mode or OpenAI.
///
/// Not `Debug`: the wrapped client holds the API key.
pub struct OpenAiCompatibleProvider {
    client: Client<OpenAIConfig>,
    provider_name: String,
    model: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: OpenAiCompatConfig) -> Self {
        let client = Client::with_config(
            OpenAIConfig::new()
                .with_api_key(&config.api_key)
                .with_api_base(&config.base_url),
        );
        Self {
            client,
            provider_name: config.provider_name,
            model: config.model,
        }
    }

    /// Qwen models through DashScope.
    pub fn dashscope(api_key: &str, model: &str) -> Self {
        Self::new(config::dashscope_defaults(api_key, model))
    }

    pub fn openai(api_key: &str, model: &str) -> Self {
        Self::new(config::openai_defaults(api_key, model))
    }

    fn build_request(&self, request: &CompletionRequest) -> CreateChatCompletionRequest {
        let system = request
            .system
            .iter()
            .map(|text| to_chat_message(&MessageRole::System, text));
        let turns = request
            .messages
            .iter()
            .map(|m| to_chat_message(&m.role, &m.content));

        let model = match request.model.as_str() {
            "" => self.model.clone(),
            requested => requested.to_string(),
        };

        CreateChatCompletionRequest {
            model,
            messages: system.chain(turns).collect(),
            max_completion_tokens: Some(request.max_tokens),
            temperature: request.temperature.map(|t| t as f32),
            ..Default::default()
        }
    }
}

fn to_chat_message(role: &MessageRole, content: &str) -> ChatCompletionRequestMessage {
    let text = content.to_string();
    match role {
        MessageRole::System => {
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(text),
                name: None,
            })
        }
        MessageRole::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(text),
            name: None,
        }),
        #[allow(deprecated)]
        MessageRole::Assistant => {
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(ChatCompletionRequestAssistantMessageContent::Text(text)),
                refusal: None,
                name: None,
                audio: None,
                tool_calls: None,
                function_call: None,
            })
        }
    }
}

fn stop_reason(finish: Option<&FinishReason>) -> StopReason {
    match finish {
        Some(FinishReason::Length) => StopReason::MaxTokens,
        Some(FinishReason::ContentFilter) => StopReason::ContentFilter,
        _ => StopReason::EndTurn,
    }
}

impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let response = self
            .client
            .chat()
            .create(self.build_request(request))
            .await
            .map_err(map_openai_error)?;

        let (content, finish) = match response.choices.into_iter().next() {
            Some(choice) => (
                choice.message.content.unwrap_or_default(),
                stop_reason(choice.finish_reason.as_ref()),
            ),
            None => (String::new(), StopReason::EndTurn),
        };
        let usage = response.usage.map_or_else(Usage::default, |u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        });

        if finish == StopReason::MaxTokens {
            tracing::warn!(
                provider = %self.provider_name,
                max_tokens = request.max_tokens,
                "completion truncated at max_tokens"
            );
        }
        tracing::debug!(
            provider = %self.provider_name,
            model = %response.model,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "completion finished"
        );

        Ok(CompletionResponse {
            id: response.id,
            content,
            model: response.model,
            stop_reason: finish,
            usage,
        })
    }
}

/// Classify an API error body. DashScope reports its own codes
/// (`InvalidApiKey`, `Throttling.*`, `DataInspectionFailed`) next to OpenAI's.
fn classify_api_error(code: &str, kind: &str, message: &str) -> Option<LlmError> {
    if matches!(code, "invalid_api_key" | "InvalidApiKey")
        || kind == "authentication_error"
        || message.contains("Incorrect API key")
    {
        return Some(LlmError::AuthenticationFailed);
    }
    if code == "rate_limit_exceeded" || kind == "rate_limit_error" || code.starts_with("Throttling")
    {
        return Some(LlmError::RateLimited {
            retry_after_ms: None,
        });
    }
    if code == "context_length_exceeded" || message.contains("maximum context length") {
        return Some(LlmError::ContextLengthExceeded);
    }
    if code == "DataInspectionFailed" {
        return Some(LlmError::InvalidRequest(format!(
            "input rejected by content inspection: {message}"
        )));
    }
    if code == "server_error" || kind == "overloaded_error" {
        return Some(LlmError::Overloaded(message.to_string()));
    }
    None
}

fn map_openai_error(err: async_openai::error::OpenAIError) -> LlmError {
    use async_openai::error::OpenAIError;

    let classified = match &err {
        OpenAIError::ApiError(api) => classify_api_error(
            api.code.as_deref().unwrap_or_default(),
            api.r#type.as_deref().unwrap_or_default(),
            &api.message,
        ),
        OpenAIError::Reqwest(e) => match e.status().map(|s| s.as_u16()) {
            Some(401 | 403) => Some(LlmError::AuthenticationFailed),
            Some(429) => Some(LlmError::RateLimited {
                retry_after_ms: None,
            }),
            Some(503) => Some(LlmError::Overloaded(err.to_string())),
            _ => None,
        },
        OpenAIError::JSONDeserialize(_, body) => Some(LlmError::Deserialization(format!(
            "unexpected completion body: {body}"
        ))),
        OpenAIError::InvalidArgument(msg) => Some(LlmError::InvalidRequest(msg.clone())),
        _ => None,
    };
    classified.unwrap_or_else(|| LlmError::Provider {
        message: err.to_string(),
    })
}
