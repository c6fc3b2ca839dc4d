//! The LLM port.

use std::future::Future;

use murmur_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// A chat-completion backend. Adapters live in `murmur-infra`.
pub trait LlmProvider: Send + Sync {
    /// Short backend label for logs ("dashscope", "openai").
    fn name(&self) -> &str;

    /// Model used when a request leaves `model` blank.
    fn default_model(&self) -> &str;

    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
