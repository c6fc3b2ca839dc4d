//! LLM provider implementations.
//!
//! Provides a provider factory ([`create_provider`]) that constructs the
//! configured OpenAI-compatible provider.

pub mod openai_compat;

use murmur_core::llm::box_provider::BoxLlmProvider;
use murmur_types::config::{LlmConfig, LlmProviderKind};
use murmur_types::llm::LlmError;

use self::openai_compat::OpenAiCompatibleProvider;
use self::openai_compat::config::OpenAiCompatConfig;

/// Create a [`BoxLlmProvider`] from an [`LlmConfig`].
///
/// `api_key` is the already-resolved secret value.
pub fn create_provider(config: &LlmConfig, api_key: Option<&str>) -> Result<BoxLlmProvider, LlmError> {
    let key = api_key.ok_or(LlmError::AuthenticationFailed)?;

    let provider = match (config.base_url.as_deref(), config.provider) {
        (Some(base_url), kind) => OpenAiCompatibleProvider::new(OpenAiCompatConfig {
            provider_name: provider_name(kind).to_string(),
            base_url: base_url.to_string(),
            api_key: key.to_string(),
            model: config.model.clone(),
        }),
        (None, LlmProviderKind::Dashscope) => OpenAiCompatibleProvider::dashscope(key, &config.model),
        (None, LlmProviderKind::Openai) => OpenAiCompatibleProvider::openai(key, &config.model),
    };
    Ok(BoxLlmProvider::new(provider))
}

fn provider_name(kind: LlmProviderKind) -> &'static str {
    match kind {
        LlmProviderKind::Dashscope => "dashscope",
        LlmProviderKind::Openai => "openai",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_requires_key() {
        let result = create_provider(&LlmConfig::default(), None);
        assert!(matches!(result, Err(LlmError::AuthenticationFailed)));
    }

    #[test]
    fn test_create_provider_defaults_to_dashscope() {
        let provider = create_provider(&LlmConfig::default(), Some("sk-test")).unwrap();
        assert_eq!(provider.name(), "dashscope");
        assert_eq!(provider.default_model(), "qwen-plus");
    }

    #[test]
    fn test_create_provider_with_base_url_override() {
        let config = LlmConfig {
            provider: LlmProviderKind::Openai,
            model: "local-model".to_string(),
            base_url: Some("http://localhost:8080/v1".to_string()),
            ..LlmConfig::default()
        };
        let provider = create_provider(&config, Some("sk-test")).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.default_model(), "local-model");
    }
}
