//! Endpoint presets for the OpenAI-compatible provider.

pub const DASHSCOPE_COMPAT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Everything needed to build an [`super::OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Label used in logs.
    pub provider_name: String,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl OpenAiCompatConfig {
    fn preset(provider_name: &str, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

/// Qwen models through DashScope's compatible mode.
pub fn dashscope_defaults(api_key: &str, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig::preset("dashscope", DASHSCOPE_COMPAT_BASE_URL, api_key, model)
}

pub fn openai_defaults(api_key: &str, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig::preset("openai", OPENAI_BASE_URL, api_key, model)
}
