//! Global configuration types for murmur.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! archive threshold, retrieval limits, the daily summary window, and which
//! embedding, LLM, and vector-store backends are used.

use serde::{Deserialize, Serialize};

/// Earliest local hour a summary window may open.
pub const EARLIEST_WINDOW_START_HOUR: u32 = 12;

/// Top-level configuration.
///
/// Loaded from `~/.murmur/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
}

impl GlobalConfig {
    /// Reject settings the memory subsystem cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.memory.archive_threshold == 0 {
            return Err("memory.archive_threshold must be at least 1".to_string());
        }
        if self.memory.retrieval_limit == 0 {
            return Err("memory.retrieval_limit must be at least 1".to_string());
        }
        if self.memory.embedding_token_limit == 0 {
            return Err("memory.embedding_token_limit must be at least 1".to_string());
        }
        if self.summary.window_end_hour > 24 || self.summary.window_start_hour >= 24 {
            return Err("summary window hours must be within 0..=24".to_string());
        }
        if self.summary.window_start_hour == self.summary.window_end_hour {
            return Err(format!(
                "summary window is empty: start and end hour are both {}",
                self.summary.window_start_hour
            ));
        }
        // A pass only sees what was archived since the last local midnight,
        // so it has to run late in the same day.
        if self.summary.window_start_hour < EARLIEST_WINDOW_START_HOUR {
            return Err(format!(
                "summary window must open at {EARLIEST_WINDOW_START_HOUR}:00 or later, got {}:00",
                self.summary.window_start_hour
            ));
        }
        let end = self.summary.window_end_hour;
        if end != 0 && end < self.summary.window_start_hour {
            return Err(format!(
                "summary window must close by midnight, got {}:00-{end}:00",
                self.summary.window_start_hour
            ));
        }
        if self.summary.check_interval_secs == 0 {
            return Err("summary.check_interval_secs must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Buffering, archiving, and retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Buffer length at which the live turns are archived.
    #[serde(default = "default_archive_threshold")]
    pub archive_threshold: usize,

    /// Maximum number of archived batches returned per recall.
    #[serde(default = "default_retrieval_limit")]
    pub retrieval_limit: usize,

    /// Token ceiling of the embedding model's input.
    #[serde(default = "default_embedding_token_limit")]
    pub embedding_token_limit: usize,
}

fn default_archive_threshold() -> usize {
    2
}

fn default_retrieval_limit() -> usize {
    5
}

fn default_embedding_token_limit() -> usize {
    512
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            archive_threshold: default_archive_threshold(),
            retrieval_limit: default_retrieval_limit(),
            embedding_token_limit: default_embedding_token_limit(),
        }
    }
}

/// Daily profile summarization settings.
///
/// Hours are local time; the window is half-open `[start, end)`, opens in
/// the afternoon or evening, and closes by midnight (`end` of 0 or 24).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_window_start_hour")]
    pub window_start_hour: u32,

    #[serde(default = "default_window_end_hour")]
    pub window_end_hour: u32,

    /// How often the background task wakes up to check the window.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_window_start_hour() -> u32 {
    22
}

fn default_window_end_hour() -> u32 {
    24
}

fn default_check_interval_secs() -> u64 {
    600
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_start_hour: default_window_start_hour(),
            window_end_hour: default_window_end_hour(),
            check_interval_secs: default_check_interval_secs(),
        }
    }
}

/// Which embedding backend turns text (and images) into vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local BGE-small model via fastembed.
    #[default]
    Fastembed,
    /// DashScope multimodal embedding API.
    Dashscope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    /// Model override; each provider has its own default.
    #[serde(default)]
    pub model: Option<String>,

    /// Environment variable holding the API key (remote providers only).
    #[serde(default = "default_dashscope_key_env")]
    pub api_key_env: String,
}

fn default_dashscope_key_env() -> String {
    "DASHSCOPE_API_KEY".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: None,
            api_key_env: default_dashscope_key_env(),
        }
    }
}

/// Which OpenAI-compatible endpoint produces summaries and replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    #[default]
    Dashscope,
    Openai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProviderKind,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Base URL override for self-hosted or proxied endpoints.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_dashscope_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_llm_model() -> String {
    "qwen-plus".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::default(),
            model: default_llm_model(),
            base_url: None,
            api_key_env: default_dashscope_key_env(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// Embedded LanceDB on disk.
    #[default]
    Lance,
    /// Process-local store; nothing survives a restart.
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub backend: VectorBackend,

    /// Directory for the LanceDB database. Defaults to `{data_dir}/vector_store`.
    #[serde(default)]
    pub path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_config_default_values() {
        let config = GlobalConfig::default();
        assert_eq!(config.memory.archive_threshold, 2);
        assert_eq!(config.memory.retrieval_limit, 5);
        assert_eq!(config.memory.embedding_token_limit, 512);
        assert!(config.summary.enabled);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Fastembed);
        assert_eq!(config.vector_store.backend, VectorBackend::Lance);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_global_config_deserialize_with_defaults() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config.memory.archive_threshold, 2);
        assert_eq!(config.summary.window_start_hour, 22);
        assert_eq!(config.summary.window_end_hour, 24);
        assert_eq!(config.llm.model, "qwen-plus");
    }

    #[test]
    fn test_global_config_deserialize_with_values() {
        let toml_str = r#"
[memory]
archive_threshold = 4
retrieval_limit = 3

[summary]
window_start_hour = 20
window_end_hour = 23

[embedding]
provider = "dashscope"
model = "multimodal-embedding-v1"

[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"

[vector_store]
backend = "memory"
"#;
        let config: GlobalConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.memory.archive_threshold, 4);
        assert_eq!(config.memory.retrieval_limit, 3);
        assert_eq!(config.memory.embedding_token_limit, 512);
        assert_eq!(config.summary.window_start_hour, 20);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Dashscope);
        assert_eq!(config.llm.provider, LlmProviderKind::Openai);
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.vector_store.backend, VectorBackend::Memory);
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut config = GlobalConfig::default();
        config.memory.archive_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_window() {
        let mut config = GlobalConfig::default();
        config.summary.window_start_hour = 6;
        config.summary.window_end_hour = 6;
        assert!(config.validate().is_err());

        config.summary.window_start_hour = 25;
        config.summary.window_end_hour = 26;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_morning_and_overnight_windows() {
        let mut config = GlobalConfig::default();
        config.summary.window_start_hour = 2;
        config.summary.window_end_hour = 6;
        assert!(config.validate().unwrap_err().contains("12:00"));

        config.summary.window_start_hour = 23;
        config.summary.window_end_hour = 3;
        assert!(config.validate().unwrap_err().contains("midnight"));
    }

    #[test]
    fn test_validate_accepts_evening_windows() {
        let mut config = GlobalConfig::default();
        for (start, end) in [(22, 24), (23, 0), (12, 18)] {
            config.summary.window_start_hour = start;
            config.summary.window_end_hour = end;
            assert!(config.validate().is_ok(), "{start}-{end}");
        }
    }
}
