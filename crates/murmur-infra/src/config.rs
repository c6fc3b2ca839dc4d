//! Locating the data directory and loading `config.toml` from it.
//!
//! A broken config never stops murmur from starting: any read, parse, or
//! validation problem is logged and the built-in defaults are used.

use std::path::{Path, PathBuf};

use murmur_types::config::GlobalConfig;

pub const DATA_DIR_ENV: &str = "MURMUR_DATA_DIR";
pub const CONFIG_FILE: &str = "config.toml";

/// `$MURMUR_DATA_DIR`, else `~/.murmur`, else `./.murmur` without a home.
pub fn resolve_data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".murmur")))
        .unwrap_or_else(|| PathBuf::from(".murmur"))
}

/// Load `{data_dir}/config.toml`, falling back to [`GlobalConfig::default`].
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let path = data_dir.join(CONFIG_FILE);
    match read_config(&path).await {
        Ok(Some(config)) => {
            tracing::debug!(path = %path.display(), "loaded configuration");
            config
        }
        Ok(None) => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            GlobalConfig::default()
        }
        Err(reason) => {
            tracing::warn!(path = %path.display(), %reason, "ignoring config file, using defaults");
            GlobalConfig::default()
        }
    }
}

/// `Ok(None)` when the file does not exist.
async fn read_config(path: &Path) -> Result<Option<GlobalConfig>, String> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(format!("unreadable: {e}")),
    };
    let config: GlobalConfig = toml::from_str(&content).map_err(|e| format!("malformed: {e}"))?;
    config.validate().map_err(|e| format!("invalid: {e}"))?;
    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_types::config::{EmbeddingProvider, VectorBackend};
    use tempfile::TempDir;

    async fn write_config(dir: &TempDir, body: &str) {
        tokio::fs::write(dir.path().join(CONFIG_FILE), body).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        assert!(read_config(&dir.path().join(CONFIG_FILE)).await.unwrap().is_none());

        let config = load_global_config(dir.path()).await;
        assert_eq!(config.memory.archive_threshold, 2);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Fastembed);
    }

    #[tokio::test]
    async fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
[memory]
archive_threshold = 4

[summary]
window_start_hour = 20
window_end_hour = 0

[embedding]
provider = "dashscope"

[vector_store]
backend = "memory"
"#,
        )
        .await;

        let config = load_global_config(dir.path()).await;
        assert_eq!(config.memory.archive_threshold, 4);
        assert_eq!(config.memory.retrieval_limit, 5);
        assert_eq!(config.summary.window_start_hour, 20);
        assert_eq!(config.summary.check_interval_secs, 600);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Dashscope);
        assert_eq!(config.embedding.api_key_env, "DASHSCOPE_API_KEY");
        assert_eq!(config.vector_store.backend, VectorBackend::Memory);
    }

    #[tokio::test]
    async fn malformed_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "this is not { valid toml !!!").await;

        let err = read_config(&dir.path().join(CONFIG_FILE)).await.unwrap_err();
        assert!(err.starts_with("malformed"));
        assert_eq!(load_global_config(dir.path()).await.memory.archive_threshold, 2);
    }

    #[tokio::test]
    async fn invalid_values_yield_defaults() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "[summary]\nwindow_start_hour = 4\nwindow_end_hour = 4\n").await;

        let err = read_config(&dir.path().join(CONFIG_FILE)).await.unwrap_err();
        assert!(err.starts_with("invalid"));
        let config = load_global_config(dir.path()).await;
        assert_eq!(config.summary.window_start_hour, 22);
        assert_eq!(config.summary.window_end_hour, 24);
    }
}
