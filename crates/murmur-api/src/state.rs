//! Application state wiring the memory subsystem together.
//!
//! The vector store is opened eagerly; the embedder and LLM provider are
//! built on demand so read-only commands never load a model or need an API
//! key they don't use.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use murmur_core::llm::box_provider::BoxLlmProvider;
use murmur_core::memory::archive::ArchiveWriter;
use murmur_core::memory::box_embedder::BoxEmbedder;
use murmur_core::memory::box_vector::BoxVectorStore;
use murmur_core::memory::clock::{Clock, SystemClock};
use murmur_core::memory::retrieval::RetrievalEngine;
use murmur_core::memory::service::MemoryService;
use murmur_core::memory::summary::SummaryScheduler;
use murmur_core::memory::task::{SummaryTask, SummaryWindow};
use murmur_infra::config::{load_global_config, resolve_data_dir};
use murmur_infra::embedding::create_embedder;
use murmur_infra::llm::create_provider;
use murmur_infra::vector::open_vector_store;
use murmur_types::config::GlobalConfig;

/// Shared application state for every CLI command.
#[derive(Clone)]
pub struct AppState {
    pub config: GlobalConfig,
    pub data_dir: PathBuf,
    pub clock: Arc<dyn Clock>,
    pub store: Arc<BoxVectorStore>,
}

impl AppState {
    /// Resolve the data directory, load `config.toml`, open the vector store.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("cannot create data directory {}", data_dir.display()))?;

        let config = load_global_config(&data_dir).await;
        let store = open_vector_store(&config.vector_store, &data_dir)
            .await
            .context("failed to open vector store")?;

        tracing::debug!(data_dir = %data_dir.display(), "application state initialized");

        Ok(Self {
            config,
            data_dir,
            clock: Arc::new(SystemClock),
            store: Arc::new(store),
        })
    }

    /// Build the configured embedder.
    ///
    /// The local model may download its weights on first use, so creation
    /// runs on the blocking pool.
    pub async fn embedder(&self) -> anyhow::Result<Arc<BoxEmbedder>> {
        let config = self.config.embedding.clone();
        let api_key = std::env::var(&config.api_key_env).ok();
        let data_dir = self.data_dir.clone();
        let embedder = tokio::task::spawn_blocking(move || {
            create_embedder(&config, api_key.as_deref(), &data_dir)
        })
        .await
        .context("embedder initialization panicked")?
        .context("failed to initialize embedder")?;
        Ok(Arc::new(embedder))
    }

    pub fn llm(&self) -> anyhow::Result<Arc<BoxLlmProvider>> {
        let config = &self.config.llm;
        let api_key = std::env::var(&config.api_key_env).ok();
        let provider = create_provider(config, api_key.as_deref()).with_context(|| {
            format!("failed to initialize LLM provider (key from {})", config.api_key_env)
        })?;
        Ok(Arc::new(provider))
    }

    pub fn retrieval(&self, embedder: Arc<BoxEmbedder>) -> RetrievalEngine {
        RetrievalEngine::new(
            embedder,
            self.store.clone(),
            self.config.memory.retrieval_limit,
        )
    }

    pub fn memory_service(&self, embedder: Arc<BoxEmbedder>) -> MemoryService {
        let archive = ArchiveWriter::new(
            embedder.clone(),
            self.store.clone(),
            self.clock.clone(),
            self.config.memory.embedding_token_limit,
        );
        MemoryService::new(
            archive,
            self.retrieval(embedder),
            self.clock.clone(),
            self.config.memory.archive_threshold,
        )
    }

    pub fn summary_scheduler(
        &self,
        embedder: Arc<BoxEmbedder>,
        llm: Arc<BoxLlmProvider>,
    ) -> SummaryScheduler {
        SummaryScheduler::new(
            embedder,
            self.store.clone(),
            llm,
            self.clock.clone(),
            self.config.llm.max_tokens,
        )
    }

    pub fn summary_task(&self, scheduler: Arc<SummaryScheduler>) -> SummaryTask {
        SummaryTask::new(
            scheduler,
            self.clock.clone(),
            SummaryWindow::from(&self.config.summary),
        )
    }

    pub fn summary_period(&self) -> Duration {
        Duration::from_secs(self.config.summary.check_interval_secs)
    }
}
