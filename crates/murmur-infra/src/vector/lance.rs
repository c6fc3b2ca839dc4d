//! The on-disk LanceDB database holding one table per memory collection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_schema::Schema;
use lancedb::{Connection, Table};

pub struct LanceVectorStore {
    db: Connection,
}

impl LanceVectorStore {
    /// Connect to the database directory, creating it on first use.
    pub async fn new(path: PathBuf) -> Result<Self, lancedb::Error> {
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| lancedb::Error::CreateDir {
                path: path.display().to_string(),
                source,
            })?;
        let Some(uri) = path.to_str() else {
            return Err(lancedb::Error::InvalidInput {
                message: format!("vector store path is not UTF-8: {}", path.display()),
            });
        };

        let db = lancedb::connect(uri).execute().await?;
        tracing::debug!(path = %path.display(), "connected to LanceDB");
        Ok(Self { db })
    }

    /// `{data_dir}/vector_store`
    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join("vector_store")
    }

    /// Fails with `TableAlreadyExists` when the table is present.
    pub async fn create_table(&self, name: &str, schema: Arc<Schema>) -> Result<Table, lancedb::Error> {
        self.db.create_empty_table(name, schema).execute().await
    }

    pub async fn open_table(&self, name: &str) -> Result<Option<Table>, lancedb::Error> {
        match self.db.open_table(name).execute().await {
            Ok(table) => Ok(Some(table)),
            Err(lancedb::Error::TableNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn table_names(&self) -> Result<Vec<String>, lancedb::Error> {
        self.db.table_names().execute().await
    }
}
