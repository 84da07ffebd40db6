use std::sync::Arc;

use crate::backends::memory::InMemoryStore;
use crate::config::{StorageBackend, StorageConfig};
use crate::errors::ConfigError;
use crate::observability::messages::storage::StoreOpened;
use crate::observability::messages::StructuredLog;
use crate::traits::ProvenanceStore;

/// Creates the configured provenance store
pub struct StoreFactory;

impl StoreFactory {
    /// Open the backend named by `config.backend`.
    ///
    /// - `memory` -> [`InMemoryStore`]
    /// - `sqlite` -> `SqliteStore` at `config.path` (requires the `sqlite` feature)
    pub async fn from_config(
        config: &StorageConfig,
    ) -> Result<Arc<dyn ProvenanceStore>, ConfigError> {
        match config.backend {
            StorageBackend::Memory => {
                StoreOpened {
                    backend: "memory",
                    location: "process",
                }
                .log();
                Ok(Arc::new(InMemoryStore::new()))
            }
            StorageBackend::Sqlite => Self::open_sqlite(config).await,
        }
    }

    #[cfg(feature = "sqlite")]
    async fn open_sqlite(config: &StorageConfig) -> Result<Arc<dyn ProvenanceStore>, ConfigError> {
        let path = config.path.as_ref().ok_or(ConfigError::Invalid {
            field: "storage.path",
            message: "the sqlite backend needs a database path".to_string(),
        })?;
        let store =
            crate::backends::sqlite::SqliteStore::open(path, config.max_connections()).await?;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "sqlite"))]
    async fn open_sqlite(
        _config: &StorageConfig,
    ) -> Result<Arc<dyn ProvenanceStore>, ConfigError> {
        Err(ConfigError::BackendUnavailable {
            backend: "sqlite".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_is_default() {
        let store = StoreFactory::from_config(&StorageConfig::default())
            .await
            .unwrap();
        assert!(store.runs(None).await.unwrap().is_empty());
    }

    #[cfg(not(feature = "sqlite"))]
    #[tokio::test]
    async fn test_sqlite_without_feature_is_rejected() {
        let config = StorageConfig {
            backend: StorageBackend::Sqlite,
            path: Some("lineage.db".into()),
            max_connections: None,
        };
        let result = StoreFactory::from_config(&config).await;
        assert!(matches!(
            result,
            Err(ConfigError::BackendUnavailable { .. })
        ));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_sqlite_backend_opens_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::Sqlite,
            path: Some(dir.path().join("lineage.db")),
            max_connections: Some(2),
        };
        let store = StoreFactory::from_config(&config).await.unwrap();
        assert!(store.runs(None).await.unwrap().is_empty());
        assert!(dir.path().join("lineage.db").exists());
    }
}
