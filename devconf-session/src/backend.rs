use crate::{FeedbackStore, InMemorySessionStore, SessionStore};
use devconf_core::{DevconfError, Result};
use std::sync::Arc;

/// Which conversation backend to open at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StorageConfig {
    #[default]
    InMemory,
    Database {
        url: String,
    },
}

/// The store handles the orchestrator holds for its whole lifetime. Both
/// trait objects point at the same backend.
#[derive(Clone)]
pub struct SessionBackend {
    pub sessions: Arc<dyn SessionStore>,
    pub feedback: Arc<dyn FeedbackStore>,
}

impl SessionBackend {
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemorySessionStore::new());
        Self { sessions: store.clone(), feedback: store }
    }

    pub async fn open(config: &StorageConfig) -> Result<Self> {
        match config {
            StorageConfig::InMemory => {
                tracing::info!("using in-memory session storage");
                Ok(Self::in_memory())
            }
            StorageConfig::Database { url } => Self::open_database(url).await,
        }
    }

    #[cfg(feature = "database")]
    async fn open_database(url: &str) -> Result<Self> {
        let store = crate::DatabaseSessionStore::new(url).await?;
        store.migrate().await?;
        tracing::info!("using database session storage");
        let store = Arc::new(store);
        Ok(Self { sessions: store.clone(), feedback: store })
    }

    #[cfg(not(feature = "database"))]
    async fn open_database(_url: &str) -> Result<Self> {
        Err(DevconfError::Config(
            "database session storage requires the `database` feature".to_string(),
        ))
    }
}

impl StorageConfig {
    /// Resolve the backend from the `USE_DATABASE_SESSIONS` / `DATABASE_URL` pair.
    pub fn from_settings(use_database: bool, database_url: Option<&str>) -> Result<Self> {
        match (use_database, database_url.map(str::trim).filter(|u| !u.is_empty())) {
            (false, _) => Ok(StorageConfig::InMemory),
            (true, Some(url)) => Ok(StorageConfig::Database { url: url.to_string() }),
            (true, None) => Err(DevconfError::Config(
                "USE_DATABASE_SESSIONS is enabled but DATABASE_URL is not set".to_string(),
            )),
        }
    }
}
