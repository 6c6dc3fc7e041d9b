use std::sync::Arc;

use axum::http::HeaderMap;
use harbour_content::{ContentStore, FsByteStorage};
use harbour_meta::{MetaResult, ObjectService};

use crate::config::HarbourConfig;
use crate::error::{ServerError, ServerResult};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: ObjectService,
    pub content: ContentStore,
    pub config: Arc<HarbourConfig>,
}

impl AppState {
    pub fn new(service: ObjectService, content: ContentStore, config: HarbourConfig) -> Self {
        Self {
            service,
            content,
            config: Arc::new(config),
        }
    }

    /// Open the configured metadata and content backends.
    pub fn open(config: HarbourConfig) -> ServerResult<Self> {
        let service = open_service(&config)?;
        let storage = FsByteStorage::new(&config.content.path)?;
        let content = ContentStore::new(Arc::new(storage))
            .with_memory_spool_limit(config.content.memory_spool_limit);
        Ok(Self::new(service, content, config))
    }

    /// Run a metadata operation off the async executor; the metadata
    /// backends do blocking I/O.
    pub async fn meta<T, F>(&self, op: F) -> ServerResult<T>
    where
        F: FnOnce(&ObjectService) -> MetaResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let service = self.service.clone();
        tokio::task::spawn_blocking(move || op(&service))
            .await
            .map_err(|e| ServerError::Internal(format!("metadata task failed: {e}")))?
            .map_err(ServerError::from)
    }
}

/// Build the [`ObjectService`] described by `config`.
pub fn open_service(config: &HarbourConfig) -> ServerResult<ObjectService> {
    let store = config.meta.open()?;
    Ok(ObjectService::new(store, config.auth_mode()))
}

/// Raw `Authorization` header value, or empty.
pub fn authorization(headers: &HeaderMap) -> String {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
