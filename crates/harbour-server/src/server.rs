use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::HarbourConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// Harbour object store server.
pub struct HarbourServer {
    config: HarbourConfig,
}

impl HarbourServer {
    pub fn new(config: HarbourConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HarbourConfig {
        &self.config
    }

    /// Open the backends and build the router (useful for testing).
    pub fn router(&self) -> ServerResult<axum::Router> {
        Ok(build_router(AppState::open(self.config.clone())?))
    }

    /// Serve until interrupted, then close the metadata backend.
    pub async fn serve(self) -> ServerResult<()> {
        let state = AppState::open(self.config.clone())?;
        let service = state.service.clone();
        let app = build_router(state);

        let listener = TcpListener::bind(self.config.listen).await?;
        info!(
            listen = %self.config.listen,
            meta = service.backend_name(),
            auth = service.credentials().mode().name(),
            "harbour listening"
        );
        if !self.config.admin_enabled() {
            info!("management endpoints disabled: no admin password configured");
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        info!("shutting down");
        tokio::task::spawn_blocking(move || service.close())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))??;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
}
