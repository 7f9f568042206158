use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Artifact store HTTP server.
pub struct AstoreServer {
    config: ServerConfig,
    shutdown: CancellationToken,
}

impl AstoreServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Token that stops the server. In-flight calls observe the cancellation.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> ServerResult<axum::Router> {
        Ok(build_router(AppState::from_config(&self.config, self.shutdown.clone())?))
    }

    /// Serve requests until the shutdown token is cancelled.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router()?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            site = %self.config.site_url,
            bucket = %self.config.astore.bucket,
            "astore server listening"
        );
        let token = self.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        tracing::info!("astore server stopped");
        Ok(())
    }
}
