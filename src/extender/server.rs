//! Extender Server
//!
//! Serves the extender router with graceful shutdown.

use super::dispatcher::Extender;
use super::routes::ExtenderRouter;
use crate::error::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the extender server
#[derive(Debug, Clone)]
pub struct ExtenderConfig {
    /// HTTP bind address
    pub addr: SocketAddr,
    /// Path prefix of the plugin endpoints
    pub api_prefix: String,
}

impl Default for ExtenderConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            api_prefix: "scheduler".to_string(),
        }
    }
}

// =============================================================================
// Extender Server
// =============================================================================

/// HTTP server exposing the extender's plugins
pub struct ExtenderServer {
    config: ExtenderConfig,
    extender: Arc<Extender>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ExtenderServer {
    /// Create a new server
    pub fn new(config: ExtenderConfig, extender: Arc<Extender>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            extender,
            shutdown_tx,
        }
    }

    /// Serve until shutdown is triggered
    pub async fn run(&self) -> Result<()> {
        let app = ExtenderRouter::new(self.extender.clone(), self.config.api_prefix.clone()).build();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let listener = tokio::net::TcpListener::bind(self.config.addr)
            .await
            .map_err(|e| Error::Internal(format!("Failed to bind extender server: {}", e)))?;

        info!(
            addr = %self.config.addr,
            prefix = %self.config.api_prefix,
            "Extender listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Extender server shutting down");
            })
            .await
            .map_err(|e| Error::Internal(format!("Extender server error: {}", e)))?;

        Ok(())
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}
