//! Server setup and lifecycle management

use crate::api::{create_router, AppState};
use crate::config::{DaemonConfig, StorageConfig};
use crate::error::{DaemonError, DaemonResult};
use envelope_service::{spawn_expiry_sweeper, EnvelopeService, ServiceComponents};
use envelope_store::LocalDocumentStorage;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// envelopd server
pub struct Server {
    config: DaemonConfig,
    service: Arc<EnvelopeService>,
}

impl Server {
    /// Create a new server with the given configuration. Must be called
    /// inside a Tokio runtime.
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let components = match &config.storage {
            StorageConfig::Memory => ServiceComponents::in_memory(),
            StorageConfig::Local { root } => {
                std::fs::create_dir_all(root)?;
                ServiceComponents::with_documents(Arc::new(LocalDocumentStorage::new(root)))
            }
        };
        let service = EnvelopeService::new(config.service.clone(), components)?;
        Ok(Self { config, service })
    }

    pub fn service(&self) -> &Arc<EnvelopeService> {
        &self.service
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        let state = AppState::new(self.service.clone());
        let app = create_router(state, &self.config.server);

        let listener = TcpListener::bind(addr).await?;

        tracing::info!(%addr, storage = ?self.config.storage, "envelopd listening");

        // Start the expiry sweeper in background
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweeper = spawn_expiry_sweeper(
            self.service.clone(),
            self.config.service.expiry.interval(),
            shutdown_rx,
        );

        // Run server with graceful shutdown
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()));

        tracing::info!("envelopd shutting down");

        let _ = shutdown_tx.send(true);
        if let Err(e) = sweeper.await {
            tracing::warn!(error = %e, "expiry sweeper did not stop cleanly");
        }

        served
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
