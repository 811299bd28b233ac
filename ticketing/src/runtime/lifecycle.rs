//! Application lifecycle management and graceful shutdown.
//!
//! 1. **Startup**: spawn the sweeper (when enabled)
//! 2. **Runtime**: serve HTTP
//! 3. **Shutdown**: on Ctrl+C or SIGTERM stop accepting connections, signal
//!    the sweeper and wait for it, bounded by the configured timeout

use crate::config::Config;
use crate::runtime::Sweeper;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Running application with its background tasks.
pub struct Application {
    /// TCP listener for HTTP server
    listener: tokio::net::TcpListener,

    /// Axum router with all HTTP routes
    app: axum::Router,

    /// Background sweeper, if enabled
    sweeper: Option<Sweeper>,

    /// Shutdown signal broadcaster
    shutdown_tx: broadcast::Sender<()>,

    /// Application configuration
    config: Arc<Config>,
}

impl Application {
    /// Create a new application instance.
    #[must_use]
    pub fn new(
        listener: tokio::net::TcpListener,
        app: axum::Router,
        sweeper: Option<Sweeper>,
        config: Arc<Config>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            listener,
            app,
            sweeper,
            shutdown_tx,
            config,
        }
    }

    /// Run until a shutdown signal arrives, then shut down gracefully.
    ///
    /// # Errors
    ///
    /// Returns the server's I/O error if serving fails.
    pub async fn run(self) -> std::io::Result<()> {
        info!(address = %self.config.bind_address(), "Starting HTTP server");

        let sweeper_handle = self.sweeper.map(|sweeper| sweeper.spawn(self.shutdown_tx.subscribe()));
        if sweeper_handle.is_none() {
            info!("Sweeper disabled");
        }

        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("HTTP server stopped, initiating graceful shutdown...");
        // No receivers left is fine: nothing to stop
        let _ = self.shutdown_tx.send(());

        if let Some(handle) = sweeper_handle {
            let timeout = Duration::from_secs(self.config.server.shutdown_timeout);
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => info!("Sweeper stopped gracefully"),
                Ok(Err(e)) => warn!(error = %e, "Sweeper task failed"),
                Err(_) => warn!("Sweeper shutdown timed out"),
            }
        }

        info!("Graceful shutdown complete");
        Ok(())
    }
}

/// Wait for Ctrl+C or SIGTERM.
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
