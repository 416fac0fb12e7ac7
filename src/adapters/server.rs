//! Binds the composed pipeline to a socket and runs it until shutdown.
use std::{
    future::{Future, IntoFuture},
    net::SocketAddr,
    sync::Arc,
};

use axum::Router;
use eyre::{Result, WrapErr};
use tokio::net::TcpListener;

use crate::{config::models::ServiceConfig, utils::GracefulShutdown};

pub struct Server {
    config: ServiceConfig,
    shutdown: Arc<GracefulShutdown>,
}

impl Server {
    pub fn new(config: ServiceConfig) -> Self {
        let shutdown = Arc::new(GracefulShutdown::with_timeout(
            std::time::Duration::from_secs(config.shutdown_timeout_secs),
        ));
        Self { config, shutdown }
    }

    /// Handle for triggering shutdown from elsewhere in the process.
    pub fn shutdown_handle(&self) -> Arc<GracefulShutdown> {
        self.shutdown.clone()
    }

    /// Await `readiness` before binding. A failed gate is logged and returned.
    pub async fn serve_after<F>(self, app: Router, readiness: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        if let Err(e) = readiness.await {
            tracing::error!(service = %self.config.name, error = %e, "The server failed to start");
            return Err(e.wrap_err("Startup readiness check failed"));
        }
        self.serve(app).await
    }

    /// Bind the configured address and serve until SIGINT / SIGTERM.
    pub async fn serve(self, app: Router) -> Result<()> {
        let addr = self.config.listen_addr();
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(service = %self.config.name, error = %e, "The server failed to start");
                return Err(e).wrap_err_with(|| format!("Failed to bind {addr}"));
            }
        };

        let signals = self.shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = signals.run_signal_handler().await {
                tracing::error!("Signal handler failed: {}", e);
            }
        });

        self.serve_on(listener, app).await
    }

    /// Serve on an already bound listener. Shutdown must be triggered through
    /// [`Server::shutdown_handle`] unless [`Server::serve`] installed signal handling.
    pub async fn serve_on(self, listener: TcpListener, app: Router) -> Result<()> {
        let local_addr = listener
            .local_addr()
            .wrap_err("Failed to read listener address")?;
        tracing::info!(
            service = %self.config.name,
            "Server listening on port {}!",
            local_addr.port()
        );

        let token = self.shutdown.token();
        let drain = self.shutdown.token();
        let drain_timeout = self.shutdown.drain_timeout();

        let server = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            token.wait().await;
        })
        .into_future();

        tokio::select! {
            res = server => res.wrap_err("Server terminated with an error")?,
            _ = async move {
                drain.wait().await;
                tokio::time::sleep(drain_timeout).await;
            } => {
                tracing::warn!(
                    "Drain timeout of {:?} exceeded, dropping in-flight connections",
                    drain_timeout
                );
            }
        }

        tracing::info!(service = %self.config.name, "Server stopped");
        Ok(())
    }
}
