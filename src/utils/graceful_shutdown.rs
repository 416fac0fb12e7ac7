use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use eyre::Result;
use tokio::{signal, sync::broadcast};

/// Represents different shutdown reasons
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGTERM or SIGINT
    Signal,
    /// Triggered programmatically
    Requested,
    /// The drain timeout elapsed with requests still in flight
    Force,
}

/// Coordinates shutdown between the signal listener and the server
pub struct GracefulShutdown {
    /// Broadcast sender for shutdown signals
    shutdown_tx: broadcast::Sender<ShutdownReason>,
    /// Flag indicating if shutdown has been initiated
    shutdown_initiated: Arc<AtomicBool>,
    /// Maximum time to wait for in-flight requests after shutdown begins
    drain_timeout: Duration,
}

impl GracefulShutdown {
    /// Create a new GracefulShutdown manager with default 30-second drain timeout
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a new GracefulShutdown manager with custom drain timeout
    pub fn with_timeout(drain_timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            shutdown_tx,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            drain_timeout,
        }
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Get a token that resolves once shutdown begins
    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            receiver: self.shutdown_tx.subscribe(),
            shutdown_initiated: self.shutdown_initiated.clone(),
        }
    }

    /// Check if shutdown has been initiated
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Relaxed)
    }

    /// Manually trigger shutdown. Only the first call has any effect.
    pub fn trigger_shutdown(&self, reason: ShutdownReason) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            tracing::info!("Shutdown triggered: {:?}", reason);
            // No receivers simply means nothing is serving yet.
            let _ = self.shutdown_tx.send(reason);
        } else {
            tracing::debug!("Shutdown already initiated, ignoring {:?}", reason);
        }
    }

    /// Listen for SIGINT / SIGTERM and trigger shutdown on the first one
    pub async fn run_signal_handler(&self) -> Result<()> {
        tokio::select! {
            res = signal::ctrl_c() => {
                res?;
                tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            }
            res = wait_for_sigterm() => {
                res?;
                tracing::info!("Received SIGTERM, initiating graceful shutdown...");
            }
        }
        self.trigger_shutdown(ShutdownReason::Signal);
        Ok(())
    }
}

#[cfg(unix)]
async fn wait_for_sigterm() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_sigterm() -> std::io::Result<()> {
    // On non-Unix systems, we only have Ctrl+C
    std::future::pending::<std::io::Result<()>>().await
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// A token that can be used to wait for shutdown
pub struct ShutdownToken {
    receiver: broadcast::Receiver<ShutdownReason>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl Clone for ShutdownToken {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.resubscribe(),
            shutdown_initiated: self.shutdown_initiated.clone(),
        }
    }
}

impl ShutdownToken {
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Relaxed)
    }

    /// Resolve once shutdown has been triggered
    pub async fn wait(mut self) -> ShutdownReason {
        if self.is_shutdown_initiated() {
            return self.receiver.try_recv().unwrap_or(ShutdownReason::Requested);
        }
        match self.receiver.recv().await {
            Ok(reason) => reason,
            Err(_) => ShutdownReason::Force,
        }
    }
}
