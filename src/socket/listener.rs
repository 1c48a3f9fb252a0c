//! Unix socket listener for a single verb endpoint.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::UnixListener;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use crate::commands::{CommandRegistry, Verb};
use crate::config::LimitsConfig;
use crate::error::{DaemonError, DaemonResult, ProtocolErrorKind};

use super::handle_connection;

/// Connection metrics for monitoring.
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    /// Total requests processed.
    pub requests_total: AtomicU64,
    /// Total requests answered with a negative code.
    pub requests_failed: AtomicU64,
    /// Currently active connections.
    pub active_connections: AtomicUsize,
}

impl ConnectionMetrics {
    /// Create new connection metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment request count.
    pub fn record_request(&self, success: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get total request count.
    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Get failed request count.
    pub fn failed_requests(&self) -> u64 {
        self.requests_failed.load(Ordering::Relaxed)
    }

    /// Get active connection count.
    pub fn active(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }
}

/// Listening socket for one verb.
pub struct EndpointListener {
    verb: Verb,
    path: PathBuf,
    listener: UnixListener,
    registry: Arc<CommandRegistry>,
    limits: Arc<LimitsConfig>,
    metrics: Arc<ConnectionMetrics>,
    /// Semaphore for connection limiting
    connection_semaphore: Arc<Semaphore>,
}

impl EndpointListener {
    /// Bind the endpoint socket at `path` and apply `mode` to it.
    pub fn bind(
        verb: Verb,
        path: PathBuf,
        mode: u32,
        registry: Arc<CommandRegistry>,
        limits: Arc<LimitsConfig>,
        metrics: Arc<ConnectionMetrics>,
    ) -> DaemonResult<Self> {
        // Refuse to remove a symlink planted at the socket path
        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if metadata.file_type().is_symlink() {
                return Err(DaemonError::Socket {
                    message: format!(
                        "Socket path {} is a symlink, refusing to remove",
                        path.display()
                    ),
                });
            }

            std::fs::remove_file(&path).map_err(|e| DaemonError::Socket {
                message: format!(
                    "Failed to remove existing socket file {}: {}",
                    path.display(),
                    e
                ),
            })?;
        }

        let listener = UnixListener::bind(&path).map_err(|e| DaemonError::Socket {
            message: format!("Failed to bind to socket {}: {}", path.display(), e),
        })?;

        Self::set_socket_permissions(&path, mode)?;

        let connection_semaphore = Arc::new(Semaphore::new(limits.max_concurrent_requests));

        info!(
            verb = %verb,
            path = %path.display(),
            max_connections = limits.max_concurrent_requests,
            "Endpoint bound"
        );

        Ok(Self {
            verb,
            path,
            listener,
            registry,
            limits,
            metrics,
            connection_semaphore,
        })
    }

    /// Verb served by this endpoint.
    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// Socket file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Set socket file permissions.
    fn set_socket_permissions(path: &Path, mode: u32) -> DaemonResult<()> {
        let permissions = std::fs::Permissions::from_mode(mode);
        std::fs::set_permissions(path, permissions).map_err(|e| DaemonError::Socket {
            message: format!(
                "Failed to set socket permissions on {}: {}",
                path.display(),
                e
            ),
        })?;

        Ok(())
    }

    /// Accept connections until `shutdown` flips to true or its sender is dropped.
    ///
    /// Connections already accepted keep running until they finish.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        debug!(verb = %self.verb, "Endpoint accepting connections");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            // Try to acquire a connection permit
                            let permit = match self.connection_semaphore.clone().try_acquire_owned() {
                                Ok(permit) => permit,
                                Err(_) => {
                                    warn!(
                                        verb = %self.verb,
                                        max = self.limits.max_concurrent_requests,
                                        "Connection limit reached, rejecting connection"
                                    );
                                    continue;
                                }
                            };

                            let verb = self.verb;
                            let registry = Arc::clone(&self.registry);
                            let limits = Arc::clone(&self.limits);
                            let metrics = Arc::clone(&self.metrics);

                            metrics.active_connections.fetch_add(1, Ordering::Relaxed);
                            debug!(verb = %verb, active = metrics.active(), "New connection accepted");

                            tokio::spawn(async move {
                                let _permit = permit;
                                if let Err(e) = handle_connection(stream, verb, registry, limits, Arc::clone(&metrics)).await {
                                    if !matches!(
                                        &e,
                                        DaemonError::Protocol {
                                            kind: ProtocolErrorKind::ConnectionClosed
                                        }
                                    ) {
                                        error!(verb = %verb, error = %e, "Connection handler error");
                                    }
                                }

                                metrics.active_connections.fetch_sub(1, Ordering::Relaxed);
                                debug!(verb = %verb, active = metrics.active(), "Connection closed");
                            });
                        }
                        Err(e) => {
                            warn!(verb = %self.verb, error = %e, "Failed to accept connection");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(verb = %self.verb, "Endpoint stopped accepting");
    }
}
