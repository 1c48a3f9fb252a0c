//! Command channel lifecycle.
//!
//! A channel owns one endpoint per enabled verb. Several channels may run
//! in the same process as long as their socket directories differ.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::commands::{CommandRegistry, Verb};
use crate::config::Settings;
use crate::error::{DaemonError, DaemonResult};
use crate::fs::Filesystem;

use super::{ConnectionMetrics, EndpointListener};

/// A running set of verb endpoints.
///
/// Created by [`CommandChannel::start`] and torn down by
/// [`CommandChannel::stop`]. Dropping a channel without stopping it
/// signals the endpoints to stop accepting but leaves socket files behind.
pub struct CommandChannel {
    directory: PathBuf,
    endpoints: Vec<(Verb, PathBuf)>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    metrics: Arc<ConnectionMetrics>,
}

impl CommandChannel {
    /// Bind every enabled verb's socket and start accepting.
    ///
    /// If any endpoint fails to bind, the sockets already created are removed.
    pub async fn start(
        settings: &Settings,
        filesystem: Arc<dyn Filesystem>,
    ) -> DaemonResult<Self> {
        let directory = settings.channel.directory.clone();
        let mode = settings.channel.socket_mode()?;
        let verbs = settings.channel.enabled_verbs()?;

        std::fs::create_dir_all(&directory).map_err(|e| DaemonError::Socket {
            message: format!(
                "Failed to create socket directory {}: {}",
                directory.display(),
                e
            ),
        })?;

        let registry = Arc::new(CommandRegistry::new(filesystem, &settings.filesystem)?);
        let limits = Arc::new(settings.limits.clone());
        let metrics = Arc::new(ConnectionMetrics::new());

        let mut listeners = Vec::with_capacity(verbs.len());
        for verb in verbs {
            let path = directory.join(format!("{}.sock", verb));
            match EndpointListener::bind(
                verb,
                path,
                mode,
                Arc::clone(&registry),
                Arc::clone(&limits),
                Arc::clone(&metrics),
            ) {
                Ok(listener) => listeners.push(listener),
                Err(e) => {
                    for listener in &listeners {
                        remove_socket(listener.path());
                    }
                    return Err(e);
                }
            }
        }

        let (shutdown, _) = watch::channel(false);
        let endpoints = listeners
            .iter()
            .map(|listener| (listener.verb(), listener.path().to_path_buf()))
            .collect();
        let tasks = listeners
            .into_iter()
            .map(|listener| tokio::spawn(listener.run(shutdown.subscribe())))
            .collect();

        info!(
            directory = %directory.display(),
            endpoints = registry.list_verbs().len(),
            "Command channel started"
        );

        Ok(Self {
            directory,
            endpoints,
            shutdown,
            tasks,
            metrics,
        })
    }

    /// Directory holding the endpoint sockets.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Socket path for `verb`, if that verb is enabled.
    pub fn socket_path(&self, verb: Verb) -> Option<&Path> {
        self.endpoints
            .iter()
            .find(|(v, _)| *v == verb)
            .map(|(_, path)| path.as_path())
    }

    /// Enabled verbs.
    pub fn verbs(&self) -> Vec<Verb> {
        self.endpoints.iter().map(|(verb, _)| *verb).collect()
    }

    /// Get connection metrics.
    pub fn metrics(&self) -> Arc<ConnectionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Stop accepting, wait up to `drain_timeout` for open connections,
    /// then remove the socket files.
    pub async fn stop(mut self, drain_timeout: Duration) {
        self.shutdown.send_replace(true);

        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!(error = %e, "Endpoint task ended abnormally");
            }
        }

        if tokio::time::timeout(drain_timeout, self.wait_for_drain())
            .await
            .is_err()
        {
            warn!(
                active = self.metrics.active(),
                "Drain timeout elapsed, abandoning open connections"
            );
        }

        for (_, path) in &self.endpoints {
            remove_socket(path);
        }

        info!(
            directory = %self.directory.display(),
            requests = self.metrics.total_requests(),
            failed = self.metrics.failed_requests(),
            "Command channel stopped"
        );
    }

    /// Wait for all active connections to drain.
    async fn wait_for_drain(&self) {
        let poll_interval = Duration::from_millis(50);

        while self.metrics.active() > 0 {
            debug!(
                active = self.metrics.active(),
                "Waiting for connections to drain"
            );
            tokio::time::sleep(poll_interval).await;
        }

        debug!("All connections drained");
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

fn remove_socket(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove socket file");
        }
    }
}
