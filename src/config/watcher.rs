//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::ServerConfig;

/// Outcome of re-reading the config file after a change.
pub type ConfigUpdate = Result<ServerConfig, ConfigError>;

/// Watches the config file and forwards every reload attempt, failed ones included.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ConfigUpdate>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for reload attempts.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ConfigUpdate>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. Keep the returned watcher alive for as long as reloads are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    tracing::info!(path = ?path, "Config file change detected, reloading");
                    let update = load_config(&path);
                    if let Err(e) = &update {
                        tracing::error!(error = %e, "Config reload failed");
                    }
                    let _ = tx.send(update);
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}
