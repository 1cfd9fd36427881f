//! Current and last-good configuration.
//!
//! A failed reload clears `current` but never touches `last_good`; requests
//! keep being served from the last configuration that applied cleanly.

use std::sync::Arc;

use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::config::schema::ServerConfig;
use crate::cookies::CookieError;
use crate::handler::BuildError;

/// Why a configuration could not be put into service.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("route build failed: {0}")]
    Build(#[from] BuildError),

    #[error("session storage failed: {0}")]
    Session(#[from] CookieError),
}

#[derive(Debug, Clone)]
pub struct ConfigState {
    current: Option<Arc<ServerConfig>>,
    last_good: Arc<ServerConfig>,
    last_error: Option<String>,
}

impl ConfigState {
    pub fn new(initial: ServerConfig) -> Self {
        let initial = Arc::new(initial);
        Self {
            current: Some(initial.clone()),
            last_good: initial,
            last_error: None,
        }
    }

    /// Record a reload attempt; success promotes the config to last-good.
    pub fn apply<E: ToString>(&mut self, attempt: Result<ServerConfig, E>) -> Result<Arc<ServerConfig>, E> {
        match attempt {
            Ok(config) => {
                let config = Arc::new(config);
                self.current = Some(config.clone());
                self.last_good = config.clone();
                self.last_error = None;
                Ok(config)
            }
            Err(err) => {
                self.current = None;
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Configuration requests are served with.
    pub fn active(&self) -> &Arc<ServerConfig> {
        &self.last_good
    }

    /// The most recent attempt, if it applied.
    pub fn current(&self) -> Option<&Arc<ServerConfig>> {
        self.current.as_ref()
    }

    pub fn is_degraded(&self) -> bool {
        self.current.is_none()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
