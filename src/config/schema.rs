//! Configuration schema definitions.
//!
//! Every section has defaults so a minimal file (or none) works.

use serde::{Deserialize, Serialize};

use crate::cookies::CookieOptions;
use crate::routing::RouteDefinition;

/// Root server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub mode: ServerMode,

    /// URL prefix the app is mounted under (e.g. `/app`).
    pub basename: Option<String>,

    pub listener: ListenerConfig,

    pub timeouts: TimeoutConfig,

    pub security: SecurityConfig,

    pub csrf: CsrfConfig,

    pub future: FutureConfig,

    pub observability: ObservabilityConfig,

    pub sessions: SessionConfig,

    /// Route manifest; empty keeps the routes compiled into the build.
    pub routes: Vec<RouteDefinition>,
}

/// Controls error detail exposure and default error logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    Development,
    #[default]
    Production,
}

impl ServerMode {
    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed per request, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum buffered request body in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Extra origin hosts (globs allowed) accepted for mutations.
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FutureConfig {
    /// Require a provider load context on every request.
    pub middleware: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub metrics_enabled: bool,

    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    #[default]
    Memory,
    Cookie,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub backend: SessionBackend,
    pub cookie: SessionCookieConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionCookieConfig {
    pub name: String,

    /// Newest first. Older secrets are still accepted when reading.
    pub secrets: Vec<String>,

    pub encrypt: bool,

    pub options: CookieOptions,
}

impl Default for SessionCookieConfig {
    fn default() -> Self {
        Self {
            name: "__session".to_string(),
            secrets: Vec::new(),
            encrypt: false,
            options: CookieOptions::default(),
        }
    }
}
