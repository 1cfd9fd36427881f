//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, route manifest integrity)
//!     → ServerConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads + validates
//!     → Result<ServerConfig, ConfigError> sent to the server
//!     → state.rs records current / last-good
//!     → server rebuilds the handler and swaps it atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - A failed reload is visible (`ConfigState::is_degraded`) but never
//!   replaces the last good configuration

pub mod loader;
pub mod schema;
pub mod state;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{ServerConfig, ServerMode, SessionBackend};
pub use state::{ConfigState, ReloadError};
pub use watcher::{ConfigUpdate, ConfigWatcher};
