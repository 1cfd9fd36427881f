//! Server-side request core for nested-route web applications.
//!
//! ```text
//!     HTTP request
//!         │
//!         ▼
//!   ┌───────────┐   ┌──────────────┐   ┌──────────────────────────────┐
//!   │   http    │──▶│   handler    │──▶│ routing (tree, matcher,      │
//!   │  server   │   │  pipeline    │   │ normalization)               │
//!   └───────────┘   └──────┬───────┘   └──────────────────────────────┘
//!                          │
//!          ┌───────────────┼────────────────┐
//!          ▼               ▼                ▼
//!    security (CSRF)   loaders/actions   boundary resolver
//!                          │
//!                          ▼
//!             response assembly (document | data | resource)
//!
//!   Cross-cutting: config (+ hot reload), cookies, sessions,
//!                  observability, lifecycle
//! ```

pub mod config;
pub mod cookies;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;
pub mod sessions;

pub use config::ServerConfig;
pub use handler::{RequestHandler, ServerBuild};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
