//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request handler, config reloads, session storage:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID (x-request-id) is attached to the HTTP trace span
//! - Metrics are cheap; recording without an exporter costs nothing

pub mod logging;
pub mod metrics;
