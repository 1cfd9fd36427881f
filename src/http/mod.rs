//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, tracing, timeout)
//!     → request.rs (absolute URL, buffered body → RouteRequest)
//!     → handler::RequestHandler (with a fresh CancellationToken)
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{into_route_request, RequestError, RequestUuid, X_REQUEST_ID};
pub use server::HttpServer;
