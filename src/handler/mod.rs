//! Server request handling.
//!
//! # Responsibilities
//! - Classify requests as document, data or resource
//! - Run the leaf action and the branch loaders, honoring cancellation
//! - Assign errors to the right boundary and assemble the response
//!
//! # Design Decisions
//! - Loaders and actions return `Result<RouteValue, Thrown>`; `?` throws
//! - Loaders of one request run concurrently; results keep branch order
//! - A thrown `Response` is data for the boundary, never reported as an error
//! - Unhandled error details are hidden in production
//!
//! # Modules
//! - `request`: `RouteRequest`, `LoadContext`, `RouteArgs`
//! - `outcome`: loader/action results and serialized errors
//! - `build`: `ServerBuild` and its builder
//! - `classify`, `execute`, `boundary`, `assemble`: pipeline stages
//! - `pipeline`: `RequestHandler`, the entry point

mod assemble;
pub mod boundary;
pub mod build;
pub mod classify;
pub mod context;
pub mod error;
mod execute;
pub mod outcome;
pub mod pipeline;
pub mod request;
pub mod responses;

pub use build::{BuildError, BuildOptions, RenderArgs, RouteModule, ServerBuild, ServerBuildBuilder};
pub use classify::RequestKind;
pub use context::StaticHandlerContext;
pub use error::{ErrorContext, HandleErrorFn, ServerError};
pub use outcome::{BoxError, ErrorValue, RouteResult, RouteValue, Thrown};
pub use pipeline::RequestHandler;
pub use request::{LoadContext, RouteArgs, RouteRequest};
pub use responses::{json, json_with_status, redirect, redirect_with_status};
