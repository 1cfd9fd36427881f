//! Server-side error reporting.

use std::sync::Arc;

use axum::http::Method;
use thiserror::Error;

use crate::config::ServerMode;
use crate::handler::outcome::BoxError;
use crate::handler::request::{LoadContext, RouteRequest};
use crate::observability::metrics;
use crate::routing::Params;

/// Errors surfaced to the `handle_error` hook.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A loader or action failed with a non-response error.
    #[error("{0}")]
    Route(BoxError),

    #[error("AbortError: {method} {url} was aborted")]
    Aborted { method: Method, url: String },

    #[error("document render failed: {0}")]
    Render(BoxError),

    #[error("invalid load context: {0}")]
    InvalidContext(String),
}

impl ServerError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Route(_) => "route",
            Self::Aborted { .. } => "aborted",
            Self::Render(_) => "render",
            Self::InvalidContext(_) => "context",
        }
    }
}

/// What the hook gets to see about the failing request.
#[derive(Debug, Clone, Copy)]
pub struct ErrorContext<'a> {
    pub request: &'a RouteRequest,
    pub params: &'a Params,
    pub context: &'a LoadContext,
}

pub type HandleErrorFn = Arc<dyn Fn(&ServerError, ErrorContext<'_>) + Send + Sync>;

/// Per-request funnel for reported errors.
pub(crate) struct ErrorReporter<'a> {
    hook: Option<&'a HandleErrorFn>,
    mode: ServerMode,
    request: &'a RouteRequest,
    context: &'a LoadContext,
}

impl<'a> ErrorReporter<'a> {
    pub fn new(
        hook: Option<&'a HandleErrorFn>,
        mode: ServerMode,
        request: &'a RouteRequest,
        context: &'a LoadContext,
    ) -> Self {
        Self {
            hook,
            mode,
            request,
            context,
        }
    }

    pub fn report(&self, err: &ServerError, params: &Params) {
        metrics::record_route_error(err.kind());

        match self.hook {
            Some(hook) => hook(
                err,
                ErrorContext {
                    request: self.request,
                    params,
                    context: self.context,
                },
            ),
            None if self.mode.is_development() => {
                tracing::error!(
                    error = %err,
                    method = %self.request.method,
                    url = %self.request.url,
                    "Request failed"
                );
            }
            None => {}
        }
    }
}
