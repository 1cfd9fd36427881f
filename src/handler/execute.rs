//! Loader/action execution.
//!
//! # Responsibilities
//! - Run the leaf action, or the branch loaders concurrently
//! - Race every call against the request's cancellation signal
//! - Normalize raw results into `RouteOutcome`s and report unhandled errors

use std::future::Future;

use axum::body::Body;
use axum::http::{header, HeaderMap};
use futures_util::future::join_all;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::handler::build::{RouteFn, ServerBuild};
use crate::handler::error::{ErrorReporter, ServerError};
use crate::handler::outcome::{ErrorValue, RouteOutcome, RouteResult, RouteValue, Thrown};
use crate::handler::request::{LoadContext, RouteArgs, RouteRequest};
use crate::handler::responses::is_redirect;
use crate::routing::RouteMatch;

/// The request signal fired before the work finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Aborted;

pub(crate) struct Executor<'a> {
    pub build: &'a ServerBuild,
    /// Request as loaders and actions see it.
    pub request: &'a RouteRequest,
    pub context: &'a LoadContext,
    pub signal: &'a CancellationToken,
    pub reporter: &'a ErrorReporter<'a>,
}

impl Executor<'_> {
    /// Run the leaf action. A missing action is a 405 at the leaf.
    pub async fn call_action(&self, leaf: &RouteMatch) -> Result<RouteOutcome, Aborted> {
        let Some(action) = self.build.module(leaf.id()).and_then(|m| m.action.as_ref()) else {
            return Ok(RouteOutcome::error(ErrorValue::method_not_allowed(
                self.missing_handler_message("action", leaf),
            )));
        };

        let raw = self.guard(action(self.args(leaf, self.request.clone()))).await?;
        Ok(self.settle(raw, leaf).await)
    }

    /// Run loaders for `targets` concurrently; results keep branch order.
    pub async fn call_loaders(
        &self,
        targets: &[(usize, &RouteMatch)],
    ) -> Result<Vec<(usize, RouteOutcome)>, Aborted> {
        let request = self.request.loader_view();

        let mut called = Vec::with_capacity(targets.len());
        let mut calls = Vec::with_capacity(targets.len());
        for &(index, m) in targets {
            if let Some(loader) = self.build.module(m.id()).and_then(|module| module.loader.as_ref()) {
                calls.push(loader(self.args(m, request.clone())));
                called.push((index, m));
            }
        }

        let results = self.guard(join_all(calls)).await?;

        let mut outcomes = Vec::with_capacity(results.len());
        for ((index, m), raw) in called.into_iter().zip(results) {
            outcomes.push((index, self.settle(raw, m).await));
        }
        Ok(outcomes)
    }

    /// Run a resource route handler and hand back its raw result.
    pub async fn call_resource(&self, handler: &RouteFn, leaf: &RouteMatch) -> Result<RouteResult, Aborted> {
        self.guard(handler(self.args(leaf, self.request.clone()))).await
    }

    pub fn missing_handler_message(&self, kind: &str, leaf: &RouteMatch) -> String {
        format!(
            "You made a {} request to \"{}\" but did not provide {} `{}` for route \"{}\", \
             so there is no way to handle the request.",
            self.request.method,
            self.request.url.path(),
            if kind == "action" { "an" } else { "a" },
            kind,
            leaf.id(),
        )
    }

    fn args(&self, m: &RouteMatch, request: RouteRequest) -> RouteArgs {
        RouteArgs {
            request,
            params: m.params.clone(),
            context: self.context.clone(),
            signal: self.signal.clone(),
        }
    }

    async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Aborted> {
        tokio::select! {
            biased;
            _ = self.signal.cancelled() => Err(Aborted),
            out = fut => Ok(out),
        }
    }

    async fn settle(&self, raw: RouteResult, m: &RouteMatch) -> RouteOutcome {
        match raw {
            Ok(RouteValue::Data(value)) => RouteOutcome::Data {
                value,
                status: None,
                headers: HeaderMap::new(),
            },
            Ok(RouteValue::Response(r)) | Err(Thrown::Response(r)) if is_redirect(&r) => {
                RouteOutcome::Redirect(r)
            }
            Ok(RouteValue::Response(r)) => {
                let (parts, body) = r.into_parts();
                RouteOutcome::Data {
                    value: read_body(body).await,
                    status: Some(parts.status),
                    headers: route_headers(parts.headers),
                }
            }
            Err(Thrown::Response(r)) => {
                let (parts, body) = r.into_parts();
                RouteOutcome::Error {
                    error: ErrorValue::thrown(parts.status, read_body(body).await),
                    headers: route_headers(parts.headers),
                }
            }
            Err(Thrown::Error(err)) => {
                let error = ErrorValue::unhandled(err.as_ref());
                tracing::debug!(route = %m.id(), error = %err, "Route threw");
                self.reporter.report(&ServerError::Route(err), &m.params);
                RouteOutcome::error(error)
            }
        }
    }
}

/// Headers a route contributes to the final response; body framing stays behind.
fn route_headers(mut headers: HeaderMap) -> HeaderMap {
    headers.remove(header::CONTENT_TYPE);
    headers.remove(header::CONTENT_LENGTH);
    headers
}

/// JSON when it parses, text otherwise, null when empty.
async fn read_body(body: Body) -> Value {
    match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) if bytes.is_empty() => Value::Null,
        Ok(bytes) => serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned())),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read route response body");
            Value::Null
        }
    }
}
