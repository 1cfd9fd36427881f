//! Request handler entry point.
//!
//! # Data Flow
//! ```text
//! RouteRequest
//!     → context check (middleware flag)      → 500
//!     → path normalization                   → 308 to canonical URL
//!     → CSRF guard (mutations)               → 403
//!     → match + classify
//!         Resource → loader/action response passed through
//!         Document | Data
//!             → action (mutations) → loaders → boundary resolution
//!             → Data:     JSON payload
//!             → Document: render (retry once with a root error)
//!     → HEAD body strip, metrics
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Response, StatusCode};
use tokio_util::sync::CancellationToken;

use crate::config::ServerMode;
use crate::handler::assemble::{self, QueryState};
use crate::handler::boundary::{find_boundary, resolve, Failure};
use crate::handler::build::{RenderArgs, ServerBuild};
use crate::handler::classify::{
    classify, intent_for, logical_url, parse_data_path, routes_filter, Intent, RequestKind,
};
use crate::handler::error::{ErrorReporter, ServerError};
use crate::handler::execute::{Aborted, Executor};
use crate::handler::outcome::{ErrorValue, RouteOutcome, RouteValue, Thrown};
use crate::handler::request::{LoadContext, RouteRequest};
use crate::handler::responses::{self, merge_headers};
use crate::observability::metrics;
use crate::routing::matcher::root_branch;
use crate::routing::normalize::canonical_location;
use crate::routing::{match_routes, Branch, Params, RouteMatch};
use crate::security::throw_if_potential_csrf_attack;

enum QueryResult {
    Redirect(Response<Body>),
    Done(QueryState),
}

/// Turns requests into responses for one application build.
#[derive(Debug, Clone)]
pub struct RequestHandler {
    build: ServerBuild,
    mode: ServerMode,
}

impl RequestHandler {
    pub fn new(build: ServerBuild, mode: ServerMode) -> Self {
        Self { build, mode }
    }

    pub fn build(&self) -> &ServerBuild {
        &self.build
    }

    pub fn mode(&self) -> ServerMode {
        self.mode
    }

    /// Handle one request. Cancelling `signal` aborts in-flight loaders/actions.
    pub async fn handle(
        &self,
        request: RouteRequest,
        context: LoadContext,
        signal: CancellationToken,
    ) -> Response<Body> {
        let start = Instant::now();
        let method = request.method.clone();
        let path = request.url.path().to_string();

        let (kind, mut response) = self.dispatch(request, &context, &signal).await;
        if method == Method::HEAD {
            response = assemble::strip_body(response);
        }

        let status = response.status().as_u16();
        metrics::record_request(kind.as_str(), status, start);
        tracing::debug!(
            kind = kind.as_str(),
            method = %method,
            path = %path,
            status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request handled"
        );
        response
    }

    async fn dispatch(
        &self,
        request: RouteRequest,
        context: &LoadContext,
        signal: &CancellationToken,
    ) -> (RequestKind, Response<Body>) {
        let reporter = ErrorReporter::new(self.build.handle_error(), self.mode, &request, context);
        let options = self.build.options();
        let data_path = parse_data_path(request.url.path());
        let provisional = if data_path.is_data {
            RequestKind::Data
        } else {
            RequestKind::Document
        };

        if options.middleware && !context.is_provider() {
            let err = ServerError::InvalidContext(
                "the middleware future flag requires a provider load context".to_string(),
            );
            reporter.report(&err, &Params::new());
            return (provisional, assemble::unexpected_error(self.mode, &err));
        }

        if let Some(location) = canonical_location(&request.url) {
            tracing::debug!(from = %request.url.path(), to = %location, "Redirecting to canonical path");
            return (
                provisional,
                responses::redirect_with_status(&location, StatusCode::PERMANENT_REDIRECT),
            );
        }

        let intent = intent_for(&request.method);
        if intent == Some(Intent::Mutate) {
            if let Err(err) = throw_if_potential_csrf_attack(
                &request.headers,
                options.allowed_action_origins.as_deref(),
            ) {
                tracing::warn!(error = %err, url = %request.url, "Rejected potential CSRF request");
                return (provisional, responses::text(StatusCode::FORBIDDEN, err.to_string()));
            }
        }

        let branch = match_routes(self.build.routes(), &data_path.pathname, options.basename.as_deref());
        let kind = classify(data_path.is_data, branch.as_ref().and_then(|b| b.last()));

        let logical = request.with_url(logical_url(&request.url, &data_path.pathname));
        let executor = Executor {
            build: &self.build,
            request: &logical,
            context,
            signal,
            reporter: &reporter,
        };

        let result = match (kind, branch) {
            (RequestKind::Resource, Some(branch)) => self.resource(&executor, &branch, intent).await,
            (kind, branch) => {
                let filter = routes_filter(&request.url);
                let is_data = kind == RequestKind::Data;
                match self
                    .query(&executor, branch, intent, &data_path.pathname, filter.as_deref(), is_data)
                    .await
                {
                    Ok(QueryResult::Redirect(response)) => Ok(response),
                    Ok(QueryResult::Done(state)) if is_data => Ok(assemble::data_response(state, self.mode)),
                    Ok(QueryResult::Done(state)) => Ok(self.render(&request, state, &reporter).await),
                    Err(aborted) => Err(aborted),
                }
            }
        };

        let response = result.unwrap_or_else(|Aborted| {
            let err = ServerError::Aborted {
                method: request.method.clone(),
                url: request.url.to_string(),
            };
            reporter.report(&err, &Params::new());
            assemble::unexpected_error(self.mode, &err)
        });
        (kind, response)
    }

    /// Action (for mutations), then loaders, then boundary resolution.
    async fn query(
        &self,
        exec: &Executor<'_>,
        branch: Option<Branch>,
        intent: Option<Intent>,
        pathname: &str,
        filter: Option<&[String]>,
        is_data: bool,
    ) -> Result<QueryResult, Aborted> {
        let tree = self.build.routes();

        let (branch, intent) = match (branch, intent) {
            (Some(branch), Some(intent)) if !branch.is_empty() => (branch, intent),
            (_, intent) => {
                let error = match intent {
                    None => ErrorValue::method_not_allowed(format!(
                        "Invalid request method \"{}\"",
                        exec.request.method
                    )),
                    Some(_) => ErrorValue::not_found(pathname),
                };
                let branch = root_branch(tree);
                let boundary = resolve(tree, &branch, vec![Failure { index: 0, error }]);
                return Ok(QueryResult::Done(QueryState::errored(branch, boundary)));
            }
        };

        let leaf_index = branch.len() - 1;
        let mut failures = Vec::new();
        let mut headers = HeaderMap::new();
        let mut action_headers = HeaderMap::new();
        let mut action_data = None;
        let mut action_status = None;
        let mut loader_limit = branch.len();

        if intent == Intent::Mutate {
            let leaf = &branch[leaf_index];
            match exec.call_action(leaf).await? {
                RouteOutcome::Redirect(response) => return Ok(QueryResult::Redirect(response)),
                RouteOutcome::Data { value, status, headers } => {
                    action_headers = headers;
                    action_status = status;
                    action_data = Some(BTreeMap::from([(leaf.id().to_string(), value)]));
                }
                RouteOutcome::Error { error, headers } => {
                    action_headers = headers;
                    failures.push(Failure { index: leaf_index, error });
                    // Loaders at or below the catching boundary would be discarded anyway.
                    loader_limit = find_boundary(tree, &branch, leaf_index);
                }
            }
            if is_data {
                loader_limit = 0;
            }
        }

        let targets: Vec<(usize, &RouteMatch)> = branch[..loader_limit]
            .iter()
            .enumerate()
            .filter(|(_, m)| m.route.has_loader)
            .filter(|(_, m)| filter.map_or(true, |ids| ids.iter().any(|id| id == m.id())))
            .collect();

        let mut loader_data = BTreeMap::new();
        let mut loader_status = None;
        for (index, outcome) in exec.call_loaders(&targets).await? {
            match outcome {
                RouteOutcome::Redirect(response) => return Ok(QueryResult::Redirect(response)),
                RouteOutcome::Data { value, status, headers: route_headers } => {
                    merge_headers(&mut headers, &route_headers);
                    loader_data.insert(branch[index].id().to_string(), value);
                    loader_status = status.or(loader_status);
                }
                RouteOutcome::Error { error, headers: route_headers } => {
                    merge_headers(&mut headers, &route_headers);
                    failures.push(Failure { index, error });
                }
            }
        }
        merge_headers(&mut headers, &action_headers);

        let error = resolve(tree, &branch, failures);
        let status = match &error {
            Some(boundary) => {
                let surviving: Vec<&str> = branch[..boundary.index].iter().map(|m| m.id()).collect();
                loader_data.retain(|id, _| surviving.contains(&id.as_str()));
                action_data = None;
                boundary.error.status()
            }
            None => action_status.or(loader_status).unwrap_or(StatusCode::OK),
        };

        Ok(QueryResult::Done(QueryState {
            branch,
            loader_data,
            action_data,
            error,
            status,
            headers,
        }))
    }

    /// Render the document, retrying once with the render error at the root.
    async fn render(&self, request: &RouteRequest, state: QueryState, reporter: &ErrorReporter<'_>) -> Response<Body> {
        let headers = state.headers.clone();
        let status = state.status;
        let url = match request.url.query() {
            Some(query) => format!("{}?{query}", request.url.path()),
            None => request.url.path().to_string(),
        };
        let mut context = state.into_context(url, self.build.options().basename.clone(), self.mode);
        let render = self.build.render_document();

        let first = render(RenderArgs {
            request: request.clone(),
            status,
            headers: headers.clone(),
            context: Arc::new(context.clone()),
        })
        .await;

        let err = match first {
            Ok(response) => return assemble::fill_missing_headers(response, &headers),
            Err(err) => err,
        };

        let error = ErrorValue::unhandled(err.as_ref()).sanitized(self.mode);
        reporter.report(&ServerError::Render(err), &Params::new());
        context.errors = Some(BTreeMap::from([(self.build.routes().root_id().to_string(), error)]));
        context.status_code = StatusCode::INTERNAL_SERVER_ERROR.as_u16();

        let retry = render(RenderArgs {
            request: request.clone(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            headers: headers.clone(),
            context: Arc::new(context),
        })
        .await;

        match retry {
            Ok(response) => assemble::fill_missing_headers(response, &headers),
            Err(err) => {
                let err = ServerError::Render(err);
                reporter.report(&err, &Params::new());
                assemble::unexpected_error(self.mode, &err)
            }
        }
    }

    /// Resource routes: the handler's response goes out as-is.
    async fn resource(
        &self,
        exec: &Executor<'_>,
        branch: &[RouteMatch],
        intent: Option<Intent>,
    ) -> Result<Response<Body>, Aborted> {
        let Some(leaf) = branch.last() else {
            return Ok(responses::text(StatusCode::NOT_FOUND, "Not Found"));
        };
        let module = self.build.module(leaf.id());

        let handler = match intent {
            Some(Intent::Load) => match module.and_then(|m| m.loader.as_ref()) {
                Some(loader) => loader,
                None => {
                    return Ok(responses::text(
                        StatusCode::BAD_REQUEST,
                        exec.missing_handler_message("loader", leaf),
                    ))
                }
            },
            Some(Intent::Mutate) => match module.and_then(|m| m.action.as_ref()) {
                Some(action) => action,
                None => {
                    return Ok(responses::text(
                        StatusCode::METHOD_NOT_ALLOWED,
                        exec.missing_handler_message("action", leaf),
                    ))
                }
            },
            None => {
                return Ok(responses::text(
                    StatusCode::METHOD_NOT_ALLOWED,
                    format!("Invalid request method \"{}\"", exec.request.method),
                ))
            }
        };

        Ok(match exec.call_resource(handler, leaf).await? {
            Ok(RouteValue::Data(value)) => responses::json(value),
            Ok(RouteValue::Response(response)) | Err(Thrown::Response(response)) => response,
            Err(Thrown::Error(err)) => {
                let err = ServerError::Route(err);
                exec.reporter.report(&err, &leaf.params);
                assemble::unexpected_error(self.mode, &err)
            }
        })
    }
}
