//! Final response assembly.

use std::collections::BTreeMap;

use axum::body::Body;
use axum::http::{HeaderMap, Response, StatusCode};
use serde_json::{json, Map, Value};

use crate::config::ServerMode;
use crate::handler::boundary::BoundaryError;
use crate::handler::context::StaticHandlerContext;
use crate::handler::error::ServerError;
use crate::handler::responses::{self, merge_headers};
use crate::routing::Branch;

const UNEXPECTED: &str = "Unexpected Server Error";

/// Result of running a document or data query to completion.
#[derive(Debug)]
pub(crate) struct QueryState {
    pub branch: Branch,
    pub loader_data: BTreeMap<String, Value>,
    pub action_data: Option<BTreeMap<String, Value>>,
    pub error: Option<BoundaryError>,
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl QueryState {
    pub fn errored(branch: Branch, error: Option<BoundaryError>) -> Self {
        let status = error
            .as_ref()
            .map(|b| b.error.status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            branch,
            loader_data: BTreeMap::new(),
            action_data: None,
            error,
            status,
            headers: HeaderMap::new(),
        }
    }

    pub fn into_context(self, url: String, basename: Option<String>, mode: ServerMode) -> StaticHandlerContext {
        StaticHandlerContext {
            url,
            basename,
            matches: self.branch,
            loader_data: self.loader_data,
            action_data: self.action_data,
            errors: self
                .error
                .map(|b| BTreeMap::from([(b.route_id, b.error.sanitized(mode))])),
            status_code: self.status.as_u16(),
        }
    }
}

/// `{routeId: {"data": ..} | {"error": ..}}` for `.data` requests.
pub(crate) fn data_response(state: QueryState, mode: ServerMode) -> Response<Body> {
    let mut payload = Map::new();
    for (id, value) in state.action_data.into_iter().flatten().chain(state.loader_data) {
        payload.insert(id, json!({ "data": value }));
    }
    if let Some(boundary) = state.error {
        payload.insert(boundary.route_id, json!({ "error": boundary.error.sanitized(mode) }));
    }

    let mut response = responses::json_with_status(Value::Object(payload), state.status);
    merge_headers(response.headers_mut(), &state.headers);
    response
}

/// Copy collected route headers the renderer did not set itself.
pub(crate) fn fill_missing_headers(mut response: Response<Body>, collected: &HeaderMap) -> Response<Body> {
    let target = response.headers_mut();
    for name in collected.keys() {
        if target.contains_key(name) {
            continue;
        }
        for value in collected.get_all(name) {
            target.append(name.clone(), value.clone());
        }
    }
    response
}

/// Last-resort `500`; details only in development.
pub(crate) fn unexpected_error(mode: ServerMode, err: &ServerError) -> Response<Body> {
    let body = if mode.is_development() {
        format!("{UNEXPECTED}\n\n{err}")
    } else {
        UNEXPECTED.to_string()
    };
    responses::text(StatusCode::INTERNAL_SERVER_ERROR, body)
}

/// HEAD responses keep status and headers only.
pub(crate) fn strip_body(response: Response<Body>) -> Response<Body> {
    let (parts, _) = response.into_parts();
    Response::from_parts(parts, Body::empty())
}
