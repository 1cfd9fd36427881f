//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use arbor::handler::{
    json_with_status, BoxError, ErrorContext, LoadContext, RenderArgs, RequestHandler, RouteRequest,
    RouteResult, RouteValue, ServerError, Thrown,
};
use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Method, Response};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub const ORIGIN: &str = "http://localhost";

/// Successful loader/action result.
pub fn ok(value: Value) -> RouteResult {
    Ok(RouteValue::Data(value))
}

/// Failed loader/action result.
pub fn fail(thrown: Thrown) -> RouteResult {
    Err(thrown)
}

pub fn request(method: Method, path: &str) -> RouteRequest {
    let mut headers = HeaderMap::new();
    headers.insert("host", HeaderValue::from_static("localhost"));
    RouteRequest::new(method, &format!("{ORIGIN}{path}"))
        .unwrap()
        .with_headers(headers)
}

pub fn get(path: &str) -> RouteRequest {
    request(Method::GET, path)
}

pub fn post(path: &str) -> RouteRequest {
    request(Method::POST, path)
}

pub async fn handle(handler: &RequestHandler, request: RouteRequest) -> Response<Body> {
    handler
        .handle(request, LoadContext::default(), CancellationToken::new())
        .await
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Document renderer that answers with the handler context as JSON.
pub async fn render_context(args: RenderArgs) -> Result<Response<Body>, BoxError> {
    let context = serde_json::to_value(&*args.context)?;
    Ok(json_with_status(context, args.status))
}

/// Counts invocations of a loader or action.
#[derive(Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Collects everything passed to the `handle_error` hook.
#[derive(Clone, Default)]
pub struct Reports(Arc<Mutex<Vec<String>>>);

impl Reports {
    pub fn hook(&self) -> impl Fn(&ServerError, ErrorContext<'_>) + Send + Sync + 'static {
        let reports = self.0.clone();
        move |err: &ServerError, ctx: ErrorContext<'_>| {
            let line = match err {
                ServerError::Aborted { method, url } => format!("aborted {method} {url}"),
                other => format!("{} {} {}", other.kind(), ctx.request.method, other),
            };
            reports.lock().unwrap().push(line);
        }
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}
