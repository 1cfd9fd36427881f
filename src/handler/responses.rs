//! Response helpers for loaders, actions and the pipeline itself.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Response, StatusCode};
use serde_json::Value;

const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// `200` JSON response.
pub fn json(value: Value) -> Response<Body> {
    json_with_status(value, StatusCode::OK)
}

pub fn json_with_status(value: Value, status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::from(value.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
    response
}

/// `302` redirect to `location`.
pub fn redirect(location: &str) -> Response<Body> {
    redirect_with_status(location, StatusCode::FOUND)
}

pub fn redirect_with_status(location: &str, status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    match HeaderValue::try_from(location) {
        Ok(value) => {
            response.headers_mut().insert(header::LOCATION, value);
        }
        Err(_) => tracing::warn!(location, "Dropping redirect location that is not a valid header"),
    }
    response
}

/// Plain-text response.
pub fn text(status: StatusCode, body: impl Into<String>) -> Response<Body> {
    let mut response = Response::new(Body::from(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

/// True for a redirect status carrying a `Location` header.
pub fn is_redirect<B>(response: &Response<B>) -> bool {
    REDIRECT_STATUSES.contains(&response.status().as_u16())
        && response.headers().contains_key(header::LOCATION)
}

/// Merge `source` into `target`: `Set-Cookie` accumulates, other headers are replaced.
pub fn merge_headers(target: &mut HeaderMap, source: &HeaderMap) {
    for name in source.keys() {
        if name == header::SET_COOKIE {
            for value in source.get_all(name) {
                target.append(name.clone(), value.clone());
            }
        } else {
            target.remove(name);
            for value in source.get_all(name) {
                target.append(name.clone(), value.clone());
            }
        }
    }
}
