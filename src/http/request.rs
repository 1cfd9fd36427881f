//! Inbound request adaptation.
//!
//! # Responsibilities
//! - Generate a UUID request id for every request
//! - Rebuild the absolute request URL from the proxy/host headers
//! - Buffer the body once, within the configured limit
//!
//! # Design Decisions
//! - `X-Forwarded-Host`/`X-Forwarded-Proto` win over `Host` and the default scheme
//! - Only the first value of a comma-separated forwarded header is used
//! - Host values that could rewrite the URL (path, query, fragment or
//!   userinfo delimiters) are ignored in favour of the next source

use axum::body::Body;
use axum::http::header::{self, AsHeaderName};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tower_http::request_id::{MakeRequestId, RequestId};
use url::Url;
use uuid::Uuid;

use crate::handler::RouteRequest;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ids are random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestUuid;

impl MakeRequestId for RequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = HeaderValue::from_str(&Uuid::new_v4().to_string()).ok()?;
        Some(RequestId::new(id))
    }
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Url(_) => StatusCode::BAD_REQUEST,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        };
        (status, self.to_string()).into_response()
    }
}

/// Buffer an axum request into a `RouteRequest`.
pub async fn into_route_request(request: Request<Body>, limit: usize) -> Result<RouteRequest, RequestError> {
    let (parts, body) = request.into_parts();
    let url = request_url(&parts.uri, &parts.headers)?;
    let body = axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| RequestError::BodyTooLarge { limit })?;

    Ok(RouteRequest {
        method: parts.method,
        url,
        headers: parts.headers,
        body,
    })
}

/// Absolute URL for a request line and its headers.
pub fn request_url(uri: &Uri, headers: &HeaderMap) -> Result<Url, url::ParseError> {
    if uri.scheme().is_some() {
        return Url::parse(&uri.to_string());
    }

    let host = first_value(headers, "x-forwarded-host")
        .filter(|h| is_plain_authority(h))
        .or_else(|| first_value(headers, header::HOST).filter(|h| is_plain_authority(h)))
        .unwrap_or("localhost");
    let scheme = first_value(headers, "x-forwarded-proto")
        .filter(|s| matches!(*s, "http" | "https"))
        .unwrap_or("http");
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    Url::parse(&format!("{scheme}://{host}{path}"))
}

/// `host[:port]` only.
fn is_plain_authority(host: &str) -> bool {
    !host.contains(['/', '?', '#', '@', '\\'])
}

fn first_value<K: AsHeaderName>(headers: &HeaderMap, name: K) -> Option<&str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_url_from_host() {
        let uri: Uri = "/users?page=2".parse().unwrap();
        let url = request_url(&uri, &headers(&[("host", "example.com:3000")])).unwrap();
        assert_eq!(url.as_str(), "http://example.com:3000/users?page=2");
    }

    #[test]
    fn test_forwarded_headers_win() {
        let uri: Uri = "/".parse().unwrap();
        let url = request_url(
            &uri,
            &headers(&[
                ("host", "internal:8080"),
                ("x-forwarded-host", "shop.example.com, proxy"),
                ("x-forwarded-proto", "https"),
            ]),
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://shop.example.com/");
    }

    #[test]
    fn test_forwarded_host_cannot_rewrite_url() {
        let uri: Uri = "/account".parse().unwrap();
        for forged in ["evil.test/steal?", "evil.test#", "user@evil.test", "evil.test?x="] {
            let mut map = headers(&[("host", "shop.example.com")]);
            map.insert("x-forwarded-host", HeaderValue::from_static(forged));
            let url = request_url(&uri, &map).unwrap();
            assert_eq!(url.as_str(), "http://shop.example.com/account", "{forged}");
        }

        let url = request_url(&uri, &headers(&[("host", "a/b"), ("x-forwarded-proto", "javascript")])).unwrap();
        assert_eq!(url.as_str(), "http://localhost/account");
    }

    #[test]
    fn test_duplicate_slashes_survive() {
        let uri: Uri = "//users///1".parse().unwrap();
        let url = request_url(&uri, &HeaderMap::new()).unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.path(), "//users///1");
    }

    #[tokio::test]
    async fn test_body_limit() {
        let request = Request::post("/upload")
            .header("host", "localhost")
            .body(Body::from(vec![b'x'; 64]))
            .unwrap();
        let err = into_route_request(request, 16).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);

        let request = Request::post("/upload")
            .header("host", "localhost")
            .body(Body::from("a=1"))
            .unwrap();
        let route_request = into_route_request(request, 16).await.unwrap();
        assert_eq!(route_request.form(), vec![("a".to_string(), "1".to_string())]);
    }
}
