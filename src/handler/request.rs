//! Request-side types handed to loaders and actions.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{header, Extensions, HeaderMap, Method};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::routing::Params;

/// A fully buffered inbound request.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RouteRequest {
    pub fn new(method: Method, url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            method,
            url: Url::parse(url)?,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        })
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Raw `Cookie` header, if present and valid UTF-8.
    pub fn cookie_header(&self) -> Option<&str> {
        self.headers.get(header::COOKIE).and_then(|v| v.to_str().ok())
    }

    /// Decode an `application/x-www-form-urlencoded` body.
    pub fn form(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(&self.body).into_owned().collect()
    }

    /// Copy of this request addressed to `url`.
    pub(crate) fn with_url(&self, url: Url) -> Self {
        Self {
            url,
            ..self.clone()
        }
    }

    /// Body-less GET view used when running loaders.
    pub(crate) fn loader_view(&self) -> Self {
        Self {
            method: Method::GET,
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: Bytes::new(),
        }
    }
}

/// Per-request value supplied by the adapter and passed through untouched.
#[derive(Clone, Default)]
pub enum LoadContext {
    #[default]
    Empty,
    /// Any adapter-defined value.
    Value(Arc<dyn Any + Send + Sync>),
    /// Typed provider; required when the middleware flag is on.
    Provider(Arc<Extensions>),
}

impl LoadContext {
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Self::Value(Arc::new(value))
    }

    pub fn provider(extensions: Extensions) -> Self {
        Self::Provider(Arc::new(extensions))
    }

    pub fn is_provider(&self) -> bool {
        matches!(self, Self::Provider(_))
    }

    /// Typed lookup that works for both `Value` and `Provider` contexts.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            Self::Empty => None,
            Self::Value(value) => value.downcast_ref::<T>(),
            Self::Provider(extensions) => extensions.get::<T>(),
        }
    }
}

impl fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("LoadContext::Empty"),
            Self::Value(_) => f.write_str("LoadContext::Value(..)"),
            Self::Provider(ext) => write!(f, "LoadContext::Provider({} entries)", ext.len()),
        }
    }
}

/// Arguments passed to every loader and action.
#[derive(Debug, Clone)]
pub struct RouteArgs {
    pub request: RouteRequest,
    pub params: Params,
    pub context: LoadContext,
    /// Cancelled when the inbound request is aborted.
    pub signal: CancellationToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_lookup() {
        assert_eq!(LoadContext::default().get::<u32>(), None);
        assert_eq!(LoadContext::value(7u32).get::<u32>(), Some(&7));
        assert_eq!(LoadContext::value(7u32).get::<String>(), None);

        let mut extensions = Extensions::new();
        extensions.insert("tenant".to_string());
        let context = LoadContext::provider(extensions);
        assert!(context.is_provider());
        assert_eq!(context.get::<String>().map(String::as_str), Some("tenant"));
    }

    #[test]
    fn test_loader_view_drops_body() {
        let request = RouteRequest::new(Method::POST, "http://localhost/users?x=1")
            .unwrap()
            .with_body("name=ada");
        assert_eq!(request.form(), vec![("name".to_string(), "ada".to_string())]);

        let view = request.loader_view();
        assert_eq!(view.method, Method::GET);
        assert!(view.body.is_empty());
        assert_eq!(view.url.as_str(), "http://localhost/users?x=1");
    }
}
