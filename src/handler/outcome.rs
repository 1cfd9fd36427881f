//! Loader/action results.
//!
//! User code returns `Result<RouteValue, Thrown>` and uses `?` to "throw".
//! The executor converts that into a [`RouteOutcome`] at the call boundary,
//! which is what the rest of the pipeline works with.

use std::error::Error as StdError;

use axum::body::Body;
use axum::http::{HeaderMap, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::config::ServerMode;
use crate::handler::responses;

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Successful loader/action value.
#[derive(Debug)]
pub enum RouteValue {
    Data(Value),
    /// Raw response: passed through for resource routes, read as data otherwise.
    Response(Response<Body>),
}

impl From<Value> for RouteValue {
    fn from(value: Value) -> Self {
        Self::Data(value)
    }
}

impl From<Response<Body>> for RouteValue {
    fn from(response: Response<Body>) -> Self {
        Self::Response(response)
    }
}

/// Something a loader/action "threw".
#[derive(Debug)]
pub enum Thrown {
    Response(Response<Body>),
    Error(BoxError),
}

impl Thrown {
    pub fn response(response: Response<Body>) -> Self {
        Self::Response(response)
    }

    /// Throw a `302` redirect.
    pub fn redirect(location: &str) -> Self {
        Self::Response(responses::redirect(location))
    }

    /// Throw an error response with a JSON body.
    pub fn status(status: StatusCode, data: Value) -> Self {
        Self::Response(responses::json_with_status(data, status))
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::Error(message.into().into())
    }
}

impl<E> From<E> for Thrown
where
    E: StdError + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::Error(Box::new(err))
    }
}

pub type RouteResult = Result<RouteValue, Thrown>;

/// Serializable error assigned to a boundary route.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ErrorValue {
    ThrownResponse {
        status: u16,
        status_text: String,
        data: Value,
    },
    UnhandledError {
        name: String,
        message: String,
        stack: Option<String>,
    },
}

const GENERIC_MESSAGE: &str = "Unexpected Server Error";

impl ErrorValue {
    pub fn thrown(status: StatusCode, data: Value) -> Self {
        Self::ThrownResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            data,
        }
    }

    pub fn unhandled(err: &(dyn StdError + 'static)) -> Self {
        Self::UnhandledError {
            name: "Error".to_string(),
            message: err.to_string(),
            stack: error_stack(err),
        }
    }

    pub fn not_found(pathname: &str) -> Self {
        Self::thrown(
            StatusCode::NOT_FOUND,
            Value::String(format!("Error: No route matches URL \"{pathname}\"")),
        )
    }

    pub fn method_not_allowed(message: String) -> Self {
        Self::thrown(StatusCode::METHOD_NOT_ALLOWED, Value::String(format!("Error: {message}")))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::ThrownResponse { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::UnhandledError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Hide unhandled error details outside development.
    pub fn sanitized(&self, mode: ServerMode) -> Self {
        match self {
            Self::UnhandledError { name, .. } if !mode.is_development() => Self::UnhandledError {
                name: name.clone(),
                message: GENERIC_MESSAGE.to_string(),
                stack: None,
            },
            other => other.clone(),
        }
    }
}

/// Render an error's source chain as a pseudo stack.
pub(crate) fn error_stack(err: &(dyn StdError + 'static)) -> Option<String> {
    let mut lines = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(format!("Caused by: {cause}"));
        source = cause.source();
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}

/// Normalized per-route result.
#[derive(Debug)]
pub enum RouteOutcome {
    Data {
        value: Value,
        status: Option<StatusCode>,
        headers: HeaderMap,
    },
    Redirect(Response<Body>),
    Error {
        error: ErrorValue,
        headers: HeaderMap,
    },
}

impl RouteOutcome {
    pub fn error(error: ErrorValue) -> Self {
        Self::Error {
            error,
            headers: HeaderMap::new(),
        }
    }
}
