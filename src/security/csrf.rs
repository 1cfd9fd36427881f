//! Origin/Host check for mutating requests.
//!
//! # Responsibilities
//! - Compare the `Origin` host with `X-Forwarded-Host` (preferred) or `Host`
//! - Accept origins listed in an allow-list of host globs
//!
//! # Design Decisions
//! - Requests without `Origin` pass; not every client sends it
//! - `*` matches exactly one dot-separated label, `**` matches any number (including none)
//! - Pure function over headers; no state

use axum::http::HeaderMap;
use thiserror::Error;
use url::Url;

/// Reasons a request is rejected as a potential CSRF attack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CsrfError {
    #[error("`origin` header is not a valid URL. Aborting the action.")]
    InvalidOrigin,

    #[error(
        "`x-forwarded-host` or `host` headers are not provided. One of these is needed \
         to compare the `origin` header from a forwarded action request. Aborting the action."
    )]
    MissingHost,

    #[error("`{header}` header does not match `origin` header from a forwarded action request. Aborting the action.")]
    HostMismatch { header: &'static str },
}

/// Reject cross-origin mutations.
pub fn throw_if_potential_csrf_attack(
    headers: &HeaderMap,
    allowed_origins: Option<&[String]>,
) -> Result<(), CsrfError> {
    let Some(origin) = headers.get("origin") else {
        return Ok(());
    };
    let origin = origin.to_str().map_err(|_| CsrfError::InvalidOrigin)?;
    let origin_host = if origin == "null" {
        // Opaque origins (sandboxed frames, file://) never equal a real host.
        "null".to_string()
    } else {
        origin_host(origin)?
    };

    let host = trusted_host(headers);

    if let Some((_, host)) = &host {
        if host.eq_ignore_ascii_case(&origin_host) {
            return Ok(());
        }
    }

    if is_allowed_origin(&origin_host, allowed_origins.unwrap_or_default()) {
        return Ok(());
    }

    match host {
        Some((header, _)) => Err(CsrfError::HostMismatch { header }),
        None => Err(CsrfError::MissingHost),
    }
}

/// `host[:port]` of a serialized origin.
fn origin_host(origin: &str) -> Result<String, CsrfError> {
    let url = Url::parse(origin).map_err(|_| CsrfError::InvalidOrigin)?;
    let host = url.host_str().ok_or(CsrfError::InvalidOrigin)?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// The host the request claims to be for, and which header said so.
fn trusted_host(headers: &HeaderMap) -> Option<(&'static str, String)> {
    let forwarded = headers
        .get("x-forwarded-host")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(host) = forwarded {
        return Some(("x-forwarded-host", host.to_string()));
    }

    headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|host| ("host", host.to_string()))
}

fn is_allowed_origin(origin_host: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|pattern| {
        !pattern.is_empty()
            && (pattern.eq_ignore_ascii_case(origin_host) || match_wildcard_domain(origin_host, pattern))
    })
}

/// Glob match of a host against a pattern, label by label.
pub fn match_wildcard_domain(domain: &str, pattern: &str) -> bool {
    let domain = domain.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();
    let labels: Vec<&str> = domain.split('.').collect();
    let parts: Vec<&str> = pattern.split('.').collect();
    match_labels(&labels, &parts)
}

fn match_labels(labels: &[&str], parts: &[&str]) -> bool {
    match parts.split_first() {
        None => labels.is_empty(),
        Some((&"**", rest)) => (0..=labels.len()).any(|skip| match_labels(&labels[skip..], rest)),
        Some((part, rest)) => match labels.split_first() {
            Some((label, tail)) => (*part == "*" || part == label) && match_labels(tail, rest),
            None => false,
        },
    }
}
