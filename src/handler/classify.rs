//! Request classification.
//!
//! Decides from the URL suffix, the method and the matched leaf whether a
//! request is a document render, a data fetch or a resource call.

use axum::http::Method;
use url::Url;

use crate::routing::RouteMatch;

const DATA_SUFFIX: &str = ".data";
const ROOT_DATA_SEGMENT: &str = "_root";
const ROUTES_PARAM: &str = "_routes";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Document,
    Data,
    Resource,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Data => "data",
            Self::Resource => "resource",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// GET/HEAD: run loaders only.
    Load,
    /// POST/PUT/PATCH/DELETE: run the leaf action first.
    Mutate,
}

/// `None` for methods the router does not serve.
pub fn intent_for(method: &Method) -> Option<Intent> {
    match *method {
        Method::GET | Method::HEAD => Some(Intent::Load),
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE => Some(Intent::Mutate),
        _ => None,
    }
}

/// Pathname with any data suffix removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPath {
    pub is_data: bool,
    pub pathname: String,
}

/// Strip the `.data` suffix; `/_root.data` addresses `/`.
pub fn parse_data_path(pathname: &str) -> DataPath {
    let Some(stripped) = pathname.strip_suffix(DATA_SUFFIX) else {
        return DataPath {
            is_data: false,
            pathname: pathname.to_string(),
        };
    };

    let logical = if stripped.ends_with(&format!("/{ROOT_DATA_SEGMENT}")) {
        &stripped[..stripped.len() - ROOT_DATA_SEGMENT.len()]
    } else {
        stripped
    };

    DataPath {
        is_data: true,
        pathname: if logical.is_empty() { "/".to_string() } else { logical.to_string() },
    }
}

/// A `.data` suffix always means a data request; otherwise a leaf without
/// a component bypasses rendering.
pub fn classify(is_data: bool, leaf: Option<&RouteMatch>) -> RequestKind {
    match leaf {
        _ if is_data => RequestKind::Data,
        Some(leaf) if !leaf.route.has_component => RequestKind::Resource,
        _ => RequestKind::Document,
    }
}

/// Route ids named by `?_routes=a,b`, if present.
pub fn routes_filter(url: &Url) -> Option<Vec<String>> {
    url.query_pairs()
        .find(|(key, _)| key == ROUTES_PARAM)
        .map(|(_, value)| {
            value
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect()
        })
}

/// URL seen by loaders and actions: logical path, no `_routes` param.
pub fn logical_url(url: &Url, pathname: &str) -> Url {
    let mut logical = url.clone();
    logical.set_path(pathname);

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != ROUTES_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        logical.set_query(None);
    } else if pairs.len() != url.query_pairs().count() {
        logical.query_pairs_mut().clear().extend_pairs(pairs);
    }
    logical
}
