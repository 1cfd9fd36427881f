//! Snapshot handed to the document renderer.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::handler::outcome::ErrorValue;
use crate::routing::RouteMatch;

/// Everything the renderer needs to hydrate a matched branch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticHandlerContext {
    pub url: String,
    pub basename: Option<String>,
    pub matches: Vec<RouteMatch>,
    pub loader_data: BTreeMap<String, Value>,
    pub action_data: Option<BTreeMap<String, Value>>,
    pub errors: Option<BTreeMap<String, ErrorValue>>,
    pub status_code: u16,
}

impl StaticHandlerContext {
    pub fn error_for(&self, route_id: &str) -> Option<&ErrorValue> {
        self.errors.as_ref()?.get(route_id)
    }
}
