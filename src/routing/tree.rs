//! Static route tree.
//!
//! # Responsibilities
//! - Hold the immutable route definitions in declaration order
//! - Validate referential integrity (parents exist, ids unique, no cycles)
//! - Precompute each route's parent chain for boundary lookups
//! - Flatten the tree into ranked branches for the matcher
//!
//! # Design Decisions
//! - Built once, shared via Arc; never mutated after construction
//! - Routes without `parent_id` hang off a synthetic root
//! - Branch ranking happens here so matching is a linear scan

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Id conventionally given to the app root route.
pub const ROOT_ROUTE_ID: &str = "root";

/// A single route as declared in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDefinition {
    /// Unique route id.
    pub id: String,

    /// Path pattern relative to the parent (`users`, `:id`, `*`).
    #[serde(default)]
    pub path: Option<String>,

    /// Index routes render at their parent's exact path.
    #[serde(default)]
    pub index: bool,

    /// Parent route id; `None` for top-level routes.
    #[serde(default)]
    pub parent_id: Option<String>,

    /// Match static segments with exact case.
    #[serde(default)]
    pub case_sensitive: bool,

    #[serde(default)]
    pub has_loader: bool,

    #[serde(default)]
    pub has_action: bool,

    #[serde(default)]
    pub has_error_boundary: bool,

    /// Routes without a component are resource routes.
    #[serde(default = "default_has_component")]
    pub has_component: bool,
}

fn default_has_component() -> bool {
    true
}

impl RouteDefinition {
    /// Create a pathless, top-level route with a component and no handlers.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: None,
            index: false,
            parent_id: None,
            case_sensitive: false,
            has_loader: false,
            has_action: false,
            has_error_boundary: false,
            has_component: true,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn index(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    pub fn loader(mut self) -> Self {
        self.has_loader = true;
        self
    }

    pub fn action(mut self) -> Self {
        self.has_action = true;
        self
    }

    pub fn error_boundary(mut self) -> Self {
        self.has_error_boundary = true;
        self
    }

    /// Mark as a resource route (no renderable component).
    pub fn resource(mut self) -> Self {
        self.has_component = false;
        self
    }
}

/// Problems detected while building a [`RouteTree`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteTreeError {
    #[error("duplicate route id `{0}`")]
    DuplicateId(String),

    #[error("route `{route}` references missing parent `{parent}`")]
    MissingParent { route: String, parent: String },

    #[error("index route `{route}` cannot have child route `{child}`")]
    IndexWithChildren { route: String, child: String },

    #[error("index route `{0}` cannot declare a path")]
    IndexWithPath(String),

    #[error("route `{0}` is part of a parent cycle")]
    Cycle(String),

    #[error("route `{0}` uses `*` before the final path segment")]
    SplatNotLast(String),
}

/// A ranked root-to-leaf chain of route indexes.
#[derive(Debug, Clone)]
pub(crate) struct FlatBranch {
    pub routes: Vec<usize>,
    pub score: i32,
}

/// Validated, immutable route tree.
#[derive(Debug)]
pub struct RouteTree {
    routes: Vec<Arc<RouteDefinition>>,
    by_id: HashMap<String, usize>,
    /// Root-first ancestor chain for each route, inclusive of the route.
    chains: Vec<Vec<usize>>,
    /// Nearest route in each chain that declares an error boundary.
    boundaries: Vec<Option<usize>>,
    branches: Vec<FlatBranch>,
}

impl RouteTree {
    /// Validate and freeze a set of route definitions.
    ///
    /// Returns the first problem found; use [`check_routes`] to collect all.
    pub fn new(routes: Vec<RouteDefinition>) -> Result<Self, RouteTreeError> {
        if let Some(err) = check_routes(&routes).into_iter().next() {
            return Err(err);
        }

        let by_id: HashMap<String, usize> = routes
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();

        let chains: Vec<Vec<usize>> = routes
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let mut chain = vec![i];
                let mut cursor = routes[i].parent_id.as_deref();
                while let Some(parent) = cursor {
                    let idx = by_id[parent];
                    chain.push(idx);
                    cursor = routes[idx].parent_id.as_deref();
                }
                chain.reverse();
                chain
            })
            .collect();

        let boundaries = chains
            .iter()
            .map(|chain| chain.iter().rev().copied().find(|&j| routes[j].has_error_boundary))
            .collect();

        let mut tree = Self {
            routes: routes.into_iter().map(Arc::new).collect(),
            by_id,
            chains,
            boundaries,
            branches: Vec::new(),
        };
        tree.branches = tree.flatten();

        tracing::debug!(
            routes = tree.routes.len(),
            branches = tree.branches.len(),
            "Route tree built"
        );
        Ok(tree)
    }

    /// Look up a route by id.
    pub fn get(&self, id: &str) -> Option<&Arc<RouteDefinition>> {
        self.by_id.get(id).map(|&i| &self.routes[i])
    }

    /// All routes in declaration order.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<RouteDefinition>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Ancestor chain of a route, root first, including the route itself.
    pub fn parent_chain(&self, id: &str) -> Vec<&Arc<RouteDefinition>> {
        self.by_id
            .get(id)
            .map(|&i| self.chains[i].iter().map(|&j| &self.routes[j]).collect())
            .unwrap_or_default()
    }

    /// Nearest route at or above `id` that declares an error boundary.
    pub fn boundary_of(&self, id: &str) -> Option<&Arc<RouteDefinition>> {
        let idx = *self.by_id.get(id)?;
        self.boundaries[idx].map(|j| &self.routes[j])
    }

    /// The app root: the first top-level route that is pathless or `/`.
    pub fn root(&self) -> Option<&Arc<RouteDefinition>> {
        self.routes.iter().find(|r| {
            r.parent_id.is_none()
                && !r.index
                && matches!(r.path.as_deref(), None | Some("") | Some("/"))
        })
    }

    /// Id under which errors without an owning boundary are reported.
    pub fn root_id(&self) -> &str {
        self.root().map(|r| r.id.as_str()).unwrap_or(ROOT_ROUTE_ID)
    }

    pub(crate) fn route_at(&self, idx: usize) -> &Arc<RouteDefinition> {
        &self.routes[idx]
    }

    pub(crate) fn branches(&self) -> &[FlatBranch] {
        &self.branches
    }

    fn children_of(&self, parent: Option<&str>) -> impl Iterator<Item = usize> + '_ {
        let parent = parent.map(str::to_owned);
        self.routes
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.parent_id == parent)
            .map(|(i, _)| i)
    }

    fn flatten(&self) -> Vec<FlatBranch> {
        let mut out = Vec::new();
        self.flatten_into(None, &[], "", &mut out);
        // Stable sort keeps declaration order (children before parents) on ties.
        out.sort_by(|a, b| b.score.cmp(&a.score));
        out
    }

    fn flatten_into(
        &self,
        parent: Option<&str>,
        prefix: &[usize],
        prefix_path: &str,
        out: &mut Vec<FlatBranch>,
    ) {
        for idx in self.children_of(parent).collect::<Vec<_>>() {
            let route = &self.routes[idx];
            let path = join_paths(prefix_path, route.path.as_deref().unwrap_or(""));
            let mut chain = prefix.to_vec();
            chain.push(idx);

            self.flatten_into(Some(&route.id), &chain, &path, out);

            // A pathless layout only matches through its children.
            if route.path.is_none() && !route.index {
                continue;
            }
            out.push(FlatBranch {
                score: compute_score(&path, route.index),
                routes: chain,
            });
        }
    }
}

/// Collect every integrity problem in a route list.
pub fn check_routes(routes: &[RouteDefinition]) -> Vec<RouteTreeError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    let by_id: HashMap<&str, &RouteDefinition> =
        routes.iter().map(|r| (r.id.as_str(), r)).collect();

    for route in routes {
        if !seen.insert(route.id.as_str()) {
            errors.push(RouteTreeError::DuplicateId(route.id.clone()));
        }

        if route.index && route.path.as_deref().is_some_and(|p| !p.is_empty()) {
            errors.push(RouteTreeError::IndexWithPath(route.id.clone()));
        }

        if let Some(path) = &route.path {
            let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
            if segments
                .iter()
                .rev()
                .skip(1)
                .any(|s| *s == "*")
            {
                errors.push(RouteTreeError::SplatNotLast(route.id.clone()));
            }
        }

        if let Some(parent_id) = &route.parent_id {
            match by_id.get(parent_id.as_str()) {
                None => errors.push(RouteTreeError::MissingParent {
                    route: route.id.clone(),
                    parent: parent_id.clone(),
                }),
                Some(parent) if parent.index => {
                    errors.push(RouteTreeError::IndexWithChildren {
                        route: parent.id.clone(),
                        child: route.id.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        // Walk up; more steps than routes means a loop.
        let mut cursor = route.parent_id.as_deref();
        let mut steps = 0;
        while let Some(parent) = cursor {
            steps += 1;
            if steps > routes.len() {
                errors.push(RouteTreeError::Cycle(route.id.clone()));
                break;
            }
            cursor = by_id.get(parent).and_then(|p| p.parent_id.as_deref());
        }
    }

    errors
}

fn join_paths(prefix: &str, path: &str) -> String {
    let joined = format!("{}/{}", prefix.trim_end_matches('/'), path.trim_start_matches('/'));
    let trimmed = joined.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

const STATIC_SEGMENT: i32 = 10;
const DYNAMIC_SEGMENT: i32 = 3;
const EMPTY_SEGMENT: i32 = 1;
const INDEX_ROUTE: i32 = 2;
const SPLAT_PENALTY: i32 = -2;

/// Specificity score: static > dynamic > splat, deeper paths score higher.
pub(crate) fn compute_score(path: &str, index: bool) -> i32 {
    let segments: Vec<&str> = path.split('/').collect();
    let mut score = segments.len() as i32;
    if segments.iter().any(|s| *s == "*") {
        score += SPLAT_PENALTY;
    }
    if index {
        score += INDEX_ROUTE;
    }

    segments
        .iter()
        .filter(|s| **s != "*")
        .fold(score, |acc, segment| {
            acc + if is_param(segment) {
                DYNAMIC_SEGMENT
            } else if segment.is_empty() {
                EMPTY_SEGMENT
            } else {
                STATIC_SEGMENT
            }
        })
}

pub(crate) fn is_param(segment: &str) -> bool {
    segment
        .strip_prefix(':')
        .is_some_and(|name| !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-'))
}
