//! Error-boundary resolution.
//!
//! # Design Decisions
//! - An error belongs to the nearest route at or above the thrower that
//!   declares a boundary; index 0 (the app root) is the implicit fallback
//! - With several failures the shallowest owning boundary wins, and the
//!   deepest thrower under it supplies the error
//! - Routes at or below the winning boundary lose their data

use crate::handler::outcome::ErrorValue;
use crate::routing::{RouteMatch, RouteTree};

/// A failure at branch position `index`.
#[derive(Debug, Clone)]
pub struct Failure {
    pub index: usize,
    pub error: ErrorValue,
}

/// The boundary chosen to render an error.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryError {
    pub index: usize,
    pub route_id: String,
    pub error: ErrorValue,
}

/// Branch position of the nearest boundary at or above `index`.
///
/// Uses the tree's precomputed ancestor chains; falls back to position 0.
pub fn find_boundary(tree: &RouteTree, branch: &[RouteMatch], index: usize) -> usize {
    branch
        .get(index)
        .and_then(|m| tree.boundary_of(m.id()))
        .and_then(|owner| branch.iter().position(|m| m.id() == owner.id))
        .unwrap_or(0)
}

/// Pick the single boundary and error for a set of failures.
pub fn resolve(tree: &RouteTree, branch: &[RouteMatch], failures: Vec<Failure>) -> Option<BoundaryError> {
    let boundary = failures
        .iter()
        .map(|f| find_boundary(tree, branch, f.index))
        .min()?;

    let winner = failures
        .into_iter()
        .filter(|f| find_boundary(tree, branch, f.index) == boundary)
        .max_by_key(|f| f.index)?;

    Some(BoundaryError {
        index: boundary,
        route_id: branch
            .get(boundary)
            .map(|m| m.id().to_string())
            .unwrap_or_else(|| tree.root_id().to_string()),
        error: winner.error,
    })
}
