//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming pathname
//!     → normalize.rs (collapse `//`, `\\`; signal 308 if changed)
//!     → matcher.rs (strip basename, walk ranked branches)
//!     → Return: Branch (root → leaf) or NoMatch
//!
//! Route Compilation (at startup / reload):
//!     RouteDefinition[]
//!     → tree.rs (validate, precompute parent chains)
//!     → Flatten and rank branches by specificity
//!     → Freeze as immutable RouteTree
//! ```
//!
//! # Design Decisions
//! - Routes compiled once, immutable at runtime
//! - No regex in the hot path
//! - Deterministic: same input always matches same branch

pub mod matcher;
pub mod normalize;
pub mod tree;

pub use matcher::{match_routes, Branch, Params, RouteMatch};
pub use tree::{RouteDefinition, RouteTree, RouteTreeError, ROOT_ROUTE_ID};
