//! Route matching logic.
//!
//! # Responsibilities
//! - Strip the basename from the request pathname
//! - Walk the ranked branches and return the first that consumes the whole path
//! - Collect dynamic and splat params for the matched branch
//!
//! # Design Decisions
//! - Static segments compare case-insensitively unless the route opts out
//! - Trailing slashes are ignored (`/users/` matches `/users`)
//! - First match wins; ranking is precomputed by the tree

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::routing::tree::{is_param, FlatBranch, RouteDefinition, RouteTree};

/// Params extracted from a matched branch.
pub type Params = BTreeMap<String, String>;

/// One route in a matched branch.
#[derive(Debug, Clone, Serialize)]
pub struct RouteMatch {
    pub route: Arc<RouteDefinition>,
    pub params: Params,
    /// Portion of the pathname consumed up to and including this route.
    pub pathname: String,
}

impl RouteMatch {
    pub fn id(&self) -> &str {
        &self.route.id
    }
}

/// Root-to-leaf sequence of matches.
pub type Branch = Vec<RouteMatch>;

/// Match a pathname against the tree, honoring an optional basename.
///
/// Returns `None` when nothing matches or the path lies outside the basename.
pub fn match_routes(tree: &RouteTree, pathname: &str, basename: Option<&str>) -> Option<Branch> {
    let pathname = match basename {
        Some(base) => strip_basename(pathname, base)?,
        None => pathname,
    };

    let segments: Vec<&str> = pathname.split('/').filter(|s| !s.is_empty()).collect();

    tree.branches()
        .iter()
        .find_map(|branch| match_branch(tree, branch, &segments))
}

/// Build the branch used when nothing matched: just the app root.
pub fn root_branch(tree: &RouteTree) -> Branch {
    tree.root()
        .map(|root| {
            vec![RouteMatch {
                route: root.clone(),
                params: Params::new(),
                pathname: "/".to_string(),
            }]
        })
        .unwrap_or_default()
}

fn match_branch(tree: &RouteTree, branch: &FlatBranch, segments: &[&str]) -> Option<Branch> {
    let mut consumed = 0;
    let mut params = Params::new();
    let mut pathnames = Vec::with_capacity(branch.routes.len());
    let last = branch.routes.len() - 1;

    for (pos, &idx) in branch.routes.iter().enumerate() {
        let route = tree.route_at(idx);
        let pattern = route.path.as_deref().unwrap_or("");

        for part in pattern.split('/').filter(|s| !s.is_empty()) {
            if part == "*" {
                params.insert("*".to_string(), segments[consumed..].join("/"));
                consumed = segments.len();
                break;
            }

            let segment = segments.get(consumed)?;
            if is_param(part) {
                params.insert(part[1..].to_string(), (*segment).to_string());
            } else if !segment_eq(part, segment, route.case_sensitive) {
                return None;
            }
            consumed += 1;
        }

        if pos == last && consumed != segments.len() {
            return None;
        }
        pathnames.push(format!("/{}", segments[..consumed].join("/")));
    }

    Some(
        branch
            .routes
            .iter()
            .zip(pathnames)
            .map(|(&idx, pathname)| RouteMatch {
                route: tree.route_at(idx).clone(),
                params: params.clone(),
                pathname,
            })
            .collect(),
    )
}

fn segment_eq(pattern: &str, segment: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        pattern == segment
    } else {
        pattern.eq_ignore_ascii_case(segment)
    }
}

fn strip_basename<'a>(pathname: &'a str, basename: &str) -> Option<&'a str> {
    let base = basename.trim_end_matches('/');
    if base.is_empty() {
        return Some(pathname);
    }

    let head = pathname.get(..base.len())?;
    if !head.eq_ignore_ascii_case(base) {
        return None;
    }

    let rest = &pathname[base.len()..];
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> RouteTree {
        RouteTree::new(vec![
            RouteDefinition::new("root").path(""),
            RouteDefinition::new("index").parent("root").index(),
            RouteDefinition::new("users").parent("root").path("users"),
            RouteDefinition::new("users.index").parent("users").index(),
            RouteDefinition::new("users.new").parent("users").path("new"),
            RouteDefinition::new("users.$id").parent("users").path(":id"),
            RouteDefinition::new("files").parent("root").path("files/*"),
            RouteDefinition::new("About").parent("root").path("About").case_sensitive(),
            RouteDefinition::new("layout").parent("root"),
            RouteDefinition::new("settings").parent("layout").path("settings"),
        ])
        .unwrap()
    }

    fn ids(branch: &Branch) -> Vec<&str> {
        branch.iter().map(|m| m.id()).collect()
    }

    #[test]
    fn test_index_beats_layout() {
        let tree = tree();
        let branch = match_routes(&tree, "/", None).unwrap();
        assert_eq!(ids(&branch), vec!["root", "index"]);

        let branch = match_routes(&tree, "/users", None).unwrap();
        assert_eq!(ids(&branch), vec!["root", "users", "users.index"]);
    }

    #[test]
    fn test_static_beats_dynamic() {
        let tree = tree();
        let branch = match_routes(&tree, "/users/new", None).unwrap();
        assert_eq!(ids(&branch), vec!["root", "users", "users.new"]);

        let branch = match_routes(&tree, "/users/42", None).unwrap();
        assert_eq!(ids(&branch), vec!["root", "users", "users.$id"]);
        assert_eq!(branch[2].params.get("id").map(String::as_str), Some("42"));
        assert_eq!(branch[0].params.get("id").map(String::as_str), Some("42"));
        assert_eq!(branch[1].pathname, "/users");
        assert_eq!(branch[2].pathname, "/users/42");
    }

    #[test]
    fn test_splat_captures_rest() {
        let tree = tree();
        let branch = match_routes(&tree, "/files/a/b/c.txt", None).unwrap();
        assert_eq!(ids(&branch), vec!["root", "files"]);
        assert_eq!(branch[1].params.get("*").map(String::as_str), Some("a/b/c.txt"));
    }

    #[test]
    fn test_pathless_layout() {
        let tree = tree();
        let branch = match_routes(&tree, "/settings", None).unwrap();
        assert_eq!(ids(&branch), vec!["root", "layout", "settings"]);
    }

    #[test]
    fn test_pathless_layout_never_matches_alone() {
        let tree = RouteTree::new(vec![
            RouteDefinition::new("root").path(""),
            RouteDefinition::new("layout").parent("root").loader(),
            RouteDefinition::new("settings").parent("layout").path("settings"),
        ])
        .unwrap();

        let branch = match_routes(&tree, "/", None).unwrap();
        assert_eq!(ids(&branch), vec!["root"]);

        let branch = match_routes(&tree, "/settings", None).unwrap();
        assert_eq!(ids(&branch), vec!["root", "layout", "settings"]);
    }

    #[test]
    fn test_case_sensitivity() {
        let tree = tree();
        assert!(match_routes(&tree, "/About", None).is_some());
        assert!(match_routes(&tree, "/about", None).is_none());
        assert!(match_routes(&tree, "/USERS/new", None).is_some());
    }

    #[test]
    fn test_trailing_slash_matches() {
        let tree = tree();
        let branch = match_routes(&tree, "/users/new/", None).unwrap();
        assert_eq!(ids(&branch), vec!["root", "users", "users.new"]);
    }

    #[test]
    fn test_no_match() {
        let tree = tree();
        assert!(match_routes(&tree, "/nope/nope", None).is_none());
        assert_eq!(ids(&root_branch(&tree)), vec!["root"]);
    }

    #[test]
    fn test_basename() {
        let tree = tree();
        let branch = match_routes(&tree, "/app/users/new", Some("/app")).unwrap();
        assert_eq!(ids(&branch), vec!["root", "users", "users.new"]);
        assert!(match_routes(&tree, "/APP", Some("/app/")).is_some());
        assert!(match_routes(&tree, "/application", Some("/app")).is_none());
        assert!(match_routes(&tree, "/users", Some("/app")).is_none());
    }
}
