//! Route registration and trie-based lookup.
//!
//! # Responsibilities
//! - Store compiled routes in a segment-keyed trie
//! - Look up (method, path), preferring literal segments over wildcards
//! - Return the matched responder plus any captured remainder, or an
//!   explicit NotFound
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Method matching is case-sensitive against parsed `Method` tokens;
//!   the Any sentinel matches every method
//! - A literal walk that dead-ends falls back to the nearest wildcard on
//!   the walked path, so the longest literal prefix wins

use std::collections::HashMap;
use std::sync::Arc;

use hyper::Method;
use thiserror::Error;

use crate::pipeline::Responder;
use crate::routing::pattern::{PatternError, RoutePattern};

/// Which methods a route accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    /// Sentinel: the route matches regardless of method.
    Any,
    /// The route matches exactly these method tokens.
    Only(Vec<Method>),
}

impl MethodFilter {
    /// Convenience constructor for a single method.
    pub fn only(method: Method) -> Self {
        MethodFilter::Only(vec![method])
    }
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: PatternError,
    },
    #[error("duplicate route: {method} {pattern}")]
    DuplicateRoute { pattern: String, method: String },
    #[error("route {pattern:?} registered with an empty method list")]
    EmptyMethods { pattern: String },
}

/// Result of a route lookup.
pub enum RouteLookup {
    Matched {
        responder: Arc<dyn Responder>,
        /// `(capture name, remainder)` when the matched pattern ends in a
        /// wildcard segment.
        capture: Option<(String, String)>,
    },
    NotFound,
}

/// Responders registered at one trie position, keyed by method.
#[derive(Default)]
struct MethodTable {
    exact: HashMap<Method, Arc<dyn Responder>>,
    any: Option<Arc<dyn Responder>>,
}

impl MethodTable {
    fn get(&self, method: &Method) -> Option<&Arc<dyn Responder>> {
        self.exact.get(method).or(self.any.as_ref())
    }

    fn insert(
        &mut self,
        filter: &MethodFilter,
        responder: Arc<dyn Responder>,
        pattern: &str,
    ) -> Result<(), RouterError> {
        match filter {
            MethodFilter::Any => {
                if self.any.is_some() {
                    return Err(RouterError::DuplicateRoute {
                        pattern: pattern.to_string(),
                        method: "ANY".to_string(),
                    });
                }
                self.any = Some(responder);
            }
            MethodFilter::Only(methods) => {
                if methods.is_empty() {
                    return Err(RouterError::EmptyMethods {
                        pattern: pattern.to_string(),
                    });
                }
                for method in methods {
                    if self.exact.contains_key(method) {
                        return Err(RouterError::DuplicateRoute {
                            pattern: pattern.to_string(),
                            method: method.to_string(),
                        });
                    }
                    self.exact.insert(method.clone(), responder.clone());
                }
            }
        }
        Ok(())
    }
}

/// A trailing wildcard edge. Always terminal: wildcards only appear in
/// last position.
struct WildcardEdge {
    name: String,
    routes: MethodTable,
}

#[derive(Default)]
struct Node {
    literal: HashMap<String, Node>,
    wildcard: Option<Box<WildcardEdge>>,
    routes: MethodTable,
}

/// Segment-keyed route trie. Registration happens before serving begins;
/// lookups are read-only and safe to run concurrently behind an `Arc`.
#[derive(Default)]
pub struct Router {
    root: Node,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. Registering two routes with an identical
    /// (pattern, method) pair is a setup error.
    pub fn add_route(
        &mut self,
        pattern: &str,
        methods: MethodFilter,
        responder: Arc<dyn Responder>,
    ) -> Result<(), RouterError> {
        let parsed = RoutePattern::parse(pattern).map_err(|source| RouterError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let mut node = &mut self.root;
        for segment in parsed.literals() {
            node = node.literal.entry(segment.clone()).or_default();
        }

        match parsed.capture() {
            Some(name) => {
                let edge = node.wildcard.get_or_insert_with(|| {
                    Box::new(WildcardEdge {
                        name: name.to_string(),
                        routes: MethodTable::default(),
                    })
                });
                edge.routes.insert(&methods, responder, pattern)
            }
            None => node.routes.insert(&methods, responder, pattern),
        }
    }

    /// Look up the responder for (method, path).
    ///
    /// The path is split on `/` (empty segments collapse); the trie walk
    /// prefers literal children, falling back to the deepest wildcard edge
    /// passed on the way down. A wildcard only matches a non-empty
    /// remainder, so `/static` does not match `/static/*`.
    pub fn lookup(&self, method: &Method, path: &str) -> RouteLookup {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match Self::find(&self.root, method, &segments) {
            Some((responder, capture)) => RouteLookup::Matched {
                responder: responder.clone(),
                capture,
            },
            None => RouteLookup::NotFound,
        }
    }

    fn find<'a>(
        node: &'a Node,
        method: &Method,
        segments: &[&str],
    ) -> Option<(&'a Arc<dyn Responder>, Option<(String, String)>)> {
        match segments.split_first() {
            None => node.routes.get(method).map(|r| (r, None)),
            Some((head, rest)) => {
                if let Some(child) = node.literal.get(*head) {
                    if let Some(hit) = Self::find(child, method, rest) {
                        return Some(hit);
                    }
                }
                let edge = node.wildcard.as_ref()?;
                let responder = edge.routes.get(method)?;
                Some((
                    responder,
                    Some((edge.name.clone(), segments.join("/"))),
                ))
            }
        }
    }
}
