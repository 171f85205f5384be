//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route registration (at startup):
//!     "/static/*"  → pattern.rs (parse into segments + trailing capture)
//!     → router.rs (insert into segment-keyed trie, reject duplicates)
//!     → Freeze behind Arc for concurrent lookup
//!
//! Incoming request (method, path):
//!     → router.rs (trie walk, literal child preferred over wildcard)
//!     → Return: matched responder + captured remainder, or NotFound
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Lookup cost is O(path depth), independent of route count
//! - Literal segment beats wildcard at every depth
//! - Duplicate (pattern, method) registration fails at setup, not at
//!   request time

pub mod pattern;
pub mod router;

pub use pattern::{PatternError, RoutePattern};
pub use router::{MethodFilter, RouteLookup, Router, RouterError};
