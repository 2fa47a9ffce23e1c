//! # Router Module
//!
//! The router module holds the route table: per-method lists of path patterns
//! bound to opaque `group.action` targets. It is built once during setup and
//! read concurrently by every request afterwards.
//!
//! ## Pattern Syntax
//!
//! Patterns are split on `/` into segments. A segment is one of:
//!
//! - a literal (`users`) that must match exactly
//! - a named capture (`:id` or `{id}`) that matches any single segment
//! - a trailing wildcard (`*`) that matches the rest of the path, captured as `splat`
//!
//! ## Matching
//!
//! Matching is a linear scan in registration order; the first pattern whose
//! segments all match wins. Register specific routes before generic ones:
//!
//! ```rust
//! use brrtmvc::router::RouteTable;
//! use http::Method;
//!
//! let mut table = RouteTable::new();
//! table.register("get", "/users/me", "users.me").unwrap();
//! table.register("get", "/users/:id", "users.show").unwrap();
//!
//! let m = table.route(&Method::GET, "/users/42").unwrap();
//! assert_eq!(m.target.as_ref(), "users.show");
//! assert_eq!(m.get_param("id"), Some("42"));
//! ```
//!
//! ## Loading
//!
//! [`load_routes`] reads a YAML or JSON document keyed by method:
//!
//! ```yaml
//! get:
//!   /: home.index
//!   /posts/:slug: posts.show
//! post:
//!   /posts: posts.create
//! ```

mod core;
mod load;
mod pattern;

pub use core::{
    parse_method, ParamVec, RouteEntry, RouteMatch, RouteTable, MAX_INLINE_PARAMS, SUPPORTED_METHODS,
};
pub use load::{load_routes, RouteSource};
pub use pattern::{PathPattern, Segment};
