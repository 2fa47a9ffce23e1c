//! Route table core - read-only after setup, shared by all requests.

use http::Method;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::pattern::PathPattern;
use crate::error::DispatchError;

/// Maximum number of captured params before heap allocation.
/// Most routes have ≤4 captures (e.g. /users/:id/posts/:post_id).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the match path.
///
/// Param names are `Arc<str>` taken from the compiled pattern, so a match
/// clones a pointer rather than the name.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Methods that can carry routes. Anything else is rejected at registration.
pub const SUPPORTED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
];

/// A registered route: method, compiled pattern and the opaque target
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub method: Method,
    pub pattern: PathPattern,
    /// `group.action` string; the table never interprets it
    pub target: Arc<str>,
}

/// Result of matching a request against the table
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub target: Arc<str>,
    /// Pattern that produced the match, for logging
    pub pattern: String,
    pub params: ParamVec,
}

impl RouteMatch {
    /// Get a captured parameter by name
    ///
    /// Uses "last write wins" semantics if a pattern repeats a name.
    #[inline]
    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Note: This allocates - use get_param() on the request path instead
    #[must_use]
    pub fn params_map(&self) -> HashMap<String, String> {
        self.params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// Per-method route lists, matched in registration order
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<Method, Vec<RouteEntry>>,
}

/// Parse a method name the way route files spell it (`get`, `POST`, ...)
///
/// # Errors
///
/// Returns `DispatchError::Configuration` for methods outside [`SUPPORTED_METHODS`].
pub fn parse_method(method: &str) -> Result<Method, DispatchError> {
    let upper = method.trim().to_ascii_uppercase();
    SUPPORTED_METHODS
        .iter()
        .find(|m| m.as_str() == upper)
        .cloned()
        .ok_or_else(|| {
            DispatchError::configuration(format!("Invalid HTTP method / missing router: '{method}'"))
        })
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        let routes = SUPPORTED_METHODS
            .iter()
            .map(|m| (m.clone(), Vec::new()))
            .collect();
        Self { routes }
    }

    /// Bind `pattern` under `method` to `target`
    ///
    /// # Errors
    ///
    /// `DispatchError::Configuration` if the method is unsupported or the
    /// pattern does not compile.
    pub fn register(&mut self, method: &str, pattern: &str, target: &str) -> Result<(), DispatchError> {
        let method = parse_method(method)?;
        let pattern = PathPattern::compile(pattern)?;

        debug!(
            method = %method,
            pattern = %pattern.as_str(),
            target = %target,
            "Route registered"
        );

        self.routes.entry(method.clone()).or_default().push(RouteEntry {
            method,
            pattern,
            target: Arc::from(target),
        });
        Ok(())
    }

    /// Resolve a request path. Returns the first match in registration order.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let path = path.split('?').next().unwrap_or("/");
        let entries = self.routes.get(method)?;

        entries.iter().find_map(|entry| {
            entry.pattern.matches(path).map(|params| RouteMatch {
                target: Arc::clone(&entry.target),
                pattern: entry.pattern.as_str().to_string(),
                params,
            })
        })
    }

    /// Number of routes registered across all methods
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries for one method, in registration order
    #[must_use]
    pub fn entries(&self, method: &Method) -> &[RouteEntry] {
        self.routes.get(method).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Log the loaded table once at startup
    pub fn log_summary(&self) {
        let summary: Vec<String> = SUPPORTED_METHODS
            .iter()
            .flat_map(|m| {
                self.entries(m)
                    .iter()
                    .map(move |e| format!("{} {} -> {}", m, e.pattern.as_str(), e.target))
            })
            .take(10)
            .collect();
        info!(
            routes_count = self.len(),
            routes_summary = ?summary,
            "Routing table loaded"
        );
    }
}
