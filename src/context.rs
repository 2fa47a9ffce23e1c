//! # Request Context
//!
//! Per-request state. A [`RequestContext`] is created by the dispatcher when a
//! request arrives and dropped when the response is finished; nothing in it is
//! shared with other requests.
//!
//! The immutable part ([`RequestInfo`]) sits behind an `Arc` so pre-request
//! tasks and asynchronous handlers running on other coroutines can read it
//! without copying.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use http::Method;
use tracing::debug;

use crate::profiler::Profiler;
use crate::router::ParamVec;
use crate::server::{parse_cookies, parse_query_params, Request};

/// Request identifier backed by ULID, serialized as its string form
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(ulid::Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Reuse an upstream `x-request-id` when it is a valid ULID
    #[must_use]
    pub fn from_header_or_new(header_value: Option<&str>) -> Self {
        header_value
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::Ulid::from_string(s).map(Self)
    }
}

/// How a request asks for JSON instead of HTML
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContentNegotiation {
    /// Header that marks an AJAX request (lowercase)
    pub header: String,
    /// Value the header must carry (compared case-insensitively)
    pub header_value: String,
    /// Query parameter that forces JSON output
    pub query_flag: String,
}

impl Default for ContentNegotiation {
    fn default() -> Self {
        Self {
            header: "x-requested-with".to_string(),
            header_value: "XMLHttpRequest".to_string(),
            query_flag: "json".to_string(),
        }
    }
}

impl ContentNegotiation {
    /// JSON is preferred if the marker header is present or the query flag is
    /// set to anything but `false`/`0`
    #[must_use]
    pub fn prefers_json(&self, headers: &HashMap<String, String>, query: &HashMap<String, String>) -> bool {
        let by_header = headers
            .get(&self.header.to_ascii_lowercase())
            .is_some_and(|v| v.eq_ignore_ascii_case(&self.header_value));
        let by_query = query
            .get(&self.query_flag)
            .is_some_and(|v| !matches!(v.as_str(), "false" | "0"));
        by_header || by_query
    }
}

/// Immutable request data, shared read-only with tasks and async handlers
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub request_id: RequestId,
    pub method: Method,
    /// Path without query string
    pub path: String,
    /// Original request target including query string
    pub url: String,
    /// Lowercased header names
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub query: HashMap<String, String>,
    /// JSON output requested (AJAX header or query flag)
    pub ajax: bool,
}

impl RequestInfo {
    /// Parse the ambient data of a transport request: cookies, query string,
    /// output mode and request id
    #[must_use]
    pub fn from_request(req: &Request, negotiation: &ContentNegotiation) -> Self {
        let cookies = parse_cookies(&req.headers);
        let query = parse_query_params(&req.url);
        let ajax = negotiation.prefers_json(&req.headers, &query);
        let request_id = RequestId::from_header_or_new(req.header("x-request-id"));

        debug!(
            request_id = %request_id,
            method = %req.method,
            url = %req.url,
            ajax = ajax,
            "Request parsed"
        );

        Self {
            request_id,
            method: req.method.clone(),
            path: req.path().to_string(),
            url: req.url.clone(),
            headers: req.headers.clone(),
            cookies,
            query,
            ajax,
        }
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

/// Mutable state owned by exactly one request
#[derive(Debug)]
pub struct RequestContext {
    pub info: Arc<RequestInfo>,
    /// Route captures; empty until routing succeeds
    pub params: ParamVec,
    /// Request data bag, filled by pre-request tasks (keyed by task name)
    pub data: Map<String, Value>,
    /// Response data bag, filled by handlers
    pub locals: Map<String, Value>,
    pub profiler: Profiler,
}

impl RequestContext {
    #[must_use]
    pub fn new(info: RequestInfo, profiler: Profiler) -> Self {
        Self {
            info: Arc::new(info),
            params: ParamVec::new(),
            data: Map::new(),
            locals: Map::new(),
            profiler,
        }
    }

    #[must_use]
    pub fn is_ajax(&self) -> bool {
        self.info.ajax
    }

    /// Get a route parameter by name (last write wins)
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set a key in the response data bag
    pub fn set_local(&mut self, key: impl Into<String>, value: Value) {
        self.locals.insert(key.into(), value);
    }
}
