use http::Method;
use std::collections::HashMap;
use tracing::debug;

/// Raw request metadata supplied by the transport layer
///
/// The core never reads sockets; adapters build one of these per request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Request target including query string (e.g. `/posts?json=true`)
    pub url: String,
    /// HTTP headers (lowercase keys)
    pub headers: HashMap<String, String>,
}

impl Request {
    /// Build a request, lowercasing header names
    #[must_use]
    pub fn new<I, K, V>(method: Method, url: impl Into<String>, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            method,
            url: url.into(),
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
                .collect(),
        }
    }

    /// Shorthand for a header-less GET
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url, std::iter::empty::<(&str, String)>())
    }

    /// Add or replace a header
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Path portion of the url
    #[must_use]
    pub fn path(&self) -> &str {
        self.url.split('?').next().unwrap_or("/")
    }

    /// Get a header by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Parse the `cookie` header. A missing header yields an empty map.
#[must_use]
pub fn parse_cookies(headers: &HashMap<String, String>) -> HashMap<String, String> {
    let cookies: HashMap<String, String> = headers
        .get("cookie")
        .map(|c| {
            c.split(';')
                .filter_map(|pair| {
                    let mut parts = pair.trim().splitn(2, '=');
                    let name = parts.next()?.trim();
                    if name.is_empty() {
                        return None;
                    }
                    let value = parts.next().unwrap_or("").trim();
                    let value = urlencoding::decode(value)
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| value.to_string());
                    Some((name.to_string(), value))
                })
                .collect()
        })
        .unwrap_or_default();

    debug!(
        cookie_count = cookies.len(),
        cookie_names = ?cookies.keys().collect::<Vec<_>>(),
        "Cookies extracted"
    );
    cookies
}

/// Parse query string parameters from a url
///
/// Extracts everything after the `?` character and URL-decodes parameter names and values.
#[must_use]
pub fn parse_query_params(url: &str) -> HashMap<String, String> {
    if let Some(pos) = url.find('?') {
        let query_str = &url[pos + 1..];
        url::form_urlencoded::parse(query_str.as_bytes())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    } else {
        HashMap::new()
    }
}
