//! # Error Taxonomy
//!
//! Every failure in the request pipeline is a [`DispatchError`]. Configuration
//! errors are raised while the route table, task graph or template set are
//! being built and should abort startup. The remaining kinds are per-request
//! and are caught exactly once by the dispatcher's error boundary, which turns
//! them into an [`ErrorPayload`] response.
//!
//! | Variant         | Raised by                                  | Status          |
//! |-----------------|--------------------------------------------|-----------------|
//! | `Configuration` | route/task/template registration           | 500             |
//! | `NotFound`      | route, handler group or action lookup      | 404             |
//! | `Render`        | missing template, malformed view tree      | 500             |
//! | `Handler`       | task or action failure, panics             | declared or 500 |

use serde::Serialize;
use thiserror::Error;

/// Result alias for the request pipeline
pub type DispatchResult<T> = Result<T, DispatchError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Bad route, task graph or template set. Detected eagerly.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No route, handler group or action matched the request
    #[error("not found: {0}")]
    NotFound(String),

    /// A template could not be resolved or the view tree is malformed
    #[error("render error: {0}")]
    Render(String),

    /// A pre-request task or handler action failed
    #[error("{message}")]
    Handler {
        message: String,
        /// Explicit status code declared by the failing code
        status: Option<u16>,
        /// Captured backtrace or panic location
        trace: Option<String>,
    },
}

impl DispatchError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Handler failure that maps to a 500 response
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler {
            message: msg.into(),
            status: None,
            trace: None,
        }
    }

    /// Handler failure carrying its own status code (e.g. 403 from an auth task)
    pub fn with_status(status: u16, msg: impl Into<String>) -> Self {
        Self::Handler {
            message: msg.into(),
            status: Some(status),
            trace: None,
        }
    }

    /// Convert a caught panic into a handler error, keeping the backtrace
    pub(crate) fn from_panic(origin: &str, panic: &(dyn std::any::Any + Send)) -> Self {
        let detail = panic
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::Handler {
            message: format!("{origin} panicked: {detail}"),
            status: None,
            trace: Some(std::backtrace::Backtrace::capture().to_string()),
        }
    }

    /// HTTP-equivalent status code for this error
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Handler {
                status: Some(code), ..
            } => *code,
            _ => 500,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Trace text for the error payload, if any was captured
    #[must_use]
    pub fn trace(&self) -> Option<&str> {
        match self {
            Self::Handler { trace, .. } => trace.as_deref(),
            _ => None,
        }
    }
}

/// Structured body sent for every error response
///
/// Written directly in JSON mode, or handed to the `<status>` / `error`
/// template as its data in HTML mode.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorPayload {
    pub code: u16,
    pub message: String,
    pub stack: Option<String>,
    pub url: String,
}

impl ErrorPayload {
    #[must_use]
    pub fn from_error(err: &DispatchError, url: &str) -> Self {
        Self {
            code: err.status(),
            message: err.to_string(),
            stack: err.trace().map(str::to_string),
            url: url.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(DispatchError::not_found("x").status(), 404);
        assert_eq!(DispatchError::handler("x").status(), 500);
        assert_eq!(DispatchError::with_status(418, "teapot").status(), 418);
        assert_eq!(DispatchError::render("x").status(), 500);
        assert_eq!(DispatchError::configuration("x").status(), 500);
    }

    #[test]
    fn test_panic_payload_is_captured() {
        let err = DispatchError::from_panic("action", &"boom");
        assert_eq!(err.to_string(), "action panicked: boom");
        assert!(err.trace().is_some());
    }

    #[test]
    fn test_payload_shape() {
        let err = DispatchError::not_found("no route for GET /nope");
        let payload = ErrorPayload::from_error(&err, "/nope?x=1");
        let v = serde_json::to_value(&payload).unwrap();
        assert_eq!(v["code"], 404);
        assert_eq!(v["url"], "/nope?x=1");
        assert!(v["stack"].is_null());
    }
}
