use std::sync::Arc;

use super::core::ParamVec;
use crate::error::DispatchError;

/// Name under which a trailing wildcard stores the remainder of the path
pub const SPLAT_PARAM: &str = "splat";

/// One compiled segment of a path pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the request segment byte-for-byte
    Literal(String),
    /// Captures any single non-empty segment under the given name
    Param(Arc<str>),
    /// Captures everything that remains; only valid as the last segment
    Wildcard,
}

/// A path template split into segments at registration time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

/// Non-empty segments of a pattern
fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl PathPattern {
    /// Compile a pattern such as `/users/:id/posts/{post_id}` or `/static/*`
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Configuration` if a capture has no name or a
    /// wildcard is followed by further segments.
    pub fn compile(raw: &str) -> Result<Self, DispatchError> {
        let parts: Vec<&str> = split_path(raw).collect();
        let mut segments = Vec::with_capacity(parts.len());

        for (idx, part) in parts.iter().enumerate() {
            let segment = if *part == "*" {
                if idx + 1 != parts.len() {
                    return Err(DispatchError::configuration(format!(
                        "wildcard must be the last segment in pattern '{raw}'"
                    )));
                }
                Segment::Wildcard
            } else if let Some(name) = part.strip_prefix(':') {
                Segment::Param(Self::param_name(raw, name)?)
            } else if part.starts_with('{') && part.ends_with('}') {
                let name = part.trim_start_matches('{').trim_end_matches('}');
                Segment::Param(Self::param_name(raw, name)?)
            } else {
                Segment::Literal((*part).to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    fn param_name(raw: &str, name: &str) -> Result<Arc<str>, DispatchError> {
        if name.is_empty() {
            return Err(DispatchError::configuration(format!(
                "empty parameter name in pattern '{raw}'"
            )));
        }
        Ok(Arc::from(name))
    }

    /// The pattern text as registered
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Match a request path (without query string) against this pattern,
    /// returning the captured parameters on success.
    ///
    /// Request segments are taken as-is, so `/users//42` has an empty
    /// segment that no capture accepts. A wildcard needs the slash before it
    /// (`/files/*` matches `/files/` but not `/files`). One trailing slash is
    /// tolerated elsewhere.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<ParamVec> {
        let mut params = ParamVec::new();
        let mut parts = path.strip_prefix('/').unwrap_or(path).split('/');

        for segment in &self.segments {
            match segment {
                Segment::Wildcard => {
                    let rest: Vec<String> = parts.by_ref().map(decode).collect();
                    if rest.is_empty() {
                        return None;
                    }
                    params.push((Arc::from(SPLAT_PARAM), rest.join("/")));
                    return Some(params);
                }
                Segment::Literal(lit) => {
                    if parts.next()? != lit {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.next().filter(|v| !v.is_empty())?;
                    params.push((Arc::clone(name), decode(value)));
                }
            }
        }

        // Anything past a single trailing slash means the pattern is a strict prefix
        match (parts.next(), parts.next()) {
            (None, _) | (Some(""), None) => Some(params),
            _ => None,
        }
    }
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}
