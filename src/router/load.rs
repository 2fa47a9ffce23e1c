use anyhow::{Context, Result};
use serde_yaml::Value;
use std::path::Path;
use tracing::info;

use super::core::{parse_method, RouteTable};
use crate::error::DispatchError;

/// Ordered batch of `(method, [(pattern, target)])` triples
///
/// Document order is kept because match precedence follows registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSource {
    pub methods: Vec<(String, Vec<(String, String)>)>,
}

impl RouteSource {
    /// Parse a YAML or JSON route document (JSON is valid YAML)
    ///
    /// # Errors
    ///
    /// Fails if the document is not a mapping of methods to mappings of
    /// pattern strings to target strings.
    pub fn parse(content: &str) -> Result<Self> {
        let doc: Value = serde_yaml::from_str(content).context("route document is not valid YAML/JSON")?;
        let top = doc
            .as_mapping()
            .ok_or_else(|| anyhow::anyhow!("route document must be a mapping keyed by HTTP method"))?;

        let mut methods = Vec::with_capacity(top.len());
        for (method, routes) in top {
            let method = method
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("HTTP method keys must be strings"))?;
            let routes = routes
                .as_mapping()
                .ok_or_else(|| anyhow::anyhow!("routes for '{method}' must be a mapping"))?;

            let mut entries = Vec::with_capacity(routes.len());
            for (pattern, target) in routes {
                let pattern = pattern
                    .as_str()
                    .ok_or_else(|| anyhow::anyhow!("route patterns under '{method}' must be strings"))?;
                let target = target
                    .as_str()
                    .ok_or_else(|| anyhow::anyhow!("target for '{method} {pattern}' must be a string"))?;
                entries.push((pattern.to_string(), target.to_string()));
            }
            methods.push((method.to_string(), entries));
        }

        Ok(Self { methods })
    }
}

impl RouteTable {
    /// Register every route in `source`, in document order
    ///
    /// Fails loudly on the first unsupported method; routes registered before
    /// the failure stay in the table, so callers should abort startup.
    ///
    /// # Errors
    ///
    /// `DispatchError::Configuration` for an unsupported method or bad pattern.
    pub fn batch_load(&mut self, source: &RouteSource) -> Result<(), DispatchError> {
        for (method, routes) in &source.methods {
            // Check the method once so an empty block still fails
            parse_method(method)?;
            for (pattern, target) in routes {
                self.register(method, pattern, target)?;
            }
        }
        Ok(())
    }
}

/// Load a route file into a fresh table
///
/// # Errors
///
/// Fails if the file cannot be read or parsed, or names an unsupported method.
pub fn load_routes<P: AsRef<Path>>(path: P) -> Result<RouteTable> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read route file {}", path.display()))?;
    let source = RouteSource::parse(&content)
        .with_context(|| format!("failed to parse route file {}", path.display()))?;

    let mut table = RouteTable::new();
    table
        .batch_load(&source)
        .with_context(|| format!("invalid route file {}", path.display()))?;

    info!(
        file = %path.display(),
        routes_count = table.len(),
        "Route file loaded"
    );
    table.log_summary();
    Ok(table)
}
