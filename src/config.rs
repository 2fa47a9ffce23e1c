//! # Application Configuration
//!
//! File-based settings for the request core, read from YAML (or JSON, which
//! is valid YAML):
//!
//! ```yaml
//! profiler:
//!   file: /var/log/app/profile.jsonl
//! views:
//!   default_header: partials/header
//!   default_footer: partials/footer
//!   defaults:
//!     site_name: Example
//! ajax:
//!   header: x-requested-with
//!   header_value: XMLHttpRequest
//!   query_flag: json
//! ```
//!
//! Every section is optional. `BRRTMVC_PROFILER_FILE` overrides
//! `profiler.file` when set.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::context::ContentNegotiation;
use crate::dispatcher::DispatcherOptions;
use crate::profiler::{FileSink, ProfilerSink};
use crate::renderer::RendererConfig;

pub const PROFILER_FILE_ENV: &str = "BRRTMVC_PROFILER_FILE";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Append-only JSON-lines file for completed profiles
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub profiler: ProfilerConfig,
    pub views: RendererConfig,
    pub ajax: ContentNegotiation,
}

impl AppConfig {
    /// Read and parse a config file, then apply environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML/JSON
    /// for this shape.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env();

        info!(
            path = %path.display(),
            profiler_file = ?config.profiler.file,
            default_header = ?config.views.default_header,
            default_footer = ?config.views.default_footer,
            "Application config loaded"
        );
        Ok(config)
    }

    /// Parse config text without touching the environment
    ///
    /// # Errors
    ///
    /// Returns the YAML error for malformed input.
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply `BRRTMVC_PROFILER_FILE` if it is set and non-empty
    pub fn apply_env(&mut self) {
        if let Ok(file) = std::env::var(PROFILER_FILE_ENV) {
            if !file.trim().is_empty() {
                self.profiler.file = Some(PathBuf::from(file));
            }
        }
    }

    /// Profiler sink for the configured file, if any
    #[must_use]
    pub fn profiler_sink(&self) -> Option<Arc<dyn ProfilerSink>> {
        self.profiler
            .file
            .as_ref()
            .map(|path| Arc::new(FileSink::new(path.clone())) as Arc<dyn ProfilerSink>)
    }

    #[must_use]
    pub fn dispatcher_options(&self) -> DispatcherOptions {
        DispatcherOptions {
            negotiation: self.ajax.clone(),
            profiler_sink: self.profiler_sink(),
        }
    }

    #[must_use]
    pub fn renderer_config(&self) -> RendererConfig {
        self.views.clone()
    }
}
