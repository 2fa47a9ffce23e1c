//! # Runtime Configuration Module
//!
//! Environment-driven settings for the coroutine runtime.
//!
//! ## Environment Variables
//!
//! ### `BRRTMVC_STACK_SIZE`
//!
//! Stack size for pre-request task and asynchronous handler coroutines.
//! Accepts decimal (`65536`) or hexadecimal (`0x10000`). Default: `0x10000` (64 KB).
//!
//! Template rendering runs on the dispatching coroutine, so deep view trees
//! need a larger stack there too; set it with [`RuntimeConfig::apply`] at
//! startup.
//!
//! ```rust
//! use brrtmvc::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! assert!(config.stack_size > 0);
//! ```

use std::env;
use tracing::info;

pub const DEFAULT_STACK_SIZE: usize = 0x10000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes
    pub stack_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

/// Parse `16384` or `0x4000`
#[must_use]
pub fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let stack_size = env::var("BRRTMVC_STACK_SIZE")
            .ok()
            .and_then(|v| parse_size(&v))
            .filter(|&s| s > 0)
            .unwrap_or(DEFAULT_STACK_SIZE);
        RuntimeConfig { stack_size }
    }

    /// Make this the default stack size for every coroutine `may` spawns
    pub fn apply(&self) {
        may::config().set_stack_size(self.stack_size);
        info!(stack_size = self.stack_size, "Coroutine runtime configured");
    }
}
