//! # Scheduler Module
//!
//! Pre-request tasks: named units of work that must finish before a request is
//! routed (loading a session, checking a feature flag, resolving the current
//! user). Tasks declare dependencies on other tasks by name, forming a DAG.
//!
//! ## Execution
//!
//! - The graph is validated before anything runs; a missing dependency or a
//!   cycle is a configuration error.
//! - Every task whose dependencies have all succeeded is spawned on its own
//!   `may` coroutine, so independent branches run concurrently.
//! - A task sees the request and the outputs of its own dependencies only.
//! - The first failure stops new launches; already running tasks finish and
//!   their results are thrown away.
//!
//! Task outputs end up in the request data bag under the task name, where the
//! renderer merges them into every view.
//!
//! ```rust,no_run
//! use brrtmvc::scheduler::Scheduler;
//! use serde_json::json;
//!
//! let mut scheduler = Scheduler::new();
//! scheduler
//!     .add_task("session", &[], |ctx| Ok(json!({ "sid": ctx.request.cookie("sid") })))
//!     .unwrap();
//! scheduler
//!     .add_task("user", &["session"], |ctx| {
//!         let sid = ctx.dependency("session").and_then(|s| s["sid"].as_str());
//!         Ok(json!({ "logged_in": sid.is_some() }))
//!     })
//!     .unwrap();
//! scheduler.validate().unwrap();
//! ```

mod core;
#[cfg(test)]
mod tests;

pub use core::{PreRequestTask, Scheduler, TaskContext, TaskFn};
