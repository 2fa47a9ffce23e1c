//! # brrtmvc
//!
//! **brrtmvc** is the request-handling core of a small server-side MVC
//! framework, built on the `may` coroutine runtime. Given a request it runs a
//! dependency-ordered set of pre-request tasks, resolves a route, invokes a
//! handler action (synchronous or callback based), renders the returned view
//! tree as HTML or JSON, and turns any failure along the way into a
//! well-formed error response.
//!
//! ## Architecture
//!
//! Leaf modules first:
//!
//! - **[`router`]** - Route table: per-method patterns bound to `group.action` targets
//! - **[`profiler`]** - Per-request span recorder with pluggable persistence
//! - **[`view`]** - View nodes and the tree shapes handlers return
//! - **[`scheduler`]** - Pre-request task DAG, run concurrently on coroutines
//! - **[`handlers`]** - Handler groups and their sync/async actions
//! - **[`renderer`]** - Template set and HTML/JSON serialization of view trees
//! - **[`dispatcher`]** - Request state machine and the single error boundary
//! - **[`server`]** - Transport boundary: [`server::Request`] and [`server::ResponseSink`]
//!
//! Ambient pieces: [`error`] (error taxonomy), [`context`] (per-request
//! state), [`config`] (YAML app config), [`logging`] (`tracing` setup),
//! [`runtime_config`] (coroutine stack size) and [`cli`] (the `brrtmvc`
//! binary).
//!
//! ## Request Flow
//!
//! ```text
//! Request -> cookies/query/output mode -> pre-request tasks -> route
//!         -> handler action -> renderer -> ResponseSink -> profiler sink
//!                    \___________ error boundary ___________/
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtmvc::dispatcher::{Dispatcher, DispatcherOptions};
//! use brrtmvc::handlers::{HandlerGroup, HandlerRegistry};
//! use brrtmvc::renderer::{Renderer, RendererConfig, TemplateSet};
//! use brrtmvc::router::RouteTable;
//! use brrtmvc::scheduler::Scheduler;
//! use brrtmvc::server::{BufferedResponse, Request};
//! use brrtmvc::view::View;
//! use serde_json::json;
//!
//! let mut routes = RouteTable::new();
//! routes.register("get", "/hello/:name", "greet.hello").unwrap();
//!
//! let mut handlers = HandlerRegistry::new();
//! handlers.register(
//!     "greet",
//!     HandlerGroup::new().sync("hello", |ctx| {
//!         let name = ctx.param("name").unwrap_or("world").to_string();
//!         Ok(Some(View::new("hello", json!({ "name": name })).into()))
//!     }),
//! );
//!
//! let mut templates = TemplateSet::new();
//! templates.compile("hello", "<p>Hello {{ name }}</p>").unwrap();
//!
//! let dispatcher = Dispatcher::new(
//!     routes,
//!     Scheduler::new(),
//!     handlers,
//!     Renderer::new(templates, RendererConfig::default()),
//!     DispatcherOptions::default(),
//! )
//! .unwrap();
//!
//! let mut res = BufferedResponse::new();
//! dispatcher.dispatch(&Request::get("/hello/ada"), &mut res);
//! assert_eq!(res.body_text(), "<p>Hello ada</p>");
//!
//! let mut res = BufferedResponse::new();
//! dispatcher.dispatch(&Request::get("/hello/ada?json=1"), &mut res);
//! assert_eq!(res.body_json().unwrap(), json!({ "hello": { "name": "ada" } }));
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod profiler;
pub mod renderer;
pub mod router;
pub mod runtime_config;
pub mod scheduler;
pub mod server;
pub mod view;

pub use config::AppConfig;
pub use context::{RequestContext, RequestId, RequestInfo};
pub use dispatcher::{Dispatcher, DispatcherOptions};
pub use error::{DispatchError, DispatchResult, ErrorPayload};
pub use handlers::{Action, ActionInput, Completion, HandlerGroup, HandlerRegistry};
pub use renderer::{Renderer, RendererConfig, TemplateSet};
pub use router::{load_routes, RouteTable};
pub use scheduler::Scheduler;
pub use server::{BufferedResponse, Request, ResponseSink};
pub use view::{View, ViewTree};
