use serde_json::{Map, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::boundary;
use crate::context::{ContentNegotiation, RequestContext, RequestInfo};
use crate::error::{DispatchError, DispatchResult};
use crate::handlers::{Action, ActionInput, ActionResult, Completion, HandlerRegistry};
use crate::profiler::{Profiler, ProfilerSink};
use crate::renderer::{write_rendered, Rendered, Renderer};
use crate::router::RouteTable;
use crate::scheduler::Scheduler;
use crate::server::{Request, ResponseSink};

/// Per-dispatcher settings that are not part of any collaborator
#[derive(Clone, Default)]
pub struct DispatcherOptions {
    /// How requests select JSON output
    pub negotiation: ContentNegotiation,
    /// Where completed profiles go; `None` keeps them in memory only
    pub profiler_sink: Option<Arc<dyn ProfilerSink>>,
}

impl std::fmt::Debug for DispatcherOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherOptions")
            .field("negotiation", &self.negotiation)
            .field("profiler_sink", &self.profiler_sink.is_some())
            .finish()
    }
}

/// Request state machine: tasks, routing, handler, render, with one error
/// boundary around all of it
///
/// Everything it owns is read-only after construction, so one dispatcher can
/// serve any number of concurrent requests.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    routes: RouteTable,
    scheduler: Scheduler,
    handlers: HandlerRegistry,
    renderer: Renderer,
    options: DispatcherOptions,
}

impl Dispatcher {
    /// Build a dispatcher from its collaborators
    ///
    /// # Errors
    ///
    /// `DispatchError::Configuration` if the pre-request task graph has a
    /// missing dependency or a cycle.
    pub fn new(
        routes: RouteTable,
        scheduler: Scheduler,
        handlers: HandlerRegistry,
        renderer: Renderer,
        options: DispatcherOptions,
    ) -> Result<Self, DispatchError> {
        let order = scheduler.validate()?;

        info!(
            routes = routes.len(),
            tasks = ?order,
            handler_groups = handlers.len(),
            templates = renderer.templates().len(),
            profiler_sink = options.profiler_sink.is_some(),
            "Dispatcher ready"
        );

        Ok(Self {
            routes,
            scheduler,
            handlers,
            renderer,
            options,
        })
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    #[must_use]
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    #[must_use]
    pub fn options(&self) -> &DispatcherOptions {
        &self.options
    }

    /// Serve one request into `res` and return the status that was sent
    ///
    /// Never fails: every error, including panics in tasks and handlers, is
    /// turned into an error response. The response is always ended and the
    /// profile is completed exactly once.
    pub fn dispatch(&self, req: &Request, res: &mut dyn ResponseSink) -> u16 {
        let started = Instant::now();
        let mut profiler = Profiler::new(req.url.clone(), self.options.profiler_sink.clone());
        profiler.start("request");

        let info = RequestInfo::from_request(req, &self.options.negotiation);
        let mut ctx = RequestContext::new(info, profiler);

        let outcome = match catch_unwind(AssertUnwindSafe(|| self.process(&mut ctx, res))) {
            Ok(outcome) => outcome,
            Err(panic) => Err(DispatchError::from_panic("request pipeline", panic.as_ref())),
        };

        let status = match outcome {
            Ok(status) => status,
            Err(err) => boundary::handle_error(&self.renderer, &ctx, res, &err),
        };

        let mut span_data = Map::new();
        span_data.insert("status".to_string(), Value::from(status));
        ctx.profiler.stop_with("request", span_data);
        // Spans cut short by an error
        ctx.profiler.stop_open();

        info!(
            request_id = %ctx.info.request_id,
            method = %ctx.info.method,
            path = %ctx.info.path,
            status = status,
            ajax = ctx.is_ajax(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );

        let RequestContext { profiler, .. } = ctx;
        profiler.complete();
        status
    }

    /// Steps between parsing the request and a written response
    fn process(&self, ctx: &mut RequestContext, res: &mut dyn ResponseSink) -> DispatchResult<u16> {
        ctx.profiler.start("tasks");
        let outputs = self.scheduler.run(Arc::clone(&ctx.info));
        ctx.profiler.stop("tasks");
        ctx.data.extend(outputs?);

        let route = self
            .routes
            .route(&ctx.info.method, &ctx.info.path)
            .ok_or_else(|| {
                DispatchError::not_found(format!(
                    "no route for {} {}",
                    ctx.info.method, ctx.info.path
                ))
            })?;

        debug!(
            request_id = %ctx.info.request_id,
            pattern = %route.pattern,
            target = %route.target,
            params = ?route.params,
            "Route matched"
        );

        ctx.params = route.params;
        let action = self.handlers.resolve(&route.target)?;

        ctx.profiler.start("handler");
        let tree = invoke(&route.target, action, ctx)?;
        ctx.profiler.stop("handler");

        res.set_status(200);
        match tree {
            Some(tree) => self.renderer.render(ctx, res, tree)?,
            None => {
                let empty = if ctx.is_ajax() {
                    Rendered::Json(Value::Object(Map::new()))
                } else {
                    Rendered::Html(Vec::new())
                };
                write_rendered(res, empty)?;
            }
        }
        Ok(200)
    }
}

/// Run an action under its calling convention and wait for its result
fn invoke(target: &str, action: &Action, ctx: &mut RequestContext) -> ActionResult {
    let origin = format!("action '{target}'");
    match action {
        Action::Sync(f) => match catch_unwind(AssertUnwindSafe(|| f(ctx))) {
            Ok(result) => result,
            Err(panic) => Err(DispatchError::from_panic(&origin, panic.as_ref())),
        },
        Action::Async(f) => {
            let (completion, rx) = Completion::channel(target);
            let input = ActionInput {
                request: Arc::clone(&ctx.info),
                params: ctx.params.clone(),
                data: ctx.data.clone(),
            };
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| f(input, completion))) {
                return Err(DispatchError::from_panic(&origin, panic.as_ref()));
            }

            debug!(
                request_id = %ctx.info.request_id,
                target = %target,
                "Waiting for async action"
            );

            // The completion sends on drop, so recv only fails if the runtime is torn down
            rx.recv().unwrap_or_else(|e| {
                Err(DispatchError::handler(format!(
                    "{origin} completion channel closed: {e}"
                )))
            })
        }
    }
}
