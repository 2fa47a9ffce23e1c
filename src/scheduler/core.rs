use may::coroutine;
use may::sync::mpsc;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::context::RequestInfo;
use crate::error::DispatchError;
use crate::runtime_config::RuntimeConfig;

/// Body of a pre-request task
pub type TaskFn = Arc<dyn Fn(&TaskContext) -> Result<Value, DispatchError> + Send + Sync>;

/// What a running task can see: the request and its dependencies' outputs
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub request: Arc<RequestInfo>,
    dependencies: Map<String, Value>,
}

impl TaskContext {
    #[must_use]
    pub fn new(request: Arc<RequestInfo>, dependencies: Map<String, Value>) -> Self {
        Self {
            request,
            dependencies,
        }
    }

    /// Output of a declared dependency
    #[must_use]
    pub fn dependency(&self, name: &str) -> Option<&Value> {
        self.dependencies.get(name)
    }

    #[must_use]
    pub fn dependencies(&self) -> &Map<String, Value> {
        &self.dependencies
    }
}

/// A named unit of work that runs before routing
#[derive(Clone)]
pub struct PreRequestTask {
    pub name: String,
    pub dependencies: Vec<String>,
    handler: TaskFn,
}

impl std::fmt::Debug for PreRequestTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreRequestTask")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Runs the registered task graph once per request
#[derive(Clone, Debug)]
pub struct Scheduler {
    tasks: Vec<PreRequestTask>,
    index: HashMap<String, usize>,
    stack_size: usize,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::with_stack_size(RuntimeConfig::from_env().stack_size)
    }

    /// Scheduler whose task coroutines use the given stack size
    #[must_use]
    pub fn with_stack_size(stack_size: usize) -> Self {
        Self {
            tasks: Vec::new(),
            index: HashMap::new(),
            stack_size,
        }
    }

    /// Register a task. Dependencies may name tasks registered later;
    /// they are checked by [`Scheduler::validate`].
    ///
    /// # Errors
    ///
    /// `DispatchError::Configuration` if `name` is already registered.
    pub fn add_task<F>(&mut self, name: &str, dependencies: &[&str], handler: F) -> Result<(), DispatchError>
    where
        F: Fn(&TaskContext) -> Result<Value, DispatchError> + Send + Sync + 'static,
    {
        if self.index.contains_key(name) {
            return Err(DispatchError::configuration(format!(
                "pre-request task '{name}' is already registered"
            )));
        }

        let mut deps: Vec<String> = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            if !deps.iter().any(|d| d == dep) {
                deps.push((*dep).to_string());
            }
        }

        debug!(
            task = %name,
            dependencies = ?deps,
            "Pre-request task registered"
        );

        self.index.insert(name.to_string(), self.tasks.len());
        self.tasks.push(PreRequestTask {
            name: name.to_string(),
            dependencies: deps,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub fn task(&self, name: &str) -> Option<&PreRequestTask> {
        self.index.get(name).map(|&i| &self.tasks[i])
    }

    /// Dependency indices per task and dependents per task
    fn edges(&self) -> Result<(Vec<Vec<usize>>, Vec<Vec<usize>>), DispatchError> {
        let mut deps = vec![Vec::new(); self.tasks.len()];
        let mut dependents = vec![Vec::new(); self.tasks.len()];
        for (i, task) in self.tasks.iter().enumerate() {
            for dep in &task.dependencies {
                let &j = self.index.get(dep).ok_or_else(|| {
                    DispatchError::configuration(format!(
                        "pre-request task '{}' depends on undeclared task '{dep}'",
                        task.name
                    ))
                })?;
                deps[i].push(j);
                dependents[j].push(i);
            }
        }
        Ok((deps, dependents))
    }

    /// Check the graph and return one valid execution order
    ///
    /// # Errors
    ///
    /// `DispatchError::Configuration` for an undeclared dependency or a cycle.
    pub fn validate(&self) -> Result<Vec<String>, DispatchError> {
        let (deps, dependents) = self.edges()?;
        let mut remaining: Vec<usize> = deps.iter().map(Vec::len).collect();
        let mut queue: VecDeque<usize> = (0..self.tasks.len()).filter(|&i| remaining[i] == 0).collect();
        let mut order = Vec::with_capacity(self.tasks.len());

        while let Some(i) = queue.pop_front() {
            order.push(self.tasks[i].name.clone());
            for &d in &dependents[i] {
                remaining[d] -= 1;
                if remaining[d] == 0 {
                    queue.push_back(d);
                }
            }
        }

        if order.len() != self.tasks.len() {
            let stuck: Vec<&str> = (0..self.tasks.len())
                .filter(|&i| remaining[i] > 0)
                .map(|i| self.tasks[i].name.as_str())
                .collect();
            return Err(DispatchError::configuration(format!(
                "pre-request tasks form a dependency cycle: {}",
                stuck.join(", ")
            )));
        }
        Ok(order)
    }

    /// Run every task for one request
    ///
    /// Tasks start as soon as all their dependencies have succeeded; independent
    /// tasks run concurrently on separate coroutines. On the first failure no
    /// new task is launched, running tasks are awaited and their results
    /// dropped, and that first error is returned.
    ///
    /// # Errors
    ///
    /// The first task error, or `DispatchError::Configuration` if the graph is
    /// invalid (checked before anything runs).
    pub fn run(&self, request: Arc<RequestInfo>) -> Result<Map<String, Value>, DispatchError> {
        let (deps, dependents) = self.edges()?;
        self.validate()?;

        let mut outputs = Map::new();
        if self.tasks.is_empty() {
            return Ok(outputs);
        }

        let started = Instant::now();
        let (tx, rx) = mpsc::channel::<(usize, Result<Value, DispatchError>)>();
        let mut remaining: Vec<usize> = deps.iter().map(Vec::len).collect();
        let mut ready: Vec<usize> = (0..self.tasks.len()).filter(|&i| remaining[i] == 0).collect();
        let mut in_flight = 0usize;
        let mut failure: Option<DispatchError> = None;

        loop {
            if failure.is_none() {
                for i in ready.drain(..) {
                    let task = &self.tasks[i];
                    let dep_outputs: Map<String, Value> = task
                        .dependencies
                        .iter()
                        .filter_map(|d| outputs.get(d).map(|v| (d.clone(), v.clone())))
                        .collect();
                    let ctx = TaskContext::new(Arc::clone(&request), dep_outputs);
                    match self.launch(i, ctx, tx.clone()) {
                        Ok(()) => in_flight += 1,
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
            }

            if in_flight == 0 {
                break;
            }

            // We hold `tx`, so recv only fails if the runtime is torn down
            let Ok((i, result)) = rx.recv() else {
                failure.get_or_insert_with(|| DispatchError::handler("pre-request task channel closed"));
                break;
            };
            in_flight -= 1;

            match result {
                Ok(value) if failure.is_none() => {
                    for &d in &dependents[i] {
                        remaining[d] -= 1;
                        if remaining[d] == 0 {
                            ready.push(d);
                        }
                    }
                    outputs.insert(self.tasks[i].name.clone(), value);
                }
                Ok(_) => {
                    debug!(
                        request_id = %request.request_id,
                        task = %self.tasks[i].name,
                        "Task result discarded after earlier failure"
                    );
                }
                Err(e) => {
                    warn!(
                        request_id = %request.request_id,
                        task = %self.tasks[i].name,
                        error = %e,
                        "Pre-request task failed"
                    );
                    failure.get_or_insert(e);
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }

        info!(
            request_id = %request.request_id,
            tasks = self.tasks.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Pre-request tasks complete"
        );
        Ok(outputs)
    }

    fn launch(
        &self,
        i: usize,
        ctx: TaskContext,
        tx: mpsc::Sender<(usize, Result<Value, DispatchError>)>,
    ) -> Result<(), DispatchError> {
        let task = &self.tasks[i];
        let handler = Arc::clone(&task.handler);
        let name = task.name.clone();

        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The closure owns everything it touches (Arc'd handler and request, cloned
        // dependency outputs, its own sender) and reports panics through the channel.
        let spawned = unsafe {
            coroutine::Builder::new()
                .name(format!("task:{name}"))
                .stack_size(self.stack_size)
                .spawn(move || {
                    let result = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        handler(&ctx)
                    })) {
                        Ok(result) => result,
                        Err(panic) => Err(DispatchError::from_panic(
                            &format!("pre-request task '{name}'"),
                            panic.as_ref(),
                        )),
                    };
                    if tx.send((i, result)).is_err() {
                        debug!(task = %name, "Scheduler gone before task finished");
                    }
                })
        };

        spawned.map(|_| ()).map_err(|e| {
            error!(
                task = %task.name,
                error = %e,
                stack_size = self.stack_size,
                "Failed to spawn task coroutine - CRITICAL"
            );
            DispatchError::handler(format!("failed to start pre-request task '{}': {e}", task.name))
        })
    }
}
