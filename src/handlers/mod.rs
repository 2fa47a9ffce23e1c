//! # Handlers Module
//!
//! Handler groups ("controllers") and the registry the dispatcher resolves
//! route targets against.
//!
//! A route target is `"<group>.<action>"`. The group is looked up by name in
//! the [`HandlerRegistry`]; the action is looked up inside the group. Either
//! lookup failing is a `NotFound` error.
//!
//! Actions come in two calling conventions, chosen explicitly at
//! registration:
//!
//! - [`Action::Sync`] gets `&mut RequestContext` and returns the view tree
//!   directly. It may add response data through `ctx.set_local`.
//! - [`Action::Async`] gets an owned [`ActionInput`] and a [`Completion`].
//!   It may hand the completion to another coroutine or thread and call
//!   [`Completion::done`] later. A completion that is dropped without being
//!   called (including by a panic in the continuation) fails the request.
//!
//! ```rust
//! use brrtmvc::handlers::{HandlerGroup, HandlerRegistry};
//! use brrtmvc::view::View;
//! use serde_json::json;
//!
//! let posts = HandlerGroup::new()
//!     .sync("show", |ctx| {
//!         let id = ctx.param("id").unwrap_or_default().to_string();
//!         Ok(Some(View::new("post", json!({ "id": id })).into()))
//!     })
//!     .async_action("index", |_input, done| {
//!         done.done(Ok(Some(View::new("posts", json!({ "items": [] })).into())));
//!     });
//!
//! let mut registry = HandlerRegistry::new();
//! assert!(registry.register("posts", posts));
//! assert!(registry.resolve("posts.show").is_ok());
//! assert!(registry.resolve("posts.edit").is_err());
//! ```

use may::sync::mpsc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::{RequestContext, RequestInfo};
use crate::error::{DispatchError, DispatchResult};
use crate::router::ParamVec;
use crate::view::ViewTree;

/// What an action produces: a view tree, nothing, or an error
pub type ActionResult = DispatchResult<Option<ViewTree>>;

pub type SyncAction = Arc<dyn Fn(&mut RequestContext) -> ActionResult + Send + Sync>;
pub type AsyncAction = Arc<dyn Fn(ActionInput, Completion) + Send + Sync>;

/// A handler action tagged with its calling convention
#[derive(Clone)]
pub enum Action {
    Sync(SyncAction),
    Async(AsyncAction),
}

impl Action {
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Action::Sync"),
            Self::Async(_) => f.write_str("Action::Async"),
        }
    }
}

/// Owned snapshot of the request handed to an asynchronous action
#[derive(Debug, Clone)]
pub struct ActionInput {
    pub request: Arc<RequestInfo>,
    pub params: ParamVec,
    /// Request data bag (pre-request task outputs)
    pub data: Map<String, Value>,
}

impl ActionInput {
    /// Get a route parameter by name (last write wins)
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// One-shot callback for an asynchronous action
///
/// Dropping it without calling [`Completion::done`] sends an error instead,
/// so the waiting dispatcher never hangs on a lost continuation.
pub struct Completion {
    tx: Option<mpsc::Sender<ActionResult>>,
    action: String,
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("action", &self.action)
            .field("pending", &self.tx.is_some())
            .finish()
    }
}

impl Completion {
    pub(crate) fn channel(action: &str) -> (Self, mpsc::Receiver<ActionResult>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                tx: Some(tx),
                action: action.to_string(),
            },
            rx,
        )
    }

    /// Deliver the action's result
    pub fn done(mut self, result: ActionResult) {
        if let Some(tx) = self.tx.take() {
            if tx.send(result).is_err() {
                debug!(action = %self.action, "Dispatcher gone before action completed");
            }
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        let message = if std::thread::panicking() {
            format!("action '{}' panicked before completing", self.action)
        } else {
            format!("action '{}' dropped its completion without a result", self.action)
        };
        if tx.send(Err(DispatchError::handler(message))).is_err() {
            debug!(action = %self.action, "Dispatcher gone before completion was dropped");
        }
    }
}

/// Named collection of actions
#[derive(Clone, Default, Debug)]
pub struct HandlerGroup {
    actions: HashMap<String, Action>,
}

impl HandlerGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a synchronous action
    #[must_use]
    pub fn sync<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&mut RequestContext) -> ActionResult + Send + Sync + 'static,
    {
        self.actions.insert(name.to_string(), Action::Sync(Arc::new(f)));
        self
    }

    /// Add an action that reports through a [`Completion`]
    #[must_use]
    pub fn async_action<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(ActionInput, Completion) + Send + Sync + 'static,
    {
        self.actions
            .insert(name.to_string(), Action::Async(Arc::new(f)));
        self
    }

    #[must_use]
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Handler groups by name; read-only once the dispatcher is built
#[derive(Clone, Default, Debug)]
pub struct HandlerRegistry {
    groups: HashMap<String, HandlerGroup>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler group. Returns `false` and leaves the registry
    /// unchanged if the name is taken.
    pub fn register(&mut self, name: &str, group: HandlerGroup) -> bool {
        if self.groups.contains_key(name) {
            warn!(group = %name, "Handler group already registered - ignoring");
            return false;
        }
        info!(
            group = %name,
            actions = group.len(),
            total_groups = self.groups.len() + 1,
            "Handler group registered"
        );
        self.groups.insert(name.to_string(), group);
        true
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&HandlerGroup> {
        self.groups.get(name)
    }

    /// Resolve a `"<group>.<action>"` route target
    ///
    /// # Errors
    ///
    /// `DispatchError::NotFound` if the group or the action is missing.
    pub fn resolve(&self, target: &str) -> DispatchResult<&Action> {
        let (group_name, action_name) = target.split_once('.').ok_or_else(|| {
            DispatchError::not_found(format!("route target '{target}' names no action"))
        })?;
        let group = self.lookup(group_name).ok_or_else(|| {
            DispatchError::not_found(format!("handler group '{group_name}' is not registered"))
        })?;
        group.action(action_name).ok_or_else(|| {
            DispatchError::not_found(format!(
                "handler group '{group_name}' has no action '{action_name}'"
            ))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
