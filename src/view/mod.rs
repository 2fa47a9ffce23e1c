//! # View Module
//!
//! Value objects handlers return to describe a response. A [`View`] binds a
//! template name to a data mapping; any value in that mapping may itself be a
//! view (or an ordered list of views), which makes the whole thing a tree.
//!
//! Handlers hand back a [`ViewTree`]: one view, an ordered list of views, or a
//! header/main/footer layout. The renderer normalizes every shape into one
//! ordered list of top-level views.
//!
//! ```rust
//! use brrtmvc::view::{View, ViewTree};
//! use serde_json::json;
//!
//! let sidebar = View::excluded("partials/sidebar", json!({ "links": [] }));
//! let page = View::new("posts/show", json!({ "title": "Hello" })).with_child("sidebar", sidebar);
//! let tree: ViewTree = page.into();
//! ```

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One entry in a view's data mapping
#[derive(Debug, Clone, PartialEq)]
pub enum ViewData {
    /// Plain data handed to the template as-is
    Value(Value),
    /// Nested view, rendered before its parent
    View(View),
    /// Ordered nested views, rendered and concatenated
    Views(Vec<View>),
}

impl From<Value> for ViewData {
    fn from(v: Value) -> Self {
        ViewData::Value(v)
    }
}

impl From<View> for ViewData {
    fn from(v: View) -> Self {
        ViewData::View(v)
    }
}

impl From<Vec<View>> for ViewData {
    fn from(v: Vec<View>) -> Self {
        ViewData::Views(v)
    }
}

/// A renderable unit: template name, data, and whether it appears in JSON output
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub name: String,
    pub data: BTreeMap<String, ViewData>,
    /// `false` drops this node (and its subtree) from JSON responses
    pub include_in_json: bool,
}

fn object_entries(data: Value) -> BTreeMap<String, ViewData> {
    match data {
        Value::Object(map) => map.into_iter().map(|(k, v)| (k, ViewData::Value(v))).collect(),
        Value::Null => BTreeMap::new(),
        // Non-object payloads are exposed to the template as `value`
        other => BTreeMap::from([("value".to_string(), ViewData::Value(other))]),
    }
}

impl View {
    /// View included in JSON responses
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data: object_entries(data),
            include_in_json: true,
        }
    }

    /// View left out of JSON responses (layout chrome, partials)
    pub fn excluded(name: impl Into<String>, data: Value) -> Self {
        Self::new(name, data).with_include(false)
    }

    /// View with no data
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Value::Null)
    }

    #[must_use]
    pub fn with_include(mut self, include: bool) -> Self {
        self.include_in_json = include;
        self
    }

    /// Set a data key, replacing any previous value
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ViewData>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Attach a nested view under `key`
    #[must_use]
    pub fn with_child(self, key: impl Into<String>, child: View) -> Self {
        self.with(key, ViewData::View(child))
    }

    /// Insert keys from `defaults` that this view does not set itself
    pub(crate) fn merge_defaults(&mut self, defaults: &Map<String, Value>) {
        for (k, v) in defaults {
            self.data
                .entry(k.clone())
                .or_insert_with(|| ViewData::Value(v.clone()));
        }
    }

    /// Apply `f` to this view and every nested view, parents first
    pub(crate) fn walk_mut(&mut self, f: &mut impl FnMut(&mut View)) {
        f(self);
        for value in self.data.values_mut() {
            match value {
                ViewData::View(child) => child.walk_mut(f),
                ViewData::Views(children) => {
                    for child in children {
                        child.walk_mut(f);
                    }
                }
                ViewData::Value(_) => {}
            }
        }
    }

    /// Number of views in this subtree, including this one
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self
            .data
            .values()
            .map(|v| match v {
                ViewData::View(child) => child.node_count(),
                ViewData::Views(children) => children.iter().map(View::node_count).sum(),
                ViewData::Value(_) => 0,
            })
            .sum::<usize>()
    }
}

/// Content of one layout slot
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    View(View),
    Views(Vec<View>),
    /// Raw data, wrapped in the configured default template for the slot
    Data(Value),
}

impl From<View> for Slot {
    fn from(v: View) -> Self {
        Slot::View(v)
    }
}

impl From<Vec<View>> for Slot {
    fn from(v: Vec<View>) -> Self {
        Slot::Views(v)
    }
}

/// What a handler hands to the renderer
#[derive(Debug, Clone, PartialEq)]
pub enum ViewTree {
    Single(View),
    List(Vec<View>),
    Layout {
        header: Option<Slot>,
        main: Option<Slot>,
        footer: Option<Slot>,
    },
}

impl ViewTree {
    /// Layout with only a main slot
    pub fn layout(main: impl Into<Slot>) -> Self {
        ViewTree::Layout {
            header: None,
            main: Some(main.into()),
            footer: None,
        }
    }
}

impl From<View> for ViewTree {
    fn from(v: View) -> Self {
        ViewTree::Single(v)
    }
}

impl From<Vec<View>> for ViewTree {
    fn from(v: Vec<View>) -> Self {
        ViewTree::List(v)
    }
}
