use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::templates::TemplateSet;
use crate::context::RequestContext;
use crate::error::DispatchError;
use crate::server::{ResponseSink, CONTENT_TYPE_HTML, CONTENT_TYPE_JSON};
use crate::view::{Slot, View, ViewData, ViewTree};

/// Renderer settings, usually the `views` section of the app config
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RendererConfig {
    /// Template used to wrap raw header data in a layout
    pub default_header: Option<String>,
    /// Template used to wrap raw footer data in a layout
    pub default_footer: Option<String>,
    /// Global default view options; lowest merge precedence
    pub defaults: Map<String, Value>,
}

/// Serialized output of one render, before it is written
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    /// HTML chunks in top-level order
    Html(Vec<String>),
    Json(Value),
}

/// Turns view trees into HTML or JSON responses
#[derive(Debug, Clone)]
pub struct Renderer {
    templates: Arc<TemplateSet>,
    config: RendererConfig,
}

impl Renderer {
    #[must_use]
    pub fn new(templates: TemplateSet, config: RendererConfig) -> Self {
        Self {
            templates: Arc::new(templates),
            config,
        }
    }

    #[must_use]
    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    #[must_use]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Flatten any tree shape into one ordered list of top-level views
    ///
    /// # Errors
    ///
    /// `DispatchError::Render` if a layout slot holds raw data and no default
    /// template is configured for it.
    pub fn normalize(&self, tree: ViewTree) -> Result<Vec<View>, DispatchError> {
        match tree {
            ViewTree::Single(view) => Ok(vec![view]),
            ViewTree::List(views) => Ok(views),
            ViewTree::Layout {
                header,
                main,
                footer,
            } => {
                let mut views = Vec::new();
                let slots = [
                    ("header", header, self.config.default_header.as_deref()),
                    ("main", main, None),
                    ("footer", footer, self.config.default_footer.as_deref()),
                ];
                for (slot_name, slot, default_template) in slots {
                    match slot {
                        None => {}
                        Some(Slot::View(view)) => views.push(view),
                        Some(Slot::Views(list)) => views.extend(list),
                        Some(Slot::Data(data)) => {
                            let template = default_template.ok_or_else(|| {
                                DispatchError::render(format!(
                                    "layout slot '{slot_name}' holds raw data but has no default template"
                                ))
                            })?;
                            views.push(View::new(template, data));
                        }
                    }
                }
                Ok(views)
            }
        }
    }

    /// Merge contextual data into every node of every view
    ///
    /// Precedence, highest first: node data, response data (`locals`),
    /// request data, global defaults.
    pub fn merge_context(&self, views: &mut [View], ctx: &RequestContext) {
        for view in views.iter_mut() {
            view.walk_mut(&mut |node| {
                node.merge_defaults(&ctx.locals);
                node.merge_defaults(&ctx.data);
                node.merge_defaults(&self.config.defaults);
            });
        }
    }

    /// Render one view and its children to markup
    ///
    /// Data values are escaped by the template; rendered children are
    /// inserted as markup.
    ///
    /// # Errors
    ///
    /// `DispatchError::Render` if this view or any descendant names an
    /// unknown template.
    pub fn render_view(&self, view: &View) -> Result<String, DispatchError> {
        let mut data = BTreeMap::new();
        for (key, value) in &view.data {
            let value = match value {
                ViewData::Value(v) => minijinja::Value::from_serialize(v),
                ViewData::View(child) => minijinja::Value::from_safe_string(self.render_view(child)?),
                ViewData::Views(children) => {
                    let mut out = String::new();
                    for child in children {
                        out.push_str(&self.render_view(child)?);
                    }
                    minijinja::Value::from_safe_string(out)
                }
            };
            data.insert(key.as_str(), value);
        }
        self.templates.render(&view.name, &data)
    }

    /// Keyed JSON object of every included top-level view
    ///
    /// Excluded nodes disappear at any depth; a later top-level view with the
    /// same name replaces an earlier one.
    #[must_use]
    pub fn to_json(views: Vec<View>) -> Value {
        let mut out = Map::new();
        for view in views {
            let name = view.name.clone();
            if let Some(value) = view_json(view) {
                out.insert(name, value);
            }
        }
        Value::Object(out)
    }

    /// Produce the body for `views` without touching the response
    ///
    /// # Errors
    ///
    /// `DispatchError::Render` from any template in HTML mode.
    pub fn serialize(&self, views: Vec<View>, json: bool) -> Result<Rendered, DispatchError> {
        if json {
            return Ok(Rendered::Json(Self::to_json(views)));
        }
        views
            .iter()
            .map(|v| self.render_view(v))
            .collect::<Result<Vec<_>, _>>()
            .map(Rendered::Html)
    }

    /// Normalize, merge, serialize and stream `tree` to `res`
    ///
    /// Every chunk is rendered before the first byte is written, so a
    /// template failure leaves the response untouched for the error boundary.
    ///
    /// # Errors
    ///
    /// `DispatchError::Render` for tree or template problems,
    /// `DispatchError::Handler` if the response sink fails.
    pub fn render(
        &self,
        ctx: &mut RequestContext,
        res: &mut dyn ResponseSink,
        tree: ViewTree,
    ) -> Result<(), DispatchError> {
        ctx.profiler.start("render");

        let mut views = self.normalize(tree)?;
        self.merge_context(&mut views, ctx);
        let node_count: usize = views.iter().map(View::node_count).sum();
        let rendered = self.serialize(views, ctx.is_ajax())?;
        write_rendered(res, rendered)?;

        let mut span_data = Map::new();
        span_data.insert("nodes".to_string(), Value::from(node_count));
        ctx.profiler.stop_with("render", span_data);

        debug!(
            request_id = %ctx.info.request_id,
            nodes = node_count,
            ajax = ctx.is_ajax(),
            "View tree rendered"
        );
        Ok(())
    }

    /// Name of the template for an error status: `<status>` first, then `error`
    #[must_use]
    pub fn error_template(&self, status: u16) -> Option<String> {
        let by_status = status.to_string();
        if self.templates.contains(&by_status) {
            return Some(by_status);
        }
        self.templates.contains("error").then(|| "error".to_string())
    }
}

fn view_json(view: View) -> Option<Value> {
    if !view.include_in_json {
        return None;
    }
    let mut out = Map::with_capacity(view.data.len());
    for (key, value) in view.data {
        match value {
            ViewData::Value(v) => {
                out.insert(key, v);
            }
            ViewData::View(child) => {
                if let Some(v) = view_json(child) {
                    out.insert(key, v);
                }
            }
            ViewData::Views(children) => {
                let list: Vec<Value> = children.into_iter().filter_map(view_json).collect();
                out.insert(key, Value::Array(list));
            }
        }
    }
    Some(Value::Object(out))
}

fn write_error(e: std::io::Error) -> DispatchError {
    DispatchError::handler(format!("response write failed: {e}"))
}

/// Set the content type, write the body in order and end the response
pub(crate) fn write_rendered(res: &mut dyn ResponseSink, rendered: Rendered) -> Result<(), DispatchError> {
    match rendered {
        Rendered::Json(value) => {
            let body = serde_json::to_vec(&value)
                .map_err(|e| DispatchError::render(format!("JSON serialization failed: {e}")))?;
            res.set_header("Content-Type", CONTENT_TYPE_JSON);
            res.write(&body).map_err(write_error)?;
        }
        Rendered::Html(chunks) => {
            res.set_header("Content-Type", CONTENT_TYPE_HTML);
            for chunk in chunks {
                res.write(chunk.as_bytes()).map_err(write_error)?;
            }
        }
    }
    res.end().map_err(write_error)
}
