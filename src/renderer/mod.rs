//! # Renderer Module
//!
//! Composes a handler's [`ViewTree`](crate::view::ViewTree) into a response.
//!
//! ## Pipeline
//!
//! 1. **Normalize** - a single view, a list, or a header/main/footer layout
//!    becomes one ordered list of top-level views. Raw data in the header or
//!    footer slot is wrapped in the configured default template.
//! 2. **Merge** - every node (nested ones included) receives the response
//!    data, the request data and the global defaults for keys it does not set
//!    itself.
//! 3. **Serialize** - HTML mode renders each top-level view through its
//!    compiled template (data values HTML-escaped, rendered children
//!    inserted as markup) and writes the chunks in order; JSON mode drops every
//!    node excluded from JSON and writes one object keyed by view name.
//!
//! ## Example
//!
//! ```rust
//! use brrtmvc::renderer::{Renderer, RendererConfig, TemplateSet, Rendered};
//! use brrtmvc::view::View;
//! use serde_json::json;
//!
//! let mut templates = TemplateSet::new();
//! templates.compile("test", "<span>{{ bar }}</span>").unwrap();
//! let renderer = Renderer::new(templates, RendererConfig::default());
//!
//! let views = vec![View::new("test", json!({"bar": 1})), View::new("test", json!({"bar": 2}))];
//! let html = renderer.serialize(views, false).unwrap();
//! assert_eq!(html, Rendered::Html(vec!["<span>1</span>".into(), "<span>2</span>".into()]));
//! ```

mod core;
mod templates;

pub use core::{Renderer, RendererConfig, Rendered};
pub(crate) use core::write_rendered;
pub use templates::{TemplateFn, TemplateSet, TEMPLATE_EXTENSIONS};
