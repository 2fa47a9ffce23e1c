use anyhow::{Context, Result};
use minijinja::{AutoEscape, Environment};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::DispatchError;

/// A pre-compiled template: data in, markup out
pub type TemplateFn = Arc<dyn Fn(&Value) -> Result<String, DispatchError> + Send + Sync>;

/// File extensions picked up by [`TemplateSet::load_dir`]
pub const TEMPLATE_EXTENSIONS: [&str; 3] = ["html", "j2", "jinja"];

/// Compiled templates addressed by name
///
/// Sources are compiled with minijinja with HTML auto-escaping on for every
/// template, whatever its name. Callers with another template engine can
/// register its output as closures via [`TemplateSet::register_fn`]; those
/// receive plain JSON and do their own escaping.
/// Built during setup, then frozen behind an `Arc` in the renderer.
pub struct TemplateSet {
    env: Environment<'static>,
    functions: HashMap<String, TemplateFn>,
    names: BTreeSet<String>,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateSet")
            .field("names", &self.names)
            .finish()
    }
}

impl TemplateSet {
    #[must_use]
    pub fn new() -> Self {
        let mut env = Environment::new();
        // Names carry no extension, so the default by-suffix rule never fires
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        Self {
            env,
            functions: HashMap::new(),
            names: BTreeSet::new(),
        }
    }

    /// Compile `source` and store it under `name`, replacing any previous template
    ///
    /// # Errors
    ///
    /// `DispatchError::Configuration` if the source does not parse.
    pub fn compile(&mut self, name: &str, source: &str) -> Result<(), DispatchError> {
        self.functions.remove(name);
        self.env
            .add_template_owned(name.to_string(), source.to_string())
            .map_err(|e| DispatchError::configuration(format!("template '{name}': {e}")))?;
        self.names.insert(name.to_string());
        debug!(template = %name, "Template compiled");
        Ok(())
    }

    /// Store an already compiled template function under `name`
    pub fn register_fn<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&Value) -> Result<String, DispatchError> + Send + Sync + 'static,
    {
        self.env.remove_template(name);
        self.functions.insert(name.to_string(), Arc::new(f));
        self.names.insert(name.to_string());
    }

    /// Compile every template file below `root`
    ///
    /// A file at `root/foo/bar.html` is registered as `foo/bar`.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be walked, a file cannot be read, or a
    /// template does not compile.
    pub fn load_dir<P: AsRef<Path>>(&mut self, root: P) -> Result<usize> {
        let root = root.as_ref();
        let mut loaded = 0;

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
            let path = entry.path();
            let is_template = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| TEMPLATE_EXTENSIONS.contains(&e));
            if !entry.file_type().is_file() || !is_template {
                continue;
            }

            let rel = path
                .strip_prefix(root)
                .with_context(|| format!("{} is outside {}", path.display(), root.display()))?
                .with_extension("");
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let source = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read template {}", path.display()))?;
            self.compile(&name, &source)?;
            loaded += 1;
        }

        info!(
            dir = %root.display(),
            templates_count = loaded,
            "Templates preloaded"
        );
        Ok(loaded)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Registered template names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Render the template called `name` with `data`
    ///
    /// # Errors
    ///
    /// `DispatchError::Render` if the template was never compiled or fails
    /// while rendering.
    pub fn render<S: Serialize + ?Sized>(&self, name: &str, data: &S) -> Result<String, DispatchError> {
        if let Some(f) = self.functions.get(name) {
            let data = serde_json::to_value(data)
                .map_err(|e| DispatchError::render(format!("template '{name}' data: {e}")))?;
            return f(&data);
        }
        if !self.names.contains(name) {
            return Err(DispatchError::render(format!("template '{name}' not found")));
        }
        let template = self
            .env
            .get_template(name)
            .map_err(|e| DispatchError::render(format!("template '{name}': {e}")))?;
        template
            .render(data)
            .map_err(|e| DispatchError::render(format!("template '{name}' failed: {e}")))
    }
}
