//! Registry mapping file extensions to template engines

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::engine::{same_engine, TemplateEngine};
use crate::error::TemplateError;

/// Registry of template engines by extension
#[derive(Debug, Default, Clone)]
pub struct EngineRegistry {
    engines: BTreeMap<String, Arc<dyn TemplateEngine>>,
}

impl EngineRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `engine` for each of `extensions`
    ///
    /// A later registration for the same extension replaces the earlier one.
    pub fn register_extensions<I, S>(&mut self, engine: Arc<dyn TemplateEngine>, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ext in extensions {
            let ext = ext.as_ref().trim_start_matches('.');
            let previous = self.engines.insert(ext.to_string(), Arc::clone(&engine));
            match previous {
                Some(old) if !same_engine(old.as_ref(), engine.as_ref()) => debug!(
                    extension = ext,
                    old = old.name(),
                    new = engine.name(),
                    "template engine replaced"
                ),
                Some(_) => {}
                None => debug!(
                    extension = ext,
                    engine = engine.name(),
                    "template engine registered"
                ),
            }
        }
    }

    /// The engine registered for `path`'s extension
    pub fn engine_for(&self, path: &Path) -> Result<Arc<dyn TemplateEngine>, TemplateError> {
        let extension = extension_of(path);
        extension
            .as_deref()
            .and_then(|ext| self.engines.get(ext))
            .cloned()
            .ok_or_else(|| TemplateError::NoEngine {
                path: path.to_path_buf(),
                extension,
            })
    }

    /// Engine registered for exactly `extension`
    pub fn get(&self, extension: &str) -> Option<&Arc<dyn TemplateEngine>> {
        self.engines.get(extension)
    }

    /// Registered extensions, sorted
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(|s| s.as_str())
    }

    /// `(extension, engine)` pairs, sorted by extension
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn TemplateEngine>)> {
        self.engines.iter().map(|(ext, engine)| (ext.as_str(), engine))
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

/// Text after the last `.` of the file name
pub fn extension_of(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || stem.is_empty() {
        return None;
    }
    Some(ext.to_string())
}
