//! TOML configuration for the template system
//!
//! ```toml
//! [templates]
//! reload = true
//!
//! [extensions]
//! tpl = "erb"
//!
//! [assigns]
//! title = "Hello"
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::engine::{TemplateEngine, Verbatim};
use crate::erb::Erb;
use crate::value::Value;

/// Errors that can occur when loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Unknown template engine '{engine}' for extension '{extension}'")]
    UnknownEngine { extension: String, engine: String },
}

/// Template system settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateConfig {
    /// Recompile templates on every `template_for` lookup
    pub reload_templates: bool,
    /// Extra extension -> built-in engine name
    pub extensions: BTreeMap<String, String>,
    /// Default `@assigns`
    pub assigns: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct TomlConfig {
    templates: Option<TomlTemplates>,
    #[serde(default)]
    extensions: BTreeMap<String, String>,
    #[serde(default)]
    assigns: BTreeMap<String, toml::Value>,
}

#[derive(Deserialize)]
struct TomlTemplates {
    #[serde(default)]
    reload: bool,
}

impl TemplateConfig {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load config from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let parsed: TomlConfig = toml::from_str(content)?;

        for (extension, engine) in &parsed.extensions {
            if builtin_engine(engine).is_none() {
                return Err(ConfigError::UnknownEngine {
                    extension: extension.clone(),
                    engine: engine.clone(),
                });
            }
        }

        Ok(TemplateConfig {
            reload_templates: parsed.templates.map(|t| t.reload).unwrap_or(false),
            extensions: parsed
                .extensions
                .into_iter()
                .map(|(ext, engine)| (ext.trim_start_matches('.').to_string(), engine))
                .collect(),
            assigns: parsed
                .assigns
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect(),
        })
    }

    /// Engines for the configured extensions, in extension order
    pub fn engines(&self) -> impl Iterator<Item = (&str, Arc<dyn TemplateEngine>)> {
        self.extensions.iter().filter_map(|(ext, engine)| {
            builtin_engine(engine).map(|engine| (ext.as_str(), engine))
        })
    }
}

/// Look up a built-in engine by name
pub fn builtin_engine(name: &str) -> Option<Arc<dyn TemplateEngine>> {
    match name {
        "erb" => Some(Arc::new(Erb)),
        "verbatim" => Some(Arc::new(Verbatim)),
        _ => None,
    }
}
