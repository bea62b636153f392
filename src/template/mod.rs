//! Template lookup and inlining
//!
//! A [`Template`] owns the extension → engine registry and the list of methods
//! it has inlined. Inlining a template asks its engine to compile the file and
//! define a method on a [`HostModule`] under a name derived from the path:
//!
//! ```no_run
//! use std::path::Path;
//! use templar::{Environment, HostModule, Template};
//!
//! let mut template = Template::with_builtin_engines();
//! let mut host = HostModule::new("Views");
//! let name = template.inline_template(Path::new("views/index.html.erb"), &mut host)?;
//! let html = Environment::new(&host).send(&name)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The free functions of this module work on a process-wide instance that is
//! booted with the built-in engines on first use.

mod naming;
mod registry;

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::config::TemplateConfig;
use crate::engine::{TemplateEngine, Verbatim};
use crate::erb::Erb;
use crate::error::TemplateError;
use crate::host::HostModule;

pub use naming::{expand_path, template_name};
pub use registry::{extension_of, EngineRegistry};

/// Extensions handled by the ERB engine out of the box
pub const ERB_EXTENSIONS: [&str; 3] = ["erb", "erubis", "rhtml"];
/// Extensions handled by the verbatim engine out of the box
pub const VERBATIM_EXTENSIONS: [&str; 1] = ["txt"];

/// Engine registry plus the methods inlined through it
#[derive(Debug, Default)]
pub struct Template {
    registry: EngineRegistry,
    /// Expanded path without extension -> generated method name
    method_list: HashMap<PathBuf, String>,
    reload_templates: bool,
}

impl Template {
    /// An instance with no engines registered
    pub fn new() -> Self {
        Self::default()
    }

    /// An instance with the built-in engines registered
    pub fn with_builtin_engines() -> Self {
        let mut template = Self::new();
        template.boot();
        template
    }

    /// Built-in engines plus the engines and settings from `config`
    pub fn from_config(config: &TemplateConfig) -> Self {
        let mut template = Self::with_builtin_engines();
        template.apply_config(config);
        template
    }

    /// Register the built-in engines
    pub fn boot(&mut self) {
        self.registry.register_extensions(Arc::new(Erb), ERB_EXTENSIONS);
        self.registry.register_extensions(Arc::new(Verbatim), VERBATIM_EXTENSIONS);
    }

    pub fn apply_config(&mut self, config: &TemplateConfig) {
        for (extension, engine) in config.engines() {
            self.registry.register_extensions(engine, [extension]);
        }
        self.reload_templates = config.reload_templates;
    }

    pub fn reload_templates(&self) -> bool {
        self.reload_templates
    }

    pub fn set_reload_templates(&mut self, reload: bool) {
        self.reload_templates = reload;
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Register `engine` for `extensions`, replacing earlier registrations
    pub fn register_extensions<I, S>(&mut self, engine: Arc<dyn TemplateEngine>, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.registry.register_extensions(engine, extensions);
    }

    /// The engine for `path`'s final extension
    pub fn engine_for(&self, path: &Path) -> Result<Arc<dyn TemplateEngine>, TemplateError> {
        self.registry.engine_for(path)
    }

    /// Method name recorded for a path without its extension
    pub fn method_for(&self, path: &Path) -> Option<&str> {
        self.method_list.get(&expand_path(path)).map(|s| s.as_str())
    }

    /// Compile the template at `path` onto `host` and return the method name
    ///
    /// Inlining the same path again redefines the same method.
    pub fn inline_template(
        &mut self,
        path: &Path,
        host: &mut HostModule,
    ) -> Result<String, TemplateError> {
        let path = expand_path(path);
        let name = template_name(&path);
        let engine = self.engine_for(&path)?;

        engine.compile_template(&path, &name, host)?;
        self.method_list.insert(path.with_extension(""), name.clone());

        debug!(
            template = %path.display(),
            method = %name,
            engine = engine.name(),
            host = host.name(),
            "inlined template"
        );
        Ok(name)
    }

    /// Find and inline the template for a path given without its extension
    ///
    /// Registered extensions are tried in sorted order. Unless templates are
    /// reloaded, a method inlined earlier is reused as long as `host` still
    /// defines it. Returns `None` when no file matches.
    pub fn template_for(
        &mut self,
        path: &Path,
        host: &mut HostModule,
    ) -> Result<Option<String>, TemplateError> {
        let base = expand_path(path);

        if !self.reload_templates {
            if let Some(name) = self.method_list.get(&base) {
                if host.has_method(name) {
                    debug!(template = %base.display(), method = %name, "template cache hit");
                    return Ok(Some(name.clone()));
                }
            }
        }

        let found = self.registry.extensions().find_map(|ext| {
            let mut candidate = OsString::from(base.as_os_str());
            candidate.push(".");
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            candidate.is_file().then_some(candidate)
        });

        match found {
            Some(file) => {
                if self.reload_templates {
                    debug!(template = %file.display(), "reloading template");
                }
                self.inline_template(&file, host).map(Some)
            }
            None => Ok(None),
        }
    }
}

fn global() -> &'static RwLock<Template> {
    static TEMPLATE: OnceLock<RwLock<Template>> = OnceLock::new();
    TEMPLATE.get_or_init(|| RwLock::new(Template::with_builtin_engines()))
}

fn read() -> RwLockReadGuard<'static, Template> {
    global().read().unwrap_or_else(PoisonError::into_inner)
}

fn write() -> RwLockWriteGuard<'static, Template> {
    global().write().unwrap_or_else(PoisonError::into_inner)
}

/// Register `engine` for `extensions` on the process-wide instance
pub fn register_extensions<I, S>(engine: Arc<dyn TemplateEngine>, extensions: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    write().register_extensions(engine, extensions);
}

/// [`Template::engine_for`] on the process-wide instance
pub fn engine_for(path: &Path) -> Result<Arc<dyn TemplateEngine>, TemplateError> {
    read().engine_for(path)
}

/// [`Template::inline_template`] on the process-wide instance
pub fn inline_template(path: &Path, host: &mut HostModule) -> Result<String, TemplateError> {
    write().inline_template(path, host)
}

/// [`Template::template_for`] on the process-wide instance
pub fn template_for(path: &Path, host: &mut HostModule) -> Result<Option<String>, TemplateError> {
    write().template_for(path, host)
}

pub fn set_reload_templates(reload: bool) {
    write().set_reload_templates(reload);
}

/// Apply `config` to the process-wide instance
pub fn configure(config: &TemplateConfig) {
    write().apply_config(config);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CompiledMethod;
    use crate::error::RenderError;
    use crate::host::{Environment, Frame};
    use pretty_assertions::assert_eq;
    use std::fs;

    /// Emits the file name, so tests can tell which file was compiled
    #[derive(Debug)]
    struct NameEngine;

    #[derive(Debug)]
    struct NameMethod(PathBuf);

    impl CompiledMethod for NameMethod {
        fn source_path(&self) -> &Path {
            &self.0
        }

        fn call(&self, frame: &mut Frame<'_>) -> Result<(), RenderError> {
            let name = self.0.file_name().map(|n| n.to_string_lossy().into_owned());
            frame.write(&name.unwrap_or_default());
            Ok(())
        }
    }

    impl TemplateEngine for NameEngine {
        fn name(&self) -> &str {
            "name"
        }

        fn compile_template(
            &self,
            path: &Path,
            name: &str,
            host: &mut HostModule,
        ) -> Result<(), TemplateError> {
            host.define_method(name, Arc::new(NameMethod(path.to_path_buf())));
            Ok(())
        }
    }

    #[test]
    fn test_new_is_empty() {
        let template = Template::new();
        assert!(template.registry().is_empty());
        assert!(template.engine_for(Path::new("a.erb")).is_err());
    }

    #[test]
    fn test_builtin_engines() {
        let template = Template::with_builtin_engines();
        let names: Vec<String> = template
            .registry()
            .iter()
            .map(|(ext, engine)| format!("{}={}", ext, engine.name()))
            .collect();
        assert_eq!(names, vec!["erb=erb", "erubis=erb", "rhtml=erb", "txt=verbatim"]);
    }

    #[test]
    fn test_inline_template_records_method() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page.html.nm");
        fs::write(&file, "").unwrap();

        let mut template = Template::new();
        template.register_extensions(Arc::new(NameEngine), ["nm"]);
        let mut host = HostModule::new("Views");

        let name = template.inline_template(&file, &mut host).unwrap();
        assert_eq!(name, template_name(&file));
        assert!(host.has_method(&name));
        assert_eq!(
            template.method_for(&dir.path().join("page.html")),
            Some(name.as_str())
        );

        let again = template.inline_template(&file, &mut host).unwrap();
        assert_eq!(again, name);
        assert_eq!(host.method_names().len(), 1);
    }

    #[test]
    fn test_inline_unknown_extension() {
        let mut template = Template::new();
        let mut host = HostModule::new("Views");
        let err = template
            .inline_template(Path::new("/nowhere/x.zzz"), &mut host)
            .unwrap_err();
        assert!(matches!(err, TemplateError::NoEngine { .. }));
        assert!(host.method_names().is_empty());
    }

    #[test]
    fn test_inline_missing_file() {
        let mut template = Template::with_builtin_engines();
        let mut host = HostModule::new("Views");
        let err = template
            .inline_template(Path::new("/nowhere/x.erb"), &mut host)
            .unwrap_err();
        assert!(matches!(err, TemplateError::Io { .. }));
        assert_eq!(template.method_for(Path::new("/nowhere/x")), None);
        assert!(host.method_names().is_empty());
    }

    #[test]
    fn test_template_for_tries_sorted_extensions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("show.b"), "").unwrap();
        fs::write(dir.path().join("show.c"), "").unwrap();

        let mut template = Template::new();
        template.register_extensions(Arc::new(NameEngine), ["c", "a", "b"]);
        let mut host = HostModule::new("Views");

        let name = template
            .template_for(&dir.path().join("show"), &mut host)
            .unwrap()
            .expect("Should find show.b");
        assert_eq!(Environment::new(&host).send(&name).unwrap(), "show.b");
    }

    #[test]
    fn test_template_for_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut template = Template::with_builtin_engines();
        let mut host = HostModule::new("Views");
        assert_eq!(
            template.template_for(&dir.path().join("nothing"), &mut host).unwrap(),
            None
        );
    }

    #[test]
    fn test_template_for_caches_without_reload() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("note.txt");
        fs::write(&file, "first").unwrap();

        let mut template = Template::with_builtin_engines();
        let mut host = HostModule::new("Views");
        let base = dir.path().join("note");

        let name = template.template_for(&base, &mut host).unwrap().unwrap();
        fs::write(&file, "second").unwrap();
        let cached = template.template_for(&base, &mut host).unwrap().unwrap();
        assert_eq!(cached, name);
        assert_eq!(Environment::new(&host).send(&name).unwrap(), "first");

        template.set_reload_templates(true);
        template.template_for(&base, &mut host).unwrap();
        assert_eq!(Environment::new(&host).send(&name).unwrap(), "second");
    }

    #[test]
    fn test_template_for_recompiles_when_method_removed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("gone.txt"), "back").unwrap();

        let mut template = Template::with_builtin_engines();
        let mut host = HostModule::new("Views");
        let base = dir.path().join("gone");

        let name = template.template_for(&base, &mut host).unwrap().unwrap();
        host.remove_method(&name);
        assert_eq!(template.template_for(&base, &mut host).unwrap(), Some(name.clone()));
        assert!(host.has_method(&name));
    }

    #[test]
    fn test_from_config() {
        let config =
            TemplateConfig::from_str("[templates]\nreload = true\n[extensions]\ntpl = \"erb\"\n")
                .unwrap();
        let template = Template::from_config(&config);
        assert!(template.reload_templates());
        assert_eq!(
            template.engine_for(Path::new("x.tpl")).unwrap().name(),
            "erb"
        );
        assert!(template.engine_for(Path::new("x.erb")).is_ok());
    }

    #[test]
    fn test_global_instance_is_booted() {
        assert_eq!(engine_for(Path::new("a.erb")).unwrap().name(), "erb");
        register_extensions(Arc::new(NameEngine), ["globalnm"]);
        assert_eq!(engine_for(Path::new("a.globalnm")).unwrap().name(), "name");
    }

    #[test]
    fn test_global_configure_and_lookup() {
        let config = TemplateConfig::from_str("[extensions]\nglobaltpl = \"verbatim\"\n").unwrap();
        configure(&config);
        set_reload_templates(false);
        assert_eq!(
            engine_for(Path::new("x.globaltpl")).unwrap().name(),
            "verbatim"
        );

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("g.globaltpl"), "global\n").unwrap();
        let mut host = HostModule::new("Views");
        let name = template_for(&dir.path().join("g"), &mut host)
            .unwrap()
            .unwrap();
        assert_eq!(Environment::new(&host).send(&name).unwrap(), "global");
    }
}
