//! Host modules that receive generated methods, and the instances that call them

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::engine::{CompiledMethod, Mixin};
use crate::error::{ErrorKind, RenderError};
use crate::value::Value;

/// Maximum nesting of generated methods calling each other
pub const MAX_CALL_DEPTH: usize = 64;

type HelperFn = dyn Fn(&mut Frame<'_>, &[Value]) -> Result<Value, RenderError> + Send + Sync;

/// A helper function callable from templates
#[derive(Clone)]
pub struct Helper(Arc<HelperFn>);

impl Helper {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Frame<'_>, &[Value]) -> Result<Value, RenderError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, frame: &mut Frame<'_>, args: &[Value]) -> Result<Value, RenderError> {
        (self.0)(frame, args)
    }
}

impl fmt::Debug for Helper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Helper(..)")
    }
}

/// Namespace holding generated rendering methods and helpers
#[derive(Debug, Default)]
pub struct HostModule {
    name: String,
    methods: HashMap<String, Arc<dyn CompiledMethod>>,
    helpers: HashMap<String, Helper>,
}

impl HostModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: HashMap::new(),
            helpers: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Define (or redefine) a generated method
    pub fn define_method(&mut self, name: impl Into<String>, method: Arc<dyn CompiledMethod>) {
        self.methods.insert(name.into(), method);
    }

    pub fn remove_method(&mut self, name: &str) -> Option<Arc<dyn CompiledMethod>> {
        self.methods.remove(name)
    }

    pub fn method(&self, name: &str) -> Option<&Arc<dyn CompiledMethod>> {
        self.methods.get(name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Names of all generated methods, sorted
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Define a helper; a later definition with the same name replaces it
    pub fn define_helper<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&mut Frame<'_>, &[Value]) -> Result<Value, RenderError> + Send + Sync + 'static,
    {
        self.helpers.insert(name.into(), Helper::new(f));
    }

    pub fn helper(&self, name: &str) -> Option<&Helper> {
        self.helpers.get(name)
    }
}

/// An instance of a host module that generated methods are invoked on
#[derive(Debug)]
pub struct Environment<'h> {
    host: &'h HostModule,
    assigns: BTreeMap<String, Value>,
}

impl<'h> Environment<'h> {
    pub fn new(host: &'h HostModule) -> Self {
        Self {
            host,
            assigns: BTreeMap::new(),
        }
    }

    /// Set an `@assign` visible to every method run through this instance
    pub fn assign(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.assigns.insert(key.into(), value.into());
    }

    pub fn with_assign(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assign(key, value);
        self
    }

    pub fn assigns(&self) -> &BTreeMap<String, Value> {
        &self.assigns
    }

    pub fn respond_to(&self, name: &str) -> bool {
        self.host.has_method(name) || self.host.helper(name).is_some()
    }

    /// Invoke a generated method by name and return its output
    pub fn send(&self, name: &str) -> Result<String, RenderError> {
        let mut frame = Frame::new(self.host, &self.assigns, 0);
        frame.call_method(name)
    }
}

/// Execution context of one generated method call
pub struct Frame<'e> {
    host: &'e HostModule,
    assigns: &'e BTreeMap<String, Value>,
    locals: HashMap<String, Value>,
    buffer: String,
    mixin: Option<&'static dyn Mixin>,
    depth: usize,
}

impl<'e> Frame<'e> {
    fn new(host: &'e HostModule, assigns: &'e BTreeMap<String, Value>, depth: usize) -> Self {
        Self {
            host,
            assigns,
            locals: HashMap::new(),
            buffer: String::new(),
            mixin: None,
            depth,
        }
    }

    pub fn host(&self) -> &'e HostModule {
        self.host
    }

    pub fn assign(&self, key: &str) -> Option<&'e Value> {
        self.assigns.get(key)
    }

    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    pub fn set_local(&mut self, name: impl Into<String>, value: Value) {
        self.locals.insert(name.into(), value);
    }

    /// Output written so far
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut String {
        &mut self.buffer
    }

    /// Replace the output buffer, returning the old one
    pub fn swap_buffer(&mut self, buffer: String) -> String {
        std::mem::replace(&mut self.buffer, buffer)
    }

    pub fn write(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Mixin of the engine that compiled the running method
    pub fn mixin(&self) -> Option<&'static dyn Mixin> {
        self.mixin
    }

    pub fn set_mixin(&mut self, mixin: Option<&'static dyn Mixin>) {
        self.mixin = mixin;
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Call another generated method of the same host and return its output
    pub fn call_method(&mut self, name: &str) -> Result<String, RenderError> {
        let method = self
            .host
            .method(name)
            .ok_or_else(|| RenderError::undefined_method(name))?;
        if self.depth >= MAX_CALL_DEPTH {
            warn!(method = name, depth = self.depth, "template call depth exceeded");
            return Err(RenderError::new(
                ErrorKind::SystemStackError,
                "stack level too deep",
            ));
        }
        let mut child = Frame::new(self.host, self.assigns, self.depth + 1);
        method.call(&mut child)?;
        Ok(child.buffer)
    }
}

impl fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("host", &self.host.name)
            .field("locals", &self.locals)
            .field("depth", &self.depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    #[derive(Debug)]
    struct Echo {
        path: PathBuf,
        text: &'static str,
    }

    impl CompiledMethod for Echo {
        fn source_path(&self) -> &Path {
            &self.path
        }

        fn call(&self, frame: &mut Frame<'_>) -> Result<(), RenderError> {
            frame.write(self.text);
            if let Some(Value::Str(who)) = frame.assign("who") {
                frame.write(who);
            }
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Recurse;

    impl CompiledMethod for Recurse {
        fn source_path(&self) -> &Path {
            Path::new("recurse")
        }

        fn call(&self, frame: &mut Frame<'_>) -> Result<(), RenderError> {
            frame.call_method("recurse").map(|_| ())
        }
    }

    fn echo(text: &'static str) -> Arc<dyn CompiledMethod> {
        Arc::new(Echo {
            path: PathBuf::from("echo.txt"),
            text,
        })
    }

    #[test]
    fn test_define_and_send() {
        let mut host = HostModule::new("Views");
        host.define_method("greet", echo("hello "));
        let env = Environment::new(&host).with_assign("who", "bob");
        assert_eq!(env.send("greet").unwrap(), "hello bob");
    }

    #[test]
    fn test_redefine_replaces() {
        let mut host = HostModule::new("Views");
        host.define_method("greet", echo("a"));
        host.define_method("greet", echo("b"));
        assert_eq!(host.method_names(), vec!["greet"]);
        assert_eq!(Environment::new(&host).send("greet").unwrap(), "b");
    }

    #[test]
    fn test_respond_to() {
        let mut host = HostModule::new("Views");
        host.define_method("greet", echo("a"));
        host.define_helper("shout", |_, _| Ok(Value::Nil));
        let env = Environment::new(&host);
        assert!(env.respond_to("greet"));
        assert!(env.respond_to("shout"));
        assert!(!env.respond_to("missing"));
    }

    #[test]
    fn test_send_unknown_method() {
        let host = HostModule::new("Views");
        let err = Environment::new(&host).send("nope").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoMethodError);
    }

    #[test]
    fn test_recursion_is_bounded() {
        let mut host = HostModule::new("Views");
        host.define_method("recurse", Arc::new(Recurse));
        let err = Environment::new(&host).send("recurse").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SystemStackError);
    }
}
