//! Template engine plugin contract
//!
//! An engine turns a template file into a [`CompiledMethod`] and defines it on a
//! [`HostModule`] under a generated name. Engines that want to interoperate with
//! the `concat` and `capture` helpers also expose a [`Mixin`].

mod verbatim;

use std::fmt;
use std::path::Path;

use crate::error::{RenderError, TemplateError};
use crate::host::{Frame, HostModule};

pub use verbatim::Verbatim;

/// A pluggable template engine
pub trait TemplateEngine: Send + Sync + fmt::Debug {
    /// Short name used in configuration and logs
    fn name(&self) -> &str;

    /// Compile the template at `path` and define it on `host` as `name`
    ///
    /// `path` is already expanded. Runtime errors raised by the defined method
    /// must point at lines of `path`.
    fn compile_template(
        &self,
        path: &Path,
        name: &str,
        host: &mut HostModule,
    ) -> Result<(), TemplateError>;

    /// Buffer and capture support for helpers
    fn mixin(&self) -> Option<&'static dyn Mixin> {
        None
    }
}

/// Buffer access for helpers running inside a compiled method
pub trait Mixin: Send + Sync {
    /// The buffer the running method writes its output to
    fn buffer<'f>(&self, frame: &'f mut Frame<'_>) -> &'f mut String;

    /// Run `block` and return what it wrote, leaving the current buffer untouched
    fn capture<'e>(
        &self,
        frame: &mut Frame<'e>,
        block: &mut dyn FnMut(&mut Frame<'e>) -> Result<(), RenderError>,
    ) -> Result<String, RenderError>;
}

/// A rendering method generated from a template
pub trait CompiledMethod: Send + Sync + fmt::Debug {
    /// Template file the method was compiled from
    fn source_path(&self) -> &Path;

    /// Run the method, writing output into the frame's buffer
    fn call(&self, frame: &mut Frame<'_>) -> Result<(), RenderError>;
}

/// Whether two engine handles refer to the same engine instance
pub fn same_engine(a: &dyn TemplateEngine, b: &dyn TemplateEngine) -> bool {
    std::ptr::addr_eq(a as *const dyn TemplateEngine, b as *const dyn TemplateEngine)
}
