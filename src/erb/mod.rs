//! Embedded-Ruby style template engine
//!
//! Templates mix literal text with `<%= expr %>` output tags and `<% stmt %>`
//! code tags. A template compiles into an [`ErbMethod`], which keeps the
//! template's line table so runtime errors report template lines.
//!
//! ```text
//! <h1><%= @title %></h1>
//! <% for item in items %>
//!   <li><%= item.upcase %></li>
//! <% end %>
//! ```

pub mod ast;
mod compiler;
mod eval;
pub mod grammar;
pub mod lexer;
mod methods;
pub mod scanner;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::engine::{CompiledMethod, Mixin, TemplateEngine};
use crate::error::{RenderError, TemplateError};
use crate::host::{Frame, HostModule};
use crate::source::LineIndex;

pub use compiler::compile;

/// The ERB engine
#[derive(Debug, Default, Clone, Copy)]
pub struct Erb;

impl TemplateEngine for Erb {
    fn name(&self) -> &str {
        "erb"
    }

    fn compile_template(
        &self,
        path: &Path,
        name: &str,
        host: &mut HostModule,
    ) -> Result<(), TemplateError> {
        let source = std::fs::read_to_string(path).map_err(|e| TemplateError::io(path, e))?;
        let method = match compile(&source, path, name) {
            Ok(method) => method,
            Err(errors) => {
                return Err(TemplateError::Parse {
                    path: path.to_path_buf(),
                    source_text: source,
                    errors,
                })
            }
        };
        debug!(
            template = %path.display(),
            method = name,
            lines = method.lines.line_count(),
            "compiled erb template"
        );
        host.define_method(name, Arc::new(method));
        Ok(())
    }

    fn mixin(&self) -> Option<&'static dyn Mixin> {
        Some(&ErbMixin)
    }
}

/// Buffer and capture support for ERB methods
#[derive(Debug, Default, Clone, Copy)]
pub struct ErbMixin;

impl Mixin for ErbMixin {
    fn buffer<'f>(&self, frame: &'f mut Frame<'_>) -> &'f mut String {
        frame.buffer_mut()
    }

    fn capture<'e>(
        &self,
        frame: &mut Frame<'e>,
        block: &mut dyn FnMut(&mut Frame<'e>) -> Result<(), RenderError>,
    ) -> Result<String, RenderError> {
        let outer = frame.swap_buffer(String::new());
        let result = block(frame);
        let captured = frame.swap_buffer(outer);
        result.map(|()| captured)
    }
}

/// A compiled ERB template
#[derive(Debug)]
pub struct ErbMethod {
    name: String,
    path: PathBuf,
    lines: LineIndex,
    ops: Vec<compiler::Op>,
}

impl ErbMethod {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl CompiledMethod for ErbMethod {
    fn source_path(&self) -> &Path {
        &self.path
    }

    fn call(&self, frame: &mut Frame<'_>) -> Result<(), RenderError> {
        frame.set_mixin(Some(&ErbMixin));
        let cx = eval::Context {
            path: &self.path,
            name: &self.name,
            lines: &self.lines,
        };
        eval::exec(&self.ops, frame, &cx)
    }
}
