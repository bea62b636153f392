//! templar - pluggable template engines compiled into named methods
//!
//! Engines are registered per file extension. Inlining a template asks the
//! matching engine to compile it into a method on a [`HostModule`], named after
//! the template's path. Errors raised while the method runs point at lines of
//! the template file.
//!
//! # Example
//!
//! ```rust
//! use std::path::Path;
//! use std::sync::Arc;
//! use templar::{erb, helpers, Environment, HostModule};
//!
//! let mut host = HostModule::new("Views");
//! helpers::install(&mut host);
//!
//! let method = erb::compile(
//!     "<h1><%= h(@title) %></h1>\n<%= missing %>",
//!     Path::new("/views/page.html.erb"),
//!     "page",
//! )
//! .unwrap();
//! host.define_method("page", Arc::new(method));
//!
//! let env = Environment::new(&host).with_assign("title", "Fish & Chips");
//! let err = env.send("page").unwrap_err();
//! assert_eq!(err.location().unwrap().short(), "page.html.erb:2");
//! ```

pub mod config;
pub mod engine;
pub mod erb;
pub mod error;
pub mod helpers;
pub mod host;
pub mod source;
pub mod template;
pub mod value;

pub use config::{ConfigError, TemplateConfig};
pub use engine::{CompiledMethod, Mixin, TemplateEngine, Verbatim};
pub use erb::Erb;
pub use error::{ErrorKind, Location, ParseError, RenderError, TemplateError};
pub use host::{Environment, Frame, HostModule};
pub use template::{
    engine_for, inline_template, register_extensions, template_for, template_name, Template,
};
pub use value::Value;

use std::path::Path;

/// Inline the template at `path` on a fresh host with the built-in helpers
/// and render it with `assigns`
///
/// Uses `template` rather than the process-wide instance.
pub fn render_file<I, K, V>(
    template: &mut Template,
    path: &Path,
    assigns: I,
) -> Result<String, Error>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    let mut host = HostModule::new("Templates");
    helpers::install(&mut host);
    let name = template.inline_template(path, &mut host)?;

    let mut env = Environment::new(&host);
    for (key, value) in assigns {
        env.assign(key, value);
    }
    Ok(env.send(&name)?)
}

/// Either kind of template failure
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl Error {
    /// Source-annotated report when one can be produced, else the message
    pub fn report(&self) -> String {
        match self {
            Error::Template(err) => err.report(),
            Error::Render(err) => err
                .report_from_file()
                .unwrap_or_else(|| err.to_string()),
        }
    }
}
