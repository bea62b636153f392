//! Integration tests for engine registration and template inlining

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use templar::engine::same_engine;
use templar::{
    engine_for, inline_template, register_extensions, template_name, CompiledMethod, Environment,
    ErrorKind, Frame, HostModule, RenderError, TemplateEngine, TemplateError,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("templates")
        .join(name)
}

/// Copies the text of the template, joining its lines
#[derive(Debug)]
struct MyTemplateEngine;

#[derive(Debug)]
struct MyTemplate {
    path: PathBuf,
    text: String,
}

impl CompiledMethod for MyTemplate {
    fn source_path(&self) -> &Path {
        &self.path
    }

    fn call(&self, frame: &mut Frame<'_>) -> Result<(), RenderError> {
        frame.write(&self.text);
        Ok(())
    }
}

impl TemplateEngine for MyTemplateEngine {
    fn name(&self) -> &str {
        "my_template"
    }

    fn compile_template(
        &self,
        path: &Path,
        name: &str,
        host: &mut HostModule,
    ) -> Result<(), TemplateError> {
        let text = std::fs::read_to_string(path).map_err(|e| TemplateError::io(path, e))?;
        host.define_method(
            name,
            Arc::new(MyTemplate {
                path: path.to_path_buf(),
                text: text.lines().collect(),
            }),
        );
        Ok(())
    }
}

fn register_my_template() -> Arc<dyn TemplateEngine> {
    let engine: Arc<dyn TemplateEngine> = Arc::new(MyTemplateEngine);
    register_extensions(Arc::clone(&engine), ["myt"]);
    engine
}

fn render_template(path: &Path) -> Result<String, RenderError> {
    let mut host = HostModule::new("MyHelpers");
    templar::helpers::install(&mut host);
    let name = inline_template(path, &mut host).expect("Should inline");
    assert_eq!(name, template_name(path));
    Environment::new(&host).send(&name)
}

#[test]
fn test_register_extensions() {
    let engine = register_my_template();
    let found = engine_for(Path::new("foo.myt")).expect("Should resolve");
    assert!(same_engine(found.as_ref(), engine.as_ref()));
}

#[test]
fn test_inline_custom_engine() {
    register_my_template();
    let out = render_template(&fixture("template.html.myt")).unwrap();
    assert_eq!(out, "Hello world!");
}

#[test]
fn test_inline_erb() {
    let out = render_template(&fixture("template.html.erb")).unwrap();
    assert_eq!(out, "Hello world!");
}

#[test]
fn test_errors_report_template_line() {
    let err = render_template(&fixture("error.html.erb")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NameError);
    assert!(err.message.contains("`foo'"));

    let location = err.location().expect("Should carry a location");
    assert_eq!(location.short(), "error.html.erb:2");
    assert_eq!(location.file, fixture("error.html.erb"));
    assert_eq!(location.label, template_name(&fixture("error.html.erb")));
}

#[test]
fn test_inlined_method_is_callable() {
    let mut host = HostModule::new("MyHelpers");
    let name = inline_template(&fixture("template.html.erb"), &mut host).unwrap();
    assert!(Environment::new(&host).respond_to(&name));
}

#[test]
fn test_inlining_twice_keeps_one_method() {
    let mut host = HostModule::new("MyHelpers");
    let path = fixture("template.html.erb");
    let first = inline_template(&path, &mut host).unwrap();
    let second = inline_template(&path, &mut host).unwrap();
    assert_eq!(first, second);
    assert_eq!(host.method_names(), vec![first.as_str()]);
}

#[test]
fn test_template_name_ignores_path_spelling() {
    let direct = fixture("template.html.erb");
    let roundabout = fixture("../templates/./template.html.erb");
    assert_eq!(template_name(&direct), template_name(&roundabout));
    assert!(template_name(&direct).ends_with("__templates__template_html_erb"));
}

#[test]
fn test_unknown_extension() {
    let mut host = HostModule::new("MyHelpers");
    let err = inline_template(Path::new("page.unregistered"), &mut host).unwrap_err();
    assert!(matches!(err, TemplateError::NoEngine { .. }));
}

#[test]
fn test_verbatim_engine_ignores_tags() {
    let out = render_template(&fixture("notes.txt")).unwrap();
    assert_eq!(out, "Plain text for <%= nobody %>");
}
