//! Engine that emits the template text as-is

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::{CompiledMethod, TemplateEngine};
use crate::error::{RenderError, TemplateError};
use crate::host::{Frame, HostModule};

/// Copies the template file into the output, minus its final line terminator
#[derive(Debug, Default, Clone, Copy)]
pub struct Verbatim;

#[derive(Debug)]
struct VerbatimMethod {
    path: PathBuf,
    text: String,
}

impl CompiledMethod for VerbatimMethod {
    fn source_path(&self) -> &Path {
        &self.path
    }

    fn call(&self, frame: &mut Frame<'_>) -> Result<(), RenderError> {
        frame.write(&self.text);
        Ok(())
    }
}

impl TemplateEngine for Verbatim {
    fn name(&self) -> &str {
        "verbatim"
    }

    fn compile_template(
        &self,
        path: &Path,
        name: &str,
        host: &mut HostModule,
    ) -> Result<(), TemplateError> {
        let mut text = std::fs::read_to_string(path).map_err(|e| TemplateError::io(path, e))?;
        strip_final_newline(&mut text);
        debug!(template = %path.display(), method = name, "compiled verbatim template");
        host.define_method(
            name,
            Arc::new(VerbatimMethod {
                path: path.to_path_buf(),
                text,
            }),
        );
        Ok(())
    }
}

fn strip_final_newline(text: &mut String) {
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_final_newline() {
        let mut s = "a\nb\r\n".to_string();
        strip_final_newline(&mut s);
        assert_eq!(s, "a\nb");

        let mut s = "a\n\n".to_string();
        strip_final_newline(&mut s);
        assert_eq!(s, "a\n");

        let mut s = "a".to_string();
        strip_final_newline(&mut s);
        assert_eq!(s, "a");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let mut host = HostModule::new("Views");
        let result = Verbatim.compile_template(Path::new("/nonexistent/x.txt"), "x", &mut host);
        assert!(matches!(result, Err(TemplateError::Io { .. })));
        assert!(!host.has_method("x"));
    }
}
