//! Error types for template lookup, compilation and rendering

use std::fmt;
use std::path::{Path, PathBuf};

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

pub use crate::source::Span;

/// Syntax error inside a template, located by byte span
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },
}

impl ParseError {
    pub fn syntax(span: Span, message: impl Into<String>) -> Self {
        ParseError::Syntax {
            span,
            message: message.into(),
            expected: Vec::new(),
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            ParseError::Syntax { span, .. } => span,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        match self {
            ParseError::Syntax {
                span,
                message,
                expected,
            } => {
                let expected_str = if expected.is_empty() {
                    String::new()
                } else {
                    format!("\nExpected: {}", expected.join(", "))
                };
                let label = format!("{}{}", message, expected_str);
                render_report(source, filename, span.clone(), message, &label)
            }
        }
    }
}

impl<'a> From<chumsky::error::Rich<'a, crate::erb::lexer::Token>> for ParseError {
    fn from(err: chumsky::error::Rich<'a, crate::erb::lexer::Token>) -> Self {
        use chumsky::error::{RichPattern, RichReason};

        let message = match err.reason() {
            RichReason::ExpectedFound { found, .. } => match found {
                Some(tok) => format!("Unexpected {}", tok.describe()),
                None => "Unexpected end of tag".to_string(),
            },
            RichReason::Custom(msg) => msg.to_string(),
        };

        let expected: Vec<String> = err
            .expected()
            .filter_map(|e| match e {
                RichPattern::Token(tok) => Some(tok.describe()),
                RichPattern::Label(label) => Some(label.to_string()),
                RichPattern::EndOfInput => Some("end of tag".to_string()),
                RichPattern::Identifier(s) => Some(format!("identifier '{}'", s)),
                RichPattern::Any => Some("any token".to_string()),
                RichPattern::SomethingElse => None,
            })
            .collect();

        // Errors at the end of a tag can carry a reversed span
        let span = err.span().into_range();
        ParseError::Syntax {
            span: span.start.min(span.end)..span.start.max(span.end),
            message,
            expected,
        }
    }
}

/// Errors raised while resolving or compiling a template
#[derive(Debug, Error)]
pub enum TemplateError {
    /// No engine registered for the path's extension
    #[error("no template engine registered for {} (extension: {})", path.display(), extension.as_deref().unwrap_or("<none>"))]
    NoEngine {
        path: PathBuf,
        extension: Option<String>,
    },

    /// Template file could not be read
    #[error("error reading template file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Template source failed to parse
    #[error("syntax errors in {}: {}", path.display(), format_parse_errors(errors))]
    Parse {
        path: PathBuf,
        source_text: String,
        errors: Vec<ParseError>,
    },
}

impl TemplateError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TemplateError::Io {
            path: path.into(),
            source,
        }
    }

    /// Render source-annotated reports for syntax errors
    ///
    /// Errors without source context fall back to their display form.
    pub fn report(&self) -> String {
        match self {
            TemplateError::Parse {
                path,
                source_text,
                errors,
            } => {
                let filename = path.display().to_string();
                errors
                    .iter()
                    .map(|e| e.format(source_text, &filename))
                    .collect::<Vec<_>>()
                    .join("")
            }
            other => other.to_string(),
        }
    }
}

fn format_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Class of a runtime failure inside a generated method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NameError,
    NoMethodError,
    TypeError,
    ArgumentError,
    ZeroDivisionError,
    RuntimeError,
    SystemStackError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NameError => "NameError",
            ErrorKind::NoMethodError => "NoMethodError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ArgumentError => "ArgumentError",
            ErrorKind::ZeroDivisionError => "ZeroDivisionError",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::SystemStackError => "SystemStackError",
        };
        f.write_str(name)
    }
}

/// A frame of a render backtrace, pointing into a template file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    /// 1-based line in `file`
    pub line: usize,
    /// Byte span of the failing expression, when known
    pub span: Option<Span>,
    /// Generated method the frame belongs to
    pub label: String,
}

impl Location {
    /// `file:line`, using only the file name
    pub fn short(&self) -> String {
        let name = self
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file.display().to_string());
        format!("{}:{}", name, self.line)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:in `{}'", self.file.display(), self.line, self.label)
    }
}

/// Failure while running a generated method
#[derive(Debug, Clone)]
pub struct RenderError {
    pub kind: ErrorKind,
    pub message: String,
    /// Innermost frame first
    pub backtrace: Vec<Location>,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.backtrace.first() {
            Some(loc) => write!(f, "{}: {} ({})", loc, self.message, self.kind),
            None => write!(f, "{} ({})", self.message, self.kind),
        }
    }
}

impl std::error::Error for RenderError {}

impl RenderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            backtrace: Vec::new(),
        }
    }

    pub fn undefined_name(name: &str) -> Self {
        Self::new(
            ErrorKind::NameError,
            format!("undefined local variable or method `{}'", name),
        )
    }

    pub fn undefined_method(name: &str) -> Self {
        Self::new(ErrorKind::NoMethodError, format!("undefined method `{}'", name))
    }

    pub fn undefined_method_for(name: &str, receiver: &str) -> Self {
        Self::new(
            ErrorKind::NoMethodError,
            format!("undefined method `{}' for {}", name, receiver),
        )
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    pub fn wrong_arguments(given: usize, expected: usize) -> Self {
        Self::new(
            ErrorKind::ArgumentError,
            format!(
                "wrong number of arguments (given {}, expected {})",
                given, expected
            ),
        )
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RuntimeError, message)
    }

    /// Append a frame on the way out of a generated method
    pub fn with_frame(mut self, location: Location) -> Self {
        self.backtrace.push(location);
        self
    }

    /// Where the error was raised, if it passed through a template
    pub fn location(&self) -> Option<&Location> {
        self.backtrace.first()
    }

    /// Render the innermost frame against its template source using ariadne
    ///
    /// Returns `None` when the error carries no span.
    pub fn report(&self, source: &str) -> Option<String> {
        let loc = self.backtrace.first()?;
        let span = loc.span.clone()?;
        let filename = loc.file.display().to_string();
        let message = format!("{}: {}", self.kind, self.message);
        Some(render_report(source, &filename, span, &message, &self.message))
    }

    /// Like [`RenderError::report`], reading the template from disk
    pub fn report_from_file(&self) -> Option<String> {
        let loc = self.backtrace.first()?;
        let source = read_lossy(&loc.file)?;
        self.report(&source)
    }
}

fn read_lossy(path: &Path) -> Option<String> {
    std::fs::read(path)
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Char offset of byte `offset`, clamped to the source
fn char_offset(source: &str, offset: usize) -> usize {
    source
        .char_indices()
        .take_while(|&(i, _)| i < offset)
        .count()
}

fn render_report(source: &str, filename: &str, span: Span, message: &str, label: &str) -> String {
    // ariadne counts chars, spans count bytes
    let start = char_offset(source, span.start.min(span.end));
    let end = char_offset(source, span.start.max(span.end));
    let span = start..end;
    let mut buf = Vec::new();
    let written = Report::build(ReportKind::Error, filename, span.start)
        .with_message(message)
        .with_label(
            Label::new((filename, span))
                .with_message(label)
                .with_color(Color::Red),
        )
        .finish()
        .write((filename, Source::from(source)), &mut buf);
    match written {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => format!("{}: {}", filename, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(line: usize) -> Location {
        Location {
            file: PathBuf::from("/app/views/error.html.erb"),
            line,
            span: Some(4..7),
            label: "render_error".to_string(),
        }
    }

    #[test]
    fn test_undefined_name_message() {
        let err = RenderError::undefined_name("foo");
        assert_eq!(err.kind, ErrorKind::NameError);
        assert!(err.message.contains("`foo'"));
    }

    #[test]
    fn test_location_display() {
        let loc = location(2);
        assert_eq!(
            loc.to_string(),
            "/app/views/error.html.erb:2:in `render_error'"
        );
        assert_eq!(loc.short(), "error.html.erb:2");
    }

    #[test]
    fn test_backtrace_is_innermost_first() {
        let err = RenderError::runtime("boom")
            .with_frame(location(2))
            .with_frame(location(9));
        assert_eq!(err.location().map(|l| l.line), Some(2));
        assert!(err.to_string().starts_with("/app/views/error.html.erb:2"));
    }

    #[test]
    fn test_report_points_at_source() {
        let err = RenderError::undefined_name("foo").with_frame(location(2));
        let report = err.report("ab\n<%=foo%>\n").expect("should have a report");
        assert!(report.contains("NameError"));
        assert!(report.contains("error.html.erb"));
    }

    #[test]
    fn test_no_engine_display() {
        let err = TemplateError::NoEngine {
            path: PathBuf::from("foo.xyz"),
            extension: Some("xyz".to_string()),
        };
        assert!(err.to_string().contains("xyz"));
    }

    #[test]
    fn test_char_offset() {
        assert_eq!(char_offset("ab", 1), 1);
        assert_eq!(char_offset("éa", 2), 1);
        assert_eq!(char_offset("éa", 1), 1);
        assert_eq!(char_offset("ab", 10), 2);
    }

    #[test]
    fn test_report_after_multibyte_text() {
        let source = "ééééééééééé <%= foo %>";
        let start = source.find("foo").unwrap();
        let err = RenderError::undefined_name("foo").with_frame(Location {
            file: PathBuf::from("accents.html.erb"),
            line: 1,
            span: Some(start..start + 3),
            label: "render_accents".to_string(),
        });
        let report = err.report(source).expect("should have a report");
        assert!(report.contains("ééééééééééé"));
        assert!(report.contains("undefined local variable"));
    }

    #[test]
    fn test_report_with_reversed_span() {
        let err = ParseError::syntax(8..7, "Unexpected end of tag");
        let report = err.format("<%= 1 + %>", "sum.html.erb");
        assert!(report.contains("Unexpected end of tag"));
    }
}
