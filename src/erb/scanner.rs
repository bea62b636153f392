//! Splits ERB source into literal text and tags

use crate::error::ParseError;
use crate::source::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `<%= %>`
    Output,
    /// `<% %>` and `<%- %>`
    Code,
    /// `<%# %>`
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text { text: String, span: Span },
    Tag {
        kind: TagKind,
        /// Byte span of the code between the delimiters
        code: Span,
        /// Byte span of the whole tag, delimiters included
        span: Span,
    },
}

/// Scan `source` into segments
///
/// `<%%` becomes a literal `<%`, and `-%>` swallows the line break that follows
/// the tag. `<%-` drops indentation before the tag on its line.
pub fn scan(source: &str) -> Result<Vec<Segment>, ParseError> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut text_start = 0;
    let mut pos = 0;

    while let Some(found) = source[pos..].find("<%") {
        let open = pos + found;
        if text.is_empty() {
            text_start = pos;
        }
        text.push_str(&source[pos..open]);

        let rest = &source[open + 2..];
        if rest.starts_with('%') {
            text.push_str("<%");
            pos = open + 3;
            continue;
        }

        let (kind, code_start) = match rest.chars().next() {
            Some('=') => (TagKind::Output, open + 3),
            Some('#') => (TagKind::Comment, open + 3),
            Some('-') => {
                trim_indentation(&mut text);
                (TagKind::Code, open + 3)
            }
            _ => (TagKind::Code, open + 2),
        };

        let close = source[code_start..]
            .find("%>")
            .map(|i| code_start + i)
            .ok_or_else(|| {
                ParseError::syntax(open..source.len(), "unterminated tag, expected '%>'")
            })?;

        let trim = close > code_start && source.as_bytes()[close - 1] == b'-';
        let code_end = if trim { close - 1 } else { close };
        pos = close + 2;
        if trim {
            if source[pos..].starts_with("\r\n") {
                pos += 2;
            } else if source[pos..].starts_with('\n') {
                pos += 1;
            }
        }

        if !text.is_empty() {
            segments.push(Segment::Text {
                text: std::mem::take(&mut text),
                span: text_start..open,
            });
        }
        segments.push(Segment::Tag {
            kind,
            code: code_start..code_end,
            span: open..close + 2,
        });
    }

    if text.is_empty() {
        text_start = pos;
    }
    text.push_str(&source[pos..]);
    if !text.is_empty() {
        segments.push(Segment::Text {
            text,
            span: text_start..source.len(),
        });
    }
    Ok(segments)
}

/// Remove spaces and tabs after the last line break
fn trim_indentation(text: &mut String) {
    let kept = text.trim_end_matches([' ', '\t']).len();
    let line_start = text.rfind('\n').map(|i| i + 1).unwrap_or(0);
    if kept == line_start {
        text.truncate(kept);
    }
}
