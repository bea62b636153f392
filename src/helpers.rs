//! Helpers available to every template of a host

use crate::error::RenderError;
use crate::host::HostModule;
use crate::value::Value;

/// Define the built-in helpers on `host`
pub fn install(host: &mut HostModule) {
    host.define_helper("h", |_, args| match args {
        [value] => Ok(Value::Str(escape_html(&value.to_string()))),
        _ => Err(RenderError::wrong_arguments(args.len(), 1)),
    });

    host.define_helper("concat", |frame, args| {
        let [value] = args else {
            return Err(RenderError::wrong_arguments(args.len(), 1));
        };
        let mixin = frame
            .mixin()
            .ok_or_else(|| RenderError::runtime("concat needs an engine with an output buffer"))?;
        mixin.buffer(frame).push_str(&value.to_string());
        Ok(Value::Nil)
    });

    host.define_helper("link_to", |_, args| match args {
        [text, url] => Ok(Value::Str(format!(
            "<a href=\"{}\">{}</a>",
            escape_html(&url.to_string()),
            text
        ))),
        _ => Err(RenderError::wrong_arguments(args.len(), 2)),
    });

    host.define_helper("raise", |_, args| match args {
        [] => Err(RenderError::runtime("unhandled exception")),
        [message] => Err(RenderError::runtime(message.to_string())),
        _ => Err(RenderError::wrong_arguments(args.len(), 1)),
    });
}

/// Escape `& < > " '` for HTML
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
