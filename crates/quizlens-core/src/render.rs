//! Two-stage safe rendering of untrusted answer/recognition text.
//!
//! Pipeline, strictly ordered: HTML escaping, then markdown expansion (only
//! when the text looks markdown-flavored), then math delimiting. Escaping is
//! the sole XSS boundary and always runs first; math runs last so markdown
//! never mangles an already-wrapped formula.
//!
//! Not idempotent: feeding rendered output back through [`render`] will
//! double-escape it. Always render from the original raw text.

use pulldown_cmark::{Event, Options, Parser, html};

/// Render untrusted text to safe display markup.
pub fn render(raw: &str) -> String {
    let escaped = escape_html(raw);
    let expanded = if looks_like_markdown(raw) {
        expand_markdown(&escaped)
    } else {
        escaped.replace('\n', "<br>")
    };
    delimit_math(&expanded)
}

/// Escape every HTML-significant character to its entity form.
///
/// Math delimiters (`$`, `\(`, `\[`) and markdown punctuation are not
/// HTML-significant and pass through unchanged.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Heuristic used by the source UI: headings or bold markup mean markdown.
fn looks_like_markdown(raw: &str) -> bool {
    raw.starts_with("##") || raw.contains("\n##") || raw.contains("**")
}

/// Expand markdown syntax over already-escaped text.
///
/// The parser decodes our entities into plain text events and the HTML
/// writer re-escapes them, so escaped input is never double-escaped and
/// never reinterpreted as raw HTML. Raw-HTML events are downgraded to text;
/// soft breaks are hardened to match the source's `breaks: true` rendering.
fn expand_markdown(escaped: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(escaped, options).map(|event| match event {
        Event::Html(markup) => Event::Text(markup),
        Event::InlineHtml(markup) => Event::Text(markup),
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });

    let mut out = String::with_capacity(escaped.len() * 2);
    html::push_html(&mut out, parser);
    out
}

/// Wrap matched math delimiter spans in classed markup for a client-side
/// typesetter. Unmatched or malformed delimiters stay literal text.
fn delimit_math(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 64);
    let mut i = 0;
    while i < input.len() {
        let rest = &input[i..];

        let matched = if let Some(after) = rest.strip_prefix("$$") {
            close_span(after, "$$", false).map(|(inner, len)| (2 + len, inner, true))
        } else if let Some(after) = rest.strip_prefix("\\[") {
            close_span(after, "\\]", false).map(|(inner, len)| (2 + len, inner, true))
        } else if let Some(after) = rest.strip_prefix("\\(") {
            close_span(after, "\\)", false).map(|(inner, len)| (2 + len, inner, false))
        } else if let Some(after) = rest.strip_prefix('$') {
            close_span(after, "$", true).map(|(inner, len)| (1 + len, inner, false))
        } else {
            None
        };

        match matched {
            Some((consumed, inner, display)) => {
                let class = if display { "math math-display" } else { "math math-inline" };
                out.push_str("<span class=\"");
                out.push_str(class);
                out.push_str("\">");
                out.push_str(inner);
                out.push_str("</span>");
                i += consumed;
            }
            None => {
                let ch = rest.chars().next().expect("non-empty remainder");
                out.push(ch);
                i += ch.len_utf8();
            }
        }
    }
    out
}

/// Find the closing delimiter for a math span. The span must be non-empty
/// and may not cross a line break or markup tag, matching how the source's
/// auto-renderer only ever scanned within one text node. `tight` spans
/// (single `$`) additionally reject whitespace-padded content so currency
/// amounts in prose stay literal.
fn close_span<'a>(after: &'a str, closer: &str, tight: bool) -> Option<(&'a str, usize)> {
    let end = after.find(closer)?;
    let inner = &after[..end];
    if inner.is_empty() || inner.contains('\n') || inner.contains('<') {
        return None;
    }
    if tight && (inner.starts_with(char::is_whitespace) || inner.ends_with(char::is_whitespace)) {
        return None;
    }
    Some((inner, end + closer.len()))
}
