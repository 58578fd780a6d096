// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Document assembly for parsed conversations.
//!
//! This module combines the linearized message sequence with a document
//! shell to produce a complete export artifact: a self-contained HTML
//! document with inlined styling, or a Markdown document that references
//! assets by id instead of inlining them.
//!
//! # Example
//!
//! ```
//! use gpt2html::export::{export_html, HtmlOptions};
//! use gpt2html::parser::parse_conversation;
//! use gpt2html::renderer::AssetMap;
//!
//! let json = r#"{
//!     "title": "Demo",
//!     "mapping": {
//!         "a": {
//!             "parent": null,
//!             "message": {
//!                 "author": { "role": "user" },
//!                 "content": { "parts": ["hi"] }
//!             }
//!         }
//!     },
//!     "current_node": "a"
//! }"#;
//!
//! let conversation = parse_conversation(json).unwrap();
//! let html = export_html(&conversation, &HtmlOptions::default(), &AssetMap::new()).unwrap();
//! assert!(html.contains("<title>Demo</title>"));
//! ```

use crate::parser::{self, Conversation, Role};
use crate::renderer::{self, AssetMap};
use chrono::DateTime;
use snafu::prelude::*;
use std::fmt::Write;
use std::str::FromStr;

/// Error type for document assembly failures.
///
/// These are the only user-visible failures in the core: everything below
/// this layer degrades locally instead of erroring.
#[derive(Debug, Snafu)]
pub enum ExportError {
    /// The conversation linearized to zero renderable messages.
    #[snafu(display("conversation has no renderable messages"))]
    EmptyConversation,
}

/// Color scheme for the HTML document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    /// Light palette (default).
    #[default]
    Light,

    /// Dark palette.
    Dark,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(format!("unknown theme '{other}' (expected light or dark)")),
        }
    }
}

/// Configuration options for HTML document assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlOptions {
    /// Overrides the conversation title when set.
    pub title: Option<String>,

    /// The color scheme to embed.
    pub theme: Theme,

    /// Whether to enable the page-break and sizing rules used when the
    /// document is rasterized to PDF.
    pub pdf_mode: bool,
}

/// The fallback title for untitled conversations.
const DEFAULT_TITLE: &str = "ChatGPT Conversation";

/// Structural CSS embedded in every HTML export.
///
/// Palettes are CSS variables so the dark theme is a single class toggle;
/// the `.pdf-mode` rules keep code blocks, images, and headings from being
/// sliced across page boundaries during rasterization.
const STYLE: &str = "\
:root {
    color-scheme: light;
    --bg-color: #ffffff;
    --container-bg: #ffffff;
    --text-color: #1a1a1a;
    --heading-color: #111827;
    --user-label-color: #2563eb;
    --llm-label-color: #059669;
    --border-color: #e5e7eb;
    --code-bg: #f8fafc;
    --code-header-bg: #e2e8f0;
    --code-text: #475569;
    --quote-bg: #f8fafc;
    --quote-border: #e2e8f0;
    --quote-text: #334155;
    --timestamp-color: #9ca3af;
    --max-width: 850px;
}
.dark-mode {
    color-scheme: dark;
    --bg-color: #0f172a;
    --container-bg: #1e293b;
    --text-color: #f1f5f9;
    --heading-color: #f8fafc;
    --user-label-color: #60a5fa;
    --llm-label-color: #34d399;
    --border-color: #334155;
    --code-bg: #0f172a;
    --code-header-bg: #1e293b;
    --code-text: #94a3b8;
    --quote-bg: #1e293b;
    --quote-border: #334155;
    --quote-text: #cbd5e1;
    --timestamp-color: #64748b;
}
* { box-sizing: border-box; print-color-adjust: exact; }
body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif;
    line-height: 1.6;
    color: var(--text-color);
    background-color: var(--bg-color);
    margin: 0;
    padding: 0;
}
.container {
    max-width: var(--max-width);
    margin: 0 auto;
    background: var(--container-bg);
    padding: 60px;
    border-radius: 12px;
}
header { border-bottom: 2px solid var(--border-color); margin-bottom: 30px; padding-bottom: 20px; }
h1 { font-size: 2.25rem; font-weight: 700; margin: 0 0 1.5rem 0; color: var(--heading-color); }
h2 { font-size: 1.5rem; font-weight: 600; margin: 2.5rem 0 1.25rem 0; border-bottom: 1px solid var(--border-color); padding-bottom: 0.5rem; color: var(--heading-color); }
h3 { font-size: 1.25rem; font-weight: 600; margin: 1.5rem 0 0.75rem 0; color: var(--heading-color); }
.message { margin-bottom: 48px; page-break-inside: avoid; }
.role-label {
    font-weight: 700;
    font-size: 0.75rem;
    text-transform: uppercase;
    letter-spacing: 0.05em;
    margin-bottom: 12px;
    display: block;
}
.role-USER { color: var(--user-label-color); }
.role-LLM { color: var(--llm-label-color); }
.content { font-size: 1.05rem; }
p { margin: 0 0 1rem 0; }
.code-container {
    background: var(--code-bg);
    border: 1px solid var(--border-color);
    border-radius: 8px;
    margin: 1.5rem 0;
    overflow: hidden;
    page-break-inside: avoid;
}
.code-header {
    background: var(--code-header-bg);
    padding: 4px 12px;
    font-size: 0.75rem;
    font-family: monospace;
    color: var(--code-text);
    text-transform: uppercase;
}
pre { margin: 0; padding: 16px; overflow-x: auto; white-space: pre-wrap; }
code {
    font-family: monospace;
    font-size: 0.9rem;
    background: var(--code-bg);
    padding: 2px 4px;
    border-radius: 4px;
}
pre code { background: transparent; padding: 0; }
.quote-group { margin: 1rem 0; }
.quote-item {
    background: var(--quote-bg);
    padding: 12px 20px;
    margin-bottom: 8px;
    border-radius: 6px;
    border-left: 4px solid var(--quote-border);
    font-style: italic;
    color: var(--quote-text);
}
.quote-item:last-child { margin-bottom: 0; }
.image-container { margin: 1.5rem 0; text-align: center; }
.image-container img { max-width: 100%; height: auto; border-radius: 8px; }
.image-caption { font-size: 0.8rem; color: var(--timestamp-color); margin-top: 8px; }
.image-placeholder {
    background: var(--code-bg);
    border: 2px dashed var(--border-color);
    padding: 24px;
    border-radius: 8px;
    display: flex;
    align-items: center;
    justify-content: center;
    gap: 16px;
    color: var(--code-text);
    margin: 1.5rem 0;
}
.image-placeholder .placeholder-icon { font-size: 3rem; opacity: 0.5; }
.image-gallery {
    display: grid;
    grid-template-columns: repeat(auto-fit, minmax(250px, 1fr));
    gap: 20px;
    margin: 1.5rem 0;
}
.gallery-item {
    border: 1px solid var(--border-color);
    border-radius: 8px;
    overflow: hidden;
}
.gallery-item img { width: 100%; height: 200px; object-fit: cover; display: block; }
.gallery-item .image-caption { padding: 12px; background: var(--code-bg); }
.gallery-item .image-caption a { color: var(--user-label-color); text-decoration: none; }
table { width: 100%; border-collapse: collapse; margin: 1.5rem 0; }
th, td { border: 1px solid var(--border-color); padding: 12px; text-align: left; }
th { background: var(--code-bg); font-weight: 600; color: var(--heading-color); }
hr { border: 0; border-top: 1px solid var(--border-color); margin: 3rem 0; }
ul.flat-list { list-style-type: none; padding-left: 10px; margin: 0 0 1.25rem 0; }
ul.flat-list li { margin-bottom: 0.5rem; }
ul.flat-list .bullet { margin-right: 8px; }
ol { margin-bottom: 1.25rem; padding-left: 1.5rem; }
ol li { margin-bottom: 0.5rem; }
.timestamp { font-size: 0.75rem; color: var(--timestamp-color); margin-top: 8px; display: block; }
.pdf-mode { width: 800px; margin: 0; }
.pdf-mode .container { max-width: none; width: 100%; padding: 0 20mm; margin: 0; }
.pdf-mode h1, .pdf-mode h2, .pdf-mode h3 { page-break-after: avoid; }
.pdf-mode .code-container, .pdf-mode .image-container, .pdf-mode .image-gallery,
.pdf-mode .quote-group, .pdf-mode img { page-break-inside: avoid; }
.pdf-mode .message { margin-bottom: 30px; page-break-inside: auto; }
@media print {
    .container { max-width: none; padding: 0; }
    .message, .code-container, .image-container, table { page-break-inside: avoid; }
}
";

/// Picks and sanitizes the document title.
///
/// Falls back to the conversation title, then to a generic default. The
/// mis-decoded bullet sequence shows up in titles too; it becomes an
/// `&bull;` entity here rather than the `*` the body normalization uses.
fn document_title(conversation: &Conversation, title_override: Option<&str>) -> String {
    let raw = title_override
        .map(str::to_owned)
        .or_else(|| conversation.title.clone())
        .unwrap_or_else(|| DEFAULT_TITLE.to_owned());
    renderer::escape_html(&raw).replace("\u{00E2}\u{20AC}\u{00A2}", "&bull;")
}

/// Formats a UNIX-seconds timestamp, or `None` when absent/zero.
#[allow(clippy::cast_possible_truncation)]
fn format_timestamp(seconds: f64) -> Option<String> {
    if seconds <= 0.0 {
        return None;
    }
    DateTime::from_timestamp(seconds as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
}

/// Assembles a complete, self-contained HTML document.
///
/// Linearizes the conversation, renders each message body through the
/// markdown pipeline, and wraps the result in a styled shell: one
/// `<div class="message">` per message with a role label, the rendered
/// content, and a formatted timestamp when present.
///
/// # Errors
///
/// Returns [`ExportError::EmptyConversation`] when linearization yields no
/// messages (e.g. the export was invoked before a conversation was
/// captured).
pub fn export_html(
    conversation: &Conversation,
    opts: &HtmlOptions,
    assets: &AssetMap,
) -> Result<String, ExportError> {
    let messages = parser::linearize(conversation);
    ensure!(!messages.is_empty(), EmptyConversationSnafu);

    let title = document_title(conversation, opts.title.as_deref());

    let mut body = String::new();
    for message in &messages {
        let content = renderer::render_markdown(&message.body, &message.content_references, assets);
        let role = message.role.label();
        // write! to a String cannot fail
        let _ = write!(
            body,
            "<div class=\"message\">\n\
             <span class=\"role-label role-{role}\">{role}</span>\n\
             <div class=\"content\">\n{content}\n</div>\n"
        );
        if let Some(formatted) = format_timestamp(message.timestamp) {
            let _ = writeln!(body, "<span class=\"timestamp\">{formatted}</span>");
        }
        body.push_str("</div>\n");
    }

    let mut body_class = String::new();
    if opts.theme == Theme::Dark {
        body_class.push_str(" dark-mode");
    }
    if opts.pdf_mode {
        body_class.push_str(" pdf-mode");
    }

    Ok(format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>{title}</title>\n\
         <style>\n{STYLE}</style>\n\
         </head>\n\
         <body class=\"{body_class}\">\n\
         <div class=\"container\">\n\
         <header><h1>{title}</h1></header>\n\
         <main>\n{body}</main>\n\
         </div>\n\
         </body>\n\
         </html>\n",
        body_class = body_class.trim_start(),
    ))
}

/// Assembles a Markdown document from the conversation.
///
/// One `##` section per message. Image placeholder tokens become a Markdown
/// image reference plus an italic caption naming the asset id — assets are
/// referenced by id rather than inlined, to keep the file readable.
///
/// # Errors
///
/// Returns [`ExportError::EmptyConversation`] when linearization yields no
/// messages.
pub fn export_markdown(
    conversation: &Conversation,
    title_override: Option<&str>,
) -> Result<String, ExportError> {
    let messages = parser::linearize(conversation);
    ensure!(!messages.is_empty(), EmptyConversationSnafu);

    let title = title_override
        .map(str::to_owned)
        .or_else(|| conversation.title.clone())
        .unwrap_or_else(|| DEFAULT_TITLE.to_owned());

    let mut out = format!("# {title}\n\n");
    for message in &messages {
        let role = match message.role {
            Role::User => "User",
            Role::Llm => "ChatGPT",
        };
        // write! to a String cannot fail
        match format_timestamp(message.timestamp) {
            Some(formatted) => {
                let _ = writeln!(out, "## {role} ({formatted})\n");
            }
            None => {
                let _ = writeln!(out, "## {role}\n");
            }
        }

        let body = renderer::IMAGE_TOKEN_RE.replace_all(&message.body, |caps: &regex::Captures| {
            let asset_id = caps[1].trim();
            format!(
                "\n![ImagePlaceholder](Image_{asset_id})\n*[Image referencing ID: {asset_id}]*\n"
            )
        });
        out.push_str(&body);
        out.push_str("\n\n---\n\n");
    }

    Ok(out)
}
