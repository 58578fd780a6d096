// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! HTML rendering for the markdown dialect used in conversation bodies.
//!
//! Message bodies are written in a small, fixed markdown subset (not
//! CommonMark): fenced code, tables, headings, quotes, lists, bold, inline
//! code, links, plus `[[IMAGE:<id>]]` placeholder tokens and gallery
//! annotations. [`render_markdown`] turns one body into a sanitized HTML
//! fragment through an ordered sequence of stages.
//!
//! # Stage order
//!
//! The order is load-bearing. HTML escaping runs before any tags are
//! generated, and fenced code is lifted into a placeholder table before the
//! block-level stages so that no later pattern can fire inside it. Every
//! stage is a pure `text -> text` function; the fence table is the only side
//! channel.
//!
//! # Failure semantics
//!
//! Rendering never fails. A stage that finds nothing to match leaves the
//! text alone, unknown content references are skipped, and an asset id with
//! no entry in the [`AssetMap`] degrades to a visible placeholder box.

use crate::parser::ContentReference;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::LazyLock;

/// A read-only mapping from asset id to a displayable image source.
///
/// Sources are data URIs or URLs. The map is populated entirely by the
/// caller (typically from a pre-fetched asset file); the renderer only reads
/// it and tolerates missing entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetMap(HashMap<String, String>);

impl AssetMap {
    /// Creates an empty asset map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resolved source for an asset id.
    pub fn insert(&mut self, asset_id: impl Into<String>, source: impl Into<String>) {
        self.0.insert(asset_id.into(), source.into());
    }

    /// Looks up the displayable source for an asset id.
    #[must_use]
    pub fn resolve(&self, asset_id: &str) -> Option<&str> {
        self.0.get(asset_id).map(String::as_str)
    }

    /// Returns the number of resolved assets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no assets are resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, String>> for AssetMap {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, String)> for AssetMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Renders one message body into a sanitized HTML fragment.
///
/// Pure function of its inputs: deterministic, no side effects, and the
/// content reference list is traversed once. Safe to call concurrently for
/// independent messages.
#[must_use]
pub fn render_markdown(body: &str, content_refs: &[ContentReference], assets: &AssetMap) -> String {
    let mut fences = Vec::new();

    let text = normalize_mojibake(body);
    let text = escape_html(&text);
    let text = extract_code_fences(&text, &mut fences);
    let text = substitute_image_groups(&text, content_refs, assets);
    let text = render_tables(&text);
    let text = render_headings(&text);
    let text = render_rules(&text);
    let text = render_blockquotes(&text);
    let text = render_unordered_lists(&text);
    let text = render_ordered_lists(&text);
    let text = apply_inline(&text);
    let text = render_links(&text);
    let text = render_image_tokens(&text, assets);
    assemble_paragraphs(&text, &fences)
}

/// Replaces mis-decoded bullet and dash sequences with ASCII stand-ins.
///
/// Upstream encoding inconsistencies produce UTF-8 bullet bytes re-decoded
/// as Latin-1 (`â€¢` and the C1-control sibling). Left in place they break
/// bullet-list detection, so every bullet form collapses to `*` and the
/// mangled en/em dashes to `-`.
fn normalize_mojibake(text: &str) -> String {
    let mut out = text
        .replace("\u{00E2}\u{20AC}\u{00A2}", "*")
        .replace("\u{00E2}\u{0080}\u{00A2}", "*")
        .replace("\u{00E2}\u{20AC}\u{201D}", "-")
        .replace("\u{00E2}\u{0080}\u{0094}", "-")
        .replace("\u{00E2}\u{20AC}\u{201C}", "-")
        .replace("\u{00E2}\u{0080}\u{0093}", "-");
    for bullet in ['\u{2022}', '\u{2023}', '\u{25E6}', '\u{2043}'] {
        out = out.replace(bullet, "*");
    }
    out
}

/// Escapes `&`, `<`, and `>` as HTML entities. Ampersands first.
pub(crate) fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(\w*)\n?(.*?)```").unwrap());

/// Lifts fenced code blocks out of the text into the fence table.
///
/// Each block is replaced by a numbered `<!--CODE_BLOCK_n-->` comment token
/// and its rendered HTML is recorded at index `n`. This is what guarantees
/// that no later stage can rewrite fenced content.
fn extract_code_fences(text: &str, fences: &mut Vec<String>) -> String {
    FENCE_RE
        .replace_all(text, |caps: &Captures| {
            let token = format!("<!--CODE_BLOCK_{}-->", fences.len());
            let lang = &caps[1];
            let code = caps[2].trim();
            fences.push(format!(
                "<div class=\"code-container\"><div class=\"code-header\">{lang}</div>\
                 <pre><code>{code}</code></pre></div>"
            ));
            token
        })
        .into_owned()
}

/// Replaces each gallery annotation's matched text with a grid of images.
///
/// Only the first literal occurrence of the (escaped) matched text is
/// replaced; a duplicate occurrence elsewhere in the body stays as text.
/// Gallery entries resolve through the asset map by file id, fall back to
/// their own content URL, and are omitted when neither is available.
fn substitute_image_groups(
    text: &str,
    content_refs: &[ContentReference],
    assets: &AssetMap,
) -> String {
    let mut text = text.to_owned();

    for reference in content_refs {
        let ContentReference::ImageGroup {
            matched_text,
            images,
        } = reference
        else {
            continue;
        };

        let escaped = escape_html(matched_text);
        let mut gallery = String::from("<div class=\"image-gallery\">");
        for image in images {
            let resolved = image
                .file_id
                .as_deref()
                .and_then(|id| assets.resolve(id))
                .or(image.content_url.as_deref());
            let Some(src) = resolved else {
                continue;
            };
            let source_url = image.source_url.as_deref().unwrap_or_default();
            let _ = write!(
                gallery,
                "<div class=\"gallery-item\"><img src=\"{src}\" alt=\"{title}\" loading=\"lazy\">\
                 <div class=\"image-caption\"><a href=\"{source_url}\" target=\"_blank\" \
                 rel=\"noopener\">{title}</a></div></div>",
                title = image.title,
            );
        }
        gallery.push_str("</div>");

        text = text.replacen(&escaped, &gallery, 1);
    }

    text
}

static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(?:^\|.*\|(?:\n|$))+").unwrap());

/// Converts maximal runs of `|cell|cell|` lines into HTML tables.
///
/// The first line is the header row, the second (the separator row) is
/// discarded, and the rest become body rows. A run of a single line is left
/// untouched.
fn render_tables(text: &str) -> String {
    TABLE_RE
        .replace_all(text, |caps: &Captures| {
            let rows: Vec<&str> = caps[0].trim().lines().collect();
            if rows.len() < 2 {
                return caps[0].to_owned();
            }

            let mut html = String::from("<table><thead><tr>");
            for cell in split_cells(rows[0]) {
                let _ = write!(html, "<th>{cell}</th>");
            }
            html.push_str("</tr></thead><tbody>");
            for row in &rows[2..] {
                let cells = split_cells(row);
                if cells.is_empty() {
                    continue;
                }
                html.push_str("<tr>");
                for cell in cells {
                    let _ = write!(html, "<td>{cell}</td>");
                }
                html.push_str("</tr>");
            }
            html.push_str("</tbody></table>");
            html
        })
        .into_owned()
}

/// Splits one table row into trimmed, non-empty cell texts.
fn split_cells(row: &str) -> Vec<&str> {
    row.split('|')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .collect()
}

static H3_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^### (.*)$").unwrap());
static H2_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^## (.*)$").unwrap());
static H1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^# (.*)$").unwrap());

/// Converts `#`-prefixed lines into headings, longest prefix first.
fn render_headings(text: &str) -> String {
    let text = H3_RE.replace_all(text, "<h3>$1</h3>");
    let text = H2_RE.replace_all(&text, "<h2>$1</h2>");
    H1_RE.replace_all(&text, "<h1>$1</h1>").into_owned()
}

static HR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^-{3,}[ \t]*$").unwrap());

/// Converts lines of three or more dashes into horizontal rules.
fn render_rules(text: &str) -> String {
    HR_RE.replace_all(text, "<hr>").into_owned()
}

static QUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(?:^&gt; .*(?:\n|$))+").unwrap());

/// Groups runs of `> `-prefixed lines (escaped by this point) into a quote
/// block, applying bold and inline-code formatting within each line.
fn render_blockquotes(text: &str) -> String {
    QUOTE_RE
        .replace_all(text, |caps: &Captures| {
            let mut html = String::from("<div class=\"quote-group\">");
            for line in caps[0].trim().lines() {
                let content = line.strip_prefix("&gt;").unwrap_or(line).trim();
                if content.is_empty() {
                    continue;
                }
                let _ = write!(
                    html,
                    "<div class=\"quote-item\">{}</div>",
                    apply_inline(content)
                );
            }
            html.push_str("</div>");
            html
        })
        .into_owned()
}

static UL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:^[ \t]*[*\-\u{2022}\u{2023}\u{25E6}\u{2043}] .*(?:\n|$))+").unwrap()
});

/// Groups runs of bullet-marker lines into an unordered list.
///
/// Accepted markers are `*`, `-`, and the bullet glyphs stage 1 normalizes
/// away (kept for texts that bypass normalization). A `-` marker means a
/// line that starts with a normalized dash also classifies as a bullet item.
/// Items render with a literal `*` glyph as the visual bullet, which survives
/// HTML and print/PDF contexts where native list glyphs do not.
fn render_unordered_lists(text: &str) -> String {
    UL_RE
        .replace_all(text, |caps: &Captures| {
            let mut html = String::from("<ul class=\"flat-list\">");
            for item in caps[0].trim().lines() {
                let _ = write!(
                    html,
                    "<li><span class=\"bullet\">*</span>{}</li>",
                    strip_list_marker(item)
                );
            }
            html.push_str("</ul>");
            html
        })
        .into_owned()
}

/// Strips leading indentation and one bullet marker from a list line.
fn strip_list_marker(line: &str) -> &str {
    let rest = line.trim_start_matches([' ', '\t']);
    rest.strip_prefix(['*', '-', '\u{2022}', '\u{2023}', '\u{25E6}', '\u{2043}'])
        .unwrap_or(rest)
        .trim()
}

static OL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(?:^\d+\. .*(?:\n|$))+").unwrap());
static OL_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\. ").unwrap());

/// Groups runs of `1. `-style lines into an ordered list.
fn render_ordered_lists(text: &str) -> String {
    OL_RE
        .replace_all(text, |caps: &Captures| {
            let mut html = String::from("<ol>");
            for item in caps[0].trim().lines() {
                let _ = write!(html, "<li>{}</li>", OL_ITEM_RE.replace(item, ""));
            }
            html.push_str("</ol>");
            html
        })
        .into_owned()
}

static BOLD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").unwrap());

/// Applies bold and inline-code formatting.
fn apply_inline(text: &str) -> String {
    let text = BOLD_RE.replace_all(text, "<strong>$1</strong>");
    CODE_RE.replace_all(&text, "<code>$1</code>").into_owned()
}

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap());

/// Renders `[text](url)` spans as inline images or external links.
///
/// A URL with an image extension, or one targeting the asset content path,
/// becomes an image block with a caption; anything else becomes a link that
/// opens in a new tab.
fn render_links(text: &str) -> String {
    LINK_RE
        .replace_all(text, |caps: &Captures| {
            let alt = &caps[1];
            let url = &caps[2];
            if is_image_url(url) {
                format!(
                    "<div class=\"image-container\"><img src=\"{url}\" alt=\"{alt}\">\
                     <div class=\"image-caption\">{alt}</div></div>"
                )
            } else {
                format!("<a href=\"{url}\" target=\"_blank\">{alt}</a>")
            }
        })
        .into_owned()
}

fn is_image_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    [".png", ".jpg", ".jpeg", ".gif", ".webp"]
        .iter()
        .any(|ext| lower.ends_with(ext))
        || url.contains("estuary/content")
}

pub(crate) static IMAGE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[IMAGE:([^\]]+)\]\]").unwrap());

/// Renders `[[IMAGE:<id>]]` placeholder tokens.
///
/// Resolved ids become image blocks; unresolved ids become a visible
/// placeholder box naming the id, never an empty `<img>` tag.
fn render_image_tokens(text: &str, assets: &AssetMap) -> String {
    IMAGE_TOKEN_RE
        .replace_all(text, |caps: &Captures| {
            let asset_id = caps[1].trim();
            assets.resolve(asset_id).map_or_else(
                || {
                    format!(
                        "<div class=\"image-placeholder\">\
                         <div class=\"placeholder-icon\">\u{1F5BC}\u{FE0F}</div>\
                         <div class=\"placeholder-text\"><strong>Image: {asset_id}</strong>\
                         <br><small>Loading or not available.</small></div></div>"
                    )
                },
                |src| {
                    format!(
                        "<div class=\"image-container\"><img src=\"{src}\" alt=\"Image {asset_id}\">\
                         <div class=\"image-caption\">Image: {asset_id}</div></div>"
                    )
                },
            )
        })
        .into_owned()
}

static PURE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<!--CODE_BLOCK_(\d+)-->$").unwrap());
static FENCE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--CODE_BLOCK_(\d+)-->").unwrap());
static BLOCK_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<(?:h1|h2|h3|div|table|ul|ol|blockquote|hr|pre)\b").unwrap());

/// Splits the text on blank lines and wraps the pieces.
///
/// A chunk that is exactly a fence token is swapped for its recorded HTML; a
/// chunk that starts with a block-level tag passes through (with embedded
/// fence tokens restored); everything else becomes a paragraph with single
/// newlines as `<br>`.
fn assemble_paragraphs(text: &str, fences: &[String]) -> String {
    let mut parts = Vec::new();

    for chunk in text.split("\n\n") {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }

        if let Some(caps) = PURE_FENCE_RE.captures(chunk) {
            if let Some(html) = lookup_fence(&caps, fences) {
                parts.push(html.clone());
            }
            continue;
        }

        if BLOCK_TAG_RE.is_match(chunk) {
            parts.push(restore_fences(chunk, fences));
        } else {
            let paragraph = restore_fences(&chunk.replace('\n', "<br>"), fences);
            parts.push(format!("<p>{paragraph}</p>"));
        }
    }

    parts.join("\n")
}

fn lookup_fence<'a>(caps: &Captures, fences: &'a [String]) -> Option<&'a String> {
    caps[1].parse::<usize>().ok().and_then(|i| fences.get(i))
}

/// Substitutes any remaining fence tokens inside a chunk.
fn restore_fences(text: &str, fences: &[String]) -> String {
    FENCE_TOKEN_RE
        .replace_all(text, |caps: &Captures| {
            lookup_fence(caps, fences)
                .cloned()
                .unwrap_or_else(|| caps[0].to_owned())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ImageResult;

    fn render(body: &str) -> String {
        render_markdown(body, &[], &AssetMap::new())
    }

    fn gallery_ref(matched_text: &str, images: Vec<ImageResult>) -> ContentReference {
        ContentReference::ImageGroup {
            matched_text: matched_text.into(),
            images,
        }
    }

    fn image_result(file_id: Option<&str>, content_url: Option<&str>) -> ImageResult {
        ImageResult {
            file_id: file_id.map(Into::into),
            content_url: content_url.map(Into::into),
            title: "A picture".into(),
            source_url: Some("https://example.com/source".into()),
        }
    }

    #[test]
    fn plain_text_becomes_single_paragraph() {
        assert_eq!(render("just some words"), "<p>just some words</p>");
    }

    #[test]
    fn plain_text_render_equals_escaped_paragraph() {
        let body = "tuples like (a, b) and values 1, 2, 3";
        assert_eq!(render(body), format!("<p>{body}</p>"));
    }

    #[test]
    fn escapes_html_entities_once() {
        assert_eq!(
            render("a < b && c > d"),
            "<p>a &lt; b &amp;&amp; c &gt; d</p>"
        );
    }

    #[test]
    fn single_newline_becomes_line_break() {
        assert_eq!(render("one\ntwo"), "<p>one<br>two</p>");
    }

    #[test]
    fn renders_code_fence_with_language_header() {
        let output = render("```js\nconst x = 1;\n```");

        assert!(output.contains("<div class=\"code-header\">js</div>"));
        assert!(output.contains("<pre><code>const x = 1;</code></pre>"));
    }

    #[test]
    fn code_fence_protects_markdown_syntax() {
        let output = render("```\n**bold**\n# heading\n| a | b |\n```");

        assert!(output.contains("**bold**"));
        assert!(output.contains("# heading"));
        assert!(output.contains("| a | b |"));
        assert!(!output.contains("<strong>"));
        assert!(!output.contains("<h1>"));
        assert!(!output.contains("<table>"));
    }

    #[test]
    fn renders_hello_list_and_fence_example() {
        let output = render("Hello\n\n* one\n* two\n\n```js\nconst x = 1;\n```");

        assert!(output.contains("<p>Hello</p>"));
        assert!(output.contains("<ul class=\"flat-list\">"));
        assert!(output.contains("one</li>"));
        assert!(output.contains("two</li>"));
        assert!(output.contains("<div class=\"code-header\">js</div>"));
        assert!(output.contains("<pre><code>const x = 1;</code></pre>"));
    }

    #[test]
    fn table_round_trips_header_and_body_cells() {
        let output = render("| Name | Age |\n|------|-----|\n| Ada | 36 |");

        assert_eq!(
            output,
            "<table><thead><tr><th>Name</th><th>Age</th></tr></thead>\
             <tbody><tr><td>Ada</td><td>36</td></tr></tbody></table>"
        );
    }

    #[test]
    fn lone_pipe_line_is_not_a_table() {
        let output = render("| just one line |");

        assert!(!output.contains("<table>"));
        assert!(output.contains("| just one line |"));
    }

    #[test]
    fn renders_headings_by_longest_prefix() {
        let output = render("# One\n\n## Two\n\n### Three");

        assert!(output.contains("<h1>One</h1>"));
        assert!(output.contains("<h2>Two</h2>"));
        assert!(output.contains("<h3>Three</h3>"));
    }

    #[test]
    fn renders_horizontal_rule() {
        assert!(render("above\n\n---\n\nbelow").contains("<hr>"));
    }

    #[test]
    fn renders_blockquote_group_with_inline_formatting() {
        let output = render("> **important** note\n> with `code`");

        assert!(output.starts_with("<div class=\"quote-group\">"));
        assert!(output.contains("<div class=\"quote-item\"><strong>important</strong> note</div>"));
        assert!(output.contains("<div class=\"quote-item\">with <code>code</code></div>"));
    }

    #[test]
    fn renders_unordered_list_with_literal_bullet() {
        let output = render("* first\n* second");

        assert!(output.contains("<li><span class=\"bullet\">*</span>first</li>"));
        assert!(output.contains("<li><span class=\"bullet\">*</span>second</li>"));
    }

    #[test]
    fn mojibake_bullet_is_detected_as_list_marker() {
        let output = render("\u{00E2}\u{20AC}\u{00A2} item");

        assert!(output.contains("<ul class=\"flat-list\">"));
        assert!(output.contains("item</li>"));
    }

    #[test]
    fn unicode_bullet_is_detected_as_list_marker() {
        let output = render("\u{2022} item");

        assert!(output.contains("<ul class=\"flat-list\">"));
    }

    #[test]
    fn dash_prefixed_line_becomes_bullet() {
        // A dash marker also catches normalized em/en dashes at line starts;
        // that misclassification is intentional, long-standing behavior.
        let output = render("\u{00E2}\u{20AC}\u{201D} aside");

        assert!(output.contains("<ul class=\"flat-list\">"));
        assert!(output.contains("aside</li>"));
    }

    #[test]
    fn renders_ordered_list() {
        let output = render("1. first\n2. second");

        assert_eq!(output, "<ol><li>first</li><li>second</li></ol>");
    }

    #[test]
    fn renders_inline_bold_and_code() {
        assert_eq!(
            render("**bold** and `code`"),
            "<p><strong>bold</strong> and <code>code</code></p>"
        );
    }

    #[test]
    fn renders_external_link_in_new_tab() {
        assert_eq!(
            render("[docs](https://example.com/docs)"),
            "<p><a href=\"https://example.com/docs\" target=\"_blank\">docs</a></p>"
        );
    }

    #[test]
    fn image_extension_link_renders_as_image_block() {
        let output = render("[a chart](https://example.com/chart.PNG)");

        assert!(output.contains("<img src=\"https://example.com/chart.PNG\" alt=\"a chart\">"));
        assert!(output.contains("<div class=\"image-caption\">a chart</div>"));
    }

    #[test]
    fn asset_content_link_renders_as_image_block() {
        let output = render("[pic](https://cdn.example.com/estuary/content/abc)");

        assert!(output.contains("image-container"));
    }

    #[test]
    fn resolved_image_token_renders_image() {
        let mut assets = AssetMap::new();
        assets.insert("file_abc", "data:image/png;base64,AAAA");
        let output = render_markdown("[[IMAGE:file_abc]]", &[], &assets);

        assert!(output.contains("<img src=\"data:image/png;base64,AAAA\" alt=\"Image file_abc\">"));
        assert!(output.contains("Image: file_abc"));
    }

    #[test]
    fn unresolved_image_token_renders_placeholder_box() {
        let output = render("[[IMAGE:file_missing]]");

        assert!(output.contains("image-placeholder"));
        assert!(output.contains("Image: file_missing"));
        assert!(!output.contains("<img"));
    }

    #[test]
    fn gallery_replaces_matched_text() {
        let mut assets = AssetMap::new();
        assets.insert("file_g1", "https://cdn.example.com/g1.png");
        let refs = vec![gallery_ref(
            "three photos",
            vec![image_result(Some("file_g1"), None)],
        )];
        let output = render_markdown("Results: three photos", &refs, &assets);

        assert!(output.contains("<div class=\"image-gallery\">"));
        assert!(output.contains("<img src=\"https://cdn.example.com/g1.png\""));
        assert!(output.contains("<a href=\"https://example.com/source\""));
        assert!(!output.contains("three photos"));
    }

    #[test]
    fn gallery_replaces_only_first_occurrence() {
        let refs = vec![gallery_ref(
            "photos",
            vec![image_result(None, Some("https://example.com/p.png"))],
        )];
        let output = render_markdown("photos and photos", &refs, &AssetMap::new());

        assert_eq!(output.matches("image-gallery").count(), 1);
        // The second occurrence stays as plain text.
        assert!(output.contains("photos"));
    }

    #[test]
    fn gallery_falls_back_to_content_url() {
        let refs = vec![gallery_ref(
            "pics",
            vec![image_result(Some("file_unresolved"), Some("https://example.com/fb.png"))],
        )];
        let output = render_markdown("pics", &refs, &AssetMap::new());

        assert!(output.contains("<img src=\"https://example.com/fb.png\""));
    }

    #[test]
    fn gallery_omits_entry_with_no_source() {
        let refs = vec![gallery_ref("pics", vec![image_result(None, None)])];
        let output = render_markdown("pics", &refs, &AssetMap::new());

        assert!(output.contains("image-gallery"));
        assert!(!output.contains("gallery-item"));
    }

    #[test]
    fn gallery_matched_text_is_escaped_before_lookup() {
        let refs = vec![gallery_ref(
            "a & b",
            vec![image_result(None, Some("https://example.com/ab.png"))],
        )];
        let output = render_markdown("see a & b here", &refs, &AssetMap::new());

        assert!(output.contains("image-gallery"));
        assert!(!output.contains("a &amp; b"));
    }

    #[test]
    fn fence_inside_list_paragraph_is_restored() {
        let output = render("* item\n```\ncode\n```");

        assert!(output.contains("<pre><code>code</code></pre>"));
        assert!(!output.contains("CODE_BLOCK"));
    }

    #[test]
    fn multiple_fences_keep_their_order() {
        let output = render("```\nfirst\n```\n\nmiddle\n\n```\nsecond\n```");

        let first = output.find("first").unwrap();
        let middle = output.find("middle").unwrap();
        let second = output.find("second").unwrap();
        assert!(first < middle && middle < second);
    }

    #[test]
    fn empty_body_renders_empty_fragment() {
        assert_eq!(render(""), "");
    }

    #[test]
    fn rendering_is_deterministic() {
        let body = "# Title\n\n* a\n* b\n\n`x`";
        assert_eq!(render(body), render(body));
    }
}
