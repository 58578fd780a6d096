// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! JSON parsing and linearization for ChatGPT conversation exports.
//!
//! This module handles deserialization of the conversation payloads produced
//! by the ChatGPT backend API. A conversation is a graph of nodes keyed by id,
//! each holding an optional message and a parent pointer; the visible
//! transcript is the single path from the root down to `current_node`.
//!
//! # Format Overview
//!
//! A conversation payload contains:
//! - A `mapping` from node id to node
//! - A `current_node` id designating the leaf of the visible branch
//! - Messages with an author role, typed content parts (plain text, image
//!   asset pointers, multimodal wrappers), and metadata (attachments,
//!   content references, creation time)
//!
//! # Example
//!
//! ```
//! use gpt2html::parser::{linearize, parse_conversation};
//!
//! let json = r#"{
//!     "title": "Greetings",
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
//! let messages = linearize(&conversation);
//! assert_eq!(messages.len(), 1);
//! assert_eq!(messages[0].body, "hi");
//! ```

use regex::Regex;
use serde::Deserialize;
use snafu::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write;
use std::sync::LazyLock;

/// Error type for JSON parsing failures.
#[derive(Debug, Snafu)]
pub enum ParseError {
    /// Failed to parse JSON content.
    #[snafu(display("failed to parse JSON: {source}"))]
    Json {
        /// The underlying JSON parsing error.
        source: serde_json::Error,
    },
}

/// The root structure of a ChatGPT conversation export.
///
/// Only per-conversation payloads carrying a `mapping` are accepted;
/// list-conversations payloads fail to parse.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Conversation {
    /// The conversation title, when present.
    pub title: Option<String>,

    /// The node graph, keyed by node id.
    pub mapping: HashMap<String, Node>,

    /// The id of the leaf node of the visible branch.
    pub current_node: Option<String>,
}

/// One entry in the conversation graph.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Node {
    /// The id of the parent node, or `None` at the root.
    pub parent: Option<String>,

    /// The message carried by this node, if any.
    pub message: Option<MessageSource>,
}

/// A message as found in a graph node, before linearization.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageSource {
    /// The author role (e.g. "user", "assistant", "tool", "system").
    pub role: String,

    /// The typed content parts, in order.
    pub parts: Vec<ContentPart>,

    /// File attachments from the message metadata.
    pub attachments: Vec<Attachment>,

    /// Content reference annotations from the message metadata.
    pub content_references: Vec<ContentReference>,

    /// Creation time in seconds since the epoch, or 0 when absent.
    pub create_time: f64,
}

/// A single content part within a message.
///
/// The export format mixes plain strings with typed objects; this enum is
/// decided once at parse time so downstream code is an exhaustive match.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    /// Plain text, either a bare string part or a `text` object.
    Text(String),

    /// A pointer to an uploaded or generated image asset.
    ImagePointer {
        /// The asset id, with the `sediment://` scheme prefix stripped.
        asset_id: String,
    },

    /// A `multimodal_text` wrapper around a nested part list.
    ///
    /// Only one level of nesting occurs in practice; nested parts are
    /// restricted to text and image pointers.
    Multimodal(Vec<ContentPart>),

    /// An unrecognized part shape.
    ///
    /// This variant handles forward compatibility with new part types that
    /// may be added to the export format in the future.
    Other,
}

/// A file attachment descriptor from message metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// The attachment's file id.
    pub id: String,

    /// The attachment's filename.
    pub name: String,
}

/// A content reference annotation describing a rich inline element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentReference {
    /// A single inline image.
    Image {
        /// The referenced file id.
        file_id: String,
    },

    /// An image gallery anchored to a span of message text.
    ImageGroup {
        /// The literal text span the gallery replaces in the rendered output.
        matched_text: String,

        /// The gallery entries, in display order.
        images: Vec<ImageResult>,
    },

    /// An unrecognized reference shape, skipped at render time.
    Other,
}

/// One entry of an image gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResult {
    /// The file id used to resolve the image through the asset map.
    pub file_id: Option<String>,

    /// A direct content URL, used when the asset map has no entry.
    pub content_url: Option<String>,

    /// The display title ("Image" when absent).
    pub title: String,

    /// The URL of the original source the image was taken from.
    pub source_url: Option<String>,
}

/// The author side of a linearized message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The human participant.
    User,

    /// The model side, covering both assistant and tool output.
    Llm,
}

impl Role {
    /// Returns the uppercase label used in HTML role badges.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Llm => "LLM",
        }
    }
}

/// A normalized message on the linearized path, in root-to-leaf order.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Which side of the conversation authored the message.
    pub role: Role,

    /// The message text with image parts replaced by `[[IMAGE:<id>]]`
    /// placeholder tokens. Trimmed and non-empty.
    pub body: String,

    /// Creation time in seconds since the epoch, or 0 when absent.
    pub timestamp: f64,

    /// Content references carried through unchanged for render-time gallery
    /// substitution.
    pub content_references: Vec<ContentReference>,
}

impl<'de> Deserialize<'de> for MessageSource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        let role = get_string(&value, &["author", "role"]).unwrap_or_default();

        let parts = value
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(serde_json::Value::as_array)
            .map(|parts| parts.iter().map(parse_part).collect())
            .unwrap_or_default();

        let attachments = extract_attachments(&value);
        let content_references = extract_content_references(&value);

        let create_time = value
            .get("create_time")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0);

        Ok(Self {
            role,
            parts,
            attachments,
            content_references,
            create_time,
        })
    }
}

/// Parses one entry of a `content.parts` array.
fn parse_part(value: &serde_json::Value) -> ContentPart {
    if let Some(text) = value.as_str() {
        return ContentPart::Text(text.to_owned());
    }

    let kind = get_str(value, &["type"])
        .or_else(|| get_str(value, &["content_type"]))
        .unwrap_or_default();

    match kind {
        "text" => ContentPart::Text(get_string(value, &["text"]).unwrap_or_default()),
        "image_asset_pointer" => ContentPart::ImagePointer {
            asset_id: strip_asset_scheme(get_str(value, &["asset_pointer"]).unwrap_or_default()),
        },
        "multimodal_text" => {
            let nested = value
                .get("content")
                .and_then(serde_json::Value::as_array)
                .map(|subs| subs.iter().filter_map(parse_nested_part).collect())
                .unwrap_or_default();
            ContentPart::Multimodal(nested)
        }
        _ => ContentPart::Other,
    }
}

/// Parses one entry of a `multimodal_text` nested content list.
///
/// Only strings and image pointers are recognized at this level; anything
/// else is dropped.
fn parse_nested_part(value: &serde_json::Value) -> Option<ContentPart> {
    if let Some(text) = value.as_str() {
        return Some(ContentPart::Text(text.to_owned()));
    }
    if get_str(value, &["type"]) == Some("image_asset_pointer") {
        return Some(ContentPart::ImagePointer {
            asset_id: strip_asset_scheme(get_str(value, &["asset_pointer"]).unwrap_or_default()),
        });
    }
    None
}

/// Strips the `sediment://` scheme prefix from an asset pointer.
fn strip_asset_scheme(pointer: &str) -> String {
    pointer
        .strip_prefix("sediment://")
        .unwrap_or(pointer)
        .to_owned()
}

/// Extracts attachment descriptors from `metadata.attachments`.
fn extract_attachments(value: &serde_json::Value) -> Vec<Attachment> {
    value
        .get("metadata")
        .and_then(|m| m.get("attachments"))
        .and_then(serde_json::Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|att| {
            let id = get_string(att, &["id"])?;
            let name = get_string(att, &["name"]).unwrap_or_default();
            Some(Attachment { id, name })
        })
        .collect()
}

/// Extracts content references from `metadata.content_references`.
fn extract_content_references(value: &serde_json::Value) -> Vec<ContentReference> {
    value
        .get("metadata")
        .and_then(|m| m.get("content_references"))
        .and_then(serde_json::Value::as_array)
        .into_iter()
        .flatten()
        .map(parse_content_reference)
        .collect()
}

fn parse_content_reference(value: &serde_json::Value) -> ContentReference {
    match get_str(value, &["type"]) {
        Some("image") => match get_string(value, &["file_id"]) {
            Some(file_id) if !file_id.is_empty() => ContentReference::Image { file_id },
            _ => ContentReference::Other,
        },
        Some("image_group") => ContentReference::ImageGroup {
            matched_text: get_string(value, &["matched_text"]).unwrap_or_default(),
            images: value
                .get("images")
                .and_then(serde_json::Value::as_array)
                .into_iter()
                .flatten()
                .map(parse_image_result)
                .collect(),
        },
        _ => ContentReference::Other,
    }
}

fn parse_image_result(value: &serde_json::Value) -> ImageResult {
    let result = value.get("image_result").unwrap_or(value);
    ImageResult {
        file_id: get_string(result, &["file_id"]).filter(|id| !id.is_empty()),
        content_url: get_string(result, &["content_url"]).filter(|url| !url.is_empty()),
        title: get_string(result, &["title"]).unwrap_or_else(|| "Image".to_owned()),
        source_url: get_string(result, &["url"]).filter(|url| !url.is_empty()),
    }
}

/// Navigates a JSON path and returns the string value at the end.
///
/// # Arguments
///
/// * `value` - The root JSON value to navigate from
/// * `path` - A sequence of keys to follow through the JSON structure
fn get_str<'a>(value: &'a serde_json::Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str()
}

/// Like [`get_str`] but returns an owned `String`.
fn get_string(value: &serde_json::Value, path: &[&str]) -> Option<String> {
    get_str(value, path).map(str::to_owned)
}

/// Parses a JSON string into a [`Conversation`] structure.
///
/// This is the main entry point for parsing conversation exports.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or carries no `mapping`
/// (e.g. a list-conversations payload).
///
/// # Example
///
/// ```
/// use gpt2html::parser::parse_conversation;
///
/// let json = r#"{ "title": "Chat", "mapping": {}, "current_node": null }"#;
/// let conversation = parse_conversation(json).unwrap();
/// assert_eq!(conversation.title.as_deref(), Some("Chat"));
/// ```
pub fn parse_conversation(json_str: &str) -> Result<Conversation, ParseError> {
    serde_json::from_str(json_str).context(JsonSnafu)
}

/// Returns the placeholder token for an asset id.
fn image_token(asset_id: &str) -> String {
    format!("[[IMAGE:{asset_id}]]")
}

/// Appends a placeholder token on its own line.
fn push_image_token(body: &mut String, asset_id: &str) {
    // write! to a String cannot fail
    let _ = write!(body, "\n[[IMAGE:{asset_id}]]\n");
}

/// Reduces the conversation graph to the ordered visible message sequence.
///
/// Walks backward from `current_node` through parent pointers to the root,
/// then emits messages in root-to-leaf order. Only `user`, `assistant`, and
/// `tool` roles are retained; `user` maps to [`Role::User`] and the rest to
/// [`Role::Llm`]. Image parts and image-like attachments become
/// `[[IMAGE:<id>]]` placeholder tokens; an id already placed is never
/// duplicated. Messages whose body trims to empty are dropped.
///
/// Malformed graphs are recovered locally: a `current_node` absent from the
/// mapping yields an empty sequence, a broken parent chain truncates the
/// walk, and a parent cycle is cut off once the hop count reaches the graph
/// size.
#[must_use]
pub fn linearize(conversation: &Conversation) -> Vec<Message> {
    let mapping = &conversation.mapping;

    let mut path = Vec::new();
    let mut current = conversation.current_node.clone();
    while let Some(id) = current {
        if !mapping.contains_key(&id) || path.len() >= mapping.len() {
            break;
        }
        current = mapping[&id].parent.clone();
        path.push(id);
    }
    path.reverse();

    let mut messages = Vec::new();
    for node_id in &path {
        let Some(source) = &mapping[node_id].message else {
            continue;
        };
        if !matches!(source.role.as_str(), "user" | "assistant" | "tool") {
            continue;
        }

        let mut body = String::new();
        for part in &source.parts {
            append_part(&mut body, part);
        }

        for attachment in &source.attachments {
            if !attachment.id.is_empty()
                && has_image_extension(&attachment.name)
                && !body.contains(&image_token(&attachment.id))
            {
                push_image_token(&mut body, &attachment.id);
            }
        }

        for reference in &source.content_references {
            if let ContentReference::Image { file_id } = reference
                && !body.contains(&image_token(file_id))
            {
                push_image_token(&mut body, file_id);
            }
        }

        let trimmed = body.trim();
        if trimmed.is_empty() {
            continue;
        }

        messages.push(Message {
            role: if source.role == "user" {
                Role::User
            } else {
                Role::Llm
            },
            body: trimmed.to_owned(),
            timestamp: source.create_time,
            content_references: source.content_references.clone(),
        });
    }

    messages
}

fn append_part(body: &mut String, part: &ContentPart) {
    match part {
        ContentPart::Text(text) => body.push_str(text),
        ContentPart::ImagePointer { asset_id } => push_image_token(body, asset_id),
        ContentPart::Multimodal(nested) => {
            // one level only; nested parts are text or image pointers
            for sub in nested {
                match sub {
                    ContentPart::Text(text) => body.push_str(text),
                    ContentPart::ImagePointer { asset_id } => push_image_token(body, asset_id),
                    _ => {}
                }
            }
        }
        ContentPart::Other => {}
    }
}

/// Returns `true` for filenames with a displayable image extension.
fn has_image_extension(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    [".png", ".jpg", ".jpeg", ".gif", ".webp"]
        .iter()
        .any(|ext| lower.ends_with(ext))
}

static FILE_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"file_[A-Za-z0-9]+").unwrap());

/// Collects every asset id referenced anywhere in the conversation.
///
/// Unlike [`linearize`], this scans all nodes, not just the visible branch:
/// `file_…` ids inside string parts, image pointer asset ids, attachment ids,
/// and the file ids of both single-image and gallery content references. The
/// result is sorted so callers can fetch assets deterministically.
#[must_use]
pub fn collect_asset_ids(conversation: &Conversation) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();

    for node in conversation.mapping.values() {
        let Some(source) = &node.message else {
            continue;
        };

        for part in &source.parts {
            collect_part_ids(part, &mut ids);
        }

        for attachment in &source.attachments {
            if !attachment.id.is_empty() {
                ids.insert(attachment.id.clone());
            }
        }

        for reference in &source.content_references {
            match reference {
                ContentReference::Image { file_id } => {
                    ids.insert(file_id.clone());
                }
                ContentReference::ImageGroup { images, .. } => {
                    for image in images {
                        if let Some(file_id) = &image.file_id {
                            ids.insert(file_id.clone());
                        }
                    }
                }
                ContentReference::Other => {}
            }
        }
    }

    ids
}

fn collect_part_ids(part: &ContentPart, ids: &mut BTreeSet<String>) {
    match part {
        ContentPart::Text(text) => {
            for found in FILE_ID_RE.find_iter(text) {
                ids.insert(found.as_str().to_owned());
            }
        }
        ContentPart::ImagePointer { asset_id } => {
            if !asset_id.is_empty() {
                ids.insert(asset_id.clone());
            }
        }
        ContentPart::Multimodal(nested) => {
            for sub in nested {
                collect_part_ids(sub, ids);
            }
        }
        ContentPart::Other => {}
    }
}
