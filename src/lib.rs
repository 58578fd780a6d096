// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Convert ChatGPT conversation exports to HTML and Markdown.
//!
//! This crate provides parsing, rendering, and document assembly for the
//! conversation payloads produced by the ChatGPT backend API.
//!
//! # Overview
//!
//! A conversation export is a graph of message nodes with parent pointers.
//! This crate:
//!
//! 1. Parses the JSON graph into typed Rust representations
//! 2. Linearizes the graph into the visible root-to-leaf message sequence
//! 3. Renders each message body (a small markdown dialect with embedded
//!    image tokens) into sanitized HTML
//! 4. Assembles the rendered messages into a complete HTML or Markdown
//!    document
//!
//! # Example
//!
//! ```no_run
//! use gpt2html::export::{export_html, HtmlOptions};
//! use gpt2html::parser::parse_conversation;
//! use gpt2html::renderer::AssetMap;
//!
//! let json = std::fs::read_to_string("conversation.json").unwrap();
//! let conversation = parse_conversation(&json).unwrap();
//!
//! // Asset sources are fetched out of band and handed in best-effort.
//! let assets = AssetMap::new();
//!
//! let html = export_html(&conversation, &HtmlOptions::default(), &assets).unwrap();
//! println!("{html}");
//! ```
//!
//! # Modules
//!
//! - [`parser`]: JSON parsing, graph linearization, and asset-id discovery
//! - [`renderer`]: the markdown-dialect → HTML pipeline and asset lookup
//! - [`export`]: HTML and Markdown document assembly

#![deny(missing_docs)]

pub mod export;
pub mod parser;
pub mod renderer;
