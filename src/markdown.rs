//! Markdown code block projections.
//!
//! Every fenced code block of an open markdown document is mirrored into a
//! file of its own so the block's language tooling can work on it.

pub mod code_block;
pub mod controller;
pub mod manager;

pub use code_block::{CodeBlockAnchor, parse_code_blocks, parse_info_string};
pub use controller::MarkdownDocumentController;
pub use manager::MarkdownProjection;

/// Language id of documents that get projections
pub const MARKDOWN_LANGUAGE_ID: &str = "markdown";
