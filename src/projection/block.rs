use serde::Serialize;
use tower_lsp_server::ls_types::{Position, Range};

use crate::text::range_contains;

/// A projectable region of a primary document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
    /// Stable within one parse: the block's traversal index
    pub id: String,
    pub content: String,
    /// Declared range, delimiters included
    pub range: Range,
    /// Interior payload only
    pub content_range: Range,
    pub language: String,
    pub extension: Option<String>,
}

impl CodeBlock {
    pub fn key(&self) -> TargetKey {
        TargetKey {
            id: self.id.clone(),
            language: self.language.clone(),
            extension: self.extension.clone(),
        }
    }

    pub fn contains(&self, position: Position) -> bool {
        range_contains(&self.content_range, position)
    }
}

/// Identity of a projection target across re-parses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetKey {
    pub id: String,
    pub language: String,
    pub extension: Option<String>,
}
