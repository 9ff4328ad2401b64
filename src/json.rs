//! JSON string editing helpers.
//!
//! Documents are parsed with tree-sitter-json; literals are located by byte
//! range and structural path, then copied, pasted or projected unescaped.

pub mod assistant;
pub mod locate;
pub mod tree;

pub use assistant::{JsonEscapeAssistant, JsonPathAnchor, JsonStringInfo};
pub use locate::{JsonPath, PathSegment, StringLiteral, find_node_at_path, find_string_at};
pub use tree::{JsonDocument, decode_string};
