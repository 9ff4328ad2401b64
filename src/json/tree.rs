//! JSON documents parsed with tree-sitter-json.
//!
//! The grammar accepts strict JSON plus `//` and `/* */` comments. Nodes keep
//! their byte ranges, so literals can be replaced in place.

use tree_sitter::{Node, Parser, Tree};

use crate::error::{LensError, LensResult};

/// A parsed, error-free JSON document.
pub struct JsonDocument<'s> {
    source: &'s str,
    tree: Tree,
}

impl<'s> JsonDocument<'s> {
    /// Parse `source`, failing on the first syntax error.
    pub fn parse(source: &'s str) -> LensResult<Self> {
        let mut parser = Parser::new();
        let language: tree_sitter::Language = tree_sitter_json::LANGUAGE.into();
        parser
            .set_language(&language)
            .map_err(|err| LensError::internal(format!("failed to load JSON grammar: {err}")))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| LensError::internal("JSON parse was cancelled"))?;

        if let Some(node) = first_error(tree.root_node()) {
            let message = if node.is_missing() {
                format!("missing {}", node.kind())
            } else {
                "unexpected input".to_string()
            };
            return Err(LensError::JsonSyntax {
                offset: node.start_byte(),
                message,
            });
        }
        let values = entries(tree.root_node());
        if let Some(extra) = values.get(1) {
            return Err(LensError::JsonSyntax {
                offset: extra.start_byte(),
                message: "unexpected trailing content".to_string(),
            });
        }
        Ok(Self { source, tree })
    }

    pub fn source(&self) -> &'s str {
        self.source
    }

    /// Top-level value, `None` when the document holds only comments.
    pub fn root(&self) -> Option<Node<'_>> {
        entries(self.tree.root_node()).into_iter().next()
    }

    /// Source text of a node
    pub fn raw(&self, node: Node<'_>) -> &'s str {
        self.source.get(node.byte_range()).unwrap_or("")
    }

    /// Decoded key of a `pair` node.
    pub fn pair_key(&self, pair: Node<'_>) -> Option<String> {
        decode_string(self.raw(pair.child_by_field_name("key")?))
    }
}

/// Pairs of an object, elements of an array or values of the document.
pub(crate) fn entries(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// Unescape a string literal, quotes included.
///
/// Literals serde_json refuses (lone surrogates) yield `None`.
pub fn decode_string(raw: &str) -> Option<String> {
    serde_json::from_str(raw).ok()
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}
