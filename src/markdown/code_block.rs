use serde::Deserialize;
use tower_lsp_server::ls_types::Position;
use tree_sitter::{Node, Parser};

use crate::error::{LensError, LensResult};
use crate::projection::{AnchorResolver, CodeBlock, Replacement, TargetKey};
use crate::text::{PositionMapper, utf16_len};

#[derive(Debug, Default, Deserialize)]
struct CodeBlockMeta {
    ext: Option<String>,
}

/// Split a fence info string into language and optional extension.
///
/// `python {"ext": "py"}` yields `("python", Some("py"))`. Metadata that is
/// not a JSON object with an `ext` string is ignored.
pub fn parse_info_string(info: &str) -> (String, Option<String>) {
    let info = info.trim();
    let (language, meta) = match info.split_once(char::is_whitespace) {
        Some((language, meta)) => (language, meta.trim()),
        None => (info, ""),
    };
    let extension = if meta.is_empty() {
        None
    } else {
        serde_json::from_str::<CodeBlockMeta>(meta)
            .ok()
            .and_then(|meta| meta.ext)
            .filter(|ext| !ext.is_empty())
    };
    (language.to_string(), extension)
}

/// Parse every fenced code block of a markdown document.
///
/// Blocks at the top level (inside headings' sections) and blocks directly
/// inside list items are collected; ids are their traversal index.
pub fn parse_code_blocks(text: &str) -> Vec<CodeBlock> {
    let mut parser = Parser::new();
    let language: tree_sitter::Language = tree_sitter_md::LANGUAGE.into();
    if let Err(err) = parser.set_language(&language) {
        log::error!(target: "editlens::markdown", "Failed to load markdown grammar: {}", err);
        return Vec::new();
    }
    let Some(tree) = parser.parse(text, None) else {
        log::warn!(target: "editlens::markdown", "Markdown parse was cancelled");
        return Vec::new();
    };

    let mut nodes = Vec::new();
    collect_code_blocks(tree.root_node(), &mut nodes);

    let mapper = PositionMapper::new(text);
    nodes
        .into_iter()
        .enumerate()
        .map(|(index, node)| build_block(index, node, text, &mapper))
        .collect()
}

fn collect_code_blocks<'tree>(node: Node<'tree>, blocks: &mut Vec<Node<'tree>>) {
    match node.kind() {
        "fenced_code_block" => blocks.push(node),
        "document" | "section" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_code_blocks(child, blocks);
            }
        }
        "list" => {
            let mut cursor = node.walk();
            for item in node.named_children(&mut cursor) {
                if item.kind() != "list_item" {
                    continue;
                }
                let mut item_cursor = item.walk();
                blocks.extend(
                    item.named_children(&mut item_cursor)
                        .filter(|child| child.kind() == "fenced_code_block"),
                );
            }
        }
        _ => {}
    }
}

fn build_block(index: usize, node: Node<'_>, text: &str, mapper: &PositionMapper<'_>) -> CodeBlock {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
    let mut delimiters = children
        .iter()
        .filter(|child| child.kind() == "fenced_code_block_delimiter");
    let opening = delimiters.next().copied().unwrap_or(node);
    let closing = delimiters.next().copied();

    let (language, extension) = children
        .iter()
        .find(|child| child.kind() == "info_string")
        .and_then(|info| info.utf8_text(text.as_bytes()).ok())
        .map(parse_info_string)
        .unwrap_or_default();

    let fence_row = opening.start_position().row;
    let end_row = match closing {
        Some(closing) => closing.start_position().row,
        None => {
            let end = node.end_position();
            if end.column == 0 { end.row } else { end.row + 1 }
        }
    }
    .min(mapper.line_count())
    .max(fence_row + 1);

    // Lines are kept verbatim, indentation included, so projection columns
    // equal primary columns
    let content = (fence_row + 1..end_row)
        .map(|row| mapper.line_text(row).unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n");

    let content_start = Position::new((fence_row + 1) as u32, 0);
    let content_end = if end_row > fence_row + 1 {
        let last_row = end_row - 1;
        let width = mapper.line_text(last_row).map(utf16_len).unwrap_or(0);
        Position::new(last_row as u32, width as u32)
    } else {
        content_start
    };

    let declared_end = closing.map(|c| c.end_byte()).unwrap_or(node.end_byte());
    let range = mapper
        .byte_range_to_range(node.start_byte(), declared_end)
        .unwrap_or_default();

    CodeBlock {
        id: index.to_string(),
        content,
        range,
        content_range: tower_lsp_server::ls_types::Range::new(content_start, content_end),
        language,
        extension,
    }
}

/// Locates a projected code block by its id in the live markdown text.
#[derive(Debug, Clone)]
pub struct CodeBlockAnchor {
    key: TargetKey,
}

impl CodeBlockAnchor {
    pub fn new(key: TargetKey) -> Self {
        Self { key }
    }
}

impl AnchorResolver for CodeBlockAnchor {
    fn resolve(&self, primary_text: &str, projection_text: &str) -> LensResult<Replacement> {
        let block = parse_code_blocks(primary_text)
            .into_iter()
            .find(|block| block.id == self.key.id && block.language == self.key.language)
            .ok_or_else(|| LensError::BlockNotFound {
                id: self.key.id.clone(),
            })?;

        // The trailing newline of a projection file is not block content
        let projection_text = projection_text
            .strip_suffix('\n')
            .unwrap_or(projection_text);
        let eol = line_ending(primary_text);
        let lines: Vec<&str> = projection_text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();
        let mapper = PositionMapper::new(primary_text);

        if block.content_range.start == block.content_range.end && block.content.is_empty() {
            if projection_text.is_empty() {
                let at = mapper
                    .line_start(block.content_range.start.line as usize)
                    .unwrap_or(primary_text.len());
                return Ok(Replacement {
                    bytes: at..at,
                    text: String::new(),
                });
            }
            return Ok(match mapper.line_start(block.content_range.start.line as usize) {
                Some(at) => Replacement {
                    bytes: at..at,
                    text: lines.iter().map(|line| format!("{line}{eol}")).collect(),
                },
                None => Replacement {
                    bytes: primary_text.len()..primary_text.len(),
                    text: format!("{eol}{}", lines.join(eol)),
                },
            });
        }

        let (start, end) = mapper
            .range_to_byte_range(block.content_range)
            .ok_or_else(|| LensError::BlockNotFound {
                id: self.key.id.clone(),
            })?;
        Ok(Replacement {
            bytes: start..end,
            text: lines.join(eol),
        })
    }
}

/// Line terminator used by `text`, judged by its first line.
fn line_ending(text: &str) -> &'static str {
    match text.find('\n') {
        Some(newline) if text[..newline].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}
