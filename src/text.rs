//! Text coordinate utilities.
//!
//! This module provides utilities for working with document coordinates:
//! - Position mapping between LSP (line + UTF-16 column), UTF-16 character
//!   offsets and byte offsets
//! - Character offset ranges as reported by document change feeds

pub mod position;

pub use position::{
    PositionMapper, compute_line_starts, convert_byte_to_utf16_in_line,
    convert_utf16_to_byte_in_line, utf16_len,
};

/// Half-open range of UTF-16 character offsets into a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OffsetRange {
    pub start: usize,
    pub end: usize,
}

impl OffsetRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "range start must not exceed end");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Check whether `position` lies inside `range`, both ends included.
pub fn range_contains(
    range: &tower_lsp_server::ls_types::Range,
    position: tower_lsp_server::ls_types::Position,
) -> bool {
    let after_start = (position.line, position.character) >= (range.start.line, range.start.character);
    let before_end = (position.line, position.character) <= (range.end.line, range.end.character);
    after_start && before_end
}
