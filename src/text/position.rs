use tower_lsp_server::ls_types::{Position, Range};

/// Maps between LSP positions, UTF-16 character offsets and byte offsets.
///
/// Hosts report edits as UTF-16 code unit offsets (and line/column pairs with
/// UTF-16 columns), while Rust strings are indexed by bytes. Every conversion
/// between those spaces goes through this type.
pub struct PositionMapper<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> PositionMapper<'a> {
    /// Create a new PositionMapper with pre-computed line starts
    pub fn new(text: &'a str) -> Self {
        let line_starts = compute_line_starts(text);
        Self { text, line_starts }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Get the byte offset of a line start
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }

    /// Byte offset of the end of a line, excluding its `\n` or `\r\n`
    pub fn line_end(&self, line: usize) -> Option<usize> {
        let start = self.line_start(line)?;
        if line + 1 < self.line_starts.len() {
            let newline = self.line_starts[line + 1] - 1;
            let crlf = newline > start && self.text.as_bytes()[newline - 1] == b'\r';
            Some(if crlf { newline - 1 } else { newline })
        } else {
            Some(self.text.len())
        }
    }

    /// Text of a line without its trailing newline
    pub fn line_text(&self, line: usize) -> Option<&'a str> {
        let start = self.line_start(line)?;
        let end = self.line_end(line)?;
        self.text.get(start..end)
    }

    /// Convert LSP Position to byte offset in the document.
    ///
    /// Columns past the end of the line clamp to the line end.
    pub fn position_to_byte(&self, position: Position) -> Option<usize> {
        let line = position.line as usize;
        let character = position.character as usize;

        let line_start = self.line_start(line)?;
        let line_text = self.line_text(line)?;

        match convert_utf16_to_byte_in_line(line_text, character) {
            Some(byte_offset) => Some(line_start + byte_offset),
            None => Some(line_start + line_text.len()),
        }
    }

    /// Convert byte offset to LSP Position
    pub fn byte_to_position(&self, offset: usize) -> Option<Position> {
        if offset > self.text.len() {
            return None;
        }

        // Binary search for the line containing this offset
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };

        let line_start = self.line_start(line)?;
        let line_text = self.line_text(line)?;
        let line_offset = offset.saturating_sub(line_start);

        let character = match convert_byte_to_utf16_in_line(line_text, line_offset) {
            Some(utf16_offset) => utf16_offset,
            None => {
                // In the middle of a character: snap back to its start
                let mut valid_offset = line_offset.min(line_text.len());
                loop {
                    if let Some(utf16) = convert_byte_to_utf16_in_line(line_text, valid_offset) {
                        break utf16;
                    }
                    if valid_offset == 0 {
                        break 0;
                    }
                    valid_offset -= 1;
                }
            }
        };

        Some(Position {
            line: line as u32,
            character: character as u32,
        })
    }

    /// Convert byte range to LSP Range
    pub fn byte_range_to_range(&self, start: usize, end: usize) -> Option<Range> {
        let start_pos = self.byte_to_position(start)?;
        let end_pos = self.byte_to_position(end)?;
        Some(Range {
            start: start_pos,
            end: end_pos,
        })
    }

    /// Convert LSP Range to a byte range
    pub fn range_to_byte_range(&self, range: Range) -> Option<(usize, usize)> {
        let start = self.position_to_byte(range.start)?;
        let end = self.position_to_byte(range.end)?;
        Some((start, end))
    }

    /// Convert a UTF-16 character offset into a byte offset.
    ///
    /// Returns None for offsets past the end of the document or inside a
    /// surrogate pair.
    pub fn offset_to_byte(&self, offset: usize) -> Option<usize> {
        let mut utf16 = 0;
        for (byte, ch) in self.text.char_indices() {
            if utf16 == offset {
                return Some(byte);
            }
            if utf16 > offset {
                return None;
            }
            utf16 += ch.len_utf16();
        }
        (utf16 == offset).then_some(self.text.len())
    }

    /// Convert a byte offset into a UTF-16 character offset
    pub fn byte_to_offset(&self, byte: usize) -> Option<usize> {
        let prefix = self.text.get(..byte)?;
        Some(utf16_len(prefix))
    }

    pub fn position_to_offset(&self, position: Position) -> Option<usize> {
        let byte = self.position_to_byte(position)?;
        self.byte_to_offset(byte)
    }

    pub fn offset_to_position(&self, offset: usize) -> Option<Position> {
        let byte = self.offset_to_byte(offset)?;
        self.byte_to_position(byte)
    }

    /// Position just past the last character of the document
    pub fn end_position(&self) -> Position {
        let line = self.line_starts.len() - 1;
        let character = self.line_text(line).map(utf16_len).unwrap_or(0);
        Position {
            line: line as u32,
            character: character as u32,
        }
    }

    /// Range covering the whole document
    pub fn full_range(&self) -> Range {
        Range {
            start: Position::new(0, 0),
            end: self.end_position(),
        }
    }
}

/// Length of a string in UTF-16 code units
pub fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

/// Compute line start offsets for efficient position mapping
pub fn compute_line_starts(text: &str) -> Vec<usize> {
    let mut line_starts = vec![0];
    let mut offset = 0;

    for ch in text.chars() {
        offset += ch.len_utf8();
        if ch == '\n' {
            line_starts.push(offset);
        }
    }

    line_starts
}

/// Convert UTF-16 position to byte position within a line
/// Returns None if the UTF-16 position is invalid
#[inline(always)]
pub fn convert_utf16_to_byte_in_line(line_text: &str, utf16_pos: usize) -> Option<usize> {
    let mut byte_offset = 0;
    let mut utf16_offset = 0;

    for ch in line_text.chars() {
        if utf16_offset >= utf16_pos {
            return Some(byte_offset);
        }
        utf16_offset += ch.len_utf16();
        byte_offset += ch.len_utf8();
    }

    if utf16_offset == utf16_pos {
        Some(byte_offset)
    } else {
        // Position is beyond the end of the line
        None
    }
}

/// Convert byte position to UTF-16 position within a line
/// Returns None if the byte position is invalid (e.g., in the middle of a multi-byte character)
#[inline(always)]
pub fn convert_byte_to_utf16_in_line(line_text: &str, byte_pos: usize) -> Option<usize> {
    let mut utf16_offset = 0;
    let mut byte_count = 0;

    for ch in line_text.chars() {
        if byte_count == byte_pos {
            return Some(utf16_offset);
        }
        let ch_bytes = ch.len_utf8();
        if byte_count + ch_bytes > byte_pos {
            return None;
        }
        byte_count += ch_bytes;
        utf16_offset += ch.len_utf16();
    }

    if byte_count == byte_pos {
        Some(utf16_offset)
    } else {
        None
    }
}
