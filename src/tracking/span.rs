use crate::text::{OffsetRange, convert_utf16_to_byte_in_line, utf16_len};

/// One tracked occurrence of an identifier.
///
/// Offsets are UTF-16 code units. `start` follows the live document while
/// `original_start` points into the snapshot taken when the session began.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedSpan {
    start: usize,
    text: String,
    original_text: String,
    original_start: usize,
}

impl TrackedSpan {
    pub fn new(start: usize, original_text: impl Into<String>, original_start: usize) -> Self {
        let original_text = original_text.into();
        Self {
            start,
            text: original_text.clone(),
            original_text,
            original_start,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.start + self.len()
    }

    /// Current length in UTF-16 code units
    pub fn len(&self) -> usize {
        utf16_len(&self.text)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn range(&self) -> OffsetRange {
        OffsetRange::new(self.start, self.end())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn original_start(&self) -> usize {
        self.original_start
    }

    /// Range of the occurrence inside the original snapshot
    pub fn original_range(&self) -> OffsetRange {
        OffsetRange::new(
            self.original_start,
            self.original_start + utf16_len(&self.original_text),
        )
    }

    pub fn changed(&self) -> bool {
        self.text != self.original_text
    }

    /// Growth of the span since tracking started, in UTF-16 code units
    pub fn delta_to_original(&self) -> isize {
        self.len() as isize - utf16_len(&self.original_text) as isize
    }

    /// Both ends are inclusive so typing right after the identifier extends it.
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end()
    }

    pub(crate) fn move_by(&mut self, delta: isize) {
        self.start = self.start.saturating_add_signed(delta);
    }

    /// Replace `[start, end)` (relative to the span start) with `new_text`.
    pub(crate) fn apply_edit(&mut self, start: usize, end: usize, new_text: &str) {
        let len = self.text.len();
        let start = convert_utf16_to_byte_in_line(&self.text, start).unwrap_or(len);
        let end = convert_utf16_to_byte_in_line(&self.text, end)
            .unwrap_or(len)
            .max(start);
        self.text.replace_range(start..end, new_text);
    }
}
