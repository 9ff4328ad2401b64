use tower_lsp_server::ls_types::Range;

use crate::error::{LensError, LensResult};
use crate::host::ContentChange;
use crate::text::{PositionMapper, utf16_len};

/// An open document: its text plus the metadata the host tracks for it
pub struct Document {
    text: String,
    version: i32,
    language_id: Option<String>,
}

impl Document {
    /// Create a new document with just text
    pub fn new(text: String) -> Self {
        Self {
            text,
            version: 0,
            language_id: None,
        }
    }

    /// Create with a language identifier (e.g. "markdown", "json")
    pub fn with_language(text: String, language_id: String) -> Self {
        Self {
            text,
            version: 0,
            language_id: Some(language_id),
        }
    }

    /// Get the text content
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn language_id(&self) -> Option<&str> {
        self.language_id.as_deref()
    }

    /// Get a position mapper for this document
    pub fn position_mapper(&self) -> PositionMapper<'_> {
        PositionMapper::new(self.text())
    }

    /// Compute the result of applying `edits` without mutating the document.
    ///
    /// Every range refers to the current text. Changes are returned in
    /// descending offset order, which is how they are applied.
    pub(crate) fn plan_edits(
        &self,
        edits: &[(Range, String)],
    ) -> LensResult<(String, Vec<ContentChange>)> {
        let mapper = self.position_mapper();
        let mut planned = Vec::with_capacity(edits.len());

        for (range, new_text) in edits {
            let Some((start, end)) = mapper.range_to_byte_range(*range) else {
                return Err(LensError::invalid_edit(format!(
                    "range {}:{}-{}:{} is outside the document",
                    range.start.line, range.start.character, range.end.line, range.end.character
                )));
            };
            if start > end {
                return Err(LensError::invalid_edit("range start is after its end"));
            }
            let range_offset = utf16_len(&self.text[..start]);
            let range_length = utf16_len(&self.text[start..end]);
            planned.push((
                start,
                end,
                ContentChange {
                    range: *range,
                    range_offset,
                    range_length,
                    text: new_text.clone(),
                },
            ));
        }

        planned.sort_by_key(|(start, end, _)| (*start, *end));
        for pair in planned.windows(2) {
            let (_, prev_end, _) = &pair[0];
            let (next_start, _, _) = &pair[1];
            if prev_end > next_start {
                return Err(LensError::invalid_edit("edit ranges overlap"));
            }
        }

        let mut text = self.text.clone();
        let mut changes = Vec::with_capacity(planned.len());
        for (start, end, change) in planned.into_iter().rev() {
            text.replace_range(start..end, &change.text);
            changes.push(change);
        }
        Ok((text, changes))
    }

    /// Replace the text, bumping the version
    pub(crate) fn commit(&mut self, text: String) {
        self.text = text;
        self.version += 1;
    }

    /// Get the length in bytes
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Check if the document is empty
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
