use url::Url;

use super::TrackedSpan;
use crate::text::{OffsetRange, PositionMapper, utf16_len};

/// Why an edit ended the tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The edit is not fully inside a single tracked span
    OutsideTrackedSpans,
    /// The inserted text is not identifier-like
    InvalidCharacters,
}

/// Result of feeding one edit to a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    Applied,
    AbortSession(AbortReason),
}

impl AcceptOutcome {
    pub fn should_abort_session(&self) -> bool {
        matches!(self, AcceptOutcome::AbortSession(_))
    }
}

/// Characters an edit inside a tracked identifier may insert.
pub fn is_identifier_text(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Tracked spans of one document plus the text it had when tracking began.
#[derive(Debug, Clone)]
pub struct TextChangeTracker {
    uri: Url,
    original_doc_text: String,
    spans: Vec<TrackedSpan>,
}

impl TextChangeTracker {
    pub fn new(uri: Url, document_text: impl Into<String>) -> Self {
        Self {
            uri,
            original_doc_text: document_text.into(),
            spans: Vec::new(),
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn original_doc_text(&self) -> &str {
        &self.original_doc_text
    }

    pub fn tracked_spans(&self) -> &[TrackedSpan] {
        &self.spans
    }

    /// Spans whose text differs from what it was when first tracked
    pub fn changed_tracked_spans(&self) -> Vec<&TrackedSpan> {
        self.spans.iter().filter(|span| span.changed()).collect()
    }

    /// Changed span touching `offset`, if any
    pub fn changed_span_at(&self, offset: usize) -> Option<&TrackedSpan> {
        self.spans
            .iter()
            .find(|span| span.changed() && span.contains(offset))
    }

    /// Start tracking `range` of the live document.
    ///
    /// Returns the span already covering `range.start` when there is one.
    /// Returns `None` when the range lies outside `document_text` or would
    /// overlap (or touch) another span.
    pub fn track_range(&mut self, document_text: &str, range: OffsetRange) -> Option<&TrackedSpan> {
        if let Some(index) = self.spans.iter().position(|span| span.contains(range.start)) {
            return self.spans.get(index);
        }

        if self
            .spans
            .iter()
            .any(|span| span.start() <= range.end && range.start <= span.end())
        {
            return None;
        }

        let mapper = PositionMapper::new(document_text);
        let start = mapper.offset_to_byte(range.start)?;
        let end = mapper.offset_to_byte(range.end)?;
        let text = document_text.get(start..end)?;

        // Only spans physically before the new one moved it away from its
        // original position, whatever order they were tracked in.
        let delta_to_original: isize = self
            .spans
            .iter()
            .filter(|span| span.end() < range.start)
            .map(TrackedSpan::delta_to_original)
            .sum();
        let original_start = range.start.checked_add_signed(-delta_to_original)?;

        log::trace!(
            target: "editlens::tracking",
            "Tracking {:?} at {} (original {})",
            text,
            range.start,
            original_start
        );
        self.spans
            .push(TrackedSpan::new(range.start, text, original_start));
        self.spans.last()
    }

    /// Feed one edit of the live document, expressed in pre-edit offsets.
    pub fn accept_change(&mut self, range: OffsetRange, new_text: &str) -> AcceptOutcome {
        let Some(index) = self
            .spans
            .iter()
            .position(|span| span.contains(range.start) && span.contains(range.end))
        else {
            return AcceptOutcome::AbortSession(AbortReason::OutsideTrackedSpans);
        };

        if !is_identifier_text(new_text) {
            return AcceptOutcome::AbortSession(AbortReason::InvalidCharacters);
        }

        let delta = utf16_len(new_text) as isize - range.len() as isize;
        let edited = &mut self.spans[index];
        let end_before_edit = edited.end();
        let span_start = edited.start();
        edited.apply_edit(range.start - span_start, range.end - span_start, new_text);

        for (i, span) in self.spans.iter_mut().enumerate() {
            if i != index && span.start() > end_before_edit {
                span.move_by(delta);
            }
        }
        AcceptOutcome::Applied
    }
}
