//! Rename session state machine.
//!
//! Idle -> Tracking (spans, none changed) -> Dirty (a span changed) ->
//! Committing -> Idle. Any disqualifying edit drops the session and starts a
//! fresh one seeded with the current document text.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tower_lsp_server::ls_types::{Position, Range};
use url::Url;

use super::{SessionId, SessionRegistry, TextChangeTracker, TrackedSpan};
use crate::config::{HighlightTheme, SettingsStore};
use crate::error::{LensError, LensResult, LockResultExt};
use crate::host::{DocumentChangeEvent, DocumentEdit, DocumentHost, HighlightProvider, RenameProvider};
use crate::notify::ChangeNotifier;
use crate::text::{OffsetRange, PositionMapper, range_contains};

/// What the editor should currently show for the rename session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameStatus {
    /// Document the highlights belong to
    pub uri: Option<Url>,
    pub highlights: Vec<Range>,
    pub theme: HighlightTheme,
    /// A changed span sits under one of the selections
    pub applicable: bool,
    pub cancelable: bool,
    /// Status bar text, `None` when the item is hidden
    pub label: Option<String>,
}

/// Clears the ignore flag when dropped, even on early return.
struct IgnoreGuard<'a>(&'a AtomicBool);

impl<'a> IgnoreGuard<'a> {
    fn engage(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for IgnoreGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct RenameController<H> {
    host: Arc<H>,
    registry: Arc<SessionRegistry>,
    settings: Arc<SettingsStore>,
    active: Mutex<Option<SessionId>>,
    ignore_changes: AtomicBool,
    /// Document and version reached by the last commit; feed events up to it
    /// are the commit's own edits.
    committed: Mutex<Option<(Url, i32)>>,
    notifier: ChangeNotifier,
}

impl<H> RenameController<H>
where
    H: DocumentHost + HighlightProvider + RenameProvider,
{
    pub fn new(host: Arc<H>, registry: Arc<SessionRegistry>, settings: Arc<SettingsStore>) -> Self {
        Self {
            host,
            registry,
            settings,
            active: Mutex::new(None),
            ignore_changes: AtomicBool::new(false),
            committed: Mutex::new(None),
            notifier: ChangeNotifier::new(),
        }
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// True while a rename commit is applying its own edits
    pub fn is_ignoring_changes(&self) -> bool {
        self.ignore_changes.load(Ordering::SeqCst)
    }

    pub fn active_session(&self) -> LensResult<Option<SessionId>> {
        let active = self
            .active
            .lock()
            .recover_poison("RenameController::active_session")?;
        Ok(*active)
    }

    /// Copy of the active tracker
    pub fn active_tracker(&self) -> LensResult<Option<TextChangeTracker>> {
        let Some(id) = self.active_session()? else {
            return Ok(None);
        };
        self.registry.with_session(id, |tracker| tracker.clone())
    }

    fn enabled(&self) -> bool {
        self.settings.load().apply_rename.enabled
    }

    /// Active session for `uri`, replacing a session on another document.
    fn ensure_session(&self, uri: &Url) -> LensResult<Option<SessionId>> {
        let mut active = self
            .active
            .lock()
            .recover_poison("RenameController::ensure_session")?;
        if let Some(id) = *active
            && self.registry.with_session(id, |t| t.uri() == uri)? == Some(true)
        {
            return Ok(Some(id));
        }
        if let Some(previous) = active.take() {
            self.registry.end(previous)?;
        }
        let Some(text) = self.host.text(uri) else {
            return Ok(None);
        };
        let id = self.registry.begin(TextChangeTracker::new(uri.clone(), text))?;
        *active = Some(id);
        Ok(Some(id))
    }

    fn restart_session(&self, uri: &Url) -> LensResult<()> {
        {
            let mut active = self
                .active
                .lock()
                .recover_poison("RenameController::restart_session")?;
            if let Some(previous) = active.take() {
                self.registry.end(previous)?;
            }
        }
        self.ensure_session(uri).map(|_| ())
    }

    /// Feed an edit event of the host's change feed.
    pub fn handle_text_change(&self, event: &DocumentChangeEvent) -> LensResult<()> {
        if self.is_ignoring_changes() || !self.enabled() || self.is_commit_echo(event)? {
            return Ok(());
        }
        let Some(id) = self.ensure_session(&event.uri)? else {
            return Ok(());
        };

        let mut changes: Vec<_> = event.changes.iter().collect();
        changes.sort_by(|a, b| b.range_offset.cmp(&a.range_offset));

        for change in changes {
            let range = OffsetRange::new(
                change.range_offset,
                change.range_offset + change.range_length,
            );
            let outcome = self
                .registry
                .with_session(id, |tracker| tracker.accept_change(range, &change.text))?;
            if outcome.is_none_or(|outcome| outcome.should_abort_session()) {
                log::debug!(
                    target: "editlens::tracking",
                    "Edit at {} ends session {}: {:?}",
                    change.range_offset,
                    id,
                    outcome
                );
                self.restart_session(&event.uri)?;
                break;
            }
        }

        self.notifier.notify();
        Ok(())
    }

    fn is_commit_echo(&self, event: &DocumentChangeEvent) -> LensResult<bool> {
        let committed = self
            .committed
            .lock()
            .recover_poison("RenameController::is_commit_echo")?;
        Ok(committed
            .as_ref()
            .is_some_and(|(uri, version)| *uri == event.uri && event.version <= *version))
    }

    /// Track the same-symbol occurrence under each selection.
    pub async fn handle_selection_change(&self, uri: &Url, selections: &[Position]) -> LensResult<()> {
        if self.is_ignoring_changes() || !self.enabled() {
            return Ok(());
        }
        let Some(id) = self.ensure_session(uri)? else {
            return Ok(());
        };

        for &selection in selections {
            let highlights = self.host.document_highlights(uri, selection).await;
            let Some(highlight) = highlights
                .iter()
                .find(|h| range_contains(&h.range, selection))
            else {
                continue;
            };
            let Some(text) = self.host.text(uri) else {
                break;
            };
            let mapper = PositionMapper::new(&text);
            let (Some(start), Some(end)) = (
                mapper.position_to_offset(highlight.range.start),
                mapper.position_to_offset(highlight.range.end),
            ) else {
                continue;
            };
            self.registry.with_session(id, |tracker| {
                tracker.track_range(&text, OffsetRange::new(start, end)).is_some()
            })?;
        }

        self.notifier.notify();
        Ok(())
    }

    /// Drop the active session without renaming anything.
    pub fn abort_session(&self) -> LensResult<()> {
        let previous = self
            .active
            .lock()
            .recover_poison("RenameController::abort_session")?
            .take();
        if let Some(id) = previous {
            self.registry.end(id)?;
            self.notifier.notify();
        }
        Ok(())
    }

    /// Changed spans under the selections, or every changed span when no
    /// selection touches one.
    fn spans_to_rename(
        tracker: &TextChangeTracker,
        live_text: &str,
        selections: &[Position],
    ) -> (Vec<TrackedSpan>, bool) {
        let mapper = PositionMapper::new(live_text);
        let mut selected: Vec<TrackedSpan> = Vec::new();
        for &selection in selections {
            let Some(offset) = mapper.position_to_offset(selection) else {
                continue;
            };
            if let Some(span) = tracker.changed_span_at(offset)
                && !selected.iter().any(|s| s.start() == span.start())
            {
                selected.push(span.clone());
            }
        }
        if selected.is_empty() {
            let all = tracker.changed_tracked_spans().into_iter().cloned().collect();
            (all, false)
        } else {
            (selected, true)
        }
    }

    pub fn status(&self, selections: &[Position]) -> LensResult<RenameStatus> {
        let theme = self.settings.load().apply_rename.theme;
        let hidden = RenameStatus {
            uri: None,
            highlights: Vec::new(),
            theme,
            applicable: false,
            cancelable: false,
            label: None,
        };
        let Some(tracker) = self.active_tracker()? else {
            return Ok(hidden);
        };
        let Some(text) = self.host.text(tracker.uri()) else {
            return Ok(hidden);
        };

        let (spans, selected) = Self::spans_to_rename(&tracker, &text, selections);
        if spans.is_empty() {
            return Ok(hidden);
        }
        let mapper = PositionMapper::new(&text);
        let highlights = spans
            .iter()
            .filter_map(|span| {
                Some(Range::new(
                    mapper.offset_to_position(span.start())?,
                    mapper.offset_to_position(span.end())?,
                ))
            })
            .collect();

        Ok(RenameStatus {
            uri: Some(tracker.uri().clone()),
            highlights,
            theme,
            applicable: selected,
            cancelable: true,
            label: Some(format!("$(edit) Rename {} changes", spans.len())),
        })
    }

    /// Whether "Apply Rename" should be offered at `position`.
    pub fn has_code_action(&self, uri: &Url, position: Position) -> LensResult<bool> {
        let Some(tracker) = self.active_tracker()? else {
            return Ok(false);
        };
        if tracker.uri() != uri {
            return Ok(false);
        }
        let Some(text) = self.host.text(uri) else {
            return Ok(false);
        };
        let offset = PositionMapper::new(&text).position_to_offset(position);
        Ok(offset.is_some_and(|offset| tracker.changed_span_at(offset).is_some()))
    }

    /// Turn the tracked edits into a structural rename.
    ///
    /// Reverts the document to its snapshot and asks the rename oracle to
    /// rename each chosen occurrence at its original position. The session is
    /// ended afterwards whether or not the rename succeeded.
    ///
    /// Change events for the commit's own edits are dropped while the edits
    /// are applied. A host that delivers its feed later (the broadcast of
    /// [`DocumentStore`](crate::document::DocumentStore)) must report document
    /// versions: events at or below the version reached by the commit are
    /// recognised and skipped. Without versions such late events restart the
    /// session.
    pub async fn apply_rename(&self, selections: Option<&[Position]>) -> LensResult<()> {
        let Some(id) = self.active_session()? else {
            return Ok(());
        };
        let Some(tracker) = self.registry.with_session(id, |tracker| tracker.clone())? else {
            return Ok(());
        };
        let uri = tracker.uri().clone();
        let live_text = self
            .host
            .text(&uri)
            .ok_or_else(|| LensError::document_not_found(uri.as_str()))?;

        let (spans, _) = Self::spans_to_rename(&tracker, &live_text, selections.unwrap_or(&[]));
        if spans.is_empty() {
            return Ok(());
        }
        let limit = self.settings.load().apply_rename.max_fan_out;
        if spans.len() > limit {
            log::warn!(
                target: "editlens::tracking",
                "Refusing to rename {} tracked changes at once (limit {})",
                spans.len(),
                limit
            );
            return Err(LensError::RenameFanOut {
                count: spans.len(),
                limit,
            });
        }

        let result = {
            let _guard = IgnoreGuard::engage(&self.ignore_changes);
            let result = self.revert_and_rename(&tracker, &live_text, &spans).await;
            let mut committed = self
                .committed
                .lock()
                .recover_poison("RenameController::apply_rename")?;
            *committed = self.host.version(&uri).map(|version| (uri.clone(), version));
            result
        };

        {
            let mut active = self
                .active
                .lock()
                .recover_poison("RenameController::apply_rename")?;
            if *active == Some(id) {
                *active = None;
            }
        }
        self.registry.end(id)?;
        self.notifier.notify();

        let reseed = match selections {
            Some(selections) if !selections.is_empty() => {
                self.handle_selection_change(&uri, selections).await
            }
            _ => Ok(()),
        };
        result.and(reseed)
    }

    async fn revert_and_rename(
        &self,
        tracker: &TextChangeTracker,
        live_text: &str,
        spans: &[TrackedSpan],
    ) -> LensResult<()> {
        let uri = tracker.uri();
        let summary: Vec<String> = spans
            .iter()
            .map(|span| format!("{} => {}", span.original_text(), span.text()))
            .collect();
        log::debug!(target: "editlens::tracking", "Renaming {}", summary.join(", "));

        let whole_document = PositionMapper::new(live_text).full_range();
        self.host
            .apply_edits(vec![DocumentEdit::new(
                uri.clone(),
                whole_document,
                tracker.original_doc_text(),
            )])
            .await?;

        let original = PositionMapper::new(tracker.original_doc_text());
        let mut batch = Vec::new();
        for span in spans {
            let Some(position) = original.offset_to_position(span.original_start()) else {
                return Err(LensError::internal(format!(
                    "original offset {} is outside the snapshot",
                    span.original_start()
                )));
            };
            let edits = self.host.rename(uri, position, span.text()).await?;
            // Two spans of one symbol renamed alike yield the same edits
            for edit in edits.into_iter().flatten() {
                if !batch.contains(&edit) {
                    batch.push(edit);
                }
            }
        }

        if batch.is_empty() {
            return Ok(());
        }
        self.host.apply_edits(batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentStore;
    use crate::host::{ContentChange, DocumentHost};
    use tower_lsp_server::ls_types::{DocumentHighlight, DocumentHighlightKind};

    /// Store-backed host whose oracles treat every word as a symbol.
    #[derive(Default)]
    struct WordHost {
        store: DocumentStore,
    }

    fn word_ranges(text: &str) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut start = None;
        for (i, c) in text.char_indices().chain(std::iter::once((text.len(), ' '))) {
            let word = c.is_ascii_alphanumeric() || c == '_';
            match (word, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    ranges.push((s, i));
                    start = None;
                }
                _ => {}
            }
        }
        ranges
    }

    impl DocumentHost for WordHost {
        fn text(&self, uri: &Url) -> Option<String> {
            self.store.get_document_text(uri)
        }

        fn version(&self, uri: &Url) -> Option<i32> {
            DocumentHost::version(&self.store, uri)
        }

        async fn apply_edits(&self, edits: Vec<DocumentEdit>) -> LensResult<()> {
            self.store.apply(edits).map(|_| ())
        }
    }

    impl HighlightProvider for WordHost {
        async fn document_highlights(&self, uri: &Url, position: Position) -> Vec<DocumentHighlight> {
            let Some(text) = self.text(uri) else {
                return Vec::new();
            };
            let mapper = PositionMapper::new(&text);
            word_ranges(&text)
                .into_iter()
                .filter_map(|(s, e)| mapper.byte_range_to_range(s, e))
                .filter(|range| range_contains(range, position))
                .map(|range| DocumentHighlight {
                    range,
                    kind: Some(DocumentHighlightKind::TEXT),
                })
                .collect()
        }
    }

    impl RenameProvider for WordHost {
        async fn rename(
            &self,
            uri: &Url,
            position: Position,
            new_name: &str,
        ) -> LensResult<Option<Vec<DocumentEdit>>> {
            let Some(text) = self.text(uri) else {
                return Ok(None);
            };
            let mapper = PositionMapper::new(&text);
            let Some(byte) = mapper.position_to_byte(position) else {
                return Ok(None);
            };
            let Some(&(s, e)) = word_ranges(&text).iter().find(|(s, e)| *s <= byte && byte <= *e)
            else {
                return Ok(None);
            };
            let old = &text[s..e];
            let edits = word_ranges(&text)
                .into_iter()
                .filter(|&(s, e)| &text[s..e] == old)
                .filter_map(|(s, e)| mapper.byte_range_to_range(s, e))
                .map(|range| DocumentEdit::new(uri.clone(), range, new_name))
                .collect();
            Ok(Some(edits))
        }
    }

    fn setup(text: &str) -> (Arc<WordHost>, RenameController<WordHost>, Url) {
        let host = Arc::new(WordHost::default());
        let uri = Url::parse("file:///main.py").unwrap();
        host.store.open(uri.clone(), text.to_string(), None);
        let controller = RenameController::new(
            host.clone(),
            Arc::new(SessionRegistry::new()),
            Arc::new(SettingsStore::default()),
        );
        (host, controller, uri)
    }

    fn edit(host: &WordHost, controller: &RenameController<WordHost>, uri: &Url, range: Range, text: &str) {
        let events = host
            .store
            .apply(vec![DocumentEdit::new(uri.clone(), range, text)])
            .unwrap();
        for event in &events {
            controller.handle_text_change(event).unwrap();
        }
    }

    fn line_range(start: u32, end: u32) -> Range {
        Range::new(Position::new(0, start), Position::new(0, end))
    }

    #[tokio::test]
    async fn selection_seeds_tracked_span() {
        let (_host, controller, uri) = setup("let foo = foo + 1");
        controller
            .handle_selection_change(&uri, &[Position::new(0, 5)])
            .await
            .unwrap();

        let tracker = controller.active_tracker().unwrap().unwrap();
        assert_eq!(tracker.tracked_spans().len(), 1);
        assert_eq!(tracker.tracked_spans()[0].text(), "foo");
        assert_eq!(tracker.tracked_spans()[0].start(), 4);
    }

    #[tokio::test]
    async fn edit_inside_span_marks_it_changed() {
        let (host, controller, uri) = setup("let foo = foo + 1");
        controller
            .handle_selection_change(&uri, &[Position::new(0, 5)])
            .await
            .unwrap();

        edit(&host, &controller, &uri, line_range(4, 7), "bar");

        let status = controller.status(&[Position::new(0, 5)]).unwrap();
        assert_eq!(status.label.as_deref(), Some("$(edit) Rename 1 changes"));
        assert!(status.applicable);
        assert!(status.cancelable);
        assert_eq!(status.highlights, vec![line_range(4, 7)]);
        assert!(controller.has_code_action(&uri, Position::new(0, 6)).unwrap());
        assert!(!controller.has_code_action(&uri, Position::new(0, 12)).unwrap());
    }

    #[tokio::test]
    async fn edit_outside_spans_restarts_session() {
        let (host, controller, uri) = setup("let foo = 1");
        controller
            .handle_selection_change(&uri, &[Position::new(0, 5)])
            .await
            .unwrap();
        let first = controller.active_session().unwrap();

        edit(&host, &controller, &uri, line_range(10, 11), "2");

        let second = controller.active_session().unwrap();
        assert_ne!(first, second);
        let tracker = controller.active_tracker().unwrap().unwrap();
        assert!(tracker.tracked_spans().is_empty());
        assert_eq!(tracker.original_doc_text(), "let foo = 2");
    }

    #[tokio::test]
    async fn apply_rename_reverts_and_renames_structurally() {
        let (host, controller, uri) = setup("let foo = foo + 1");
        controller
            .handle_selection_change(&uri, &[Position::new(0, 5)])
            .await
            .unwrap();
        edit(&host, &controller, &uri, line_range(4, 7), "bar");

        controller.apply_rename(None).await.unwrap();

        assert_eq!(host.text(&uri).unwrap(), "let bar = bar + 1");
        assert!(controller.active_session().unwrap().is_none());
        assert!(!controller.is_ignoring_changes());
    }

    #[tokio::test]
    async fn late_feed_events_of_a_commit_are_skipped() {
        let (host, controller, uri) = setup("let foo = foo + 1");
        controller
            .handle_selection_change(&uri, &[Position::new(0, 5)])
            .await
            .unwrap();
        edit(&host, &controller, &uri, line_range(4, 7), "bar");
        let mut feed = host.store.subscribe();

        controller
            .apply_rename(Some(&[Position::new(0, 5)]))
            .await
            .unwrap();
        let reseeded = controller.active_session().unwrap();
        assert!(reseeded.is_some());

        let mut delivered = 0;
        while let Ok(event) = feed.try_recv() {
            controller.handle_text_change(&event).unwrap();
            delivered += 1;
        }

        assert_eq!(delivered, 2);
        assert_eq!(controller.active_session().unwrap(), reseeded);
        let tracker = controller.active_tracker().unwrap().unwrap();
        assert_eq!(tracker.tracked_spans().len(), 1);
        assert!(tracker.changed_tracked_spans().is_empty());

        edit(&host, &controller, &uri, line_range(4, 7), "baz");
        let tracker = controller.active_tracker().unwrap().unwrap();
        assert_eq!(tracker.changed_tracked_spans().len(), 1);
    }

    #[tokio::test]
    async fn apply_rename_over_fan_out_limit_keeps_session() {
        let (host, controller, uri) = setup("a b c");
        for character in [0, 2, 4] {
            controller
                .handle_selection_change(&uri, &[Position::new(0, character)])
                .await
                .unwrap();
        }
        edit(&host, &controller, &uri, line_range(4, 5), "z");
        edit(&host, &controller, &uri, line_range(2, 3), "y");
        edit(&host, &controller, &uri, line_range(0, 1), "x");

        let result = controller.apply_rename(None).await;

        assert!(matches!(
            result,
            Err(LensError::RenameFanOut { count: 3, limit: 2 })
        ));
        assert_eq!(host.text(&uri).unwrap(), "x y z");
        assert!(controller.active_session().unwrap().is_some());
    }

    #[tokio::test]
    async fn abort_session_hides_status() {
        let (host, controller, uri) = setup("foo");
        controller
            .handle_selection_change(&uri, &[Position::new(0, 1)])
            .await
            .unwrap();
        edit(&host, &controller, &uri, line_range(3, 3), "d");

        controller.abort_session().unwrap();

        let status = controller.status(&[]).unwrap();
        assert_eq!(status.label, None);
        assert!(!status.cancelable);
    }

    #[test]
    fn changes_are_ignored_while_committing() {
        let (_host, controller, uri) = setup("foo");
        let _guard = IgnoreGuard::engage(&controller.ignore_changes);
        controller
            .handle_text_change(&DocumentChangeEvent {
                uri,
                version: 1,
                changes: vec![ContentChange {
                    range: line_range(0, 0),
                    range_offset: 0,
                    range_length: 0,
                    text: " ".to_string(),
                }],
            })
            .unwrap();
        assert!(controller.active_session().unwrap().is_none());
    }
}
