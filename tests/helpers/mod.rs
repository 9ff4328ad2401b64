//! Shared test helpers for integration tests.
//!
//! Note: `helpers/mod.rs` rather than `tests/helpers.rs`, because Cargo would
//! compile a top-level `tests/helpers.rs` as a standalone test.

#![allow(dead_code)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;

use editlens::document::DocumentStore;
use editlens::error::LensResult;
use editlens::host::{
    CompletionProvider, DefinitionProvider, DiagnosticProvider, DocumentEdit, DocumentHost,
    HighlightProvider, RenameProvider, SignatureHelpProvider,
};
use editlens::text::PositionMapper;
use tower_lsp_server::ls_types::{
    CompletionItem, CompletionList, CompletionTextEdit, Diagnostic, DocumentHighlight,
    DocumentHighlightKind, LocationLink, Position, Range, SignatureHelp, SignatureInformation,
    TextEdit, Uri,
};
use url::Url;

/// Byte ranges of `[A-Za-z0-9_]+` runs.
pub fn word_ranges(text: &str) -> Vec<(usize, usize)> {
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

/// In-memory host whose oracles treat equal words as one symbol.
///
/// Language queries return canned answers echoing the queried position and
/// record every call.
#[derive(Default)]
pub struct FakeHost {
    pub store: DocumentStore,
    pub rename_calls: Mutex<Vec<(Url, Position, String)>>,
    pub queries: Mutex<Vec<(String, Url, Position)>>,
    pub diagnostics: Mutex<HashMap<Url, Vec<Diagnostic>>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, uri: &Url, text: &str, language_id: &str) {
        self.store
            .open(uri.clone(), text.to_string(), Some(language_id.to_string()));
    }

    pub fn set_diagnostics(&self, uri: &Url, diagnostics: Vec<Diagnostic>) {
        self.diagnostics
            .lock()
            .unwrap()
            .insert(uri.clone(), diagnostics);
    }

    pub fn last_query(&self) -> Option<(String, Url, Position)> {
        self.queries.lock().unwrap().last().cloned()
    }

    fn record(&self, kind: &str, uri: &Url, position: Position) {
        self.queries
            .lock()
            .unwrap()
            .push((kind.to_string(), uri.clone(), position));
    }
}

pub fn lsp_uri(url: &Url) -> Uri {
    Uri::from_str(url.as_str()).unwrap()
}

pub fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
    Range::new(Position::new(sl, sc), Position::new(el, ec))
}

impl DocumentHost for FakeHost {
    fn text(&self, uri: &Url) -> Option<String> {
        self.store.get_document_text(uri)
    }

    fn open_documents(&self) -> Vec<Url> {
        self.store.open_documents()
    }

    fn version(&self, uri: &Url) -> Option<i32> {
        DocumentHost::version(&self.store, uri)
    }

    async fn apply_edits(&self, edits: Vec<DocumentEdit>) -> LensResult<()> {
        self.store.apply(edits).map(|_| ())
    }
}

impl HighlightProvider for FakeHost {
    async fn document_highlights(&self, uri: &Url, position: Position) -> Vec<DocumentHighlight> {
        let Some(text) = self.text(uri) else {
            return Vec::new();
        };
        let mapper = PositionMapper::new(&text);
        let Some(byte) = mapper.position_to_byte(position) else {
            return Vec::new();
        };
        let ranges = word_ranges(&text);
        let Some(&(s, e)) = ranges.iter().find(|(s, e)| *s <= byte && byte <= *e) else {
            return Vec::new();
        };
        let word = &text[s..e];
        ranges
            .iter()
            .filter(|(s, e)| &text[*s..*e] == word)
            .filter_map(|(s, e)| mapper.byte_range_to_range(*s, *e))
            .map(|range| DocumentHighlight {
                range,
                kind: Some(DocumentHighlightKind::TEXT),
            })
            .collect()
    }
}

impl RenameProvider for FakeHost {
    async fn rename(
        &self,
        uri: &Url,
        position: Position,
        new_name: &str,
    ) -> LensResult<Option<Vec<DocumentEdit>>> {
        self.rename_calls
            .lock()
            .unwrap()
            .push((uri.clone(), position, new_name.to_string()));
        let highlights = self.document_highlights(uri, position).await;
        if highlights.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            highlights
                .into_iter()
                .map(|h| DocumentEdit::new(uri.clone(), h.range, new_name))
                .collect(),
        ))
    }
}

impl CompletionProvider for FakeHost {
    async fn completion(
        &self,
        uri: &Url,
        position: Position,
        _trigger_character: Option<&str>,
    ) -> Option<CompletionList> {
        self.record("completion", uri, position);
        Some(CompletionList {
            is_incomplete: false,
            items: vec![CompletionItem {
                label: "print".to_string(),
                text_edit: Some(CompletionTextEdit::Edit(TextEdit::new(
                    Range::new(position, position),
                    "print".to_string(),
                ))),
                additional_text_edits: Some(vec![TextEdit::new(
                    range(0, 0, 0, 0),
                    "import io\n".to_string(),
                )]),
                ..Default::default()
            }],
        })
    }
}

impl DefinitionProvider for FakeHost {
    async fn definition(&self, uri: &Url, position: Position) -> Vec<LocationLink> {
        self.record("definition", uri, position);
        let target = range(0, 0, 0, 3);
        vec![LocationLink {
            origin_selection_range: Some(Range::new(position, position)),
            target_uri: lsp_uri(uri),
            target_range: target,
            target_selection_range: target,
        }]
    }
}

impl SignatureHelpProvider for FakeHost {
    async fn signature_help(
        &self,
        uri: &Url,
        position: Position,
        _trigger_character: Option<&str>,
    ) -> Option<SignatureHelp> {
        self.record("signature_help", uri, position);
        Some(SignatureHelp {
            signatures: vec![SignatureInformation {
                label: "print(value)".to_string(),
                documentation: None,
                parameters: None,
                active_parameter: None,
            }],
            active_signature: Some(0),
            active_parameter: Some(0),
        })
    }
}

impl DiagnosticProvider for FakeHost {
    fn diagnostics(&self, uri: &Url) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap()
            .get(uri)
            .cloned()
            .unwrap_or_default()
    }
}
