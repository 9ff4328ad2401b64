use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use dashmap::mapref::one::Ref;
use tokio::sync::broadcast;
use tower_lsp_server::ls_types::Range;
use url::Url;

use crate::document::Document;
use crate::error::{LensError, LensResult, LockResultExt};
use crate::host::{DocumentChangeEvent, DocumentEdit, DocumentHost};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

// In-memory host documents: the change feed and edit application in one place.
pub struct DocumentStore {
    documents: DashMap<Url, Document>,
    changes: broadcast::Sender<DocumentChangeEvent>,
    // Held from planning to commit so no writer works on stale text
    edits: Mutex<()>,
}

pub struct DocumentHandle<'a> {
    inner: Ref<'a, Url, Document>,
}

impl<'a> DocumentHandle<'a> {
    fn new(inner: Ref<'a, Url, Document>) -> Self {
        Self { inner }
    }
}

impl<'a> Deref for DocumentHandle<'a> {
    type Target = Document;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            documents: DashMap::new(),
            changes,
            edits: Mutex::new(()),
        }
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, uri: Url, text: String, language_id: Option<String>) {
        let _edits = self.edit_guard();
        let document = match language_id {
            Some(lang) => Document::with_language(text, lang),
            None => Document::new(text),
        };
        self.documents.insert(uri, document);
    }

    pub fn get(&self, uri: &Url) -> Option<DocumentHandle<'_>> {
        self.documents.get(uri).map(DocumentHandle::new)
    }

    pub fn get_document_text(&self, uri: &Url) -> Option<String> {
        self.documents.get(uri).map(|doc| doc.text().to_string())
    }

    pub fn close(&self, uri: &Url) -> Option<Document> {
        let _edits = self.edit_guard();
        self.documents.remove(uri).map(|(_, doc)| doc)
    }

    fn edit_guard(&self) -> MutexGuard<'_, ()> {
        self.edits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to change events for every document in the store
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentChangeEvent> {
        self.changes.subscribe()
    }

    /// Apply edits to all affected documents, or to none of them.
    ///
    /// Returns the change events that were broadcast, one per touched document.
    pub fn apply(&self, edits: Vec<DocumentEdit>) -> LensResult<Vec<DocumentChangeEvent>> {
        let _edits = self.edits.lock().recover_poison("DocumentStore::apply")?;
        let mut by_uri: HashMap<Url, Vec<(Range, String)>> = HashMap::new();
        for edit in edits {
            by_uri
                .entry(edit.uri)
                .or_default()
                .push((edit.range, edit.new_text));
        }

        // Plan every document first so a failure leaves all of them untouched
        let mut planned = Vec::with_capacity(by_uri.len());
        for (uri, doc_edits) in by_uri {
            let Some(doc) = self.documents.get(&uri) else {
                return Err(LensError::document_not_found(uri.as_str()));
            };
            let (text, changes) = doc.plan_edits(&doc_edits)?;
            drop(doc);
            planned.push((uri, text, changes));
        }

        let mut events = Vec::with_capacity(planned.len());
        for (uri, text, changes) in planned {
            let Some(mut doc) = self.documents.get_mut(&uri) else {
                return Err(LensError::document_not_found(uri.as_str()));
            };
            doc.commit(text);
            let event = DocumentChangeEvent {
                uri: uri.clone(),
                version: doc.version(),
                changes,
            };
            drop(doc);
            log::debug!(
                target: "editlens::documents",
                "Applied {} change(s) to {}",
                event.changes.len(),
                uri
            );
            // No subscribers is fine
            let _ = self.changes.send(event.clone());
            events.push(event);
        }
        Ok(events)
    }
}

impl DocumentHost for DocumentStore {
    fn text(&self, uri: &Url) -> Option<String> {
        self.get_document_text(uri)
    }

    fn open_documents(&self) -> Vec<Url> {
        self.documents.iter().map(|entry| entry.key().clone()).collect()
    }

    fn version(&self, uri: &Url) -> Option<i32> {
        self.documents.get(uri).map(|doc| doc.version())
    }

    async fn apply_edits(&self, edits: Vec<DocumentEdit>) -> LensResult<()> {
        self.apply(edits).map(|_| ())
    }
}
