//! Contracts for the host editor's capabilities.
//!
//! The tracker and the projection engine never talk to an editor directly.
//! They consume the capabilities below, each expressed as its own trait so a
//! host (or a test double) implements exactly the providers it has.

use std::future::Future;

use tower_lsp_server::ls_types::{
    CompletionList, Diagnostic, DocumentHighlight, LocationLink, Position, Range, SignatureHelp,
};
use url::Url;

use crate::error::LensResult;

/// A single replacement in one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEdit {
    pub uri: Url,
    pub range: Range,
    pub new_text: String,
}

impl DocumentEdit {
    pub fn new(uri: Url, range: Range, new_text: impl Into<String>) -> Self {
        Self {
            uri,
            range,
            new_text: new_text.into(),
        }
    }
}

/// One replacement reported by a document change feed.
///
/// Offsets are UTF-16 code units into the text *before* the edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    pub range: Range,
    pub range_offset: usize,
    pub range_length: usize,
    pub text: String,
}

/// Ordered set of content changes applied to one document in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChangeEvent {
    pub uri: Url,
    pub version: i32,
    pub changes: Vec<ContentChange>,
}

/// Access to open documents and the ability to edit them.
pub trait DocumentHost: Send + Sync {
    /// Live content of an open document, `None` when it is not open.
    fn text(&self, uri: &Url) -> Option<String>;

    fn is_open(&self, uri: &Url) -> bool {
        self.text(uri).is_some()
    }

    /// Every currently open document.
    fn open_documents(&self) -> Vec<Url> {
        Vec::new()
    }

    /// Version of an open document, `None` when the host does not track one.
    fn version(&self, _uri: &Url) -> Option<i32> {
        None
    }

    /// Apply a batch of replacements atomically across one or more documents.
    fn apply_edits(&self, edits: Vec<DocumentEdit>) -> impl Future<Output = LensResult<()>> + Send;
}

/// "Highlight occurrences of the same symbol" oracle.
pub trait HighlightProvider: Send + Sync {
    fn document_highlights(
        &self,
        uri: &Url,
        position: Position,
    ) -> impl Future<Output = Vec<DocumentHighlight>> + Send;
}

/// Structural, language-aware rename oracle.
pub trait RenameProvider: Send + Sync {
    /// Edits needed to rename the symbol at `position` to `new_name`.
    ///
    /// `Ok(None)` means the oracle has nothing to rename there.
    fn rename(
        &self,
        uri: &Url,
        position: Position,
        new_name: &str,
    ) -> impl Future<Output = LensResult<Option<Vec<DocumentEdit>>>> + Send;
}

pub trait CompletionProvider: Send + Sync {
    fn completion(
        &self,
        uri: &Url,
        position: Position,
        trigger_character: Option<&str>,
    ) -> impl Future<Output = Option<CompletionList>> + Send;
}

pub trait DefinitionProvider: Send + Sync {
    fn definition(
        &self,
        uri: &Url,
        position: Position,
    ) -> impl Future<Output = Vec<LocationLink>> + Send;
}

pub trait SignatureHelpProvider: Send + Sync {
    fn signature_help(
        &self,
        uri: &Url,
        position: Position,
        trigger_character: Option<&str>,
    ) -> impl Future<Output = Option<SignatureHelp>> + Send;
}

pub trait DiagnosticProvider: Send + Sync {
    /// Diagnostics currently published for a document.
    fn diagnostics(&self, uri: &Url) -> Vec<Diagnostic>;
}

/// Every language query a projection can delegate to the host.
pub trait LanguageQueries:
    CompletionProvider + DefinitionProvider + SignatureHelpProvider + DiagnosticProvider
{
}

impl<T> LanguageQueries for T where
    T: CompletionProvider + DefinitionProvider + SignatureHelpProvider + DiagnosticProvider
{
}
