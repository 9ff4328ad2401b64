use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tower_lsp_server::ls_types::{CompletionList, Diagnostic, LocationLink, Position, SignatureHelp};
use url::Url;

use super::{MARKDOWN_LANGUAGE_ID, MarkdownDocumentController};
use crate::config::SettingsStore;
use crate::error::LensResult;
use crate::host::{
    CompletionProvider, DefinitionProvider, DocumentHost, LanguageQueries, SignatureHelpProvider,
};
use crate::vfs::FileStore;

/// Owns one controller per open markdown document and answers language
/// queries for markdown documents by delegating to the block under the caret.
pub struct MarkdownProjection<H, S> {
    host: Arc<H>,
    store: Arc<S>,
    settings: Arc<SettingsStore>,
    controllers: Mutex<HashMap<Url, MarkdownDocumentController<S>>>,
}

impl<H, S> MarkdownProjection<H, S>
where
    H: DocumentHost + LanguageQueries + 'static,
    S: FileStore,
{
    pub fn new(host: Arc<H>, store: Arc<S>, settings: Arc<SettingsStore>) -> Self {
        Self {
            host,
            store,
            settings,
            controllers: Mutex::new(HashMap::new()),
        }
    }

    /// Start projecting a newly opened document if it is markdown.
    pub async fn on_open(&self, uri: &Url, language_id: &str) -> LensResult<()> {
        let settings = self.settings.load();
        if !settings.markdown_projection.enabled || language_id != MARKDOWN_LANGUAGE_ID {
            return Ok(());
        }
        let Some(text) = self.host.text(uri) else {
            return Ok(());
        };

        let mut controller = MarkdownDocumentController::new(
            uri.clone(),
            self.store.clone(),
            &settings.markdown_projection,
            settings.virtual_file_scheme.clone(),
        )
        .with_write_back(self.host.clone());
        let result = controller.process_content(&text).await;

        log::debug!(
            target: "editlens::markdown",
            "Projecting {} code block(s) of {}",
            controller.blocks().len(),
            uri
        );
        self.controllers.lock().await.insert(uri.clone(), controller);
        result
    }

    /// Re-project a document after it changed.
    pub async fn on_change(&self, uri: &Url) -> LensResult<()> {
        let mut controllers = self.controllers.lock().await;
        let Some(controller) = controllers.get_mut(uri) else {
            return Ok(());
        };
        let Some(text) = self.host.text(uri) else {
            return Ok(());
        };
        controller.process_content(&text).await
    }

    /// Drop a document's projections.
    pub async fn on_close(&self, uri: &Url) -> LensResult<()> {
        let controller = self.controllers.lock().await.remove(uri);
        match controller {
            Some(controller) => controller.dispose().await,
            None => Ok(()),
        }
    }

    pub async fn is_tracked(&self, uri: &Url) -> bool {
        self.controllers.lock().await.contains_key(uri)
    }

    /// Projection file URIs of a document, in block order.
    pub async fn projection_uris(&self, uri: &Url) -> Vec<Url> {
        let controllers = self.controllers.lock().await;
        controllers
            .get(uri)
            .map(|c| c.targets().map(|t| t.uri().clone()).collect())
            .unwrap_or_default()
    }

    /// Translated diagnostics of every block of a document.
    pub async fn diagnostics(&self, uri: &Url) -> Vec<Diagnostic> {
        let controllers = self.controllers.lock().await;
        controllers
            .get(uri)
            .map(|c| c.diagnostics(self.host.as_ref()))
            .unwrap_or_default()
    }

    /// Dispose every controller.
    pub async fn shutdown(&self) -> LensResult<()> {
        let controllers: Vec<_> = self.controllers.lock().await.drain().collect();
        let mut result = Ok(());
        for (_, controller) in controllers {
            if let Err(err) = controller.dispose().await
                && result.is_ok()
            {
                result = Err(err);
            }
        }
        result
    }
}

impl<H, S> CompletionProvider for MarkdownProjection<H, S>
where
    H: DocumentHost + LanguageQueries + 'static,
    S: FileStore,
{
    async fn completion(
        &self,
        uri: &Url,
        position: Position,
        trigger_character: Option<&str>,
    ) -> Option<CompletionList> {
        let controllers = self.controllers.lock().await;
        let controller = controllers.get(uri)?;
        Some(
            controller
                .completion(self.host.as_ref(), position, trigger_character)
                .await,
        )
    }
}

impl<H, S> DefinitionProvider for MarkdownProjection<H, S>
where
    H: DocumentHost + LanguageQueries + 'static,
    S: FileStore,
{
    async fn definition(&self, uri: &Url, position: Position) -> Vec<LocationLink> {
        let controllers = self.controllers.lock().await;
        match controllers.get(uri) {
            Some(controller) => controller.definition(self.host.as_ref(), position).await,
            None => Vec::new(),
        }
    }
}

impl<H, S> SignatureHelpProvider for MarkdownProjection<H, S>
where
    H: DocumentHost + LanguageQueries + 'static,
    S: FileStore,
{
    async fn signature_help(
        &self,
        uri: &Url,
        position: Position,
        trigger_character: Option<&str>,
    ) -> Option<SignatureHelp> {
        let controllers = self.controllers.lock().await;
        controllers
            .get(uri)?
            .signature_help(self.host.as_ref(), position, trigger_character)
            .await
    }
}
