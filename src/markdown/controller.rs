use std::collections::BTreeMap;
use std::sync::Arc;

use tower_lsp_server::ls_types::{CompletionList, Diagnostic, LocationLink, Position, SignatureHelp};
use url::Url;

use super::{CodeBlockAnchor, parse_code_blocks};
use crate::config::MarkdownProjectionSettings;
use crate::error::{LensError, LensResult};
use crate::host::{DocumentHost, LanguageQueries};
use crate::notify::ChangeNotifier;
use crate::projection::{CodeBlock, ProjectionLocation, ProjectionTarget, TargetKey, WriteBack};
use crate::vfs::{BeforeWrite, FileStore};

type WriteBackFactory = Box<dyn Fn(&TargetKey) -> Arc<dyn BeforeWrite> + Send + Sync>;

/// Projections of one markdown document.
pub struct MarkdownDocumentController<S> {
    uri: Url,
    store: Arc<S>,
    directory: String,
    fallback_scheme: String,
    write_back: Option<WriteBackFactory>,
    blocks: Vec<CodeBlock>,
    targets: BTreeMap<TargetKey, ProjectionTarget<S>>,
    notifier: ChangeNotifier,
}

impl<S: FileStore> MarkdownDocumentController<S> {
    pub fn new(
        uri: Url,
        store: Arc<S>,
        settings: &MarkdownProjectionSettings,
        fallback_scheme: impl Into<String>,
    ) -> Self {
        Self {
            uri,
            store,
            directory: settings.directory.clone(),
            fallback_scheme: fallback_scheme.into(),
            write_back: None,
            blocks: Vec::new(),
            targets: BTreeMap::new(),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Push edits made in projections back into the markdown document.
    ///
    /// Only effective with stores that can intercept writes.
    pub fn with_write_back<H>(mut self, host: Arc<H>) -> Self
    where
        H: DocumentHost + 'static,
    {
        let primary = self.uri.clone();
        self.write_back = Some(Box::new(move |key: &TargetKey| {
            Arc::new(WriteBack::new(
                host.clone(),
                primary.clone(),
                CodeBlockAnchor::new(key.clone()),
            )) as Arc<dyn BeforeWrite>
        }));
        self
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Blocks of the last processed content
    pub fn blocks(&self) -> &[CodeBlock] {
        &self.blocks
    }

    pub fn targets(&self) -> impl Iterator<Item = &ProjectionTarget<S>> {
        self.targets.values()
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Re-parse the document and bring the projections in line with it.
    ///
    /// New blocks get a target, surviving ones are updated and vanished ones
    /// are disposed. Every target is processed even when one fails; the first
    /// failure is returned.
    pub async fn process_content(&mut self, text: &str) -> LensResult<()> {
        let blocks = parse_code_blocks(text);
        let mut first_error: Option<LensError> = None;
        let mut next = BTreeMap::new();

        for block in &blocks {
            let key = block.key();
            let mut target = match self.targets.remove(&key) {
                Some(target) => target,
                None => match self.create_target(block) {
                    Ok(target) => target,
                    Err(err) => {
                        first_error.get_or_insert(err);
                        continue;
                    }
                },
            };
            if let Err(err) = target.update(block.clone()).await {
                log::warn!(
                    target: "editlens::markdown",
                    "Failed to update projection {}: {}",
                    target.uri(),
                    err
                );
                first_error.get_or_insert(err);
            }
            next.insert(key, target);
        }

        let stale = std::mem::replace(&mut self.targets, next);
        for (_, target) in stale {
            if let Err(err) = target.dispose().await {
                first_error.get_or_insert(err);
            }
        }

        self.blocks = blocks;
        self.notifier.notify();
        first_error.map_or(Ok(()), Err)
    }

    fn create_target(&self, block: &CodeBlock) -> LensResult<ProjectionTarget<S>> {
        let key = block.key();
        let location =
            ProjectionLocation::new(&self.uri, &self.directory, &key, &self.fallback_scheme)?;
        let hook = self.write_back.as_ref().map(|factory| factory(&key));
        Ok(ProjectionTarget::new(
            self.uri.clone(),
            block.clone(),
            location,
            self.store.clone(),
            hook,
        ))
    }

    fn target_at(&self, position: Position) -> Option<&ProjectionTarget<S>> {
        self.targets
            .values()
            .find(|target| target.block().contains(position))
    }

    pub async fn completion<Q: LanguageQueries>(
        &self,
        queries: &Q,
        position: Position,
        trigger_character: Option<&str>,
    ) -> CompletionList {
        match self.target_at(position) {
            Some(target) => target.completion(queries, position, trigger_character).await,
            None => CompletionList {
                is_incomplete: true,
                items: Vec::new(),
            },
        }
    }

    pub async fn definition<Q: LanguageQueries>(
        &self,
        queries: &Q,
        position: Position,
    ) -> Vec<LocationLink> {
        match self.target_at(position) {
            Some(target) => target.definition(queries, position).await,
            None => Vec::new(),
        }
    }

    pub async fn signature_help<Q: LanguageQueries>(
        &self,
        queries: &Q,
        position: Position,
        trigger_character: Option<&str>,
    ) -> Option<SignatureHelp> {
        let target = self.target_at(position)?;
        target
            .signature_help(queries, position, trigger_character)
            .await
    }

    /// Diagnostics of every block, positioned in the markdown document.
    pub fn diagnostics<Q: LanguageQueries>(&self, queries: &Q) -> Vec<Diagnostic> {
        self.targets
            .values()
            .flat_map(|target| target.diagnostics(queries))
            .collect()
    }

    /// Delete every projection file.
    pub async fn dispose(self) -> LensResult<()> {
        let mut result = Ok(());
        for (_, target) in self.targets {
            if let Err(err) = target.dispose().await
                && result.is_ok()
            {
                result = Err(err);
            }
        }
        result
    }
}
