use std::sync::Arc;

use tower_lsp_server::ls_types::{
    CompletionList, CompletionTextEdit, Diagnostic, LocationLink, Position, Range, SignatureHelp,
};
use url::Url;

use super::{CodeBlock, ProjectionLocation, TargetKey, to_lsp_uri};
use crate::error::LensResult;
use crate::host::LanguageQueries;
use crate::vfs::{BeforeWrite, FileStore};

/// One block of a primary document mirrored into its own file.
pub struct ProjectionTarget<S> {
    parent_uri: Url,
    key: TargetKey,
    location: ProjectionLocation,
    store: Arc<S>,
    block: CodeBlock,
    write_back: Option<Arc<dyn BeforeWrite>>,
    last_written: Option<String>,
    initialized: bool,
}

impl<S: FileStore> ProjectionTarget<S> {
    pub fn new(
        parent_uri: Url,
        block: CodeBlock,
        location: ProjectionLocation,
        store: Arc<S>,
        write_back: Option<Arc<dyn BeforeWrite>>,
    ) -> Self {
        Self {
            parent_uri,
            key: block.key(),
            location,
            store,
            block,
            write_back,
            last_written: None,
            initialized: false,
        }
    }

    pub fn key(&self) -> &TargetKey {
        &self.key
    }

    pub fn block(&self) -> &CodeBlock {
        &self.block
    }

    pub fn parent_uri(&self) -> &Url {
        &self.parent_uri
    }

    /// URI of the projection file
    pub fn uri(&self) -> &Url {
        &self.location.file
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Adopt a freshly parsed block and rewrite the projection if its content
    /// changed. Returns whether the file was written.
    pub async fn update(&mut self, block: CodeBlock) -> LensResult<bool> {
        let unchanged = self.last_written.as_deref() == Some(block.content.as_str());
        self.block = block;
        if unchanged {
            log::trace!(
                target: "editlens::projection",
                "Skipping unchanged projection {}",
                self.location.file
            );
            return Ok(false);
        }

        if !self.initialized {
            self.store.create_directory(&self.location.directory).await?;
            if let Some(hook) = &self.write_back {
                self.store.install_hook(&self.location.file, hook.clone());
            }
            self.initialized = true;
        }

        self.store
            .write_file(&self.location.file, &self.block.content)
            .await?;
        self.last_written = Some(self.block.content.clone());
        log::debug!(
            target: "editlens::projection",
            "Wrote projection {} ({} bytes)",
            self.location.file,
            self.block.content.len()
        );
        Ok(true)
    }

    /// Delete the projection file, if it was ever created.
    pub async fn dispose(self) -> LensResult<()> {
        if !self.initialized {
            return Ok(());
        }
        log::debug!(
            target: "editlens::projection",
            "Disposing projection {}",
            self.location.file
        );
        self.store.delete(&self.location.file).await
    }

    /// Primary position -> projection position.
    ///
    /// Only lines move: projection content holds the block's lines verbatim,
    /// indentation included.
    pub fn translate_position(&self, position: Position) -> Position {
        let first_line = self.block.content_range.start.line;
        Position::new(position.line.saturating_sub(first_line), position.character)
    }

    /// Projection position -> primary position
    pub fn translate_back_position(&self, position: Position) -> Position {
        let first_line = self.block.content_range.start.line;
        Position::new(position.line + first_line, position.character)
    }

    pub fn translate_back_range(&self, range: Range) -> Range {
        Range::new(
            self.translate_back_position(range.start),
            self.translate_back_position(range.end),
        )
    }

    pub async fn completion<Q: LanguageQueries>(
        &self,
        queries: &Q,
        position: Position,
        trigger_character: Option<&str>,
    ) -> CompletionList {
        let Some(mut list) = queries
            .completion(self.uri(), self.translate_position(position), trigger_character)
            .await
        else {
            return CompletionList {
                is_incomplete: false,
                items: Vec::new(),
            };
        };

        for item in &mut list.items {
            if let Some(text_edit) = &mut item.text_edit {
                match text_edit {
                    CompletionTextEdit::Edit(edit) => {
                        edit.range = self.translate_back_range(edit.range);
                    }
                    CompletionTextEdit::InsertAndReplace(edit) => {
                        edit.insert = self.translate_back_range(edit.insert);
                        edit.replace = self.translate_back_range(edit.replace);
                    }
                }
            }
            for edit in item.additional_text_edits.iter_mut().flatten() {
                edit.range = self.translate_back_range(edit.range);
            }
        }
        list
    }

    pub async fn definition<Q: LanguageQueries>(
        &self,
        queries: &Q,
        position: Position,
    ) -> Vec<LocationLink> {
        let mut links = queries
            .definition(self.uri(), self.translate_position(position))
            .await;
        let parent = to_lsp_uri(&self.parent_uri).ok();

        for link in &mut links {
            if let Some(origin) = link.origin_selection_range {
                link.origin_selection_range = Some(self.translate_back_range(origin));
            }
            if link.target_uri.as_str() == self.uri().as_str()
                && let Some(parent) = &parent
            {
                link.target_uri = parent.clone();
                link.target_range = self.translate_back_range(link.target_range);
                link.target_selection_range =
                    self.translate_back_range(link.target_selection_range);
            }
        }
        links
    }

    pub async fn signature_help<Q: LanguageQueries>(
        &self,
        queries: &Q,
        position: Position,
        trigger_character: Option<&str>,
    ) -> Option<SignatureHelp> {
        queries
            .signature_help(self.uri(), self.translate_position(position), trigger_character)
            .await
    }

    /// Diagnostics of the projection, positioned in the primary document.
    pub fn diagnostics<Q: LanguageQueries>(&self, queries: &Q) -> Vec<Diagnostic> {
        queries
            .diagnostics(self.uri())
            .into_iter()
            .map(|mut diagnostic| {
                diagnostic.range = self.translate_back_range(diagnostic.range);
                diagnostic
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::VirtualFileSystem;
    use rstest::rstest;

    fn block(content: &str) -> CodeBlock {
        CodeBlock {
            id: "0".to_string(),
            content: content.to_string(),
            range: Range::new(Position::new(2, 0), Position::new(5, 3)),
            content_range: Range::new(Position::new(3, 0), Position::new(4, 8)),
            language: "python".to_string(),
            extension: None,
        }
    }

    fn target(store: Arc<VirtualFileSystem>) -> ProjectionTarget<VirtualFileSystem> {
        let parent = Url::parse("file:///docs/README.md").unwrap();
        let initial = block("print(1)\n");
        let location =
            ProjectionLocation::new(&parent, ".tmp-projections", &initial.key(), "editlens").unwrap();
        ProjectionTarget::new(parent, initial, location, store, None)
    }

    #[tokio::test]
    async fn update_writes_once_per_content() {
        let store = Arc::new(VirtualFileSystem::new("editlens"));
        let mut target = target(store.clone());

        assert!(target.update(block("print(1)\n")).await.unwrap());
        assert!(!target.update(block("print(1)\n")).await.unwrap());
        assert!(target.update(block("print(2)\n")).await.unwrap());

        assert_eq!(store.read_string(target.uri()).unwrap(), "print(2)\n");
    }

    #[tokio::test]
    async fn dispose_of_never_written_target_is_a_no_op() {
        let store = Arc::new(VirtualFileSystem::new("editlens"));
        let target = target(store);
        assert!(!target.is_initialized());
        target.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn dispose_deletes_written_file() {
        let store = Arc::new(VirtualFileSystem::new("editlens"));
        let mut target = target(store.clone());
        target.update(block("x = 1\n")).await.unwrap();
        let uri = target.uri().clone();

        target.dispose().await.unwrap();

        assert!(!store.exists(&uri));
    }

    #[rstest]
    #[case::first_line(Position::new(3, 0))]
    #[case::inside(Position::new(4, 5))]
    #[case::end(Position::new(4, 8))]
    fn position_round_trip(#[case] position: Position) {
        let target = target(Arc::new(VirtualFileSystem::new("editlens")));
        let projected = target.translate_position(position);
        assert_eq!(target.translate_back_position(projected), position);
    }

    #[test]
    fn every_position_of_a_list_block_round_trips() {
        let text = "- item\n\n  ```sh\n  echo hi\n\n  echo 2\n  ```\n";
        let block = crate::markdown::parse_code_blocks(text).remove(0);
        let parent = Url::parse("file:///docs/README.md").unwrap();
        let location =
            ProjectionLocation::new(&parent, ".tmp-projections", &block.key(), "editlens").unwrap();
        let target = ProjectionTarget::new(
            parent,
            block.clone(),
            location,
            Arc::new(VirtualFileSystem::new("editlens")),
            None,
        );

        let mut checked = 0;
        for line in 0..8 {
            for character in 0..10 {
                let position = Position::new(line, character);
                if !block.contains(position) {
                    continue;
                }
                let projected = target.translate_position(position);
                assert_eq!(target.translate_back_position(projected), position);
                checked += 1;
            }
        }
        assert!(checked > 0);
        assert_eq!(target.translate_position(Position::new(4, 0)), Position::new(1, 0));
    }

    #[test]
    fn translation_only_moves_lines() {
        let target = target(Arc::new(VirtualFileSystem::new("editlens")));
        assert_eq!(target.translate_position(Position::new(4, 7)), Position::new(1, 7));
    }
}
