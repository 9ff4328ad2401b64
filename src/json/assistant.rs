//! Copy, paste and edit JSON string literals in their unescaped form.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tower_lsp_server::ls_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position, Range};
use url::Url;

use super::locate::{JsonPath, find_node_at_path, find_string_at};
use super::tree::JsonDocument;
use crate::config::SettingsStore;
use crate::error::{LensError, LensResult};
use crate::host::{DocumentEdit, DocumentHost};
use crate::projection::{AnchorResolver, Replacement, WriteBack};
use crate::text::PositionMapper;
use crate::vfs::VirtualFileSystem;

/// Lines of unescaped text shown before the hover truncates.
const HOVER_PREVIEW_LINES: usize = 4;

/// String literal under the caret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonStringInfo {
    /// Range of the literal including its quotes
    pub range: Range,
    pub value: String,
    pub raw: String,
    pub path: JsonPath,
}

impl JsonStringInfo {
    /// True when the literal holds something worth unescaping.
    pub fn has_escapes(&self) -> bool {
        self.raw != format!("\"{}\"", self.value)
    }
}

/// Re-locates a projected string by its structural path.
#[derive(Debug, Clone)]
pub struct JsonPathAnchor {
    path: JsonPath,
}

impl JsonPathAnchor {
    pub fn new(path: JsonPath) -> Self {
        Self { path }
    }
}

impl AnchorResolver for JsonPathAnchor {
    fn resolve(&self, primary_text: &str, projection_text: &str) -> LensResult<Replacement> {
        let doc = JsonDocument::parse(primary_text)?;
        let node = find_node_at_path(&doc, self.path.segments()).ok_or_else(|| {
            LensError::PathNotFound {
                path: self.path.to_string(),
            }
        })?;
        Ok(Replacement {
            bytes: node.byte_range(),
            text: escape(projection_text)?,
        })
    }
}

fn escape(value: &str) -> LensResult<String> {
    serde_json::to_string(value).map_err(|err| LensError::internal(err.to_string()))
}

pub struct JsonEscapeAssistant<H> {
    host: Arc<H>,
    vfs: Arc<VirtualFileSystem>,
    settings: Arc<SettingsStore>,
    next_editor: AtomicUsize,
}

impl<H> JsonEscapeAssistant<H>
where
    H: DocumentHost + 'static,
{
    pub fn new(host: Arc<H>, vfs: Arc<VirtualFileSystem>, settings: Arc<SettingsStore>) -> Self {
        Self {
            host,
            vfs,
            settings,
            next_editor: AtomicUsize::new(0),
        }
    }

    fn enabled(&self) -> bool {
        self.settings.load().json_escape_assistant
    }

    /// Locate the string literal at `position`.
    ///
    /// Returns `Ok(None)` when the caret is not inside a string literal and
    /// a syntax error when the document does not parse.
    pub fn string_at(&self, uri: &Url, position: Position) -> LensResult<Option<JsonStringInfo>> {
        let text = self
            .host
            .text(uri)
            .ok_or_else(|| LensError::document_not_found(uri.as_str()))?;
        let doc = JsonDocument::parse(&text)?;
        let mapper = PositionMapper::new(&text);
        let Some(offset) = mapper.position_to_byte(position) else {
            return Ok(None);
        };
        let Some(literal) = find_string_at(&doc, offset) else {
            return Ok(None);
        };
        let range = mapper
            .byte_range_to_range(literal.span.start, literal.span.end)
            .ok_or_else(|| LensError::internal("string literal outside document"))?;
        Ok(Some(JsonStringInfo {
            range,
            value: literal.value,
            raw: literal.raw,
            path: literal.path,
        }))
    }

    /// Unescaped value to put on the clipboard.
    pub fn copy(&self, uri: &Url, position: Position) -> LensResult<Option<String>> {
        Ok(self.string_at(uri, position)?.map(|info| info.value))
    }

    /// Replace the literal at `position` with `clipboard`, escaped.
    ///
    /// Returns false when there is no literal under the caret.
    pub async fn paste(&self, uri: &Url, position: Position, clipboard: &str) -> LensResult<bool> {
        let Some(info) = self.string_at(uri, position)? else {
            return Ok(false);
        };
        let edit = DocumentEdit::new(uri.clone(), info.range, escape(clipboard)?);
        self.host.apply_edits(vec![edit]).await?;
        Ok(true)
    }

    /// Open the literal's unescaped value as a virtual file.
    ///
    /// Saving that file writes the re-escaped text back into the literal,
    /// located again by its path. The write is rejected when the primary
    /// document is closed or the path no longer exists.
    pub async fn open_projection(&self, uri: &Url, position: Position) -> LensResult<Option<Url>> {
        if !self.enabled() {
            return Ok(None);
        }
        let Some(info) = self.string_at(uri, position)? else {
            return Ok(None);
        };

        let editor = self.next_editor.fetch_add(1, Ordering::SeqCst);
        let projection = projection_uri(self.vfs.scheme(), editor, &info.path)?;
        self.vfs.sync_content(&projection, &info.value);
        self.vfs.install_hook(
            &projection,
            Arc::new(WriteBack::new(
                Arc::clone(&self.host),
                uri.clone(),
                JsonPathAnchor::new(info.path.clone()),
            )),
        );

        log::debug!(
            target: "editlens::json",
            "Projected {} path \"{}\" to {}",
            uri,
            info.path,
            projection
        );
        Ok(Some(projection))
    }

    /// Drop a projection opened by [`Self::open_projection`], hook included.
    pub fn close_projection(&self, projection: &Url) -> LensResult<()> {
        self.vfs.delete(projection)?;
        log::debug!(target: "editlens::json", "Closed projection {}", projection);
        Ok(())
    }

    /// Hover previewing the unescaped text of an escaped literal.
    pub fn hover(&self, uri: &Url, position: Position) -> Option<Hover> {
        if !self.enabled() {
            return None;
        }
        let info = match self.string_at(uri, position) {
            Ok(info) => info?,
            Err(err) => {
                log::debug!(target: "editlens::json", "No hover for {}: {}", uri, err);
                return None;
            }
        };
        if !info.has_escapes() {
            return None;
        }
        Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: preview(&info.value),
            }),
            range: Some(info.range),
        })
    }
}

fn projection_uri(scheme: &str, editor: usize, path: &JsonPath) -> LensResult<Url> {
    let mut uri = Url::parse(&format!("{scheme}:/editor-{editor}"))
        .map_err(|err| LensError::internal(format!("invalid projection uri: {err}")))?;
    let mut names: Vec<String> = path.segments().iter().map(ToString::to_string).collect();
    match names.last_mut() {
        Some(last) => last.push_str(".txt"),
        None => names.push("value.txt".to_string()),
    }
    uri.path_segments_mut()
        .map_err(|()| LensError::internal("projection uri cannot have a path"))?
        .extend(names);
    Ok(uri)
}

fn preview(value: &str) -> String {
    let lines: Vec<&str> = value.split('\n').collect();
    let shown = if lines.len() <= HOVER_PREVIEW_LINES {
        lines.len()
    } else {
        HOVER_PREVIEW_LINES - 1
    };
    let mut body = lines[..shown].join("\n");
    if shown < lines.len() {
        body.push_str(&format!("\n... ({} more lines)", lines.len() - shown));
    }
    format!("Unescaped text:\n```text\n{body}\n```")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentStore;
    use crate::json::PathSegment;
    use rstest::rstest;

    struct Fixture {
        store: Arc<DocumentStore>,
        vfs: Arc<VirtualFileSystem>,
        assistant: JsonEscapeAssistant<DocumentStore>,
        uri: Url,
    }

    fn fixture(text: &str) -> Fixture {
        let store = Arc::new(DocumentStore::new());
        let vfs = Arc::new(VirtualFileSystem::new("editlens"));
        let uri = Url::parse("file:///data.json").unwrap();
        store.open(uri.clone(), text.to_string(), Some("json".to_string()));
        let assistant = JsonEscapeAssistant::new(
            Arc::clone(&store),
            Arc::clone(&vfs),
            Arc::new(SettingsStore::default()),
        );
        Fixture {
            store,
            vfs,
            assistant,
            uri,
        }
    }

    #[test]
    fn copy_returns_unescaped_value() {
        let f = fixture(r#"{"msg": "a\tb \"q\""}"#);
        let value = f.assistant.copy(&f.uri, Position::new(0, 12)).unwrap();
        assert_eq!(value.as_deref(), Some("a\tb \"q\""));
    }

    #[test]
    fn copy_outside_literal_is_none() {
        let f = fixture(r#"{"n": 12}"#);
        assert_eq!(f.assistant.copy(&f.uri, Position::new(0, 7)).unwrap(), None);
    }

    #[test]
    fn syntax_errors_surface() {
        let f = fixture(r#"{"n": "#);
        let result = f.assistant.copy(&f.uri, Position::new(0, 2));
        assert!(matches!(result, Err(LensError::JsonSyntax { .. })));
    }

    #[tokio::test]
    async fn paste_escapes_clipboard() {
        let f = fixture(r#"{"msg": "old"}"#);
        let pasted = f
            .assistant
            .paste(&f.uri, Position::new(0, 10), "line1\nsaid \"hi\"")
            .await
            .unwrap();
        assert!(pasted);
        assert_eq!(
            f.store.get_document_text(&f.uri).unwrap(),
            r#"{"msg": "line1\nsaid \"hi\""}"#
        );
    }

    #[tokio::test]
    async fn projection_writes_back_through_path() {
        let f = fixture("{\n  \"a\": {\"b\": \"x\\ny\"}\n}");
        let projection = f
            .assistant
            .open_projection(&f.uri, Position::new(1, 15))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(projection.as_str(), "editlens:/editor-0/a/b.txt");
        assert_eq!(f.vfs.read_string(&projection).unwrap(), "x\ny");

        f.vfs.write_string(&projection, "new\t\"text\"").await.unwrap();

        assert_eq!(
            f.store.get_document_text(&f.uri).unwrap(),
            "{\n  \"a\": {\"b\": \"new\\t\\\"text\\\"\"}\n}"
        );
        assert_eq!(f.vfs.read_string(&projection).unwrap(), "new\t\"text\"");
    }

    #[tokio::test]
    async fn root_literal_projects_to_value_file() {
        let f = fixture(r#""top""#);
        let first = f.assistant.open_projection(&f.uri, Position::new(0, 2)).await.unwrap();
        let second = f.assistant.open_projection(&f.uri, Position::new(0, 2)).await.unwrap();
        assert_eq!(first.unwrap().as_str(), "editlens:/editor-0/value.txt");
        assert_eq!(second.unwrap().as_str(), "editlens:/editor-1/value.txt");
    }

    #[tokio::test]
    async fn write_after_primary_closed_is_rejected() {
        let f = fixture(r#"{"a": "x"}"#);
        let projection = f
            .assistant
            .open_projection(&f.uri, Position::new(0, 7))
            .await
            .unwrap()
            .unwrap();
        f.store.close(&f.uri);

        let result = f.vfs.write_string(&projection, "y").await;
        assert!(matches!(result, Err(LensError::PrimaryClosed { .. })));
        assert_eq!(f.vfs.read_string(&projection).unwrap(), "x");
    }

    #[tokio::test]
    async fn closing_a_projection_removes_file_and_hook() {
        let f = fixture(r#"{"a": "x\ty"}"#);
        let projection = f
            .assistant
            .open_projection(&f.uri, Position::new(0, 8))
            .await
            .unwrap()
            .unwrap();

        f.assistant.close_projection(&projection).unwrap();

        assert!(!f.vfs.exists(&projection));
        // A later write creates a plain file that no longer reaches the primary
        f.vfs.write_string(&projection, "z").await.unwrap();
        assert_eq!(f.store.get_document_text(&f.uri).unwrap(), r#"{"a": "x\ty"}"#);
        assert!(matches!(
            f.assistant.close_projection(&Url::parse("editlens:/editor-9/a.txt").unwrap()),
            Err(LensError::FileNotFound { .. })
        ));
    }

    #[test]
    fn anchor_reports_missing_path() {
        let anchor = JsonPathAnchor::new(JsonPath(vec![
            PathSegment::Key("a".to_string()),
            PathSegment::Key("b".to_string()),
        ]));
        let err = anchor.resolve(r#"{"a": {}}"#, "x").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Path \"a/b\" does not exist anymore in target document"
        );
    }

    #[rstest]
    #[case::escaped(r#"{"k": "a\nb"}"#, true)]
    #[case::plain(r#"{"k": "plain"}"#, false)]
    #[case::solidus(r#"{"k": "a\/b"}"#, true)]
    fn hover_only_for_escaped_literals(#[case] text: &str, #[case] expected: bool) {
        let f = fixture(text);
        let column = text.find('a').or_else(|| text.find('p')).unwrap() as u32;
        assert_eq!(f.assistant.hover(&f.uri, Position::new(0, column)).is_some(), expected);
    }

    #[rstest]
    #[case::short("a\nb", "Unescaped text:\n```text\na\nb\n```")]
    #[case::four_lines("1\n2\n3\n4", "Unescaped text:\n```text\n1\n2\n3\n4\n```")]
    #[case::truncated("1\n2\n3\n4\n5\n6", "Unescaped text:\n```text\n1\n2\n3\n... (3 more lines)\n```")]
    fn hover_preview_truncates_long_values(#[case] value: &str, #[case] expected: &str) {
        assert_eq!(preview(value), expected);
    }
}
