//! Breakpoint editor.
//!
//! A virtual `breakpoints.txt` mirrors the line count of the last active
//! editor. Every line of it starting with `#` becomes a source breakpoint on
//! the same line of that editor:
//!
//! ```text
//! # hit {count} ? count > 3
//! ```
//!
//! is a logpoint printing `hit {count}` when `count > 3` holds. Either part
//! may be left empty.

use std::future::Future;
use std::sync::{Arc, Mutex};

use url::Url;

use crate::error::{LensError, LensResult, LockResultExt};
use crate::vfs::VirtualFileSystem;

pub const BREAKPOINTS_FILE: &str = "breakpoints.txt";

const MARKER: char = '#';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBreakpoint {
    pub uri: Url,
    /// Zero-based line
    pub line: u32,
    pub enabled: bool,
    pub condition: Option<String>,
    pub log_message: Option<String>,
}

/// The debugger's breakpoint list.
pub trait BreakpointSink: Send + Sync {
    /// Remove every existing breakpoint and install `breakpoints` instead.
    fn replace_breakpoints(
        &self,
        breakpoints: Vec<SourceBreakpoint>,
    ) -> impl Future<Output = LensResult<()>> + Send;
}

/// Parse breakpoint editor text for a target document of `line_count` lines.
///
/// Marked lines past the end of the target are ignored.
pub fn parse_breakpoints(text: &str, target: &Url, line_count: usize) -> Vec<SourceBreakpoint> {
    text.split('\n')
        .enumerate()
        .take(line_count)
        .filter_map(|(line, content)| {
            let content = content.strip_prefix(MARKER)?;
            let mut parts = content.split('?');
            let log_message = parts.next().and_then(non_empty);
            let condition = parts.next().and_then(non_empty);
            Some(SourceBreakpoint {
                uri: target.clone(),
                line: u32::try_from(line).ok()?,
                enabled: true,
                condition,
                log_message,
            })
        })
        .collect()
}

fn non_empty(part: &str) -> Option<String> {
    let trimmed = part.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    uri: Url,
    line_count: usize,
}

pub struct BreakpointEditor<S> {
    vfs: Arc<VirtualFileSystem>,
    sink: Arc<S>,
    uri: Url,
    target: Mutex<Option<Target>>,
}

impl<S: BreakpointSink> BreakpointEditor<S> {
    pub fn new(vfs: Arc<VirtualFileSystem>, sink: Arc<S>) -> LensResult<Self> {
        let uri = Url::parse(&format!("{}:/{BREAKPOINTS_FILE}", vfs.scheme()))
            .map_err(|err| LensError::internal(format!("invalid breakpoints uri: {err}")))?;
        vfs.get_or_create(&uri);
        Ok(Self {
            vfs,
            sink,
            uri,
            target: Mutex::new(None),
        })
    }

    /// URI of the breakpoint editor file
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn target(&self) -> LensResult<Option<Url>> {
        let target = self.target.lock().recover_poison("breakpoints.target")?;
        Ok(target.as_ref().map(|t| t.uri.clone()))
    }

    /// Point the editor at a newly active document.
    ///
    /// Activating the breakpoint editor itself keeps the previous target.
    pub fn on_active_editor_changed(&self, uri: &Url, line_count: usize) -> LensResult<()> {
        if uri == &self.uri {
            return Ok(());
        }
        self.vfs.sync_content(&self.uri, &"\n".repeat(line_count));
        *self.target.lock().recover_poison("breakpoints.target")? = Some(Target {
            uri: uri.clone(),
            line_count,
        });
        log::debug!(
            target: "editlens::breakpoints",
            "Breakpoint editor now targets {} ({} lines)",
            uri,
            line_count
        );
        Ok(())
    }

    /// Re-derive all breakpoints after the breakpoint editor's text changed.
    ///
    /// Returns how many breakpoints were installed; nothing happens until a
    /// target editor has been seen.
    pub async fn on_text_changed(&self, text: &str) -> LensResult<usize> {
        let target = self
            .target
            .lock()
            .recover_poison("breakpoints.target")?
            .clone();
        let Some(target) = target else {
            return Ok(0);
        };
        let breakpoints = parse_breakpoints(text, &target.uri, target.line_count);
        let count = breakpoints.len();
        self.sink.replace_breakpoints(breakpoints).await?;
        log::debug!(
            target: "editlens::breakpoints",
            "Installed {} breakpoint(s) in {}",
            count,
            target.uri
        );
        Ok(count)
    }
}
