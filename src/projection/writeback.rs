use std::ops::Range;
use std::sync::Arc;

use url::Url;

use crate::error::{LensError, LensResult};
use crate::host::{DocumentEdit, DocumentHost};
use crate::text::PositionMapper;
use crate::vfs::{BeforeWrite, HookFuture};

/// Replacement of a byte range of the primary document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub bytes: Range<usize>,
    pub text: String,
}

/// Finds, in the live primary text, where a projection's content belongs.
///
/// Implementations re-derive the location from a structural anchor on every
/// call and fail when the anchor no longer resolves.
pub trait AnchorResolver: Send + Sync {
    fn resolve(&self, primary_text: &str, projection_text: &str) -> LensResult<Replacement>;
}

/// Before-write hook pushing projection edits into the primary document.
pub struct WriteBack<H, R> {
    host: Arc<H>,
    primary: Url,
    resolver: R,
}

impl<H, R> WriteBack<H, R> {
    pub fn new(host: Arc<H>, primary: Url, resolver: R) -> Self {
        Self {
            host,
            primary,
            resolver,
        }
    }
}

impl<H, R> WriteBack<H, R>
where
    H: DocumentHost,
    R: AnchorResolver,
{
    async fn apply(&self, projection_uri: &Url, content: &str) -> LensResult<()> {
        // Never trust a cached copy: the primary may have changed meanwhile
        let primary_text = self.host.text(&self.primary).ok_or_else(|| LensError::PrimaryClosed {
            uri: self.primary.to_string(),
        })?;

        let replacement = self.resolver.resolve(&primary_text, content)?;
        let range = PositionMapper::new(&primary_text)
            .byte_range_to_range(replacement.bytes.start, replacement.bytes.end)
            .ok_or_else(|| {
                LensError::invalid_edit(format!(
                    "resolved range {:?} is outside {}",
                    replacement.bytes, self.primary
                ))
            })?;

        log::debug!(
            target: "editlens::projection",
            "Writing {} back into {} at {:?}",
            projection_uri,
            self.primary,
            range
        );
        self.host
            .apply_edits(vec![DocumentEdit::new(
                self.primary.clone(),
                range,
                replacement.text,
            )])
            .await
    }
}

impl<H, R> BeforeWrite for WriteBack<H, R>
where
    H: DocumentHost,
    R: AnchorResolver,
{
    fn before_write<'a>(&'a self, uri: &'a Url, content: &'a str) -> HookFuture<'a> {
        Box::pin(self.apply(uri, content))
    }
}
