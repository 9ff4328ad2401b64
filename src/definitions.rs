//! Go-to-definition for `def <name>` markers in any open document.

use std::ops::Range as ByteRange;
use std::sync::Arc;

use regex::Regex;
use tower_lsp_server::ls_types::{LocationLink, Position};
use url::Url;

use crate::config::SettingsStore;
use crate::host::{DefinitionProvider, DocumentHost};
use crate::projection::to_lsp_uri;
use crate::text::PositionMapper;

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Byte range of the word touching `offset`, if any.
pub fn word_at(text: &str, offset: usize) -> Option<ByteRange<usize>> {
    if !text.is_char_boundary(offset) {
        return None;
    }
    let start = text[..offset]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_word_char(*c))
        .last()
        .map_or(offset, |(i, _)| i);
    let end = text[offset..]
        .char_indices()
        .find(|(_, c)| !is_word_char(*c))
        .map_or(text.len(), |(i, _)| offset + i);
    (start < end).then_some(start..end)
}

/// Byte ranges of every `def <identifier>` occurrence, covering the identifier.
pub fn find_definitions(text: &str, identifier: &str) -> Vec<ByteRange<usize>> {
    let pattern = format!("(def[^A-Za-z0-9_]+){}", regex::escape(identifier));
    let Ok(regex) = Regex::new(&pattern) else {
        return Vec::new();
    };
    regex
        .captures_iter(text)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let prefix = captures.get(1)?;
            Some(whole.start() + prefix.len()..whole.end())
        })
        .collect()
}

pub struct CustomDefinitions<H> {
    host: Arc<H>,
    settings: Arc<SettingsStore>,
}

impl<H: DocumentHost> CustomDefinitions<H> {
    pub fn new(host: Arc<H>, settings: Arc<SettingsStore>) -> Self {
        Self { host, settings }
    }

    fn links(&self, uri: &Url, position: Position) -> Vec<LocationLink> {
        if !self.settings.load().custom_definitions {
            return Vec::new();
        }
        let Some(text) = self.host.text(uri) else {
            return Vec::new();
        };
        let mapper = PositionMapper::new(&text);
        let Some(word) = mapper
            .position_to_byte(position)
            .and_then(|offset| word_at(&text, offset))
        else {
            return Vec::new();
        };
        let origin = mapper.byte_range_to_range(word.start, word.end);
        let identifier = &text[word];

        let mut documents = self.host.open_documents();
        documents.sort();

        let mut links = Vec::new();
        for document in documents {
            let Some(target_text) = self.host.text(&document) else {
                continue;
            };
            let target_uri = match to_lsp_uri(&document) {
                Ok(target_uri) => target_uri,
                Err(err) => {
                    log::debug!(target: "editlens::definitions", "Skipping {}: {}", document, err);
                    continue;
                }
            };
            let target_mapper = PositionMapper::new(&target_text);
            for found in find_definitions(&target_text, identifier) {
                let Some(range) = target_mapper.byte_range_to_range(found.start, found.end) else {
                    continue;
                };
                links.push(LocationLink {
                    origin_selection_range: origin,
                    target_uri: target_uri.clone(),
                    target_range: range,
                    target_selection_range: range,
                });
            }
        }
        links
    }
}

impl<H: DocumentHost> DefinitionProvider for CustomDefinitions<H> {
    async fn definition(&self, uri: &Url, position: Position) -> Vec<LocationLink> {
        self.links(uri, position)
    }
}
