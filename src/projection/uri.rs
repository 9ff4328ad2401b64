//! Projection file locations.
//!
//! For hierarchical URIs (file://, https://, ...) projections live in a
//! directory next to the primary document:
//! `{scheme}://{parent_dir}/{directory}/{id}.{ext}`.
//!
//! Cannot-be-a-base URIs (untitled:, data:) fall back to
//! `{fallback_scheme}:///projections/{encoded_parent}/{directory}/{id}.{ext}`.

use std::str::FromStr;

use tower_lsp_server::ls_types::Uri;
use url::Url;

use super::TargetKey;
use crate::error::{LensError, LensResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionLocation {
    pub directory: Url,
    pub file: Url,
}

impl ProjectionLocation {
    pub fn new(
        parent: &Url,
        directory: &str,
        key: &TargetKey,
        fallback_scheme: &str,
    ) -> LensResult<Self> {
        let file_name = format!("{}.{}", key.id, file_extension(key));

        let mut dir = parent.clone();
        let hierarchical = dir
            .path_segments_mut()
            .map(|mut segments| {
                segments.pop();
                segments.push(directory);
            })
            .is_ok();
        if !hierarchical {
            let encoded_parent = percent_encoding::utf8_percent_encode(
                parent.as_str(),
                percent_encoding::NON_ALPHANUMERIC,
            );
            dir = Url::parse(&format!(
                "{fallback_scheme}:///projections/{encoded_parent}/{directory}"
            ))
            .map_err(|err| LensError::internal(format!("invalid projection URI: {err}")))?;
        }

        let mut file = dir.clone();
        file.path_segments_mut()
            .map_err(|_| LensError::internal(format!("{dir} cannot hold projections")))?
            .push(&file_name);
        file.set_query(None);
        file.set_fragment(None);
        dir.set_query(None);
        dir.set_fragment(None);

        Ok(Self {
            directory: dir,
            file,
        })
    }
}

fn file_extension(key: &TargetKey) -> String {
    if let Some(extension) = key.extension.as_deref().filter(|ext| !ext.is_empty()) {
        return extension.to_string();
    }
    if key.language.is_empty() {
        return "txt".to_string();
    }
    extension_for_language(&key.language)
        .map(str::to_string)
        .unwrap_or_else(|| key.language.clone())
}

/// Conventional file extension for a fence language tag.
///
/// Returns None for languages without a known mapping.
pub fn extension_for_language(language: &str) -> Option<&'static str> {
    let extension = match language {
        "lua" => "lua",
        "python" | "py" => "py",
        "rust" | "rs" => "rs",
        "javascript" | "js" => "js",
        "typescript" | "ts" => "ts",
        "tsx" => "tsx",
        "jsx" => "jsx",
        "go" => "go",
        "c" => "c",
        "cpp" | "c++" => "cpp",
        "java" => "java",
        "ruby" => "rb",
        "haskell" => "hs",
        "sql" => "sql",
        "html" => "html",
        "css" => "css",
        "json" => "json",
        "jsonc" => "jsonc",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "markdown" | "md" => "md",
        "bash" | "sh" | "shell" => "sh",
        _ => return None,
    };
    Some(extension)
}

/// Convert an internal URL into the protocol `Uri` type.
pub fn to_lsp_uri(url: &Url) -> LensResult<Uri> {
    Uri::from_str(url.as_str())
        .map_err(|err| LensError::internal(format!("invalid URI {url}: {err:?}")))
}
