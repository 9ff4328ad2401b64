use serde::{Deserialize, Serialize};

/// Decoration style used to highlight tracked identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightTheme {
    /// Dashed border around each tracked span
    #[default]
    Dashed,
    /// Background color shared with peek-view match highlights
    Colored,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRenameLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<HighlightTheme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fan_out: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownProjectionLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualFilesLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
}

/// One configuration source (defaults, user file, project file, client override).
///
/// Every field is optional so layers can be merged; later layers win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_rename: Option<ApplyRenameLayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_escape_assistant: Option<ToggleLayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_frame_line_highlighter: Option<ToggleLayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_definitions: Option<ToggleLayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown_projection: Option<MarkdownProjectionLayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_files: Option<VirtualFilesLayer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRenameSettings {
    pub enabled: bool,
    pub theme: HighlightTheme,
    /// Maximum number of changed spans one rename may touch
    pub max_fan_out: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkdownProjectionSettings {
    pub enabled: bool,
    /// Directory, next to the markdown file, holding projected blocks
    pub directory: String,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub apply_rename: ApplyRenameSettings,
    pub json_escape_assistant: bool,
    pub stack_frame_line_highlighter: bool,
    pub custom_definitions: bool,
    pub markdown_projection: MarkdownProjectionSettings,
    /// URI scheme of the in-memory virtual file system
    pub virtual_file_scheme: String,
}

pub const DEFAULT_MAX_FAN_OUT: usize = 2;
pub const DEFAULT_PROJECTION_DIRECTORY: &str = ".tmp-projections";
pub const DEFAULT_VIRTUAL_FILE_SCHEME: &str = "editlens";

impl Default for Settings {
    fn default() -> Self {
        Settings::from(SettingsLayer::default())
    }
}

impl From<SettingsLayer> for Settings {
    fn from(layer: SettingsLayer) -> Self {
        let rename = layer.apply_rename.unwrap_or_default();
        let markdown = layer.markdown_projection.unwrap_or_default();
        let toggle = |t: Option<ToggleLayer>, default: bool| {
            t.and_then(|t| t.enabled).unwrap_or(default)
        };

        Settings {
            apply_rename: ApplyRenameSettings {
                enabled: rename.enabled.unwrap_or(true),
                theme: rename.theme.unwrap_or_default(),
                max_fan_out: rename.max_fan_out.unwrap_or(DEFAULT_MAX_FAN_OUT),
            },
            json_escape_assistant: toggle(layer.json_escape_assistant, true),
            stack_frame_line_highlighter: toggle(layer.stack_frame_line_highlighter, true),
            custom_definitions: toggle(layer.custom_definitions, false),
            markdown_projection: MarkdownProjectionSettings {
                enabled: markdown.enabled.unwrap_or(true),
                directory: markdown
                    .directory
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| DEFAULT_PROJECTION_DIRECTORY.to_string()),
            },
            virtual_file_scheme: layer
                .virtual_files
                .and_then(|v| v.scheme)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_VIRTUAL_FILE_SCHEME.to_string()),
        }
    }
}
