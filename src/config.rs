//! Layered configuration.
//!
//! Settings come from four layers, later layers winning field by field:
//! programmed defaults < user config < project `editlens.toml` < client override.

pub mod load;
pub mod settings;
pub mod store;
pub mod user;

pub use load::{SettingsEvent, SettingsEventKind, SettingsLoadOutcome, SettingsSource, load_settings};
pub use settings::{
    ApplyRenameLayer, ApplyRenameSettings, HighlightTheme, MarkdownProjectionLayer,
    MarkdownProjectionSettings, Settings, SettingsLayer, ToggleLayer, VirtualFilesLayer,
};
pub use store::SettingsStore;
pub use user::{load_user_config, user_config_path};

/// Project-level config file name, looked up in the workspace root.
pub const PROJECT_CONFIG_FILE: &str = "editlens.toml";

/// Programmed defaults as a fully populated layer.
pub fn default_layer() -> SettingsLayer {
    let settings = Settings::default();
    SettingsLayer {
        apply_rename: Some(ApplyRenameLayer {
            enabled: Some(settings.apply_rename.enabled),
            theme: Some(settings.apply_rename.theme),
            max_fan_out: Some(settings.apply_rename.max_fan_out),
        }),
        json_escape_assistant: Some(ToggleLayer {
            enabled: Some(settings.json_escape_assistant),
        }),
        stack_frame_line_highlighter: Some(ToggleLayer {
            enabled: Some(settings.stack_frame_line_highlighter),
        }),
        custom_definitions: Some(ToggleLayer {
            enabled: Some(settings.custom_definitions),
        }),
        markdown_projection: Some(MarkdownProjectionLayer {
            enabled: Some(settings.markdown_projection.enabled),
            directory: Some(settings.markdown_projection.directory),
        }),
        virtual_files: Some(VirtualFilesLayer {
            scheme: Some(settings.virtual_file_scheme),
        }),
    }
}

/// Merge layers in order; each later layer overrides the fields it sets.
pub fn merge_all(layers: &[Option<SettingsLayer>]) -> Option<SettingsLayer> {
    layers.iter().cloned().reduce(merge_settings).flatten()
}

fn merge_settings(
    fallback: Option<SettingsLayer>,
    primary: Option<SettingsLayer>,
) -> Option<SettingsLayer> {
    match (fallback, primary) {
        (None, None) => None,
        (Some(only), None) | (None, Some(only)) => Some(only),
        (Some(fallback), Some(primary)) => Some(SettingsLayer {
            apply_rename: merge_section(fallback.apply_rename, primary.apply_rename, |f, p| {
                ApplyRenameLayer {
                    enabled: p.enabled.or(f.enabled),
                    theme: p.theme.or(f.theme),
                    max_fan_out: p.max_fan_out.or(f.max_fan_out),
                }
            }),
            json_escape_assistant: merge_toggle(
                fallback.json_escape_assistant,
                primary.json_escape_assistant,
            ),
            stack_frame_line_highlighter: merge_toggle(
                fallback.stack_frame_line_highlighter,
                primary.stack_frame_line_highlighter,
            ),
            custom_definitions: merge_toggle(
                fallback.custom_definitions,
                primary.custom_definitions,
            ),
            markdown_projection: merge_section(
                fallback.markdown_projection,
                primary.markdown_projection,
                |f, p| MarkdownProjectionLayer {
                    enabled: p.enabled.or(f.enabled),
                    directory: p.directory.or(f.directory),
                },
            ),
            virtual_files: merge_section(fallback.virtual_files, primary.virtual_files, |f, p| {
                VirtualFilesLayer {
                    scheme: p.scheme.or(f.scheme),
                }
            }),
        }),
    }
}

fn merge_toggle(fallback: Option<ToggleLayer>, primary: Option<ToggleLayer>) -> Option<ToggleLayer> {
    merge_section(fallback, primary, |f, p| ToggleLayer {
        enabled: p.enabled.or(f.enabled),
    })
}

fn merge_section<T>(fallback: Option<T>, primary: Option<T>, merge: impl FnOnce(T, T) -> T) -> Option<T> {
    match (fallback, primary) {
        (Some(f), Some(p)) => Some(merge(f, p)),
        (f, p) => p.or(f),
    }
}
