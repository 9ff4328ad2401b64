use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::{PROJECT_CONFIG_FILE, Settings, SettingsLayer, default_layer, load_user_config, merge_all};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsEventKind {
    Info,
    Warning,
}

/// Something worth reporting to the user while settings were loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettingsEvent {
    pub kind: SettingsEventKind,
    pub message: String,
}

/// One configuration layer, listed from lowest to highest precedence.
#[derive(Clone, Debug, PartialEq)]
pub enum SettingsSource {
    Defaults,
    UserFile,
    ProjectFile(PathBuf),
    /// Settings pushed by the client, already decoded from JSON
    ClientOverride(Value),
}

impl fmt::Display for SettingsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsSource::Defaults => f.write_str("defaults"),
            SettingsSource::UserFile => f.write_str("user config"),
            SettingsSource::ProjectFile(path) => write!(f, "project config {}", path.display()),
            SettingsSource::ClientOverride(_) => f.write_str("client override"),
        }
    }
}

impl SettingsSource {
    /// Read the layer. `Ok(None)` means the source does not exist.
    fn read(self) -> Result<Option<SettingsLayer>, String> {
        match self {
            SettingsSource::Defaults => Ok(Some(default_layer())),
            SettingsSource::UserFile => load_user_config().map_err(|err| err.to_string()),
            SettingsSource::ProjectFile(path) => {
                if !path.exists() {
                    return Ok(None);
                }
                let contents =
                    fs::read_to_string(&path).map_err(|err| format!("cannot read: {err}"))?;
                toml::from_str(&contents)
                    .map(Some)
                    .map_err(|err| format!("cannot parse: {err}"))
            }
            SettingsSource::ClientOverride(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|err| format!("cannot parse: {err}")),
        }
    }
}

#[derive(Debug)]
pub struct SettingsLoadOutcome {
    pub settings: Settings,
    pub events: Vec<SettingsEvent>,
}

/// Read and merge every configuration layer.
///
/// A layer that fails to load is skipped and reported as a warning; the
/// others still apply.
pub fn load_settings(root: Option<&Path>, client_override: Option<Value>) -> SettingsLoadOutcome {
    let sources = [
        Some(SettingsSource::Defaults),
        Some(SettingsSource::UserFile),
        root.map(|root| SettingsSource::ProjectFile(root.join(PROJECT_CONFIG_FILE))),
        client_override.map(SettingsSource::ClientOverride),
    ];

    let mut events = Vec::new();
    let layers: Vec<Option<SettingsLayer>> = sources
        .into_iter()
        .flatten()
        .map(|source| {
            let name = source.to_string();
            match source.read() {
                Ok(layer) => {
                    if layer.is_some() {
                        events.push(SettingsEvent {
                            kind: SettingsEventKind::Info,
                            message: format!("Applied {name}"),
                        });
                    }
                    layer
                }
                Err(reason) => {
                    events.push(SettingsEvent {
                        kind: SettingsEventKind::Warning,
                        message: format!("Ignored {name}: {reason}"),
                    });
                    None
                }
            }
        })
        .collect();

    let settings = merge_all(&layers).map(Settings::from).unwrap_or_default();
    SettingsLoadOutcome { settings, events }
}
