use std::sync::Arc;

use arc_swap::ArcSwap;

use super::Settings;
use crate::notify::ChangeNotifier;

/// Current settings, swappable at runtime.
///
/// Readers get a cheap snapshot; a reload swaps the whole value and notifies
/// subscribers so features can re-read what they depend on.
pub struct SettingsStore {
    settings: ArcSwap<Settings>,
    notifier: ChangeNotifier,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("settings", &self.settings.load())
            .finish()
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: ArcSwap::new(Arc::new(settings)),
            notifier: ChangeNotifier::new(),
        }
    }

    pub fn load(&self) -> Arc<Settings> {
        self.settings.load_full()
    }

    /// Replace the settings, notifying only when something actually changed.
    pub fn apply(&self, settings: Settings) {
        if *self.settings.load().as_ref() == settings {
            return;
        }
        log::info!(target: "editlens::config", "Settings updated");
        self.settings.store(Arc::new(settings));
        self.notifier.notify();
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}
