//! Explicit change notification.
//!
//! A component owning observable state holds a [`ChangeNotifier`] and calls
//! [`ChangeNotifier::notify`] after mutating that state. Dependents subscribe
//! once and re-read the state through the component's accessors whenever the
//! revision moves.

use tokio::sync::watch;

#[derive(Debug)]
pub struct ChangeNotifier {
    revision: watch::Sender<u64>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self { revision }
    }

    /// Signal that the owner's state changed.
    pub fn notify(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }
}
