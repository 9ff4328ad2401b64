//! Process-wide registry of tracking sessions.
//!
//! Created once at startup and shared by reference with every component that
//! needs to find the current session. Cleared explicitly on shutdown.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use ulid::Ulid;

use super::TextChangeTracker;
use crate::error::{LensResult, LockResultExt};

/// Stable identifier of one tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Ulid);

impl SessionId {
    fn new() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<SessionId, TextChangeTracker>,
    latest: Option<SessionId>,
}

#[derive(Default)]
pub struct SessionRegistry {
    state: Mutex<RegistryState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tracker and make it the latest session.
    pub fn begin(&self, tracker: TextChangeTracker) -> LensResult<SessionId> {
        let id = SessionId::new();
        let mut state = self.state.lock().recover_poison("SessionRegistry::begin")?;
        log::debug!(
            target: "editlens::tracking",
            "Session {} started for {}",
            id,
            tracker.uri()
        );
        state.sessions.insert(id, tracker);
        state.latest = Some(id);
        Ok(id)
    }

    /// Remove a session, returning its tracker.
    pub fn end(&self, id: SessionId) -> LensResult<Option<TextChangeTracker>> {
        let mut state = self.state.lock().recover_poison("SessionRegistry::end")?;
        if state.latest == Some(id) {
            state.latest = None;
        }
        let removed = state.sessions.remove(&id);
        if removed.is_some() {
            log::debug!(target: "editlens::tracking", "Session {} ended", id);
        }
        Ok(removed)
    }

    /// Most recently started session that is still alive
    pub fn latest(&self) -> LensResult<Option<SessionId>> {
        let state = self.state.lock().recover_poison("SessionRegistry::latest")?;
        Ok(state.latest)
    }

    /// Run `f` against a session's tracker.
    ///
    /// Returns `Ok(None)` when the session does not exist. `f` runs under the
    /// registry lock and must not block.
    pub fn with_session<R>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut TextChangeTracker) -> R,
    ) -> LensResult<Option<R>> {
        let mut state = self
            .state
            .lock()
            .recover_poison("SessionRegistry::with_session")?;
        Ok(state.sessions.get_mut(&id).map(f))
    }

    pub fn len(&self) -> LensResult<usize> {
        let state = self.state.lock().recover_poison("SessionRegistry::len")?;
        Ok(state.sessions.len())
    }

    pub fn is_empty(&self) -> LensResult<bool> {
        self.len().map(|len| len == 0)
    }

    /// Drop every session.
    pub fn clear(&self) -> LensResult<()> {
        let mut state = self.state.lock().recover_poison("SessionRegistry::clear")?;
        state.sessions.clear();
        state.latest = None;
        Ok(())
    }
}
