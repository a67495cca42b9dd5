//! Session table bookkeeping
//!
//! Maps viewer identity to the single live session for that viewer. The
//! table is owned and mutated only by the session manager task; there is no
//! shared ambient map.

use crate::session::SessionHandle;
use livecast_core::ViewerId;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

#[derive(Default)]
pub(crate) struct SessionTable {
    entries: HashMap<ViewerId, SessionHandle>,
}

impl SessionTable {
    pub(crate) fn get(&self, viewer_id: &ViewerId) -> Option<&SessionHandle> {
        self.entries.get(viewer_id)
    }

    /// Insert the session produced by `create` unless one already exists for
    /// this viewer. The single mutation point that enforces at-most-one
    /// session per viewer identity: an existing session is returned
    /// unchanged, never overwritten.
    pub(crate) fn create_or_get(
        &mut self,
        viewer_id: &ViewerId,
        create: impl FnOnce() -> SessionHandle,
    ) -> (&SessionHandle, bool) {
        match self.entries.entry(viewer_id.clone()) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => (entry.insert(create()), true),
        }
    }

    pub(crate) fn remove(&mut self, viewer_id: &ViewerId) -> Option<SessionHandle> {
        self.entries.remove(viewer_id)
    }

    pub(crate) fn handles(&self) -> impl Iterator<Item = &SessionHandle> {
        self.entries.values()
    }

    pub(crate) fn drain(&mut self) -> Vec<(ViewerId, SessionHandle)> {
        self.entries.drain().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
