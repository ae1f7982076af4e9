//! Per-identity bookkeeping for the auto-save scheduler.
//!
//! The registry is the only shared mutable state of the scheduler. It lives
//! behind a `std::sync::Mutex` and is never held across an `.await`.

use std::collections::{HashMap, HashSet};
use tokio::task::JoinHandle;

use crate::field::{EditableField, Identity, PlaceholderId};

/// A debounce timer waiting to fire.
#[derive(Debug)]
pub(crate) struct PendingSave {
    /// Bumped on every reschedule so a superseded timer can tell it lost
    pub generation: u64,
    pub handle: JoinHandle<()>,
}

/// Timers, in-flight saves and placeholder promotions, keyed by identity.
#[derive(Debug, Default)]
pub(crate) struct SaveRegistry {
    pending: HashMap<Identity, PendingSave>,
    in_flight: HashSet<Identity>,
    /// Drafts that were created, mapped to the id the server gave them
    promoted: HashMap<PlaceholderId, i64>,
    closed: bool,
}

impl SaveRegistry {
    /// Rewrite a promoted placeholder identity to its durable id.
    pub fn resolve_identity(&self, identity: &Identity) -> Identity {
        match identity {
            Identity::Placeholder(tmp) => match self.promoted.get(tmp) {
                Some(id) => Identity::Durable(*id),
                None => identity.clone(),
            },
            Identity::Durable(_) => identity.clone(),
        }
    }

    /// Same as [`resolve_identity`](Self::resolve_identity), applied to a field.
    pub fn resolve_field(&self, mut field: EditableField) -> EditableField {
        field.identity = self.resolve_identity(&field.identity);
        field
    }

    pub fn promote(&mut self, placeholder: PlaceholderId, id: i64) {
        self.promoted.insert(placeholder, id);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_in_flight(&self, identity: &Identity) -> bool {
        self.in_flight.contains(identity)
    }

    pub fn is_pending(&self, identity: &Identity) -> bool {
        self.pending.contains_key(identity)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Install a timer, aborting the one it replaces.
    pub fn replace_pending(&mut self, identity: Identity, pending: PendingSave) {
        if let Some(previous) = self.pending.insert(identity, pending) {
            previous.handle.abort();
        }
    }

    /// Abort and forget the timer for `identity`. Returns whether one existed.
    pub fn cancel(&mut self, identity: &Identity) -> bool {
        match self.pending.remove(identity) {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Abort every timer. Returns how many were pending.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        for (_, pending) in self.pending.drain() {
            pending.handle.abort();
        }
        count
    }

    pub fn close(&mut self) -> usize {
        self.closed = true;
        self.cancel_all()
    }

    /// Called by a timer when it fires. Succeeds only if the timer is still
    /// the current one for `identity` and nothing is in flight; the identity
    /// is then moved from pending to in flight.
    pub fn claim_fired(&mut self, identity: &Identity, generation: u64) -> bool {
        let current = self
            .pending
            .get(identity)
            .is_some_and(|p| p.generation == generation);
        if !current || self.closed || self.in_flight.contains(identity) {
            return false;
        }
        self.pending.remove(identity);
        self.in_flight.insert(identity.clone())
    }

    /// Mark `identity` in flight for an immediate save. Fails if it already is.
    pub fn claim_now(&mut self, identity: &Identity) -> bool {
        self.cancel(identity);
        self.in_flight.insert(identity.clone())
    }

    pub fn finish(&mut self, identity: &Identity) {
        self.in_flight.remove(identity);
    }
}
