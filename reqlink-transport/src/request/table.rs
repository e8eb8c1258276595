//! Live request bookkeeping and id allocation.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use super::{RequestHandler, RequestId, RequestState};

/// Client-side record of a live request.
pub(crate) struct RequestSlot {
    /// State shared with the caller's `Request` handle.
    pub(crate) state: Rc<Cell<RequestState>>,
    pub(crate) handler: Rc<dyn RequestHandler>,
}

/// Result of looking up an inbound frame's request id.
pub(crate) enum Lookup<'a> {
    Live(&'a RequestSlot),
    /// Aborted locally; the server may still send frames for it.
    Tombstoned,
    Unknown,
}

/// Requests indexed by id, ordered so fan-out is deterministic.
pub(crate) struct RequestTable {
    live: BTreeMap<RequestId, RequestSlot>,
    tombstones: BTreeSet<RequestId>,
    next_request_id: RequestId,
}

impl RequestTable {
    pub(crate) fn new() -> Self {
        Self::starting_at(0)
    }

    /// Table whose first allocation attempt is `next_request_id`.
    pub(crate) fn starting_at(next_request_id: RequestId) -> Self {
        Self {
            live: BTreeMap::new(),
            tombstones: BTreeSet::new(),
            next_request_id,
        }
    }

    /// Pick the next id not held by a live or tombstoned request.
    ///
    /// The counter wraps, so ids are reused once their request is gone.
    /// Returns `None` when the whole id space is reserved.
    pub(crate) fn allocate_id(&mut self) -> Option<RequestId> {
        let reserved = (self.live.len() + self.tombstones.len()) as u64;
        if reserved > u64::from(RequestId::MAX) {
            return None;
        }

        loop {
            let id = self.next_request_id;
            self.next_request_id = id.wrapping_add(1);
            if !self.live.contains_key(&id) && !self.tombstones.contains(&id) {
                return Some(id);
            }
        }
    }

    pub(crate) fn insert(&mut self, request_id: RequestId, slot: RequestSlot) {
        debug_assert!(!self.tombstones.contains(&request_id));
        let previous = self.live.insert(request_id, slot);
        debug_assert!(previous.is_none(), "request id {request_id} reused while live");
    }

    pub(crate) fn lookup(&self, request_id: RequestId) -> Lookup<'_> {
        match self.live.get(&request_id) {
            Some(slot) => Lookup::Live(slot),
            None if self.tombstones.contains(&request_id) => Lookup::Tombstoned,
            None => Lookup::Unknown,
        }
    }

    pub(crate) fn get(&self, request_id: RequestId) -> Option<&RequestSlot> {
        self.live.get(&request_id)
    }

    pub(crate) fn remove(&mut self, request_id: RequestId) -> Option<RequestSlot> {
        self.live.remove(&request_id)
    }

    /// Keep `request_id` reserved until [`Self::clear_tombstone`].
    pub(crate) fn tombstone(&mut self, request_id: RequestId) {
        self.tombstones.insert(request_id);
    }

    pub(crate) fn clear_tombstone(&mut self, request_id: RequestId) -> bool {
        self.tombstones.remove(&request_id)
    }

    pub(crate) fn clear_tombstones(&mut self) {
        self.tombstones.clear();
    }

    /// Remove every live request, in ascending id order.
    pub(crate) fn drain_live(&mut self) -> Vec<(RequestId, RequestSlot)> {
        std::mem::take(&mut self.live).into_iter().collect()
    }

    pub(crate) fn live_count(&self) -> usize {
        self.live.len()
    }

    #[cfg(test)]
    pub(crate) fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }
}
