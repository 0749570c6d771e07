// Entity identity space.
//
// Hands out `ElementId`s for locally placed elements and records the ones
// that arrive from the wire. One `IdentitySpace` is owned by each
// `GameTable`; there is no process-wide counter, so several tables (several
// simulated participants in one test) never share state.
//
// Rules:
// - `acquire()` is monotonic and never returns a value this space has ever
//   handed out or seen, even after the element is released.
// - `from_numeric(n)` marks `n` live and pushes the counter past it.
// - Two live elements never share an ID. When an incoming ID is already live
//   for a different local element, the table rekeys its own element to a
//   fresh ID *before* admitting the incoming one (see
//   `GameTable::admit_wire_id`). The identity space just answers "is this
//   live" and mints the replacement.
// - `reset()` forgets the live set but keeps the counter, so IDs minted
//   before a full reset are still never re-minted.

use std::collections::BTreeSet;

use gametable_protocol::ElementId;

#[derive(Clone, Debug)]
pub struct IdentitySpace {
    next: u64,
    live: BTreeSet<ElementId>,
}

impl Default for IdentitySpace {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentitySpace {
    pub fn new() -> Self {
        Self {
            next: 1,
            live: BTreeSet::new(),
        }
    }

    /// Mint a fresh ID and mark it live.
    pub fn acquire(&mut self) -> ElementId {
        let id = ElementId(self.next);
        self.next += 1;
        self.live.insert(id);
        id
    }

    /// Wrap a numeric ID received from elsewhere (wire or file) and mark it
    /// live. Callers must have resolved any collision first.
    pub fn from_numeric(&mut self, n: u64) -> ElementId {
        let id = ElementId(n);
        self.next = self.next.max(n.saturating_add(1));
        self.live.insert(id);
        id
    }

    /// The ID for `n`, if it is currently live.
    pub fn get(&self, n: u64) -> Option<ElementId> {
        let id = ElementId(n);
        self.live.contains(&id).then_some(id)
    }

    pub fn is_live(&self, id: ElementId) -> bool {
        self.live.contains(&id)
    }

    pub fn release(&mut self, id: ElementId) {
        self.live.remove(&id);
    }

    pub fn reset(&mut self) {
        self.live.clear();
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_is_monotonic() {
        let mut ids = IdentitySpace::new();
        let a = ids.acquire();
        let b = ids.acquire();
        assert!(b > a);
        assert_eq!(ids.live_count(), 2);
    }

    #[test]
    fn released_ids_are_not_reminted() {
        let mut ids = IdentitySpace::new();
        let a = ids.acquire();
        ids.release(a);
        assert!(ids.get(a.0).is_none());
        assert_ne!(ids.acquire(), a);
    }

    #[test]
    fn from_numeric_pushes_counter_past_received_value() {
        let mut ids = IdentitySpace::new();
        ids.from_numeric(500);
        assert_eq!(ids.acquire(), ElementId(501));
        // A smaller received value does not pull the counter back.
        ids.from_numeric(3);
        assert_eq!(ids.acquire(), ElementId(502));
    }

    #[test]
    fn get_only_answers_for_live_ids() {
        let mut ids = IdentitySpace::new();
        assert!(ids.get(7).is_none());
        ids.from_numeric(7);
        assert_eq!(ids.get(7), Some(ElementId(7)));
    }

    #[test]
    fn reset_keeps_counter() {
        let mut ids = IdentitySpace::new();
        ids.acquire();
        ids.acquire();
        ids.reset();
        assert_eq!(ids.live_count(), 0);
        assert_eq!(ids.acquire(), ElementId(3));
    }

    #[test]
    fn from_numeric_at_max_does_not_overflow() {
        let mut ids = IdentitySpace::new();
        ids.from_numeric(u64::MAX);
        assert!(ids.is_live(ElementId(u64::MAX)));
    }
}
