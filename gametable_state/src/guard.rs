// Link state and the replication guard.
//
// `ReplicationGuard` holds the two pieces of session state the broadcast
// decision needs (link status, logging-in flag) and owns the one function
// that makes that decision. Every `GameTable` mutator funnels its outbound
// message through `GameTable::replicate`, which asks `should_broadcast` and
// nothing else. The session layer flips the state through the `GameTable`
// session hooks (`begin_hosting`, `begin_joining`, `finish_login`,
// `disconnect`).

use crate::event::NetworkEvent;
use crate::map::MapVisibility;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkStatus {
    #[default]
    Disconnected,
    Hosting,
    /// Join request sent, waiting for `JoinAccepted` and the state dump.
    Connecting,
    Connected,
}

impl LinkStatus {
    /// Hosting or joined; the states in which local edits leave the process.
    pub fn is_connected(self) -> bool {
        matches!(self, LinkStatus::Hosting | LinkStatus::Connected)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplicationGuard {
    status: LinkStatus,
    logging_in: bool,
}

impl ReplicationGuard {
    pub fn status(&self) -> LinkStatus {
        self.status
    }

    pub fn is_logging_in(&self) -> bool {
        self.logging_in
    }

    /// Whether a mutation on `map` carrying `tag` must be broadcast.
    ///
    /// True only for a locally originated change (`tag` is `None`) on the
    /// public map, while the link is up and no login is in progress.
    pub fn should_broadcast(&self, map: MapVisibility, tag: Option<&NetworkEvent>) -> bool {
        tag.is_none()
            && self.status.is_connected()
            && !self.logging_in
            && map == MapVisibility::Public
    }

    pub(crate) fn set(&mut self, status: LinkStatus, logging_in: bool) {
        self.status = status;
        self.logging_in = logging_in;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gametable_protocol::{ConnectionId, MessageKind};

    use super::*;

    fn tag() -> NetworkEvent {
        NetworkEvent {
            connection: ConnectionId(1),
            player: None,
            kind: MessageKind::ElementMoved,
            raw: Arc::from(&[][..]),
        }
    }

    #[test]
    fn truth_table() {
        let event = tag();
        let statuses = [
            LinkStatus::Disconnected,
            LinkStatus::Hosting,
            LinkStatus::Connecting,
            LinkStatus::Connected,
        ];
        for status in statuses {
            for logging_in in [false, true] {
                for map in [MapVisibility::Public, MapVisibility::Private] {
                    for tagged in [false, true] {
                        let mut guard = ReplicationGuard::default();
                        guard.set(status, logging_in);
                        let t = tagged.then_some(&event);
                        let expected = !tagged
                            && matches!(status, LinkStatus::Hosting | LinkStatus::Connected)
                            && !logging_in
                            && map == MapVisibility::Public;
                        assert_eq!(
                            guard.should_broadcast(map, t),
                            expected,
                            "{status:?} logging_in={logging_in} {map:?} tagged={tagged}"
                        );
                    }
                }
            }
        }
    }
}
