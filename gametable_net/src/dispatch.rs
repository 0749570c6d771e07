// Message registry and dispatcher.
//
// `Registry<C>` maps each `MessageKind` to a handler closure over some
// context `C` (the node, in production; a plain recorder struct in tests).
// `dispatch` is the single entry point for inbound packet bytes: it opens
// the packet, resolves the tag, finds the handler, decodes the body for the
// connection's negotiated version, wraps the packet in a fresh
// `NetworkEvent`, and calls the handler with it.
//
// The registry is built once at node start (`Registry::standard()` in
// `handlers.rs`) and never changes afterwards. There is no runtime plugin
// loading; extra kinds would be added by registering more handlers before the
// node starts.
//
// Error classification is the caller's job (see `DispatchError::is_fatal`).
// A tag with no `MessageKind`, or a kind with no handler, is fatal because it
// means the two ends disagree on the catalog.

use std::collections::BTreeMap;

use gametable_protocol::{ConnectionId, Message, MessageKind, PacketReader, PlayerId};
use gametable_state::NetworkEvent;

use crate::error::DispatchError;

/// A message handler over context `C`.
pub type Handler<C> =
    Box<dyn Fn(&mut C, Message, &NetworkEvent) -> Result<(), DispatchError> + Send>;

pub struct Registry<C> {
    handlers: BTreeMap<MessageKind, Handler<C>>,
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }
}

impl<C> Registry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any earlier one.
    pub fn register<F>(&mut self, kind: MessageKind, handler: F)
    where
        F: Fn(&mut C, Message, &NetworkEvent) -> Result<(), DispatchError> + Send + 'static,
    {
        self.handlers.insert(kind, Box::new(handler));
    }

    pub fn is_registered(&self, kind: MessageKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Decode one packet and hand it to its handler. Returns the kind that
    /// was dispatched.
    pub fn dispatch(
        &self,
        ctx: &mut C,
        connection: ConnectionId,
        player: Option<PlayerId>,
        bytes: &[u8],
        version: u32,
    ) -> Result<MessageKind, DispatchError> {
        let (tag, mut reader) = PacketReader::open(bytes, version)?;
        let kind = MessageKind::from_tag(tag).ok_or(DispatchError::UnknownTag { tag })?;
        let handler = self
            .handlers
            .get(&kind)
            .ok_or(DispatchError::Unregistered(kind))?;
        let message = Message::read_body(kind, &mut reader)?;
        let event = NetworkEvent::new(connection, player, kind, bytes);
        handler(ctx, message, &event)?;
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use gametable_protocol::{CodecError, ElementId, PROTOCOL_VERSION, Point};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<(MessageKind, Option<PlayerId>, ConnectionId, usize)>,
    }

    fn registry() -> Registry<Recorder> {
        let mut registry = Registry::new();
        for kind in [MessageKind::Ping, MessageKind::ElementMoved] {
            registry.register(kind, |ctx: &mut Recorder, _msg, event: &NetworkEvent| {
                ctx.seen
                    .push((event.kind, event.player, event.connection, event.raw.len()));
                Ok(())
            });
        }
        registry
    }

    #[test]
    fn routes_by_tag_with_fresh_event() {
        let registry = registry();
        let mut ctx = Recorder::default();
        let bytes = Message::ElementMoved {
            id: ElementId(3),
            position: Point::new(1, 2),
        }
        .encode(PROTOCOL_VERSION)
        .unwrap();
        let kind = registry
            .dispatch(&mut ctx, ConnectionId(7), Some(PlayerId(2)), &bytes, PROTOCOL_VERSION)
            .unwrap();
        assert_eq!(kind, MessageKind::ElementMoved);
        assert_eq!(
            ctx.seen,
            vec![(MessageKind::ElementMoved, Some(PlayerId(2)), ConnectionId(7), bytes.len())]
        );
    }

    #[test]
    fn unknown_tag_is_fatal() {
        let registry = registry();
        let mut ctx = Recorder::default();
        let err = registry
            .dispatch(&mut ctx, ConnectionId(1), None, &777u32.to_be_bytes(), PROTOCOL_VERSION)
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownTag { tag: 777 }));
        assert!(err.is_fatal());
    }

    #[test]
    fn unregistered_kind_is_fatal() {
        let registry = registry();
        let mut ctx = Recorder::default();
        let bytes = Message::LinesCleared.encode(PROTOCOL_VERSION).unwrap();
        let err = registry
            .dispatch(&mut ctx, ConnectionId(1), None, &bytes, PROTOCOL_VERSION)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Unregistered(MessageKind::LinesCleared)));
        assert!(err.is_fatal());
    }

    #[test]
    fn malformed_body_is_fault_and_handler_not_called() {
        let registry = registry();
        let mut ctx = Recorder::default();
        let mut bytes = Message::ElementMoved {
            id: ElementId(3),
            position: Point::new(1, 2),
        }
        .encode(PROTOCOL_VERSION)
        .unwrap();
        bytes.truncate(bytes.len() - 2);
        let err = registry
            .dispatch(&mut ctx, ConnectionId(1), None, &bytes, PROTOCOL_VERSION)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Codec(CodecError::Truncated { .. })));
        assert!(err.is_protocol_fault());
        assert!(ctx.seen.is_empty());
    }

    #[test]
    fn short_packet_is_fault() {
        let registry = registry();
        let mut ctx = Recorder::default();
        let err = registry
            .dispatch(&mut ctx, ConnectionId(1), None, &[0, 1], PROTOCOL_VERSION)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Codec(CodecError::MissingTag { len: 2 })));
    }
}
