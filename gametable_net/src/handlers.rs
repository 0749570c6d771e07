// Inbound message handlers.
//
// `Registry::standard()` registers one handler per message kind in the
// catalog. They fall into two groups:
//
// - **Session control** (handshake, roster, announcements, login-complete,
//   ping). These drive `Session` and the table's session hooks and are only
//   valid in one direction and one phase; anything else is an `Unexpected`
//   protocol fault.
// - **Shared traffic** (every kind with `MessageKind::is_relayed`). One
//   handler, `on_shared`, applies the message to the public map through the
//   normal `GameTable` mutators with the packet's `NetworkEvent` as the tag,
//   so it is never re-broadcast from the outbox. On the host the session
//   then forwards the same message to the other peers. A message that fails
//   to apply (unknown element, corrupted payload) is not forwarded. The host
//   also rewrites a chat line's `from` to the sender's character name.

use gametable_protocol::{Message, MessageKind, PROTOCOL_VERSION, PlayerId};
use gametable_state::{GameTable, MapVisibility, NetworkEvent, StateError};

use crate::dispatch::Registry;
use crate::error::DispatchError;
use crate::node::{Node, NodeEvent};
use crate::session::JoinRequest;

const PUBLIC: MapVisibility = MapVisibility::Public;

impl Registry<Node> {
    /// The full message catalog.
    pub fn standard() -> Self {
        let mut registry = Registry::new();
        registry.register(MessageKind::JoinRequest, on_join_request);
        registry.register(MessageKind::JoinReject, on_join_reject);
        registry.register(MessageKind::JoinAccepted, on_join_accepted);
        registry.register(MessageKind::Roster, on_roster);
        registry.register(MessageKind::Announcement, on_announcement);
        registry.register(MessageKind::LoginComplete, on_login_complete);
        registry.register(MessageKind::Ping, |_: &mut Node, _, _: &NetworkEvent| Ok(()));
        for kind in MessageKind::ALL.into_iter().filter(|k| k.is_relayed()) {
            registry.register(kind, on_shared);
        }
        registry
    }
}

fn unexpected(kind: MessageKind, reason: &'static str) -> DispatchError {
    DispatchError::Unexpected { kind, reason }
}

// ---------------------------------------------------------------------------
// Session control
// ---------------------------------------------------------------------------

fn on_join_request(node: &mut Node, msg: Message, event: &NetworkEvent) -> Result<(), DispatchError> {
    if !node.session.is_host() {
        return Err(unexpected(event.kind, "only a host accepts joins"));
    }
    if node.session.is_logged_in(event.connection) {
        return Err(unexpected(event.kind, "connection already joined"));
    }
    let Message::JoinRequest {
        version,
        password,
        player_name,
        character_name,
    } = msg
    else {
        return Err(unexpected(event.kind, "payload does not match kind"));
    };
    let request = JoinRequest {
        version,
        password,
        player_name,
        character_name,
    };
    node.session
        .accept_join(&mut node.table, event.connection, request);
    Ok(())
}

fn on_join_reject(node: &mut Node, msg: Message, event: &NetworkEvent) -> Result<(), DispatchError> {
    if !node.session.awaiting_acceptance(event.connection) {
        return Err(unexpected(event.kind, "no join pending"));
    }
    let Message::JoinReject { reason } = msg else {
        return Err(unexpected(event.kind, "payload does not match kind"));
    };
    node.session
        .rejected(&mut node.table, event.connection, reason);
    Ok(())
}

fn on_join_accepted(node: &mut Node, msg: Message, event: &NetworkEvent) -> Result<(), DispatchError> {
    if !node.session.awaiting_acceptance(event.connection) {
        return Err(unexpected(event.kind, "no join pending"));
    }
    let Message::JoinAccepted { version } = msg else {
        return Err(unexpected(event.kind, "payload does not match kind"));
    };
    let requested = node
        .session
        .requested_version(event.connection)
        .unwrap_or(PROTOCOL_VERSION);
    if !gametable_protocol::is_supported_version(version) || version > requested {
        return Err(DispatchError::Handshake(format!(
            "host chose protocol v{version}, we asked for v{requested}"
        )));
    }
    node.session
        .accepted(&mut node.table, event.connection, version);
    Ok(())
}

fn on_roster(node: &mut Node, msg: Message, event: &NetworkEvent) -> Result<(), DispatchError> {
    if node.session.is_host() || !node.session.is_logged_in(event.connection) {
        return Err(unexpected(event.kind, "roster only comes from the host"));
    }
    let Message::Roster { players, you } = msg else {
        return Err(unexpected(event.kind, "payload does not match kind"));
    };
    if !node.table.apply_roster(&players, you, Some(event)) {
        return Err(unexpected(event.kind, "'you' index out of range"));
    }
    Ok(())
}

fn on_announcement(node: &mut Node, msg: Message, event: &NetworkEvent) -> Result<(), DispatchError> {
    if node.session.is_host() {
        return Err(unexpected(event.kind, "announcements only come from the host"));
    }
    let Message::Announcement { text } = msg else {
        return Err(unexpected(event.kind, "payload does not match kind"));
    };
    node.session.emit(NodeEvent::Announcement { text });
    Ok(())
}

fn on_login_complete(node: &mut Node, _msg: Message, event: &NetworkEvent) -> Result<(), DispatchError> {
    if node.session.is_host() || !node.session.is_logged_in(event.connection) {
        return Err(unexpected(event.kind, "login-complete only comes from the host"));
    }
    node.table.finish_login();
    log::info!(
        "login complete: {} elements, {} players",
        node.table.map(PUBLIC).elements().len(),
        node.table.roster().len()
    );
    node.session.emit(NodeEvent::LoginComplete);
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared traffic
// ---------------------------------------------------------------------------

fn on_shared(node: &mut Node, msg: Message, event: &NetworkEvent) -> Result<(), DispatchError> {
    if !node.session.is_logged_in(event.connection) {
        return Err(unexpected(event.kind, "sent before joining"));
    }
    let msg = if node.session.is_host() {
        check_sender(&msg, event)?;
        stamp_chat_sender(&node.table, msg, event)?
    } else {
        msg
    };
    apply_shared(node, &msg, event)?;
    node.session.relay(&msg, event);
    Ok(())
}

/// On the host, a peer may only speak for itself in player-scoped messages.
fn check_sender(msg: &Message, event: &NetworkEvent) -> Result<(), DispatchError> {
    let claimed: Option<PlayerId> = match msg {
        Message::PointerMoved { player, .. } | Message::PlayerRenamed { player, .. } => Some(*player),
        _ => None,
    };
    match claimed {
        Some(player) if Some(player) != event.player => {
            Err(unexpected(event.kind, "player field does not match sender"))
        }
        _ => Ok(()),
    }
}

/// Chat is attributed to the sender's roster entry, whatever `from` says.
fn stamp_chat_sender(table: &GameTable, msg: Message, event: &NetworkEvent) -> Result<Message, DispatchError> {
    match msg {
        Message::Chat { text, .. } => {
            let from = event
                .player
                .and_then(|id| table.roster().get(id))
                .map(|p| p.character_name.clone())
                .ok_or_else(|| unexpected(event.kind, "chat from a player not on the roster"))?;
            Ok(Message::Chat { from, text })
        }
        other => Ok(other),
    }
}

fn apply_shared(node: &mut Node, msg: &Message, tag: &NetworkEvent) -> Result<(), DispatchError> {
    let table = &mut node.table;
    let tag = Some(tag);
    match msg {
        Message::Chat { from, text } => node.session.emit(NodeEvent::Chat {
            from: from.clone(),
            text: text.clone(),
        }),
        Message::ElementAdded { element } => {
            if table.insert_element(PUBLIC, element, tag).is_none() {
                return Err(StateError::CorruptedElement(element.id).into());
            }
        }
        Message::ElementsRemoved { ids } => {
            table.remove_elements(PUBLIC, ids, tag);
        }
        Message::ElementMoved { id, position } => table.move_element(PUBLIC, *id, *position, tag)?,
        Message::ElementRotated { id, angle } => table.rotate_element(PUBLIC, *id, *angle, tag)?,
        Message::ElementFlipped { id, flip_h, flip_v } => {
            table.flip_element(PUBLIC, *id, *flip_h, *flip_v, tag)?
        }
        Message::ElementResized { id, face_size } => {
            table.resize_element(PUBLIC, *id, *face_size, tag)?
        }
        Message::ElementRetyped { id, type_name } => {
            table.retype_element(PUBLIC, *id, type_name, tag)?
        }
        Message::ElementRenamed { id, name } => table.rename_element(PUBLIC, *id, name, tag)?,
        Message::ElementLayerChanged { id, layer } => {
            table.set_element_layer(PUBLIC, *id, *layer, tag)?
        }
        Message::AttributesSet { id, attributes } => {
            table.set_attributes(PUBLIC, *id, attributes.clone(), tag)?
        }
        Message::AttributesRemoved { id, keys } => {
            table.remove_attributes(PUBLIC, *id, keys.clone(), tag)?
        }
        Message::LinesAdded { lines } => table.add_lines(PUBLIC, lines.clone(), tag),
        Message::LinesCleared => table.clear_lines(PUBLIC, tag),
        Message::LinesErased { rect, color } => {
            table.erase_lines(PUBLIC, *rect, *color, tag);
        }
        Message::GridMode { mode } => table.set_grid_mode(*mode, tag),
        Message::Background { background } => table.set_background(background.clone(), tag),
        Message::Lock { ids, locked } => {
            table.set_locked(PUBLIC, ids, *locked, tag);
        }
        Message::LockAll { locked } => table.set_all_locked(PUBLIC, *locked, tag),
        Message::GroupAdd { group, ids } => table.add_to_group(PUBLIC, group, ids, tag),
        Message::GroupRemove { ids } => table.remove_from_groups(PUBLIC, ids, tag),
        Message::GroupDelete { group } => table.delete_group(PUBLIC, group, tag)?,
        Message::GroupRename { from, to } => table.rename_group(PUBLIC, from, to, tag)?,
        Message::MapReset => table.reset_map(PUBLIC, tag),
        Message::PointerMoved {
            player,
            position,
            pointing,
        } => table.set_pointer(*player, *position, *pointing, tag)?,
        Message::PlayerRenamed {
            player,
            character_name,
        } => table.rename_character(*player, character_name, tag)?,
        Message::JoinRequest { .. }
        | Message::JoinReject { .. }
        | Message::JoinAccepted { .. }
        | Message::Roster { .. }
        | Message::Announcement { .. }
        | Message::LoginComplete
        | Message::Ping => return Err(unexpected(msg.kind(), "not shared traffic")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Receiver};

    use gametable_protocol::{ConnectionId, ElementData, ElementId, Layer, Point};
    use gametable_state::Player;

    use super::*;
    use crate::config::{HostConfig, JoinConfig};
    use crate::session::Session;

    fn joiner() -> (Node, Receiver<NodeEvent>) {
        let (tx, rx) = mpsc::channel();
        let mut table = GameTable::new(Player::new("cole", "Rogue"));
        table.begin_joining();
        (Node::new(table, Session::joiner(&JoinConfig::default(), tx)), rx)
    }

    fn dispatch(node: &mut Node, msg: &Message) -> Result<MessageKind, DispatchError> {
        let bytes = msg.encode(PROTOCOL_VERSION).unwrap();
        Registry::standard().dispatch(node, ConnectionId(1), Some(PlayerId::HOST), &bytes, PROTOCOL_VERSION)
    }

    #[test]
    fn standard_registry_covers_catalog() {
        let registry = Registry::<Node>::standard();
        for kind in MessageKind::ALL {
            assert!(registry.is_registered(kind), "{kind:?} has no handler");
        }
        assert_eq!(registry.len(), MessageKind::ALL.len());
    }

    #[test]
    fn shared_traffic_before_join_is_fault() {
        let (mut node, _events) = joiner();
        let err = dispatch(&mut node, &Message::LinesCleared).unwrap_err();
        assert!(err.is_protocol_fault());
    }

    #[test]
    fn host_refuses_client_only_kinds() {
        let (tx, _rx) = mpsc::channel();
        let mut table = GameTable::new(Player::new("hana", "Host"));
        table.begin_hosting();
        let mut node = Node::new(table, Session::host(&HostConfig::default(), tx));
        let err = dispatch(&mut node, &Message::LoginComplete).unwrap_err();
        assert!(matches!(err, DispatchError::Unexpected { .. }));
        let err = dispatch(
            &mut node,
            &Message::Roster {
                players: Vec::new(),
                you: 0,
            },
        )
        .unwrap_err();
        assert!(err.is_protocol_fault());
    }

    #[test]
    fn sender_must_match_player_field() {
        let event = NetworkEvent::new(ConnectionId(4), Some(PlayerId(2)), MessageKind::PointerMoved, &[]);
        let own = Message::PointerMoved {
            player: PlayerId(2),
            position: Point::default(),
            pointing: true,
        };
        let forged = Message::PointerMoved {
            player: PlayerId(0),
            position: Point::default(),
            pointing: true,
        };
        assert!(check_sender(&own, &event).is_ok());
        assert!(check_sender(&forged, &event).is_err());
    }

    #[test]
    fn host_stamps_chat_sender() {
        let (tx, _rx) = mpsc::channel();
        let mut table = GameTable::new(Player::new("hana", "Host"));
        table.begin_hosting();
        let mut cole = Player::new("cole", "Rogue");
        cole.id = PlayerId(1);
        cole.connection = Some(ConnectionId(1));
        table.add_player(cole);
        let node = Node::new(table, Session::host(&HostConfig::default(), tx));

        let forged = Message::Chat {
            from: "Host".into(),
            text: "give me your gold".into(),
        };
        let event = NetworkEvent::new(ConnectionId(1), Some(PlayerId(1)), MessageKind::Chat, &[]);
        assert_eq!(
            stamp_chat_sender(&node.table, forged.clone(), &event).unwrap(),
            Message::Chat {
                from: "Rogue".into(),
                text: "give me your gold".into(),
            }
        );

        let stranger = NetworkEvent::new(ConnectionId(7), Some(PlayerId(7)), MessageKind::Chat, &[]);
        let err = stamp_chat_sender(&node.table, forged, &stranger).unwrap_err();
        assert!(err.is_protocol_fault());

        let other = Message::LinesCleared;
        assert_eq!(stamp_chat_sender(&node.table, other.clone(), &stranger).unwrap(), other);
    }

    #[test]
    fn corrupted_element_counts_as_fault() {
        let (mut node, _events) = joiner();
        // Pretend the host already accepted us.
        let element = ElementData {
            id: ElementId(1),
            type_name: "x".into(),
            position: Point::default(),
            layer: Layer::Pog,
            name: "x".into(),
            angle: 0.0,
            flip_h: false,
            flip_v: false,
            face_size: 1e6,
            attributes: Vec::new(),
        };
        let event = NetworkEvent::new(ConnectionId(1), Some(PlayerId::HOST), MessageKind::ElementAdded, &[]);
        let err = apply_shared(&mut node, &Message::ElementAdded { element }, &event).unwrap_err();
        assert!(matches!(err, DispatchError::State(StateError::CorruptedElement(_))));
        assert!(!err.is_fatal() && err.is_protocol_fault());
        assert_eq!(node.table.map(PUBLIC).quarantine().len(), 1);
        assert_eq!(node.table.outbox_len(), 0);
    }
}
