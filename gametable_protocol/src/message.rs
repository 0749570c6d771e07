// The message catalog.
//
// `MessageKind` is the numeric type tag that leads every packet; `Message` is
// the decoded form with one variant per kind. Both directions (host → peer,
// peer → host) share the same catalog. Which side may send what is a session
// rule, enforced in `gametable_net::session`, not here.
//
// Versioning: `PROTOCOL_VERSION` is the newest schema this build speaks and
// `MIN_PROTOCOL_VERSION` the oldest it still accepts. The join handshake
// negotiates one version per connection and everything after that is encoded
// and decoded strictly for it. A handful of kinds only exist from version 2
// on (`MessageKind::since`); encoding them for an older peer fails with
// `CodecError::Unsupported` so the sender can skip that peer. The three
// handshake kinds have the same layout in every version, since they are
// exchanged before a version is agreed.
//
// See also: `codec.rs` for the field-level reader/writer, `wire.rs` for
// value layouts, `framing.rs` for how packets are delimited on the stream.

use crate::codec::{CodecError, PacketReader, PacketWriter};
use crate::types::*;

/// Newest schema version this build speaks.
pub const PROTOCOL_VERSION: u32 = 2;

/// Oldest schema version a host will still accept at join time.
pub const MIN_PROTOCOL_VERSION: u32 = 1;

/// Whether `version` is in the range this build can speak.
pub fn is_supported_version(version: u32) -> bool {
    (MIN_PROTOCOL_VERSION..=PROTOCOL_VERSION).contains(&version)
}

/// Numeric type tag of each message. Values are part of the wire format and
/// must never be renumbered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum MessageKind {
    JoinRequest = 1,
    JoinReject = 2,
    JoinAccepted = 3,
    Roster = 4,
    Chat = 5,
    Announcement = 6,
    ElementAdded = 7,
    ElementsRemoved = 8,
    ElementMoved = 9,
    ElementRotated = 10,
    ElementFlipped = 11,
    ElementResized = 12,
    ElementRetyped = 13,
    ElementRenamed = 14,
    ElementLayerChanged = 15,
    AttributesSet = 16,
    AttributesRemoved = 17,
    LinesAdded = 18,
    LinesCleared = 19,
    LinesErased = 20,
    GridMode = 21,
    Background = 22,
    Lock = 23,
    LockAll = 24,
    GroupAdd = 25,
    GroupRemove = 26,
    GroupDelete = 27,
    GroupRename = 28,
    MapReset = 29,
    PointerMoved = 30,
    PlayerRenamed = 31,
    LoginComplete = 32,
    Ping = 33,
}

impl MessageKind {
    /// Every kind, in tag order.
    pub const ALL: [MessageKind; 33] = [
        MessageKind::JoinRequest,
        MessageKind::JoinReject,
        MessageKind::JoinAccepted,
        MessageKind::Roster,
        MessageKind::Chat,
        MessageKind::Announcement,
        MessageKind::ElementAdded,
        MessageKind::ElementsRemoved,
        MessageKind::ElementMoved,
        MessageKind::ElementRotated,
        MessageKind::ElementFlipped,
        MessageKind::ElementResized,
        MessageKind::ElementRetyped,
        MessageKind::ElementRenamed,
        MessageKind::ElementLayerChanged,
        MessageKind::AttributesSet,
        MessageKind::AttributesRemoved,
        MessageKind::LinesAdded,
        MessageKind::LinesCleared,
        MessageKind::LinesErased,
        MessageKind::GridMode,
        MessageKind::Background,
        MessageKind::Lock,
        MessageKind::LockAll,
        MessageKind::GroupAdd,
        MessageKind::GroupRemove,
        MessageKind::GroupDelete,
        MessageKind::GroupRename,
        MessageKind::MapReset,
        MessageKind::PointerMoved,
        MessageKind::PlayerRenamed,
        MessageKind::LoginComplete,
        MessageKind::Ping,
    ];

    pub fn tag(self) -> u32 {
        self as u32
    }

    pub fn from_tag(tag: u32) -> Option<MessageKind> {
        // Tags are dense from 1, so the table index is tag - 1.
        let index = usize::try_from(tag).ok()?.checked_sub(1)?;
        MessageKind::ALL.get(index).copied()
    }

    /// First protocol version that carries this kind.
    pub fn since(self) -> u32 {
        match self {
            MessageKind::ElementFlipped
            | MessageKind::AttributesSet
            | MessageKind::AttributesRemoved
            | MessageKind::PointerMoved => 2,
            _ => 1,
        }
    }

    /// Handshake kinds are exchanged before a version is negotiated.
    pub fn is_handshake(self) -> bool {
        matches!(
            self,
            MessageKind::JoinRequest | MessageKind::JoinReject | MessageKind::JoinAccepted
        )
    }

    /// Kinds a host forwards from one peer to the others. Everything that
    /// mutates shared state, plus chat and pointer traffic; session control
    /// (handshake, roster, login-complete, announcements, ping) is never
    /// forwarded.
    pub fn is_relayed(self) -> bool {
        !matches!(
            self,
            MessageKind::JoinRequest
                | MessageKind::JoinReject
                | MessageKind::JoinAccepted
                | MessageKind::Roster
                | MessageKind::Announcement
                | MessageKind::LoginComplete
                | MessageKind::Ping
        )
    }
}

/// A decoded protocol message.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// Peer → host: ask to join the session.
    JoinRequest {
        version: u32,
        password: String,
        player_name: String,
        character_name: String,
    },
    /// Host → peer: join refused; the host closes the connection after this.
    JoinReject { reason: RejectReason },
    /// Host → peer: join accepted, all further traffic uses `version`.
    JoinAccepted { version: u32 },
    /// Host → peer: full player list; `you` is the recipient's index in it.
    Roster { players: Vec<PlayerData>, you: i32 },
    Chat { from: String, text: String },
    /// System line shown to everyone (joins, departures).
    Announcement { text: String },
    ElementAdded { element: ElementData },
    ElementsRemoved { ids: Vec<ElementId> },
    ElementMoved { id: ElementId, position: Point },
    ElementRotated { id: ElementId, angle: f64 },
    ElementFlipped { id: ElementId, flip_h: bool, flip_v: bool },
    ElementResized { id: ElementId, face_size: f64 },
    ElementRetyped { id: ElementId, type_name: String },
    ElementRenamed { id: ElementId, name: String },
    ElementLayerChanged { id: ElementId, layer: Layer },
    AttributesSet { id: ElementId, attributes: Vec<Attribute> },
    AttributesRemoved { id: ElementId, keys: Vec<String> },
    LinesAdded { lines: Vec<LineData> },
    LinesCleared,
    /// Erase every line with an endpoint inside `rect`, optionally only
    /// those drawn in `color`.
    LinesErased { rect: Rect, color: Option<Color> },
    GridMode { mode: GridMode },
    Background { background: Background },
    Lock { ids: Vec<ElementId>, locked: bool },
    LockAll { locked: bool },
    GroupAdd { group: String, ids: Vec<ElementId> },
    GroupRemove { ids: Vec<ElementId> },
    GroupDelete { group: String },
    GroupRename { from: String, to: String },
    /// Clear the public map (elements, lines, groups, locks) ahead of a new
    /// map being streamed in.
    MapReset,
    PointerMoved {
        player: PlayerId,
        position: Point,
        pointing: bool,
    },
    PlayerRenamed {
        player: PlayerId,
        character_name: String,
    },
    /// Host → joiner: the initial state dump is complete.
    LoginComplete,
    Ping,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::JoinRequest { .. } => MessageKind::JoinRequest,
            Message::JoinReject { .. } => MessageKind::JoinReject,
            Message::JoinAccepted { .. } => MessageKind::JoinAccepted,
            Message::Roster { .. } => MessageKind::Roster,
            Message::Chat { .. } => MessageKind::Chat,
            Message::Announcement { .. } => MessageKind::Announcement,
            Message::ElementAdded { .. } => MessageKind::ElementAdded,
            Message::ElementsRemoved { .. } => MessageKind::ElementsRemoved,
            Message::ElementMoved { .. } => MessageKind::ElementMoved,
            Message::ElementRotated { .. } => MessageKind::ElementRotated,
            Message::ElementFlipped { .. } => MessageKind::ElementFlipped,
            Message::ElementResized { .. } => MessageKind::ElementResized,
            Message::ElementRetyped { .. } => MessageKind::ElementRetyped,
            Message::ElementRenamed { .. } => MessageKind::ElementRenamed,
            Message::ElementLayerChanged { .. } => MessageKind::ElementLayerChanged,
            Message::AttributesSet { .. } => MessageKind::AttributesSet,
            Message::AttributesRemoved { .. } => MessageKind::AttributesRemoved,
            Message::LinesAdded { .. } => MessageKind::LinesAdded,
            Message::LinesCleared => MessageKind::LinesCleared,
            Message::LinesErased { .. } => MessageKind::LinesErased,
            Message::GridMode { .. } => MessageKind::GridMode,
            Message::Background { .. } => MessageKind::Background,
            Message::Lock { .. } => MessageKind::Lock,
            Message::LockAll { .. } => MessageKind::LockAll,
            Message::GroupAdd { .. } => MessageKind::GroupAdd,
            Message::GroupRemove { .. } => MessageKind::GroupRemove,
            Message::GroupDelete { .. } => MessageKind::GroupDelete,
            Message::GroupRename { .. } => MessageKind::GroupRename,
            Message::MapReset => MessageKind::MapReset,
            Message::PointerMoved { .. } => MessageKind::PointerMoved,
            Message::PlayerRenamed { .. } => MessageKind::PlayerRenamed,
            Message::LoginComplete => MessageKind::LoginComplete,
            Message::Ping => MessageKind::Ping,
        }
    }

    /// Encode for a connection speaking `version`.
    pub fn encode(&self, version: u32) -> Result<Vec<u8>, CodecError> {
        let kind = self.kind();
        if !kind.is_handshake() && kind.since() > version {
            return Err(CodecError::Unsupported { kind, version });
        }
        let mut w = PacketWriter::new(kind, version);
        self.write_body(&mut w);
        Ok(w.finish())
    }

    /// Decode one whole packet for a connection speaking `version`.
    pub fn decode(bytes: &[u8], version: u32) -> Result<Message, CodecError> {
        let (tag, mut reader) = PacketReader::open(bytes, version)?;
        let kind = MessageKind::from_tag(tag).ok_or(CodecError::UnknownTag { tag })?;
        Message::read_body(kind, &mut reader)
    }

    /// Decode the body of a packet whose tag has already been consumed.
    /// Fails if any bytes are left over.
    pub fn read_body(kind: MessageKind, r: &mut PacketReader<'_>) -> Result<Message, CodecError> {
        if !kind.is_handshake() && kind.since() > r.version() {
            return Err(CodecError::Unsupported {
                kind,
                version: r.version(),
            });
        }
        let msg = match kind {
            MessageKind::JoinRequest => Message::JoinRequest {
                version: r.read_u32()?,
                password: r.read_string()?,
                player_name: r.read_string()?,
                character_name: r.read_string()?,
            },
            MessageKind::JoinReject => Message::JoinReject { reason: r.read()? },
            MessageKind::JoinAccepted => Message::JoinAccepted {
                version: r.read_u32()?,
            },
            MessageKind::Roster => Message::Roster {
                players: r.read_seq()?,
                you: r.read_i32()?,
            },
            MessageKind::Chat => Message::Chat {
                from: r.read_string()?,
                text: r.read_string()?,
            },
            MessageKind::Announcement => Message::Announcement {
                text: r.read_string()?,
            },
            MessageKind::ElementAdded => Message::ElementAdded { element: r.read()? },
            MessageKind::ElementsRemoved => Message::ElementsRemoved { ids: r.read_seq()? },
            MessageKind::ElementMoved => Message::ElementMoved {
                id: r.read()?,
                position: r.read()?,
            },
            MessageKind::ElementRotated => Message::ElementRotated {
                id: r.read()?,
                angle: r.read_f64()?,
            },
            MessageKind::ElementFlipped => Message::ElementFlipped {
                id: r.read()?,
                flip_h: r.read_bool()?,
                flip_v: r.read_bool()?,
            },
            MessageKind::ElementResized => Message::ElementResized {
                id: r.read()?,
                face_size: r.read_f64()?,
            },
            MessageKind::ElementRetyped => Message::ElementRetyped {
                id: r.read()?,
                type_name: r.read_string()?,
            },
            MessageKind::ElementRenamed => Message::ElementRenamed {
                id: r.read()?,
                name: r.read_string()?,
            },
            MessageKind::ElementLayerChanged => Message::ElementLayerChanged {
                id: r.read()?,
                layer: r.read()?,
            },
            MessageKind::AttributesSet => Message::AttributesSet {
                id: r.read()?,
                attributes: r.read_seq()?,
            },
            MessageKind::AttributesRemoved => Message::AttributesRemoved {
                id: r.read()?,
                keys: r.read_seq()?,
            },
            MessageKind::LinesAdded => Message::LinesAdded {
                lines: r.read_seq()?,
            },
            MessageKind::LinesCleared => Message::LinesCleared,
            MessageKind::LinesErased => Message::LinesErased {
                rect: r.read()?,
                color: r.read()?,
            },
            MessageKind::GridMode => Message::GridMode { mode: r.read()? },
            MessageKind::Background => Message::Background {
                background: r.read()?,
            },
            MessageKind::Lock => Message::Lock {
                ids: r.read_seq()?,
                locked: r.read_bool()?,
            },
            MessageKind::LockAll => Message::LockAll {
                locked: r.read_bool()?,
            },
            MessageKind::GroupAdd => Message::GroupAdd {
                group: r.read_string()?,
                ids: r.read_seq()?,
            },
            MessageKind::GroupRemove => Message::GroupRemove { ids: r.read_seq()? },
            MessageKind::GroupDelete => Message::GroupDelete {
                group: r.read_string()?,
            },
            MessageKind::GroupRename => Message::GroupRename {
                from: r.read_string()?,
                to: r.read_string()?,
            },
            MessageKind::MapReset => Message::MapReset,
            MessageKind::PointerMoved => Message::PointerMoved {
                player: r.read()?,
                position: r.read()?,
                pointing: r.read_bool()?,
            },
            MessageKind::PlayerRenamed => Message::PlayerRenamed {
                player: r.read()?,
                character_name: r.read_string()?,
            },
            MessageKind::LoginComplete => Message::LoginComplete,
            MessageKind::Ping => Message::Ping,
        };
        r.expect_end(kind)?;
        Ok(msg)
    }

    fn write_body(&self, w: &mut PacketWriter) {
        match self {
            Message::JoinRequest {
                version,
                password,
                player_name,
                character_name,
            } => {
                w.write_u32(*version);
                w.write_str(password);
                w.write_str(player_name);
                w.write_str(character_name);
            }
            Message::JoinReject { reason } => w.write(reason),
            Message::JoinAccepted { version } => w.write_u32(*version),
            Message::Roster { players, you } => {
                w.write_seq(players);
                w.write_i32(*you);
            }
            Message::Chat { from, text } => {
                w.write_str(from);
                w.write_str(text);
            }
            Message::Announcement { text } => w.write_str(text),
            Message::ElementAdded { element } => w.write(element),
            Message::ElementsRemoved { ids } => w.write_seq(ids),
            Message::ElementMoved { id, position } => {
                w.write(id);
                w.write(position);
            }
            Message::ElementRotated { id, angle } => {
                w.write(id);
                w.write_f64(*angle);
            }
            Message::ElementFlipped { id, flip_h, flip_v } => {
                w.write(id);
                w.write_bool(*flip_h);
                w.write_bool(*flip_v);
            }
            Message::ElementResized { id, face_size } => {
                w.write(id);
                w.write_f64(*face_size);
            }
            Message::ElementRetyped { id, type_name } => {
                w.write(id);
                w.write_str(type_name);
            }
            Message::ElementRenamed { id, name } => {
                w.write(id);
                w.write_str(name);
            }
            Message::ElementLayerChanged { id, layer } => {
                w.write(id);
                w.write(layer);
            }
            Message::AttributesSet { id, attributes } => {
                w.write(id);
                w.write_seq(attributes);
            }
            Message::AttributesRemoved { id, keys } => {
                w.write(id);
                w.write_seq(keys);
            }
            Message::LinesAdded { lines } => w.write_seq(lines),
            Message::LinesCleared => {}
            Message::LinesErased { rect, color } => {
                w.write(rect);
                w.write(color);
            }
            Message::GridMode { mode } => w.write(mode),
            Message::Background { background } => w.write(background),
            Message::Lock { ids, locked } => {
                w.write_seq(ids);
                w.write_bool(*locked);
            }
            Message::LockAll { locked } => w.write_bool(*locked),
            Message::GroupAdd { group, ids } => {
                w.write_str(group);
                w.write_seq(ids);
            }
            Message::GroupRemove { ids } => w.write_seq(ids),
            Message::GroupDelete { group } => w.write_str(group),
            Message::GroupRename { from, to } => {
                w.write_str(from);
                w.write_str(to);
            }
            Message::MapReset => {}
            Message::PointerMoved {
                player,
                position,
                pointing,
            } => {
                w.write(player);
                w.write(position);
                w.write_bool(*pointing);
            }
            Message::PlayerRenamed {
                player,
                character_name,
            } => {
                w.write(player);
                w.write_str(character_name);
            }
            Message::LoginComplete => {}
            Message::Ping => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_dense_and_stable() {
        for (i, kind) in MessageKind::ALL.iter().enumerate() {
            assert_eq!(kind.tag() as usize, i + 1, "{kind:?} out of order");
            assert_eq!(MessageKind::from_tag(kind.tag()), Some(*kind));
        }
        assert_eq!(MessageKind::from_tag(0), None);
        assert_eq!(MessageKind::from_tag(34), None);
        assert_eq!(MessageKind::from_tag(u32::MAX), None);
    }

    #[test]
    fn unknown_tag_is_decode_error() {
        let bytes = 999u32.to_be_bytes();
        assert_eq!(
            Message::decode(&bytes, PROTOCOL_VERSION),
            Err(CodecError::UnknownTag { tag: 999 })
        );
    }

    #[test]
    fn v2_only_kinds_refuse_v1() {
        let msg = Message::ElementFlipped {
            id: ElementId(1),
            flip_h: true,
            flip_v: false,
        };
        assert_eq!(
            msg.encode(1),
            Err(CodecError::Unsupported {
                kind: MessageKind::ElementFlipped,
                version: 1
            })
        );
        let bytes = msg.encode(2).unwrap();
        assert!(matches!(
            Message::decode(&bytes, 1),
            Err(CodecError::Unsupported { .. })
        ));
        assert_eq!(Message::decode(&bytes, 2).unwrap(), msg);
    }

    #[test]
    fn handshake_layout_is_version_independent() {
        let msg = Message::JoinRequest {
            version: 7,
            password: "pw".into(),
            player_name: "ann".into(),
            character_name: "Thorin".into(),
        };
        assert_eq!(msg.encode(1).unwrap(), msg.encode(2).unwrap());
    }

    #[test]
    fn trailing_garbage_rejected() {
        let mut bytes = Message::Ping.encode(PROTOCOL_VERSION).unwrap();
        bytes.push(0);
        assert!(matches!(
            Message::decode(&bytes, PROTOCOL_VERSION),
            Err(CodecError::TrailingBytes {
                kind: MessageKind::Ping,
                count: 1
            })
        ));
    }

    #[test]
    fn relay_classification() {
        assert!(MessageKind::ElementMoved.is_relayed());
        assert!(MessageKind::Chat.is_relayed());
        assert!(MessageKind::PointerMoved.is_relayed());
        assert!(!MessageKind::Roster.is_relayed());
        assert!(!MessageKind::LoginComplete.is_relayed());
        assert!(!MessageKind::JoinRequest.is_relayed());
    }

    #[test]
    fn supported_versions() {
        assert!(is_supported_version(1));
        assert!(is_supported_version(PROTOCOL_VERSION));
        assert!(!is_supported_version(0));
        assert!(!is_supported_version(PROTOCOL_VERSION + 1));
    }
}
