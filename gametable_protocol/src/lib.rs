// gametable_protocol — wire protocol for GameTable map replication.
//
// This crate defines the identifiers, value types, binary codec, message
// catalog and stream framing shared by every participant of a session, host
// and joiners alike. It has no networking or state of its own: the state
// crate (`gametable_state`) builds outbound `Message`s from mutations, and
// the net crate (`gametable_net`) frames them onto TCP and dispatches
// inbound ones.
//
// Module overview:
// - `types.rs`:    IDs (`ElementId`, `PlayerId`, `ConnectionId`), geometry,
//                  enums, and the `*Data` payload structs.
// - `codec.rs`:    `PacketWriter` / `PacketReader`: a 4-byte type tag, then
//                  strictly-typed big-endian fields. `CodecError`.
// - `wire.rs`:     Binary layouts for the value types (version-aware for
//                  element payloads).
// - `message.rs`:  `MessageKind` tags, the `Message` enum, schema versions.
// - `framing.rs`:  4-byte length-prefixed frames over `Read`/`Write`.
//
// Design decisions:
// - **Hand-laid binary fields, not serde.** The type tag must lead every
//   packet so a dispatcher can route before decoding, and layouts must be
//   pinned per schema version. serde derives are kept on the value types for
//   snapshot files only.
// - **Strict per-version decoding.** No optional trailing fields. The join
//   handshake negotiates a version and both ends stick to it.

pub mod codec;
pub mod framing;
pub mod message;
pub mod types;
pub mod wire;

pub use codec::{CodecError, PacketReader, PacketWriter, WireValue};
pub use framing::{MAX_MESSAGE_SIZE, read_frame, write_frame};
pub use message::{
    MIN_PROTOCOL_VERSION, Message, MessageKind, PROTOCOL_VERSION, is_supported_version,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use proptest::prelude::*;

    use super::*;

    /// Encode, frame, read the frame back, decode.
    fn through_the_wire(msg: &Message, version: u32) -> Message {
        let packet = msg.encode(version).unwrap();
        let mut wire = Vec::new();
        write_frame(&mut wire, &packet).unwrap();

        let mut cursor = Cursor::new(&wire);
        let recovered = read_frame(&mut cursor, MAX_MESSAGE_SIZE).unwrap();
        Message::decode(&recovered, version).unwrap()
    }

    #[test]
    fn roster_survives_the_wire() {
        let msg = Message::Roster {
            players: vec![
                PlayerData {
                    player_name: "hana".into(),
                    character_name: "Host".into(),
                    id: PlayerId::HOST,
                    host: true,
                },
                PlayerData {
                    player_name: "cole".into(),
                    character_name: "Rogue".into(),
                    id: PlayerId(1),
                    host: false,
                },
            ],
            you: 1,
        };
        assert_eq!(through_the_wire(&msg, PROTOCOL_VERSION), msg);
    }

    #[test]
    fn element_added_survives_both_versions() {
        let element = ElementData {
            id: ElementId(4096),
            type_name: "dragon".into(),
            position: Point::new(120, -8),
            layer: Layer::Pog,
            name: "Smaug".into(),
            angle: 0.0,
            flip_h: false,
            flip_v: false,
            face_size: 3.0,
            attributes: Vec::new(),
        };
        let msg = Message::ElementAdded { element };
        assert_eq!(through_the_wire(&msg, 1), msg);
        assert_eq!(through_the_wire(&msg, 2), msg);
    }

    #[test]
    fn lines_erased_with_and_without_color() {
        for color in [None, Some(Color::RED)] {
            let msg = Message::LinesErased {
                rect: Rect::new(0, 0, 50, 50),
                color,
            };
            assert_eq!(through_the_wire(&msg, PROTOCOL_VERSION), msg);
        }
    }

    proptest! {
        // Arbitrary bytes must never panic the decoder, whatever the version.
        #[test]
        fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256),
                               version in 1u32..=2) {
            let _ = Message::decode(&bytes, version);
        }

        // A valid tag followed by junk is either a clean decode or an error.
        #[test]
        fn junk_body_is_contained(tag in 1u32..=33,
                                  body in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut bytes = tag.to_be_bytes().to_vec();
            bytes.extend_from_slice(&body);
            let _ = Message::decode(&bytes, PROTOCOL_VERSION);
        }
    }
}
