// Integration smoke test for hosting.
//
// Starts a host on localhost and talks to it over plain TCP sockets using
// only the protocol crate's framing and codec, so the host's wire behavior
// is checked without a second `GameTable` in the loop: the join sequence,
// a rejected password, shared traffic in both directions, chat attribution,
// and the fault policy for unknown tags, malformed packets and corrupted
// elements.

use std::io::{self, BufReader, BufWriter};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use gametable_net::{HostConfig, NetConfig, NodeEvent, NodeHandle, start_host};
use gametable_protocol::{
    Color, ElementData, ElementId, Layer, LineData, Message, PROTOCOL_VERSION, PlayerId, Point,
    RejectReason, read_frame, write_frame,
};
use gametable_state::{GameTable, MAX_QUARANTINE, MapVisibility};

const TIMEOUT: Duration = Duration::from_secs(5);

struct RawPeer {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl RawPeer {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(TIMEOUT)).unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        Self {
            reader,
            writer: BufWriter::new(stream),
        }
    }

    fn send(&mut self, msg: &Message) {
        let packet = msg.encode(PROTOCOL_VERSION).unwrap();
        write_frame(&mut self.writer, &packet).unwrap();
    }

    fn send_raw(&mut self, packet: &[u8]) {
        write_frame(&mut self.writer, packet).unwrap();
    }

    /// Next message that is not a keepalive.
    fn recv(&mut self) -> Message {
        loop {
            let bytes = read_frame(&mut self.reader, u32::MAX).unwrap();
            let msg = Message::decode(&bytes, PROTOCOL_VERSION).unwrap();
            if msg != Message::Ping {
                return msg;
            }
        }
    }

    /// Send a join request and read through `LoginComplete`.
    fn join(&mut self, name: &str, password: &str) -> Vec<Message> {
        self.send(&Message::JoinRequest {
            version: PROTOCOL_VERSION,
            password: password.into(),
            player_name: name.into(),
            character_name: format!("{name}'s hero"),
        });
        let mut seen = Vec::new();
        loop {
            let msg = self.recv();
            let done = msg == Message::LoginComplete;
            seen.push(msg);
            if done {
                return seen;
            }
        }
    }

    /// Read until the host closes the socket. Fails on timeout.
    fn expect_closed(&mut self) {
        loop {
            match read_frame(&mut self.reader, u32::MAX) {
                Ok(_) => continue,
                Err(e) => {
                    assert!(
                        matches!(
                            e.kind(),
                            io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset
                        ),
                        "expected the host to close, got {e}"
                    );
                    return;
                }
            }
        }
    }
}

fn host(password: Option<&str>) -> (NodeHandle, SocketAddr) {
    let _ = env_logger::builder().is_test(true).try_init();
    let handle = start_host(HostConfig {
        port: 0,
        password: password.map(String::from),
        ..HostConfig::default()
    })
    .unwrap();
    let addr = handle.local_addr().unwrap();
    (handle, addr)
}

/// Poll the host's table until `check` holds.
fn wait_for(handle: &NodeHandle, check: impl Fn(&GameTable) -> bool + Send + Copy + 'static) {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if handle.with_table(move |t| check(t)).unwrap() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("condition not reached within {TIMEOUT:?}");
}

#[test]
fn join_and_exchange_edits() {
    let (handle, addr) = host(None);
    assert!(matches!(
        handle.events().recv_timeout(TIMEOUT).unwrap(),
        NodeEvent::HostingStarted { .. }
    ));

    let mut peer = RawPeer::connect(addr);
    let dump = peer.join("cole", "");
    assert_eq!(dump[0], Message::JoinAccepted { version: PROTOCOL_VERSION });
    match &dump[1] {
        Message::Roster { players, you } => {
            assert_eq!(players.len(), 2);
            assert_eq!(*you, 1);
            assert_eq!(players[1].player_name, "cole");
            assert_eq!(players[1].id, PlayerId(1));
            assert!(players[0].host);
        }
        other => panic!("expected Roster, got {other:?}"),
    }
    assert_eq!(
        handle.events().recv_timeout(TIMEOUT).unwrap(),
        NodeEvent::PlayerJoined {
            id: PlayerId(1),
            name: "cole".into()
        }
    );

    // Host edit reaches the peer.
    let id = handle
        .with_table(|t| t.place_element(MapVisibility::Public, "goblin", Point::new(3, 4), None))
        .unwrap();
    match peer.recv() {
        Message::ElementAdded { element } => {
            assert_eq!(element.id, id);
            assert_eq!(element.position, Point::new(3, 4));
        }
        other => panic!("expected ElementAdded, got {other:?}"),
    }

    // Peer edit reaches the host.
    peer.send(&Message::ElementMoved {
        id,
        position: Point::new(9, 9),
    });
    wait_for(&handle, move |t| {
        t.map(MapVisibility::Public)
            .element(id)
            .is_some_and(|e| e.position() == Point::new(9, 9))
    });

    handle.stop();
}

#[test]
fn wrong_password_is_rejected_and_closed() {
    let (handle, addr) = host(Some("sesame"));
    let mut peer = RawPeer::connect(addr);
    peer.send(&Message::JoinRequest {
        version: PROTOCOL_VERSION,
        password: "open up".into(),
        player_name: "eve".into(),
        character_name: "Thief".into(),
    });
    assert_eq!(
        peer.recv(),
        Message::JoinReject {
            reason: RejectReason::WrongPassword
        }
    );
    peer.expect_closed();
    assert_eq!(handle.with_table(|t| t.roster().len()).unwrap(), 1);
    handle.stop();
}

#[test]
fn unknown_tag_closes_connection() {
    let (handle, addr) = host(None);
    let mut peer = RawPeer::connect(addr);
    peer.join("cole", "");
    peer.send_raw(&999u32.to_be_bytes());
    peer.expect_closed();
    wait_for(&handle, |t| t.roster().len() == 1);
    handle.stop();
}

#[test]
fn malformed_packet_is_dropped_and_connection_survives() {
    let (handle, addr) = host(None);
    let mut peer = RawPeer::connect(addr);
    peer.join("cole", "");

    let mut truncated = Message::ElementMoved {
        id: ElementId(1),
        position: Point::new(1, 1),
    }
    .encode(PROTOCOL_VERSION)
    .unwrap();
    truncated.truncate(truncated.len() - 3);
    peer.send_raw(&truncated);

    peer.send(&Message::LinesAdded {
        lines: vec![LineData::new(Point::new(0, 0), Point::new(5, 5), Color::RED)],
    });
    wait_for(&handle, |t| t.map(MapVisibility::Public).lines().len() == 1);
    assert_eq!(handle.with_table(|t| t.roster().len()).unwrap(), 2);
    handle.stop();
}

#[test]
fn chat_is_attributed_to_sender() {
    let (handle, addr) = host(None);
    let mut cole = RawPeer::connect(addr);
    cole.join("cole", "");
    let mut dana = RawPeer::connect(addr);
    dana.join("dana", "");

    cole.send(&Message::Chat {
        from: "dana's hero".into(),
        text: "I yield".into(),
    });
    loop {
        if let Message::Chat { from, text } = dana.recv() {
            assert_eq!(from, "cole's hero");
            assert_eq!(text, "I yield");
            break;
        }
    }
    handle.stop();
}

#[test]
fn corrupted_element_flood_closes_connection() {
    let (handle, addr) = host(None);
    let mut peer = RawPeer::connect(addr);
    peer.join("cole", "");

    let budget = u64::from(NetConfig::default().max_protocol_faults);
    for id in 0..=budget {
        peer.send(&Message::ElementAdded {
            element: ElementData {
                id: ElementId(1000 + id),
                type_name: "goblin".into(),
                position: Point::default(),
                layer: Layer::Pog,
                name: "goblin".into(),
                angle: 0.0,
                flip_h: false,
                flip_v: false,
                face_size: 1e6,
                attributes: Vec::new(),
            },
        });
    }
    peer.expect_closed();
    wait_for(&handle, |t| t.roster().len() == 1);
    let quarantined = handle
        .with_table(|t| t.map(MapVisibility::Public).quarantine().len())
        .unwrap();
    assert_eq!(quarantined as u64, budget + 1);
    assert!(quarantined <= MAX_QUARANTINE);
    handle.stop();
}
