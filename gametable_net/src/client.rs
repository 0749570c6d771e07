// Joining: connect to a host and start the node.
//
// `join` connects on the calling thread (so a refused or unreachable host is
// reported directly), puts the table into the joining state, sends the
// `JoinRequest`, and starts the node loop. Everything after that arrives as
// ordinary packets through the dispatcher: `JoinAccepted` or `JoinReject`,
// then the roster and the host's state dump, then `LoginComplete`. The
// caller follows progress through `NodeHandle::events`.
//
// The connection is opened at the version the joiner requests. If the host
// negotiates down, the session switches the connection to the lower version
// when `JoinAccepted` arrives.

use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::thread;

use gametable_protocol::Message;
use gametable_state::{GameTable, Player};

use crate::config::JoinConfig;
use crate::dispatch::Registry;
use crate::error::NetError;
use crate::node::{Node, NodeHandle, run_node};
use crate::session::Session;

/// Connect to a host and ask to join. Returns as soon as the request is
/// sent; `NodeEvent::LoginComplete` or `NodeEvent::Rejected` follows.
pub fn join(config: JoinConfig) -> Result<NodeHandle, NetError> {
    let stream = TcpStream::connect(config.address.as_str())?;
    log::info!("connected to {}, requesting protocol v{}", config.address, config.version);

    let (event_tx, event_rx) = mpsc::channel();
    let mut table = GameTable::new(Player::new(&config.player_name, &config.character_name));
    table.begin_joining();
    let mut session = Session::joiner(&config, event_tx);

    let (tx, rx) = mpsc::channel();
    let host = session.open_connection(stream, config.version, &tx)?;
    session.send_to(
        host,
        &Message::JoinRequest {
            version: config.version,
            password: config.password.clone(),
            player_name: config.player_name.clone(),
            character_name: config.character_name.clone(),
        },
    );

    let keep_running = Arc::new(AtomicBool::new(true));
    let node = Node::new(table, session);
    let loop_tx = tx.clone();
    let loop_running = keep_running.clone();
    let thread = thread::spawn(move || {
        run_node(node, Registry::standard(), rx, loop_tx, loop_running);
    });

    Ok(NodeHandle::new(tx, event_rx, keep_running, thread, None))
}
