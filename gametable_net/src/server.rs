// Hosting: bind the listener and start the node.
//
// `start_host` binds synchronously so bind errors (port in use, bad address)
// come back to the caller, then spawns two threads: the listener, which
// accepts connections and hands them to the node loop, and the node loop
// itself (`node::run_node`). The listener is non-blocking and polls
// `keep_running` between accepts so `NodeHandle::stop` can end it.
//
// Incoming connections are not handshaken here. The node opens them with
// the newest protocol version and waits for a `JoinRequest` like any other
// packet; `NetConfig::handshake_timeout_ms` closes connections that never
// send one.

use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

use gametable_state::{GameTable, Player};

use crate::config::HostConfig;
use crate::dispatch::Registry;
use crate::error::NetError;
use crate::node::{InternalEvent, Node, NodeEvent, NodeHandle, run_node};
use crate::session::Session;

/// How long the listener sleeps when no connection is pending.
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Start hosting a session. Returns once the listener is bound; use
/// `NodeHandle::local_addr` for the actual port when `config.port` is 0.
pub fn start_host(config: HostConfig) -> Result<NodeHandle, NetError> {
    let listener = TcpListener::bind((config.bind_address.as_str(), config.port))?;
    let addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    let (event_tx, event_rx) = mpsc::channel();
    let mut table = GameTable::new(Player::new(&config.player_name, &config.character_name));
    table.begin_hosting();
    let session = Session::host(&config, event_tx);
    session.emit(NodeEvent::HostingStarted { addr });
    log::info!("hosting on {addr}");

    let keep_running = Arc::new(AtomicBool::new(true));
    let (tx, rx) = mpsc::channel();

    spawn_listener(listener, tx.clone(), keep_running.clone());

    let node = Node::new(table, session);
    let loop_tx = tx.clone();
    let loop_running = keep_running.clone();
    let thread = thread::spawn(move || {
        run_node(node, Registry::standard(), rx, loop_tx, loop_running);
    });

    Ok(NodeHandle::new(tx, event_rx, keep_running, thread, Some(addr)))
}

fn spawn_listener(listener: TcpListener, tx: Sender<InternalEvent>, keep_running: Arc<AtomicBool>) {
    thread::spawn(move || {
        while keep_running.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    log::debug!("incoming connection from {peer}");
                    stream.set_nonblocking(false).ok();
                    if tx.send(InternalEvent::NewConnection { stream }).is_err() {
                        break;
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e) => {
                    log::error!("listener failed: {e}");
                    break;
                }
            }
        }
    });
}
