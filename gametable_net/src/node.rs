// The node: one participant's state plus its event loop.
//
// Architecture: thread-per-reader with a central `mpsc` channel, host and
// joiner alike.
//
// - **Listener thread** (host only, `server.rs`): accepts TCP connections
//   and sends `InternalEvent::NewConnection`.
// - **Reader threads** (one per connection, `connection.rs`): read frames
//   and send `InternalEvent::Packet`, then `InternalEvent::Disconnected`
//   once the stream ends.
// - **Local closures** (`NodeHandle::submit` / `with_table`): UI-side
//   mutations, sent as `InternalEvent::Local`.
// - **Node thread** (`run_node`): owns the `Node` (table + session) and
//   handles events one at a time. It is the only thread that mutates state
//   and the only writer to sockets, so a network packet and a local edit can
//   never interleave. After every event it drains the table's outbox. The
//   `recv_timeout` doubles as the ping timer.
//
// Shutdown: `NodeHandle::stop` clears `keep_running`; the loop notices
// within one poll interval, closes every connection and exits.

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use gametable_protocol::{ConnectionId, Message, PROTOCOL_VERSION, PlayerId, RejectReason};
use gametable_state::GameTable;

use crate::dispatch::Registry;
use crate::error::NetError;
use crate::session::Session;

/// Upper bound on how long the loop sleeps before re-checking
/// `keep_running`.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Session-level notifications for the host application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeEvent {
    /// Host is listening.
    HostingStarted { addr: SocketAddr },
    /// Joiner received the full state dump.
    LoginComplete,
    /// Joiner was turned away by the host.
    Rejected(RejectReason),
    /// Joiner lost its host.
    ConnectionLost,
    /// Host: a connection went away before finishing the handshake.
    SomeoneRejected,
    PlayerJoined { id: PlayerId, name: String },
    PlayerLeft { id: PlayerId, name: String },
    Chat { from: String, text: String },
    Announcement { text: String },
}

/// Events funneled into the node thread.
pub(crate) enum InternalEvent {
    NewConnection {
        stream: TcpStream,
    },
    Packet {
        connection: ConnectionId,
        bytes: Vec<u8>,
    },
    Disconnected {
        connection: ConnectionId,
    },
    Local(Box<dyn FnOnce(&mut Node) + Send>),
}

/// Everything the node thread owns.
pub struct Node {
    pub table: GameTable,
    pub session: Session,
}

impl Node {
    pub fn new(table: GameTable, session: Session) -> Self {
        Self { table, session }
    }

    /// Send a chat line from the local player and show it locally.
    pub fn send_chat(&mut self, text: &str) {
        let from = self.table.local_player().character_name.clone();
        self.session.broadcast(&Message::Chat {
            from: from.clone(),
            text: text.to_string(),
        });
        self.session.emit(NodeEvent::Chat {
            from,
            text: text.to_string(),
        });
    }

    /// Send whatever the last step queued for broadcast.
    pub(crate) fn flush(&mut self) {
        self.session.flush_outbox(&mut self.table);
    }
}

/// Control handle for a running node.
pub struct NodeHandle {
    tx: Sender<InternalEvent>,
    events: Receiver<NodeEvent>,
    keep_running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl NodeHandle {
    pub(crate) fn new(
        tx: Sender<InternalEvent>,
        events: Receiver<NodeEvent>,
        keep_running: Arc<AtomicBool>,
        thread: JoinHandle<()>,
        local_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            tx,
            events,
            keep_running,
            thread: Some(thread),
            local_addr,
        }
    }

    /// Run `f` against the table on the node thread. Mutations made with a
    /// `None` tag replicate like any other local edit.
    pub fn submit(&self, f: impl FnOnce(&mut GameTable) + Send + 'static) -> Result<(), NetError> {
        self.tx
            .send(InternalEvent::Local(Box::new(move |node: &mut Node| {
                f(&mut node.table)
            })))
            .map_err(|_| NetError::NodeStopped)
    }

    /// Like `submit`, but waits for `f` to run and returns its result.
    pub fn with_table<R: Send + 'static>(
        &self,
        f: impl FnOnce(&mut GameTable) -> R + Send + 'static,
    ) -> Result<R, NetError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(InternalEvent::Local(Box::new(move |node: &mut Node| {
                let _ = reply_tx.send(f(&mut node.table));
            })))
            .map_err(|_| NetError::NodeStopped)?;
        reply_rx.recv().map_err(|_| NetError::NodeStopped)
    }

    /// Send a chat line as the local player.
    pub fn send_chat(&self, text: impl Into<String>) -> Result<(), NetError> {
        let text = text.into();
        self.tx
            .send(InternalEvent::Local(Box::new(move |node: &mut Node| {
                node.send_chat(&text)
            })))
            .map_err(|_| NetError::NodeStopped)
    }

    /// Session notifications, in the order they happened.
    pub fn events(&self) -> &Receiver<NodeEvent> {
        &self.events
    }

    /// Listening address (host only).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Signal the node to stop and wait for its thread to exit. Peers see
    /// the connections drop.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
    }
}

/// Main node loop. Runs until `keep_running` is cleared.
pub(crate) fn run_node(
    mut node: Node,
    registry: Registry<Node>,
    rx: Receiver<InternalEvent>,
    tx: Sender<InternalEvent>,
    keep_running: Arc<AtomicBool>,
) {
    let ping_interval = Duration::from_millis(node.session.config().ping_interval_ms.max(1));
    let mut last_ping = Instant::now();

    while keep_running.load(Ordering::SeqCst) {
        let wait = ping_interval
            .saturating_sub(last_ping.elapsed())
            .min(POLL_INTERVAL);
        match rx.recv_timeout(wait) {
            Ok(event) => {
                handle_event(&mut node, &registry, event, &tx);
                // Drain any additional events that arrived during handling.
                while let Ok(event) = rx.try_recv() {
                    handle_event(&mut node, &registry, event, &tx);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        if last_ping.elapsed() >= ping_interval {
            node.session.ping();
            last_ping = Instant::now();
        }
        node.session.expire_handshakes();
    }

    node.session.close_all();
    log::info!("node stopped");
}

fn handle_event(
    node: &mut Node,
    registry: &Registry<Node>,
    event: InternalEvent,
    tx: &Sender<InternalEvent>,
) {
    match event {
        InternalEvent::NewConnection { stream } => {
            if let Err(e) = node.session.open_connection(stream, PROTOCOL_VERSION, tx) {
                log::warn!("could not set up incoming connection: {e}");
            }
        }
        InternalEvent::Packet { connection, bytes } => {
            handle_packet(node, registry, connection, &bytes);
        }
        InternalEvent::Disconnected { connection } => {
            node.session.disconnected(&mut node.table, connection);
        }
        InternalEvent::Local(f) => f(node),
    }
    node.flush();
}

/// Dispatch one inbound packet and apply the fault policy to the result.
fn handle_packet(node: &mut Node, registry: &Registry<Node>, connection: ConnectionId, bytes: &[u8]) {
    let Some(c) = node.session.connection(connection) else {
        return;
    };
    if c.is_closing() {
        return;
    }
    let (player, version) = (c.player(), c.version());

    node.session.set_processing_packet(true);
    let result = registry.dispatch(node, connection, player, bytes, version);
    node.session.set_processing_packet(false);

    match result {
        Ok(kind) => log::trace!("{connection}: handled {kind:?}"),
        Err(e) if e.is_fatal() => {
            log::error!("{connection}: {e}; closing");
            node.session.close(connection);
        }
        Err(e) if e.is_protocol_fault() => {
            log::warn!("{connection}: dropped packet: {e}");
            if node.session.record_fault(connection) {
                log::error!("{connection}: too many protocol faults; closing");
                node.session.close(connection);
            }
        }
        Err(e) => log::warn!("{connection}: message not applied: {e}"),
    }
}
