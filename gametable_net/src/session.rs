// Session state: connections, authority, roster pushes, relay.
//
// `Session` is the part of a node that knows about peers. It owns the
// `Connection`s, decides who may join, pushes the roster, sends the join
// dump, forwards in-session traffic between peers (host only), and turns
// drops into roster changes and `NodeEvent`s. It never applies map changes
// itself; those go through `GameTable` mutators from `handlers.rs`.
//
// Roles:
// - **Host.** Accepts connections, checks version, password and capacity,
//   assigns player IDs (host 0, joiners 1, 2, ... never reused), and is the
//   hub every message passes through.
// - **Joiner.** Exactly one connection, to the host. Everything it sends goes
//   there; everything it receives comes from there.
//
// Join sequence on the host, in order: `JoinAccepted` with the negotiated
// version, "X has joined" to the players already present, roster append,
// `Roster` to every logged-in connection (each with its own "you" index),
// then the public map stream (`GameTable::state_messages`) and
// `LoginComplete` to the joiner.
//
// Writes: `send_to` / `broadcast` encode per connection, so each peer gets
// its own negotiated version. A message kind the peer's version lacks is
// skipped for that peer. Write errors are logged and otherwise ignored; the
// reader thread notices the dead socket and reports the disconnect.
//
// `processing_packet` is set by the node loop for the duration of one
// dispatch. Only traffic handled under it is ever relayed, so local edits
// (which reach peers through the outbox) cannot be forwarded twice.

use std::collections::BTreeMap;
use std::net::TcpStream;
use std::sync::mpsc::Sender;
use std::time::Duration;

use gametable_protocol::{
    CodecError, ConnectionId, Message, PROTOCOL_VERSION, PlayerId, RejectReason,
    is_supported_version,
};
use gametable_state::{GameTable, MapVisibility, NetworkEvent, Player};

use crate::config::{HostConfig, JoinConfig, NetConfig};
use crate::connection::{Connection, spawn_reader};
use crate::error::NetError;
use crate::node::{InternalEvent, NodeEvent};

/// Fields of an inbound `JoinRequest`.
#[derive(Clone, Debug)]
pub struct JoinRequest {
    pub version: u32,
    pub password: String,
    pub player_name: String,
    pub character_name: String,
}

enum Role {
    Host {
        password: Option<String>,
        max_players: usize,
        next_player: i32,
    },
    Joiner {
        rejected: bool,
    },
}

pub struct Session {
    role: Role,
    config: NetConfig,
    connections: BTreeMap<ConnectionId, Connection>,
    next_connection: u32,
    processing_packet: bool,
    events: Sender<NodeEvent>,
}

impl Session {
    pub fn host(config: &HostConfig, events: Sender<NodeEvent>) -> Self {
        Self::new(
            Role::Host {
                password: config.password.clone(),
                max_players: config.max_players,
                next_player: 1,
            },
            config.net.clone(),
            events,
        )
    }

    pub fn joiner(config: &JoinConfig, events: Sender<NodeEvent>) -> Self {
        Self::new(Role::Joiner { rejected: false }, config.net.clone(), events)
    }

    fn new(role: Role, config: NetConfig, events: Sender<NodeEvent>) -> Self {
        Self {
            role,
            config,
            connections: BTreeMap::new(),
            next_connection: 1,
            processing_packet: false,
            events,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self.role, Role::Host { .. })
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    pub fn processing_packet(&self) -> bool {
        self.processing_packet
    }

    pub(crate) fn set_processing_packet(&mut self, processing: bool) {
        self.processing_packet = processing;
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn is_logged_in(&self, id: ConnectionId) -> bool {
        self.connections
            .get(&id)
            .is_some_and(|c| c.logged_in && !c.is_closing())
    }

    pub(crate) fn emit(&self, event: NodeEvent) {
        // The handle may already be gone during shutdown.
        let _ = self.events.send(event);
    }

    // -- connections --------------------------------------------------------

    /// Register a freshly connected stream and start its reader thread.
    pub(crate) fn open_connection(
        &mut self,
        stream: TcpStream,
        version: u32,
        tx: &Sender<InternalEvent>,
    ) -> Result<ConnectionId, NetError> {
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        stream.set_nodelay(true).ok();
        let read_half = stream.try_clone()?;
        let connection = Connection::new(id, stream, version);
        log::debug!("{id}: opened (peer {:?})", connection.peer());
        self.connections.insert(id, connection);
        spawn_reader(id, read_half, self.config.max_message_size, tx.clone());
        Ok(id)
    }

    pub(crate) fn close(&mut self, id: ConnectionId) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.close();
        }
    }

    pub(crate) fn close_all(&mut self) {
        for connection in self.connections.values_mut() {
            connection.close();
        }
    }

    /// Count a protocol fault. Returns `true` if the connection is now over
    /// its budget.
    pub(crate) fn record_fault(&mut self, id: ConnectionId) -> bool {
        let limit = self.config.max_protocol_faults;
        match self.connections.get_mut(&id) {
            Some(connection) => {
                connection.faults += 1;
                connection.faults > limit
            }
            None => false,
        }
    }

    /// Close connections that have not finished the handshake in time.
    pub(crate) fn expire_handshakes(&mut self) {
        let timeout = Duration::from_millis(self.config.handshake_timeout_ms);
        for connection in self.connections.values_mut() {
            if !connection.logged_in && !connection.is_closing() && connection.opened().elapsed() > timeout {
                log::warn!("{}: handshake timed out", connection.id());
                connection.close();
            }
        }
    }

    // -- writing ------------------------------------------------------------

    /// Send one message to one connection.
    pub(crate) fn send_to(&mut self, id: ConnectionId, message: &Message) {
        let Some(connection) = self.connections.get_mut(&id) else {
            return;
        };
        if connection.is_closing() {
            return;
        }
        match connection.send(message) {
            Ok(()) => {}
            Err(NetError::Codec(CodecError::Unsupported { kind, version })) => {
                log::debug!("{id}: skipping {kind:?}, not in protocol v{version}");
            }
            Err(e) => log::warn!("{id}: write of {:?} failed: {e}", message.kind()),
        }
    }

    /// Send to every logged-in connection except `except`.
    pub(crate) fn broadcast_except(&mut self, message: &Message, except: Option<ConnectionId>) {
        let targets: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.logged_in && Some(c.id()) != except)
            .map(Connection::id)
            .collect();
        for id in targets {
            self.send_to(id, message);
        }
    }

    pub(crate) fn broadcast(&mut self, message: &Message) {
        self.broadcast_except(message, None);
    }

    /// Send whatever the table queued. On a joiner the only logged-in
    /// connection is the host, so this is "send to host".
    pub(crate) fn flush_outbox(&mut self, table: &mut GameTable) {
        for message in table.take_outbox() {
            self.broadcast(&message);
        }
    }

    /// Host only: forward a message that just arrived on
    /// `event.connection` to every other logged-in peer.
    pub(crate) fn relay(&mut self, message: &Message, event: &NetworkEvent) {
        if !self.processing_packet || !self.is_host() || !message.kind().is_relayed() {
            return;
        }
        self.broadcast_except(message, Some(event.connection));
    }

    pub(crate) fn ping(&mut self) {
        self.broadcast(&Message::Ping);
    }

    // -- host side ----------------------------------------------------------

    /// Handle a join request on the host. Rejections send `JoinReject` and
    /// close the connection; they are not errors.
    pub(crate) fn accept_join(
        &mut self,
        table: &mut GameTable,
        connection: ConnectionId,
        request: JoinRequest,
    ) {
        let Role::Host {
            password,
            max_players,
            next_player,
        } = &mut self.role
        else {
            return;
        };

        let reject = if !is_supported_version(request.version) {
            Some(RejectReason::VersionMismatch)
        } else if password.as_deref().is_some_and(|p| p != request.password) {
            Some(RejectReason::WrongPassword)
        } else if table.roster().len() >= *max_players {
            Some(RejectReason::SessionFull)
        } else {
            None
        };
        if let Some(reason) = reject {
            log::info!(
                "{connection}: rejecting join from {:?} (v{}): {reason}",
                request.player_name,
                request.version
            );
            self.send_to(connection, &Message::JoinReject { reason });
            self.close(connection);
            return;
        }

        let id = PlayerId(*next_player);
        *next_player += 1;
        let version = request.version.min(PROTOCOL_VERSION);

        // JoinAccepted goes out under the requested version; its layout is
        // the same in every version anyway.
        self.send_to(connection, &Message::JoinAccepted { version });
        if let Some(c) = self.connections.get_mut(&connection) {
            c.version = version;
            c.player = Some(id);
            c.logged_in = true;
        }
        log::info!(
            "{connection}: {:?} joined as {id} (protocol v{version})",
            request.player_name
        );

        self.broadcast_except(
            &Message::Announcement {
                text: format!("{} has joined", request.player_name),
            },
            Some(connection),
        );

        table.add_player(Player {
            player_name: request.player_name.clone(),
            character_name: request.character_name,
            id,
            host: false,
            pointer: Default::default(),
            pointing: false,
            connection: Some(connection),
        });
        self.push_roster(table);

        for message in table.state_messages(MapVisibility::Public) {
            self.send_to(connection, &message);
        }
        self.send_to(connection, &Message::LoginComplete);

        self.emit(NodeEvent::PlayerJoined {
            id,
            name: request.player_name,
        });
    }

    /// Send the roster to every logged-in connection, each with its own
    /// index in the list.
    pub(crate) fn push_roster(&mut self, table: &GameTable) {
        let players = table.roster().to_data();
        let targets: Vec<(ConnectionId, PlayerId)> = self
            .connections
            .values()
            .filter(|c| c.logged_in)
            .filter_map(|c| c.player.map(|p| (c.id(), p)))
            .collect();
        for (connection, player) in targets {
            let Some(you) = table.roster().index_of(player) else {
                continue;
            };
            let message = Message::Roster {
                players: players.clone(),
                you: you as i32,
            };
            self.send_to(connection, &message);
        }
    }

    // -- joiner side --------------------------------------------------------

    /// The host said no. The connection is closed and the drop that follows
    /// is not reported as a lost connection.
    pub(crate) fn rejected(&mut self, table: &mut GameTable, connection: ConnectionId, reason: RejectReason) {
        if let Role::Joiner { rejected } = &mut self.role {
            *rejected = true;
        }
        log::warn!("join rejected: {reason}");
        table.disconnect();
        self.emit(NodeEvent::Rejected(reason));
        self.close(connection);
    }

    /// The host accepted. From here on the connection speaks `version`.
    pub(crate) fn accepted(&mut self, table: &mut GameTable, connection: ConnectionId, version: u32) {
        let Some(c) = self.connections.get_mut(&connection) else {
            return;
        };
        c.version = version;
        c.player = Some(PlayerId::HOST);
        c.logged_in = true;
        table.join_accepted();
        log::info!("{connection}: join accepted, protocol v{version}");
    }

    /// Whether this joiner is still waiting for `JoinAccepted` on
    /// `connection`.
    pub(crate) fn awaiting_acceptance(&self, connection: ConnectionId) -> bool {
        !self.is_host()
            && self
                .connections
                .get(&connection)
                .is_some_and(|c| !c.logged_in)
    }

    /// The version this joiner asked for on `connection`.
    pub(crate) fn requested_version(&self, connection: ConnectionId) -> Option<u32> {
        self.connections.get(&connection).map(Connection::version)
    }

    // -- drops --------------------------------------------------------------

    /// A connection's reader thread reported EOF or an error.
    pub(crate) fn disconnected(&mut self, table: &mut GameTable, id: ConnectionId) {
        let Some(connection) = self.connections.remove(&id) else {
            return;
        };
        match self.role {
            Role::Host { .. } => match connection.player.filter(|_| connection.logged_in) {
                Some(player) => {
                    let name = table
                        .remove_player(player)
                        .map(|p| p.player_name)
                        .unwrap_or_default();
                    log::info!("{id}: {name:?} ({player}) left");
                    self.push_roster(table);
                    self.broadcast(&Message::Announcement {
                        text: format!("{name} has left"),
                    });
                    self.emit(NodeEvent::PlayerLeft { id: player, name });
                }
                None => {
                    log::info!("{id}: dropped before logging in");
                    self.emit(NodeEvent::SomeoneRejected);
                }
            },
            Role::Joiner { rejected } => {
                table.disconnect();
                if !rejected {
                    log::warn!("{id}: lost connection to host");
                    self.emit(NodeEvent::ConnectionLost);
                }
            }
        }
    }
}
