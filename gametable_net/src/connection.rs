// One peer connection: write half, handshake state, reader thread.
//
// The node thread owns every `Connection` and is the only writer to its
// socket. Reads happen on a dedicated reader thread per connection
// (`spawn_reader`) that turns frames into `InternalEvent::Packet` and
// reports `InternalEvent::Disconnected` exactly once, on EOF or any read
// error. A frame cut off by the close is simply dropped with the error.
//
// Closing is a socket shutdown. The reader thread then fails its read and
// reports the disconnect, so every close (ours or the peer's) goes through
// the same `Disconnected` path in the node loop. `closing` keeps the node
// from writing to a connection in between.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Instant;

use gametable_protocol::{ConnectionId, Message, PlayerId, read_frame, write_frame};

use crate::error::NetError;
use crate::node::InternalEvent;

pub struct Connection {
    id: ConnectionId,
    writer: BufWriter<TcpStream>,
    peer: Option<SocketAddr>,
    /// Player behind this connection, once known.
    pub(crate) player: Option<PlayerId>,
    /// Past the join handshake.
    pub(crate) logged_in: bool,
    /// Negotiated protocol version (the requested one until negotiated).
    pub(crate) version: u32,
    pub(crate) faults: u32,
    opened: Instant,
    closing: bool,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, stream: TcpStream, version: u32) -> Self {
        Self {
            id,
            peer: stream.peer_addr().ok(),
            writer: BufWriter::new(stream),
            player: None,
            logged_in: false,
            version,
            faults: 0,
            opened: Instant::now(),
            closing: false,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn player(&self) -> Option<PlayerId> {
        self.player
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn faults(&self) -> u32 {
        self.faults
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    pub fn opened(&self) -> Instant {
        self.opened
    }

    /// Encode `message` for this connection's version and write it.
    pub(crate) fn send(&mut self, message: &Message) -> Result<(), NetError> {
        let packet = message.encode(self.version)?;
        write_frame(&mut self.writer, &packet)?;
        Ok(())
    }

    /// Shut the socket down. The reader thread will report the disconnect.
    pub(crate) fn close(&mut self) {
        if !self.closing {
            self.closing = true;
            let _ = self.writer.get_ref().shutdown(Shutdown::Both);
        }
    }
}

/// Start the reader thread for `stream`.
pub(crate) fn spawn_reader(
    connection: ConnectionId,
    stream: TcpStream,
    max_len: u32,
    tx: Sender<InternalEvent>,
) {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        loop {
            match read_frame(&mut reader, max_len) {
                Ok(bytes) => {
                    if tx.send(InternalEvent::Packet { connection, bytes }).is_err() {
                        // Node loop is gone.
                        break;
                    }
                }
                Err(e) => {
                    log::debug!("{connection}: reader stopping: {e}");
                    let _ = tx.send(InternalEvent::Disconnected { connection });
                    break;
                }
            }
        }
    });
}
