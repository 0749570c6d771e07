// Test-only participant for multiplayer integration tests.
//
// Wraps a real `NodeHandle` (from `gametable_net`) to give tests a
// synchronous API over the full pipeline: local edit → outbox → host →
// relay → peers → same mutators → identical tables. Every participant is a
// complete node, host or joiner, running the same code paths as the real
// application.
//
// The only test-specific code is the blocking wait helpers and a listener
// that records every `Change` with whether it came from the network.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use gametable_net::{HostConfig, JoinConfig, NodeEvent, NodeHandle, join, start_host};
use gametable_protocol::PROTOCOL_VERSION;
use gametable_state::{Change, GameTable, NetworkEvent};

/// Default timeout for blocking waits.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep between polls of a table.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One recorded change and whether it arrived over the network.
#[derive(Clone, Debug, PartialEq)]
pub struct Recorded {
    pub change: Change,
    pub remote: bool,
}

/// A running participant.
pub struct TestPeer {
    handle: NodeHandle,
    changes: Arc<Mutex<Vec<Recorded>>>,
    /// Events consumed by `wait_for_event` while looking for another one.
    skipped: Vec<NodeEvent>,
}

impl TestPeer {
    /// Host a session on a free localhost port.
    pub fn host(password: Option<&str>) -> Self {
        init_logging();
        let handle = start_host(HostConfig {
            port: 0,
            password: password.map(String::from),
            player_name: "host".into(),
            character_name: "Game Master".into(),
            ..HostConfig::default()
        })
        .expect("start_host failed");
        let mut peer = Self::wrap(handle);
        peer.wait_for_event(|e| matches!(e, NodeEvent::HostingStarted { .. }));
        peer
    }

    /// Join `addr` at the newest protocol version and wait for login.
    pub fn join(addr: SocketAddr, name: &str) -> Self {
        let mut peer = Self::join_with(addr, name, "", PROTOCOL_VERSION);
        peer.wait_for_event(|e| *e == NodeEvent::LoginComplete);
        peer
    }

    /// Start joining without waiting for the outcome.
    pub fn join_with(addr: SocketAddr, name: &str, password: &str, version: u32) -> Self {
        init_logging();
        let handle = join(JoinConfig {
            address: addr.to_string(),
            password: password.into(),
            player_name: name.into(),
            character_name: format!("{name}'s hero"),
            version,
            ..JoinConfig::default()
        })
        .expect("join failed");
        Self::wrap(handle)
    }

    fn wrap(handle: NodeHandle) -> Self {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        handle
            .submit(move |table| {
                table.add_listener(move |change: &Change, tag: Option<&NetworkEvent>| {
                    sink.lock().unwrap().push(Recorded {
                        change: change.clone(),
                        remote: tag.is_some(),
                    });
                });
            })
            .expect("node stopped before start");
        Self {
            handle,
            changes,
            skipped: Vec::new(),
        }
    }

    /// Listening address (host only).
    pub fn addr(&self) -> SocketAddr {
        self.handle.local_addr().expect("not a host")
    }

    /// Run `f` on the node thread and return its result. Edits made here
    /// replicate like any local edit.
    pub fn table<R: Send + 'static>(&self, f: impl FnOnce(&mut GameTable) -> R + Send + 'static) -> R {
        self.handle.with_table(f).expect("node stopped")
    }

    pub fn send_chat(&self, text: &str) {
        self.handle.send_chat(text).expect("node stopped");
    }

    /// Poll the table until `check` holds. Panics on timeout.
    pub fn wait_until(&self, what: &str, check: impl Fn(&GameTable) -> bool + Send + Copy + 'static) {
        let start = Instant::now();
        loop {
            if self.table(move |t| check(t)) {
                return;
            }
            assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for {what}");
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Block until a node event matching `pred` arrives and return it.
    /// Events skipped on the way are kept for `events_seen`.
    pub fn wait_for_event(&mut self, pred: impl Fn(&NodeEvent) -> bool) -> NodeEvent {
        if let Some(pos) = self.skipped.iter().position(&pred) {
            return self.skipped.remove(pos);
        }
        let start = Instant::now();
        loop {
            let left = POLL_TIMEOUT.saturating_sub(start.elapsed());
            let event = self
                .handle
                .events()
                .recv_timeout(left)
                .unwrap_or_else(|e| panic!("no matching node event: {e}"));
            if pred(&event) {
                return event;
            }
            log::debug!("skipping node event {event:?}");
            self.skipped.push(event);
        }
    }

    /// Everything recorded by the listener so far.
    pub fn changes(&self) -> Vec<Recorded> {
        self.changes.lock().unwrap().clone()
    }

    /// Stop the node; its peers see the connection drop.
    pub fn stop(self) {
        self.handle.stop();
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
