// gametable_net — sessions, connections and message dispatch for GameTable.
//
// One participant hosts; everyone else joins the host directly. The host
// validates joins, assigns player IDs, sends each joiner the full public
// state and forwards every shared message it receives to the other peers.
// There is no separate relay process and no authority beyond the host: each
// participant applies what it receives through the same `GameTable`
// mutators it uses for local edits.
//
// Module overview:
// - `server.rs`:      `start_host`: listener thread plus node loop.
// - `client.rs`:      `join`: connect, send `JoinRequest`, node loop.
// - `node.rs`:        `Node`, `NodeHandle`, `NodeEvent`, the single-threaded
//                     event loop every packet and local edit goes through.
// - `session.rs`:     `Session`: connections, the join sequence, roster
//                     pushes, relaying, drop handling.
// - `handlers.rs`:    `Registry::standard()`, one handler per message kind.
// - `dispatch.rs`:    `Registry`: tag to handler, `NetworkEvent` per packet.
// - `connection.rs`:  one peer: write half, handshake state, reader thread.
// - `config.rs`:      `HostConfig`, `JoinConfig`, `NetConfig`.
// - `error.rs`:       `DispatchError` with its close/count/drop policy,
//                     `NetError`.
//
// Dependencies: `gametable_protocol` (wire format and framing) and
// `gametable_state` (the table). Plain `std::net` and threads; no async
// runtime.

pub mod client;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod node;
pub mod server;
pub mod session;

pub use client::join;
pub use config::{HostConfig, JoinConfig, NetConfig};
pub use dispatch::{Handler, Registry};
pub use error::{DispatchError, NetError};
pub use node::{Node, NodeEvent, NodeHandle};
pub use server::start_host;
pub use session::{JoinRequest, Session};
