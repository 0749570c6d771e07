// gametable_state — the replicated state store for GameTable.
//
// Everything a participant keeps consistent with the rest of the session
// lives here: the public and private maps with their elements, lines, groups
// and locks; the roster; the per-table identity space; and the single rule
// that decides whether a local mutation leaves the process. No I/O. The net
// crate (`gametable_net`) applies inbound messages through the same mutators
// local callers use and drains the outbox this crate fills.
//
// Module overview:
// - `table.rs`:     `GameTable`, the mutators, listener notification, the
//                   outbox, session hooks.
// - `guard.rs`:     `ReplicationGuard::should_broadcast`, link status.
// - `event.rs`:     `NetworkEvent` causality tag, `Change`, `TableListener`.
// - `identity.rs`:  `IdentitySpace`: ID allocation and liveness.
// - `map.rs`:       `GameTableMap`: one map's elements, lines, locks, groups.
// - `element.rs`:   `MapElement`, `MapElementType`, `TypeLibrary`.
// - `group.rs`:     `GroupManager`: disjoint named groups.
// - `player.rs`:    `Player`, `Roster`.
// - `snapshot.rs`:  `MapSnapshot` save/load form, JSON helpers.
// - `error.rs`:     `StateError`.
//
// Design decisions:
// - **No globals.** Identity space, type library and roster are owned by the
//   `GameTable`, so several tables can coexist in one test process.
// - **Causality as a parameter.** Mutators take `Option<&NetworkEvent>`;
//   `None` means "local". The tag goes to listeners untouched and is checked
//   in exactly one place.

pub mod element;
pub mod error;
pub mod event;
pub mod group;
pub mod guard;
pub mod identity;
pub mod map;
pub mod player;
pub mod snapshot;
pub mod table;

pub use element::{MapElement, MapElementType, TypeLibrary};
pub use error::StateError;
pub use event::{Change, NetworkEvent, TableListener};
pub use group::{Group, GroupManager};
pub use guard::{LinkStatus, ReplicationGuard};
pub use identity::IdentitySpace;
pub use map::{GameTableMap, MAX_QUARANTINE, MapVisibility};
pub use player::{Player, Roster};
pub use snapshot::MapSnapshot;
pub use table::GameTable;
