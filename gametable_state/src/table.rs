// The replicated state store.
//
// `GameTable` owns everything one participant keeps consistent with the
// others: the public and private maps, the shared identity space, the type
// library, the roster, table-wide settings (grid mode, background), the
// replication guard, the registered listeners, and the outbox of messages
// waiting to be sent.
//
// Every mutator follows the same three steps:
// 1. apply the change to local state;
// 2. notify every listener with the `Change` and the caller's tag;
// 3. hand the equivalent `Message` to `replicate`, which pushes it onto the
//    outbox only if `ReplicationGuard::should_broadcast` says so.
// Mutators that turn out to change nothing (locking an absent element,
// removing IDs that are already gone) stop before step 2.
//
// The message is built lazily by a closure so untagged-but-suppressed calls
// (private map, logging in) never pay for the clone.
//
// The table never touches a socket. The node loop in `gametable_net` drains
// `take_outbox()` after each serialized step and sends the messages to the
// right connections. Session state changes arrive through the session hooks
// at the bottom of the impl.
//
// See also: `guard.rs` for the broadcast rule, `identity.rs` for ID rules,
// `snapshot.rs` for save/load, `gametable_net::handlers` for the inbound
// side.

use std::collections::BTreeMap;
use std::mem;

use gametable_protocol::{
    Attribute, Background, Color, ElementData, ElementId, GridMode, Layer, LineData, Message,
    PlayerData, PlayerId, Point, Rect,
};

use crate::element::{MapElement, TypeLibrary, is_valid_face_size};
use crate::error::StateError;
use crate::event::{Change, NetworkEvent, TableListener};
use crate::guard::{LinkStatus, ReplicationGuard};
use crate::identity::IdentitySpace;
use crate::map::{GameTableMap, MapVisibility};
use crate::player::{Player, Roster};
use crate::snapshot::MapSnapshot;

pub struct GameTable {
    ids: IdentitySpace,
    types: TypeLibrary,
    public: GameTableMap,
    private: GameTableMap,
    active: MapVisibility,
    roster: Roster,
    grid_mode: GridMode,
    background: Background,
    guard: ReplicationGuard,
    listeners: Vec<Box<dyn TableListener>>,
    outbox: Vec<Message>,
}

impl GameTable {
    pub fn new(local: Player) -> Self {
        Self {
            ids: IdentitySpace::new(),
            types: TypeLibrary::new(),
            public: GameTableMap::new(MapVisibility::Public),
            private: GameTableMap::new(MapVisibility::Private),
            active: MapVisibility::Public,
            roster: Roster::new(local),
            grid_mode: GridMode::default(),
            background: Background::default(),
            guard: ReplicationGuard::default(),
            listeners: Vec::new(),
            outbox: Vec::new(),
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn map(&self, map: MapVisibility) -> &GameTableMap {
        match map {
            MapVisibility::Public => &self.public,
            MapVisibility::Private => &self.private,
        }
    }

    pub fn active_map(&self) -> &GameTableMap {
        self.map(self.active)
    }

    pub fn active(&self) -> MapVisibility {
        self.active
    }

    pub fn ids(&self) -> &IdentitySpace {
        &self.ids
    }

    pub fn types(&self) -> &TypeLibrary {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeLibrary {
        &mut self.types
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn local_player(&self) -> &Player {
        self.roster.local()
    }

    pub fn grid_mode(&self) -> GridMode {
        self.grid_mode
    }

    pub fn background(&self) -> &Background {
        &self.background
    }

    pub fn guard(&self) -> &ReplicationGuard {
        &self.guard
    }

    pub fn link_status(&self) -> LinkStatus {
        self.guard.status()
    }

    pub fn add_listener(&mut self, listener: impl TableListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Messages queued for broadcast since the last call.
    pub fn take_outbox(&mut self) -> Vec<Message> {
        mem::take(&mut self.outbox)
    }

    pub fn outbox_len(&self) -> usize {
        self.outbox.len()
    }

    // -- propagation --------------------------------------------------------

    fn map_mut(&mut self, map: MapVisibility) -> &mut GameTableMap {
        match map {
            MapVisibility::Public => &mut self.public,
            MapVisibility::Private => &mut self.private,
        }
    }

    fn element_mut(
        &mut self,
        map: MapVisibility,
        id: ElementId,
    ) -> Result<&mut MapElement, StateError> {
        self.map_mut(map)
            .element_mut(id)
            .ok_or(StateError::UnknownElement { id, map })
    }

    fn notify(&mut self, change: &Change, tag: Option<&NetworkEvent>) {
        for listener in &mut self.listeners {
            listener.on_change(change, tag);
        }
    }

    /// The only place outbound messages are queued.
    fn replicate(
        &mut self,
        map: MapVisibility,
        tag: Option<&NetworkEvent>,
        messages: impl FnOnce() -> Vec<Message>,
    ) {
        if self.guard.should_broadcast(map, tag) {
            self.outbox.extend(messages());
        }
    }

    fn commit(
        &mut self,
        map: MapVisibility,
        tag: Option<&NetworkEvent>,
        change: Change,
        message: impl FnOnce() -> Message,
    ) {
        self.notify(&change, tag);
        self.replicate(map, tag, || vec![message()]);
    }

    // -- elements -----------------------------------------------------------

    /// Place a new element of `type_name` with a freshly minted ID.
    pub fn place_element(
        &mut self,
        map: MapVisibility,
        type_name: &str,
        position: Point,
        tag: Option<&NetworkEvent>,
    ) -> ElementId {
        let element_type = self.types.resolve(type_name);
        let id = self.ids.acquire();
        let element = MapElement::new(id, element_type, position);
        let data = element.to_data();
        self.map_mut(map).insert(element);
        self.commit(map, tag, Change::ElementAdded { map, id }, || {
            Message::ElementAdded { element: data }
        });
        id
    }

    /// Add an element from its wire or file form, keeping its ID.
    ///
    /// A corrupted element is quarantined and `None` is returned; nothing is
    /// broadcast for it. If the ID is already live locally, the local holder
    /// is rekeyed first (see `admit_wire_id`).
    pub fn insert_element(
        &mut self,
        map: MapVisibility,
        data: &ElementData,
        tag: Option<&NetworkEvent>,
    ) -> Option<ElementId> {
        let element = MapElement::from_data(data, &self.types);
        if element.is_corrupted() {
            log::warn!(
                "quarantining element {} ({:?}): face size {} out of range",
                data.id,
                data.type_name,
                data.face_size
            );
            self.map_mut(map).insert(element);
            self.notify(&Change::ElementQuarantined { map, id: data.id }, tag);
            return None;
        }
        let id = self.admit_wire_id(data.id, tag);
        self.map_mut(map).insert(element);
        self.commit(map, tag, Change::ElementAdded { map, id }, || {
            Message::ElementAdded {
                element: data.clone(),
            }
        });
        Some(id)
    }

    /// Make `id` available for an incoming element. If some local element
    /// already holds it, that element moves to a fresh ID. The rekey is
    /// local bookkeeping and is never broadcast.
    fn admit_wire_id(&mut self, id: ElementId, tag: Option<&NetworkEvent>) -> ElementId {
        if self.ids.is_live(id) {
            let fresh = self.ids.acquire();
            for map in [MapVisibility::Public, MapVisibility::Private] {
                if self.map_mut(map).rekey(id, fresh) {
                    log::debug!("id collision on {id}: local element on {map:?} map is now {fresh}");
                    self.notify(
                        &Change::ElementRekeyed {
                            map,
                            old: id,
                            new: fresh,
                        },
                        tag,
                    );
                    break;
                }
            }
        }
        self.ids.from_numeric(id.0)
    }

    /// Remove elements. Returns the IDs that were actually present.
    pub fn remove_elements(
        &mut self,
        map: MapVisibility,
        ids: &[ElementId],
        tag: Option<&NetworkEvent>,
    ) -> Vec<ElementId> {
        let mut removed = Vec::new();
        for &id in ids {
            if self.map_mut(map).remove(id).is_some() {
                self.ids.release(id);
                removed.push(id);
            }
        }
        if removed.is_empty() {
            return removed;
        }
        let sent = removed.clone();
        self.commit(
            map,
            tag,
            Change::ElementsRemoved {
                map,
                ids: removed.clone(),
            },
            || Message::ElementsRemoved { ids: sent },
        );
        removed
    }

    pub fn move_element(
        &mut self,
        map: MapVisibility,
        id: ElementId,
        position: Point,
        tag: Option<&NetworkEvent>,
    ) -> Result<(), StateError> {
        self.element_mut(map, id)?.set_position(position);
        self.commit(map, tag, Change::ElementMoved { map, id, position }, || {
            Message::ElementMoved { id, position }
        });
        Ok(())
    }

    pub fn rotate_element(
        &mut self,
        map: MapVisibility,
        id: ElementId,
        angle: f64,
        tag: Option<&NetworkEvent>,
    ) -> Result<(), StateError> {
        let element = self.element_mut(map, id)?;
        element.set_angle(angle);
        let angle = element.angle();
        self.commit(map, tag, Change::ElementRotated { map, id, angle }, || {
            Message::ElementRotated { id, angle }
        });
        Ok(())
    }

    pub fn flip_element(
        &mut self,
        map: MapVisibility,
        id: ElementId,
        flip_h: bool,
        flip_v: bool,
        tag: Option<&NetworkEvent>,
    ) -> Result<(), StateError> {
        self.element_mut(map, id)?.set_flip(flip_h, flip_v);
        self.commit(
            map,
            tag,
            Change::ElementFlipped {
                map,
                id,
                flip_h,
                flip_v,
            },
            || Message::ElementFlipped { id, flip_h, flip_v },
        );
        Ok(())
    }

    /// Change an element's face size. Out-of-range sizes are refused before
    /// anything is applied.
    pub fn resize_element(
        &mut self,
        map: MapVisibility,
        id: ElementId,
        face_size: f64,
        tag: Option<&NetworkEvent>,
    ) -> Result<(), StateError> {
        if !is_valid_face_size(face_size) {
            return Err(StateError::InvalidFaceSize(face_size));
        }
        self.element_mut(map, id)?.set_face_size(face_size);
        self.commit(map, tag, Change::ElementResized { map, id, face_size }, || {
            Message::ElementResized { id, face_size }
        });
        Ok(())
    }

    pub fn retype_element(
        &mut self,
        map: MapVisibility,
        id: ElementId,
        type_name: &str,
        tag: Option<&NetworkEvent>,
    ) -> Result<(), StateError> {
        let element_type = self.types.resolve(type_name);
        self.element_mut(map, id)?.set_element_type(element_type);
        let type_name = type_name.to_string();
        let sent = type_name.clone();
        self.commit(
            map,
            tag,
            Change::ElementRetyped { map, id, type_name },
            || Message::ElementRetyped {
                id,
                type_name: sent,
            },
        );
        Ok(())
    }

    pub fn rename_element(
        &mut self,
        map: MapVisibility,
        id: ElementId,
        name: &str,
        tag: Option<&NetworkEvent>,
    ) -> Result<(), StateError> {
        self.element_mut(map, id)?.set_name(name);
        let name = name.to_string();
        let sent = name.clone();
        self.commit(map, tag, Change::ElementRenamed { map, id, name }, || {
            Message::ElementRenamed { id, name: sent }
        });
        Ok(())
    }

    pub fn set_element_layer(
        &mut self,
        map: MapVisibility,
        id: ElementId,
        layer: Layer,
        tag: Option<&NetworkEvent>,
    ) -> Result<(), StateError> {
        self.element_mut(map, id)?.set_layer(layer);
        self.commit(map, tag, Change::ElementLayerChanged { map, id, layer }, || {
            Message::ElementLayerChanged { id, layer }
        });
        Ok(())
    }

    /// Set (insert or overwrite) a batch of attributes.
    pub fn set_attributes(
        &mut self,
        map: MapVisibility,
        id: ElementId,
        attributes: Vec<Attribute>,
        tag: Option<&NetworkEvent>,
    ) -> Result<(), StateError> {
        let element = self.element_mut(map, id)?;
        for attr in &attributes {
            element.insert_attribute(attr.clone());
        }
        let sent = attributes.clone();
        self.commit(map, tag, Change::AttributesSet { map, id, attributes }, || {
            Message::AttributesSet {
                id,
                attributes: sent,
            }
        });
        Ok(())
    }

    /// Remove a batch of attributes by key. Keys that are not set are
    /// ignored; the whole batch is still reported.
    pub fn remove_attributes(
        &mut self,
        map: MapVisibility,
        id: ElementId,
        keys: Vec<String>,
        tag: Option<&NetworkEvent>,
    ) -> Result<(), StateError> {
        let element = self.element_mut(map, id)?;
        for key in &keys {
            element.remove_attribute(key);
        }
        let sent = keys.clone();
        self.commit(map, tag, Change::AttributesRemoved { map, id, keys }, || {
            Message::AttributesRemoved { id, keys: sent }
        });
        Ok(())
    }

    // -- lines --------------------------------------------------------------

    pub fn add_lines(&mut self, map: MapVisibility, lines: Vec<LineData>, tag: Option<&NetworkEvent>) {
        if lines.is_empty() {
            return;
        }
        self.map_mut(map).add_lines(&lines);
        let sent = lines.clone();
        self.commit(map, tag, Change::LinesAdded { map, lines }, || {
            Message::LinesAdded { lines: sent }
        });
    }

    pub fn clear_lines(&mut self, map: MapVisibility, tag: Option<&NetworkEvent>) {
        self.map_mut(map).clear_lines();
        self.commit(map, tag, Change::LinesCleared { map }, || Message::LinesCleared);
    }

    /// Erase lines touching `rect`, optionally only those drawn in `color`.
    /// Returns how many were removed.
    pub fn erase_lines(
        &mut self,
        map: MapVisibility,
        rect: Rect,
        color: Option<Color>,
        tag: Option<&NetworkEvent>,
    ) -> usize {
        let removed = self.map_mut(map).erase_lines(rect, color);
        self.commit(map, tag, Change::LinesErased { map, rect, removed }, || {
            Message::LinesErased { rect, color }
        });
        removed
    }

    // -- locking ------------------------------------------------------------

    /// Lock or unlock elements. Absent elements and elements already in the
    /// requested state are skipped; if nothing changes, nothing is reported.
    pub fn set_locked(
        &mut self,
        map: MapVisibility,
        ids: &[ElementId],
        locked: bool,
        tag: Option<&NetworkEvent>,
    ) -> Vec<ElementId> {
        let changed = self.map_mut(map).set_locked(ids, locked);
        if changed.is_empty() {
            return changed;
        }
        let sent = changed.clone();
        self.commit(
            map,
            tag,
            Change::LockChanged {
                map,
                ids: changed.clone(),
                locked,
            },
            || Message::Lock { ids: sent, locked },
        );
        changed
    }

    pub fn set_all_locked(&mut self, map: MapVisibility, locked: bool, tag: Option<&NetworkEvent>) {
        let ids = self.map_mut(map).set_all_locked(locked);
        self.commit(map, tag, Change::LockChanged { map, ids, locked }, || {
            Message::LockAll { locked }
        });
    }

    // -- groups -------------------------------------------------------------

    /// Move present elements into `group`. Absent IDs are skipped.
    pub fn add_to_group(
        &mut self,
        map: MapVisibility,
        group: &str,
        ids: &[ElementId],
        tag: Option<&NetworkEvent>,
    ) {
        let target = self.map_mut(map);
        let present: Vec<ElementId> = ids.iter().copied().filter(|id| target.contains(*id)).collect();
        if !target.groups_mut().add(group, &present) {
            return;
        }
        let group = group.to_string();
        self.commit(map, tag, Change::GroupsChanged { map }, || Message::GroupAdd {
            group,
            ids: present,
        });
    }

    /// Take elements out of whatever group they are in.
    pub fn remove_from_groups(
        &mut self,
        map: MapVisibility,
        ids: &[ElementId],
        tag: Option<&NetworkEvent>,
    ) {
        if !self.map_mut(map).groups_mut().remove(ids) {
            return;
        }
        let ids = ids.to_vec();
        self.commit(map, tag, Change::GroupsChanged { map }, || Message::GroupRemove { ids });
    }

    pub fn delete_group(
        &mut self,
        map: MapVisibility,
        group: &str,
        tag: Option<&NetworkEvent>,
    ) -> Result<(), StateError> {
        self.map_mut(map).groups_mut().delete(group)?;
        let group = group.to_string();
        self.commit(map, tag, Change::GroupsChanged { map }, || Message::GroupDelete { group });
        Ok(())
    }

    pub fn rename_group(
        &mut self,
        map: MapVisibility,
        from: &str,
        to: &str,
        tag: Option<&NetworkEvent>,
    ) -> Result<(), StateError> {
        self.map_mut(map).groups_mut().rename(from, to)?;
        let (from, to) = (from.to_string(), to.to_string());
        self.commit(map, tag, Change::GroupsChanged { map }, || Message::GroupRename { from, to });
        Ok(())
    }

    // -- whole-map operations -----------------------------------------------

    /// Empty a map and release the IDs its elements held.
    pub fn reset_map(&mut self, map: MapVisibility, tag: Option<&NetworkEvent>) {
        self.clear_map_quietly(map);
        self.commit(map, tag, Change::MapReset { map }, || Message::MapReset);
    }

    fn clear_map_quietly(&mut self, map: MapVisibility) {
        for id in self.map_mut(map).clear() {
            self.ids.release(id);
        }
    }

    /// Capture a map's replicated content.
    pub fn save_snapshot(&self, map: MapVisibility) -> MapSnapshot {
        MapSnapshot::capture(self.map(map), self.grid_mode, &self.background)
    }

    /// Replace a map's content with a snapshot.
    ///
    /// The snapshot's element IDs are not trusted: every element gets a
    /// fresh ID here and locks and groups are translated through the
    /// returned conversion table. Corrupted elements are quarantined and
    /// left out of the table. When broadcast, the load goes out as a
    /// `MapReset` followed by the same stream a joiner receives.
    pub fn load_snapshot(
        &mut self,
        map: MapVisibility,
        snapshot: &MapSnapshot,
        tag: Option<&NetworkEvent>,
    ) -> BTreeMap<ElementId, ElementId> {
        self.clear_map_quietly(map);
        let mut remap = BTreeMap::new();
        for data in &snapshot.elements {
            let mut element = MapElement::from_data(data, &self.types);
            if element.is_corrupted() {
                log::warn!("snapshot element {} has face size {}, quarantined", data.id, data.face_size);
                self.map_mut(map).insert(element);
                continue;
            }
            let id = self.ids.acquire();
            element.set_id(id);
            remap.insert(data.id, id);
            self.map_mut(map).insert(element);
        }
        let target = self.map_mut(map);
        target.add_lines(&snapshot.lines);
        let locked: Vec<ElementId> = snapshot
            .locked
            .iter()
            .filter_map(|old| remap.get(old).copied())
            .collect();
        target.set_locked(&locked, true);
        for (group, members) in &snapshot.groups {
            let ids: Vec<ElementId> = members
                .iter()
                .filter_map(|old| remap.get(old).copied())
                .collect();
            target.groups_mut().add(group, &ids);
        }
        if map == MapVisibility::Public {
            self.grid_mode = snapshot.grid_mode;
            self.background = snapshot.background.clone();
        }
        self.notify(&Change::MapLoaded { map }, tag);
        log::info!(
            "loaded snapshot into {map:?} map: {} elements, {} lines",
            remap.len(),
            snapshot.lines.len()
        );
        let stream = self.state_messages(map);
        self.replicate(map, tag, || {
            let mut messages = vec![Message::MapReset];
            messages.extend(stream);
            messages
        });
        remap
    }

    /// The full content of `map` as the message stream that recreates it on
    /// a participant with an empty map: grid mode, background, every line,
    /// every element, the lock set, then one `GroupAdd` per group.
    pub fn state_messages(&self, map: MapVisibility) -> Vec<Message> {
        let source = self.map(map);
        let mut messages = vec![
            Message::GridMode {
                mode: self.grid_mode,
            },
            Message::Background {
                background: self.background.clone(),
            },
            Message::LinesAdded {
                lines: source.lines().to_vec(),
            },
        ];
        messages.extend(source.elements().iter().map(|e| Message::ElementAdded {
            element: e.to_data(),
        }));
        messages.push(Message::Lock {
            ids: source.locked().iter().copied().collect(),
            locked: true,
        });
        messages.extend(source.groups().iter().map(|g| Message::GroupAdd {
            group: g.name().to_string(),
            ids: g.members().iter().copied().collect(),
        }));
        messages
    }

    // -- table-wide settings ------------------------------------------------

    pub fn set_grid_mode(&mut self, mode: GridMode, tag: Option<&NetworkEvent>) {
        self.grid_mode = mode;
        self.commit(MapVisibility::Public, tag, Change::GridModeChanged(mode), || {
            Message::GridMode { mode }
        });
    }

    pub fn set_background(&mut self, background: Background, tag: Option<&NetworkEvent>) {
        self.background = background.clone();
        let sent = background.clone();
        self.commit(
            MapVisibility::Public,
            tag,
            Change::BackgroundChanged(background),
            || Message::Background { background: sent },
        );
    }

    /// Switch which map the local UI shows. Local only.
    pub fn set_active_map(&mut self, map: MapVisibility) {
        if self.active != map {
            self.active = map;
            self.notify(&Change::ActiveMapChanged(map), None);
        }
    }

    // -- players ------------------------------------------------------------

    pub fn set_pointer(
        &mut self,
        player: PlayerId,
        position: Point,
        pointing: bool,
        tag: Option<&NetworkEvent>,
    ) -> Result<(), StateError> {
        let entry = self
            .roster
            .get_mut(player)
            .ok_or(StateError::UnknownPlayer(player))?;
        entry.pointer = position;
        entry.pointing = pointing;
        self.commit(
            MapVisibility::Public,
            tag,
            Change::PointerMoved {
                player,
                position,
                pointing,
            },
            || Message::PointerMoved {
                player,
                position,
                pointing,
            },
        );
        Ok(())
    }

    pub fn rename_character(
        &mut self,
        player: PlayerId,
        character_name: &str,
        tag: Option<&NetworkEvent>,
    ) -> Result<(), StateError> {
        self.roster
            .get_mut(player)
            .ok_or(StateError::UnknownPlayer(player))?
            .character_name = character_name.to_string();
        let character_name = character_name.to_string();
        let sent = character_name.clone();
        self.commit(
            MapVisibility::Public,
            tag,
            Change::PlayerRenamed {
                player,
                character_name,
            },
            || Message::PlayerRenamed {
                player,
                character_name: sent,
            },
        );
        Ok(())
    }

    // -- session hooks ------------------------------------------------------
    //
    // Called by the session layer only. None of these broadcast.

    /// Become the host: the roster shrinks to the local player with ID 0.
    pub fn begin_hosting(&mut self) {
        self.roster.reset_to_local();
        let local = self.roster.local_mut();
        local.id = PlayerId::HOST;
        local.host = true;
        self.guard.set(LinkStatus::Hosting, false);
        self.notify(&Change::RosterChanged, None);
    }

    /// Start joining a host. The public map is cleared to make room for the
    /// host's state dump, and broadcasts stay suppressed until
    /// `finish_login`.
    pub fn begin_joining(&mut self) {
        self.roster.reset_to_local();
        let local = self.roster.local_mut();
        local.id = PlayerId::UNASSIGNED;
        local.host = false;
        self.guard.set(LinkStatus::Connecting, true);
        self.outbox.clear();
        self.clear_map_quietly(MapVisibility::Public);
        self.notify(
            &Change::MapReset {
                map: MapVisibility::Public,
            },
            None,
        );
        self.notify(&Change::RosterChanged, None);
    }

    /// The host accepted the join. Still logging in until the dump ends.
    pub fn join_accepted(&mut self) {
        self.guard.set(LinkStatus::Connected, true);
    }

    /// The host's dump is complete; local edits replicate from here on.
    pub fn finish_login(&mut self) {
        self.guard.set(LinkStatus::Connected, false);
    }

    /// Back to standalone. The roster drops to the local player and any
    /// unsent messages are discarded.
    pub fn disconnect(&mut self) {
        self.guard.set(LinkStatus::Disconnected, false);
        self.outbox.clear();
        self.roster.reset_to_local();
        let local = self.roster.local_mut();
        local.id = PlayerId::UNASSIGNED;
        local.host = false;
        self.notify(&Change::RosterChanged, None);
    }

    /// Replace the roster from a `Roster` message. Returns `false` (and
    /// changes nothing) if `you` does not index into `players`.
    pub fn apply_roster(
        &mut self,
        players: &[PlayerData],
        you: i32,
        tag: Option<&NetworkEvent>,
    ) -> bool {
        if !self.roster.replace_from_wire(players, you) {
            return false;
        }
        self.notify(&Change::RosterChanged, tag);
        true
    }

    /// Append a player (host side, after a join is accepted).
    pub fn add_player(&mut self, player: Player) {
        self.roster.push(player);
        self.notify(&Change::RosterChanged, None);
    }

    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let removed = self.roster.remove(id)?;
        self.notify(&Change::RosterChanged, None);
        Some(removed)
    }
}
