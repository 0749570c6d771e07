// One map: elements, drawn lines, groups, locks.
//
// `GameTableMap` is a plain container. It enforces its own structural rules
// (removing an element also unlocks and ungroups it, locks only apply to
// present elements, corrupted elements go to quarantine) but knows nothing
// about listeners, broadcasting or IDs beyond the ones it holds. All of that
// lives in `table.rs`, which owns exactly two of these (public and private).
//
// Elements are kept in placement order, which is also draw order within a
// layer. Maps are small enough (hundreds of elements) that lookup by ID is a
// linear scan.
//
// Lines are immutable `LineData` values. Erasing removes every line with an
// endpoint inside the rectangle, optionally only those of one color.

use std::collections::BTreeSet;

use gametable_protocol::{Color, ElementId, LineData, Rect};
use serde::{Deserialize, Serialize};

use crate::element::MapElement;
use crate::group::GroupManager;

/// Which of the two maps. Only the public one is ever replicated.
/// Quarantined elements kept per map. Older entries are dropped first.
pub const MAX_QUARANTINE: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapVisibility {
    Public,
    Private,
}

#[derive(Clone, Debug)]
pub struct GameTableMap {
    visibility: MapVisibility,
    elements: Vec<MapElement>,
    lines: Vec<LineData>,
    groups: GroupManager,
    locked: BTreeSet<ElementId>,
    quarantine: Vec<MapElement>,
}

impl GameTableMap {
    pub fn new(visibility: MapVisibility) -> Self {
        Self {
            visibility,
            elements: Vec::new(),
            lines: Vec::new(),
            groups: GroupManager::new(),
            locked: BTreeSet::new(),
            quarantine: Vec::new(),
        }
    }

    pub fn visibility(&self) -> MapVisibility {
        self.visibility
    }

    pub fn elements(&self) -> &[MapElement] {
        &self.elements
    }

    pub fn element(&self, id: ElementId) -> Option<&MapElement> {
        self.elements.iter().find(|e| e.id() == id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.element(id).is_some()
    }

    /// Case- and whitespace-insensitive lookup by display name.
    pub fn find_by_name(&self, name: &str) -> Vec<&MapElement> {
        let wanted = crate::element::normalize_name(name);
        self.elements
            .iter()
            .filter(|e| e.normalized_name() == wanted)
            .collect()
    }

    pub fn lines(&self) -> &[LineData] {
        &self.lines
    }

    pub fn groups(&self) -> &GroupManager {
        &self.groups
    }

    pub fn locked(&self) -> &BTreeSet<ElementId> {
        &self.locked
    }

    pub fn is_locked(&self, id: ElementId) -> bool {
        self.locked.contains(&id)
    }

    /// Elements that failed the sanity bounds on arrival. Never drawn,
    /// never replicated.
    pub fn quarantine(&self) -> &[MapElement] {
        &self.quarantine
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.lines.is_empty()
    }

    // -- crate-internal mutation --------------------------------------------

    /// Add an element to the active set, or to quarantine if it is
    /// corrupted. Returns whether it became active. Quarantine holds at most
    /// `MAX_QUARANTINE` elements.
    pub(crate) fn insert(&mut self, element: MapElement) -> bool {
        if element.is_corrupted() {
            if self.quarantine.len() >= MAX_QUARANTINE {
                let dropped = self.quarantine.remove(0);
                log::debug!("quarantine full, dropping element {}", dropped.id());
            }
            self.quarantine.push(element);
            false
        } else {
            self.elements.push(element);
            true
        }
    }

    pub(crate) fn element_mut(&mut self, id: ElementId) -> Option<&mut MapElement> {
        self.elements.iter_mut().find(|e| e.id() == id)
    }

    /// Remove an element along with its lock and group membership.
    pub(crate) fn remove(&mut self, id: ElementId) -> Option<MapElement> {
        let index = self.elements.iter().position(|e| e.id() == id)?;
        self.locked.remove(&id);
        self.groups.forget(id);
        Some(self.elements.remove(index))
    }

    /// Give an element a new ID; lock and group membership follow it.
    pub(crate) fn rekey(&mut self, old: ElementId, new: ElementId) -> bool {
        let Some(element) = self.element_mut(old) else {
            return false;
        };
        element.set_id(new);
        if self.locked.remove(&old) {
            self.locked.insert(new);
        }
        self.groups.rekey(old, new);
        true
    }

    pub(crate) fn groups_mut(&mut self) -> &mut GroupManager {
        &mut self.groups
    }

    pub(crate) fn add_lines(&mut self, lines: &[LineData]) {
        self.lines.extend_from_slice(lines);
    }

    /// Remove all lines. Returns how many there were.
    pub(crate) fn clear_lines(&mut self) -> usize {
        let n = self.lines.len();
        self.lines.clear();
        n
    }

    /// Remove lines with an endpoint in `rect` (and of `color`, if given).
    /// Returns how many were removed.
    pub(crate) fn erase_lines(&mut self, rect: Rect, color: Option<Color>) -> usize {
        let before = self.lines.len();
        self.lines.retain(|line| {
            let touches = rect.contains(line.start) || rect.contains(line.end);
            let color_matches = color.is_none_or(|c| c == line.color);
            !(touches && color_matches)
        });
        before - self.lines.len()
    }

    /// Lock or unlock present elements. Returns the IDs whose state changed.
    pub(crate) fn set_locked(&mut self, ids: &[ElementId], locked: bool) -> Vec<ElementId> {
        let mut changed = Vec::new();
        for &id in ids {
            if !self.contains(id) {
                continue;
            }
            let did = if locked {
                self.locked.insert(id)
            } else {
                self.locked.remove(&id)
            };
            if did {
                changed.push(id);
            }
        }
        changed
    }

    pub(crate) fn set_all_locked(&mut self, locked: bool) -> Vec<ElementId> {
        let ids: Vec<ElementId> = self.elements.iter().map(MapElement::id).collect();
        self.set_locked(&ids, locked)
    }

    /// Empty the map. Returns the IDs of the active elements that were
    /// removed.
    pub(crate) fn clear(&mut self) -> Vec<ElementId> {
        let ids = self.elements.iter().map(MapElement::id).collect();
        self.elements.clear();
        self.lines.clear();
        self.groups.clear();
        self.locked.clear();
        self.quarantine.clear();
        ids
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gametable_protocol::{Layer, Point};

    use super::*;
    use crate::element::{MapElementType, TypeLibrary};

    fn element(id: u64) -> MapElement {
        let t = Arc::new(MapElementType::new("orc", 1, 1, 1.0, Layer::Pog).unwrap());
        MapElement::new(ElementId(id), t, Point::new(id as i32, 0))
    }

    fn corrupted(id: u64) -> MapElement {
        let mut data = element(id).to_data();
        data.face_size = f64::NAN;
        MapElement::from_data(&data, &TypeLibrary::new())
    }

    fn line(x0: i32, y0: i32, x1: i32, y1: i32, color: Color) -> LineData {
        LineData::new(Point::new(x0, y0), Point::new(x1, y1), color)
    }

    #[test]
    fn remove_drops_lock_and_group() {
        let mut map = GameTableMap::new(MapVisibility::Public);
        map.insert(element(1));
        map.insert(element(2));
        map.set_locked(&[ElementId(1)], true);
        map.groups_mut().add("pair", &[ElementId(1), ElementId(2)]);

        assert!(map.remove(ElementId(1)).is_some());
        assert!(!map.is_locked(ElementId(1)));
        assert_eq!(map.groups().group_of(ElementId(1)), None);
        assert_eq!(map.groups().group_of(ElementId(2)), Some("pair"));
        assert!(map.remove(ElementId(1)).is_none());
    }

    #[test]
    fn locking_absent_element_is_noop() {
        let mut map = GameTableMap::new(MapVisibility::Public);
        map.insert(element(1));
        let changed = map.set_locked(&[ElementId(1), ElementId(99)], true);
        assert_eq!(changed, vec![ElementId(1)]);
        assert!(map.set_locked(&[ElementId(1)], true).is_empty());
        assert_eq!(map.set_all_locked(false), vec![ElementId(1)]);
    }

    #[test]
    fn rekey_moves_lock_and_group() {
        let mut map = GameTableMap::new(MapVisibility::Private);
        map.insert(element(4));
        map.set_locked(&[ElementId(4)], true);
        map.groups_mut().add("g", &[ElementId(4)]);
        assert!(map.rekey(ElementId(4), ElementId(40)));
        assert!(map.contains(ElementId(40)));
        assert!(!map.contains(ElementId(4)));
        assert!(map.is_locked(ElementId(40)));
        assert_eq!(map.groups().group_of(ElementId(40)), Some("g"));
    }

    #[test]
    fn erase_by_rect_and_color() {
        let mut map = GameTableMap::new(MapVisibility::Public);
        map.add_lines(&[
            line(0, 0, 5, 5, Color::RED),
            line(1, 1, 50, 50, Color::BLUE),
            line(40, 40, 60, 60, Color::RED),
        ]);
        let rect = Rect::new(0, 0, 10, 10);
        assert_eq!(map.erase_lines(rect, Some(Color::BLUE)), 1);
        assert_eq!(map.lines().len(), 2);
        assert_eq!(map.erase_lines(rect, None), 1);
        assert_eq!(map.lines(), &[line(40, 40, 60, 60, Color::RED)]);
        assert_eq!(map.clear_lines(), 1);
    }

    #[test]
    fn erase_at_coordinate_limit() {
        let mut map = GameTableMap::new(MapVisibility::Public);
        map.add_lines(&[
            line(i32::MAX, 0, i32::MAX, 1, Color::BLACK),
            line(i32::MIN, 0, i32::MIN, 1, Color::BLACK),
        ]);
        assert_eq!(map.erase_lines(Rect::new(i32::MAX - 1, 0, 10, 10), None), 1);
        assert_eq!(map.erase_lines(Rect::new(i32::MIN, 0, -10, 10), None), 0);
        assert_eq!(map.lines(), &[line(i32::MIN, 0, i32::MIN, 1, Color::BLACK)]);
    }

    #[test]
    fn quarantine_is_capped() {
        let mut map = GameTableMap::new(MapVisibility::Public);
        let flood = MAX_QUARANTINE as u64 + 10;
        for id in 0..flood {
            assert!(!map.insert(corrupted(id)));
        }
        assert_eq!(map.quarantine().len(), MAX_QUARANTINE);
        assert_eq!(map.quarantine()[0].id(), ElementId(10));
        assert_eq!(map.quarantine()[MAX_QUARANTINE - 1].id(), ElementId(flood - 1));
        assert!(map.elements().is_empty());
    }

    #[test]
    fn name_lookup_is_normalized() {
        let mut map = GameTableMap::new(MapVisibility::Public);
        map.insert(element(1));
        assert_eq!(map.find_by_name("  ORC ").len(), 1);
        assert!(map.find_by_name("troll").is_empty());
    }

    #[test]
    fn clear_reports_active_ids() {
        let mut map = GameTableMap::new(MapVisibility::Public);
        map.insert(element(1));
        map.insert(element(2));
        map.add_lines(&[line(0, 0, 1, 1, Color::BLACK)]);
        assert_eq!(map.clear(), vec![ElementId(1), ElementId(2)]);
        assert!(map.is_empty());
    }
}
