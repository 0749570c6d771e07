// Named element groups.
//
// Groups partition a map's elements: an element is in at most one group, and
// adding it to a group takes it out of whatever group it was in. A group
// whose last member leaves is pruned. `membership` is the reverse index that
// keeps the partition cheap to maintain; the two maps are always updated
// together.
//
// The manager knows nothing about whether an element exists. `GameTableMap`
// filters IDs before calling in and calls `forget` when an element is
// removed.

use std::collections::{BTreeMap, BTreeSet};

use gametable_protocol::ElementId;

use crate::error::StateError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    name: String,
    members: BTreeSet<ElementId>,
}

impl Group {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &BTreeSet<ElementId> {
        &self.members
    }
}

#[derive(Clone, Debug, Default)]
pub struct GroupManager {
    groups: BTreeMap<String, Group>,
    membership: BTreeMap<ElementId, String>,
}

impl GroupManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `ids` into `group`, creating it if needed. Returns whether
    /// anything changed.
    pub fn add(&mut self, group: &str, ids: &[ElementId]) -> bool {
        let mut changed = false;
        for &id in ids {
            if self.membership.get(&id).map(String::as_str) == Some(group) {
                continue;
            }
            self.detach(id);
            self.groups
                .entry(group.to_string())
                .or_insert_with(|| Group {
                    name: group.to_string(),
                    members: BTreeSet::new(),
                })
                .members
                .insert(id);
            self.membership.insert(id, group.to_string());
            changed = true;
        }
        changed
    }

    /// Take `ids` out of whichever group they are in.
    pub fn remove(&mut self, ids: &[ElementId]) -> bool {
        let mut changed = false;
        for &id in ids {
            changed |= self.detach(id);
        }
        changed
    }

    /// Dissolve a group. Its members become ungrouped.
    pub fn delete(&mut self, group: &str) -> Result<(), StateError> {
        let removed = self
            .groups
            .remove(group)
            .ok_or_else(|| StateError::UnknownGroup(group.to_string()))?;
        for id in removed.members {
            self.membership.remove(&id);
        }
        Ok(())
    }

    /// Rename a group. Refused if `to` already exists, so two groups never
    /// merge by accident.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), StateError> {
        if from == to {
            return if self.groups.contains_key(from) {
                Ok(())
            } else {
                Err(StateError::UnknownGroup(from.to_string()))
            };
        }
        if self.groups.contains_key(to) {
            return Err(StateError::GroupExists(to.to_string()));
        }
        let mut group = self
            .groups
            .remove(from)
            .ok_or_else(|| StateError::UnknownGroup(from.to_string()))?;
        group.name = to.to_string();
        for id in &group.members {
            self.membership.insert(*id, to.to_string());
        }
        self.groups.insert(to.to_string(), group);
        Ok(())
    }

    pub fn group_of(&self, id: ElementId) -> Option<&str> {
        self.membership.get(&id).map(String::as_str)
    }

    pub fn get(&self, group: &str) -> Option<&Group> {
        self.groups.get(group)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Carry `old`'s membership over to `new` after a rekey.
    pub(crate) fn rekey(&mut self, old: ElementId, new: ElementId) {
        if let Some(name) = self.membership.remove(&old) {
            if let Some(group) = self.groups.get_mut(&name) {
                group.members.remove(&old);
                group.members.insert(new);
            }
            self.membership.insert(new, name);
        }
    }

    /// Drop a removed element from its group.
    pub(crate) fn forget(&mut self, id: ElementId) {
        self.detach(id);
    }

    pub(crate) fn clear(&mut self) {
        self.groups.clear();
        self.membership.clear();
    }

    fn detach(&mut self, id: ElementId) -> bool {
        let Some(name) = self.membership.remove(&id) else {
            return false;
        };
        if let Some(group) = self.groups.get_mut(&name) {
            group.members.remove(&id);
            if group.members.is_empty() {
                self.groups.remove(&name);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(ns: &[u64]) -> Vec<ElementId> {
        ns.iter().map(|n| ElementId(*n)).collect()
    }

    #[test]
    fn adding_moves_between_groups_and_prunes() {
        let mut groups = GroupManager::new();
        groups.add("party", &ids(&[1, 2]));
        groups.add("goblins", &ids(&[1]));
        assert_eq!(groups.group_of(ElementId(1)), Some("goblins"));
        assert_eq!(groups.get("party").unwrap().members().len(), 1);

        groups.add("goblins", &ids(&[2]));
        assert!(groups.get("party").is_none(), "empty group not pruned");
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn re_adding_to_same_group_is_no_change() {
        let mut groups = GroupManager::new();
        assert!(groups.add("a", &ids(&[1])));
        assert!(!groups.add("a", &ids(&[1])));
    }

    #[test]
    fn remove_and_delete() {
        let mut groups = GroupManager::new();
        groups.add("a", &ids(&[1, 2, 3]));
        assert!(groups.remove(&ids(&[2])));
        assert!(!groups.remove(&ids(&[2])));
        groups.delete("a").unwrap();
        assert!(groups.is_empty());
        assert_eq!(groups.group_of(ElementId(1)), None);
        assert!(matches!(groups.delete("a"), Err(StateError::UnknownGroup(_))));
    }

    #[test]
    fn rename_refuses_existing_target() {
        let mut groups = GroupManager::new();
        groups.add("a", &ids(&[1]));
        groups.add("b", &ids(&[2]));
        assert!(matches!(groups.rename("a", "b"), Err(StateError::GroupExists(_))));
        groups.rename("a", "c").unwrap();
        assert_eq!(groups.group_of(ElementId(1)), Some("c"));
        assert_eq!(groups.get("c").unwrap().name(), "c");
        assert!(matches!(groups.rename("zzz", "d"), Err(StateError::UnknownGroup(_))));
    }

    #[test]
    fn rekey_keeps_membership() {
        let mut groups = GroupManager::new();
        groups.add("a", &ids(&[5]));
        groups.rekey(ElementId(5), ElementId(50));
        assert_eq!(groups.group_of(ElementId(5)), None);
        assert_eq!(groups.group_of(ElementId(50)), Some("a"));
        assert!(groups.get("a").unwrap().members().contains(&ElementId(50)));
    }
}
