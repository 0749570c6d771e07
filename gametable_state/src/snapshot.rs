// Map snapshots for save/load.
//
// `MapSnapshot` is the serde form of one map's replicated content. The host
// application's persistence layer maps its own document format onto this
// struct; the table only ever sees snapshots. JSON helpers are provided for
// tests and simple tools.
//
// IDs inside a snapshot are file-local. `GameTable::load_snapshot` assigns
// fresh IDs and translates locks and groups through a conversion table, so a
// snapshot saved in one session loads cleanly into another.

use std::collections::BTreeMap;

use gametable_protocol::{Background, ElementData, ElementId, GridMode, LineData};
use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::map::GameTableMap;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSnapshot {
    pub elements: Vec<ElementData>,
    pub lines: Vec<LineData>,
    pub locked: Vec<ElementId>,
    pub groups: BTreeMap<String, Vec<ElementId>>,
    pub grid_mode: GridMode,
    pub background: Background,
}

impl MapSnapshot {
    pub(crate) fn capture(map: &GameTableMap, grid_mode: GridMode, background: &Background) -> Self {
        Self {
            elements: map.elements().iter().map(|e| e.to_data()).collect(),
            lines: map.lines().to_vec(),
            locked: map.locked().iter().copied().collect(),
            groups: map
                .groups()
                .iter()
                .map(|g| (g.name().to_string(), g.members().iter().copied().collect()))
                .collect(),
            grid_mode,
            background: background.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, StateError> {
        Ok(serde_json::from_str(json)?)
    }
}
