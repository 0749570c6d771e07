// Errors raised by state mutators.
//
// Most of these are data faults from the network's point of view: a packet
// naming an element that is already gone, a resize to an out-of-range face
// size. The net crate's handlers log them and drop the one message. Local
// callers get them back as ordinary `Result`s.

use gametable_protocol::{ElementId, PlayerId};
use thiserror::Error;

use crate::map::MapVisibility;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("element {id} not found on the {map:?} map")]
    UnknownElement { id: ElementId, map: MapVisibility },

    #[error("element {0} failed its sanity bounds and was quarantined")]
    CorruptedElement(ElementId),

    #[error("player {0} is not in the roster")]
    UnknownPlayer(PlayerId),

    #[error("element type {name:?} has a zero dimension ({width}x{height})")]
    DegenerateType {
        name: String,
        width: u32,
        height: u32,
    },

    #[error("face size {0} is out of range")]
    InvalidFaceSize(f64),

    #[error("group {0:?} does not exist")]
    UnknownGroup(String),

    #[error("group {0:?} already exists")]
    GroupExists(String),

    #[error("snapshot is not valid JSON: {0}")]
    Snapshot(#[from] serde_json::Error),
}
