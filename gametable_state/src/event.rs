// Causality tags and change notifications.
//
// `NetworkEvent` is the tag a mutator receives when it is applying something
// that arrived over the network. The dispatcher builds a fresh one per
// inbound packet and passes `Some(&event)` down through the handler into the
// `GameTable` mutator; local callers pass `None`. The tag is never stored in
// the table. It lives exactly as long as the dispatch of one packet.
//
// `Change` is what listeners see after every mutation, together with the tag
// unmodified, so a UI can tell a remote edit from its own. Listeners get a
// shared reference only; they cannot reach back into the table. A listener
// that wants to react with a mutation of its own submits it through the node
// handle, which runs it as a separate, guarded step.

use std::sync::Arc;

use gametable_protocol::{
    Attribute, Background, ConnectionId, ElementId, GridMode, Layer, LineData, MessageKind,
    PlayerId, Point, Rect,
};

use crate::map::MapVisibility;

/// Marks a mutation as network-originated.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkEvent {
    pub connection: ConnectionId,
    /// Player behind `connection`, once it has logged in.
    pub player: Option<PlayerId>,
    pub kind: MessageKind,
    /// The packet exactly as received, tag included.
    pub raw: Arc<[u8]>,
}

impl NetworkEvent {
    pub fn new(
        connection: ConnectionId,
        player: Option<PlayerId>,
        kind: MessageKind,
        raw: &[u8],
    ) -> Self {
        Self {
            connection,
            player,
            kind,
            raw: Arc::from(raw),
        }
    }
}

/// One applied mutation, as reported to listeners.
#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    ElementAdded {
        map: MapVisibility,
        id: ElementId,
    },
    /// A corrupted element arrived and was quarantined instead of added.
    ElementQuarantined {
        map: MapVisibility,
        id: ElementId,
    },
    /// A local element gave up its ID to an incoming one.
    ElementRekeyed {
        map: MapVisibility,
        old: ElementId,
        new: ElementId,
    },
    ElementsRemoved {
        map: MapVisibility,
        ids: Vec<ElementId>,
    },
    ElementMoved {
        map: MapVisibility,
        id: ElementId,
        position: Point,
    },
    ElementRotated {
        map: MapVisibility,
        id: ElementId,
        angle: f64,
    },
    ElementFlipped {
        map: MapVisibility,
        id: ElementId,
        flip_h: bool,
        flip_v: bool,
    },
    ElementResized {
        map: MapVisibility,
        id: ElementId,
        face_size: f64,
    },
    ElementRetyped {
        map: MapVisibility,
        id: ElementId,
        type_name: String,
    },
    ElementRenamed {
        map: MapVisibility,
        id: ElementId,
        name: String,
    },
    ElementLayerChanged {
        map: MapVisibility,
        id: ElementId,
        layer: Layer,
    },
    AttributesSet {
        map: MapVisibility,
        id: ElementId,
        attributes: Vec<Attribute>,
    },
    AttributesRemoved {
        map: MapVisibility,
        id: ElementId,
        keys: Vec<String>,
    },
    LinesAdded {
        map: MapVisibility,
        lines: Vec<LineData>,
    },
    LinesCleared {
        map: MapVisibility,
    },
    LinesErased {
        map: MapVisibility,
        rect: Rect,
        removed: usize,
    },
    LockChanged {
        map: MapVisibility,
        ids: Vec<ElementId>,
        locked: bool,
    },
    GroupsChanged {
        map: MapVisibility,
    },
    MapReset {
        map: MapVisibility,
    },
    /// A snapshot finished loading into `map`.
    MapLoaded {
        map: MapVisibility,
    },
    GridModeChanged(GridMode),
    BackgroundChanged(Background),
    ActiveMapChanged(MapVisibility),
    PointerMoved {
        player: PlayerId,
        position: Point,
        pointing: bool,
    },
    PlayerRenamed {
        player: PlayerId,
        character_name: String,
    },
    RosterChanged,
}

/// Observer of table changes.
pub trait TableListener: Send {
    fn on_change(&mut self, change: &Change, tag: Option<&NetworkEvent>);
}

impl<F> TableListener for F
where
    F: FnMut(&Change, Option<&NetworkEvent>) + Send,
{
    fn on_change(&mut self, change: &Change, tag: Option<&NetworkEvent>) {
        self(change, tag)
    }
}
