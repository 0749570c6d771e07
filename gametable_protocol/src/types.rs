// Core value types for the replication protocol.
//
// These are the plain data shapes that travel on the wire and that the state
// crate (`gametable_state`) builds its richer types from: compact integer IDs
// for elements, players and connections, integer map geometry, and the
// `*Data` structs that carry a whole element, line or player in one message.
//
// All types derive serde so the state crate can reuse them in map snapshots
// (see `gametable_state::snapshot`). Their binary wire layouts live in
// `wire.rs`, not here.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Wire identity of a replicated map element. Allocated by whichever process
/// places the element; see `gametable_state::identity` for collision rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Host-assigned player ID. The host is always 0, joiners count up from 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub i32);

impl PlayerId {
    /// The host's fixed ID.
    pub const HOST: PlayerId = PlayerId(0);
    /// Sentinel for a local player that has not been assigned an ID yet.
    pub const UNASSIGNED: PlayerId = PlayerId(-1);

    pub fn is_assigned(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Process-local handle for one peer connection. Never sent on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Integer map coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, `origin` inclusive, extending `width`/`height`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            origin: Point::new(x, y),
            width,
            height,
        }
    }

    /// Inclusive on all four edges. Origin plus extent can overflow `i32`,
    /// so the comparison runs in `i64`.
    pub fn contains(&self, p: Point) -> bool {
        let (x, y) = (i64::from(p.x), i64::from(p.y));
        let (left, top) = (i64::from(self.origin.x), i64::from(self.origin.y));
        x >= left
            && y >= top
            && x <= left + i64::from(self.width)
            && y <= top + i64::from(self.height)
    }
}

/// 32-bit ARGB pen color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Color = Color(0xFF00_0000);
    pub const RED: Color = Color(0xFFFF_0000);
    pub const BLUE: Color = Color(0xFF00_00FF);
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Drawing layer of a map element, bottom to top.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Layer {
    Underlay,
    Environment,
    Overlay,
    Pog,
}

/// Grid overlay drawn under the map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridMode {
    None,
    #[default]
    Square,
    Hex,
}

/// Built-in background fills.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackgroundColor {
    #[default]
    Default,
    Black,
    White,
    Grass,
    Stone,
    Water,
    Wood,
}

/// Map background: either a fill color or a tiled element type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Background {
    Color(BackgroundColor),
    ElementType(String),
}

impl Default for Background {
    fn default() -> Self {
        Background::Color(BackgroundColor::Default)
    }
}

/// Why the host refused a join request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    WrongPassword,
    VersionMismatch,
    SessionFull,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::WrongPassword => write!(f, "incorrect password"),
            RejectReason::VersionMismatch => write!(f, "protocol version mismatch"),
            RejectReason::SessionFull => write!(f, "session is full"),
        }
    }
}

// ---------------------------------------------------------------------------
// Composite payloads
// ---------------------------------------------------------------------------

/// One string attribute on an element, with the key as the user typed it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Everything needed to recreate a map element on another participant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementData {
    pub id: ElementId,
    /// Name of the `MapElementType` template (resolved by the receiver).
    pub type_name: String,
    pub position: Point,
    pub layer: Layer,
    pub name: String,
    pub angle: f64,
    pub flip_h: bool,
    pub flip_v: bool,
    pub face_size: f64,
    pub attributes: Vec<Attribute>,
}

/// An immutable drawn line segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineData {
    pub start: Point,
    pub end: Point,
    pub color: Color,
}

impl LineData {
    pub fn new(start: Point, end: Point, color: Color) -> Self {
        Self { start, end, color }
    }
}

/// Public roster entry for one participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerData {
    pub player_name: String,
    pub character_name: String,
    pub id: PlayerId,
    pub host: bool,
}
