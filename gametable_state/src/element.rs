// Map elements and their type templates.
//
// A `MapElement` is one placed token or drawing anchor. It always points at
// an immutable `MapElementType` (size in cells, default face size, default
// layer) shared through an `Arc`, so retyping an element is a pointer swap.
// `TypeLibrary` owns the templates by name. Elements that arrive naming a
// type this participant has never registered get a placeholder template so
// they still take part in the map; the rendering side shows them as a
// missing-image box.
//
// Face size sanity: a face size that is not finite, not positive, or above
// `MAX_FACE_SIZE` is what a corrupt payload looks like. `from_data` never
// fails on it. The element is built with `corrupted = true` and the map
// quarantines it instead of adding it to the active set.
//
// Setters are `pub(crate)`. All mutation goes through `GameTable`, which is
// where listener notification and broadcast happen.
//
// See also: `map.rs` for the containing collection, `table.rs` for the
// mutators, `gametable_protocol::ElementData` for the wire shape.

use std::collections::BTreeMap;
use std::sync::Arc;

use gametable_protocol::{Attribute, ElementData, ElementId, Layer, Point};

use crate::error::StateError;

/// Largest face size a sane element can have.
pub const MAX_FACE_SIZE: f64 = 100.0;

/// Whether `face_size` is inside the sane range `(0, MAX_FACE_SIZE]`.
pub fn is_valid_face_size(face_size: f64) -> bool {
    face_size.is_finite() && face_size > 0.0 && face_size <= MAX_FACE_SIZE
}

/// Collapse runs of whitespace and lowercase, for name search.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Attribute keys compare case-insensitively and ignore whitespace,
/// underscores and hyphens, so "Hit Points", "hit_points" and "HITPOINTS"
/// are the same key.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

// ---------------------------------------------------------------------------
// MapElementType
// ---------------------------------------------------------------------------

/// Immutable template a map element is instantiated from.
#[derive(Clone, Debug, PartialEq)]
pub struct MapElementType {
    name: String,
    width: u32,
    height: u32,
    default_face_size: f64,
    layer: Layer,
    placeholder: bool,
}

impl MapElementType {
    /// Build a template. A zero width or height is a data fault.
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        default_face_size: f64,
        layer: Layer,
    ) -> Result<Self, StateError> {
        let name = name.into();
        if width == 0 || height == 0 {
            return Err(StateError::DegenerateType {
                name,
                width,
                height,
            });
        }
        if !is_valid_face_size(default_face_size) {
            return Err(StateError::InvalidFaceSize(default_face_size));
        }
        Ok(Self {
            name,
            width,
            height,
            default_face_size,
            layer,
            placeholder: false,
        })
    }

    /// Stand-in for a type name with no registered template.
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            width: 1,
            height: 1,
            default_face_size: 1.0,
            layer: Layer::Pog,
            placeholder: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn default_face_size(&self) -> f64 {
        self.default_face_size
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}

/// Registered element types, by name.
#[derive(Clone, Debug, Default)]
pub struct TypeLibrary {
    types: BTreeMap<String, Arc<MapElementType>>,
}

impl TypeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a template.
    pub fn register(&mut self, element_type: MapElementType) -> Arc<MapElementType> {
        let element_type = Arc::new(element_type);
        self.types
            .insert(element_type.name.clone(), Arc::clone(&element_type));
        element_type
    }

    pub fn get(&self, name: &str) -> Option<&Arc<MapElementType>> {
        self.types.get(name)
    }

    /// The registered template for `name`, or a fresh placeholder.
    pub fn resolve(&self, name: &str) -> Arc<MapElementType> {
        match self.types.get(name) {
            Some(t) => Arc::clone(t),
            None => {
                log::debug!("no element type named {name:?}, using placeholder");
                Arc::new(MapElementType::placeholder(name))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

// ---------------------------------------------------------------------------
// MapElement
// ---------------------------------------------------------------------------

/// A placed token or drawing anchor.
#[derive(Clone, Debug)]
pub struct MapElement {
    id: ElementId,
    element_type: Arc<MapElementType>,
    position: Point,
    layer: Layer,
    name: String,
    normalized_name: String,
    angle: f64,
    flip_h: bool,
    flip_v: bool,
    face_size: f64,
    /// Normalized key -> attribute with the key as originally spelled.
    attributes: BTreeMap<String, Attribute>,
    corrupted: bool,
}

impl MapElement {
    /// A freshly placed element with its type's defaults.
    pub fn new(id: ElementId, element_type: Arc<MapElementType>, position: Point) -> Self {
        let name = element_type.name().to_string();
        Self {
            id,
            layer: element_type.layer(),
            face_size: element_type.default_face_size(),
            normalized_name: normalize_name(&name),
            name,
            element_type,
            position,
            angle: 0.0,
            flip_h: false,
            flip_v: false,
            attributes: BTreeMap::new(),
            corrupted: false,
        }
    }

    /// Rebuild an element from its wire/file form. Never fails; an insane
    /// face size sets the corrupted flag instead.
    pub fn from_data(data: &ElementData, types: &TypeLibrary) -> Self {
        let corrupted = !is_valid_face_size(data.face_size);
        let mut element = Self {
            id: data.id,
            element_type: types.resolve(&data.type_name),
            position: data.position,
            layer: data.layer,
            name: data.name.clone(),
            normalized_name: normalize_name(&data.name),
            angle: data.angle,
            flip_h: data.flip_h,
            flip_v: data.flip_v,
            face_size: data.face_size,
            attributes: BTreeMap::new(),
            corrupted,
        };
        for attr in &data.attributes {
            element.insert_attribute(attr.clone());
        }
        element
    }

    pub fn to_data(&self) -> ElementData {
        ElementData {
            id: self.id,
            type_name: self.element_type.name().to_string(),
            position: self.position,
            layer: self.layer,
            name: self.name.clone(),
            angle: self.angle,
            flip_h: self.flip_h,
            flip_v: self.flip_v,
            face_size: self.face_size,
            attributes: self.attributes.values().cloned().collect(),
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn element_type(&self) -> &Arc<MapElementType> {
        &self.element_type
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn normalized_name(&self) -> &str {
        &self.normalized_name
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn flip_h(&self) -> bool {
        self.flip_h
    }

    pub fn flip_v(&self) -> bool {
        self.flip_v
    }

    pub fn face_size(&self) -> f64 {
        self.face_size
    }

    pub fn is_corrupted(&self) -> bool {
        self.corrupted
    }

    /// Attribute value by key, matched after normalization.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(&normalize_key(key))
            .map(|a| a.value.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    pub(crate) fn set_id(&mut self, id: ElementId) {
        self.id = id;
    }

    pub(crate) fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    pub(crate) fn set_angle(&mut self, angle: f64) {
        self.angle = angle.rem_euclid(360.0);
    }

    pub(crate) fn set_flip(&mut self, flip_h: bool, flip_v: bool) {
        self.flip_h = flip_h;
        self.flip_v = flip_v;
    }

    pub(crate) fn set_face_size(&mut self, face_size: f64) {
        self.face_size = face_size;
    }

    pub(crate) fn set_element_type(&mut self, element_type: Arc<MapElementType>) {
        self.element_type = element_type;
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
        self.normalized_name = normalize_name(name);
    }

    pub(crate) fn set_layer(&mut self, layer: Layer) {
        self.layer = layer;
    }

    pub(crate) fn insert_attribute(&mut self, attr: Attribute) {
        self.attributes.insert(normalize_key(&attr.key), attr);
    }

    pub(crate) fn remove_attribute(&mut self, key: &str) -> bool {
        self.attributes.remove(&normalize_key(key)).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goblin_type() -> MapElementType {
        MapElementType::new("goblin", 1, 1, 1.0, Layer::Pog).unwrap()
    }

    fn data(face_size: f64) -> ElementData {
        ElementData {
            id: ElementId(9),
            type_name: "goblin".into(),
            position: Point::new(3, 4),
            layer: Layer::Pog,
            name: "Grik  the   Small".into(),
            angle: 90.0,
            flip_h: true,
            flip_v: false,
            face_size,
            attributes: vec![Attribute::new("Hit Points", "7")],
        }
    }

    #[test]
    fn zero_dimension_type_is_rejected() {
        let err = MapElementType::new("flat", 0, 2, 1.0, Layer::Environment).unwrap_err();
        assert!(matches!(err, StateError::DegenerateType { width: 0, .. }));
    }

    #[test]
    fn unknown_type_resolves_to_placeholder() {
        let mut types = TypeLibrary::new();
        types.register(goblin_type());
        assert!(!types.resolve("goblin").is_placeholder());
        let missing = types.resolve("beholder");
        assert!(missing.is_placeholder());
        assert_eq!(missing.name(), "beholder");
    }

    #[test]
    fn from_data_round_trips() {
        let mut types = TypeLibrary::new();
        types.register(goblin_type());
        let d = data(2.0);
        let element = MapElement::from_data(&d, &types);
        assert!(!element.is_corrupted());
        assert_eq!(element.normalized_name(), "grik the small");
        assert_eq!(element.to_data(), d);
    }

    #[test]
    fn insane_face_size_marks_corrupted() {
        let types = TypeLibrary::new();
        for face_size in [1e6, 0.0, -1.0, f64::NAN, f64::INFINITY] {
            let element = MapElement::from_data(&data(face_size), &types);
            assert!(element.is_corrupted(), "face size {face_size} accepted");
        }
        assert!(!MapElement::from_data(&data(MAX_FACE_SIZE), &types).is_corrupted());
    }

    #[test]
    fn attribute_keys_are_normalized() {
        let types = TypeLibrary::new();
        let mut element = MapElement::from_data(&data(1.0), &types);
        assert_eq!(element.attribute("hit_points"), Some("7"));
        assert_eq!(element.attribute("HITPOINTS"), Some("7"));
        element.insert_attribute(Attribute::new("hit-points", "5"));
        assert_eq!(element.attributes().count(), 1);
        assert_eq!(element.attribute("Hit Points"), Some("5"));
        assert!(element.remove_attribute("hit points"));
        assert_eq!(element.attribute("hitpoints"), None);
    }

    #[test]
    fn new_element_takes_type_defaults() {
        let t = Arc::new(MapElementType::new("door", 1, 2, 2.5, Layer::Environment).unwrap());
        let element = MapElement::new(ElementId(1), t, Point::default());
        assert_eq!(element.layer(), Layer::Environment);
        assert_eq!(element.face_size(), 2.5);
        assert_eq!(element.name(), "door");
    }

    #[test]
    fn angle_wraps() {
        let types = TypeLibrary::new();
        let mut element = MapElement::from_data(&data(1.0), &types);
        element.set_angle(-90.0);
        assert_eq!(element.angle(), 270.0);
    }
}
