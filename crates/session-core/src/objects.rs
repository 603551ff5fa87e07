//! # Entity Records
//!
//! The payloads a Session indexes. The index only relies on `guid()` and
//! `name()`; every other field is carried through serialization untouched.

use crate::formats::json::{FromJson, ToJson, decode, encode, number};
use crate::guid::{GuidGenerator, RandomGuids};
use crate::primitives::{DEFAULT_OBJECTS_NAME, tags};
use crate::{Guid, SessionError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// =============================================================================
// COLOR
// =============================================================================

/// RGBA color with byte channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub guid: Guid,
    pub name: String,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Create a color.
    #[must_use]
    pub fn new(guid: Guid, name: impl Into<String>, r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            guid,
            name: name.into(),
            r,
            g,
            b,
            a,
        }
    }

    /// Opaque white.
    #[must_use]
    pub fn white(guid: Guid) -> Self {
        Self::new(guid, "white", 255, 255, 255, 255)
    }

    /// Opaque black.
    #[must_use]
    pub fn black(guid: Guid) -> Self {
        Self::new(guid, "black", 0, 0, 0, 255)
    }

    /// Decode a color document.
    ///
    /// Returns `None` when any channel is missing or is not a byte, instead
    /// of building a partial color. The name defaults to `"my_color"` and a
    /// missing or malformed GUID falls back to nil.
    #[must_use]
    pub fn from_json_data(data: &Value) -> Option<Self> {
        let channel = |key: &str| {
            data.get(key)
                .and_then(Value::as_u64)
                .and_then(|v| u8::try_from(v).ok())
        };
        Some(Self {
            guid: data
                .get("guid")
                .and_then(Value::as_str)
                .and_then(Guid::parse)
                .unwrap_or_else(Guid::nil),
            name: data
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("my_color")
                .to_string(),
            r: channel("r")?,
            g: channel("g")?,
            b: channel("b")?,
            a: channel("a")?,
        })
    }
}

impl ToJson for Color {
    fn to_json_data(&self) -> Value {
        json!({
            "type": tags::COLOR,
            "guid": self.guid.to_string(),
            "name": self.name,
            "r": self.r,
            "g": self.g,
            "b": self.b,
            "a": self.a,
        })
    }
}

// =============================================================================
// POINT
// =============================================================================

/// A 3D point with display width and color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub guid: Guid,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub width: f64,
    pub pointcolor: Color,
}

impl Point {
    /// Create a point named `"my_point"` with width 1 and a white color.
    ///
    /// The color shares the point's GUID.
    #[must_use]
    pub fn new(guid: Guid, x: f64, y: f64, z: f64) -> Self {
        Self {
            guid,
            name: "my_point".to_string(),
            x,
            y,
            z,
            width: 1.0,
            pointcolor: Color::white(guid),
        }
    }

    /// Rename the point.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Wire form of a [`Point`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Point")]
pub(crate) struct PointDocument {
    guid: Guid,
    name: String,
    #[serde(with = "number")]
    x: f64,
    #[serde(with = "number")]
    y: f64,
    #[serde(with = "number")]
    z: f64,
    #[serde(with = "number")]
    width: f64,
    /// Decoded by `Color::from_json_data`, which is lenient about its own
    /// fields but all-or-nothing about the channels.
    pointcolor: Value,
}

impl From<&Point> for PointDocument {
    fn from(point: &Point) -> Self {
        Self {
            guid: point.guid,
            name: point.name.clone(),
            x: point.x,
            y: point.y,
            z: point.z,
            width: point.width,
            pointcolor: point.pointcolor.to_json_data(),
        }
    }
}

impl TryFrom<PointDocument> for Point {
    type Error = SessionError;

    fn try_from(doc: PointDocument) -> Result<Self, Self::Error> {
        let pointcolor =
            Color::from_json_data(&doc.pointcolor).ok_or(SessionError::MissingField("pointcolor"))?;
        Ok(Self {
            guid: doc.guid,
            name: doc.name,
            x: doc.x,
            y: doc.y,
            z: doc.z,
            width: doc.width,
            pointcolor,
        })
    }
}

impl ToJson for Point {
    fn to_json_data(&self) -> Value {
        encode(&PointDocument::from(self))
    }
}

impl FromJson for Point {
    fn from_json_data(data: &Value) -> Result<Self, SessionError> {
        decode::<PointDocument>(data, tags::POINT)?.try_into()
    }
}

// =============================================================================
// VECTOR
// =============================================================================

/// A 3D direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub guid: Guid,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector {
    /// Create a vector named `"my_vector"`.
    #[must_use]
    pub fn new(guid: Guid, x: f64, y: f64, z: f64) -> Self {
        Self {
            guid,
            name: "my_vector".to_string(),
            x,
            y,
            z,
        }
    }

    /// Rename the vector.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Wire form of a [`Vector`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Vector")]
pub(crate) struct VectorDocument {
    guid: Guid,
    name: String,
    #[serde(with = "number")]
    x: f64,
    #[serde(with = "number")]
    y: f64,
    #[serde(with = "number")]
    z: f64,
}

impl From<&Vector> for VectorDocument {
    fn from(vector: &Vector) -> Self {
        Self {
            guid: vector.guid,
            name: vector.name.clone(),
            x: vector.x,
            y: vector.y,
            z: vector.z,
        }
    }
}

impl From<VectorDocument> for Vector {
    fn from(doc: VectorDocument) -> Self {
        Self {
            guid: doc.guid,
            name: doc.name,
            x: doc.x,
            y: doc.y,
            z: doc.z,
        }
    }
}

impl ToJson for Vector {
    fn to_json_data(&self) -> Value {
        encode(&VectorDocument::from(self))
    }
}

impl FromJson for Vector {
    fn from_json_data(data: &Value) -> Result<Self, SessionError> {
        decode::<VectorDocument>(data, tags::VECTOR).map(Vector::from)
    }
}

// =============================================================================
// GEOMETRY
// =============================================================================

/// Any entity the Session can index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point(Point),
    Vector(Vector),
}

impl Geometry {
    /// GUID of the entity.
    #[must_use]
    pub fn guid(&self) -> Guid {
        match self {
            Self::Point(p) => p.guid,
            Self::Vector(v) => v.guid,
        }
    }

    /// Display name of the entity.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Point(p) => &p.name,
            Self::Vector(v) => &v.name,
        }
    }

    /// Rename the entity.
    pub fn set_name(&mut self, name: impl Into<String>) {
        match self {
            Self::Point(p) => p.name = name.into(),
            Self::Vector(v) => v.name = name.into(),
        }
    }

    /// Lowercase kind, used as the graph attribute prefix.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Point(_) => "point",
            Self::Vector(_) => "vector",
        }
    }

    /// The point payload, if any.
    #[must_use]
    pub fn as_point(&self) -> Option<&Point> {
        match self {
            Self::Point(p) => Some(p),
            Self::Vector(_) => None,
        }
    }

    /// The vector payload, if any.
    #[must_use]
    pub fn as_vector(&self) -> Option<&Vector> {
        match self {
            Self::Vector(v) => Some(v),
            Self::Point(_) => None,
        }
    }
}

impl From<Point> for Geometry {
    fn from(point: Point) -> Self {
        Self::Point(point)
    }
}

impl From<Vector> for Geometry {
    fn from(vector: Vector) -> Self {
        Self::Vector(vector)
    }
}

impl ToJson for Geometry {
    fn to_json_data(&self) -> Value {
        match self {
            Self::Point(p) => p.to_json_data(),
            Self::Vector(v) => v.to_json_data(),
        }
    }
}

// =============================================================================
// OBJECTS
// =============================================================================

/// Ordered collection of entities owned by a Session.
#[derive(Debug, Clone, PartialEq)]
pub struct Objects {
    name: String,
    guid: Guid,
    items: Vec<Geometry>,
}

impl Objects {
    /// Create an empty collection named `"my_objects"`.
    #[must_use]
    pub fn new(guid: Guid) -> Self {
        Self {
            name: DEFAULT_OBJECTS_NAME.to_string(),
            guid,
            items: Vec::new(),
        }
    }

    /// Collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection GUID.
    #[must_use]
    pub fn guid(&self) -> Guid {
        self.guid
    }

    /// Entities in insertion order.
    #[must_use]
    pub fn items(&self) -> &[Geometry] {
        &self.items
    }

    /// Points in insertion order.
    pub fn points(&self) -> impl Iterator<Item = &Point> + '_ {
        self.items.iter().filter_map(Geometry::as_point)
    }

    /// Vectors in insertion order.
    pub fn vectors(&self) -> impl Iterator<Item = &Vector> + '_ {
        self.items.iter().filter_map(Geometry::as_vector)
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn get(&self, position: usize) -> Option<&Geometry> {
        self.items.get(position)
    }

    pub(crate) fn get_mut(&mut self, position: usize) -> Option<&mut Geometry> {
        self.items.get_mut(position)
    }

    /// Append an entity. Returns its position.
    pub(crate) fn push(&mut self, geometry: Geometry) -> usize {
        self.items.push(geometry);
        self.items.len() - 1
    }

    pub(crate) fn remove(&mut self, position: usize) -> Option<Geometry> {
        (position < self.items.len()).then(|| self.items.remove(position))
    }

    pub(crate) fn restore(name: String, guid: Guid, items: Vec<Geometry>) -> Self {
        Self { name, guid, items }
    }
}

/// Wire form of [`Objects`].
///
/// Points and vectors are separate arrays, so the relative order between the
/// two kinds is not preserved. A missing `guid` is filled in on decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Objects")]
pub(crate) struct ObjectsDocument {
    name: String,
    #[serde(default)]
    guid: Option<Guid>,
    #[serde(default)]
    points: Option<Vec<PointDocument>>,
    #[serde(default)]
    vectors: Option<Vec<VectorDocument>>,
}

impl ObjectsDocument {
    /// Build the collection, calling `fallback` only if the document has no GUID.
    pub(crate) fn into_objects(
        self,
        fallback: impl FnOnce() -> Guid,
    ) -> Result<Objects, SessionError> {
        let mut items = Vec::new();
        for point in self.points.unwrap_or_default() {
            items.push(Geometry::Point(point.try_into()?));
        }
        for vector in self.vectors.unwrap_or_default() {
            items.push(Geometry::Vector(vector.into()));
        }
        let guid = self.guid.unwrap_or_else(fallback);
        Ok(Objects::restore(self.name, guid, items))
    }
}

impl From<&Objects> for ObjectsDocument {
    fn from(objects: &Objects) -> Self {
        Self {
            name: objects.name.clone(),
            guid: Some(objects.guid),
            points: Some(objects.points().map(PointDocument::from).collect()),
            vectors: Some(objects.vectors().map(VectorDocument::from).collect()),
        }
    }
}

impl ToJson for Objects {
    fn to_json_data(&self) -> Value {
        encode(&ObjectsDocument::from(self))
    }
}

impl FromJson for Objects {
    /// A document without a `guid` gets a random one.
    fn from_json_data(data: &Value) -> Result<Self, SessionError> {
        decode::<ObjectsDocument>(data, tags::OBJECTS)?
            .into_objects(|| RandomGuids.next_guid())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_defaults() {
        let point = Point::new(Guid::from_u128(1), 1.0, 2.0, 3.0);
        assert_eq!(point.name, "my_point");
        assert_eq!(point.width, 1.0);
        assert_eq!(point.pointcolor.name, "white");
        assert_eq!((point.pointcolor.r, point.pointcolor.a), (255, 255));
    }

    #[test]
    fn point_json_roundtrip_keeps_exact_floats() {
        let point = Point::new(Guid::from_u128(2), 0.1, -1e-300, 12345.678)
            .with_name("precise");
        let data = point.to_json_data();
        assert_eq!(data["type"], "Point");

        let restored = Point::from_json_data(&data).expect("decode");
        assert_eq!(restored, point);
        assert_eq!(restored.y.to_bits(), point.y.to_bits());
    }

    #[test]
    fn point_non_finite_coordinates_roundtrip() {
        let point = Point::new(Guid::from_u128(2), f64::NAN, f64::INFINITY, 0.0);
        let data = point.to_json_data();
        assert_eq!(data["x"], "NaN");
        assert_eq!(data["y"], "Infinity");

        let text = serde_json::to_string(&data).expect("encode");
        let parsed: Value = serde_json::from_str(&text).expect("parse");
        let restored = Point::from_json_data(&parsed).expect("decode");
        assert!(restored.x.is_nan());
        assert_eq!(restored.y, f64::INFINITY);
        assert_eq!(restored.z, 0.0);
    }

    #[test]
    fn point_missing_coordinate_fails() {
        let mut data = Point::new(Guid::from_u128(3), 0.0, 0.0, 0.0).to_json_data();
        if let Some(map) = data.as_object_mut() {
            map.remove("z");
        }
        assert!(matches!(
            Point::from_json_data(&data),
            Err(SessionError::MissingField("z"))
        ));
    }

    #[test]
    fn point_with_broken_color_fails() {
        let mut data = Point::new(Guid::from_u128(3), 0.0, 0.0, 0.0).to_json_data();
        data["pointcolor"] = json!({"r": 1, "g": 2, "b": 3});
        assert!(matches!(
            Point::from_json_data(&data),
            Err(SessionError::MissingField("pointcolor"))
        ));
    }

    #[test]
    fn wrong_type_tag_rejected() {
        let data = Vector::new(Guid::from_u128(4), 1.0, 0.0, 0.0).to_json_data();
        assert!(matches!(
            Point::from_json_data(&data),
            Err(SessionError::InvalidArgument(_))
        ));
    }

    #[test]
    fn color_decode_returns_none_on_missing_channel() {
        assert!(Color::from_json_data(&json!({"r": 1, "g": 2, "b": 3})).is_none());
        assert!(Color::from_json_data(&json!({"r": 1, "g": 2, "b": 3, "a": 300})).is_none());

        let color = Color::from_json_data(&json!({"r": 1, "g": 2, "b": 3, "a": 4}))
            .expect("complete color");
        assert_eq!((color.r, color.g, color.b, color.a), (1, 2, 3, 4));
        assert_eq!(color.guid, Guid::nil());
    }

    #[test]
    fn color_roundtrip() {
        let color = Color::black(Guid::from_u128(5));
        assert_eq!(Color::from_json_data(&color.to_json_data()), Some(color));
    }

    #[test]
    fn geometry_accessors() {
        let mut geometry = Geometry::from(Vector::new(Guid::from_u128(6), 0.0, 1.0, 0.0));
        assert_eq!(geometry.kind(), "vector");
        assert_eq!(geometry.name(), "my_vector");
        geometry.set_name("up");
        assert_eq!(geometry.name(), "up");
        assert_eq!(geometry.guid(), Guid::from_u128(6));
        assert!(geometry.as_point().is_none());
    }

    #[test]
    fn objects_roundtrip_groups_by_kind() {
        let mut objects = Objects::new(Guid::from_u128(10));
        objects.push(Point::new(Guid::from_u128(11), 1.0, 0.0, 0.0).into());
        objects.push(Vector::new(Guid::from_u128(12), 0.0, 0.0, 1.0).into());
        objects.push(Point::new(Guid::from_u128(13), 2.0, 0.0, 0.0).into());

        let data = objects.to_json_data();
        assert_eq!(data["points"].as_array().map(Vec::len), Some(2));
        assert_eq!(data["vectors"].as_array().map(Vec::len), Some(1));

        let restored = Objects::from_json_data(&data).expect("decode");
        assert_eq!(restored.name(), "my_objects");
        assert_eq!(restored.len(), 3);
        assert_eq!(restored.points().count(), 2);
        assert_eq!(restored.vectors().count(), 1);
    }

    #[test]
    fn objects_without_vectors_key_decodes() {
        let data = json!({
            "type": "Objects",
            "name": "legacy",
            "guid": Guid::from_u128(1).to_string(),
            "points": [],
        });
        let objects = Objects::from_json_data(&data).expect("decode");
        assert!(objects.is_empty());
    }

    #[test]
    fn objects_without_guid_get_one() {
        let data = json!({"type": "Objects", "name": "legacy", "points": []});
        let objects = Objects::from_json_data(&data).expect("decode");
        assert_ne!(objects.guid(), Guid::nil());

        let doc: ObjectsDocument = decode(&data, tags::OBJECTS).expect("document");
        let objects = doc.into_objects(|| Guid::from_u128(42)).expect("objects");
        assert_eq!(objects.guid(), Guid::from_u128(42));
    }

    #[test]
    fn objects_guid_in_document_wins() {
        let data = Objects::new(Guid::from_u128(7)).to_json_data();
        let doc: ObjectsDocument = decode(&data, tags::OBJECTS).expect("document");
        let objects = doc
            .into_objects(|| Guid::from_u128(42))
            .expect("objects");
        assert_eq!(objects.guid(), Guid::from_u128(7));
    }
}
