//! # JSON Interchange
//!
//! Document shape shared with the other Session implementations.
//!
//! Each document kind is a plain serde struct that lives next to the type it
//! describes (`GraphDocument` in `graph.rs`, `PointDocument` in `objects.rs`,
//! ...), tagged with `#[serde(tag = "type")]`. This module holds the pieces
//! they share: the [`ToJson`] / [`FromJson`] traits, the attribute and number
//! encodings, and the mapping from serde errors to [`SessionError`].
//!
//! Decoding reports the first missing or mistyped field instead of building a
//! partial value. Only the outermost `"type"` tag is checked; nested tags are
//! written but not validated.
//!
//! The one exception is `Color`, whose decoder returns `Option` (see
//! `objects::Color::from_json_data`).

use crate::{Attribute, SessionError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// TRAITS
// =============================================================================

/// Encode a value as an interchange document.
pub trait ToJson {
    /// Build the document.
    fn to_json_data(&self) -> Value;
}

/// Decode a value from an interchange document.
pub trait FromJson: Sized {
    /// Rebuild the value, failing on the first missing or mistyped field.
    fn from_json_data(data: &Value) -> Result<Self, SessionError>;
}

// =============================================================================
// ENCODE / DECODE
// =============================================================================

/// Field names that can appear in a `MissingField` error.
const FIELDS: &[&str] = &[
    "a", "attribute", "b", "children", "count", "edges", "g", "graph", "guid", "index", "name",
    "objects", "pointcolor", "points", "r", "root", "tree", "type", "v0", "v1", "vectors",
    "vertices", "width", "x", "y", "z",
];

/// Serialize a document struct.
///
/// Documents hold only strings, numbers and string-keyed maps, which always
/// encode.
pub(crate) fn encode<T: Serialize>(document: &T) -> Value {
    serde_json::to_value(document).unwrap_or(Value::Null)
}

/// Check the outer `"type"` tag, then deserialize the document struct.
pub(crate) fn decode<T: DeserializeOwned>(
    data: &Value,
    expected: &'static str,
) -> Result<T, SessionError> {
    check_type(data, expected)?;
    T::deserialize(data).map_err(document_error)
}

/// Map a serde error onto the Session error vocabulary.
///
/// `missing field` becomes `MissingField`; everything else is a shape
/// problem and becomes `TypeMismatch`.
pub(crate) fn document_error(err: serde_json::Error) -> SessionError {
    let message = err.to_string();
    let missing = message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split('`').next())
        .and_then(|field| FIELDS.iter().copied().find(|known| *known == field));
    match missing {
        Some(field) => SessionError::MissingField(field),
        None => SessionError::TypeMismatch(message),
    }
}

/// Check the `"type"` tag of a document.
///
/// A missing tag is tolerated (older writers omit it); a different tag is not.
pub(crate) fn check_type(data: &Value, expected: &'static str) -> Result<(), SessionError> {
    match data.get("type") {
        None => Ok(()),
        Some(Value::String(found)) if found == expected => Ok(()),
        Some(found) => Err(SessionError::InvalidArgument(format!(
            "expected a {expected} document, found type {found}"
        ))),
    }
}

// =============================================================================
// ATTRIBUTE ENCODING
// =============================================================================

/// Wire form of an [`Attribute`]: a string, a string map, or `null`.
///
/// `null` decodes as the empty opaque attribute and is never written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum AttributeDocument {
    Opaque(String),
    Structured(BTreeMap<String, String>),
    Empty,
}

impl From<&Attribute> for AttributeDocument {
    fn from(attribute: &Attribute) -> Self {
        match attribute {
            Attribute::Opaque(s) => Self::Opaque(s.clone()),
            Attribute::Structured(map) => Self::Structured(map.clone()),
        }
    }
}

impl From<AttributeDocument> for Attribute {
    fn from(document: AttributeDocument) -> Self {
        match document {
            AttributeDocument::Opaque(s) => Self::Opaque(s),
            AttributeDocument::Structured(map) => Self::Structured(map),
            AttributeDocument::Empty => Self::default(),
        }
    }
}

// =============================================================================
// NUMBER ENCODING
// =============================================================================

/// `f64` fields that survive non-finite values.
///
/// JSON has no NaN or infinity, so those are written as the strings `"NaN"`,
/// `"Infinity"` and `"-Infinity"` and read back from the same spellings.
/// Finite values are plain JSON numbers.
pub(crate) mod number {
    use serde::de::{Error, Unexpected};
    use serde::{Deserialize, Deserializer, Serializer};

    const NAN: &str = "NaN";
    const INFINITY: &str = "Infinity";
    const NEG_INFINITY: &str = "-Infinity";

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub(crate) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str(NAN)
        } else if value.is_sign_positive() {
            serializer.serialize_str(INFINITY)
        } else {
            serializer.serialize_str(NEG_INFINITY)
        }
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                NAN => Ok(f64::NAN),
                INFINITY => Ok(f64::INFINITY),
                NEG_INFINITY => Ok(f64::NEG_INFINITY),
                other => Err(D::Error::invalid_value(Unexpected::Str(other), &"a number")),
            },
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
