//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the Session index:
//! - Payload attached to graph vertices and edges (`Attribute`, `Conditions`)
//! - Error types (`SessionError`)
//!
//! ## Determinism Guarantees
//!
//! All collections in this module are `BTreeMap`-based so that equality,
//! enumeration and serialization never depend on hash order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// ATTRIBUTE
// =============================================================================

/// Exact-match filter used by `vertices_where` / `edges_where`.
///
/// Every entry must be present, with an equal value, in a structured attribute.
pub type Conditions = BTreeMap<String, String>;

/// Payload carried by a graph vertex or edge.
///
/// Most attributes are plain strings. Callers that want to filter with
/// `vertices_where` / `edges_where` store a structured key/value map instead;
/// opaque strings never satisfy a non-empty condition set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attribute {
    /// Plain string payload, not inspected by the index.
    Opaque(String),
    /// Key/value payload, visible to attribute filters.
    Structured(BTreeMap<String, String>),
}

impl Attribute {
    /// Create an opaque attribute from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self::Opaque(s.into())
    }

    /// Create a structured attribute from key/value pairs.
    #[must_use]
    pub fn structured<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Structured(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// The string payload, if this attribute is opaque.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Opaque(s) => Some(s),
            Self::Structured(_) => None,
        }
    }

    /// The key/value payload, if this attribute is structured.
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Opaque(_) => None,
            Self::Structured(map) => Some(map),
        }
    }

    /// Check this attribute against a condition set.
    ///
    /// An empty condition set matches every attribute.
    #[must_use]
    pub fn matches(&self, conditions: &Conditions) -> bool {
        if conditions.is_empty() {
            return true;
        }
        match self {
            Self::Opaque(_) => false,
            Self::Structured(map) => conditions
                .iter()
                .all(|(key, value)| map.get(key) == Some(value)),
        }
    }
}

impl Default for Attribute {
    fn default() -> Self {
        Self::Opaque(String::new())
    }
}

impl From<&str> for Attribute {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Attribute {
    fn from(s: String) -> Self {
        Self::Opaque(s)
    }
}

impl From<BTreeMap<String, String>> for Attribute {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self::Structured(map)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opaque(s) => f.write_str(s),
            Self::Structured(map) => {
                let mut first = true;
                for (key, value) in map {
                    if !first {
                        f.write_str(";")?;
                    }
                    write!(f, "{}={}", key, value)?;
                    first = false;
                }
                Ok(())
            }
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Session index.
///
/// - Structural violations are returned immediately, never absorbed
/// - "Does it exist" queries return `false` / empty instead of an error
/// - The index never panics; all errors are recoverable
#[derive(Debug, Error)]
pub enum SessionError {
    /// An argument or document field has the wrong shape.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// A required key was not present.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation would break a structural invariant.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A malformed argument (unknown traversal name, self-loop, bad tag).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A persisted document lacks a required field.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
