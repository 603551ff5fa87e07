//! # GUID Module
//!
//! Identity for everything the Session indexes.
//!
//! GUIDs are never created ad hoc inside constructors. A `GuidGenerator` is
//! injected into the Session and every entity, graph and tree receives its
//! GUID explicitly, so tests can run with fully deterministic identifiers.

use crate::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// GUID
// =============================================================================

/// Globally unique identifier correlating an entity across the lookup table,
/// the Graph and the Tree.
///
/// Displays in canonical lowercase hyphenated form, which is also the key
/// used for Graph vertices and Tree node names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(Uuid);

impl Guid {
    /// The all-zero GUID.
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Build a GUID from a raw 128-bit value.
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Parse a GUID, returning `None` if the text is not a GUID.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text).ok().map(Self)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for Guid {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| SessionError::TypeMismatch(format!("not a GUID: {s:?}")))
    }
}

/// Check whether a string has the shape of a GUID.
#[must_use]
pub fn looks_like_guid(text: &str) -> bool {
    Guid::parse(text).is_some()
}

// =============================================================================
// GENERATORS
// =============================================================================

/// Source of fresh GUIDs.
///
/// Must be `Send` so a Session can move between threads as a unit.
pub trait GuidGenerator: fmt::Debug + Send {
    /// Produce the next GUID.
    fn next_guid(&mut self) -> Guid;
}

/// Random version-4 GUIDs. The default for every Session.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomGuids;

impl GuidGenerator for RandomGuids {
    fn next_guid(&mut self) -> Guid {
        Guid(Uuid::new_v4())
    }
}

/// Deterministic GUIDs counting up from a starting value.
///
/// Intended for tests and reproducible fixtures.
#[derive(Debug, Clone, Default)]
pub struct SequentialGuids {
    next: u128,
}

impl SequentialGuids {
    /// Start counting at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Start counting at the given value.
    #[must_use]
    pub fn starting_at(next: u128) -> Self {
        Self { next }
    }
}

impl GuidGenerator for SequentialGuids {
    fn next_guid(&mut self) -> Guid {
        let guid = Guid::from_u128(self.next);
        self.next = self.next.wrapping_add(1);
        guid
    }
}

// =============================================================================
// TESTS
// =============================================================================
