//! # session-core
//!
//! The composite entity index - THE LOGIC.
//!
//! A [`Session`] keeps one collection of GUID-identified entities and indexes
//! it three ways at once:
//! - a flat lookup table (GUID -> entity)
//! - a single-rooted [`Tree`] of nodes named after GUIDs
//! - an undirected [`Graph`] of relationships between GUID-keyed vertices
//!
//! All three are kept consistent under insertion and removal, and the whole
//! Session round-trips through a JSON interchange document or a binary
//! snapshot.
//!
//! ## Architectural Constraints
//!
//! - Deterministic: `BTreeMap` everywhere, no hash ordering leaks out
//! - Synchronous: no async, no threads, no I/O inside mutation paths
//! - GUIDs come from an injected [`GuidGenerator`], never from constructors

// =============================================================================
// MODULES
// =============================================================================

pub mod formats;
pub mod graph;
pub mod guid;
pub mod objects;
pub mod primitives;
pub mod session;
pub mod tree;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use guid::{Guid, GuidGenerator, RandomGuids, SequentialGuids, looks_like_guid};
pub use types::{Attribute, Conditions, SessionError};

// =============================================================================
// RE-EXPORTS: Index Structures
// =============================================================================

pub use graph::{Graph, Vertex};
pub use objects::{Color, Geometry, Objects, Point, Vector};
pub use session::Session;
pub use tree::{NodeRef, TraversalOrder, TraversalStrategy, Traverse, Tree, TreeNodeId};

// =============================================================================
// RE-EXPORTS: Formats
// =============================================================================

pub use formats::{
    FromJson, MAX_SNAPSHOT_SIZE, SessionSnapshot, SnapshotHeader, ToJson, session_from_bytes,
    session_to_bytes,
};
