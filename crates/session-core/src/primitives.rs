//! # Primitives
//!
//! Fixed names, tags and limits shared by the index and its formats.
//! These are compiled in and immutable at runtime.

/// Relationship type used when a caller does not name one.
pub const DEFAULT_RELATIONSHIP: &str = "default";

/// Default Session name.
pub const DEFAULT_SESSION_NAME: &str = "my_session";

/// Default name of the entity collection.
pub const DEFAULT_OBJECTS_NAME: &str = "my_objects";

/// Default name of a standalone Graph.
pub const DEFAULT_GRAPH_NAME: &str = "my_graph";

/// Default name of a standalone Tree.
pub const DEFAULT_TREE_NAME: &str = "my_tree";

// =============================================================================
// DOCUMENT TAGS
// =============================================================================

/// `"type"` values written into interchange documents.
pub mod tags {
    pub const SESSION: &str = "Session";
    pub const OBJECTS: &str = "Objects";
    pub const GRAPH: &str = "Graph";
    pub const TREE: &str = "Tree";
    pub const TREE_NODE: &str = "TreeNode";
    pub const POINT: &str = "Point";
    pub const VECTOR: &str = "Vector";
    pub const COLOR: &str = "Color";
}

// =============================================================================
// BINARY SNAPSHOT
// =============================================================================

/// Magic bytes for the binary snapshot header.
///
/// - File Header = Magic Bytes ("SESN") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"SESN";

/// Current binary snapshot version.
///
/// Increment this when making breaking changes to the snapshot layout.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum nesting depth accepted when decoding a tree document.
///
/// Documents nested deeper than this are rejected before deserialization,
/// which keeps the derived (recursive) node decoder within stack limits.
pub const MAX_TREE_DEPTH: usize = 128;
