//! # Persistence Format
//!
//! Binary snapshot of a whole Session.
//!
//! File I/O operations are in the app layer; this module only turns a
//! Session into bytes and back.
//!
//! Format: Header (5 bytes) + postcard-serialized [`SessionSnapshot`].
//! - 4 bytes: Magic ("SESN")
//! - 1 byte: Version
//!
//! ## Limits
//!
//! Size and header are validated before the payload is handed to postcard,
//! so corrupted or oversized input fails without allocating for it.

use crate::objects::{Geometry, Objects};
use crate::primitives;
use crate::{Attribute, Graph, Guid, RandomGuids, Session, SessionError, Tree, TreeNodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum accepted snapshot size.
pub const MAX_SNAPSHOT_SIZE: usize = 500 * 1024 * 1024; // 500 MB

/// Header length; also the minimum snapshot size.
const HEADER_SIZE: usize = 5;

// =============================================================================
// HEADER
// =============================================================================

/// Leading bytes of a snapshot: [`primitives::MAGIC_BYTES`] followed by one
/// version byte. The magic never varies, so only the version is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: u8,
}

impl SnapshotHeader {
    /// The header this build writes and reads.
    pub const CURRENT: Self = Self {
        version: primitives::FORMAT_VERSION,
    };

    #[must_use]
    pub fn encode(self) -> [u8; HEADER_SIZE] {
        let [m0, m1, m2, m3] = *primitives::MAGIC_BYTES;
        [m0, m1, m2, m3, self.version]
    }

    /// Read the header at the start of `bytes`.
    ///
    /// Fails unless the magic matches and the version is [`Self::CURRENT`]'s.
    pub fn decode(bytes: &[u8]) -> Result<Self, SessionError> {
        let not_a_snapshot =
            || SessionError::SerializationError("not a session snapshot".to_string());

        let (magic, rest) = bytes.split_first_chunk::<4>().ok_or_else(not_a_snapshot)?;
        if magic != primitives::MAGIC_BYTES {
            return Err(not_a_snapshot());
        }
        let version = *rest.first().ok_or_else(|| {
            SessionError::SerializationError("snapshot header ends before the version".to_string())
        })?;
        if version != Self::CURRENT.version {
            return Err(SessionError::SerializationError(format!(
                "snapshot format {version} cannot be read; this build reads format {}",
                Self::CURRENT.version
            )));
        }
        Ok(Self { version })
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Flat, serde-friendly image of a Session.
///
/// Tree nodes are stored in pre-order as `(name, parent position)`, so every
/// parent precedes its children. Only nodes reachable from the root are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub name: String,
    pub guid: Guid,
    pub objects_name: String,
    pub objects_guid: Guid,
    pub entities: Vec<Geometry>,
    pub tree_name: String,
    pub tree_guid: Guid,
    pub tree_nodes: Vec<(String, Option<usize>)>,
    pub graph_name: String,
    pub graph_guid: Guid,
    /// Vertices in index order.
    pub vertices: Vec<(String, Attribute)>,
    /// Edges in canonical order.
    pub edges: Vec<(String, String, Attribute)>,
}

impl SessionSnapshot {
    /// Capture the current state of a session.
    #[must_use]
    pub fn capture(session: &Session) -> Self {
        let tree = session.tree();
        let mut positions: BTreeMap<TreeNodeId, usize> = BTreeMap::new();
        let mut tree_nodes = Vec::new();
        for node in tree.nodes() {
            let parent = node
                .parent()
                .and_then(|parent| positions.get(&parent.id()).copied());
            positions.insert(node.id(), tree_nodes.len());
            tree_nodes.push((node.name().to_string(), parent));
        }

        let graph = session.graph();
        Self {
            name: session.name().to_string(),
            guid: session.guid(),
            objects_name: session.objects().name().to_string(),
            objects_guid: session.objects().guid(),
            entities: session.objects().items().to_vec(),
            tree_name: tree.name().to_string(),
            tree_guid: tree.guid(),
            tree_nodes,
            graph_name: graph.name().to_string(),
            graph_guid: graph.guid(),
            vertices: graph
                .vertices_with_data()
                .map(|(key, attribute)| (key.to_string(), attribute.clone()))
                .collect(),
            edges: graph
                .edges_with_data()
                .map(|((u, v), attribute)| (u.to_string(), v.to_string(), attribute.clone()))
                .collect(),
        }
    }

    /// Rebuild a session. Structural problems in the snapshot are reported as
    /// `SerializationError`.
    pub fn restore(self) -> Result<Session, SessionError> {
        let mut tree = Tree::new(self.tree_name, self.tree_guid);
        let mut ids: Vec<TreeNodeId> = Vec::with_capacity(self.tree_nodes.len());
        for (position, (name, parent)) in self.tree_nodes.into_iter().enumerate() {
            let parent = match parent {
                None if position == 0 => None,
                Some(index) if index < position => ids.get(index).copied(),
                _ => {
                    return Err(SessionError::SerializationError(format!(
                        "tree node {position} has an invalid parent"
                    )));
                }
            };
            let id = tree.create_node(name);
            tree.add(id, parent)
                .map_err(|e| SessionError::SerializationError(e.to_string()))?;
            ids.push(id);
        }

        let mut graph = Graph::new(self.graph_name, self.graph_guid);
        for (key, attribute) in self.vertices {
            graph.add_node(key, attribute);
        }
        for (u, v, attribute) in self.edges {
            graph
                .add_edge(u, v, attribute)
                .map_err(|e| SessionError::SerializationError(e.to_string()))?;
        }

        let objects = Objects::restore(self.objects_name, self.objects_guid, self.entities);
        let mut session = Session::with_generator(self.name, RandomGuids);
        session
            .restore_parts(self.guid, objects, tree, graph)
            .map_err(|e| SessionError::SerializationError(e.to_string()))?;
        Ok(session)
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a session to bytes (header + payload).
///
/// This is a pure transformation - no file I/O.
pub fn session_to_bytes(session: &Session) -> Result<Vec<u8>, SessionError> {
    let snapshot = SessionSnapshot::capture(session);

    let payload = postcard::to_stdvec(&snapshot)
        .map_err(|e| SessionError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&SnapshotHeader::CURRENT.encode());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a session from bytes.
///
/// This is a pure transformation - no file I/O. Checks, in order: minimum
/// size, maximum size, header magic and version; only then the payload.
pub fn session_from_bytes(bytes: &[u8]) -> Result<Session, SessionError> {
    if bytes.len() < HEADER_SIZE {
        return Err(SessionError::SerializationError(format!(
            "Data too short: minimum {HEADER_SIZE} bytes required"
        )));
    }
    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(SessionError::SerializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    SnapshotHeader::decode(bytes)?;

    let payload = bytes.get(HEADER_SIZE..).unwrap_or_default();
    let snapshot: SessionSnapshot = postcard::from_bytes(payload).map_err(|e| {
        SessionError::SerializationError(format!("Failed to deserialize session data: {e}"))
    })?;

    snapshot.restore()
}

impl Session {
    /// Binary snapshot of this session. See [`session_to_bytes`].
    pub fn to_bytes(&self) -> Result<Vec<u8>, SessionError> {
        session_to_bytes(self)
    }

    /// Rebuild a session from a binary snapshot. See [`session_from_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SessionError> {
        session_from_bytes(bytes)
    }
}

// =============================================================================
// TESTS
// =============================================================================
