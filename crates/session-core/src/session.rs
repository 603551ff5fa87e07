//! # Session Module
//!
//! The composite index: one collection of entities seen three ways.
//!
//! - `lookup`: GUID -> position in the entity collection
//! - `tree`: single-rooted hierarchy of nodes named after GUIDs
//! - `graph`: undirected relationships between GUID-keyed vertices
//!
//! Every composite mutation (`add_entity`, `remove_object`) updates all three
//! structures inside one `&mut self` call, so a caller that wraps the whole
//! Session in a single mutex never observes a half-applied change.
//!
//! ## Known Gap
//!
//! Removing an entity deletes its tree node together with the subtree below
//! it. The entities named in that subtree are not reparented: they keep their
//! lookup and graph entries but no longer have a tree node.

use crate::formats::json::{FromJson, ToJson, check_type, decode, encode};
use crate::graph::GraphDocument;
use crate::guid::{GuidGenerator, RandomGuids};
use crate::objects::{Geometry, Objects, ObjectsDocument, Point, Vector};
use crate::primitives::{DEFAULT_SESSION_NAME, tags};
use crate::tree::{TreeDocument, check_depth};
use crate::{Graph, Guid, SessionError, Tree};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// SESSION
// =============================================================================

/// Entities indexed by GUID, hierarchy and relationship.
#[derive(Debug)]
pub struct Session {
    name: String,
    guid: Guid,
    objects: Objects,
    /// GUID -> position in `objects`
    lookup: BTreeMap<Guid, usize>,
    tree: Tree,
    graph: Graph,
    guids: Box<dyn GuidGenerator>,
}

impl Session {
    /// Create an empty session with random GUIDs.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_generator(name, RandomGuids)
    }

    /// Create an empty session drawing every GUID from `generator`.
    ///
    /// The session, its collection, tree and graph take the first four GUIDs.
    /// The tree and graph are named `<name>_tree` and `<name>_graph`.
    #[must_use]
    pub fn with_generator(name: impl Into<String>, generator: impl GuidGenerator + 'static) -> Self {
        let name = name.into();
        let mut guids: Box<dyn GuidGenerator> = Box::new(generator);
        let guid = guids.next_guid();
        let objects = Objects::new(guids.next_guid());
        let tree = Tree::new(format!("{name}_tree"), guids.next_guid());
        let graph = Graph::new(format!("{name}_graph"), guids.next_guid());
        Self {
            name,
            guid,
            objects,
            lookup: BTreeMap::new(),
            tree,
            graph,
            guids,
        }
    }

    /// Draw a GUID from the session generator, for building new entities.
    pub fn next_guid(&mut self) -> Guid {
        self.guids.next_guid()
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn guid(&self) -> Guid {
        self.guid
    }

    #[must_use]
    pub fn objects(&self) -> &Objects {
        &self.objects
    }

    #[must_use]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Direct access to the hierarchy.
    ///
    /// Nodes added here are not backed by entities; `validate` ignores them.
    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Direct access to the relationship graph.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Number of indexed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    // =========================================================================
    // COMPOSITE MUTATIONS
    // =========================================================================

    /// Index a point. See [`Session::add_entity`].
    pub fn add_point(&mut self, point: Point) -> Result<Guid, SessionError> {
        self.add_entity(point)
    }

    /// Index a vector. See [`Session::add_entity`].
    pub fn add_vector(&mut self, vector: Vector) -> Result<Guid, SessionError> {
        self.add_entity(vector)
    }

    /// Index an entity under its own GUID.
    ///
    /// Adds a graph vertex keyed by the GUID string with attribute
    /// `"<kind>_<name>"`, and a tree node named after the GUID: the new root
    /// when the tree is empty, otherwise a child of the root.
    ///
    /// Fails with `InvalidState` if the GUID is already indexed.
    pub fn add_entity(&mut self, entity: impl Into<Geometry>) -> Result<Guid, SessionError> {
        let entity = entity.into();
        let guid = entity.guid();
        if self.lookup.contains_key(&guid) {
            return Err(SessionError::InvalidState(format!(
                "entity {guid} is already in the session"
            )));
        }

        let key = guid.to_string();
        let attribute = format!("{}_{}", entity.kind(), entity.name());

        // The tree is the only step that can refuse, so it goes first.
        let node = self.tree.create_node(key.as_str());
        let parent = self.tree.root().map(|root| root.id());
        self.tree.add(node, parent)?;

        self.graph.add_node(key, attribute);
        let kind = entity.kind();
        let position = self.objects.push(entity);
        self.lookup.insert(guid, position);

        tracing::debug!(%guid, kind, position, "entity added");
        Ok(guid)
    }

    /// Remove an entity and its graph vertex, and delete its tree node.
    ///
    /// Returns `false` if the GUID is not indexed.
    pub fn remove_object(&mut self, guid: Guid) -> bool {
        let Some(position) = self.lookup.remove(&guid) else {
            tracing::warn!(%guid, "remove_object: entity not found");
            return false;
        };

        self.objects.remove(position);
        for slot in self.lookup.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }

        if let Err(err) = self.graph.remove_node(&guid.to_string()) {
            tracing::debug!(%guid, %err, "entity had no graph vertex");
        }
        if !self.tree.remove_node_by_guid(guid) {
            tracing::debug!(%guid, "entity had no tree node");
        }

        tracing::debug!(%guid, "entity removed");
        true
    }

    /// Move `child` under `parent` in the hierarchy.
    ///
    /// Returns `Ok(false)` if either is not in the tree; a move under the
    /// child's own descendant fails with `InvalidState`.
    pub fn add_hierarchy(&mut self, parent: Guid, child: Guid) -> Result<bool, SessionError> {
        let moved = self.tree.add_child_by_guid(parent, child)?;
        if moved {
            tracing::debug!(%parent, %child, "hierarchy updated");
        } else {
            tracing::warn!(%parent, %child, "add_hierarchy: node not found in tree");
        }
        Ok(moved)
    }

    /// Relate two GUIDs in the graph, labelling the edge with
    /// `relationship_type` (usually [`crate::primitives::DEFAULT_RELATIONSHIP`]).
    ///
    /// Missing vertices are created. Relating a GUID to itself fails with
    /// `InvalidArgument`.
    pub fn add_relationship(
        &mut self,
        from: Guid,
        to: Guid,
        relationship_type: &str,
    ) -> Result<(), SessionError> {
        self.graph
            .add_edge(from.to_string(), to.to_string(), relationship_type)?;
        tracing::debug!(%from, %to, relationship_type, "relationship added");
        Ok(())
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn get_object(&self, guid: Guid) -> Option<&Geometry> {
        self.lookup
            .get(&guid)
            .and_then(|&position| self.objects.get(position))
    }

    pub fn get_object_mut(&mut self, guid: Guid) -> Option<&mut Geometry> {
        let position = *self.lookup.get(&guid)?;
        self.objects.get_mut(position)
    }

    /// GUIDs of the tree children of `guid`. Empty if not in the tree.
    #[must_use]
    pub fn get_children(&self, guid: Guid) -> Vec<Guid> {
        self.tree.get_children_guids(guid)
    }

    /// Graph neighbors of `guid`, as vertex keys. Empty if unknown.
    #[must_use]
    pub fn get_neighbours(&self, guid: Guid) -> Vec<String> {
        let key = guid.to_string();
        self.graph.neighbors(&key).map(str::to_string).collect()
    }

    /// Check that lookup, entity collection and graph agree.
    ///
    /// - every lookup entry points at the entity with that GUID
    /// - every entity has exactly one lookup entry
    /// - every entity has a graph vertex keyed by its GUID
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.lookup.len() != self.objects.len() {
            return Err(SessionError::InvalidState(format!(
                "lookup has {} entries for {} entities",
                self.lookup.len(),
                self.objects.len()
            )));
        }
        for (guid, &position) in &self.lookup {
            match self.objects.get(position) {
                Some(entity) if entity.guid() == *guid => {}
                _ => {
                    return Err(SessionError::InvalidState(format!(
                        "lookup entry {guid} points at the wrong entity"
                    )));
                }
            }
            if !self.graph.has_node(&guid.to_string()) {
                return Err(SessionError::InvalidState(format!(
                    "entity {guid} has no graph vertex"
                )));
            }
        }
        Ok(())
    }

    // =========================================================================
    // SERIALIZATION SUPPORT
    // =========================================================================

    /// Encode as a JSON string.
    pub fn to_json_string(&self, pretty: bool) -> Result<String, SessionError> {
        let data = self.to_json_data();
        let encoded = if pretty {
            serde_json::to_string_pretty(&data)
        } else {
            serde_json::to_string(&data)
        };
        encoded.map_err(|e| SessionError::SerializationError(e.to_string()))
    }

    /// Decode from a JSON string.
    pub fn from_json_str(text: &str) -> Result<Self, SessionError> {
        let data: Value = serde_json::from_str(text)
            .map_err(|e| SessionError::SerializationError(format!("invalid JSON: {e}")))?;
        Self::from_json_data(&data)
    }

    /// Decode a session document, drawing any GUID the document does not
    /// carry from `generator`.
    ///
    /// Missing `objects`, `tree` or `graph` sections decode as empty ones.
    /// An `objects` section without a `guid` gets the next generator GUID,
    /// and the tree (whose document has no GUID) always gets one.
    pub fn from_json_data_with_generator(
        data: &Value,
        generator: impl GuidGenerator + 'static,
    ) -> Result<Self, SessionError> {
        check_sections(data)?;
        let document: SessionDocument = decode(data, tags::SESSION)?;

        let name = document.name.as_deref().unwrap_or(DEFAULT_SESSION_NAME);
        let mut session = Self::with_generator(name, generator);

        if let Some(guid) = document.guid {
            session.guid = guid;
        }
        if let Some(objects) = document.objects {
            session.objects = objects.into_objects(|| session.guids.next_guid())?;
        }
        if let Some(tree) = document.tree {
            let guid = session.guids.next_guid();
            let default_name = session.tree.name().to_string();
            session.tree = tree.into_tree(guid, &default_name)?;
        }
        if let Some(graph) = document.graph {
            session.graph = Graph::try_from(graph)?;
        }

        session.rebuild_lookup()?;
        tracing::debug!(
            session = %session.name,
            entities = session.len(),
            "session decoded"
        );
        Ok(session)
    }

    /// Recreate the lookup table from the entity collection.
    pub(crate) fn rebuild_lookup(&mut self) -> Result<(), SessionError> {
        self.lookup.clear();
        for (position, entity) in self.objects.items().iter().enumerate() {
            if self.lookup.insert(entity.guid(), position).is_some() {
                return Err(SessionError::InvalidState(format!(
                    "entity {} appears more than once",
                    entity.guid()
                )));
            }
        }
        Ok(())
    }

    /// Replace every part of the session. Used by the binary snapshot reader.
    pub(crate) fn restore_parts(
        &mut self,
        guid: Guid,
        objects: Objects,
        tree: Tree,
        graph: Graph,
    ) -> Result<(), SessionError> {
        self.guid = guid;
        self.objects = objects;
        self.tree = tree;
        self.graph = graph;
        self.rebuild_lookup()
    }
}

/// Wire form of a [`Session`]. Every section is optional on input.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Session")]
struct SessionDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    guid: Option<Guid>,
    #[serde(default)]
    objects: Option<ObjectsDocument>,
    #[serde(default)]
    tree: Option<TreeDocument>,
    #[serde(default)]
    graph: Option<GraphDocument>,
}

/// Checks the derived decoder cannot do: section tags and tree depth.
fn check_sections(data: &Value) -> Result<(), SessionError> {
    let present = |key: &str| data.get(key).filter(|section| !section.is_null());
    if let Some(objects) = present("objects") {
        check_type(objects, tags::OBJECTS)?;
    }
    if let Some(tree) = present("tree") {
        check_type(tree, tags::TREE)?;
        check_depth(tree)?;
    }
    if let Some(graph) = present("graph") {
        check_type(graph, tags::GRAPH)?;
    }
    Ok(())
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_NAME)
    }
}

impl ToJson for Session {
    fn to_json_data(&self) -> Value {
        encode(&SessionDocument {
            name: Some(self.name.clone()),
            guid: Some(self.guid),
            objects: Some(ObjectsDocument::from(&self.objects)),
            tree: Some(TreeDocument::from(&self.tree)),
            graph: Some(GraphDocument::from(&self.graph)),
        })
    }
}

impl FromJson for Session {
    fn from_json_data(data: &Value) -> Result<Self, SessionError> {
        Self::from_json_data_with_generator(data, RandomGuids)
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Session({}, {}, points={}, vectors={}, vertices={}, edges={})",
            self.name,
            self.guid,
            self.objects.points().count(),
            self.objects.vectors().count(),
            self.graph.number_of_vertices(),
            self.graph.number_of_edges()
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
