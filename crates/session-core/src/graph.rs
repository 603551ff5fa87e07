//! # Graph
//!
//! Undirected relationship index over string keys (usually entity GUIDs).
//!
//! Every edge is stored under both endpoints so that neighbor lookups are a
//! single map access from either side, but it is one logical edge: it is
//! counted once and enumerated once, smaller key first.
//!
//! All data structures use `BTreeMap` for deterministic ordering.

use crate::formats::json::{AttributeDocument, FromJson, ToJson, decode, encode};
use crate::primitives::tags;
use crate::{Attribute, Conditions, Guid, SessionError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// VERTEX
// =============================================================================

/// A graph vertex: key, attribute payload and dense position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vertex {
    name: String,
    attribute: Attribute,
    index: usize,
}

impl Vertex {
    /// The vertex key.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The vertex attribute.
    #[must_use]
    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    /// Position in `0..number_of_vertices()`.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// Undirected graph with one attribute per vertex and per edge.
///
/// Invariants:
/// - every adjacency key has a vertex
/// - `b ∈ adjacency[a]` iff `a ∈ adjacency[b]`, with equal attributes
/// - vertex indices are exactly `0..number_of_vertices()`
/// - no self-loops
#[derive(Debug, Clone)]
pub struct Graph {
    name: String,
    guid: Guid,
    /// Vertex storage: key -> Vertex
    vertices: BTreeMap<String, Vertex>,
    /// Keys by index; `order[i]` is the vertex whose index is `i`.
    order: Vec<String>,
    /// Adjacency: key -> (neighbor -> edge attribute), stored in both directions
    adjacency: BTreeMap<String, BTreeMap<String, Attribute>>,
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub fn new(name: impl Into<String>, guid: Guid) -> Self {
        Self {
            name: name.into(),
            guid,
            vertices: BTreeMap::new(),
            order: Vec::new(),
            adjacency: BTreeMap::new(),
        }
    }

    /// Graph name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Graph GUID.
    #[must_use]
    pub fn guid(&self) -> Guid {
        self.guid
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Add a vertex. Returns the key.
    ///
    /// If the key already exists the vertex is left untouched, attribute
    /// included. New vertices take the next contiguous index.
    pub fn add_node(&mut self, key: impl Into<String>, attribute: impl Into<Attribute>) -> String {
        let key = key.into();
        if self.vertices.contains_key(&key) {
            return key;
        }

        let vertex = Vertex {
            name: key.clone(),
            attribute: attribute.into(),
            index: self.order.len(),
        };
        self.vertices.insert(key.clone(), vertex);
        self.order.push(key.clone());
        key
    }

    /// Add an undirected edge. Returns `(u, v)` as given.
    ///
    /// Missing endpoints are created with an empty attribute. Re-adding an
    /// existing edge overwrites its attribute in both directions.
    pub fn add_edge(
        &mut self,
        u: impl Into<String>,
        v: impl Into<String>,
        attribute: impl Into<Attribute>,
    ) -> Result<(String, String), SessionError> {
        let u = u.into();
        let v = v.into();
        if u == v {
            return Err(SessionError::InvalidArgument(format!(
                "self-loop on {u:?} is not allowed"
            )));
        }

        self.add_node(u.as_str(), Attribute::default());
        self.add_node(v.as_str(), Attribute::default());

        let attribute = attribute.into();
        self.adjacency
            .entry(u.clone())
            .or_default()
            .insert(v.clone(), attribute.clone());
        self.adjacency
            .entry(v.clone())
            .or_default()
            .insert(u.clone(), attribute);

        Ok((u, v))
    }

    /// Remove a vertex and every incident edge.
    ///
    /// Remaining vertices are renumbered to stay contiguous, keeping their
    /// relative order.
    pub fn remove_node(&mut self, key: &str) -> Result<(), SessionError> {
        if !self.vertices.contains_key(key) {
            return Err(SessionError::NotFound(format!("vertex {key:?}")));
        }

        if let Some(neighbors) = self.adjacency.remove(key) {
            for neighbor in neighbors.keys() {
                self.detach_half_edge(neighbor, key);
            }
        }

        self.vertices.remove(key);
        self.order.retain(|k| k != key);
        self.reassign_indices();
        Ok(())
    }

    /// Remove an edge in both directions. Missing edges are ignored.
    pub fn remove_edge(&mut self, u: &str, v: &str) {
        if self.has_edge(u, v) {
            self.detach_half_edge(u, v);
            self.detach_half_edge(v, u);
        }
    }

    /// Remove every vertex and edge.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.order.clear();
        self.adjacency.clear();
    }

    /// Drop `to` from the adjacency of `from`, pruning emptied entries.
    fn detach_half_edge(&mut self, from: &str, to: &str) {
        if let Some(targets) = self.adjacency.get_mut(from) {
            targets.remove(to);
            if targets.is_empty() {
                self.adjacency.remove(from);
            }
        }
    }

    fn reassign_indices(&mut self) {
        for (index, key) in self.order.iter().enumerate() {
            if let Some(vertex) = self.vertices.get_mut(key) {
                vertex.index = index;
            }
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Check if a vertex exists.
    #[must_use]
    pub fn has_node(&self, key: &str) -> bool {
        self.vertices.contains_key(key)
    }

    /// Check if an edge exists. Symmetric in `u` and `v`.
    #[must_use]
    pub fn has_edge(&self, u: &str, v: &str) -> bool {
        self.adjacency
            .get(u)
            .is_some_and(|targets| targets.contains_key(v))
    }

    /// Look up a vertex.
    #[must_use]
    pub fn vertex(&self, key: &str) -> Option<&Vertex> {
        self.vertices.get(key)
    }

    /// Index of a vertex.
    pub fn node_index(&self, key: &str) -> Result<usize, SessionError> {
        self.vertices
            .get(key)
            .map(Vertex::index)
            .ok_or_else(|| SessionError::NotFound(format!("vertex {key:?}")))
    }

    /// Vertex keys in index order.
    pub fn vertices(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(String::as_str)
    }

    /// `(key, attribute)` pairs in index order.
    pub fn vertices_with_data(&self) -> impl Iterator<Item = (&str, &Attribute)> + '_ {
        self.order
            .iter()
            .filter_map(|key| self.vertices.get(key))
            .map(|vertex| (vertex.name.as_str(), &vertex.attribute))
    }

    /// Edges in canonical order, each exactly once.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.edges_with_data().map(|(edge, _)| edge)
    }

    /// `((u, v), attribute)` pairs in canonical order, each exactly once.
    pub fn edges_with_data(&self) -> impl Iterator<Item = ((&str, &str), &Attribute)> + '_ {
        self.adjacency.iter().flat_map(|(u, targets)| {
            targets
                .iter()
                .filter(move |(v, _)| u.as_str() < v.as_str())
                .map(move |(v, attribute)| ((u.as_str(), v.as_str()), attribute))
        })
    }

    /// Keys adjacent to `key`. Empty for an unknown key.
    pub fn neighbors<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.adjacency
            .get(key)
            .into_iter()
            .flat_map(|targets| targets.keys().map(String::as_str))
    }

    /// Number of neighbors of `key`. Zero for an unknown key.
    #[must_use]
    pub fn degree(&self, key: &str) -> usize {
        self.adjacency.get(key).map_or(0, BTreeMap::len)
    }

    /// Get the total number of vertices.
    #[must_use]
    pub fn number_of_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Get the total number of undirected edges.
    #[must_use]
    pub fn number_of_edges(&self) -> usize {
        self.adjacency.values().map(BTreeMap::len).sum::<usize>() / 2
    }

    // =========================================================================
    // ATTRIBUTES
    // =========================================================================

    /// Attribute of a vertex.
    pub fn node_attribute(&self, key: &str) -> Result<&Attribute, SessionError> {
        self.vertices
            .get(key)
            .map(Vertex::attribute)
            .ok_or_else(|| SessionError::NotFound(format!("vertex {key:?}")))
    }

    /// Replace the attribute of a vertex.
    pub fn set_node_attribute(
        &mut self,
        key: &str,
        value: impl Into<Attribute>,
    ) -> Result<(), SessionError> {
        let vertex = self
            .vertices
            .get_mut(key)
            .ok_or_else(|| SessionError::NotFound(format!("vertex {key:?}")))?;
        vertex.attribute = value.into();
        Ok(())
    }

    /// Attribute of an edge. Symmetric in `u` and `v`.
    pub fn edge_attribute(&self, u: &str, v: &str) -> Result<&Attribute, SessionError> {
        self.adjacency
            .get(u)
            .and_then(|targets| targets.get(v))
            .ok_or_else(|| SessionError::NotFound(format!("edge ({u:?}, {v:?})")))
    }

    /// Replace the attribute of an edge in both directions.
    pub fn set_edge_attribute(
        &mut self,
        u: &str,
        v: &str,
        value: impl Into<Attribute>,
    ) -> Result<(), SessionError> {
        if !self.has_edge(u, v) {
            return Err(SessionError::NotFound(format!("edge ({u:?}, {v:?})")));
        }
        let value = value.into();
        if let Some(slot) = self.adjacency.get_mut(v).and_then(|t| t.get_mut(u)) {
            *slot = value.clone();
        }
        if let Some(slot) = self.adjacency.get_mut(u).and_then(|t| t.get_mut(v)) {
            *slot = value;
        }
        Ok(())
    }

    // =========================================================================
    // FILTERS
    // =========================================================================

    /// Keys of vertices whose attribute satisfies `conditions`.
    pub fn vertices_where<'a>(
        &'a self,
        conditions: &'a Conditions,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.vertices_where_with_data(conditions).map(|(key, _)| key)
    }

    /// `(key, attribute)` pairs of vertices whose attribute satisfies `conditions`.
    pub fn vertices_where_with_data<'a>(
        &'a self,
        conditions: &'a Conditions,
    ) -> impl Iterator<Item = (&'a str, &'a Attribute)> + 'a {
        self.vertices_with_data()
            .filter(move |(_, attribute)| attribute.matches(conditions))
    }

    /// Canonical edges whose attribute satisfies `conditions`.
    pub fn edges_where<'a>(
        &'a self,
        conditions: &'a Conditions,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.edges_where_with_data(conditions).map(|(edge, _)| edge)
    }

    /// `((u, v), attribute)` pairs of edges whose attribute satisfies `conditions`.
    pub fn edges_where_with_data<'a>(
        &'a self,
        conditions: &'a Conditions,
    ) -> impl Iterator<Item = ((&'a str, &'a str), &'a Attribute)> + 'a {
        self.edges_with_data()
            .filter(move |(_, attribute)| attribute.matches(conditions))
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// Wire form of a [`Graph`]. Edges are listed once, smaller key first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Graph")]
pub(crate) struct GraphDocument {
    name: String,
    guid: Guid,
    #[serde(default)]
    vertices: Option<Vec<VertexDocument>>,
    #[serde(default)]
    edges: Option<Vec<EdgeDocument>>,
    #[serde(default)]
    count: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VertexDocument {
    name: String,
    attribute: AttributeDocument,
    #[serde(default)]
    index: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EdgeDocument {
    v0: String,
    v1: String,
    attribute: AttributeDocument,
}

impl From<&Graph> for GraphDocument {
    fn from(graph: &Graph) -> Self {
        let vertices = graph
            .order
            .iter()
            .filter_map(|key| graph.vertices.get(key))
            .map(|vertex| VertexDocument {
                name: vertex.name.clone(),
                attribute: AttributeDocument::from(&vertex.attribute),
                index: Some(vertex.index as u64),
            })
            .collect();
        let edges = graph
            .edges_with_data()
            .map(|((v0, v1), attribute)| EdgeDocument {
                v0: v0.to_string(),
                v1: v1.to_string(),
                attribute: AttributeDocument::from(attribute),
            })
            .collect();
        Self {
            name: graph.name.clone(),
            guid: graph.guid,
            vertices: Some(vertices),
            edges: Some(edges),
            count: Some(graph.order.len() as u64),
        }
    }
}

impl TryFrom<GraphDocument> for Graph {
    type Error = SessionError;

    fn try_from(doc: GraphDocument) -> Result<Self, Self::Error> {
        let mut graph = Graph::new(doc.name, doc.guid);

        // Vertices are re-added in stored index order, so any gaps are closed.
        let mut stored = doc.vertices.unwrap_or_default();
        stored.sort_by_key(|vertex| vertex.index.unwrap_or(u64::MAX));

        let mut repaired = false;
        for vertex in stored {
            if graph.has_node(&vertex.name) {
                tracing::warn!(vertex = %vertex.name, "duplicate vertex in graph document ignored");
                continue;
            }
            repaired |= vertex.index != Some(graph.order.len() as u64);
            graph.add_node(vertex.name, Attribute::from(vertex.attribute));
        }
        if repaired {
            tracing::warn!(graph = %graph.name, "vertex indices renumbered while decoding");
        }

        for edge in doc.edges.unwrap_or_default() {
            graph.add_edge(edge.v0, edge.v1, Attribute::from(edge.attribute))?;
        }

        if let Some(count) = doc.count
            && count != graph.order.len() as u64
        {
            tracing::warn!(
                stored = count,
                actual = graph.order.len(),
                "graph document count does not match its vertices"
            );
        }

        Ok(graph)
    }
}

impl ToJson for Graph {
    fn to_json_data(&self) -> Value {
        encode(&GraphDocument::from(self))
    }
}

impl FromJson for Graph {
    fn from_json_data(data: &Value) -> Result<Self, SessionError> {
        decode::<GraphDocument>(data, tags::GRAPH)?.try_into()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph() -> Graph {
        Graph::new("test", Guid::from_u128(7))
    }

    fn indices(graph: &Graph) -> Vec<usize> {
        graph
            .vertices()
            .map(|key| graph.node_index(key).expect("index"))
            .collect()
    }

    #[test]
    fn add_edges_creates_vertices() {
        let mut graph = graph();
        graph.add_edge("A", "B", "x").expect("edge");
        graph.add_edge("A", "C", "y").expect("edge");

        assert_eq!(graph.number_of_vertices(), 3);
        assert_eq!(graph.number_of_edges(), 2);
        let neighbors: Vec<_> = graph.neighbors("A").collect();
        assert_eq!(neighbors, vec!["B", "C"]);
    }

    #[test]
    fn add_node_is_idempotent() {
        let mut graph = graph();
        assert_eq!(graph.add_node("n", "first"), "n");
        assert_eq!(graph.add_node("n", "second"), "n");

        assert_eq!(graph.number_of_vertices(), 1);
        assert_eq!(
            graph.node_attribute("n").expect("attr"),
            &Attribute::new("first")
        );
    }

    #[test]
    fn edge_is_symmetric() {
        let mut graph = graph();
        graph.add_edge("u", "v", "link").expect("edge");

        assert!(graph.has_edge("u", "v"));
        assert!(graph.has_edge("v", "u"));
        assert_eq!(graph.neighbors("v").collect::<Vec<_>>(), vec!["u"]);
        assert_eq!(
            graph.edge_attribute("v", "u").expect("attr"),
            &Attribute::new("link")
        );
    }

    #[test]
    fn re_adding_edge_overwrites_both_directions() {
        let mut graph = graph();
        graph.add_edge("a", "b", "old").expect("edge");
        graph.add_edge("b", "a", "new").expect("edge");

        assert_eq!(graph.number_of_edges(), 1);
        assert_eq!(graph.edge_attribute("a", "b").expect("attr").as_str(), Some("new"));
        assert_eq!(graph.edge_attribute("b", "a").expect("attr").as_str(), Some("new"));
    }

    #[test]
    fn self_loop_rejected() {
        let mut graph = graph();
        let result = graph.add_edge("a", "a", "");
        assert!(matches!(result, Err(SessionError::InvalidArgument(_))));
        assert_eq!(graph.number_of_vertices(), 0);
    }

    #[test]
    fn edges_enumerated_once_in_canonical_order() {
        let mut graph = graph();
        graph.add_edge("z", "a", "1").expect("edge");
        graph.add_edge("m", "b", "2").expect("edge");

        let edges: Vec<_> = graph.edges().collect();
        assert_eq!(edges, vec![("a", "z"), ("b", "m")]);
        assert_eq!(edges.len(), graph.number_of_edges());
    }

    #[test]
    fn remove_node_drops_incident_edges_and_renumbers() {
        let mut graph = graph();
        graph.add_node("a", "");
        graph.add_node("b", "");
        graph.add_node("c", "");
        graph.add_node("d", "");
        graph.add_edge("b", "c", "").expect("edge");
        graph.add_edge("b", "d", "").expect("edge");

        graph.remove_node("b").expect("remove");

        assert!(!graph.has_node("b"));
        assert_eq!(graph.number_of_edges(), 0);
        assert_eq!(graph.neighbors("c").count(), 0);
        assert_eq!(graph.vertices().collect::<Vec<_>>(), vec!["a", "c", "d"]);
        assert_eq!(indices(&graph), vec![0, 1, 2]);

        // Next vertex continues the contiguous sequence.
        graph.add_node("e", "");
        assert_eq!(graph.node_index("e").expect("index"), 3);
    }

    #[test]
    fn remove_missing_node_fails() {
        let mut graph = graph();
        assert!(matches!(
            graph.remove_node("ghost"),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn remove_edge_is_noop_when_absent() {
        let mut graph = graph();
        graph.add_edge("a", "b", "").expect("edge");
        graph.remove_edge("a", "c");
        assert_eq!(graph.number_of_edges(), 1);

        graph.remove_edge("b", "a");
        assert!(!graph.has_edge("a", "b"));
        assert!(!graph.has_edge("b", "a"));
        assert!(graph.has_node("a") && graph.has_node("b"));
    }

    #[test]
    fn neighbors_of_unknown_key_is_empty() {
        let graph = graph();
        assert_eq!(graph.neighbors("nobody").count(), 0);
        assert_eq!(graph.degree("nobody"), 0);
    }

    #[test]
    fn attribute_getters_and_setters() {
        let mut graph = graph();
        graph.add_edge("a", "b", "").expect("edge");

        graph.set_node_attribute("a", "alpha").expect("set");
        assert_eq!(graph.node_attribute("a").expect("get").as_str(), Some("alpha"));
        assert!(matches!(
            graph.node_attribute("zz"),
            Err(SessionError::NotFound(_))
        ));
        assert!(graph.set_node_attribute("zz", "x").is_err());

        graph.set_edge_attribute("b", "a", "ab").expect("set");
        assert_eq!(graph.edge_attribute("a", "b").expect("get").as_str(), Some("ab"));
        assert!(matches!(
            graph.edge_attribute("a", "zz"),
            Err(SessionError::NotFound(_))
        ));
        assert!(graph.set_edge_attribute("a", "zz", "x").is_err());
    }

    #[test]
    fn where_filters_only_match_structured_attributes() {
        let mut graph = graph();
        graph.add_node("red", Attribute::structured([("color", "red")]));
        graph.add_node("blue", Attribute::structured([("color", "blue")]));
        graph.add_node("plain", "color");
        graph
            .add_edge("red", "blue", Attribute::structured([("kind", "contrast")]))
            .expect("edge");
        graph.add_edge("red", "plain", "kind").expect("edge");

        let conditions = Conditions::from([("color".to_string(), "red".to_string())]);
        assert_eq!(graph.vertices_where(&conditions).collect::<Vec<_>>(), vec!["red"]);

        let kind = Conditions::from([("kind".to_string(), "contrast".to_string())]);
        assert_eq!(
            graph.edges_where(&kind).collect::<Vec<_>>(),
            vec![("blue", "red")]
        );

        let everything = Conditions::new();
        assert_eq!(graph.vertices_where(&everything).count(), 3);
        assert_eq!(graph.edges_where_with_data(&everything).count(), 2);
    }

    #[test]
    fn clear_resets_everything() {
        let mut graph = graph();
        graph.add_edge("a", "b", "").expect("edge");
        graph.clear();

        assert_eq!(graph.number_of_vertices(), 0);
        assert_eq!(graph.number_of_edges(), 0);
        graph.add_node("c", "");
        assert_eq!(graph.node_index("c").expect("index"), 0);
    }

    #[test]
    fn json_roundtrip() {
        let mut graph = graph();
        graph.add_node("a", "first");
        graph.add_edge("b", "a", "ba").expect("edge");
        graph
            .add_edge("c", "b", Attribute::structured([("w", "2")]))
            .expect("edge");

        let data = graph.to_json_data();
        assert_eq!(data["type"], "Graph");
        assert_eq!(data["count"], 3);
        assert_eq!(data["edges"].as_array().map(Vec::len), Some(2));
        assert_eq!(data["edges"][0]["v0"], "a");
        assert_eq!(data["edges"][0]["v1"], "b");

        let restored = Graph::from_json_data(&data).expect("decode");
        assert_eq!(restored.name(), "test");
        assert_eq!(restored.guid(), graph.guid());
        assert_eq!(
            restored.vertices().collect::<Vec<_>>(),
            graph.vertices().collect::<Vec<_>>()
        );
        assert_eq!(
            restored.edges_with_data().collect::<Vec<_>>(),
            graph.edges_with_data().collect::<Vec<_>>()
        );
        assert_eq!(
            restored.node_attribute("a").expect("attr").as_str(),
            Some("first")
        );
    }

    #[test]
    fn decode_closes_index_gaps() {
        let data = json!({
            "type": "Graph",
            "name": "g",
            "guid": Guid::from_u128(1).to_string(),
            "vertices": [
                {"name": "late", "attribute": "", "index": 9},
                {"name": "early", "attribute": "", "index": 2},
            ],
            "edges": [],
            "count": 10,
        });

        let graph = Graph::from_json_data(&data).expect("decode");
        assert_eq!(graph.vertices().collect::<Vec<_>>(), vec!["early", "late"]);
        assert_eq!(indices(&graph), vec![0, 1]);
    }

    #[test]
    fn decode_rejects_non_string_key() {
        let data = json!({
            "type": "Graph",
            "name": "g",
            "guid": Guid::from_u128(1).to_string(),
            "vertices": [{"name": 5, "attribute": ""}],
        });
        assert!(matches!(
            Graph::from_json_data(&data),
            Err(SessionError::TypeMismatch(_))
        ));
    }

    #[test]
    fn decode_requires_name_and_guid() {
        let data = json!({"type": "Graph", "guid": Guid::from_u128(1).to_string()});
        assert!(matches!(
            Graph::from_json_data(&data),
            Err(SessionError::MissingField("name"))
        ));

        let data = json!({"type": "Graph", "name": "g"});
        assert!(matches!(
            Graph::from_json_data(&data),
            Err(SessionError::MissingField("guid"))
        ));
    }

    #[test]
    fn decode_requires_edge_attribute() {
        let data = json!({
            "type": "Graph",
            "name": "g",
            "guid": Guid::from_u128(1).to_string(),
            "vertices": [],
            "edges": [{"v0": "a", "v1": "b"}],
        });
        assert!(matches!(
            Graph::from_json_data(&data),
            Err(SessionError::MissingField("attribute"))
        ));
    }
}
