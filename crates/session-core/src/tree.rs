//! # Tree
//!
//! Single-rooted hierarchy stored as an arena.
//!
//! Nodes live in the owning `Tree` and are addressed by [`TreeNodeId`]
//! handles. A slot keeps its parent as a plain handle, so there is exactly
//! one owner for every node. Detached nodes stay in the arena and can be
//! attached again; a node "belongs to" the tree only while its ancestor
//! chain reaches the root.
//!
//! [`Tree::delete`] frees a subtree. Freed slots go on a free list and are
//! reused by later [`Tree::create_node`] calls; every slot carries a
//! generation counter so a handle to a freed node is rejected instead of
//! silently addressing its replacement.
//!
//! Traversals are lazy and driven by an explicit stack or queue, so deep
//! hierarchies never recurse.

use crate::formats::json::{ToJson, decode, encode};
use crate::guid::{GuidGenerator, RandomGuids};
use crate::primitives::{DEFAULT_TREE_NAME, MAX_TREE_DEPTH, tags};
use crate::{Guid, SessionError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// HANDLES
// =============================================================================

/// Handle to a node in a [`Tree`] arena.
///
/// Handles carry the GUID of the tree that issued them and the generation
/// of their slot; passing one to a different tree, or using one after its
/// node was deleted, fails with `TypeMismatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TreeNodeId {
    tree: Guid,
    slot: usize,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    parent: Option<TreeNodeId>,
    children: Vec<TreeNodeId>,
}

// =============================================================================
// TRAVERSAL OPTIONS
// =============================================================================

/// Visiting strategy for [`Tree::traverse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalStrategy {
    #[default]
    DepthFirst,
    BreadthFirst,
}

/// Visiting order for depth-first traversal. Ignored for breadth-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalOrder {
    #[default]
    PreOrder,
    PostOrder,
}

impl FromStr for TraversalStrategy {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "depthfirst" => Ok(Self::DepthFirst),
            "breadthfirst" => Ok(Self::BreadthFirst),
            other => Err(SessionError::InvalidArgument(format!(
                "unknown traversal strategy: {other}"
            ))),
        }
    }
}

impl FromStr for TraversalOrder {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preorder" => Ok(Self::PreOrder),
            "postorder" => Ok(Self::PostOrder),
            other => Err(SessionError::InvalidArgument(format!(
                "unknown traversal order: {other}"
            ))),
        }
    }
}

// =============================================================================
// TREE IMPLEMENTATION
// =============================================================================

/// Hierarchy with at most one root.
#[derive(Debug, Clone)]
pub struct Tree {
    name: String,
    guid: Guid,
    slots: Vec<Slot>,
    /// Indices of slots whose entry is `None`.
    free: Vec<usize>,
    root: Option<TreeNodeId>,
}

impl Tree {
    /// Create an empty tree.
    #[must_use]
    pub fn new(name: impl Into<String>, guid: Guid) -> Self {
        Self {
            name: name.into(),
            guid,
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
        }
    }

    /// Tree name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tree GUID.
    #[must_use]
    pub fn guid(&self) -> Guid {
        self.guid
    }

    /// The root node, if any.
    #[must_use]
    pub fn root(&self) -> Option<NodeRef<'_>> {
        self.root.map(|id| NodeRef { tree: self, id })
    }

    /// View a node of this tree, attached or not.
    pub fn node(&self, id: TreeNodeId) -> Result<NodeRef<'_>, SessionError> {
        self.slot(id)?;
        Ok(NodeRef { tree: self, id })
    }

    /// Number of nodes held by the arena, attached or not.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// The live entry for `id`, if the handle is still valid.
    fn entry(&self, id: TreeNodeId) -> Option<&Entry> {
        if id.tree != self.guid {
            return None;
        }
        self.slots
            .get(id.slot)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn slot(&self, id: TreeNodeId) -> Result<&Entry, SessionError> {
        if id.tree != self.guid {
            return Err(SessionError::TypeMismatch(format!(
                "node handle belongs to tree {}",
                id.tree
            )));
        }
        self.entry(id)
            .ok_or_else(|| SessionError::TypeMismatch(format!("no live node in slot {}", id.slot)))
    }

    fn slot_mut(&mut self, id: TreeNodeId) -> Result<&mut Entry, SessionError> {
        self.slot(id)?;
        self.slots
            .get_mut(id.slot)
            .and_then(|slot| slot.entry.as_mut())
            .ok_or_else(|| SessionError::TypeMismatch(format!("no live node in slot {}", id.slot)))
    }

    fn children_of(&self, id: TreeNodeId) -> &[TreeNodeId] {
        self.entry(id).map_or(&[], |entry| entry.children.as_slice())
    }

    fn parent_of(&self, id: TreeNodeId) -> Option<TreeNodeId> {
        self.entry(id).and_then(|entry| entry.parent)
    }

    fn name_of(&self, id: TreeNodeId) -> &str {
        self.entry(id).map_or("", |entry| entry.name.as_str())
    }

    /// Whether the ancestor chain of `id` ends at the root.
    fn is_attached(&self, id: TreeNodeId) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        // The chain is acyclic, so it is at most as long as the arena.
        let mut current = id;
        for _ in 0..=self.slots.len() {
            if current == root {
                return true;
            }
            match self.parent_of(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    /// Whether `ancestor` is `node` or lies on its ancestor chain.
    fn is_ancestor_or_self(&self, ancestor: TreeNodeId, node: TreeNodeId) -> bool {
        let mut current = Some(node);
        for _ in 0..=self.slots.len() {
            match current {
                Some(id) if id == ancestor => return true,
                Some(id) => current = self.parent_of(id),
                None => return false,
            }
        }
        false
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Allocate a detached node, reusing a freed slot when there is one.
    pub fn create_node(&mut self, name: impl Into<String>) -> TreeNodeId {
        let entry = Entry {
            name: name.into(),
            parent: None,
            children: Vec::new(),
        };

        if let Some(index) = self.free.pop()
            && let Some(slot) = self.slots.get_mut(index)
        {
            slot.entry = Some(entry);
            return TreeNodeId {
                tree: self.guid,
                slot: index,
                generation: slot.generation,
            };
        }

        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        TreeNodeId {
            tree: self.guid,
            slot: self.slots.len() - 1,
            generation: 0,
        }
    }

    /// Attach `node` as the root (`parent == None`) or as the last child of
    /// `parent`.
    pub fn add(&mut self, node: TreeNodeId, parent: Option<TreeNodeId>) -> Result<(), SessionError> {
        let has_parent = self.slot(node)?.parent.is_some();

        let Some(parent) = parent else {
            if self.root.is_some() {
                return Err(SessionError::InvalidState(
                    "tree already has a root node, remove it first".to_string(),
                ));
            }
            if has_parent {
                return Err(SessionError::InvalidState(
                    "node already has a parent, remove it from that parent first".to_string(),
                ));
            }
            self.root = Some(node);
            return Ok(());
        };

        self.slot(parent)?;
        if has_parent {
            return Err(SessionError::InvalidState(
                "node already has a parent, remove it from that parent first".to_string(),
            ));
        }
        if self.root == Some(node) {
            return Err(SessionError::InvalidState(
                "the root node cannot become a child".to_string(),
            ));
        }
        if !self.is_attached(parent) {
            return Err(SessionError::InvalidState(
                "parent node is not part of this tree".to_string(),
            ));
        }
        if self.is_ancestor_or_self(node, parent) {
            return Err(SessionError::InvalidState(
                "attaching would create a cycle".to_string(),
            ));
        }

        self.link(node, parent)
    }

    /// Detach `node` and its subtree. Removing the root empties the tree.
    pub fn remove(&mut self, node: TreeNodeId) -> Result<(), SessionError> {
        let parent = self.slot(node)?.parent;

        if self.root == Some(node) {
            self.root = None;
            return Ok(());
        }

        match parent {
            Some(parent) => self.unlink(node, parent),
            None => Err(SessionError::InvalidState(
                "node is not attached to the tree".to_string(),
            )),
        }
    }

    /// Detach `node` if needed, then free it together with its subtree.
    ///
    /// Handles to the freed nodes stop working. Returns how many nodes were
    /// freed.
    pub fn delete(&mut self, node: TreeNodeId) -> Result<usize, SessionError> {
        let parent = self.slot(node)?.parent;
        if self.root == Some(node) {
            self.root = None;
        } else if let Some(parent) = parent {
            self.unlink(node, parent)?;
        }

        let doomed: Vec<TreeNodeId> = Traverse::new(
            self,
            Some(node),
            TraversalStrategy::DepthFirst,
            TraversalOrder::PreOrder,
        )
        .map(|n| n.id)
        .collect();
        for id in &doomed {
            self.release(*id);
        }
        Ok(doomed.len())
    }

    fn release(&mut self, id: TreeNodeId) {
        if let Some(slot) = self.slots.get_mut(id.slot)
            && slot.generation == id.generation
            && slot.entry.take().is_some()
        {
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.slot);
        }
    }

    fn link(&mut self, node: TreeNodeId, parent: TreeNodeId) -> Result<(), SessionError> {
        self.slot_mut(parent)?.children.push(node);
        self.slot_mut(node)?.parent = Some(parent);
        Ok(())
    }

    fn unlink(&mut self, node: TreeNodeId, parent: TreeNodeId) -> Result<(), SessionError> {
        self.slot_mut(parent)?.children.retain(|child| *child != node);
        self.slot_mut(node)?.parent = None;
        Ok(())
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Traverse from the root. Empty when there is no root.
    #[must_use]
    pub fn traverse(&self, strategy: TraversalStrategy, order: TraversalOrder) -> Traverse<'_> {
        Traverse::new(self, self.root, strategy, order)
    }

    /// Reachable nodes in depth-first pre-order.
    #[must_use]
    pub fn nodes(&self) -> Traverse<'_> {
        self.traverse(TraversalStrategy::DepthFirst, TraversalOrder::PreOrder)
    }

    /// Reachable nodes without children.
    pub fn leaves(&self) -> impl Iterator<Item = NodeRef<'_>> + '_ {
        self.nodes().filter(NodeRef::is_leaf)
    }

    /// Number of reachable nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes().count()
    }

    /// Check if the tree has no root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// First reachable node with the given name.
    #[must_use]
    pub fn get_node_by_name(&self, name: &str) -> Option<NodeRef<'_>> {
        self.nodes().find(|node| node.name() == name)
    }

    /// Every reachable node with the given name, in pre-order.
    #[must_use]
    pub fn get_nodes_by_name(&self, name: &str) -> Vec<NodeRef<'_>> {
        self.nodes().filter(|node| node.name() == name).collect()
    }

    /// First reachable node whose name is the given GUID.
    #[must_use]
    pub fn find_node_by_guid(&self, guid: Guid) -> Option<NodeRef<'_>> {
        self.nodes().find(|node| Guid::parse(node.name()) == Some(guid))
    }

    /// GUIDs named by the children of the node for `guid`.
    ///
    /// Children whose names are not GUIDs are skipped. Empty if the node is
    /// not found.
    #[must_use]
    pub fn get_children_guids(&self, guid: Guid) -> Vec<Guid> {
        self.find_node_by_guid(guid)
            .map(|node| node.children().filter_map(|c| Guid::parse(c.name())).collect())
            .unwrap_or_default()
    }

    // =========================================================================
    // GUID OPERATIONS
    // =========================================================================

    /// Move the node for `child` under the node for `parent`.
    ///
    /// Returns `Ok(false)` if either node is not in the tree. A move that
    /// would put a node under its own descendant fails with `InvalidState`
    /// and leaves the tree unchanged.
    pub fn add_child_by_guid(&mut self, parent: Guid, child: Guid) -> Result<bool, SessionError> {
        let parent_id = self.find_node_by_guid(parent).map(|node| node.id);
        let child_id = self.find_node_by_guid(child).map(|node| node.id);
        let (Some(parent_id), Some(child_id)) = (parent_id, child_id) else {
            return Ok(false);
        };

        if self.is_ancestor_or_self(child_id, parent_id) {
            return Err(SessionError::InvalidState(format!(
                "{child} cannot be moved under its own descendant {parent}"
            )));
        }

        if let Some(old_parent) = self.parent_of(child_id) {
            self.unlink(child_id, old_parent)?;
        }
        self.link(child_id, parent_id)?;
        Ok(true)
    }

    /// Delete the node for `guid` and everything below it.
    ///
    /// Returns `false` if it is not in the tree.
    pub fn remove_node_by_guid(&mut self, guid: Guid) -> bool {
        match self.find_node_by_guid(guid).map(|node| node.id) {
            Some(id) => self.delete(id).is_ok(),
            None => false,
        }
    }

    /// Render the hierarchy with box-drawing connectors, one node per line.
    #[must_use]
    pub fn render_hierarchy(&self) -> String {
        let Some(root) = self.root else {
            return "Empty tree".to_string();
        };

        let mut lines = Vec::new();
        let mut stack = vec![(root, String::new(), true)];
        while let Some((id, prefix, last)) = stack.pop() {
            let connector = if last { "└── " } else { "├── " };
            lines.push(format!("{prefix}{connector}{}", self.name_of(id)));

            let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
            let children = self.children_of(id);
            for (i, child) in children.iter().enumerate().rev() {
                stack.push((*child, child_prefix.clone(), i + 1 == children.len()));
            }
        }
        lines.join("\n")
    }

    // =========================================================================
    // SERIALIZATION SUPPORT
    // =========================================================================

    /// Decode a tree document, using `guid` as the tree GUID.
    ///
    /// Tree documents do not carry a GUID of their own.
    pub fn from_json_data_with_guid(data: &Value, guid: Guid) -> Result<Self, SessionError> {
        check_depth(data)?;
        decode::<TreeDocument>(data, tags::TREE)?.into_tree(guid, DEFAULT_TREE_NAME)
    }

    /// Decode a tree document with a fresh random GUID.
    pub fn from_json_data(data: &Value) -> Result<Self, SessionError> {
        Self::from_json_data_with_guid(data, RandomGuids.next_guid())
    }

    fn root_document(&self, root: TreeNodeId) -> Option<TreeNodeDocument> {
        // Post-order guarantees every child is built before its parent.
        let mut built: BTreeMap<usize, TreeNodeDocument> = BTreeMap::new();
        for node in Traverse::new(
            self,
            Some(root),
            TraversalStrategy::DepthFirst,
            TraversalOrder::PostOrder,
        ) {
            let children = self
                .children_of(node.id)
                .iter()
                .filter_map(|child| built.remove(&child.slot))
                .collect();
            built.insert(
                node.id.slot,
                TreeNodeDocument {
                    name: node.name().to_string(),
                    children: Some(children),
                },
            );
        }
        built.remove(&root.slot)
    }
}

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Wire form of a [`Tree`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Tree")]
pub(crate) struct TreeDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    root: Option<TreeNodeDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "TreeNode")]
struct TreeNodeDocument {
    name: String,
    #[serde(default)]
    children: Option<Vec<TreeNodeDocument>>,
}

impl TreeDocument {
    /// Build the tree; `default_name` is used when the document has none.
    pub(crate) fn into_tree(self, guid: Guid, default_name: &str) -> Result<Tree, SessionError> {
        let name = self.name.unwrap_or_else(|| default_name.to_string());
        let mut tree = Tree::new(name, guid);

        let mut pending: Vec<(TreeNodeDocument, Option<TreeNodeId>)> =
            self.root.into_iter().map(|root| (root, None)).collect();
        while let Some((doc, parent)) = pending.pop() {
            let id = tree.create_node(doc.name);
            match parent {
                Some(parent) => tree.link(id, parent)?,
                None => tree.root = Some(id),
            }
            for child in doc.children.unwrap_or_default().into_iter().rev() {
                pending.push((child, Some(id)));
            }
        }

        Ok(tree)
    }
}

impl From<&Tree> for TreeDocument {
    fn from(tree: &Tree) -> Self {
        Self {
            name: Some(tree.name.clone()),
            root: tree.root.and_then(|root| tree.root_document(root)),
        }
    }
}

/// Reject tree documents nested deeper than [`MAX_TREE_DEPTH`].
///
/// Runs on the raw document before it is deserialized, so the recursive
/// decoder only ever sees bounded nesting.
pub(crate) fn check_depth(data: &Value) -> Result<(), SessionError> {
    let mut pending: Vec<(&Value, usize)> = data.get("root").map(|root| (root, 1)).into_iter().collect();
    while let Some((node, depth)) = pending.pop() {
        if depth > MAX_TREE_DEPTH {
            return Err(SessionError::InvalidArgument(format!(
                "tree document nested deeper than {MAX_TREE_DEPTH} levels"
            )));
        }
        if let Some(children) = node.get("children").and_then(Value::as_array) {
            pending.extend(children.iter().map(|child| (child, depth + 1)));
        }
    }
    Ok(())
}

impl ToJson for Tree {
    fn to_json_data(&self) -> Value {
        encode(&TreeDocument::from(self))
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tree({}, {}, {} nodes)", self.name, self.guid, self.len())
    }
}

// =============================================================================
// NODE VIEW
// =============================================================================

/// Borrowed view of one node.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a Tree,
    id: TreeNodeId,
}

impl<'a> NodeRef<'a> {
    /// Handle of this node.
    #[must_use]
    pub fn id(&self) -> TreeNodeId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'a str {
        self.tree.name_of(self.id)
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeRef<'a>> {
        let tree = self.tree;
        tree.parent_of(self.id).map(|id| NodeRef { tree, id })
    }

    /// Children in insertion order.
    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        tree.children_of(self.id)
            .iter()
            .map(move |&id| NodeRef { tree, id })
    }

    /// True when the node has no parent.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.tree.parent_of(self.id).is_none()
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.tree.children_of(self.id).is_empty()
    }

    /// True for a node with both a parent and children.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        !self.is_root() && !self.is_leaf()
    }

    /// True while the node is reachable from the tree root.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.tree.is_attached(self.id)
    }

    /// Parent, grandparent and so on up to the top of the chain.
    pub fn ancestors(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        std::iter::successors(self.parent(), NodeRef::parent)
    }

    /// Every node below this one, in depth-first pre-order.
    pub fn descendants(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        self.traverse(TraversalStrategy::DepthFirst, TraversalOrder::PreOrder)
            .skip(1)
    }

    /// Traverse the subtree rooted at this node, including it.
    #[must_use]
    pub fn traverse(&self, strategy: TraversalStrategy, order: TraversalOrder) -> Traverse<'a> {
        Traverse::new(self.tree, Some(self.id), strategy, order)
    }
}

impl fmt::Display for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// TRAVERSAL
// =============================================================================

enum Frontier {
    Pre(Vec<TreeNodeId>),
    /// `(node, children already pushed)`
    Post(Vec<(TreeNodeId, bool)>),
    Breadth(VecDeque<TreeNodeId>),
}

/// Lazy traversal over a subtree.
pub struct Traverse<'a> {
    tree: &'a Tree,
    frontier: Frontier,
}

impl<'a> Traverse<'a> {
    fn new(
        tree: &'a Tree,
        start: Option<TreeNodeId>,
        strategy: TraversalStrategy,
        order: TraversalOrder,
    ) -> Self {
        let frontier = match (strategy, order) {
            (TraversalStrategy::BreadthFirst, _) => Frontier::Breadth(start.into_iter().collect()),
            (TraversalStrategy::DepthFirst, TraversalOrder::PreOrder) => {
                Frontier::Pre(start.into_iter().collect())
            }
            (TraversalStrategy::DepthFirst, TraversalOrder::PostOrder) => {
                Frontier::Post(start.into_iter().map(|id| (id, false)).collect())
            }
        };
        Self { tree, frontier }
    }
}

impl<'a> Iterator for Traverse<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        let id = match &mut self.frontier {
            Frontier::Pre(stack) => {
                let id = stack.pop()?;
                stack.extend(tree.children_of(id).iter().rev());
                id
            }
            Frontier::Post(stack) => loop {
                let (id, expanded) = stack.pop()?;
                if expanded {
                    break id;
                }
                stack.push((id, true));
                stack.extend(tree.children_of(id).iter().rev().map(|&c| (c, false)));
            },
            Frontier::Breadth(queue) => {
                let id = queue.pop_front()?;
                queue.extend(tree.children_of(id));
                id
            }
        };
        Some(NodeRef { tree, id })
    }
}

// =============================================================================
// TESTS
// =============================================================================
