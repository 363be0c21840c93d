//! # Data Tree
//!
//! Arena of tree nodes addressed by `NodeId`. Parents are recorded as plain
//! ids (a back-reference, never ownership); ownership flows strictly
//! downwards through `Scope::children` and collection items.
//!
//! Every node kind answers the same capability set: `get_data`, `edit`,
//! `done`, `save`, `cancel`/`revert`, `clear`, `render`, and `walk`. The
//! collection arms live in `collection.rs`.
//!
//! Freed slots are never reused, so a stale `NodeId` keeps resolving to
//! `None` instead of aliasing a newer node. The arena is sized for one
//! editing session: rebuild the tree to reclaim slots left by discarded
//! items.
//!
//! ## Node flags
//!
//! - `editing`: set top-down by `edit`, cleared by `done`, `save` and `cancel`
//! - `unsaved_changes`: the node's *own* dirty flag; aggregation across the
//!   tree is the session's job

use crate::collection::{Collection, ControlBinding};
use crate::errors::EditorError;
use crate::surface::{AnchorId, AnchorKind, Surface};
use crate::template::{Mode, Schema};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Deref;
use tracing::debug;

/// Opaque handle to a node in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One step of a node path: a property name or a collection index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Property(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Property(name) => f.write_str(name),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Dotted form of a path (`people.0.name`)
pub fn format_path(path: &[PathSegment]) -> String {
    path.iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Leaf node holding a single value
#[derive(Debug, Clone)]
pub struct Primitive {
    value: Value,
    saved: Value,
    default: Value,
}

impl Primitive {
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn saved_value(&self) -> &Value {
        &self.saved
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }
}

/// Composite node grouping nested properties
#[derive(Debug, Clone, Default)]
pub struct Scope {
    children: Vec<NodeId>,
}

impl Scope {
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

#[derive(Debug)]
pub enum NodeKind {
    Primitive(Primitive),
    Scope(Scope),
    Collection(Collection),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Primitive(_) => "primitive",
            NodeKind::Scope(_) => "scope",
            NodeKind::Collection(_) => "collection",
        }
    }
}

#[derive(Debug)]
pub struct Node {
    pub property: Option<String>,
    pub type_name: Option<String>,
    pub parent: Option<NodeId>,
    pub anchor: AnchorId,
    pub editing: bool,
    pub unsaved_changes: bool,
    pub mode: Mode,
    pub kind: NodeKind,
}

impl Node {
    pub fn as_primitive(&self) -> Option<&Primitive> {
        match &self.kind {
            NodeKind::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_scope(&self) -> Option<&Scope> {
        match &self.kind {
            NodeKind::Scope(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match &self.kind {
            NodeKind::Collection(c) => Some(c),
            _ => None,
        }
    }
}

/// Borrowed node plus its id, handed to `walk` callbacks
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    pub id: NodeId,
    node: &'a Node,
}

impl<'a> Deref for NodeRef<'a> {
    type Target = Node;

    fn deref(&self) -> &Node {
        self.node
    }
}

/// Options forwarded through `get_data`
#[derive(Debug, Clone, Copy, Default)]
pub struct DataOptions {
    /// Keep soft-deleted items in collection output
    pub include_deleted: bool,
}

/// Shape of a node's subtree, captured before recursing so no borrow of
/// the arena is held across the recursive call
enum Branch {
    Leaf,
    Scope(Vec<NodeId>),
    Collection,
}

/// Node arena plus the render surface it is bound to
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Option<Node>>,
    live: usize,
    root: NodeId,
    pub(crate) surface: Surface,
    pub(crate) controls: HashMap<AnchorId, ControlBinding>,
    owners: HashMap<AnchorId, NodeId>,
}

impl Tree {
    /// Instantiate `schema` as a fresh tree on `surface`. The root must be a scope.
    pub fn build(schema: &Schema, surface: Surface) -> Result<Self, EditorError> {
        if !matches!(schema, Schema::Scope { .. }) {
            return Err(EditorError::InvalidSchema(
                "the root of a tree must be a scope".to_string(),
            ));
        }

        let mut tree = Self {
            nodes: Vec::new(),
            live: 0,
            root: NodeId(0),
            surface,
            controls: HashMap::new(),
            owners: HashMap::new(),
        };

        let anchor = tree.surface.create(AnchorKind::Root);
        tree.root = tree.instantiate_at(schema, None, anchor)?;

        debug!(nodes = tree.len(), "Tree built");
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, EditorError> {
        self.get(id).ok_or(EditorError::NodeNotFound(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, EditorError> {
        self.nodes
            .get_mut(id.0)
            .and_then(|n| n.as_mut())
            .ok_or(EditorError::NodeNotFound(id))
    }

    pub fn primitive(&self, id: NodeId) -> Result<&Primitive, EditorError> {
        self.node(id)?.as_primitive().ok_or(EditorError::WrongKind {
            node: id,
            expected: "primitive",
        })
    }

    fn primitive_mut(&mut self, id: NodeId) -> Result<&mut Primitive, EditorError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Primitive(p) => Ok(p),
            _ => Err(EditorError::WrongKind {
                node: id,
                expected: "primitive",
            }),
        }
    }

    pub fn collection(&self, id: NodeId) -> Result<&Collection, EditorError> {
        self.node(id)?.as_collection().ok_or(EditorError::WrongKind {
            node: id,
            expected: "collection",
        })
    }

    pub(crate) fn collection_mut(&mut self, id: NodeId) -> Result<&mut Collection, EditorError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Collection(c) => Ok(c),
            _ => Err(EditorError::WrongKind {
                node: id,
                expected: "collection",
            }),
        }
    }

    pub fn value(&self, id: NodeId) -> Result<&Value, EditorError> {
        Ok(self.primitive(id)?.value())
    }

    /// Node owning `anchor` as its render anchor
    pub fn owner(&self, anchor: AnchorId) -> Option<NodeId> {
        self.owners.get(&anchor).copied()
    }

    /// Control bound to `anchor`, if it is one
    pub fn control(&self, anchor: AnchorId) -> Option<ControlBinding> {
        self.controls.get(&anchor).copied()
    }

    /// Whether `id` is an item of a collection
    pub fn is_item(&self, id: NodeId) -> bool {
        self.get(id)
            .and_then(|n| n.parent)
            .and_then(|p| self.get(p))
            .map(|p| p.as_collection().is_some())
            .unwrap_or(false)
    }

    /// `id` itself if it is an item, else its nearest item ancestor
    pub fn enclosing_item(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(candidate) = current {
            if self.is_item(candidate) {
                return Some(candidate);
            }
            current = self.get(candidate).and_then(|n| n.parent);
        }
        None
    }

    /// Direct children: scope members or collection items, in order
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match self.get(id).map(|n| &n.kind) {
            Some(NodeKind::Scope(scope)) => scope.children.clone(),
            Some(NodeKind::Collection(c)) => c.items().iter().map(|i| i.node).collect(),
            _ => Vec::new(),
        }
    }

    fn branch(&self, id: NodeId) -> Result<Branch, EditorError> {
        Ok(match &self.node(id)?.kind {
            NodeKind::Primitive(_) => Branch::Leaf,
            NodeKind::Scope(scope) => Branch::Scope(scope.children.clone()),
            NodeKind::Collection(_) => Branch::Collection,
        })
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        let anchor = node.anchor;
        self.nodes.push(Some(node));
        self.live += 1;
        let id = NodeId(self.nodes.len() - 1);
        self.owners.insert(anchor, id);
        id
    }

    /// Instantiate `schema` inside `container`, appending a fresh anchor
    pub(crate) fn instantiate_into(
        &mut self,
        schema: &Schema,
        parent: Option<NodeId>,
        container: AnchorId,
    ) -> Result<NodeId, EditorError> {
        match schema {
            Schema::Collection(template) => self.construct_collection(template, parent, container),
            _ => {
                let anchor = self.surface.create(AnchorKind::Element);
                self.surface.append(container, anchor)?;
                self.instantiate_at(schema, parent, anchor)
            }
        }
    }

    /// Instantiate `schema` bound to an existing anchor
    pub(crate) fn instantiate_at(
        &mut self,
        schema: &Schema,
        parent: Option<NodeId>,
        anchor: AnchorId,
    ) -> Result<NodeId, EditorError> {
        match schema {
            Schema::Primitive {
                property,
                default,
                mode,
            } => Ok(self.alloc(Node {
                property: property.clone(),
                type_name: None,
                parent,
                anchor,
                editing: false,
                unsaved_changes: false,
                mode: *mode,
                kind: NodeKind::Primitive(Primitive {
                    value: default.clone(),
                    saved: default.clone(),
                    default: default.clone(),
                }),
            })),
            Schema::Scope {
                property,
                type_name,
                children,
            } => {
                let id = self.alloc(Node {
                    property: property.clone(),
                    type_name: type_name.clone(),
                    parent,
                    anchor,
                    editing: false,
                    unsaved_changes: false,
                    mode: Mode::ReadEdit,
                    kind: NodeKind::Scope(Scope::default()),
                });

                for child in children {
                    let child_id = self.instantiate_into(child, Some(id), anchor)?;
                    if let NodeKind::Scope(scope) = &mut self.node_mut(id)?.kind {
                        scope.children.push(child_id);
                    }
                }
                Ok(id)
            }
            Schema::Collection(_) => Err(EditorError::InvalidSchema(
                "a collection cannot be the item of another collection".to_string(),
            )),
        }
    }

    /// Free `id` and everything below it. Anchors are the caller's concern.
    pub(crate) fn discard(&mut self, id: NodeId) {
        let mut freed = HashSet::new();
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            stack.extend(self.children(current));
            if let Some(node) = self.nodes.get_mut(current.0).and_then(|n| n.take()) {
                self.live -= 1;
                self.owners.remove(&node.anchor);
                if let NodeKind::Collection(c) = &node.kind {
                    self.controls.remove(&c.add_control());
                }
                freed.insert(current);
            }
        }

        self.controls.retain(|_, binding| {
            !freed.contains(&binding.collection)
                && binding.item.map_or(true, |item| !freed.contains(&item))
        });
    }

    pub(crate) fn mark_unsaved(&mut self, id: NodeId) -> Result<(), EditorError> {
        self.node_mut(id)?.unsaved_changes = true;
        Ok(())
    }

    /// Enter edit mode, top-down
    pub fn edit(&mut self, id: NodeId) -> Result<(), EditorError> {
        self.node_mut(id)?.editing = true;

        match self.branch(id)? {
            Branch::Leaf => {}
            Branch::Scope(children) => {
                for child in children {
                    self.edit(child)?;
                }
            }
            Branch::Collection => self.edit_collection(id)?,
        }
        Ok(())
    }

    /// Conclude edit mode without committing or reverting anything
    pub fn done(&mut self, id: NodeId) -> Result<(), EditorError> {
        self.node_mut(id)?.editing = false;

        match self.branch(id)? {
            Branch::Leaf => {}
            Branch::Scope(children) => {
                for child in children {
                    self.done(child)?;
                }
            }
            Branch::Collection => self.done_collection(id)?,
        }
        Ok(())
    }

    /// Commit current values as the saved state
    pub fn save(&mut self, id: NodeId) -> Result<(), EditorError> {
        match self.branch(id)? {
            Branch::Leaf => {
                let primitive = self.primitive_mut(id)?;
                primitive.saved = primitive.value.clone();
            }
            Branch::Scope(children) => {
                for child in children {
                    self.save(child)?;
                }
            }
            Branch::Collection => self.save_collection(id)?,
        }

        let node = self.node_mut(id)?;
        node.unsaved_changes = false;
        node.editing = false;
        Ok(())
    }

    /// Discard edits, restoring the last saved values
    pub fn cancel(&mut self, id: NodeId) -> Result<(), EditorError> {
        match self.branch(id)? {
            Branch::Leaf => {
                let primitive = self.primitive_mut(id)?;
                primitive.value = primitive.saved.clone();
            }
            Branch::Scope(children) => {
                for child in children {
                    self.cancel(child)?;
                }
            }
            Branch::Collection => self.cancel_collection(id)?,
        }

        let node = self.node_mut(id)?;
        node.unsaved_changes = false;
        node.editing = false;
        Ok(())
    }

    pub fn revert(&mut self, id: NodeId) -> Result<(), EditorError> {
        self.cancel(id)
    }

    /// Reset to an empty state: no items, primitives back to defaults
    pub fn clear(&mut self, id: NodeId) -> Result<(), EditorError> {
        match self.branch(id)? {
            Branch::Leaf => {
                let primitive = self.primitive_mut(id)?;
                primitive.value = primitive.default.clone();
                primitive.saved = primitive.default.clone();
            }
            Branch::Scope(children) => {
                for child in children {
                    self.clear(child)?;
                }
            }
            Branch::Collection => self.clear_collection(id)?,
        }

        self.node_mut(id)?.unsaved_changes = false;
        Ok(())
    }

    /// Hydrate a subtree from data
    pub fn render(&mut self, id: NodeId, data: &Value) -> Result<(), EditorError> {
        match self.branch(id)? {
            Branch::Leaf => {
                let primitive = self.primitive_mut(id)?;
                let value = if data.is_null() {
                    primitive.default.clone()
                } else {
                    data.clone()
                };
                primitive.saved = value.clone();
                primitive.value = value;
            }
            Branch::Scope(children) => {
                if let Value::Object(record) = data {
                    for child in children {
                        let Some(property) = self.node(child)?.property.clone() else {
                            continue;
                        };
                        let datum = record.get(&property).unwrap_or(&Value::Null);
                        self.render(child, datum)?;
                    }
                }
            }
            Branch::Collection => self.render_collection(id, data)?,
        }

        self.node_mut(id)?.unsaved_changes = false;
        Ok(())
    }

    /// Serialize a subtree. `None` means the node has nothing to contribute.
    pub fn get_data(&self, id: NodeId, options: &DataOptions) -> Result<Option<Value>, EditorError> {
        match self.branch(id)? {
            Branch::Leaf => Ok(Some(self.primitive(id)?.value.clone())),
            Branch::Scope(children) => {
                let mut record = Map::new();
                for child in children {
                    let Some(property) = self.node(child)?.property.clone() else {
                        continue;
                    };
                    if let Some(value) = self.get_data(child, options)? {
                        record.insert(property, value);
                    }
                }
                Ok(Some(Value::Object(record)))
            }
            Branch::Collection => Ok(Some(self.collection_data(id, options)?)),
        }
    }

    /// Set a primitive's value. Returns whether the value changed.
    pub fn set_value(&mut self, id: NodeId, value: Value) -> Result<bool, EditorError> {
        let primitive = self.primitive_mut(id)?;
        if primitive.value == value {
            return Ok(false);
        }
        primitive.value = value;
        let dirty = primitive.value != primitive.saved;

        self.node_mut(id)?.unsaved_changes = dirty;
        debug!(node = ?id, dirty, "Value changed");
        Ok(true)
    }

    /// Depth-first traversal from `start`. Returning `false` from the
    /// callback skips that node's children. Returns `true` iff no callback
    /// returned `false`.
    pub fn walk<F>(&self, start: NodeId, mut callback: F) -> bool
    where
        F: FnMut(NodeRef<'_>, &[PathSegment]) -> bool,
    {
        let mut completed = true;
        let mut stack: Vec<(NodeId, Vec<PathSegment>)> = vec![(start, Vec::new())];

        while let Some((id, path)) = stack.pop() {
            let Some(node) = self.get(id) else {
                continue;
            };

            if !callback(NodeRef { id, node }, &path) {
                completed = false;
                continue;
            }

            let entries: Vec<(NodeId, Option<PathSegment>)> = match &node.kind {
                NodeKind::Primitive(_) => Vec::new(),
                NodeKind::Scope(scope) => scope
                    .children
                    .iter()
                    .map(|child| {
                        let segment = self
                            .get(*child)
                            .and_then(|n| n.property.clone())
                            .map(PathSegment::Property);
                        (*child, segment)
                    })
                    .collect(),
                NodeKind::Collection(c) => c
                    .items()
                    .iter()
                    .enumerate()
                    .map(|(i, item)| (item.node, Some(PathSegment::Index(i))))
                    .collect(),
            };

            for (child, segment) in entries.into_iter().rev() {
                let mut child_path = path.clone();
                child_path.extend(segment);
                stack.push((child, child_path));
            }
        }

        completed
    }

    /// True iff any node under `start` satisfies `test`
    pub fn some<F>(&self, start: NodeId, mut test: F) -> bool
    where
        F: FnMut(NodeRef<'_>, &[PathSegment]) -> bool,
    {
        !self.walk(start, |node, path| !test(node, path))
    }

    /// Look up a node by dotted path from the root (`people.0.name`)
    pub fn resolve(&self, path: &str) -> Result<NodeId, EditorError> {
        let not_found = || EditorError::PathNotFound(path.to_string());
        let mut current = self.root;

        for segment in path.split('.').filter(|s| !s.is_empty()) {
            current = match &self.node(current)?.kind {
                NodeKind::Collection(c) => {
                    let index: usize = segment.parse().map_err(|_| not_found())?;
                    c.items().get(index).map(|i| i.node).ok_or_else(not_found)?
                }
                NodeKind::Scope(scope) => scope
                    .children
                    .iter()
                    .copied()
                    .find(|child| {
                        self.get(*child).and_then(|n| n.property.as_deref()) == Some(segment)
                    })
                    .ok_or_else(not_found)?,
                NodeKind::Primitive(_) => return Err(not_found()),
            };
        }

        Ok(current)
    }

    /// Path of `id` from the root
    pub fn path_of(&self, id: NodeId) -> Result<Vec<PathSegment>, EditorError> {
        let mut segments = Vec::new();
        let mut current = id;

        while let Some(parent) = self.node(current)?.parent {
            match &self.node(parent)?.kind {
                NodeKind::Collection(c) => {
                    let index = c.position(current).ok_or(EditorError::ItemNotFound {
                        collection: parent,
                        item: current,
                    })?;
                    segments.push(PathSegment::Index(index));
                }
                _ => {
                    if let Some(property) = &self.node(current)?.property {
                        segments.push(PathSegment::Property(property.clone()));
                    }
                }
            }
            current = parent;
        }

        segments.reverse();
        Ok(segments)
    }
}
