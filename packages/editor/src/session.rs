//! # Edit Session
//!
//! Tree-wide edit/save/revert state machine for one bound tree.
//!
//! ```text
//! Viewing ──edit──→ Editing ──begin_save──→ Saving ──commit──→ Viewing
//!    ↑                 │                       │
//!    │                 │                  abort_save
//!    │                 │                       ↓
//!    │                 │                 (previous state)
//!    │                 └──revert──→ Reverting ──→ Viewing
//!    └────────────done────────────┘
//! ```
//!
//! The session also owns the edit-mode interaction wiring: hover
//! highlighting and control activation are inert until `edit` installs them
//! and `done` removes them.

use crate::collection::ControlAction;
use crate::errors::EditorError;
use crate::serializer::to_data_string;
use crate::surface::{classes, AnchorId};
use crate::template::Mode;
use crate::tree::{DataOptions, NodeId, NodeKind, NodeRef, PathSegment, Tree};
use serde_json::Value;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Viewing,
    Editing,
    Saving,
    Reverting,
}

/// Result of activating a control anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// A new item was inserted (and is being edited)
    Added(NodeId),
    Deleted(NodeId),
    /// The user declined the confirmation, or the item was already going
    Declined,
    /// Not a control, or edit mode is off
    Ignored,
}

/// Hover state installed by edit mode
#[derive(Debug, Default)]
struct Wiring {
    hovered: Option<AnchorId>,
    ancestors: Vec<AnchorId>,
    highlighted: Option<AnchorId>,
}

#[derive(Debug)]
pub struct EditSession {
    tree: Tree,
    state: SessionState,
    unsaved_changes: bool,
    wiring: Option<Wiring>,
}

impl EditSession {
    pub fn new(tree: Tree) -> Self {
        Self {
            tree,
            state: SessionState::Viewing,
            unsaved_changes: false,
            wiring: None,
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_editing(&self) -> bool {
        self.wiring.is_some()
    }

    pub fn unsaved_changes(&self) -> bool {
        self.unsaved_changes
    }

    /// Enter edit mode over the whole tree
    pub fn edit(&mut self) -> Result<(), EditorError> {
        self.tree.edit(self.tree.root())?;
        if self.wiring.is_none() {
            self.wiring = Some(Wiring::default());
        }
        self.state = SessionState::Editing;
        self.set_unsaved_changes(None);

        debug!(unsaved = self.unsaved_changes, "Edit mode entered");
        Ok(())
    }

    /// Conclude edit mode, keeping current values
    pub fn done(&mut self) -> Result<(), EditorError> {
        self.tree.done(self.tree.root())?;
        self.unwire();
        self.unsaved_changes = false;
        self.state = SessionState::Viewing;

        debug!("Edit mode concluded");
        Ok(())
    }

    /// `Some(true)` forces the session flag on, `Some(false)` clears every
    /// node's flag, `None` recomputes the flag from the tree without
    /// mutating it. Returns the resulting session flag.
    pub fn set_unsaved_changes(&mut self, value: Option<bool>) -> bool {
        match value {
            Some(true) => self.unsaved_changes = true,
            Some(false) => {
                let mut ids = Vec::new();
                self.tree.walk(self.tree.root(), |node, _| {
                    ids.push(node.id);
                    true
                });
                for id in ids {
                    if let Ok(node) = self.tree.node_mut(id) {
                        node.unsaved_changes = false;
                    }
                }
                self.unsaved_changes = false;
            }
            None => {
                self.unsaved_changes = self
                    .tree
                    .some(self.tree.root(), |node, _| node.unsaved_changes);
            }
        }
        self.unsaved_changes
    }

    /// Replace the tree's contents with `data`. `None` renders an empty tree.
    pub fn render(&mut self, data: Option<&Value>) -> Result<(), EditorError> {
        let root = self.tree.root();
        self.tree.clear(root)?;
        if let Some(data) = data {
            self.tree.render(root, data)?;
        }

        if self.is_editing() {
            self.tree.edit(root)?;
        }
        self.set_unsaved_changes(Some(false));

        debug!(empty = data.is_none(), "Session rendered");
        Ok(())
    }

    /// Mark a save as in flight. Nothing is committed until `commit`.
    pub fn begin_save(&mut self) -> SessionState {
        let previous = self.state;
        self.state = SessionState::Saving;
        previous
    }

    /// Restore the state held before `begin_save` after a failed write
    pub fn abort_save(&mut self, previous: SessionState) {
        if self.state == SessionState::Saving {
            self.state = previous;
        }
    }

    /// Commit the tree after a confirmed write and leave edit mode
    pub fn commit(&mut self) -> Result<(), EditorError> {
        self.state = SessionState::Saving;
        let root = self.tree.root();
        self.tree.save(root)?;
        self.tree.done(root)?;
        self.unwire();
        self.set_unsaved_changes(Some(false));
        self.state = SessionState::Viewing;

        info!("Session committed");
        Ok(())
    }

    /// Discard local edits. Never touches a backend.
    pub fn revert(&mut self) -> Result<(), EditorError> {
        self.state = SessionState::Reverting;
        self.tree.revert(self.tree.root())?;
        self.unwire();
        self.set_unsaved_changes(Some(false));
        self.state = SessionState::Viewing;

        info!("Session reverted");
        Ok(())
    }

    /// Empty the tree: no items, primitives back to their defaults
    pub fn clear(&mut self) -> Result<(), EditorError> {
        let root = self.tree.root();
        self.tree.clear(root)?;
        if self.is_editing() {
            self.tree.edit(root)?;
        }
        self.set_unsaved_changes(Some(false));
        Ok(())
    }

    pub fn walk<F>(&self, callback: F) -> bool
    where
        F: FnMut(NodeRef<'_>, &[PathSegment]) -> bool,
    {
        self.tree.walk(self.tree.root(), callback)
    }

    pub fn some<F>(&self, test: F) -> bool
    where
        F: FnMut(NodeRef<'_>, &[PathSegment]) -> bool,
    {
        self.tree.some(self.tree.root(), test)
    }

    /// Whether anything in the tree is only editable through edit mode
    pub fn needs_edit(&self) -> bool {
        self.some(|node, _| {
            !matches!(node.kind, NodeKind::Scope(_)) && node.mode == Mode::ReadEdit
        })
    }

    pub fn get_data(&self, options: &DataOptions) -> Result<Value, EditorError> {
        Ok(self
            .tree
            .get_data(self.tree.root(), options)?
            .unwrap_or(Value::Null))
    }

    /// Serialized data plus its string encoding
    pub fn snapshot(&self) -> Result<(Value, String), EditorError> {
        let data = self.get_data(&DataOptions::default())?;
        let data_string = to_data_string(&data)?;
        Ok((data, data_string))
    }

    /// Set a primitive by dotted path. Returns whether the value changed.
    pub fn set_value(&mut self, path: &str, value: Value) -> Result<bool, EditorError> {
        let id = self.tree.resolve(path)?;
        let changed = self.tree.set_value(id, value)?;
        if changed {
            self.set_unsaved_changes(None);
        }
        Ok(changed)
    }

    /// Whether `id` sits in a branch currently being edited
    pub fn in_editing_branch(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(candidate) = current {
            match self.tree.get(candidate) {
                Some(node) if node.editing => return true,
                Some(node) => current = node.parent,
                None => return false,
            }
        }
        false
    }

    /// Add an item to a collection, editing it when edit mode is on
    pub fn add_item(&mut self, collection: NodeId) -> Result<NodeId, EditorError> {
        let item = self.tree.add(collection)?;
        if self.is_editing() {
            self.tree.edit(item)?;
        }
        self.set_unsaved_changes(Some(true));
        Ok(item)
    }

    /// Soft-delete an item (waits for the fade)
    pub async fn delete_item(
        &mut self,
        collection: NodeId,
        item: NodeId,
    ) -> Result<bool, EditorError> {
        let deleted = self.tree.delete(collection, item).await?;
        if deleted {
            self.clear_hover_state();
            self.set_unsaved_changes(Some(true));
        }
        Ok(deleted)
    }

    /// Pointer entered `anchor`: the nearest editing item is hovered, its
    /// item ancestors are flagged, and an item's controls highlight it.
    pub fn pointer_enter(&mut self, anchor: AnchorId) {
        if self.wiring.is_none() {
            return;
        }

        let highlight = self.tree.control(anchor).and_then(|binding| {
            let item = binding.item?;
            let item_anchor = self.tree.get(item)?.anchor;
            Some((item_anchor, binding.action))
        });

        let hovered = self.nearest_editing_item(anchor);
        let ancestors = match hovered {
            Some(item) => self.item_ancestors(item),
            None => Vec::new(),
        };

        self.clear_hover_state();
        let surface = self.tree.surface_mut();

        if let Some(item) = hovered {
            surface.add_class(item, classes::HOVERED);
        }
        for ancestor in &ancestors {
            surface.add_class(*ancestor, classes::HAS_HOVERED_ITEM);
        }
        if let Some((item, action)) = highlight {
            surface.add_class(item, classes::HIGHLIGHT);
            if action == ControlAction::Delete {
                surface.add_class(item, classes::DELETE_HOVER);
            }
        }

        if let Some(wiring) = self.wiring.as_mut() {
            wiring.hovered = hovered;
            wiring.ancestors = ancestors;
            wiring.highlighted = highlight.map(|(item, _)| item);
        }
    }

    /// Pointer left `anchor`
    pub fn pointer_leave(&mut self, anchor: AnchorId) {
        let Some(wiring) = self.wiring.as_ref() else {
            return;
        };

        if self.tree.control(anchor).is_some() {
            if let Some(item) = wiring.highlighted {
                let surface = self.tree.surface_mut();
                surface.remove_class(item, classes::HIGHLIGHT);
                surface.remove_class(item, classes::DELETE_HOVER);
            }
            if let Some(wiring) = self.wiring.as_mut() {
                wiring.highlighted = None;
            }
            return;
        }

        if self.nearest_editing_item(anchor) == wiring.hovered {
            self.clear_hover_state();
        }
    }

    /// Dispatch a control anchor: delete asks `confirm` first
    pub async fn activate<F>(
        &mut self,
        anchor: AnchorId,
        confirm: F,
    ) -> Result<ControlOutcome, EditorError>
    where
        F: FnOnce(&str) -> bool,
    {
        if !self.is_editing() {
            return Ok(ControlOutcome::Ignored);
        }
        let Some(binding) = self.tree.control(anchor) else {
            return Ok(ControlOutcome::Ignored);
        };

        let outcome = match (binding.action, binding.item) {
            (ControlAction::Delete, Some(item)) => {
                if self
                    .tree
                    .request_delete(binding.collection, item, confirm)
                    .await?
                {
                    self.clear_hover_state();
                    self.set_unsaved_changes(Some(true));
                    ControlOutcome::Deleted(item)
                } else {
                    ControlOutcome::Declined
                }
            }
            (ControlAction::AddSibling, Some(item)) => {
                let added = self.tree.add_after(binding.collection, item)?;
                self.set_unsaved_changes(Some(true));
                ControlOutcome::Added(added)
            }
            (ControlAction::AddItem, _) => {
                let added = self.add_item(binding.collection)?;
                ControlOutcome::Added(added)
            }
            _ => ControlOutcome::Ignored,
        };

        debug!(?anchor, ?outcome, "Control activated");
        Ok(outcome)
    }

    fn nearest_editing_item(&self, anchor: AnchorId) -> Option<AnchorId> {
        let tree = &self.tree;
        tree.surface().closest(anchor, |id, a| {
            a.has_class(classes::ITEM)
                && tree
                    .owner(id)
                    .and_then(|node| tree.get(node))
                    .map(|node| node.editing)
                    .unwrap_or(false)
        })
    }

    fn item_ancestors(&self, item: AnchorId) -> Vec<AnchorId> {
        let surface = self.tree.surface();
        let mut ancestors = Vec::new();
        let mut current = surface.parent(item);

        while let Some(start) = current {
            match surface.closest(start, |_, a| a.has_class(classes::ITEM)) {
                Some(found) => {
                    ancestors.push(found);
                    current = surface.parent(found);
                }
                None => break,
            }
        }
        ancestors
    }

    fn clear_hover_state(&mut self) {
        let Some(wiring) = self.wiring.as_mut() else {
            return;
        };
        let hovered = wiring.hovered.take();
        let ancestors = std::mem::take(&mut wiring.ancestors);
        let highlighted = wiring.highlighted.take();

        let surface = self.tree.surface_mut();
        if let Some(item) = hovered {
            surface.remove_class(item, classes::HOVERED);
        }
        for ancestor in ancestors {
            surface.remove_class(ancestor, classes::HAS_HOVERED_ITEM);
        }
        if let Some(item) = highlighted {
            surface.remove_class(item, classes::HIGHLIGHT);
            surface.remove_class(item, classes::DELETE_HOVER);
        }
    }

    fn unwire(&mut self) {
        self.clear_hover_state();
        self.wiring = None;
    }
}
