//! # Render Surface
//!
//! In-memory model of the rendered representation: an ordered tree of
//! anchors. Tree nodes own one anchor each; collections keep a marker
//! anchor where their template used to be so new items land in the right
//! place after the template is detached.
//!
//! Anchors are addressed by `AnchorId` and stored in a slab. Removing an
//! anchor frees its whole subtree; ids are never reused.

use crate::errors::EditorError;
use std::collections::BTreeSet;
use std::time::Duration;

/// Class names toggled on anchors
pub mod classes {
    pub const ITEM: &str = "item";
    pub const DELETED: &str = "deleted";
    pub const HOVERED: &str = "item-hovered";
    pub const HAS_HOVERED_ITEM: &str = "has-hovered-item";
    pub const DELETE_HOVER: &str = "delete-hover";
    pub const HIGHLIGHT: &str = "highlight";
}

/// Opaque handle to a render anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorKind {
    Root,
    Element,
    Marker,
    /// Toolbar holding an item's controls
    Controls,
    Control(ControlKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Delete,
    AddSibling,
    AddItem,
}

#[derive(Debug, Clone)]
pub struct Anchor {
    pub kind: AnchorKind,
    pub label: Option<String>,
    pub opacity: f32,
    pub hidden: bool,
    parent: Option<AnchorId>,
    children: Vec<AnchorId>,
    classes: BTreeSet<String>,
}

impl Anchor {
    fn new(kind: AnchorKind, label: Option<String>) -> Self {
        Self {
            kind,
            label,
            opacity: 1.0,
            hidden: kind == AnchorKind::Marker,
            parent: None,
            children: Vec::new(),
            classes: BTreeSet::new(),
        }
    }

    pub fn parent(&self) -> Option<AnchorId> {
        self.parent
    }

    pub fn children(&self) -> &[AnchorId] {
        &self.children
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }
}

/// Ordered anchor tree
#[derive(Debug, Default)]
pub struct Surface {
    anchors: Vec<Option<Anchor>>,
    transition: Duration,
}

impl Surface {
    /// Create a surface whose fade transitions take `transition`
    pub fn new(transition: Duration) -> Self {
        Self {
            anchors: Vec::new(),
            transition,
        }
    }

    pub fn transition(&self) -> Duration {
        self.transition
    }

    pub fn create(&mut self, kind: AnchorKind) -> AnchorId {
        self.anchors.push(Some(Anchor::new(kind, None)));
        AnchorId(self.anchors.len() - 1)
    }

    pub fn create_labeled(&mut self, kind: AnchorKind, label: impl Into<String>) -> AnchorId {
        self.anchors.push(Some(Anchor::new(kind, Some(label.into()))));
        AnchorId(self.anchors.len() - 1)
    }

    pub fn get(&self, id: AnchorId) -> Option<&Anchor> {
        self.anchors.get(id.0).and_then(|a| a.as_ref())
    }

    fn anchor(&self, id: AnchorId) -> Result<&Anchor, EditorError> {
        self.get(id).ok_or(EditorError::AnchorNotFound(id))
    }

    fn anchor_mut(&mut self, id: AnchorId) -> Result<&mut Anchor, EditorError> {
        self.anchors
            .get_mut(id.0)
            .and_then(|a| a.as_mut())
            .ok_or(EditorError::AnchorNotFound(id))
    }

    pub fn contains(&self, id: AnchorId) -> bool {
        self.get(id).is_some()
    }

    pub fn parent(&self, id: AnchorId) -> Option<AnchorId> {
        self.get(id).and_then(|a| a.parent)
    }

    pub fn children(&self, id: AnchorId) -> &[AnchorId] {
        self.get(id).map(|a| a.children()).unwrap_or(&[])
    }

    pub fn is_attached(&self, id: AnchorId) -> bool {
        self.parent(id).is_some()
    }

    /// Remove an anchor from its parent, keeping it (and its subtree) alive
    pub fn detach(&mut self, id: AnchorId) -> Result<(), EditorError> {
        let parent = self.anchor(id)?.parent;
        if let Some(parent) = parent {
            self.anchor_mut(parent)?.children.retain(|c| *c != id);
        }
        self.anchor_mut(id)?.parent = None;
        Ok(())
    }

    /// Detach an anchor and free its subtree
    pub fn remove(&mut self, id: AnchorId) -> Result<(), EditorError> {
        self.detach(id)?;

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(anchor) = self.anchors.get_mut(current.0).and_then(|a| a.take()) {
                stack.extend(anchor.children);
            }
        }
        Ok(())
    }

    pub fn append(&mut self, parent: AnchorId, child: AnchorId) -> Result<(), EditorError> {
        self.anchor(parent)?;
        self.detach(child)?;
        self.anchor_mut(parent)?.children.push(child);
        self.anchor_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn insert_before(&mut self, reference: AnchorId, new: AnchorId) -> Result<(), EditorError> {
        self.insert_all_at(reference, &[new], 0)
    }

    pub fn insert_after(&mut self, reference: AnchorId, new: AnchorId) -> Result<(), EditorError> {
        self.insert_all_at(reference, &[new], 1)
    }

    /// Insert several anchors, in order, right before `reference` in one step
    pub fn insert_all_before(
        &mut self,
        reference: AnchorId,
        anchors: &[AnchorId],
    ) -> Result<(), EditorError> {
        self.insert_all_at(reference, anchors, 0)
    }

    fn insert_all_at(
        &mut self,
        reference: AnchorId,
        anchors: &[AnchorId],
        offset: usize,
    ) -> Result<(), EditorError> {
        for anchor in anchors {
            self.detach(*anchor)?;
        }

        let parent = self
            .anchor(reference)?
            .parent
            .ok_or(EditorError::DetachedAnchor(reference))?;

        let siblings = &mut self.anchor_mut(parent)?.children;
        let index = siblings
            .iter()
            .position(|c| *c == reference)
            .ok_or(EditorError::DetachedAnchor(reference))?
            + offset;
        siblings.splice(index..index, anchors.iter().copied());

        for anchor in anchors {
            self.anchor_mut(*anchor)?.parent = Some(parent);
        }
        Ok(())
    }

    /// Position among its siblings
    pub fn index_of(&self, id: AnchorId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    /// First anchor, starting at `id` and walking up, that satisfies `test`
    pub fn closest<F>(&self, id: AnchorId, mut test: F) -> Option<AnchorId>
    where
        F: FnMut(AnchorId, &Anchor) -> bool,
    {
        let mut current = Some(id);
        while let Some(candidate) = current {
            let anchor = self.get(candidate)?;
            if test(candidate, anchor) {
                return Some(candidate);
            }
            current = anchor.parent;
        }
        None
    }

    pub fn has_class(&self, id: AnchorId, class: &str) -> bool {
        self.get(id).map(|a| a.has_class(class)).unwrap_or(false)
    }

    pub fn toggle_class(&mut self, id: AnchorId, class: &str, on: bool) {
        if let Ok(anchor) = self.anchor_mut(id) {
            if on {
                anchor.classes.insert(class.to_string());
            } else {
                anchor.classes.remove(class);
            }
        }
    }

    pub fn add_class(&mut self, id: AnchorId, class: &str) {
        self.toggle_class(id, class, true);
    }

    pub fn remove_class(&mut self, id: AnchorId, class: &str) {
        self.toggle_class(id, class, false);
    }

    pub fn set_hidden(&mut self, id: AnchorId, hidden: bool) {
        if let Ok(anchor) = self.anchor_mut(id) {
            anchor.hidden = hidden;
        }
    }

    pub fn set_opacity(&mut self, id: AnchorId, opacity: f32) {
        if let Ok(anchor) = self.anchor_mut(id) {
            anchor.opacity = opacity;
        }
    }

    /// Fade an anchor out, resolving once the transition has finished
    pub async fn fade_out(&mut self, id: AnchorId) -> Result<(), EditorError> {
        self.anchor(id)?;
        if !self.transition.is_zero() {
            tokio::time::sleep(self.transition).await;
        }
        self.set_opacity(id, 0.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_with_children(n: usize) -> (Surface, AnchorId, Vec<AnchorId>) {
        let mut surface = Surface::default();
        let root = surface.create(AnchorKind::Root);
        let children = (0..n)
            .map(|_| {
                let child = surface.create(AnchorKind::Element);
                surface.append(root, child).unwrap();
                child
            })
            .collect();
        (surface, root, children)
    }

    #[test]
    fn test_insert_before_and_after() {
        let (mut surface, root, children) = surface_with_children(2);
        let before = surface.create(AnchorKind::Element);
        let after = surface.create(AnchorKind::Element);

        surface.insert_before(children[1], before).unwrap();
        surface.insert_after(children[1], after).unwrap();

        assert_eq!(
            surface.children(root),
            &[children[0], before, children[1], after]
        );
        assert_eq!(surface.parent(after), Some(root));
    }

    #[test]
    fn test_batch_insert_preserves_order() {
        let (mut surface, root, children) = surface_with_children(1);
        let batch: Vec<_> = (0..3).map(|_| surface.create(AnchorKind::Element)).collect();

        surface.insert_all_before(children[0], &batch).unwrap();

        assert_eq!(
            surface.children(root),
            &[batch[0], batch[1], batch[2], children[0]]
        );
    }

    #[test]
    fn test_insert_relative_to_detached_anchor_fails() {
        let mut surface = Surface::default();
        let loose = surface.create(AnchorKind::Element);
        let new = surface.create(AnchorKind::Element);

        assert_eq!(
            surface.insert_before(loose, new),
            Err(EditorError::DetachedAnchor(loose))
        );
    }

    #[test]
    fn test_remove_frees_subtree() {
        let (mut surface, root, children) = surface_with_children(1);
        let grandchild = surface.create(AnchorKind::Element);
        surface.append(children[0], grandchild).unwrap();

        surface.remove(children[0]).unwrap();

        assert!(surface.children(root).is_empty());
        assert!(!surface.contains(children[0]));
        assert!(!surface.contains(grandchild));
    }

    #[test]
    fn test_closest_walks_up() {
        let (mut surface, root, children) = surface_with_children(1);
        let grandchild = surface.create(AnchorKind::Element);
        surface.append(children[0], grandchild).unwrap();
        surface.add_class(children[0], "item");

        let found = surface.closest(grandchild, |_, a| a.has_class("item"));
        assert_eq!(found, Some(children[0]));
        assert_eq!(surface.closest(root, |_, a| a.has_class("item")), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_out_waits_for_transition() {
        let mut surface = Surface::new(Duration::from_millis(400));
        let anchor = surface.create(AnchorKind::Element);

        let start = tokio::time::Instant::now();
        surface.fade_out(anchor).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(400));
        assert_eq!(surface.get(anchor).unwrap().opacity, 0.0);
    }
}
