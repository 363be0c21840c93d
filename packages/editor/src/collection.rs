//! # Collections
//!
//! A collection owns an ordered list of items cloned from its template.
//!
//! ## Item lifecycle
//!
//! ```text
//! create_item ─→ add / add_after / render ─→ editing
//!                                              │
//!                     ┌────────────────────────┼──────────────────────┐
//!                     ↓                        ↓                      ↓
//!                   save                 delete (fade)             cancel
//!             ever_saved = true        deleted = true      deleted = false, edits reverted,
//!                                     (still listed)      never-saved items discarded
//!                                            │
//!                                            ↓
//!                                   save: removed for good
//! ```
//!
//! `items` always mirrors the order of the item anchors on the surface.

use crate::errors::EditorError;
use crate::surface::{classes, AnchorId, AnchorKind, ControlKind};
use crate::template::{readable, singular, ControlPosition, Mode, Template};
use crate::tree::{DataOptions, Node, NodeId, NodeKind, Tree};
use serde_json::Value;
use tracing::debug;

/// What activating a control does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Delete,
    AddSibling,
    AddItem,
}

/// Links a control anchor to the collection (and item) it acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlBinding {
    pub action: ControlAction,
    pub collection: NodeId,
    pub item: Option<NodeId>,
}

/// Anchors of the per-item toolbar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemControls {
    pub toolbar: AnchorId,
    pub delete: AnchorId,
    pub add: AnchorId,
}

/// One instantiated element of a collection
#[derive(Debug, Clone)]
pub struct Item {
    pub node: NodeId,
    pub anchor: AnchorId,
    /// Soft-delete marker: cleared by cancel, consumed by save
    pub deleted: bool,
    /// Survived at least one successful save
    pub ever_saved: bool,
    pub controls: ItemControls,
    fading: bool,
}

#[derive(Debug)]
pub struct Collection {
    template: Template,
    items: Vec<Item>,
    required: bool,
    bottom_up: bool,
    marker: AnchorId,
    add_control: AnchorId,
}

impl Collection {
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn required(&self) -> bool {
        self.required
    }

    /// True when new items are prepended
    pub fn bottom_up(&self) -> bool {
        self.bottom_up
    }

    /// Placeholder holding the collection's position on the surface
    pub fn marker(&self) -> AnchorId {
        self.marker
    }

    pub fn add_control(&self) -> AnchorId {
        self.add_control
    }

    /// Readable name, e.g. `favorite colors`
    pub fn name(&self) -> String {
        let identifier = self
            .template
            .property
            .as_deref()
            .or(self.template.type_name.as_deref())
            .unwrap_or("item");
        readable(identifier)
    }

    pub fn item(&self, node: NodeId) -> Option<&Item> {
        self.items.iter().find(|i| i.node == node)
    }

    fn item_mut(&mut self, node: NodeId) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| i.node == node)
    }

    pub fn position(&self, node: NodeId) -> Option<usize> {
        self.items.iter().position(|i| i.node == node)
    }

    fn snapshot(&self) -> Vec<Item> {
        self.items.clone()
    }
}

impl Tree {
    /// Build a collection from its template inside `container`: the template
    /// anchor is replaced by a marker and an add control is ensured.
    pub(crate) fn construct_collection(
        &mut self,
        template: &Template,
        parent: Option<NodeId>,
        container: AnchorId,
    ) -> Result<NodeId, EditorError> {
        let template_anchor = self.surface.create(AnchorKind::Element);
        self.surface.append(container, template_anchor)?;

        let name = readable(
            template
                .property
                .as_deref()
                .or(template.type_name.as_deref())
                .unwrap_or("item"),
        );
        let label = format!("Add {}", singular(&name));

        let declared = template.add_control.map(|position| {
            let control = self
                .surface
                .create_labeled(AnchorKind::Control(ControlKind::AddItem), label.clone());
            (control, position)
        });
        if let Some((control, position)) = declared {
            match position {
                ControlPosition::Before => {
                    self.surface.insert_before(template_anchor, control)?
                }
                ControlPosition::After => {
                    self.surface.insert_after(template_anchor, control)?
                }
            }
        }

        let bottom_up = template.resolve_bottom_up();

        let marker = self.surface.create(AnchorKind::Marker);
        self.surface.insert_after(template_anchor, marker)?;
        self.surface.remove(template_anchor)?;

        let add_control = match declared {
            Some((control, _)) => control,
            None => {
                let control = self
                    .surface
                    .create_labeled(AnchorKind::Control(ControlKind::AddItem), label);
                if bottom_up {
                    self.surface.insert_before(marker, control)?;
                } else {
                    self.surface.insert_after(marker, control)?;
                }
                control
            }
        };

        let id = self.alloc(Node {
            property: template.property.clone(),
            type_name: template.type_name.clone(),
            parent,
            anchor: marker,
            editing: false,
            unsaved_changes: false,
            mode: Mode::ReadEdit,
            kind: NodeKind::Collection(Collection {
                template: template.clone(),
                items: Vec::new(),
                required: template.required,
                bottom_up,
                marker,
                add_control,
            }),
        });

        self.controls.insert(
            add_control,
            ControlBinding {
                action: ControlAction::AddItem,
                collection: id,
                item: None,
            },
        );

        debug!(collection = %name, bottom_up, "Collection constructed");
        Ok(id)
    }

    /// Clone the template into a new item with its controls attached. The
    /// item is not inserted into the collection or onto the surface.
    pub fn create_item(&mut self, collection: NodeId) -> Result<Item, EditorError> {
        let (schema, name) = {
            let c = self.collection(collection)?;
            (c.template.item.as_ref().clone(), c.name())
        };
        let name = singular(&name).to_string();

        let anchor = self.surface.create(AnchorKind::Element);
        let node = self.instantiate_at(&schema, Some(collection), anchor)?;
        self.surface.add_class(anchor, classes::ITEM);

        let toolbar = self.surface.create(AnchorKind::Controls);
        self.surface.append(anchor, toolbar)?;

        let delete = self.surface.create_labeled(
            AnchorKind::Control(ControlKind::Delete),
            format!("Delete this {}", name),
        );
        let add = self.surface.create_labeled(
            AnchorKind::Control(ControlKind::AddSibling),
            format!("Add new {}", name),
        );
        self.surface.append(toolbar, delete)?;
        self.surface.append(toolbar, add)?;

        self.controls.insert(
            delete,
            ControlBinding {
                action: ControlAction::Delete,
                collection,
                item: Some(node),
            },
        );
        self.controls.insert(
            add,
            ControlBinding {
                action: ControlAction::AddSibling,
                collection,
                item: Some(node),
            },
        );

        Ok(Item {
            node,
            anchor,
            deleted: false,
            ever_saved: false,
            controls: ItemControls {
                toolbar,
                delete,
                add,
            },
            fading: false,
        })
    }

    /// Create an item and insert it according to the collection's policy:
    /// prepended when bottom-up, appended otherwise.
    pub fn add(&mut self, collection: NodeId) -> Result<NodeId, EditorError> {
        let item = self.create_item(collection)?;

        let (reference, prepend) = {
            let c = self.collection(collection)?;
            match c.items.first() {
                Some(first) if c.bottom_up => (first.anchor, true),
                _ => (c.marker, c.bottom_up),
            }
        };
        self.surface.insert_before(reference, item.anchor)?;

        let node = item.node;
        let c = self.collection_mut(collection)?;
        if prepend {
            c.items.insert(0, item);
        } else {
            c.items.push(item);
        }
        self.mark_unsaved(collection)?;

        debug!(collection = ?collection, item = ?node, prepend, "Item added");
        Ok(node)
    }

    /// Insert a new item immediately after `after` and start editing it
    pub fn add_after(&mut self, collection: NodeId, after: NodeId) -> Result<NodeId, EditorError> {
        let (index, reference) = {
            let c = self.collection(collection)?;
            let index = c.position(after).ok_or(EditorError::ItemNotFound {
                collection,
                item: after,
            })?;
            (index, c.items[index].anchor)
        };

        let item = self.create_item(collection)?;
        let node = item.node;
        self.surface.insert_after(reference, item.anchor)?;
        self.collection_mut(collection)?.items.insert(index + 1, item);
        self.mark_unsaved(collection)?;

        self.edit(node)?;
        Ok(node)
    }

    /// Soft-delete an item once its fade-out finishes. The item stays listed
    /// (hidden) until the next save. Returns `false` if the item was already
    /// deleted or fading.
    pub async fn delete(&mut self, collection: NodeId, item: NodeId) -> Result<bool, EditorError> {
        let anchor = {
            let entry = self
                .collection_mut(collection)?
                .item_mut(item)
                .ok_or(EditorError::ItemNotFound { collection, item })?;
            if entry.deleted || entry.fading {
                return Ok(false);
            }
            entry.fading = true;
            entry.anchor
        };

        let faded = self.surface.fade_out(anchor).await;

        if let Some(entry) = self.collection_mut(collection)?.item_mut(item) {
            entry.fading = false;
            entry.deleted = faded.is_ok();
        }
        faded?;

        self.surface.set_opacity(anchor, 1.0);
        self.surface.set_hidden(anchor, true);
        self.surface.add_class(anchor, classes::DELETED);
        for class in [classes::DELETE_HOVER, classes::HOVERED, classes::HIGHLIGHT] {
            self.surface.remove_class(anchor, class);
        }
        self.mark_unsaved(collection)?;

        debug!(collection = ?collection, item = ?item, "Item marked deleted");
        Ok(true)
    }

    /// Ask `confirm` before deleting, with a message naming the item
    pub async fn request_delete<F>(
        &mut self,
        collection: NodeId,
        item: NodeId,
        confirm: F,
    ) -> Result<bool, EditorError>
    where
        F: FnOnce(&str) -> bool,
    {
        let label = {
            let entry = self
                .collection(collection)?
                .item(item)
                .ok_or(EditorError::ItemNotFound { collection, item })?;
            self.surface
                .get(entry.controls.delete)
                .and_then(|a| a.label.clone())
                .unwrap_or_else(|| "Delete this item".to_string())
        };

        let message = format!("Are you sure you want to {}?", label.to_lowercase());
        if !confirm(&message) {
            return Ok(false);
        }
        self.delete(collection, item).await
    }

    pub(crate) fn edit_collection(&mut self, collection: NodeId) -> Result<(), EditorError> {
        let needs_item = {
            let c = self.collection(collection)?;
            c.items.is_empty() && c.required
        };
        if needs_item {
            self.add(collection)?;
        }

        for item in self.collection(collection)?.snapshot() {
            self.edit(item.node)?;
        }
        Ok(())
    }

    pub(crate) fn done_collection(&mut self, collection: NodeId) -> Result<(), EditorError> {
        for item in self.collection(collection)?.snapshot() {
            self.done(item.node)?;
            self.surface.remove_class(item.anchor, classes::HOVERED);
            self.surface.remove_class(item.anchor, classes::HAS_HOVERED_ITEM);
        }
        Ok(())
    }

    /// Remove deleted items for good, commit the rest
    pub(crate) fn save_collection(&mut self, collection: NodeId) -> Result<(), EditorError> {
        for item in self.collection(collection)?.snapshot() {
            if item.deleted {
                self.surface.remove(item.anchor)?;
                self.discard(item.node);
                self.collection_mut(collection)?
                    .items
                    .retain(|i| i.node != item.node);
                continue;
            }

            self.save(item.node)?;
            if let Some(entry) = self.collection_mut(collection)?.item_mut(item.node) {
                entry.ever_saved = true;
            }
            self.surface.remove_class(item.anchor, classes::HOVERED);
        }
        Ok(())
    }

    /// Undelete everything, revert edits, discard never-saved items
    pub(crate) fn cancel_collection(&mut self, collection: NodeId) -> Result<(), EditorError> {
        for item in self.collection(collection)?.snapshot() {
            if let Some(entry) = self.collection_mut(collection)?.item_mut(item.node) {
                entry.deleted = false;
            }
            self.surface.remove_class(item.anchor, classes::DELETED);
            self.surface.set_hidden(item.anchor, false);
            self.surface.set_opacity(item.anchor, 1.0);

            self.cancel(item.node)?;
            self.surface.remove_class(item.anchor, classes::HOVERED);

            if !item.ever_saved {
                self.surface.remove(item.anchor)?;
                self.discard(item.node);
                self.collection_mut(collection)?
                    .items
                    .retain(|i| i.node != item.node);
            }
        }
        Ok(())
    }

    pub(crate) fn clear_collection(&mut self, collection: NodeId) -> Result<(), EditorError> {
        for item in self.collection(collection)?.snapshot() {
            self.surface.remove(item.anchor)?;
            self.discard(item.node);
        }
        self.collection_mut(collection)?.items.clear();
        Ok(())
    }

    /// Hydrate one record or a sequence of records as new items, inserted
    /// before the marker in a single batch
    pub(crate) fn render_collection(
        &mut self,
        collection: NodeId,
        data: &Value,
    ) -> Result<(), EditorError> {
        let records: Vec<Value> = match data {
            Value::Null => return Ok(()),
            Value::String(s) if s.is_empty() => return Ok(()),
            Value::Array(records) => records.clone(),
            record => vec![record.clone()],
        };

        let marker = self.collection(collection)?.marker;
        let mut anchors = Vec::with_capacity(records.len());

        for record in &records {
            let mut item = self.create_item(collection)?;
            self.render(item.node, record)?;
            item.ever_saved = true;
            anchors.push(item.anchor);
            self.collection_mut(collection)?.items.push(item);
        }

        self.surface.insert_all_before(marker, &anchors)?;

        debug!(collection = ?collection, items = anchors.len(), "Collection rendered");
        Ok(())
    }

    /// Per-item records in order, without nulls or soft-deleted items
    pub(crate) fn collection_data(
        &self,
        collection: NodeId,
        options: &DataOptions,
    ) -> Result<Value, EditorError> {
        let mut records = Vec::new();

        for item in self.collection(collection)?.items() {
            if item.deleted && !options.include_deleted {
                continue;
            }
            match self.get_data(item.node, options)? {
                Some(Value::Null) | None => {}
                Some(record) => records.push(record),
            }
        }

        Ok(Value::Array(records))
    }
}
