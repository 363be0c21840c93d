//! # Bindery Editor
//!
//! In-memory data tree bound to a render surface, with editable
//! collections and a tree-wide edit/save/revert state machine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ template: Schema / Template (declarative)   │
//! └─────────────────────────────────────────────┘
//!                     ↓ Tree::build
//! ┌─────────────────────────────────────────────┐
//! │ tree: node arena + render surface           │
//! │  - Primitive / Scope / Collection nodes     │
//! │  - get_data, render, edit, save, cancel     │
//! │  - collection items, soft delete, markers   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ session: EditSession state machine          │
//! │  - dirty-flag aggregation                   │
//! │  - edit-mode hover and control wiring       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Saved state is committed last**: `EditSession::commit` only runs
//!    after the caller confirms persistence
//! 2. **Items mirror the surface**: collection order always matches anchor order
//! 3. **Soft delete**: deleted items stay listed until the next save
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bindery_editor::{EditSession, Schema, Surface, Template, Tree};
//!
//! let schema = Schema::scope(vec![Schema::collection(Template::new(
//!     "people",
//!     Schema::scope(vec![Schema::primitive("name")]),
//! ))]);
//!
//! let mut session = EditSession::new(Tree::build(&schema, Surface::default())?);
//! session.render(Some(&serde_json::json!({ "people": [{ "name": "Ada" }] })))?;
//!
//! session.edit()?;
//! session.set_value("people.0.name", "Grace".into())?;
//! session.commit()?;
//! ```

mod collection;
mod errors;
mod serializer;
mod session;
mod surface;
mod template;
mod tree;

pub use collection::{Collection, ControlAction, ControlBinding, Item, ItemControls};
pub use errors::EditorError;
pub use serializer::{parse_data_string, to_data_string};
pub use session::{ControlOutcome, EditSession, SessionState};
pub use surface::{classes, Anchor, AnchorId, AnchorKind, ControlKind, Surface};
pub use template::{readable, singular, ControlPosition, Mode, Schema, Template};
pub use tree::{
    format_path, DataOptions, Node, NodeId, NodeKind, NodeRef, PathSegment, Primitive, Scope,
    Tree,
};
