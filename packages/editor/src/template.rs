//! # Templates
//!
//! Declarative description of the data tree a page binds to.
//!
//! Markup discovery is someone else's job: by the time a `Schema` reaches
//! the editor it already names every property, which nodes repeat, and
//! where an author-declared add control sits relative to a collection's
//! template.
//!
//! ```text
//! Scope (root)
//!  ├─ Primitive "title"
//!  └─ Collection "people"  ── item: Scope
//!                              ├─ Primitive "name"
//!                              └─ Collection "tags" ── item: Primitive
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether a node only becomes editable through the edit affordance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Read-only until the session enters edit mode
    #[default]
    ReadEdit,
    /// Always editable, no edit affordance needed
    Edit,
}

/// Position of an author-declared add control relative to the template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlPosition {
    Before,
    After,
}

/// A node of the template tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Schema {
    Primitive {
        #[serde(default)]
        property: Option<String>,
        #[serde(default)]
        default: Value,
        #[serde(default)]
        mode: Mode,
    },
    Scope {
        #[serde(default)]
        property: Option<String>,
        #[serde(default, rename = "type")]
        type_name: Option<String>,
        #[serde(default)]
        children: Vec<Schema>,
    },
    Collection(Template),
}

impl Schema {
    pub fn primitive(property: impl Into<String>) -> Self {
        Schema::Primitive {
            property: Some(property.into()),
            default: Value::Null,
            mode: Mode::ReadEdit,
        }
    }

    pub fn primitive_with_default(property: impl Into<String>, default: Value) -> Self {
        Schema::Primitive {
            property: Some(property.into()),
            default,
            mode: Mode::ReadEdit,
        }
    }

    /// Anonymous primitive, used as the item of a list of plain values
    pub fn value() -> Self {
        Schema::Primitive {
            property: None,
            default: Value::Null,
            mode: Mode::ReadEdit,
        }
    }

    pub fn scope(children: Vec<Schema>) -> Self {
        Schema::Scope {
            property: None,
            type_name: None,
            children,
        }
    }

    pub fn named_scope(property: impl Into<String>, children: Vec<Schema>) -> Self {
        Schema::Scope {
            property: Some(property.into()),
            type_name: None,
            children,
        }
    }

    pub fn collection(template: Template) -> Self {
        Schema::Collection(template)
    }

    /// Switch a primitive to always-editable mode
    pub fn always_editable(mut self) -> Self {
        if let Schema::Primitive { mode, .. } = &mut self {
            *mode = Mode::Edit;
        }
        self
    }

    pub fn property(&self) -> Option<&str> {
        match self {
            Schema::Primitive { property, .. } | Schema::Scope { property, .. } => {
                property.as_deref()
            }
            Schema::Collection(template) => template.property.as_deref(),
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        match self {
            Schema::Primitive { .. } => None,
            Schema::Scope { type_name, .. } => type_name.as_deref(),
            Schema::Collection(template) => template.type_name.as_deref(),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Schema::Primitive { mode, .. } => *mode,
            _ => Mode::ReadEdit,
        }
    }
}

/// Template of a repeated item plus the collection's own settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default)]
    pub property: Option<String>,

    #[serde(default, rename = "type")]
    pub type_name: Option<String>,

    /// Must hold at least one item while editing
    #[serde(default)]
    pub required: bool,

    /// Explicit insertion policy; overrides every heuristic
    #[serde(default)]
    pub bottom_up: Option<bool>,

    /// Where an author-declared add control sits, if there is one
    #[serde(default)]
    pub add_control: Option<ControlPosition>,

    pub item: Box<Schema>,
}

impl Template {
    pub fn new(property: impl Into<String>, item: Schema) -> Self {
        Self {
            property: Some(property.into()),
            type_name: None,
            required: false,
            bottom_up: None,
            add_control: None,
            item: Box::new(item),
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn bottom_up(mut self, bottom_up: bool) -> Self {
        self.bottom_up = Some(bottom_up);
        self
    }

    pub fn with_add_control(mut self, position: ControlPosition) -> Self {
        self.add_control = Some(position);
        self
    }

    /// Resolve the insertion policy.
    ///
    /// An explicit override wins. Without one, a collection whose add control
    /// does not exist yet appends; otherwise an add control placed before the
    /// template means new items are prepended.
    pub fn resolve_bottom_up(&self) -> bool {
        if let Some(explicit) = self.bottom_up {
            return explicit;
        }

        match self.add_control {
            None => false,
            Some(position) => position == ControlPosition::Before,
        }
    }
}

/// Human readable, lower-cased form of an identifier (`favoriteColors` → `favorite colors`)
pub fn readable(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len() + 4);
    let mut prev_lower = false;

    for ch in identifier.chars() {
        if ch == '-' || ch == '_' {
            if !out.ends_with(' ') && !out.is_empty() {
                out.push(' ');
            }
            prev_lower = false;
            continue;
        }

        if ch.is_uppercase() && prev_lower {
            out.push(' ');
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        out.extend(ch.to_lowercase());
    }

    out.trim().to_string()
}

/// Naive singular: drops one trailing "s"
pub fn singular(name: &str) -> &str {
    match name.strip_suffix('s').or_else(|| name.strip_suffix('S')) {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => name,
    }
}
