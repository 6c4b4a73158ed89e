//! Content type definitions and their composition edges.
//!
//! A content type declares its own property groups and names the types it
//! is composed of. The effective schema of a type is its own properties plus
//! everything contributed by its compositions, directly or transitively.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::kind::ContentTypeKind;

/// Parent id of nodes and containers that sit at the root of a tree.
pub const ROOT_ID: i32 = -1;

/// Normalize an alias for comparison.
///
/// Aliases are compared case-insensitively everywhere: `blogPost` and
/// `BlogPost` name the same type.
pub fn alias_key(alias: &str) -> String {
    alias.to_lowercase()
}

/// Case-insensitive alias equality.
pub fn alias_eq(a: &str, b: &str) -> bool {
    a == b || alias_key(a) == alias_key(b)
}

/// A content type: one node of the composition graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentType {
    /// Store-assigned id; 0 until first persisted.
    #[serde(default)]
    pub id: i32,

    /// Globally unique key.
    pub key: Uuid,

    /// Which store this type belongs to.
    pub kind: ContentTypeKind,

    /// Machine-readable alias, unique across all kinds.
    pub alias: String,

    /// Display name. May be a dictionary key prefixed with `#`.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Element types are structured fragments rather than standalone items.
    #[serde(default)]
    pub is_element: bool,

    /// Parent container or type id ([`ROOT_ID`] at the root).
    #[serde(default = "root_id")]
    pub parent_id: i32,

    /// Materialized path: comma-joined ids from the root down to this node.
    #[serde(default)]
    pub path: String,

    /// Property groups in display order.
    #[serde(default)]
    pub groups: Vec<PropertyGroup>,

    /// Aliases of the types this one is directly composed of.
    #[serde(default)]
    pub compositions: Vec<String>,

    /// Types that may be created beneath items of this type.
    #[serde(default)]
    pub allowed_content_types: Vec<ContentTypeSort>,

    pub created: DateTime<Utc>,

    pub updated: DateTime<Utc>,
}

fn root_id() -> i32 {
    ROOT_ID
}

impl ContentType {
    /// Create a new, unsaved content type at the root.
    pub fn new(kind: ContentTypeKind, alias: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            key: Uuid::now_v7(),
            kind,
            alias: alias.into(),
            name: name.into(),
            description: None,
            icon: None,
            is_element: false,
            parent_id: ROOT_ID,
            path: String::new(),
            groups: Vec::new(),
            compositions: Vec::new(),
            allowed_content_types: Vec::new(),
            created: now,
            updated: now,
        }
    }

    /// Whether the type has never been persisted.
    pub fn is_new(&self) -> bool {
        self.id == 0
    }

    /// Iterate the properties this type declares itself (not composed-in ones).
    pub fn property_types(&self) -> impl Iterator<Item = &PropertyType> {
        self.groups.iter().flat_map(|g| g.properties.iter())
    }

    /// Aliases of the properties this type declares itself.
    pub fn property_aliases(&self) -> Vec<&str> {
        self.property_types().map(|p| p.alias.as_str()).collect()
    }

    /// Whether `alias` is one of this type's direct compositions.
    pub fn composes(&self, alias: &str) -> bool {
        self.compositions.iter().any(|c| alias_eq(c, alias))
    }

    /// Add a direct composition by alias. Returns false if already present.
    pub fn add_composition(&mut self, alias: &str) -> bool {
        if self.composes(alias) {
            return false;
        }
        self.compositions.push(alias.to_string());
        true
    }

    /// Point a direct composition at a renamed type, keeping its position.
    /// Returns false if `from` was not composed.
    pub fn rename_composition(&mut self, from: &str, to: &str) -> bool {
        match self.compositions.iter_mut().find(|c| alias_eq(c, from)) {
            Some(link) => {
                *link = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Ids on the materialized path, root first. Unparseable segments are skipped.
    pub fn path_ids(&self) -> Vec<i32> {
        self.path
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect()
    }
}

/// A named, ordered group of property definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyGroup {
    pub name: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub properties: Vec<PropertyType>,
}

impl PropertyGroup {
    pub fn new(name: impl Into<String>, sort_order: i32) -> Self {
        Self {
            name: name.into(),
            sort_order,
            properties: Vec::new(),
        }
    }

    /// Append a property definition (builder style).
    pub fn with_property(mut self, property: PropertyType) -> Self {
        self.properties.push(property);
        self
    }
}

/// A single property definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyType {
    pub alias: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sort_order: i32,
    /// Id of the data type backing this property.
    #[serde(default)]
    pub data_type_id: i32,
    #[serde(default)]
    pub mandatory: bool,
}

impl PropertyType {
    pub fn new(alias: impl Into<String>, sort_order: i32) -> Self {
        let alias = alias.into();
        Self {
            name: alias.clone(),
            alias,
            sort_order,
            data_type_id: 0,
            mandatory: false,
        }
    }
}

/// An allowed child type together with its position in the child list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentTypeSort {
    pub id: i32,
    pub sort_order: i32,
}

impl ContentTypeSort {
    pub fn new(id: i32, sort_order: i32) -> Self {
        Self { id, sort_order }
    }
}

/// An organizational folder within a kind's type tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityContainer {
    pub id: i32,
    pub key: Uuid,
    pub name: String,
    #[serde(default = "root_id")]
    pub parent_id: i32,
    #[serde(default)]
    pub path: String,
}

impl EntityContainer {
    pub fn new(id: i32, name: impl Into<String>, parent_id: i32) -> Self {
        Self {
            id,
            key: Uuid::now_v7(),
            name: name.into(),
            parent_id,
            path: String::new(),
        }
    }
}

/// Lightweight descriptor of an entity for listings and pickers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityBasic {
    pub id: i32,
    pub key: Uuid,
    pub alias: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub parent_id: i32,
    pub path: String,
    /// Free-form decorations added by callers (e.g. `containerPath`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_data: BTreeMap<String, serde_json::Value>,
}
