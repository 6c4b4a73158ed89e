//! Request and display shapes exchanged with the editor.
//!
//! `ContentTypeSave` is what an editor submits; `ContentTypeDisplay` is what
//! it renders, including any field errors from a rejected save.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content_type::{PropertyGroup, ROOT_ID, alias_eq, alias_key};
use super::kind::ContentTypeKind;

/// Id in `allowed_content_types` that stands for the type being created.
pub const SELF_CHILD_SENTINEL: i32 = 0;

/// A save request for a document, media or member type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentTypeSave {
    /// Id of the type being edited; `None` or 0 creates a new type.
    #[serde(default)]
    pub id: Option<i32>,

    #[serde(default)]
    pub key: Option<Uuid>,

    pub alias: String,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub icon: Option<String>,

    #[serde(default)]
    pub is_element: bool,

    #[serde(default = "root_id")]
    pub parent_id: i32,

    #[serde(default)]
    pub groups: Vec<PropertyGroupSave>,

    /// Aliases of the types to compose this one of.
    #[serde(default)]
    pub composite_content_types: Vec<String>,

    /// Allowed child type ids. [`SELF_CHILD_SENTINEL`] means "this type".
    #[serde(default)]
    pub allowed_content_types: Vec<i32>,

    #[serde(default)]
    pub created: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

fn root_id() -> i32 {
    ROOT_ID
}

impl ContentTypeSave {
    /// Start a request for a new type.
    pub fn new(alias: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            name: name.into(),
            parent_id: ROOT_ID,
            ..Self::default()
        }
    }

    /// The requested id, 0 when creating.
    pub fn id_or_zero(&self) -> i32 {
        self.id.unwrap_or(0)
    }

    /// Drop groups with blank names, then properties with blank aliases.
    ///
    /// A group left without properties is kept.
    pub fn remove_blank_entries(&mut self) {
        self.groups.retain(|g| !g.name.trim().is_empty());
        for group in &mut self.groups {
            group.properties.retain(|p| !p.alias.trim().is_empty());
        }
    }

    /// Find the group and property declaring `alias`, ignoring case.
    ///
    /// Returns `None` when no property matches or when more than one does.
    pub fn find_property(&self, alias: &str) -> Option<(&PropertyGroupSave, &PropertyTypeSave)> {
        let mut found = self.groups.iter().flat_map(|g| {
            g.properties
                .iter()
                .filter(move |p| alias_eq(&p.alias, alias))
                .map(move |p| (g, p))
        });
        let first = found.next()?;
        match found.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    /// Field keys of every property whose alias another property of the
    /// request repeats, ignoring case.
    ///
    /// Entries that [`remove_blank_entries`](Self::remove_blank_entries)
    /// would drop are not counted.
    pub fn repeated_property_fields(&self) -> Vec<String> {
        let mut by_alias: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for group in self.groups.iter().filter(|g| !g.name.trim().is_empty()) {
            for property in group.properties.iter().filter(|p| !p.alias.trim().is_empty()) {
                by_alias
                    .entry(alias_key(&property.alias))
                    .or_default()
                    .push(property_field(group, property));
            }
        }
        by_alias
            .into_values()
            .filter(|fields| fields.len() > 1)
            .flatten()
            .collect()
    }
}

/// Field key of a property's alias, by group and property sort order.
pub fn property_field(group: &PropertyGroupSave, property: &PropertyTypeSave) -> String {
    format!(
        "Groups[{}].Properties[{}].Alias",
        group.sort_order, property.sort_order
    )
}

/// A property group in a save request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyGroupSave {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub properties: Vec<PropertyTypeSave>,
}

/// A property definition in a save request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyTypeSave {
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub data_type_id: i32,
    #[serde(default)]
    pub mandatory: bool,
}

/// Editor view of a content type, optionally carrying field errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTypeDisplay {
    pub id: i32,
    pub key: Option<Uuid>,
    pub kind: ContentTypeKind,
    pub alias: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub is_element: bool,
    pub parent_id: i32,
    pub path: String,
    pub groups: Vec<PropertyGroup>,
    pub composite_content_types: Vec<String>,
    pub allowed_content_types: Vec<i32>,
    /// Field key to error messages, e.g. `Alias` or `Groups[0].Properties[1].Alias`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, Vec<String>>,
}

/// A move or copy request: put type `id` beneath `parent_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOrCopy {
    pub id: i32,
    pub parent_id: i32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn prop(alias: &str, sort_order: i32) -> PropertyTypeSave {
        PropertyTypeSave {
            alias: alias.to_string(),
            sort_order,
            ..Default::default()
        }
    }

    #[test]
    fn blank_groups_go_before_blank_properties() {
        let mut save = ContentTypeSave::new("page", "Page");
        save.groups = vec![
            PropertyGroupSave {
                name: "  ".to_string(),
                sort_order: 0,
                properties: vec![prop("lost", 0)],
            },
            PropertyGroupSave {
                name: "Content".to_string(),
                sort_order: 1,
                properties: vec![prop("title", 0), prop("", 1), prop(" ", 2)],
            },
            PropertyGroupSave {
                name: "Empty".to_string(),
                sort_order: 2,
                properties: vec![prop("", 0)],
            },
        ];

        save.remove_blank_entries();

        assert_eq!(save.groups.len(), 2);
        assert_eq!(save.groups[0].properties.len(), 1);
        assert_eq!(save.groups[0].properties[0].alias, "title");
        assert_eq!(save.groups[1].name, "Empty");
        assert!(save.groups[1].properties.is_empty());
    }

    #[test]
    fn find_property_requires_a_single_match() {
        let mut save = ContentTypeSave::new("page", "Page");
        save.groups = vec![
            PropertyGroupSave {
                name: "A".to_string(),
                sort_order: 3,
                properties: vec![prop("title", 5)],
            },
            PropertyGroupSave {
                name: "B".to_string(),
                sort_order: 4,
                properties: vec![prop("body", 0), prop("body", 1)],
            },
        ];

        let (group, property) = save.find_property("title").unwrap();
        assert_eq!(group.sort_order, 3);
        assert_eq!(property.sort_order, 5);
        assert!(save.find_property("body").is_none());
        assert!(save.find_property("missing").is_none());
    }

    #[test]
    fn repeated_aliases_report_every_occurrence() {
        let mut save = ContentTypeSave::new("article", "Article");
        save.groups = vec![
            PropertyGroupSave {
                name: "A".to_string(),
                sort_order: 0,
                properties: vec![prop("title", 0), prop("body", 1)],
            },
            PropertyGroupSave {
                name: "B".to_string(),
                sort_order: 1,
                properties: vec![prop("Title", 2), prop("", 3)],
            },
            PropertyGroupSave {
                name: " ".to_string(),
                sort_order: 2,
                properties: vec![prop("body", 0)],
            },
        ];

        assert_eq!(
            save.repeated_property_fields(),
            vec![
                "Groups[0].Properties[0].Alias".to_string(),
                "Groups[1].Properties[2].Alias".to_string(),
            ]
        );
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let save: ContentTypeSave =
            serde_json::from_str(r#"{"alias":"page","name":"Page"}"#).unwrap();
        assert_eq!(save.id_or_zero(), 0);
        assert_eq!(save.parent_id, ROOT_ID);
        assert!(save.allowed_content_types.is_empty());
    }
}
