//! Compositor test utilities.
//!
//! Fixture builders for content types and save requests, a helper that
//! assembles an editor over fresh in-memory stores, and assertions for
//! editor failures.

use compositor_kernel::models::{
    ContentType, ContentTypeKind, ContentTypeSave, PropertyGroup, PropertyGroupSave,
    PropertyType, PropertyTypeSave,
};
use compositor_kernel::store::{ContentTypeStore, InMemoryTypeStore, TypeStores};
use compositor_kernel::ContentTypeEditor;
use uuid::Uuid;

/// An editor over three empty in-memory stores.
pub fn test_editor() -> ContentTypeEditor<InMemoryTypeStore> {
    ContentTypeEditor::new(TypeStores::in_memory())
}

/// Create a content type builder with default values.
pub fn test_type(kind: ContentTypeKind, alias: &str) -> TestType {
    TestType {
        inner: ContentType::new(kind, alias, alias),
    }
}

/// A content type builder for creating test fixtures.
#[derive(Debug, Clone)]
pub struct TestType {
    inner: ContentType,
}

impl TestType {
    /// Set the display name.
    pub fn named(mut self, name: &str) -> Self {
        self.inner.name = name.to_string();
        self
    }

    /// Add a group holding properties with the given aliases.
    pub fn with_group(mut self, name: &str, aliases: &[&str]) -> Self {
        let sort_order = self.inner.groups.len() as i32;
        let mut group = PropertyGroup::new(name, sort_order);
        for (i, alias) in aliases.iter().enumerate() {
            group = group.with_property(PropertyType::new(*alias, i as i32));
        }
        self.inner.groups.push(group);
        self
    }

    /// Add a "Content" group holding the given properties.
    pub fn with_properties(self, aliases: &[&str]) -> Self {
        self.with_group("Content", aliases)
    }

    /// Compose of the given type aliases.
    pub fn composed_of(mut self, aliases: &[&str]) -> Self {
        for alias in aliases {
            self.inner.add_composition(alias);
        }
        self
    }

    /// Mark as an element type.
    pub fn element(mut self) -> Self {
        self.inner.is_element = true;
        self
    }

    /// Place beneath a folder or type.
    pub fn under(mut self, parent_id: i32) -> Self {
        self.inner.parent_id = parent_id;
        self
    }

    /// Set a custom key.
    pub fn with_key(mut self, key: Uuid) -> Self {
        self.inner.key = key;
        self
    }

    /// The unsaved type.
    pub fn build(self) -> ContentType {
        self.inner
    }

    /// Persist in `store` and return the saved type.
    ///
    /// # Panics
    ///
    /// Panics if the store refuses the type.
    pub fn save_in<S: ContentTypeStore>(self, store: &S) -> ContentType {
        let mut node = self.inner;
        if let Err(err) = store.save(&mut node) {
            panic!("failed to save fixture '{}': {err:#}", node.alias);
        }
        node
    }
}

/// Create a save request builder for a new type.
pub fn test_save(alias: &str) -> TestSave {
    TestSave {
        inner: ContentTypeSave::new(alias, alias),
    }
}

/// A save request builder.
#[derive(Debug, Clone)]
pub struct TestSave {
    inner: ContentTypeSave,
}

impl TestSave {
    /// Edit an existing type.
    pub fn with_id(mut self, id: i32) -> Self {
        self.inner.id = Some(id);
        self
    }

    pub fn named(mut self, name: &str) -> Self {
        self.inner.name = name.to_string();
        self
    }

    /// Add a group; properties get sort orders 0, 1, ...
    pub fn with_group(self, name: &str, sort_order: i32, aliases: &[&str]) -> Self {
        let sorted: Vec<(&str, i32)> = aliases
            .iter()
            .enumerate()
            .map(|(i, alias)| (*alias, i as i32))
            .collect();
        self.with_sorted_group(name, sort_order, &sorted)
    }

    /// Add a group with explicit property sort orders.
    pub fn with_sorted_group(mut self, name: &str, sort_order: i32, properties: &[(&str, i32)]) -> Self {
        self.inner.groups.push(PropertyGroupSave {
            name: name.to_string(),
            sort_order,
            properties: properties
                .iter()
                .map(|(alias, sort_order)| PropertyTypeSave {
                    alias: alias.to_string(),
                    name: alias.to_string(),
                    sort_order: *sort_order,
                    ..Default::default()
                })
                .collect(),
        });
        self
    }

    /// Add a "Content" group at sort order 0.
    pub fn with_properties(self, aliases: &[&str]) -> Self {
        self.with_group("Content", 0, aliases)
    }

    pub fn composed_of(mut self, aliases: &[&str]) -> Self {
        self.inner.composite_content_types = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Allowed child type ids; 0 stands for the type itself.
    pub fn allowing(mut self, ids: &[i32]) -> Self {
        self.inner.allowed_content_types = ids.to_vec();
        self
    }

    pub fn element(mut self) -> Self {
        self.inner.is_element = true;
        self
    }

    /// Requested parent folder or type.
    pub fn under(mut self, parent_id: i32) -> Self {
        self.inner.parent_id = parent_id;
        self
    }

    pub fn build(self) -> ContentTypeSave {
        self.inner
    }
}

/// Assertion helpers for editor results.
pub mod assert {
    use compositor_kernel::KernelError;

    /// Assert that `err` is a validation failure with an error on `field`.
    pub fn has_field_error(err: &KernelError, field: &str) {
        let Some(errors) = err.validation_errors() else {
            panic!("Expected a validation failure, got: {err}");
        };
        assert!(
            errors.get(field).is_some_and(|messages| !messages.is_empty()),
            "Expected an error on '{field}', got: {errors:?}"
        );
    }

    /// Assert that `err` is a validation failure with exactly `count` messages.
    pub fn error_count(err: &KernelError, count: usize) {
        let Some(errors) = err.validation_errors() else {
            panic!("Expected a validation failure, got: {err}");
        };
        let actual: usize = errors.values().map(Vec::len).sum();
        assert_eq!(actual, count, "Unexpected errors: {errors:?}");
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }
}

/// JSON save requests as an editor front end would post them.
pub mod requests {
    use serde_json::json;

    /// A new blog post type with a title and body.
    pub fn blog_post() -> serde_json::Value {
        json!({
            "alias": "blogPost",
            "name": "Blog Post",
            "groups": [
                {
                    "name": "Content",
                    "sort_order": 0,
                    "properties": [
                        { "alias": "title", "name": "Title", "sort_order": 0 },
                        { "alias": "body", "name": "Body", "sort_order": 1 }
                    ]
                }
            ],
            "composite_content_types": [],
            "allowed_content_types": [0]
        })
    }
}
