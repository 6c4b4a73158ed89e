//! Projection between save requests, stored types and editor views.
//!
//! Merging a request onto a type is where composition edges are created,
//! so it refuses compositions the graph cannot accept: unknown types,
//! cycles, and compositions whose properties clash with the type's own.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use thiserror::Error;

use crate::composition::CompositionGraph;
use crate::models::{
    ContentType, ContentTypeDisplay, ContentTypeKind, ContentTypeSave, ContentTypeSort,
    EntityBasic, PropertyGroup, PropertyGroupSave, PropertyType, alias_key,
};

/// A save request that cannot be merged onto a type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    /// Composed-in properties clash with properties the type declares.
    #[error("invalid composition: duplicate property aliases {}", property_aliases.join(", "))]
    InvalidComposition { property_aliases: Vec<String> },

    #[error("composition '{alias}' does not exist")]
    UnknownComposition { alias: String },

    #[error("type '{alias}' cannot be composed of '{composition}': it would compose itself")]
    CompositionCycle { alias: String, composition: String },
}

/// Merge `save` onto `node`.
///
/// `universe` is every persisted type of the node's kind; the node itself
/// may be part of it in its stored form. On error `node` is left unchanged.
pub fn apply_save(
    save: &ContentTypeSave,
    node: &mut ContentType,
    universe: &[ContentType],
) -> Result<(), MappingError> {
    let mut merged = node.clone();
    merged.alias = save.alias.clone();
    merged.name = save.name.clone();
    merged.description = save.description.clone();
    merged.icon = save.icon.clone();
    merged.is_element = save.is_element;
    // Stored types change parent through a move, which checks the target.
    if node.is_new() {
        merged.parent_id = save.parent_id;
    }
    merged.groups = save.groups.iter().map(to_group).collect();
    merged.allowed_content_types = save
        .allowed_content_types
        .iter()
        .enumerate()
        .map(|(i, id)| ContentTypeSort::new(*id, i as i32))
        .collect();
    merged.compositions = Vec::new();

    let stored_key = alias_key(&node.alias);
    let others: Vec<&ContentType> = universe
        .iter()
        .filter(|t| alias_key(&t.alias) != stored_key && (node.is_new() || t.id != node.id))
        .collect();
    let graph = CompositionGraph::new(others.iter().copied());

    let own: HashSet<String> = merged
        .property_types()
        .map(|p| alias_key(&p.alias))
        .collect();
    let mut clashes: Vec<String> = Vec::new();

    for alias in &save.composite_content_types {
        let cycle = |composition: &str| MappingError::CompositionCycle {
            alias: merged.alias.clone(),
            composition: composition.to_string(),
        };
        if alias_key(alias) == alias_key(&merged.alias) || alias_key(alias) == stored_key {
            return Err(cycle(alias));
        }
        let Some(composition) = graph.get(alias) else {
            return Err(MappingError::UnknownComposition {
                alias: alias.clone(),
            });
        };
        // The node is not in the graph, so look for edges pointing back at it.
        let reaches_node = std::iter::once(composition)
            .chain(graph.closure(composition))
            .any(|t| t.composes(&merged.alias) || t.composes(&node.alias));
        if reaches_node {
            return Err(cycle(&composition.alias));
        }
        for origin in graph.effective_properties(composition) {
            if own.contains(&alias_key(&origin.property_alias)) {
                let spelled = merged
                    .property_types()
                    .find(|p| alias_key(&p.alias) == alias_key(&origin.property_alias))
                    .map_or(origin.property_alias, |p| p.alias.clone());
                if !clashes.contains(&spelled) {
                    clashes.push(spelled);
                }
            }
        }
        merged.add_composition(&composition.alias);
    }

    if !clashes.is_empty() {
        clashes.sort();
        return Err(MappingError::InvalidComposition {
            property_aliases: clashes,
        });
    }

    *node = merged;
    Ok(())
}

/// Build a new, unsaved type of `kind` from `save`.
pub fn create_from_save(
    save: &ContentTypeSave,
    kind: ContentTypeKind,
    universe: &[ContentType],
) -> Result<ContentType, MappingError> {
    let mut node = ContentType::new(kind, save.alias.clone(), save.name.clone());
    if let Some(key) = save.key {
        node.key = key;
    }
    if let Some(created) = save.created {
        node.created = created;
    }
    apply_save(save, &mut node, universe)?;
    Ok(node)
}

fn to_group(group: &PropertyGroupSave) -> PropertyGroup {
    PropertyGroup {
        name: group.name.clone(),
        sort_order: group.sort_order,
        properties: group
            .properties
            .iter()
            .map(|p| PropertyType {
                alias: p.alias.clone(),
                name: p.name.clone(),
                sort_order: p.sort_order,
                data_type_id: p.data_type_id,
                mandatory: p.mandatory,
            })
            .collect(),
    }
}

/// Editor view of a stored type.
pub fn to_display(node: &ContentType) -> ContentTypeDisplay {
    ContentTypeDisplay {
        id: node.id,
        key: Some(node.key),
        kind: node.kind,
        alias: node.alias.clone(),
        name: node.name.clone(),
        description: node.description.clone(),
        icon: node.icon.clone(),
        is_element: node.is_element,
        parent_id: node.parent_id,
        path: node.path.clone(),
        groups: node.groups.clone(),
        composite_content_types: node.compositions.clone(),
        allowed_content_types: node.allowed_content_types.iter().map(|s| s.id).collect(),
        errors: BTreeMap::new(),
    }
}

/// Overlay the editable fields of `save` onto `display`.
///
/// Identity (id, key, kind, path) stays as displayed.
pub fn overlay_save(display: &mut ContentTypeDisplay, save: &ContentTypeSave) {
    display.alias = save.alias.clone();
    display.name = save.name.clone();
    display.description = save.description.clone();
    display.icon = save.icon.clone();
    display.is_element = save.is_element;
    display.parent_id = save.parent_id;
    display.groups = save.groups.iter().map(to_group).collect();
    display.composite_content_types = save.composite_content_types.clone();
    display.allowed_content_types = save.allowed_content_types.clone();
}

/// Editor view of a request that has not been persisted.
pub fn save_to_display(save: &ContentTypeSave, kind: ContentTypeKind) -> ContentTypeDisplay {
    let mut display = ContentTypeDisplay {
        id: save.id_or_zero(),
        key: save.key,
        kind,
        alias: String::new(),
        name: String::new(),
        description: None,
        icon: None,
        is_element: false,
        parent_id: save.parent_id,
        path: String::new(),
        groups: Vec::new(),
        composite_content_types: Vec::new(),
        allowed_content_types: Vec::new(),
        errors: BTreeMap::new(),
    };
    overlay_save(&mut display, save);
    display
}

/// Picker descriptor for a type.
pub fn to_entity_basic(node: &ContentType) -> EntityBasic {
    EntityBasic {
        id: node.id,
        key: node.key,
        alias: node.alias.clone(),
        name: node.name.clone(),
        icon: node.icon.clone(),
        parent_id: node.parent_id,
        path: node.path.clone(),
        additional_data: BTreeMap::new(),
    }
}

/// Reset fields the store manages for a type about to be created.
pub fn reset_for_create(node: &mut ContentType) {
    let now = Utc::now();
    node.id = 0;
    node.path = String::new();
    node.created = now;
    node.updated = now;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::PropertyTypeSave;

    fn stored(id: i32, alias: &str, props: &[&str], compositions: &[&str]) -> ContentType {
        let mut ct = ContentType::new(ContentTypeKind::Document, alias, alias);
        ct.id = id;
        let mut group = PropertyGroup::new("Content", 0);
        for (i, p) in props.iter().enumerate() {
            group = group.with_property(PropertyType::new(*p, i as i32));
        }
        ct.groups.push(group);
        ct.compositions = compositions.iter().map(|s| s.to_string()).collect();
        ct
    }

    fn request(alias: &str, props: &[&str], compositions: &[&str]) -> ContentTypeSave {
        let mut save = ContentTypeSave::new(alias, alias);
        save.groups.push(PropertyGroupSave {
            name: "Content".to_string(),
            sort_order: 0,
            properties: props
                .iter()
                .enumerate()
                .map(|(i, p)| PropertyTypeSave {
                    alias: p.to_string(),
                    sort_order: i as i32,
                    ..Default::default()
                })
                .collect(),
        });
        save.composite_content_types = compositions.iter().map(|s| s.to_string()).collect();
        save
    }

    #[test]
    fn merge_copies_fields_and_resolves_compositions() {
        let universe = vec![stored(1, "seo", &["metaTitle"], &[]), stored(2, "page", &["title"], &[])];
        let mut page = universe[1].clone();
        let mut save = request("page", &["title", "body"], &["SEO"]);
        save.allowed_content_types = vec![7, 4];

        apply_save(&save, &mut page, &universe).unwrap();

        assert_eq!(page.id, 2);
        assert_eq!(page.compositions, vec!["seo".to_string()]);
        assert_eq!(page.property_aliases(), vec!["title", "body"]);
        assert_eq!(
            page.allowed_content_types,
            vec![ContentTypeSort::new(7, 0), ContentTypeSort::new(4, 1)]
        );
    }

    #[test]
    fn update_keeps_the_stored_parent() {
        let mut page = stored(2, "page", &[], &[]);
        page.parent_id = 5;
        let universe = vec![page.clone()];
        let mut save = request("page", &[], &[]);
        save.parent_id = 2;

        apply_save(&save, &mut page, &universe).unwrap();
        assert_eq!(page.parent_id, 5);

        let created = create_from_save(&save, ContentTypeKind::Document, &[]).unwrap();
        assert_eq!(created.parent_id, 2);
    }

    #[test]
    fn clash_with_composed_properties_is_invalid_composition() {
        let universe = vec![
            stored(1, "base", &["title"], &[]),
            stored(2, "seo", &["metaTitle"], &["base"]),
            stored(3, "page", &[], &[]),
        ];
        let mut page = universe[2].clone();
        let before = page.clone();

        let err = apply_save(&request("page", &["Title", "body"], &["seo"]), &mut page, &universe)
            .unwrap_err();

        assert_eq!(
            err,
            MappingError::InvalidComposition {
                property_aliases: vec!["Title".to_string()]
            }
        );
        assert_eq!(page, before);
    }

    #[test]
    fn unknown_composition() {
        let universe = vec![stored(1, "page", &[], &[])];
        let mut page = universe[0].clone();
        let err = apply_save(&request("page", &[], &["ghost"]), &mut page, &universe).unwrap_err();
        assert_eq!(
            err,
            MappingError::UnknownComposition {
                alias: "ghost".to_string()
            }
        );
    }

    #[test]
    fn composing_itself_or_a_dependent_is_a_cycle() {
        let universe = vec![stored(1, "base", &[], &[]), stored(2, "derived", &[], &["base"])];
        let mut base = universe[0].clone();
        let err = apply_save(&request("base", &[], &["derived"]), &mut base, &universe).unwrap_err();
        assert!(matches!(err, MappingError::CompositionCycle { .. }));

        let err = apply_save(&request("base", &[], &["base"]), &mut base, &universe).unwrap_err();
        assert!(matches!(err, MappingError::CompositionCycle { .. }));
    }

    #[test]
    fn create_builds_unsaved_node() {
        let universe = vec![stored(1, "seo", &["metaTitle"], &[])];
        let node = create_from_save(
            &request("article", &["title"], &["seo"]),
            ContentTypeKind::Document,
            &universe,
        )
        .unwrap();
        assert!(node.is_new());
        assert_eq!(node.compositions, vec!["seo".to_string()]);
    }

    #[test]
    fn display_overlay_keeps_identity() {
        let mut node = stored(5, "page", &["title"], &[]);
        node.path = "-1,5".to_string();
        let mut display = to_display(&node);
        overlay_save(&mut display, &request("renamed", &["headline"], &[]));

        assert_eq!(display.id, 5);
        assert_eq!(display.path, "-1,5");
        assert_eq!(display.alias, "renamed");
        assert_eq!(display.groups[0].properties[0].alias, "headline");

        let fresh = save_to_display(&request("fresh", &[], &[]), ContentTypeKind::Media);
        assert_eq!(fresh.id, 0);
        assert_eq!(fresh.kind, ContentTypeKind::Media);
        assert_eq!(fresh.alias, "fresh");
    }
}
