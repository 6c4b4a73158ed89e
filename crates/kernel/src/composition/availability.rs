//! Which types may be composed into a given type.
//!
//! The rule looks at the whole universe of types of one kind and marks each
//! candidate allowed or not. Ancestor compositions (types the source already
//! reaches through another composition) are reported separately so the
//! caller can show them without letting the user toggle them.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::graph::{CompositionGraph, PropertyOrigin};
use crate::models::{ContentType, alias_key};

/// One candidate composition and whether it may be selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionAvailability {
    pub composition: ContentType,
    pub allowed: bool,
}

/// Result of evaluating every candidate against a source type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvailableCompositions {
    /// Types the source already composes through another composition.
    pub ancestors: Vec<ContentType>,
    /// Every candidate, ordered by name.
    pub results: Vec<CompositionAvailability>,
}

impl AvailableCompositions {
    /// Whether `alias` is one of the reported ancestors.
    pub fn is_ancestor(&self, alias: &str) -> bool {
        let key = alias_key(alias);
        self.ancestors.iter().any(|a| alias_key(&a.alias) == key)
    }

    /// Look up the result for a candidate alias.
    pub fn get(&self, alias: &str) -> Option<&CompositionAvailability> {
        let key = alias_key(alias);
        self.results
            .iter()
            .find(|r| alias_key(&r.composition.alias) == key)
    }
}

/// Evaluate every type in `universe` as a composition target for `source`.
///
/// `source` is `None` for a type that has not been saved yet.
/// `excluded_type_aliases` marks types that must not be offered; their
/// properties are treated as taken. `excluded_property_aliases` are property
/// aliases that exist on the source but are not persisted yet.
pub fn available_compositions(
    source: Option<&ContentType>,
    universe: &[ContentType],
    excluded_type_aliases: &[String],
    excluded_property_aliases: &[String],
    is_element: bool,
) -> AvailableCompositions {
    let mut graph = CompositionGraph::new(universe);
    if let Some(source) = source {
        graph.insert(source);
    }

    let excluded_types: HashSet<String> =
        excluded_type_aliases.iter().map(|a| alias_key(a)).collect();

    let mut taken_properties: HashSet<String> = excluded_property_aliases
        .iter()
        .map(|a| alias_key(a))
        .collect();
    for excluded in excluded_type_aliases {
        if let Some(node) = graph.get(excluded) {
            taken_properties.extend(graph.effective_aliases(node));
        }
    }

    let ancestors: Vec<ContentType> = source
        .map(|s| graph.ancestors(s).into_iter().cloned().collect())
        .unwrap_or_default();
    let ancestor_keys: HashSet<String> = ancestors.iter().map(|a| alias_key(&a.alias)).collect();

    let source_key = source.map(|s| alias_key(&s.alias));
    let source_id = source.map(|s| s.id).filter(|id| *id > 0);

    // Properties the source already exposes, grouped by the branch they come
    // through so a candidate is never compared against itself.
    let own: Vec<PropertyOrigin> = source
        .map(|s| graph.effective_properties(&own_only(s)))
        .unwrap_or_default();
    let mut branches: Vec<(String, Vec<PropertyOrigin>)> = Vec::new();
    if let Some(source) = source {
        for alias in &source.compositions {
            if let Some(direct) = graph.get(alias) {
                branches.push((alias_key(alias), graph.effective_properties(direct)));
            }
        }
    }

    let mut results: Vec<CompositionAvailability> = universe
        .iter()
        .filter(|c| Some(alias_key(&c.alias)) != source_key)
        .filter(|c| source_id.is_none_or(|id| c.id != id))
        .map(|candidate| {
            let key = alias_key(&candidate.alias);
            let allowed = !excluded_types.contains(&key)
                && !ancestor_keys.contains(&key)
                && !source.is_some_and(|s| graph.composes_transitively(candidate, &s.alias))
                && (!is_element || candidate.is_element)
                && !collides(
                    &graph.effective_properties(candidate),
                    &taken_properties,
                    own.iter().chain(
                        branches
                            .iter()
                            .filter(|(branch, _)| *branch != key)
                            .flat_map(|(_, props)| props.iter()),
                    ),
                );
            CompositionAvailability {
                composition: candidate.clone(),
                allowed,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        a.composition
            .name
            .cmp(&b.composition.name)
            .then_with(|| a.composition.alias.cmp(&b.composition.alias))
    });

    AvailableCompositions { ancestors, results }
}

/// The source without its compositions, so only its own properties count.
fn own_only(source: &ContentType) -> ContentType {
    ContentType {
        compositions: Vec::new(),
        ..source.clone()
    }
}

/// Whether any candidate property clashes with a taken alias or with an
/// existing property declared by a different type.
fn collides<'p>(
    candidate: &[PropertyOrigin],
    taken: &HashSet<String>,
    existing: impl Iterator<Item = &'p PropertyOrigin>,
) -> bool {
    let mut declared: HashMap<String, HashSet<String>> = HashMap::new();
    for origin in existing {
        declared
            .entry(alias_key(&origin.property_alias))
            .or_default()
            .insert(alias_key(&origin.declared_by));
    }

    candidate.iter().any(|p| {
        let key = alias_key(&p.property_alias);
        if taken.contains(&key) {
            return true;
        }
        declared
            .get(&key)
            .is_some_and(|by| by.iter().any(|d| *d != alias_key(&p.declared_by)))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{ContentTypeKind, PropertyGroup, PropertyType};

    fn node(id: i32, alias: &str, props: &[&str], compositions: &[&str]) -> ContentType {
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

    fn allowed(result: &AvailableCompositions, alias: &str) -> bool {
        result.get(alias).unwrap().allowed
    }

    #[test]
    fn new_type_with_clashing_property_cannot_compose() {
        let universe = vec![
            node(1, "a", &["summary"], &[]),
            node(2, "b", &["title"], &[]),
            node(3, "c", &["image"], &[]),
        ];
        let result = available_compositions(None, &universe, &[], &["title".to_string()], false);

        assert_eq!(result.results.len(), 3);
        assert!(allowed(&result, "a"));
        assert!(!allowed(&result, "b"));
        assert!(allowed(&result, "c"));
        assert!(result.ancestors.is_empty());
    }

    #[test]
    fn source_is_not_its_own_candidate() {
        let universe = vec![node(1, "page", &[], &[]), node(2, "seo", &[], &[])];
        let result = available_compositions(Some(&universe[0]), &universe, &[], &[], false);

        assert_eq!(result.results.len(), 1);
        assert!(result.get("page").is_none());
    }

    #[test]
    fn types_composing_the_source_would_form_a_cycle() {
        let universe = vec![
            node(1, "base", &[], &[]),
            node(2, "page", &[], &["mid"]),
            node(3, "mid", &[], &["base"]),
        ];
        let result = available_compositions(Some(&universe[0]), &universe, &[], &[], false);

        assert!(!allowed(&result, "page"));
        assert!(!allowed(&result, "mid"));
    }

    #[test]
    fn ancestors_are_reported_and_never_allowed() {
        let universe = vec![
            node(1, "base", &["id"], &[]),
            node(2, "seo", &["meta"], &["base"]),
            node(3, "page", &["title"], &["seo"]),
        ];
        let result = available_compositions(Some(&universe[2]), &universe, &[], &[], false);

        assert!(result.is_ancestor("base"));
        assert!(!allowed(&result, "base"));
        assert!(allowed(&result, "seo"));
    }

    #[test]
    fn current_composition_does_not_clash_with_itself() {
        let universe = vec![
            node(1, "seo", &["meta"], &[]),
            node(2, "page", &["title"], &["seo"]),
        ];
        let result = available_compositions(Some(&universe[1]), &universe, &[], &[], false);

        assert!(allowed(&result, "seo"));
    }

    #[test]
    fn clash_with_another_composition_branch() {
        let universe = vec![
            node(1, "seo", &["meta"], &[]),
            node(2, "social", &["meta"], &[]),
            node(3, "page", &["title"], &["seo"]),
        ];
        let result = available_compositions(Some(&universe[2]), &universe, &[], &[], false);

        assert!(allowed(&result, "seo"));
        assert!(!allowed(&result, "social"));
    }

    #[test]
    fn excluded_types_block_their_properties() {
        let universe = vec![
            node(1, "draft", &["title"], &[]),
            node(2, "heading", &["Title"], &[]),
            node(3, "other", &["x"], &[]),
        ];
        let result =
            available_compositions(None, &universe, &["draft".to_string()], &[], false);

        assert!(!allowed(&result, "draft"));
        assert!(!allowed(&result, "heading"));
        assert!(allowed(&result, "other"));
    }

    #[test]
    fn element_types_only_compose_elements() {
        let mut element = node(1, "card", &[], &[]);
        element.is_element = true;
        let universe = vec![element, node(2, "page", &[], &[])];
        let result = available_compositions(None, &universe, &[], &[], true);

        assert!(allowed(&result, "card"));
        assert!(!allowed(&result, "page"));

        let result = available_compositions(None, &universe, &[], &[], false);
        assert!(allowed(&result, "card"));
        assert!(allowed(&result, "page"));
    }

    #[test]
    fn results_are_ordered_by_name() {
        let universe = vec![
            node(1, "zeta", &[], &[]),
            node(2, "alpha", &[], &[]),
            node(3, "mid", &[], &[]),
        ];
        let result = available_compositions(None, &universe, &[], &[], false);
        let names: Vec<_> = result
            .results
            .iter()
            .map(|r| r.composition.name.as_str())
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
