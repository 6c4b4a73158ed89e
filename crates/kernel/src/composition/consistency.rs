//! Duplicate property alias detection across composition branches.

use thiserror::Error;

use super::graph::CompositionGraph;
use crate::models::{ContentType, ContentTypeSave, alias_key, property_field};

/// A conflicting alias that has no matching property in the save request.
///
/// The validator and the request disagree about which properties exist.
/// This is a bug, not a user error.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("conflicting property alias '{alias}' not found in the save request")]
pub struct UnlocatedAlias {
    pub alias: String,
}

/// Property aliases contributed by two or more distinct types in the
/// effective schema of `node` (its own properties count as one branch).
///
/// Returns an empty list when the composition is consistent. Each alias is
/// spelled the way `node` declares it when `node` declares it itself.
pub fn conflicting_aliases(node: &ContentType, universe: &[ContentType]) -> Vec<String> {
    let mut graph = CompositionGraph::new(universe);
    graph.insert(node);

    let mut conflicts: Vec<String> = graph
        .duplicate_properties(node)
        .into_keys()
        .map(|key| {
            node.property_types()
                .find(|p| alias_key(&p.alias) == key)
                .map(|p| p.alias.clone())
                .or_else(|| {
                    graph
                        .effective_properties(node)
                        .into_iter()
                        .find(|o| alias_key(&o.property_alias) == key)
                        .map(|o| o.property_alias)
                })
                .unwrap_or(key)
        })
        .collect();
    conflicts.sort();
    conflicts.dedup();
    conflicts
}

/// Field key of the property declaring `alias` in a save request.
///
/// Keys look like `Groups[2].Properties[5].Alias`, using the group and
/// property sort orders.
pub fn property_alias_field(save: &ContentTypeSave, alias: &str) -> Result<String, UnlocatedAlias> {
    let (group, property) = save.find_property(alias).ok_or_else(|| UnlocatedAlias {
        alias: alias.to_string(),
    })?;
    Ok(property_field(group, property))
}
