//! In-memory composition graph.
//!
//! Indexes a universe of content types by alias and answers reachability
//! questions over their composition edges. Edges are followed by alias, so
//! a node that is being edited can be overlaid on the persisted universe.
//! Dangling aliases (compositions naming a type not in the universe) are
//! ignored. Cycles in stored data are tolerated: every walk keeps a
//! visited set.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{ContentType, alias_key};

/// A property alias together with the type that declares it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyOrigin {
    pub property_alias: String,
    pub declared_by: String,
}

/// Composition graph over a set of content types.
#[derive(Debug, Clone, Default)]
pub struct CompositionGraph<'a> {
    nodes: HashMap<String, &'a ContentType>,
}

impl<'a> CompositionGraph<'a> {
    /// Build a graph over `universe`. Later duplicates of an alias win.
    pub fn new(universe: impl IntoIterator<Item = &'a ContentType>) -> Self {
        let mut graph = Self::default();
        for node in universe {
            graph.insert(node);
        }
        graph
    }

    /// Add or replace a node.
    pub fn insert(&mut self, node: &'a ContentType) {
        self.nodes.insert(alias_key(&node.alias), node);
    }

    /// Look up a node by alias.
    pub fn get(&self, alias: &str) -> Option<&'a ContentType> {
        self.nodes.get(&alias_key(alias)).copied()
    }

    /// Every type reachable from `node`'s compositions, excluding `node`.
    ///
    /// Order is depth-first, direct compositions first in declaration order.
    pub fn closure(&self, node: &ContentType) -> Vec<&'a ContentType> {
        let mut visited = HashSet::from([alias_key(&node.alias)]);
        let mut out = Vec::new();
        for alias in &node.compositions {
            self.walk(alias, &mut visited, &mut out);
        }
        out
    }

    fn walk(&self, alias: &str, visited: &mut HashSet<String>, out: &mut Vec<&'a ContentType>) {
        let key = alias_key(alias);
        if !visited.insert(key) {
            return;
        }
        let Some(node) = self.get(alias) else {
            return;
        };
        out.push(node);
        for next in &node.compositions {
            self.walk(next, visited, out);
        }
    }

    /// Whether `from` is composed of `target`, directly or transitively.
    pub fn composes_transitively(&self, from: &ContentType, target: &str) -> bool {
        let target = alias_key(target);
        self.closure(from)
            .iter()
            .any(|n| alias_key(&n.alias) == target)
    }

    /// Compositions of `node` reachable through some path of length two or more.
    ///
    /// This includes direct compositions that are also reached through
    /// another direct composition.
    pub fn ancestors(&self, node: &ContentType) -> Vec<&'a ContentType> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for direct in &node.compositions {
            let Some(direct) = self.get(direct) else {
                continue;
            };
            for reached in self.closure(direct) {
                if alias_key(&reached.alias) == alias_key(&node.alias) {
                    continue;
                }
                if seen.insert(alias_key(&reached.alias)) {
                    out.push(reached);
                }
            }
        }
        out
    }

    /// Properties visible on `node`: its own plus everything composed in.
    ///
    /// A type reached along several paths contributes once.
    pub fn effective_properties(&self, node: &ContentType) -> Vec<PropertyOrigin> {
        let mut out = own_properties(node);
        for composed in self.closure(node) {
            out.extend(own_properties(composed));
        }
        out
    }

    /// Effective property aliases of `node`, normalized.
    pub fn effective_aliases(&self, node: &ContentType) -> HashSet<String> {
        self.effective_properties(node)
            .into_iter()
            .map(|p| alias_key(&p.property_alias))
            .collect()
    }

    /// Property aliases contributed by two or more distinct declaring types.
    ///
    /// Keyed by normalized alias; values list the declaring type aliases.
    pub fn duplicate_properties(&self, node: &ContentType) -> BTreeMap<String, Vec<String>> {
        let mut by_alias: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for origin in self.effective_properties(node) {
            let declarers = by_alias
                .entry(alias_key(&origin.property_alias))
                .or_default();
            if !declarers.iter().any(|d| alias_key(d) == alias_key(&origin.declared_by)) {
                declarers.push(origin.declared_by);
            }
        }
        by_alias.retain(|_, declarers| declarers.len() > 1);
        by_alias
    }

    /// Every node composed of `alias`, directly or transitively.
    pub fn composed_of(&self, alias: &str) -> Vec<&'a ContentType> {
        let target = alias_key(alias);
        let mut out: Vec<&'a ContentType> = self
            .nodes
            .values()
            .filter(|n| alias_key(&n.alias) != target)
            .filter(|n| self.composes_transitively(n, alias))
            .copied()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.alias.cmp(&b.alias)));
        out
    }
}

fn own_properties(node: &ContentType) -> Vec<PropertyOrigin> {
    node.property_types()
        .map(|p| PropertyOrigin {
            property_alias: p.alias.clone(),
            declared_by: node.alias.clone(),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{ContentTypeKind, PropertyGroup, PropertyType};

    fn node(alias: &str, props: &[&str], compositions: &[&str]) -> ContentType {
        let mut ct = ContentType::new(ContentTypeKind::Document, alias, alias);
        let mut group = PropertyGroup::new("Content", 0);
        for (i, p) in props.iter().enumerate() {
            group = group.with_property(PropertyType::new(*p, i as i32));
        }
        ct.groups.push(group);
        ct.compositions = compositions.iter().map(|s| s.to_string()).collect();
        ct
    }

    fn aliases(nodes: &[&ContentType]) -> Vec<String> {
        nodes.iter().map(|n| n.alias.clone()).collect()
    }

    #[test]
    fn closure_follows_transitive_edges() {
        let base = node("base", &["id"], &[]);
        let seo = node("seo", &["metaTitle"], &["base"]);
        let page = node("page", &["title"], &["seo"]);
        let universe = [base, seo, page.clone()];
        let graph = CompositionGraph::new(&universe);

        assert_eq!(aliases(&graph.closure(&page)), vec!["seo", "base"]);
        assert!(graph.composes_transitively(&page, "BASE"));
        assert!(!graph.composes_transitively(&universe[0], "page"));
    }

    #[test]
    fn closure_survives_stored_cycles() {
        let a = node("a", &[], &["b"]);
        let b = node("b", &[], &["a"]);
        let universe = [a.clone(), b];
        let graph = CompositionGraph::new(&universe);

        assert_eq!(aliases(&graph.closure(&a)), vec!["b"]);
    }

    #[test]
    fn ancestors_exclude_plain_direct_compositions() {
        let base = node("base", &[], &[]);
        let seo = node("seo", &[], &["base"]);
        let nav = node("nav", &[], &[]);
        let page = node("page", &[], &["seo", "nav", "base"]);
        let universe = [base, seo, nav, page.clone()];
        let graph = CompositionGraph::new(&universe);

        // base is direct but also reached through seo
        assert_eq!(aliases(&graph.ancestors(&page)), vec!["base"]);
    }

    #[test]
    fn diamond_is_not_a_duplicate() {
        let base = node("base", &["id"], &[]);
        let left = node("left", &["l"], &["base"]);
        let right = node("right", &["r"], &["base"]);
        let page = node("page", &["title"], &["left", "right"]);
        let universe = [base, left, right];
        let graph = CompositionGraph::new(&universe);

        assert!(graph.duplicate_properties(&page).is_empty());
        assert_eq!(graph.effective_aliases(&page).len(), 4);
    }

    #[test]
    fn duplicate_properties_report_declarers() {
        let seo = node("seo", &["title"], &[]);
        let page = node("page", &["Title"], &["seo"]);
        let universe = [seo];
        let graph = CompositionGraph::new(&universe);

        let dups = graph.duplicate_properties(&page);
        assert_eq!(dups.len(), 1);
        assert_eq!(dups["title"], vec!["page".to_string(), "seo".to_string()]);
    }

    #[test]
    fn composed_of_walks_reverse_edges() {
        let base = node("base", &[], &[]);
        let seo = node("seo", &[], &["base"]);
        let page = node("page", &[], &["seo"]);
        let other = node("other", &[], &[]);
        let universe = [base, seo, page, other];
        let graph = CompositionGraph::new(&universe);

        assert_eq!(aliases(&graph.composed_of("base")), vec!["page", "seo"]);
        assert!(graph.composed_of("other").is_empty());
    }

    #[test]
    fn dangling_compositions_are_ignored() {
        let page = node("page", &["title"], &["ghost"]);
        let graph = CompositionGraph::new(std::iter::empty());

        assert!(graph.closure(&page).is_empty());
        assert!(graph.get("ghost").is_none());
    }
}
