//! In-memory content type store.
//!
//! Backs the CLI and the test suites. Stores of different kinds share an
//! [`AliasRegistry`], which owns the id sequence and the cross-kind alias
//! index, so ids and aliases stay unique across all three trees.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::{ContentTypeStore, MoveOutcome};
use crate::composition::CompositionGraph;
use crate::models::{
    ContentType, ContentTypeKind, EntityContainer, ROOT_ID, alias_eq, alias_key,
};

/// Hook consulted before a move or copy; returning `false` cancels it.
///
/// Receives the node and the requested parent id.
pub type MovingSubscriber = Box<dyn Fn(&ContentType, i32) -> bool + Send + Sync>;

/// Cross-kind alias index and id sequence.
#[derive(Debug, Clone)]
pub struct AliasRegistry {
    inner: Arc<AliasRegistryInner>,
}

#[derive(Debug)]
struct AliasRegistryInner {
    /// Normalized alias -> (kind, id, alias as written).
    aliases: DashMap<String, (ContentTypeKind, i32, String)>,
    next_id: AtomicI32,
}

impl Default for AliasRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AliasRegistryInner {
                aliases: DashMap::new(),
                next_id: AtomicI32::new(1),
            }),
        }
    }

    /// Allocate a fresh id.
    fn next_id(&self) -> i32 {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Make sure future ids are greater than `id`.
    fn observe_id(&self, id: i32) {
        self.inner.next_id.fetch_max(id + 1, Ordering::SeqCst);
    }

    /// Who owns `alias`, if anyone.
    pub fn owner(&self, alias: &str) -> Option<(ContentTypeKind, i32)> {
        self.inner
            .aliases
            .get(&alias_key(alias))
            .map(|e| (e.0, e.1))
    }

    /// Every registered alias as written.
    pub fn aliases(&self) -> Vec<String> {
        let mut out: Vec<String> = self.inner.aliases.iter().map(|e| e.2.clone()).collect();
        out.sort();
        out
    }

    /// Point `alias` at `(kind, id)`, releasing `previous` if it changed.
    fn claim(&self, kind: ContentTypeKind, id: i32, alias: &str, previous: Option<&str>) -> Result<()> {
        if let Some((owner_kind, owner_id)) = self.owner(alias)
            && (owner_kind, owner_id) != (kind, id)
        {
            bail!("alias '{alias}' is already used by {owner_kind} type {owner_id}");
        }
        if let Some(previous) = previous
            && !alias_eq(previous, alias)
        {
            self.inner.aliases.remove(&alias_key(previous));
        }
        self.inner
            .aliases
            .insert(alias_key(alias), (kind, id, alias.to_string()));
        Ok(())
    }

    /// First of `{base}Copy`, `{base}Copy2`, ... that nobody owns.
    fn unique_copy_alias(&self, base: &str) -> String {
        let first = format!("{base}Copy");
        if self.owner(&first).is_none() {
            return first;
        }
        (2..)
            .map(|n| format!("{base}Copy{n}"))
            .find(|candidate| self.owner(candidate).is_none())
            .unwrap_or(first)
    }
}

/// In-memory store for one content type kind.
#[derive(Clone)]
pub struct InMemoryTypeStore {
    inner: Arc<InMemoryTypeStoreInner>,
}

struct InMemoryTypeStoreInner {
    kind: ContentTypeKind,
    registry: AliasRegistry,
    nodes: RwLock<BTreeMap<i32, ContentType>>,
    containers: RwLock<BTreeMap<i32, EntityContainer>>,
    subscribers: RwLock<Vec<MovingSubscriber>>,
    save_count: AtomicUsize,
}

impl fmt::Debug for InMemoryTypeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryTypeStore")
            .field("kind", &self.inner.kind)
            .field("types", &self.inner.nodes.read().len())
            .field("containers", &self.inner.containers.read().len())
            .finish()
    }
}

impl InMemoryTypeStore {
    /// Create an empty store for `kind` registered with `registry`.
    pub fn new(kind: ContentTypeKind, registry: AliasRegistry) -> Self {
        Self {
            inner: Arc::new(InMemoryTypeStoreInner {
                kind,
                registry,
                nodes: RwLock::new(BTreeMap::new()),
                containers: RwLock::new(BTreeMap::new()),
                subscribers: RwLock::new(Vec::new()),
                save_count: AtomicUsize::new(0),
            }),
        }
    }

    /// The registry shared with sibling stores.
    pub fn registry(&self) -> &AliasRegistry {
        &self.inner.registry
    }

    /// Number of `save` calls that reached this store.
    pub fn save_count(&self) -> usize {
        self.inner.save_count.load(Ordering::SeqCst)
    }

    /// Register a hook consulted before every move and copy.
    pub fn subscribe_moving(&self, subscriber: MovingSubscriber) {
        self.inner.subscribers.write().push(subscriber);
    }

    /// Every folder in this store, by id.
    pub fn all_containers(&self) -> Vec<EntityContainer> {
        self.inner.containers.read().values().cloned().collect()
    }

    /// Create a folder beneath `parent_id` (a folder or the root).
    pub fn create_container(&self, name: &str, parent_id: i32) -> Result<EntityContainer> {
        let mut container = EntityContainer::new(self.inner.registry.next_id(), name, parent_id);
        self.insert_container(&mut container)?;
        Ok(container)
    }

    /// Insert a folder keeping its id, computing its path.
    pub fn insert_container(&self, container: &mut EntityContainer) -> Result<()> {
        if !self.inner.kind.has_containers() {
            bail!("{} types cannot be organized into folders", self.inner.kind);
        }
        if container.parent_id != ROOT_ID
            && !self.inner.containers.read().contains_key(&container.parent_id)
        {
            bail!("parent folder {} does not exist", container.parent_id);
        }
        container.path = format!("{},{}", self.parent_path(container.parent_id)?, container.id);
        self.inner.registry.observe_id(container.id);
        self.inner
            .containers
            .write()
            .insert(container.id, container.clone());
        debug!(kind = %self.inner.kind, id = container.id, name = %container.name, "container stored");
        Ok(())
    }

    /// Path of a parent (root, folder, or type of this kind).
    fn parent_path(&self, parent_id: i32) -> Result<String> {
        if parent_id == ROOT_ID {
            return Ok(ROOT_ID.to_string());
        }
        if let Some(c) = self.inner.containers.read().get(&parent_id) {
            return Ok(c.path.clone());
        }
        self.inner
            .nodes
            .read()
            .get(&parent_id)
            .map(|n| n.path.clone())
            .with_context(|| format!("parent {parent_id} does not exist"))
    }

    fn parent_exists(&self, parent_id: i32) -> bool {
        parent_id == ROOT_ID
            || self.inner.containers.read().contains_key(&parent_id)
            || self.inner.nodes.read().contains_key(&parent_id)
    }

    /// Check a relocation target and consult subscribers.
    fn check_relocation(&self, node: &ContentType, parent_id: i32) -> Result<Option<MoveOutcome<ContentType>>> {
        if !self.parent_exists(parent_id) {
            return Ok(Some(MoveOutcome::ParentNotFound));
        }
        let parent_path = self.parent_path(parent_id)?;
        let beneath_self = parent_id == node.id
            || parent_path
                .split(',')
                .any(|segment| segment.trim() == node.id.to_string());
        if beneath_self {
            return Ok(Some(MoveOutcome::NotAllowedByPath));
        }
        let vetoed = self
            .inner
            .subscribers
            .read()
            .iter()
            .any(|subscriber| !subscriber(node, parent_id));
        if vetoed {
            return Ok(Some(MoveOutcome::CancelledByEvent));
        }
        Ok(None)
    }
}

impl ContentTypeStore for InMemoryTypeStore {
    fn kind(&self) -> ContentTypeKind {
        self.inner.kind
    }

    fn get(&self, id: i32) -> Result<Option<ContentType>> {
        Ok(self.inner.nodes.read().get(&id).cloned())
    }

    fn get_all(&self) -> Result<Vec<ContentType>> {
        Ok(self.inner.nodes.read().values().cloned().collect())
    }

    fn get_composed_of(&self, id: i32) -> Result<Vec<ContentType>> {
        if id <= 0 {
            return Ok(Vec::new());
        }
        let universe = self.get_all()?;
        let Some(target) = universe.iter().find(|n| n.id == id) else {
            return Ok(Vec::new());
        };
        let graph = CompositionGraph::new(&universe);
        Ok(graph
            .composed_of(&target.alias)
            .into_iter()
            .cloned()
            .collect())
    }

    fn all_aliases(&self) -> Result<Vec<String>> {
        Ok(self.inner.registry.aliases())
    }

    fn containers(&self, node: &ContentType) -> Result<Vec<EntityContainer>> {
        if !self.inner.kind.has_containers() {
            return Ok(Vec::new());
        }
        let containers = self.inner.containers.read();
        Ok(node
            .path_ids()
            .iter()
            .filter_map(|id| containers.get(id).cloned())
            .collect())
    }

    fn save(&self, node: &mut ContentType) -> Result<()> {
        if node.kind != self.inner.kind {
            bail!(
                "cannot save {} type '{}' in the {} store",
                node.kind,
                node.alias,
                self.inner.kind
            );
        }
        let parent_path = self.parent_path(node.parent_id)?;
        let id = if node.is_new() {
            self.inner.registry.next_id()
        } else {
            self.inner.registry.observe_id(node.id);
            node.id
        };

        let previous_alias = self.inner.nodes.read().get(&id).map(|n| n.alias.clone());
        self.inner
            .registry
            .claim(self.inner.kind, id, &node.alias, previous_alias.as_deref())?;

        node.id = id;
        if node.key.is_nil() {
            node.key = Uuid::now_v7();
        }
        node.path = format!("{parent_path},{id}");
        node.updated = Utc::now();

        {
            let mut nodes = self.inner.nodes.write();
            // Composition links are aliases; follow a rename.
            if let Some(previous) = previous_alias.as_deref().filter(|p| *p != node.alias) {
                for other in nodes.values_mut().filter(|other| other.id != id) {
                    if other.rename_composition(previous, &node.alias) {
                        other.updated = node.updated;
                        debug!(id = other.id, from = %previous, to = %node.alias, "composition link renamed");
                    }
                }
            }
            nodes.insert(node.id, node.clone());
        }
        self.inner.save_count.fetch_add(1, Ordering::SeqCst);

        info!(kind = %self.inner.kind, id = node.id, alias = %node.alias, "content type saved");
        Ok(())
    }

    fn move_to(&self, node: &ContentType, parent_id: i32) -> Result<MoveOutcome<ContentType>> {
        if let Some(rejected) = self.check_relocation(node, parent_id)? {
            debug!(id = node.id, parent_id, outcome = ?rejected, "move rejected");
            return Ok(rejected);
        }

        let new_path = format!("{},{}", self.parent_path(parent_id)?, node.id);
        let new_prefix = format!("{new_path},");

        let moved = {
            let mut nodes = self.inner.nodes.write();
            let old_prefix = nodes
                .get(&node.id)
                .map(|stored| format!("{},", stored.path))
                .with_context(|| {
                    format!("type {} is not in the {} store", node.id, self.inner.kind)
                })?;
            for other in nodes.values_mut() {
                if let Some(rest) = other.path.strip_prefix(&old_prefix) {
                    other.path = format!("{new_prefix}{rest}");
                }
            }
            let stored = nodes
                .get_mut(&node.id)
                .with_context(|| format!("type {} vanished during move", node.id))?;
            stored.parent_id = parent_id;
            stored.path = new_path;
            stored.updated = Utc::now();
            stored.clone()
        };

        info!(id = moved.id, parent_id, path = %moved.path, "content type moved");
        Ok(MoveOutcome::Success(moved))
    }

    fn copy_to(&self, node: &ContentType, parent_id: i32) -> Result<MoveOutcome<ContentType>> {
        if let Some(rejected) = self.check_relocation(node, parent_id)? {
            debug!(id = node.id, parent_id, outcome = ?rejected, "copy rejected");
            return Ok(rejected);
        }

        let now = Utc::now();
        let mut copy = node.clone();
        copy.id = 0;
        copy.key = Uuid::now_v7();
        copy.alias = self.inner.registry.unique_copy_alias(&node.alias);
        copy.name = format!("{} (copy)", node.name);
        copy.parent_id = parent_id;
        copy.path = String::new();
        copy.created = now;
        copy.updated = now;
        self.save(&mut copy)?;

        info!(source = node.id, id = copy.id, alias = %copy.alias, "content type copied");
        Ok(MoveOutcome::Success(copy))
    }
}
