//! YAML snapshot export/import for in-memory stores.
//!
//! A snapshot holds one section per kind, each listing folders and types
//! with their ids. Import keeps ids and recomputes paths, inserting parents
//! before children regardless of file order.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ContentTypeStore, InMemoryTypeStore, TypeStores};
use crate::models::{ContentType, ContentTypeKind, EntityContainer, ROOT_ID};

/// Maximum snapshot file size (10 MB).
const MAX_SNAPSHOT_SIZE: u64 = 10 * 1024 * 1024;

/// Serialized form of all three stores.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub document: KindSnapshot,
    #[serde(default)]
    pub media: KindSnapshot,
    #[serde(default)]
    pub member: KindSnapshot,
}

/// Folders and types of one kind.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct KindSnapshot {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<EntityContainer>,
    #[serde(default)]
    pub types: Vec<ContentType>,
}

impl Snapshot {
    /// Capture the current contents of `stores`.
    pub fn capture(stores: &TypeStores<InMemoryTypeStore>) -> Result<Self> {
        let section = |store: &InMemoryTypeStore| -> Result<KindSnapshot> {
            Ok(KindSnapshot {
                containers: store.all_containers(),
                types: store.get_all()?,
            })
        };
        Ok(Self {
            document: section(&stores.document)?,
            media: section(&stores.media)?,
            member: section(&stores.member)?,
        })
    }

    /// Build fresh in-memory stores from this snapshot.
    pub fn restore(self) -> Result<TypeStores<InMemoryTypeStore>> {
        let stores = TypeStores::in_memory();
        for (kind, section) in [
            (ContentTypeKind::Document, self.document),
            (ContentTypeKind::Media, self.media),
            (ContentTypeKind::Member, self.member),
        ] {
            restore_section(stores.for_kind(kind), section)
                .with_context(|| format!("failed to restore {kind} types"))?;
        }
        Ok(stores)
    }

    /// Parse a snapshot from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yml::from_str(text).context("failed to parse type snapshot")
    }

    /// Render this snapshot as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yml::to_string(self).context("failed to serialize type snapshot")
    }
}

/// Load stores from a YAML file. A missing file yields empty stores.
pub fn load(path: &Path) -> Result<TypeStores<InMemoryTypeStore>> {
    if !path.exists() {
        info!(path = %path.display(), "snapshot not found, starting empty");
        return Ok(TypeStores::in_memory());
    }
    let size = std::fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?
        .len();
    if size > MAX_SNAPSHOT_SIZE {
        bail!(
            "snapshot {} is {size} bytes, larger than the {MAX_SNAPSHOT_SIZE} byte limit",
            path.display()
        );
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let stores = Snapshot::from_yaml(&text)?.restore()?;
    info!(path = %path.display(), "snapshot loaded");
    Ok(stores)
}

/// Write stores to a YAML file.
pub fn save(stores: &TypeStores<InMemoryTypeStore>, path: &Path) -> Result<()> {
    let yaml = Snapshot::capture(stores)?.to_yaml()?;
    std::fs::write(path, yaml).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "snapshot written");
    Ok(())
}

fn restore_section(store: &InMemoryTypeStore, section: KindSnapshot) -> Result<()> {
    let mut containers = section.containers;
    while !containers.is_empty() {
        let known: Vec<i32> = store.all_containers().iter().map(|c| c.id).collect();
        let (ready, waiting): (Vec<_>, Vec<_>) = containers
            .into_iter()
            .partition(|c| c.parent_id == ROOT_ID || known.contains(&c.parent_id));
        if ready.is_empty() {
            let orphans: Vec<String> = waiting.iter().map(|c| c.id.to_string()).collect();
            bail!("folders with missing parents: {}", orphans.join(", "));
        }
        for mut container in ready {
            store.insert_container(&mut container)?;
        }
        containers = waiting;
    }

    let container_ids: Vec<i32> = store.all_containers().iter().map(|c| c.id).collect();
    let mut types = section.types;
    for node in &mut types {
        node.kind = store.kind();
    }
    while !types.is_empty() {
        let (ready, waiting): (Vec<_>, Vec<_>) = types.into_iter().partition(|t| {
            t.parent_id == ROOT_ID
                || container_ids.contains(&t.parent_id)
                || matches!(store.get(t.parent_id), Ok(Some(_)))
        });
        if ready.is_empty() {
            let orphans: Vec<&str> = waiting.iter().map(|t| t.alias.as_str()).collect();
            bail!("types with missing parents: {}", orphans.join(", "));
        }
        for mut node in ready {
            if node.is_new() {
                bail!("type '{}' has no id", node.alias);
            }
            store.save(&mut node)?;
            debug!(id = node.id, alias = %node.alias, "type restored");
        }
        types = waiting;
    }
    Ok(())
}
