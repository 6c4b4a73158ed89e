//! Content type storage abstraction.
//!
//! Each kind (document, media, member) has its own store. All reads and
//! writes of type definitions go through [`ContentTypeStore`], so the editor
//! never depends on how types are persisted.
//!
//! [`TypeStores`] is the fixed table of one store per kind. Dispatch is a
//! plain `match` on [`ContentTypeKind`].

pub mod memory;
pub mod snapshot;

use anyhow::Result;

pub use memory::{AliasRegistry, InMemoryTypeStore, MovingSubscriber};

use crate::composition::{self, AvailableCompositions};
use crate::models::{ContentType, ContentTypeKind, EntityContainer};

/// Outcome of relocating or duplicating a type within its tree.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome<T> {
    /// The operation completed; carries the moved node or the new copy.
    Success(T),
    /// The requested parent does not exist.
    ParentNotFound,
    /// A moving subscriber vetoed the operation.
    CancelledByEvent,
    /// The target position is illegal, e.g. beneath the node itself.
    NotAllowedByPath,
}

/// Persistence and domain rules for the types of one kind.
pub trait ContentTypeStore {
    /// The kind this store holds.
    fn kind(&self) -> ContentTypeKind;

    /// Load a type by id.
    fn get(&self, id: i32) -> Result<Option<ContentType>>;

    /// Load every type of this store's kind.
    fn get_all(&self) -> Result<Vec<ContentType>>;

    /// Every type composed of type `id`, directly or transitively.
    ///
    /// Id 0 stands for an unsaved type.
    fn get_composed_of(&self, id: i32) -> Result<Vec<ContentType>>;

    /// Evaluate `universe` as composition targets for `source`.
    fn available_compositions(
        &self,
        source: Option<&ContentType>,
        universe: &[ContentType],
        excluded_type_aliases: &[String],
        excluded_property_aliases: &[String],
        is_element: bool,
    ) -> Result<AvailableCompositions> {
        Ok(composition::available_compositions(
            source,
            universe,
            excluded_type_aliases,
            excluded_property_aliases,
            is_element,
        ))
    }

    /// Property aliases that `node`'s compositions make ambiguous.
    ///
    /// An empty list means the composition is valid.
    fn validate_composition(&self, node: &ContentType) -> Result<Vec<String>> {
        let universe = self.get_all()?;
        Ok(composition::conflicting_aliases(node, &universe))
    }

    /// Aliases of every type of every kind.
    fn all_aliases(&self) -> Result<Vec<String>>;

    /// Folders containing `node`, root first.
    fn containers(&self, node: &ContentType) -> Result<Vec<EntityContainer>>;

    /// Persist `node`, assigning an id and path when it is new.
    fn save(&self, node: &mut ContentType) -> Result<()>;

    /// Move `node` beneath `parent_id`.
    fn move_to(&self, node: &ContentType, parent_id: i32) -> Result<MoveOutcome<ContentType>>;

    /// Copy `node` beneath `parent_id`, returning the new type.
    fn copy_to(&self, node: &ContentType, parent_id: i32) -> Result<MoveOutcome<ContentType>>;
}

/// One store per content type kind.
#[derive(Debug, Clone)]
pub struct TypeStores<S> {
    pub document: S,
    pub media: S,
    pub member: S,
}

impl<S: ContentTypeStore> TypeStores<S> {
    pub fn new(document: S, media: S, member: S) -> Self {
        Self {
            document,
            media,
            member,
        }
    }

    /// The store holding types of `kind`.
    pub fn for_kind(&self, kind: ContentTypeKind) -> &S {
        match kind {
            ContentTypeKind::Document => &self.document,
            ContentTypeKind::Media => &self.media,
            ContentTypeKind::Member => &self.member,
        }
    }

    /// Aliases of every type of every kind.
    pub fn all_aliases(&self) -> Result<Vec<String>> {
        self.document.all_aliases()
    }
}

impl TypeStores<InMemoryTypeStore> {
    /// Three empty in-memory stores sharing one alias registry and id sequence.
    pub fn in_memory() -> Self {
        let registry = AliasRegistry::new();
        Self::new(
            InMemoryTypeStore::new(ContentTypeKind::Document, registry.clone()),
            InMemoryTypeStore::new(ContentTypeKind::Media, registry.clone()),
            InMemoryTypeStore::new(ContentTypeKind::Member, registry),
        )
    }
}
