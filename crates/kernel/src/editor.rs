//! Content type editor operations.
//!
//! The four operations an editor front end calls:
//! - [`ContentTypeEditor::available_compositions`]: which types may be composed in
//! - [`ContentTypeEditor::used_by`]: which types compose a given type
//! - [`ContentTypeEditor::perform_save`]: validate, merge and persist a save request
//! - [`ContentTypeEditor::perform_move`] / [`ContentTypeEditor::perform_copy`]: relocate a type
//!
//! Save and relocation take their lookup and persistence steps as closures
//! so callers can wrap them (transactions, auditing). The `save`,
//! `move_type` and `copy_type` shorthands use the kind's store directly.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::composition::property_alias_field;
use crate::error::{KernelError, KernelResult, SimpleNotification, ValidationFailure};
use crate::localization::{
    ALIAS_ALREADY_EXISTS, COMPOSITION_CYCLE, COMPOSITION_DUPLICATE_ALIAS, COMPOSITION_NOT_FOUND,
    CultureDictionary, DUPLICATE_PROPERTY_ALIAS, LocalizedText, NOT_ALLOWED_BY_PATH,
    StaticDictionary, TextCatalog, translate_item,
};
use crate::mapping::{self, MappingError};
use crate::models::{
    ContentType, ContentTypeKind, ContentTypeSave, ContentTypeSort, EntityBasic,
    EntityContainer, MoveOrCopy, SELF_CHILD_SENTINEL, alias_eq,
};
use crate::store::{ContentTypeStore, MoveOutcome, TypeStores};
use crate::validation::{EditorValidatorRegistry, ModelState};

/// Field key for errors about the selected compositions as a whole.
pub const COMPOSITIONS_FIELD: &str = "CompositeContentTypes";

/// Field key for the type alias.
pub const ALIAS_FIELD: &str = "Alias";

/// `additional_data` key holding a candidate's folder path.
pub const CONTAINER_PATH: &str = "containerPath";

/// One entry of the composition picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionChoice {
    pub entity: EntityBasic,
    pub allowed: bool,
}

/// Editor operations over one table of type stores.
pub struct ContentTypeEditor<S> {
    stores: TypeStores<S>,
    dictionary: Arc<dyn CultureDictionary + Send + Sync>,
    texts: Arc<dyn LocalizedText + Send + Sync>,
    validators: EditorValidatorRegistry,
}

impl<S: ContentTypeStore> ContentTypeEditor<S> {
    /// An editor with an empty dictionary, default texts and the built-in validators.
    pub fn new(stores: TypeStores<S>) -> Self {
        let texts = TextCatalog::new();
        let validators = EditorValidatorRegistry::with_defaults(&texts);
        Self {
            stores,
            dictionary: Arc::new(StaticDictionary::new()),
            texts: Arc::new(texts),
            validators,
        }
    }

    pub fn with_dictionary(mut self, dictionary: Arc<dyn CultureDictionary + Send + Sync>) -> Self {
        self.dictionary = dictionary;
        self
    }

    /// Replace the UI texts. Validators keep the texts they were built with.
    pub fn with_texts(mut self, texts: Arc<dyn LocalizedText + Send + Sync>) -> Self {
        self.texts = texts;
        self
    }

    pub fn with_validators(mut self, validators: EditorValidatorRegistry) -> Self {
        self.validators = validators;
        self
    }

    pub fn stores(&self) -> &TypeStores<S> {
        &self.stores
    }

    // -------------------------------------------------------------------------
    // Composition picker
    // -------------------------------------------------------------------------

    /// Every type of `kind` as a composition candidate for type `id`.
    ///
    /// `id` 0 evaluates a type that has not been saved yet. A candidate
    /// that is already a direct composition stays selectable unless it is
    /// also reached through another composition.
    pub fn available_compositions(
        &self,
        id: i32,
        kind: ContentTypeKind,
        excluded_type_aliases: &[String],
        excluded_property_aliases: &[String],
        is_element: bool,
    ) -> KernelResult<Vec<CompositionChoice>> {
        debug!(kind = %kind, id, is_element, "resolving available compositions");
        let store = self.stores.for_kind(kind);
        let source = if id > 0 {
            Some(store.get(id)?.ok_or(KernelError::NotFound { kind, id })?)
        } else {
            None
        };

        let universe = store.get_all()?;
        let available = store.available_compositions(
            source.as_ref(),
            &universe,
            excluded_type_aliases,
            excluded_property_aliases,
            is_element,
        )?;

        let mut choices = Vec::with_capacity(available.results.len());
        for result in &available.results {
            let alias = &result.composition.alias;
            let allowed = if available.is_ancestor(alias) {
                false
            } else {
                result.allowed || source.as_ref().is_some_and(|s| s.composes(alias))
            };

            let mut entity = self.entity_basic(&result.composition);
            let folders = store.containers(&result.composition)?;
            entity
                .additional_data
                .insert(CONTAINER_PATH.to_string(), container_path(&folders).into());
            choices.push(CompositionChoice { entity, allowed });
        }
        Ok(choices)
    }

    // -------------------------------------------------------------------------
    // Reverse lookup
    // -------------------------------------------------------------------------

    /// Types of `kind` composed of type `id`, directly or transitively.
    ///
    /// `id` 0 asks about an unsaved type; the store decides what that means.
    pub fn used_by(&self, id: i32, kind: ContentTypeKind) -> KernelResult<Vec<EntityBasic>> {
        debug!(kind = %kind, id, "looking up types composed of");
        let store = self.stores.for_kind(kind);
        let id = if id > 0 {
            store.get(id)?.ok_or(KernelError::NotFound { kind, id })?.id
        } else {
            0
        };
        Ok(store
            .get_composed_of(id)?
            .iter()
            .map(|node| self.entity_basic(node))
            .collect())
    }

    // -------------------------------------------------------------------------
    // Save
    // -------------------------------------------------------------------------

    /// Validate and persist `request` through the kind's store.
    pub fn save(&self, kind: ContentTypeKind, request: ContentTypeSave) -> KernelResult<ContentType> {
        let store = self.stores.for_kind(kind);
        self.perform_save(kind, request, |id| store.get(id), |node| store.save(node), None)
    }

    /// Validate, merge and persist a save request.
    ///
    /// Alias collisions, repeated property aliases and validator failures
    /// are collected first and reported together before anything changes. Composition conflicts
    /// found while merging abort with the same failure shape.
    ///
    /// When creating, `before_create` may adjust the request. An allowed
    /// child id of 0 means the new type itself; since its id is only known
    /// after the first persist, the type is persisted a second time with
    /// the self reference added.
    pub fn perform_save<G, P>(
        &self,
        kind: ContentTypeKind,
        mut request: ContentTypeSave,
        get: G,
        mut persist: P,
        before_create: Option<&dyn Fn(&mut ContentTypeSave)>,
    ) -> KernelResult<ContentType>
    where
        G: Fn(i32) -> Result<Option<ContentType>>,
        P: FnMut(&mut ContentType) -> Result<()>,
    {
        let id = request.id_or_zero();
        debug!(kind = %kind, id, alias = %request.alias, "saving content type");

        let existing = if id > 0 {
            Some(get(id)?.ok_or(KernelError::NotFound { kind, id })?)
        } else {
            None
        };

        let mut state = ModelState::new();
        self.check_alias(&request, existing.as_ref(), &mut state)?;
        for field in request.repeated_property_fields() {
            state.add_error(field, self.texts.localize(DUPLICATE_PROPERTY_ALIAS));
        }
        self.validators.validate(kind, &request, &mut state);
        if !state.is_valid() {
            return Err(self.rejected(kind, &request, existing.as_ref(), state));
        }

        request.remove_blank_entries();
        let universe = self.stores.for_kind(kind).get_all()?;

        match existing {
            Some(stored) => {
                let mut node = stored.clone();
                if let Err(err) = mapping::apply_save(&request, &mut node, &universe) {
                    return Err(self.merge_rejected(kind, &request, Some(&stored), err));
                }
                self.check_composition(kind, &node, &request, Some(&stored))?;

                persist(&mut node)?;
                info!(kind = %kind, id = node.id, alias = %node.alias, "content type updated");
                Ok(node)
            }
            None => {
                if let Some(hook) = before_create {
                    hook(&mut request);
                }

                let self_child_position = request
                    .allowed_content_types
                    .iter()
                    .position(|id| *id == SELF_CHILD_SENTINEL);
                request.allowed_content_types.retain(|id| *id > 0);

                let mut node = match mapping::create_from_save(&request, kind, &universe) {
                    Ok(node) => node,
                    Err(err) => return Err(self.merge_rejected(kind, &request, None, err)),
                };
                self.check_composition(kind, &node, &request, None)?;
                mapping::reset_for_create(&mut node);

                persist(&mut node)?;
                info!(kind = %kind, id = node.id, alias = %node.alias, "content type created");

                if let Some(position) = self_child_position {
                    allow_self_as_child(&mut node, position as i32);
                    persist(&mut node)?;
                    debug!(id = node.id, position, "self reference added to allowed children");
                }
                Ok(node)
            }
        }
    }

    /// Reject an alias owned by another type of any kind.
    fn check_alias(
        &self,
        request: &ContentTypeSave,
        existing: Option<&ContentType>,
        state: &mut ModelState,
    ) -> KernelResult<()> {
        let taken = self
            .stores
            .all_aliases()?
            .iter()
            .any(|alias| alias_eq(alias, &request.alias));
        let renamed_or_new = existing.is_none_or(|node| !alias_eq(&node.alias, &request.alias));
        if taken && renamed_or_new {
            state.add_error(ALIAS_FIELD, self.texts.localize(ALIAS_ALREADY_EXISTS));
        }
        Ok(())
    }

    /// Run the store's composition check on the merged node.
    fn check_composition(
        &self,
        kind: ContentTypeKind,
        node: &ContentType,
        request: &ContentTypeSave,
        existing: Option<&ContentType>,
    ) -> KernelResult<()> {
        let conflicts = self.stores.for_kind(kind).validate_composition(node)?;
        if conflicts.is_empty() {
            return Ok(());
        }
        let mut state = ModelState::new();
        self.add_duplicate_alias_errors(request, &conflicts, &mut state)?;
        Err(self.rejected(kind, request, existing, state))
    }

    fn merge_rejected(
        &self,
        kind: ContentTypeKind,
        request: &ContentTypeSave,
        existing: Option<&ContentType>,
        err: MappingError,
    ) -> KernelError {
        debug!(kind = %kind, alias = %request.alias, error = %err, "merge refused");
        let mut state = ModelState::new();
        match err {
            MappingError::InvalidComposition { property_aliases } => {
                if let Err(breach) =
                    self.add_duplicate_alias_errors(request, &property_aliases, &mut state)
                {
                    return breach;
                }
            }
            MappingError::UnknownComposition { .. } => {
                state.add_error(COMPOSITIONS_FIELD, self.texts.localize(COMPOSITION_NOT_FOUND));
            }
            MappingError::CompositionCycle { .. } => {
                state.add_error(COMPOSITIONS_FIELD, self.texts.localize(COMPOSITION_CYCLE));
            }
        }
        self.rejected(kind, request, existing, state)
    }

    /// Attach a duplicate-alias error to each conflicting property.
    ///
    /// Aliases the request declares are keyed to their property field.
    /// Aliases contributed only by compositions are keyed to the
    /// composition list.
    fn add_duplicate_alias_errors(
        &self,
        request: &ContentTypeSave,
        aliases: &[String],
        state: &mut ModelState,
    ) -> KernelResult<()> {
        let message = self.texts.localize(COMPOSITION_DUPLICATE_ALIAS);
        for alias in aliases {
            let declared = request
                .groups
                .iter()
                .flat_map(|g| g.properties.iter())
                .any(|p| alias_eq(&p.alias, alias));
            if !declared {
                state.add_error(COMPOSITIONS_FIELD, message.clone());
                continue;
            }
            let field = property_alias_field(request, alias).map_err(|breach| {
                error!(alias = %alias, request = %request.alias, "conflicting alias not locatable in request");
                KernelError::Invariant(breach.to_string())
            })?;
            state.add_error(field, message.clone());
        }
        Ok(())
    }

    /// Build the failure carrying the editor view and `state`'s errors.
    fn rejected(
        &self,
        kind: ContentTypeKind,
        request: &ContentTypeSave,
        existing: Option<&ContentType>,
        state: ModelState,
    ) -> KernelError {
        let mut display = match existing {
            Some(node) => {
                let mut display = mapping::to_display(node);
                mapping::overlay_save(&mut display, request);
                display
            }
            None => mapping::save_to_display(request, kind),
        };
        warn!(
            kind = %kind,
            alias = %request.alias,
            errors = state.error_count(),
            "content type save rejected"
        );
        display.errors = state.into_errors();
        KernelError::Validation(Box::new(ValidationFailure { display }))
    }

    // -------------------------------------------------------------------------
    // Move and copy
    // -------------------------------------------------------------------------

    /// Move a type through the kind's store. Returns the new path.
    pub fn move_type(&self, kind: ContentTypeKind, request: MoveOrCopy) -> KernelResult<String> {
        let store = self.stores.for_kind(kind);
        self.perform_move(kind, request, |id| store.get(id), |node, parent| store.move_to(node, parent))
    }

    /// Copy a type through the kind's store. Returns the copy's path.
    pub fn copy_type(&self, kind: ContentTypeKind, request: MoveOrCopy) -> KernelResult<String> {
        let store = self.stores.for_kind(kind);
        self.perform_copy(kind, request, |id| store.get(id), |node, parent| store.copy_to(node, parent))
    }

    /// Move type `request.id` beneath `request.parent_id`.
    pub fn perform_move<G, M>(
        &self,
        kind: ContentTypeKind,
        request: MoveOrCopy,
        get: G,
        do_move: M,
    ) -> KernelResult<String>
    where
        G: FnOnce(i32) -> Result<Option<ContentType>>,
        M: FnOnce(&ContentType, i32) -> Result<MoveOutcome<ContentType>>,
    {
        self.relocate("move", kind, request, get, do_move)
    }

    /// Copy type `request.id` beneath `request.parent_id`.
    pub fn perform_copy<G, C>(
        &self,
        kind: ContentTypeKind,
        request: MoveOrCopy,
        get: G,
        do_copy: C,
    ) -> KernelResult<String>
    where
        G: FnOnce(i32) -> Result<Option<ContentType>>,
        C: FnOnce(&ContentType, i32) -> Result<MoveOutcome<ContentType>>,
    {
        self.relocate("copy", kind, request, get, do_copy)
    }

    fn relocate<G, R>(
        &self,
        operation: &'static str,
        kind: ContentTypeKind,
        request: MoveOrCopy,
        get: G,
        action: R,
    ) -> KernelResult<String>
    where
        G: FnOnce(i32) -> Result<Option<ContentType>>,
        R: FnOnce(&ContentType, i32) -> Result<MoveOutcome<ContentType>>,
    {
        debug!(operation, kind = %kind, id = request.id, parent_id = request.parent_id, "relocating content type");
        let node = get(request.id)?.ok_or(KernelError::NotFound {
            kind,
            id: request.id,
        })?;

        match action(&node, request.parent_id)? {
            MoveOutcome::Success(result) => Ok(result.path),
            MoveOutcome::ParentNotFound => Err(KernelError::NotFound {
                kind,
                id: request.parent_id,
            }),
            MoveOutcome::CancelledByEvent => {
                info!(operation, id = node.id, "cancelled by subscriber");
                Err(KernelError::Notification(SimpleNotification::empty()))
            }
            MoveOutcome::NotAllowedByPath => Err(KernelError::Notification(
                SimpleNotification::error_header(self.texts.localize(NOT_ALLOWED_BY_PATH)),
            )),
        }
    }

    fn entity_basic(&self, node: &ContentType) -> EntityBasic {
        let mut entity = mapping::to_entity_basic(node);
        entity.name = translate_item(self.dictionary.as_ref(), &node.name);
        entity
    }
}

/// Folder path of a type: `/` at the root, otherwise `/A/B/`.
pub fn container_path(folders: &[EntityContainer]) -> String {
    if folders.is_empty() {
        return "/".to_string();
    }
    let names: Vec<&str> = folders.iter().map(|f| f.name.as_str()).collect();
    format!("/{}/", names.join("/"))
}

/// Add the type itself to its allowed children at `position`.
fn allow_self_as_child(node: &mut ContentType, position: i32) {
    let own = ContentTypeSort::new(node.id, position);
    if !node.allowed_content_types.iter().any(|s| s.id == own.id) {
        node.allowed_content_types.push(own);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{PropertyGroup, PropertyType, ROOT_ID};
    use crate::store::InMemoryTypeStore;

    fn editor() -> ContentTypeEditor<InMemoryTypeStore> {
        ContentTypeEditor::new(TypeStores::in_memory())
    }

    fn persisted(
        editor: &ContentTypeEditor<InMemoryTypeStore>,
        alias: &str,
        name: &str,
        props: &[&str],
    ) -> ContentType {
        let mut ct = ContentType::new(ContentTypeKind::Document, alias, name);
        let mut group = PropertyGroup::new("Content", 0);
        for (i, p) in props.iter().enumerate() {
            group = group.with_property(PropertyType::new(*p, i as i32));
        }
        ct.groups.push(group);
        editor.stores().document.save(&mut ct).unwrap();
        ct
    }

    #[test]
    fn container_path_format() {
        assert_eq!(container_path(&[]), "/");
        let folders = vec![
            EntityContainer::new(1, "Site", ROOT_ID),
            EntityContainer::new(2, "", 1),
            EntityContainer::new(3, "Blocks", 2),
        ];
        assert_eq!(container_path(&folders), "/Site//Blocks/");
    }

    #[test]
    fn self_reference_is_not_duplicated() {
        let mut node = ContentType::new(ContentTypeKind::Document, "page", "Page");
        node.id = 12;
        allow_self_as_child(&mut node, 0);
        allow_self_as_child(&mut node, 3);
        assert_eq!(node.allowed_content_types, vec![ContentTypeSort::new(12, 0)]);
    }

    #[test]
    fn picker_translates_names_and_adds_folder_path() {
        let editor = editor().with_dictionary(Arc::new(
            StaticDictionary::new().with_item("seoName", "Search engine"),
        ));
        let folder = editor
            .stores()
            .document
            .create_container("Mixins", ROOT_ID)
            .unwrap();
        let mut seo = ContentType::new(ContentTypeKind::Document, "seo", "#seoName");
        seo.parent_id = folder.id;
        editor.stores().document.save(&mut seo).unwrap();

        let choices = editor
            .available_compositions(0, ContentTypeKind::Document, &[], &[], false)
            .unwrap();

        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].entity.name, "Search engine");
        assert_eq!(choices[0].entity.additional_data[CONTAINER_PATH], "/Mixins/");
        assert!(choices[0].allowed);
    }

    #[test]
    fn unknown_source_is_not_found() {
        let err = editor()
            .available_compositions(42, ContentTypeKind::Media, &[], &[], false)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn used_by_requires_existing_type() {
        let editor = editor();
        assert!(editor.used_by(5, ContentTypeKind::Document).unwrap_err().is_not_found());
        assert!(editor.used_by(0, ContentTypeKind::Document).unwrap().is_empty());
    }

    #[test]
    fn duplicate_alias_errors_use_property_fields() {
        let editor = editor();
        persisted(&editor, "seo", "SEO", &["title"]);

        let mut request = ContentTypeSave::new("article", "Article");
        request.groups.push(crate::models::PropertyGroupSave {
            name: "Main".to_string(),
            sort_order: 3,
            properties: vec![crate::models::PropertyTypeSave {
                alias: "title".to_string(),
                sort_order: 7,
                ..Default::default()
            }],
        });
        request.composite_content_types = vec!["seo".to_string()];

        let err = editor.save(ContentTypeKind::Document, request).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(
            errors["Groups[3].Properties[7].Alias"],
            vec!["Duplicate property aliases not allowed between compositions"]
        );
    }

    #[test]
    fn repeated_property_alias_is_a_field_error() {
        let editor = editor();
        persisted(&editor, "seo", "SEO", &["title"]);

        let mut request = ContentTypeSave::new("article", "Article");
        for sort_order in [0, 1] {
            request.groups.push(crate::models::PropertyGroupSave {
                name: format!("Group {sort_order}"),
                sort_order,
                properties: vec![crate::models::PropertyTypeSave {
                    alias: "title".to_string(),
                    sort_order: 4,
                    ..Default::default()
                }],
            });
        }
        request.composite_content_types = vec!["seo".to_string()];

        let err = editor.save(ContentTypeKind::Document, request).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors["Groups[1].Properties[4].Alias"],
            vec!["Duplicate property aliases not allowed"]
        );
        assert!(errors.contains_key("Groups[0].Properties[4].Alias"));
        assert_eq!(editor.stores().document.save_count(), 1);
    }

    // Conflict mapping trusts the request to be free of repeats; a caller
    // that skips that check gets an internal error, not a field error.
    #[test]
    fn unlocatable_alias_is_an_invariant_breach() {
        let editor = editor();
        let mut request = ContentTypeSave::new("article", "Article");
        for sort_order in [0, 1] {
            request.groups.push(crate::models::PropertyGroupSave {
                name: format!("Group {sort_order}"),
                sort_order,
                properties: vec![crate::models::PropertyTypeSave {
                    alias: "title".to_string(),
                    ..Default::default()
                }],
            });
        }
        let mut state = ModelState::new();
        let err = editor
            .add_duplicate_alias_errors(&request, &["title".to_string()], &mut state)
            .unwrap_err();
        assert!(matches!(err, KernelError::Invariant(_)));
        assert!(state.is_valid());
    }
}
