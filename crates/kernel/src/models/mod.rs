//! Content type models.

pub mod content_type;
pub mod kind;
pub mod save;

pub use content_type::{
    ContentType, ContentTypeSort, EntityBasic, EntityContainer, PropertyGroup, PropertyType,
    ROOT_ID, alias_eq, alias_key,
};
pub use kind::ContentTypeKind;
pub use save::{
    ContentTypeDisplay, ContentTypeSave, MoveOrCopy, PropertyGroupSave, PropertyTypeSave,
    SELF_CHILD_SENTINEL, property_field,
};
