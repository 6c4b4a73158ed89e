//! Localized texts and dictionary-backed display names.
//!
//! Two sources are involved:
//! - a [`CultureDictionary`] of editor-maintained items, used to translate
//!   type names written as `#key`
//! - a [`TextCatalog`] of UI texts addressed as `area/key`, shipped with
//!   English defaults and overridable from a TOML file

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Dictionary items keyed by name.
pub trait CultureDictionary {
    /// The value for `key`, if the dictionary has one.
    fn get(&self, key: &str) -> Option<String>;
}

/// A dictionary held in memory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct StaticDictionary {
    items: HashMap<String, String>,
}

impl StaticDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item (builder style).
    pub fn with_item(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.items.insert(key.into(), value.into());
        self
    }

    /// Load a flat `key = "value"` TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dictionary {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse dictionary {}", path.display()))
    }
}

impl CultureDictionary for StaticDictionary {
    fn get(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }
}

/// Translate a display name.
///
/// Names not starting with `#` are returned unchanged. Otherwise the `#` is
/// stripped and the rest looked up; a missing or blank entry yields the
/// stripped key.
pub fn translate_item(dictionary: &dyn CultureDictionary, text: &str) -> String {
    let Some(key) = text.strip_prefix('#') else {
        return text.to_string();
    };
    match dictionary.get(key) {
        Some(value) if !value.trim().is_empty() => value,
        _ => key.to_string(),
    }
}

/// UI text lookup by `area/key`.
pub trait LocalizedText {
    fn localize(&self, area_key: &str) -> String;
}

/// Alias already used by another type.
pub const ALIAS_ALREADY_EXISTS: &str = "editcontenttype/aliasAlreadyExists";
/// Duplicate property alias introduced by compositions.
pub const COMPOSITION_DUPLICATE_ALIAS: &str = "editcontenttype/compositionDuplicateAlias";
/// Two properties of one request share an alias.
pub const DUPLICATE_PROPERTY_ALIAS: &str = "editcontenttype/duplicatePropertyAlias";
/// Composition names a type that does not exist.
pub const COMPOSITION_NOT_FOUND: &str = "editcontenttype/compositionNotFound";
/// Composition would make a type compose itself.
pub const COMPOSITION_CYCLE: &str = "editcontenttype/compositionCycle";
/// Alias is not a valid machine name.
pub const INVALID_ALIAS: &str = "editcontenttype/invalidAlias";
/// Move/copy target is beneath the node itself.
pub const NOT_ALLOWED_BY_PATH: &str = "moveOrCopy/notAllowedByPath";

const DEFAULT_TEXTS: &[(&str, &str)] = &[
    (ALIAS_ALREADY_EXISTS, "Alias already exists"),
    (
        COMPOSITION_DUPLICATE_ALIAS,
        "Duplicate property aliases not allowed between compositions",
    ),
    (
        DUPLICATE_PROPERTY_ALIAS,
        "Duplicate property aliases not allowed",
    ),
    (COMPOSITION_NOT_FOUND, "The selected composition does not exist"),
    (
        COMPOSITION_CYCLE,
        "A content type cannot be composed of itself",
    ),
    (
        NOT_ALLOWED_BY_PATH,
        "The selected item cannot be moved or copied below itself",
    ),
    (
        INVALID_ALIAS,
        "Alias must start with a letter and contain only letters, numbers and underscores",
    ),
];

/// UI texts with built-in English defaults.
#[derive(Debug, Clone)]
pub struct TextCatalog {
    texts: HashMap<String, String>,
}

impl Default for TextCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TextCatalog {
    /// A catalog holding only the built-in defaults.
    pub fn new() -> Self {
        Self {
            texts: DEFAULT_TEXTS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Merge overrides from TOML text of the form `[area] key = "text"`.
    pub fn merge_toml(&mut self, text: &str) -> Result<usize> {
        let areas: BTreeMap<String, BTreeMap<String, String>> =
            toml::from_str(text).context("failed to parse text catalog")?;
        let mut count = 0;
        for (area, entries) in areas {
            for (key, value) in entries {
                self.texts.insert(format!("{area}/{key}"), value);
                count += 1;
            }
        }
        Ok(count)
    }

    /// Defaults plus overrides from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read text catalog {}", path.display()))?;
        let mut catalog = Self::new();
        let count = catalog.merge_toml(&text)?;
        debug!(path = %path.display(), count, "text catalog overrides loaded");
        Ok(catalog)
    }
}

impl LocalizedText for TextCatalog {
    fn localize(&self, area_key: &str) -> String {
        self.texts
            .get(area_key)
            .cloned()
            .unwrap_or_else(|| format!("[{area_key}]"))
    }
}
