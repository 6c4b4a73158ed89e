//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::localization::{StaticDictionary, TextCatalog};

/// Kernel configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// YAML snapshot of all type stores (default: ./types.yml).
    pub snapshot_path: PathBuf,

    /// TOML file overriding UI texts. When None, built-in texts are used.
    pub text_catalog_path: Option<PathBuf>,

    /// TOML file of dictionary items for `#key` display names.
    pub dictionary_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or blank variables take their defaults.
    pub fn from_env() -> Self {
        Self {
            snapshot_path: non_empty_path("COMPOSITOR_SNAPSHOT")
                .unwrap_or_else(|| PathBuf::from("./types.yml")),
            text_catalog_path: non_empty_path("COMPOSITOR_TEXT_CATALOG"),
            dictionary_path: non_empty_path("COMPOSITOR_DICTIONARY"),
        }
    }

    /// UI texts: defaults plus the configured overrides.
    pub fn load_texts(&self) -> Result<TextCatalog> {
        match &self.text_catalog_path {
            Some(path) => TextCatalog::load(path).context("failed to load text catalog"),
            None => Ok(TextCatalog::new()),
        }
    }

    /// The configured dictionary, or an empty one.
    pub fn load_dictionary(&self) -> Result<Arc<StaticDictionary>> {
        let dictionary = match &self.dictionary_path {
            Some(path) => {
                let dictionary = StaticDictionary::load(path).context("failed to load dictionary")?;
                info!(path = %path.display(), "dictionary loaded");
                dictionary
            }
            None => StaticDictionary::new(),
        };
        Ok(Arc::new(dictionary))
    }
}

fn non_empty_path(var: &str) -> Option<PathBuf> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
