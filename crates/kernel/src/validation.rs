//! Field-keyed validation for content type save requests.
//!
//! Errors from every check are collected into one [`ModelState`] that the
//! save orchestrator inspects once, so a rejected save reports every
//! problem together.
//!
//! Structural validators are registered per request shape (the content
//! type kind) when the editor is built; nothing is discovered at runtime.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::localization::{INVALID_ALIAS, LocalizedText, TextCatalog};
use crate::models::{ContentTypeKind, ContentTypeSave};

/// Accumulated field errors for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelState {
    errors: BTreeMap<String, Vec<String>>,
}

impl ModelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` against `field`. Use an empty field for model-level errors.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Messages recorded against `field`.
    pub fn errors_for(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Total number of messages across all fields.
    pub fn error_count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    pub fn into_errors(self) -> BTreeMap<String, Vec<String>> {
        self.errors
    }
}

/// One failure reported by an [`EditorValidator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub message: String,
    /// Fields the message applies to.
    pub member_names: Vec<String>,
}

impl ValidationResult {
    pub fn new(message: impl Into<String>, member_names: &[&str]) -> Self {
        Self {
            message: message.into(),
            member_names: member_names.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Results without a message or without any field are ignored.
    fn is_reportable(&self) -> bool {
        !self.message.trim().is_empty() && !self.member_names.is_empty()
    }
}

/// A structural check applied to save requests before anything is persisted.
pub trait EditorValidator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// The request shapes this validator applies to.
    fn models(&self) -> &[ContentTypeKind];

    fn validate(&self, request: &ContentTypeSave) -> Vec<ValidationResult>;
}

/// Validators grouped by the request shape they apply to.
#[derive(Default)]
pub struct EditorValidatorRegistry {
    validators: HashMap<ContentTypeKind, Vec<Arc<dyn EditorValidator>>>,
}

impl fmt::Debug for EditorValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<(ContentTypeKind, Vec<&str>)> = self
            .validators
            .iter()
            .map(|(kind, list)| (*kind, list.iter().map(|v| v.name()).collect()))
            .collect();
        names.sort_by_key(|(kind, _)| *kind);
        f.debug_struct("EditorValidatorRegistry")
            .field("validators", &names)
            .finish()
    }
}

impl EditorValidatorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in validators.
    pub fn with_defaults(texts: &dyn LocalizedText) -> Self {
        let mut registry = Self::new();
        registry.register(AliasFormatValidator::new(texts));
        registry
    }

    /// Register `validator` for every shape it declares.
    pub fn register(&mut self, validator: impl EditorValidator + 'static) {
        let validator: Arc<dyn EditorValidator> = Arc::new(validator);
        for kind in validator.models() {
            self.validators
                .entry(*kind)
                .or_default()
                .push(validator.clone());
        }
    }

    /// Number of validators that apply to `kind`.
    pub fn count_for(&self, kind: ContentTypeKind) -> usize {
        self.validators.get(&kind).map_or(0, Vec::len)
    }

    /// Run every validator for `kind` and add its results to `state`.
    ///
    /// Each reportable result adds one error per field it names.
    pub fn validate(&self, kind: ContentTypeKind, request: &ContentTypeSave, state: &mut ModelState) {
        let Some(validators) = self.validators.get(&kind) else {
            return;
        };
        for validator in validators {
            for result in validator.validate(request) {
                if !result.is_reportable() {
                    debug!(validator = validator.name(), "ignoring empty validation result");
                    continue;
                }
                for member in &result.member_names {
                    state.add_error(member.clone(), result.message.clone());
                }
            }
        }
    }
}

/// Alias format: a letter followed by ASCII letters, digits or underscores.
///
/// # Panics
///
/// Panics if the hard-coded regex literal is invalid (impossible in practice).
#[allow(clippy::expect_used)]
static ALIAS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*$").expect("valid regex literal"));

/// Rejects aliases that are not valid machine names.
#[derive(Debug, Clone)]
pub struct AliasFormatValidator {
    message: String,
}

impl AliasFormatValidator {
    pub fn new(texts: &dyn LocalizedText) -> Self {
        Self {
            message: texts.localize(INVALID_ALIAS),
        }
    }
}

impl Default for AliasFormatValidator {
    fn default() -> Self {
        Self::new(&TextCatalog::new())
    }
}

impl EditorValidator for AliasFormatValidator {
    fn name(&self) -> &str {
        "alias_format"
    }

    fn models(&self) -> &[ContentTypeKind] {
        &ContentTypeKind::ALL
    }

    fn validate(&self, request: &ContentTypeSave) -> Vec<ValidationResult> {
        if ALIAS_PATTERN.is_match(&request.alias) {
            return Vec::new();
        }
        vec![ValidationResult::new(self.message.clone(), &["Alias"])]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    struct Fixed {
        models: Vec<ContentTypeKind>,
        results: Vec<ValidationResult>,
    }

    impl EditorValidator for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn models(&self) -> &[ContentTypeKind] {
            &self.models
        }

        fn validate(&self, _request: &ContentTypeSave) -> Vec<ValidationResult> {
            self.results.clone()
        }
    }

    #[test]
    fn model_state_accumulates_per_field() {
        let mut state = ModelState::new();
        assert!(state.is_valid());

        state.add_error("Alias", "taken");
        state.add_error("Alias", "bad format");
        state.add_error("Name", "required");

        assert!(!state.is_valid());
        assert_eq!(state.errors_for("Alias").len(), 2);
        assert_eq!(state.errors_for("Missing"), &[] as &[String]);
        assert_eq!(state.error_count(), 3);
    }

    #[test]
    fn results_fan_out_per_member_and_blanks_are_dropped() {
        let mut registry = EditorValidatorRegistry::new();
        registry.register(Fixed {
            models: vec![ContentTypeKind::Document],
            results: vec![
                ValidationResult::new("too long", &["Name", "Description"]),
                ValidationResult::new("  ", &["Icon"]),
                ValidationResult::new("orphan message", &[]),
            ],
        });

        let mut state = ModelState::new();
        registry.validate(
            ContentTypeKind::Document,
            &ContentTypeSave::new("page", "Page"),
            &mut state,
        );

        assert_eq!(state.error_count(), 2);
        assert_eq!(state.errors_for("Name"), &["too long".to_string()]);
        assert_eq!(state.errors_for("Description"), &["too long".to_string()]);
        assert!(state.errors_for("Icon").is_empty());
    }

    #[test]
    fn validators_only_run_for_their_shapes() {
        let mut registry = EditorValidatorRegistry::new();
        registry.register(Fixed {
            models: vec![ContentTypeKind::Media],
            results: vec![ValidationResult::new("media only", &["Alias"])],
        });

        let mut state = ModelState::new();
        registry.validate(
            ContentTypeKind::Member,
            &ContentTypeSave::new("avatar", "Avatar"),
            &mut state,
        );
        assert!(state.is_valid());
        assert_eq!(registry.count_for(ContentTypeKind::Media), 1);
        assert_eq!(registry.count_for(ContentTypeKind::Member), 0);
    }

    #[test]
    fn alias_format_rule() {
        let validator = AliasFormatValidator::default();
        for ok in ["page", "blogPost", "a1_b2"] {
            assert!(validator.validate(&ContentTypeSave::new(ok, "x")).is_empty(), "{ok}");
        }
        for bad in ["", "1page", "_page", "blog post", "blog-post", "pågé"] {
            let results = validator.validate(&ContentTypeSave::new(bad, "x"));
            assert_eq!(results.len(), 1, "{bad}");
            assert_eq!(results[0].member_names, vec!["Alias".to_string()]);
        }
    }

    #[test]
    fn defaults_cover_every_kind() {
        let registry = EditorValidatorRegistry::with_defaults(&TextCatalog::new());
        for kind in ContentTypeKind::ALL {
            assert_eq!(registry.count_for(kind), 1);
        }
    }
}
