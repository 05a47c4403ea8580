use crate::error::{OverlayError, Result};
use crate::i18n::Language;
use anyhow::Context;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Column names the translation table uses for its own bookkeeping.
pub const RESERVED_COLUMNS: &[&str] = &["id", "owner_id", "lang_id", "version", "updated_at"];

static IDENTIFIER_REGEX: OnceLock<Regex> = OnceLock::new();

/// Check that a name is usable as an attribute and SQL column name.
pub(crate) fn is_identifier(name: &str) -> bool {
    IDENTIFIER_REGEX
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex is valid"))
        .is_match(name)
}

/// Overlay configuration, fixed for the lifetime of a `TranslationOverlay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayConfig {
    /// Configured languages, in the order rows are written
    pub languages: Vec<String>,

    /// Fallback language for requests in an unconfigured language
    pub default_language: String,

    /// Translatable attribute names (columns of the translation table)
    pub attributes: Vec<String>,

    /// Reject blank submitted values, not only missing ones
    pub require_non_empty: bool,
}

impl OverlayConfig {
    pub fn new<L, A>(languages: L, default_language: &str, attributes: A) -> Self
    where
        L: IntoIterator,
        L::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            languages: languages.into_iter().map(Into::into).collect(),
            default_language: default_language.to_string(),
            attributes: attributes.into_iter().map(Into::into).collect(),
            require_non_empty: false,
        }
    }

    pub fn with_require_non_empty(mut self, require_non_empty: bool) -> Self {
        self.require_non_empty = require_non_empty;
        self
    }

    /// Validate the configuration.
    ///
    /// Shadow key collisions are checked by the overlay itself when it builds
    /// its key index.
    pub fn validate(&self) -> Result<()> {
        if self.languages.is_empty() {
            return Err(OverlayError::Configuration(
                "at least one language is required".to_string(),
            ));
        }
        if self.attributes.is_empty() {
            return Err(OverlayError::Configuration(
                "at least one translatable attribute is required".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for code in &self.languages {
            let language = Language::parse(code)?;
            if language.code() != code.as_str() {
                return Err(OverlayError::Configuration(format!(
                    "language code '{}' has surrounding whitespace",
                    code
                )));
            }
            if !seen.insert(code.as_str()) {
                return Err(OverlayError::Configuration(format!(
                    "language '{}' is listed twice",
                    code
                )));
            }
        }

        if !seen.contains(self.default_language.as_str()) {
            return Err(OverlayError::Configuration(format!(
                "default language '{}' is not one of the configured languages",
                self.default_language
            )));
        }

        let mut seen = BTreeSet::new();
        for attribute in &self.attributes {
            if !is_identifier(attribute) {
                return Err(OverlayError::Configuration(format!(
                    "attribute '{}' is not a valid identifier",
                    attribute
                )));
            }
            if RESERVED_COLUMNS.contains(&attribute.as_str()) {
                return Err(OverlayError::Configuration(format!(
                    "attribute '{}' clashes with a reserved column",
                    attribute
                )));
            }
            if !seen.insert(attribute.as_str()) {
                return Err(OverlayError::Configuration(format!(
                    "attribute '{}' is listed twice",
                    attribute
                )));
            }
        }

        Ok(())
    }
}

/// Process configuration for the `translation-overlay` binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: String,
    pub translation_table: String,
    pub overlay: OverlayConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let languages = split_list(
            &std::env::var("TRANSLATION_LANGUAGES").context("TRANSLATION_LANGUAGES not set")?,
        );
        let attributes = split_list(
            &std::env::var("TRANSLATION_ATTRIBUTES").context("TRANSLATION_ATTRIBUTES not set")?,
        );

        let default_language = std::env::var("TRANSLATION_DEFAULT_LANGUAGE")
            .ok()
            .or_else(|| languages.first().cloned())
            .unwrap_or_default();

        let require_non_empty = std::env::var("TRANSLATION_REQUIRE_NON_EMPTY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(false);

        let overlay = OverlayConfig::new(languages, &default_language, attributes)
            .with_require_non_empty(require_non_empty);
        overlay.validate()?;

        let translation_table =
            std::env::var("TRANSLATION_TABLE").unwrap_or_else(|_| "post_lang".to_string());
        if !is_identifier(&translation_table) {
            anyhow::bail!("TRANSLATION_TABLE '{}' is not a valid table name", translation_table);
        }

        Ok(Self {
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "translations.db".to_string()),
            translation_table,
            overlay,
        })
    }
}

/// Split a comma separated list, dropping empty entries.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
