//! The translation overlay: per-language shadow values and the
//! active-language view of a record's translatable attributes.
//!
//! Every translatable attribute `a` is exposed as one shadow field per
//! configured language `l` (keyed `a_l`) and as one active field resolved
//! against the current language. Shadows are hydrated from the owner's
//! translation rows and written back by [`TranslationOverlay::persist`],
//! which upserts exactly one row per configured language.

use crate::config::OverlayConfig;
use crate::criteria::{Column, Criteria};
use crate::error::{OverlayError, Result};
use crate::i18n::{SubmissionValidator, ValidationReport};
use crate::store::{OwnerId, TranslationRow, TranslationStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Alias of the joined translation row in filter criteria.
pub const CONTENTS_ALIAS: &str = "contents";

/// One (attribute, language) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShadowKey {
    pub attribute: String,
    pub language: String,
}

impl ShadowKey {
    pub fn new(attribute: &str, language: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            language: language.to_string(),
        }
    }
}

impl fmt::Display for ShadowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.attribute, self.language)
    }
}

/// Submitted shadow values, keyed `<attribute>_<language>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Submission(BTreeMap<String, String>);

impl Submission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: &str) -> &mut Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for Submission {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<HashMap<String, String>> for Submission {
    fn from(values: HashMap<String, String>) -> Self {
        values.into_iter().collect()
    }
}

impl From<BTreeMap<String, String>> for Submission {
    fn from(values: BTreeMap<String, String>) -> Self {
        Self(values)
    }
}

/// Attribute and shadow key lookup shared by the overlay and its views.
#[derive(Debug)]
struct FieldIndex {
    attributes: Vec<String>,
    /// Language-major, in configuration order
    shadows: Vec<ShadowKey>,
    by_key: HashMap<String, usize>,
}

impl FieldIndex {
    fn build(config: &OverlayConfig) -> Result<Self> {
        let mut shadows = Vec::with_capacity(config.languages.len() * config.attributes.len());
        let mut by_key = HashMap::new();

        for language in &config.languages {
            for attribute in &config.attributes {
                let shadow = ShadowKey::new(attribute, language);
                let key = shadow.to_string();

                if config.attributes.contains(&key) {
                    return Err(OverlayError::Configuration(format!(
                        "shadow field '{}' collides with an attribute of the same name",
                        key
                    )));
                }
                if by_key.insert(key.clone(), shadows.len()).is_some() {
                    return Err(OverlayError::Configuration(format!(
                        "shadow field '{}' is produced by more than one attribute/language pair",
                        key
                    )));
                }
                shadows.push(shadow);
            }
        }

        Ok(Self {
            attributes: config.attributes.clone(),
            shadows,
            by_key,
        })
    }

    fn is_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|attribute| attribute == name)
    }

    fn is_shadow(&self, name: &str) -> bool {
        self.by_key.contains_key(name)
    }
}

/// Hydrated translation state of one owner.
#[derive(Debug, Clone, Serialize)]
pub struct TranslatedView {
    owner_id: OwnerId,
    current_language: String,
    shadows: BTreeMap<String, String>,
    active: BTreeMap<String, String>,
    #[serde(skip)]
    index: Arc<FieldIndex>,
}

impl TranslatedView {
    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    pub fn current_language(&self) -> &str {
        &self.current_language
    }

    pub fn shadow(&self, attribute: &str, language: &str) -> Option<&str> {
        self.shadows
            .get(&ShadowKey::new(attribute, language).to_string())
            .map(String::as_str)
    }

    /// Value under the current language, `None` when the owner has no row
    /// in that language.
    pub fn active(&self, attribute: &str) -> Option<&str> {
        self.active.get(attribute).map(String::as_str)
    }

    pub fn shadows(&self) -> &BTreeMap<String, String> {
        &self.shadows
    }

    /// Look up a shadow key (`title_en`) or an attribute name (`title`).
    pub fn get(&self, name: &str) -> Result<Option<&str>> {
        if self.index.is_shadow(name) {
            Ok(self.shadows.get(name).map(String::as_str))
        } else if self.index.is_attribute(name) {
            Ok(self.active(name))
        } else {
            Err(OverlayError::UnknownField(name.to_string()))
        }
    }

    /// Set a shadow value (`title_en`) or the active value (`title`).
    ///
    /// The active value belongs to the current language, so setting it also
    /// sets that language's shadow and is written by the next `persist`.
    /// Fails when the current language is not configured, since the edit
    /// could never be stored.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        if self.index.is_shadow(name) {
            self.shadows.insert(name.to_string(), value.to_string());
        } else if self.index.is_attribute(name) {
            let key = ShadowKey::new(name, &self.current_language).to_string();
            if !self.index.is_shadow(&key) {
                return Err(OverlayError::UnknownField(key));
            }
            self.shadows.insert(key, value.to_string());
            self.active.insert(name.to_string(), value.to_string());
        } else {
            return Err(OverlayError::UnknownField(name.to_string()));
        }
        Ok(())
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.shadows.contains_key(name) || self.active.contains_key(name)
    }

    /// Current shadow values in the shape `persist` expects.
    pub fn to_submission(&self) -> Submission {
        Submission(self.shadows.clone())
    }
}

/// Result of a `persist` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    pub created: usize,
    pub updated: usize,
    /// Stored rows with their new versions, in language order
    pub rows: Vec<TranslationRow>,
}

/// Overlay of translatable attributes for records of one owner type.
pub struct TranslationOverlay<S> {
    store: S,
    config: OverlayConfig,
    index: Arc<FieldIndex>,
}

impl<S: TranslationStore> TranslationOverlay<S> {
    pub fn new(store: S, config: OverlayConfig) -> Result<Self> {
        config.validate()?;
        let index = FieldIndex::build(&config)?;

        debug!(
            languages = ?config.languages,
            attributes = ?config.attributes,
            "Translation overlay configured"
        );

        Ok(Self {
            store,
            config,
            index: Arc::new(index),
        })
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every shadow key, language-major in configuration order.
    pub fn shadow_keys(&self) -> impl Iterator<Item = String> + '_ {
        self.index.shadows.iter().map(ToString::to_string)
    }

    /// The requested language when it is configured, the default otherwise.
    pub fn resolve_language<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(code) if self.config.languages.iter().any(|language| language == code) => code,
            _ => self.config.default_language.as_str(),
        }
    }

    /// Load the owner's translation rows into a fresh view.
    ///
    /// Shadows of languages without a row are `""`. Active fields are only
    /// set when a row exists for `current_language`; otherwise they stay
    /// unset so callers fall back to the base record's own value.
    pub fn hydrate(&self, owner_id: OwnerId, current_language: &str) -> Result<TranslatedView> {
        let rows = self.store.find_rows_by_owner(owner_id)?;

        let mut shadows = BTreeMap::new();
        for shadow in &self.index.shadows {
            let value = rows
                .iter()
                .rev()
                .find(|row| row.lang_id == shadow.language)
                .and_then(|row| row.get(&shadow.attribute))
                .unwrap_or("");
            shadows.insert(shadow.to_string(), value.to_string());
        }

        let mut active = BTreeMap::new();
        match rows.iter().rev().find(|row| row.lang_id == current_language) {
            Some(row) => {
                for attribute in &self.index.attributes {
                    active.insert(attribute.clone(), row.get(attribute).unwrap_or("").to_string());
                }
            }
            None => debug!(
                owner_id,
                lang = current_language,
                "No translation row in current language, active fields left unset"
            ),
        }

        debug!(owner_id, rows = rows.len(), "Hydrated translations");

        Ok(TranslatedView {
            owner_id,
            current_language: current_language.to_string(),
            shadows,
            active,
            index: Arc::clone(&self.index),
        })
    }

    /// Check a submission without writing anything.
    pub fn validate(&self, submission: &Submission) -> ValidationReport {
        let keys: Vec<String> = self.shadow_keys().collect();
        SubmissionValidator::validate(
            keys.iter().map(String::as_str),
            submission,
            self.config.require_non_empty,
        )
    }

    /// Upsert one translation row per configured language from the
    /// submitted shadow values.
    ///
    /// Every row is rewritten on every call. A missing shadow key fails with
    /// [`OverlayError::MissingField`] before any write; a store failure part
    /// way through leaves earlier languages written, so callers that need
    /// all-or-nothing run this inside their own transaction.
    pub fn persist(&self, owner_id: OwnerId, submission: &Submission) -> Result<PersistOutcome> {
        let report = self.validate(submission);
        if let Some(key) = report.missing.first() {
            return Err(OverlayError::MissingField { key: key.clone() });
        }
        if report.has_errors() {
            return Err(OverlayError::Validation(report));
        }
        for warning in &report.warnings {
            warn!(owner_id, "{}", warning);
        }

        let mut existing: HashMap<String, TranslationRow> = self
            .store
            .find_rows_by_owner(owner_id)?
            .into_iter()
            .map(|row| (row.lang_id.clone(), row))
            .collect();

        let mut outcome = PersistOutcome::default();
        for language in &self.config.languages {
            let mut row = existing
                .remove(language)
                .unwrap_or_else(|| TranslationRow::new(owner_id, language));

            for attribute in &self.config.attributes {
                let key = ShadowKey::new(attribute, language).to_string();
                let value = submission
                    .get(&key)
                    .ok_or_else(|| OverlayError::MissingField { key: key.clone() })?;
                row.set(attribute, value);
            }

            let is_new = row.is_new();
            let saved = self.store.save(&row)?;
            if is_new {
                outcome.created += 1;
            } else {
                outcome.updated += 1;
            }
            outcome.rows.push(saved);
        }

        info!(
            owner_id,
            created = outcome.created,
            updated = outcome.updated,
            "Persisted translations"
        );

        Ok(outcome)
    }

    /// Merge a current-language translation join and substring filters on
    /// translatable attributes into `base`.
    ///
    /// `filters` maps attribute names to search values; empty values and
    /// names that are not translatable attributes are ignored. Fails when
    /// `base` already joins the translation alias in another language.
    pub fn build_filter_criteria(
        &self,
        base: Criteria,
        filters: &BTreeMap<String, String>,
        current_language: &str,
    ) -> Result<Criteria> {
        let mut translated = Criteria::new();
        translated.join(CONTENTS_ALIAS, current_language)?;

        for attribute in &self.index.attributes {
            if let Some(value) = filters.get(attribute) {
                translated.compare(Column::joined(CONTENTS_ALIAS, attribute), value, true);
            }
        }

        let mut criteria = base;
        criteria.merge_with(translated)?;
        Ok(criteria)
    }
}
