//! Multilingual attribute overlay for records whose translatable fields live
//! in a side translation table (one row per owner and language).
//!
//! The [`TranslationOverlay`] hydrates per-language shadow values and the
//! active-language view from stored rows, persists submitted shadow values
//! back as one upserted row per language, and builds filter [`Criteria`] that
//! join the current-language row.

pub mod config;
pub mod criteria;
pub mod db;
pub mod error;
pub mod i18n;
pub mod overlay;
pub mod store;

pub use config::{AppConfig, OverlayConfig};
pub use criteria::{Column, Condition, Criteria, Join, Operator};
pub use db::SqliteTranslationStore;
pub use error::{OverlayError, StoreError};
pub use i18n::{Language, SubmissionValidator, ValidationReport};
pub use overlay::{PersistOutcome, ShadowKey, Submission, TranslatedView, TranslationOverlay};
pub use store::{MemoryTranslationStore, OwnerId, TranslationRow, TranslationStore};
