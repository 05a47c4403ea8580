use crate::i18n::ValidationReport;
use crate::store::OwnerId;
use thiserror::Error;

/// Errors raised by a [`TranslationStore`](crate::store::TranslationStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The row was written by someone else since it was loaded.
    #[error("translation row for owner {owner_id} / '{lang_id}' was modified concurrently")]
    Conflict { owner_id: OwnerId, lang_id: String },

    #[error("translation store lock poisoned")]
    Poisoned,

    #[error("invalid translation row: {0}")]
    InvalidRow(String),

    #[error("invalid translation table schema: {0}")]
    InvalidSchema(String),
}

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("invalid overlay configuration: {0}")]
    Configuration(String),

    #[error("submission is missing field '{key}'")]
    MissingField { key: String },

    #[error("submission failed validation: {}", .0.errors.join("; "))]
    Validation(ValidationReport),

    #[error("unknown translated field '{0}'")]
    UnknownField(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T, E = OverlayError> = std::result::Result<T, E>;
