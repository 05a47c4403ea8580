//! Translation rows and the store abstraction the overlay reads and writes.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Primary key of the record that owns translation rows.
pub type OwnerId = i64;

/// One language's stored values for an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRow {
    pub owner_id: OwnerId,
    pub lang_id: String,
    pub values: BTreeMap<String, String>,
    /// Optimistic concurrency token; 0 means the row was never stored.
    pub version: i64,
}

impl TranslationRow {
    /// Build a row that has not been stored yet.
    pub fn new(owner_id: OwnerId, lang_id: &str) -> Self {
        Self {
            owner_id,
            lang_id: lang_id.to_string(),
            values: BTreeMap::new(),
            version: 0,
        }
    }

    pub fn with_value(mut self, attribute: &str, value: &str) -> Self {
        self.set(attribute, value);
        self
    }

    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.values.get(attribute).map(String::as_str)
    }

    pub fn set(&mut self, attribute: &str, value: &str) {
        self.values.insert(attribute.to_string(), value.to_string());
    }

    pub fn is_new(&self) -> bool {
        self.version == 0
    }
}

/// Persistence for translation rows.
///
/// `save` upserts by (owner_id, lang_id) and checks the row's version:
/// a new row (version 0) must not exist yet, a stored row must still carry
/// the version it was loaded with. Either mismatch is a
/// [`StoreError::Conflict`].
pub trait TranslationStore {
    fn find_rows_by_owner(&self, owner_id: OwnerId) -> Result<Vec<TranslationRow>, StoreError>;

    /// Store the row and return it with its new version.
    fn save(&self, row: &TranslationRow) -> Result<TranslationRow, StoreError>;
}

impl<S: TranslationStore + ?Sized> TranslationStore for &S {
    fn find_rows_by_owner(&self, owner_id: OwnerId) -> Result<Vec<TranslationRow>, StoreError> {
        (**self).find_rows_by_owner(owner_id)
    }

    fn save(&self, row: &TranslationRow) -> Result<TranslationRow, StoreError> {
        (**self).save(row)
    }
}

impl<S: TranslationStore + ?Sized> TranslationStore for Arc<S> {
    fn find_rows_by_owner(&self, owner_id: OwnerId) -> Result<Vec<TranslationRow>, StoreError> {
        (**self).find_rows_by_owner(owner_id)
    }

    fn save(&self, row: &TranslationRow) -> Result<TranslationRow, StoreError> {
        (**self).save(row)
    }
}

/// In-memory store keyed by (owner_id, lang_id).
#[derive(Clone, Default)]
pub struct MemoryTranslationStore {
    rows: Arc<Mutex<BTreeMap<(OwnerId, String), TranslationRow>>>,
}

impl MemoryTranslationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored row, ordered by owner then language.
    pub fn rows(&self) -> Result<Vec<TranslationRow>, StoreError> {
        let rows = self.rows.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.values().cloned().collect())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.rows.lock().map_err(|_| StoreError::Poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl TranslationStore for MemoryTranslationStore {
    fn find_rows_by_owner(&self, owner_id: OwnerId) -> Result<Vec<TranslationRow>, StoreError> {
        let rows = self.rows.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(rows
            .range((owner_id, String::new())..)
            .take_while(|((owner, _), _)| *owner == owner_id)
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn save(&self, row: &TranslationRow) -> Result<TranslationRow, StoreError> {
        let mut rows = self.rows.lock().map_err(|_| StoreError::Poisoned)?;
        let key = (row.owner_id, row.lang_id.clone());

        let stored_version = rows.get(&key).map(|stored| stored.version).unwrap_or(0);
        if stored_version != row.version {
            return Err(StoreError::Conflict {
                owner_id: row.owner_id,
                lang_id: row.lang_id.clone(),
            });
        }

        let mut saved = row.clone();
        saved.version = row.version + 1;
        rows.insert(key, saved.clone());
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== TranslationRow Tests ====================

    #[test]
    fn test_new_row_is_unsaved() {
        let row = TranslationRow::new(42, "en");
        assert_eq!(row.owner_id, 42);
        assert_eq!(row.lang_id, "en");
        assert!(row.values.is_empty());
        assert!(row.is_new());
    }

    #[test]
    fn test_row_set_and_get() {
        let mut row = TranslationRow::new(1, "fr").with_value("title", "Salut");
        assert_eq!(row.get("title"), Some("Salut"));
        assert_eq!(row.get("text"), None);

        row.set("title", "Bonjour");
        assert_eq!(row.get("title"), Some("Bonjour"));
    }

    // ==================== MemoryTranslationStore Tests ====================

    #[test]
    fn test_empty_store() {
        let store = MemoryTranslationStore::new();
        assert!(store.is_empty().unwrap());
        assert!(store.find_rows_by_owner(1).unwrap().is_empty());
    }

    #[test]
    fn test_save_new_row_assigns_version() {
        let store = MemoryTranslationStore::new();
        let saved = store
            .save(&TranslationRow::new(1, "en").with_value("title", "Hi"))
            .expect("Should save");

        assert_eq!(saved.version, 1);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_find_rows_by_owner_only_returns_owner_rows() {
        let store = MemoryTranslationStore::new();
        store.save(&TranslationRow::new(1, "en")).unwrap();
        store.save(&TranslationRow::new(1, "fr")).unwrap();
        store.save(&TranslationRow::new(2, "en")).unwrap();
        store.save(&TranslationRow::new(0, "en")).unwrap();

        let rows = store.find_rows_by_owner(1).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.owner_id == 1));
    }

    #[test]
    fn test_update_bumps_version() {
        let store = MemoryTranslationStore::new();
        let mut saved = store.save(&TranslationRow::new(1, "en")).unwrap();
        saved.set("title", "Updated");

        let updated = store.save(&saved).expect("Should update");
        assert_eq!(updated.version, 2);
        assert_eq!(store.find_rows_by_owner(1).unwrap()[0].get("title"), Some("Updated"));
    }

    #[test]
    fn test_inserting_existing_row_conflicts() {
        let store = MemoryTranslationStore::new();
        store.save(&TranslationRow::new(1, "en")).unwrap();

        let result = store.save(&TranslationRow::new(1, "en"));
        assert!(matches!(result, Err(StoreError::Conflict { owner_id: 1, .. })));
    }

    #[test]
    fn test_stale_version_conflicts() {
        let store = MemoryTranslationStore::new();
        let first = store.save(&TranslationRow::new(1, "en")).unwrap();
        store.save(&first).unwrap();

        // `first` still carries version 1, the store is at version 2
        let result = store.save(&first);
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[test]
    fn test_store_through_reference_and_arc() {
        let store = Arc::new(MemoryTranslationStore::new());
        let by_ref: &MemoryTranslationStore = &store;

        by_ref.save(&TranslationRow::new(3, "en")).unwrap();
        assert_eq!(store.find_rows_by_owner(3).unwrap().len(), 1);
    }
}
