use crate::config::{is_identifier, RESERVED_COLUMNS};
use crate::criteria::Criteria;
use crate::error::{OverlayError, StoreError};
use crate::store::{OwnerId, TranslationRow, TranslationStore};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// SQLite-backed translation table.
///
/// One table holds every language's row for every owner, with one TEXT
/// column per translatable attribute.
#[derive(Clone)]
pub struct SqliteTranslationStore {
    conn: Arc<Mutex<Connection>>,
    table: String,
    attributes: Vec<String>,
}

impl SqliteTranslationStore {
    /// Open (or create) a database file and make sure the table exists
    pub fn open(database_path: &str, table: &str, attributes: &[String]) -> Result<Self, StoreError> {
        let conn = Connection::open(database_path)?;
        Self::with_connection(conn, table, attributes)
    }

    pub fn open_in_memory(table: &str, attributes: &[String]) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, table, attributes)
    }

    fn with_connection(conn: Connection, table: &str, attributes: &[String]) -> Result<Self, StoreError> {
        if !is_identifier(table) {
            return Err(StoreError::InvalidSchema(format!(
                "'{}' is not a valid table name",
                table
            )));
        }
        for attribute in attributes {
            if !is_identifier(attribute) || RESERVED_COLUMNS.contains(&attribute.as_str()) {
                return Err(StoreError::InvalidSchema(format!(
                    "'{}' cannot be used as a translation column",
                    attribute
                )));
            }
        }

        Self::create_table(&conn, table, attributes)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            table: table.to_string(),
            attributes: attributes.to_vec(),
        })
    }

    /// Create the translation table, or bring an existing one up to date.
    ///
    /// An existing table must already have `owner_id` and `lang_id`. Missing
    /// attribute and bookkeeping columns are added and the (owner, language)
    /// unique index is created if absent.
    fn create_table(conn: &Connection, table: &str, attributes: &[String]) -> Result<(), StoreError> {
        let existing = Self::existing_columns(conn, table)?;

        if existing.is_empty() {
            let attribute_columns: String = attributes
                .iter()
                .map(|attribute| format!("{} TEXT NOT NULL DEFAULT '',\n", attribute))
                .collect();

            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {table} (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        owner_id INTEGER NOT NULL,
                        lang_id TEXT NOT NULL,
                        {attribute_columns}
                        version INTEGER NOT NULL DEFAULT 1,
                        updated_at TEXT NOT NULL,
                        UNIQUE (owner_id, lang_id)
                    )"
                ),
                [],
            )?;
            info!(table, "Created translation table");
            return Ok(());
        }

        for required in ["owner_id", "lang_id"] {
            if !existing.contains(required) {
                return Err(StoreError::InvalidSchema(format!(
                    "table {} has no {} column",
                    table, required
                )));
            }
        }

        let bookkeeping = [
            ("version", "INTEGER NOT NULL DEFAULT 1"),
            ("updated_at", "TEXT NOT NULL DEFAULT ''"),
        ];
        let missing = attributes
            .iter()
            .map(|attribute| (attribute.as_str(), "TEXT NOT NULL DEFAULT ''"))
            .chain(bookkeeping)
            .filter(|(column, _)| !existing.contains(*column));

        for (column, definition) in missing {
            conn.execute(
                &format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, definition),
                [],
            )?;
            info!(table, column, "Added translation column");
        }

        let index_sql = format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {table}_owner_lang ON {table} (owner_id, lang_id)"
        );
        match conn.execute(&index_sql, []) {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::InvalidSchema(format!(
                    "table {} has more than one row for the same owner and language",
                    table
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn existing_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>, StoreError> {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
        let columns = stmt
            .query_map(params![table], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(columns)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Get count of stored translation rows
    pub fn count_rows(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }

    /// Run a closure against the underlying connection (e.g. to manage the
    /// owner table living in the same database).
    pub fn execute_with<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.lock()?;
        Ok(f(&conn)?)
    }

    /// Ids of owners in `owner_table` matching the criteria
    pub fn find_owner_ids(&self, criteria: &Criteria, owner_table: &str) -> Result<Vec<OwnerId>, OverlayError> {
        let (sql, sql_params) = criteria.to_sql(owner_table, &self.table)?;
        debug!(%sql, "Searching owners");

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql).map_err(StoreError::from)?;
        let ids = stmt
            .query_map(params_from_iter(sql_params.iter()), |row| row.get::<_, OwnerId>(0))
            .map_err(StoreError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)?;

        Ok(ids)
    }

    fn check_attributes(&self, row: &TranslationRow) -> Result<(), StoreError> {
        match row
            .values
            .keys()
            .find(|attribute| !self.attributes.contains(attribute))
        {
            Some(unknown) => Err(StoreError::InvalidRow(format!(
                "'{}' is not a column of {}",
                unknown, self.table
            ))),
            None => Ok(()),
        }
    }

    fn insert(&self, conn: &Connection, row: &TranslationRow) -> Result<TranslationRow, StoreError> {
        let columns: Vec<&str> = self.attributes.iter().map(String::as_str).collect();
        let placeholders = vec!["?"; columns.len() + 3].join(", ");
        let sql = format!(
            "INSERT INTO {} (owner_id, lang_id, {}updated_at) VALUES ({})",
            self.table,
            columns.iter().map(|c| format!("{}, ", c)).collect::<String>(),
            placeholders
        );

        let mut values: Vec<Value> = vec![Value::Integer(row.owner_id), Value::Text(row.lang_id.clone())];
        values.extend(
            self.attributes
                .iter()
                .map(|attribute| Value::Text(row.get(attribute).unwrap_or("").to_string())),
        );
        values.push(Value::Text(Utc::now().to_rfc3339()));

        match conn.execute(&sql, params_from_iter(values.iter())) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(StoreError::Conflict {
                    owner_id: row.owner_id,
                    lang_id: row.lang_id.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        let mut saved = row.clone();
        saved.version = 1;
        Ok(saved)
    }

    fn update(&self, conn: &Connection, row: &TranslationRow) -> Result<TranslationRow, StoreError> {
        let assignments: String = self
            .attributes
            .iter()
            .map(|attribute| format!("{} = ?, ", attribute))
            .collect();
        let sql = format!(
            "UPDATE {} SET {}version = version + 1, updated_at = ? \
             WHERE owner_id = ? AND lang_id = ? AND version = ?",
            self.table, assignments
        );

        let mut values: Vec<Value> = self
            .attributes
            .iter()
            .map(|attribute| Value::Text(row.get(attribute).unwrap_or("").to_string()))
            .collect();
        values.push(Value::Text(Utc::now().to_rfc3339()));
        values.push(Value::Integer(row.owner_id));
        values.push(Value::Text(row.lang_id.clone()));
        values.push(Value::Integer(row.version));

        let rows_affected = conn.execute(&sql, params_from_iter(values.iter()))?;
        if rows_affected == 0 {
            return Err(StoreError::Conflict {
                owner_id: row.owner_id,
                lang_id: row.lang_id.clone(),
            });
        }

        let mut saved = row.clone();
        saved.version = row.version + 1;
        Ok(saved)
    }
}

impl TranslationStore for SqliteTranslationStore {
    fn find_rows_by_owner(&self, owner_id: OwnerId) -> Result<Vec<TranslationRow>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT owner_id, lang_id, version{} FROM {} WHERE owner_id = ?1 ORDER BY lang_id",
            self.attributes
                .iter()
                .map(|attribute| format!(", {}", attribute))
                .collect::<String>(),
            self.table
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![owner_id], |row| {
                let mut translation = TranslationRow::new(row.get(0)?, &row.get::<_, String>(1)?);
                translation.version = row.get(2)?;
                for (i, attribute) in self.attributes.iter().enumerate() {
                    let value: Option<String> = row.get(3 + i)?;
                    translation.set(attribute, value.as_deref().unwrap_or(""));
                }
                Ok(translation)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn save(&self, row: &TranslationRow) -> Result<TranslationRow, StoreError> {
        self.check_attributes(row)?;
        let conn = self.lock()?;

        if row.is_new() {
            self.insert(&conn, row)
        } else {
            self.update(&conn, row)
        }
    }
}
