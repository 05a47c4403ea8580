//! Composable filter criteria over an owner table and its translation rows.
//!
//! A `Criteria` is a plain value: hosts build their own conditions, the
//! overlay merges its translation join and substring conditions into it, and
//! the result is rendered to SQL (`to_sql`) or evaluated in memory (`matches`).

use crate::config::is_identifier;
use crate::error::{OverlayError, Result};
use crate::store::TranslationRow;
use std::collections::BTreeMap;

/// Alias of the owner table in rendered SQL.
pub const OWNER_ALIAS: &str = "t";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    /// A column of the owner table (`t.<name>`)
    Owner(String),
    /// A translated attribute of a joined translation row (`<alias>.<attribute>`)
    Joined { alias: String, attribute: String },
}

impl Column {
    pub fn owner(name: &str) -> Self {
        Column::Owner(name.to_string())
    }

    pub fn joined(alias: &str, attribute: &str) -> Self {
        Column::Joined {
            alias: alias.to_string(),
            attribute: attribute.to_string(),
        }
    }

    fn to_sql(&self) -> Result<String> {
        let (alias, name) = match self {
            Column::Owner(name) => (OWNER_ALIAS, name.as_str()),
            Column::Joined { alias, attribute } => (alias.as_str(), attribute.as_str()),
        };
        ensure_identifier(alias)?;
        ensure_identifier(name)?;
        Ok(format!("{}.{}", alias, name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    /// Case-insensitive (ASCII) substring match, like SQLite's `LIKE`
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub column: Column,
    pub operator: Operator,
    pub value: String,
}

/// Inner join of the translation row for one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub alias: String,
    pub lang_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    pub joins: Vec<Join>,
    pub conditions: Vec<Condition>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a comparison unless `value` is empty.
    ///
    /// `partial` selects a substring match instead of equality.
    pub fn compare(&mut self, column: Column, value: &str, partial: bool) -> &mut Self {
        if value.is_empty() {
            return self;
        }
        let operator = if partial {
            Operator::Contains
        } else {
            Operator::Equals
        };
        self.add_condition(Condition {
            column,
            operator,
            value: value.to_string(),
        })
    }

    pub fn add_condition(&mut self, condition: Condition) -> &mut Self {
        self.conditions.push(condition);
        self
    }

    /// Add a translation join. Joining an alias twice in the same language
    /// is a no-op; joining it in a different language fails, since both
    /// join conditions would have to hold at once.
    pub fn join(&mut self, alias: &str, lang_id: &str) -> Result<&mut Self> {
        if self.ensure_joinable(alias, lang_id)? {
            self.joins.push(Join {
                alias: alias.to_string(),
                lang_id: lang_id.to_string(),
            });
        }
        Ok(self)
    }

    /// Merge another criteria into this one, keeping existing joins and
    /// conditions first. Nothing is merged when a join conflicts.
    pub fn merge_with(&mut self, other: Criteria) -> Result<&mut Self> {
        for join in &other.joins {
            self.ensure_joinable(&join.alias, &join.lang_id)?;
        }
        for join in &other.joins {
            self.join(&join.alias, &join.lang_id)?;
        }
        self.conditions.extend(other.conditions);
        Ok(self)
    }

    /// `true` when the alias still has to be joined, `false` when it is
    /// already joined in the same language.
    fn ensure_joinable(&self, alias: &str, lang_id: &str) -> Result<bool> {
        match self.joins.iter().find(|join| join.alias == alias) {
            None => Ok(true),
            Some(existing) if existing.lang_id == lang_id => Ok(false),
            Some(existing) => Err(OverlayError::Configuration(format!(
                "alias '{}' is already joined for language '{}', cannot rejoin it for '{}'",
                alias, existing.lang_id, lang_id
            ))),
        }
    }

    /// Render a query returning the matching owner ids.
    ///
    /// Parameters are positional: join languages first, then condition values.
    pub fn to_sql(&self, owner_table: &str, translation_table: &str) -> Result<(String, Vec<String>)> {
        ensure_identifier(owner_table)?;
        ensure_identifier(translation_table)?;

        let mut sql = format!(
            "SELECT DISTINCT {alias}.id FROM {owner} {alias}",
            alias = OWNER_ALIAS,
            owner = owner_table
        );
        let mut params = Vec::new();

        for join in &self.joins {
            ensure_identifier(&join.alias)?;
            sql.push_str(&format!(
                " INNER JOIN {table} {join} ON {join}.owner_id = {owner}.id AND {join}.lang_id = ?",
                table = translation_table,
                join = join.alias,
                owner = OWNER_ALIAS
            ));
            params.push(join.lang_id.clone());
        }

        let mut clauses = Vec::with_capacity(self.conditions.len());
        for condition in &self.conditions {
            let column = condition.column.to_sql()?;
            match condition.operator {
                Operator::Equals => {
                    clauses.push(format!("{} = ?", column));
                    params.push(condition.value.clone());
                }
                Operator::Contains => {
                    clauses.push(format!("{} LIKE ? ESCAPE '\\'", column));
                    params.push(format!("%{}%", escape_like(&condition.value)));
                }
            }
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(&format!(" ORDER BY {}.id", OWNER_ALIAS));

        Ok((sql, params))
    }

    /// Evaluate the criteria for one owner.
    ///
    /// `owner` holds the owner's column values, `contents` all of its
    /// translation rows. A join without a row in its language excludes the
    /// owner, as the inner join does in SQL.
    pub fn matches(&self, owner: &BTreeMap<String, String>, contents: &[TranslationRow]) -> bool {
        let mut joined = BTreeMap::new();
        for join in &self.joins {
            match contents.iter().find(|row| row.lang_id == join.lang_id) {
                Some(row) => {
                    joined.insert(join.alias.as_str(), row);
                }
                None => return false,
            }
        }

        self.conditions.iter().all(|condition| {
            let actual = match &condition.column {
                Column::Owner(name) => owner.get(name).map(String::as_str),
                Column::Joined { alias, attribute } => joined
                    .get(alias.as_str())
                    .map(|row| row.get(attribute).unwrap_or("")),
            };

            match (actual, condition.operator) {
                (None, _) => false,
                (Some(actual), Operator::Equals) => actual == condition.value,
                (Some(actual), Operator::Contains) => actual
                    .to_ascii_lowercase()
                    .contains(&condition.value.to_ascii_lowercase()),
            }
        })
    }
}

fn ensure_identifier(name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(OverlayError::Configuration(format!(
            "'{}' is not a valid SQL identifier",
            name
        )))
    }
}

/// Escape `LIKE` wildcards so the value matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    // ==================== Builder Tests ====================

    #[test]
    fn test_compare_skips_empty_value() {
        let mut criteria = Criteria::new();
        criteria.compare(Column::owner("id"), "", false);
        assert!(criteria.conditions.is_empty());
    }

    #[test]
    fn test_compare_partial_uses_contains() {
        let mut criteria = Criteria::new();
        criteria
            .compare(Column::owner("status"), "draft", false)
            .compare(Column::joined("contents", "title"), "news", true);

        assert_eq!(criteria.conditions.len(), 2);
        assert_eq!(criteria.conditions[0].operator, Operator::Equals);
        assert_eq!(criteria.conditions[1].operator, Operator::Contains);
    }

    #[test]
    fn test_join_is_not_duplicated() {
        let mut criteria = Criteria::new();
        criteria.join("contents", "en").unwrap().join("contents", "en").unwrap();

        assert_eq!(criteria.joins.len(), 1);
        assert_eq!(criteria.joins[0].lang_id, "en");
    }

    #[test]
    fn test_rejoin_in_other_language_fails() {
        let mut criteria = Criteria::new();
        criteria.join("contents", "en").unwrap();

        let result = criteria.join("contents", "fr");
        assert!(matches!(result, Err(OverlayError::Configuration(_))));
        assert_eq!(criteria.joins, vec![Join {
            alias: "contents".to_string(),
            lang_id: "en".to_string(),
        }]);
    }

    #[test]
    fn test_merge_conflicting_join_keeps_base() {
        let mut base = Criteria::new();
        base.join("contents", "en").unwrap();
        base.compare(Column::owner("id"), "5", false);

        let mut extra = Criteria::new();
        extra.join("contents", "fr").unwrap();

        assert!(base.merge_with(extra).is_err());
        assert_eq!(base.joins.len(), 1);
        assert_eq!(base.joins[0].lang_id, "en");
        assert_eq!(base.conditions.len(), 1);
    }

    #[test]
    fn test_merge_keeps_existing_conditions_first() {
        let mut base = Criteria::new();
        base.compare(Column::owner("id"), "5", false);

        let mut extra = Criteria::new();
        extra
            .join("contents", "en")
            .unwrap()
            .compare(Column::joined("contents", "title"), "Hi", true);

        base.merge_with(extra).unwrap();
        assert_eq!(base.joins.len(), 1);
        assert_eq!(base.conditions[0].column, Column::owner("id"));
        assert_eq!(base.conditions[1].column, Column::joined("contents", "title"));
    }

    // ==================== SQL Rendering Tests ====================

    #[test]
    fn test_to_sql_without_conditions() {
        let (sql, params) = Criteria::new().to_sql("posts", "post_lang").unwrap();
        assert_eq!(sql, "SELECT DISTINCT t.id FROM posts t ORDER BY t.id");
        assert!(params.is_empty());
    }

    #[test]
    fn test_to_sql_with_join_and_conditions() {
        let mut criteria = Criteria::new();
        criteria
            .compare(Column::owner("status"), "published", false)
            .join("contents", "fr")
            .unwrap()
            .compare(Column::joined("contents", "title"), "50%", true);

        let (sql, params) = criteria.to_sql("posts", "post_lang").unwrap();
        assert_eq!(
            sql,
            "SELECT DISTINCT t.id FROM posts t \
             INNER JOIN post_lang contents ON contents.owner_id = t.id AND contents.lang_id = ? \
             WHERE t.status = ? AND contents.title LIKE ? ESCAPE '\\' ORDER BY t.id"
        );
        assert_eq!(params, vec!["fr", "published", "%50\\%%"]);
    }

    #[test]
    fn test_to_sql_rejects_bad_identifiers() {
        let mut criteria = Criteria::new();
        criteria.compare(Column::owner("id; DROP TABLE posts"), "1", false);
        assert!(criteria.to_sql("posts", "post_lang").is_err());
        assert!(Criteria::new().to_sql("posts t,", "post_lang").is_err());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a_b%c\\d"), "a\\_b\\%c\\\\d");
        assert_eq!(escape_like("plain"), "plain");
    }

    // ==================== In-memory Evaluation Tests ====================

    #[test]
    fn test_matches_without_conditions() {
        assert!(Criteria::new().matches(&owner(&[]), &[]));
    }

    #[test]
    fn test_matches_requires_joined_language_row() {
        let mut criteria = Criteria::new();
        criteria.join("contents", "fr").unwrap();

        let rows = vec![TranslationRow::new(1, "en").with_value("title", "Hi")];
        assert!(!criteria.matches(&owner(&[]), &rows));
    }

    #[test]
    fn test_matches_substring_on_joined_language_only() {
        let mut criteria = Criteria::new();
        criteria
            .join("contents", "fr")
            .unwrap()
            .compare(Column::joined("contents", "title"), "sal", true);

        let rows = vec![
            TranslationRow::new(1, "en").with_value("title", "Hi"),
            TranslationRow::new(1, "fr").with_value("title", "Salut"),
        ];
        assert!(criteria.matches(&owner(&[]), &rows));

        let mut english = Criteria::new();
        english
            .join("contents", "en")
            .unwrap()
            .compare(Column::joined("contents", "title"), "sal", true);
        assert!(!english.matches(&owner(&[]), &rows));
    }

    #[test]
    fn test_matches_owner_equality() {
        let mut criteria = Criteria::new();
        criteria.compare(Column::owner("status"), "draft", false);

        assert!(criteria.matches(&owner(&[("status", "draft")]), &[]));
        assert!(!criteria.matches(&owner(&[("status", "published")]), &[]));
        assert!(!criteria.matches(&owner(&[]), &[]));
    }

    #[test]
    fn test_matches_unjoined_alias_fails() {
        let mut criteria = Criteria::new();
        criteria.compare(Column::joined("contents", "title"), "Hi", true);

        let rows = vec![TranslationRow::new(1, "en").with_value("title", "Hi")];
        assert!(!criteria.matches(&owner(&[]), &rows));
    }
}
