//! Language type: validated language code.
//!
//! Codes are what the translation table stores in `lang_id` and what the
//! overlay appends to attribute names to build shadow keys (`title_en`).

use crate::error::{OverlayError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

static CODE_REGEX: OnceLock<Regex> = OnceLock::new();

/// A validated language code.
///
/// Accepts ISO 639 style codes with optional region or script subtags,
/// e.g. "en", "uk", "pt_BR", "zh-Hant".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language {
    code: String,
}

impl Language {
    /// Create a Language from a code string.
    ///
    /// # Returns
    /// * `Ok(Language)` if the code is well formed
    /// * `Err(OverlayError::Configuration)` otherwise
    pub fn parse(code: &str) -> Result<Language> {
        let regex = CODE_REGEX.get_or_init(|| {
            Regex::new(r"^[a-z]{2,3}(?:[-_][A-Za-z0-9]{2,8})*$").expect("language code regex is valid")
        });

        let code = code.trim();
        if !regex.is_match(code) {
            return Err(OverlayError::Configuration(format!(
                "invalid language code: '{}'",
                code
            )));
        }

        Ok(Language {
            code: code.to_string(),
        })
    }

    /// Get the language code (e.g., "en", "pt_BR").
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

impl AsRef<str> for Language {
    fn as_ref(&self) -> &str {
        &self.code
    }
}

impl TryFrom<String> for Language {
    type Error = OverlayError;

    fn try_from(value: String) -> Result<Self> {
        Language::parse(&value)
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.code
    }
}

impl PartialEq<str> for Language {
    fn eq(&self, other: &str) -> bool {
        self.code == other
    }
}

impl PartialEq<&str> for Language {
    fn eq(&self, other: &&str) -> bool {
        self.code == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== parse Tests ====================

    #[test]
    fn test_parse_two_letter_code() {
        let language = Language::parse("en").expect("Should parse");
        assert_eq!(language.code(), "en");
    }

    #[test]
    fn test_parse_three_letter_code() {
        let language = Language::parse("ukr").expect("Should parse");
        assert_eq!(language.code(), "ukr");
    }

    #[test]
    fn test_parse_region_subtag() {
        assert_eq!(Language::parse("pt_BR").unwrap().code(), "pt_BR");
        assert_eq!(Language::parse("zh-Hant").unwrap().code(), "zh-Hant");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(Language::parse(" fr ").unwrap().code(), "fr");
    }

    #[test]
    fn test_parse_empty() {
        let result = Language::parse("");
        assert!(matches!(result, Err(OverlayError::Configuration(_))));
    }

    #[test]
    fn test_parse_rejects_uppercase_primary() {
        assert!(Language::parse("EN").is_err());
    }

    #[test]
    fn test_parse_rejects_sql_fragments() {
        assert!(Language::parse("en' OR 1=1").is_err());
    }

    // ==================== Trait Tests ====================

    #[test]
    fn test_display() {
        let language = Language::parse("fr").unwrap();
        assert_eq!(language.to_string(), "fr");
    }

    #[test]
    fn test_str_equality() {
        let language = Language::parse("fr").unwrap();
        assert!(language == "fr");
        assert!(language != "en");
    }

    #[test]
    fn test_serde_roundtrip_rejects_invalid() {
        let language: Language = serde_json::from_str("\"uk\"").expect("Should deserialize");
        assert_eq!(language.code(), "uk");
        assert_eq!(serde_json::to_string(&language).unwrap(), "\"uk\"");

        let invalid: std::result::Result<Language, _> = serde_json::from_str("\"Not A Code\"");
        assert!(invalid.is_err());
    }
}
