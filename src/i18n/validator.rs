//! Submission validation module.
//!
//! Checks that a submitted set of shadow values covers every configured
//! (attribute, language) pair before anything is written to the store.

use crate::overlay::Submission;
use serde::Serialize;
use std::collections::BTreeSet;

/// Validation report containing errors and warnings about a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Shadow keys that were not submitted at all
    pub missing: Vec<String>,

    /// Shadow keys that were submitted blank while values are required
    pub blank: Vec<String>,

    /// Human readable error messages, one per missing or blank key
    pub errors: Vec<String>,

    /// Non-critical findings (e.g. keys the overlay does not know about)
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Create a new empty validation report
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the report has any errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Check if the report has any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Check if the report is clean (no errors or warnings)
    pub fn is_clean(&self) -> bool {
        !self.has_errors() && !self.has_warnings()
    }
}

/// Validator for submitted shadow values.
pub struct SubmissionValidator;

impl SubmissionValidator {
    /// Validate a submission against the expected shadow keys.
    ///
    /// # Arguments
    /// * `expected` - Every shadow key the overlay writes, in configuration order
    /// * `submission` - The submitted values
    /// * `require_non_empty` - Whether blank (whitespace only) values are errors
    pub fn validate<'a, I>(expected: I, submission: &Submission, require_non_empty: bool) -> ValidationReport
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut report = ValidationReport::new();
        let mut known = BTreeSet::new();

        for key in expected {
            known.insert(key);
            match submission.get(key) {
                None => {
                    report.missing.push(key.to_string());
                    report.errors.push(format!("'{}' is missing", key));
                }
                Some(value) if require_non_empty && value.trim().is_empty() => {
                    report.blank.push(key.to_string());
                    report.errors.push(format!("'{}' cannot be blank", key));
                }
                Some(_) => {}
            }
        }

        for key in submission.keys() {
            if !known.contains(key) {
                report
                    .warnings
                    .push(format!("'{}' is not a translated field and was ignored", key));
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(pairs: &[(&str, &str)]) -> Submission {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    // ==================== Presence Tests ====================

    #[test]
    fn test_complete_submission_is_clean() {
        let values = submission(&[("title_en", "Hi"), ("title_fr", "Salut")]);
        let report = SubmissionValidator::validate(["title_en", "title_fr"], &values, false);
        assert!(report.is_clean());
    }

    #[test]
    fn test_missing_key_is_error() {
        let values = submission(&[("title_en", "Hi")]);
        let report = SubmissionValidator::validate(["title_en", "title_fr"], &values, false);

        assert!(report.has_errors());
        assert_eq!(report.missing, vec!["title_fr"]);
        assert!(report.errors[0].contains("title_fr"));
    }

    #[test]
    fn test_missing_keys_keep_expected_order() {
        let values = Submission::new();
        let report = SubmissionValidator::validate(["text_en", "title_en", "title_fr"], &values, false);
        assert_eq!(report.missing, vec!["text_en", "title_en", "title_fr"]);
    }

    // ==================== Blank Value Tests ====================

    #[test]
    fn test_blank_allowed_by_default() {
        let values = submission(&[("title_en", ""), ("title_fr", "  ")]);
        let report = SubmissionValidator::validate(["title_en", "title_fr"], &values, false);
        assert!(!report.has_errors());
    }

    #[test]
    fn test_blank_rejected_when_required() {
        let values = submission(&[("title_en", "Hi"), ("title_fr", "  ")]);
        let report = SubmissionValidator::validate(["title_en", "title_fr"], &values, true);

        assert_eq!(report.blank, vec!["title_fr"]);
        assert!(report.missing.is_empty());
        assert!(report.errors[0].contains("blank"));
    }

    // ==================== Warning Tests ====================

    #[test]
    fn test_unknown_key_is_warning() {
        let values = submission(&[("title_en", "Hi"), ("body_en", "ignored")]);
        let report = SubmissionValidator::validate(["title_en"], &values, false);

        assert!(!report.has_errors());
        assert!(report.has_warnings());
        assert!(report.warnings[0].contains("body_en"));
    }
}
