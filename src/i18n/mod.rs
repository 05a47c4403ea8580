//! Language handling for translated attributes.
//!
//! # Architecture
//!
//! - `language`: validated `Language` code type used by the overlay configuration
//! - `validator`: presence and non-empty checks for submitted shadow values
//!
//! # Example
//!
//! ```rust,ignore
//! use translation_overlay::i18n::Language;
//!
//! let french = Language::parse("fr")?;
//! assert_eq!(french.code(), "fr");
//! ```

mod language;
mod validator;

pub use language::Language;
pub use validator::{SubmissionValidator, ValidationReport};
