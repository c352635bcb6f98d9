//! Datetime naming tokens.
//!
//! Collection files are named `<date>[ time][offset] <description>.<ext>`. When a
//! description is edited on the primary, the token is the only thing still linking
//! the new name to the old backup file. Patterns are tried in order and the first
//! match wins; the token includes the separating space.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TOKEN_PATTERNS: Vec<Regex> = [
        // date time.fraction offset
        r"^\d{4}-\d{2}-\d{2}[ _]\d{2}[-_]\d{2}[-_]\d{2}\.\d{3,6}[\+-]\d{4} ",
        // date time.fraction
        r"^\d{4}-\d{2}-\d{2}[ _]\d{2}[-_]\d{2}[-_]\d{2}\.\d{3,6} ",
        // date time offset
        r"^\d{4}-\d{2}-\d{2}[ _]\d{2}[-_]\d{2}[-_]\d{2}[\+-]\d{4} ",
        // date time
        r"^\d{4}-\d{2}-\d{2}[ _]\d{2}[-_]\d{2}[-_]\d{2} ",
        // date hour-minute offset
        r"^\d{4}-\d{2}-\d{2}[ _]\d{2}[-_]\d{2}[\+-]\d{4} ",
        // date hour-minute
        r"^\d{4}-\d{2}-\d{2}[ _]\d{2}[-_]\d{2} ",
        // date
        r"^\d{4}-\d{2}-\d{2} ",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("token pattern is valid"))
    .collect();
}

/// Returns the leading datetime token of `file_name`, if any.
pub fn naming_token(file_name: &str) -> Option<&str> {
    TOKEN_PATTERNS
        .iter()
        .find_map(|pattern| pattern.find(file_name))
        .map(|m| m.as_str())
}
