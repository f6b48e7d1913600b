//! Utility functions and types.

use std::fmt::Debug;

/// Strings shorter than this are hidden entirely.
const REDACT_MIN_VISIBLE_LEN: usize = 12;

/// Redacts a secret for `Debug` output.
///
/// - Empty input is shown as `EMPTY`.
/// - Input shorter than 12 characters is replaced by `***`.
/// - Otherwise only the first three and the last three characters are kept.
///
/// This keeps access keys distinguishable in logs without leaking them.
pub struct Redact<'a>(&'a str);

impl<'a> From<&'a str> for Redact<'a> {
    fn from(value: &'a str) -> Self {
        Redact(value)
    }
}

impl<'a> From<&'a String> for Redact<'a> {
    fn from(value: &'a String) -> Self {
        Redact(value.as_str())
    }
}

impl<'a> From<&'a Option<String>> for Redact<'a> {
    fn from(value: &'a Option<String>) -> Self {
        Redact(value.as_deref().unwrap_or_default())
    }
}

impl Debug for Redact<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.0;
        if s.is_empty() {
            return f.write_str("EMPTY");
        }
        if s.len() < REDACT_MIN_VISIBLE_LEN || !s.is_ascii() {
            return f.write_str("***");
        }

        write!(f, "{}***{}", &s[..3], &s[s.len() - 3..])
    }
}
