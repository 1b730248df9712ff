//! Tag name validation.
//!
//! Tags label save points and are shown to users, so names may contain
//! spaces ("Declined restore"). A valid name:
//! - is non-empty and at most 128 characters
//! - has no leading or trailing whitespace
//! - contains no control characters and none of `/`, `\`, `:`, `*`, `?`,
//!   `[`, `~`, `^`
//! - does not contain `..`

use crate::error::{RefError, Result};

/// Characters that are forbidden anywhere in a tag name.
const FORBIDDEN_CHARS: &[char] = &['/', '\\', ':', '*', '?', '[', '~', '^'];

const MAX_LEN: usize = 128;

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidTagName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a tag name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use lochist_refs::names::validate_tag_name;
///
/// assert!(validate_tag_name("project").is_ok());
/// assert!(validate_tag_name("Declined restore").is_ok());
/// assert!(validate_tag_name("").is_err());
/// assert!(validate_tag_name("../escape").is_err());
/// ```
pub fn validate_tag_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "tag name must not be empty"));
    }
    if name.chars().count() > MAX_LEN {
        return Err(invalid(name, format!("longer than {MAX_LEN} characters")));
    }
    if name.trim() != name {
        return Err(invalid(name, "leading or trailing whitespace"));
    }
    if let Some(ch) = name.chars().find(|c| c.is_control()) {
        return Err(invalid(name, format!("contains control character {ch:?}")));
    }
    for ch in FORBIDDEN_CHARS {
        if name.contains(*ch) {
            return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
        }
    }
    if name.contains("..") {
        return Err(invalid(name, "must not contain '..'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_save_point_names() {
        for name in ["project", "Save", "Declined restore", "autosave-2024.01"] {
            assert!(validate_tag_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_bad_names() {
        for name in ["", " padded", "padded ", "a/b", "a\\b", "x..y", "tab\there", "what?"] {
            assert!(validate_tag_name(name).is_err(), "{name:?} should be invalid");
        }
    }

    #[test]
    fn rejects_overlong_names() {
        let name = "x".repeat(MAX_LEN + 1);
        let err = validate_tag_name(&name).unwrap_err();
        assert!(matches!(err, RefError::InvalidTagName { .. }));
    }
}
