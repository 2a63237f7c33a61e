//! Identifier validation for relational destinations.

use crate::error::SinkError;

/// Longest identifier `PostgreSQL` keeps without truncation.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Accept `[A-Za-z_][A-Za-z0-9_]*` up to 63 bytes.
///
/// # Errors
///
/// Returns [`SinkError::InvalidIdentifier`] for anything else.
pub fn validate_identifier(name: &str) -> Result<&str, SinkError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && name.len() <= MAX_IDENTIFIER_LEN {
        Ok(name)
    } else {
        Err(SinkError::InvalidIdentifier(name.to_string()))
    }
}

/// Double-quote a validated identifier.
pub(crate) fn quote(name: &str) -> String {
    format!("\"{name}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        assert!(validate_identifier("searchwords_new_1").is_ok());
        assert!(validate_identifier("_raw").is_ok());
        assert!(validate_identifier("weather_data").is_ok());
    }

    #[test]
    fn rejects_unsafe_names() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1table").is_err());
        assert!(validate_identifier("team-god").is_err());
        assert!(validate_identifier("t; DROP TABLE x").is_err());
        assert!(validate_identifier("x\"y").is_err());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }

    #[test]
    fn quote_wraps_in_double_quotes() {
        assert_eq!(quote("raw"), "\"raw\"");
    }
}
