//! Column-name normalization for keyword columns.

use std::collections::HashSet;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fixed row columns plus the trends partial flag. Keyword columns must not
/// collide with these.
pub const RESERVED_COLUMNS: &[&str] = &[
    "ingestion_timestamp",
    "observation_timestamp",
    "row_id",
    "payload",
    "isPartial",
];

/// Fold a keyword into a warehouse-safe column name.
///
/// NFD-decomposes, drops combining marks and replaces spaces with `_`:
/// `"mössa"` becomes `"mossa"`, `"varm choklad"` becomes `"varm_choklad"`.
#[must_use]
pub fn normalize_column(keyword: &str) -> String {
    keyword
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c == ' ' { '_' } else { c })
        .collect()
}

/// Normalize a keyword set, rejecting names that collide with each other or
/// with [`RESERVED_COLUMNS`].
///
/// # Errors
///
/// Returns a description of the first collision.
pub fn column_names(keywords: &[String]) -> Result<Vec<String>, String> {
    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(keywords.len());
    for keyword in keywords {
        let name = normalize_column(keyword);
        if name.is_empty() {
            return Err(format!("keyword '{keyword}' normalizes to an empty column name"));
        }
        if RESERVED_COLUMNS.contains(&name.as_str()) {
            return Err(format!("keyword '{keyword}' collides with reserved column '{name}'"));
        }
        if !seen.insert(name.clone()) {
            return Err(format!("keyword '{keyword}' duplicates column '{name}'"));
        }
        names.push(name);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strips_swedish_diacritics() {
        assert_eq!(normalize_column("mössa"), "mossa");
        assert_eq!(normalize_column("fläkt"), "flakt");
        assert_eq!(normalize_column("päls"), "pals");
        assert_eq!(normalize_column("solglasögon"), "solglasogon");
        assert_eq!(normalize_column("glögg"), "glogg");
        assert_eq!(normalize_column("Åre"), "Are");
    }

    #[test]
    fn spaces_become_underscores() {
        assert_eq!(normalize_column("varm choklad"), "varm_choklad");
        assert_eq!(normalize_column("earl grey"), "earl_grey");
    }

    #[test]
    fn ascii_passes_through() {
        assert_eq!(normalize_column("mojito"), "mojito");
    }

    #[test]
    fn duplicate_after_normalization_is_rejected() {
        let err = column_names(&["mössa".into(), "mossa".into()]).unwrap_err();
        assert!(err.contains("duplicates"));
    }

    #[test]
    fn reserved_names_are_rejected() {
        assert!(column_names(&["payload".into()]).is_err());
        assert!(column_names(&["isPartial".into()]).is_err());
        assert!(column_names(&[String::new()]).is_err());
    }

    #[test]
    fn column_names_keep_order() {
        let names = column_names(&["varm choklad".into(), "glögg".into(), "chai".into()]).unwrap();
        assert_eq!(names, vec!["varm_choklad", "glogg", "chai"]);
    }

    proptest! {
        #[test]
        fn normalized_names_have_no_spaces_or_marks(keyword in "\\PC{0,24}") {
            let name = normalize_column(&keyword);
            prop_assert!(!name.contains(' '));
            prop_assert!(!name.chars().any(is_combining_mark));
        }

        #[test]
        fn normalization_is_idempotent(keyword in "\\PC{0,24}") {
            let once = normalize_column(&keyword);
            prop_assert_eq!(normalize_column(&once), once.clone());
        }
    }
}
