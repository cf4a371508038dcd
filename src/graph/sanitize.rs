//! Schema-token guard for graph queries.
//!
//! Cypher cannot bind labels or relationship types as parameters, so they end
//! up interpolated into the statement text. Everything that reaches a query
//! string in that position goes through [`sanitize`] first.

/// Normalize `candidate` (trim, inner spaces → `_`) and return it if it is on
/// the allow-list (when one is given) and is a plain identifier
/// (`[A-Za-z_][A-Za-z0-9_]*`). Otherwise return `fallback`. Never fails.
pub fn sanitize(candidate: &str, fallback: &str, allowed: Option<&[&str]>) -> String {
    let normalized = candidate.trim().replace(' ', "_");

    if let Some(list) = allowed {
        if !list.contains(&normalized.as_str()) {
            return fallback.to_string();
        }
    }
    if !is_identifier(&normalized) {
        return fallback.to_string();
    }
    normalized
}

/// `true` for a leading ASCII letter or underscore followed by ASCII
/// letters, digits or underscores.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALLOWED: &[&str] = &["Person", "Concept"];

    #[test]
    fn injection_attempt_falls_back() {
        assert_eq!(sanitize("DROP TABLE", "Concept", Some(ALLOWED)), "Concept");
    }

    #[test]
    fn allowed_label_passes() {
        assert_eq!(sanitize("Person", "Concept", Some(ALLOWED)), "Person");
        assert_eq!(sanitize("  Person ", "Concept", Some(ALLOWED)), "Person");
    }

    #[test]
    fn spaces_become_underscores() {
        assert_eq!(sanitize("depends on", "RELATES_TO", None), "depends_on");
        assert_eq!(sanitize(" PART OF ", "RELATES_TO", Some(&["PART_OF"])), "PART_OF");
    }

    #[test]
    fn pattern_checked_without_allow_list() {
        assert_eq!(sanitize("a}-[:X]->(b", "RELATES_TO", None), "RELATES_TO");
        assert_eq!(sanitize("9lives", "Concept", None), "Concept");
        assert_eq!(sanitize("", "Concept", None), "Concept");
        assert_eq!(sanitize("_private", "Concept", None), "_private");
    }

    #[test]
    fn allow_list_is_case_sensitive() {
        assert_eq!(sanitize("person", "Concept", Some(ALLOWED)), "Concept");
    }

    #[test]
    fn identifier_rules() {
        assert!(is_identifier("USES"));
        assert!(is_identifier("a1_b"));
        assert!(!is_identifier("1a"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier("Société"));
    }
}
