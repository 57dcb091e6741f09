//! FILENAME: core/tko-query/src/sql.rs
//! PURPOSE: String helpers for building SQL condition fragments.
//! CONTEXT: Every condition that leaves this crate is assembled from these
//! helpers, so quoting and parenthesization stay consistent between the
//! filter builder, header fields, and test sets.

/// Sentinel used by the backend for NULL header values.
pub const JSON_NULL: &str = "<null>";

/// Escapes a literal for embedding inside a single-quoted SQL string.
pub fn escape_sql_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// `field = 'value'`, or `field IS NULL` for the null sentinel.
pub fn equality_string(field: &str, value: &str) -> String {
    if value == JSON_NULL {
        return format!("{} IS NULL", field);
    }
    format!("{} = '{}'", field, escape_sql_value(value))
}

/// Joins the non-empty pieces with `joiner`, skipping blanks.
pub fn join_strings<S: AsRef<str>>(joiner: &str, pieces: &[S]) -> String {
    pieces
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(joiner)
}

/// Wraps each non-empty piece in parentheses and joins them.
///
/// Empty pieces are dropped entirely, so `join_with_parens(" AND ", &["a", ""])`
/// is `"(a)"`, never `"(a) AND ()"`. With no non-empty pieces the result is
/// the empty string.
pub fn join_with_parens<S: AsRef<str>>(joiner: &str, pieces: &[S]) -> String {
    let wrapped: Vec<String> = pieces
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .map(|p| format!("({})", p))
        .collect();
    wrapped.join(joiner)
}

/// Intersects an existing condition with a new fragment.
///
/// Refining with an empty fragment returns `existing` untouched.
pub fn refine(existing: &str, fragment: &str) -> String {
    if fragment.trim().is_empty() {
        return existing.to_string();
    }
    join_with_parens(" AND ", &[existing, fragment])
}

const HTML_ESCAPES: [(&str, &str); 5] = [
    ("&", "&amp;"),
    (">", "&gt;"),
    ("<", "&lt;"),
    ("\"", "&quot;"),
    ("'", "&apos;"),
];

/// HTML-escapes text for display in a rendered cell.
pub fn html_escape(text: &str) -> String {
    let mut out = text.to_string();
    for (raw, escaped) in HTML_ESCAPES.iter() {
        out = out.replace(raw, escaped);
    }
    out
}

/// Inverse of [`html_escape`]. Mappings are undone in reverse order.
pub fn html_unescape(text: &str) -> String {
    let mut out = text.to_string();
    for (raw, escaped) in HTML_ESCAPES.iter().rev() {
        out = out.replace(escaped, raw);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_quotes_and_backslashes() {
        assert_eq!(escape_sql_value("it's"), "it\\'s");
        assert_eq!(escape_sql_value("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_equality_string_null_sentinel() {
        assert_eq!(equality_string("hostname", JSON_NULL), "hostname IS NULL");
        assert_eq!(equality_string("hostname", "h1"), "hostname = 'h1'");
    }

    #[test]
    fn test_join_with_parens_drops_blanks() {
        assert_eq!(join_with_parens(" AND ", &["a", "", "b"]), "(a) AND (b)");
        assert_eq!(join_with_parens(" AND ", &["", ""]), "");
    }

    #[test]
    fn test_refine_with_empty_fragment_is_unchanged() {
        assert_eq!(refine("platform = 'x86'", ""), "platform = 'x86'");
        assert_eq!(refine("", "a = 1"), "(a = 1)");
        assert_eq!(refine("a = 1", "b = 2"), "(a = 1) AND (b = 2)");
    }

    #[test]
    fn test_html_escape_roundtrip() {
        let text = "<a href='x'>&</a>";
        assert_eq!(html_unescape(&html_escape(text)), text);
    }
}
