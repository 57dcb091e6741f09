//! FILENAME: core/tko-query/src/history.rs
//! PURPOSE: Flat string key/value history tokens.
//! CONTEXT: Views serialize their state into a flat map for bookmarks and
//! back-button support. Sub-components namespace their keys with a prefix.
//! The only requirement is that a map produced by `add_history_arguments`
//! rebuilds the same state through `handle_history_arguments`.

use std::collections::BTreeMap;

use crate::error::{QueryError, QueryResult};

/// History arguments, ordered so encoded tokens are stable.
pub type HistoryArguments = BTreeMap<String, String>;

/// Returns the value under `key`, inserting `default` first if missing.
pub fn set_default_value(args: &mut HistoryArguments, key: &str, default: &str) -> String {
    args.entry(key.to_string())
        .or_insert_with(|| default.to_string())
        .clone()
}

/// Lenient boolean parse: only a case-insensitive "true" is true.
pub fn parse_bool(value: Option<&String>) -> bool {
    value.map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Encodes arguments as `key=value&...` with percent-encoded components.
pub fn encode_history_token(args: &HistoryArguments) -> String {
    args.iter()
        .map(|(key, value)| {
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Decodes a token produced by [`encode_history_token`].
pub fn decode_history_token(token: &str) -> QueryResult<HistoryArguments> {
    let mut args = HistoryArguments::new();
    for component in token.split('&').filter(|c| !c.is_empty()) {
        let mut parts = component.split('=');
        let key = parts.next().unwrap_or_default();
        let value = parts.next().unwrap_or_default();
        if parts.next().is_some() {
            return Err(QueryError::InvalidHistory(component.to_string()));
        }
        let key = urlencoding::decode(key)
            .map_err(|_| QueryError::InvalidHistory(component.to_string()))?;
        let value = urlencoding::decode(value)
            .map_err(|_| QueryError::InvalidHistory(component.to_string()))?;
        args.insert(key.into_owned(), value.into_owned());
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let mut args = HistoryArguments::new();
        args.insert("condition".into(), "hostname = 'a&b'".into());
        args.insert("row".into(), "kernel,platform".into());
        let token = encode_history_token(&args);
        assert!(!token.contains('\''));
        assert_eq!(decode_history_token(&token).unwrap(), args);
    }

    #[test]
    fn test_token_with_extra_equals_is_rejected() {
        assert!(decode_history_token("a=b=c").is_err());
    }

    #[test]
    fn test_defaults_and_bools() {
        let mut args = HistoryArguments::new();
        assert_eq!(set_default_value(&mut args, "row", "kernel"), "kernel");
        args.insert("show_invalid".into(), "TRUE".into());
        assert!(parse_bool(args.get("show_invalid")));
        assert!(!parse_bool(args.get("missing")));
    }
}
