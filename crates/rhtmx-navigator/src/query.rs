// File: src/query.rs
// Purpose: Search string parsing into an insertion-ordered query map

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::borrow::Cow;

/// Value of a single query key
///
/// A key seen once holds a single string; any repeat turns it into a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    Multiple(Vec<String>),
}

impl QueryValue {
    /// First value for this key
    pub fn first(&self) -> &str {
        match self {
            QueryValue::Single(value) => value,
            QueryValue::Multiple(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// All values for this key, in order of appearance
    pub fn all(&self) -> Vec<&str> {
        match self {
            QueryValue::Single(value) => vec![value.as_str()],
            QueryValue::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            QueryValue::Single(existing) => {
                let first = std::mem::take(existing);
                *self = QueryValue::Multiple(vec![first, value]);
            }
            QueryValue::Multiple(values) => values.push(value),
        }
    }
}

/// Decoded query parameters, kept in first-seen key order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    entries: Vec<(String, QueryValue)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a value, converting the key to a list on repeats
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, existing)) => existing.push(value),
            None => self.entries.push((key, QueryValue::Single(value))),
        }
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Parses a URL search string into a [`Query`]
///
/// Accepts the string with or without its leading `?`. Each `&`-separated
/// piece is percent-decoded as a whole, then split on the first `=`; `+` in
/// the value becomes a space. Nothing here fails: pieces that do not decode
/// are used as-is and a piece without `=` gets an empty value.
///
/// # Examples
///
/// ```
/// use rhtmx_navigator::query::{extract_query, QueryValue};
///
/// let query = extract_query("?a=1&a=2&b=hello+world");
/// assert_eq!(
///     query.get("a"),
///     Some(&QueryValue::Multiple(vec!["1".to_string(), "2".to_string()]))
/// );
/// assert_eq!(query.get("b").map(|v| v.first()), Some("hello world"));
/// assert!(extract_query("").is_empty());
/// ```
pub fn extract_query(search: &str) -> Query {
    let search = search.strip_prefix('?').unwrap_or(search);
    let mut query = Query::new();

    if search.is_empty() {
        return query;
    }

    for piece in search.split('&') {
        let decoded = urlencoding::decode(piece).unwrap_or(Cow::Borrowed(piece));
        let (key, value) = decoded.split_once('=').unwrap_or((decoded.as_ref(), ""));
        query.append(key, value.replace('+', " "));
    }

    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_search_yields_empty_query() {
        assert!(extract_query("").is_empty());
        assert!(extract_query("?").is_empty());
    }

    #[test]
    fn test_repeated_keys_become_lists() {
        let query = extract_query("a=1&a=2");
        assert_eq!(
            query.get("a"),
            Some(&QueryValue::Multiple(vec!["1".into(), "2".into()]))
        );

        let query = extract_query("?a=1&a=2&a=3");
        assert_eq!(query.get("a").map(QueryValue::all), Some(vec!["1", "2", "3"]));
    }

    #[test]
    fn test_key_order_is_preserved() {
        let query = extract_query("?z=1&a=2&m=3&a=4");
        assert_eq!(query.keys().collect::<Vec<_>>(), vec!["z", "a", "m"]);
    }

    #[test]
    fn test_percent_decoding_and_plus() {
        let query = extract_query("?q=caf%C3%A9+au+lait&tag=a%26b");
        assert_eq!(query.get("q").map(QueryValue::first), Some("café au lait"));
        // The whole piece is decoded before splitting, so an encoded `&`
        // stays inside the value.
        assert_eq!(query.get("tag").map(QueryValue::first), Some("a&b"));
    }

    #[test]
    fn test_only_first_equals_splits() {
        let query = extract_query("?expr=a=b");
        assert_eq!(query.get("expr").map(QueryValue::first), Some("a=b"));
    }

    #[test]
    fn test_malformed_pieces_degrade() {
        let query = extract_query("?flag&bad=%E0%A4%A");
        assert_eq!(query.get("flag"), Some(&QueryValue::Single(String::new())));
        assert_eq!(query.get("bad").map(QueryValue::first), Some("%E0%A4%A"));
    }

    #[test]
    fn test_serializes_as_ordered_map() {
        let query = extract_query("?b=1&a=x&a=y");
        let json = serde_json::to_string(&query).unwrap();
        assert_eq!(json, r#"{"b":"1","a":["x","y"]}"#);
    }
}
