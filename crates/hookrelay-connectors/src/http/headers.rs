use indexmap::IndexMap;
use serde::Serialize;

/// Ordered request headers.
///
/// Keys are case-preserving and compared exactly on insert, so a repeated
/// key overwrites the earlier value in place. Lookups used for content
/// negotiation are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HeaderList(IndexMap<String, String>);

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Remove every case variant of `key`, then insert it.
    pub fn replace(&mut self, key: &str, value: impl Into<String>) {
        self.0.retain(|k, _| !k.eq_ignore_ascii_case(key));
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get_ignore_case(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_ignore_case(&self, key: &str) -> bool {
        self.get_ignore_case(key).is_some()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get_ignore_case("content-type")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderList {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut list = HeaderList::new();
        for (k, v) in iter {
            list.insert(k, v);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_key_overwrites_in_place() {
        let list: HeaderList = [("A", "1"), ("B", "2"), ("A", "3")].into_iter().collect();
        let pairs: Vec<_> = list.iter().collect();
        assert_eq!(pairs, vec![("A", "3"), ("B", "2")]);
    }

    #[test]
    fn replace_drops_case_variants() {
        let mut list: HeaderList = [("authorization", "old"), ("X", "1")].into_iter().collect();
        list.replace("Authorization", "Bearer t");
        assert_eq!(list.len(), 2);
        assert_eq!(list.get_ignore_case("AUTHORIZATION"), Some("Bearer t"));
        assert!(list.iter().all(|(k, _)| k != "authorization"));
    }

    #[test]
    fn content_type_lookup_is_case_insensitive() {
        let list: HeaderList = [("content-TYPE", "text/plain")].into_iter().collect();
        assert_eq!(list.content_type(), Some("text/plain"));
    }
}
