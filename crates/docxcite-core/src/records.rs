/*
 * records.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Bibliographic records and the acquisition contract.
 */

use async_trait::async_trait;
use hashlink::LinkedHashMap;
use serde_json::Value;

use crate::error::Result;
use crate::extract::short_id;

/// Bibliographic records keyed by short identifier, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordMap {
    records: LinkedHashMap<String, Value>,
}

impl RecordMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from CSL-JSON items.
    pub fn from_items(items: impl IntoIterator<Item = Value>) -> Self {
        let mut map = Self::new();
        for item in items {
            map.insert(item);
        }
        map
    }

    /// Insert a CSL-JSON item.
    ///
    /// The item's `id` is shortened to the final segment of its URI, both as
    /// the key and inside the item. Items without a string `id` are ignored.
    /// Returns the key used.
    pub fn insert(&mut self, mut item: Value) -> Option<String> {
        let raw = item.get("id").and_then(Value::as_str)?.to_string();
        let id = short_id(&raw).unwrap_or(&raw).to_string();
        if let Some(object) = item.as_object_mut() {
            object.insert("id".to_string(), Value::String(id.clone()));
        }
        self.records.insert(id.clone(), item);
        Some(id)
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A remote library: a user's or a group's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Library {
    User(String),
    Group(String),
}

impl Library {
    /// Path segments of the library below the API root (`users`, `123`).
    pub fn segments(&self) -> [&str; 2] {
        match self {
            Library::User(id) => ["users", id],
            Library::Group(id) => ["groups", id],
        }
    }
}

/// Credentials for the bibliographic API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user_ids: Vec<String>,
    pub group_ids: Vec<String>,
    pub api_key: String,
}

impl Credentials {
    /// Build credentials from whitespace-separated id lists.
    pub fn new(user_ids: &str, group_ids: &str, api_key: impl Into<String>) -> Self {
        let split = |s: &str| s.split_whitespace().map(str::to_string).collect();
        Self {
            user_ids: split(user_ids),
            group_ids: split(group_ids),
            api_key: api_key.into(),
        }
    }

    /// Every library to query: users first, then groups.
    pub fn libraries(&self) -> Vec<Library> {
        self.user_ids
            .iter()
            .cloned()
            .map(Library::User)
            .chain(self.group_ids.iter().cloned().map(Library::Group))
            .collect()
    }
}

/// Source of bibliographic records.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch CSL-JSON items for the given short identifiers.
    ///
    /// Identifiers that match nothing are simply absent from the result.
    async fn fetch(&self, credentials: &Credentials, ids: &[String]) -> Result<Vec<Value>>;
}

/// A fixed set of records, served without network access.
#[derive(Debug, Clone, Default)]
pub struct StaticRecords {
    items: Vec<Value>,
}

impl StaticRecords {
    pub fn new(items: impl IntoIterator<Item = Value>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }
}

#[async_trait]
impl RecordSource for StaticRecords {
    async fn fetch(&self, _credentials: &Credentials, ids: &[String]) -> Result<Vec<Value>> {
        Ok(self
            .items
            .iter()
            .filter(|item| {
                item.get("id")
                    .and_then(Value::as_str)
                    .map(|raw| short_id(raw).unwrap_or(raw))
                    .is_some_and(|id| ids.iter().any(|wanted| wanted == id))
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_shortens_id() {
        let mut map = RecordMap::new();
        let key = map.insert(json!({"id": "http://zotero.org/users/1/items/ABC", "title": "T"}));

        assert_eq!(key.as_deref(), Some("ABC"));
        assert_eq!(map.get("ABC").unwrap()["id"], "ABC");
        assert!(map.contains("ABC"));
    }

    #[test]
    fn test_insert_without_slash_uses_whole_id() {
        let map = RecordMap::from_items([json!({"id": "plain"}), json!({"title": "no id"})]);
        assert_eq!(map.ids().collect::<Vec<_>>(), vec!["plain"]);
    }

    #[test]
    fn test_credentials_split_whitespace() {
        let creds = Credentials::new(" 1  2\n", "", "key");
        assert_eq!(
            creds.libraries(),
            vec![Library::User("1".to_string()), Library::User("2".to_string())]
        );
        assert_eq!(Library::Group("7".to_string()).segments(), ["groups", "7"]);
    }

    #[tokio::test]
    async fn test_static_records_filters_by_short_id() {
        let source = StaticRecords::new([
            json!({"id": "u/items/A"}),
            json!({"id": "u/items/B"}),
        ]);
        let items = source
            .fetch(&Credentials::default(), &["B".to_string()])
            .await
            .unwrap();
        assert_eq!(items, vec![json!({"id": "u/items/B"})]);
    }
}
