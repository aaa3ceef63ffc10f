//! In-process user store
//!
//! Mirrors what the Elasticsearch adapter observes from a real cluster:
//! writes create the collection on demand, reads from a missing collection
//! fail for bulk operations and come back empty for single documents.

use super::{is_valid_index_name, UserStore};
use crate::model::User;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

type Index = BTreeMap<String, User>;

pub struct MemoryUserStore {
    index: String,
    indices: RwLock<HashMap<String, Index>>,
}

impl MemoryUserStore {
    /// Create a store whose document operations target `index`.
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            indices: RwLock::new(HashMap::new()),
        }
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indices.read().contains_key(name)
    }

    /// Number of documents in the default collection
    pub fn len(&self) -> usize {
        self.indices
            .read()
            .get(&self.index)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_index(&self, name: &str) -> Result<()> {
        if !is_valid_index_name(name) {
            return Err(Error::Backend(format!("invalid index name '{}'", name)));
        }
        self.indices.write().entry(name.to_string()).or_default();
        Ok(())
    }

    async fn upsert(&self, user: &User) -> Result<()> {
        self.indices
            .write()
            .entry(self.index.clone())
            .or_default()
            .insert(user.key.to_string(), user.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<User>> {
        Ok(self
            .indices
            .read()
            .get(&self.index)
            .and_then(|docs| docs.get(key).cloned()))
    }

    async fn get_all(&self) -> Result<Vec<User>> {
        self.indices
            .read()
            .get(&self.index)
            .map(|docs| docs.values().cloned().collect())
            .ok_or_else(|| Error::IndexNotFound(self.index.clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self
            .indices
            .write()
            .get_mut(&self.index)
            .is_some_and(|docs| docs.remove(key).is_some()))
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut indices = self.indices.write();
        let docs = indices
            .get_mut(&self.index)
            .ok_or_else(|| Error::IndexNotFound(self.index.clone()))?;
        let deleted = docs.len() as u64;
        docs.clear();
        Ok(deleted)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserKey;

    fn user(key: &str, name: &str) -> User {
        User::new(UserKey::new(key).unwrap(), name)
    }

    #[tokio::test]
    async fn test_upsert_replaces_whole_document() {
        let store = MemoryUserStore::new("users");
        store
            .upsert(&user("u1", "Alice").with_email("alice@example.com"))
            .await
            .unwrap();
        store.upsert(&user("u1", "Alice B")).await.unwrap();

        let fetched = store.get("u1").await.unwrap().unwrap();
        assert_eq!(fetched, user("u1", "Alice B"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_get_all_requires_index() {
        let store = MemoryUserStore::new("users");
        assert!(matches!(
            store.get_all().await,
            Err(Error::IndexNotFound(_))
        ));

        store.create_index("users").await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_index_is_idempotent() {
        let store = MemoryUserStore::new("users");
        store.upsert(&user("u1", "Alice")).await.unwrap();

        store.create_index("users").await.unwrap();
        store.create_index("users").await.unwrap();

        assert!(store.has_index("users"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_create_other_index_leaves_default_alone() {
        let store = MemoryUserStore::new("users");
        store.create_index("archive").await.unwrap();

        assert!(store.has_index("archive"));
        assert!(!store.has_index("users"));
    }

    #[tokio::test]
    async fn test_create_index_rejects_unaddressable_names() {
        let store = MemoryUserStore::new("users");
        for name in ["", ".", ".."] {
            assert!(store.create_index(name).await.is_err(), "accepted {name:?}");
            assert!(!store.has_index(name));
        }
    }

    #[tokio::test]
    async fn test_dot_keys_round_trip() {
        let store = MemoryUserStore::new("users");
        for key in [".", ".."] {
            store.upsert(&user(key, "Dot")).await.unwrap();
            assert_eq!(store.get(key).await.unwrap(), Some(user(key, "Dot")));
        }
        assert!(store.delete("..").await.unwrap());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_reports_missing() {
        let store = MemoryUserStore::new("users");
        assert!(!store.delete("ghost").await.unwrap());

        store.upsert(&user("u1", "Alice")).await.unwrap();
        assert!(store.delete("u1").await.unwrap());
        assert!(!store.delete("u1").await.unwrap());
        assert!(store.get("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_all_counts() {
        let store = MemoryUserStore::new("users");
        for (key, name) in [("a", "A"), ("b", "B"), ("c", "C")] {
            store.upsert(&user(key, name)).await.unwrap();
        }

        assert_eq!(store.delete_all().await.unwrap(), 3);
        assert!(store.is_empty());
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_all_is_ordered_by_key() {
        let store = MemoryUserStore::new("users");
        store.upsert(&user("b", "Bob")).await.unwrap();
        store.upsert(&user("a", "Alice")).await.unwrap();

        let keys: Vec<String> = store
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.key.to_string())
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
