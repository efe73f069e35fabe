//! In-memory blob storage implementation

use crate::error::{CardError, Result};
use crate::store::{BlobStore, VersionToken};
use bytes::Bytes;
use smol_str::format_smolstr;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// In-memory blob storage using BTreeMap
///
/// Useful for:
/// - Testing (the default double for the repository)
/// - Ephemeral deployments with no persistence requirement
///
/// Version tokens come from a store-wide write sequence, so every committed
/// write produces a fresh token even when the bytes are unchanged. All
/// mutation happens under one lock, which is what makes `put_if_match` a
/// true per-key compare-and-swap here.
#[derive(Debug, Clone)]
pub struct MemoryBlobStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, (Bytes, VersionToken)>,
    seq: u64,
}

impl Inner {
    fn next_token(&mut self) -> VersionToken {
        self.seq += 1;
        VersionToken::new(format_smolstr!("{:016x}", self.seq))
    }
}

impl MemoryBlobStore {
    /// Create new empty memory store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Get number of blobs stored
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }

    /// Check if store is empty
    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().entries.is_empty()
    }

    /// Clear all blobs
    pub fn clear(&self) {
        self.inner.write().unwrap().entries.clear();
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .entries
            .get(key)
            .map(|(data, _)| data.clone()))
    }

    async fn get_with_token(&self, key: &str) -> Result<Option<(Bytes, VersionToken)>> {
        Ok(self.inner.read().unwrap().entries.get(key).cloned())
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<VersionToken> {
        let mut inner = self.inner.write().unwrap();
        let token = inner.next_token();
        inner.entries.insert(key.to_owned(), (data, token.clone()));
        Ok(token)
    }

    async fn put_if_match(
        &self,
        key: &str,
        data: Bytes,
        token: &VersionToken,
    ) -> Result<VersionToken> {
        let mut inner = self.inner.write().unwrap();
        match inner.entries.get(key) {
            Some((_, current)) if current == token => {
                let fresh = inner.next_token();
                inner.entries.insert(key.to_owned(), (data, fresh.clone()));
                Ok(fresh)
            }
            _ => Err(CardError::conflict(key)),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.write().unwrap().entries.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .entries
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryBlobStore::new();
        let data = Bytes::from_static(b"test data");

        store.put("k", data.clone()).await.unwrap();
        let retrieved = store.get("k").await.unwrap();

        assert_eq!(retrieved, Some(data));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_token_changes_on_every_write() {
        let store = MemoryBlobStore::new();

        let t1 = store.put("k", Bytes::from_static(b"same")).await.unwrap();
        let t2 = store.put("k", Bytes::from_static(b"same")).await.unwrap();

        assert_ne!(t1, t2);
        let (_, current) = store.get_with_token("k").await.unwrap().unwrap();
        assert_eq!(current, t2);
    }

    #[tokio::test]
    async fn test_put_if_match_stale_token_rejected() {
        let store = MemoryBlobStore::new();
        let stale = store.put("k", Bytes::from_static(b"v1")).await.unwrap();
        store.put("k", Bytes::from_static(b"v2")).await.unwrap();

        let err = store
            .put_if_match("k", Bytes::from_static(b"v3"), &stale)
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        // rejected write never partially applies
        assert_eq!(
            store.get("k").await.unwrap(),
            Some(Bytes::from_static(b"v2"))
        );
    }

    #[tokio::test]
    async fn test_put_if_match_current_token_wins() {
        let store = MemoryBlobStore::new();
        let token = store.put("k", Bytes::from_static(b"v1")).await.unwrap();

        let fresh = store
            .put_if_match("k", Bytes::from_static(b"v2"), &token)
            .await
            .unwrap();

        assert_ne!(fresh, token);
        assert_eq!(
            store.get("k").await.unwrap(),
            Some(Bytes::from_static(b"v2"))
        );
    }

    #[tokio::test]
    async fn test_put_if_match_on_deleted_key_conflicts() {
        let store = MemoryBlobStore::new();
        let token = store.put("k", Bytes::from_static(b"v1")).await.unwrap();
        store.delete("k").await.unwrap();

        let err = store
            .put_if_match("k", Bytes::from_static(b"v2"), &token)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryBlobStore::new();
        store.put("k", Bytes::from_static(b"v")).await.unwrap();

        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let store = MemoryBlobStore::new();
        store.put("cards/a", Bytes::from_static(b"1")).await.unwrap();
        store.put("cards/b", Bytes::from_static(b"2")).await.unwrap();
        store.put("images/x", Bytes::from_static(b"3")).await.unwrap();

        let keys = store.list("cards/").await.unwrap();
        assert_eq!(keys, vec!["cards/a".to_owned(), "cards/b".to_owned()]);

        assert!(store.list("nothing/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clone_shares_storage() {
        let store1 = MemoryBlobStore::new();
        let store2 = store1.clone();

        store1.put("k", Bytes::from_static(b"v")).await.unwrap();
        assert!(store2.get("k").await.unwrap().is_some());
    }
}
