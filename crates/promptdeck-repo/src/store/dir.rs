//! Directory-backed blob storage
//!
//! One file per key under a root directory, `/` in keys mapping to
//! subdirectories. Version tokens are the SHA-256 of the stored bytes, so a
//! token read earlier still matches as long as the content is unchanged.
//! Suitable for single-process deployments; for multi-node setups put a
//! managed blob service behind [`BlobStore`] instead.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex;

use crate::error::{CardError, Result};
use crate::store::{BlobStore, VersionToken};

/// Directory-backed blob storage
///
/// Writes go to a sibling `.tmp` file and are renamed into place, so readers
/// never observe a half-written blob. Conditional writes re-read the current
/// content under a store-wide lock, which serializes the compare-and-swap
/// window across tasks in this process.
#[derive(Debug, Clone)]
pub struct DirBlobStore {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

fn content_token(data: &[u8]) -> VersionToken {
    let digest = Sha256::digest(data);
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{:02x}", byte);
    }
    VersionToken::new(hex)
}

impl DirBlobStore {
    /// Open (creating if needed) a store rooted at the given directory
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(CardError::io)?;
        Ok(Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// The root directory backing this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(CardError::invalid_key(key));
        }
        let mut path = self.root.clone();
        for segment in key.split('/') {
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains('\\')
                || segment.ends_with(".tmp")
            {
                return Err(CardError::invalid_key(key));
            }
            path.push(segment);
        }
        Ok(path)
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.key_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CardError::io(err)),
        }
    }

    async fn write_atomic(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.key_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(CardError::io)?;
        }
        let file_name = path
            .file_name()
            .ok_or_else(|| CardError::invalid_key(key))?
            .to_os_string();
        let mut tmp_name = file_name;
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        fs::write(&tmp, data).await.map_err(CardError::io)?;
        fs::rename(&tmp, &path).await.map_err(CardError::io)?;
        Ok(())
    }
}

impl BlobStore for DirBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.read(key).await?.map(Bytes::from))
    }

    async fn get_with_token(&self, key: &str) -> Result<Option<(Bytes, VersionToken)>> {
        Ok(self.read(key).await?.map(|data| {
            let token = content_token(&data);
            (Bytes::from(data), token)
        }))
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<VersionToken> {
        let _guard = self.write_lock.lock().await;
        self.write_atomic(key, &data).await?;
        Ok(content_token(&data))
    }

    async fn put_if_match(
        &self,
        key: &str,
        data: Bytes,
        token: &VersionToken,
    ) -> Result<VersionToken> {
        let _guard = self.write_lock.lock().await;
        let current = match self.read(key).await? {
            Some(current) => content_token(&current),
            None => return Err(CardError::conflict(key)),
        };
        if &current != token {
            return Err(CardError::conflict(key));
        }
        self.write_atomic(key, &data).await?;
        Ok(content_token(&data))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.key_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CardError::io(err)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];

        while let Some((dir, rel)) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(CardError::io(err)),
            };
            while let Some(entry) = entries.next_entry().await.map_err(CardError::io)? {
                let name = match entry.file_name().into_string() {
                    Ok(name) => name,
                    Err(_) => continue,
                };
                let key = if rel.is_empty() {
                    name
                } else {
                    format!("{}/{}", rel, name)
                };
                let file_type = entry.file_type().await.map_err(CardError::io)?;
                if file_type.is_dir() {
                    pending.push((entry.path(), key));
                } else if key.starts_with(prefix) && !key.ends_with(".tmp") {
                    keys.push(key);
                }
            }
        }

        keys.sort_unstable();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_and_get() {
        let dir = tempdir().unwrap();
        let store = DirBlobStore::open(dir.path()).await.unwrap();

        store
            .put("cards/c1", Bytes::from_static(b"hello"))
            .await
            .unwrap();

        let retrieved = store.get("cards/c1").await.unwrap();
        assert_eq!(retrieved, Some(Bytes::from_static(b"hello")));
        assert_eq!(store.get("cards/missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reopen_sees_existing_blobs() {
        let dir = tempdir().unwrap();

        let store = DirBlobStore::open(dir.path()).await.unwrap();
        store.put("cards/c1", Bytes::from_static(b"v")).await.unwrap();
        drop(store);

        let reopened = DirBlobStore::open(dir.path()).await.unwrap();
        assert_eq!(
            reopened.get("cards/c1").await.unwrap(),
            Some(Bytes::from_static(b"v"))
        );
    }

    #[tokio::test]
    async fn test_token_tracks_content() {
        let dir = tempdir().unwrap();
        let store = DirBlobStore::open(dir.path()).await.unwrap();

        let t1 = store.put("k", Bytes::from_static(b"v1")).await.unwrap();
        let (_, read_back) = store.get_with_token("k").await.unwrap().unwrap();
        assert_eq!(t1, read_back);

        let t2 = store.put("k", Bytes::from_static(b"v2")).await.unwrap();
        assert_ne!(t1, t2);
    }

    #[tokio::test]
    async fn test_put_if_match_stale_token_rejected() {
        let dir = tempdir().unwrap();
        let store = DirBlobStore::open(dir.path()).await.unwrap();

        let stale = store.put("k", Bytes::from_static(b"v1")).await.unwrap();
        store.put("k", Bytes::from_static(b"v2")).await.unwrap();

        let err = store
            .put_if_match("k", Bytes::from_static(b"v3"), &stale)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(
            store.get("k").await.unwrap(),
            Some(Bytes::from_static(b"v2"))
        );
    }

    #[tokio::test]
    async fn test_put_if_match_current_token_wins() {
        let dir = tempdir().unwrap();
        let store = DirBlobStore::open(dir.path()).await.unwrap();

        let token = store.put("k", Bytes::from_static(b"v1")).await.unwrap();
        store
            .put_if_match("k", Bytes::from_static(b"v2"), &token)
            .await
            .unwrap();

        assert_eq!(
            store.get("k").await.unwrap(),
            Some(Bytes::from_static(b"v2"))
        );
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = DirBlobStore::open(dir.path()).await.unwrap();

        store.put("k", Bytes::from_static(b"v")).await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_nested_keys_by_prefix() {
        let dir = tempdir().unwrap();
        let store = DirBlobStore::open(dir.path()).await.unwrap();

        store.put("cards/a", Bytes::from_static(b"1")).await.unwrap();
        store.put("cards/b", Bytes::from_static(b"2")).await.unwrap();
        store.put("images/x.png", Bytes::from_static(b"3")).await.unwrap();

        let keys = store.list("cards/").await.unwrap();
        assert_eq!(keys, vec!["cards/a".to_owned(), "cards/b".to_owned()]);
    }

    #[tokio::test]
    async fn test_traversal_keys_rejected() {
        let dir = tempdir().unwrap();
        let store = DirBlobStore::open(dir.path()).await.unwrap();

        for key in ["../escape", "a//b", "", "cards/..", "cards/x.tmp"] {
            let err = store.put(key, Bytes::from_static(b"v")).await.unwrap_err();
            assert!(!err.is_conflict(), "key {:?} should fail validation", key);
        }
    }
}
