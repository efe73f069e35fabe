//! Blob storage abstraction with version-token guarded writes

use crate::error::Result;
use bytes::Bytes;
use smol_str::SmolStr;
use std::fmt;

/// Opaque version token returned alongside a stored blob
///
/// Whatever the backend derives it from (write sequence, content hash, an
/// upstream ETag), callers treat it as opaque: read it with the blob, hand
/// it back on the conditional write, never inspect it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(SmolStr);

impl VersionToken {
    /// Wrap a backend-produced token value
    pub fn new(token: impl Into<SmolStr>) -> Self {
        Self(token.into())
    }

    /// The token as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Async key/blob storage trait
///
/// Keyed blob storage with per-key compare-and-swap: every stored value
/// carries a [`VersionToken`], and [`put_if_match`](BlobStore::put_if_match)
/// commits only if the stored token still matches the one the caller read.
/// That primitive is what the repository's conflict-retry loop is built on.
///
/// Implementations here:
/// - In-memory map ([`MemoryBlobStore`]) for tests and reference semantics
/// - One file per key ([`DirBlobStore`]) for simple persistence
/// - Managed blob services (user-provided)
///
/// Clone is required so the repository and entry points can share one store.
#[trait_variant::make(Send)]
pub trait BlobStore: Clone {
    /// Get a blob by key
    ///
    /// Returns `None` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Get a blob and its current version token
    ///
    /// The token is the guard value for a subsequent
    /// [`put_if_match`](BlobStore::put_if_match) on the same key.
    async fn get_with_token(&self, key: &str) -> Result<Option<(Bytes, VersionToken)>>;

    /// Write a blob unconditionally, returning the new version token
    async fn put(&self, key: &str, data: Bytes) -> Result<VersionToken>;

    /// Write a blob only if the stored version token still matches
    ///
    /// Linearizable per-key compare-and-swap: of two racing writers holding
    /// the same token, exactly one wins; the loser gets a conflict error and
    /// must re-read. A key that was deleted since the read also conflicts.
    /// A rejected write never partially applies.
    async fn put_if_match(&self, key: &str, data: Bytes, token: &VersionToken)
    -> Result<VersionToken>;

    /// Delete a blob
    ///
    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// List all keys under a prefix
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

pub mod dir;
pub mod memory;

pub use dir::DirBlobStore;
pub use memory::MemoryBlobStore;
