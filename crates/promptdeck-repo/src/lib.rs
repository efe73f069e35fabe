//! Prompt-card persistence primitives
//!
//! This crate provides the storage core of the promptdeck gallery:
//!
//! - **Card model**: the single persistent entity, a templated prompt
//!   snippet with placeholder spans and a like counter
//! - **Blob storage**: pluggable key/blob abstraction with version-token
//!   guarded conditional writes, in-memory and directory-backed
//! - **Repository**: read/list, save (create or merge), like, and delete,
//!   with a bounded jittered retry loop around the conditional write
//!
//! # Design Philosophy
//!
//! - No database: the store is a plain key/blob service, one blob per card
//! - Lost updates are prevented by compare-and-swap on a version token,
//!   never by cross-request locks
//! - The store is an explicit constructor dependency, never an ambient
//!   global, so tests can substitute doubles
//!
//! # Example
//!
//! ```rust,ignore
//! use promptdeck_repo::{CardRepository, MemoryBlobStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = CardRepository::new(Arc::new(MemoryBlobStore::new()));
//!
//! repo.save(new_card).await?;
//! let liked = repo.like("c1").await?;
//! println!("likes: {}", liked.likes);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod card;
pub mod error;
pub mod repo;
pub mod store;

pub use card::{Card, MAX_PLACEHOLDERS};
pub use error::{CardError, CardErrorKind, Result};
pub use repo::{CardRepository, DEFAULT_MAX_ATTEMPTS};
pub use store::{BlobStore, DirBlobStore, MemoryBlobStore, VersionToken};
