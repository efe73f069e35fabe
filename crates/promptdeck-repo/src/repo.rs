//! High-level card repository operations
//!
//! Read, save, like, and delete cards stored one blob per card under
//! `cards/<id>`. Mutations go through a version-token guarded write with a
//! bounded, jittered retry on conflict, so two users editing the same card
//! cannot silently overwrite each other and concurrent likes are never lost.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;

use crate::card::Card;
use crate::error::{CardError, Result};
use crate::store::BlobStore;

/// Default conditional-write attempt budget
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Upper bound on the randomized retry delay, in milliseconds
const MAX_BACKOFF_MS: u64 = 50;

/// Key namespace for card blobs
const CARD_PREFIX: &str = "cards/";

fn card_key(id: &str) -> String {
    format!("{}{}", CARD_PREFIX, id)
}

fn decode(key: &str, data: &[u8]) -> Result<Card> {
    serde_json::from_slice(data)
        .map_err(|err| CardError::serialization(err).with_context(format!("decoding {}", key)))
}

fn encode(card: &Card) -> Result<Bytes> {
    let data = serde_json::to_vec(card).map_err(CardError::serialization)?;
    Ok(Bytes::from(data))
}

/// Card repository over a [`BlobStore`]
///
/// The store is injected at construction; tests substitute doubles for it.
/// Each request path gets its own view of the store, there is no shared
/// mutable state here beyond the store itself.
#[derive(Debug, Clone)]
pub struct CardRepository<S: BlobStore> {
    store: Arc<S>,
    max_attempts: u32,
}

impl<S: BlobStore + Sync + 'static> CardRepository<S> {
    /// Create a repository with the default attempt budget
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the conditional-write attempt budget
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Fetch a single card
    pub async fn get(&self, id: &str) -> Result<Card> {
        let key = card_key(id);
        match self.store.get(&key).await? {
            Some(data) => decode(&key, &data),
            None => Err(CardError::not_found("card", id)),
        }
    }

    /// Fetch every card in the namespace
    ///
    /// Values are fetched in parallel. An entry that fails to fetch or
    /// decode is logged and skipped, it never aborts the whole listing.
    /// No ordering is imposed; callers sort for display.
    pub async fn list_all(&self) -> Result<Vec<Card>> {
        let keys = self.store.list(CARD_PREFIX).await?;

        let fetches = keys.into_iter().map(|key| {
            let store = Arc::clone(&self.store);
            async move {
                let fetched = store.get(&key).await;
                (key, fetched)
            }
        });
        let results = futures::future::join_all(fetches).await;

        let mut cards = Vec::with_capacity(results.len());
        for (key, fetched) in results {
            match fetched {
                Ok(Some(data)) => match decode(&key, &data) {
                    Ok(card) => cards.push(card),
                    Err(err) => tracing::warn!(%key, %err, "skipping undecodable card"),
                },
                Ok(None) => tracing::warn!(%key, "card vanished between list and fetch"),
                Err(err) => tracing::warn!(%key, %err, "skipping unreadable card"),
            }
        }
        Ok(cards)
    }

    /// Read-modify-write a card with conditional-write retry
    ///
    /// Fetches the current record and its version token, applies the pure
    /// `mutate` function, and commits the result guarded by the token. A
    /// rejected write means another writer got there first: back off for a
    /// randomized 5-50ms and restart from a fresh read, so a successful
    /// write always reflects a mutation of the latest observed state. The
    /// attempt budget exhausting surfaces as a conflict ("busy, retry");
    /// any non-conflict error aborts immediately.
    pub async fn update_with_retry<F>(&self, id: &str, mutate: F) -> Result<Card>
    where
        F: Fn(Card) -> Card + Send + Sync,
    {
        let key = card_key(id);
        for attempt in 1..=self.max_attempts {
            let Some((data, token)) = self.store.get_with_token(&key).await? else {
                return Err(CardError::not_found("card", id));
            };
            let next = mutate(decode(&key, &data)?);

            match self.store.put_if_match(&key, encode(&next)?, &token).await {
                Ok(_) => return Ok(next),
                Err(err) if err.is_conflict() => {
                    tracing::debug!(%key, attempt, "conditional write lost the race");
                    if attempt < self.max_attempts {
                        let delay = rand::rng().random_range(5..=MAX_BACKOFF_MS);
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Err(CardError::busy(&key, self.max_attempts))
    }

    /// Create or merge-update a card
    ///
    /// An existing id is updated through the retry loop with the incoming
    /// fields merged over the stored record, pinning `likes` and
    /// `created_at`. A new id is written unconditionally: `likes` starts at
    /// zero and a missing `created_at` is stamped with the current time.
    /// Two clients racing to create the same new id is not guarded; the
    /// second write wins.
    pub async fn save(&self, card: Card) -> Result<Card> {
        if card.id.is_empty() {
            return Err(CardError::invalid_input("card id must not be empty"));
        }
        let key = card_key(&card.id);

        if self.store.get(&key).await?.is_some() {
            let id = card.id.clone();
            let incoming = card;
            return self
                .update_with_retry(&id, move |existing| incoming.clone().merged_over(&existing))
                .await;
        }

        let mut fresh = card;
        fresh.likes = 0;
        if fresh.created_at <= 0 {
            fresh.created_at = chrono::Utc::now().timestamp_millis();
        }
        self.store.put(&key, encode(&fresh)?).await?;
        Ok(fresh)
    }

    /// Increment a card's like counter by one
    ///
    /// Relies entirely on the retry loop: under concurrent likes every
    /// increment lands as long as each call's attempt budget holds out.
    pub async fn like(&self, id: &str) -> Result<Card> {
        if id.is_empty() {
            return Err(CardError::invalid_input("card id must not be empty"));
        }
        self.update_with_retry(id, |mut card| {
            card.likes = card.likes.saturating_add(1);
            card
        })
        .await
    }

    /// Delete a card
    ///
    /// Idempotent: deleting an id that was never saved, or was already
    /// deleted, succeeds.
    pub async fn delete(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(CardError::invalid_input("card id must not be empty"));
        }
        self.store.delete(&card_key(id)).await
    }
}
