//! The card data model
//!
//! A card is the sole persistent entity: a templated prompt snippet with
//! up to four `{{{label}}}` placeholder spans, plus display metadata and a
//! like counter. Wire names are camelCase to match the stored JSON documents.

use serde::{Deserialize, Serialize};

/// Advisory cap on `{{{label}}}` placeholder spans per template
///
/// Enforced by the editing UI, not by the repository.
pub const MAX_PLACEHOLDERS: usize = 4;

/// A prompt card
///
/// `id` is client-generated at creation and never changes. `likes` and
/// `created_at` are owned by the repository once the card exists: edits
/// merge over the stored record and those two fields are pinned to the
/// stored values (see [`Card::merged_over`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Unique, stable identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// Category tag, free-form ("type" on the wire)
    #[serde(rename = "type")]
    pub kind: String,
    /// Who contributed the card
    pub contributor: String,
    /// Prompt template, zero to four `{{{label}}}` spans
    pub template: String,
    /// Optional usage warnings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precautions: Option<String>,
    /// Example of the filled-in prompt
    #[serde(default)]
    pub example_text: String,
    /// Optional URL/path of an example image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_image: Option<String>,
    /// Cosmetic hue, 0-359
    #[serde(default)]
    pub hue: u16,
    /// Like counter, non-decreasing under the like operation
    #[serde(default)]
    pub likes: u64,
    /// Creation timestamp in epoch milliseconds, set once
    #[serde(default)]
    pub created_at: i64,
}

impl Card {
    /// Count `{{{label}}}` placeholder spans in the template
    pub fn placeholder_count(&self) -> usize {
        let mut rest = self.template.as_str();
        let mut count = 0;
        while let Some(start) = rest.find("{{{") {
            let after = &rest[start + 3..];
            match after.find("}}}") {
                Some(end) => {
                    count += 1;
                    rest = &after[end + 3..];
                }
                None => break,
            }
        }
        count
    }

    /// Whether the template stays within [`MAX_PLACEHOLDERS`]
    pub fn within_placeholder_budget(&self) -> bool {
        self.placeholder_count() <= MAX_PLACEHOLDERS
    }

    /// Merge this card over an existing stored record
    ///
    /// All incoming fields win except `likes` and `created_at`, which are
    /// pinned to the stored values so an edit can never reset the counter
    /// or move the creation time.
    pub fn merged_over(mut self, existing: &Card) -> Card {
        self.likes = existing.likes;
        self.created_at = existing.created_at;
        self
    }
}
