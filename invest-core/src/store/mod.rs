//! Corpus of judged stories.
//!
//! The [`Store`] trait is the persistence boundary. Two implementations live
//! here: [`MemoryStore`] for tests and throwaway runs, and [`SqliteStore`]
//! for a corpus that survives restarts.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::normalize::normalize;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Errors from corpus storage.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage task failed: {0}")]
    Join(String),

    #[error("Storage call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Row identifier of a stored example.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExampleId(pub i64);

impl fmt::Display for ExampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A judged story kept for reuse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub id: ExampleId,
    pub original_text: String,
    /// Unique across the corpus.
    pub normalized_text: String,
    pub judgment: String,
    pub is_golden: bool,
    /// Rubric score, 0 when unknown.
    pub score: u8,
    pub usage_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for [`Store::upsert_example`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewExample {
    pub original_text: String,
    pub normalized_text: String,
    pub judgment: String,
    pub is_golden: bool,
    pub score: u8,
}

impl NewExample {
    /// Build a non-golden example; the key is derived with [`normalize`].
    pub fn new(original_text: impl Into<String>, judgment: impl Into<String>) -> Self {
        let original_text = original_text.into();
        Self {
            normalized_text: normalize(&original_text),
            original_text,
            judgment: judgment.into(),
            is_golden: false,
            score: 0,
        }
    }

    pub fn with_golden(mut self, golden: bool) -> Self {
        self.is_golden = golden;
        self
    }

    pub fn with_score(mut self, score: u8) -> Self {
        self.score = score.min(6);
        self
    }
}

/// Aggregate numbers about the corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorpusStats {
    pub total: u64,
    pub golden: u64,
    /// Mean score of golden examples with a known score, two decimals.
    pub average_score: f64,
    pub total_usage: u64,
}

impl CorpusStats {
    pub(crate) fn from_examples<'a>(examples: impl IntoIterator<Item = &'a Example>) -> Self {
        let mut stats = CorpusStats::default();
        let mut scored = 0u64;
        let mut score_sum = 0u64;

        for example in examples {
            stats.total += 1;
            stats.total_usage += example.usage_count;
            if example.is_golden {
                stats.golden += 1;
                if example.score > 0 {
                    scored += 1;
                    score_sum += u64::from(example.score);
                }
            }
        }

        if scored > 0 {
            stats.average_score = round2(score_sum as f64 / scored as f64);
        }
        stats
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Display order for listings: golden first, then best score, then oldest.
pub(crate) fn listing_order(a: &Example, b: &Example) -> Ordering {
    b.is_golden
        .cmp(&a.is_golden)
        .then(b.score.cmp(&a.score))
        .then(a.id.cmp(&b.id))
}

/// Persistence boundary for the example corpus.
///
/// Inserting an existing normalized key updates that row instead of adding
/// a second one. Examples are never deleted through this interface.
#[async_trait]
pub trait Store: Send + Sync {
    /// All examples, or only the golden ones.
    async fn find_all_examples(&self, only_golden: bool) -> Result<Vec<Example>, StoreError>;

    /// Insert or update by normalized key and return the row id.
    async fn upsert_example(&self, example: NewExample) -> Result<ExampleId, StoreError>;

    /// Bump the usage counter of the example with this normalized key.
    ///
    /// Unknown keys are ignored.
    async fn increment_usage(&self, normalized_text: &str) -> Result<(), StoreError>;

    async fn statistics(&self) -> Result<CorpusStats, StoreError>;

    /// One zero-based page of the corpus in listing order.
    async fn paginate(&self, page: usize, page_size: usize) -> Result<Vec<Example>, StoreError>;

    async fn get_by_id(&self, id: ExampleId) -> Result<Option<Example>, StoreError>;
}
