use super::{listing_order, CorpusStats, Example, ExampleId, NewExample, Store, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Rows {
    examples: Vec<Example>,
    next_id: i64,
}

/// In-process corpus. Nothing is persisted.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Rows>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with examples, in order.
    pub async fn with_examples(examples: impl IntoIterator<Item = NewExample>) -> Self {
        let store = Self::new();
        for example in examples {
            // Infallible for the in-memory backend.
            let _ = store.upsert_example(example).await;
        }
        store
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.examples.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_all_examples(&self, only_golden: bool) -> Result<Vec<Example>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .examples
            .iter()
            .filter(|e| !only_golden || e.is_golden)
            .cloned()
            .collect())
    }

    async fn upsert_example(&self, example: NewExample) -> Result<ExampleId, StoreError> {
        let mut rows = self.rows.write().await;
        let now = Utc::now();

        if let Some(existing) = rows
            .examples
            .iter_mut()
            .find(|e| e.normalized_text == example.normalized_text)
        {
            // a plain re-save never overwrites a golden judgment
            if !existing.is_golden || example.is_golden {
                existing.judgment = example.judgment;
            }
            existing.score = existing.score.max(example.score);
            existing.is_golden |= example.is_golden;
            existing.updated_at = now;
            return Ok(existing.id);
        }

        rows.next_id += 1;
        let id = ExampleId(rows.next_id);
        rows.examples.push(Example {
            id,
            original_text: example.original_text,
            normalized_text: example.normalized_text,
            judgment: example.judgment,
            is_golden: example.is_golden,
            score: example.score,
            usage_count: 0,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn increment_usage(&self, normalized_text: &str) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if let Some(example) = rows
            .examples
            .iter_mut()
            .find(|e| e.normalized_text == normalized_text)
        {
            example.usage_count += 1;
            example.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn statistics(&self) -> Result<CorpusStats, StoreError> {
        Ok(CorpusStats::from_examples(&self.rows.read().await.examples))
    }

    async fn paginate(&self, page: usize, page_size: usize) -> Result<Vec<Example>, StoreError> {
        let mut listing = self.rows.read().await.examples.clone();
        listing.sort_by(listing_order);
        Ok(listing
            .into_iter()
            .skip(page.saturating_mul(page_size))
            .take(page_size)
            .collect())
    }

    async fn get_by_id(&self, id: ExampleId) -> Result<Option<Example>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.examples.iter().find(|e| e.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_updates_instead_of_duplicating() {
        let store = MemoryStore::new();
        let first = store
            .upsert_example(NewExample::new("Как клиент, я хочу войти, чтобы работать", "v1").with_golden(true))
            .await
            .unwrap();
        let second = store
            .upsert_example(NewExample::new("как клиент я хочу войти чтобы работать!", "v2").with_score(3))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len().await, 1);

        let row = store.get_by_id(first).await.unwrap().unwrap();
        assert_eq!(row.judgment, "v1", "golden judgment is kept");
        assert_eq!(row.score, 3);
        assert!(row.is_golden, "golden flag is never demoted");
        assert_eq!(row.original_text, "Как клиент, я хочу войти, чтобы работать");
    }

    #[tokio::test]
    async fn test_plain_resave_keeps_best_score() {
        let store = MemoryStore::new();
        let id = store
            .upsert_example(NewExample::new("a b c", "gold").with_golden(true).with_score(5))
            .await
            .unwrap();
        store.upsert_example(NewExample::new("a b c", "plain")).await.unwrap();

        let row = store.get_by_id(id).await.unwrap().unwrap();
        assert!(row.is_golden);
        assert_eq!(row.score, 5);
        assert_eq!(row.judgment, "gold");
        assert_eq!(store.statistics().await.unwrap().average_score, 5.0);

        store.upsert_example(NewExample::new("a b c", "better").with_score(6)).await.unwrap();
        let row = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(row.score, 6);
        assert_eq!(row.judgment, "gold");
    }

    #[tokio::test]
    async fn test_increment_usage() {
        let store = MemoryStore::new();
        let id = store.upsert_example(NewExample::new("a b c", "j")).await.unwrap();
        store.increment_usage("a b c").await.unwrap();
        store.increment_usage("a b c").await.unwrap();
        store.increment_usage("unknown").await.unwrap();

        assert_eq!(store.get_by_id(id).await.unwrap().unwrap().usage_count, 2);
    }

    #[tokio::test]
    async fn test_find_all_golden_filter() {
        let store = MemoryStore::with_examples([
            NewExample::new("one", "j"),
            NewExample::new("two", "j").with_golden(true),
        ])
        .await;

        assert_eq!(store.find_all_examples(false).await.unwrap().len(), 2);
        let golden = store.find_all_examples(true).await.unwrap();
        assert_eq!(golden.len(), 1);
        assert_eq!(golden[0].normalized_text, "two");
    }

    #[tokio::test]
    async fn test_paginate() {
        let store = MemoryStore::with_examples(
            (0..7).map(|i| NewExample::new(format!("story {i}"), "j").with_score(i % 3)),
        )
        .await;

        let first = store.paginate(0, 5).await.unwrap();
        let second = store.paginate(1, 5).await.unwrap();
        let third = store.paginate(2, 5).await.unwrap();
        assert_eq!(first.len(), 5);
        assert_eq!(second.len(), 2);
        assert!(third.is_empty());
        assert!(first.windows(2).all(|w| w[0].score >= w[1].score));
    }
}
