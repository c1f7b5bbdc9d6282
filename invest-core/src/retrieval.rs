//! Tiered similarity search over the example corpus.
//!
//! Tiers, cheapest first:
//! 1. exact normalized match (similarity 1.0)
//! 2. near duplicate by sequence ratio (reported at a fixed display value)
//! 3. sequence ratio above the caller's threshold, blended with word overlap
//! 4. keyword overlap, only when nothing above matched
//!
//! The engine only reads the corpus. Bumping usage counters is up to the
//! caller once it actually uses a match.

use crate::normalize::{normalize, tokens};
use crate::similarity::{ratio_upper_bound, sequence_ratio, word_overlap};
use crate::store::{Example, ExampleId, Store, StoreError};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Role and intent connectives ignored when picking keywords.
const DEFAULT_STOP_WORDS: &[&str] = &[
    "как", "хочу", "чтобы", "чтоб", "могу", "мог", "нужно", "надо", "можно", "было",
    "быть", "иметь", "этого", "того", "также", "меня", "мной", "своих", "свой", "свои",
    "want", "that", "with", "able", "have", "this", "from",
];

/// Tunables for [`RetrievalEngine`].
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Sequence ratio at which an entry counts as a near duplicate.
    pub near_duplicate_ratio: f64,

    /// Similarity reported for near duplicates.
    pub near_duplicate_similarity: f64,

    /// Weight of the sequence ratio in the blended score.
    pub sequence_weight: f64,

    /// Weight of word overlap in the blended score.
    pub overlap_weight: f64,

    pub max_keywords: usize,

    /// Tokens must be strictly longer than this to be keywords.
    pub min_keyword_chars: usize,

    /// Minimum fraction of keywords an entry must contain.
    pub keyword_min_fraction: f64,

    pub stop_words: HashSet<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            near_duplicate_ratio: 0.95,
            near_duplicate_similarity: 0.99,
            sequence_weight: 0.7,
            overlap_weight: 0.3,
            max_keywords: 4,
            min_keyword_chars: 3,
            keyword_min_fraction: 0.5,
            stop_words: DEFAULT_STOP_WORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RetrievalConfig {
    pub fn with_near_duplicate_ratio(mut self, ratio: f64) -> Self {
        self.near_duplicate_ratio = ratio;
        self
    }

    pub fn with_weights(mut self, sequence: f64, overlap: f64) -> Self {
        self.sequence_weight = sequence;
        self.overlap_weight = overlap;
        self
    }

    pub fn with_max_keywords(mut self, max: usize) -> Self {
        self.max_keywords = max;
        self
    }

    pub fn with_stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_words = words.into_iter().map(Into::into).collect();
        self
    }
}

/// Which tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    NearDuplicate,
    Threshold,
    Keyword,
}

/// A ranked corpus entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarMatch {
    pub id: ExampleId,
    pub original_text: String,
    pub normalized_text: String,
    pub judgment: String,
    pub similarity: f64,
    pub score: u8,
    pub is_golden: bool,
    pub usage_count: u64,
    pub tier: MatchTier,
}

impl SimilarMatch {
    fn from_example(example: &Example, similarity: f64, tier: MatchTier) -> Self {
        Self {
            id: example.id,
            original_text: example.original_text.clone(),
            normalized_text: example.normalized_text.clone(),
            judgment: example.judgment.clone(),
            similarity,
            score: example.score,
            is_golden: example.is_golden,
            usage_count: example.usage_count,
            tier,
        }
    }
}

/// Parameters of one search.
#[derive(Debug, Clone)]
pub struct SimilarQuery<'a> {
    pub text: &'a str,
    pub threshold: f64,
    pub prefer_golden: bool,
    pub limit: usize,
    /// Run the keyword tier when tiers 1-3 find nothing.
    pub keyword_fallback: bool,
}

impl<'a> SimilarQuery<'a> {
    pub fn new(text: &'a str, threshold: f64) -> Self {
        Self {
            text,
            threshold,
            prefer_golden: true,
            limit: 3,
            keyword_fallback: true,
        }
    }

    pub fn with_prefer_golden(mut self, prefer: bool) -> Self {
        self.prefer_golden = prefer;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_keyword_fallback(mut self, enabled: bool) -> Self {
        self.keyword_fallback = enabled;
        self
    }
}

/// Similarity search over a [`Store`].
pub struct RetrievalEngine {
    store: Arc<dyn Store>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(store: Arc<dyn Store>, config: RetrievalConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// All four tiers.
    pub async fn find_similar(
        &self,
        text: &str,
        threshold: f64,
        prefer_golden: bool,
        limit: usize,
    ) -> Result<Vec<SimilarMatch>, StoreError> {
        let query = SimilarQuery::new(text, threshold)
            .with_prefer_golden(prefer_golden)
            .with_limit(limit);
        self.find(&query).await
    }

    /// Exact normalized matches only, best first.
    pub async fn find_exact(&self, text: &str) -> Result<Vec<SimilarMatch>, StoreError> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }
        let corpus = self.store.find_all_examples(false).await?;
        let mut exact = exact_tier(&corpus, &normalized);
        exact.sort_by(exact_order);
        Ok(exact)
    }

    pub async fn find(&self, query: &SimilarQuery<'_>) -> Result<Vec<SimilarMatch>, StoreError> {
        let normalized = normalize(query.text);
        if normalized.is_empty() || query.limit == 0 {
            return Ok(Vec::new());
        }

        let corpus = self.store.find_all_examples(false).await?;
        if corpus.is_empty() {
            return Ok(Vec::new());
        }

        let exact = exact_tier(&corpus, &normalized);
        if !exact.is_empty() {
            debug!(count = exact.len(), "exact tier hit");
            return Ok(truncate(rank_exact(exact, query.prefer_golden), query.limit));
        }

        let ratio_matches = self.ratio_tiers(&corpus, &normalized, query.threshold);
        if !ratio_matches.is_empty() {
            debug!(count = ratio_matches.len(), threshold = query.threshold, "ratio tiers hit");
            return Ok(truncate(
                rank_by_similarity(ratio_matches, query.prefer_golden),
                query.limit,
            ));
        }

        if !query.keyword_fallback {
            return Ok(Vec::new());
        }

        let mut keyword = self.keyword_tier(&corpus, &normalized);
        debug!(count = keyword.len(), "keyword tier");
        keyword.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        Ok(truncate(keyword, query.limit))
    }

    /// Near-duplicate and threshold tiers; each entry appears at most once.
    fn ratio_tiers(&self, corpus: &[Example], query: &str, threshold: f64) -> Vec<SimilarMatch> {
        let floor = threshold.min(self.config.near_duplicate_ratio);
        let mut matches = Vec::new();

        for example in corpus {
            if ratio_upper_bound(query, &example.normalized_text) < floor {
                continue;
            }
            let ratio = sequence_ratio(query, &example.normalized_text);

            if ratio >= self.config.near_duplicate_ratio {
                matches.push(SimilarMatch::from_example(
                    example,
                    self.config.near_duplicate_similarity,
                    MatchTier::NearDuplicate,
                ));
            } else if ratio >= threshold {
                let blended = self.config.sequence_weight * ratio
                    + self.config.overlap_weight * word_overlap(query, &example.normalized_text);
                if blended >= threshold {
                    matches.push(SimilarMatch::from_example(
                        example,
                        blended,
                        MatchTier::Threshold,
                    ));
                }
            }
        }
        matches
    }

    fn keyword_tier(&self, corpus: &[Example], query: &str) -> Vec<SimilarMatch> {
        let keywords = self.keywords(query);
        let Some(primary) = keywords.first() else {
            return Vec::new();
        };

        corpus
            .iter()
            .filter(|example| example.normalized_text.contains(primary.as_str()))
            .filter_map(|example| {
                let found = keywords
                    .iter()
                    .filter(|k| example.normalized_text.contains(k.as_str()))
                    .count();
                let fraction = found as f64 / keywords.len() as f64;
                (fraction >= self.config.keyword_min_fraction)
                    .then(|| SimilarMatch::from_example(example, fraction, MatchTier::Keyword))
            })
            .collect()
    }

    /// Content keywords of a normalized text in first-occurrence order.
    pub fn keywords(&self, normalized: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        tokens(normalized)
            .filter(|t| t.chars().count() > self.config.min_keyword_chars)
            .filter(|t| !self.config.stop_words.contains(*t))
            .filter(|t| seen.insert(*t))
            .take(self.config.max_keywords)
            .map(str::to_string)
            .collect()
    }
}

fn exact_tier(corpus: &[Example], normalized: &str) -> Vec<SimilarMatch> {
    corpus
        .iter()
        .filter(|e| e.normalized_text == normalized)
        .map(|e| SimilarMatch::from_example(e, 1.0, MatchTier::Exact))
        .collect()
}

fn exact_order(a: &SimilarMatch, b: &SimilarMatch) -> Ordering {
    b.is_golden
        .cmp(&a.is_golden)
        .then(b.score.cmp(&a.score))
        .then(b.usage_count.cmp(&a.usage_count))
}

fn rank_exact(mut matches: Vec<SimilarMatch>, prefer_golden: bool) -> Vec<SimilarMatch> {
    if prefer_golden && matches.iter().any(|m| m.is_golden) {
        matches.retain(|m| m.is_golden);
    }
    matches.sort_by(exact_order);
    matches
}

fn rank_by_similarity(mut matches: Vec<SimilarMatch>, prefer_golden: bool) -> Vec<SimilarMatch> {
    if prefer_golden && matches.iter().any(|m| m.is_golden) {
        matches.retain(|m| m.is_golden);
        matches.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(b.similarity.total_cmp(&a.similarity))
        });
    } else {
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    }
    matches
}

fn truncate(mut matches: Vec<SimilarMatch>, limit: usize) -> Vec<SimilarMatch> {
    matches.truncate(limit);
    matches
}
