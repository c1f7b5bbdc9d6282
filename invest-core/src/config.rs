//! Bot configuration.

use crate::retrieval::RetrievalConfig;
use crate::session_store::SessionPolicy;
use crate::validate::StoryLimits;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {name}")]
    Invalid { name: String, value: String },

    #[error("Inconsistent configuration: {0}")]
    Inconsistent(String),
}

/// Similarity thresholds tried in order when analysing a story.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// At or above this, the stored judgment is reused without asking.
    pub high: f64,
    /// Candidates worth offering.
    pub medium: f64,
    /// Weaker candidates, still offered.
    pub low: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high: 0.95,
            medium: 0.75,
            low: 0.60,
        }
    }
}

impl Thresholds {
    pub fn in_order(&self) -> [f64; 3] {
        [self.high, self.medium, self.low]
    }
}

/// Configuration for [`crate::bot::StoryBot`].
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub thresholds: Thresholds,

    /// Fresh judgments scoring at least this are saved as golden examples.
    pub golden_min_score: u8,

    /// Same, for judgments of improved versions.
    pub improved_golden_min_score: u8,

    pub limits: StoryLimits,

    /// Candidates offered on the similar-stories screen.
    pub max_candidates: usize,

    /// Depth of the per-session back stack.
    pub navigation_depth: usize,

    /// Corpus entries per database page.
    pub page_size: usize,

    pub search_cache_size: usize,
    pub search_cache_ttl: Duration,
    pub judgment_cache_size: usize,
    pub judgment_cache_ttl: Duration,

    pub judge_timeout: Duration,
    pub store_timeout: Duration,

    /// Extra judge calls allowed to force a rewrite into story shape.
    pub max_reshapes: u32,

    /// Longest judgment shown on screen, in characters.
    pub display_limit: usize,

    pub sessions: SessionPolicy,
    pub retrieval: RetrievalConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            golden_min_score: 5,
            improved_golden_min_score: 4,
            limits: StoryLimits::default(),
            max_candidates: 3,
            navigation_depth: 20,
            page_size: 5,
            search_cache_size: 1000,
            search_cache_ttl: Duration::from_secs(3600),
            judgment_cache_size: 1000,
            judgment_cache_ttl: Duration::from_secs(3600),
            judge_timeout: Duration::from_secs(60),
            store_timeout: Duration::from_secs(10),
            max_reshapes: 2,
            display_limit: 4000,
            sessions: SessionPolicy::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl BotConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(mut self, high: f64, medium: f64, low: f64) -> Self {
        self.thresholds = Thresholds { high, medium, low };
        self
    }

    pub fn with_golden_min_score(mut self, score: u8) -> Self {
        self.golden_min_score = score;
        self
    }

    pub fn with_improved_golden_min_score(mut self, score: u8) -> Self {
        self.improved_golden_min_score = score;
        self
    }

    pub fn with_max_story_chars(mut self, max: usize) -> Self {
        self.limits.max_chars = max;
        self
    }

    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max;
        self
    }

    pub fn with_navigation_depth(mut self, depth: usize) -> Self {
        self.navigation_depth = depth;
        self
    }

    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Size and ttl for both caches.
    pub fn with_cache(mut self, size: usize, ttl: Duration) -> Self {
        self.search_cache_size = size;
        self.search_cache_ttl = ttl;
        self.judgment_cache_size = size;
        self.judgment_cache_ttl = ttl;
        self
    }

    pub fn with_judge_timeout(mut self, timeout: Duration) -> Self {
        self.judge_timeout = timeout;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_max_reshapes(mut self, attempts: u32) -> Self {
        self.max_reshapes = attempts;
        self
    }

    pub fn with_sessions(mut self, policy: SessionPolicy) -> Self {
        self.sessions = policy;
        self
    }

    pub fn with_retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.retrieval = retrieval;
        self
    }

    /// Defaults overlaid with `INVEST_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse(&lookup, "INVEST_THRESHOLD_HIGH")? {
            config.thresholds.high = v;
        }
        if let Some(v) = parse(&lookup, "INVEST_THRESHOLD_MEDIUM")? {
            config.thresholds.medium = v;
        }
        if let Some(v) = parse(&lookup, "INVEST_THRESHOLD_LOW")? {
            config.thresholds.low = v;
        }
        if let Some(v) = parse(&lookup, "INVEST_GOLDEN_MIN_SCORE")? {
            config.golden_min_score = v;
        }
        if let Some(v) = parse(&lookup, "INVEST_IMPROVED_GOLDEN_MIN_SCORE")? {
            config.improved_golden_min_score = v;
        }
        if let Some(v) = parse(&lookup, "INVEST_MAX_STORY_CHARS")? {
            config.limits.max_chars = v;
        }
        if let Some(v) = parse(&lookup, "INVEST_PAGE_SIZE")? {
            config = config.with_page_size(v);
        }
        if let Some(v) = parse(&lookup, "INVEST_CACHE_SIZE")? {
            config.search_cache_size = v;
            config.judgment_cache_size = v;
        }
        if let Some(secs) = parse(&lookup, "INVEST_CACHE_TTL_SECS")? {
            config.search_cache_ttl = Duration::from_secs(secs);
            config.judgment_cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&lookup, "INVEST_JUDGE_TIMEOUT_SECS")? {
            config.judge_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = parse(&lookup, "INVEST_MAX_RESHAPES")? {
            config.max_reshapes = v;
        }
        if let Some(v) = parse(&lookup, "INVEST_NEAR_DUPLICATE_RATIO")? {
            config.retrieval = config.retrieval.with_near_duplicate_ratio(v);
        }
        if let Some(w) = parse::<f64, _>(&lookup, "INVEST_SEQUENCE_WEIGHT")? {
            config.retrieval = config.retrieval.with_weights(w, 1.0 - w);
        }
        if let Some(v) = parse(&lookup, "INVEST_MAX_KEYWORDS")? {
            config.retrieval = config.retrieval.with_max_keywords(v);
        }
        if let Some(words) = lookup("INVEST_STOP_WORDS").filter(|w| !w.trim().is_empty()) {
            config.retrieval = config.retrieval.with_stop_words(
                words
                    .split(',')
                    .map(|w| w.trim().to_lowercase())
                    .filter(|w| !w.is_empty()),
            );
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject threshold sets that cannot work together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Thresholds { high, medium, low } = self.thresholds;
        if ![high, medium, low].iter().all(|t| (0.0..=1.0).contains(t)) {
            return Err(ConfigError::Inconsistent(
                "similarity thresholds must lie in [0, 1]".to_string(),
            ));
        }
        if !(high >= medium && medium >= low) {
            return Err(ConfigError::Inconsistent(format!(
                "thresholds must not increase: {high} / {medium} / {low}"
            )));
        }
        let r = &self.retrieval;
        if !(0.0..=1.0).contains(&r.near_duplicate_ratio)
            || !(0.0..=1.0).contains(&r.sequence_weight)
            || !(0.0..=1.0).contains(&r.overlap_weight)
        {
            return Err(ConfigError::Inconsistent(
                "retrieval ratios and weights must lie in [0, 1]".to_string(),
            ));
        }
        if self.limits.min_chars > self.limits.max_chars {
            return Err(ConfigError::Inconsistent(
                "minimum story length exceeds maximum".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                name: name.to_string(),
                value: raw,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BotConfig::default();
        assert_eq!(config.thresholds.in_order(), [0.95, 0.75, 0.60]);
        assert_eq!(config.golden_min_score, 5);
        assert_eq!(config.improved_golden_min_score, 4);
        assert_eq!(config.limits.max_chars, 2000);
        assert_eq!(config.page_size, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = BotConfig::new()
            .with_thresholds(0.9, 0.7, 0.5)
            .with_page_size(0)
            .with_cache(10, Duration::from_secs(5))
            .with_judge_timeout(Duration::from_secs(3));
        assert_eq!(config.thresholds.medium, 0.7);
        assert_eq!(config.page_size, 1);
        assert_eq!(config.judgment_cache_size, 10);
        assert_eq!(config.judge_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_lookup_overrides() {
        let config = BotConfig::from_lookup(lookup(&[
            ("INVEST_THRESHOLD_MEDIUM", "0.8"),
            ("INVEST_GOLDEN_MIN_SCORE", "6"),
            ("INVEST_CACHE_TTL_SECS", "120"),
            ("INVEST_PAGE_SIZE", " "),
        ]))
        .unwrap();
        assert_eq!(config.thresholds.medium, 0.8);
        assert_eq!(config.golden_min_score, 6);
        assert_eq!(config.search_cache_ttl, Duration::from_secs(120));
        assert_eq!(config.page_size, 5);
    }

    #[test]
    fn test_lookup_retrieval_overrides() {
        let config = BotConfig::from_lookup(lookup(&[
            ("INVEST_NEAR_DUPLICATE_RATIO", "0.9"),
            ("INVEST_SEQUENCE_WEIGHT", "0.6"),
            ("INVEST_MAX_KEYWORDS", "2"),
            ("INVEST_STOP_WORDS", "Как, хочу ,,чтобы"),
        ]))
        .unwrap();
        let r = &config.retrieval;
        assert_eq!(r.near_duplicate_ratio, 0.9);
        assert_eq!(r.sequence_weight, 0.6);
        assert!((r.overlap_weight - 0.4).abs() < 1e-9);
        assert_eq!(r.max_keywords, 2);
        assert_eq!(r.stop_words.len(), 3);
        assert!(r.stop_words.contains("как"));

        let err = BotConfig::from_lookup(lookup(&[("INVEST_SEQUENCE_WEIGHT", "1.5")])).unwrap_err();
        assert!(matches!(err, ConfigError::Inconsistent(_)));
    }

    #[test]
    fn test_lookup_rejects_garbage() {
        let err = BotConfig::from_lookup(lookup(&[("INVEST_PAGE_SIZE", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref name, .. } if name == "INVEST_PAGE_SIZE"));
    }

    #[test]
    fn test_validate_threshold_order() {
        let err = BotConfig::new().with_thresholds(0.5, 0.7, 0.6).validate();
        assert!(matches!(err, Err(ConfigError::Inconsistent(_))));
        let err = BotConfig::new().with_thresholds(1.5, 0.7, 0.6).validate();
        assert!(err.is_err());
    }
}
