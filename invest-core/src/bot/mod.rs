//! The conversation engine.
//!
//! [`StoryBot`] owns the shared pieces (store, judge, caches, sessions) and
//! turns one user input into one [`Reply`]. Transports only ever see
//! [`StoryBot::handle`]: errors come back as rendered screens, never as
//! panics or dropped messages.
//!
//! Session fields are written only after the external calls of an action
//! have succeeded, so a failed judge or store call leaves the conversation
//! where it was.

mod screens;

use crate::cache::{CacheStats, TtlCache};
use crate::config::BotConfig;
use crate::export::{export, ExportError, ExportFile, ExportFormat};
use crate::judge::{judge_within, rewrite_story, Judge, JudgeError};
use crate::menu::{Action, Screen};
use crate::normalize::normalize;
use crate::prompts::{analyze_prompt, extract_score, fix_prompt, improve_prompt, truncate_for_display};
use crate::retrieval::{RetrievalEngine, SimilarMatch, SimilarQuery};
use crate::session::{Analysis, AnalysisSource, BotState, NavEntry, Session, SessionId};
use crate::session_store::{SessionStats, SessionStore};
use crate::store::{CorpusStats, ExampleId, NewExample, Store, StoreError};
use crate::validate::{looks_like_story, validate_story, ValidationError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// What the user sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Free text, always treated as a story submission.
    Text(String),
    /// A button press.
    Action(Action),
}

impl From<Action> for Input {
    fn from(action: Action) -> Self {
        Input::Action(action)
    }
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Input::Text(text.to_string())
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Input::Text(text)
    }
}

/// What the transport should do in response.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Screen(Screen),
    /// Send a file, then the screen.
    Document { file: ExportFile, screen: Screen },
    /// Nothing changed; leave the current message alone.
    Unchanged,
}

impl Reply {
    pub fn screen(&self) -> Option<&Screen> {
        match self {
            Reply::Screen(screen) | Reply::Document { screen, .. } => Some(screen),
            Reply::Unchanged => None,
        }
    }
}

/// An action that makes no sense in the session's current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("no story is pending")]
    NoPendingStory,

    #[error("candidate {index} requested, {available} available")]
    CandidateOutOfRange { index: usize, available: usize },

    #[error("nothing has been analysed yet")]
    NoAnalysis,

    #[error("no improvement chain")]
    NoImprovementChain,

    #[error("story {0} not found")]
    StoryNotFound(ExampleId),
}

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Invalid story: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Judge error: {0}")]
    Judge(#[from] JudgeError),

    #[error("Unexpected action: {0}")]
    State(#[from] StateError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

impl BotError {
    /// Failures of an external service, where trying again may work.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BotError::Judge(_) | BotError::Store(_))
    }
}

/// Memoized judge output, keyed by normalized story.
#[derive(Debug, Clone)]
struct CachedJudgment {
    judgment: String,
    score: Option<u8>,
}

/// Counts calls on the way to the real judge.
struct MeteredJudge {
    inner: Arc<dyn Judge>,
    calls: AtomicU64,
}

impl MeteredJudge {
    fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Judge for MeteredJudge {
    async fn judge(&self, prompt: &[crate::prompts::PromptMessage]) -> Result<String, JudgeError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.judge(prompt).await
    }

    async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }
}

struct BotStats {
    started: Instant,
    started_at: DateTime<Utc>,
    messages: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time numbers for the stats screen and `#stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub messages: u64,
    pub errors: u64,
    pub judge_calls: u64,
    pub sessions: SessionStats,
    pub search_cache: CacheStats,
    pub judgment_cache: CacheStats,
    /// `None` when the store could not be reached.
    pub corpus: Option<CorpusStats>,
}

/// Result of one [`StoryBot::run_maintenance`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub search_expired: usize,
    pub judgments_expired: usize,
    pub sessions: crate::session_store::SweepReport,
}

pub struct StoryBot {
    config: BotConfig,
    store: Arc<dyn Store>,
    judge: MeteredJudge,
    retrieval: RetrievalEngine,
    search_cache: TtlCache<Vec<SimilarMatch>>,
    judgments: TtlCache<CachedJudgment>,
    sessions: SessionStore,
    stats: BotStats,
}

impl StoryBot {
    pub fn new(store: Arc<dyn Store>, judge: Arc<dyn Judge>, config: BotConfig) -> Self {
        let retrieval = RetrievalEngine::new(Arc::clone(&store), config.retrieval.clone());
        let search_cache = TtlCache::new("search", config.search_cache_size, config.search_cache_ttl);
        let judgments = TtlCache::new(
            "judgments",
            config.judgment_cache_size,
            config.judgment_cache_ttl,
        );
        let sessions = SessionStore::new(config.sessions.clone(), config.navigation_depth);

        Self {
            store,
            judge: MeteredJudge {
                inner: judge,
                calls: AtomicU64::new(0),
            },
            retrieval,
            search_cache,
            judgments,
            sessions,
            stats: BotStats {
                started: Instant::now(),
                started_at: Utc::now(),
                messages: AtomicU64::new(0),
                errors: AtomicU64::new(0),
            },
            config,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn retrieval(&self) -> &RetrievalEngine {
        &self.retrieval
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Judge calls made since startup.
    pub fn judge_calls(&self) -> u64 {
        self.judge.calls()
    }

    pub async fn judge_health(&self) -> bool {
        self.judge.health_check().await
    }

    /// Process one input and always produce something to show.
    ///
    /// Errors become an error screen. The screen is not pushed onto the
    /// back stack and the session state is left as it was.
    pub async fn handle(&self, id: &SessionId, input: Input) -> Reply {
        let retry = match &input {
            Input::Action(action) => Some(*action),
            Input::Text(_) => None,
        };

        match self.process(id, input).await {
            Ok(reply) => reply,
            Err(err) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                if err.is_retryable() {
                    warn!(session = %id, "Action failed: {err}");
                } else {
                    debug!(session = %id, "Action rejected: {err}");
                }
                Reply::Screen(screens::error(&err, retry))
            }
        }
    }

    /// Process one input, surfacing errors to the caller.
    pub async fn process(&self, id: &SessionId, input: Input) -> Result<Reply, BotError> {
        let handle = self.sessions.session(id).await;
        let mut session = handle.lock().await;
        session.touch();
        self.stats.messages.fetch_add(1, Ordering::Relaxed);

        match input {
            Input::Text(text) => self.analyze(&mut session, &text).await,
            Input::Action(action) => {
                debug!(session = %id, action = %action, state = ?session.state, "action");
                self.dispatch(&mut session, action).await
            }
        }
    }

    async fn dispatch(&self, session: &mut Session, action: Action) -> Result<Reply, BotError> {
        match action {
            Action::Begin => Ok(show(session, BotState::AwaitingStory, screens::awaiting_story())),
            Action::PickSimilar(index) => self.pick_similar(session, index).await,
            Action::UseOwn => self.use_own(session).await,
            Action::FixWithJudge => self.fix(session).await,
            Action::Improve => self.improve(session).await,
            Action::ImproveAgain => self.improve_again(session).await,
            Action::AnalyzeImproved => self.analyze_improved(session).await,
            Action::OpenExport => {
                if session.last_analysis.is_none() {
                    return Err(StateError::NoAnalysis.into());
                }
                Ok(show(session, BotState::ExportMenu, screens::export_menu()))
            }
            Action::ExportAs(format) => self.export_as(session, format),
            Action::SaveToCorpus => self.save(session).await,
            Action::Back => Ok(back(session)),
            Action::Restart => {
                session.restart();
                Ok(Reply::Screen(screens::main_menu()))
            }
            Action::ShowHistory => {
                if session.chain.is_empty() {
                    return Err(StateError::NoImprovementChain.into());
                }
                let screen = screens::history(&session.chain);
                Ok(show(session, BotState::ShowingHistory, screen))
            }
            Action::ShowDatabase(page) => self.show_database(session, page).await,
            Action::ShowStory(id) => self.show_story(session, id).await,
            Action::Help => Ok(show(session, BotState::ShowingHelp, screens::help())),
            Action::Stats => {
                let snapshot = self.stats().await;
                Ok(show(session, BotState::ShowingStats, screens::stats(&snapshot)))
            }
        }
    }

    /// Free-text submission: cache, then corpus tiers, then the judge.
    async fn analyze(&self, session: &mut Session, text: &str) -> Result<Reply, BotError> {
        let story = text.trim();
        if let Err(err) = validate_story(story, self.config.limits) {
            debug!(reason = %err, "story rejected");
            start_story(session, story);
            return Ok(show(session, BotState::AwaitingStory, screens::invalid_story(&err)));
        }

        let normalized = normalize(story);
        if let Some(analysis) = self.cached_analysis(story, &normalized, false).await {
            start_story(session, story);
            return Ok(self.finish(session, analysis).await);
        }

        let mut search_unavailable = false;
        for threshold in self.config.thresholds.in_order() {
            let matches = match self.search(story, &normalized, threshold).await {
                Ok(matches) => matches,
                Err(e) => {
                    warn!("Retrieval failed, falling back to the judge: {e}");
                    search_unavailable = true;
                    break;
                }
            };
            let Some(top) = matches.first() else {
                continue;
            };

            if threshold >= self.config.thresholds.high {
                info!(id = %top.id, similarity = top.similarity, "reusing stored judgment");
                let analysis = corpus_analysis(story, top);
                self.bump_usage(&top.normalized_text).await;
                start_story(session, story);
                return Ok(self.finish(session, analysis).await);
            }

            debug!(threshold, count = matches.len(), "offering similar stories");
            start_story(session, story);
            let screen = screens::similar(story, &matches);
            session.similar = matches;
            return Ok(show(session, BotState::ShowingSimilar, screen));
        }

        let analysis = self
            .ask_judge(story, normalized, false)
            .await?
            .search_unavailable(search_unavailable);
        start_story(session, story);
        Ok(self.finish(session, analysis).await)
    }

    async fn pick_similar(&self, session: &mut Session, index: usize) -> Result<Reply, BotError> {
        let chosen = session
            .similar
            .get(index)
            .cloned()
            .ok_or(StateError::CandidateOutOfRange {
                index,
                available: session.similar.len(),
            })?;

        self.bump_usage(&chosen.normalized_text).await;
        let analysis = corpus_analysis(&chosen.original_text, &chosen);
        Ok(self.finish(session, analysis).await)
    }

    /// Judge the pending story, skipping the fuzzy tiers.
    async fn use_own(&self, session: &mut Session) -> Result<Reply, BotError> {
        let story = session
            .current_story
            .clone()
            .ok_or(StateError::NoPendingStory)?;
        self.check_length(&story)?;

        let normalized = normalize(&story);
        let analysis = match self.cached_analysis(&story, &normalized, false).await {
            Some(analysis) => analysis,
            None => {
                let exact = match self.with_store_timeout(self.retrieval.find_exact(&story)).await {
                    Ok(matches) => matches.into_iter().next(),
                    Err(e) => {
                        warn!("Exact lookup failed, falling back to the judge: {e}");
                        None
                    }
                };
                match exact {
                    Some(top) => {
                        self.bump_usage(&top.normalized_text).await;
                        corpus_analysis(&story, &top)
                    }
                    None => self.ask_judge(&story, normalized, false).await?,
                }
            }
        };

        session.similar.clear();
        Ok(self.finish(session, analysis).await)
    }

    async fn fix(&self, session: &mut Session) -> Result<Reply, BotError> {
        let story = session
            .current_story
            .clone()
            .ok_or(StateError::NoPendingStory)?;
        self.check_length(&story)?;

        info!(story = %preview(&story), "fixing story");
        let rewrite = rewrite_story(
            &self.judge,
            &fix_prompt(&story),
            self.config.max_reshapes,
            self.config.judge_timeout,
        )
        .await?;

        let screen = screens::fixed(&rewrite.text, rewrite.well_formed);
        session.current_story = Some(rewrite.text);
        session.similar.clear();
        Ok(show(session, BotState::Improving, screen))
    }

    async fn improve(&self, session: &mut Session) -> Result<Reply, BotError> {
        let base = match (session.state, session.chain.latest()) {
            (BotState::Improving, Some(latest)) => {
                (latest.text.clone(), latest.judgment.clone(), latest.score)
            }
            _ => match (&session.last_analysis, &session.current_story) {
                (Some(analysis), _) => (
                    analysis.story.clone(),
                    Some(analysis.judgment.clone()),
                    analysis.score,
                ),
                (None, Some(story)) => (story.clone(), None, None),
                (None, None) => return Err(StateError::NoPendingStory.into()),
            },
        };
        self.extend_chain(session, base).await
    }

    async fn improve_again(&self, session: &mut Session) -> Result<Reply, BotError> {
        let latest = session
            .chain
            .latest()
            .ok_or(StateError::NoImprovementChain)?;
        let base = (latest.text.clone(), latest.judgment.clone(), latest.score);
        self.extend_chain(session, base).await
    }

    /// Rewrite `base` and append the result to the chain, seeding the chain
    /// with `base` itself when it is not already the latest entry.
    async fn extend_chain(
        &self,
        session: &mut Session,
        (text, judgment, score): (String, Option<String>, Option<u8>),
    ) -> Result<Reply, BotError> {
        info!(story = %preview(&text), "improving story");
        let rewrite = rewrite_story(
            &self.judge,
            &improve_prompt(&text, judgment.as_deref()),
            self.config.max_reshapes,
            self.config.judge_timeout,
        )
        .await?;

        if session.chain.latest().map(|e| e.text.as_str()) != Some(text.as_str()) {
            session.chain.push(text, judgment, score);
        }
        let version = session.chain.push(rewrite.text.clone(), None, None);
        debug!(version, calls = rewrite.calls, "chain extended");

        let screen = screens::improved(version, &rewrite.text, rewrite.well_formed);
        Ok(show(session, BotState::Improving, screen))
    }

    async fn analyze_improved(&self, session: &mut Session) -> Result<Reply, BotError> {
        let latest = session
            .chain
            .latest()
            .map(|e| e.text.clone())
            .ok_or(StateError::NoImprovementChain)?;

        let normalized = normalize(&latest);
        let analysis = match self.cached_analysis(&latest, &normalized, true).await {
            Some(analysis) => analysis,
            None => self.ask_judge(&latest, normalized, true).await?,
        };

        session
            .chain
            .judge_latest(analysis.judgment.clone(), analysis.score);
        session.current_story = Some(latest);
        Ok(self.finish(session, analysis).await)
    }

    fn export_as(&self, session: &mut Session, format: ExportFormat) -> Result<Reply, BotError> {
        let analysis = session
            .last_analysis
            .as_ref()
            .ok_or(StateError::NoAnalysis)?;
        let file = export(format, &analysis.story, &analysis.judgment)?;
        let screen = screens::exported(analysis, format, !session.chain.is_empty());

        info!(format = format.extension(), "exported analysis");
        enter(session, BotState::ShowingResult, &screen);
        Ok(Reply::Document { file, screen })
    }

    /// Persist the last analysis as a regular (non-golden) example.
    async fn save(&self, session: &mut Session) -> Result<Reply, BotError> {
        let analysis = session
            .last_analysis
            .clone()
            .ok_or(StateError::NoAnalysis)?;

        let mut example = NewExample::new(analysis.story.as_str(), analysis.judgment.as_str());
        if let Some(score) = analysis.score {
            example = example.with_score(score);
        }
        let id = self
            .with_store_timeout(self.store.upsert_example(example))
            .await?;
        self.search_cache.clear().await;
        info!(%id, "saved analysis to corpus");

        let screen = screens::saved(&analysis, !session.chain.is_empty(), self.config.display_limit);
        Ok(show(session, BotState::ShowingResult, screen))
    }

    async fn show_database(&self, session: &mut Session, page: usize) -> Result<Reply, BotError> {
        let page_size = self.config.page_size.max(1);
        let stats = self.with_store_timeout(self.store.statistics()).await?;
        let pages = (stats.total as usize).div_ceil(page_size).max(1);
        let page = page.min(pages - 1);
        if session.state == BotState::ShowingDatabase && session.db_page == Some(page) {
            return Ok(Reply::Unchanged);
        }

        let rows = self
            .with_store_timeout(self.store.paginate(page, page_size))
            .await?;

        let screen = screens::database(&rows, page, pages, stats.total);
        let reply = show(session, BotState::ShowingDatabase, screen);
        session.db_page = Some(page);
        Ok(reply)
    }

    async fn show_story(&self, session: &mut Session, id: ExampleId) -> Result<Reply, BotError> {
        let example = self
            .with_store_timeout(self.store.get_by_id(id))
            .await?
            .ok_or(StateError::StoryNotFound(id))?;

        let page = session.db_page.unwrap_or(0);
        let screen = screens::story_detail(&example, page, self.config.display_limit);
        Ok(show(session, BotState::ShowingStoryDetail, screen))
    }

    /// Record the analysis and show it.
    async fn finish(&self, session: &mut Session, analysis: Analysis) -> Reply {
        session.analyses += 1;
        self.sessions
            .record(&session.id, &analysis.story, &analysis.judgment, analysis.score)
            .await;

        let screen = screens::result(&analysis, !session.chain.is_empty(), self.config.display_limit);
        session.last_analysis = Some(analysis);
        show(session, BotState::ShowingResult, screen)
    }

    async fn cached_analysis(&self, story: &str, normalized: &str, improved: bool) -> Option<Analysis> {
        let cached = self.judgments.get(normalized).await?;
        debug!(story = %preview(story), "judgment cache hit");
        Some(
            Analysis::new(story, cached.judgment, cached.score, AnalysisSource::Cache)
                .improved(improved),
        )
    }

    /// Fresh judge call. Caches the judgment and auto-saves good stories.
    async fn ask_judge(
        &self,
        story: &str,
        normalized: String,
        improved: bool,
    ) -> Result<Analysis, BotError> {
        info!(story = %preview(story), improved, "asking the judge");
        let judgment = judge_within(&self.judge, &analyze_prompt(story), self.config.judge_timeout).await?;
        let score = extract_score(&judgment);

        self.judgments
            .set(
                normalized,
                CachedJudgment {
                    judgment: judgment.clone(),
                    score,
                },
            )
            .await;
        self.auto_save(story, &judgment, score, improved).await;

        Ok(Analysis::new(story, judgment, score, AnalysisSource::Judge).improved(improved))
    }

    /// Best effort: a failed save never affects the analysis shown.
    async fn auto_save(&self, story: &str, judgment: &str, score: Option<u8>, improved: bool) {
        let min = if improved {
            self.config.improved_golden_min_score
        } else {
            self.config.golden_min_score
        };
        let Some(score) = score.filter(|s| *s >= min) else {
            return;
        };
        if !looks_like_story(story) {
            return;
        }

        let example = NewExample::new(story, judgment)
            .with_golden(true)
            .with_score(score);
        match self.with_store_timeout(self.store.upsert_example(example)).await {
            Ok(id) => {
                self.search_cache.clear().await;
                info!(%id, score, "saved golden example");
            }
            Err(e) => warn!("Auto-save failed: {e}"),
        }
    }

    /// Corpus search at one threshold, memoized per threshold and text.
    async fn search(
        &self,
        story: &str,
        normalized: &str,
        threshold: f64,
    ) -> Result<Vec<SimilarMatch>, StoreError> {
        let key = format!("{threshold:.2}:{normalized}");
        if let Some(matches) = self.search_cache.get(&key).await {
            return Ok(matches);
        }

        let query = SimilarQuery::new(story, threshold)
            .with_limit(self.config.max_candidates)
            .with_keyword_fallback(false);
        let matches = self.with_store_timeout(self.retrieval.find(&query)).await?;
        self.search_cache.set(key, matches.clone()).await;
        Ok(matches)
    }

    async fn bump_usage(&self, normalized: &str) {
        if let Err(e) = self
            .with_store_timeout(self.store.increment_usage(normalized))
            .await
        {
            warn!("Failed to record usage: {e}");
        }
    }

    fn check_length(&self, story: &str) -> Result<(), ValidationError> {
        match validate_story(story, self.config.limits) {
            Err(e @ (ValidationError::Empty | ValidationError::TooLong { .. })) => Err(e),
            _ => Ok(()),
        }
    }

    async fn with_store_timeout<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let limit = self.config.store_timeout;
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| StoreError::Timeout(limit))?
    }

    pub async fn stats(&self) -> StatsSnapshot {
        let corpus = match self.with_store_timeout(self.store.statistics()).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("Corpus statistics unavailable: {e}");
                None
            }
        };

        StatsSnapshot {
            started_at: self.stats.started_at,
            uptime_secs: self.stats.started.elapsed().as_secs(),
            messages: self.stats.messages.load(Ordering::Relaxed),
            errors: self.stats.errors.load(Ordering::Relaxed),
            judge_calls: self.judge.calls(),
            sessions: self.sessions.stats().await,
            search_cache: self.search_cache.stats().await,
            judgment_cache: self.judgments.stats().await,
            corpus,
        }
    }

    /// Drop expired cache entries and stale sessions.
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        let (search_expired, judgments_expired, sessions) = futures::join!(
            self.search_cache.sweep_expired(),
            self.judgments.sweep_expired(),
            self.sessions.sweep()
        );
        if search_expired + judgments_expired > 0 {
            debug!(search_expired, judgments_expired, "swept caches");
        }
        MaintenanceReport {
            search_expired,
            judgments_expired,
            sessions,
        }
    }
}

/// A new story replaces the pending text and its candidates. The
/// improvement chain is only cleared by a restart.
fn start_story(session: &mut Session, story: &str) {
    session.current_story = Some(story.to_string());
    session.similar.clear();
}

fn corpus_analysis(story: &str, found: &SimilarMatch) -> Analysis {
    let score = (found.score > 0).then_some(found.score);
    Analysis::new(story, found.judgment.as_str(), score, AnalysisSource::Corpus)
        .with_similarity(found.similarity)
}

fn enter(session: &mut Session, state: BotState, screen: &Screen) {
    session.state = state;
    if state != BotState::ShowingDatabase {
        session.db_page = None;
    }
    session.navigation.push(NavEntry {
        screen: screen.clone(),
        state,
    });
}

fn show(session: &mut Session, state: BotState, screen: Screen) -> Reply {
    enter(session, state, &screen);
    Reply::Screen(screen)
}

/// Pop one screen. With nothing left to return to, land on the main menu.
fn back(session: &mut Session) -> Reply {
    if session.navigation.len() > 1 {
        session.navigation.pop();
        if let Some(top) = session.navigation.peek() {
            let screen = top.screen.clone();
            session.state = top.state;
            // the restored listing may be a different page than db_page
            session.db_page = None;
            return Reply::Screen(screen);
        }
    }
    session.navigation.clear();
    session.state = BotState::MainMenu;
    session.db_page = None;
    Reply::Screen(screens::main_menu())
}

fn preview(story: &str) -> String {
    truncate_for_display(story, 50)
}
