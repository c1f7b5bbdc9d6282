//! Testing utilities for the story bot.
//!
//! This module provides tools for integration testing:
//! - `MockJudge` for deterministic testing without API calls
//! - `FailingStore` for exercising storage outages
//! - `TestHarness` for scripted conversations
//! - Assertion helpers for verifying replies

use crate::bot::{Input, Reply, StoryBot};
use crate::config::BotConfig;
use crate::judge::{Judge, JudgeError};
use crate::menu::{Action, Screen};
use crate::prompts::PromptMessage;
use crate::session::{BotState, Session, SessionId};
use crate::store::{CorpusStats, Example, ExampleId, MemoryStore, NewExample, Store, StoreError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// A well-formed story used across tests.
pub const SAMPLE_STORY: &str =
    "Как клиент банка, я хочу видеть баланс счета, чтобы планировать расходы";

/// A judgment text carrying `score`.
pub fn judgment(score: u8) -> String {
    format!("Оценка: {score}/6\nI: ✓\nN: ✓\nV: ✓\nE: ✓\nS: ✓\nT: ✗")
}

/// A scripted reply from the mock judge.
#[derive(Debug, Clone)]
pub struct MockReply {
    outcome: Result<String, String>,
    delay: Option<Duration>,
}

impl MockReply {
    /// Reply with `text`.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            outcome: Ok(text.into()),
            delay: None,
        }
    }

    /// Reply with a judgment scoring `score`.
    pub fn scored(score: u8) -> Self {
        Self::text(judgment(score))
    }

    /// Fail with a backend error.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(message.into()),
            delay: None,
        }
    }

    /// Wait before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A judge that returns scripted replies in order.
///
/// Once the script runs out, every call gets the fallback reply.
pub struct MockJudge {
    replies: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    prompts: Mutex<Vec<Vec<PromptMessage>>>,
    calls: AtomicUsize,
    healthy: AtomicBool,
}

impl MockJudge {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: MockReply::scored(3),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            healthy: AtomicBool::new(true),
        }
    }

    pub fn with_fallback(mut self, reply: MockReply) -> Self {
        self.fallback = reply;
        self
    }

    /// Add a reply to the end of the script.
    pub async fn queue(&self, reply: MockReply) {
        self.replies.lock().await.push_back(reply);
    }

    /// Calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt received, oldest first.
    pub async fn prompts(&self) -> Vec<Vec<PromptMessage>> {
        self.prompts.lock().await.clone()
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl Judge for MockJudge {
    async fn judge(&self, prompt: &[PromptMessage]) -> Result<String, JudgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().await.push(prompt.to_vec());

        let reply = self
            .replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        reply.outcome.map_err(JudgeError::Backend)
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

/// A store where every call fails.
#[derive(Debug, Default)]
pub struct FailingStore;

impl FailingStore {
    fn fail<T>() -> Result<T, StoreError> {
        Err(StoreError::Backend("store unavailable".to_string()))
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn find_all_examples(&self, _only_golden: bool) -> Result<Vec<Example>, StoreError> {
        Self::fail()
    }

    async fn upsert_example(&self, _example: NewExample) -> Result<ExampleId, StoreError> {
        Self::fail()
    }

    async fn increment_usage(&self, _normalized_text: &str) -> Result<(), StoreError> {
        Self::fail()
    }

    async fn statistics(&self) -> Result<CorpusStats, StoreError> {
        Self::fail()
    }

    async fn paginate(&self, _page: usize, _page_size: usize) -> Result<Vec<Example>, StoreError> {
        Self::fail()
    }

    async fn get_by_id(&self, _id: ExampleId) -> Result<Option<Example>, StoreError> {
        Self::fail()
    }
}

/// A bot wired to a mock judge, talking as a single user.
pub struct TestHarness {
    pub bot: StoryBot,
    pub judge: Arc<MockJudge>,
    pub store: Arc<dyn Store>,
    pub session: SessionId,
}

impl TestHarness {
    /// Empty in-memory corpus, default configuration.
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), replies, BotConfig::default())
    }

    /// In-memory corpus holding `examples`.
    pub async fn with_corpus(examples: Vec<NewExample>, replies: Vec<MockReply>) -> Self {
        let store = MemoryStore::with_examples(examples).await;
        Self::with_store(Arc::new(store), replies, BotConfig::default())
    }

    pub fn with_store(store: Arc<dyn Store>, replies: Vec<MockReply>, config: BotConfig) -> Self {
        let judge = Arc::new(MockJudge::new(replies));
        let bot = StoryBot::new(Arc::clone(&store), judge.clone(), config);
        Self {
            bot,
            judge,
            store,
            session: SessionId::from("test-user"),
        }
    }

    /// Submit free text.
    pub async fn send(&self, text: &str) -> Reply {
        self.bot.handle(&self.session, Input::from(text)).await
    }

    /// Press a button.
    pub async fn press(&self, action: Action) -> Reply {
        self.bot.handle(&self.session, Input::Action(action)).await
    }

    /// Snapshot of the session.
    pub async fn session(&self) -> Session {
        self.bot.sessions().session(&self.session).await.lock().await.clone()
    }

    pub async fn state(&self) -> BotState {
        self.session().await.state
    }

    pub fn judge_calls(&self) -> usize {
        self.judge.calls()
    }
}

/// Assert the reply shows the screen labelled `label`.
#[track_caller]
pub fn assert_screen<'a>(reply: &'a Reply, label: &str) -> &'a Screen {
    match reply.screen() {
        Some(screen) => {
            assert_eq!(screen.label, label, "unexpected screen: {}", screen.text);
            screen
        }
        None => panic!("expected screen {label:?}, got {reply:?}"),
    }
}

/// Assert the reply offers a button for `action`.
#[track_caller]
pub fn assert_offers(reply: &Reply, action: Action) {
    let screen = reply
        .screen()
        .unwrap_or_else(|| panic!("expected a screen, got {reply:?}"));
    assert!(
        screen.menu.contains(action),
        "{action} not offered on {:?}",
        screen.label
    );
}

/// Assert the reply does not offer `action`.
#[track_caller]
pub fn assert_not_offered(reply: &Reply, action: Action) {
    if let Some(screen) = reply.screen() {
        assert!(
            !screen.menu.contains(action),
            "{action} unexpectedly offered on {:?}",
            screen.label
        );
    }
}
