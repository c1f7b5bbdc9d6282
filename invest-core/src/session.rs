//! Per-user conversation state.

use crate::menu::Screen;
use crate::retrieval::SimilarMatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Identifies one end user (a chat id, a terminal, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for SessionId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// Where a session is in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BotState {
    MainMenu,
    AwaitingStory,
    ShowingSimilar,
    ShowingResult,
    Improving,
    ExportMenu,
    ShowingHistory,
    ShowingDatabase,
    ShowingStoryDetail,
    ShowingHelp,
    ShowingStats,
}

/// Where the judgment of an analysis came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    /// Fresh judge call.
    Judge,
    /// Reused from a stored example.
    Corpus,
    /// Memoized judge output.
    Cache,
}

/// The judgment currently shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub story: String,
    pub judgment: String,
    pub score: Option<u8>,
    pub source: AnalysisSource,
    /// Judged as an improved version of an earlier story.
    pub improved: bool,
    /// Similarity of the reused example, for corpus hits.
    pub similarity: Option<f64>,
    /// The corpus could not be searched before judging.
    pub search_unavailable: bool,
    pub analyzed_at: DateTime<Utc>,
}

impl Analysis {
    pub fn new(
        story: impl Into<String>,
        judgment: impl Into<String>,
        score: Option<u8>,
        source: AnalysisSource,
    ) -> Self {
        Self {
            story: story.into(),
            judgment: judgment.into(),
            score,
            source,
            improved: false,
            similarity: None,
            search_unavailable: false,
            analyzed_at: Utc::now(),
        }
    }

    pub fn improved(mut self, improved: bool) -> Self {
        self.improved = improved;
        self
    }

    pub fn with_similarity(mut self, similarity: f64) -> Self {
        self.similarity = Some(similarity);
        self
    }

    pub fn search_unavailable(mut self, unavailable: bool) -> Self {
        self.search_unavailable = unavailable;
        self
    }
}

/// One revision in an improvement chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainEntry {
    pub version: u32,
    pub text: String,
    /// Set once the revision has been judged.
    pub judgment: Option<String>,
    pub score: Option<u8>,
    pub created_at: DateTime<Utc>,
}

/// Ordered revisions of a story. Versions start at 1 and only grow.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImprovementChain {
    entries: Vec<ChainEntry>,
}

impl ImprovementChain {
    /// Append a revision and return its version.
    pub fn push(&mut self, text: impl Into<String>, judgment: Option<String>, score: Option<u8>) -> u32 {
        let version = self.entries.last().map_or(1, |e| e.version + 1);
        self.entries.push(ChainEntry {
            version,
            text: text.into(),
            judgment,
            score,
            created_at: Utc::now(),
        });
        version
    }

    pub fn latest(&self) -> Option<&ChainEntry> {
        self.entries.last()
    }

    /// Attach a judgment to the newest revision.
    pub fn judge_latest(&mut self, judgment: impl Into<String>, score: Option<u8>) {
        if let Some(entry) = self.entries.last_mut() {
            entry.judgment = Some(judgment.into());
            entry.score = score;
        }
    }

    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    pub fn versions(&self) -> Vec<u32> {
        self.entries.iter().map(|e| e.version).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A rendered screen remembered for `back`.
#[derive(Debug, Clone, PartialEq)]
pub struct NavEntry {
    pub screen: Screen,
    pub state: BotState,
}

/// Bounded stack of rendered screens; the oldest entry goes first.
#[derive(Debug, Clone)]
pub struct NavigationHistory {
    entries: VecDeque<NavEntry>,
    max_depth: usize,
}

impl NavigationHistory {
    pub fn new(max_depth: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_depth: max_depth.max(1),
        }
    }

    pub fn push(&mut self, entry: NavEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.max_depth {
            self.entries.pop_front();
        }
    }

    pub fn pop(&mut self) -> Option<NavEntry> {
        self.entries.pop_back()
    }

    pub fn peek(&self) -> Option<&NavEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.screen.label.as_str()).collect()
    }
}

/// Everything the bot remembers about one user.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub state: BotState,

    /// Story under discussion.
    pub current_story: Option<String>,

    pub last_analysis: Option<Analysis>,

    /// Ranked candidates offered on the similar-stories screen.
    pub similar: Vec<SimilarMatch>,

    pub chain: ImprovementChain,

    pub navigation: NavigationHistory,

    /// Corpus page currently on screen.
    pub db_page: Option<usize>,

    /// Analyses shown over the session's lifetime.
    pub analyses: u64,

    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId, navigation_depth: usize) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: BotState::MainMenu,
            current_story: None,
            last_analysis: None,
            similar: Vec::new(),
            chain: ImprovementChain::default(),
            navigation: NavigationHistory::new(navigation_depth),
            db_page: None,
            analyses: 0,
            created_at: now,
            last_active: now,
        }
    }

    /// Drop the ephemeral conversation. The last analysis and counters stay.
    pub fn restart(&mut self) {
        self.state = BotState::MainMenu;
        self.current_story = None;
        self.similar.clear();
        self.chain.clear();
        self.navigation.clear();
        self.db_page = None;
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::Menu;

    fn entry(label: &str) -> NavEntry {
        NavEntry {
            screen: Screen::new(label, label, Menu::new()),
            state: BotState::MainMenu,
        }
    }

    #[test]
    fn test_chain_versions_increase_from_one() {
        let mut chain = ImprovementChain::default();
        assert_eq!(chain.push("v1", Some("j".into()), Some(3)), 1);
        assert_eq!(chain.push("v2", None, None), 2);
        assert_eq!(chain.push("v3", None, None), 3);
        assert_eq!(chain.versions(), [1, 2, 3]);

        chain.judge_latest("better", Some(5));
        let latest = chain.latest().unwrap();
        assert_eq!(latest.text, "v3");
        assert_eq!(latest.judgment.as_deref(), Some("better"));
        assert_eq!(latest.score, Some(5));
    }

    #[test]
    fn test_navigation_drops_oldest_past_depth() {
        let mut nav = NavigationHistory::new(3);
        for label in ["a", "b", "c", "d"] {
            nav.push(entry(label));
        }
        assert_eq!(nav.labels(), ["b", "c", "d"]);
        assert_eq!(nav.pop().unwrap().screen.label, "d");
        assert_eq!(nav.peek().unwrap().screen.label, "c");
    }

    #[test]
    fn test_restart_keeps_last_analysis_and_counters() {
        let mut session = Session::new("u1".into(), 20);
        session.state = BotState::Improving;
        session.current_story = Some("story".into());
        session.chain.push("v1", None, None);
        session.navigation.push(entry("x"));
        session.analyses = 4;
        session.last_analysis = Some(Analysis::new("s", "j", Some(4), AnalysisSource::Judge));

        session.restart();

        assert_eq!(session.state, BotState::MainMenu);
        assert!(session.current_story.is_none());
        assert!(session.chain.is_empty());
        assert!(session.navigation.is_empty());
        assert!(session.similar.is_empty());
        assert_eq!(session.analyses, 4);
        assert!(session.last_analysis.is_some());
    }

    #[test]
    fn test_session_id_conversions() {
        assert_eq!(SessionId::from(42i64).as_str(), "42");
        assert_eq!(SessionId::from("abc").to_string(), "abc");
    }
}
