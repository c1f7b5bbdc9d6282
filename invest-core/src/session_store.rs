//! Process-wide table of sessions plus a short per-user analysis history.
//!
//! Each session sits behind its own async mutex. The bot holds that lock for
//! a whole action, so actions from one user never interleave while different
//! users proceed in parallel.

use crate::session::{Session, SessionId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

/// Bounds applied by [`SessionStore::sweep`] and [`SessionStore::record`].
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub max_sessions: usize,
    pub idle_ttl: Duration,
    pub max_history_per_user: usize,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
            idle_ttl: Duration::from_secs(24 * 60 * 60),
            max_history_per_user: 50,
        }
    }
}

impl SessionPolicy {
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }

    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history_per_user = max;
        self
    }
}

/// One past analysis of a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub story: String,
    pub judgment: String,
    pub score: Option<u8>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub active_sessions: usize,
    pub users_with_history: usize,
    pub recorded_analyses: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub idle: usize,
    pub overflow: usize,
}

struct Slot {
    session: Arc<Mutex<Session>>,
    last_seen: Instant,
}

impl Slot {
    /// Somebody besides the table holds the session right now.
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.session) > 1
    }
}

pub struct SessionStore {
    slots: RwLock<HashMap<SessionId, Slot>>,
    history: RwLock<HashMap<SessionId, VecDeque<HistoryRecord>>>,
    policy: SessionPolicy,
    navigation_depth: usize,
}

impl SessionStore {
    pub fn new(policy: SessionPolicy, navigation_depth: usize) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            history: RwLock::new(HashMap::new()),
            policy,
            navigation_depth,
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Fetch the session for `id`, creating it on first contact.
    pub async fn session(&self, id: &SessionId) -> Arc<Mutex<Session>> {
        let mut slots = self.slots.write().await;
        let depth = self.navigation_depth;
        let slot = slots.entry(id.clone()).or_insert_with(|| {
            debug!(session = %id, "new session");
            Slot {
                session: Arc::new(Mutex::new(Session::new(id.clone(), depth))),
                last_seen: Instant::now(),
            }
        });
        slot.last_seen = Instant::now();
        Arc::clone(&slot.session)
    }

    pub async fn contains(&self, id: &SessionId) -> bool {
        self.slots.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remember an analysis for `id`, dropping the oldest past the limit.
    pub async fn record(&self, id: &SessionId, story: &str, judgment: &str, score: Option<u8>) {
        let mut history = self.history.write().await;
        let records = history.entry(id.clone()).or_default();
        records.push_back(HistoryRecord {
            story: story.to_string(),
            judgment: judgment.to_string(),
            score,
            recorded_at: Utc::now(),
        });
        while records.len() > self.policy.max_history_per_user {
            records.pop_front();
        }
    }

    /// Past analyses of `id`, oldest first.
    pub async fn history(&self, id: &SessionId) -> Vec<HistoryRecord> {
        self.history
            .read()
            .await
            .get(id)
            .map(|records| records.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Evict idle sessions, then the least recently seen ones past the size
    /// limit. Sessions held by an in-flight request are left alone.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let mut removed = Vec::new();
        {
            let mut slots = self.slots.write().await;

            let idle: Vec<SessionId> = slots
                .iter()
                .filter(|(_, slot)| !slot.in_use() && slot.last_seen.elapsed() > self.policy.idle_ttl)
                .map(|(id, _)| id.clone())
                .collect();
            for id in idle {
                slots.remove(&id);
                removed.push(id);
                report.idle += 1;
            }

            if slots.len() > self.policy.max_sessions {
                let mut candidates: Vec<(SessionId, Instant)> = slots
                    .iter()
                    .filter(|(_, slot)| !slot.in_use())
                    .map(|(id, slot)| (id.clone(), slot.last_seen))
                    .collect();
                candidates.sort_by_key(|(_, seen)| *seen);

                let excess = slots.len() - self.policy.max_sessions;
                for (id, _) in candidates.into_iter().take(excess) {
                    slots.remove(&id);
                    removed.push(id);
                    report.overflow += 1;
                }
            }
        }

        if !removed.is_empty() {
            let mut history = self.history.write().await;
            for id in &removed {
                history.remove(id);
            }
            info!(idle = report.idle, overflow = report.overflow, "swept sessions");
        }
        report
    }

    pub async fn stats(&self) -> SessionStats {
        let active_sessions = self.slots.read().await.len();
        let history = self.history.read().await;
        SessionStats {
            active_sessions,
            users_with_history: history.len(),
            recorded_analyses: history.values().map(VecDeque::len).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::BotState;

    fn store(policy: SessionPolicy) -> SessionStore {
        SessionStore::new(policy, 20)
    }

    #[tokio::test]
    async fn test_get_or_create_returns_same_session() {
        let sessions = store(SessionPolicy::default());
        let id = SessionId::from("u1");

        sessions.session(&id).await.lock().await.state = BotState::Improving;
        let again = sessions.session(&id).await;
        assert_eq!(again.lock().await.state, BotState::Improving);
        assert_eq!(sessions.len().await, 1);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let sessions = store(SessionPolicy::default().with_max_history(3));
        let id = SessionId::from("u1");
        for i in 0..5 {
            sessions.record(&id, &format!("s{i}"), "j", Some(i)).await;
        }

        let history = sessions.history(&id).await;
        let stories: Vec<&str> = history.iter().map(|r| r.story.as_str()).collect();
        assert_eq!(stories, ["s2", "s3", "s4"]);
        assert!(sessions.history(&SessionId::from("nobody")).await.is_empty());

        let stats = sessions.stats().await;
        assert_eq!(stats.users_with_history, 1);
        assert_eq!(stats.recorded_analyses, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_idle_sessions() {
        let sessions = store(SessionPolicy::default().with_idle_ttl(Duration::from_secs(60)));
        let old = SessionId::from("old");
        let fresh = SessionId::from("fresh");

        sessions.session(&old).await;
        sessions.record(&old, "s", "j", None).await;
        tokio::time::advance(Duration::from_secs(45)).await;
        sessions.session(&fresh).await;
        tokio::time::advance(Duration::from_secs(30)).await;

        let report = sessions.sweep().await;
        assert_eq!(report, SweepReport { idle: 1, overflow: 0 });
        assert!(!sessions.contains(&old).await);
        assert!(sessions.contains(&fresh).await);
        assert!(sessions.history(&old).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_least_recent_past_capacity() {
        let sessions = store(SessionPolicy::default().with_max_sessions(2));
        for name in ["a", "b", "c"] {
            sessions.session(&SessionId::from(name)).await;
            tokio::time::advance(Duration::from_secs(1)).await;
        }

        let report = sessions.sweep().await;
        assert_eq!(report.overflow, 1);
        assert!(!sessions.contains(&SessionId::from("a")).await);
        assert_eq!(sessions.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_skips_sessions_in_use() {
        let sessions = store(SessionPolicy::default().with_idle_ttl(Duration::from_secs(1)));
        let id = SessionId::from("busy");
        let held = sessions.session(&id).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(sessions.sweep().await.idle, 0);
        drop(held);
        assert_eq!(sessions.sweep().await.idle, 1);
    }
}
