//! The external judge: an LLM that grades and rewrites stories.
//!
//! Everything past [`Judge::judge`] is a black box. Replies are reduced to a
//! trimmed string at the adapter so nothing downstream has to care which
//! backend produced them.

use crate::prompts::{reshape_prompt, PromptMessage, PromptRole};
use crate::validate::looks_like_story;
use async_trait::async_trait;
use claude::{Claude, Message, Request};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from judge calls.
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("Claude error: {0}")]
    Claude(#[from] claude::Error),

    #[error("Judge backend error: {0}")]
    Backend(String),

    #[error("Judge returned an empty reply")]
    EmptyReply,

    #[error("Judge did not answer within {0:?}")]
    Timeout(Duration),
}

/// Something that can read a prompt and answer with text.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, prompt: &[PromptMessage]) -> Result<String, JudgeError>;

    /// Whether the backend is reachable right now.
    async fn health_check(&self) -> bool {
        true
    }
}

/// Reduce a raw reply to the text the rest of the crate works with.
pub fn normalize_reply(raw: &str) -> Result<String, JudgeError> {
    let text = raw.trim();
    if text.is_empty() {
        Err(JudgeError::EmptyReply)
    } else {
        Ok(text.to_string())
    }
}

/// [`Judge`] backed by the Claude Messages API.
pub struct ClaudeJudge {
    client: Claude,
    max_tokens: usize,
    temperature: f32,
}

impl ClaudeJudge {
    pub fn new(client: Claude) -> Self {
        Self {
            client,
            max_tokens: 1024,
            temperature: 0.3,
        }
    }

    /// Build from ANTHROPIC_API_KEY.
    pub fn from_env() -> Result<Self, JudgeError> {
        Ok(Self::new(Claude::from_env()?))
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn build_request(&self, prompt: &[PromptMessage]) -> Request {
        let system: Vec<&str> = prompt
            .iter()
            .filter(|m| m.role == PromptRole::System)
            .map(|m| m.content.as_str())
            .collect();
        let messages = prompt
            .iter()
            .filter(|m| m.role == PromptRole::User)
            .map(|m| Message::user(m.content.clone()))
            .collect();

        let mut request = Request::new(messages)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);
        if !system.is_empty() {
            request = request.with_system(system.join("\n\n"));
        }
        request
    }
}

#[async_trait]
impl Judge for ClaudeJudge {
    async fn judge(&self, prompt: &[PromptMessage]) -> Result<String, JudgeError> {
        let response = self.client.complete(self.build_request(prompt)).await?;
        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "judge replied"
        );
        normalize_reply(&response.text())
    }

    async fn health_check(&self) -> bool {
        match self.client.health_check().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Judge health check failed: {e}");
                false
            }
        }
    }
}

/// Call the judge, giving up after `timeout`.
pub async fn judge_within(
    judge: &dyn Judge,
    prompt: &[PromptMessage],
    timeout: Duration,
) -> Result<String, JudgeError> {
    tokio::time::timeout(timeout, judge.judge(prompt))
        .await
        .map_err(|_| JudgeError::Timeout(timeout))?
}

/// Outcome of [`rewrite_story`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub text: String,
    /// Judge calls made, including the first.
    pub calls: u32,
    /// Whether the final text has the story shape.
    pub well_formed: bool,
}

/// Ask for a rewrite and re-ask with a format fix while the reply is not a
/// story.
///
/// At most `max_reshapes` extra calls are made. A failed reshape call ends
/// the loop and the last good reply is kept. Only a failure of the first
/// call is an error.
pub async fn rewrite_story(
    judge: &dyn Judge,
    prompt: &[PromptMessage],
    max_reshapes: u32,
    timeout: Duration,
) -> Result<Rewrite, JudgeError> {
    let mut text = judge_within(judge, prompt, timeout).await?;
    let mut calls = 1;

    while !looks_like_story(&text) && calls <= max_reshapes {
        calls += 1;
        match judge_within(judge, &reshape_prompt(&text), timeout).await {
            Ok(reshaped) => text = reshaped,
            Err(e) => {
                warn!("Reshape attempt failed, keeping previous reply: {e}");
                break;
            }
        }
    }

    let well_formed = looks_like_story(&text);
    if !well_formed {
        debug!(calls, "rewrite still not in story shape");
    }
    Ok(Rewrite {
        text,
        calls,
        well_formed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::fix_prompt;
    use crate::testing::{MockJudge, MockReply};

    const STORY: &str = "Как клиент, я хочу видеть баланс, чтобы планировать расходы";

    #[test]
    fn test_normalize_reply() {
        assert_eq!(normalize_reply("  ok \n").unwrap(), "ok");
        assert!(matches!(normalize_reply(" \n\t"), Err(JudgeError::EmptyReply)));
    }

    #[test]
    fn test_claude_request_mapping() {
        let judge = ClaudeJudge::new(Claude::new("key").unwrap()).with_max_tokens(77);
        let prompt = vec![
            PromptMessage::system("a"),
            PromptMessage::user("question"),
            PromptMessage::system("b"),
        ];
        let request = judge.build_request(&prompt);
        assert_eq!(request.system.as_deref(), Some("a\n\nb"));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].content, "question");
        assert_eq!(request.max_tokens, 77);
    }

    #[tokio::test]
    async fn test_rewrite_valid_first_time() {
        let judge = MockJudge::new(vec![MockReply::text(STORY)]);
        let rewrite = rewrite_story(&judge, &fix_prompt("x"), 2, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(rewrite.text, STORY);
        assert_eq!(rewrite.calls, 1);
        assert!(rewrite.well_formed);
    }

    #[tokio::test]
    async fn test_rewrite_reshapes_until_valid() {
        let judge = MockJudge::new(vec![
            MockReply::text("Вот улучшенный вариант без шаблона"),
            MockReply::text(STORY),
        ]);
        let rewrite = rewrite_story(&judge, &fix_prompt("x"), 2, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(rewrite.text, STORY);
        assert_eq!(rewrite.calls, 2);
        assert_eq!(judge.calls(), 2);
    }

    #[tokio::test]
    async fn test_rewrite_gives_up_after_max_reshapes() {
        let judge = MockJudge::new(vec![
            MockReply::text("мимо 1"),
            MockReply::text("мимо 2"),
            MockReply::text("мимо 3"),
            MockReply::text(STORY),
        ]);
        let rewrite = rewrite_story(&judge, &fix_prompt("x"), 2, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(rewrite.text, "мимо 3");
        assert_eq!(rewrite.calls, 3);
        assert!(!rewrite.well_formed);
    }

    #[tokio::test]
    async fn test_rewrite_keeps_last_reply_when_reshape_fails() {
        let judge = MockJudge::new(vec![MockReply::text("мимо"), MockReply::error("down")]);
        let rewrite = rewrite_story(&judge, &fix_prompt("x"), 2, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(rewrite.text, "мимо");
        assert!(!rewrite.well_formed);
    }

    #[tokio::test]
    async fn test_first_call_failure_is_error() {
        let judge = MockJudge::new(vec![MockReply::error("down")]);
        let result = rewrite_story(&judge, &fix_prompt("x"), 2, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(JudgeError::Backend(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_judge_within_times_out() {
        let judge = MockJudge::new(vec![MockReply::text("late").delayed(Duration::from_secs(30))]);
        let result = judge_within(&judge, &fix_prompt("x"), Duration::from_secs(1)).await;
        assert!(matches!(result, Err(JudgeError::Timeout(_))));
    }
}
