//! Shallow structural checks on submitted stories.
//!
//! These only look for the "role, action, goal" shape. They say nothing
//! about whether the story is any good; that is the judge's job.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

/// Why a submission was rejected before any lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("story is empty")]
    Empty,

    #[error("story is too short ({len} chars, minimum {min})")]
    TooShort { len: usize, min: usize },

    #[error("story is too long ({len} chars, maximum {max})")]
    TooLong { len: usize, max: usize },

    #[error("text does not follow the \"role, action, goal\" template")]
    NotAStory,
}

impl ValidationError {
    /// Whether asking the judge to rewrite the text could help.
    pub fn is_fixable(&self) -> bool {
        matches!(self, ValidationError::NotAStory | ValidationError::TooShort { .. })
    }
}

lazy_static! {
    static ref STORY_PATTERNS: Vec<Regex> = [
        r"(?s)^как\s+.+?,\s*я\s+хочу\s+.+?,\s*чтобы\s+.+?$",
        r"(?s)^как\s+.+?,\s*я\s+хочу\s+.+?,\s*что\s+бы\s+.+?$",
        r"(?s)^как\s+.+?,\s*мне\s+нужно\s+.+?,\s*чтобы\s+.+?$",
        r"(?s)^как\s+.+?,\s*я\s+могу\s+.+?,\s*чтобы\s+.+?$",
        r"(?s)^as\s+an?\s+.+?,\s*i\s+(?:want|need|can)\s+.+?,\s*so\s+that\s+.+?$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid story template regex"))
    .collect();
}

/// Length limits applied by [`validate_story`].
#[derive(Debug, Clone, Copy)]
pub struct StoryLimits {
    pub min_chars: usize,
    pub max_chars: usize,
}

impl Default for StoryLimits {
    fn default() -> Self {
        Self {
            min_chars: 10,
            max_chars: 2000,
        }
    }
}

/// True when the text has the user story shape.
///
/// Falls back to keyword presence for stories that skip the commas.
pub fn looks_like_story(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    if STORY_PATTERNS.iter().any(|p| p.is_match(&lowered)) {
        return true;
    }

    let long_enough = lowered.chars().count() > 20;
    let russian = ["как", "хочу", "чтобы"].iter().all(|k| lowered.contains(k));
    let english = ["as ", "want", "so that"].iter().all(|k| lowered.contains(k));
    long_enough && (russian || english)
}

/// Check a raw submission against the limits and the story shape.
pub fn validate_story(text: &str, limits: StoryLimits) -> Result<(), ValidationError> {
    let trimmed = text.trim();
    let len = trimmed.chars().count();

    if len == 0 {
        return Err(ValidationError::Empty);
    }
    if len > limits.max_chars {
        return Err(ValidationError::TooLong {
            len,
            max: limits.max_chars,
        });
    }
    if len < limits.min_chars {
        return Err(ValidationError::TooShort {
            len,
            min: limits.min_chars,
        });
    }
    if !looks_like_story(trimmed) {
        return Err(ValidationError::NotAStory);
    }
    Ok(())
}
