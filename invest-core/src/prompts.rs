//! Prompts sent to the judge and parsing of what comes back.

use lazy_static::lazy_static;
use regex::Regex;

/// Sender of one prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
}

/// One message of a judge prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }
}

const ANALYZE_SYSTEM: &str = "Анализируй User Story по критериям INVEST. Формат ответа:\n\
Оценка: X/6\n\
Проблемы: [только невыполненные критерии с кратким объяснением]\n\
Рекомендации: [1-2 конкретных совета]\n\n\
Пример:\n\
Оценка: 4/6\n\
Проблемы: N - нет обсуждаемости, E - сложно оценить\n\
Рекомендации: Добавить варианты реализации, уточнить детали";

const FIX_SYSTEM: &str = "Исправь User Story, сохранив цель. Сделай ее:\n\
- в формате «Как <роль>, я хочу <действие>, чтобы <цель>»\n\
- более четкой и конкретной\n\
- соответствующей критериям INVEST\n\
- с ясными критериями приемки\n\
Верни только исправленную версию.";

const IMPROVE_SYSTEM: &str = "Улучши User Story, сохранив цель и ценность.\n\n\
Что улучшать:\n\
1. Конкретные критерии приемки\n\
2. Ясность формулировок\n\
3. Обсуждаемость (Negotiable)\n\n\
Запрещено:\n\
- убирать существующие критерии приемки\n\
- делать историю менее конкретной\n\
- ухудшать тестируемость\n\n\
Ответ начинай со строки «Как <роль>, я хочу <действие>, чтобы <цель>», \
затем критерии приемки.";

const RESHAPE_SYSTEM: &str = "Перепиши текст строго в формате \
«Как <роль>, я хочу <действие>, чтобы <цель>». \
Сохрани смысл и критерии приемки, если они есть. Верни только результат.";

/// Ask for an INVEST judgment of a story.
pub fn analyze_prompt(story: &str) -> Vec<PromptMessage> {
    vec![
        PromptMessage::system(ANALYZE_SYSTEM),
        PromptMessage::user(format!("User Story: {story}")),
    ]
}

/// Ask for a corrected version of a story that failed the shape check.
pub fn fix_prompt(story: &str) -> Vec<PromptMessage> {
    vec![
        PromptMessage::system(FIX_SYSTEM),
        PromptMessage::user(format!("Исправь: {story}")),
    ]
}

/// Ask for an improved version, pointing at problems from a prior judgment.
pub fn improve_prompt(story: &str, judgment: Option<&str>) -> Vec<PromptMessage> {
    let mut content = format!("Улучши: {story}");
    if let Some(problems) = judgment.and_then(extract_problems) {
        content.push_str("\nУчти проблемы: ");
        content.push_str(&problems);
    }
    vec![PromptMessage::system(IMPROVE_SYSTEM), PromptMessage::user(content)]
}

/// Ask to force a reply back into the story template.
pub fn reshape_prompt(reply: &str) -> Vec<PromptMessage> {
    vec![
        PromptMessage::system(RESHAPE_SYSTEM),
        PromptMessage::user(reply.to_string()),
    ]
}

lazy_static! {
    static ref LABELED_SCORE: Regex =
        Regex::new(r"(?i)оценка\s*:?\s*(\d)\s*/\s*6\b").expect("valid labeled score regex");
    static ref BARE_SCORE: Regex = Regex::new(r"\b(\d)\s*/\s*6\b").expect("valid bare score regex");
    static ref SCORE_LINE: Regex =
        Regex::new(r"(?i)^.*(?:оценка|балл|score).*?(\d)").expect("valid score line regex");
}

/// Rubric score mentioned in a judgment, clamped to 6.
pub fn extract_score(judgment: &str) -> Option<u8> {
    let digit = LABELED_SCORE
        .captures(judgment)
        .or_else(|| BARE_SCORE.captures(judgment))
        .or_else(|| judgment.lines().find_map(|line| SCORE_LINE.captures(line)))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u8>().ok())?;
    Some(digit.min(6))
}

/// Markers of failed criteria and their short descriptions.
const FAILED_CRITERIA: &[(&[&str], &str)] = &[
    (&["I: ✗", "I (Independent): ✗", "Independent: ✗"], "зависит от других"),
    (&["N: ✗", "N (Negotiable): ✗", "Negotiable: ✗"], "нет обсуждаемости"),
    (&["E: ✗", "E (Estimable): ✗", "Estimable: ✗"], "сложно оценить"),
    (&["T: ✗", "T (Testable): ✗", "Testable: ✗"], "нет критериев тестирования"),
];

/// Short list of problems named in a judgment, if any.
///
/// Prefers an explicit "Проблемы:" line and falls back to ✗ markers.
pub fn extract_problems(judgment: &str) -> Option<String> {
    let labeled = judgment.lines().find_map(|line| {
        let line = line.trim();
        let rest = line
            .strip_prefix("Проблемы:")
            .or_else(|| line.strip_prefix("Problems:"))?;
        let rest = rest.trim();
        let none = rest.is_empty() || rest == "-" || rest.to_lowercase().starts_with("нет");
        (!none).then(|| rest.to_string())
    });
    if labeled.is_some() {
        return labeled;
    }

    let marked: Vec<&str> = FAILED_CRITERIA
        .iter()
        .filter(|(markers, _)| markers.iter().any(|m| judgment.contains(m)))
        .map(|(_, problem)| *problem)
        .collect();
    (!marked.is_empty()).then(|| marked.join(", "))
}

/// Cut text to at most `max_chars` characters, marking the cut.
pub fn truncate_for_display(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
