//! Text canonicalization.
//!
//! [`normalize`] produces the key used for exact corpus lookups and for every
//! cache key. Both uses must go through this one function.

/// Common misspellings replaced before punctuation is stripped.
const TYPO_FIXES: &[(&str, &str)] = &[
    ("чтлбы", "чтобы"),
    ("что бы", "чтобы"),
    ("чотбы", "чтобы"),
    ("востановить", "восстановить"),
    ("зарегестрироваться", "зарегистрироваться"),
    ("пользаватель", "пользователь"),
];

/// Punctuation outside ASCII that is stripped along with ASCII punctuation.
const EXTRA_PUNCTUATION: &[char] = &[
    '«', '»', '„', '“', '”', '‘', '’', '‚', '‹', '›', '—', '–', '‒', '―', '…', '•', '·',
];

fn is_stripped(c: char) -> bool {
    c.is_ascii_punctuation() || EXTRA_PUNCTUATION.contains(&c)
}

fn fix_typos(text: &str) -> String {
    let mut out = text.to_string();
    for (wrong, right) in TYPO_FIXES {
        if out.contains(wrong) {
            out = out.replace(wrong, right);
        }
    }
    out
}

/// Canonicalize a story for comparison.
///
/// Lowercases, fixes known typos, replaces punctuation with spaces and
/// collapses whitespace. The typo table runs again on the collapsed text so
/// that `normalize(normalize(x)) == normalize(x)` holds even when stripping
/// punctuation exposes a table entry.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let fixed = fix_typos(lowered.trim());

    let stripped: String = fixed
        .chars()
        .map(|c| if is_stripped(c) { ' ' } else { c })
        .collect();

    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    fix_typos(&collapsed)
}

/// Whitespace tokens of an already normalized text.
pub fn tokens(normalized: &str) -> impl Iterator<Item = &str> {
    normalized.split_whitespace()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_trim_and_collapse() {
        assert_eq!(normalize("  Как   Клиент\t\nБанка  "), "как клиент банка");
    }

    #[test]
    fn test_strips_ascii_and_locale_punctuation() {
        assert_eq!(
            normalize("Как «клиент», я хочу — войти… чтобы (быстро)!"),
            "как клиент я хочу войти чтобы быстро"
        );
    }

    #[test]
    fn test_punctuation_between_words_splits_them() {
        assert_eq!(normalize("слово,слово"), "слово слово");
    }

    #[test]
    fn test_typo_table() {
        assert_eq!(
            normalize("Как пользаватель, я хочу востановить пароль, что бы войти"),
            "как пользователь я хочу восстановить пароль чтобы войти"
        );
        assert_eq!(normalize("чтлбы чотбы"), "чтобы чтобы");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "Как клиент банка, я хочу видеть баланс, чтобы планировать расходы",
            "что, бы",
            "  «Что»   бы!!  ",
            "As a user, I want to log in, so that I can see my orders.",
            "",
            "...",
            "Зарегестрироваться — ВОСТАНОВИТЬ",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn test_only_punctuation_becomes_empty() {
        assert_eq!(normalize("?!…"), "");
    }

    #[test]
    fn test_tokens() {
        let n = normalize("Как клиент, я хочу");
        assert_eq!(tokens(&n).collect::<Vec<_>>(), ["как", "клиент", "я", "хочу"]);
    }
}
