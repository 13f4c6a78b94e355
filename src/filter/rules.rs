//! Query sanitization and the ordered rejection rules.

use crate::config::FilterConfig;

use super::blocklist::{squeeze_repeats, BlockedWordSet};

/// Why a query was rejected. Internal only: never sent to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    InvalidLength,
    BlockedWord,
    SpamPattern,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::InvalidLength => "invalid_length",
            RejectReason::BlockedWord => "blocked_word",
            RejectReason::SpamPattern => "spam_pattern",
        }
    }
}

/// Outcome of [`ContentFilter::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Allow,
    Reject(RejectReason),
}

/// A sanitized query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    /// Case-preserved text shown back to the caller.
    pub display: String,
    /// Lower-cased text used for matching.
    pub matching: String,
}

impl NormalizedQuery {
    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.display.chars().count()
    }
}

/// Strip control characters, trim, and collapse whitespace runs to one space.
pub fn sanitize(raw: &str) -> NormalizedQuery {
    let mut display = String::with_capacity(raw.len());
    let mut pending_space = false;

    for c in raw.chars() {
        if c.is_whitespace() {
            pending_space = !display.is_empty();
            continue;
        }
        if c.is_control() {
            continue;
        }
        if pending_space {
            display.push(' ');
            pending_space = false;
        }
        display.push(c);
    }

    let matching = display.to_lowercase();
    NormalizedQuery { display, matching }
}

/// Tokens for blocked-word matching: the lower-cased text split on every
/// non-alphanumeric character.
pub fn tokens(matching: &str) -> impl Iterator<Item = &str> {
    matching
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
}

/// Replace common digit substitutions (`s3x` → `sex`). Tokens without a letter
/// are left alone so numbers such as `108` never match.
fn fold_leetspeak(token: &str) -> Option<String> {
    if !token.chars().any(|c| c.is_ascii_digit()) || !token.chars().any(char::is_alphabetic) {
        return None;
    }
    Some(
        token
            .chars()
            .map(|c| match c {
                '0' => 'o',
                '1' => 'i',
                '3' => 'e',
                '4' => 'a',
                '5' => 's',
                '7' => 't',
                other => other,
            })
            .collect(),
    )
}

fn token_is_blocked(token: &str, blocked: &BlockedWordSet) -> bool {
    if blocked.contains(token) {
        return true;
    }

    let folded = fold_leetspeak(token);
    let candidate = folded.as_deref().unwrap_or(token);
    if folded.is_some() && blocked.contains(candidate) {
        return true;
    }

    // Squeezed matching only applies to tokens that actually repeated a
    // letter, otherwise short words could collide with squeezed entries.
    let squeezed = squeeze_repeats(candidate);
    squeezed.chars().count() < candidate.chars().count() && blocked.contains_squeezed(&squeezed)
}

fn longest_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut last = None;
    for c in text.chars() {
        if last == Some(c) {
            current += 1;
        } else {
            current = 1;
            last = Some(c);
        }
        longest = longest.max(current);
    }
    longest
}

fn special_char_ratio(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let special = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count();
    special as f64 / total as f64
}

/// Ordered rule pipeline. Pure: the same query and word set always produce
/// the same decision.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    config: FilterConfig,
}

impl ContentFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Apply the rules in order; the first match wins.
    pub fn validate(&self, query: &NormalizedQuery, blocked: &BlockedWordSet) -> FilterDecision {
        let len = query.char_len();
        if len < self.config.min_length || len > self.config.max_length {
            return FilterDecision::Reject(RejectReason::InvalidLength);
        }

        if tokens(&query.matching).any(|t| token_is_blocked(t, blocked)) {
            return FilterDecision::Reject(RejectReason::BlockedWord);
        }

        if longest_run(&query.display) > self.config.max_repeat_run
            || special_char_ratio(&query.display) > self.config.max_special_ratio
        {
            return FilterDecision::Reject(RejectReason::SpamPattern);
        }

        if tokens(&query.matching).next().is_none() {
            return FilterDecision::Reject(RejectReason::InvalidLength);
        }

        FilterDecision::Allow
    }

    /// Sanitize and validate in one step.
    pub fn check(&self, raw: &str, blocked: &BlockedWordSet) -> (NormalizedQuery, FilterDecision) {
        let query = sanitize(raw);
        let decision = self.validate(&query, blocked);
        (query, decision)
    }
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decide(raw: &str) -> FilterDecision {
        ContentFilter::default().check(raw, &BlockedWordSet::fallback()).1
    }

    // ================================================================
    // Sanitization
    // ================================================================

    #[test]
    fn test_sanitize_trims_and_collapses_whitespace() {
        let q = sanitize("  Spiritual \t\n  Teacher  ");
        assert_eq!(q.display, "Spiritual Teacher");
        assert_eq!(q.matching, "spiritual teacher");
    }

    #[test]
    fn test_sanitize_strips_control_characters() {
        let q = sanitize("gu\u{0007}ru\u{0000}");
        assert_eq!(q.display, "guru");
    }

    #[test]
    fn test_sanitize_keeps_diacritics_and_case() {
        let q = sanitize("Śrī Kṛṣṇa");
        assert_eq!(q.display, "Śrī Kṛṣṇa");
        assert_eq!(q.matching, "śrī kṛṣṇa");
        assert_eq!(q.char_len(), 9);
    }

    // ================================================================
    // Rule 1: length
    // ================================================================

    #[test]
    fn test_too_short_is_invalid_length() {
        assert_eq!(decide("x"), FilterDecision::Reject(RejectReason::InvalidLength));
        assert_eq!(decide("   "), FilterDecision::Reject(RejectReason::InvalidLength));
    }

    #[test]
    fn test_too_long_is_invalid_length() {
        let long = "bhakti ".repeat(40);
        assert_eq!(decide(&long), FilterDecision::Reject(RejectReason::InvalidLength));
    }

    #[test]
    fn test_length_is_counted_in_characters() {
        // More than 200 bytes but fewer than 200 characters.
        let ok = "Rādhā ".repeat(33);
        assert!(ok.trim().len() > 200);
        assert_eq!(decide(&ok), FilterDecision::Allow);

        let too_long = "Rādhā ".repeat(34);
        assert_eq!(
            decide(&too_long),
            FilterDecision::Reject(RejectReason::InvalidLength)
        );
    }

    #[test]
    fn test_length_checked_before_blocked_words() {
        let long = format!("{} kill", "word ".repeat(45));
        assert_eq!(decide(&long), FilterDecision::Reject(RejectReason::InvalidLength));
    }

    // ================================================================
    // Rule 2: blocked words
    // ================================================================

    #[test]
    fn test_blocked_word_any_case_and_punctuation() {
        for q in ["kill", "KILL the ego", "why (Kill)?", "hate.", "\"drug\""] {
            assert_eq!(
                decide(q),
                FilterDecision::Reject(RejectReason::BlockedWord),
                "query {q:?}"
            );
        }
    }

    #[test]
    fn test_blocked_word_must_be_whole_token() {
        assert_eq!(decide("skillful devotion"), FilterDecision::Allow);
        assert_eq!(decide("drugstore"), FilterDecision::Allow);
    }

    #[test]
    fn test_repeated_letter_obfuscation() {
        assert_eq!(decide("kiiill"), FilterDecision::Reject(RejectReason::BlockedWord));
        assert_eq!(decide("haaate"), FilterDecision::Reject(RejectReason::BlockedWord));
    }

    #[test]
    fn test_leetspeak_obfuscation() {
        assert_eq!(decide("s3x"), FilterDecision::Reject(RejectReason::BlockedWord));
        assert_eq!(decide("h4te"), FilterDecision::Reject(RejectReason::BlockedWord));
        assert_eq!(decide("108 names"), FilterDecision::Allow);
    }

    #[test]
    fn test_squeeze_does_not_flag_plain_short_words() {
        let blocked = BlockedWordSet::new(["ass"]);
        let filter = ContentFilter::default();
        assert_eq!(filter.check("as it is", &blocked).1, FilterDecision::Allow);
        assert_eq!(
            filter.check("aass", &blocked).1,
            FilterDecision::Reject(RejectReason::BlockedWord)
        );
    }

    // ================================================================
    // Rule 3: spam heuristics
    // ================================================================

    #[test]
    fn test_repeated_characters_are_spam() {
        assert_eq!(
            decide("aaaaaaaaaa!!!"),
            FilterDecision::Reject(RejectReason::SpamPattern)
        );
        // Five in a row is still fine.
        assert_eq!(decide("aaaaa bhakti"), FilterDecision::Allow);
    }

    #[test]
    fn test_special_character_ratio_is_spam() {
        assert_eq!(decide("?!?! love"), FilterDecision::Reject(RejectReason::SpamPattern));
        assert_eq!(decide("love & devotion"), FilterDecision::Allow);
    }

    #[test]
    fn test_blocked_word_wins_over_spam() {
        assert_eq!(
            decide("kill!!!!!!!!"),
            FilterDecision::Reject(RejectReason::BlockedWord)
        );
    }

    // ================================================================
    // Rule 4 and the happy path
    // ================================================================

    #[test]
    fn test_allows_ordinary_queries() {
        for q in ["spiritual teacher", "love", "devotional singing", "Radha-Krsna"] {
            assert_eq!(decide(q), FilterDecision::Allow, "query {q:?}");
        }
    }

    #[test]
    fn test_validate_is_deterministic() {
        let filter = ContentFilter::default();
        let blocked = BlockedWordSet::fallback();
        let first = filter.check("Nama Sankirtana", &blocked);
        let second = filter.check("Nama Sankirtana", &blocked);
        assert_eq!(first, second);
    }
}
