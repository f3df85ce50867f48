//! Deterministic local content heuristics: spam, profanity, misinformation.
//! These run on every evaluation, independent of any network call.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Result, SafetyError};

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s]+").expect("URL regex pattern is valid"));

static SPAM_PHRASES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "click here now",
        "act now",
        "limited time offer",
        "congratulations you won",
        "earn money fast",
    ]
});

static MISINFO_PHRASES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "miracle cure",
        "guaranteed income",
        "secret government",
        "instant wealth",
        "no-risk investment",
        "one weird trick",
    ]
});

#[derive(Debug, Clone, PartialEq)]
pub struct SpamCheck {
    pub is_spam: bool,
    pub reason: Option<String>,
}

impl SpamCheck {
    fn clean() -> Self {
        Self {
            is_spam: false,
            reason: None,
        }
    }

    fn spam(reason: &str) -> Self {
        Self {
            is_spam: true,
            reason: Some(reason.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MisinfoCheck {
    pub is_likely: bool,
    pub reason: Option<String>,
}

/// Whether the text contains a run of `min_run` or more identical
/// characters. The regex crate has no backreferences, so this is a
/// plain scan.
fn has_repeated_run(text: &str, min_run: usize) -> bool {
    let mut previous = None;
    let mut run = 0;
    for c in text.chars() {
        if previous == Some(c) {
            run += 1;
            if run >= min_run {
                return true;
            }
        } else {
            previous = Some(c);
            run = 1;
        }
    }
    false
}

/// Heuristic checks with a file-loaded profanity blocklist.
#[derive(Debug)]
pub struct ContentHeuristics {
    profanity_words: HashSet<String>,
}

impl ContentHeuristics {
    /// Load the profanity blocklist from a words file (one word per line,
    /// `#` comments and blank lines ignored).
    pub fn new(words_file: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(words_file.as_ref()).map_err(|e| {
            SafetyError::Config(format!(
                "Failed to load profanity words from {}: {}",
                words_file.as_ref().display(),
                e
            ))
        })?;

        let profanity_words = content
            .lines()
            .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
            .map(|line| line.trim().to_lowercase())
            .collect();

        Ok(Self { profanity_words })
    }

    /// Build from an explicit word set; used by tests and embedded callers.
    pub fn with_words(words: impl IntoIterator<Item = String>) -> Self {
        Self {
            profanity_words: words.into_iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    /// Spam detection over the content text alone.
    pub fn detect_spam(&self, text: &str) -> SpamCheck {
        if text.is_empty() {
            return SpamCheck::clean();
        }

        // Excessive capitalization
        let caps_count = text.chars().filter(|c| c.is_uppercase()).count();
        let caps_ratio = caps_count as f32 / text.chars().count() as f32;
        if caps_ratio > 0.7 && text.chars().count() > 20 {
            tracing::debug!("Spam indicator: excessive capitalization");
            return SpamCheck::spam("Excessive capitalization");
        }

        // Character runs like "!!!!!!" or "loooooool"
        if has_repeated_run(text, 6) {
            tracing::debug!("Spam indicator: repeated characters");
            return SpamCheck::spam("Repeated characters");
        }

        // Link stuffing
        let url_count = URL_PATTERN.find_iter(text).count();
        if url_count > 3 {
            tracing::debug!(url_count = %url_count, "Spam indicator: too many URLs");
            return SpamCheck::spam("Too many URLs");
        }

        // Known spam phrases
        let lower = text.to_lowercase();
        if SPAM_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
            tracing::debug!("Spam indicator: spam phrase");
            return SpamCheck::spam("Spam phrase detected");
        }

        SpamCheck::clean()
    }

    /// Case-insensitive token membership in the blocklist, word-boundary
    /// aware so substrings inside clean words do not trigger.
    pub fn contains_profanity(&self, text: &str) -> bool {
        if self.profanity_words.is_empty() {
            return false;
        }
        let lower = text.to_lowercase();
        lower
            .unicode_words()
            .any(|word| self.profanity_words.contains(word))
    }

    /// Misinformation heuristic: known-phrase substring membership.
    pub fn detect_misinformation(&self, text: &str) -> MisinfoCheck {
        let lower = text.to_lowercase();
        for phrase in MISINFO_PHRASES.iter() {
            if lower.contains(phrase) {
                return MisinfoCheck {
                    is_likely: true,
                    reason: Some(format!("Detected misinformation phrase: {}", phrase)),
                };
            }
        }
        MisinfoCheck {
            is_likely: false,
            reason: None,
        }
    }

    /// Count of links in the text, reused by rule evaluation context.
    pub fn count_links(text: &str) -> usize {
        URL_PATTERN.find_iter(text).count()
    }
}
