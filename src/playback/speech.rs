//! Text normalization and duration estimation for spoken announcements.
//!
//! Normalization is purely textual: multi-digit tokens are expanded
//! digit-by-digit so the engine reads "2025" as four digits instead of
//! "two thousand twenty-five", and run-on punctuation is softened into
//! comma pauses. No timing behavior is attached here; the duration
//! estimate is computed from the raw text.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::MIN_SPEECH_DURATION_SECS;

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{2,}").unwrap());
static PAUSE_PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[;:\u{2013}\u{2014}]+").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Expand every multi-digit run into space-separated digits.
pub fn expand_digits(text: &str) -> String {
    DIGIT_RUN
        .replace_all(text, |caps: &regex::Captures<'_>| {
            caps[0]
                .chars()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .into_owned()
}

/// Soften connective punctuation into comma pauses.
pub fn insert_pauses(text: &str) -> String {
    PAUSE_PUNCTUATION.replace_all(text, ", ").into_owned()
}

/// Full normalization pipeline applied before handing text to the
/// speech engine.
pub fn normalize_for_speech(text: &str) -> String {
    let expanded = expand_digits(text);
    let paused = insert_pauses(&expanded);
    WHITESPACE_RUN
        .replace_all(paused.trim(), " ")
        .into_owned()
}

/// Estimate how long the engine will take to speak `text`.
///
/// Word count over the assumed words-per-minute rate, floored at the
/// configured minimum so even one-word announcements hold the lock long
/// enough for engine startup and trailing silence.
pub fn estimate_speech_duration(text: &str, words_per_minute: u32) -> Duration {
    let words = text.split_whitespace().count() as f64;
    let wpm = f64::from(words_per_minute.max(1));
    let estimated = Duration::from_secs_f64(words * 60.0 / wpm);
    estimated.max(Duration::from_secs(MIN_SPEECH_DURATION_SECS))
}
