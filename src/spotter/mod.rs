//! Phrase spotting: short phrases located independently in the audio, used
//! to reward matching word entries during alignment.

pub mod simple;

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::AlignmentError;

pub use simple::SimplePhraseSpotter;

/// Default distance in seconds between a spotted phrase start and a word entry.
pub const DEFAULT_TIME_THRESHOLD: f32 = 0.04;

/// Tolerance used when comparing two spotted occurrences.
const INTERVAL_TOLERANCE: f32 = 0.05;

fn non_word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\W+").expect("non-word pattern is valid"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhraseSpotterResult {
    phrase_text: String,
    start_time: f32,
    end_time: f32,
    words: Vec<String>,
}

impl PhraseSpotterResult {
    pub fn new(phrase_text: &str, start_time: f32, end_time: f32) -> Result<Self, AlignmentError> {
        if start_time.is_nan() || end_time.is_nan() || start_time > end_time {
            return Err(AlignmentError::invalid_input(format!(
                "phrase \"{phrase_text}\" starts at {start_time}s after it ends at {end_time}s"
            )));
        }
        let words = non_word_regex()
            .split(phrase_text)
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self {
            phrase_text: phrase_text.to_string(),
            start_time,
            end_time,
            words,
        })
    }

    pub fn phrase_text(&self) -> &str {
        &self.phrase_text
    }

    pub fn start_time(&self) -> f32 {
        self.start_time
    }

    pub fn end_time(&self) -> f32 {
        self.end_time
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn first_word(&self) -> Option<&str> {
        self.words.first().map(String::as_str)
    }

    pub fn last_word(&self) -> Option<&str> {
        self.words.last().map(String::as_str)
    }

    /// Same occurrence, give or take 50 ms on either end.
    pub fn matches_interval(&self, other: &Self) -> bool {
        (self.start_time - other.start_time).abs() < INTERVAL_TOLERANCE
            && (self.end_time - other.end_time).abs() < INTERVAL_TOLERANCE
    }
}

impl fmt::Display for PhraseSpotterResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.phrase_text, self.start_time, self.end_time)
    }
}

/// Spotted phrases ordered by start time. Filled once before alignment,
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct PhraseSpotRegistry {
    results: Vec<PhraseSpotterResult>,
    time_threshold: f32,
}

impl Default for PhraseSpotRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_THRESHOLD)
    }
}

impl PhraseSpotRegistry {
    pub fn new(time_threshold: f32) -> Self {
        Self {
            results: Vec::new(),
            time_threshold,
        }
    }

    pub fn set_results(&mut self, mut results: Vec<PhraseSpotterResult>) {
        results.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        tracing::debug!(phrases = results.len(), "spotter: registry filled");
        self.results = results;
    }

    pub fn results(&self) -> &[PhraseSpotterResult] {
        &self.results
    }

    /// Distinct start times in ascending order.
    pub fn start_times(&self) -> Vec<f32> {
        let mut times: Vec<f32> = self.results.iter().map(|r| r.start_time).collect();
        times.dedup();
        times
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// True when a spotted phrase starting within the time threshold of
    /// `time` begins with `word` (case-insensitive).
    pub fn contains(&self, word: &str, time: f32) -> bool {
        let low = time - self.time_threshold;
        let high = time + self.time_threshold;
        let first = self.results.partition_point(|r| r.start_time <= low);
        self.results[first..]
            .iter()
            .take_while(|r| r.start_time < high)
            .any(|r| {
                (r.start_time - time).abs() < self.time_threshold
                    && r.first_word().is_some_and(|w| eq_ignore_case(w, word))
            })
    }
}

pub(crate) fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(text: &str, start: f32, end: f32) -> PhraseSpotterResult {
        PhraseSpotterResult::new(text, start, end).unwrap()
    }

    #[test]
    fn words_are_split_on_non_word_runs() {
        let r = result("Quick, brown  fox!", 1.0, 1.5);
        assert_eq!(r.words(), ["Quick", "brown", "fox"]);
        assert_eq!(r.first_word(), Some("Quick"));
        assert_eq!(r.last_word(), Some("fox"));
        assert_eq!(r.to_string(), "Quick, brown  fox!(1,1.5)");
    }

    #[test]
    fn inverted_interval_is_rejected() {
        assert!(PhraseSpotterResult::new("dog", 2.0, 1.0).is_err());
        assert!(PhraseSpotterResult::new("dog", f32::NAN, 1.0).is_err());
    }

    #[test]
    fn intervals_match_within_fifty_ms() {
        let a = result("dog", 2.00, 2.30);
        assert!(a.matches_interval(&result("dog", 2.04, 2.26)));
        assert!(!a.matches_interval(&result("dog", 2.10, 2.30)));
    }

    #[test]
    fn registry_orders_by_start_time() {
        let mut registry = PhraseSpotRegistry::default();
        registry.set_results(vec![result("b", 3.0, 3.5), result("a", 1.0, 1.5)]);
        assert_eq!(registry.start_times(), vec![1.0, 3.0]);
    }

    #[test]
    fn start_times_are_distinct() {
        let mut registry = PhraseSpotRegistry::default();
        registry.set_results(vec![
            result("dog barked", 1.0, 1.6),
            result("b", 3.0, 3.5),
            result("dog ran", 1.0, 1.4),
        ]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.start_times(), vec![1.0, 3.0]);
    }

    #[test]
    fn contains_matches_first_word_near_start() {
        let mut registry = PhraseSpotRegistry::default();
        registry.set_results(vec![
            result("the dog barked", 2.00, 2.30),
            result("over there", 5.00, 5.40),
        ]);
        assert!(!registry.contains("DOG", 2.10));
        assert!(registry.contains("The", 2.03));
        assert!(registry.contains("the", 1.97));
        assert!(!registry.contains("the", 2.60));
        assert!(!registry.contains("dog", 2.00));
        assert!(registry.contains("over", 5.0));
    }

    #[test]
    fn empty_registry_contains_nothing() {
        assert!(!PhraseSpotRegistry::default().contains("dog", 0.0));
    }
}
