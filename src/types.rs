use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::search::scorer::FrameScores;

/// Transcript plus the per-frame unit scores it is aligned against.
#[derive(Debug, Clone)]
pub struct AlignmentInput {
    pub transcript: String,
    pub frames: FrameScores,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    /// Seconds interval is [start, end), i.e. start inclusive/end exclusive.
    pub start: f64,
    /// Seconds interval is [start, end), i.e. start inclusive/end exclusive.
    pub end: f64,
}

impl WordTiming {
    pub fn start_ms(&self) -> u64 {
        (self.start * 1000.0).round() as u64
    }

    pub fn end_ms(&self) -> u64 {
        (self.end * 1000.0).round() as u64
    }
}

impl fmt::Display for WordTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.word, self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlignmentOutput {
    pub words: Vec<WordTiming>,
}

/// Downstream timing extractors match `\w+\([0-9.]+,[0-9.]+\)`; the
/// serialised form must keep matching it.
fn timed_word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\w+)\(([0-9.]+),([0-9.]+)\)").expect("timed word pattern is valid")
    })
}

impl AlignmentOutput {
    /// Reads back a `word(start,end) word(start,end) ...` line. Anything that
    /// does not match the timed-word pattern is ignored.
    pub fn parse(line: &str) -> Self {
        let words = timed_word_regex()
            .captures_iter(line)
            .filter_map(|caps| {
                let start = caps[2].parse::<f64>().ok()?;
                let end = caps[3].parse::<f64>().ok()?;
                Some(WordTiming {
                    word: caps[1].to_string(),
                    start,
                    end,
                })
            })
            .collect();
        Self { words }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl fmt::Display for AlignmentOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, word) in self.words.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{word}")?;
        }
        Ok(())
    }
}
