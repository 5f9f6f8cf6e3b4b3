use std::sync::Arc;

use crate::linguist::{SearchGraph, StateId};
use crate::search::active_list::ActiveList;
use crate::search::token::{TokenId, TokenLattice};
use crate::types::{AlignmentOutput, WordTiming};

/// One step of the best path, copied out of the lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct PathToken {
    pub state: StateId,
    pub word: Option<Arc<str>>,
    pub filler: bool,
    pub frame: usize,
    pub emitting: bool,
    pub scored: bool,
    pub is_final: bool,
    pub score: f32,
}

/// Snapshot of the search after a `recognize` call. Owns its best path, so it
/// stays valid after the lattice moves on or is compacted.
#[derive(Debug, Clone)]
pub struct SearchResult {
    frame_number: usize,
    is_final: bool,
    has_final_token: bool,
    best_score: Option<f32>,
    path: Vec<PathToken>,
    frames_per_second: f32,
}

impl SearchResult {
    pub(crate) fn new(
        lattice: &TokenLattice,
        graph: &SearchGraph,
        active_list: &ActiveList,
        result_list: &[TokenId],
        frame_number: usize,
        is_final: bool,
        frames_per_second: f32,
    ) -> Self {
        let best_final = best_of(lattice, result_list);
        let best = best_final.or_else(|| best_of(lattice, active_list.tokens()));

        let mut path: Vec<PathToken> = best
            .into_iter()
            .flat_map(|b| lattice.path(b))
            .map(|id| {
                let token = lattice.get(id);
                let state = graph.state(token.state);
                PathToken {
                    state: token.state,
                    word: state.word().map(Arc::<str>::from),
                    filler: state.is_filler(),
                    frame: token.frame,
                    emitting: token.emitting,
                    scored: token.is_scored(),
                    is_final: token.is_final,
                    score: token.score,
                }
            })
            .collect();
        path.reverse();

        Self {
            frame_number,
            is_final,
            has_final_token: best_final.is_some(),
            best_score: best.map(|b| lattice.score(b)),
            path,
            frames_per_second,
        }
    }

    pub fn frame_number(&self) -> usize {
        self.frame_number
    }

    /// True when the input has been fully consumed.
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// True when the best path ends in a final grammar state.
    pub fn has_final_token(&self) -> bool {
        self.has_final_token
    }

    pub fn best_score(&self) -> Option<f32> {
        self.best_score
    }

    /// Best path from the start of the utterance.
    pub fn path(&self) -> &[PathToken] {
        &self.path
    }

    /// Words on the best path with their time spans. A word starts at its
    /// first scored frame and ends one frame after its last.
    pub fn timed_words(&self, want_filler: bool) -> Vec<WordTiming> {
        let fps = f64::from(self.frames_per_second);
        let mut words = Vec::new();
        let mut current: Option<(&PathToken, Option<(usize, usize)>)> = None;

        let mut flush = |entry: Option<(&PathToken, Option<(usize, usize)>)>| {
            if let Some((word_token, Some((first, last)))) = entry {
                if want_filler || !word_token.filler {
                    if let Some(word) = &word_token.word {
                        words.push(WordTiming {
                            word: word.to_string(),
                            start: first as f64 / fps,
                            end: (last + 1) as f64 / fps,
                        });
                    }
                }
            }
        };

        for token in &self.path {
            if token.word.is_some() {
                flush(current.take());
                current = Some((token, None));
            } else if token.emitting && token.scored {
                if let Some((_, span)) = current.as_mut() {
                    *span = Some(match *span {
                        Some((first, _)) => (first, token.frame),
                        None => (token.frame, token.frame),
                    });
                }
            }
        }
        flush(current.take());
        words
    }

    /// `word(start,end) word(start,end) ...`
    pub fn timed_best_result(&self, want_filler: bool) -> String {
        AlignmentOutput {
            words: self.timed_words(want_filler),
        }
        .to_string()
    }

    pub fn best_result_no_filler(&self) -> String {
        self.path
            .iter()
            .filter(|t| !t.filler)
            .filter_map(|t| t.word.as_deref())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn best_of(lattice: &TokenLattice, tokens: &[TokenId]) -> Option<TokenId> {
    tokens.iter().copied().fold(None, |best, t| match best {
        Some(b) if lattice.score(b) >= lattice.score(t) => Some(b),
        _ => Some(t),
    })
}
