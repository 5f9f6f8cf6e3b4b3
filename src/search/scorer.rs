use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::AlignmentError;
use crate::linguist::SearchGraph;
use crate::pipeline::traits::ScorerFactory;
use crate::search::token::{TokenId, TokenLattice};

/// What scoring one frame produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOutcome {
    /// The frame was scored; this is its best token.
    Best(TokenId),
    /// No frames are left. Reported once, so the search can finish cleanly.
    EndOfData,
    /// Nothing can be scored any more (empty beam or data already drained).
    StreamEnd,
}

pub trait AcousticScorer: Send {
    fn allocate(&mut self) -> Result<(), AlignmentError> {
        Ok(())
    }

    fn deallocate(&mut self) {}

    fn start_recognition(&mut self) {}

    fn stop_recognition(&mut self) {}

    /// Adds the next frame's acoustic score to every emitting token in `tokens`.
    fn calculate_scores(
        &mut self,
        tokens: &[TokenId],
        lattice: &mut TokenLattice,
        graph: &SearchGraph,
    ) -> Result<ScoreOutcome, AlignmentError>;
}

/// Per-frame unit log-likelihoods, frame-major: `frames[t][unit]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Vec<f32>>", into = "Vec<Vec<f32>>")]
pub struct FrameScores {
    frames: Arc<Vec<Vec<f32>>>,
}

impl FrameScores {
    pub fn new(frames: Vec<Vec<f32>>) -> Self {
        Self {
            frames: Arc::new(frames),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        self.frames.get(index).map(Vec::as_slice)
    }
}

impl From<Vec<Vec<f32>>> for FrameScores {
    fn from(frames: Vec<Vec<f32>>) -> Self {
        Self::new(frames)
    }
}

impl From<FrameScores> for Vec<Vec<f32>> {
    fn from(scores: FrameScores) -> Self {
        Arc::unwrap_or_clone(scores.frames)
    }
}

impl ScorerFactory for FrameScores {
    fn create_scorer(&self) -> Box<dyn AcousticScorer> {
        Box::new(TableScorer::new(self.clone()))
    }

    fn num_frames(&self) -> usize {
        self.len()
    }
}

/// Scores tokens by looking their unit up in a [`FrameScores`] table.
#[derive(Debug)]
pub struct TableScorer {
    scores: FrameScores,
    next_frame: usize,
    data_ended: bool,
}

impl TableScorer {
    pub fn new(scores: FrameScores) -> Self {
        Self {
            scores,
            next_frame: 0,
            data_ended: false,
        }
    }
}

impl AcousticScorer for TableScorer {
    fn start_recognition(&mut self) {
        self.next_frame = 0;
        self.data_ended = false;
    }

    fn calculate_scores(
        &mut self,
        tokens: &[TokenId],
        lattice: &mut TokenLattice,
        graph: &SearchGraph,
    ) -> Result<ScoreOutcome, AlignmentError> {
        if tokens.is_empty() {
            return Ok(ScoreOutcome::StreamEnd);
        }
        let Some(row) = self.scores.frame(self.next_frame) else {
            if self.data_ended {
                return Ok(ScoreOutcome::StreamEnd);
            }
            self.data_ended = true;
            return Ok(ScoreOutcome::EndOfData);
        };

        let mut best: Option<TokenId> = None;
        for &id in tokens {
            let Some(unit) = graph.state(lattice.get(id).state).unit() else {
                continue;
            };
            let acoustic = row.get(unit).copied().ok_or_else(|| {
                AlignmentError::invalid_input(format!(
                    "frame {} has {} unit scores, unit {unit} requested",
                    self.next_frame,
                    row.len()
                ))
            })?;
            lattice.apply_acoustic_score(id, acoustic);
            if best.map_or(true, |b| lattice.score(id) > lattice.score(b)) {
                best = Some(id);
            }
        }
        self.next_frame += 1;
        Ok(best.map_or(ScoreOutcome::StreamEnd, ScoreOutcome::Best))
    }
}
