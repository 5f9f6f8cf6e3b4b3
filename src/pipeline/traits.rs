use std::sync::Arc;

use crate::config::LinguistConfig;
use crate::grammar::GrammarGraph;
use crate::linguist::{Lexicon, Linguist};
use crate::search::pruner::Pruner;
use crate::search::scorer::AcousticScorer;

/// Source of acoustic scorers over one utterance. Every decoder run (the
/// alignment itself and each spotted phrase) gets a fresh scorer.
pub trait ScorerFactory: Send + Sync {
    fn create_scorer(&self) -> Box<dyn AcousticScorer>;

    fn num_frames(&self) -> usize;
}

pub trait LinguistFactory: Send + Sync {
    fn create_linguist(
        &self,
        grammar: Arc<GrammarGraph>,
        lexicon: Arc<dyn Lexicon>,
        config: &LinguistConfig,
    ) -> Box<dyn Linguist>;
}

pub trait PrunerFactory: Send + Sync {
    fn create_pruner(&self) -> Box<dyn Pruner>;
}
