use std::sync::Arc;

use crate::config::LinguistConfig;
use crate::grammar::GrammarGraph;
use crate::linguist::{FlatLinguist, Lexicon, Linguist};
use crate::pipeline::traits::{LinguistFactory, PrunerFactory};
use crate::search::pruner::{Pruner, SimplePruner};

pub struct FlatLinguistFactory;

impl LinguistFactory for FlatLinguistFactory {
    fn create_linguist(
        &self,
        grammar: Arc<GrammarGraph>,
        lexicon: Arc<dyn Lexicon>,
        config: &LinguistConfig,
    ) -> Box<dyn Linguist> {
        Box::new(FlatLinguist::new(grammar, lexicon, config.clone()))
    }
}

pub struct SimplePrunerFactory;

impl PrunerFactory for SimplePrunerFactory {
    fn create_pruner(&self) -> Box<dyn Pruner> {
        Box::new(SimplePruner)
    }
}
