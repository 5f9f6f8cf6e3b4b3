use std::path::Path;
use std::sync::Arc;

use crate::config::AlignerConfig;
use crate::error::AlignmentError;
use crate::linguist::{CharLexicon, Lexicon, UnitId};
use crate::pipeline::defaults::{FlatLinguistFactory, SimplePrunerFactory};
use crate::pipeline::runtime::{Aligner, AlignerParts};
use crate::pipeline::traits::{LinguistFactory, PrunerFactory};

pub struct AlignerBuilder {
    config: AlignerConfig,
    lexicon: Option<Arc<dyn Lexicon>>,
    silence_unit: UnitId,
    linguist_factory: Option<Box<dyn LinguistFactory>>,
    pruner_factory: Option<Box<dyn PrunerFactory>>,
}

impl AlignerBuilder {
    pub fn new(config: AlignerConfig) -> Self {
        Self {
            config,
            lexicon: None,
            silence_unit: 0,
            linguist_factory: None,
            pruner_factory: None,
        }
    }

    /// Uses `lexicon` instead of loading `config.vocab_path`.
    pub fn with_lexicon(mut self, lexicon: Arc<dyn Lexicon>) -> Self {
        self.lexicon = Some(lexicon);
        self
    }

    /// Unit that spells `<sil>` in a lexicon loaded from `config.vocab_path`.
    pub fn with_silence_unit(mut self, silence_unit: UnitId) -> Self {
        self.silence_unit = silence_unit;
        self
    }

    pub fn with_linguist_factory(mut self, linguist_factory: Box<dyn LinguistFactory>) -> Self {
        self.linguist_factory = Some(linguist_factory);
        self
    }

    pub fn with_pruner_factory(mut self, pruner_factory: Box<dyn PrunerFactory>) -> Self {
        self.pruner_factory = Some(pruner_factory);
        self
    }

    pub fn build(self) -> Result<Aligner, AlignmentError> {
        self.config.validate()?;

        let lexicon: Arc<dyn Lexicon> = match self.lexicon {
            Some(lexicon) => lexicon,
            None => {
                let path = self.config.vocab_path.as_deref().ok_or_else(|| {
                    AlignmentError::config("vocab_path", "required when no lexicon is supplied")
                })?;
                let lexicon = CharLexicon::from_json(Path::new(path), self.silence_unit)?;
                tracing::debug!(path, units = lexicon.vocab().len(), "aligner: lexicon loaded");
                Arc::new(lexicon)
            }
        };

        Ok(Aligner::from_parts(AlignerParts {
            config: self.config,
            lexicon,
            linguist_factory: self
                .linguist_factory
                .unwrap_or_else(|| Box::new(FlatLinguistFactory)),
            pruner_factory: self
                .pruner_factory
                .unwrap_or_else(|| Box::new(SimplePrunerFactory)),
        }))
    }
}
