use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::config::AlignerConfig;
use crate::error::AlignmentError;
use crate::grammar::{normalize_transcript, GrammarBuilder};
use crate::linguist::Lexicon;
use crate::pipeline::traits::{LinguistFactory, PrunerFactory, ScorerFactory};
use crate::search::manager::AlignerSearchManager;
use crate::spotter::{PhraseSpotRegistry, PhraseSpotterResult, SimplePhraseSpotter};
use crate::types::{AlignmentInput, AlignmentOutput};

/// Aligns a transcript against frame scores: optional phrase spotting,
/// grammar construction, linguist compilation and one Viterbi decode.
pub struct Aligner {
    config: AlignerConfig,
    lexicon: Arc<dyn Lexicon>,
    grammar_builder: GrammarBuilder,
    linguist_factory: Box<dyn LinguistFactory>,
    pruner_factory: Box<dyn PrunerFactory>,
}

pub(crate) struct AlignerParts {
    pub config: AlignerConfig,
    pub lexicon: Arc<dyn Lexicon>,
    pub linguist_factory: Box<dyn LinguistFactory>,
    pub pruner_factory: Box<dyn PrunerFactory>,
}

impl Aligner {
    pub(crate) fn from_parts(parts: AlignerParts) -> Self {
        Self {
            grammar_builder: GrammarBuilder::new(parts.config.grammar.clone()),
            config: parts.config,
            lexicon: parts.lexicon,
            linguist_factory: parts.linguist_factory,
            pruner_factory: parts.pruner_factory,
        }
    }

    pub fn config(&self) -> &AlignerConfig {
        &self.config
    }

    pub fn lexicon(&self) -> &Arc<dyn Lexicon> {
        &self.lexicon
    }

    pub fn align(&self, input: &AlignmentInput) -> Result<AlignmentOutput, AlignmentError> {
        self.align_with_scorer(&input.transcript, &input.frames)
    }

    pub fn align_with_scorer(
        &self,
        transcript: &str,
        scores: &dyn ScorerFactory,
    ) -> Result<AlignmentOutput, AlignmentError> {
        let words = normalize_transcript(transcript);
        if words.is_empty() || scores.num_frames() == 0 {
            return Ok(AlignmentOutput::default());
        }

        let mut registry = PhraseSpotRegistry::new(self.config.search.phrase_time_threshold);
        if self.config.spotting.enabled {
            registry.set_results(self.spot_phrases(&words, scores));
        }

        let grammar = Arc::new(self.grammar_builder.build(&words)?);
        tracing::debug!(
            words = words.len(),
            nodes = grammar.len(),
            edges = grammar.edge_count(),
            "aligner: grammar built"
        );
        let linguist =
            self.linguist_factory
                .create_linguist(grammar, self.lexicon.clone(), &self.config.linguist);
        let mut manager = AlignerSearchManager::new(
            linguist,
            self.pruner_factory.create_pruner(),
            scores.create_scorer(),
            &self.config.beam,
            self.config.search.clone(),
        )
        .with_phrase_spots(Arc::new(registry));

        manager.allocate()?;
        let decoded = manager.decode();
        manager.deallocate();

        let result = decoded?.ok_or(AlignmentError::NoResult {
            frames: scores.num_frames(),
        })?;
        if !result.has_final_token() {
            tracing::warn!(
                frames = result.frame_number(),
                "aligner: no path reached the end of the grammar; using the best partial path"
            );
        }
        Ok(AlignmentOutput {
            words: result.timed_words(false),
        })
    }

    /// Spots every selected phrase on a scoped worker pool. Phrases that fail
    /// are logged and left out.
    fn spot_phrases(&self, words: &[String], scores: &dyn ScorerFactory) -> Vec<PhraseSpotterResult> {
        let spotting = &self.config.spotting;
        let phrases = select_phrases(words, spotting.phrase_length, spotting.phrase_gap);
        if phrases.is_empty() {
            return Vec::new();
        }
        let workers = if spotting.max_workers == 0 {
            std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
        } else {
            spotting.max_workers
        }
        .min(phrases.len());
        tracing::info!(phrases = phrases.len(), workers, "aligner: spotting phrases");

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<String>();
        let (found_tx, found_rx) = crossbeam_channel::unbounded::<Vec<PhraseSpotterResult>>();
        for phrase in phrases {
            if job_tx.send(phrase).is_err() {
                break;
            }
        }
        drop(job_tx);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let found_tx = found_tx.clone();
                scope.spawn(move || {
                    let mut spotter = SimplePhraseSpotter::new(self.lexicon.clone(), &self.config);
                    for phrase in job_rx {
                        spotter.set_phrase(&phrase);
                        match spotter.spot(scores) {
                            Ok(found) => {
                                tracing::debug!(phrase = %phrase, occurrences = found.len(), "aligner: phrase spotted");
                                if found_tx.send(found).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!(phrase = %phrase, error = %e, "aligner: phrase spotting failed, skipping");
                            }
                        }
                    }
                });
            }
        });
        drop(found_tx);

        found_rx.into_iter().flatten().collect()
    }
}

/// Takes `length` words as a phrase, skips the next `gap`, and repeats. The
/// last phrase may be shorter.
pub fn select_phrases(words: &[String], length: usize, gap: usize) -> Vec<String> {
    if length == 0 {
        return Vec::new();
    }
    words
        .chunks(length + gap)
        .map(|chunk| chunk[..length.min(chunk.len())].join(" "))
        .collect()
}
