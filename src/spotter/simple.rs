use std::sync::Arc;

use crate::config::{AlignerConfig, BeamConfig, LinguistConfig, SearchConfig};
use crate::error::AlignmentError;
use crate::grammar::{build_no_skip_grammar, UNKNOWN_SPELLING};
use crate::linguist::{FlatLinguist, Lexicon};
use crate::pipeline::traits::ScorerFactory;
use crate::search::manager::AlignerSearchManager;
use crate::search::pruner::SimplePruner;
use crate::spotter::{eq_ignore_case, PhraseSpotterResult};
use crate::types::WordTiming;

#[derive(Debug, Clone)]
struct Phrase {
    text: String,
    words: Vec<String>,
}

/// Finds every occurrence of one short phrase by decoding the whole
/// utterance against a looping no-skip grammar. Audio outside the phrase is
/// absorbed by silence or the out-of-grammar phone loop.
pub struct SimplePhraseSpotter {
    lexicon: Arc<dyn Lexicon>,
    beam: BeamConfig,
    search: SearchConfig,
    linguist: LinguistConfig,
    phrase: Option<Phrase>,
}

impl SimplePhraseSpotter {
    pub fn new(lexicon: Arc<dyn Lexicon>, config: &AlignerConfig) -> Self {
        Self {
            lexicon,
            beam: config.beam.clone(),
            search: config.search.clone(),
            linguist: config.spotting.linguist.clone(),
            phrase: None,
        }
    }

    pub fn set_phrase(&mut self, text: &str) {
        let words = text.split_whitespace().map(str::to_string).collect();
        self.phrase = Some(Phrase {
            text: text.to_string(),
            words,
        });
    }

    pub fn phrase_text(&self) -> Option<&str> {
        self.phrase.as_ref().map(|p| p.text.as_str())
    }

    /// Decodes `scores` and returns one result per phrase occurrence, in
    /// time order.
    pub fn spot(&self, scores: &dyn ScorerFactory) -> Result<Vec<PhraseSpotterResult>, AlignmentError> {
        let phrase = self
            .phrase
            .as_ref()
            .filter(|p| !p.words.is_empty())
            .ok_or_else(|| AlignmentError::invalid_input("phrase to spot must not be empty"))?;

        let grammar = Arc::new(build_no_skip_grammar(&phrase.words)?);
        let linguist = FlatLinguist::new(grammar.clone(), self.lexicon.clone(), self.linguist.clone());
        let mut manager = AlignerSearchManager::new(
            Box::new(linguist),
            Box::new(SimplePruner),
            scores.create_scorer(),
            &self.beam,
            self.search.clone(),
        );
        manager.allocate()?;
        let decoded = manager.decode();
        manager.deallocate();

        let Some(result) = decoded? else {
            tracing::debug!(phrase = %phrase.text, "spotter: decoder produced no result");
            return Ok(Vec::new());
        };
        let timed: Vec<WordTiming> = result
            .timed_words(false)
            .into_iter()
            .filter(|w| w.word != UNKNOWN_SPELLING)
            .collect();

        group_occurrences(phrase, &timed).inspect_err(|_| {
            tracing::debug!(phrase = %phrase.text, dot = %grammar.to_dot(), "spotter: grammar of desynchronised phrase");
        })
    }
}

/// Splits recognised words into consecutive runs of the phrase.
fn group_occurrences(
    phrase: &Phrase,
    timed: &[WordTiming],
) -> Result<Vec<PhraseSpotterResult>, AlignmentError> {
    let mut results = Vec::new();
    let mut words = timed.iter();
    while let Some(first) = words.next() {
        let mut end = first.end;
        for (i, expected) in phrase.words.iter().enumerate() {
            let recognised = if i == 0 {
                first
            } else {
                words.next().ok_or_else(|| {
                    AlignmentError::phrase_mismatch(
                        &phrase.text,
                        "recognition ended in the middle of the phrase",
                    )
                })?
            };
            if !eq_ignore_case(&recognised.word, expected) {
                return Err(AlignmentError::phrase_mismatch(
                    &phrase.text,
                    format!("expected \"{expected}\", recognised \"{}\"", recognised.word),
                ));
            }
            end = recognised.end;
        }
        results.push(PhraseSpotterResult::new(
            &phrase.text,
            first.start as f32,
            end as f32,
        )?);
    }
    Ok(results)
}
