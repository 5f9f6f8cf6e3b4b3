use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AlignmentError;

/// Top-level aligner configuration. Every section has defaults, so a partial
/// JSON file only needs to name the values it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignerConfig {
    pub beam: BeamConfig,
    pub search: SearchConfig,
    pub grammar: GrammarConfig,
    pub linguist: LinguistConfig,
    pub spotting: SpottingConfig,
    /// Character vocabulary (`{"a": 1, ...}`) used to build the default lexicon.
    pub vocab_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamConfig {
    /// Maximum number of tokens kept per frame; 0 keeps everything.
    pub absolute_beam_width: usize,
    /// Linear ratio to the best score below which tokens are pruned.
    pub relative_beam_width: f64,
}

impl Default for BeamConfig {
    fn default() -> Self {
        Self {
            absolute_beam_width: 20_000,
            relative_beam_width: 1e-80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub relative_word_beam_width: f64,
    /// Every n-th frame skips the grow step; 0 disables skipping.
    pub grow_skip_interval: usize,
    pub want_entry_pruning: bool,
    pub show_token_count: bool,
    pub frames_per_second: f32,
    /// Frames handed to one `recognize` call by `decode`.
    pub feature_block_size: usize,
    /// Maximum distance in seconds between a spotted phrase and a word entry.
    pub phrase_time_threshold: f32,
    /// Added to every arc leaving a word whose entry matches a spotted phrase.
    pub phrase_spot_entry_bonus: f32,
    /// Added to the matching word token itself. Not a calibrated log-probability;
    /// it only has to dominate the beam.
    pub phrase_spot_survival_bonus: f32,
    /// Lattice size that triggers compaction; 0 disables it.
    pub max_lattice_tokens: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            relative_word_beam_width: 1e-26,
            grow_skip_interval: 0,
            want_entry_pruning: false,
            show_token_count: false,
            frames_per_second: 100.0,
            feature_block_size: 50,
            phrase_time_threshold: 0.04,
            phrase_spot_entry_bonus: 1.0,
            phrase_spot_survival_bonus: 10_000.0,
            max_lattice_tokens: 1_000_000,
        }
    }
}

/// Grammar deviation model. Fixed for the lifetime of one graph build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarConfig {
    pub model_deletions: bool,
    pub model_repetitions: bool,
    pub model_backward_jumps: bool,
    pub forward_jump_probability: f64,
    pub backward_transition_probability: f64,
    pub self_loop_probability: f64,
    pub num_allowed_grammar_jumps: usize,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        Self {
            model_deletions: false,
            model_repetitions: false,
            model_backward_jumps: false,
            forward_jump_probability: 0.0,
            backward_transition_probability: 0.0,
            self_loop_probability: 0.0,
            num_allowed_grammar_jumps: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinguistConfig {
    pub word_insertion_probability: f64,
    pub silence_insertion_probability: f64,
    pub filler_insertion_probability: f64,
    pub unit_insertion_probability: f64,
    pub language_weight: f32,
    pub add_out_of_grammar_branch: bool,
    pub out_of_grammar_probability: f64,
    pub phone_insertion_probability: f64,
    pub hmm_states_per_unit: usize,
    pub hmm_self_loop_probability: f64,
}

impl Default for LinguistConfig {
    fn default() -> Self {
        Self {
            word_insertion_probability: 1.0,
            silence_insertion_probability: 1.0,
            filler_insertion_probability: 1.0,
            unit_insertion_probability: 1.0,
            language_weight: 1.0,
            add_out_of_grammar_branch: false,
            out_of_grammar_probability: 1.0,
            phone_insertion_probability: 1.0,
            hmm_states_per_unit: 3,
            hmm_self_loop_probability: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpottingConfig {
    pub enabled: bool,
    /// Words per spotted phrase.
    pub phrase_length: usize,
    /// Words skipped between two spotted phrases.
    pub phrase_gap: usize,
    /// Concurrent spotting decoders; 0 uses the available parallelism.
    pub max_workers: usize,
    /// Linguist used by the spotting decoders (phone loop on by default).
    pub linguist: LinguistConfig,
}

impl Default for SpottingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            phrase_length: 3,
            phrase_gap: 5,
            max_workers: 0,
            linguist: LinguistConfig {
                add_out_of_grammar_branch: true,
                out_of_grammar_probability: 1e-10,
                phone_insertion_probability: 1e-10,
                ..LinguistConfig::default()
            },
        }
    }
}

impl AlignerConfig {
    pub fn load(path: &Path) -> Result<Self, AlignmentError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| AlignmentError::io("read aligner config", e))?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| AlignmentError::json("parse aligner config", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AlignmentError> {
        self.beam.validate()?;
        self.search.validate()?;
        self.grammar.validate()?;
        self.linguist.validate()?;
        self.spotting.validate()
    }
}

impl BeamConfig {
    pub fn validate(&self) -> Result<(), AlignmentError> {
        check_unit_interval("beam.relative_beam_width", self.relative_beam_width)
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), AlignmentError> {
        check_unit_interval(
            "search.relative_word_beam_width",
            self.relative_word_beam_width,
        )?;
        if !(self.frames_per_second.is_finite() && self.frames_per_second > 0.0) {
            return Err(AlignmentError::config(
                "search.frames_per_second",
                format!("must be a positive number, got {}", self.frames_per_second),
            ));
        }
        if self.feature_block_size == 0 {
            return Err(AlignmentError::config(
                "search.feature_block_size",
                "must be at least 1",
            ));
        }
        if !(self.phrase_time_threshold.is_finite() && self.phrase_time_threshold >= 0.0) {
            return Err(AlignmentError::config(
                "search.phrase_time_threshold",
                format!("must be non-negative, got {}", self.phrase_time_threshold),
            ));
        }
        for (field, value) in [
            ("search.phrase_spot_entry_bonus", self.phrase_spot_entry_bonus),
            (
                "search.phrase_spot_survival_bonus",
                self.phrase_spot_survival_bonus,
            ),
        ] {
            if !value.is_finite() {
                return Err(AlignmentError::config(field, "must be finite"));
            }
        }
        Ok(())
    }
}

impl GrammarConfig {
    pub fn validate(&self) -> Result<(), AlignmentError> {
        check_unit_interval(
            "grammar.forward_jump_probability",
            self.forward_jump_probability,
        )?;
        check_unit_interval(
            "grammar.backward_transition_probability",
            self.backward_transition_probability,
        )?;
        check_unit_interval("grammar.self_loop_probability", self.self_loop_probability)
    }
}

impl LinguistConfig {
    pub fn validate(&self) -> Result<(), AlignmentError> {
        for (field, value) in [
            (
                "linguist.word_insertion_probability",
                self.word_insertion_probability,
            ),
            (
                "linguist.silence_insertion_probability",
                self.silence_insertion_probability,
            ),
            (
                "linguist.filler_insertion_probability",
                self.filler_insertion_probability,
            ),
            (
                "linguist.unit_insertion_probability",
                self.unit_insertion_probability,
            ),
            (
                "linguist.out_of_grammar_probability",
                self.out_of_grammar_probability,
            ),
            (
                "linguist.phone_insertion_probability",
                self.phone_insertion_probability,
            ),
        ] {
            check_unit_interval(field, value)?;
        }
        if !(self.hmm_self_loop_probability > 0.0 && self.hmm_self_loop_probability < 1.0) {
            return Err(AlignmentError::config(
                "linguist.hmm_self_loop_probability",
                format!(
                    "must be strictly between 0 and 1, got {}",
                    self.hmm_self_loop_probability
                ),
            ));
        }
        if self.hmm_states_per_unit == 0 {
            return Err(AlignmentError::config(
                "linguist.hmm_states_per_unit",
                "must be at least 1",
            ));
        }
        if !(self.language_weight.is_finite() && self.language_weight >= 0.0) {
            return Err(AlignmentError::config(
                "linguist.language_weight",
                format!("must be non-negative, got {}", self.language_weight),
            ));
        }
        Ok(())
    }
}

impl SpottingConfig {
    pub fn validate(&self) -> Result<(), AlignmentError> {
        if self.enabled && self.phrase_length == 0 {
            return Err(AlignmentError::config(
                "spotting.phrase_length",
                "must be at least 1 when spotting is enabled",
            ));
        }
        self.linguist.validate()
    }
}

fn check_unit_interval(field: &'static str, value: f64) -> Result<(), AlignmentError> {
    if value.is_nan() || !(0.0..=1.0).contains(&value) {
        return Err(AlignmentError::config(
            field,
            format!("must be a probability in [0, 1], got {value}"),
        ));
    }
    Ok(())
}
