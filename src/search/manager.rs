use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{BeamConfig, SearchConfig};
use crate::error::AlignmentError;
use crate::linguist::{Linguist, SearchGraph, StateId};
use crate::logmath::linear_to_log;
use crate::search::active_list::{ActiveList, ActiveListFactory};
use crate::search::pruner::Pruner;
use crate::search::result::SearchResult;
use crate::search::scorer::{AcousticScorer, ScoreOutcome};
use crate::search::token::{TokenId, TokenLattice};
use crate::spotter::PhraseSpotRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    NotStarted,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchStats {
    pub tokens_created: u64,
    pub viterbi_pruned: u64,
    pub beam_pruned: u64,
    pub cur_tokens_scored: u64,
    pub total_tokens_scored: u64,
    pub total_active_states: u64,
}

/// Scratch state of one grow step. Rebuilt from scratch every frame.
struct GrowFrame {
    /// Best token per state this frame, with its slot in `next_active` when
    /// the state is emitting.
    best_tokens: HashMap<StateId, (TokenId, Option<usize>)>,
    threshold: f32,
    word_threshold: f32,
    next_active: ActiveList,
    results: Vec<TokenId>,
}

/// Frame-synchronous Viterbi beam search over a linguist's search graph.
///
/// Each frame is scored, pruned and then grown into the next frame's active
/// list. Word entries that coincide with a spotted phrase start are rewarded
/// so that their paths survive the beam.
pub struct AlignerSearchManager {
    linguist: Box<dyn Linguist>,
    pruner: Box<dyn Pruner>,
    scorer: Box<dyn AcousticScorer>,
    active_list_factory: ActiveListFactory,
    beam: BeamConfig,
    config: SearchConfig,
    log_relative_word_beam_width: f32,
    registry: Arc<PhraseSpotRegistry>,
    graph: Option<Arc<SearchGraph>>,
    lattice: TokenLattice,
    active_list: ActiveList,
    result_list: Vec<TokenId>,
    current_frame: usize,
    status: SearchStatus,
    stream_end: bool,
    stats: SearchStats,
}

impl AlignerSearchManager {
    pub fn new(
        linguist: Box<dyn Linguist>,
        pruner: Box<dyn Pruner>,
        scorer: Box<dyn AcousticScorer>,
        beam: &BeamConfig,
        config: SearchConfig,
    ) -> Self {
        let active_list_factory = ActiveListFactory::new(beam);
        let active_list = active_list_factory.new_instance();
        Self {
            linguist,
            pruner,
            scorer,
            active_list_factory,
            beam: beam.clone(),
            log_relative_word_beam_width: linear_to_log(config.relative_word_beam_width),
            config,
            registry: Arc::new(PhraseSpotRegistry::default()),
            graph: None,
            lattice: TokenLattice::new(),
            active_list,
            result_list: Vec::new(),
            current_frame: 0,
            status: SearchStatus::NotStarted,
            stream_end: false,
            stats: SearchStats::default(),
        }
    }

    /// Spotted phrases that bias word entries. Read-only during the search.
    pub fn with_phrase_spots(mut self, registry: Arc<PhraseSpotRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn allocate(&mut self) -> Result<(), AlignmentError> {
        self.beam.validate()?;
        self.config.validate()?;
        self.linguist
            .allocate()
            .map_err(|e| AlignmentError::allocation("linguist", e))?;
        self.pruner.allocate();
        if let Err(e) = self.scorer.allocate() {
            self.pruner.deallocate();
            self.linguist.deallocate();
            return Err(AlignmentError::allocation("acoustic scorer", e));
        }
        let graph = match self.linguist.search_graph() {
            Ok(graph) => graph,
            Err(e) => {
                self.scorer.deallocate();
                self.pruner.deallocate();
                self.linguist.deallocate();
                return Err(AlignmentError::allocation("search graph", e));
            }
        };
        tracing::debug!(states = graph.len(), "search: allocated");
        self.graph = Some(graph);
        Ok(())
    }

    pub fn deallocate(&mut self) {
        self.scorer.deallocate();
        self.pruner.deallocate();
        self.linguist.deallocate();
        self.graph = None;
        self.lattice.clear();
        self.result_list.clear();
        self.active_list = self.active_list_factory.new_instance();
        self.status = SearchStatus::NotStarted;
    }

    pub fn start_recognition(&mut self) -> Result<(), AlignmentError> {
        let graph = self.graph()?;
        tracing::info!("search: starting recognition");
        self.linguist.start_recognition();
        self.pruner.start_recognition();
        self.scorer.start_recognition();

        self.current_frame = 0;
        self.stats.cur_tokens_scored = 0;
        self.stream_end = false;
        self.lattice.clear();
        self.result_list.clear();

        let mut list = self.active_list_factory.new_instance();
        let initial = self
            .lattice
            .push_initial(&graph, graph.initial_state(), self.current_frame);
        list.add(initial, &self.lattice);
        self.active_list = list;
        self.status = SearchStatus::Running;
        self.grow_branches(&graph);
        Ok(())
    }

    /// Runs up to `n_frames` frames. Returns `None` when no scoreable token
    /// is left or the stream has already ended.
    pub fn recognize(&mut self, n_frames: usize) -> Result<Option<SearchResult>, AlignmentError> {
        if self.status != SearchStatus::Running {
            return Err(AlignmentError::runtime(
                "recognize",
                format!("search is {:?}, expected Running", self.status),
            ));
        }
        let graph = self.graph()?;
        let mut done = false;
        self.stream_end = false;
        for _ in 0..n_frames {
            if done {
                break;
            }
            done = self.recognize_frame(&graph)?;
        }

        let mut result = None;
        if self.active_list.best_token().is_some() {
            let fixed = self.undo_last_grow_step();
            if !self.stream_end {
                result = Some(SearchResult::new(
                    &self.lattice,
                    &graph,
                    &fixed,
                    &self.result_list,
                    self.current_frame,
                    done,
                    self.config.frames_per_second,
                ));
            }
        }
        if self.config.show_token_count {
            self.show_token_count();
        }
        Ok(result)
    }

    pub fn stop_recognition(&mut self) {
        self.scorer.stop_recognition();
        self.pruner.stop_recognition();
        self.linguist.stop_recognition();
        self.status = SearchStatus::Stopped;
        tracing::info!(
            frames = self.current_frame,
            tokens_created = self.stats.tokens_created,
            viterbi_pruned = self.stats.viterbi_pruned,
            beam_pruned = self.stats.beam_pruned,
            "search: recognition stopped"
        );
    }

    /// Runs a whole recognition in blocks of `feature_block_size` frames and
    /// returns the final result.
    pub fn decode(&mut self) -> Result<Option<SearchResult>, AlignmentError> {
        self.start_recognition()?;
        let block = self.config.feature_block_size;
        let outcome = loop {
            match self.recognize(block) {
                Ok(Some(result)) if !result.is_final() => continue,
                other => break other,
            }
        };
        self.stop_recognition();
        outcome
    }

    pub fn status(&self) -> SearchStatus {
        self.status
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub fn active_list(&self) -> &ActiveList {
        &self.active_list
    }

    pub fn result_list(&self) -> &[TokenId] {
        &self.result_list
    }

    pub fn lattice(&self) -> &TokenLattice {
        &self.lattice
    }

    fn graph(&self) -> Result<Arc<SearchGraph>, AlignmentError> {
        self.graph
            .clone()
            .ok_or_else(|| AlignmentError::runtime("search", "search manager is not allocated"))
    }

    /// One score/prune/grow cycle. Returns true once the input is exhausted.
    fn recognize_frame(&mut self, graph: &SearchGraph) -> Result<bool, AlignmentError> {
        let more = self.score_tokens(graph)?;
        if more {
            self.prune_branches();
            self.current_frame += 1;
            let interval = self.config.grow_skip_interval;
            if interval == 0 || self.current_frame % interval != 0 {
                self.grow_branches(graph);
            }
        }
        Ok(!more)
    }

    fn score_tokens(&mut self, graph: &SearchGraph) -> Result<bool, AlignmentError> {
        let outcome =
            self.scorer
                .calculate_scores(self.active_list.tokens(), &mut self.lattice, graph)?;
        let more = match outcome {
            ScoreOutcome::Best(best) => {
                self.active_list.set_best_token(best);
                true
            }
            ScoreOutcome::EndOfData => false,
            ScoreOutcome::StreamEnd => {
                self.stream_end = true;
                false
            }
        };
        let scored = self.active_list.len() as u64;
        self.stats.cur_tokens_scored += scored;
        self.stats.total_tokens_scored += scored;
        Ok(more)
    }

    fn prune_branches(&mut self) {
        let start = self.active_list.len();
        let list = std::mem::replace(
            &mut self.active_list,
            self.active_list_factory.new_instance(),
        );
        self.active_list = self.pruner.prune(list, &self.lattice);
        self.stats.beam_pruned += start.saturating_sub(self.active_list.len()) as u64;
        tracing::trace!(
            frame = self.current_frame,
            before = start,
            after = self.active_list.len(),
            "search: pruned"
        );
    }

    fn grow_branches(&mut self, graph: &SearchGraph) {
        self.compact_lattice_if_needed();
        let old = std::mem::replace(
            &mut self.active_list,
            self.active_list_factory.new_instance(),
        );
        let mut frame = GrowFrame {
            best_tokens: HashMap::with_capacity((old.len() * 10).max(1)),
            threshold: old.beam_threshold(&self.lattice),
            word_threshold: old.best_score(&self.lattice) + self.log_relative_word_beam_width,
            next_active: self.active_list_factory.new_instance(),
            results: Vec::new(),
        };
        for &token in old.tokens() {
            self.collect_successor_tokens(graph, &mut frame, token);
        }
        self.active_list = frame.next_active;
        self.result_list = frame.results;

        let active = self.active_list.len() as u64;
        self.stats.total_active_states += active;
        tracing::debug!(
            frame = self.current_frame,
            active,
            finals = self.result_list.len(),
            total = self.stats.total_active_states,
            "search: grow step done"
        );
    }

    fn compact_lattice_if_needed(&mut self) {
        let limit = self.config.max_lattice_tokens;
        if limit == 0 || self.lattice.len() <= limit {
            return;
        }
        let remap = self.lattice.compact(self.active_list.tokens());
        self.active_list.remap(&remap);
        self.result_list.clear();
    }

    /// Expands `token` into the next frame, recursing through non-emitting
    /// states until every path ends in an emitting state.
    fn collect_successor_tokens(
        &mut self,
        graph: &SearchGraph,
        frame: &mut GrowFrame,
        token: TokenId,
    ) {
        let current = *self.lattice.get(token);
        let state = graph.state(current.state);

        if current.is_final {
            frame.results.push(token);
        }
        // A non-emitting state seen again without an emitting state in
        // between is a zero-duration grammar loop.
        if !current.emitting && self.is_visited(token) {
            return;
        }
        if current.score < frame.threshold {
            return;
        }

        let mut penalty = 0.0f32;
        if let Some(word) = state.word() {
            let phrase_time = self.current_frame as f32 / self.config.frames_per_second;
            if self.registry.contains(word, phrase_time) {
                penalty = self.config.phrase_spot_entry_bonus;
                tracing::debug!(
                    word,
                    frame = self.current_frame,
                    "search: word entry matches a spotted phrase, token prioritised"
                );
            }
            if current.score < frame.word_threshold {
                return;
            }
        }

        if penalty != 0.0 {
            let boosted = current.score + self.config.phrase_spot_survival_bonus;
            self.lattice.set_score(token, boosted);
            let slot = frame
                .best_tokens
                .get(&current.state)
                .filter(|(best, _)| *best == token)
                .and_then(|(_, slot)| *slot);
            frame.best_tokens.insert(current.state, (token, slot));
        }

        let score = self.lattice.score(token);
        for arc in state.arcs() {
            let next = graph.state(arc.target);
            let entry_score = score + arc.probability() + penalty;

            if self.config.want_entry_pruning {
                if entry_score < frame.threshold {
                    continue;
                }
                if next.is_word() && entry_score < frame.word_threshold {
                    continue;
                }
            }

            let previous = frame.best_tokens.get(&arc.target).copied();
            if let Some((best, _)) = previous {
                // First arrival keeps the state on ties.
                if entry_score <= self.lattice.score(best) {
                    self.stats.viterbi_pruned += 1;
                    continue;
                }
            }

            let new_token = self.lattice.push_token(
                graph,
                Some(token),
                arc.target,
                entry_score,
                arc.language_probability,
                arc.insertion_probability,
                self.current_frame,
            );
            self.stats.tokens_created += 1;

            if next.is_emitting() {
                let slot = match previous {
                    Some((_, Some(slot))) => {
                        frame.next_active.replace_at(slot, new_token, &self.lattice);
                        self.stats.viterbi_pruned += 1;
                        slot
                    }
                    _ => frame.next_active.add(new_token, &self.lattice),
                };
                frame
                    .best_tokens
                    .insert(arc.target, (new_token, Some(slot)));
            } else {
                frame.best_tokens.insert(arc.target, (new_token, None));
                if !self.is_visited(new_token) {
                    self.collect_successor_tokens(graph, frame, new_token);
                }
            }
        }
    }

    /// True when the token's state already occurs on its path since the last
    /// emitting token.
    fn is_visited(&self, token: TokenId) -> bool {
        let state = self.lattice.get(token).state;
        let mut cur = self.lattice.predecessor(token);
        while let Some(id) = cur {
            let t = self.lattice.get(id);
            if t.emitting {
                break;
            }
            if t.state == state {
                return true;
            }
            cur = t.predecessor;
        }
        false
    }

    /// The last grow step ran past the final scored frame. Walks every active
    /// token back to the newest ancestor that is either a scored emitting
    /// token or a final token entered from a final one.
    fn undo_last_grow_step(&self) -> ActiveList {
        let mut fixed = self.active_list.new_instance();
        for &token in self.active_list.tokens() {
            let mut cur = self.lattice.predecessor(token).unwrap_or(token);
            while let Some(pred) = self.lattice.predecessor(cur) {
                let t = self.lattice.get(cur);
                let p = self.lattice.get(pred);
                let hidden_final = t.is_final && !p.is_final;
                let unscored = t.emitting && !t.is_scored();
                let pass_through = !t.is_final && !t.emitting;
                if !(hidden_final || unscored || pass_through) {
                    break;
                }
                cur = pred;
            }
            fixed.add(cur, &self.lattice);
        }
        fixed
    }

    fn show_token_count(&self) {
        tracing::info!(
            frame = self.current_frame,
            active_lattice = self.lattice.reachable_count(self.active_list.tokens()),
            result_lattice = self.lattice.reachable_count(&self.result_list),
            "search: token lattice size"
        );
    }
}
