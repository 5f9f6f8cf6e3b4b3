use std::sync::Arc;

use crate::config::LinguistConfig;
use crate::error::AlignmentError;
use crate::grammar::{GrammarGraph, GrammarNode, SILENCE_SPELLING};
use crate::linguist::lexicon::Lexicon;
use crate::linguist::phone_loop::attach_phone_loop;
use crate::linguist::{Linguist, SearchGraph, SearchStateArc, StateId, StateKind, UnitId};
use crate::logmath::{linear_to_log, LOG_ZERO};

/// Expands every grammar node in place, without sharing states between
/// words. Each node becomes an entry and an exit branch state; word nodes are
/// spelled out through the [`Lexicon`] between the two.
pub struct FlatLinguist {
    grammar: Arc<GrammarGraph>,
    lexicon: Arc<dyn Lexicon>,
    config: LinguistConfig,
    search_graph: Option<Arc<SearchGraph>>,
}

impl FlatLinguist {
    pub fn new(
        grammar: Arc<GrammarGraph>,
        lexicon: Arc<dyn Lexicon>,
        config: LinguistConfig,
    ) -> Self {
        Self {
            grammar,
            lexicon,
            config,
            search_graph: None,
        }
    }

    pub fn grammar(&self) -> &GrammarGraph {
        &self.grammar
    }

    fn compile(&self) -> Result<SearchGraph, AlignmentError> {
        self.config.validate()?;
        let probs = LogProbabilities::from_config(&self.config);
        let mut graph = SearchGraph::new();

        let mut entries = Vec::with_capacity(self.grammar.len());
        let mut exits = Vec::with_capacity(self.grammar.len());
        for node in self.grammar.nodes() {
            let entry = graph.add_state(StateKind::Grammar {
                node: node.id(),
                exit: false,
            });
            let exit = graph.add_state(StateKind::Grammar {
                node: node.id(),
                exit: true,
            });
            if node.is_final() {
                graph.set_final(exit);
            }
            entries.push(entry);
            exits.push(exit);
        }

        for node in self.grammar.nodes() {
            let (entry, exit) = (entries[node.id().index()], exits[node.id().index()]);
            self.expand_node(&mut graph, node, entry, exit, &probs);
            for edge in node.edges() {
                let language = if edge.log_probability == LOG_ZERO {
                    LOG_ZERO
                } else {
                    edge.log_probability * self.config.language_weight
                };
                graph.add_arc(
                    exit,
                    SearchStateArc::new(entries[edge.target.index()]).with_language(language),
                );
            }
        }

        let initial = entries[self.grammar.initial_node().index()];
        graph.set_initial(initial);

        if self.config.add_out_of_grammar_branch {
            attach_phone_loop(
                &mut graph,
                initial,
                &self.lexicon.units(),
                linear_to_log(self.config.out_of_grammar_probability),
                linear_to_log(self.config.phone_insertion_probability),
                &self.config,
            );
        }
        Ok(graph)
    }

    fn expand_node(
        &self,
        graph: &mut SearchGraph,
        node: &GrammarNode,
        entry: StateId,
        exit: StateId,
        probs: &LogProbabilities,
    ) {
        let Some(word) = node.word() else {
            graph.add_arc(entry, SearchStateArc::new(exit));
            return;
        };
        let Some(units) = self.lexicon.pronunciation(word) else {
            tracing::warn!(word, "linguist: no pronunciation, word becomes a pass-through");
            graph.add_arc(entry, SearchStateArc::new(exit));
            return;
        };

        let filler = self.lexicon.is_filler(word);
        let word_state = graph.add_state(StateKind::Word {
            word: Arc::from(word),
            filler,
        });
        graph.add_arc(entry, SearchStateArc::new(word_state));

        let silence = self.lexicon.silence_unit();
        let mut tail = word_state;
        let mut tail_exit = None;
        for (which, &unit) in units.iter().enumerate() {
            let insertion = if unit == silence || word == SILENCE_SPELLING {
                probs.silence
            } else if filler {
                probs.filler
            } else if which == 0 {
                probs.word
            } else {
                probs.unit
            };
            let unit_state = graph.add_state(StateKind::Unit { unit });
            let arc = SearchStateArc::new(unit_state).with_insertion(insertion);
            graph.add_arc(tail, with_exit(arc, tail_exit));
            let (last, exit_prob) = expand_hmm(graph, unit_state, unit, &self.config);
            tail = last;
            tail_exit = Some(exit_prob);
        }
        graph.add_arc(tail, with_exit(SearchStateArc::new(exit), tail_exit));
    }
}

fn with_exit(arc: SearchStateArc, exit: Option<f32>) -> SearchStateArc {
    match exit {
        Some(p) => arc.with_acoustic(p),
        None => arc,
    }
}

struct LogProbabilities {
    word: f32,
    silence: f32,
    filler: f32,
    unit: f32,
}

impl LogProbabilities {
    fn from_config(config: &LinguistConfig) -> Self {
        Self {
            word: linear_to_log(config.word_insertion_probability),
            silence: linear_to_log(config.silence_insertion_probability),
            filler: linear_to_log(config.filler_insertion_probability),
            unit: linear_to_log(config.unit_insertion_probability),
        }
    }
}

/// Adds a left-to-right chain of emitting states for `unit` behind `parent`.
/// Returns the last state of the chain and the log weight of leaving it.
pub(crate) fn expand_hmm(
    graph: &mut SearchGraph,
    parent: StateId,
    unit: UnitId,
    config: &LinguistConfig,
) -> (StateId, f32) {
    let stay = linear_to_log(config.hmm_self_loop_probability);
    let advance = linear_to_log(1.0 - config.hmm_self_loop_probability);

    let mut prev = parent;
    let mut prev_exit = None;
    for index in 0..config.hmm_states_per_unit {
        let state = graph.add_state(StateKind::Hmm { unit, index });
        graph.add_arc(prev, with_exit(SearchStateArc::new(state), prev_exit));
        graph.add_arc(state, SearchStateArc::new(state).with_acoustic(stay));
        prev = state;
        prev_exit = Some(advance);
    }
    (prev, advance)
}

impl Linguist for FlatLinguist {
    fn allocate(&mut self) -> Result<(), AlignmentError> {
        let graph = self.compile()?;
        tracing::debug!(
            grammar_nodes = self.grammar.len(),
            states = graph.len(),
            arcs = graph.arc_count(),
            "linguist: search graph compiled"
        );
        self.search_graph = Some(Arc::new(graph));
        Ok(())
    }

    fn deallocate(&mut self) {
        self.search_graph = None;
    }

    fn search_graph(&self) -> Result<Arc<SearchGraph>, AlignmentError> {
        self.search_graph
            .clone()
            .ok_or_else(|| AlignmentError::runtime("linguist", "search graph requested before allocate"))
    }
}
