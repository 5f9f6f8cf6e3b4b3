use crate::config::GrammarConfig;
use crate::error::AlignmentError;
use crate::grammar::{GrammarGraph, NodeId, SILENCE_SPELLING};
use crate::logmath::{linear_to_log, LOG_ONE};

/// Compiles a transcript into the aligner grammar:
///
/// ```text
/// <sil> -> branch -> w0 -> w1 -> ... -> wN-1 -> <sil>(final)
/// ```
///
/// plus optional forward jumps (deletions), backward jumps and self-loops
/// (repetitions), as selected by [`GrammarConfig`].
#[derive(Debug, Clone, Default)]
pub struct GrammarBuilder {
    config: GrammarConfig,
}

impl GrammarBuilder {
    pub fn new(config: GrammarConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GrammarConfig {
        &self.config
    }

    pub fn build<S: AsRef<str>>(&self, words: &[S]) -> Result<GrammarGraph, AlignmentError> {
        self.config.validate()?;
        if words.is_empty() {
            return Err(AlignmentError::invalid_input(
                "cannot build an alignment grammar for an empty transcript",
            ));
        }

        let mut graph = GrammarGraph::new(Some(SILENCE_SPELLING));
        let initial = graph.initial_node();
        let final_node = graph.add_node(Some(SILENCE_SPELLING));
        graph.set_final(final_node, true);
        let branch = graph.add_node(None);

        let word_nodes: Vec<NodeId> = words
            .iter()
            .map(|w| graph.add_node(Some(&w.as_ref().to_lowercase())))
            .collect();

        graph.add_edge(initial, branch, LOG_ONE);
        add_base_path(&mut graph, &word_nodes, branch, final_node);

        if self.config.model_deletions {
            self.add_forward_jumps(&mut graph, &word_nodes, branch, final_node);
        }
        if self.config.model_backward_jumps {
            self.add_backward_jumps(&mut graph, &word_nodes);
        }
        if self.config.model_repetitions {
            self.add_self_loops(&mut graph, &word_nodes);
        }

        tracing::debug!(
            words = word_nodes.len(),
            nodes = graph.len(),
            edges = graph.edge_count(),
            "grammar: aligner grammar built"
        );
        Ok(graph)
    }

    /// Convenience wrapper: normalises `text` and builds the grammar.
    pub fn build_from_text(&self, text: &str) -> Result<GrammarGraph, AlignmentError> {
        let words = super::normalize_transcript(text);
        self.build(&words)
    }

    fn add_forward_jumps(
        &self,
        graph: &mut GrammarGraph,
        word_nodes: &[NodeId],
        branch: NodeId,
        final_node: NodeId,
    ) {
        let n = word_nodes.len() as isize;
        let k = self.config.num_allowed_grammar_jumps as isize;
        let log_jump = linear_to_log(self.config.forward_jump_probability);

        // i = -1 stands for the branch node in front of the first word.
        for i in -1..n {
            let from = if i < 0 { branch } else { word_nodes[i as usize] };
            for j in (i + 2)..n.min(i + k + 1) {
                graph.add_edge(from, word_nodes[j as usize], log_jump);
            }
        }

        // Trailing words may exit straight to the final node. The weight grows
        // with the number of skipped words.
        for i in (n - k - 1).max(0)..(n - 1) {
            let distance = (n - i) as f64;
            let weight = self.config.forward_jump_probability * distance.exp();
            graph.add_edge(word_nodes[i as usize], final_node, linear_to_log(weight));
        }
    }

    fn add_backward_jumps(&self, graph: &mut GrammarGraph, word_nodes: &[NodeId]) {
        let k = self.config.num_allowed_grammar_jumps as isize;
        let log_back = linear_to_log(self.config.backward_transition_probability);
        for i in 0..word_nodes.len() as isize {
            // The immediate predecessor (i - 1) is excluded.
            for j in (i - k - 1).max(0)..(i - 1) {
                graph.add_edge(word_nodes[i as usize], word_nodes[j as usize], log_back);
            }
        }
    }

    fn add_self_loops(&self, graph: &mut GrammarGraph, word_nodes: &[NodeId]) {
        let log_loop = linear_to_log(self.config.self_loop_probability);
        for &node in word_nodes {
            graph.add_edge(node, node, log_loop);
        }
    }
}

fn add_base_path(
    graph: &mut GrammarGraph,
    word_nodes: &[NodeId],
    branch: NodeId,
    final_node: NodeId,
) {
    let mut prev = branch;
    for &node in word_nodes {
        graph.add_edge(prev, node, LOG_ONE);
        prev = node;
    }
    graph.add_edge(prev, final_node, LOG_ONE);
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::grammar::GrammarEdge;

    const WORDS: [&str; 6] = ["the", "quick", "brown", "fox", "jumps", "over"];

    fn builder(config: GrammarConfig) -> GrammarBuilder {
        GrammarBuilder::new(config)
    }

    fn word_node(graph: &GrammarGraph, index: usize) -> NodeId {
        // initial, final, branch, then the words in order.
        graph.nodes()[3 + index].id()
    }

    fn position_of(id: NodeId) -> Option<usize> {
        id.index().checked_sub(3)
    }

    #[test]
    fn base_path_is_linear_with_log_one_weights() {
        let graph = builder(GrammarConfig::default()).build(&WORDS).unwrap();
        assert_eq!(graph.len(), WORDS.len() + 3);
        assert_eq!(graph.edge_count(), WORDS.len() + 2);
        for node in graph.nodes() {
            for edge in node.edges() {
                assert_eq!(edge.log_probability, LOG_ONE);
            }
        }
        let last = word_node(&graph, WORDS.len() - 1);
        let final_id = graph.final_nodes().next().unwrap().id();
        assert_eq!(graph.node(last).edges()[0].target, final_id);
    }

    #[test]
    fn words_are_lowercased() {
        let graph = builder(GrammarConfig::default())
            .build(&["The", "FOX"])
            .unwrap();
        assert_eq!(graph.node(word_node(&graph, 0)).word(), Some("the"));
        assert_eq!(graph.node(word_node(&graph, 1)).word(), Some("fox"));
    }

    #[test]
    fn empty_transcript_is_rejected() {
        let empty: [&str; 0] = [];
        assert!(builder(GrammarConfig::default()).build(&empty).is_err());
    }

    #[test]
    fn zero_jumps_disable_all_jump_edges() {
        let config = GrammarConfig {
            model_deletions: true,
            model_backward_jumps: true,
            forward_jump_probability: 0.3,
            backward_transition_probability: 0.3,
            num_allowed_grammar_jumps: 0,
            ..GrammarConfig::default()
        };
        let graph = builder(config).build(&WORDS).unwrap();
        assert_eq!(graph.edge_count(), WORDS.len() + 2);
    }

    #[test]
    fn forward_jumps_respect_span_bound() {
        let k = 3;
        let config = GrammarConfig {
            model_deletions: true,
            forward_jump_probability: 0.1,
            num_allowed_grammar_jumps: k,
            ..GrammarConfig::default()
        };
        let graph = builder(config).build(&WORDS).unwrap();
        let log_jump = linear_to_log(0.1);
        let mut jumps = 0;
        for (i, _) in WORDS.iter().enumerate() {
            let from = word_node(&graph, i);
            for edge in graph.node(from).edges() {
                if let Some(j) = position_of(edge.target) {
                    if j > i + 1 {
                        assert!(j - i - 1 <= k, "edge {i}->{j} skips too many words");
                        assert_eq!(edge.log_probability, log_jump);
                        jumps += 1;
                    }
                }
            }
        }
        assert!(jumps > 0);
    }

    #[test]
    fn branch_node_gets_forward_jumps() {
        let config = GrammarConfig {
            model_deletions: true,
            forward_jump_probability: 0.1,
            num_allowed_grammar_jumps: 2,
            ..GrammarConfig::default()
        };
        let graph = builder(config).build(&WORDS).unwrap();
        let branch = graph.nodes()[2].id();
        let targets: Vec<NodeId> = graph.node(branch).edges().iter().map(|e| e.target).collect();
        assert_eq!(targets, vec![word_node(&graph, 0), word_node(&graph, 1)]);
    }

    #[test]
    fn exits_to_final_grow_with_distance() {
        let k = 2;
        let p = 0.1;
        let config = GrammarConfig {
            model_deletions: true,
            forward_jump_probability: p,
            num_allowed_grammar_jumps: k,
            ..GrammarConfig::default()
        };
        let graph = builder(config).build(&WORDS).unwrap();
        let final_id = graph.final_nodes().next().unwrap().id();
        let n = WORDS.len();
        let exits: Vec<(usize, GrammarEdge)> = (0..n - 1)
            .flat_map(|i| {
                graph
                    .node(word_node(&graph, i))
                    .edges()
                    .iter()
                    .filter(|e| e.target == final_id)
                    .map(move |e| (i, *e))
                    .collect::<Vec<_>>()
            })
            .collect();
        assert_eq!(exits.len(), k);
        for (i, edge) in exits {
            let expected = linear_to_log(p * ((n - i) as f64).exp());
            assert!((edge.log_probability - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn short_transcript_with_wide_jumps_does_not_underflow() {
        let config = GrammarConfig {
            model_deletions: true,
            model_backward_jumps: true,
            forward_jump_probability: 0.1,
            backward_transition_probability: 0.1,
            num_allowed_grammar_jumps: 10,
            ..GrammarConfig::default()
        };
        let graph = builder(config).build(&["only"]).unwrap();
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn backward_jumps_skip_immediate_predecessor() {
        let config = GrammarConfig {
            model_backward_jumps: true,
            backward_transition_probability: 0.05,
            num_allowed_grammar_jumps: 2,
            ..GrammarConfig::default()
        };
        let graph = builder(config).build(&WORDS).unwrap();
        for (i, _) in WORDS.iter().enumerate() {
            let from = word_node(&graph, i);
            let back: Vec<usize> = graph
                .node(from)
                .edges()
                .iter()
                .filter_map(|e| position_of(e.target))
                .filter(|&j| j < i)
                .collect();
            assert!(!back.contains(&(i.wrapping_sub(1))));
            for j in &back {
                assert!(i - j >= 2 && i - j <= 3);
            }
        }
        let from_last = word_node(&graph, 5);
        assert_eq!(graph.node(from_last).edges().len(), 1 + 2);
    }

    #[test]
    fn self_loop_adds_exactly_one_edge_per_word() {
        let plain = builder(GrammarConfig::default()).build(&WORDS).unwrap();
        let config = GrammarConfig {
            model_repetitions: true,
            self_loop_probability: 0.2,
            ..GrammarConfig::default()
        };
        let looped = builder(config).build(&WORDS).unwrap();
        for (a, b) in plain.nodes().iter().zip(looped.nodes()) {
            if b.word().is_some() && position_of(b.id()).is_some() {
                assert_eq!(b.edges().len(), a.edges().len() + 1);
                let self_edges: Vec<_> = b.edges().iter().filter(|e| e.target == b.id()).collect();
                assert_eq!(self_edges.len(), 1);
                assert_eq!(self_edges[0].log_probability, linear_to_log(0.2));
            } else {
                assert_eq!(a.edges(), b.edges());
            }
        }
    }

    #[test]
    fn random_configs_produce_well_formed_graphs() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let len = rng.gen_range(1..12);
            let words: Vec<String> = (0..len).map(|i| format!("w{i}")).collect();
            let config = GrammarConfig {
                model_deletions: rng.gen(),
                model_repetitions: rng.gen(),
                model_backward_jumps: rng.gen(),
                forward_jump_probability: rng.gen_range(0.0..0.2),
                backward_transition_probability: rng.gen_range(0.0..1.0),
                self_loop_probability: rng.gen_range(0.0..1.0),
                num_allowed_grammar_jumps: rng.gen_range(0..6),
            };
            let graph = builder(config.clone()).build(&words).unwrap();

            assert_eq!(graph.initial_node().index(), 0);
            let reach = graph.reachable();
            assert!(graph.final_nodes().any(|n| reach[n.id().index()]));
            for i in 0..len {
                let id = word_node(&graph, i);
                assert!(graph.in_degree(id) >= 1);
                assert!(!graph.node(id).edges().is_empty());
            }
            for node in graph.nodes() {
                for edge in node.edges() {
                    assert!(!edge.log_probability.is_nan());
                    if let (Some(i), Some(j)) =
                        (position_of(node.id()), position_of(edge.target))
                    {
                        if j > i + 1 {
                            assert!(j - i - 1 <= config.num_allowed_grammar_jumps);
                        }
                    }
                }
            }
        }
    }
}
