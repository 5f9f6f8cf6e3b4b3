use crate::error::AlignmentError;
use crate::grammar::{GrammarGraph, SILENCE_SPELLING};
use crate::logmath::{linear_to_log, LOG_ONE};

/// Exit weight from the silence loop into the final node.
const LOOP_EXIT_PROBABILITY: f64 = 0.0001;

/// Strict keyword topology used by the phrase spotter:
///
/// ```text
/// <sil> -> w0 -> ... -> wN-1 -> <sil>(loop) -> <sil>(final)
///   ^__________________________________|
/// ```
///
/// The loop node can return to the initial node, so the phrase may occur any
/// number of times. Leaving the loop for the final node is heavily penalised.
pub fn build_no_skip_grammar<S: AsRef<str>>(words: &[S]) -> Result<GrammarGraph, AlignmentError> {
    if words.is_empty() {
        return Err(AlignmentError::invalid_input(
            "cannot build a spotting grammar for an empty phrase",
        ));
    }

    let mut graph = GrammarGraph::new(Some(SILENCE_SPELLING));
    let initial = graph.initial_node();
    let final_node = graph.add_node(Some(SILENCE_SPELLING));
    graph.set_final(final_node, true);
    let loop_node = graph.add_node(Some(SILENCE_SPELLING));

    graph.add_edge(initial, loop_node, LOG_ONE);
    graph.add_edge(loop_node, initial, LOG_ONE);

    let mut last = initial;
    for word in words {
        let node = graph.add_node(Some(&word.as_ref().to_lowercase()));
        graph.add_edge(last, node, LOG_ONE);
        last = node;
    }
    graph.add_edge(last, loop_node, LOG_ONE);
    graph.add_edge(loop_node, final_node, linear_to_log(LOOP_EXIT_PROBABILITY));

    tracing::trace!(words = words.len(), nodes = graph.len(), "grammar: no-skip grammar built");
    Ok(graph)
}
