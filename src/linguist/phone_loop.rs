use std::sync::Arc;

use crate::config::LinguistConfig;
use crate::grammar::UNKNOWN_SPELLING;
use crate::linguist::flat::expand_hmm;
use crate::linguist::{SearchGraph, SearchStateArc, StateId, StateKind, UnitId};

/// Hangs a loop over all context-independent units off `anchor`:
///
/// ```text
/// anchor -> <unk> -> branch -> unit -> hmm.. -> loop-back -> anchor
/// ```
///
/// Entering the loop costs `log_out_of_grammar`; every unit entered inside it
/// costs `log_phone_insertion`. Audio that matches nothing in the grammar can
/// be absorbed here instead of forcing a grammar word onto it.
pub(crate) fn attach_phone_loop(
    graph: &mut SearchGraph,
    anchor: StateId,
    units: &[UnitId],
    log_out_of_grammar: f32,
    log_phone_insertion: f32,
    config: &LinguistConfig,
) -> StateId {
    let unknown = graph.add_state(StateKind::Word {
        word: Arc::from(UNKNOWN_SPELLING),
        filler: true,
    });
    let branch = graph.add_state(StateKind::LoopBranch);
    let loop_back = graph.add_state(StateKind::LoopBack);

    graph.add_arc(unknown, SearchStateArc::new(branch));
    graph.add_arc(loop_back, SearchStateArc::new(anchor));

    for &unit in units {
        let unit_state = graph.add_state(StateKind::Unit { unit });
        graph.add_arc(
            branch,
            SearchStateArc::new(unit_state).with_insertion(log_phone_insertion),
        );
        let (last, exit) = expand_hmm(graph, unit_state, unit, config);
        graph.add_arc(last, SearchStateArc::new(loop_back).with_acoustic(exit));
    }

    graph.add_arc(
        anchor,
        SearchStateArc::new(unknown).with_insertion(log_out_of_grammar),
    );
    tracing::trace!(units = units.len(), "linguist: phone loop attached");
    unknown
}
