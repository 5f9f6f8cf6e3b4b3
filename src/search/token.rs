//! Arena-owned token lattice.
//!
//! Tokens refer to their predecessor by [`TokenId`]. Nothing is freed while a
//! recognition runs; [`TokenLattice::compact`] rebuilds the arena from a set
//! of live roots when it grows too large.

use crate::linguist::{SearchGraph, StateId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(usize);

impl TokenId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token {
    pub predecessor: Option<TokenId>,
    pub state: StateId,
    pub score: f32,
    pub language_score: f32,
    pub insertion_score: f32,
    /// Acoustic log-likelihood added by the scorer; `None` until scored.
    pub acoustic_score: Option<f32>,
    pub frame: usize,
    pub emitting: bool,
    pub is_final: bool,
    pub is_word: bool,
}

impl Token {
    pub fn is_scored(&self) -> bool {
        self.acoustic_score.is_some()
    }
}

#[derive(Debug, Default)]
pub struct TokenLattice {
    tokens: Vec<Token>,
}

impl TokenLattice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for the first state of a recognition.
    pub fn push_initial(&mut self, graph: &SearchGraph, state: StateId, frame: usize) -> TokenId {
        self.push_token(graph, None, state, 0.0, 0.0, 0.0, frame)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push_token(
        &mut self,
        graph: &SearchGraph,
        predecessor: Option<TokenId>,
        state: StateId,
        score: f32,
        language_score: f32,
        insertion_score: f32,
        frame: usize,
    ) -> TokenId {
        let search_state = graph.state(state);
        let id = TokenId(self.tokens.len());
        self.tokens.push(Token {
            predecessor,
            state,
            score,
            language_score,
            insertion_score,
            acoustic_score: None,
            frame,
            emitting: search_state.is_emitting(),
            is_final: search_state.is_final(),
            is_word: search_state.is_word(),
        });
        id
    }

    pub fn get(&self, id: TokenId) -> &Token {
        &self.tokens[id.0]
    }

    pub fn score(&self, id: TokenId) -> f32 {
        self.tokens[id.0].score
    }

    pub fn set_score(&mut self, id: TokenId, score: f32) {
        self.tokens[id.0].score = score;
    }

    /// Adds the frame's acoustic score and marks the token as scored.
    pub fn apply_acoustic_score(&mut self, id: TokenId, acoustic: f32) {
        let token = &mut self.tokens[id.0];
        token.score += acoustic;
        token.acoustic_score = Some(acoustic);
    }

    pub fn predecessor(&self, id: TokenId) -> Option<TokenId> {
        self.tokens[id.0].predecessor
    }

    /// Walks from `id` back to the start of the utterance, `id` first.
    pub fn path(&self, id: TokenId) -> impl Iterator<Item = TokenId> + '_ {
        std::iter::successors(Some(id), move |&t| self.predecessor(t))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    /// Number of distinct tokens on the paths leading to `roots`.
    pub fn reachable_count(&self, roots: &[TokenId]) -> usize {
        self.mark(roots).iter().filter(|&&m| m).count()
    }

    fn mark(&self, roots: &[TokenId]) -> Vec<bool> {
        let mut live = vec![false; self.tokens.len()];
        for &root in roots {
            let mut cur = Some(root);
            while let Some(id) = cur {
                if std::mem::replace(&mut live[id.0], true) {
                    break;
                }
                cur = self.tokens[id.0].predecessor;
            }
        }
        live
    }

    /// Drops every token not on a path to `roots`, keeping the relative order
    /// of the survivors. Returns the old-to-new id map; dropped tokens map to
    /// `None`.
    pub fn compact(&mut self, roots: &[TokenId]) -> Vec<Option<TokenId>> {
        let live = self.mark(roots);
        let mut remap = vec![None; self.tokens.len()];
        let mut kept = Vec::with_capacity(live.iter().filter(|&&m| m).count());
        for (old, token) in self.tokens.iter().enumerate() {
            if !live[old] {
                continue;
            }
            let mut token = *token;
            // Predecessors precede their successors in the arena, so they are
            // already remapped.
            token.predecessor = token.predecessor.and_then(|p| remap[p.0]);
            remap[old] = Some(TokenId(kept.len()));
            kept.push(token);
        }
        let before = self.tokens.len();
        self.tokens = kept;
        tracing::debug!(before, after = self.tokens.len(), "lattice: compacted");
        remap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linguist::StateKind;

    fn graph() -> (SearchGraph, StateId, StateId) {
        let mut graph = SearchGraph::new();
        let word = graph.add_state(StateKind::Word {
            word: "a".into(),
            filler: false,
        });
        let hmm = graph.add_state(StateKind::Hmm { unit: 1, index: 0 });
        (graph, word, hmm)
    }

    #[test]
    fn tokens_copy_state_flags() {
        let (graph, word, hmm) = graph();
        let mut lattice = TokenLattice::new();
        let root = lattice.push_initial(&graph, word, 0);
        let t = lattice.push_token(&graph, Some(root), hmm, -1.0, 0.0, 0.0, 0);
        assert!(lattice.get(root).is_word);
        assert!(lattice.get(t).emitting);
        assert!(!lattice.get(t).is_scored());
        lattice.apply_acoustic_score(t, -2.0);
        assert_eq!(lattice.score(t), -3.0);
        assert!(lattice.get(t).is_scored());
        assert_eq!(lattice.path(t).collect::<Vec<_>>(), vec![t, root]);
    }

    #[test]
    fn compact_keeps_live_paths_in_order() {
        let (graph, word, hmm) = graph();
        let mut lattice = TokenLattice::new();
        let root = lattice.push_initial(&graph, word, 0);
        let dead = lattice.push_token(&graph, Some(root), hmm, -5.0, 0.0, 0.0, 0);
        let a = lattice.push_token(&graph, Some(root), hmm, -1.0, 0.0, 0.0, 0);
        let b = lattice.push_token(&graph, Some(a), hmm, -2.0, 0.0, 0.0, 1);

        let remap = lattice.compact(&[b]);
        assert_eq!(lattice.len(), 3);
        assert_eq!(remap[dead.index()], None);
        let new_b = remap[b.index()].unwrap();
        let scores: Vec<f32> = lattice.path(new_b).map(|t| lattice.score(t)).collect();
        assert_eq!(scores, vec![-2.0, -1.0, 0.0]);
    }

    #[test]
    fn shared_prefixes_are_counted_once() {
        let (graph, word, hmm) = graph();
        let mut lattice = TokenLattice::new();
        let root = lattice.push_initial(&graph, word, 0);
        let a = lattice.push_token(&graph, Some(root), hmm, -1.0, 0.0, 0.0, 0);
        let b = lattice.push_token(&graph, Some(root), hmm, -1.5, 0.0, 0.0, 0);
        assert_eq!(lattice.reachable_count(&[a, b]), 3);
    }
}
