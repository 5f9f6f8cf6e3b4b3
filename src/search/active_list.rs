use crate::config::BeamConfig;
use crate::logmath::linear_to_log;
use crate::search::token::{TokenId, TokenLattice};

/// The beam of one frame: emitting tokens competing for the next frame.
#[derive(Debug, Clone)]
pub struct ActiveList {
    tokens: Vec<TokenId>,
    best: Option<TokenId>,
    absolute_beam_width: usize,
    log_relative_beam_width: f32,
}

impl ActiveList {
    pub fn new(absolute_beam_width: usize, log_relative_beam_width: f32) -> Self {
        Self {
            tokens: Vec::new(),
            best: None,
            absolute_beam_width,
            log_relative_beam_width,
        }
    }

    /// Empty list with the same beam settings.
    pub fn new_instance(&self) -> Self {
        Self::new(self.absolute_beam_width, self.log_relative_beam_width)
    }

    /// Appends `id` and returns its slot for a later [`ActiveList::replace_at`].
    pub fn add(&mut self, id: TokenId, lattice: &TokenLattice) -> usize {
        self.tokens.push(id);
        self.offer_best(id, lattice);
        self.tokens.len() - 1
    }

    /// Swaps the token in `slot` for a better one reaching the same state.
    pub fn replace_at(&mut self, slot: usize, id: TokenId, lattice: &TokenLattice) {
        self.tokens[slot] = id;
        self.offer_best(id, lattice);
    }

    fn offer_best(&mut self, id: TokenId, lattice: &TokenLattice) {
        let better = match self.best {
            Some(best) => lattice.score(id) > lattice.score(best),
            None => true,
        };
        if better {
            self.best = Some(id);
        }
    }

    pub fn set_best_token(&mut self, id: TokenId) {
        self.best = Some(id);
    }

    pub fn best_token(&self) -> Option<TokenId> {
        self.best
    }

    pub fn best_score(&self, lattice: &TokenLattice) -> f32 {
        self.best.map_or(-f32::MAX, |b| lattice.score(b))
    }

    /// Scores below this fall outside the relative beam.
    pub fn beam_threshold(&self, lattice: &TokenLattice) -> f32 {
        self.best_score(lattice) + self.log_relative_beam_width
    }

    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn absolute_beam_width(&self) -> usize {
        self.absolute_beam_width
    }

    pub fn log_relative_beam_width(&self) -> f32 {
        self.log_relative_beam_width
    }

    /// Drops tokens below the beam threshold, then keeps at most
    /// `absolute_beam_width` of the best (0 keeps all).
    pub fn purge(mut self, lattice: &TokenLattice) -> Self {
        let threshold = self.beam_threshold(lattice);
        self.tokens.retain(|&t| lattice.score(t) >= threshold);
        if self.absolute_beam_width > 0 && self.tokens.len() > self.absolute_beam_width {
            self.tokens
                .sort_by(|&a, &b| lattice.score(b).total_cmp(&lattice.score(a)));
            self.tokens.truncate(self.absolute_beam_width);
        }
        if self.tokens.is_empty() {
            self.best = None;
        }
        self
    }

    /// Remaps token ids after a lattice compaction.
    pub(crate) fn remap(&mut self, remap: &[Option<TokenId>]) {
        self.tokens = self
            .tokens
            .iter()
            .filter_map(|t| remap[t.index()])
            .collect();
        self.best = self.best.and_then(|b| remap[b.index()]);
    }
}

/// Builds empty active lists with the configured beam.
#[derive(Debug, Clone)]
pub struct ActiveListFactory {
    absolute_beam_width: usize,
    log_relative_beam_width: f32,
}

impl ActiveListFactory {
    pub fn new(config: &BeamConfig) -> Self {
        Self {
            absolute_beam_width: config.absolute_beam_width,
            log_relative_beam_width: linear_to_log(config.relative_beam_width),
        }
    }

    pub fn new_instance(&self) -> ActiveList {
        ActiveList::new(self.absolute_beam_width, self.log_relative_beam_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linguist::{SearchGraph, StateKind};

    fn lattice_with_scores(scores: &[f32]) -> (TokenLattice, Vec<TokenId>) {
        let mut graph = SearchGraph::new();
        let hmm = graph.add_state(StateKind::Hmm { unit: 0, index: 0 });
        let mut lattice = TokenLattice::new();
        let ids = scores
            .iter()
            .map(|&s| lattice.push_token(&graph, None, hmm, s, 0.0, 0.0, 0))
            .collect();
        (lattice, ids)
    }

    #[test]
    fn empty_list_has_minimal_best_score() {
        let (lattice, _) = lattice_with_scores(&[]);
        let list = ActiveList::new(10, -5.0);
        assert_eq!(list.best_score(&lattice), -f32::MAX);
        assert!(list.best_token().is_none());
    }

    #[test]
    fn add_tracks_best_token() {
        let (lattice, ids) = lattice_with_scores(&[-3.0, -1.0, -2.0]);
        let mut list = ActiveList::new(0, -10.0);
        for &id in &ids {
            list.add(id, &lattice);
        }
        assert_eq!(list.best_token(), Some(ids[1]));
        assert_eq!(list.beam_threshold(&lattice), -11.0);
    }

    #[test]
    fn replace_at_overwrites_slot() {
        let (lattice, ids) = lattice_with_scores(&[-3.0, -0.5]);
        let mut list = ActiveList::new(0, -10.0);
        let slot = list.add(ids[0], &lattice);
        list.replace_at(slot, ids[1], &lattice);
        assert_eq!(list.tokens(), &[ids[1]]);
        assert_eq!(list.best_token(), Some(ids[1]));
    }

    #[test]
    fn purge_applies_relative_then_absolute_beam() {
        let (lattice, ids) = lattice_with_scores(&[0.0, -1.0, -2.0, -3.0, -50.0]);
        let mut list = ActiveList::new(3, -10.0);
        for &id in &ids {
            list.add(id, &lattice);
        }
        let before = list.len();
        let threshold = list.beam_threshold(&lattice);
        let pruned = list.purge(&lattice);
        assert!(pruned.len() <= before);
        assert_eq!(pruned.len(), 3);
        for &t in pruned.tokens() {
            assert!(lattice.score(t) >= threshold);
        }
        assert!(!pruned.tokens().contains(&ids[4]));
    }

    #[test]
    fn factory_converts_relative_width_to_log() {
        let factory = ActiveListFactory::new(&BeamConfig {
            absolute_beam_width: 7,
            relative_beam_width: 1e-10,
        });
        let list = factory.new_instance();
        assert_eq!(list.absolute_beam_width(), 7);
        assert!((list.log_relative_beam_width() - (1e-10f64).ln() as f32).abs() < 1e-4);
    }
}
