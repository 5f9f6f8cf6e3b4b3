//! Frame-synchronous Viterbi search over a [`SearchGraph`](crate::linguist::SearchGraph).

pub mod active_list;
pub mod manager;
pub mod pruner;
pub mod result;
pub mod scorer;
pub mod token;

pub use active_list::{ActiveList, ActiveListFactory};
pub use manager::{AlignerSearchManager, SearchStats, SearchStatus};
pub use pruner::{Pruner, SimplePruner};
pub use result::{PathToken, SearchResult};
pub use scorer::{AcousticScorer, FrameScores, ScoreOutcome, TableScorer};
pub use token::{Token, TokenId, TokenLattice};
