pub mod config;
pub mod error;
pub mod grammar;
pub mod linguist;
pub mod logmath;
pub mod pipeline;
pub mod search;
pub mod spotter;
pub mod types;

pub use config::AlignerConfig;
pub use error::AlignmentError;
pub use grammar::{GrammarBuilder, GrammarGraph};
pub use linguist::{CharLexicon, FlatLinguist, Lexicon, Linguist};
pub use pipeline::builder::AlignerBuilder;
pub use pipeline::runtime::Aligner;
pub use pipeline::traits::{LinguistFactory, PrunerFactory, ScorerFactory};
pub use search::{AlignerSearchManager, FrameScores, SearchResult};
pub use spotter::{PhraseSpotRegistry, PhraseSpotterResult, SimplePhraseSpotter};
pub use types::{AlignmentInput, AlignmentOutput, WordTiming};
