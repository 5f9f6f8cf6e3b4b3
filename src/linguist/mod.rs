//! State-level search graphs.
//!
//! A [`Linguist`] turns a [`GrammarGraph`](crate::grammar::GrammarGraph) into a
//! [`SearchGraph`]: a flat arena of [`SearchState`]s connected by weighted
//! [`SearchStateArc`]s. Only [`StateKind::Hmm`] states consume acoustic frames.

pub mod flat;
pub mod lexicon;
pub mod phone_loop;

use std::fmt;
use std::sync::Arc;

use crate::error::AlignmentError;
use crate::grammar::NodeId;
use crate::logmath::LOG_ONE;

pub use flat::FlatLinguist;
pub use lexicon::{CharLexicon, Lexicon};

/// Index into the unit inventory of a [`Lexicon`]; also the column of a
/// frame-score table.
pub type UnitId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(usize);

impl StateId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateKind {
    /// Entry (`exit == false`) or exit branch of a grammar node.
    Grammar { node: NodeId, exit: bool },
    /// Word boundary. Phrase-spot rewards and word-beam pruning apply here.
    Word { word: Arc<str>, filler: bool },
    Unit { unit: UnitId },
    /// Emitting HMM state `index` of `unit`.
    Hmm { unit: UnitId, index: usize },
    /// Fan-out into every unit of the out-of-grammar phone loop.
    LoopBranch,
    /// Return from the phone loop to the grammar.
    LoopBack,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchStateArc {
    pub target: StateId,
    pub language_probability: f32,
    pub insertion_probability: f32,
    /// HMM transition weight (self-loop or exit); `LOG_ONE` elsewhere.
    pub acoustic_probability: f32,
}

impl SearchStateArc {
    pub fn new(target: StateId) -> Self {
        Self {
            target,
            language_probability: LOG_ONE,
            insertion_probability: LOG_ONE,
            acoustic_probability: LOG_ONE,
        }
    }

    pub fn with_language(mut self, log_probability: f32) -> Self {
        self.language_probability = log_probability;
        self
    }

    pub fn with_insertion(mut self, log_probability: f32) -> Self {
        self.insertion_probability = log_probability;
        self
    }

    pub fn with_acoustic(mut self, log_probability: f32) -> Self {
        self.acoustic_probability = log_probability;
        self
    }

    /// Total log transition weight.
    pub fn probability(&self) -> f32 {
        self.language_probability + self.insertion_probability + self.acoustic_probability
    }
}

#[derive(Debug, Clone)]
pub struct SearchState {
    kind: StateKind,
    is_final: bool,
    arcs: Vec<SearchStateArc>,
}

impl SearchState {
    pub fn kind(&self) -> &StateKind {
        &self.kind
    }

    pub fn is_emitting(&self) -> bool {
        matches!(self.kind, StateKind::Hmm { .. })
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn is_word(&self) -> bool {
        matches!(self.kind, StateKind::Word { .. })
    }

    pub fn word(&self) -> Option<&str> {
        match &self.kind {
            StateKind::Word { word, .. } => Some(word.as_ref()),
            _ => None,
        }
    }

    pub fn is_filler(&self) -> bool {
        matches!(self.kind, StateKind::Word { filler: true, .. })
    }

    /// Unit scored by this state, if it is emitting.
    pub fn unit(&self) -> Option<UnitId> {
        match self.kind {
            StateKind::Hmm { unit, .. } => Some(unit),
            _ => None,
        }
    }

    pub fn arcs(&self) -> &[SearchStateArc] {
        &self.arcs
    }
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StateKind::Grammar { node, exit } => {
                write!(f, "G{}{}", node.index(), if *exit { "x" } else { "e" })
            }
            StateKind::Word { word, .. } => write!(f, "W[{word}]"),
            StateKind::Unit { unit } => write!(f, "U[{unit}]"),
            StateKind::Hmm { unit, index } => write!(f, "H[{unit}.{index}]"),
            StateKind::LoopBranch => f.write_str("LoopBranch"),
            StateKind::LoopBack => f.write_str("LoopBack"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchGraph {
    states: Vec<SearchState>,
    initial: StateId,
}

impl SearchGraph {
    /// Number of distinct state kinds visited in order along a path
    /// (grammar, word, unit, HMM, phone loop).
    pub const NUM_STATE_ORDER: usize = 5;

    pub(crate) fn new() -> Self {
        Self {
            states: Vec::new(),
            initial: StateId(0),
        }
    }

    pub(crate) fn add_state(&mut self, kind: StateKind) -> StateId {
        let id = StateId(self.states.len());
        self.states.push(SearchState {
            kind,
            is_final: false,
            arcs: Vec::new(),
        });
        id
    }

    pub(crate) fn add_arc(&mut self, from: StateId, arc: SearchStateArc) {
        debug_assert!(!arc.probability().is_nan(), "search arc weight is NaN");
        self.states[from.0].arcs.push(arc);
    }

    pub(crate) fn set_final(&mut self, id: StateId) {
        self.states[id.0].is_final = true;
    }

    pub(crate) fn set_initial(&mut self, id: StateId) {
        self.initial = id;
    }

    pub fn initial_state(&self) -> StateId {
        self.initial
    }

    pub fn num_state_order(&self) -> usize {
        Self::NUM_STATE_ORDER
    }

    pub fn state(&self, id: StateId) -> &SearchState {
        &self.states[id.0]
    }

    pub fn states(&self) -> &[SearchState] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn arc_count(&self) -> usize {
        self.states.iter().map(|s| s.arcs.len()).sum()
    }
}

/// Compiles a grammar into a search graph and owns it for the duration of a
/// recognition.
pub trait Linguist: Send {
    fn allocate(&mut self) -> Result<(), AlignmentError>;

    fn deallocate(&mut self);

    fn start_recognition(&mut self) {}

    fn stop_recognition(&mut self) {}

    /// Fails when called before [`Linguist::allocate`].
    fn search_graph(&self) -> Result<Arc<SearchGraph>, AlignmentError>;
}
