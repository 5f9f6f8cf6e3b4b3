//! Word-level grammar graphs.
//!
//! A [`GrammarGraph`] is an arena of [`GrammarNode`]s addressed by
//! [`NodeId`]. Node 0 is always the initial node. Parallel edges between the
//! same pair of nodes are kept as separate entries.

pub mod builder;
pub mod no_skip;
pub mod text;

use std::fmt::Write as _;

pub use builder::GrammarBuilder;
pub use no_skip::build_no_skip_grammar;
pub use text::normalize_transcript;

/// Spelling of the silence word placed on the initial and final nodes.
pub const SILENCE_SPELLING: &str = "<sil>";

/// Spelling of the out-of-grammar word produced by the phone loop.
pub const UNKNOWN_SPELLING: &str = "<unk>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrammarEdge {
    pub target: NodeId,
    /// Natural-log transition weight; `-inf` marks an impossible edge.
    pub log_probability: f32,
}

#[derive(Debug, Clone)]
pub struct GrammarNode {
    id: NodeId,
    word: Option<String>,
    is_final: bool,
    edges: Vec<GrammarEdge>,
}

impl GrammarNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// `None` for branch nodes that carry no word.
    pub fn word(&self) -> Option<&str> {
        self.word.as_deref()
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn is_empty(&self) -> bool {
        self.word.is_none()
    }

    pub fn edges(&self) -> &[GrammarEdge] {
        &self.edges
    }
}

#[derive(Debug, Clone)]
pub struct GrammarGraph {
    nodes: Vec<GrammarNode>,
}

impl GrammarGraph {
    /// Creates a graph holding only its initial node.
    pub(crate) fn new(initial_word: Option<&str>) -> Self {
        let mut graph = Self { nodes: Vec::new() };
        graph.add_node(initial_word);
        graph
    }

    pub(crate) fn add_node(&mut self, word: Option<&str>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(GrammarNode {
            id,
            word: word.map(str::to_string),
            is_final: false,
            edges: Vec::new(),
        });
        id
    }

    pub(crate) fn add_edge(&mut self, from: NodeId, to: NodeId, log_probability: f32) {
        debug_assert!(!log_probability.is_nan(), "grammar edge weight is NaN");
        self.nodes[from.0].edges.push(GrammarEdge {
            target: to,
            log_probability,
        });
    }

    pub(crate) fn set_final(&mut self, id: NodeId, is_final: bool) {
        self.nodes[id.0].is_final = is_final;
    }

    pub fn initial_node(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &GrammarNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[GrammarNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn final_nodes(&self) -> impl Iterator<Item = &GrammarNode> + '_ {
        self.nodes.iter().filter(|n| n.is_final)
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.edges.len()).sum()
    }

    pub fn in_degree(&self, id: NodeId) -> usize {
        self.nodes
            .iter()
            .flat_map(|n| n.edges.iter())
            .filter(|e| e.target == id)
            .count()
    }

    /// Flags every node reachable from the initial node.
    pub fn reachable(&self) -> Vec<bool> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![self.initial_node()];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.0], true) {
                continue;
            }
            stack.extend(self.nodes[id.0].edges.iter().map(|e| e.target));
        }
        seen
    }

    /// Graphviz rendering, used for diagnostics when a decode goes wrong.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph grammar {\n    rankdir=LR;\n");
        for node in &self.nodes {
            let label = node.word.as_deref().unwrap_or("");
            let shape = if node.is_final {
                "doublecircle"
            } else {
                "circle"
            };
            let _ = writeln!(
                out,
                "    n{} [label=\"{}:{}\" shape={}];",
                node.id.0,
                node.id.0,
                label.replace('"', "\\\""),
                shape
            );
            for edge in &node.edges {
                let _ = writeln!(
                    out,
                    "    n{} -> n{} [label=\"{:.3}\"];",
                    node.id.0, edge.target.0, edge.log_probability
                );
            }
        }
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_edges_are_kept() {
        let mut graph = GrammarGraph::new(Some(SILENCE_SPELLING));
        let a = graph.add_node(Some("a"));
        graph.add_edge(graph.initial_node(), a, 0.0);
        graph.add_edge(graph.initial_node(), a, -1.0);
        assert_eq!(graph.node(graph.initial_node()).edges().len(), 2);
        assert_eq!(graph.in_degree(a), 2);
    }

    #[test]
    fn reachable_ignores_disconnected_nodes() {
        let mut graph = GrammarGraph::new(None);
        let a = graph.add_node(Some("a"));
        let orphan = graph.add_node(Some("orphan"));
        graph.add_edge(graph.initial_node(), a, 0.0);
        let reach = graph.reachable();
        assert!(reach[a.index()]);
        assert!(!reach[orphan.index()]);
    }

    #[test]
    fn dot_output_lists_nodes_and_edges() {
        let mut graph = GrammarGraph::new(Some(SILENCE_SPELLING));
        let a = graph.add_node(Some("a"));
        graph.set_final(a, true);
        graph.add_edge(graph.initial_node(), a, 0.0);
        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph grammar {"));
        assert!(dot.contains("n0 -> n1"));
        assert!(dot.contains("doublecircle"));
    }
}
