//! The graph matcher (spec.md §4.2, C2): walks the IR from candidate root
//! nodes and returns every subgraph binding that satisfies a pattern,
//! trying both operand orders at each node marked commutative.

use super::template::{OpPattern, PatternInput};
use crate::ir::{Graph, Node};
use std::collections::HashMap;

/// A successful match: pattern-variable bindings to concrete node names,
/// plus every node visited while matching (used to compute the scope).
#[derive(Clone, Debug, Default)]
pub struct Match {
    bindings: HashMap<&'static str, String>,
    visited: Vec<String>,
}

impl Match {
    pub fn node<'g>(&self, graph: &'g Graph, var: &str) -> Option<&'g Node> {
        self.bindings
            .get(var)
            .and_then(|name| graph.get_node_by_name(name))
    }

    pub fn node_name(&self, var: &str) -> Option<&str> {
        self.bindings.get(var).map(|s| s.as_str())
    }

    pub fn visited_names(&self) -> impl Iterator<Item = &str> {
        self.visited.iter().map(|s| s.as_str())
    }

    /// The common name-prefix of every node this match touched (spec.md
    /// Glossary, "scope"). Top-level nodes with no `/` in their name (the
    /// weight/bias constants a cell reads, which live outside any loop
    /// frame by convention) are excluded — including them would collapse
    /// the common prefix to nothing.
    pub fn scope(&self) -> Option<String> {
        crate::ir::common_scope(self.visited_names().filter(|n| n.contains('/')))
    }
}

pub struct GraphMatcher<'p> {
    pattern: &'p OpPattern,
}

impl<'p> GraphMatcher<'p> {
    pub fn new(pattern: &'p OpPattern) -> Self {
        GraphMatcher { pattern }
    }

    /// Snapshots the node list once and returns every binding found. Later
    /// rewrites of earlier matches never invalidate later matches in the
    /// same batch because each rewrite removes its scope-prefixed nodes
    /// before the next is processed (spec.md §5).
    pub fn match_ops(&self, graph: &Graph) -> Vec<Match> {
        let mut out = Vec::new();
        for node in graph.get_nodes() {
            if !self.pattern.op_types.contains(&node.op_type.as_str()) {
                continue;
            }
            let mut state = MatchState::default();
            if match_node(graph, node, self.pattern, &mut state) {
                out.push(Match {
                    bindings: state.bindings,
                    visited: state.visited,
                });
            }
        }
        out
    }
}

#[derive(Clone, Default)]
struct MatchState {
    bindings: HashMap<&'static str, String>,
    visited: Vec<String>,
}

fn bind_var(name: &'static str, node: &Node, state: &mut MatchState) -> bool {
    match state.bindings.get(name) {
        Some(existing) => existing == &node.name,
        None => {
            state.bindings.insert(name, node.name.clone());
            true
        }
    }
}

fn match_node(graph: &Graph, node: &Node, pattern: &OpPattern, state: &mut MatchState) -> bool {
    if !pattern.op_types.contains(&node.op_type.as_str()) {
        return false;
    }
    if let Some(name) = pattern.var_name {
        if !bind_var(name, node, state) {
            return false;
        }
    }
    state.visited.push(node.name.clone());

    if pattern.inputs.is_empty() {
        return true;
    }
    if node.inputs.len() < pattern.inputs.len() {
        return false;
    }

    if pattern.commutative && pattern.inputs.len() == 2 {
        for order in [[0usize, 1usize], [1, 0]] {
            let mut trial = state.clone();
            let ok = match_input(graph, &node.inputs[order[0]], &pattern.inputs[0], &mut trial)
                && match_input(graph, &node.inputs[order[1]], &pattern.inputs[1], &mut trial);
            if ok {
                *state = trial;
                return true;
            }
        }
        false
    } else {
        let mut trial = state.clone();
        for (input_id, pat_in) in node.inputs.iter().zip(pattern.inputs.iter()) {
            if !match_input(graph, input_id, pat_in, &mut trial) {
                return false;
            }
        }
        *state = trial;
        true
    }
}

fn match_input(graph: &Graph, tensor_id: &str, pat: &PatternInput, state: &mut MatchState) -> bool {
    let producer = match graph.producer_of(tensor_id) {
        Some(n) => n,
        None => return false,
    };
    match pat {
        PatternInput::Var(name) => {
            let ok = bind_var(name, producer, state);
            if ok {
                state.visited.push(producer.name.clone());
            }
            ok
        }
        PatternInput::Op(op) => match_node(graph, producer, op, state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Node;

    fn mul_pattern() -> OpPattern {
        OpPattern::new("top", &["Mul"], vec![PatternInput::Var("a"), PatternInput::Var("b")]).commutative()
    }

    #[test]
    fn commutative_mul_matches_either_operand_order() {
        let mut g = Graph::new();
        g.add_node(Node::new("a", "Const", vec![], 1));
        g.add_node(Node::new("b", "Const", vec![], 1));
        g.add_node(Node::new("m", "Mul", vec!["b:0".into(), "a:0".into()], 1));

        let pattern = mul_pattern();
        let matches = GraphMatcher::new(&pattern).match_ops(&g);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].node_name("a"), Some("a"));
        assert_eq!(matches[0].node_name("b"), Some("b"));
    }

    #[test]
    fn non_matching_op_type_is_rejected() {
        let mut g = Graph::new();
        g.add_node(Node::new("a", "Const", vec![], 1));
        g.add_node(Node::new("b", "Const", vec![], 1));
        g.add_node(Node::new("m", "Add", vec!["a:0".into(), "b:0".into()], 1));
        let pattern = mul_pattern();
        assert!(GraphMatcher::new(&pattern).match_ops(&g).is_empty());
    }
}
