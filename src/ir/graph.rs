//! The mutable dataflow graph the rewriter operates on (spec.md §3, §6).
//!
//! This is deliberately the only thing in the crate that owns node storage:
//! every component in `pattern` and `rewriter` goes through this narrow
//! mutator surface, so the "no scope-prefixed node survives except
//! must-keep" invariant has exactly one place it can be violated.

use super::node::{split_tensor_id, Node};
use super::tensor::TensorValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Graph {
    nodes: Vec<Node>,
    shapes: HashMap<String, Vec<i64>>,
    #[serde(skip, default)]
    name_counters: HashMap<String, usize>,
    #[serde(skip, default)]
    revision: usize,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Graph {
            nodes,
            ..Graph::default()
        }
    }

    pub fn get_nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn set_nodes(&mut self, nodes: Vec<Node>) {
        self.nodes = nodes;
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn get_node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Resolves a tensor id (`producer:port`) to the node that produces it.
    pub fn producer_of(&self, tensor_id: &str) -> Option<&Node> {
        let (name, _) = split_tensor_id(tensor_id);
        self.get_node_by_name(name)
    }

    /// Every node that reads `tensor_id` as one of its inputs.
    pub fn find_output_consumers(&self, tensor_id: &str) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.inputs.iter().any(|i| i == tensor_id))
            .collect()
    }

    /// Creates and registers a `Const` node materializing `value`.
    pub fn make_const(&mut self, name: impl Into<String>, value: TensorValue) -> Node {
        let mut node = Node::new(name, "Const", vec![], 1);
        node.const_value = Some(value);
        node.synthesized = true;
        self.nodes.push(node.clone());
        node
    }

    pub fn copy_shape(&mut self, src_tensor_id: &str, dst_tensor_id: &str) {
        if let Some(shape) = self.shapes.get(src_tensor_id).cloned() {
            self.shapes.insert(dst_tensor_id.to_string(), shape);
        }
    }

    pub fn set_shape(&mut self, tensor_id: &str, shape: Vec<i64>) {
        self.shapes.insert(tensor_id.to_string(), shape);
    }

    pub fn get_shape(&self, tensor_id: &str) -> Option<&[i64]> {
        self.shapes.get(tensor_id).map(|s| s.as_slice())
    }

    /// Rewrites every reference to `old` into `new` across the current node
    /// list (the matcher and splicer always operate on the whole graph, so
    /// unlike the consumed contract in spec.md §6 this takes no explicit
    /// node set).
    pub fn replace_all_inputs(&mut self, old: &str, new: &str) {
        for node in &mut self.nodes {
            for input in &mut node.inputs {
                if input == old {
                    *input = new.to_string();
                }
            }
        }
    }

    pub fn replace_input(&mut self, node_name: &str, old: &str, new: &str) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.name == node_name) {
            for input in &mut node.inputs {
                if input == old {
                    *input = new.to_string();
                }
            }
        }
    }

    /// No-op marker matching the external graph library's `update_proto`;
    /// bumps a revision counter so tests can assert a pass actually ran.
    pub fn update_proto(&mut self) {
        self.revision += 1;
    }

    pub fn revision(&self) -> usize {
        self.revision
    }

    /// Generates a unique node name with the given prefix. Names minted here
    /// never carry an existing scope prefix, which is what lets the
    /// prefix-based cleanup in the splicer leave newly-created nodes alone.
    pub fn make_name(&mut self, prefix: &str) -> String {
        let counter = self.name_counters.entry(prefix.to_string()).or_insert(0);
        let name = if *counter == 0 {
            prefix.to_string()
        } else {
            format!("{prefix}_{counter}")
        };
        *counter += 1;
        if self.get_node_by_name(&name).is_some() {
            // Extremely unlikely collision with a pre-existing node name;
            // keep incrementing until we find a free one.
            return self.make_name(prefix);
        }
        name
    }
}
