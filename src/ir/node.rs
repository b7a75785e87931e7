//! A single dataflow node: a name, an operator type, ordered input/output
//! tensor ids, and a typed attribute bag (spec.md §3, "Graph").

use super::attr::AttrValue;
use super::tensor::TensorValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub op_type: String,
    /// Tensor ids of the form `producer_name:port`.
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub attrs: BTreeMap<String, AttrValue>,
    pub const_value: Option<TensorValue>,
    /// Tagged at creation by anything the splicer emits, so cleanup can tell
    /// "in-scope original" from "in-scope-prefixed but just synthesized"
    /// without relying on name prefixes (spec.md §9).
    #[serde(skip, default)]
    pub synthesized: bool,
}

impl Node {
    pub fn new(
        name: impl Into<String>,
        op_type: impl Into<String>,
        inputs: Vec<String>,
        num_outputs: usize,
    ) -> Self {
        let name = name.into();
        let outputs = (0..num_outputs.max(1))
            .map(|i| format!("{name}:{i}"))
            .collect();
        Node {
            name,
            op_type: op_type.into(),
            inputs,
            outputs,
            attrs: BTreeMap::new(),
            const_value: None,
            synthesized: false,
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: AttrValue) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    pub fn synthesized(mut self) -> Self {
        self.synthesized = true;
        self
    }

    pub fn output(&self, port: usize) -> &str {
        &self.outputs[port]
    }

    pub fn is_const(&self) -> bool {
        self.op_type == "Const"
    }

    pub fn get_tensor_value(&self) -> Option<&TensorValue> {
        self.const_value.as_ref()
    }

    pub fn attr_int(&self, key: &str) -> Option<i64> {
        self.attrs.get(key).and_then(AttrValue::as_int)
    }

    pub fn attr_ints(&self, key: &str) -> Option<&[i64]> {
        self.attrs.get(key).and_then(AttrValue::as_ints)
    }

    pub fn attr_string(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(AttrValue::as_string)
    }
}

/// Splits a tensor id of the form `producer:port` into its parts. Tensor ids
/// emitted by this crate always carry an explicit port.
pub fn split_tensor_id(tensor_id: &str) -> (&str, usize) {
    match tensor_id.rsplit_once(':') {
        Some((name, port)) => (name, port.parse().unwrap_or(0)),
        None => (tensor_id, 0),
    }
}
