//! Weight and bias extraction (spec.md §4.4, C4): reads the matched cell's
//! `kernel`/`bias`/`forget_bias` constants and derives `hidden_size` and
//! `input_size` from their shapes.

use super::properties::RnnWeights;
use super::SkipReason;
use crate::ir::Graph;
use crate::pattern::Match;

pub fn extract(graph: &Graph, m: &Match) -> Result<RnnWeights, SkipReason> {
    let scope = m
        .scope()
        .ok_or_else(|| SkipReason::ScopeMissing(m.visited_names().map(String::from).collect()))?;
    let fail = || SkipReason::WeightsCheckFailed(scope.clone());

    let kernel_node = m.node(graph, "kernel").ok_or_else(fail)?;
    if !kernel_node.is_const() {
        return Err(fail());
    }
    let kernel = kernel_node.get_tensor_value().ok_or_else(fail)?.clone();
    let kernel_shape = kernel.shape();
    if kernel_shape.len() != 2 {
        return Err(fail());
    }

    let bias_node = m.node(graph, "bias").ok_or_else(fail)?;
    if !bias_node.is_const() {
        return Err(fail());
    }
    let bias = bias_node.get_tensor_value().ok_or_else(fail)?.clone();
    let bias_shape = bias.shape();
    if bias_shape.len() != 1 || bias_shape[0] % 4 != 0 {
        return Err(fail());
    }

    let hidden_size = bias_shape[0] / 4;
    if kernel_shape[0] <= hidden_size || kernel_shape[1] != 4 * hidden_size {
        return Err(fail());
    }
    let input_size = kernel_shape[0] - hidden_size;

    let forget_bias = m
        .node(graph, "forget_bias")
        .and_then(|n| n.get_tensor_value())
        .and_then(|t| t.scalar_f32())
        .unwrap_or(1.0);

    Ok(RnnWeights {
        kernel,
        bias,
        forget_bias,
        hidden_size,
        input_size,
    })
}
