//! Input/output boundary finder (spec.md §4.6, C6): resolves the per-step
//! `x` binding inside the loop body back to the externally visible sequence
//! tensor, and detects the direction (`forward`/`reverse`, via a `ReverseV2`
//! feeding the input) and layout (time-major/batch-major, via a `[1,0,2]`
//! `Transpose` feeding the input) the source graph used.

use super::SkipReason;
use crate::ir::{in_scope, Graph};

pub struct Boundary {
    /// The externally visible, already time-major sequence tensor the fused
    /// `LSTM` should read as `X`.
    pub x_id: String,
    pub direction: &'static str,
    /// `true` when the source graph already fed the loop a `[seq, batch,
    /// input]` tensor. `false` means a `[1,0,2]` `Transpose` sat between
    /// `x_id` and the loop and is now redundant — the fused op is given
    /// `layout = 1` instead of the raw batch-major tensor (spec.md §4.5
    /// "time-major vs batch-major layout"; this rewriter uses ONNX's native
    /// `layout` attribute rather than re-inserting a `Transpose`).
    pub time_major: bool,
    /// The input-side `ReverseV2`, if the source graph reversed the sequence
    /// itself instead of relying on `direction = "reverse"`. Deleted by the
    /// splicer once it has no remaining consumers (spec.md §8 scenario 6).
    pub reverse_node: Option<String>,
    /// The now-redundant batch-major -> time-major `Transpose`, if one was
    /// found. Cleaned up the same way as `reverse_node`.
    pub transpose_node: Option<String>,
}

fn is_timemajor_transpose(graph: &Graph, tensor_id: &str) -> Option<(String, String)> {
    let producer = graph.producer_of(tensor_id)?;
    if producer.op_type == "Transpose" && producer.attr_ints("perm") == Some(&[1, 0, 2]) {
        Some((producer.name.clone(), producer.inputs.first()?.clone()))
    } else {
        None
    }
}

pub fn find(graph: &Graph, x_id_inside: &str, scope: &str) -> Result<Boundary, SkipReason> {
    let mut current = x_id_inside.to_string();
    loop {
        let producer = graph
            .producer_of(&current)
            .ok_or_else(|| SkipReason::InputXNotFound(scope.to_string()))?;
        if !in_scope(&producer.name, scope) {
            break;
        }
        match producer.op_type.as_str() {
            "Enter" | "Identity" => {
                current = producer
                    .inputs
                    .first()
                    .cloned()
                    .ok_or_else(|| SkipReason::InputXNotFound(scope.to_string()))?;
            }
            _ => return Err(SkipReason::InputAmbiguous(scope.to_string(), 1)),
        }
    }

    let boundary_producer = graph
        .producer_of(&current)
        .ok_or_else(|| SkipReason::InputXNotFound(scope.to_string()))?;

    let (resolved, direction, reverse_node) = if boundary_producer.op_type == "ReverseV2" {
        let pre_reverse = boundary_producer
            .inputs
            .first()
            .cloned()
            .ok_or_else(|| SkipReason::InputXNotFound(scope.to_string()))?;
        (pre_reverse, "reverse", Some(boundary_producer.name.clone()))
    } else {
        (current, "forward", None)
    };

    let (x_id, time_major, transpose_node) = match is_timemajor_transpose(graph, &resolved) {
        Some((transpose_name, pre_transpose)) => (pre_transpose, false, Some(transpose_name)),
        None => (resolved, true, None),
    };

    Ok(Boundary {
        x_id,
        direction,
        time_major,
        reverse_node,
        transpose_node,
    })
}
