//! The splicer (spec.md §4.7, C7): builds the fused `LSTM` node and its
//! constant inputs, rewires every external consumer of the loop's output
//! connectors onto it, and deletes the scope.

use super::boundary::Boundary;
use super::layout;
use super::loop_frame::LoopFrameResult;
use super::properties::{RnnInitializers, RnnProperties};
use super::FusionError;
use crate::ir::{in_scope, AttrValue, Graph, Node, TensorValue};

/// `layout = 0` (time-major) puts the `num_directions` axis at position 1 in
/// `Y` and position 0 in `Y_h`/`Y_c`; `layout = 1` (batch-major) shifts both
/// by one (ONNX `LSTM`, opset 14 `layout` attribute).
struct AxisPlan {
    y_dir_axis: usize,
    state_dir_axis: usize,
}

fn axis_plan(time_major: bool) -> AxisPlan {
    if time_major {
        AxisPlan {
            y_dir_axis: 1,
            state_dir_axis: 0,
        }
    } else {
        AxisPlan {
            y_dir_axis: 2,
            state_dir_axis: 1,
        }
    }
}

/// Lifts a loop-carried initial-state tensor (`[batch, hidden]`) into the
/// fused op's `[num_directions, batch, hidden]` convention, materializing a
/// new `Const` when the source was already constant and inserting an
/// `Unsqueeze` node otherwise.
fn lift_initial_state(graph: &mut Graph, tensor_id: &str, name: &str) -> String {
    if let Some(producer) = graph.producer_of(tensor_id) {
        if producer.is_const() {
            if let Some(value) = producer.get_tensor_value() {
                let lifted = value.unsqueeze0();
                let node = graph.make_const(name.to_string(), lifted);
                return node.output(0).to_string();
            }
        }
    }
    let node = Node::new(name, "Unsqueeze", vec![tensor_id.to_string()], 1)
        .with_attr("axes", AttrValue::Ints(vec![0]))
        .synthesized();
    let out = node.output(0).to_string();
    graph.add_node(node);
    out
}

fn make_int64_const(graph: &mut Graph, name: &str, values: Vec<i64>) -> String {
    let len = values.len();
    let value = TensorValue::I64(
        ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(&[len]), values).expect("shape matches data"),
    );
    graph.make_const(name.to_string(), value).output(0).to_string()
}

/// Builds the `Shape(x) -> Slice -> Slice -> Expand -> Cast(i32)` chain that
/// produces a `[batch]` `sequence_lens` tensor filled with the full sequence
/// length (spec.md §4.7, "sequence_lens"; every row runs the full unrolled
/// length because the source loop has no separate sequence-length input of
/// its own — see DESIGN.md for why this subgraph is built uniformly rather
/// than gated on whether the length happens to be statically known).
///
/// `X` is fed to the fused op in its original layout (`layout` attribute,
/// spec.md divergence documented in DESIGN.md), so `Shape(X)`'s dimension
/// order depends on `time_major`: `[T, B, I]` when true, `[B, T, I]`
/// otherwise. The slice that reads off the fill value (`T`) and the slice
/// that reads off the `Expand` target length (`B`) must track that order or
/// the emitted tensor comes out transposed — length `T` filled with `B`.
fn build_sequence_lens(graph: &mut Graph, x_id: &str, scope: &str, time_major: bool) -> String {
    let shape_name = graph.make_name(&format!("{scope}_seq_len_shape"));
    let shape_node = Node::new(&shape_name, "Shape", vec![x_id.to_string()], 1).synthesized();
    let shape_out = shape_node.output(0).to_string();
    graph.add_node(shape_node);

    let (time_dim, batch_dim) = if time_major { (0i64, 1i64) } else { (1i64, 0i64) };

    let starts_t = make_int64_const(graph, &graph.make_name(&format!("{scope}_seq_len_t_starts")), vec![time_dim]);
    let ends_t = make_int64_const(graph, &graph.make_name(&format!("{scope}_seq_len_t_ends")), vec![time_dim + 1]);
    let t_name = graph.make_name(&format!("{scope}_seq_len_t"));
    let t_node = Node::new(&t_name, "Slice", vec![shape_out.clone(), starts_t, ends_t], 1).synthesized();
    let t_out = t_node.output(0).to_string();
    graph.add_node(t_node);

    let starts_b = make_int64_const(graph, &graph.make_name(&format!("{scope}_seq_len_b_starts")), vec![batch_dim]);
    let ends_b = make_int64_const(graph, &graph.make_name(&format!("{scope}_seq_len_b_ends")), vec![batch_dim + 1]);
    let b_name = graph.make_name(&format!("{scope}_seq_len_b"));
    let b_node = Node::new(&b_name, "Slice", vec![shape_out, starts_b, ends_b], 1).synthesized();
    let b_out = b_node.output(0).to_string();
    graph.add_node(b_node);

    let expand_name = graph.make_name(&format!("{scope}_seq_len_i64"));
    let expand_node = Node::new(&expand_name, "Expand", vec![t_out, b_out], 1).synthesized();
    let expand_out = expand_node.output(0).to_string();
    graph.add_node(expand_node);

    // ONNX LSTM requires `sequence_lens` as tensor(int32); the Shape/Slice/
    // Expand chain above produces int64 (spec.md §4.7 point 1's own chain
    // ends the same way, "Cast→i32").
    let cast_name = graph.make_name(&format!("{scope}_seq_len"));
    let cast_node = Node::new(&cast_name, "Cast", vec![expand_out], 1)
        .with_attr("to", AttrValue::Int(crate::ir::tensor::dtype::INT32))
        .synthesized();
    let out = cast_node.output(0).to_string();
    graph.add_node(cast_node);
    out
}

fn squeeze(graph: &mut Graph, tensor_id: &str, axis: usize, name: &str) -> String {
    let node = Node::new(name, "Squeeze", vec![tensor_id.to_string()], 1)
        .with_attr("axes", AttrValue::Ints(vec![axis as i64]))
        .synthesized();
    let out = node.output(0).to_string();
    graph.add_node(node);
    out
}

pub fn splice(
    graph: &mut Graph,
    scope: &str,
    props: &RnnProperties,
    loop_result: &LoopFrameResult,
    boundary: &Boundary,
) -> Result<(), FusionError> {
    let fused = layout::build(&props.weights);
    let w = graph.make_const(format!("{scope}/W"), fused.w).output(0).to_string();
    let r = graph.make_const(format!("{scope}/R"), fused.r).output(0).to_string();
    let b = graph.make_const(format!("{scope}/B"), fused.b).output(0).to_string();

    let (initial_c, initial_h) = match &props.initializers {
        RnnInitializers::Tuple { c_init_id, h_init_id } => (
            lift_initial_state(graph, c_init_id, &format!("{scope}/initial_c")),
            lift_initial_state(graph, h_init_id, &format!("{scope}/initial_h")),
        ),
        RnnInitializers::Shared { shared_init_id } => {
            let h = props.weights.hidden_size as i64;
            let split_name = format!("{scope}/shared_init_split");
            let split_node = Node::new(&split_name, "Split", vec![shared_init_id.clone()], 2)
                .with_attr("axis", AttrValue::Int(1))
                .with_attr("split", AttrValue::Ints(vec![h, h]))
                .synthesized();
            let c_raw = split_node.output(0).to_string();
            let h_raw = split_node.output(1).to_string();
            graph.add_node(split_node);
            (
                lift_initial_state(graph, &c_raw, &format!("{scope}/initial_c")),
                lift_initial_state(graph, &h_raw, &format!("{scope}/initial_h")),
            )
        }
    };

    let seq_lens = build_sequence_lens(graph, &boundary.x_id, scope, boundary.time_major);

    let lstm_name = format!("{scope}/LSTM");
    let lstm_node = Node::new(
        &lstm_name,
        "LSTM",
        vec![
            boundary.x_id.clone(),
            w,
            r,
            b,
            seq_lens,
            initial_h,
            initial_c,
        ],
        3,
    )
    .with_attr("hidden_size", AttrValue::Int(props.weights.hidden_size as i64))
    .with_attr("direction", AttrValue::String(boundary.direction.to_string()))
    .with_attr("layout", AttrValue::Int(if boundary.time_major { 0 } else { 1 }))
    .synthesized();
    let y = lstm_node.output(0).to_string();
    let y_h = lstm_node.output(1).to_string();
    let y_c = lstm_node.output(2).to_string();
    graph.add_node(lstm_node);

    let plan = axis_plan(boundary.time_major);
    let y_squeezed = squeeze(graph, &y, plan.y_dir_axis, &format!("{scope}/Y_squeezed"));
    let h_squeezed = squeeze(graph, &y_h, plan.state_dir_axis, &format!("{scope}/Y_h_squeezed"));
    let c_squeezed = squeeze(graph, &y_c, plan.state_dir_axis, &format!("{scope}/Y_c_squeezed"));

    let output_reverse = wire_outputs(graph, scope, loop_result, &y_squeezed, &h_squeezed, &c_squeezed)?;

    // Deleting the scope first removes the Enter node that was the input-side
    // ReverseV2's only consumer, so the liveness check below sees it as dead
    // rather than as "still feeding a node about to disappear anyway".
    delete_scope(graph, scope);

    for adapter in [&boundary.reverse_node, &boundary.transpose_node, &output_reverse]
        .into_iter()
        .flatten()
    {
        if graph.find_output_consumers(&format!("{adapter}:0")).is_empty() {
            delete_node(graph, adapter);
        }
    }

    graph.update_proto();
    Ok(())
}

/// Rewires every external consumer of the loop's `Exit` connectors onto the
/// fused op's matching output. `ct_switch`/`ht_switch`/`shared_switch`
/// identify the `Exit` that carries each role (an `Exit` is a consumer of
/// `switch.output(0)`, the false/loop-finished branch); any other `Exit` in
/// scope is assumed to carry the per-timestep output sequence.
///
/// Returns the name of an output-side `ReverseV2` found sitting directly on
/// the sequence connector, if any (spec.md §4.6, §8 scenario 6, P4): the
/// source graph reverses `X` going in and reverses `Y` coming back out to
/// restore chronological order, but ONNX `LSTM` with `direction = "reverse"`
/// already writes `Y` in chronological order, so that second `ReverseV2` is
/// now redundant and its consumers are rewired straight onto `y`.
fn wire_outputs(
    graph: &mut Graph,
    scope: &str,
    loop_result: &LoopFrameResult,
    y: &str,
    y_h: &str,
    y_c: &str,
) -> Result<Option<String>, FusionError> {
    let exits: Vec<String> = graph
        .get_nodes()
        .iter()
        .filter(|n| n.op_type == "Exit" && in_scope(&n.name, scope))
        .map(|n| n.name.clone())
        .collect();

    let exit_for = |switch_name: &Option<String>| -> Option<String> {
        let switch_name = switch_name.as_ref()?;
        let switch = graph.get_node_by_name(switch_name)?;
        let false_branch = switch.output(0).to_string();
        graph
            .find_output_consumers(&false_branch)
            .into_iter()
            .find(|n| n.op_type == "Exit")
            .map(|n| n.name.clone())
    };

    let ct_exit = exit_for(&loop_result.ct_switch);
    let ht_exit = exit_for(&loop_result.ht_switch);
    let shared_exit = exit_for(&loop_result.shared_switch);

    // Any Exit not already classified as a final-state connector is assumed
    // to carry the per-timestep output sequence. Source graphs only ever
    // expose one such connector per cell invocation; a second one means
    // this rewriter's classifier has not actually accounted for it.
    let mut sequence_exit_used = false;
    let mut output_reverse_node = None;

    for exit in &exits {
        let exit_tensor = format!("{exit}:0");
        let consumers: Vec<String> = graph
            .find_output_consumers(&exit_tensor)
            .into_iter()
            .map(|n| n.name.clone())
            .collect();
        if consumers.is_empty() {
            continue;
        }

        if Some(exit.clone()) == ct_exit {
            graph.replace_all_inputs(&exit_tensor, y_c);
        } else if Some(exit.clone()) == ht_exit {
            graph.replace_all_inputs(&exit_tensor, y_h);
        } else if Some(exit.clone()) == shared_exit {
            // Non-tuple state packs as concat([c, h]); consumers read the
            // combined tensor back out of a single Exit. The splicer already
            // has both halves split out of the fused op, so the combined
            // form is reconstructed once, in ONNX's (c, h) order, in place
            // of the old Exit's output.
            let combined_name = format!("{scope}/combined_state");
            let combined_node = Node::new(&combined_name, "Concat", vec![y_c.to_string(), y_h.to_string()], 1)
                .with_attr("axis", AttrValue::Int(1))
                .synthesized();
            let combined = combined_node.output(0).to_string();
            graph.add_node(combined_node);
            graph.replace_all_inputs(&exit_tensor, &combined);
        } else if !sequence_exit_used {
            let reverse_consumer = graph
                .find_output_consumers(&exit_tensor)
                .into_iter()
                .find(|n| n.op_type == "ReverseV2")
                .map(|n| n.name.clone());
            match reverse_consumer {
                Some(name) => {
                    graph.replace_all_inputs(&format!("{name}:0"), y);
                    output_reverse_node = Some(name);
                }
                None => graph.replace_all_inputs(&exit_tensor, y),
            }
            sequence_exit_used = true;
        } else {
            return Err(FusionError::OutputUnclassified {
                scope: scope.to_string(),
                connector: exit_tensor,
                consumer: consumers.join(","),
            });
        }
    }

    Ok(output_reverse_node)
}

fn delete_node(graph: &mut Graph, name: &str) {
    let remaining: Vec<Node> = graph
        .get_nodes()
        .iter()
        .filter(|n| n.name != name)
        .cloned()
        .collect();
    graph.set_nodes(remaining);
}

/// Removes every node under `scope` (the matched cell body plus its loop
/// frame), except nodes this pass itself just synthesized — some of those
/// (`{scope}/LSTM`, `{scope}/W`, ...) are deliberately named back into the
/// scope for readability, so it is the `synthesized` tag, not the name
/// prefix, that must-keep relies on here (spec.md §9).
fn delete_scope(graph: &mut Graph, scope: &str) {
    let remaining: Vec<Node> = graph
        .get_nodes()
        .iter()
        .filter(|n| n.synthesized || !in_scope(&n.name, scope))
        .cloned()
        .collect();
    graph.set_nodes(remaining);
}
