//! Synthetic dynamic-loop-expanded LSTM cell graphs, built directly at the
//! `Enter`/`Switch`/`Merge`/`Exit` level (one loop iteration's worth of
//! control-flow wiring, not a fully unrolled trace) so the end-to-end tests
//! can exercise the whole C2-through-C7 pipeline without a real TensorFlow
//! graph loader.

#![allow(dead_code)]

use onnx_lstm_fuse::ir::{AttrValue, Graph, Node, TensorValue};

pub const SCOPE: &str = "lstm_0/while";

pub struct FixtureOptions {
    pub hidden_size: usize,
    pub input_size: usize,
    pub batch: usize,
    pub tuple_state: bool,
    pub reverse: bool,
    pub batch_major: bool,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        FixtureOptions {
            hidden_size: 3,
            input_size: 4,
            batch: 2,
            tuple_state: true,
            reverse: false,
            batch_major: false,
        }
    }
}

fn zeros(shape: &[usize]) -> TensorValue {
    TensorValue::from_shape_f32(shape, vec![0.0; shape.iter().product()])
}

fn tid(name: &str, port: usize) -> String {
    format!("{name}:{port}")
}

fn push(graph: &mut Graph, name: &str, op: &str, inputs: Vec<String>, outputs: usize) {
    graph.add_node(Node::new(name, op, inputs, outputs));
}

/// Builds one matchable LSTM cell invocation plus its surrounding loop
/// frame, and two external consumers per final-state connector so the
/// splicer's output-wiring has something to rewire.
pub fn build(opts: &FixtureOptions) -> Graph {
    let mut g = Graph::new();
    append(&mut g, opts, "", SCOPE, None);
    g
}

/// Same shape as [`build`], but appends into an existing graph under
/// `scope` using `tag`-prefixed names for every tensor that lives outside
/// any loop scope (placeholders, weight/bias constants, final-state
/// consumers) so several independent cell invocations can coexist in one
/// graph without name collisions (spec.md §8 scenarios 4 and 5: chained and
/// stacked LSTMs). When `x_source` is `Some(tensor_id)`, that tensor feeds
/// the cell's `x` instead of a freshly created `Placeholder` — this is how
/// a stack/chain wires one cell's sequence output into the next cell's
/// input. Returns the tensor id of this cell's per-timestep sequence output
/// (after the external `sequence_consumer` rewiring point), time-major and
/// squeezed down to `(T, B, H)`/`(B, T, H)` once fused, exactly like the
/// original per-step `new_h` tensor before fusion.
pub fn append(g: &mut Graph, opts: &FixtureOptions, tag: &str, scope: &str, x_source: Option<String>) -> String {
    let _ = env_logger::builder().is_test(true).try_init();

    let h = opts.hidden_size;
    let input_size = opts.input_size;
    let batch = opts.batch;
    let id = |leaf: &str| format!("{tag}{leaf}");

    // -- external tensors --------------------------------------------------
    let x_placeholder = x_source.unwrap_or_else(|| {
        push(g, &id("input_x"), "Placeholder", vec![], 1);
        tid(&id("input_x"), 0)
    });

    let kernel_rows = input_size + h;
    let kernel_data: Vec<f32> = (0..kernel_rows * 4 * h).map(|i| (i as f32) * 0.01).collect();
    let mut kernel = Node::new(id("kernel"), "Const", vec![], 1);
    kernel.const_value = Some(TensorValue::from_shape_f32(&[kernel_rows, 4 * h], kernel_data));
    g.add_node(kernel);

    let bias_data: Vec<f32> = (0..4 * h).map(|i| i as f32).collect();
    let mut bias = Node::new(id("bias"), "Const", vec![], 1);
    bias.const_value = Some(TensorValue::from_shape_f32(&[4 * h], bias_data));
    g.add_node(bias);

    let mut forget_bias = Node::new(id("forget_bias"), "Const", vec![], 1);
    forget_bias.const_value = Some(TensorValue::from_shape_f32(&[], vec![1.0]));
    g.add_node(forget_bias);

    // -- direction / layout adapters feeding the loop's Enter_x ------------
    let mut x_feed = x_placeholder;
    if opts.reverse {
        let mut axis = Node::new(id("reverse_axis"), "Const", vec![], 1);
        axis.const_value = Some(TensorValue::I64(
            ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(&[1]), vec![0i64]).unwrap(),
        ));
        g.add_node(axis);
        push(g, &id("pre_reverse"), "ReverseV2", vec![x_feed, tid(&id("reverse_axis"), 0)], 1);
        x_feed = tid(&id("pre_reverse"), 0);
    }
    if opts.batch_major {
        let transpose = Node::new(id("pre_transpose"), "Transpose", vec![x_feed], 1)
            .with_attr("perm", AttrValue::Ints(vec![1, 0, 2]));
        x_feed = transpose.output(0).to_string();
        g.add_node(transpose);
    }

    let scoped = |leaf: &str| format!("{scope}/{leaf}");

    push(g, &scoped("LoopCond"), "LoopCond", vec![], 1);
    push(g, &scoped("Enter_x"), "Enter", vec![x_feed], 1);

    if opts.tuple_state {
        let mut c_init = Node::new(id("c_init"), "Const", vec![], 1);
        c_init.const_value = Some(zeros(&[batch, h]));
        g.add_node(c_init);
        let mut h_init = Node::new(id("h_init"), "Const", vec![], 1);
        h_init.const_value = Some(zeros(&[batch, h]));
        g.add_node(h_init);

        push(g, &scoped("Enter_c_init"), "Enter", vec![tid(&id("c_init"), 0)], 1);
        push(g, &scoped("Enter_h_init"), "Enter", vec![tid(&id("h_init"), 0)], 1);
        push(
            g,
            &scoped("Merge_c"),
            "Merge",
            vec![tid(&scoped("Enter_c_init"), 0), tid(&scoped("NextIteration_c"), 0)],
            1,
        );
        push(
            g,
            &scoped("Merge_h"),
            "Merge",
            vec![tid(&scoped("Enter_h_init"), 0), tid(&scoped("NextIteration_h"), 0)],
            1,
        );
        push(
            g,
            &scoped("Switch_c"),
            "Switch",
            vec![tid(&scoped("Merge_c"), 0), tid(&scoped("LoopCond"), 0)],
            2,
        );
        push(
            g,
            &scoped("Switch_h"),
            "Switch",
            vec![tid(&scoped("Merge_h"), 0), tid(&scoped("LoopCond"), 0)],
            2,
        );
        push(g, &scoped("Identity_c"), "Identity", vec![tid(&scoped("Switch_c"), 1)], 1);
        push(g, &scoped("Identity_h"), "Identity", vec![tid(&scoped("Switch_h"), 1)], 1);

        build_cell_body(
            g,
            &scoped(""),
            tid(&scoped("Enter_x"), 0),
            tid(&scoped("Identity_h"), 0),
            tid(&scoped("Identity_c"), 0),
            &id("kernel"),
            &id("bias"),
            &id("forget_bias"),
            h,
        );

        push(g, &scoped("NextIteration_c"), "NextIteration", vec![tid(&scoped("new_c"), 0)], 1);
        push(g, &scoped("NextIteration_h"), "NextIteration", vec![tid(&scoped("new_h"), 0)], 1);
        push(g, &scoped("Exit_c"), "Exit", vec![tid(&scoped("Switch_c"), 0)], 1);
        push(g, &scoped("Exit_h"), "Exit", vec![tid(&scoped("Switch_h"), 0)], 1);

        push(g, &id("final_c_consumer"), "Identity", vec![tid(&scoped("Exit_c"), 0)], 1);
        push(g, &id("final_h_consumer"), "Identity", vec![tid(&scoped("Exit_h"), 0)], 1);
    } else {
        let mut shared_init = Node::new(id("shared_init"), "Const", vec![], 1);
        shared_init.const_value = Some(zeros(&[batch, 2 * h]));
        g.add_node(shared_init);

        push(g, &scoped("Enter_shared_init"), "Enter", vec![tid(&id("shared_init"), 0)], 1);
        push(
            g,
            &scoped("Merge_shared"),
            "Merge",
            vec![tid(&scoped("Enter_shared_init"), 0), tid(&scoped("NextIteration_shared"), 0)],
            1,
        );
        push(
            g,
            &scoped("Switch_shared"),
            "Switch",
            vec![tid(&scoped("Merge_shared"), 0), tid(&scoped("LoopCond"), 0)],
            2,
        );
        push(g, &scoped("Identity_shared"), "Identity", vec![tid(&scoped("Switch_shared"), 1)], 1);
        push(
            g,
            &scoped("Split_shared"),
            "Split",
            vec![tid(&scoped("Identity_shared"), 0)],
            2,
        );

        build_cell_body(
            g,
            &scoped(""),
            tid(&scoped("Enter_x"), 0),
            tid(&scoped("Split_shared"), 1),
            tid(&scoped("Split_shared"), 0),
            &id("kernel"),
            &id("bias"),
            &id("forget_bias"),
            h,
        );

        push(
            g,
            &scoped("combined_new"),
            "ConcatV2",
            vec![tid(&scoped("new_c"), 0), tid(&scoped("new_h"), 0)],
            1,
        );
        push(
            g,
            &scoped("NextIteration_shared"),
            "NextIteration",
            vec![tid(&scoped("combined_new"), 0)],
            1,
        );
        push(g, &scoped("Exit_shared"), "Exit", vec![tid(&scoped("Switch_shared"), 0)], 1);
        push(g, &id("final_shared_consumer"), "Identity", vec![tid(&scoped("Exit_shared"), 0)], 1);
    }

    // Sequence-output connector: any Exit not classified as carrying c/h is
    // treated as the stacked per-timestep output.
    push(g, &scoped("Exit_y"), "Exit", vec![tid(&scoped("new_h"), 0)], 1);
    let sequence_out = if opts.reverse {
        // Mirrors the input-side reversal: the source restores chronological
        // order on the way out, which the fused op's own `direction =
        // "reverse"` already does.
        push(
            g,
            &id("post_reverse"),
            "ReverseV2",
            vec![tid(&scoped("Exit_y"), 0), tid(&id("reverse_axis"), 0)],
            1,
        );
        tid(&id("post_reverse"), 0)
    } else {
        tid(&scoped("Exit_y"), 0)
    };
    push(g, &id("sequence_consumer"), "Identity", vec![sequence_out.clone()], 1);

    sequence_out
}

/// Emits the shared primitive-level cell body (spec.md §4.1 template) under
/// `prefix` (already including the trailing `/`), wired to the given
/// `x`/`h_prev`/`c_prev` tensor ids and reading the given (unscoped)
/// kernel/bias/forget_bias constant names.
#[allow(clippy::too_many_arguments)]
fn build_cell_body(
    g: &mut Graph,
    prefix: &str,
    x: String,
    h_prev: String,
    c_prev: String,
    kernel: &str,
    bias: &str,
    forget_bias: &str,
    h: usize,
) {
    let n = |leaf: &str| format!("{prefix}{leaf}");

    push(g, &n("concat"), "ConcatV2", vec![x, h_prev], 1);
    push(g, &n("matmul"), "MatMul", vec![tid(&n("concat"), 0), tid(kernel, 0)], 1);
    push(g, &n("gate_inputs"), "Add", vec![tid(&n("matmul"), 0), tid(bias, 0)], 1);
    push(g, &n("gates"), "Split", vec![tid(&n("gate_inputs"), 0)], 4);

    push(g, &n("f_biased"), "Add", vec![tid(&n("gates"), 2), tid(forget_bias, 0)], 1);
    push(g, &n("f_sigmoid"), "Sigmoid", vec![tid(&n("f_biased"), 0)], 1);
    push(g, &n("c_mul"), "Mul", vec![c_prev, tid(&n("f_sigmoid"), 0)], 1);

    push(g, &n("i_sigmoid"), "Sigmoid", vec![tid(&n("gates"), 0)], 1);
    push(g, &n("c_tanh"), "Tanh", vec![tid(&n("gates"), 1)], 1);
    push(g, &n("i_mul"), "Mul", vec![tid(&n("i_sigmoid"), 0), tid(&n("c_tanh"), 0)], 1);

    push(g, &n("new_c"), "Add", vec![tid(&n("c_mul"), 0), tid(&n("i_mul"), 0)], 1);

    push(g, &n("o_sigmoid"), "Sigmoid", vec![tid(&n("gates"), 3)], 1);
    push(g, &n("new_c_tanh"), "Tanh", vec![tid(&n("new_c"), 0)], 1);
    push(g, &n("new_h"), "Mul", vec![tid(&n("o_sigmoid"), 0), tid(&n("new_c_tanh"), 0)], 1);
    let _ = h; // kept for signature symmetry with the shape-bearing caller
}
