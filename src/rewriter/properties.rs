//! The data collected about one matched cell as it moves through the
//! pipeline (spec.md §3, "RnnProperties" / "RnnInitializers" / "RnnWeights").

use crate::ir::TensorValue;

/// How the loop frame carries recurrent state across iterations.
#[derive(Debug, Clone, PartialEq)]
pub enum RnnInitializers {
    /// `c` and `h` each have their own `Enter` node and their own initial
    /// value (the common case for `tf.nn.rnn_cell.LSTMStateTuple`).
    Tuple {
        c_init_id: String,
        h_init_id: String,
    },
    /// `c` and `h` are carried concatenated through a single `Enter`/Switch
    /// pair and split apart inside the loop body (non-tuple state).
    Shared { shared_init_id: String },
}

/// Raw kernel/bias data read out of the matched cell's `Const` inputs,
/// before layout transformation (C4, spec.md §4.4).
#[derive(Debug, Clone)]
pub struct RnnWeights {
    /// `[input_size + hidden_size, 4 * hidden_size]`, gate order `(i, c, f, o)`.
    pub kernel: TensorValue,
    /// `[4 * hidden_size]`, gate order `(i, c, f, o)`.
    pub bias: TensorValue,
    pub forget_bias: f32,
    pub hidden_size: usize,
    pub input_size: usize,
}

/// Everything known about one matched-and-analyzed cell invocation by the
/// time C5–C7 run.
#[derive(Debug, Clone)]
pub struct RnnProperties {
    pub scope: String,
    /// The tensor id of the per-timestep input `x` as seen from inside the
    /// loop body, before the boundary analysis resolves it to the externally
    /// visible sequence tensor.
    pub x_id: String,
    pub initializers: RnnInitializers,
    pub weights: RnnWeights,
    /// `LoopCond`'s own name, kept for diagnostics and for locating the
    /// frame's `Switch`/`Merge`/`Enter`/`Exit` family.
    pub loop_cond: String,
}
