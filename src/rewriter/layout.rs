//! Tensor layout transformation (spec.md §4.5, C5): reorders the source
//! framework's `(i, c, f, o)` gate concatenation into ONNX's `(i, o, f, c)`,
//! splits the combined `[x; h]` kernel into `W`/`R`, and adds the leading
//! `num_directions` axis every ONNX `LSTM` weight tensor carries.

use super::properties::RnnWeights;
use crate::ir::TensorValue;
use ndarray::{concatenate, Array1, Array2, Axis, Ix2};

pub struct FusedWeights {
    /// `[num_directions, 4*hidden_size, input_size]`.
    pub w: TensorValue,
    /// `[num_directions, 4*hidden_size, hidden_size]`.
    pub r: TensorValue,
    /// `[num_directions, 8*hidden_size]` (`Wb` then `Rb`).
    pub b: TensorValue,
}

fn to_2d(t: &TensorValue) -> Array2<f32> {
    t.f32()
        .expect("weights checked as F32 in C4")
        .view()
        .into_dimensionality::<Ix2>()
        .expect("kernel is rank-2")
        .to_owned()
}

fn to_1d(t: &TensorValue) -> Array1<f32> {
    t.f32()
        .expect("weights checked as F32 in C4")
        .view()
        .into_dimensionality::<ndarray::Ix1>()
        .expect("bias is rank-1")
        .to_owned()
}

/// Splits the gate axis (columns for a matrix, elements for a vector) of
/// width `4*h` laid out `(i, c, f, o)` and returns the four `(.., h)` slices.
fn gate_columns(m: &Array2<f32>, h: usize) -> [Array2<f32>; 4] {
    [
        m.slice(ndarray::s![.., 0 * h..1 * h]).to_owned(),
        m.slice(ndarray::s![.., 1 * h..2 * h]).to_owned(),
        m.slice(ndarray::s![.., 2 * h..3 * h]).to_owned(),
        m.slice(ndarray::s![.., 3 * h..4 * h]).to_owned(),
    ]
}

fn gate_elements(v: &Array1<f32>, h: usize) -> [Array1<f32>; 4] {
    [
        v.slice(ndarray::s![0 * h..1 * h]).to_owned(),
        v.slice(ndarray::s![1 * h..2 * h]).to_owned(),
        v.slice(ndarray::s![2 * h..3 * h]).to_owned(),
        v.slice(ndarray::s![3 * h..4 * h]).to_owned(),
    ]
}

/// Reorders `(i, c, f, o)` columns into ONNX's `(i, o, f, c)`.
fn reorder_gate_columns(m: &Array2<f32>, h: usize) -> Array2<f32> {
    let [i, c, f, o] = gate_columns(m, h);
    concatenate(Axis(1), &[i.view(), o.view(), f.view(), c.view()]).expect("equal row counts")
}

fn reorder_gate_vector(v: &Array1<f32>, h: usize) -> Array1<f32> {
    let [i, c, f, o] = gate_elements(v, h);
    concatenate(Axis(0), &[i.view(), o.view(), f.view(), c.view()]).expect("1-d concat")
}

pub fn build(weights: &RnnWeights) -> FusedWeights {
    let h = weights.hidden_size;
    let input_size = weights.input_size;

    let kernel = to_2d(&weights.kernel); // [input_size + h, 4h], gate order (i,c,f,o)
    let reordered = reorder_gate_columns(&kernel, h); // [input_size + h, 4h], gate order (i,o,f,c)

    let x_rows = reordered.slice(ndarray::s![0..input_size, ..]).to_owned();
    let h_rows = reordered.slice(ndarray::s![input_size.., ..]).to_owned();

    let w = x_rows.t().to_owned().insert_axis(Axis(0)); // [1, 4h, input_size]
    let r = h_rows.t().to_owned().insert_axis(Axis(0)); // [1, 4h, h]

    let bias = to_1d(&weights.bias);
    let mut wb = reorder_gate_vector(&bias, h);
    // The source cell adds `forget_bias` to the forget gate's pre-activation
    // as a separate scalar (spec.md §4.1 `f_biased`); ONNX `LSTM` has no such
    // knob, so it is folded into Wb's forget-gate slice here instead. Reorder
    // puts `f` at block index 2 of the (i, o, f, c) layout.
    wb.slice_mut(ndarray::s![2 * h..3 * h]).mapv_inplace(|v| v + weights.forget_bias);
    let rb = Array1::<f32>::zeros(4 * h);
    let b = concatenate(Axis(0), &[wb.view(), rb.view()])
        .expect("equal lengths")
        .insert_axis(Axis(0)); // [1, 8h]

    FusedWeights {
        w: TensorValue::F32(w.into_dyn()),
        r: TensorValue::F32(r.into_dyn()),
        b: TensorValue::F32(b.into_dyn()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::TensorValue;

    fn make_weights(input_size: usize, h: usize, forget_bias: f32) -> RnnWeights {
        let kernel_rows = input_size + h;
        let kernel_data: Vec<f32> = (0..kernel_rows * 4 * h).map(|v| v as f32).collect();
        let bias_data: Vec<f32> = (0..4 * h).map(|v| v as f32).collect();
        RnnWeights {
            kernel: TensorValue::from_shape_f32(&[kernel_rows, 4 * h], kernel_data),
            bias: TensorValue::from_shape_f32(&[4 * h], bias_data),
            forget_bias,
            hidden_size: h,
            input_size,
        }
    }

    #[test]
    fn fused_shapes_match_onnx_lstm_convention() {
        let weights = make_weights(3, 2, 1.0);
        let fused = build(&weights);
        assert_eq!(fused.w.shape(), vec![1, 8, 3]);
        assert_eq!(fused.r.shape(), vec![1, 8, 2]);
        assert_eq!(fused.b.shape(), vec![1, 16]);
    }

    #[test]
    fn bias_gate_order_is_permuted_i_o_f_c() {
        let weights = make_weights(1, 1, 0.0);
        // bias = [i=0, c=1, f=2, o=3]; reordered Wb should read [i,o,f,c] = [0,3,2,1]
        let fused = build(&weights);
        let b = fused.b.f32().unwrap();
        let wb: Vec<f32> = b.iter().take(4).copied().collect();
        assert_eq!(wb, vec![0.0, 3.0, 2.0, 1.0]);
    }

    #[test]
    fn forget_bias_is_folded_into_wb_forget_gate_slice_only() {
        let weights = make_weights(1, 1, 2.5);
        let fused = build(&weights);
        let b = fused.b.f32().unwrap();
        let wb: Vec<f32> = b.iter().take(4).copied().collect();
        // (i, o, f, c) = (0, 3, 2+2.5, 1), Rb half (index 4..8) untouched (zeros).
        assert_eq!(wb, vec![0.0, 3.0, 4.5, 1.0]);
        let rb: Vec<f32> = b.iter().skip(4).take(4).copied().collect();
        assert_eq!(rb, vec![0.0, 0.0, 0.0, 0.0]);
    }
}
