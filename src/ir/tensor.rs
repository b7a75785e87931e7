//! Constant tensor values materialized by the rewriter (kernel/bias constants
//! it reads, and the W/R/B/sequence-lens/initial-state constants it emits).

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

/// ONNX TensorProto dtype ids used by the `Cast` nodes the splicer emits.
pub mod dtype {
    pub const FLOAT: i64 = 1;
    pub const INT32: i64 = 6;
    pub const INT64: i64 = 7;
}

/// A materialized constant, restricted to the dtypes this rewriter actually
/// produces or consumes: the source framework's float kernel/bias, and the
/// int32/int64 shape arithmetic used to build a dynamic sequence-lens.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TensorValue {
    F32(ArrayD<f32>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
}

impl TensorValue {
    pub fn shape(&self) -> Vec<usize> {
        match self {
            TensorValue::F32(a) => a.shape().to_vec(),
            TensorValue::I32(a) => a.shape().to_vec(),
            TensorValue::I64(a) => a.shape().to_vec(),
        }
    }

    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    pub fn f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            TensorValue::F32(a) => Some(a),
            _ => None,
        }
    }

    /// Reads out a single scalar regardless of the concrete dtype, used for
    /// the forget-bias constant (which may be stored as any numeric type).
    pub fn scalar_f32(&self) -> Option<f32> {
        match self {
            TensorValue::F32(a) if a.len() == 1 => a.iter().next().copied(),
            TensorValue::I32(a) if a.len() == 1 => a.iter().next().map(|v| *v as f32),
            TensorValue::I64(a) if a.len() == 1 => a.iter().next().map(|v| *v as f32),
            _ => None,
        }
    }

    /// Prepends a singleton leading axis, used when lifting a constant
    /// initial-state tensor into the fused op's `(num_directions, batch,
    /// hidden)` convention.
    pub fn unsqueeze0(&self) -> TensorValue {
        match self {
            TensorValue::F32(a) => TensorValue::F32(a.clone().insert_axis(ndarray::Axis(0))),
            TensorValue::I32(a) => TensorValue::I32(a.clone().insert_axis(ndarray::Axis(0))),
            TensorValue::I64(a) => TensorValue::I64(a.clone().insert_axis(ndarray::Axis(0))),
        }
    }

    pub fn from_shape_f32(shape: &[usize], data: Vec<f32>) -> TensorValue {
        TensorValue::F32(ArrayD::from_shape_vec(IxDyn(shape), data).expect("shape matches data"))
    }
}
