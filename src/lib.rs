//! Recognizes a dynamic-loop-expanded LSTM cell in a dataflow graph and
//! collapses it into a single ONNX-style `LSTM` operator.
//!
//! ```no_run
//! use onnx_lstm_fuse::ir::Graph;
//! use onnx_lstm_fuse::rewriter::fuse_lstm_cells;
//!
//! # fn load_graph() -> Graph { Graph::new() }
//! let mut graph = load_graph();
//! let report = fuse_lstm_cells(&mut graph).expect("no unclassified output connector");
//! log::info!("fused {} LSTM cell(s), skipped {}", report.fused, report.skipped.len());
//! ```

pub mod ir;
pub mod pattern;
pub mod rewriter;

pub use ir::Graph;
pub use rewriter::{fuse_lstm_cells, FusionError, FusionReport, SkipReason};
