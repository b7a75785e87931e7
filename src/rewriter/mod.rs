//! The rewrite pipeline proper (spec.md §4.3–4.8, C3–C8): for every match of
//! a cell template, analyze its loop frame, extract and relayout its
//! weights, find its external boundary, splice in a fused `LSTM`, and wire
//! its outputs back up.

pub mod boundary;
pub mod driver;
pub mod layout;
pub mod loop_frame;
pub mod properties;
pub mod splice;
pub mod weights;

pub use driver::{fuse_lstm_cells, FusionReport};
pub use properties::{RnnInitializers, RnnProperties, RnnWeights};

use thiserror::Error;

/// A single match failed to fuse. Not fatal: the driver logs it and moves
/// on to the next match, leaving the scope untouched (spec.md §7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SkipReason {
    #[error("match at {0:?} has no common scope")]
    ScopeMissing(Vec<String>),
    #[error("scope {0}: no LoopCond/Switch/Merge/Enter/Exit frame found around the matched cell")]
    NoLoop(String),
    #[error("scope {0}: more than one LoopCond feeds this scope")]
    DuplicateLoop(String),
    #[error("scope {0}: kernel or bias is not a constant the rewriter can read")]
    WeightsCheckFailed(String),
    #[error("scope {0}: initial-state Enter node is not backed by a recognizable initializer")]
    InitializerCheckFailed(String),
    #[error("scope {0}: sequence input x is ambiguous ({1} candidate producers)")]
    InputAmbiguous(String, usize),
    #[error("scope {0}: sequence input x could not be resolved to a single tensor")]
    InputXNotFound(String),
}

/// Fatal: the fused node was spliced in, but the rewriter could not account
/// for every node reading one of the loop's external connectors, so deleting
/// the scope would silently drop live computation (spec.md §7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FusionError {
    #[error("scope {scope}: output consumer {consumer} of {connector} does not match any known RNN output shape")]
    OutputUnclassified {
        scope: String,
        connector: String,
        consumer: String,
    },
}
