//! The driver (spec.md §4.8, C8): runs the matcher for every known cell
//! variant, analyzes and splices each match, and keeps going until a full
//! pass finds nothing left to fuse.

use super::loop_frame;
use super::properties::RnnProperties;
use super::{boundary, splice, weights, FusionError, SkipReason};
use crate::ir::Graph;
use crate::pattern::{CellVariant, GraphMatcher, Match};
use std::collections::HashSet;

#[derive(Debug, Default, Clone)]
pub struct FusionReport {
    pub fused: usize,
    pub skipped: Vec<SkipReason>,
}

enum TryFuseError {
    Skip(SkipReason),
    Fatal(FusionError),
}

impl From<SkipReason> for TryFuseError {
    fn from(s: SkipReason) -> Self {
        TryFuseError::Skip(s)
    }
}

/// Rewrites every recognizable dynamic-loop LSTM cell in `graph` into a
/// fused `LSTM` operator, in place.
///
/// Returns `Err` only for [`FusionError::OutputUnclassified`] (spec.md §7):
/// every other failure to fuse a particular candidate is recorded in the
/// returned report's `skipped` list and the driver moves on. An `Err` means
/// the graph may be left with some scopes already fused and the failing one
/// still in place — the caller should treat the whole pass as unsafe to use
/// and surface the error rather than partially trust the output.
pub fn fuse_lstm_cells(graph: &mut Graph) -> Result<FusionReport, FusionError> {
    let variants = crate::pattern::all_variants();
    let mut report = FusionReport::default();
    let mut failed_scopes: HashSet<String> = HashSet::new();

    loop {
        let mut fused_one = false;

        'variants: for variant in &variants {
            let matches = GraphMatcher::new(&variant.pattern).match_ops(graph);
            for m in matches {
                let scope = match m.scope() {
                    Some(s) => s,
                    None => {
                        let visited: Vec<String> = m.visited_names().map(String::from).collect();
                        record_skip(&mut report, SkipReason::ScopeMissing(visited));
                        continue;
                    }
                };
                if failed_scopes.contains(&scope) {
                    continue;
                }

                match try_fuse(graph, variant, &m, &scope) {
                    Ok(()) => {
                        report.fused += 1;
                        fused_one = true;
                        break 'variants;
                    }
                    Err(TryFuseError::Skip(reason)) => {
                        failed_scopes.insert(scope);
                        record_skip(&mut report, reason);
                    }
                    Err(TryFuseError::Fatal(e)) => return Err(e),
                }
            }
        }

        if !fused_one {
            break;
        }
    }

    Ok(report)
}

fn record_skip(report: &mut FusionReport, reason: SkipReason) {
    log::warn!("skipping LSTM cell match: {reason}");
    report.skipped.push(reason);
}

/// Runs C3 (loop frame) -> C4 (weights) -> C6 (boundary) -> C7 (splice) for
/// one match.
fn try_fuse(
    graph: &mut Graph,
    variant: &CellVariant,
    m: &Match,
    scope: &str,
) -> Result<(), TryFuseError> {
    let loop_result = loop_frame::analyze(graph, m, variant)?;
    let extracted_weights = weights::extract(graph, m)?;

    let x_id = m
        .node(graph, "x")
        .map(|n| n.output(0).to_string())
        .ok_or_else(|| SkipReason::InputXNotFound(scope.to_string()))?;

    let props = RnnProperties {
        scope: scope.to_string(),
        x_id,
        initializers: loop_result.initializers.clone(),
        weights: extracted_weights,
        loop_cond: loop_result.loop_cond.clone(),
    };

    let boundary = boundary::find(graph, &props.x_id, scope)?;

    splice::splice(graph, scope, &props, &loop_result, &boundary).map_err(TryFuseError::Fatal)
}
