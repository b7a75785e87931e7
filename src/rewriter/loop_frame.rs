//! The loop-frame analyzer (spec.md §4.3, C3): given a matched cell body,
//! finds the surrounding `Enter`/`Switch`/`Merge`/`NextIteration`/`Exit`
//! frame, confirms it is driven by exactly one `LoopCond`, and classifies
//! which `Switch` carries `c`, which carries `h`, or whether both share one.

use super::properties::RnnInitializers;
use super::SkipReason;
use crate::ir::{in_scope, Graph, Node};
use crate::pattern::{CellVariant, Match};

pub struct LoopFrameResult {
    pub initializers: RnnInitializers,
    pub loop_cond: String,
    /// Names of the classified `Switch` nodes, so the splicer can find their
    /// `Exit` counterparts (consumers of `switch.output(0)`) for output
    /// wiring (spec.md §4.7.1).
    pub ct_switch: Option<String>,
    pub ht_switch: Option<String>,
    pub shared_switch: Option<String>,
}

pub fn analyze(graph: &Graph, m: &Match, variant: &CellVariant) -> Result<LoopFrameResult, SkipReason> {
    let visited: Vec<String> = m.visited_names().map(String::from).collect();
    let scope = m.scope().ok_or_else(|| SkipReason::ScopeMissing(visited.clone()))?;

    let loop_conds: Vec<&Node> = graph
        .get_nodes()
        .iter()
        .filter(|n| n.op_type == "LoopCond" && in_scope(&n.name, &scope))
        .collect();
    let loop_cond = match loop_conds.len() {
        0 => return Err(SkipReason::NoLoop(scope.clone())),
        1 => loop_conds[0].name.clone(),
        _ => return Err(SkipReason::DuplicateLoop(scope.clone())),
    };

    let switches: Vec<&Node> = graph
        .get_nodes()
        .iter()
        .filter(|n| n.op_type == "Switch" && in_scope(&n.name, &scope))
        .collect();

    let mut ct_switch = None;
    let mut ht_switch = None;
    let mut shared_switch = None;

    for switch in &switches {
        let true_branch = switch.output(1.min(switch.outputs.len().saturating_sub(1)));
        let direct: Vec<Node> = graph.find_output_consumers(true_branch).into_iter().cloned().collect();
        // A pattern var binds to whichever node produces its tensor, so for
        // the tuple case c_prev/h_prev are themselves the Identity wrapping
        // the Switch; for non-tuple state that Identity instead feeds a
        // Split that c_prev and h_prev both bind to (same node, different
        // output port). Looking one hop past any Identity covers both.
        let mut identity_consumers = direct.clone();
        for n in &direct {
            if n.op_type == "Identity" {
                identity_consumers.extend(graph.find_output_consumers(n.output(0)).into_iter().cloned());
            }
        }

        if (variant.is_shared_ch_switch)(true_branch, &identity_consumers, m).is_some() {
            shared_switch = Some(*switch);
        } else if (variant.is_ct_switch)(true_branch, &identity_consumers, m).is_some() {
            ct_switch = Some(*switch);
        } else if (variant.is_ht_switch)(true_branch, &identity_consumers, m).is_some() {
            ht_switch = Some(*switch);
        }
    }

    let initializers = if let Some(shared) = shared_switch {
        RnnInitializers::Shared {
            shared_init_id: enter_init_value(graph, shared, &scope)?,
        }
    } else {
        let (Some(ct), Some(ht)) = (ct_switch, ht_switch) else {
            return Err(SkipReason::InitializerCheckFailed(scope.clone()));
        };
        RnnInitializers::Tuple {
            c_init_id: enter_init_value(graph, ct, &scope)?,
            h_init_id: enter_init_value(graph, ht, &scope)?,
        }
    };

    Ok(LoopFrameResult {
        initializers,
        loop_cond,
        ct_switch: ct_switch.map(|n| n.name.clone()),
        ht_switch: ht_switch.map(|n| n.name.clone()),
        shared_switch: shared_switch.map(|n| n.name.clone()),
    })
}

/// Walks `Switch -> Merge -> Enter -> <initial value>` to find the constant
/// (or constant-producing) tensor a carried-state Switch started from.
fn enter_init_value(graph: &Graph, switch: &Node, scope: &str) -> Result<String, SkipReason> {
    let data_input = switch
        .inputs
        .first()
        .ok_or_else(|| SkipReason::InitializerCheckFailed(scope.to_string()))?;
    let merge = graph
        .producer_of(data_input)
        .filter(|n| n.op_type == "Merge")
        .ok_or_else(|| SkipReason::InitializerCheckFailed(scope.to_string()))?;

    for input in &merge.inputs {
        if let Some(producer) = graph.producer_of(input) {
            if producer.op_type == "Enter" {
                return producer
                    .inputs
                    .first()
                    .cloned()
                    .ok_or_else(|| SkipReason::InitializerCheckFailed(scope.to_string()));
            }
        }
    }
    Err(SkipReason::InitializerCheckFailed(scope.to_string()))
}
