//! One pattern per supported cell variant (spec.md §4.1, C1).
//!
//! Both variants share the same primitive-level template for a TF-style
//! `BasicLSTMCell`/`LSTMCell` step:
//!
//! ```text
//! gate_inputs = Add(MatMul(Concat([x, h]), kernel), bias)      [commutative Add]
//! gates       = Split(gate_inputs)     -- 4 outputs, gate order (i, c, f, o)
//! f_biased    = Add(gates:2, forget_bias)                      [commutative Add]
//! c_mul       = Mul(c_prev, Sigmoid(f_biased))                 [commutative Mul]
//! i_mul       = Mul(Sigmoid(gates:0), Tanh(gates:1))            [commutative Mul]
//! new_c       = Add(c_mul, i_mul)                               [commutative Add]
//! new_h       = Mul(Sigmoid(gates:3), Tanh(new_c))              [commutative Mul]
//! ```
//!
//! `new_h` is the pattern root. The peephole variant tolerates (and, per
//! the Non-goals, ignores) the same template — its pattern differs only in
//! label; peephole `Mul(Pp, c)` terms feeding the gate pre-activations are
//! not modeled because fusing past them already loses peephole behavior by
//! design (spec.md §4.1, §8 scenario 2).

use super::matcher::Match;
use super::template::{OpPattern, PatternInput};
use crate::ir::Node;

/// `(enter_target_tensor_id, identity_consumers, match)` -> the initializer
/// tensor id, if this switch carries the classified state.
pub type SwitchPredicate = fn(&str, &[Node], &Match) -> Option<String>;

pub struct CellVariant {
    pub name: &'static str,
    pub pattern: OpPattern,
    pub is_ct_switch: SwitchPredicate,
    pub is_ht_switch: SwitchPredicate,
    pub is_shared_ch_switch: SwitchPredicate,
}

fn gate_inputs_pattern() -> OpPattern {
    OpPattern::new(
        "gate_inputs",
        &["Add", "BiasAdd"],
        vec![
            PatternInput::Op(OpPattern::anon(
                &["MatMul"],
                vec![
                    PatternInput::Op(OpPattern::new(
                        "concat",
                        &["Concat", "ConcatV2"],
                        vec![PatternInput::Var("x"), PatternInput::Var("h_prev")],
                    )),
                    PatternInput::Var("kernel"),
                ],
            )),
            PatternInput::Var("bias"),
        ],
    )
}

/// `gates` is referenced from four places in the template below (one per
/// gate); each call rebuilds the same structural tree rather than sharing a
/// handle, and the matcher's binding-consistency check (`bind_var`) is what
/// forces every occurrence back onto the same `Split` node.
fn basic_cell_pattern() -> OpPattern {
    let gates = || {
        PatternInput::Op(OpPattern::new(
            "gates",
            &["Split"],
            vec![PatternInput::Op(gate_inputs_pattern())],
        ))
    };

    let f_biased = OpPattern::new(
        "f_biased",
        &["Add"],
        vec![gates(), PatternInput::Var("forget_bias")],
    )
    .commutative();

    let c_mul = OpPattern::new(
        "c_mul",
        &["Mul"],
        vec![
            PatternInput::Var("c_prev"),
            PatternInput::Op(OpPattern::anon(&["Sigmoid"], vec![PatternInput::Op(f_biased)])),
        ],
    )
    .commutative();

    let i_mul = OpPattern::anon(
        &["Mul"],
        vec![
            PatternInput::Op(OpPattern::anon(&["Sigmoid"], vec![gates()])),
            PatternInput::Op(OpPattern::anon(&["Tanh"], vec![gates()])),
        ],
    )
    .commutative();

    let new_c = OpPattern::new("new_c", &["Add"], vec![PatternInput::Op(c_mul), PatternInput::Op(i_mul)]).commutative();

    OpPattern::new(
        "new_h",
        &["Mul"],
        vec![
            PatternInput::Op(OpPattern::anon(&["Sigmoid"], vec![gates()])),
            PatternInput::Op(OpPattern::anon(&["Tanh"], vec![PatternInput::Op(new_c)])),
        ],
    )
    .commutative()
}

/// `true` iff this Switch's true-branch chain leads to the node `var`
/// binds to (either directly — the tuple case, where `var` IS the Switch's
/// Identity — or one more hop past it — the non-tuple case, where the
/// Identity feeds a shared split both `c_prev` and `h_prev` bind to).
fn leads_to(identity_consumers: &[Node], m: &Match, var: &str) -> bool {
    match m.node_name(var) {
        Some(name) => identity_consumers.iter().any(|n| n.name == name),
        None => false,
    }
}

fn is_ct_switch(enter_target: &str, identity_consumers: &[Node], m: &Match) -> Option<String> {
    let shared = m.node_name("c_prev") == m.node_name("h_prev");
    (!shared && leads_to(identity_consumers, m, "c_prev")).then(|| enter_target.to_string())
}

fn is_ht_switch(enter_target: &str, identity_consumers: &[Node], m: &Match) -> Option<String> {
    let shared = m.node_name("c_prev") == m.node_name("h_prev");
    (!shared && leads_to(identity_consumers, m, "h_prev")).then(|| enter_target.to_string())
}

/// Non-tuple state: `c` and `h` share one Switch whose Identity feeds a
/// single split node that both `c_prev` and `h_prev` bind to (see spec.md
/// §3, "Tuple state / non-tuple state").
fn is_shared_ch_switch(enter_target: &str, identity_consumers: &[Node], m: &Match) -> Option<String> {
    let c_prev = m.node_name("c_prev");
    let h_prev = m.node_name("h_prev");
    let shared = c_prev.is_some() && c_prev == h_prev;
    (shared && leads_to(identity_consumers, m, "c_prev")).then(|| enter_target.to_string())
}

pub fn basic_lstm() -> CellVariant {
    CellVariant {
        name: "basic_lstm",
        pattern: basic_cell_pattern(),
        is_ct_switch,
        is_ht_switch,
        is_shared_ch_switch,
    }
}

/// Same template; peephole connections are accepted silently and ignored
/// (Non-goal). Kept as a distinct variant so the driver's "for each unit
/// type" loop (spec.md §2, C8) has more than one entry, matching the
/// source's per-cell-type rewriter subclasses.
pub fn lstm_cell_peephole() -> CellVariant {
    CellVariant {
        name: "lstm_cell_peephole",
        pattern: basic_cell_pattern(),
        is_ct_switch,
        is_ht_switch,
        is_shared_ch_switch,
    }
}

pub fn all_variants() -> Vec<CellVariant> {
    vec![basic_lstm(), lstm_cell_peephole()]
}
