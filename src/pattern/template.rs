//! Declarative pattern templates (spec.md §4.1, C1).
//!
//! A pattern is a rooted template over operator types with pattern
//! variables at the leaves, tolerant of commutative reordering at the
//! `Add`/`Mul` nodes where the two standard cell implementations disagree
//! on operand order.

#[derive(Clone)]
pub enum PatternInput {
    /// A leaf: binds whatever node produces this tensor, regardless of its
    /// operator type, under the given pattern-variable name.
    Var(&'static str),
    /// Recurses structurally into a nested operator template.
    Op(OpPattern),
}

#[derive(Clone)]
pub struct OpPattern {
    /// If set, the matched node is recorded under this name so later stages
    /// (the loop-frame analyzer's predicates, the splicer's output
    /// classifier) can look it up by name instead of by position.
    pub var_name: Option<&'static str>,
    pub op_types: &'static [&'static str],
    pub inputs: Vec<PatternInput>,
    pub commutative: bool,
}

impl OpPattern {
    pub fn new(
        var_name: &'static str,
        op_types: &'static [&'static str],
        inputs: Vec<PatternInput>,
    ) -> Self {
        OpPattern {
            var_name: Some(var_name),
            op_types,
            inputs,
            commutative: false,
        }
    }

    /// A structural check with no binding of its own (used for intermediate
    /// nodes nobody downstream needs to name).
    pub fn anon(op_types: &'static [&'static str], inputs: Vec<PatternInput>) -> Self {
        OpPattern {
            var_name: None,
            op_types,
            inputs,
            commutative: false,
        }
    }

    pub fn commutative(mut self) -> Self {
        assert_eq!(
            self.inputs.len(),
            2,
            "commutative matching is only defined for binary nodes"
        );
        self.commutative = true;
        self
    }
}
