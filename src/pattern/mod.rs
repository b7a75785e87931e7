//! Declarative cell templates and the matcher that finds them in a graph
//! (spec.md §4.1–4.2, C1–C2).

pub mod library;
pub mod matcher;
pub mod template;

pub use library::{all_variants, CellVariant, SwitchPredicate};
pub use matcher::{GraphMatcher, Match};
pub use template::{OpPattern, PatternInput};
