//! The dataflow IR the rewriter consumes: a mutable [`Graph`] of [`Node`]s
//! addressed by `producer:port` tensor ids (spec.md §3, §6).

pub mod attr;
pub mod graph;
pub mod node;
pub mod tensor;

pub use attr::AttrValue;
pub use graph::Graph;
pub use node::Node;
pub use tensor::TensorValue;

/// True if `name` is `scope` itself or lives under `scope/`.
pub fn in_scope(name: &str, scope: &str) -> bool {
    name == scope || name.starts_with(&format!("{scope}/"))
}

/// The longest common `/`-delimited path prefix of a set of node names; this
/// is the "scope" of spec.md's Glossary (the unit of rewrite for one cell
/// invocation).
pub fn common_scope<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut names = names.into_iter();
    let first = names.next()?;
    let mut prefix: Vec<&str> = first.split('/').collect();
    prefix.pop(); // the node's own leaf segment is never part of the scope
    for name in names {
        let segments: Vec<&str> = name.split('/').collect();
        let common_len = prefix
            .iter()
            .zip(segments.iter())
            .take_while(|(a, b)| a == b)
            .count();
        prefix.truncate(common_len);
        if prefix.is_empty() {
            return None;
        }
    }
    Some(prefix.join("/"))
}
