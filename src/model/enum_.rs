//! `enum_` constructor (spec.md §4.2).

use crate::error::Result;
use crate::kernel::{self, Defn, Kind, NodeRef};

/// Builds an enum under `ns`. Each entry is a name with an optional explicit ordinal; a
/// bare name takes `ordinal = current-length + 1` (1-based), per [`kernel::set_enumerator`].
pub fn enum_(ns: &NodeRef, name: &str, entries: Vec<(String, Option<i32>)>) -> Result<NodeRef> {
    let node = kernel::new_template(name, Kind::Enum, false)?;
    kernel::set_module_child(ns, name, Some(node.clone()))?;
    for (i, entry) in entries.into_iter().enumerate() {
        kernel::set_enumerator(&node, i + 1, Some(entry))?;
    }
    Ok(node)
}

/// The "callable template, given an ordinal" direction (spec.md §4.2).
pub fn enum_name(node: &NodeRef, ordinal: i32) -> Option<String> {
    match &node.borrow().defn {
        Defn::Enum(e) => e.enumerators.iter().find(|(_, o)| *o == ordinal).map(|(n, _)| n.clone()),
        _ => None,
    }
}

/// The "callable template, given a name" direction (spec.md §4.2).
pub fn enum_ordinal(node: &NodeRef, name: &str) -> Option<i32> {
    match &node.borrow().defn {
        Defn::Enum(e) => e.enumerators.iter().find(|(n, _)| n == name).map(|(_, o)| *o),
        _ => None,
    }
}
