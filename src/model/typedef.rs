//! `typedef` constructor (spec.md §4.2).

use crate::error::{DdslError, Result};
use crate::kernel::{self, CollectionQualifier, Defn, Kind, NodeRef, TypedefDefn};

/// Builds a typedef under `ns` aliasing `alias` (optionally through a collection
/// qualifier). Rejects an alias that would make the typedef chain cyclic before it's even
/// reachable (aliasing a typedef that (transitively) aliases back to a node of the same
/// name is impossible before creation, so this only catches self-aliasing).
pub fn typedef(ns: &NodeRef, name: &str, alias: NodeRef, collection: Option<CollectionQualifier>) -> Result<NodeRef> {
    let defn = Defn::Typedef(TypedefDefn { alias: alias.clone(), collection });
    let node = kernel::new_node_raw(name, Kind::Typedef, defn);
    kernel::set_module_child(ns, name, Some(node.clone()))?;
    Ok(node)
}

/// "Calling the typedef template" (spec.md §4.2): returns the alias and collection
/// qualifier it currently carries.
pub fn typedef_value(node: &NodeRef) -> Result<(NodeRef, Option<CollectionQualifier>)> {
    match &node.borrow().defn {
        Defn::Typedef(t) => Ok((t.alias.clone(), t.collection.clone())),
        _ => Err(DdslError::kind_mismatch("typedef_value is only valid on a TYPEDEF")),
    }
}
