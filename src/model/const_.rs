//! `const_` constructor (spec.md §4.2).

use crate::coercion::{coerce, RawConstValue};
use crate::error::{DdslError, Result};
use crate::kernel::{self, ConstDefn, ConstValue, Defn, Kind, NodeRef};

/// Builds a `CONST` under `ns`. The value is coerced to `atom`'s kind per spec.md §4.3;
/// once built, the result is invariant (no setter mutates a `CONST`'s value).
pub fn const_(ns: &NodeRef, name: &str, atom: NodeRef, value: RawConstValue) -> Result<NodeRef> {
    let coerced = coerce(&atom, value)?;
    let defn = Defn::Const(ConstDefn { atom, value: coerced });
    let node = kernel::new_node_raw(name, Kind::Const, defn);
    kernel::set_module_child(ns, name, Some(node.clone()))?;
    Ok(node)
}

/// "Calling" a const template (spec.md §9): returns its coerced value and atom.
pub fn const_value(node: &NodeRef) -> Result<(ConstValue, NodeRef)> {
    match &node.borrow().defn {
        Defn::Const(c) => Ok((c.value.clone(), c.atom.clone())),
        _ => Err(DdslError::kind_mismatch("const_value is only valid on a CONST")),
    }
}
