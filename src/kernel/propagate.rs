//! The propagation engine (spec.md §4.1.4): `update_instances` recomputes one member
//! role's accessor value across every live instance of a node, including instances of
//! every struct that transitively inherits from it.
//!
//! Rather than walking the inheritance chain at propagation time, the chain is captured
//! at registration time: [`register_instance_in_chain`] adds a new instance's weak handle
//! to the node it was built from *and* to every ancestor on its base chain. A derived
//! struct's own template is registered the same way when its `BASE :=` is set (see
//! `setters.rs`), so recomputing a base's instance list naturally reaches every derived
//! instance without recursive fan-out at update time (spec.md §4.1.4 point 2 falls out of
//! this registration invariant).

use std::rc::Weak;

use super::instance::build_member_field;
use super::{Defn, Member, NodeRef};
use crate::error::Result;

pub(crate) fn register_instance_in_chain(inst: &super::InstanceRef, node: &NodeRef) {
    node.borrow_mut().instances.push(std::rc::Rc::downgrade(inst));
    let base = match &node.borrow().defn {
        Defn::Struct(s) => s.base.clone(),
        _ => None,
    };
    if let Some(base) = base {
        register_instance_in_chain(inst, &base);
    }
}

pub(crate) fn unregister_instance_from_chain(inst: &super::InstanceRef, node: &NodeRef) {
    let ptr = std::rc::Rc::as_ptr(inst);
    node.borrow_mut()
        .instances
        .retain(|w| !std::ptr::eq(Weak::as_ptr(w), ptr));
    let base = match &node.borrow().defn {
        Defn::Struct(s) => s.base.clone(),
        _ => None,
    };
    if let Some(base) = base {
        unregister_instance_from_chain(inst, &base);
    }
}

/// Recomputes (or deletes) the accessor slot at `role` in every live instance of `node`
/// (spec.md §4.1.4). `member = None` deletes the slot; `Some(member)` recomputes it using
/// the member's current shape.
pub fn update_instances(node: &NodeRef, role: &str, member: Option<&Member>) -> Result<()> {
    let weak_list: Vec<_> = node.borrow().instances.clone();
    for w in &weak_list {
        let Some(inst) = w.upgrade() else { continue };
        let prefix = inst.borrow().prefix.clone();
        match member {
            Some(m) => {
                let value = build_member_field(m, &prefix)?;
                inst.borrow_mut().fields.insert(role.to_string(), value);
            }
            None => {
                inst.borrow_mut().fields.shift_remove(role);
            }
        }
    }
    node.borrow_mut().instances.retain(|w| w.strong_count() > 0);
    Ok(())
}
