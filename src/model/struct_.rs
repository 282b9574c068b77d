//! `struct_` constructor (spec.md §4.2).

use crate::error::Result;
use crate::kernel::{self, AnnotationInstance, Kind, Member, NodeRef};

use super::MemberSpec;

/// Builds a struct under `ns`, optionally inheriting from `base`, with members assigned
/// in order starting at slot 1 — the same transactional setter path later mutations use
/// (spec.md §4.1.1 "declaration and mutation share one code path").
pub fn struct_(
    ns: &NodeRef,
    name: &str,
    base: Option<NodeRef>,
    members: Vec<MemberSpec>,
    qualifiers: Vec<AnnotationInstance>,
) -> Result<NodeRef> {
    let node = kernel::new_template(name, Kind::Struct, false)?;
    kernel::set_module_child(ns, name, Some(node.clone()))?;
    if base.is_some() {
        kernel::set_base(&node, base)?;
    }
    for (i, spec) in members.into_iter().enumerate() {
        kernel::register_typedef_dependency(&node, &spec.ty);
        let member = Member {
            role: spec.role,
            ty: spec.ty,
            collection: spec.collection,
            annotations: spec.annotations,
        };
        kernel::set_struct_member(&node, i + 1, Some(member))?;
    }
    kernel::set_qualifiers(&node, qualifiers)?;
    Ok(node)
}
