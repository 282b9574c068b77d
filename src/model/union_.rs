//! `union_` constructor (spec.md §4.2).

use crate::error::Result;
use crate::kernel::{self, AnnotationInstance, CaseValue, FieldValue, InstanceRef, Kind, Member, NodeRef, UnionCase};

use super::MemberSpec;

/// One case entry as supplied to [`union_`]: the (possibly multiple, for fall-through)
/// discriminator values and the member they select (spec.md §4.7's "multiple
/// `caseDiscriminator`s ... aggregated").
#[derive(Debug, Clone)]
pub struct CaseSpec {
    pub values: Vec<CaseValue>,
    pub member: MemberSpec,
}

/// Builds a union under `ns` with discriminator `disc` and cases assigned in order
/// starting at slot 1.
pub fn union_(
    ns: &NodeRef,
    name: &str,
    disc: NodeRef,
    cases: Vec<CaseSpec>,
    qualifiers: Vec<AnnotationInstance>,
) -> Result<NodeRef> {
    let defn = kernel::Defn::Union(kernel::UnionDefn { discriminator: disc, cases: Vec::new() });
    let node = kernel::new_node_raw(name, Kind::Union, defn);
    kernel::attach_template(&node);
    kernel::set_module_child(ns, name, Some(node.clone()))?;

    for (i, spec) in cases.into_iter().enumerate() {
        kernel::register_typedef_dependency(&node, &spec.member.ty);
        let case = UnionCase {
            values: spec.values,
            member: Member {
                role: spec.member.role,
                ty: spec.member.ty,
                collection: spec.member.collection,
                annotations: spec.member.annotations,
            },
        };
        kernel::set_union_case(&node, i + 1, Some(case))?;
    }
    kernel::set_qualifiers(&node, qualifiers)?;
    Ok(node)
}

/// `u._d := value` (spec.md scenario S4): assigns a union instance's concrete
/// discriminator value, selecting which case it "calls" and which the instance walker
/// (C5) follows.
pub fn set_discriminator(inst: &InstanceRef, value: CaseValue) -> Result<()> {
    kernel::set_discriminator(inst, value)
}

/// "Calling" a union instance (spec.md §9): the accessor/value of its currently selected
/// case's member, or `None` if no discriminator has been assigned yet.
pub fn call(inst: &InstanceRef) -> Option<FieldValue> {
    kernel::selected_case(inst).map(|(_, v)| v)
}
