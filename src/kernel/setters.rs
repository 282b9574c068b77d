//! The setter protocol (spec.md §4.1.2). Per the redesign guidance in §9 ("expose one
//! setter API per concept rather than overloading index operators"), this is a typed
//! method per symbolic key (`NAME`, `NS`, `QUALIFIERS`, `BASE`, `SWITCH`) plus typed
//! per-kind member-slot operations, instead of one dynamically-keyed setter. Every
//! function validates fully before mutating `defn`, so a failed call leaves the node
//! unchanged (transactional per call).

use std::rc::Rc;

use super::instance::rebuild_template;
use super::propagate::{register_instance_in_chain, unregister_instance_from_chain, update_instances};
use super::{
    AnnotationInstance, CaseValue, CollectionQualifier, Defn, Kind, Member, NodeRef, UnionCase,
};
use crate::error::{DdslError, Result};

/// Re-exported for callers that want a single enum to describe "which setter", e.g. a
/// generic XML-import dispatcher. The kernel itself never matches on this — each variant
/// just forwards to the corresponding typed function below.
pub enum SetterKey {
    Name(String),
    Ns(NodeRef),
    Qualifiers(Vec<AnnotationInstance>),
    Base(Option<NodeRef>),
    Switch(NodeRef),
}

pub fn set(node: &NodeRef, key: SetterKey) -> Result<()> {
    match key {
        SetterKey::Name(s) => set_name(node, &s),
        SetterKey::Ns(m) => set_ns(node, &m),
        SetterKey::Qualifiers(q) => set_qualifiers(node, q),
        SetterKey::Base(b) => set_base(node, b),
        SetterKey::Switch(d) => set_switch(node, d),
    }
}

fn module_children_mut(
    module: &NodeRef,
) -> Result<std::cell::RefMut<'_, super::NodeData>> {
    let borrowed = module.borrow_mut();
    if !matches!(borrowed.kind, Kind::Module) {
        return Err(DdslError::kind_mismatch("NS target must be a module"));
    }
    Ok(borrowed)
}

fn would_cycle(node: &NodeRef, new_parent: &NodeRef) -> bool {
    let mut current = Some(new_parent.clone());
    while let Some(c) = current {
        if Rc::ptr_eq(&c, node) {
            return true;
        }
        current = c.borrow().ns_node();
    }
    false
}

/// `NAME := s` — rename. Must remain unique within the parent module. A no-op if `s`
/// already equals the current name (idempotence, spec.md §8).
pub fn set_name(node: &NodeRef, new_name: &str) -> Result<()> {
    if new_name.is_empty() {
        return Err(DdslError::malformed("a datatype name must not be empty"));
    }
    let old_name = node.borrow().name.clone();
    if old_name == new_name {
        return Ok(());
    }
    let parent = node.borrow().ns_node();
    if let Some(parent) = &parent {
        if let Defn::Module(m) = &parent.borrow().defn {
            if m.children.contains_key(new_name) {
                return Err(DdslError::duplicate(new_name, None));
            }
        }
    }
    if let Some(parent) = &parent {
        let mut pb = parent.borrow_mut();
        if let Defn::Module(m) = &mut pb.defn {
            if let Some(index) = m.children.get_index_of(&old_name) {
                if let Some(shifted) = m.children.shift_remove(&old_name) {
                    m.children.shift_insert(index, new_name.to_string(), shifted);
                }
            }
        }
    }
    node.borrow_mut().name = new_name.to_string();
    Ok(())
}

/// `NS := m` — re-parent. Must not introduce a containment cycle or collide with an
/// existing name in `m`.
pub fn set_ns(node: &NodeRef, new_parent: &NodeRef) -> Result<()> {
    if would_cycle(node, new_parent) {
        return Err(DdslError::cycle("re-parenting would introduce a module containment cycle"));
    }
    let name = node.borrow().name.clone();
    {
        let parent_borrow = module_children_mut(new_parent)?;
        if let Defn::Module(m) = &parent_borrow.defn {
            if m.children.contains_key(&name) {
                return Err(DdslError::duplicate(name, None));
            }
        }
    }
    let old_parent = node.borrow().ns_node();
    if let Some(old) = &old_parent {
        if let Defn::Module(m) = &mut old.borrow_mut().defn {
            m.children.shift_remove(&name);
        }
    }
    if let Defn::Module(m) = &mut new_parent.borrow_mut().defn {
        m.children.insert(name, node.clone());
    }
    node.borrow_mut().ns = Some(Rc::downgrade(new_parent));
    Ok(())
}

/// `QUALIFIERS := [...]` — replace the qualifier list wholesale.
pub fn set_qualifiers(node: &NodeRef, quals: Vec<AnnotationInstance>) -> Result<()> {
    node.borrow_mut().qualifiers = quals;
    Ok(())
}

/// `BASE := b` (struct only). Removes every inherited role from the old base chain out of
/// every instance, then walks `b`'s chain top-down adding each role (uniqueness-checked
/// against locally defined roles), and records every instance of this struct (including
/// its own template) as an instance of every base on the new chain.
pub fn set_base(node: &NodeRef, new_base: Option<NodeRef>) -> Result<()> {
    if !matches!(node.borrow().kind, Kind::Struct) {
        return Err(DdslError::kind_mismatch("BASE := is only valid on a STRUCT"));
    }
    if let Some(ref b) = new_base {
        if !matches!(b.borrow().kind, Kind::Struct) {
            return Err(DdslError::kind_mismatch("base must be a STRUCT"));
        }
        if base_chain_contains(b, node) || Rc::ptr_eq(b, node) {
            return Err(DdslError::cycle("base assignment would create an inheritance cycle"));
        }
    }

    // Validate uniqueness of the new base chain's roles against this struct's own locally
    // declared members before committing anything (transactional).
    if let Some(ref b) = new_base {
        let mut seen = std::collections::HashSet::new();
        let local_roles: Vec<String> = match &node.borrow().defn {
            Defn::Struct(s) => s.members.iter().map(|m| m.role.clone()).collect(),
            _ => unreachable!(),
        };
        for role in &local_roles {
            seen.insert(role.clone());
        }
        let mut chain_roles = Vec::new();
        collect_chain_roles(b, &mut chain_roles)?;
        for role in &chain_roles {
            if !seen.insert(role.clone()) {
                return Err(DdslError::duplicate(role.clone(), None));
            }
        }
    }

    let old_base = match &node.borrow().defn {
        Defn::Struct(s) => s.base.clone(),
        _ => unreachable!(),
    };

    // Collect the instances affected (this struct's own registered instances, which
    // already include any further-derived struct templates by the chain-registration
    // invariant) before we mutate anything downstream.
    let instances: Vec<super::InstanceRef> = node
        .borrow()
        .instances
        .iter()
        .filter_map(|w| w.upgrade())
        .collect();

    if let Some(old) = &old_base {
        for inst in &instances {
            unregister_instance_from_chain(inst, old);
        }
    }

    if let Defn::Struct(s) = &mut node.borrow_mut().defn {
        s.base = new_base.clone();
    }

    if let Some(new_base) = &new_base {
        for inst in &instances {
            register_instance_in_chain(inst, new_base);
        }
    }

    for inst in &instances {
        rebuild_instance_fields(node, inst)?;
    }
    rebuild_template(node)?;
    Ok(())
}

fn rebuild_instance_fields(node: &NodeRef, inst: &super::InstanceRef) -> Result<()> {
    let prefix = inst.borrow().prefix.clone();
    let fresh = super::instance::build_instance(node, prefix)?;
    let fields = std::mem::take(&mut fresh.borrow_mut().fields);
    inst.borrow_mut().fields = fields;
    Ok(())
}

fn base_chain_contains(start: &NodeRef, target: &NodeRef) -> bool {
    let base = match &start.borrow().defn {
        Defn::Struct(s) => s.base.clone(),
        _ => None,
    };
    match base {
        Some(b) => Rc::ptr_eq(&b, target) || base_chain_contains(&b, target),
        None => false,
    }
}

fn collect_chain_roles(node: &NodeRef, out: &mut Vec<String>) -> Result<()> {
    let (base, roles) = match &node.borrow().defn {
        Defn::Struct(s) => (s.base.clone(), s.members.iter().map(|m| m.role.clone()).collect::<Vec<_>>()),
        _ => return Err(DdslError::kind_mismatch("base chain must consist of STRUCTs")),
    };
    if let Some(base) = base {
        collect_chain_roles(&base, out)?;
    }
    out.extend(roles);
    Ok(())
}

/// `SWITCH := d` (union only). Revalidates every existing case value against `d`;
/// rejects the whole mutation (keeping the old discriminator) if any case becomes
/// incompatible.
pub fn set_switch(node: &NodeRef, new_disc: NodeRef) -> Result<()> {
    let cases: Vec<UnionCase> = match &node.borrow().defn {
        Defn::Union(u) => u.cases.clone(),
        _ => return Err(DdslError::kind_mismatch("SWITCH := is only valid on a UNION")),
    };
    for case in &cases {
        for value in &case.values {
            validate_case_value(&new_disc, value)?;
        }
    }
    if let Defn::Union(u) = &mut node.borrow_mut().defn {
        u.discriminator = new_disc;
    }
    Ok(())
}

pub(crate) fn validate_case_value(disc: &NodeRef, value: &CaseValue) -> Result<()> {
    if matches!(value, CaseValue::Default) {
        return Ok(());
    }
    let (base, _) = super::resolve(disc);
    let borrowed = base.borrow();
    match (&borrowed.defn, value) {
        (Defn::Enum(e), CaseValue::Enumerator(name)) => {
            if e.enumerators.iter().any(|(n, _)| n == name) {
                Ok(())
            } else {
                Err(DdslError::invalid_case(format!("{name:?} is not an enumerator of the discriminator")))
            }
        }
        (Defn::Atom(_), CaseValue::Bool(_)) if borrowed.name == "boolean" => Ok(()),
        (Defn::Atom(_), CaseValue::Int(_)) if is_integral_atom(&borrowed.name) => Ok(()),
        (Defn::Atom(_), CaseValue::Str(s)) if is_char_atom(&borrowed.name) && s.chars().count() == 1 => Ok(()),
        _ => Err(DdslError::invalid_case("case value is not assignable to the discriminator's type")),
    }
}

fn is_integral_atom(name: &str) -> bool {
    matches!(
        name,
        "octet"
            | "short"
            | "long"
            | "long_long"
            | "unsigned_short"
            | "unsigned_long"
            | "unsigned_long_long"
    )
}

fn is_char_atom(name: &str) -> bool {
    matches!(name, "char" | "wchar")
}

/// Assigns/replaces the i-th member (1-based, contiguous) of a STRUCT; `None` deletes it,
/// shifting the tail left. Removes the old role from every instance first, then (if
/// replacing) appends the new one and propagates it (spec.md §4.1.2).
pub fn set_struct_member(node: &NodeRef, index: usize, spec: Option<Member>) -> Result<()> {
    if !matches!(node.borrow().kind, Kind::Struct) {
        return Err(DdslError::kind_mismatch("member slots are only valid on a STRUCT"));
    }
    if index == 0 {
        return Err(DdslError::malformed("member slots are 1-based"));
    }

    if let Some(ref m) = spec {
        let base = match &node.borrow().defn {
            Defn::Struct(s) => s.base.clone(),
            _ => unreachable!(),
        };
        let mut roles = Vec::new();
        if let Some(base) = &base {
            collect_chain_roles(base, &mut roles)?;
        }
        let locals: Vec<String> = match &node.borrow().defn {
            Defn::Struct(s) => s
                .members
                .iter()
                .enumerate()
                .filter(|(i, _)| *i + 1 != index)
                .map(|(_, m)| m.role.clone())
                .collect(),
            _ => unreachable!(),
        };
        roles.extend(locals);
        if roles.contains(&m.role) {
            return Err(DdslError::duplicate(m.role.clone(), None));
        }
    }

    let old_role = {
        let borrowed = node.borrow();
        let Defn::Struct(s) = &borrowed.defn else { unreachable!() };
        s.members.get(index - 1).map(|m| m.role.clone())
    };

    if let Some(old_role) = &old_role {
        update_instances(node, old_role, None)?;
    }

    {
        let mut borrowed = node.borrow_mut();
        let Defn::Struct(s) = &mut borrowed.defn else { unreachable!() };
        match spec.clone() {
            Some(m) => {
                if index - 1 < s.members.len() {
                    s.members[index - 1] = m;
                } else if index - 1 == s.members.len() {
                    s.members.push(m);
                } else {
                    return Err(DdslError::malformed("member slots must be assigned contiguously"));
                }
            }
            None => {
                if index - 1 < s.members.len() {
                    s.members.remove(index - 1);
                }
            }
        }
    }

    if let Some(m) = &spec {
        update_instances(node, &m.role, Some(m))?;
    }
    rebuild_template(node)?;
    Ok(())
}

/// Assigns/replaces the i-th case (1-based, contiguous) of a UNION; `None` deletes it.
pub fn set_union_case(node: &NodeRef, index: usize, spec: Option<UnionCase>) -> Result<()> {
    if !matches!(node.borrow().kind, Kind::Union) {
        return Err(DdslError::kind_mismatch("case slots are only valid on a UNION"));
    }
    if index == 0 {
        return Err(DdslError::malformed("case slots are 1-based"));
    }

    let disc = match &node.borrow().defn {
        Defn::Union(u) => u.discriminator.clone(),
        _ => unreachable!(),
    };

    if let Some(ref c) = spec {
        for v in &c.values {
            validate_case_value(&disc, v)?;
        }
        let existing_values: Vec<CaseValue> = match &node.borrow().defn {
            Defn::Union(u) => u
                .cases
                .iter()
                .enumerate()
                .filter(|(i, _)| *i + 1 != index)
                .flat_map(|(_, c)| c.values.clone())
                .collect(),
            _ => unreachable!(),
        };
        for v in &c.values {
            if case_values_overlap(&existing_values, v) {
                return Err(DdslError::invalid_case("duplicate union case value"));
            }
        }
        let new_defaults = c.values.iter().filter(|v| matches!(v, CaseValue::Default)).count();
        let existing_defaults = existing_values.iter().filter(|v| matches!(v, CaseValue::Default)).count();
        if new_defaults + existing_defaults > 1 {
            return Err(DdslError::invalid_case("at most one default case is allowed"));
        }
    }

    let old_role = {
        let borrowed = node.borrow();
        let Defn::Union(u) = &borrowed.defn else { unreachable!() };
        u.cases.get(index - 1).map(|c| c.member.role.clone())
    };
    if let Some(old_role) = &old_role {
        update_instances(node, old_role, None)?;
    }

    {
        let mut borrowed = node.borrow_mut();
        let Defn::Union(u) = &mut borrowed.defn else { unreachable!() };
        match spec.clone() {
            Some(c) => {
                if index - 1 < u.cases.len() {
                    u.cases[index - 1] = c;
                } else if index - 1 == u.cases.len() {
                    u.cases.push(c);
                } else {
                    return Err(DdslError::malformed("case slots must be assigned contiguously"));
                }
            }
            None => {
                if index - 1 < u.cases.len() {
                    u.cases.remove(index - 1);
                }
            }
        }
    }

    if let Some(c) = &spec {
        update_instances(node, &c.member.role, Some(&c.member))?;
    }
    rebuild_template(node)?;
    Ok(())
}

fn case_values_overlap(existing: &[CaseValue], v: &CaseValue) -> bool {
    existing.iter().any(|e| case_values_eq(e, v))
}

fn case_values_eq(a: &CaseValue, b: &CaseValue) -> bool {
    match (a, b) {
        (CaseValue::Int(x), CaseValue::Int(y)) => x == y,
        (CaseValue::Bool(x), CaseValue::Bool(y)) => x == y,
        (CaseValue::Str(x), CaseValue::Str(y)) => x == y,
        (CaseValue::Enumerator(x), CaseValue::Enumerator(y)) => x == y,
        (CaseValue::Default, CaseValue::Default) => true,
        _ => false,
    }
}

/// Assigns/replaces the i-th enumerator (1-based, contiguous) of an ENUM; `None` deletes
/// it. A lone name with no explicit ordinal defaults to the current length (1-based).
pub fn set_enumerator(node: &NodeRef, index: usize, spec: Option<(String, Option<i32>)>) -> Result<()> {
    if !matches!(node.borrow().kind, Kind::Enum) {
        return Err(DdslError::kind_mismatch("enumerator slots are only valid on an ENUM"));
    }
    if index == 0 {
        return Err(DdslError::malformed("enumerator slots are 1-based"));
    }

    if let Some((name, _)) = &spec {
        let others: Vec<String> = match &node.borrow().defn {
            Defn::Enum(e) => e
                .enumerators
                .iter()
                .enumerate()
                .filter(|(i, _)| *i + 1 != index)
                .map(|(_, (n, _))| n.clone())
                .collect(),
            _ => unreachable!(),
        };
        if others.contains(name) {
            return Err(DdslError::duplicate(name.clone(), None));
        }
    }

    let mut borrowed = node.borrow_mut();
    let Defn::Enum(e) = &mut borrowed.defn else { unreachable!() };
    match spec {
        Some((name, ordinal)) => {
            let ordinal = ordinal.unwrap_or(e.enumerators.len() as i32 + 1);
            if index - 1 < e.enumerators.len() {
                e.enumerators[index - 1] = (name, ordinal);
            } else if index - 1 == e.enumerators.len() {
                e.enumerators.push((name, ordinal));
            } else {
                return Err(DdslError::malformed("enumerator slots must be assigned contiguously"));
            }
        }
        None => {
            if index - 1 < e.enumerators.len() {
                e.enumerators.remove(index - 1);
            }
        }
    }
    Ok(())
}

/// Adds, replaces, or removes a named child of a MODULE.
pub fn set_module_child(node: &NodeRef, name: &str, child: Option<NodeRef>) -> Result<()> {
    if !matches!(node.borrow().kind, Kind::Module) {
        return Err(DdslError::kind_mismatch("module children are only valid on a MODULE"));
    }
    match child {
        Some(child) => {
            {
                let borrowed = node.borrow();
                let Defn::Module(m) = &borrowed.defn else { unreachable!() };
                if m.children.contains_key(name) {
                    return Err(DdslError::duplicate(name, None));
                }
            }
            child.borrow_mut().ns = Some(Rc::downgrade(node));
            if let Defn::Module(m) = &mut node.borrow_mut().defn {
                m.children.insert(name.to_string(), child);
            }
        }
        None => {
            if let Defn::Module(m) = &mut node.borrow_mut().defn {
                m.children.shift_remove(name);
            }
        }
    }
    rebuild_template(node)?;
    Ok(())
}

/// Retargets a TYPEDEF's alias and/or collection qualifier, then rebuilds every dependent
/// struct/union's affected fields (spec.md §1's "typedef re-resolution" propagation
/// category). Rejects the change if it would make the typedef chain cyclic.
pub fn set_typedef(node: &NodeRef, new_alias: NodeRef, new_collection: Option<CollectionQualifier>) -> Result<()> {
    if !matches!(node.borrow().kind, Kind::Typedef) {
        return Err(DdslError::kind_mismatch("this setter is only valid on a TYPEDEF"));
    }
    let (terminal, _) = super::resolve(&new_alias);
    if Rc::ptr_eq(&terminal, node) {
        return Err(DdslError::cycle("typedef chain would not terminate at a non-typedef"));
    }

    if let Defn::Typedef(t) = &mut node.borrow_mut().defn {
        t.alias = new_alias;
        t.collection = new_collection;
    }

    let dependents: Vec<NodeRef> = node.borrow().dependents.iter().filter_map(|w| w.upgrade()).collect();
    for dep in &dependents {
        rebuild_dependent(dep)?;
    }
    Ok(())
}

fn rebuild_dependent(node: &NodeRef) -> Result<()> {
    match &node.borrow().kind {
        Kind::Struct => {
            let members: Vec<Member> = match &node.borrow().defn {
                Defn::Struct(s) => s.members.clone(),
                _ => unreachable!(),
            };
            for m in &members {
                update_instances(node, &m.role, Some(m))?;
            }
        }
        Kind::Union => {
            let cases: Vec<UnionCase> = match &node.borrow().defn {
                Defn::Union(u) => u.cases.clone(),
                _ => unreachable!(),
            };
            for c in &cases {
                update_instances(node, &c.member.role, Some(&c.member))?;
            }
        }
        _ => {}
    }
    rebuild_template(node)?;
    Ok(())
}

/// Registers `dependent` (a struct/union node) as depending on every TYPEDEF crossed while
/// resolving `ty`. Called whenever a member/case is added so a later typedef retarget can
/// find and rebuild it.
pub(crate) fn register_typedef_dependency(dependent: &NodeRef, ty: &NodeRef) {
    let mut current = ty.clone();
    loop {
        let next = {
            let borrowed = current.borrow();
            match &borrowed.defn {
                Defn::Typedef(t) => Some(t.alias.clone()),
                _ => None,
            }
        };
        if matches!(current.borrow().kind, Kind::Typedef) {
            let already = current
                .borrow()
                .dependents
                .iter()
                .any(|w| w.upgrade().map(|d| Rc::ptr_eq(&d, dependent)).unwrap_or(false));
            if !already {
                current.borrow_mut().dependents.push(Rc::downgrade(dependent));
            }
        }
        match next {
            Some(alias) => current = alias,
            None => break,
        }
    }
}
