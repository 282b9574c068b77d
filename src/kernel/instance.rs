//! Template/instance representation and accessor-string computation (spec.md §3.4–3.6,
//! §4.1.3).

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::{
    clone_qualifier, resolve, Bound, CaseValue, CollectionQualifier, Defn, Kind, Member, NodeData,
    NodeRef,
};
use crate::error::{DdslError, Result};

pub type InstanceRef = Rc<RefCell<InstanceData>>;

/// A live instance (or a template, which is the instance with an empty prefix) mirroring
/// a struct/union/module's shape. Every leaf field holds an accessor string that stays in
/// sync with the owning node's current shape via [`super::update_instances`].
#[derive(Debug)]
pub struct InstanceData {
    pub prefix: String,
    pub owner: Weak<RefCell<NodeData>>,
    pub fields: IndexMap<String, FieldValue>,
    /// For a union instance only: the concrete value last assigned to `_d`, which selects
    /// the case the instance walker (C5) recurses into and that "calling" the instance
    /// returns (spec.md §4.6, §9 "callable templates", scenario S4). `None` until the
    /// caller assigns one; accessor-string generation never sets this itself.
    pub discriminant: Option<CaseValue>,
}

impl InstanceData {
    pub fn get(&self, role: &str) -> Option<&FieldValue> {
        self.fields.get(role)
    }
}

#[derive(Debug, Clone)]
pub enum FieldValue {
    Leaf(String),
    Nested(InstanceRef),
    Collection(CollectionRef),
}

impl FieldValue {
    /// Returns the leaf accessor string, if this field is a leaf (atom/enum/typedef-to-leaf).
    pub fn as_leaf(&self) -> Option<&str> {
        match self {
            FieldValue::Leaf(s) => Some(s),
            _ => None,
        }
    }
}

pub type CollectionRef = Rc<CollectionData>;

/// One flattened collection dimension: either an array bound or a sequence bound (`None`
/// for unbounded).
#[derive(Debug, Clone)]
pub(crate) enum Dim {
    Array(Bound),
    Sequence(Option<Bound>),
}

/// A collection instance (spec.md §3.4). `length_accessor()` is the member's own accessor
/// path; `capacity()` is the resolved numeric bound (`None` for unbounded); elements are
/// materialized lazily on first read and cached.
#[derive(Debug)]
pub struct CollectionData {
    prefix: String,
    capacity: Option<u32>,
    base: NodeRef,
    dims: Vec<Dim>,
    elements: RefCell<IndexMap<usize, FieldValue>>,
}

impl CollectionData {
    pub fn length_accessor(&self) -> &str {
        &self.prefix
    }

    pub fn capacity(&self) -> Option<u32> {
        self.capacity
    }

    /// Indices already materialized by a prior [`CollectionData::get`] call, ascending.
    /// Used by the instance walker (C5) to flatten an unbounded collection without trying
    /// to enumerate out to infinity (spec.md §4.6, §3.4).
    pub fn materialized_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.elements.borrow().keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Returns the i-th element's field value, auto-materializing the slot on first read
    /// (spec.md §3.4).
    pub fn get(&self, i: usize) -> Result<FieldValue> {
        if let Some(existing) = self.elements.borrow().get(&i) {
            return Ok(existing.clone());
        }
        let element_prefix = format!("{}[{}]", self.prefix, i);
        let value = build_field(&self.base, &self.dims, element_prefix)?;
        self.elements.borrow_mut().insert(i, value.clone());
        Ok(value)
    }
}

pub(crate) fn expand_dims(qualifiers: &[CollectionQualifier]) -> Vec<Dim> {
    let mut out = Vec::new();
    for q in qualifiers {
        match q {
            CollectionQualifier::Array { bounds } => {
                for b in bounds {
                    out.push(Dim::Array(b.clone()));
                }
            }
            CollectionQualifier::Sequence { bound } => out.push(Dim::Sequence(bound.clone())),
        }
    }
    out
}

pub(crate) fn build_field(base: &NodeRef, dims: &[Dim], prefix: String) -> Result<FieldValue> {
    if let Some((first, rest)) = dims.split_first() {
        let capacity = match first {
            Dim::Array(b) => Some(b.resolve()?),
            Dim::Sequence(Some(b)) => Some(b.resolve()?),
            Dim::Sequence(None) => None,
        };
        let coll = CollectionData {
            prefix,
            capacity,
            base: base.clone(),
            dims: rest.to_vec(),
            elements: RefCell::new(IndexMap::new()),
        };
        Ok(FieldValue::Collection(Rc::new(coll)))
    } else {
        let kind = base.borrow().kind;
        match kind {
            Kind::Struct | Kind::Union => Ok(FieldValue::Nested(build_instance(base, prefix)?)),
            _ => Ok(FieldValue::Leaf(prefix)),
        }
    }
}

pub(crate) fn build_member_field(m: &Member, prefix: &str) -> Result<FieldValue> {
    let role_prefix = if prefix.is_empty() {
        m.role.clone()
    } else {
        format!("{prefix}.{}", m.role)
    };
    let (base, mut qualifiers) = resolve(&m.ty);
    if let Some(own) = &m.collection {
        qualifiers.insert(0, clone_qualifier(own));
    }
    let dims = expand_dims(&qualifiers);
    build_field(&base, &dims, role_prefix)
}

fn collect_struct_fields(
    base: &NodeRef,
    prefix: &str,
    fields: &mut IndexMap<String, FieldValue>,
) -> Result<()> {
    let members: Vec<Member> = {
        let borrowed = base.borrow();
        let Defn::Struct(s) = &borrowed.defn else {
            return Ok(());
        };
        if let Some(grandbase) = &s.base {
            collect_struct_fields(grandbase, prefix, fields)?;
        }
        s.members.clone()
    };
    for m in &members {
        fields.insert(m.role.clone(), build_member_field(m, prefix)?);
    }
    Ok(())
}

/// Deep-builds a record mirroring `node`'s current shape at accessor path `prefix`
/// (spec.md §4.1.1, §4.1.3).
pub(crate) fn build_instance(node: &NodeRef, prefix: String) -> Result<InstanceRef> {
    let mut fields = IndexMap::new();
    let kind = node.borrow().kind;
    match kind {
        Kind::Struct => {
            let base = match &node.borrow().defn {
                Defn::Struct(s) => s.base.clone(),
                _ => unreachable!(),
            };
            if let Some(base) = &base {
                collect_struct_fields(base, &prefix, &mut fields)?;
            }
            let members: Vec<Member> = match &node.borrow().defn {
                Defn::Struct(s) => s.members.clone(),
                _ => unreachable!(),
            };
            for m in &members {
                fields.insert(m.role.clone(), build_member_field(m, &prefix)?);
            }
        }
        Kind::Union => {
            let disc_prefix = if prefix.is_empty() {
                "_d".to_string()
            } else {
                format!("{prefix}._d")
            };
            fields.insert("_d".to_string(), FieldValue::Leaf(disc_prefix));
            let cases: Vec<UnionCaseMember> = match &node.borrow().defn {
                Defn::Union(u) => u.cases.iter().map(|c| UnionCaseMember(c.member.clone())).collect(),
                _ => unreachable!(),
            };
            for UnionCaseMember(m) in &cases {
                fields.insert(m.role.clone(), build_member_field(m, &prefix)?);
            }
        }
        Kind::Module => {
            let children: Vec<(String, NodeRef)> = match &node.borrow().defn {
                Defn::Module(m) => m.children.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                _ => unreachable!(),
            };
            for (name, child) in children {
                if let Some(t) = super::template(&child) {
                    fields.insert(name, FieldValue::Nested(t));
                }
            }
        }
        _ => {}
    }

    Ok(Rc::new(RefCell::new(InstanceData {
        prefix,
        owner: Rc::downgrade(node),
        fields,
        discriminant: None,
    })))
}

struct UnionCaseMember(Member);

/// Called once, right after a node is allocated, for kinds that carry a canonical
/// instance-bearing template (struct/union/module). Atom/enum/typedef templates are
/// "canonical name" stand-ins, computed live from `node.name`, and never stored.
pub(crate) fn attach_template(node: &NodeRef) {
    let kind = node.borrow().kind;
    if !matches!(kind, Kind::Struct | Kind::Union | Kind::Module) {
        return;
    }
    let inst = match build_instance(node, String::new()) {
        Ok(inst) => inst,
        Err(_) => return, // An empty struct/union/module always builds successfully.
    };
    node.borrow_mut().instances.push(Rc::downgrade(&inst));
    node.borrow_mut().template = Some(inst);
}

/// Rebuilds a node's template in place after a mutation that changes its shape, keeping
/// the same [`InstanceRef`] identity (so existing `Weak` references elsewhere, e.g. base
/// registrations, keep pointing at the right object) but replacing its `fields` map.
pub(crate) fn rebuild_template(node: &NodeRef) -> Result<()> {
    let kind = node.borrow().kind;
    if !matches!(kind, Kind::Struct | Kind::Union | Kind::Module) {
        return Ok(());
    }
    let Some(template) = node.borrow().template.clone() else {
        return Ok(());
    };
    let fresh = build_instance(node, String::new())?;
    template.borrow_mut().fields = std::mem::take(&mut fresh.borrow_mut().fields);
    Ok(())
}

/// `new_instance(template, prefix) -> instance`: deep-builds a record mirroring the
/// node's template, with every leaf set to an accessor string rooted at `prefix`.
/// Registers the instance with `node` and with every struct on `node`'s base chain
/// (spec.md §4.1.1).
pub fn new_instance(node: &NodeRef, prefix: &str) -> Result<InstanceRef> {
    let inst = build_instance(node, prefix.to_string())?;
    super::propagate::register_instance_in_chain(&inst, node);
    Ok(inst)
}

/// `new_collection(element_template, bound?) -> collection-instance`: creates a standalone
/// collection instance not tied to a struct/union member (e.g. for ad hoc walking/testing).
pub fn new_collection(element: &NodeRef, bound: Option<u32>, prefix: &str) -> Result<CollectionRef> {
    let capacity = bound;
    Ok(Rc::new(CollectionData {
        prefix: prefix.to_string(),
        capacity,
        base: element.clone(),
        dims: Vec::new(),
        elements: RefCell::new(IndexMap::new()),
    }))
}

/// `u._d := value` (spec.md scenario S4): assigns the concrete discriminator value of a
/// union instance, validated against the union's current cases exactly as `SWITCH :=`
/// validates an existing case list. This is the one place a live instance carries real
/// data rather than an accessor string, because it is what selects which case the
/// instance walker (C5) and the "callable template" direction (§9) follow.
pub fn set_discriminator(inst: &InstanceRef, value: CaseValue) -> Result<()> {
    let node = inst
        .borrow()
        .owner
        .upgrade()
        .ok_or_else(|| DdslError::kind_mismatch("the instance's node has been dropped"))?;
    let disc = match &node.borrow().defn {
        Defn::Union(u) => u.discriminator.clone(),
        _ => return Err(DdslError::kind_mismatch("a discriminator may only be set on a UNION instance")),
    };
    super::setters::validate_case_value(&disc, &value)?;
    inst.borrow_mut().discriminant = Some(value);
    Ok(())
}

/// The case currently selected by `inst`'s assigned discriminator, if any (spec.md §4.6,
/// §9). Returns the selected case's role and field value.
pub fn selected_case(inst: &InstanceRef) -> Option<(String, FieldValue)> {
    let node = inst.borrow().owner.upgrade()?;
    let discriminant = inst.borrow().discriminant.clone()?;
    let cases = match &node.borrow().defn {
        Defn::Union(u) => u.cases.clone(),
        _ => return None,
    };
    let matched = cases
        .iter()
        .find(|c| c.values.iter().any(|v| case_value_matches(v, &discriminant)))
        .or_else(|| cases.iter().find(|c| c.values.iter().any(|v| matches!(v, CaseValue::Default))))?;
    let role = matched.member.role.clone();
    let value = inst.borrow().fields.get(&role).cloned()?;
    Some((role, value))
}

fn case_value_matches(case: &CaseValue, assigned: &CaseValue) -> bool {
    match (case, assigned) {
        (CaseValue::Int(a), CaseValue::Int(b)) => a == b,
        (CaseValue::Bool(a), CaseValue::Bool(b)) => a == b,
        (CaseValue::Str(a), CaseValue::Str(b)) => a == b,
        (CaseValue::Enumerator(a), CaseValue::Enumerator(b)) => a == b,
        _ => false,
    }
}
