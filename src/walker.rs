//! The instance walker (C5, spec.md §4.6): a depth-first flattening of any instance into
//! its (accessor, value) pairs.
//!
//! Grounded on the same per-kind depth-first dispatch shape as the IDL serializer (C4,
//! `idl.rs`'s `write_decl`), applied to instances instead of nodes. A struct's base
//! fields always precede its locally declared ones in `InstanceData::fields` already
//! (`kernel::instance::collect_struct_fields` inserts them in that order), so walking a
//! struct instance is a single pass over its field map in insertion order — no separate
//! "walk the base first" step is needed here the way spec.md §4.6 describes it for a
//! hand-rolled table-based host.

use crate::error::Result;
use crate::kernel::{self, CaseValue, CollectionRef, FieldValue, InstanceRef, Kind};

/// One flattened (accessor, value) pair (spec.md §4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkLine {
    pub accessor: String,
    pub value: String,
}

impl WalkLine {
    fn new(accessor: impl Into<String>, value: impl Into<String>) -> Self {
        Self { accessor: accessor.into(), value: value.into() }
    }
}

/// Depth-first walk of `inst`, producing one line per leaf or collection-length accessor
/// reached (spec.md §4.6).
pub fn walk(inst: &InstanceRef) -> Result<Vec<WalkLine>> {
    let mut lines = Vec::new();
    walk_into(inst, &mut lines)?;
    Ok(lines)
}

fn walk_into(inst: &InstanceRef, out: &mut Vec<WalkLine>) -> Result<()> {
    let owner = inst.borrow().owner.upgrade();
    let is_union = owner.map(|n| kernel::model_kind(&n) == Kind::Union).unwrap_or(false);

    if is_union {
        walk_union(inst, out)
    } else {
        let roles: Vec<String> = inst.borrow().fields.keys().cloned().collect();
        for role in roles {
            let value = inst.borrow().fields.get(&role).cloned();
            if let Some(value) = value {
                walk_field(&value, out)?;
            }
        }
        Ok(())
    }
}

/// Union instances (spec.md §4.6 point 3): emit `_d` first, with its assigned concrete
/// value if [`kernel::set_discriminator`] has been called, or its bare accessor string
/// otherwise; then recurse into the currently selected case's member only.
fn walk_union(inst: &InstanceRef, out: &mut Vec<WalkLine>) -> Result<()> {
    let disc_accessor = match inst.borrow().fields.get("_d") {
        Some(FieldValue::Leaf(s)) => s.clone(),
        _ => String::new(),
    };
    let discriminant = inst.borrow().discriminant.clone();
    let disc_value = match &discriminant {
        Some(v) => case_value_text(v),
        None => disc_accessor.clone(),
    };
    out.push(WalkLine::new(disc_accessor, disc_value));

    if let Some((_, value)) = kernel::selected_case(inst) {
        walk_field(&value, out)?;
    }
    Ok(())
}

fn case_value_text(v: &CaseValue) -> String {
    match v {
        CaseValue::Int(i) => i.to_string(),
        CaseValue::Bool(b) => b.to_string(),
        CaseValue::Str(s) => s.clone(),
        CaseValue::Enumerator(n) => n.clone(),
        CaseValue::Default => "default".to_string(),
    }
}

fn walk_field(value: &FieldValue, out: &mut Vec<WalkLine>) -> Result<()> {
    match value {
        FieldValue::Leaf(accessor) => out.push(WalkLine::new(accessor.clone(), accessor.clone())),
        FieldValue::Nested(inst) => walk_into(inst, out)?,
        FieldValue::Collection(coll) => walk_collection(coll, out)?,
    }
    Ok(())
}

/// A collection's length accessor always comes first, valued with the resolved numeric
/// capacity when bounded or its own accessor string when unbounded (spec.md §3.4, §4.6
/// point 1). Bounded collections are then walked element by element, materializing each
/// slot as it goes; unbounded collections only walk slots a prior read already
/// materialized — walking to infinity isn't meaningful (spec.md §3.4, §8 boundary case).
fn walk_collection(coll: &CollectionRef, out: &mut Vec<WalkLine>) -> Result<()> {
    let accessor = coll.length_accessor().to_string();
    let value = match coll.capacity() {
        Some(n) => n.to_string(),
        None => accessor.clone(),
    };
    out.push(WalkLine::new(accessor, value));

    match coll.capacity() {
        Some(n) => {
            for i in 0..n as usize {
                walk_field(&coll.get(i)?, out)?;
            }
        }
        None => {
            for i in coll.materialized_indices() {
                walk_field(&coll.get(i)?, out)?;
            }
        }
    }
    Ok(())
}
