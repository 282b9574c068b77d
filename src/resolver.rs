//! The name resolver (C3, spec.md §4.4): qualified-name lookup honoring IDL scoping,
//! enumerator leakage into the enclosing module, and XML naming aliases.
//!
//! Grounded on `icerpc-slicec`'s `Ast::lookup_type`/`Ast::lookup_entity`
//! (`examples/other_examples/...ast.rs.rs`), adapted from its owned-pointer arena lookup
//! tables to this crate's `Rc<RefCell<_>>` graph: instead of a flat `HashMap` keyed by a
//! scoped identifier string, each segment is looked up as a direct child of the
//! previously resolved scope, walking outward from the starting scope for the first
//! segment only (IDL's inner-to-outer rule).

use crate::error::{DdslError, Result};
use crate::kernel::{self, Defn, NodeRef};

/// The result of resolving a qualified name: either a datatype node, or the name of an
/// enumerator that "leaked" into the scope it was looked up in (spec.md §4.4).
#[derive(Debug, Clone)]
pub enum Resolved {
    Node(NodeRef),
    Enumerator(String),
}

/// XML schema naming conventions that don't match the IDL builtin atom names
/// (spec.md §4.4 "recognizes aliases for XML naming conventions").
pub(crate) fn normalize(segment: &str) -> &str {
    match segment {
        "unsignedShort" => "unsigned_short",
        "unsignedLong" => "unsigned_long",
        "unsignedLongLong" => "unsigned_long_long",
        "longLong" => "long_long",
        "longDouble" => "long_double",
        other => other,
    }
}

fn enumerator_in_scope(scope: &NodeRef, name: &str) -> bool {
    let borrowed = scope.borrow();
    let Defn::Module(m) = &borrowed.defn else { return false };
    m.children.values().any(|child| {
        let c = child.borrow();
        matches!(&c.defn, Defn::Enum(e) if e.enumerators.iter().any(|(n, _)| n == name))
    })
}

/// Resolves a qualified name (`::`-separated segments, optional leading `::` for
/// absolute) starting from scope `ns` (spec.md §4.4).
pub fn resolve_name(name: &str, ns: &NodeRef) -> Result<Resolved> {
    let absolute = name.starts_with("::");
    let trimmed = name.trim_start_matches("::");
    let segments: Vec<&str> = trimmed.split("::").map(normalize).collect();
    if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(DdslError::unresolved(name, None));
    }

    let start_scope = if absolute { kernel::nsroot(ns) } else { ns.clone() };
    let first = segments[0];

    let mut current = resolve_first_segment(&start_scope, first, name)?;
    if let Some(en) = current_as_enumerator(&current) {
        return Ok(en);
    }

    for seg in &segments[1..] {
        let (scope_base, _) = match &current {
            Resolved::Node(n) => kernel::resolve(n),
            Resolved::Enumerator(_) => {
                return Err(DdslError::unresolved(name, None));
            }
        };
        if enumerator_in_scope(&scope_base, seg) {
            return Ok(Resolved::Enumerator(seg.to_string()));
        }
        match kernel::lookup_child(&scope_base, seg) {
            Some(child) => current = Resolved::Node(child),
            None => return Err(DdslError::unresolved(name, None)),
        }
    }
    Ok(current)
}

fn current_as_enumerator(current: &Resolved) -> Option<Resolved> {
    match current {
        Resolved::Enumerator(n) => Some(Resolved::Enumerator(n.clone())),
        Resolved::Node(_) => None,
    }
}

fn resolve_first_segment(start_scope: &NodeRef, first: &str, full_name: &str) -> Result<Resolved> {
    let mut scope = Some(start_scope.clone());
    while let Some(s) = scope {
        if enumerator_in_scope(&s, first) {
            return Ok(Resolved::Enumerator(first.to_string()));
        }
        if let Some(child) = kernel::lookup_child(&s, first) {
            return Ok(Resolved::Node(child));
        }
        scope = s.borrow().ns_node();
    }
    if let Some(b) = crate::builtins::builtin_atom(first).or_else(|| crate::builtins::builtin_annotation(first)) {
        return Ok(Resolved::Node(b));
    }
    Err(DdslError::unresolved(full_name, None))
}

/// Convenience for callers that only care about the node (errors if the name resolved to
/// a leaked enumerator instead — most type-reference call sites never expect that).
pub fn resolve_type(name: &str, ns: &NodeRef) -> Result<NodeRef> {
    match resolve_name(name, ns)? {
        Resolved::Node(n) => Ok(n),
        Resolved::Enumerator(e) => Err(DdslError::kind_mismatch(format!(
            "{e:?} names an enumerator, not a type"
        ))),
    }
}
