//! Process-wide singletons: the builtin atoms, the builtin annotations, the hidden root
//! module, and the dimensioned-atom cache (spec.md §5, §6, §9 "Global builtin registry").
//!
//! These live in a `thread_local!` rather than a `Sync` static: node identity here is
//! `Rc<RefCell<_>>`, which is not `Send`/`Sync`, and the kernel is explicitly a
//! single-threaded cooperative core (spec.md §5) that leaves multi-threaded use to an
//! external lock held by the embedder. A `thread_local!` singleton gives every caller on
//! the owning thread the same builtin nodes without requiring unsafe code.

use std::cell::RefCell;

use indexmap::IndexMap;
use once_cell::unsync::Lazy;

use crate::error::{DdslError, Result};
use crate::kernel::{AnnotationDefn, AttributeMap, Bound, Defn, Kind, NodeRef, SpecialAnnotation};

pub const BUILTIN_ATOM_NAMES: &[&str] = &[
    "boolean",
    "octet",
    "char",
    "wchar",
    "float",
    "double",
    "long_double",
    "short",
    "long",
    "long_long",
    "unsigned_short",
    "unsigned_long",
    "unsigned_long_long",
    "string",
    "wstring",
];

pub const BUILTIN_ANNOTATION_NAMES: &[&str] = &[
    "Key",
    "ID",
    "Optional",
    "MustUnderstand",
    "Shared",
    "BitBound",
    "BitSet",
    "Extensibility",
    "Nested",
    "top_level",
];

fn special_for(name: &str) -> Option<SpecialAnnotation> {
    match name {
        "array" => Some(SpecialAnnotation::Array),
        "sequence" => Some(SpecialAnnotation::Sequence),
        _ => None,
    }
}

fn build_atoms() -> IndexMap<String, NodeRef> {
    let mut map = IndexMap::new();
    for name in BUILTIN_ATOM_NAMES {
        let node = crate::kernel::new_template(name, Kind::Atom, false)
            .expect("builtin atom names are never empty");
        map.insert(name.to_string(), node);
    }
    map
}

fn build_annotations() -> IndexMap<String, NodeRef> {
    let mut map = IndexMap::new();
    // `array`/`sequence` are special annotations (spec.md §3.3) alongside the ten named
    // builtins; they're kept in the same registry so XML-imported `@array(n)` /
    // `@sequence(n)` qualifiers resolve through the same lookup path as any other
    // annotation reference.
    for name in BUILTIN_ANNOTATION_NAMES.iter().chain(["array", "sequence"].iter()) {
        let defn = Defn::Annotation(AnnotationDefn {
            defaults: AttributeMap::new(),
            special: special_for(name),
        });
        let node = crate::kernel::new_node_raw(name, Kind::Annotation, defn);
        map.insert(name.to_string(), node);
    }
    map
}

struct Registry {
    atoms: IndexMap<String, NodeRef>,
    annotations: IndexMap<String, NodeRef>,
    dimensioned: RefCell<IndexMap<String, NodeRef>>,
    root: NodeRef,
}

thread_local! {
    static REGISTRY: Lazy<Registry> = Lazy::new(|| Registry {
        atoms: build_atoms(),
        annotations: build_annotations(),
        dimensioned: RefCell::new(IndexMap::new()),
        root: crate::kernel::new_template("", Kind::Module, true)
            .expect("the root module is always constructible"),
    });
}

/// Looks up a builtin dimensionless atom by its exact name (spec.md §6).
pub fn builtin_atom(name: &str) -> Option<NodeRef> {
    REGISTRY.with(|r| r.atoms.get(name).cloned())
}

/// Looks up a builtin annotation (including the special `array`/`sequence` ones) by name.
pub fn builtin_annotation(name: &str) -> Option<NodeRef> {
    REGISTRY.with(|r| r.annotations.get(name).cloned())
}

/// The hidden, anonymous, process-wide root module that XML-imported top-level
/// declarations are deposited into (spec.md §4.7, Glossary "Root module").
pub fn root_module() -> NodeRef {
    REGISTRY.with(|r| r.root.clone())
}

/// Builds (or returns the cached) dimensioned `string`/`wstring` atom, keyed by the
/// canonical name `"T<n>"` so repeated calls with the same bound return the same node
/// (spec.md §4.2).
pub fn dimensioned_atom(base_name: &str, dim: Bound) -> Result<NodeRef> {
    if base_name != "string" && base_name != "wstring" {
        return Err(DdslError::kind_mismatch(format!(
            "{base_name} cannot carry a dimension; only string/wstring do"
        )));
    }
    let n = dim.resolve()?;
    let canonical = format!("{base_name}<{n}>");
    if let Some(existing) = REGISTRY.with(|r| r.dimensioned.borrow().get(&canonical).cloned()) {
        return Ok(existing);
    }
    let defn = Defn::Atom(crate::kernel::AtomDefn { dimension: Some(dim) });
    let node = crate::kernel::new_node_raw(&canonical, Kind::Atom, defn);
    REGISTRY.with(|r| r.dimensioned.borrow_mut().insert(canonical, node.clone()));
    Ok(node)
}

