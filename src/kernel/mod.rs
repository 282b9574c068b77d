//! Kernel (C1): tagged model nodes, template/instance lifecycle, the propagation engine,
//! and accessor-string computation.
//!
//! Grounded on `idl2rust::ast`'s kind-tagged node shape (one payload type per `Definition`
//! variant) and on `icerpc-slicec`'s AST (owned arena + weak back-references, scope walk
//! from inner to outer). Node identity here is `Rc<RefCell<NodeData>>`; instances are
//! tracked by the owning node through `Weak` back-pointers so that dropping user-held
//! instances doesn't leak (§3.6, §9).

mod instance;
mod propagate;
mod setters;

pub use instance::{CollectionData, CollectionRef, FieldValue, InstanceData, InstanceRef};
pub(crate) use instance::attach_template;
pub use setters::{
    set, set_base, set_enumerator, set_module_child, set_name, set_ns, set_qualifiers,
    set_struct_member, set_switch, set_typedef, set_union_case, SetterKey,
};
pub(crate) use setters::register_typedef_dependency;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::error::{DdslError, Result};

/// The closed set of datatype kinds (spec.md §3.1). `Array`/`Sequence` are not members of
/// this enum: they're qualifiers carried by `AnnotationDefn::special`, attached to members
/// and typedefs, not standalone node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Annotation,
    Atom,
    Const,
    Enum,
    Struct,
    Union,
    Module,
    Typedef,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Kind::Annotation => "annotation",
            Kind::Atom => "atom",
            Kind::Const => "const",
            Kind::Enum => "enum",
            Kind::Struct => "struct",
            Kind::Union => "union",
            Kind::Module => "module",
            Kind::Typedef => "typedef",
        };
        f.write_str(s)
    }
}

pub type NodeRef = Rc<RefCell<NodeData>>;
pub type WeakNodeRef = Weak<RefCell<NodeData>>;

/// A positive-integer collection bound: either a literal or a reference to an integral
/// `CONST` node, which must resolve to a positive integer at the time it's read (spec.md
/// §3.3 invariants).
#[derive(Debug, Clone)]
pub enum Bound {
    Literal(u32),
    Const(NodeRef),
}

impl Bound {
    pub fn resolve(&self) -> Result<u32> {
        match self {
            Bound::Literal(n) => {
                if *n == 0 {
                    return Err(DdslError::invalid_dimension("collection bound must be > 0"));
                }
                Ok(*n)
            }
            Bound::Const(node) => {
                let node = node.borrow();
                let Defn::Const(c) = &node.defn else {
                    return Err(DdslError::kind_mismatch("dimension CONST must be a CONST node"));
                };
                match c.value {
                    ConstValue::Int(i) if i > 0 => Ok(i as u32),
                    _ => Err(DdslError::invalid_dimension(format!(
                        "CONST {:?} used as a dimension must resolve to a positive integer",
                        node.name
                    ))),
                }
            }
        }
    }
}

/// An array or sequence qualifier attached to a struct/union member or a typedef.
#[derive(Debug, Clone)]
pub enum CollectionQualifier {
    /// One or more array dimensions, each required to be > 0.
    Array { bounds: Vec<Bound> },
    /// A sequence bound; `None` means unbounded.
    Sequence { bound: Option<Bound> },
}

/// A scalar or `CONST`-reference attribute value, used both for annotation attributes and
/// for coerced `CONST` values.
#[derive(Debug, Clone)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Node(NodeRef),
}

/// An annotation's attribute map: positional values followed by keyed ones, preserved
/// verbatim (spec.md §3.3, §4.2).
#[derive(Debug, Clone, Default)]
pub struct AttributeMap {
    pub positional: Vec<AttrValue>,
    pub keyed: IndexMap<String, AttrValue>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Marks `array`/`sequence` among the builtin annotations, so the kernel can validate
/// their positional attributes as collection bounds (spec.md §3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialAnnotation {
    Array,
    Sequence,
}

/// An annotation applied at a use site: the annotation node plus whatever attributes were
/// supplied at the call site, overriding its defaults (spec.md §4.2 "callable templates").
#[derive(Debug, Clone)]
pub struct AnnotationInstance {
    pub annotation: NodeRef,
    pub overrides: AttributeMap,
}

/// A struct or union member: a role name, the node whose template gives the member's
/// shape, an optional collection qualifier, and trailing annotations (spec.md §3.3).
#[derive(Debug, Clone)]
pub struct Member {
    pub role: String,
    pub ty: NodeRef,
    pub collection: Option<CollectionQualifier>,
    pub annotations: Vec<AnnotationInstance>,
}

/// A union case value. `Default` matches the IDL `default` label; at most one case may be
/// `Default` (spec.md §3.3).
#[derive(Debug, Clone)]
pub enum CaseValue {
    Int(i64),
    Bool(bool),
    Str(String),
    Enumerator(String),
    Default,
}

/// One union case. `values` normally holds one entry; it holds more than one only when
/// several `caseDiscriminator`s inside a single XML `<case>` fall through to a shared
/// member (spec.md §4.7, §9 open question).
#[derive(Debug, Clone)]
pub struct UnionCase {
    pub values: Vec<CaseValue>,
    pub member: Member,
}

#[derive(Debug, Clone)]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
}

#[derive(Debug)]
pub struct AtomDefn {
    pub dimension: Option<Bound>,
}

#[derive(Debug)]
pub struct ConstDefn {
    pub atom: NodeRef,
    pub value: ConstValue,
}

#[derive(Debug, Default)]
pub struct EnumDefn {
    pub enumerators: Vec<(String, i32)>,
}

#[derive(Debug, Default)]
pub struct StructDefn {
    pub base: Option<NodeRef>,
    pub members: Vec<Member>,
}

#[derive(Debug)]
pub struct UnionDefn {
    pub discriminator: NodeRef,
    pub cases: Vec<UnionCase>,
}

#[derive(Debug, Default)]
pub struct ModuleDefn {
    pub children: IndexMap<String, NodeRef>,
}

#[derive(Debug)]
pub struct TypedefDefn {
    pub alias: NodeRef,
    pub collection: Option<CollectionQualifier>,
}

#[derive(Debug, Default)]
pub struct AnnotationDefn {
    pub defaults: AttributeMap,
    pub special: Option<SpecialAnnotation>,
}

/// The kind-specific body of a node (spec.md §3.3's `defn` column).
#[derive(Debug)]
pub enum Defn {
    Annotation(AnnotationDefn),
    Atom(AtomDefn),
    Const(ConstDefn),
    Enum(EnumDefn),
    Struct(StructDefn),
    Union(UnionDefn),
    Module(ModuleDefn),
    Typedef(TypedefDefn),
}

impl Defn {
    pub fn kind(&self) -> Kind {
        match self {
            Defn::Annotation(_) => Kind::Annotation,
            Defn::Atom(_) => Kind::Atom,
            Defn::Const(_) => Kind::Const,
            Defn::Enum(_) => Kind::Enum,
            Defn::Struct(_) => Kind::Struct,
            Defn::Union(_) => Kind::Union,
            Defn::Module(_) => Kind::Module,
            Defn::Typedef(_) => Kind::Typedef,
        }
    }

    fn empty(kind: Kind) -> Self {
        match kind {
            Kind::Annotation => Defn::Annotation(AnnotationDefn::default()),
            Kind::Atom => Defn::Atom(AtomDefn { dimension: None }),
            Kind::Const => unreachable!("CONST is always populated at creation"),
            Kind::Enum => Defn::Enum(EnumDefn::default()),
            Kind::Struct => Defn::Struct(StructDefn::default()),
            Kind::Union => unreachable!("UNION requires a discriminator at creation"),
            Kind::Module => Defn::Module(ModuleDefn::default()),
            Kind::Typedef => unreachable!("TYPEDEF requires an alias at creation"),
        }
    }
}

/// Every datatype is represented by one node (spec.md §3.2). Identity is the `Rc`
/// pointer, not `name`: two structurally identical structs with the same name under the
/// same module are still distinct nodes.
#[derive(Debug)]
pub struct NodeData {
    pub kind: Kind,
    pub name: String,
    pub ns: Option<WeakNodeRef>,
    pub qualifiers: Vec<AnnotationInstance>,
    pub defn: Defn,
    pub instances: Vec<Weak<RefCell<InstanceData>>>,
    pub template: Option<InstanceRef>,
    /// Structs/unions that have at least one member whose type resolves through this
    /// node's typedef chain. Only populated for TYPEDEF nodes; consulted when a typedef
    /// is retargeted so every dependent member's accessor shape gets rebuilt (§3.5, §4.1.4).
    pub dependents: Vec<WeakNodeRef>,
}

impl NodeData {
    pub fn ns_node(&self) -> Option<NodeRef> {
        self.ns.as_ref().and_then(Weak::upgrade)
    }
}

/// Allocates a node, attaches an empty `defn` shaped for `kind`, and (for kinds that carry
/// a canonical instance: atom/enum/struct/union/module/typedef) creates its template.
/// Fails if `name` is empty for any kind other than the hidden root module (spec.md
/// §4.1.1).
pub fn new_template(name: &str, kind: Kind, is_root: bool) -> Result<NodeRef> {
    if name.is_empty() && !is_root {
        return Err(DdslError::malformed("a datatype name must not be empty"));
    }

    let defn = match kind {
        Kind::Const | Kind::Union | Kind::Typedef => {
            return Err(DdslError::malformed(format!(
                "{kind} nodes must be created with their required payload, not new_template"
            )))
        }
        _ => Defn::empty(kind),
    };

    let node = new_node_raw(name, kind, defn);
    instance::attach_template(&node);
    Ok(node)
}

/// Allocates a bare node with the given kind-specific `defn`, used directly by
/// constructors (CONST/UNION/TYPEDEF) whose payload must be supplied up front.
pub(crate) fn new_node_raw(name: &str, kind: Kind, defn: Defn) -> NodeRef {
    Rc::new(RefCell::new(NodeData {
        kind,
        name: name.to_string(),
        ns: None,
        qualifiers: Vec::new(),
        defn,
        instances: Vec::new(),
        template: None,
        dependents: Vec::new(),
    }))
}

/// Given any instance or node, returns the node's canonical keyed-record template
/// (spec.md §4.1.1). Only struct/union/module carry one; atom/enum/typedef/const/
/// annotation templates are name-only stand-ins, reached through `nsname` instead (see
/// the per-kind "callable template" helpers in the `model` module).
pub fn template(node: &NodeRef) -> Option<InstanceRef> {
    node.borrow().template.clone()
}

/// Unwraps a TYPEDEF chain, collecting all collection qualifiers it crosses in
/// outermost-to-innermost order, and returns the first non-typedef node reached (spec.md
/// §4.1.1). The walk always terminates because typedef chains may not cycle (enforced at
/// `TYPEDEF :=`/populate time).
pub fn resolve(node: &NodeRef) -> (NodeRef, Vec<CollectionQualifier>) {
    let mut current = node.clone();
    let mut chain = Vec::new();
    loop {
        let next = {
            let borrowed = current.borrow();
            match &borrowed.defn {
                Defn::Typedef(t) => {
                    if let Some(c) = &t.collection {
                        chain.push(clone_qualifier(c));
                    }
                    Some(t.alias.clone())
                }
                _ => None,
            }
        };
        match next {
            Some(alias) => current = alias,
            None => break,
        }
    }
    (current, chain)
}

pub(crate) fn clone_qualifier(q: &CollectionQualifier) -> CollectionQualifier {
    match q {
        CollectionQualifier::Array { bounds } => CollectionQualifier::Array { bounds: bounds.clone() },
        CollectionQualifier::Sequence { bound } => CollectionQualifier::Sequence { bound: bound.clone() },
    }
}

/// `model_kind(x)`: introspection helper (spec.md §4.1.1).
pub fn model_kind(node: &NodeRef) -> Kind {
    node.borrow().kind
}

/// `nsroot(x)`: walks `ns` links to the outermost enclosing module.
pub fn nsroot(node: &NodeRef) -> NodeRef {
    let mut current = node.clone();
    loop {
        let parent = current.borrow().ns_node();
        match parent {
            Some(p) => current = p,
            None => return current,
        }
    }
}

/// `nsname(x, relative_to?)`: the qualified IDL name of `x`, either fully absolute
/// (`::A::B::C`) or relative to `relative_to`'s scope (spec.md §4.1.1).
pub fn nsname(node: &NodeRef, relative_to: Option<&NodeRef>) -> String {
    let mut segments = Vec::new();
    let mut current = Some(node.clone());
    while let Some(n) = current {
        let name = n.borrow().name.clone();
        if !name.is_empty() {
            segments.push(name);
        }
        current = n.borrow().ns_node();
        if let Some(rel) = relative_to {
            if let Some(ref c) = current {
                if Rc::ptr_eq(c, rel) {
                    break;
                }
            }
        }
    }
    segments.reverse();
    if relative_to.is_some() {
        segments.join("::")
    } else {
        format!("::{}", segments.join("::"))
    }
}

/// `is_collection(x)`: true if resolving `x`'s typedef chain crosses at least one
/// collection qualifier.
pub fn is_collection(node: &NodeRef) -> bool {
    !resolve(node).1.is_empty()
}

/// Looks up a direct child of a MODULE node by name. Returns `None` if `node` isn't a
/// module or has no such child.
pub fn lookup_child(node: &NodeRef, name: &str) -> Option<NodeRef> {
    match &node.borrow().defn {
        Defn::Module(m) => m.children.get(name).cloned(),
        _ => None,
    }
}

pub use instance::{new_collection, new_instance, selected_case, set_discriminator};
pub use propagate::update_instances;
