//! `annotation`, `array`, `sequence` constructors (spec.md §4.2).

use crate::error::Result;
use crate::kernel::{self, AnnotationDefn, AnnotationInstance, AttributeMap, Bound, CollectionQualifier, Defn, Kind, NodeRef};

/// Builds an annotation under `ns` with the given default attribute map. `array` and
/// `sequence` are process-wide builtins (see `builtins::builtin_annotation`), not built
/// through this constructor.
pub fn annotation(ns: &NodeRef, name: &str, defaults: AttributeMap) -> Result<NodeRef> {
    let defn = Defn::Annotation(AnnotationDefn { defaults, special: None });
    let node = kernel::new_node_raw(name, Kind::Annotation, defn);
    kernel::set_module_child(ns, name, Some(node.clone()))?;
    Ok(node)
}

/// "Calling the template like a function" (spec.md §4.2): attaches `overrides` to an
/// annotation reference at a use site.
pub fn apply(annotation: NodeRef, overrides: AttributeMap) -> AnnotationInstance {
    AnnotationInstance { annotation, overrides }
}

/// Builds an `array` collection qualifier from one or more positive-integer (or CONST)
/// bounds, one per dimension.
pub fn array(bounds: Vec<Bound>) -> CollectionQualifier {
    CollectionQualifier::Array { bounds }
}

/// Builds a `sequence` collection qualifier; `bound = None` means unbounded.
pub fn sequence(bound: Option<Bound>) -> CollectionQualifier {
    CollectionQualifier::Sequence { bound }
}
