//! Type constructors (C2): one declarative builder function per kind, atop the kernel
//! (spec.md §4.2). Grounded on `idl2rust::ast`/`parser`'s one-constructor-per-`Definition`
//! shape and on `lucet-idl`'s `rustgenerator` pattern of feeding a shared backing store
//! from one declarative call per declared type.

mod annotation;
mod atom;
mod const_;
mod enum_;
mod module_;
mod struct_;
mod typedef;
mod union_;

pub use annotation::{annotation, apply, array, sequence};
pub use atom::{atom, string, wstring};
pub use const_::{const_, const_value};
pub use enum_::{enum_, enum_name, enum_ordinal};
pub use module_::module;
pub use struct_::struct_;
pub use typedef::{typedef, typedef_value};
pub use union_::{call as union_call, set_discriminator as union_set_discriminator, union_, CaseSpec};

use crate::kernel::{AnnotationInstance, CollectionQualifier, NodeRef};

/// One member/case's declared shape, shared between struct and union construction
/// (spec.md §3.3's member tuple).
#[derive(Debug, Clone)]
pub struct MemberSpec {
    pub role: String,
    pub ty: NodeRef,
    pub collection: Option<CollectionQualifier>,
    pub annotations: Vec<AnnotationInstance>,
}

impl MemberSpec {
    pub fn new(role: impl Into<String>, ty: NodeRef) -> Self {
        Self { role: role.into(), ty, collection: None, annotations: Vec::new() }
    }

    pub fn with_collection(mut self, collection: CollectionQualifier) -> Self {
        self.collection = Some(collection);
        self
    }

    pub fn with_annotations(mut self, annotations: Vec<AnnotationInstance>) -> Self {
        self.annotations = annotations;
        self
    }
}
