//! A live datatype meta-model for the OMG X-Types data-modeling system: templates,
//! mutable instances, IDL serialization, instance walking, and XML import.

pub mod coercion;
pub mod error;
mod builtins;
pub mod idl;
pub mod importer;
mod kernel;
mod logger;
pub mod model;
pub mod resolver;
pub mod walker;
pub mod xml;

pub use builtins::{builtin_annotation, builtin_atom, root_module, BUILTIN_ANNOTATION_NAMES, BUILTIN_ATOM_NAMES};
pub use kernel::*;
