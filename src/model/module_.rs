//! `module` constructor (spec.md §4.2). The root module itself is a process-wide
//! singleton (see `builtins::root_module`), not built through this constructor.

use crate::error::Result;
use crate::kernel::{self, Kind, NodeRef};

/// Finds-or-creates a child module named `name` under `ns`, matching the XML importer's
/// find-or-create cursor semantics (spec.md §4.7) so the same constructor serves both
/// declarative and imported construction.
pub fn module(ns: &NodeRef, name: &str) -> Result<NodeRef> {
    if let Some(existing) = kernel::lookup_child(ns, name) {
        if kernel::model_kind(&existing) == Kind::Module {
            return Ok(existing);
        }
    }
    let node = kernel::new_template(name, Kind::Module, false)?;
    kernel::set_module_child(ns, name, Some(node.clone()))?;
    Ok(node)
}
